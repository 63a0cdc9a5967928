//! Level map
//!
//! The learning path shown on the level page: eight chapters, each made of
//! a milestone node, five levels and a treasure chest.

use crate::services::lookup::CHAPTER_COUNT;
use serde::Serialize;

pub const LEVELS_PER_CHAPTER: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Chapter,
    Level,
    Treasure,
}

/// One stop on the level map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathNode {
    pub kind: NodeKind,
    pub title: String,
    pub subtitle: String,
    pub badge: &'static str,
    /// Only chapter nodes link anywhere
    pub link: Option<String>,
    /// `side-left` or `side-right`, alternating down the map
    pub side: &'static str,
}

/// Every node of the level map in display order
pub fn learning_path() -> Vec<PathNode> {
    let mut nodes = Vec::new();

    for chapter in 1..=CHAPTER_COUNT {
        let first_level = (chapter - 1) * LEVELS_PER_CHAPTER + 1;
        let last_level = chapter * LEVELS_PER_CHAPTER;

        nodes.push((
            NodeKind::Chapter,
            format!("Chapter {}", chapter),
            format!("Unlocks Levels {}-{}", first_level, last_level),
            "Milestone",
            Some(format!("/chapter/{}/", chapter)),
        ));

        for level in first_level..=last_level {
            nodes.push((
                NodeKind::Level,
                format!("Level {}", level),
                "Practice and progress".to_string(),
                "Core Level",
                None,
            ));
        }

        nodes.push((
            NodeKind::Treasure,
            format!("Treasure {}", chapter),
            "Claim your reward".to_string(),
            "Chest",
            None,
        ));
    }

    nodes
        .into_iter()
        .enumerate()
        .map(|(index, (kind, title, subtitle, badge, link))| PathNode {
            kind,
            title,
            subtitle,
            badge,
            link,
            side: if index % 2 == 0 { "side-left" } else { "side-right" },
        })
        .collect()
}
