//! Lookup view models
//!
//! Ephemeral data assembled per request from the dictionary API and the
//! sign video site. Nothing here is persisted.

use serde::{Deserialize, Serialize};

/// Simplified dictionary entry for one word
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    pub pronounce: Option<String>,
    pub part_of_speech: Option<String>,
    pub definitions: Vec<DefinitionItem>,
    pub synonyms: Vec<String>,
}

impl WordEntry {
    /// True when nothing was found (or nothing was asked)
    pub fn is_empty(&self) -> bool {
        self.word.is_empty() && self.definitions.is_empty() && self.synonyms.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionItem {
    pub definition: Option<String>,
    pub example: Option<String>,
    pub part_of_speech: Option<String>,
}

/// Dictionary search mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Words,
    Letters,
}

impl SearchMode {
    /// Only the exact value `letters` selects letter mode
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            Some("letters") => SearchMode::Letters,
            _ => SearchMode::Words,
        }
    }
}

/// Everything the dictionary page renders
#[derive(Debug, Clone, Default, Serialize)]
pub struct DictionaryView {
    pub query: String,
    pub mode: SearchMode,
    pub entry: WordEntry,
    pub asl_video: Option<String>,
}

/// A titled clip; `video` is `None` when the sign site had nothing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoCard {
    pub title: String,
    pub video: Option<String>,
}

/// A chapter phrase with the clips used when no whole-phrase clip exists
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhraseCard {
    pub title: String,
    pub video: Option<String>,
    pub segment_urls: Vec<String>,
}

/// Chapter 1 lesson material; empty for the other chapters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChapterResources {
    pub basics: Vec<VideoCard>,
    pub alphabet: Vec<VideoCard>,
    pub responses: Vec<VideoCard>,
    pub phrases: Vec<PhraseCard>,
}

impl ChapterResources {
    pub fn is_empty(&self) -> bool {
        self.basics.is_empty()
            && self.alphabet.is_empty()
            && self.responses.is_empty()
            && self.phrases.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterView {
    pub chapter_number: u32,
    pub chapter_letter: char,
    pub chapter_resources: ChapterResources,
}

/// One word of a phrase lookup.
///
/// Either `video` is set, or `spelling` holds the letter clips that
/// were found for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhraseSegment {
    pub word: String,
    pub video: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spelling: Option<Vec<String>>,
}

/// Response body of the phrase video endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhraseLookup {
    pub video: Option<String>,
    pub segments: Vec<PhraseSegment>,
}
