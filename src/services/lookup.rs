//! Lookup aggregation
//!
//! Builds the dictionary page, chapter pages and phrase lookups out of the
//! definition and sign video sources. Each call works on its own
//! `VideoMemo`, so a term is fetched at most once per request and nothing
//! is shared between requests.

use crate::config::LookupConfig;
use crate::models::{
    ChapterResources, ChapterView, DictionaryView, PhraseCard, PhraseLookup, PhraseSegment,
    SearchMode, VideoCard, WordEntry,
};
use crate::services::dictionary::{DefinitionSource, HttpDefinitionSource};
use crate::services::sign_video::{HttpSignVideoSource, SignVideoSource};
use anyhow::Context;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const CHAPTER_COUNT: u32 = 8;

const CHAPTER_ONE_BASICS: [&str; 7] = [
    "yes",
    "no",
    "maybe",
    "hello",
    "thank you",
    "nice to meet you",
    "my name",
];

const CHAPTER_ONE_RESPONSES: [(&str, &str); 3] = [("YES", "yes"), ("NO", "no"), ("MAYBE", "maybe")];

struct PhraseSpec {
    title: &'static str,
    key: &'static str,
    segments: &'static [&'static str],
}

const CHAPTER_ONE_PHRASES: [PhraseSpec; 4] = [
    PhraseSpec {
        title: "HELLO",
        key: "hello",
        segments: &[],
    },
    PhraseSpec {
        title: "MY NAME ___",
        key: "my name",
        segments: &["my", "name"],
    },
    PhraseSpec {
        title: "NICE TO MEET YOU",
        key: "nice to meet you",
        segments: &["nice", "meet", "you"],
    },
    PhraseSpec {
        title: "THANK YOU",
        key: "thank you",
        segments: &["thank", "you"],
    },
];

static EDGE_PUNCTUATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\W+|\W+$").expect("valid edge punctuation regex"));

/// Why a phrase lookup could not run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhraseLookupError {
    #[error("Missing query")]
    MissingQuery,
    #[error("No valid words")]
    NoValidWords,
}

/// Shared HTTP client for all outbound lookups.
///
/// Timeouts are set per request by each source.
pub fn build_http_client(config: &LookupConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .context("Failed to build HTTP client")
}

/// Aggregates definitions and sign videos into page view models
pub struct LookupService {
    definitions: Arc<dyn DefinitionSource>,
    videos: Arc<dyn SignVideoSource>,
    max_concurrent_fetches: usize,
}

impl LookupService {
    pub fn new(
        definitions: Arc<dyn DefinitionSource>,
        videos: Arc<dyn SignVideoSource>,
        max_concurrent_fetches: usize,
    ) -> Self {
        Self {
            definitions,
            videos,
            max_concurrent_fetches: max_concurrent_fetches.max(1),
        }
    }

    /// Service backed by the real dictionary API and sign site
    pub fn from_config(config: &LookupConfig) -> anyhow::Result<Self> {
        let client = build_http_client(config)?;
        Ok(Self::new(
            HttpDefinitionSource::boxed(client.clone(), config),
            HttpSignVideoSource::boxed(client, config),
            config.max_concurrent_fetches,
        ))
    }

    /// Dictionary page for `query`.
    ///
    /// Letters mode skips the definition lookup; an empty query fetches
    /// nothing at all.
    pub async fn dictionary_view(&self, query: &str, mode: SearchMode) -> DictionaryView {
        let query = query.trim();
        if query.is_empty() {
            return DictionaryView {
                mode,
                ..DictionaryView::default()
            };
        }

        let (entry, asl_video) = match mode {
            SearchMode::Letters => (WordEntry::default(), self.videos.fetch_video(query).await),
            SearchMode::Words => {
                let (entry, video) = tokio::join!(
                    self.definitions.fetch_definitions(query),
                    self.videos.fetch_video(query)
                );
                (entry.unwrap_or_default(), video)
            }
        };

        DictionaryView {
            query: query.to_string(),
            mode,
            entry,
            asl_video,
        }
    }

    /// Chapter page data, or `None` when `chapter` is outside 1..=8
    pub async fn chapter_view(&self, chapter: u32) -> Option<ChapterView> {
        if !(1..=CHAPTER_COUNT).contains(&chapter) {
            return None;
        }

        let chapter_resources = if chapter == 1 {
            self.chapter_one_resources().await
        } else {
            ChapterResources::default()
        };

        Some(ChapterView {
            chapter_number: chapter,
            chapter_letter: chapter_letter(chapter),
            chapter_resources,
        })
    }

    async fn chapter_one_resources(&self) -> ChapterResources {
        let mut memo = VideoMemo::new(self.videos.as_ref(), self.max_concurrent_fetches);

        let letters: Vec<char> = ('A'..='Z').collect();
        let mut terms: Vec<String> = CHAPTER_ONE_BASICS.iter().map(|t| t.to_string()).collect();
        terms.extend(letters.iter().map(|c| c.to_ascii_lowercase().to_string()));
        memo.prefetch(&terms).await;

        let segment_terms: Vec<String> = CHAPTER_ONE_PHRASES
            .iter()
            .filter(|p| memo.cached(p.key).is_none())
            .flat_map(|p| p.segments.iter().map(|s| s.to_string()))
            .collect();
        memo.prefetch(&segment_terms).await;

        let basics = CHAPTER_ONE_BASICS
            .iter()
            .map(|term| VideoCard {
                title: term.to_string(),
                video: memo.cached(term),
            })
            .collect();

        let alphabet = letters
            .iter()
            .map(|letter| VideoCard {
                title: letter.to_string(),
                video: memo.cached(&letter.to_ascii_lowercase().to_string()),
            })
            .collect();

        let responses = CHAPTER_ONE_RESPONSES
            .iter()
            .map(|(title, key)| VideoCard {
                title: title.to_string(),
                video: memo.cached(key),
            })
            .collect();

        let phrases = CHAPTER_ONE_PHRASES
            .iter()
            .map(|phrase| {
                let video = memo.cached(phrase.key);
                let segment_urls = if video.is_none() {
                    phrase.segments.iter().filter_map(|s| memo.cached(s)).collect()
                } else {
                    Vec::new()
                };
                PhraseCard {
                    title: phrase.title.to_string(),
                    video,
                    segment_urls,
                }
            })
            .collect();

        ChapterResources {
            basics,
            alphabet,
            responses,
            phrases,
        }
    }

    /// Clips for a free-text phrase.
    ///
    /// Words without a clip of their own fall back to fingerspelling; words
    /// with neither are left out.
    pub async fn phrase_lookup(&self, query: &str) -> Result<PhraseLookup, PhraseLookupError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PhraseLookupError::MissingQuery);
        }

        let words = tokenize(query);
        if words.is_empty() {
            return Err(PhraseLookupError::NoValidWords);
        }

        let joined = words.join(" ");
        let mut memo = VideoMemo::new(self.videos.as_ref(), self.max_concurrent_fetches);

        let mut terms = words.clone();
        terms.push(joined.clone());
        memo.prefetch(&terms).await;

        let spelled: Vec<String> = words
            .iter()
            .filter(|w| memo.cached(w).is_none())
            .flat_map(|w| spelling_terms(w))
            .collect();
        memo.prefetch(&spelled).await;

        let segments = words
            .iter()
            .filter_map(|word| {
                if let Some(video) = memo.cached(word) {
                    return Some(PhraseSegment {
                        word: word.clone(),
                        video: Some(video),
                        spelling: None,
                    });
                }
                let spelling: Vec<String> = spelling_terms(word)
                    .iter()
                    .filter_map(|letter| memo.cached(letter))
                    .collect();
                (!spelling.is_empty()).then(|| PhraseSegment {
                    word: word.clone(),
                    video: None,
                    spelling: Some(spelling),
                })
            })
            .collect();

        Ok(PhraseLookup {
            video: memo.cached(&joined),
            segments,
        })
    }
}

/// Chapter letter: 1 is A, 8 is H
pub fn chapter_letter(chapter: u32) -> char {
    char::from_u32('A' as u32 + chapter.saturating_sub(1)).unwrap_or('A')
}

/// Split a phrase on whitespace and strip leading/trailing non-word
/// characters from each token, dropping tokens left empty
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| EDGE_PUNCTUATION_RE.replace_all(token, "").into_owned())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Lower-cased letter terms used to fingerspell `word`
fn spelling_terms(word: &str) -> Vec<String> {
    word.chars()
        .filter(|c| c.is_alphabetic())
        .map(|c| c.to_lowercase().collect())
        .collect()
}

/// Request-local memo of video lookups
struct VideoMemo<'a> {
    source: &'a dyn SignVideoSource,
    limit: usize,
    seen: HashMap<String, Option<String>>,
}

impl<'a> VideoMemo<'a> {
    fn new(source: &'a dyn SignVideoSource, limit: usize) -> Self {
        Self {
            source,
            limit,
            seen: HashMap::new(),
        }
    }

    /// Fetch every term not looked up yet, at most `limit` at a time
    async fn prefetch(&mut self, terms: &[String]) {
        let mut queued = HashSet::new();
        let pending: Vec<String> = terms
            .iter()
            .filter(|t| !self.seen.contains_key(t.as_str()) && queued.insert(t.as_str()))
            .cloned()
            .collect();
        if pending.is_empty() {
            return;
        }

        let source = self.source;
        let results: Vec<(String, Option<String>)> = stream::iter(pending)
            .map(|term| async move {
                let video = source.fetch_video(&term).await;
                (term, video)
            })
            .buffered(self.limit)
            .collect()
            .await;

        self.seen.extend(results);
    }

    /// Result of an earlier fetch; `None` for misses and unknown terms
    fn cached(&self, term: &str) -> Option<String> {
        self.seen.get(term).cloned().flatten()
    }
}
