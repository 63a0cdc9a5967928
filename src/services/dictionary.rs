//! Word definitions from the dictionaryapi.dev entries endpoint
//!
//! The API answers with a JSON array of entries; only the first one is
//! used and reduced to a `WordEntry`. Every failure collapses to `None`.

use crate::config::LookupConfig;
use crate::models::{DefinitionItem, WordEntry};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const DEFINITIONS_PER_MEANING: usize = 4;
const SYNONYMS_PER_MEANING: usize = 6;
const MAX_SYNONYMS: usize = 8;

/// Anything that can look up the definition of an English word
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    /// Simplified entry for `word`, or `None` when nothing usable came back
    async fn fetch_definitions(&self, word: &str) -> Option<WordEntry>;
}

/// `DefinitionSource` backed by the public dictionary API
pub struct HttpDefinitionSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpDefinitionSource {
    pub fn new(client: reqwest::Client, config: &LookupConfig) -> Self {
        Self {
            client,
            base_url: config.dictionary_api_base.trim_end_matches('/').to_string(),
            timeout: config.definition_timeout(),
        }
    }

    pub fn boxed(client: reqwest::Client, config: &LookupConfig) -> Arc<dyn DefinitionSource> {
        Arc::new(Self::new(client, config))
    }

    fn entry_url(&self, word: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(word))
    }
}

#[async_trait]
impl DefinitionSource for HttpDefinitionSource {
    async fn fetch_definitions(&self, word: &str) -> Option<WordEntry> {
        if word.is_empty() {
            return None;
        }

        let url = self.entry_url(word);
        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Definition request for {:?} failed: {}", word, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!("No definition for {:?}: HTTP {}", word, response.status());
            return None;
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Unreadable definition payload for {:?}: {}", word, e);
                return None;
            }
        };

        let entry = simplify_payload(&payload, word);
        tracing::debug!("Definition lookup for {:?}: found={}", word, entry.is_some());
        entry
    }
}

/// Reduce a raw API payload to a `WordEntry`.
///
/// Returns `None` unless the payload is a non-empty array. Fields that are
/// missing or of the wrong type are skipped.
pub fn simplify_payload(payload: &Value, query: &str) -> Option<WordEntry> {
    let entry = payload.as_array()?.first()?;

    let pronounce = entry
        .get("phonetics")
        .and_then(Value::as_array)
        .and_then(|phonetics| phonetics.first())
        .and_then(|first| first.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let meanings: &[Value] = entry
        .get("meanings")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let part_of_speech = meanings.first().and_then(|m| string_field(m, "partOfSpeech"));

    let mut definitions = Vec::new();
    let mut synonyms = Vec::new();
    for meaning in meanings {
        let part = string_field(meaning, "partOfSpeech");

        definitions.extend(
            list_field(meaning, "definitions")
                .iter()
                .take(DEFINITIONS_PER_MEANING)
                .map(|d| DefinitionItem {
                    definition: string_field(d, "definition"),
                    example: string_field(d, "example"),
                    part_of_speech: part.clone(),
                }),
        );

        synonyms.extend(
            list_field(meaning, "synonyms")
                .iter()
                .take(SYNONYMS_PER_MEANING)
                .filter_map(Value::as_str)
                .map(str::to_string),
        );
    }
    synonyms.truncate(MAX_SYNONYMS);

    let word = string_field(entry, "word").unwrap_or_else(|| query.to_string());

    Some(WordEntry {
        word,
        pronounce,
        part_of_speech,
        definitions,
        synonyms,
    })
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn list_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meaning(part: &str, defs: usize, syns: usize) -> Value {
        json!({
            "partOfSpeech": part,
            "definitions": (0..defs)
                .map(|i| json!({"definition": format!("{} def {}", part, i), "example": format!("ex {}", i)}))
                .collect::<Vec<_>>(),
            "synonyms": (0..syns).map(|i| format!("{}-syn{}", part, i)).collect::<Vec<_>>(),
        })
    }

    #[test]
    fn test_simplify_full_entry() {
        let payload = json!([{
            "word": "hello",
            "phonetics": [{"text": "/həˈləʊ/"}, {"text": "/hɛˈləʊ/"}],
            "meanings": [meaning("noun", 2, 1), meaning("verb", 1, 0)],
        }]);

        let entry = simplify_payload(&payload, "hello").unwrap();

        assert_eq!(entry.word, "hello");
        assert_eq!(entry.pronounce.as_deref(), Some("/həˈləʊ/"));
        assert_eq!(entry.part_of_speech.as_deref(), Some("noun"));
        assert_eq!(entry.definitions.len(), 3);
        assert_eq!(entry.definitions[2].part_of_speech.as_deref(), Some("verb"));
        assert_eq!(entry.definitions[0].example.as_deref(), Some("ex 0"));
        assert_eq!(entry.synonyms, vec!["noun-syn0"]);
    }

    #[test]
    fn test_simplify_caps_definitions_and_synonyms() {
        let payload = json!([{
            "word": "run",
            "meanings": [meaning("verb", 10, 10), meaning("noun", 10, 10)],
        }]);

        let entry = simplify_payload(&payload, "run").unwrap();

        // 4 per meaning
        assert_eq!(entry.definitions.len(), 8);
        assert_eq!(entry.definitions[3].definition.as_deref(), Some("verb def 3"));
        assert_eq!(entry.definitions[4].definition.as_deref(), Some("noun def 0"));
        // 6 from the first meaning, 2 from the second, then truncated to 8
        assert_eq!(entry.synonyms.len(), 8);
        assert_eq!(entry.synonyms[5], "verb-syn5");
        assert_eq!(entry.synonyms[6], "noun-syn0");
    }

    #[test]
    fn test_simplify_without_meanings() {
        let payload = json!([{"word": "zzz", "phonetics": []}]);

        let entry = simplify_payload(&payload, "zzz").unwrap();

        assert_eq!(entry.pronounce, None);
        assert_eq!(entry.part_of_speech, None);
        assert!(entry.definitions.is_empty());
        assert!(entry.synonyms.is_empty());
    }

    #[test]
    fn test_simplify_word_falls_back_to_query() {
        let payload = json!([{"meanings": []}]);
        let entry = simplify_payload(&payload, "query").unwrap();
        assert_eq!(entry.word, "query");
    }

    #[test]
    fn test_simplify_rejects_non_list_payloads() {
        assert!(simplify_payload(&json!([]), "x").is_none());
        assert!(simplify_payload(&json!({"title": "No Definitions Found"}), "x").is_none());
        assert!(simplify_payload(&json!("hello"), "x").is_none());
        assert!(simplify_payload(&Value::Null, "x").is_none());
    }

    #[test]
    fn test_simplify_tolerates_ill_typed_fields() {
        let payload = json!([{
            "word": 42,
            "phonetics": [{"audio": "x.mp3"}],
            "meanings": [{
                "partOfSpeech": null,
                "definitions": [{"definition": 1}, "not an object"],
                "synonyms": ["ok", 3, null],
            }],
        }]);

        let entry = simplify_payload(&payload, "fallback").unwrap();

        assert_eq!(entry.word, "fallback");
        assert_eq!(entry.pronounce, None);
        assert_eq!(entry.part_of_speech, None);
        assert_eq!(entry.definitions.len(), 2);
        assert_eq!(entry.definitions[0].definition, None);
        assert_eq!(entry.synonyms, vec!["ok"]);
    }

    #[test]
    fn test_entry_url_encodes_word() {
        let source = HttpDefinitionSource::new(reqwest::Client::new(), &LookupConfig::default());
        assert_eq!(
            source.entry_url("thank you"),
            "https://api.dictionaryapi.dev/api/v2/entries/en/thank%20you"
        );
    }

    #[tokio::test]
    async fn test_empty_word_makes_no_request() {
        let config = LookupConfig {
            dictionary_api_base: "http://127.0.0.1:1".to_string(),
            ..LookupConfig::default()
        };
        let source = HttpDefinitionSource::new(reqwest::Client::new(), &config);
        assert!(source.fetch_definitions("").await.is_none());
    }

    /// Serve `router` on an ephemeral local port and return its base URL
    async fn spawn_stub(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn stub_source() -> HttpDefinitionSource {
        use axum::{extract::Path, http::StatusCode, response::IntoResponse, routing::get, Json};

        async fn entry(Path(word): Path<String>) -> axum::response::Response {
            match word.as_str() {
                "hello" => Json(json!([{
                    "word": "hello",
                    "phonetics": [{"text": "/həˈləʊ/"}],
                    "meanings": [meaning("exclamation", 1, 1)],
                }]))
                .into_response(),
                "thank you" => Json(json!([{"word": "thank you", "meanings": []}])).into_response(),
                "missing" => (
                    StatusCode::NOT_FOUND,
                    Json(json!([{"word": "missing", "meanings": []}])),
                )
                    .into_response(),
                "garbled" => "<html>not json</html>".into_response(),
                _ => StatusCode::NOT_FOUND.into_response(),
            }
        }

        let router = axum::Router::new().route("/{word}", get(entry));

        let config = LookupConfig {
            dictionary_api_base: spawn_stub(router).await,
            definition_timeout_secs: 5,
            ..LookupConfig::default()
        };
        HttpDefinitionSource::new(reqwest::Client::new(), &config)
    }

    #[tokio::test]
    async fn test_fetch_definitions_from_api() {
        let source = stub_source().await;

        let entry = source.fetch_definitions("hello").await.unwrap();

        assert_eq!(entry.word, "hello");
        assert_eq!(entry.pronounce.as_deref(), Some("/həˈləʊ/"));
        assert_eq!(entry.definitions.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_definitions_encodes_spaces() {
        let source = stub_source().await;

        let entry = source.fetch_definitions("thank you").await.unwrap();

        assert_eq!(entry.word, "thank you");
    }

    #[tokio::test]
    async fn test_non_success_status_is_none() {
        let source = stub_source().await;
        // The 404 body is a valid payload; only the status rules it out
        assert!(source.fetch_definitions("missing").await.is_none());
        assert!(source.fetch_definitions("unrouted").await.is_none());
    }

    #[tokio::test]
    async fn test_non_json_body_is_none() {
        let source = stub_source().await;
        assert!(source.fetch_definitions("garbled").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_api_is_none() {
        let config = LookupConfig {
            dictionary_api_base: "http://127.0.0.1:1".to_string(),
            definition_timeout_secs: 1,
            ..LookupConfig::default()
        };
        let source = HttpDefinitionSource::new(reqwest::Client::new(), &config);
        assert!(source.fetch_definitions("hello").await.is_none());
    }
}
