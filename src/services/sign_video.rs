//! Sign video lookup
//!
//! The sign site has no search API, so the sign page for a term is fetched
//! and the first `.mp4` link in its HTML is taken as the clip.

use crate::config::LookupConfig;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

static MP4_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:https?:)?//[^"']+\.mp4"#).expect("valid mp4 regex")
});

/// Anything that can find a sign video clip for a word or phrase
#[async_trait]
pub trait SignVideoSource: Send + Sync {
    /// Absolute https URL of the first clip for `term`, if any
    async fn fetch_video(&self, term: &str) -> Option<String>;
}

/// `SignVideoSource` that scrapes `{sign_site_base}/sign/{term}`
pub struct HttpSignVideoSource {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSignVideoSource {
    pub fn new(client: reqwest::Client, config: &LookupConfig) -> Self {
        Self {
            client,
            base_url: config.sign_site_base.trim_end_matches('/').to_string(),
            timeout: config.video_timeout(),
        }
    }

    pub fn boxed(client: reqwest::Client, config: &LookupConfig) -> Arc<dyn SignVideoSource> {
        Arc::new(Self::new(client, config))
    }

    fn sign_page_url(&self, term: &str) -> String {
        format!("{}/sign/{}", self.base_url, urlencoding::encode(term))
    }
}

#[async_trait]
impl SignVideoSource for HttpSignVideoSource {
    async fn fetch_video(&self, term: &str) -> Option<String> {
        if term.is_empty() {
            return None;
        }

        let url = self.sign_page_url(term);
        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Sign page request for {:?} failed: {}", term, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!("No sign page for {:?}: HTTP {}", term, response.status());
            return None;
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to read sign page for {:?}: {}", term, e);
                return None;
            }
        };

        let video = extract_video_url(&String::from_utf8_lossy(&body));
        tracing::debug!("Sign video lookup for {:?}: found={}", term, video.is_some());
        video
    }
}

/// First `.mp4` URL in an HTML page, normalized to https
pub fn extract_video_url(html: &str) -> Option<String> {
    MP4_URL_RE
        .find(html)
        .and_then(|m| normalize_url(m.as_str()))
}

/// Make a scraped URL directly playable.
///
/// Protocol-relative URLs get an `https:` scheme and the first `http://`
/// prefix is upgraded to `https://`. Anything else passes through.
pub fn normalize_url(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    if url.starts_with("//") {
        return Some(format!("https:{}", url));
    }
    if let Some(rest) = url.strip_prefix("http://") {
        return Some(format!("https://{}", rest));
    }
    Some(url.to_string())
}
