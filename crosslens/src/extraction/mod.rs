//! Article extraction: page loading, readable-text isolation and outcome
//! classification.
//!
//! Extraction never fails a request. Every URL resolves to an
//! [`ExtractionOutcome`], and callers decide how degraded outcomes are used
//! (see [`crate::fallback`]).

use anyhow::{Context, Result};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use common::ExtractionConfig;

pub mod browser;
pub mod http;

/// Wrap width used when converting the readable HTML block to text.
const TEXT_WIDTH: usize = 100;

pub const DEFAULT_MIN_TEXT_CHARS: usize = 300;
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const MAX_CONCURRENCY_CAP: usize = 10;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const DEFAULT_PAYWALL_MARKERS: &[&str] = &[
    "subscribe to continue reading",
    "subscribe to read",
    "already a subscriber",
    "abbonati per continuare",
    "riservato agli abbonati",
    "verify you are human",
    "are you a robot",
    "enable javascript and cookies to continue",
    "access denied",
];

/// A URL to extract, with the metadata already known from search.
/// Identity is the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTarget {
    pub url: String,
    pub source: String,
    pub domain: String,
    pub title: String,
    pub snippet: String,
}

/// Result of extracting one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// Readable article text.
    Success { text: String },
    /// Something came back but looks truncated or blocked.
    Partial { text: String, reason: String },
    /// Navigation or extraction failed outright.
    Failed { reason: String },
}

impl ExtractionOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed { reason: reason.into() }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Partial { .. } => "partial",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Thresholds deciding when extracted text counts as a full article.
#[derive(Debug, Clone)]
pub struct ExtractionPolicy {
    pub min_text_chars: usize,
    /// Lowercased markers of paywalls and bot checks
    pub paywall_markers: Vec<String>,
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self {
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            paywall_markers: DEFAULT_PAYWALL_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl ExtractionPolicy {
    pub fn from_config(cfg: &ExtractionConfig) -> Self {
        let defaults = Self::default();
        Self {
            min_text_chars: cfg.min_text_chars.unwrap_or(defaults.min_text_chars),
            paywall_markers: cfg
                .paywall_markers
                .as_ref()
                .map(|markers| markers.iter().map(|m| m.trim().to_lowercase()).filter(|m| !m.is_empty()).collect())
                .unwrap_or(defaults.paywall_markers),
        }
    }

    /// Classify extracted text.
    pub fn classify(&self, text: &str) -> ExtractionOutcome {
        let text = text.trim();
        if text.is_empty() {
            return ExtractionOutcome::failed("article body could not be extracted");
        }

        let lowered = text.to_lowercase();
        if let Some(marker) = self.paywall_markers.iter().find(|m| lowered.contains(m.as_str())) {
            return ExtractionOutcome::Partial {
                text: text.to_string(),
                reason: format!("paywall or bot-check marker '{}'", marker),
            };
        }

        let chars = text.chars().count();
        if chars < self.min_text_chars {
            return ExtractionOutcome::Partial {
                text: text.to_string(),
                reason: format!("extracted {} chars, below minimum of {}", chars, self.min_text_chars),
            };
        }

        ExtractionOutcome::Success { text: text.to_string() }
    }
}

/// Settings shared by every engine.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub navigation_timeout: Duration,
    pub user_agent: String,
    pub policy: ExtractionPolicy,
}

impl ExtractionSettings {
    pub fn from_config(cfg: &ExtractionConfig) -> Self {
        Self {
            navigation_timeout: Duration::from_secs(
                cfg.navigation_timeout_secs.unwrap_or(DEFAULT_NAVIGATION_TIMEOUT_SECS),
            ),
            user_agent: cfg.user_agent.clone().unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            policy: ExtractionPolicy::from_config(cfg),
        }
    }
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

/// Extracts one URL at a time inside an open session.
#[async_trait::async_trait]
pub trait ArticleExtractor: Send + Sync {
    async fn fetch_and_extract(&self, url: &str) -> ExtractionOutcome;

    /// Release session resources. Called once after the batch.
    async fn shutdown(&self) {}
}

/// Opens per-request extraction sessions.
#[async_trait::async_trait]
pub trait ExtractionEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn open(&self) -> Result<Box<dyn ArticleExtractor>>;
}

/// Stand-in session used when the engine could not be opened: every URL fails
/// with the same reason.
pub struct UnavailableExtractor {
    reason: String,
}

impl UnavailableExtractor {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait::async_trait]
impl ArticleExtractor for UnavailableExtractor {
    async fn fetch_and_extract(&self, _url: &str) -> ExtractionOutcome {
        ExtractionOutcome::failed(self.reason.clone())
    }
}

/// Build the engine selected by `extraction.engine` (default "browser").
pub fn engine_from_config(cfg: &ExtractionConfig) -> Result<Arc<dyn ExtractionEngine>> {
    let settings = ExtractionSettings::from_config(cfg);
    match cfg.engine.as_deref().unwrap_or("browser") {
        "browser" => Ok(Arc::new(browser::BrowserEngine::new(
            settings,
            cfg.chrome_executable.clone().map(Into::into),
        ))),
        "http" => Ok(Arc::new(http::HttpEngine::new(settings))),
        other => anyhow::bail!("Unknown extraction engine: {}", other),
    }
}

/// Isolate the main content block of `html` and render it as plain text.
///
/// CPU-bound; async callers should run it on the blocking pool.
pub fn readable_text(html: &str, url: &str) -> Result<String> {
    let url_obj = url::Url::parse(url).context("failed to parse article URL")?;
    let mut reader = Cursor::new(html.as_bytes());

    let product = readability::extractor::extract(&mut reader, &url_obj)
        .map_err(|e| anyhow::anyhow!("readability failed: {}", e))?;

    match html2text::from_read(product.content.as_bytes(), TEXT_WIDTH) {
        Ok(text) => {
            info!("extraction: readability kept {} chars from {}", text.len(), url);
            Ok(text)
        }
        Err(e) => {
            warn!("extraction: html2text failed for {}: {}, using plain text", url, e);
            Ok(product.text)
        }
    }
}

/// Run [`readable_text`] off the async workers and classify the result.
pub(crate) async fn extract_and_classify(
    html: String,
    url: &str,
    policy: &ExtractionPolicy,
) -> ExtractionOutcome {
    let owned_url = url.to_string();
    let joined = tokio::task::spawn_blocking(move || readable_text(&html, &owned_url)).await;
    match joined {
        Ok(Ok(text)) => policy.classify(&text),
        Ok(Err(e)) => ExtractionOutcome::failed(format!("{:#}", e)),
        Err(e) => ExtractionOutcome::failed(format!("extraction task failed: {}", e)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine answering from a fixed URL → outcome table; unknown URLs fail.
    #[derive(Default)]
    pub struct TableEngine {
        pub outcomes: HashMap<String, ExtractionOutcome>,
        pub fail_open: bool,
        pub opened: Arc<AtomicUsize>,
        pub closed: Arc<AtomicUsize>,
    }

    impl TableEngine {
        pub fn with(mut self, url: &str, outcome: ExtractionOutcome) -> Self {
            self.outcomes.insert(url.to_string(), outcome);
            self
        }
    }

    struct TableSession {
        outcomes: HashMap<String, ExtractionOutcome>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ArticleExtractor for TableSession {
        async fn fetch_and_extract(&self, url: &str) -> ExtractionOutcome {
            self.outcomes
                .get(url)
                .cloned()
                .unwrap_or_else(|| ExtractionOutcome::failed("navigation failed: net::ERR_NAME_NOT_RESOLVED"))
        }

        async fn shutdown(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl ExtractionEngine for TableEngine {
        fn name(&self) -> &'static str {
            "table"
        }

        async fn open(&self) -> Result<Box<dyn ArticleExtractor>> {
            if self.fail_open {
                anyhow::bail!("failed to launch headless browser");
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(TableSession {
                outcomes: self.outcomes.clone(),
                closed: self.closed.clone(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(min: usize) -> ExtractionPolicy {
        ExtractionPolicy { min_text_chars: min, ..ExtractionPolicy::default() }
    }

    #[test]
    fn long_text_is_success() {
        let text = "Il vertice si è concluso senza accordo. ".repeat(20);
        assert!(matches!(policy(100).classify(&text), ExtractionOutcome::Success { .. }));
    }

    #[test]
    fn short_text_is_partial() {
        match policy(100).classify("  Breve.  ") {
            ExtractionOutcome::Partial { text, reason } => {
                assert_eq!(text, "Breve.");
                assert!(reason.contains("below minimum"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn paywall_marker_is_partial_regardless_of_length() {
        let text = format!("{} Subscribe to continue reading.", "word ".repeat(200));
        match policy(10).classify(&text) {
            ExtractionOutcome::Partial { reason, .. } => assert!(reason.contains("subscribe")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn empty_text_is_failed() {
        assert_eq!(policy(10).classify(" \n ").label(), "failed");
    }

    #[test]
    fn configured_markers_replace_defaults() {
        let cfg = ExtractionConfig {
            min_text_chars: Some(5),
            paywall_markers: Some(vec![" Solo Per Abbonati ".into(), "".into()]),
            ..Default::default()
        };
        let policy = ExtractionPolicy::from_config(&cfg);
        assert_eq!(policy.paywall_markers, vec!["solo per abbonati"]);
        assert_eq!(policy.classify("Contenuto solo per abbonati").label(), "partial");
        assert_eq!(policy.classify("Access denied to nothing here").label(), "success");
    }

    #[test]
    fn readable_text_keeps_article_body() {
        let body = "<p>The summit in Alaska ended without a ceasefire agreement, officials said.</p>".repeat(8);
        let html = format!(
            "<html><head><title>Summit</title></head><body>\
             <nav><a href=\"/\">Home</a><a href=\"/world\">World</a></nav>\
             <article><h1>Summit ends</h1>{}</article>\
             <footer>Copyright</footer></body></html>",
            body
        );
        let text = readable_text(&html, "https://news.example.com/summit").unwrap();
        assert!(text.contains("ceasefire agreement"));
    }

    #[test]
    fn readable_text_rejects_bad_url() {
        assert!(readable_text("<html></html>", "not a url").is_err());
    }

    #[test]
    fn unknown_engine_is_rejected() {
        let cfg = ExtractionConfig { engine: Some("lynx".into()), ..Default::default() };
        assert!(engine_from_config(&cfg).is_err());
        let cfg = ExtractionConfig { engine: Some("http".into()), ..Default::default() };
        assert_eq!(engine_from_config(&cfg).unwrap().name(), "http");
        assert_eq!(engine_from_config(&ExtractionConfig::default()).unwrap().name(), "browser");
    }
}
