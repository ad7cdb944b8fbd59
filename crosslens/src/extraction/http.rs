use anyhow::{Context, Result};
use reqwest::Client;
use tracing::warn;

use super::{extract_and_classify, ArticleExtractor, ExtractionEngine, ExtractionOutcome, ExtractionSettings};

/// Plain HTTP engine: no JavaScript rendering, useful where Chromium is not
/// installed or for static article pages.
pub struct HttpEngine {
    settings: ExtractionSettings,
}

impl HttpEngine {
    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl ExtractionEngine for HttpEngine {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn open(&self) -> Result<Box<dyn ArticleExtractor>> {
        let client = Client::builder()
            .timeout(self.settings.navigation_timeout)
            .user_agent(self.settings.user_agent.clone())
            .build()
            .context("failed to build reqwest client")?;
        Ok(Box::new(HttpSession { client, settings: self.settings.clone() }))
    }
}

pub struct HttpSession {
    client: Client,
    settings: ExtractionSettings,
}

impl HttpSession {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.context("failed to fetch article page")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("article fetch failed with status: {}", status);
        }

        response.text().await.context("failed to read response body")
    }
}

#[async_trait::async_trait]
impl ArticleExtractor for HttpSession {
    async fn fetch_and_extract(&self, url: &str) -> ExtractionOutcome {
        match self.fetch(url).await {
            Ok(html) => extract_and_classify(html, url, &self.settings.policy).await,
            Err(e) => {
                warn!(url, "http extraction: {:#}", e);
                ExtractionOutcome::failed(format!("{:#}", e))
            }
        }
    }
}
