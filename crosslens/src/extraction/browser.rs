use anyhow::{anyhow, Context, Result};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{extract_and_classify, ArticleExtractor, ExtractionEngine, ExtractionOutcome, ExtractionSettings};

/// Reads the HTTP status of the main document from the Navigation Timing API.
const RESPONSE_STATUS_JS: &str =
    "(() => { const nav = performance.getEntriesByType('navigation')[0]; return nav ? nav.responseStatus : 0; })()";

/// Headless Chromium engine. Each request gets its own browser process and
/// profile directory.
pub struct BrowserEngine {
    settings: ExtractionSettings,
    chrome_executable: Option<PathBuf>,
}

impl BrowserEngine {
    pub fn new(settings: ExtractionSettings, chrome_executable: Option<PathBuf>) -> Self {
        Self { settings, chrome_executable }
    }
}

#[async_trait::async_trait]
impl ExtractionEngine for BrowserEngine {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn open(&self) -> Result<Box<dyn ArticleExtractor>> {
        let profile_dir = std::env::temp_dir().join(format!("crosslens-browser-{}", uuid::Uuid::new_v4()));

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&profile_dir)
            .request_timeout(self.settings.navigation_timeout)
            .args(vec![
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--disable-extensions",
                "--mute-audio",
                "--no-first-run",
            ]);
        if let Some(bin) = &self.chrome_executable {
            builder = builder.chrome_executable(bin);
        }
        if std::env::var("CI").is_ok() || std::env::var("NO_SANDBOX").is_ok() {
            builder = builder.no_sandbox();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("invalid browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch headless browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            debug!("browser: CDP handler loop exited");
        });

        info!(profile = %profile_dir.display(), "browser: session opened");
        Ok(Box::new(BrowserSession {
            browser: RwLock::new(Some(browser)),
            handler_task,
            profile_dir,
            settings: self.settings.clone(),
        }))
    }
}

/// One launched browser, shared by the concurrent extractions of a request.
///
/// `shutdown` closes it gracefully; dropping the session without shutdown
/// (cancellation, panic) aborts the handler and chromiumoxide kills the child.
pub struct BrowserSession {
    browser: RwLock<Option<Browser>>,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
    settings: ExtractionSettings,
}

impl BrowserSession {
    /// Concurrent extractions share the read lock; only `shutdown` writes.
    async fn new_page(&self) -> Result<Page> {
        let guard = self.browser.read().await;
        let browser = guard.as_ref().context("browser session already closed")?;
        browser
            .new_page("about:blank")
            .await
            .context("failed to open browser page")
    }

    async fn load(&self, page: &Page, url: &str) -> Result<String> {
        page.set_user_agent(self.settings.user_agent.as_str())
            .await
            .context("failed to set user agent")?;
        page.goto(url)
            .await
            .with_context(|| format!("navigation to {} failed", url))?
            .wait_for_navigation()
            .await
            .with_context(|| format!("navigation to {} did not complete", url))?;

        let status = page
            .evaluate(RESPONSE_STATUS_JS)
            .await
            .ok()
            .and_then(|res| res.into_value::<u16>().ok())
            .unwrap_or(0);
        if status >= 400 {
            anyhow::bail!("page returned HTTP status {}", status);
        }

        page.content().await.context("failed to read rendered page")
    }
}

#[async_trait::async_trait]
impl ArticleExtractor for BrowserSession {
    async fn fetch_and_extract(&self, url: &str) -> ExtractionOutcome {
        let page = match self.new_page().await {
            Ok(page) => page,
            Err(e) => return ExtractionOutcome::failed(format!("{:#}", e)),
        };

        let loaded = tokio::time::timeout(self.settings.navigation_timeout, self.load(&page, url)).await;
        if let Err(e) = page.close().await {
            debug!(url, "browser: failed to close page: {}", e);
        }

        let html = match loaded {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                warn!(url, "browser: {:#}", e);
                return ExtractionOutcome::failed(format!("{:#}", e));
            }
            Err(_) => {
                warn!(url, "browser: navigation timed out");
                return ExtractionOutcome::failed(format!(
                    "navigation timed out after {}s",
                    self.settings.navigation_timeout.as_secs()
                ));
            }
        };

        extract_and_classify(html, url, &self.settings.policy).await
    }

    async fn shutdown(&self) {
        if let Some(mut browser) = self.browser.write().await.take() {
            if let Err(e) = browser.close().await {
                warn!("browser: close failed: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("browser: wait for exit failed: {}", e);
            }
        }
        self.handler_task.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!(profile = %self.profile_dir.display(), "browser: profile cleanup failed: {}", e);
        }
        info!("browser: session closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
        if self.profile_dir.exists() {
            let _ = std::fs::remove_dir_all(&self.profile_dir);
        }
    }
}
