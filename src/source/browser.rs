//! Headless browser sessions for pages that load rows lazily.
//!
//! The session is driven by the caller: open a page, scroll or click until
//! everything is loaded, then [`BrowserSession::snapshot`] the rendered DOM
//! and extract from the snapshot like any static page.

use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;
use crate::error::{ExtractError, Result};
use crate::source::HtmlDocument;

const SESSION_ID: &str = "browser";

pub struct BrowserSession {
    browser: Browser,
    handle: tokio::task::JoinHandle<()>,
    page: Option<Page>,
    scroll_pause: Duration,
    max_scroll_rounds: u32,
}

impl BrowserSession {
    /// Launch a new browser instance.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--disable-extensions")
            .window_size(1920, 1080);
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }
        let chrome_config = builder
            .build()
            .map_err(|e| ExtractError::unavailable(SESSION_ID, format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| ExtractError::unavailable(SESSION_ID, format!("Failed to launch browser: {}", e)))?;

        // The handler must keep being polled for the browser to respond
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {}", e);
                }
            }
        });

        info!("Browser session launched");
        Ok(Self {
            browser,
            handle,
            page: None,
            scroll_pause: Duration::from_millis(config.scroll_pause_ms),
            max_scroll_rounds: config.max_scroll_rounds,
        })
    }

    /// Navigate to `url`, replacing any page opened earlier.
    pub async fn open(&mut self, url: &str) -> Result<()> {
        if let Some(previous) = self.page.take() {
            let _ = previous.close().await;
        }
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| ExtractError::unavailable(url, e))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ExtractError::unavailable(url, e))?;
        info!("Opened {} in browser", url);
        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ExtractError::unavailable(SESSION_ID, "no page open"))
    }

    async fn document_height(&self) -> Result<i64> {
        let result = self
            .page()?
            .evaluate("document.body.scrollHeight")
            .await
            .map_err(|e| ExtractError::unavailable(SESSION_ID, e))?;
        result
            .into_value::<i64>()
            .map_err(|e| ExtractError::unavailable(SESSION_ID, e))
    }

    /// Scroll to the bottom repeatedly until the document stops growing or
    /// the configured round limit is hit. Returns the number of rounds that
    /// loaded more content.
    pub async fn scroll_to_end(&self) -> Result<u32> {
        let mut last_height = self.document_height().await?;
        let mut grew = 0;

        for round in 0..self.max_scroll_rounds {
            self.page()?
                .evaluate("window.scrollTo(0, document.body.scrollHeight)")
                .await
                .map_err(|e| ExtractError::unavailable(SESSION_ID, e))?;
            tokio::time::sleep(self.scroll_pause).await;

            let height = self.document_height().await?;
            debug!("scroll round {}: height {} -> {}", round, last_height, height);
            if height <= last_height {
                return Ok(grew);
            }
            last_height = height;
            grew += 1;
        }

        warn!("Stopped scrolling after {} rounds; page may still be loading rows", self.max_scroll_rounds);
        Ok(grew)
    }

    /// Click the first element matching `selector`, then wait one scroll pause.
    pub async fn click(&self, selector: &str) -> Result<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|e| ExtractError::unavailable(SESSION_ID, format!("'{}' not clickable: {}", selector, e)))?;
        element
            .click()
            .await
            .map_err(|e| ExtractError::unavailable(SESSION_ID, e))?;
        tokio::time::sleep(self.scroll_pause).await;
        Ok(())
    }

    /// Parse the currently rendered DOM.
    pub async fn snapshot(&self) -> Result<HtmlDocument> {
        let page = self.page()?;
        let html = page
            .content()
            .await
            .map_err(|e| ExtractError::unavailable(SESSION_ID, e))?;
        let url = page
            .url()
            .await
            .map_err(|e| ExtractError::unavailable(SESSION_ID, e))?;

        let document = HtmlDocument::parse(&html);
        Ok(match url.as_deref().map(Url::parse) {
            Some(Ok(base)) => document.with_base_url(base),
            _ => document,
        })
    }

    /// Close the browser. Consumes the session.
    pub async fn close(mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        let _ = self.browser.close().await;
        self.handle.abort();
        info!("Browser session closed");
        Ok(())
    }
}
