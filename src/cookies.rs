use crate::browser;
use crate::errors::TrackerError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use fantoccini::Client;
use std::time::Duration;
use tokio::time::Instant;

/// Cookie issued by the edge protection after the challenge passes
pub const CLEARANCE_COOKIE: &str = "cf_clearance";

const COOKIE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Seam for obtaining a fresh clearance credential.
///
/// The production implementation drives a browser; tests substitute a mock
/// to exercise the single-flight protocol without a driver.
#[async_trait]
pub trait AcquireCredential {
    async fn acquire(&self, url: &str) -> Result<String, TrackerError>;
}

/// Acquires the clearance cookie by letting a real browser pass the
/// challenge flow on the landing page.
pub struct BrowserAcquirer {
    webdriver_url: String,
    headless: bool,
    settle: Duration,
}

impl BrowserAcquirer {
    pub fn new(webdriver_url: &str, headless: bool, settle: Duration) -> Self {
        Self {
            webdriver_url: webdriver_url.to_string(),
            headless,
            settle,
        }
    }

    /// Polls the cookie jar until the clearance cookie shows up, bounded by
    /// the configured settle time.
    async fn harvest(&self, client: &mut Client, url: &str) -> Result<String, TrackerError> {
        client.goto(url).await?;

        let deadline = Instant::now() + self.settle;
        loop {
            for cookie in client.get_all_cookies().await? {
                if cookie.name() == CLEARANCE_COOKIE {
                    return Ok(cookie.value().to_string());
                }
            }
            if Instant::now() >= deadline {
                return Err(TrackerError::Acquisition(format!(
                    "{} cookie not present after {:?}",
                    CLEARANCE_COOKIE, self.settle
                )));
            }
            tokio::time::sleep(COOKIE_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl AcquireCredential for BrowserAcquirer {
    async fn acquire(&self, url: &str) -> Result<String, TrackerError> {
        logger::info(
            LogTag::Session,
            &format!("Acquiring {} via browser at {}", CLEARANCE_COOKIE, url),
        );

        let mut client = browser::connect(&self.webdriver_url, self.headless).await?;
        let harvested = self.harvest(&mut client, url).await;

        // The acquisition session is throwaway; close it on every exit path
        // so failed challenges do not leak browser processes.
        if let Err(e) = client.close().await {
            logger::warning(
                LogTag::Browser,
                &format!("Failed to close acquisition session: {}", e),
            );
        }

        let credential = harvested?;
        logger::info(LogTag::Session, "Clearance cookie acquired");
        Ok(credential)
    }
}
