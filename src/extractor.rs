use crate::browser;
use crate::config::Config;
use crate::errors::TrackerError;
use crate::logger::{self, LogTag};
use crate::orchestrator::BalanceSource;
use crate::record::{self, AccountRecord};
use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, Locator};
use std::time::Duration;

const SOL_BALANCE_XPATH: &str = "//div[text()='SOL Balance']/following::div";
const TOKEN_BALANCE_XPATH: &str = "//div[text()='Token Balance']/following::div";

/// Scrapes the two balance fields from the rendered account detail page.
///
/// Owns one browser session that is reused sequentially across the whole
/// run; the driver is not safe for concurrent navigation.
pub struct PageExtractor {
    client: Client,
    base_url: String,
    interstitial_settle: Duration,
    element_wait: Duration,
}

impl PageExtractor {
    pub async fn open(config: &Config) -> Result<Self, TrackerError> {
        let client = browser::connect(&config.webdriver_url, config.headless).await?;
        Ok(Self {
            client,
            base_url: config.main_url.clone(),
            interstitial_settle: config.interstitial_settle(),
            element_wait: config.element_wait(),
        })
    }

    /// Builds the record for one identifier. Missing fields degrade to the
    /// sentinel; only navigation/driver failures surface as errors.
    pub async fn extract(&mut self, account: &str) -> Result<AccountRecord, TrackerError> {
        let mut record = AccountRecord::new(account);
        let url = browser::join_account_url(&self.base_url, account);

        self.client.goto(&url).await?;
        self.bypass_interstitial(&url).await?;

        match self.wait_text(SOL_BALANCE_XPATH).await {
            Ok(text) => {
                logger::debug(LogTag::Browser, &format!("SOL element for {}: {}", account, text));
                if let Some(balance) = record::parse_native_text(&text) {
                    record.sol_balance = balance;
                }
            }
            Err(TrackerError::ExtractionTimeout(_)) => {
                logger::info(
                    LogTag::Browser,
                    &format!("SOL Balance element not found for {}", account),
                );
            }
            Err(e) => return Err(e),
        }

        match self.wait_text(TOKEN_BALANCE_XPATH).await {
            Ok(text) => {
                logger::debug(LogTag::Browser, &format!("SPL element for {}: {}", account, text));
                if let Some((count, usd)) = record::parse_spl_text(&text) {
                    record.spl_count = count;
                    record.spl_usd = usd;
                }
            }
            Err(TrackerError::ExtractionTimeout(_)) => {
                logger::info(
                    LogTag::Browser,
                    &format!("Token Balance element not found for {}", account),
                );
            }
            Err(e) => return Err(e),
        }

        Ok(record)
    }

    /// Works around the "verifying you are human" interstitial: load the
    /// same URL in a second tab, give the challenge time to resolve, close
    /// the tab and switch back to the primary window where the real content
    /// has loaded by then.
    async fn bypass_interstitial(&mut self, url: &str) -> Result<(), TrackerError> {
        let primary = self.client.window().await?;

        let aux = self.client.new_window(true).await?;
        self.client.switch_to_window(aux.handle).await?;

        let navigated = self.client.goto(url).await;
        tokio::time::sleep(self.interstitial_settle).await;
        let closed = self.client.close_window().await;

        // the primary window must be restored even if the aux tab failed
        self.client.switch_to_window(primary).await?;
        navigated?;
        closed?;
        Ok(())
    }

    async fn wait_text(&mut self, xpath: &str) -> Result<String, TrackerError> {
        let found = self
            .client
            .wait()
            .at_most(self.element_wait)
            .for_element(Locator::XPath(xpath))
            .await;

        match found {
            Ok(element) => Ok(element.text().await?),
            Err(CmdError::WaitTimeout) => Err(TrackerError::ExtractionTimeout(xpath.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Releases the browser session. Must run on every exit path of the run
    /// or the driver process leaks.
    pub async fn close(self) {
        if let Err(e) = self.client.close().await {
            logger::warning(
                LogTag::Browser,
                &format!("Failed to close browser session: {}", e),
            );
        }
    }
}

/// Browser transport behind the common source contract. Scrape failures are
/// logged and yield a sentinel record so one identifier never aborts the
/// batch.
pub struct BrowserSource {
    extractor: PageExtractor,
}

impl BrowserSource {
    pub async fn open(config: &Config) -> Result<Self, TrackerError> {
        Ok(Self {
            extractor: PageExtractor::open(config).await?,
        })
    }

    pub async fn close(self) {
        self.extractor.close().await;
    }
}

#[async_trait]
impl BalanceSource for BrowserSource {
    async fn collect(&mut self, account: &str) -> AccountRecord {
        match self.extractor.extract(account).await {
            Ok(record) => record,
            Err(e) => {
                logger::error(
                    LogTag::Browser,
                    &format!("Failed to scrape {}: {}", account, e),
                );
                AccountRecord::new(account)
            }
        }
    }
}
