use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Which transport backs the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Full-browser DOM scrape of the account detail page
    Browser,
    /// Direct API requests carrying the clearance cookie
    Api,
}

/// Named settle/wait settings. The source hard-coded these sleeps; here they
/// are configurable upper bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Upper bound for the clearance cookie to appear after navigation
    pub cookie_settle_secs: u64,
    /// Settle time for the interstitial-challenge workaround tab
    pub interstitial_settle_secs: u64,
    /// Bounded wait for a balance element to render
    pub element_wait_secs: u64,
    /// Per-request timeout on the API path
    pub request_timeout_secs: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            cookie_settle_secs: 10,
            interstitial_settle_secs: 3,
            element_wait_secs: 5,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the account-identifier list, one hash per line
    pub accounts_file: String,
    /// CSV file backing the record store
    pub output_file: String,
    pub transport: Transport,
    /// Account detail page, identifier appended as a path segment
    pub main_url: String,
    /// Landing page used to harvest the clearance cookie
    pub cookies_url: String,
    /// API endpoint templates; `{address}` and `{cluster}` are substituted
    pub api_account_url: String,
    pub api_tokens_url: String,
    /// Cluster qualifier, empty string = default cluster
    #[serde(default)]
    pub cluster: String,
    pub webdriver_url: String,
    pub headless: bool,
    #[serde(default)]
    pub delays: DelayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts_file: "hashes.txt".to_string(),
            output_file: "solscan_results.csv".to_string(),
            transport: Transport::Browser,
            main_url: "https://solscan.io/account/".to_string(),
            cookies_url: "https://solscan.io/account/".to_string(),
            api_account_url: "https://api.solscan.io/v2/account?address={address}&cluster={cluster}"
                .to_string(),
            api_tokens_url:
                "https://api.solscan.io/v2/account/v2/tokens?address={address}&cluster={cluster}"
                    .to_string(),
            cluster: String::new(),
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            delays: DelayConfig::default(),
        }
    }
}

impl Config {
    /// Loads the config file, writing the defaults on first run
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            let default_config = Self::default();
            default_config.save(path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        if config.accounts_file.is_empty() {
            return Err(anyhow::anyhow!(
                "accounts_file is required in config (path to the identifier list)"
            ));
        }

        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path))?;
        Ok(())
    }

    pub fn cookie_settle(&self) -> Duration {
        Duration::from_secs(self.delays.cookie_settle_secs)
    }

    pub fn interstitial_settle(&self) -> Duration {
        Duration::from_secs(self.delays.interstitial_settle_secs)
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.delays.element_wait_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.delays.request_timeout_secs)
    }
}
