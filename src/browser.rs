use crate::errors::TrackerError;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;

/// Opens a WebDriver session against a running chromedriver.
///
/// Popup blocking is disabled because the interstitial workaround and the
/// cookie harvest both rely on opening auxiliary tabs.
pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Client, TrackerError> {
    let mut args = vec!["--disable-popup-blocking".to_string()];
    if headless {
        args.push("--headless=new".to_string());
    }

    let mut caps = serde_json::map::Map::new();
    caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

    ClientBuilder::native()
        .capabilities(caps)
        .connect(webdriver_url)
        .await
        .map_err(|e| {
            TrackerError::Setup(format!(
                "failed to start WebDriver session at {}: {}",
                webdriver_url, e
            ))
        })
}

/// Joins the detail-page base URL with an account identifier as a path
/// segment. The identifier is appended as-is, without re-encoding.
pub fn join_account_url(base: &str, account: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, account)
    } else {
        format!("{}/{}", base, account)
    }
}
