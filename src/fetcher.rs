use crate::config::Config;
use crate::cookies::{AcquireCredential, BrowserAcquirer, CLEARANCE_COOKIE};
use crate::errors::TrackerError;
use crate::logger::{self, LogTag};
use crate::orchestrator::BalanceSource;
use crate::record::AccountRecord;
use crate::session::SessionState;
use async_trait::async_trait;
use reqwest::header::{COOKIE, ORIGIN, REFERER, USER_AGENT};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Hard bound on fetch attempts per identifier
pub const MAX_RETRIES: u32 = 10;

const AU_BE_HEADER: &str = "%10%06yQQwT%07zPY%04%1C";
const UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Apple WebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";
const SITE_ORIGIN: &str = "https://solscan.io";
const SITE_REFERER: &str = "https://solscan.io/";

/// Resolved API endpoints for one run
#[derive(Debug, Clone)]
pub struct FetchEndpoints {
    pub account_url: String,
    pub tokens_url: String,
    pub cookies_url: String,
    pub cluster: String,
    pub request_timeout: Duration,
}

impl FetchEndpoints {
    pub fn from_config(config: &Config) -> Self {
        Self {
            account_url: config.api_account_url.clone(),
            tokens_url: config.api_tokens_url.clone(),
            cookies_url: config.cookies_url.clone(),
            cluster: config.cluster.clone(),
            request_timeout: config.request_timeout(),
        }
    }

    fn expand(&self, template: &str, account: &str) -> String {
        template
            .replace("{address}", account)
            .replace("{cluster}", &self.cluster)
    }
}

/// Per-fetch retry bookkeeping. `refreshed` latches after the first
/// credential refresh of a failure episode so one fetch pays for at most
/// one acquisition.
#[derive(Debug, Default)]
struct RetryContext {
    attempt: u32,
    refreshed: bool,
}

/// Fetches the account and token payloads for one identifier with bounded
/// retry, coordinating credential refresh through the shared session state.
#[derive(Clone)]
pub struct ResilientFetcher {
    http: reqwest::Client,
    session: Arc<SessionState>,
    acquirer: Arc<dyn AcquireCredential + Send + Sync>,
    endpoints: FetchEndpoints,
}

impl ResilientFetcher {
    pub fn new(
        session: Arc<SessionState>,
        acquirer: Arc<dyn AcquireCredential + Send + Sync>,
        endpoints: FetchEndpoints,
    ) -> Result<Self, TrackerError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TrackerError::Setup(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            session,
            acquirer,
            endpoints,
        })
    }

    /// Returns both payloads, or None once the attempt bound (or deadline)
    /// is exhausted. Exhaustion is reported, not fatal.
    pub async fn fetch(
        &self,
        account: &str,
        deadline: Option<Instant>,
    ) -> Option<(Value, Value)> {
        let mut ctx = RetryContext::default();

        while ctx.attempt < MAX_RETRIES {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    logger::warning(
                        LogTag::Fetch,
                        &format!("Deadline reached fetching {}", account),
                    );
                    return None;
                }
            }

            match self.attempt(account).await {
                Ok(pair) => {
                    if ctx.attempt > 0 {
                        logger::info(
                            LogTag::Fetch,
                            &format!("Recovered {} on attempt {}", account, ctx.attempt + 1),
                        );
                    }
                    return Some(pair);
                }
                Err(e) => {
                    logger::debug(
                        LogTag::Fetch,
                        &format!("Attempt {} for {} failed: {}", ctx.attempt + 1, account, e),
                    );
                    self.refresh_credential(&mut ctx).await;
                }
            }

            ctx.attempt += 1;
        }

        logger::warning(
            LogTag::Fetch,
            &format!("Giving up on {} after {} attempts", account, MAX_RETRIES),
        );
        None
    }

    /// One attempt: both requests are issued concurrently and both complete
    /// before the retry decision is made.
    async fn attempt(&self, account: &str) -> Result<(Value, Value), TrackerError> {
        let credential = self.session.read();
        let account_url = self.endpoints.expand(&self.endpoints.account_url, account);
        let tokens_url = self.endpoints.expand(&self.endpoints.tokens_url, account);

        let (account_payload, tokens_payload) = tokio::join!(
            self.get_json(&account_url, credential.as_deref()),
            self.get_json(&tokens_url, credential.as_deref()),
        );
        Ok((account_payload?, tokens_payload?))
    }

    async fn get_json(&self, url: &str, credential: Option<&str>) -> Result<Value, TrackerError> {
        let mut request = self
            .http
            .get(url)
            .timeout(self.endpoints.request_timeout)
            .header("au-be", AU_BE_HEADER)
            .header(REFERER, SITE_REFERER)
            .header(ORIGIN, SITE_ORIGIN)
            .header(USER_AGENT, UA);

        if let Some(credential) = credential {
            request = request.header(COOKIE, format!("{}={}", CLEARANCE_COOKIE, credential));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Transient(format!(
                "{} returned {}",
                url, status
            )));
        }

        Ok(response.json::<Value>().await?)
    }

    /// Single-flight refresh: the first failure of an episode either wins
    /// the refresh slot and runs the acquisition, or waits for the refresh
    /// already in flight. Later failures in the same fetch retry with
    /// whatever credential is installed.
    async fn refresh_credential(&self, ctx: &mut RetryContext) {
        if ctx.refreshed {
            return;
        }

        if self.session.begin_refresh() {
            match self.acquirer.acquire(&self.endpoints.cookies_url).await {
                Ok(credential) => self.session.end_refresh(Some(credential)),
                Err(e) => {
                    logger::warning(LogTag::Session, &format!("Refresh failed: {}", e));
                    self.session.end_refresh(None);
                }
            }
        } else {
            self.session.wait_for_refresh().await;
        }
        ctx.refreshed = true;
    }
}

/// API transport behind the common source contract: fetch both payloads and
/// flatten them into the record shape, degrading missing paths to the
/// sentinel.
pub struct ApiSource {
    fetcher: ResilientFetcher,
}

impl ApiSource {
    pub fn open(config: &Config) -> Result<Self, TrackerError> {
        let session = Arc::new(SessionState::new());
        let acquirer = Arc::new(BrowserAcquirer::new(
            &config.webdriver_url,
            config.headless,
            config.cookie_settle(),
        ));
        let fetcher =
            ResilientFetcher::new(session, acquirer, FetchEndpoints::from_config(config))?;
        Ok(Self { fetcher })
    }

    pub fn with_fetcher(fetcher: ResilientFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl BalanceSource for ApiSource {
    async fn collect(&mut self, account: &str) -> AccountRecord {
        let mut record = AccountRecord::new(account);
        if let Some((account_payload, tokens_payload)) = self.fetcher.fetch(account, None).await {
            apply_account_payload(&mut record, &account_payload);
            apply_tokens_payload(&mut record, &tokens_payload);
        }
        record
    }
}

/// Extracts the native balance from the account payload
pub fn apply_account_payload(record: &mut AccountRecord, payload: &Value) {
    if let Some(lamports) = payload.pointer("/data/lamports").and_then(Value::as_u64) {
        record.sol_balance = format_sol(lamports);
    }
    if let Some(usd) = payload
        .pointer("/data/account_value")
        .or_else(|| payload.pointer("/data/value"))
        .and_then(Value::as_f64)
    {
        record.sol_usd = format!("{:.2}", usd);
    }
}

/// Extracts the sub-token count and USD total from the tokens payload
pub fn apply_tokens_payload(record: &mut AccountRecord, payload: &Value) {
    let tokens = payload
        .pointer("/data/tokens")
        .or_else(|| payload.pointer("/data"))
        .and_then(Value::as_array);

    if let Some(tokens) = tokens {
        record.spl_count = tokens.len().to_string();

        let total: f64 = tokens
            .iter()
            .filter_map(|t| {
                t.pointer("/value")
                    .or_else(|| t.pointer("/valueUsd"))
                    .and_then(Value::as_f64)
            })
            .sum();
        if total > 0.0 {
            record.spl_usd = format!("{:.2}", total);
        }
    }
}

fn format_sol(lamports: u64) -> String {
    let sol = lamports as f64 / 1e9;
    // trim trailing zeros so 12.500000000 renders as 12.5
    let text = format!("{:.9}", sol);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SENTINEL;
    use serde_json::json;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct CountingAcquirer {
        acquisitions: AtomicUsize,
    }

    impl CountingAcquirer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                acquisitions: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AcquireCredential for CountingAcquirer {
        async fn acquire(&self, _url: &str) -> Result<String, TrackerError> {
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            Ok("test-clearance".to_string())
        }
    }

    /// Minimal HTTP stub: the first `fail_first` responses are 503, the rest
    /// 200 with a small JSON body. Returns the bound address and a counter
    /// of served requests.
    async fn spawn_stub_server(fail_first: usize) -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let served = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&served);

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = socket.read(&mut buf).await;
                    let response = if n < fail_first {
                        "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                            .to_string()
                    } else {
                        let body = r#"{"data":{"lamports":12500000000,"account_value":45.67}}"#;
                        format!(
                            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    };
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        (addr, served)
    }

    fn endpoints_for(addr: SocketAddr) -> FetchEndpoints {
        FetchEndpoints {
            account_url: format!("http://{}/account?address={{address}}&cluster={{cluster}}", addr),
            tokens_url: format!("http://{}/tokens?address={{address}}&cluster={{cluster}}", addr),
            cookies_url: format!("http://{}/", addr),
            cluster: String::new(),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn fetcher_with(
        addr: SocketAddr,
        acquirer: Arc<CountingAcquirer>,
    ) -> (ResilientFetcher, Arc<SessionState>) {
        let session = Arc::new(SessionState::new());
        let fetcher = ResilientFetcher::new(
            Arc::clone(&session),
            acquirer as Arc<dyn AcquireCredential + Send + Sync>,
            endpoints_for(addr),
        )
        .unwrap();
        (fetcher, session)
    }

    #[tokio::test]
    async fn test_attempts_are_bounded_and_refresh_runs_once() {
        // every response fails, so the fetch must exhaust its bound
        let (addr, served) = spawn_stub_server(usize::MAX).await;
        let acquirer = CountingAcquirer::new();
        let (fetcher, _session) = fetcher_with(addr, Arc::clone(&acquirer));

        let result = fetcher.fetch("hash-1", None).await;
        assert!(result.is_none());

        // two requests per attempt, MAX_RETRIES attempts
        assert_eq!(
            served.load(Ordering::SeqCst),
            (MAX_RETRIES as usize) * 2
        );
        // one acquisition per failure episode, not one per attempt
        assert_eq!(acquirer.acquisitions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        // first four responses (= two attempts) fail, success on attempt 3
        let (addr, _served) = spawn_stub_server(4).await;
        let acquirer = CountingAcquirer::new();
        let (fetcher, session) = fetcher_with(addr, Arc::clone(&acquirer));

        let (account_payload, tokens_payload) = fetcher
            .fetch("hash-1", None)
            .await
            .expect("fetch should recover");

        assert_eq!(
            account_payload.pointer("/data/lamports").and_then(Value::as_u64),
            Some(12_500_000_000)
        );
        assert!(tokens_payload.is_object());

        // success on attempt 3 after two failures: at most one acquisition
        assert_eq!(acquirer.acquisitions.load(Ordering::SeqCst), 1);
        assert_eq!(session.read(), Some("test-clearance".to_string()));
    }

    #[tokio::test]
    async fn test_expired_deadline_cancels_the_fetch() {
        let (addr, served) = spawn_stub_server(usize::MAX).await;
        let acquirer = CountingAcquirer::new();
        let (fetcher, _session) = fetcher_with(addr, Arc::clone(&acquirer));

        let deadline = Instant::now() - Duration::from_millis(1);
        let result = fetcher.fetch("hash-1", Some(deadline)).await;

        assert!(result.is_none());
        assert_eq!(served.load(Ordering::SeqCst), 0);
        assert_eq!(acquirer.acquisitions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_requests_carry_the_session_cookie() {
        let (addr, _served) = spawn_stub_server(0).await;
        let acquirer = CountingAcquirer::new();
        let (fetcher, session) = fetcher_with(addr, acquirer);

        assert!(session.begin_refresh());
        session.end_refresh(Some("preset-clearance".to_string()));

        // a successful fetch with a preset credential never acquires
        let result = fetcher.fetch("hash-1", None).await;
        assert!(result.is_some());
        assert_eq!(session.read(), Some("preset-clearance".to_string()));
    }

    #[test]
    fn test_apply_account_payload() {
        let mut record = AccountRecord::new("hash");
        let payload = json!({"data": {"lamports": 12_500_000_000u64, "account_value": 45.678}});
        apply_account_payload(&mut record, &payload);
        assert_eq!(record.sol_balance, "12.5");
        assert_eq!(record.sol_usd, "45.68");
    }

    #[test]
    fn test_apply_account_payload_missing_fields_stay_sentinel() {
        let mut record = AccountRecord::new("hash");
        apply_account_payload(&mut record, &json!({"data": {}}));
        assert_eq!(record.sol_balance, SENTINEL);
        assert_eq!(record.sol_usd, SENTINEL);
    }

    #[test]
    fn test_apply_tokens_payload() {
        let mut record = AccountRecord::new("hash");
        let payload = json!({"data": {"tokens": [
            {"value": 12.0},
            {"valueUsd": 33.674},
            {"no_value": true}
        ]}});
        apply_tokens_payload(&mut record, &payload);
        assert_eq!(record.spl_count, "3");
        assert_eq!(record.spl_usd, "45.67");
    }

    #[test]
    fn test_endpoint_expansion() {
        let endpoints = FetchEndpoints {
            account_url: "https://api.example/account?address={address}&cluster={cluster}".into(),
            tokens_url: String::new(),
            cookies_url: String::new(),
            cluster: "devnet".into(),
            request_timeout: Duration::from_secs(1),
        };
        assert_eq!(
            endpoints.expand(&endpoints.account_url, "abc"),
            "https://api.example/account?address=abc&cluster=devnet"
        );
    }
}
