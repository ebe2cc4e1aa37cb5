use crate::errors::TrackerError;
use crate::logger::{self, LogTag};
use crate::persistence::RecordSink;
use crate::record::AccountRecord;
use async_trait::async_trait;

/// Common contract over the two transports (browser DOM scrape and direct
/// API fetch): produce one record per identifier, degrading missing fields
/// to the sentinel instead of failing.
#[async_trait]
pub trait BalanceSource {
    async fn collect(&mut self, account: &str) -> AccountRecord;
}

#[derive(Debug, Default, PartialEq)]
pub struct RunSummary {
    pub processed: usize,
    pub persisted: usize,
}

/// Drives the identifier list end to end. A failing identifier never aborts
/// the batch; only setup problems (empty input) fail the run.
pub struct Orchestrator<S, K> {
    source: S,
    sink: K,
}

impl<S: BalanceSource, K: RecordSink> Orchestrator<S, K> {
    pub fn new(source: S, sink: K) -> Self {
        Self { source, sink }
    }

    pub async fn run(&mut self, accounts: &[String]) -> Result<RunSummary, TrackerError> {
        if accounts.is_empty() {
            return Err(TrackerError::Setup(
                "no account identifiers to process".to_string(),
            ));
        }

        let mut summary = RunSummary::default();
        for account in accounts {
            logger::info(LogTag::Fetch, &format!("Processing {}", account));

            let record = self.source.collect(account).await;
            summary.processed += 1;

            match self.sink.persist(&record) {
                Ok(()) => summary.persisted += 1,
                Err(e) => logger::error(
                    LogTag::Sheet,
                    &format!("Failed to persist {}: {}", account, e),
                ),
            }
        }

        logger::info(
            LogTag::System,
            &format!(
                "Run complete: {} processed, {} persisted",
                summary.processed, summary.persisted
            ),
        );
        Ok(summary)
    }

    /// Hands the transport back so the caller can release its resources
    /// (browser session) after the run.
    pub fn into_source(self) -> S {
        self.source
    }
}
