use thiserror::Error;

/// Error taxonomy for the tracker.
///
/// Per-identifier failures (`Transient`, `Acquisition`, `ExtractionTimeout`,
/// `Persistence`) are contained at the identifier boundary by the
/// orchestrator; only `Setup` aborts the run.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Credential acquisition failed: {0}")]
    Acquisition(String),

    #[error("Transient fetch error: {0}")]
    Transient(String),

    #[error("Timed out waiting for page element: {0}")]
    ExtractionTimeout(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebDriver error: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrackerError {
    /// Whether a retry with the same inputs can reasonably succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TrackerError::Transient(_)
                | TrackerError::Acquisition(_)
                | TrackerError::ExtractionTimeout(_)
                | TrackerError::Http(_)
        )
    }
}
