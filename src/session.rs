use std::sync::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    credential: Option<String>,
    refreshing: bool,
}

/// Shared anti-bot session state with a single-flight refresh guard.
///
/// The clearance cookie starts out absent and is only ever written through
/// the `begin_refresh`/`end_refresh` pair, so at most one acquisition runs
/// at a time and the credential never regresses without a completed refresh.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: Mutex<Inner>,
    refreshed: Notify,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current credential, if any. Non-blocking.
    pub fn read(&self) -> Option<String> {
        self.lock().credential.clone()
    }

    /// Atomically claims the refresh slot.
    ///
    /// Returns true if this caller won the race and must run the acquisition
    /// (and later call `end_refresh`); false if a refresh is already in
    /// flight and the caller should `wait_for_refresh` instead.
    pub fn begin_refresh(&self) -> bool {
        let mut inner = self.lock();
        if inner.refreshing {
            false
        } else {
            inner.refreshing = true;
            true
        }
    }

    /// Installs the refreshed credential and releases the refresh slot.
    ///
    /// `None` means the acquisition failed; the previous credential is kept
    /// so readers never observe a regression. Waiters are woken either way,
    /// otherwise a failed refresh would deadlock every pending fetch.
    pub fn end_refresh(&self, credential: Option<String>) {
        {
            let mut inner = self.lock();
            if credential.is_some() {
                inner.credential = credential;
            }
            inner.refreshing = false;
        }
        self.refreshed.notify_waiters();
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().refreshing
    }

    /// Suspends until no refresh is in flight.
    pub async fn wait_for_refresh(&self) {
        loop {
            let notified = self.refreshed.notified();
            if !self.is_refreshing() {
                return;
            }
            notified.await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
