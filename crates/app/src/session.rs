use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{AppError, Result};
use meter_core::ManualUnit;

/// Interval between sampler fetches.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(2500);

/// Default payload fetched per sampler tick to simulate data consumption.
pub const DEFAULT_FETCH_URL: &str = "https://picsum.photos/400";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch failed: {0}")]
    Request(String),
    #[error("fetch returned status {0}")]
    Status(u16),
}

/// Network collaborator invoked once per sampler tick.
///
/// Called from a blocking task, so implementations may block.
pub trait PayloadFetcher: Send + Sync + 'static {
    fn fetch_payload_size(&self) -> std::result::Result<f64, FetchError>;
}

/// Fetches a fixed-size-ish image over HTTP and reports its byte length.
///
/// A cache-busting timestamp query parameter ensures the payload is actually
/// transferred rather than served from a cache.
pub struct HttpPayloadFetcher {
    url: String,
}

impl HttpPayloadFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for HttpPayloadFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_URL)
    }
}

impl PayloadFetcher for HttpPayloadFetcher {
    fn fetch_payload_size(&self) -> std::result::Result<f64, FetchError> {
        let url = format!(
            "{}?t={}",
            self.url,
            chrono::Utc::now().timestamp_millis()
        );
        let response = ureq::get(&url).call().map_err(|err| match err {
            ureq::Error::StatusCode(code) => FetchError::Status(code),
            other => FetchError::Request(other.to_string()),
        })?;
        let mut body = Vec::new();
        response
            .into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|err| FetchError::Request(err.to_string()))?;
        Ok(body.len() as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Paused,
    Committed,
}

#[derive(Default)]
struct Shared {
    accumulated: f64,
    committed: bool,
    started: bool,
    sampler_running: bool,
    last_error: Option<String>,
}

struct Sampler {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// One bounded interval of usage tracking for a single user.
///
/// Never persisted: the accumulator only reaches durable state through an
/// explicit [`stop`](TrackingSession::stop) followed by reconciliation.
/// Dropping an uncommitted session abandons it without a partial commit.
pub struct TrackingSession {
    user_id: String,
    fetcher: Arc<dyn PayloadFetcher>,
    sample_interval: Duration,
    shared: Arc<Mutex<Shared>>,
    sampler: Option<Sampler>,
}

impl TrackingSession {
    pub fn new(user_id: impl Into<String>, fetcher: Arc<dyn PayloadFetcher>) -> Self {
        Self {
            user_id: user_id.into(),
            fetcher,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            shared: Arc::new(Mutex::new(Shared::default())),
            sampler: None,
        }
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn accumulated(&self) -> f64 {
        self.lock().accumulated
    }

    pub fn is_active(&self) -> bool {
        self.sampler.is_some() && self.lock().sampler_running
    }

    /// The failure that made the sampler self-stop, if any. Cleared on the
    /// next `start`.
    pub fn last_network_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn state(&self) -> SessionState {
        let shared = self.lock();
        if shared.committed {
            SessionState::Committed
        } else if self.sampler.is_some() && shared.sampler_running {
            SessionState::Active
        } else if shared.started {
            SessionState::Paused
        } else {
            SessionState::Idle
        }
    }

    /// Starts the periodic sampler. No-op while already active; rejected
    /// once the session has been committed.
    ///
    /// Each tick performs one fetch and adds the payload size on success.
    /// On failure the sampler self-stops rather than retrying, leaving the
    /// session paused with the cause observable via
    /// [`last_network_error`](TrackingSession::last_network_error). Ticks
    /// are serialized: the next fetch is only issued after the previous one
    /// has resolved.
    pub fn start(&mut self) -> Result<()> {
        {
            let mut shared = self.lock();
            if shared.committed {
                return Err(AppError::InvalidInput(
                    "tracking session already committed".to_string(),
                ));
            }
            if self.sampler.is_some() && shared.sampler_running {
                return Ok(());
            }
            shared.started = true;
            shared.sampler_running = true;
            shared.last_error = None;
        }

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let fetcher = Arc::clone(&self.fetcher);
        let interval = self.sample_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick fires immediately; consume it so the
            // first fetch happens one full interval after start.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                let tick_fetcher = Arc::clone(&fetcher);
                let fetch = tokio::task::spawn_blocking(move || tick_fetcher.fetch_payload_size());
                let outcome = tokio::select! {
                    // Cancellation while a fetch is in flight discards its
                    // result; nothing may accumulate after stop() returns.
                    _ = cancel_rx.changed() => break,
                    outcome = fetch => outcome,
                };
                let mut state = lock_shared(&shared);
                if state.committed || *cancel_rx.borrow() {
                    break;
                }
                match outcome {
                    Ok(Ok(bytes)) => {
                        state.accumulated += bytes.max(0.0);
                    }
                    Ok(Err(err)) => {
                        state.last_error = Some(err.to_string());
                        state.sampler_running = false;
                        return;
                    }
                    Err(join_err) => {
                        state.last_error = Some(join_err.to_string());
                        state.sampler_running = false;
                        return;
                    }
                }
            }
            lock_shared(&shared).sampler_running = false;
        });
        self.sampler = Some(Sampler {
            cancel: cancel_tx,
            handle,
        });
        Ok(())
    }

    /// Adds a manual entry immediately; independent of the sampler's state.
    pub fn add_manual(&mut self, amount: f64, unit: ManualUnit) -> Result<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::InvalidInput(format!(
                "manual amount must be a positive number, got {amount}"
            )));
        }
        let mut shared = self.lock();
        if shared.committed {
            return Err(AppError::InvalidInput(
                "tracking session already committed".to_string(),
            ));
        }
        shared.accumulated += unit.to_bytes(amount);
        Ok(())
    }

    /// Stops the sampler without committing (`Active -> Paused`).
    pub async fn pause(&mut self) {
        self.halt_sampler().await;
    }

    /// Commits the session: cancels the sampler and returns the final
    /// accumulated byte count for reconciliation. Idempotent; repeated calls
    /// just return the accumulation. No accumulation is possible after this
    /// returns.
    pub async fn stop(&mut self) -> f64 {
        self.lock().committed = true;
        self.halt_sampler().await;
        self.lock().accumulated
    }

    async fn halt_sampler(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            let _ = sampler.cancel.send(true);
            let _ = sampler.handle.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock_shared(&self.shared)
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        // Abandon path: discard the sampler and the accumulation.
        if let Some(sampler) = self.sampler.take() {
            sampler.handle.abort();
        }
    }
}
