use crate::client::VoteBackend;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::VoteTally;
use crate::voting::{self, DisplaySnapshot, RenderUpdate};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

const DEFAULT_INTERVAL_MS: u64 = 2000; // Refresh every 2 seconds
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub interval: Duration,
    pub failure_threshold: u32,
    /// Upper bound on a single fetch; `None` waits as long as the transport does.
    pub fetch_timeout: Option<Duration>,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            fetch_timeout: Some(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS)),
        }
    }
}

impl From<&Config> for PollerSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.poll_interval,
            failure_threshold: config.failure_threshold,
            fetch_timeout: config.fetch_timeout,
        }
    }
}

/// What the poller tells its owner. It never touches the view itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Fresh results, with change flags against the previous render.
    Rendered(RenderUpdate),
    /// Consecutive failures reached the threshold; show the connection banner.
    Degraded { consecutive_failures: u32 },
    /// The connection banner can go away again.
    Restored,
}

// Public, copyable view of the poll state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStatus {
    pub active: bool,
    pub is_fetching: bool,
    pub consecutive_failures: u32,
    pub degraded: bool,
}

#[derive(Default)]
struct PollState {
    active: bool,
    // Bumped by every stop(); cycles from an older epoch are stale
    epoch: u64,
    is_fetching: bool,
    consecutive_failures: u32,
    degraded: bool,
    last_snapshot: Option<DisplaySnapshot>,
}

struct Shared {
    backend: Arc<dyn VoteBackend>,
    events: UnboundedSender<PollEvent>,
    settings: PollerSettings,
    state: Mutex<PollState>,
}

/// Periodically fetches the results and renders them, one cycle at a time.
pub struct ResultsPoller {
    shared: Arc<Shared>,
    timer: Option<JoinHandle<()>>,
}

impl ResultsPoller {
    pub fn new(
        backend: Arc<dyn VoteBackend>,
        events: UnboundedSender<PollEvent>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                events,
                settings,
                state: Mutex::new(PollState::default()),
            }),
            timer: None,
        }
    }

    /// Fire one cycle now and keep refreshing on the configured interval.
    /// Calling it while already running restarts the timer.
    pub fn start(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let epoch = {
            let mut state = self.shared.state();
            state.active = true;
            state.epoch
        };

        let period = self.shared.settings.interval;
        info!("Starting results refresh every {:?}", period);

        // Immediate cycle
        Shared::spawn_cycle(&self.shared, epoch);

        let shared = Arc::clone(&self.shared);
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await; // Wait for the next interval tick
                // Each cycle runs on its own task so stop() can leave it to finish
                Shared::spawn_cycle(&shared, epoch);
            }
        }));
    }

    /// Cancel the timer, forget failures and drop the degraded signal.
    /// Safe to call when not started.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            info!("Results refresh stopped");
        }

        let was_degraded = {
            let mut state = self.shared.state();
            state.active = false;
            state.epoch = state.epoch.wrapping_add(1);
            state.consecutive_failures = 0;
            std::mem::replace(&mut state.degraded, false)
        };

        if was_degraded {
            self.shared.emit(PollEvent::Restored);
        }
    }

    /// Run one fetch-and-render cycle on the caller's task. Returns at once
    /// if another cycle is in flight or the poller is not started.
    pub async fn run_cycle(&self) {
        let epoch = self.shared.state().epoch;
        self.shared.run_cycle(epoch).await;
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn status(&self) -> PollStatus {
        let state = self.shared.state();
        PollStatus {
            active: state.active,
            is_fetching: state.is_fetching,
            consecutive_failures: state.consecutive_failures,
            degraded: state.degraded,
        }
    }
}

impl Drop for ResultsPoller {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: PollEvent) {
        // The receiver going away just means nobody is watching any more
        if self.events.send(event).is_err() {
            debug!("Poll event dropped, receiver closed");
        }
    }

    fn spawn_cycle(shared: &Arc<Shared>, epoch: u64) {
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            shared.run_cycle(epoch).await;
        });
    }

    async fn run_cycle(&self, epoch: u64) {
        let Some(_in_flight) = InFlight::acquire(self, epoch) else {
            return;
        };

        let outcome = self.fetch().await;

        let mut state = self.state();
        if !state.active || state.epoch != epoch {
            debug!("Discarding results of a cycle that outlived its poller");
            return;
        }

        match outcome {
            Ok(tally) => {
                let update = voting::render(&tally, state.last_snapshot.as_ref());
                state.last_snapshot = Some(update.snapshot.clone());
                state.consecutive_failures = 0; // Reset retry count on success
                let was_degraded = std::mem::replace(&mut state.degraded, false);
                drop(state);

                self.emit(PollEvent::Rendered(update));
                if was_degraded {
                    info!("Results connection restored");
                    self.emit(PollEvent::Restored);
                }
            }
            Err(e) => {
                error!("Error updating results: {}", e);
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                let failures = state.consecutive_failures;
                let threshold = self.settings.failure_threshold;

                if failures >= threshold {
                    if !state.degraded {
                        state.degraded = true;
                        drop(state);
                        warn!("Failed to update results after {} attempts", threshold);
                        self.emit(PollEvent::Degraded {
                            consecutive_failures: failures,
                        });
                    }
                } else {
                    info!("Retry {}/{} for results update", failures, threshold);
                }
            }
        }
    }

    async fn fetch(&self) -> Result<VoteTally> {
        match self.settings.fetch_timeout {
            Some(limit) => timeout(limit, self.backend.fetch_results())
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => self.backend.fetch_results().await,
        }
    }
}

// Holds the in-flight marker for the lifetime of a cycle, including when the
// cycle's future is dropped half way.
struct InFlight<'a> {
    shared: &'a Shared,
}

impl<'a> InFlight<'a> {
    fn acquire(shared: &'a Shared, epoch: u64) -> Option<Self> {
        let mut state = shared.state();
        if !state.active || state.epoch != epoch {
            return None;
        }
        if state.is_fetching {
            debug!("Results update already in flight, skipping");
            return None;
        }
        state.is_fetching = true;
        Some(Self { shared })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.shared.state().is_fetching = false;
    }
}
