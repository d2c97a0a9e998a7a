use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::runtime::AppEvent;

/// Generation id carried by every tick; a tick whose token no longer matches
/// the engine's armed token is stale and must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickToken(pub u64);

/// A periodic one-second callback driving the timer while it runs.
///
/// At most one schedule may be outstanding: `start` on an already active
/// source is ignored, and `cancel` stops delivery before it returns.
pub trait TickSource {
    /// Returns false when no schedule for `token` is running afterwards.
    fn start(&mut self, token: TickToken) -> bool;
    fn cancel(&mut self);
    fn is_active(&self) -> bool;
}

struct ActiveTicker {
    token: TickToken,
    cancelled: Arc<AtomicBool>,
}

/// Production tick source: a background thread posting `AppEvent::Tick`
/// into the application event channel once per period.
pub struct ThreadTickSource {
    events: Sender<AppEvent>,
    period: Duration,
    active: Option<ActiveTicker>,
}

impl ThreadTickSource {
    pub fn new(events: Sender<AppEvent>) -> Self {
        Self::with_period(events, Duration::from_secs(1))
    }

    pub fn with_period(events: Sender<AppEvent>, period: Duration) -> Self {
        Self {
            events,
            period,
            active: None,
        }
    }

    pub fn active_token(&self) -> Option<TickToken> {
        self.active.as_ref().map(|a| a.token)
    }
}

impl TickSource for ThreadTickSource {
    fn start(&mut self, token: TickToken) -> bool {
        if self.active.is_some() {
            log::warn!("tick source already running, ignoring start for {token:?}");
            return false;
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let tx = self.events.clone();
        let period = self.period;

        let spawned = thread::Builder::new()
            .name("studytime-tick".into())
            .spawn(move || {
                // Schedule against absolute deadlines so sleep jitter does not
                // accumulate into a lost second over a long session.
                let mut next = Instant::now() + period;
                loop {
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    }
                    if flag.load(Ordering::SeqCst) {
                        break;
                    }
                    if tx.send(AppEvent::Tick(token)).is_err() {
                        break;
                    }
                    next += period;
                }
            });

        match spawned {
            Ok(_) => {
                self.active = Some(ActiveTicker { token, cancelled });
                true
            }
            Err(err) => {
                log::error!("failed to spawn tick thread: {err}");
                false
            }
        }
    }

    fn cancel(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for ThreadTickSource {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Deterministic tick source for tests: records what the engine asked for and
/// lets the test decide when a tick fires.
#[derive(Debug, Default)]
pub struct ManualTickSource {
    token: Option<TickToken>,
    pub starts: u32,
    pub cancels: u32,
}

impl ManualTickSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<TickToken> {
        self.token
    }
}

impl TickSource for ManualTickSource {
    fn start(&mut self, token: TickToken) -> bool {
        if self.token.is_some() {
            return false;
        }
        self.token = Some(token);
        self.starts += 1;
        true
    }

    fn cancel(&mut self) {
        if self.token.take().is_some() {
            self.cancels += 1;
        }
    }

    fn is_active(&self) -> bool {
        self.token.is_some()
    }
}
