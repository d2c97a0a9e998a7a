use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};

use crate::metrics::WeeklySummary;
use crate::recorder::RecordError;
use crate::session::{SessionRecord, SessionTotals};
use crate::tick::TickToken;

/// Unified event type consumed by the app runner
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick(TickToken),
    /// Completion of a log write, carrying the totals that were submitted.
    SessionLogged {
        totals: SessionTotals,
        result: Result<SessionRecord, RecordError>,
    },
    SummaryLoaded(Result<WeeklySummary, RecordError>),
}

/// Source of application events (keyboard, resize, ticks, recorder replies)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Channel-backed event source. Every producer (terminal reader, tick thread,
/// recorder replies) holds a clone of the sender.
pub struct ChannelEventSource {
    rx: Receiver<AppEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }

    pub fn channel() -> (Sender<AppEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Forward crossterm key and resize events into the shared channel.
pub fn spawn_terminal_reader(tx: Sender<AppEvent>) {
    std::thread::spawn(move || loop {
        let forwarded = match event::read() {
            Ok(CtEvent::Key(key)) => tx.send(AppEvent::Key(key)),
            Ok(CtEvent::Resize(_, _)) => tx.send(AppEvent::Resize),
            Ok(_) => Ok(()),
            Err(err) => {
                log::error!("terminal event read failed: {err}");
                break;
            }
        };
        if forwarded.is_err() {
            break;
        }
    });
}

/// Runner that advances the application one event at a time
pub struct Runner<E: EventSource> {
    event_source: E,
    poll_interval: Duration,
}

impl<E: EventSource> Runner<E> {
    pub fn new(event_source: E, poll_interval: Duration) -> Self {
        Self {
            event_source,
            poll_interval,
        }
    }

    /// Blocks up to the poll interval; `None` when nothing arrived.
    pub fn step(&self) -> Option<AppEvent> {
        match self.event_source.recv_timeout(self.poll_interval) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
