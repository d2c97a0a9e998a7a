//! Session recorder: durable writes of finished sessions and the weekly
//! summary query, plus a worker-thread handle so neither blocks the UI loop.

use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use crate::metrics::{summarize_week, window_cutoff, WeeklySummary};
use crate::session::{SessionKind, SessionRecord, SessionTotals};
use crate::store::{storage_timestamp, SessionStore, StoreError};

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("nothing to log: the session has no study time")]
    EmptySession,

    #[error("failed to save: {0}")]
    Store(#[from] StoreError),

    #[error("failed to start recorder worker: {0}")]
    Spawn(std::io::Error),

    #[error("recorder worker is not running")]
    WorkerGone,
}

pub struct SessionRecorder<S: SessionStore> {
    store: S,
}

impl<S: SessionStore> SessionRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append one record. Zero-time sessions are refused before touching the store.
    pub fn log_session<Tz: TimeZone>(
        &mut self,
        time_secs: u64,
        blocks: u32,
        timestamp: &DateTime<Tz>,
        kind: SessionKind,
    ) -> Result<SessionRecord, RecordError> {
        if time_secs == 0 {
            return Err(RecordError::EmptySession);
        }

        let timestamp = storage_timestamp(&timestamp.with_timezone(&Utc));
        match self.store.insert(time_secs, blocks, &timestamp, kind) {
            Ok(id) => {
                log::info!("logged {kind} session {id}: {time_secs}s, {blocks} blocks");
                Ok(SessionRecord {
                    id,
                    time: time_secs,
                    blocks,
                    timestamp,
                    kind,
                })
            }
            Err(err) => {
                log::error!("failed to log {kind} session of {time_secs}s: {err}");
                Err(err.into())
            }
        }
    }

    pub fn log_totals<Tz: TimeZone>(
        &mut self,
        totals: &SessionTotals,
        timestamp: &DateTime<Tz>,
    ) -> Result<SessionRecord, RecordError> {
        self.log_session(totals.time_secs, totals.blocks, timestamp, totals.kind)
    }

    pub fn weekly_summary<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<WeeklySummary, RecordError> {
        let records = self
            .store
            .sessions_since(&window_cutoff(now))
            .inspect_err(|err| log::error!("failed to read weekly sessions: {err}"))?;
        Ok(summarize_week(&records, now))
    }

    pub fn sessions_since(&self, cutoff: &DateTime<Utc>) -> Result<Vec<SessionRecord>, RecordError> {
        Ok(self.store.sessions_since(cutoff)?)
    }

    pub fn close(mut self) -> Result<(), RecordError> {
        Ok(self.store.close()?)
    }
}

type BoxedRecorder = SessionRecorder<Box<dyn SessionStore>>;
type RecorderJob = Box<dyn FnOnce(&mut BoxedRecorder) + Send + 'static>;

enum RecorderCommand {
    Run(RecorderJob),
    Shutdown,
}

struct RecorderInner {
    sender: mpsc::Sender<RecorderCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for RecorderInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(RecorderCommand::Shutdown) {
                log::error!("failed to send shutdown to recorder thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                log::error!("failed to join recorder thread: {join_err:?}");
            }
        }
    }
}

/// Runs a [`SessionRecorder`] on its own thread. Calls return immediately and
/// deliver their result to a reply callback on the worker thread.
#[derive(Clone)]
pub struct RecorderHandle {
    inner: Arc<RecorderInner>,
}

impl RecorderHandle {
    pub fn spawn(store: Box<dyn SessionStore>) -> Result<Self, RecordError> {
        let (tx, rx) = mpsc::channel::<RecorderCommand>();

        let worker = thread::Builder::new()
            .name("studytime-recorder".into())
            .spawn(move || {
                let mut recorder = SessionRecorder::new(store);
                while let Ok(command) = rx.recv() {
                    match command {
                        RecorderCommand::Run(job) => job(&mut recorder),
                        RecorderCommand::Shutdown => break,
                    }
                }
                if let Err(err) = recorder.close() {
                    log::error!("failed to close session store: {err}");
                }
                log::debug!("recorder thread shutting down");
            })
            .map_err(RecordError::Spawn)?;

        Ok(Self {
            inner: Arc::new(RecorderInner {
                sender: tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub fn execute<F, T, R>(&self, task: F, reply: R) -> Result<(), RecordError>
    where
        F: FnOnce(&mut BoxedRecorder) -> T + Send + 'static,
        R: FnOnce(T) + Send + 'static,
        T: 'static,
    {
        let job: RecorderJob = Box::new(move |recorder| reply(task(recorder)));
        self.inner
            .sender
            .send(RecorderCommand::Run(job))
            .map_err(|_| RecordError::WorkerGone)
    }

    pub fn log_session<Tz, R>(
        &self,
        totals: SessionTotals,
        timestamp: DateTime<Tz>,
        reply: R,
    ) -> Result<(), RecordError>
    where
        Tz: TimeZone + Send + 'static,
        Tz::Offset: Send,
        R: FnOnce(Result<SessionRecord, RecordError>) + Send + 'static,
    {
        self.execute(
            move |recorder| recorder.log_totals(&totals, &timestamp),
            reply,
        )
    }

    pub fn weekly_summary<Tz, R>(&self, now: DateTime<Tz>, reply: R) -> Result<(), RecordError>
    where
        Tz: TimeZone + Send + 'static,
        Tz::Offset: Send,
        R: FnOnce(Result<WeeklySummary, RecordError>) + Send + 'static,
    {
        self.execute(move |recorder| recorder.weekly_summary(&now), reply)
    }

    pub fn log_session_blocking<Tz>(
        &self,
        totals: SessionTotals,
        timestamp: DateTime<Tz>,
    ) -> Result<SessionRecord, RecordError>
    where
        Tz: TimeZone + Send + 'static,
        Tz::Offset: Send,
    {
        let (tx, rx) = mpsc::channel();
        self.log_session(totals, timestamp, move |result| {
            let _ = tx.send(result);
        })?;
        rx.recv().map_err(|_| RecordError::WorkerGone)?
    }

    pub fn weekly_summary_blocking<Tz>(&self, now: DateTime<Tz>) -> Result<WeeklySummary, RecordError>
    where
        Tz: TimeZone + Send + 'static,
        Tz::Offset: Send,
    {
        let (tx, rx) = mpsc::channel();
        self.weekly_summary(now, move |result| {
            let _ = tx.send(result);
        })?;
        rx.recv().map_err(|_| RecordError::WorkerGone)?
    }
}
