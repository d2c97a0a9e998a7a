//! Terminal-independent application state: maps keys to timer actions,
//! owns the reset prompt and the in-flight log write, and tracks which
//! screen is showing.

use std::sync::mpsc::Sender;

use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::format::{format_clock, TimeFormat};
use crate::metrics::WeeklySummary;
use crate::recorder::{RecordError, RecorderHandle};
use crate::runtime::AppEvent;
use crate::session::{SessionRecord, SessionTotals};
use crate::tick::TickSource;
use crate::timer::{Phase, ResetRequest, RunState, TickOutcome, TimerEngine};

const SAVING_NOTICE: &str = "Still saving the previous session...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Timer,
    Metrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    ConfirmReset(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ToggleRun,
    RequestReset,
    ConfirmReset,
    CancelReset,
    LogSession,
    IncreaseDuration,
    DecreaseDuration,
    DefaultDuration,
    SelectPhase(Phase),
    ShowMetrics,
    ShowTimer,
    RefreshSummary,
    Quit,
}

pub struct App<T: TickSource> {
    pub engine: TimerEngine<T>,
    pub screen: Screen,
    pub modal: Option<Modal>,
    pub notice: Option<String>,
    pub summary: Option<WeeklySummary>,
    pub time_format: TimeFormat,
    recorder: RecorderHandle,
    events: Sender<AppEvent>,
    pending_log: Option<SessionTotals>,
    summary_loading: bool,
    quit_armed: bool,
    should_quit: bool,
}

impl<T: TickSource> App<T> {
    pub fn new(
        engine: TimerEngine<T>,
        recorder: RecorderHandle,
        events: Sender<AppEvent>,
        time_format: TimeFormat,
    ) -> Self {
        Self {
            engine,
            screen: Screen::Timer,
            modal: None,
            notice: None,
            summary: None,
            time_format,
            recorder,
            events,
            pending_log: None,
            summary_loading: false,
            quit_armed: false,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn is_saving(&self) -> bool {
        self.pending_log.is_some()
    }

    pub fn is_loading_summary(&self) -> bool {
        self.summary_loading
    }

    /// Returns true when the screen needs redrawing.
    pub fn handle_event(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Key(key) => {
                if let Some(action) = self.action_for_key(key) {
                    self.apply(action);
                }
                true
            }
            AppEvent::Resize => true,
            AppEvent::Tick(token) => self.on_tick(token),
            AppEvent::SessionLogged { totals, result } => {
                self.on_session_logged(totals, result);
                true
            }
            AppEvent::SummaryLoaded(result) => {
                self.on_summary_loaded(result);
                true
            }
        }
    }

    pub fn action_for_key(&self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }

        if self.modal.is_some() {
            return match key.code {
                KeyCode::Char('y') | KeyCode::Enter => Some(Action::ConfirmReset),
                KeyCode::Char('n') | KeyCode::Esc => Some(Action::CancelReset),
                _ => None,
            };
        }

        match self.screen {
            Screen::Timer => match key.code {
                KeyCode::Char(' ') => Some(Action::ToggleRun),
                KeyCode::Char('r') => Some(Action::RequestReset),
                KeyCode::Char('l') => Some(Action::LogSession),
                KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Up => {
                    Some(Action::IncreaseDuration)
                }
                KeyCode::Char('-') | KeyCode::Down => Some(Action::DecreaseDuration),
                KeyCode::Char('d') => Some(Action::DefaultDuration),
                KeyCode::Char('s') => Some(Action::SelectPhase(Phase::Studying)),
                KeyCode::Char('b') => Some(Action::SelectPhase(Phase::Break)),
                KeyCode::Char('m') | KeyCode::Tab => Some(Action::ShowMetrics),
                KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
                _ => None,
            },
            Screen::Metrics => match key.code {
                KeyCode::Char('r') => Some(Action::RefreshSummary),
                KeyCode::Char('t') | KeyCode::Tab | KeyCode::Backspace => Some(Action::ShowTimer),
                KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
                _ => None,
            },
        }
    }

    pub fn apply(&mut self, action: Action) {
        if action != Action::Quit {
            self.quit_armed = false;
        }

        match action {
            Action::ToggleRun => {
                let was_running = self.engine.run_state() == RunState::Running;
                if !self.engine.toggle() && !was_running {
                    self.notice =
                        Some("Could not start the timer, see the log for details".to_string());
                }
            }
            Action::RequestReset => {
                // A reply landing after a reset would wipe time counted since.
                if self.pending_log.is_some() {
                    self.notice = Some(SAVING_NOTICE.to_string());
                } else if let ResetRequest::Confirm(message) = self.engine.request_reset() {
                    self.modal = Some(Modal::ConfirmReset(message));
                }
            }
            Action::ConfirmReset => {
                if self.modal.take().is_none() {
                    return;
                }
                if self.pending_log.is_some() {
                    self.notice = Some(SAVING_NOTICE.to_string());
                } else if self.engine.confirm_reset() {
                    self.notice = Some("Timer reset".to_string());
                }
            }
            Action::CancelReset => {
                self.modal = None;
            }
            Action::LogSession => self.log_session(),
            Action::IncreaseDuration => {
                self.engine.increment_duration();
            }
            Action::DecreaseDuration => {
                self.engine.decrement_duration();
            }
            Action::DefaultDuration => {
                self.engine.reset_duration_to_default();
            }
            Action::SelectPhase(phase) => {
                self.engine.select_phase(phase);
            }
            Action::ShowMetrics => {
                if self.engine.suspend() {
                    self.notice = Some("Timer paused".to_string());
                }
                self.screen = Screen::Metrics;
                self.request_summary();
            }
            Action::ShowTimer => {
                self.screen = Screen::Timer;
            }
            Action::RefreshSummary => self.request_summary(),
            Action::Quit => self.quit(),
        }
    }

    fn quit(&mut self) {
        self.engine.suspend();
        if self.quit_armed {
            self.should_quit = true;
            return;
        }

        // Time already handed to the recorder is not unlogged.
        let in_flight = self.pending_log.map_or(0, |totals| totals.time_secs);
        let unlogged = self
            .engine
            .state()
            .session_elapsed_secs
            .saturating_sub(in_flight);
        if unlogged > 0 {
            self.quit_armed = true;
            self.notice = Some(format!(
                "{} of study time is not logged. Press (l) to log or quit again to discard.",
                format_clock(unlogged, self.time_format)
            ));
        } else if self.is_saving() {
            self.quit_armed = true;
            self.notice = Some(
                "Session is still saving and will finish on exit. Quit again to leave.".to_string(),
            );
        } else {
            self.should_quit = true;
        }
    }

    fn on_tick(&mut self, token: crate::tick::TickToken) -> bool {
        match self.engine.on_tick(token) {
            TickOutcome::Ignored => false,
            TickOutcome::Counted => true,
            TickOutcome::PhaseChanged { to, .. } => {
                self.notice = Some(match to {
                    Phase::Break => "Block complete. Take a break!".to_string(),
                    Phase::Studying => "Break over. Back to studying.".to_string(),
                });
                true
            }
        }
    }

    fn log_session(&mut self) {
        if self.pending_log.is_some() {
            self.notice = Some(SAVING_NOTICE.to_string());
            return;
        }
        let Some(totals) = self.engine.session_totals() else {
            return;
        };

        let tx = self.events.clone();
        let submitted = self.recorder.log_session(totals, Local::now(), move |result| {
            let _ = tx.send(AppEvent::SessionLogged { totals, result });
        });

        match submitted {
            Ok(()) => {
                self.pending_log = Some(totals);
                self.notice = Some("Saving session...".to_string());
            }
            Err(err) => {
                log::error!("could not submit session log: {err}");
                self.notice = Some(format!("Failed to save: {err}"));
            }
        }
    }

    fn on_session_logged(
        &mut self,
        totals: SessionTotals,
        result: Result<SessionRecord, RecordError>,
    ) {
        self.pending_log = None;
        match result {
            Ok(record) => {
                self.engine.session_logged(&totals);
                self.notice = Some(format!(
                    "Logged {} ({} blocks)",
                    format_clock(record.time, self.time_format),
                    record.blocks
                ));
                if self.summary.is_some() || self.screen == Screen::Metrics {
                    self.request_summary();
                }
            }
            Err(err) => {
                // Counters stay put so the user can retry.
                self.notice = Some(format!("Failed to save, try again: {err}"));
            }
        }
    }

    fn request_summary(&mut self) {
        if self.summary_loading {
            return;
        }
        let tx = self.events.clone();
        let submitted = self.recorder.weekly_summary(Local::now(), move |result| {
            let _ = tx.send(AppEvent::SummaryLoaded(result));
        });
        match submitted {
            Ok(()) => self.summary_loading = true,
            Err(err) => self.notice = Some(format!("Failed to load metrics: {err}")),
        }
    }

    fn on_summary_loaded(&mut self, result: Result<WeeklySummary, RecordError>) {
        self.summary_loading = false;
        match result {
            Ok(summary) => self.summary = Some(summary),
            Err(err) => self.notice = Some(format!("Failed to load metrics: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ChannelEventSource;
    use crate::store::SqliteStore;
    use crate::tick::ManualTickSource;
    use crate::tick::TickToken;
    use crate::timer::{DurationSettings, TimerMode};
    use assert_matches::assert_matches;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn app(mode: TimerMode) -> (App<ManualTickSource>, ChannelEventSource) {
        let (tx, source) = ChannelEventSource::channel();
        let recorder =
            RecorderHandle::spawn(Box::new(SqliteStore::open_in_memory().unwrap())).unwrap();
        let engine = TimerEngine::new(mode, DurationSettings::default(), ManualTickSource::new());
        (App::new(engine, recorder, tx, TimeFormat::Full), source)
    }

    fn tick(app: &mut App<ManualTickSource>, n: u32) {
        for _ in 0..n {
            let token = app.engine.armed_token().unwrap();
            app.handle_event(AppEvent::Tick(token));
        }
    }

    #[test]
    fn space_toggles_run_state() {
        let (mut app, _events) = app(TimerMode::Stopwatch);
        app.handle_event(AppEvent::Key(key(' ')));
        assert_eq!(app.engine.run_state(), RunState::Running);
        app.handle_event(AppEvent::Key(key(' ')));
        assert_eq!(app.engine.run_state(), RunState::Paused);
    }

    #[test]
    fn reset_prompt_can_be_cancelled() {
        let (mut app, _events) = app(TimerMode::Stopwatch);
        app.apply(Action::ToggleRun);
        tick(&mut app, 3);
        app.apply(Action::ToggleRun);

        app.handle_event(AppEvent::Key(key('r')));
        assert_matches!(app.modal, Some(Modal::ConfirmReset(_)));
        app.handle_event(AppEvent::Key(key('n')));
        assert_eq!(app.modal, None);
        assert_eq!(app.engine.run_state(), RunState::Paused);
        assert_eq!(app.engine.state().session_elapsed_secs, 3);

        app.handle_event(AppEvent::Key(key('r')));
        app.handle_event(AppEvent::Key(key('y')));
        assert_eq!(app.engine.run_state(), RunState::Stopped);
        assert_eq!(app.engine.state().session_elapsed_secs, 0);
    }

    #[test]
    fn reset_key_while_running_shows_no_prompt() {
        let (mut app, _events) = app(TimerMode::Pomodoro);
        app.apply(Action::ToggleRun);
        app.apply(Action::RequestReset);
        assert_eq!(app.modal, None);
    }

    #[test]
    fn modal_swallows_timer_keys() {
        let (mut app, _events) = app(TimerMode::Stopwatch);
        app.apply(Action::ToggleRun);
        tick(&mut app, 1);
        app.apply(Action::ToggleRun);
        app.apply(Action::RequestReset);
        assert_eq!(app.action_for_key(key(' ')), None);
    }

    #[test]
    fn log_with_no_time_is_not_submitted() {
        let (mut app, _events) = app(TimerMode::Stopwatch);
        app.apply(Action::LogSession);
        assert!(!app.is_saving());
        assert_eq!(app.notice, None);
    }

    #[test]
    fn failed_save_keeps_counters() {
        let (mut app, _events) = app(TimerMode::Stopwatch);
        app.apply(Action::ToggleRun);
        tick(&mut app, 4);
        app.apply(Action::ToggleRun);

        let totals = app.engine.session_totals().unwrap();
        app.handle_event(AppEvent::SessionLogged {
            totals,
            result: Err(RecordError::WorkerGone),
        });
        assert_eq!(app.engine.state().session_elapsed_secs, 4);
        assert_eq!(app.engine.run_state(), RunState::Paused);
        assert!(app.notice.as_deref().unwrap().starts_with("Failed to save"));
    }

    #[test]
    fn metrics_screen_pauses_timer() {
        let (mut app, _events) = app(TimerMode::Pomodoro);
        app.apply(Action::ToggleRun);
        tick(&mut app, 2);
        app.handle_event(AppEvent::Key(key('m')));
        assert_eq!(app.screen, Screen::Metrics);
        assert_eq!(app.engine.run_state(), RunState::Paused);
        assert_eq!(app.engine.state().session_elapsed_secs, 2);
        assert!(app.is_loading_summary());
    }

    #[test]
    fn quit_with_unlogged_time_asks_twice() {
        let (mut app, _events) = app(TimerMode::Stopwatch);
        app.apply(Action::ToggleRun);
        tick(&mut app, 2);
        app.apply(Action::Quit);
        assert!(!app.should_quit());
        assert_eq!(app.engine.run_state(), RunState::Paused);
        app.apply(Action::Quit);
        assert!(app.should_quit());
    }

    fn logged(totals: SessionTotals) -> AppEvent {
        AppEvent::SessionLogged {
            totals,
            result: Ok(SessionRecord {
                id: 1,
                time: totals.time_secs,
                blocks: totals.blocks,
                timestamp: "2024-06-10T18:00:00Z".to_string(),
                kind: totals.kind,
            }),
        }
    }

    #[test]
    fn reset_waits_for_in_flight_log() {
        let (mut app, _events) = app(TimerMode::Stopwatch);
        app.apply(Action::ToggleRun);
        tick(&mut app, 10);
        app.apply(Action::ToggleRun);
        app.apply(Action::LogSession);
        assert!(app.is_saving());
        let totals = app.engine.session_totals().unwrap();

        app.handle_event(AppEvent::Key(key('r')));
        assert_eq!(app.modal, None);
        assert_eq!(app.notice.as_deref(), Some(SAVING_NOTICE));

        app.apply(Action::ToggleRun);
        tick(&mut app, 5);
        app.handle_event(logged(totals));
        assert_eq!(app.engine.run_state(), RunState::Running);
        assert_eq!(app.engine.state().session_elapsed_secs, 5);
    }

    #[test]
    fn open_reset_prompt_is_refused_once_log_is_in_flight() {
        let (mut app, _events) = app(TimerMode::Stopwatch);
        app.apply(Action::ToggleRun);
        tick(&mut app, 3);
        app.apply(Action::ToggleRun);
        app.apply(Action::RequestReset);
        assert!(app.modal.is_some());

        // Log bypasses the key map, which the modal would otherwise own.
        app.apply(Action::LogSession);
        assert!(app.is_saving());
        app.handle_event(AppEvent::Key(key('y')));
        assert_eq!(app.modal, None);
        assert_eq!(app.engine.state().session_elapsed_secs, 3);
        assert_eq!(app.notice.as_deref(), Some(SAVING_NOTICE));
    }

    struct RefusingTicks;

    impl TickSource for RefusingTicks {
        fn start(&mut self, _token: TickToken) -> bool {
            false
        }

        fn cancel(&mut self) {}

        fn is_active(&self) -> bool {
            false
        }
    }

    #[test]
    fn failed_start_is_reported() {
        let (tx, _events) = ChannelEventSource::channel();
        let recorder =
            RecorderHandle::spawn(Box::new(SqliteStore::open_in_memory().unwrap())).unwrap();
        let engine = TimerEngine::new(
            TimerMode::Pomodoro,
            DurationSettings::default(),
            RefusingTicks,
        );
        let mut app = App::new(engine, recorder, tx, TimeFormat::Full);

        app.handle_event(AppEvent::Key(key(' ')));
        assert_eq!(app.engine.run_state(), RunState::Stopped);
        assert_eq!(
            app.notice.as_deref(),
            Some("Could not start the timer, see the log for details")
        );
    }

    #[test]
    fn pausing_sets_no_notice() {
        let (mut app, _events) = app(TimerMode::Stopwatch);
        app.apply(Action::ToggleRun);
        app.apply(Action::ToggleRun);
        assert_eq!(app.engine.run_state(), RunState::Paused);
        assert_eq!(app.notice, None);
    }

    #[test]
    fn quit_while_saving_mentions_the_save() {
        let (mut app, _events) = app(TimerMode::Stopwatch);
        app.apply(Action::ToggleRun);
        tick(&mut app, 4);
        app.apply(Action::ToggleRun);
        app.apply(Action::LogSession);

        app.apply(Action::Quit);
        assert!(!app.should_quit());
        let notice = app.notice.clone().unwrap();
        assert!(notice.starts_with("Session is still saving"));
        assert!(!notice.contains("not logged"));
        app.apply(Action::Quit);
        assert!(app.should_quit());
    }

    #[test]
    fn quit_while_saving_counts_only_newer_time_as_unlogged() {
        let (mut app, _events) = app(TimerMode::Stopwatch);
        app.apply(Action::ToggleRun);
        tick(&mut app, 4);
        app.apply(Action::ToggleRun);
        app.apply(Action::LogSession);
        app.apply(Action::ToggleRun);
        tick(&mut app, 2);

        app.apply(Action::Quit);
        assert!(!app.should_quit());
        assert!(app
            .notice
            .as_deref()
            .unwrap()
            .starts_with("00:00:02 of study time is not logged"));
    }

    #[test]
    fn quit_with_nothing_counted_leaves_at_once() {
        let (mut app, _events) = app(TimerMode::Pomodoro);
        app.apply(Action::Quit);
        assert!(app.should_quit());
    }
}
