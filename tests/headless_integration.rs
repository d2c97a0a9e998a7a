use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use studytime::app::{App, Screen};
use studytime::format::TimeFormat;
use studytime::recorder::RecorderHandle;
use studytime::runtime::{AppEvent, ChannelEventSource, Runner};
use studytime::session::SessionKind;
use studytime::store::{SessionStore, SqliteStore};
use studytime::tick::ManualTickSource;
use studytime::timer::{DurationSettings, Phase, RunState, TimerEngine, TimerMode};

fn key(c: char) -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

fn short_pomodoro() -> DurationSettings {
    DurationSettings {
        study_secs: 3,
        break_secs: 2,
        min_study_secs: 1,
        min_break_secs: 1,
        ..DurationSettings::default()
    }
}

fn tick(app: &mut App<ManualTickSource>, n: u32) {
    for _ in 0..n {
        let token = app.engine.armed_token().expect("timer should be running");
        app.handle_event(AppEvent::Tick(token));
    }
}

/// Feed recorder replies back into the app until `done` holds.
fn pump_until(
    app: &mut App<ManualTickSource>,
    runner: &Runner<ChannelEventSource>,
    done: impl Fn(&App<ManualTickSource>) -> bool,
) {
    for _ in 0..200u32 {
        if done(&*app) {
            return;
        }
        if let Some(event) = runner.step() {
            app.handle_event(event);
        }
    }
    panic!("condition not reached");
}

#[test]
fn headless_pomodoro_block_is_logged_and_charted() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("sessions.db");

    let (tx, events) = ChannelEventSource::channel();
    let runner = Runner::new(events, Duration::from_millis(20));
    let recorder = RecorderHandle::spawn(Box::new(SqliteStore::open(&db).unwrap())).unwrap();
    let engine = TimerEngine::new(TimerMode::Pomodoro, short_pomodoro(), ManualTickSource::new());
    let mut app = App::new(engine, recorder, tx, TimeFormat::Full);

    app.handle_event(key(' '));
    tick(&mut app, 3);
    assert_eq!(app.engine.state().phase, Phase::Break);
    assert_eq!(app.engine.state().completed_blocks, 1);

    // Break time is not study time.
    tick(&mut app, 2);
    assert_eq!(app.engine.state().phase, Phase::Studying);
    assert_eq!(app.engine.state().session_elapsed_secs, 3);

    // Log is refused while running.
    app.handle_event(key('l'));
    assert!(!app.is_saving());

    app.handle_event(key(' '));
    app.handle_event(key('l'));
    assert!(app.is_saving());

    pump_until(&mut app, &runner, |app| !app.is_saving());
    assert_eq!(app.engine.run_state(), RunState::Stopped);
    assert_eq!(app.engine.state().session_elapsed_secs, 0);
    assert_eq!(app.engine.state().completed_blocks, 0);

    app.handle_event(key('m'));
    assert_eq!(app.screen, Screen::Metrics);
    pump_until(&mut app, &runner, |app| app.summary.is_some());

    let summary = app.summary.clone().unwrap();
    assert_eq!(summary.total_time, 3);
    assert_eq!(summary.total_blocks, 1);
    assert_eq!(summary.avg_time_per_block_secs, 3.0);
    assert_eq!(summary.days.last().unwrap().time, 3);

    // Dropping the app shuts the recorder down and releases the database.
    drop(app);
    let store = SqliteStore::open(&db).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    let cutoff = chrono::Utc::now() - chrono::Duration::days(1);
    let records = store.sessions_since(&cutoff).unwrap();
    assert_eq!(records[0].kind, SessionKind::Pomodoro);
    assert_eq!(records[0].blocks, 1);
}

#[test]
fn headless_stale_tick_after_pause_is_dropped() {
    let (tx, _events) = ChannelEventSource::channel();
    let recorder =
        RecorderHandle::spawn(Box::new(SqliteStore::open_in_memory().unwrap())).unwrap();
    let engine = TimerEngine::new(
        TimerMode::Stopwatch,
        DurationSettings::default(),
        ManualTickSource::new(),
    );
    let mut app = App::new(engine, recorder, tx, TimeFormat::Compact);

    app.handle_event(key(' '));
    let first = app.engine.armed_token().unwrap();
    tick(&mut app, 2);
    app.handle_event(key(' '));

    // Queued before the pause landed.
    assert!(!app.handle_event(AppEvent::Tick(first)));
    assert_eq!(app.engine.state().clock_secs, 2);

    app.handle_event(key(' '));
    assert!(!app.handle_event(AppEvent::Tick(first)));
    assert_eq!(app.engine.state().clock_secs, 2);
    tick(&mut app, 1);
    assert_eq!(app.engine.state().clock_secs, 3);
    assert_eq!(app.engine.tick_source().starts, 2);
}

#[test]
fn headless_reset_requires_confirmation() {
    let (tx, _events) = ChannelEventSource::channel();
    let recorder =
        RecorderHandle::spawn(Box::new(SqliteStore::open_in_memory().unwrap())).unwrap();
    let engine = TimerEngine::new(TimerMode::Pomodoro, short_pomodoro(), ManualTickSource::new());
    let mut app = App::new(engine, recorder, tx, TimeFormat::Full);

    app.handle_event(key(' '));
    tick(&mut app, 1);

    // No prompt while running.
    app.handle_event(key('r'));
    assert!(app.modal.is_none());

    app.handle_event(key(' '));
    app.handle_event(key('r'));
    assert!(app.modal.is_some());
    app.handle_event(AppEvent::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
    assert_eq!(app.engine.state().session_elapsed_secs, 1);

    app.handle_event(key('r'));
    app.handle_event(AppEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
    assert_eq!(app.engine.run_state(), RunState::Stopped);
    assert_eq!(app.engine.state().clock_secs, 3);
    assert_eq!(app.engine.state().session_elapsed_secs, 0);
}
