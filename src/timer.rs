//! Timer engine: the stopwatch / pomodoro state machine.
//!
//! The engine owns its [`TickSource`] and is the only thing that arms or
//! cancels it, so the "one tick source while running, none otherwise" rule is
//! enforced in one place. Every mutating call returns whether it took effect;
//! refused actions leave the state untouched.

use crate::session::{SessionKind, SessionTotals};
use crate::tick::{TickSource, TickToken};

pub const DEFAULT_STUDY_SECS: u64 = 25 * 60;
pub const DEFAULT_BREAK_SECS: u64 = 5 * 60;

pub const RESET_WARNING: &str =
    "Reset the timer? Session time will be discarded unless you log it first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, clap::ValueEnum)]
pub enum TimerMode {
    Stopwatch,
    Pomodoro,
}

impl TimerMode {
    pub fn session_kind(&self) -> SessionKind {
        match self {
            TimerMode::Stopwatch => SessionKind::Timer,
            TimerMode::Pomodoro => SessionKind::Pomodoro,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    #[strum(serialize = "Study")]
    Studying,
    Break,
}

impl Phase {
    pub fn flipped(self) -> Self {
        match self {
            Phase::Studying => Phase::Break,
            Phase::Break => Phase::Studying,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

/// Starting durations plus the rules for editing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationSettings {
    pub study_secs: u64,
    pub break_secs: u64,
    pub min_study_secs: u64,
    pub min_break_secs: u64,
    pub study_step_secs: u64,
    pub break_step_secs: u64,
}

impl Default for DurationSettings {
    fn default() -> Self {
        Self {
            study_secs: DEFAULT_STUDY_SECS,
            break_secs: DEFAULT_BREAK_SECS,
            min_study_secs: 600,
            min_break_secs: 60,
            study_step_secs: 300,
            break_step_secs: 60,
        }
    }
}

impl DurationSettings {
    /// Zero floors or steps would stall the state machine, so both are at
    /// least one second. Starting durations never sit below their floor.
    pub fn sanitized(mut self) -> Self {
        self.min_study_secs = self.min_study_secs.max(1);
        self.min_break_secs = self.min_break_secs.max(1);
        self.study_secs = self.study_secs.max(self.min_study_secs);
        self.break_secs = self.break_secs.max(self.min_break_secs);
        self.study_step_secs = self.study_step_secs.max(1);
        self.break_step_secs = self.break_step_secs.max(1);
        self
    }
}

/// Live timer fields, cloned out for display on every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerState {
    pub mode: TimerMode,
    /// Only meaningful in pomodoro mode.
    pub phase: Phase,
    pub run_state: RunState,
    /// Pomodoro: seconds left in the current phase. Stopwatch: seconds elapsed.
    pub clock_secs: u64,
    pub study_duration_secs: u64,
    pub break_duration_secs: u64,
    /// Study time accumulated since the last log or reset; break time excluded.
    pub session_elapsed_secs: u64,
    pub completed_blocks: u32,
}

impl TimerState {
    pub fn phase_duration(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Studying => self.study_duration_secs,
            Phase::Break => self.break_duration_secs,
        }
    }

    fn starting_clock(&self) -> u64 {
        match self.mode {
            TimerMode::Stopwatch => 0,
            TimerMode::Pomodoro => self.phase_duration(self.phase),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running, or the tick belonged to a cancelled schedule.
    Ignored,
    Counted,
    PhaseChanged { from: Phase, to: Phase },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetRequest {
    Ignored,
    /// Caller must show the warning and call `confirm_reset` only if the user agrees.
    Confirm(&'static str),
}

pub struct TimerEngine<T: TickSource> {
    state: TimerState,
    settings: DurationSettings,
    ticks: T,
    armed: Option<TickToken>,
    generation: u64,
}

impl<T: TickSource> TimerEngine<T> {
    pub fn new(mode: TimerMode, settings: DurationSettings, ticks: T) -> Self {
        let settings = settings.sanitized();
        let mut state = TimerState {
            mode,
            phase: Phase::Studying,
            run_state: RunState::Stopped,
            clock_secs: 0,
            study_duration_secs: settings.study_secs,
            break_duration_secs: settings.break_secs,
            session_elapsed_secs: 0,
            completed_blocks: 0,
        };
        state.clock_secs = state.starting_clock();

        Self {
            state,
            settings,
            ticks,
            armed: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn mode(&self) -> TimerMode {
        self.state.mode
    }

    pub fn run_state(&self) -> RunState {
        self.state.run_state
    }

    pub fn tick_source(&self) -> &T {
        &self.ticks
    }

    pub fn armed_token(&self) -> Option<TickToken> {
        self.armed
    }

    /// Stopped -> Running (fresh clock) or Paused -> Running (resume).
    ///
    /// Refused, with the state untouched, when the tick source cannot start.
    pub fn start(&mut self) -> bool {
        if self.state.run_state == RunState::Running {
            return false;
        }
        if !self.arm() {
            return false;
        }

        if self.state.run_state == RunState::Stopped {
            self.state.clock_secs = self.state.starting_clock();
        }
        self.state.run_state = RunState::Running;
        log::debug!(
            "timer started: mode={} phase={} clock={}s",
            self.state.mode,
            self.state.phase,
            self.state.clock_secs
        );
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state.run_state != RunState::Running {
            return false;
        }
        self.disarm();
        self.state.run_state = RunState::Paused;
        log::debug!("timer paused at {}s", self.state.clock_secs);
        true
    }

    /// Start when stopped or paused, pause when running.
    pub fn toggle(&mut self) -> bool {
        match self.state.run_state {
            RunState::Running => self.pause(),
            RunState::Stopped | RunState::Paused => self.start(),
        }
    }

    /// Leaving the timer view: pause if running, keep every counter.
    pub fn suspend(&mut self) -> bool {
        self.pause()
    }

    pub fn request_reset(&self) -> ResetRequest {
        match self.state.run_state {
            RunState::Paused => ResetRequest::Confirm(RESET_WARNING),
            RunState::Stopped | RunState::Running => ResetRequest::Ignored,
        }
    }

    /// Paused -> Stopped, discarding the unlogged session.
    pub fn confirm_reset(&mut self) -> bool {
        if self.state.run_state != RunState::Paused {
            return false;
        }
        self.stop_and_clear();
        log::info!("timer reset, unlogged session discarded");
        true
    }

    pub fn on_tick(&mut self, token: TickToken) -> TickOutcome {
        if self.state.run_state != RunState::Running || self.armed != Some(token) {
            return TickOutcome::Ignored;
        }

        match self.state.mode {
            TimerMode::Stopwatch => {
                self.state.clock_secs += 1;
                self.state.session_elapsed_secs += 1;
                TickOutcome::Counted
            }
            TimerMode::Pomodoro => {
                self.state.clock_secs = self.state.clock_secs.saturating_sub(1);
                if self.state.phase == Phase::Studying {
                    self.state.session_elapsed_secs += 1;
                }
                if self.state.clock_secs > 0 {
                    return TickOutcome::Counted;
                }
                self.roll_over()
            }
        }
    }

    pub fn select_phase(&mut self, phase: Phase) -> bool {
        if !self.editable() {
            return false;
        }
        self.state.phase = phase;
        self.state.clock_secs = self.state.starting_clock();
        true
    }

    pub fn increment_duration(&mut self) -> bool {
        if !self.editable() {
            return false;
        }
        let step = self.step_for(self.state.phase);
        let current = self.state.phase_duration(self.state.phase);
        self.set_duration(self.state.phase, current.saturating_add(step));
        true
    }

    /// Refused when the step would cross the phase's floor.
    pub fn decrement_duration(&mut self) -> bool {
        if !self.editable() {
            return false;
        }
        let phase = self.state.phase;
        let floor = match phase {
            Phase::Studying => self.settings.min_study_secs,
            Phase::Break => self.settings.min_break_secs,
        };
        let current = self.state.phase_duration(phase);
        match current.checked_sub(self.step_for(phase)) {
            Some(next) if next >= floor && next > 0 => {
                self.set_duration(phase, next);
                true
            }
            _ => false,
        }
    }

    pub fn reset_duration_to_default(&mut self) -> bool {
        if !self.editable() {
            return false;
        }
        let default = match self.state.phase {
            Phase::Studying => DEFAULT_STUDY_SECS,
            Phase::Break => DEFAULT_BREAK_SECS,
        };
        self.set_duration(self.state.phase, default);
        true
    }

    pub fn can_log(&self) -> bool {
        self.state.session_elapsed_secs > 0 && self.state.run_state != RunState::Running
    }

    /// Counters to persist, or `None` when there is nothing worth logging.
    pub fn session_totals(&self) -> Option<SessionTotals> {
        if !self.can_log() {
            return None;
        }
        Some(SessionTotals {
            time_secs: self.state.session_elapsed_secs,
            blocks: self.state.completed_blocks,
            kind: self.state.mode.session_kind(),
        })
    }

    /// Called once the recorder confirms the write for `logged`.
    ///
    /// A paused or stopped timer returns to Stopped with cleared counters. If
    /// the user resumed while the write was in flight, only the logged amounts
    /// are removed so the newer time survives.
    pub fn session_logged(&mut self, logged: &SessionTotals) {
        match self.state.run_state {
            RunState::Running => {
                self.state.session_elapsed_secs = self
                    .state
                    .session_elapsed_secs
                    .saturating_sub(logged.time_secs);
                self.state.completed_blocks =
                    self.state.completed_blocks.saturating_sub(logged.blocks);
            }
            RunState::Paused | RunState::Stopped => self.stop_and_clear(),
        }
    }

    /// Fraction of the progress bar to fill, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        match self.state.mode {
            TimerMode::Stopwatch => (self.state.clock_secs % 60) as f64 / 60.0,
            TimerMode::Pomodoro => {
                let total = self.state.phase_duration(self.state.phase);
                if total == 0 {
                    0.0
                } else {
                    (self.state.clock_secs as f64 / total as f64).clamp(0.0, 1.0)
                }
            }
        }
    }

    fn roll_over(&mut self) -> TickOutcome {
        let from = self.state.phase;
        if from == Phase::Studying {
            self.state.completed_blocks += 1;
        }
        let to = from.flipped();
        self.state.phase = to;
        self.state.clock_secs = self.state.phase_duration(to);
        log::info!(
            "{} phase finished, switching to {} ({} blocks this session)",
            from,
            to,
            self.state.completed_blocks
        );
        TickOutcome::PhaseChanged { from, to }
    }

    fn editable(&self) -> bool {
        self.state.run_state == RunState::Stopped && self.state.mode == TimerMode::Pomodoro
    }

    fn step_for(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Studying => self.settings.study_step_secs,
            Phase::Break => self.settings.break_step_secs,
        }
    }

    fn set_duration(&mut self, phase: Phase, secs: u64) {
        match phase {
            Phase::Studying => self.state.study_duration_secs = secs,
            Phase::Break => self.state.break_duration_secs = secs,
        }
        if phase == self.state.phase {
            self.state.clock_secs = secs;
        }
    }

    fn stop_and_clear(&mut self) {
        self.disarm();
        self.state.run_state = RunState::Stopped;
        self.state.session_elapsed_secs = 0;
        self.state.completed_blocks = 0;
        self.state.clock_secs = self.state.starting_clock();
    }

    fn arm(&mut self) -> bool {
        // Never stack a second schedule on top of a live one.
        if self.ticks.is_active() {
            self.ticks.cancel();
        }
        self.generation += 1;
        let token = TickToken(self.generation);
        if !self.ticks.start(token) {
            log::error!("tick source refused to start, timer stays {}", self.state.run_state);
            self.armed = None;
            return false;
        }
        self.armed = Some(token);
        true
    }

    fn disarm(&mut self) {
        self.ticks.cancel();
        self.armed = None;
    }
}

impl<T: TickSource> Drop for TimerEngine<T> {
    fn drop(&mut self) {
        self.ticks.cancel();
    }
}
