pub mod charting;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Widget, Wrap},
};
use itertools::Itertools;
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Modal};
use crate::format::format_clock;
use crate::tick::TickSource;
use crate::timer::{Phase, RunState, TimerMode};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

pub(crate) fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

pub(crate) fn italic() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

/// Timer view.
pub struct TimerView<'a, T: TickSource> {
    pub app: &'a App<T>,
}

impl<T: TickSource> Widget for TimerView<'_, T> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let app = self.app;
        let state = app.engine.state();
        let fmt = app.time_format;

        let phase_color = match state.phase {
            Phase::Studying => Color::Green,
            Phase::Break => Color::Cyan,
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // heading
                Constraint::Min(1),    // spacer
                Constraint::Length(1), // clock
                Constraint::Length(1), // spacer
                Constraint::Length(1), // gauge
                Constraint::Length(1), // session counters
                Constraint::Min(1),    // spacer
                Constraint::Length(1), // notice
                Constraint::Length(2), // legend
            ])
            .split(area);

        let heading = match state.mode {
            TimerMode::Stopwatch => format!("Stopwatch [{}]", state.run_state),
            TimerMode::Pomodoro => format!("Pomodoro - {} [{}]", state.phase, state.run_state),
        };
        Paragraph::new(Span::styled(heading, bold().fg(phase_color)))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let clock_style = match state.run_state {
            RunState::Running => bold().fg(phase_color),
            RunState::Paused => bold().add_modifier(Modifier::SLOW_BLINK),
            RunState::Stopped => bold().add_modifier(Modifier::DIM),
        };
        Paragraph::new(Span::styled(format_clock(state.clock_secs, fmt), clock_style))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);

        let gauge_label = match state.mode {
            TimerMode::Stopwatch => format!("{}s", state.clock_secs % 60),
            TimerMode::Pomodoro => format!(
                "{} / {}",
                format_clock(state.clock_secs, fmt),
                format_clock(state.phase_duration(state.phase), fmt)
            ),
        };
        Gauge::default()
            .gauge_style(Style::default().fg(phase_color))
            .ratio(app.engine.progress())
            .label(gauge_label)
            .render(chunks[4], buf);

        let mut counters = vec![Span::styled(
            format!("Studied {}", format_clock(state.session_elapsed_secs, fmt)),
            bold(),
        )];
        if state.mode == TimerMode::Pomodoro {
            counters.push(Span::raw(format!(
                "   {} blocks   study {} / break {}",
                state.completed_blocks,
                format_clock(state.study_duration_secs, fmt),
                format_clock(state.break_duration_secs, fmt)
            )));
        }
        if app.is_saving() {
            counters.push(Span::styled("   saving...", italic().fg(Color::Yellow)));
        }
        Paragraph::new(Line::from(counters))
            .alignment(Alignment::Center)
            .render(chunks[5], buf);

        if let Some(notice) = &app.notice {
            Paragraph::new(Span::styled(notice.as_str(), italic().fg(Color::Yellow)))
                .alignment(Alignment::Center)
                .render(chunks[7], buf);
        }

        Paragraph::new(Span::styled(timer_legend(app), italic()))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[8], buf);

        if let Some(Modal::ConfirmReset(message)) = app.modal {
            render_confirm(message, area, buf);
        }
    }
}

fn timer_legend<T: TickSource>(app: &App<T>) -> String {
    let state = app.engine.state();
    let start = match state.run_state {
        RunState::Running => "(space) pause",
        RunState::Paused => "(space) resume",
        RunState::Stopped => "(space) start",
    };
    let mut parts = vec![start];
    if state.run_state == RunState::Paused {
        parts.push("(r)eset");
    }
    if app.engine.can_log() {
        parts.push("(l)og");
    }
    if state.mode == TimerMode::Pomodoro && state.run_state == RunState::Stopped {
        parts.extend(["(+/-) duration", "(d)efault", "(s)tudy / (b)reak"]);
    }
    parts.extend(["(m)etrics", "(q)uit"]);
    parts.iter().join(" / ")
}

fn render_confirm(message: &str, area: Rect, buf: &mut Buffer) {
    let popup = centered_rect(area, (message.width() as u16 + 4).min(60), 7);
    Clear.render(popup, buf);
    Paragraph::new(vec![
        Line::from(Span::styled(message, bold())),
        Line::from(""),
        Line::from(Span::styled("(y)es / (n)o", italic())),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Reset ")
            .border_style(Style::default().fg(Color::Red)),
    )
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(popup, buf);
}

/// Rect of at most `width` x `height` centred inside `area`.
pub(crate) fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
