use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Widget},
    Frame,
};

use crate::app::{App, Screen};
use crate::format::format_duration;
use crate::tick::TickSource;
use crate::ui::charting::{bar_ceiling, bar_width, day_bars};
use crate::ui::{bold, italic, TimerView};

/// Draw whichever screen the app is on.
pub fn draw<T: TickSource>(app: &App<T>, f: &mut Frame) {
    let area = f.area();
    match app.screen {
        Screen::Timer => f.render_widget(TimerView { app }, area),
        Screen::Metrics => f.render_widget(MetricsView { app }, area),
    }
}

/// Weekly chart plus the derived averages.
pub struct MetricsView<'a, T: TickSource> {
    pub app: &'a App<T>,
}

impl<T: TickSource> Widget for MetricsView<'_, T> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let app = self.app;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(2)
            .vertical_margin(1)
            .constraints([
                Constraint::Min(5),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Last 7 days (minutes) ");

        let Some(summary) = &app.summary else {
            let text = if app.is_loading_summary() {
                "Loading..."
            } else {
                "No metrics loaded. Press (r) to refresh."
            };
            Paragraph::new(Span::styled(text, italic()))
                .alignment(Alignment::Center)
                .block(block)
                .render(chunks[0], buf);
            render_footer(app, chunks[2], chunks[3], buf);
            return;
        };

        let bars = day_bars(summary);
        let inner_width = chunks[0].width.saturating_sub(2);
        let chart_bars: Vec<Bar> = bars
            .iter()
            .map(|b| {
                Bar::default()
                    .value(b.minutes)
                    .label(Line::from(b.label.clone()))
                    .text_value(b.text.clone())
            })
            .collect();

        BarChart::default()
            .block(block)
            .data(BarGroup::default().bars(&chart_bars))
            .bar_width(bar_width(inner_width, chart_bars.len()))
            .bar_gap(1)
            .max(bar_ceiling(&bars))
            .bar_style(Style::default().fg(Color::Green))
            .value_style(Style::default().fg(Color::Black).bg(Color::Green))
            .render(chunks[0], buf);

        let stats = format!(
            "Total {}   Weekly average {}   Blocks {}   Avg per block {}",
            format_duration(summary.total_time as f64),
            format_duration(summary.weekly_average_secs),
            summary.total_blocks,
            format_duration(summary.avg_time_per_block_secs),
        );
        Paragraph::new(Span::styled(stats, bold()))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);

        render_footer(app, chunks[2], chunks[3], buf);
    }
}

fn render_footer<T: TickSource>(app: &App<T>, notice: Rect, legend: Rect, buf: &mut Buffer) {
    if let Some(text) = &app.notice {
        Paragraph::new(Span::styled(text.as_str(), italic().fg(Color::Yellow)))
            .alignment(Alignment::Center)
            .render(notice, buf);
    }
    Paragraph::new(Span::styled("(r)efresh / (t)imer / (q)uit", italic()))
        .alignment(Alignment::Center)
        .render(legend, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Action;
    use crate::metrics::summarize_week;
    use crate::session::{SessionKind, SessionRecord};
    use crate::timer::TimerMode;
    use crate::ui::tests::{buffer_text, test_app};
    use chrono::{TimeZone, Utc};

    fn render(view: MetricsView<'_, crate::tick::ManualTickSource>) -> String {
        let area = Rect::new(0, 0, 100, 20);
        let mut buf = Buffer::empty(area);
        view.render(area, &mut buf);
        buffer_text(&buf)
    }

    #[test]
    fn shows_averages_when_summary_is_loaded() {
        let (mut app, _events) = test_app(TimerMode::Pomodoro);
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let records = vec![SessionRecord {
            id: 1,
            time: 6600,
            blocks: 9,
            timestamp: "2024-06-09T08:00:00Z".to_string(),
            kind: SessionKind::Pomodoro,
        }];
        app.summary = Some(summarize_week(&records, &now));

        let text = render(MetricsView { app: &app });
        assert!(text.contains("Last 7 days"));
        assert!(text.contains("Total 1h 50m"));
        assert!(text.contains("Weekly average 15m"));
        assert!(text.contains("Blocks 9"));
        assert!(text.contains("Avg per block 12m"));
        assert!(text.contains("Sun"));
    }

    #[test]
    fn shows_loading_while_waiting() {
        let (mut app, _events) = test_app(TimerMode::Pomodoro);
        app.apply(Action::ShowMetrics);
        let text = render(MetricsView { app: &app });
        assert!(text.contains("Loading..."));
    }
}
