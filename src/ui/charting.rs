use crate::format::format_duration;
use crate::metrics::WeeklySummary;

/// One column of the weekly bar chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBar {
    pub label: String,
    pub minutes: u64,
    pub text: String,
}

/// Bars in minutes, oldest day first, labelled with the weekday.
pub fn day_bars(summary: &WeeklySummary) -> Vec<DayBar> {
    summary
        .days
        .iter()
        .map(|day| DayBar {
            label: day.date.format("%a").to_string(),
            minutes: (day.time + 30) / 60,
            text: if day.time == 0 {
                String::new()
            } else {
                format_duration(day.time as f64)
            },
        })
        .collect()
}

/// Upper bound for the chart so an empty week still draws a baseline.
pub fn bar_ceiling(bars: &[DayBar]) -> u64 {
    bars.iter().map(|b| b.minutes).max().unwrap_or(0).max(1)
}

/// Bar width that spreads `count` bars across `width` columns with a gap of one.
pub fn bar_width(width: u16, count: usize) -> u16 {
    if count == 0 {
        return 1;
    }
    let count = count as u16;
    let gaps = count.saturating_sub(1);
    (width.saturating_sub(gaps) / count).clamp(1, 12)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::summarize_week;
    use crate::session::{SessionKind, SessionRecord};
    use chrono::{TimeZone, Utc};

    fn summary_with(time: u64) -> WeeklySummary {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let records = if time > 0 {
            vec![SessionRecord {
                id: 1,
                time,
                blocks: 1,
                timestamp: "2024-06-10T09:00:00Z".to_string(),
                kind: SessionKind::Pomodoro,
            }]
        } else {
            Vec::new()
        };
        summarize_week(&records, &now)
    }

    #[test]
    fn bars_follow_window_order() {
        let bars = day_bars(&summary_with(1500));
        assert_eq!(bars.len(), 7);
        // 2024-06-10 is a Monday.
        assert_eq!(bars[6].label, "Mon");
        assert_eq!(bars[0].label, "Tue");
        assert_eq!(bars[6].minutes, 25);
        assert_eq!(bars[6].text, "25m");
        assert_eq!(bars[0].text, "");
    }

    #[test]
    fn empty_week_still_has_a_ceiling() {
        let bars = day_bars(&summary_with(0));
        assert_eq!(bar_ceiling(&bars), 1);
    }

    #[test]
    fn bar_width_fits_area() {
        assert_eq!(bar_width(76, 7), 10);
        assert_eq!(bar_width(3, 7), 1);
        assert_eq!(bar_width(200, 7), 12);
        assert_eq!(bar_width(10, 0), 1);
    }
}
