use serde::{Deserialize, Serialize};

/// How the running clock is rendered. This is display policy only; the timer
/// engine always counts whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeFormat {
    /// Always `HH:MM:SS`.
    #[default]
    Full,
    /// `MM:SS` while under an hour, `HH:MM:SS` after.
    Compact,
}

pub fn format_clock(secs: u64, format: TimeFormat) -> String {
    let hours = secs / 3600;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;

    match format {
        TimeFormat::Compact if hours == 0 => format!("{minutes:02}:{seconds:02}"),
        _ => format!("{hours:02}:{minutes:02}:{seconds:02}"),
    }
}

/// Short human form for summaries: `45s`, `12m`, `1h 05m`.
pub fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.round() as u64
    } else {
        0
    };

    let hours = total / 3600;
    let minutes = (total / 60) % 60;

    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{total}s")
    }
}
