use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Which timer widget produced a logged session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionKind {
    Pomodoro,
    Timer,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Pomodoro => "pomodoro",
            SessionKind::Timer => "timer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pomodoro" => Some(SessionKind::Pomodoro),
            "timer" => Some(SessionKind::Timer),
            _ => None,
        }
    }
}

/// One immutable row of the study log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    /// Active (non-break) study time in whole seconds.
    pub time: u64,
    pub blocks: u32,
    /// ISO-8601 instant the session was logged, exactly as stored.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: SessionKind,
}

impl SessionRecord {
    pub fn logged_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok()
    }
}

/// Counters handed from the timer engine to the recorder when the user logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTotals {
    pub time_secs: u64,
    pub blocks: u32,
    pub kind: SessionKind,
}
