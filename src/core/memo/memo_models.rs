// Domain models for the memo workflow.
// Plain data only - no Discord types, no HTTP. The service in memo_service.rs
// is the only thing that mutates a WorkflowState.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

/// Format used for the first column of every inserted row.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default offset applied to UTC when stamping rows (KST).
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;

/// Which screen the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Input,
    Review,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Input => write!(f, "input"),
            Stage::Review => write!(f, "review"),
        }
    }
}

/// Everything one session remembers between button presses.
///
/// Lives only as long as the session does; nothing here is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkflowState {
    pub stage: Stage,
    pub raw_text: String,
    pub summary_text: String,
    pub selected_author: String,
}

impl WorkflowState {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            selected_author: author.into(),
            ..Self::default()
        }
    }

    /// Move to the review screen with a fresh summary.
    pub fn begin_review(&mut self, raw_text: String, summary_text: String) {
        self.raw_text = raw_text;
        self.summary_text = summary_text;
        self.stage = Stage::Review;
    }

    /// Drop the summary and go back to input. The raw text is kept so the
    /// input form can be pre-filled again.
    pub fn back_to_input(&mut self) {
        self.summary_text.clear();
        self.stage = Stage::Input;
    }

    /// Start over after a successful submit. The author choice survives.
    pub fn reset(&mut self) {
        self.raw_text.clear();
        self.summary_text.clear();
        self.stage = Stage::Input;
    }
}

/// One row appended to the shared sheet: `[timestamp, author, content]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub timestamp: String,
    pub author: String,
    pub content: String,
}

impl SheetRow {
    pub fn new(clock: &SheetClock, at: DateTime<Utc>, author: &str, content: &str) -> Self {
        Self {
            timestamp: clock.stamp(at),
            author: author.to_string(),
            content: content.to_string(),
        }
    }

    /// Cell values in column order.
    pub fn cells(&self) -> [&str; 3] {
        [&self.timestamp, &self.author, &self.content]
    }
}

/// Local time used for the timestamp column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SheetClock {
    /// A fixed offset from UTC, e.g. +9 hours.
    Fixed(FixedOffset),
    /// A named zone, DST rules included.
    Zone(Tz),
}

impl SheetClock {
    /// Clock with a whole-hour offset from UTC. `None` if the offset is out of range.
    pub fn from_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours * 3600).map(SheetClock::Fixed)
    }

    pub fn stamp(&self, at: DateTime<Utc>) -> String {
        match self {
            SheetClock::Fixed(offset) => at.with_timezone(offset).format(TIMESTAMP_FORMAT),
            SheetClock::Zone(tz) => at.with_timezone(tz).format(TIMESTAMP_FORMAT),
        }
        .to_string()
    }
}

impl Default for SheetClock {
    fn default() -> Self {
        Self::from_offset_hours(DEFAULT_UTC_OFFSET_HOURS)
            .unwrap_or(SheetClock::Zone(chrono_tz::UTC))
    }
}

/// The fixed list of people a memo can be filed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRoster {
    names: Vec<String>,
}

impl AuthorRoster {
    /// Builds a roster, dropping blanks and duplicates. Returns `None` if nothing is left.
    pub fn new<I, S>(names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cleaned: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if !name.is_empty() && !cleaned.contains(&name) {
                cleaned.push(name);
            }
        }

        if cleaned.is_empty() {
            None
        } else {
            Some(Self { names: cleaned })
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The author a fresh session starts with.
    pub fn default_author(&self) -> &str {
        &self.names[0]
    }

    /// Exact match first, then a case-insensitive one.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.names
            .iter()
            .find(|n| n.as_str() == name)
            .or_else(|| self.names.iter().find(|n| n.eq_ignore_ascii_case(name)))
            .map(String::as_str)
    }

    /// Roster entries containing `partial`, for autocomplete.
    pub fn matching<'a>(&'a self, partial: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let needle = partial.trim().to_lowercase();
        self.names
            .iter()
            .filter(move |n| n.to_lowercase().contains(&needle))
            .map(String::as_str)
    }
}

impl Default for AuthorRoster {
    fn default() -> Self {
        Self {
            names: vec![
                "Team Lead".to_string(),
                "Deputy General Manager".to_string(),
                "Manager".to_string(),
                "Assistant Manager".to_string(),
            ],
        }
    }
}
