//! Date-parameterised channel (index) names.
//!
//! A pattern such as `logging-{date}` yields one channel per UTC day:
//! `logging-2026.10.19`. The dead-letter companion of a pattern inserts a
//! fixed `deadletter` segment: `logging-deadletter-2026.10.19`.

use std::fmt;

use chrono::NaiveDate;

const DATE_TOKEN: &str = "{date}";
const DATE_FORMAT: &str = "%Y.%m.%d";
const DEAD_LETTER_SEGMENT: &str = "deadletter";

/// Channel naming pattern with a single `{date}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPattern {
    template: String,
}

impl ChannelPattern {
    /// Parse a pattern.
    ///
    /// Accepts `{date}` or the `{0:yyyy.MM.dd}` spelling. A value without any
    /// placeholder is a base name and gets `-{date}` appended.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let template = if raw.contains(DATE_TOKEN) {
            raw.to_string()
        } else if let Some(start) = raw.find("{0:") {
            match raw[start..].find('}') {
                Some(end) => format!("{}{}{}", &raw[..start], DATE_TOKEN, &raw[start + end + 1..]),
                None => format!("{raw}-{DATE_TOKEN}"),
            }
        } else {
            format!("{}-{}", raw.trim_end_matches('-'), DATE_TOKEN)
        };
        Self { template }
    }

    /// Text before the date placeholder, without a trailing `-`.
    pub fn base(&self) -> &str {
        let prefix = self.template.split(DATE_TOKEN).next().unwrap_or(&self.template);
        prefix.trim_end_matches('-')
    }

    /// Dead-letter companion: `<base>-deadletter-{date}`.
    pub fn dead_letter(&self) -> Self {
        Self {
            template: format!("{}-{}-{}", self.base(), DEAD_LETTER_SEGMENT, DATE_TOKEN),
        }
    }

    /// Concrete channel name for `date`.
    pub fn channel_for(&self, date: NaiveDate) -> String {
        self.template
            .replace(DATE_TOKEN, &date.format(DATE_FORMAT).to_string())
    }

    /// Wildcard matching every channel of this pattern, for index templates.
    pub fn wildcard(&self) -> String {
        self.template.replace(DATE_TOKEN, "*")
    }
}

impl fmt::Display for ChannelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}
