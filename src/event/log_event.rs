//! Structured log events.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::event::LogLevel;

/// Error details attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    /// Display text of the outermost error.
    pub message: String,
    /// Display text of each `source()` below the outermost error.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorInfo {
    /// Capture an error and its full source chain.
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut current = error.source();
        while let Some(cause) = current {
            causes.push(cause.to_string());
            current = cause.source();
        }
        Self {
            message: error.to_string(),
            causes,
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
        }
    }
}

/// A structured log record.
///
/// Events are built with the consuming `with_*` methods and are read-only once
/// handed to the pipeline (they travel as `Arc<LogEvent>` from then on).
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    message_template: String,
    properties: BTreeMap<String, Value>,
    error: Option<ErrorInfo>,
}

/// Wire shape of an event inside the remote index.
#[derive(Serialize)]
struct Document<'a> {
    #[serde(rename = "@timestamp")]
    timestamp: &'a DateTime<Utc>,
    level: LogLevel,
    #[serde(rename = "messageTemplate")]
    message_template: &'a str,
    message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    fields: &'a BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<&'a ErrorInfo>,
}

impl LogEvent {
    /// New event stamped with the current UTC time.
    pub fn new(level: LogLevel, message_template: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message_template: message_template.into(),
            properties: BTreeMap::new(),
            error: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in properties {
            self.properties.insert(name.into(), value.into());
        }
        self
    }

    pub fn with_error(mut self, error: &(dyn StdError + 'static)) -> Self {
        self.error = Some(ErrorInfo::from_error(error));
        self
    }

    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error = Some(info);
        self
    }

    /// Attach an ambient property unless the event already carries one with
    /// the same name.
    pub(crate) fn enrich(&mut self, name: &str, value: &Value) {
        if !self.properties.contains_key(name) {
            self.properties.insert(name.to_string(), value.clone());
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message_template(&self) -> &str {
        &self.message_template
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// Render the message template, substituting `{Name}` and `{@Name}`
    /// placeholders from the event's properties.
    ///
    /// Unknown placeholders are left verbatim; `{{` and `}}` escape braces.
    pub fn render_message(&self) -> String {
        let template = self.message_template.as_str();
        let mut out = String::with_capacity(template.len());
        let mut chars = template.char_indices().peekable();

        while let Some((i, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    out.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let Some(close) = template[i..].find('}') else {
                        out.push_str(&template[i..]);
                        break;
                    };
                    let token = &template[i + 1..i + close];
                    let name = token.trim_start_matches(['@', '$']);
                    let name = name.split([':', ',']).next().unwrap_or(name);
                    match self.properties.get(name) {
                        Some(Value::String(s)) => out.push_str(s),
                        Some(other) => {
                            let _ = write!(out, "{other}");
                        }
                        None => out.push_str(&template[i..=i + close]),
                    }
                    // Skip the characters of the placeholder we just consumed.
                    while let Some((j, _)) = chars.peek() {
                        if *j > i + close {
                            break;
                        }
                        chars.next();
                    }
                }
                other => out.push(other),
            }
        }

        out
    }

    /// JSON document submitted to the remote index.
    pub fn to_document(&self) -> Value {
        let document = Document {
            timestamp: &self.timestamp,
            level: self.level,
            message_template: &self.message_template,
            message: self.render_message(),
            fields: &self.properties,
            exception: self.error.as_ref(),
        };
        serde_json::to_value(document).unwrap_or(Value::Null)
    }
}
