//! Index template registered once at sink construction.

use serde_json::{json, Value};

use crate::event::ChannelPattern;

/// Composable index template covering every dated channel of a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTemplate {
    pub name: String,
    pub index_patterns: Vec<String>,
}

impl IndexTemplate {
    pub fn for_pattern(name: impl Into<String>, pattern: &ChannelPattern) -> Self {
        Self {
            name: name.into(),
            index_patterns: vec![pattern.wildcard()],
        }
    }

    /// Request body: `@timestamp` as a date, level as a keyword, message
    /// fields as text, properties mapped dynamically.
    pub fn body(&self) -> Value {
        json!({
            "index_patterns": self.index_patterns,
            "template": {
                "settings": {
                    "index.refresh_interval": "5s"
                },
                "mappings": {
                    "dynamic_templates": [{
                        "string_fields": {
                            "match_mapping_type": "string",
                            "mapping": {
                                "type": "text",
                                "fields": { "raw": { "type": "keyword", "ignore_above": 256 } }
                            }
                        }
                    }],
                    "properties": {
                        "@timestamp": { "type": "date" },
                        "level": { "type": "keyword" },
                        "messageTemplate": { "type": "text" },
                        "message": { "type": "text" },
                        "exception": {
                            "properties": {
                                "message": { "type": "text" },
                                "causes": { "type": "text" }
                            }
                        }
                    }
                }
            }
        })
    }
}
