//! Pagination cursors
//!
//! Both cursors are three fields joined by `::`, in the order of the sort they
//! continue. Decoding never fails: missing fields become empty strings and an
//! unparsable priority becomes 0.

use crate::models::PostRecord;

const SEPARATOR: &str = "::";

/// Continuation of the `(priority, indexed_at, uri)` descending order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrictCursor {
    pub priority: i16,
    pub indexed_at: String,
    pub uri: String,
}

/// Continuation of the `(indexed_at, priority, uri)` descending order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecencyCursor {
    pub indexed_at: String,
    pub priority: i16,
    pub uri: String,
}

impl StrictCursor {
    pub fn from_record(record: &PostRecord) -> Self {
        Self {
            priority: record.priority,
            indexed_at: record.indexed_at.clone(),
            uri: record.uri.clone(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}{SEPARATOR}{}{SEPARATOR}{}", self.priority, self.indexed_at, self.uri)
    }

    pub fn decode(raw: &str) -> Self {
        let mut fields = raw.splitn(3, SEPARATOR);
        Self {
            priority: parse_priority(fields.next()),
            indexed_at: fields.next().unwrap_or_default().to_string(),
            uri: fields.next().unwrap_or_default().to_string(),
        }
    }
}

impl RecencyCursor {
    pub fn from_record(record: &PostRecord) -> Self {
        Self {
            indexed_at: record.indexed_at.clone(),
            priority: record.priority,
            uri: record.uri.clone(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}{SEPARATOR}{}{SEPARATOR}{}", self.indexed_at, self.priority, self.uri)
    }

    pub fn decode(raw: &str) -> Self {
        let mut fields = raw.splitn(3, SEPARATOR);
        Self {
            indexed_at: fields.next().unwrap_or_default().to_string(),
            priority: parse_priority(fields.next()),
            uri: fields.next().unwrap_or_default().to_string(),
        }
    }
}

fn parse_priority(field: Option<&str>) -> i16 {
    field.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}
