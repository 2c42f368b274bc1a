//! Deterministic execution names.
//!
//! The workflow engine rejects a second execution with an existing name, so
//! the name is what deduplicates redelivered events.

use serde::Serialize;
use std::fmt;

/// Maximum length of a Step Functions execution name.
pub const MAX_EXECUTION_NAME_LEN: usize = 80;
/// Budget for the partition-key segment of a stream-triggered name.
pub const PARTITION_KEY_BUDGET: usize = 36;
/// Budget for the event-id segment of a stream-triggered name.
pub const EVENT_ID_BUDGET: usize = 32;

/// Suffix of the execution started when a PII scan of a job finishes.
pub const PII_SCAN_SUFFIX: &str = "pii";

const SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ExecutionName(String);

impl ExecutionName {
    /// `{jobId}_{languageCode}` for a translated document.
    pub fn for_translation(job_id: &str, language_code: &str) -> Self {
        let raw = format!("{}{}{}", job_id, SEPARATOR, language_code);
        ExecutionName(truncate(&sanitize(&raw), MAX_EXECUTION_NAME_LEN))
    }

    /// `{jobName}_pii` for a finished PII scan.
    pub fn for_pii_scan(job_name: &str) -> Self {
        Self::for_translation(job_name, PII_SCAN_SUFFIX)
    }

    /// Name for a table-stream record: partition key, event id and sort-key slug,
    /// each cut to its budget and joined with `_`.
    pub fn for_stream_record(
        partition_value: &str,
        event_id: Option<&str>,
        sort_value: Option<&str>,
    ) -> Self {
        let mut name = truncate(&sanitize(partition_value), PARTITION_KEY_BUDGET);

        if let Some(event_id) = event_id.filter(|id| !id.is_empty()) {
            name.push(SEPARATOR);
            name.push_str(&truncate(&sanitize(event_id), EVENT_ID_BUDGET));
        }

        if let Some(sort_value) = sort_value.filter(|v| !v.is_empty()) {
            let used = name.chars().count() + 1;
            let remaining = MAX_EXECUTION_NAME_LEN.saturating_sub(used);
            if remaining > 0 {
                name.push(SEPARATOR);
                name.push_str(&truncate(&slug(sort_value), remaining));
            }
        }

        ExecutionName(name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Job id of a translation execution: everything before the first `_`.
    pub fn job_id(&self) -> &str {
        self.0.split(SEPARATOR).next().unwrap_or_default()
    }
}

impl fmt::Display for ExecutionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExecutionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_forbidden(c: char) -> bool {
    c.is_whitespace()
        || c.is_control()
        || matches!(
            c,
            '<' | '>' | '{' | '}' | '[' | ']' | '?' | '*' | '"' | '#' | '%' | '\\' | '^' | '|'
                | '~' | '`' | '$' | '&' | ',' | ';' | ':' | '/'
        )
}

/// Replace characters the engine refuses in names.
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if is_forbidden(c) { '-' } else { c })
        .collect()
}

/// Sort-key values are free text; keep only alphanumerics, `-` and `.`.
fn slug(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
        .collect()
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
