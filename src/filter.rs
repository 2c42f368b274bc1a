//! Relevance filter for content-bucket notifications.
//!
//! Only translated documents start a workflow execution; uploads, write-access
//! checks and auxiliary details are skipped.

use crate::error::{PipelineError, PipelineResult};
use crate::key::{language_code, DETAILS_FOLDER, WRITE_ACCESS_CHECK_FILE};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Upload,
    WriteAccessCheck,
    TranslationDetails,
}

/// A translated document ready to hand to the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub job_id: String,
    pub language_code: String,
    /// Event key after `%3A` substitution, passed through unmodified.
    pub decoded_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Skip(SkipReason),
    Forward(TranslationResult),
}

/// Undo the colon escaping S3 applies to identity-pool ids in notification keys.
pub fn decode_event_key(raw: &str) -> String {
    raw.replace("%3A", ":")
}

/// Decide whether a notification key is a translation result.
///
/// Rules are checked in order and the first match wins. A key too short to
/// reach the forwarding rule is a structural mismatch, not a skip.
pub fn filter_event_key(raw: &str) -> PipelineResult<FilterDecision> {
    let decoded = decode_event_key(raw);
    let segments: Vec<&str> = decoded.split('/').collect();

    if segments.len() < 4 {
        return Err(PipelineError::InvalidKeyStructure(decoded));
    }

    let skip = if segments[3] == "upload" {
        Some(SkipReason::Upload)
    } else if segments.get(4) == Some(&WRITE_ACCESS_CHECK_FILE) {
        Some(SkipReason::WriteAccessCheck)
    } else if segments.get(5) == Some(&DETAILS_FOLDER) {
        Some(SkipReason::TranslationDetails)
    } else {
        None
    };

    if let Some(reason) = skip {
        debug!(key = %decoded, reason = ?reason, "Skipping non-result object");
        return Ok(FilterDecision::Skip(reason));
    }

    let language = segments
        .get(5)
        .and_then(|filename| language_code(filename))
        .map(str::to_string);
    let job_id = segments[2];

    match language {
        Some(language_code) if !job_id.is_empty() => Ok(FilterDecision::Forward(TranslationResult {
            job_id: job_id.to_string(),
            language_code,
            decoded_key: decoded.clone(),
        })),
        _ => Err(PipelineError::InvalidKeyStructure(decoded)),
    }
}
