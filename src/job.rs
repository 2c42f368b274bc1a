//! Job record held in the jobs table.
//!
//! The record is owned by the API and workflow layer; this crate only reads it
//! for context. Per-language maps are keyed by [`lang_attribute`].

use crate::ddb::unmarshall;
use crate::error::PipelineResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Prefix making language codes safe as DynamoDB map keys.
pub const ATTRIBUTE_SAFE_PREFIX: &str = "lang";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Uploaded,
    Processing,
    Completed,
    Expired,
    Aborted,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStateRecord {
    #[serde(rename = "id")]
    pub job_id: String,
    #[serde(default)]
    pub job_identity: Option<String>,
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub language_source: Option<String>,
    #[serde(default)]
    pub language_targets: BTreeSet<String>,
    #[serde(default)]
    pub job_status: Option<JobStatus>,
    #[serde(default)]
    pub translate_status: HashMap<String, String>,
    #[serde(default)]
    pub translate_key: HashMap<String, String>,
    #[serde(default)]
    pub translate_callback: HashMap<String, Value>,
}

/// Map key for a target language, e.g. `langfr`.
pub fn lang_attribute(language_code: &str) -> String {
    format!("{}{}", ATTRIBUTE_SAFE_PREFIX, language_code)
}

impl JobStateRecord {
    /// Decode a stream `NewImage` (attribute-value JSON).
    pub fn from_stream_image(image: &Value) -> PipelineResult<Self> {
        Ok(serde_json::from_value(unmarshall(image))?)
    }

    pub fn translate_status(&self, language_code: &str) -> Option<&str> {
        self.translate_status
            .get(&lang_attribute(language_code))
            .map(String::as_str)
    }

    pub fn translate_key(&self, language_code: &str) -> Option<&str> {
        self.translate_key
            .get(&lang_attribute(language_code))
            .map(String::as_str)
    }

    pub fn translate_callback(&self, language_code: &str) -> Option<&Value> {
        self.translate_callback.get(&lang_attribute(language_code))
    }

    /// Targets that have not reported any status yet.
    pub fn languages_without_status(&self) -> Vec<&str> {
        self.language_targets
            .iter()
            .filter(|lang| self.translate_status(lang).is_none())
            .map(String::as_str)
            .collect()
    }
}
