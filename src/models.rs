use crate::naming::ExecutionName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ===== Trigger Models =====

#[derive(Debug, Clone, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3EventRecord {
    #[serde(default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Object {
    pub key: String,
    #[serde(default)]
    pub sequencer: Option<String>,
}

/// Input of the key parsing function: a single notification record, or the
/// bare key as passed by a workflow state.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParseKeyRequest {
    Record { s3: S3Entity },
    Key { key: String },
}

impl ParseKeyRequest {
    pub fn key(&self) -> &str {
        match self {
            ParseKeyRequest::Record { s3 } => &s3.object.key,
            ParseKeyRequest::Key { key } => key,
        }
    }
}

/// Change-data-capture batch; records are kept raw so they can be forwarded as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "eventID", default)]
    pub event_id: Option<String>,
    #[serde(rename = "eventName", default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub dynamodb: Option<StreamChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChange {
    #[serde(rename = "Keys", default)]
    pub keys: Option<HashMap<String, Value>>,
    #[serde(rename = "NewImage", default)]
    pub new_image: Option<Value>,
}

/// CloudWatch Logs subscription delivery: gzip-compressed, base64-encoded JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct LogsEvent {
    pub awslogs: LogsEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsEventData {
    pub data: String,
}

/// Decoded subscription payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsData {
    #[serde(default)]
    pub log_group: Option<String>,
    #[serde(default)]
    pub log_events: Vec<LogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub message: String,
}

/// Log line written when a sensitive-data discovery job finishes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PiiScanMessage {
    pub job_name: String,
}

// ===== Workflow Models =====

/// Payload handed to the workflow once the PII scan of a job completed.
pub const PII_SCAN_PAYLOAD: &str = "Pii detect complete";

/// Execution input consumed by the translation workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecutionInput {
    pub job_id: String,
    pub callback_attribute: String,
    pub payload: String,
}

impl JobExecutionInput {
    pub fn for_language(job_id: &str, language_code: &str, payload: String) -> Self {
        Self {
            job_id: job_id.to_string(),
            callback_attribute: language_code.to_string(),
            payload,
        }
    }

    /// Input for a finished PII scan; the callback attribute is configured.
    pub fn for_pii_scan(job_name: &str, callback_attribute: &str) -> Self {
        Self {
            job_id: job_name.to_string(),
            callback_attribute: callback_attribute.to_string(),
            payload: PII_SCAN_PAYLOAD.to_string(),
        }
    }

    pub fn execution_name(&self) -> ExecutionName {
        ExecutionName::for_translation(&self.job_id, &self.callback_attribute)
    }
}

/// One `StartExecution` call. A missing name lets the engine generate one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub state_machine_arn: String,
    pub name: Option<ExecutionName>,
    pub input: String,
}

impl StartRequest {
    pub fn label(&self) -> &str {
        self.name.as_ref().map(ExecutionName::as_str).unwrap_or("<generated>")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedExecution {
    pub execution_arn: String,
}

// ===== Outcome Models =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DispatchOutcome {
    Started {
        execution_name: String,
        execution_arn: String,
    },
    AlreadyStarted {
        execution_name: String,
    },
    Skipped {
        reason: String,
    },
    Failed {
        execution_name: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub started: usize,
    pub already_started: usize,
    pub skipped: usize,
    pub failed: usize,
    pub records: Vec<RecordOutcome>,
}

impl BatchOutcome {
    pub fn push(&mut self, event_id: Option<String>, outcome: DispatchOutcome) {
        match &outcome {
            DispatchOutcome::Started { .. } => self.started += 1,
            DispatchOutcome::AlreadyStarted { .. } => self.already_started += 1,
            DispatchOutcome::Skipped { .. } => self.skipped += 1,
            DispatchOutcome::Failed { .. } => self.failed += 1,
        }
        self.records.push(RecordOutcome { event_id, outcome });
    }
}
