//! Starts workflow executions for relevant events.
//!
//! Each relevant event maps to exactly one execution whose name is a pure
//! function of the event. A duplicate start is reported by the engine as
//! `ExecutionAlreadyExists` and counts as success.

use crate::config::{DispatcherConfig, KeyAttribute};
use crate::error::{PipelineError, PipelineResult};
use crate::filter::{filter_event_key, FilterDecision, TranslationResult};
use crate::job::JobStateRecord;
use crate::models::{
    BatchOutcome, DispatchOutcome, JobExecutionInput, S3Event, StartRequest, StartedExecution,
    StreamEvent, StreamRecord,
};
use crate::naming::ExecutionName;
use crate::telemetry::{self, Trigger};
use async_trait::async_trait;
use aws_sdk_sfn::error::DisplayErrorContext;
use aws_sdk_sfn::operation::start_execution::StartExecutionError;
use aws_sdk_sfn::Client as SfnClient;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Stream event name of a newly created item.
pub const INSERT_EVENT: &str = "INSERT";

#[async_trait]
pub trait ExecutionStarter: Send + Sync {
    /// Start one execution without waiting for it to run.
    ///
    /// A name collision must surface as [`PipelineError::ExecutionAlreadyExists`].
    async fn start_execution(&self, request: &StartRequest) -> PipelineResult<StartedExecution>;
}

pub struct SfnExecutionStarter {
    client: SfnClient,
}

impl SfnExecutionStarter {
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(SfnClient::new(&config))
    }

    pub fn new(client: SfnClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecutionStarter for SfnExecutionStarter {
    async fn start_execution(&self, request: &StartRequest) -> PipelineResult<StartedExecution> {
        let label = request.label().to_string();

        let output = self
            .client
            .start_execution()
            .state_machine_arn(&request.state_machine_arn)
            .set_name(request.name.as_ref().map(|n| n.as_str().to_string()))
            .input(&request.input)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                StartExecutionError::ExecutionAlreadyExists(_) => {
                    PipelineError::ExecutionAlreadyExists(label.clone())
                }
                other => PipelineError::DownstreamCallFailure {
                    name: label.clone(),
                    message: DisplayErrorContext(&other).to_string(),
                },
            })?;

        Ok(StartedExecution {
            execution_arn: output.execution_arn().to_string(),
        })
    }
}

/// A stream record after validation: either a request to start, or a skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRecord {
    pub event_id: Option<String>,
    pub action: PlannedAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Start(StartRequest),
    Skip(String),
}

pub struct Dispatcher {
    config: DispatcherConfig,
    starter: Arc<dyn ExecutionStarter>,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, starter: Arc<dyn ExecutionStarter>) -> Self {
        Self { config, starter }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Request for one translated document: `{jobId}_{languageCode}`.
    pub fn translation_request(&self, result: &TranslationResult) -> PipelineResult<StartRequest> {
        let input = JobExecutionInput::for_language(
            &result.job_id,
            &result.language_code,
            result.decoded_key.clone(),
        );
        Ok(StartRequest {
            state_machine_arn: self.config.state_machine_arn.clone(),
            name: Some(input.execution_name()),
            input: serde_json::to_string(&input)?,
        })
    }

    /// Filter one notification key and start its execution if it is a result.
    ///
    /// Downstream failures propagate so the event source can retry.
    pub async fn dispatch_s3_key(&self, raw_key: &str) -> PipelineResult<DispatchOutcome> {
        match filter_event_key(raw_key)? {
            FilterDecision::Skip(reason) => {
                telemetry::record_dispatch(Trigger::S3, "skipped");
                Ok(DispatchOutcome::Skipped {
                    reason: format!("{:?}", reason),
                })
            }
            FilterDecision::Forward(result) => {
                info!(
                    job_id = %result.job_id,
                    language = %result.language_code,
                    "Translation result received"
                );
                let request = self.translation_request(&result)?;
                self.start(request, Trigger::S3).await
            }
        }
    }

    /// Dispatch every record of a notification.
    ///
    /// A notification with a single record is a single event, and its failure
    /// propagates so the event source retries. With several records, a failing
    /// record is reported in the outcome and the rest are still attempted.
    pub async fn dispatch_s3_event(&self, event: &S3Event) -> PipelineResult<BatchOutcome> {
        if event.records.is_empty() {
            return Err(PipelineError::MalformedEvent(
                "notification has no records".to_string(),
            ));
        }

        let single = event.records.len() == 1;
        let mut batch = BatchOutcome::default();
        for record in &event.records {
            let key = &record.s3.object.key;
            debug!(
                event_name = ?record.event_name,
                sequencer = ?record.s3.object.sequencer,
                "Processing notification record"
            );
            let outcome = match self.dispatch_s3_key(key).await {
                Ok(outcome) => outcome,
                Err(e) if single => return Err(e),
                Err(e) => {
                    warn!(key = %key, "Notification record failed, continuing: {}", e);
                    DispatchOutcome::Failed {
                        execution_name: e.execution_name().unwrap_or_default().to_string(),
                        error: e.to_string(),
                    }
                }
            };
            batch.push(record.s3.object.sequencer.clone(), outcome);
        }

        if !single {
            info!(
                started = batch.started,
                already_started = batch.already_started,
                skipped = batch.skipped,
                failed = batch.failed,
                "Notification dispatched"
            );
        }
        Ok(batch)
    }

    /// Resume a job once its PII scan finished: `{jobName}_pii`, with the
    /// configured callback attribute.
    pub async fn dispatch_pii_scan(&self, job_name: &str) -> PipelineResult<DispatchOutcome> {
        if job_name.is_empty() {
            return Err(PipelineError::MalformedEvent("jobName is empty".to_string()));
        }
        let input = JobExecutionInput::for_pii_scan(job_name, &self.config.pii_callback_attribute);
        let request = StartRequest {
            state_machine_arn: self.config.state_machine_arn.clone(),
            name: Some(ExecutionName::for_pii_scan(job_name)),
            input: serde_json::to_string(&input)?,
        };
        self.start(request, Trigger::Pii).await
    }

    /// Forward an arbitrary event as the execution input; the engine names it.
    pub async fn dispatch_raw_event(&self, event: &Value) -> PipelineResult<DispatchOutcome> {
        let request = StartRequest {
            state_machine_arn: self.config.state_machine_arn.clone(),
            name: None,
            input: serde_json::to_string(event)?,
        };
        self.start(request, Trigger::Event).await
    }

    /// Validate every record of a stream batch and build its request.
    ///
    /// Fails before anything is started if a record lacks its keys.
    pub fn plan_stream_batch(&self, event: &StreamEvent) -> PipelineResult<Vec<PlannedRecord>> {
        if event.records.is_empty() {
            return Err(PipelineError::MalformedEvent("stream batch has no records".to_string()));
        }

        event
            .records
            .iter()
            .enumerate()
            .map(|(index, raw)| self.plan_stream_record(index, raw))
            .collect()
    }

    fn plan_stream_record(&self, index: usize, raw: &Value) -> PipelineResult<PlannedRecord> {
        let record: StreamRecord = serde_json::from_value(raw.clone()).map_err(|e| {
            PipelineError::MalformedEvent(format!("record {} is not a stream record: {}", index, e))
        })?;
        let event_name = record.event_name.as_deref().unwrap_or_default();

        if event_name != INSERT_EVENT {
            debug!(index, event_name, "Skipping non-insert record");
            return Ok(PlannedRecord {
                event_id: record.event_id,
                action: PlannedAction::Skip(event_name.to_string()),
            });
        }

        let change = record
            .dynamodb
            .as_ref()
            .ok_or_else(|| PipelineError::MalformedEvent(format!("record {} has no dynamodb section", index)))?;
        let keys = change
            .keys
            .as_ref()
            .ok_or_else(|| PipelineError::MalformedEvent(format!("record {} has no Keys", index)))?;

        let partition_value = key_value(keys, &self.config.partition_key, index)?;
        let sort_value = self
            .config
            .sort_key
            .as_ref()
            .map(|attr| key_value(keys, attr, index))
            .transpose()?;

        if let Some(image) = &change.new_image {
            match JobStateRecord::from_stream_image(image) {
                Ok(job) => info!(
                    job_id = %job.job_id,
                    job_status = ?job.job_status,
                    targets = job.language_targets.len(),
                    pending = job.languages_without_status().len(),
                    "New job record"
                ),
                Err(e) => debug!(index, "New image is not a job record: {}", e),
            }
        }

        let name = ExecutionName::for_stream_record(
            partition_value,
            record.event_id.as_deref(),
            sort_value,
        );

        Ok(PlannedRecord {
            event_id: record.event_id,
            action: PlannedAction::Start(StartRequest {
                state_machine_arn: self.config.state_machine_arn.clone(),
                name: Some(name),
                input: serde_json::to_string(raw)?,
            }),
        })
    }

    /// Start one execution per inserted record.
    ///
    /// Every record is attempted; a failed start is recorded in the outcome and
    /// the batch carries on.
    pub async fn dispatch_stream_batch(&self, event: &StreamEvent) -> PipelineResult<BatchOutcome> {
        let planned = self.plan_stream_batch(event)?;

        let mut results: Vec<(Option<String>, String, PipelineResult<DispatchOutcome>)> =
            Vec::with_capacity(planned.len());
        for record in planned {
            match record.action {
                PlannedAction::Skip(event_name) => {
                    telemetry::record_dispatch(Trigger::Stream, "skipped");
                    results.push((
                        record.event_id,
                        String::new(),
                        Ok(DispatchOutcome::Skipped { reason: event_name }),
                    ));
                }
                PlannedAction::Start(request) => {
                    let label = request.label().to_string();
                    let result = self.start(request, Trigger::Stream).await;
                    results.push((record.event_id, label, result));
                }
            }
        }

        let mut batch = BatchOutcome::default();
        for (event_id, label, result) in results {
            let outcome = result.unwrap_or_else(|e| DispatchOutcome::Failed {
                execution_name: label,
                error: e.to_string(),
            });
            batch.push(event_id, outcome);
        }

        info!(
            started = batch.started,
            already_started = batch.already_started,
            skipped = batch.skipped,
            failed = batch.failed,
            "Stream batch dispatched"
        );
        Ok(batch)
    }

    async fn start(&self, request: StartRequest, trigger: Trigger) -> PipelineResult<DispatchOutcome> {
        let execution_name = request.label().to_string();
        let job_id = request.name.as_ref().map(ExecutionName::job_id).unwrap_or_default();

        match self.starter.start_execution(&request).await {
            Ok(started) => {
                info!(
                    job_id,
                    execution_name = %execution_name,
                    execution_arn = %started.execution_arn,
                    trigger = trigger.as_str(),
                    outcome = "started",
                    "Started workflow execution"
                );
                telemetry::record_dispatch(trigger, "started");
                Ok(DispatchOutcome::Started {
                    execution_name,
                    execution_arn: started.execution_arn,
                })
            }
            Err(e) if e.is_benign() => {
                warn!(
                    job_id,
                    execution_name = %execution_name,
                    trigger = trigger.as_str(),
                    outcome = "already_exists",
                    "Execution already started, ignoring duplicate"
                );
                telemetry::record_dispatch(trigger, "already_exists");
                Ok(DispatchOutcome::AlreadyStarted { execution_name })
            }
            Err(e) => {
                error!(
                    job_id,
                    execution_name = %execution_name,
                    trigger = trigger.as_str(),
                    outcome = "failed",
                    input = %request.input,
                    "Failed to start workflow execution: {}",
                    e
                );
                telemetry::record_dispatch(trigger, "failed");
                Err(e)
            }
        }
    }
}

/// Read a key attribute as its string form, e.g. `Keys.id.S`.
fn key_value<'a>(
    keys: &'a HashMap<String, Value>,
    attribute: &KeyAttribute,
    index: usize,
) -> PipelineResult<&'a str> {
    keys.get(&attribute.name)
        .and_then(|typed| typed.get(attribute.kind.as_str()))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            PipelineError::MalformedEvent(format!(
                "record {} has no {} key {}",
                index, attribute.kind, attribute.name
            ))
        })
}
