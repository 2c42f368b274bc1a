//! Lambda entry points. Each binary wires one of these into `lambda_runtime`.

use crate::config::DispatcherConfig;
use crate::ddb::unmarshall;
use crate::dispatch::{Dispatcher, SfnExecutionStarter};
use crate::key::{parse_storage_key, StorageKey};
use crate::models::{BatchOutcome, DispatchOutcome, LogsEvent, ParseKeyRequest, S3Event, StreamEvent};
use crate::pii::scanned_job_name;
use crate::telemetry;
use crate::util::{self, RegexReplaceRequest, SplitRequest, TerminologiesRequest, TrimRequest};
use lambda_runtime::{Error, LambdaEvent};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Load configuration, metrics and the Step Functions client once per cold start.
pub async fn init_dispatcher(service_name: &str) -> Result<Arc<Dispatcher>, Error> {
    let config = DispatcherConfig::from_env().map_err(|e| {
        error!("Invalid dispatcher configuration: {}", e);
        e
    })?;

    if let Some(endpoint) = &config.metrics_endpoint {
        if let Err(e) = telemetry::init_metrics(service_name, endpoint) {
            warn!("Metrics disabled, exporter setup failed: {}", e);
        }
    }

    let starter = SfnExecutionStarter::from_env().await;
    Ok(Arc::new(Dispatcher::new(config, Arc::new(starter))))
}

fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T, Error> {
    serde_json::from_value(payload).map_err(|e| {
        error!("Failed to parse event: {}", e);
        e.into()
    })
}

pub async fn parse_s3_key(event: LambdaEvent<Value>) -> Result<StorageKey, Error> {
    let request: ParseKeyRequest = parse_payload(event.payload)?;
    info!(key = %request.key(), "Parsing storage key");

    let parsed = parse_storage_key(request.key()).map_err(|e| {
        error!("{}", e);
        e
    })?;
    Ok(parsed)
}

pub async fn pass_s3_event(
    event: LambdaEvent<Value>,
    dispatcher: Arc<Dispatcher>,
) -> Result<BatchOutcome, Error> {
    let notification: S3Event = parse_payload(event.payload)?;
    let result = dispatcher.dispatch_s3_event(&notification).await;
    telemetry::flush_metrics();
    Ok(result?)
}

pub async fn pass_dynamodb_stream(
    event: LambdaEvent<Value>,
    dispatcher: Arc<Dispatcher>,
) -> Result<BatchOutcome, Error> {
    let batch: StreamEvent = parse_payload(event.payload)?;
    info!(records = batch.records.len(), "Received stream batch");
    let result = dispatcher.dispatch_stream_batch(&batch).await;
    telemetry::flush_metrics();
    Ok(result?)
}

/// Forward the whole event as execution input; the engine names the execution.
pub async fn pass_event(
    event: LambdaEvent<Value>,
    dispatcher: Arc<Dispatcher>,
) -> Result<DispatchOutcome, Error> {
    let result = dispatcher.dispatch_raw_event(&event.payload).await;
    telemetry::flush_metrics();
    Ok(result?)
}

/// Resume the job named in a PII scan completion log line.
pub async fn parse_macie_result(
    event: LambdaEvent<Value>,
    dispatcher: Arc<Dispatcher>,
) -> Result<DispatchOutcome, Error> {
    let delivery: LogsEvent = parse_payload(event.payload)?;
    let job_name = scanned_job_name(&delivery).map_err(|e| {
        error!("{}", e);
        e
    })?;
    info!(job_name = %job_name, "PII scan finished");

    let result = dispatcher.dispatch_pii_scan(&job_name).await;
    telemetry::flush_metrics();
    Ok(result?)
}

#[derive(Debug, Deserialize)]
struct DecodeKeyRequest {
    payload: String,
}

pub async fn decode_s3_key(event: LambdaEvent<Value>) -> Result<String, Error> {
    let request: DecodeKeyRequest = parse_payload(event.payload)?;
    Ok(util::decode_s3_key(&request.payload)?)
}

pub async fn unmarshall_ddb(event: LambdaEvent<Value>) -> Result<Value, Error> {
    Ok(unmarshall(&event.payload))
}

pub async fn util_trim(event: LambdaEvent<Value>) -> Result<String, Error> {
    let request: TrimRequest = parse_payload(event.payload)?;
    Ok(util::trim(&request))
}

pub async fn util_regex_replace(event: LambdaEvent<Value>) -> Result<String, Error> {
    let request: RegexReplaceRequest = parse_payload(event.payload)?;
    util::regex_replace(&request).map_err(|e| {
        error!("Regex replace failed: {:#}", e);
        e.into()
    })
}

pub async fn util_split(event: LambdaEvent<Value>) -> Result<Vec<String>, Error> {
    let request: SplitRequest = parse_payload(event.payload)?;
    Ok(util::split(&request))
}

pub async fn parse_terminologies(event: LambdaEvent<Value>) -> Result<Vec<String>, Error> {
    let request: TerminologiesRequest = parse_payload(event.payload)?;
    let names = util::parse_terminologies(&request);
    info!(count = names.len(), "Parsed terminologies");
    Ok(names)
}
