//! Completion notices of the PII scan, delivered through a CloudWatch Logs
//! subscription filter.

use crate::error::{PipelineError, PipelineResult};
use crate::models::{LogsData, LogsEvent, PiiScanMessage};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::debug;

/// Base64-decode and gunzip the subscription payload.
pub fn decode_logs_data(event: &LogsEvent) -> PipelineResult<LogsData> {
    let compressed = STANDARD
        .decode(event.awslogs.data.trim())
        .map_err(|e| PipelineError::MalformedEvent(format!("awslogs.data is not base64: {}", e)))?;

    let mut decompressed = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut decompressed)
        .map_err(|e| PipelineError::MalformedEvent(format!("awslogs.data is not gzip: {}", e)))?;

    let data: LogsData = serde_json::from_slice(&decompressed)
        .map_err(|e| PipelineError::MalformedEvent(format!("awslogs.data is not log JSON: {}", e)))?;
    debug!(
        log_group = ?data.log_group,
        events = data.log_events.len(),
        "Decoded log subscription payload"
    );
    Ok(data)
}

/// Job name carried by the first log event of the delivery.
pub fn scanned_job_name(event: &LogsEvent) -> PipelineResult<String> {
    let data = decode_logs_data(event)?;
    let first = data
        .log_events
        .first()
        .ok_or_else(|| PipelineError::MalformedEvent("log delivery has no events".to_string()))?;

    let message: PiiScanMessage = serde_json::from_str(&first.message).map_err(|e| {
        PipelineError::MalformedEvent(format!("log message {:?} has no jobName: {}", first.id, e))
    })?;
    if message.job_name.is_empty() {
        return Err(PipelineError::MalformedEvent("jobName is empty".to_string()));
    }
    Ok(message.job_name)
}

#[cfg(test)]
pub(crate) fn encode_logs_data(data: &serde_json::Value) -> String {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data.to_string().as_bytes()).unwrap();
    STANDARD.encode(encoder.finish().unwrap())
}
