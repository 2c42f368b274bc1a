//! Dispatcher behaviour against an in-memory engine that enforces execution
//! name uniqueness the way Step Functions does.

use async_trait::async_trait;
use doc_translation_dispatch::models::{DispatchOutcome, S3Event, StartRequest, StartedExecution, StreamEvent};
use doc_translation_dispatch::{Dispatcher, DispatcherConfig, ExecutionStarter, PipelineError, PipelineResult};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct InMemoryEngine {
    names: Mutex<HashSet<String>>,
    requests: Mutex<Vec<StartRequest>>,
    failing: HashSet<String>,
}

impl InMemoryEngine {
    fn failing_on(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<StartRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionStarter for InMemoryEngine {
    async fn start_execution(&self, request: &StartRequest) -> PipelineResult<StartedExecution> {
        self.requests.lock().unwrap().push(request.clone());
        let name = request.label().to_string();

        if self.failing.contains(&name) {
            return Err(PipelineError::DownstreamCallFailure {
                name,
                message: "ThrottlingException".to_string(),
            });
        }
        if request.name.is_some() && !self.names.lock().unwrap().insert(name.clone()) {
            return Err(PipelineError::ExecutionAlreadyExists(name));
        }
        Ok(StartedExecution {
            execution_arn: format!("arn:aws:states:us-east-1:123:execution:sm:{}", name),
        })
    }
}

fn setup(engine: InMemoryEngine) -> (Dispatcher, Arc<InMemoryEngine>) {
    let engine = Arc::new(engine);
    let dispatcher = Dispatcher::new(DispatcherConfig::new("arn:aws:states:us-east-1:123:stateMachine:sm"), engine.clone());
    (dispatcher, engine)
}

fn s3_event(keys: &[&str]) -> S3Event {
    let records: Vec<Value> = keys
        .iter()
        .map(|key| {
            json!({
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": { "bucket": { "name": "content" }, "object": { "key": key, "sequencer": "0A1B" } }
            })
        })
        .collect();
    serde_json::from_value(json!({ "Records": records })).unwrap()
}

fn insert_record(id: &str, event_id: &str) -> Value {
    json!({
        "eventID": event_id,
        "eventName": "INSERT",
        "dynamodb": {
            "Keys": { "id": { "S": id } },
            "NewImage": {
                "id": { "S": id },
                "jobStatus": { "S": "UPLOADED" },
                "languageTargets": { "SS": ["fr", "de"] }
            }
        }
    })
}

#[tokio::test]
async fn test_translation_output_starts_named_execution() {
    let (dispatcher, engine) = setup(InMemoryEngine::default());
    let key = "private/us-east-1%3Aowner/job-1/output/123-TranslateText-abc/fr.report.docx";

    let batch = dispatcher.dispatch_s3_event(&s3_event(&[key])).await.unwrap();

    assert!(matches!(
        &batch.records[0].outcome,
        DispatchOutcome::Started { execution_name, .. } if execution_name == "job-1_fr"
    ));
    let requests = engine.requests();
    assert_eq!(requests.len(), 1);
    let input: Value = serde_json::from_str(&requests[0].input).unwrap();
    assert_eq!(
        input,
        json!({
            "jobId": "job-1",
            "callbackAttribute": "fr",
            "payload": "private/us-east-1:owner/job-1/output/123-TranslateText-abc/fr.report.docx"
        })
    );
}

#[tokio::test]
async fn test_redelivered_notification_is_idempotent() {
    let (dispatcher, engine) = setup(InMemoryEngine::default());
    let key = "private/o/job-1/output/run/de.report.docx";

    let first = dispatcher.dispatch_s3_key(key).await.unwrap();
    let second = dispatcher.dispatch_s3_key(key).await.unwrap();

    assert!(matches!(first, DispatchOutcome::Started { .. }));
    assert_eq!(
        second,
        DispatchOutcome::AlreadyStarted {
            execution_name: "job-1_de".to_string()
        }
    );
    let requests = engine.requests();
    assert_eq!(requests[0].name, requests[1].name);
}

#[tokio::test]
async fn test_non_result_objects_do_not_start_executions() {
    let (dispatcher, engine) = setup(InMemoryEngine::default());
    let event = s3_event(&[
        "private/o/j/upload/doc.docx",
        "private/o/j/output/.write_access_check_file.temp",
        "private/o/j/output/run/details/fr.auxiliary-translation-details.json",
    ]);

    let batch = dispatcher.dispatch_s3_event(&event).await.unwrap();

    assert_eq!(batch.skipped, 3);
    assert!(engine.requests().is_empty());
}

#[tokio::test]
async fn test_s3_downstream_failure_propagates() {
    let (dispatcher, _engine) = setup(InMemoryEngine::failing_on(&["job-1_fr"]));
    let err = dispatcher
        .dispatch_s3_key("private/o/job-1/output/run/fr.doc")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::DownstreamCallFailure { .. }));
}

#[tokio::test]
async fn test_single_record_notification_failure_propagates() {
    let (dispatcher, _engine) = setup(InMemoryEngine::failing_on(&["job-1_fr"]));
    let err = dispatcher
        .dispatch_s3_event(&s3_event(&["private/o/job-1/output/run/fr.doc"]))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::DownstreamCallFailure { .. }));
}

#[tokio::test]
async fn test_notification_continues_past_failed_record() {
    let (dispatcher, engine) = setup(InMemoryEngine::failing_on(&["job-a_fr"]));
    let event = s3_event(&[
        "private/o/job-a/output/run/fr.doc",
        "not/a/key",
        "private/o/job-b/output/run/de.doc",
    ]);

    let batch = dispatcher.dispatch_s3_event(&event).await.unwrap();

    assert_eq!((batch.started, batch.failed), (1, 2));
    assert_eq!(
        batch.records[0].outcome,
        DispatchOutcome::Failed {
            execution_name: "job-a_fr".to_string(),
            error: "Workflow start failed for job-a_fr: ThrottlingException".to_string(),
        }
    );
    assert!(matches!(
        &batch.records[2].outcome,
        DispatchOutcome::Started { execution_name, .. } if execution_name == "job-b_de"
    ));
    let attempted: Vec<String> = engine.requests().iter().map(|r| r.label().to_string()).collect();
    assert_eq!(attempted, vec!["job-a_fr", "job-b_de"]);
}

#[tokio::test]
async fn test_empty_notification_is_rejected() {
    let (dispatcher, _engine) = setup(InMemoryEngine::default());
    let err = dispatcher.dispatch_s3_event(&s3_event(&[])).await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_stream_batch_continues_past_failures() {
    let (dispatcher, engine) = setup(InMemoryEngine::failing_on(&["job-a_evt-a"]));
    let batch: StreamEvent = serde_json::from_value(json!({
        "Records": [
            insert_record("job-a", "evt-a"),
            { "eventID": "evt-m", "eventName": "MODIFY", "dynamodb": { "Keys": { "id": { "S": "job-a" } } } },
            insert_record("job-b", "evt-b"),
        ]
    }))
    .unwrap();

    let outcome = dispatcher.dispatch_stream_batch(&batch).await.unwrap();

    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.started, 1);
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.records[2].event_id.as_deref(), Some("evt-b"));
    assert_eq!(engine.requests().len(), 2);
}

#[tokio::test]
async fn test_stream_redelivery_is_already_started() {
    let (dispatcher, _engine) = setup(InMemoryEngine::default());
    let batch: StreamEvent =
        serde_json::from_value(json!({ "Records": [insert_record("job-a", "evt-a")] })).unwrap();

    dispatcher.dispatch_stream_batch(&batch).await.unwrap();
    let again = dispatcher.dispatch_stream_batch(&batch).await.unwrap();

    assert_eq!(again.already_started, 1);
    assert_eq!(again.failed, 0);
}

#[tokio::test]
async fn test_stream_batch_with_missing_keys_starts_nothing() {
    let (dispatcher, engine) = setup(InMemoryEngine::default());
    let batch: StreamEvent = serde_json::from_value(json!({
        "Records": [
            insert_record("job-a", "evt-a"),
            { "eventID": "evt-x", "eventName": "INSERT", "dynamodb": { "Keys": { "other": { "S": "x" } } } }
        ]
    }))
    .unwrap();

    let err = dispatcher.dispatch_stream_batch(&batch).await.unwrap_err();

    assert!(matches!(err, PipelineError::MalformedEvent(_)));
    assert!(engine.requests().is_empty());
}

#[tokio::test]
async fn test_pii_scan_resumes_job_once() {
    let (dispatcher, engine) = setup(InMemoryEngine::default());

    let first = dispatcher.dispatch_pii_scan("job-9").await.unwrap();
    let second = dispatcher.dispatch_pii_scan("job-9").await.unwrap();

    assert!(matches!(
        first,
        DispatchOutcome::Started { ref execution_name, .. } if execution_name == "job-9_pii"
    ));
    assert!(matches!(second, DispatchOutcome::AlreadyStarted { .. }));
    let input: Value = serde_json::from_str(&engine.requests()[0].input).unwrap();
    assert_eq!(input["callbackAttribute"], "piiCallback");
    assert_eq!(input["payload"], "Pii detect complete");
}

#[tokio::test]
async fn test_raw_event_lets_engine_name_execution() {
    let (dispatcher, engine) = setup(InMemoryEngine::default());
    let event = json!({ "source": "aws.s3", "detail-type": "Object Deleted", "detail": { "id": 1 } });

    dispatcher.dispatch_raw_event(&event).await.unwrap();
    dispatcher.dispatch_raw_event(&event).await.unwrap();

    let requests = engine.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.name.is_none()));
    assert_eq!(serde_json::from_str::<Value>(&requests[0].input).unwrap(), event);
}
