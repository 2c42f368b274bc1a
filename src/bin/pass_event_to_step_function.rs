use doc_translation_dispatch::handlers::{self, init_dispatcher};
use doc_translation_dispatch::telemetry;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init_tracing();

    info!("Initializing pass-event-to-step-function");
    let dispatcher = init_dispatcher("pass-event-to-step-function").await?;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let dispatcher = dispatcher.clone();
        async move { handlers::pass_event(event, dispatcher).await }
    }))
    .await
}
