use doc_translation_dispatch::{handlers, telemetry};
use lambda_runtime::{service_fn, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init_tracing();
    lambda_runtime::run(service_fn(handlers::parse_s3_key)).await
}
