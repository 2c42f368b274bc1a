//! Job routing for the document translation pipeline.
//!
//! Classifies content-bucket object keys, filters storage notifications down
//! to translation results, and starts deterministically named Step Functions
//! executions from S3 notifications, DynamoDB streams and PII scan logs.

pub mod config;
pub mod ddb;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod job;
pub mod key;
pub mod models;
pub mod naming;
pub mod pii;
pub mod telemetry;
pub mod util;

pub use crate::config::DispatcherConfig;
pub use crate::dispatch::{Dispatcher, ExecutionStarter, SfnExecutionStarter};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::key::{parse_storage_key, StorageKey};
pub use crate::naming::ExecutionName;
