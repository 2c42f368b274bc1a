use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Could not determine key structure: {0}")]
    InvalidKeyStructure(String),

    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Execution already exists: {0}")]
    ExecutionAlreadyExists(String),

    #[error("Workflow start failed for {name}: {message}")]
    DownstreamCallFailure { name: String, message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl PipelineError {
    /// Duplicate starts are the deduplication mechanism, not a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, PipelineError::ExecutionAlreadyExists(_))
    }

    /// Execution the error refers to, when it got as far as naming one.
    pub fn execution_name(&self) -> Option<&str> {
        match self {
            PipelineError::ExecutionAlreadyExists(name) => Some(name),
            PipelineError::DownstreamCallFailure { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Setup defects that must fail the invocation before any work starts.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ConfigurationMissing(_)
                | PipelineError::InvalidConfiguration(_)
                | PipelineError::MalformedEvent(_)
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
