use crate::error::{PipelineError, PipelineResult};
use serde::Serialize;
use std::fmt;
use tracing::info;

pub const STATE_MACHINE_ARN_VAR: &str = "STATE_MACHINE_ARN";
/// Name used by the existing infrastructure wiring.
pub const LEGACY_STATE_MACHINE_ARN_VAR: &str = "stateMachineArn";
pub const PARTITION_KEY_NAME_VAR: &str = "PARTITION_KEY_NAME";
pub const PARTITION_KEY_TYPE_VAR: &str = "PARTITION_KEY_TYPE";
pub const SORT_KEY_NAME_VAR: &str = "SORT_KEY_NAME";
pub const SORT_KEY_TYPE_VAR: &str = "SORT_KEY_TYPE";
pub const METRICS_ENDPOINT_VAR: &str = "OTEL_METRICS_ENDPOINT";
pub const PII_CALLBACK_ATTRIBUTE_VAR: &str = "PII_CALLBACK_ATTRIBUTE";
pub const LEGACY_PII_CALLBACK_ATTRIBUTE_VAR: &str = "attributeForPiiCallback";

const DEFAULT_PARTITION_KEY_NAME: &str = "id";
/// Job record attribute the PII workflow callback token is stored under.
pub const DEFAULT_PII_CALLBACK_ATTRIBUTE: &str = "piiCallback";

/// DynamoDB scalar type of a table key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum AttributeKind {
    #[default]
    S,
    N,
    B,
}

impl AttributeKind {
    pub fn parse(value: &str) -> PipelineResult<Self> {
        match value {
            "S" => Ok(AttributeKind::S),
            "N" => Ok(AttributeKind::N),
            "B" => Ok(AttributeKind::B),
            other => Err(PipelineError::InvalidConfiguration(format!(
                "key attribute type must be S, N or B, got {:?}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::S => "S",
            AttributeKind::N => "N",
            AttributeKind::B => "B",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyAttribute {
    pub name: String,
    pub kind: AttributeKind,
}

/// Dispatcher settings, read and validated once when the function starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub state_machine_arn: String,
    pub partition_key: KeyAttribute,
    pub sort_key: Option<KeyAttribute>,
    pub metrics_endpoint: Option<String>,
    pub pii_callback_attribute: String,
}

impl DispatcherConfig {
    pub fn new(state_machine_arn: impl Into<String>) -> Self {
        Self {
            state_machine_arn: state_machine_arn.into(),
            partition_key: KeyAttribute {
                name: DEFAULT_PARTITION_KEY_NAME.to_string(),
                kind: AttributeKind::S,
            },
            sort_key: None,
            metrics_endpoint: None,
            pii_callback_attribute: DEFAULT_PII_CALLBACK_ATTRIBUTE.to_string(),
        }
    }

    pub fn with_sort_key(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.sort_key = Some(KeyAttribute {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn from_env() -> PipelineResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let state_machine_arn = var(STATE_MACHINE_ARN_VAR)
            .or_else(|| var(LEGACY_STATE_MACHINE_ARN_VAR))
            .ok_or_else(|| PipelineError::ConfigurationMissing(STATE_MACHINE_ARN_VAR.to_string()))?;

        let partition_key = KeyAttribute {
            name: var(PARTITION_KEY_NAME_VAR).unwrap_or_else(|| DEFAULT_PARTITION_KEY_NAME.to_string()),
            kind: var(PARTITION_KEY_TYPE_VAR)
                .map(|v| AttributeKind::parse(&v))
                .transpose()?
                .unwrap_or_default(),
        };

        let sort_key_kind = var(SORT_KEY_TYPE_VAR)
            .map(|v| AttributeKind::parse(&v))
            .transpose()?;
        let sort_key = match (var(SORT_KEY_NAME_VAR), sort_key_kind) {
            (Some(name), kind) => Some(KeyAttribute {
                name,
                kind: kind.unwrap_or_default(),
            }),
            (None, Some(_)) => {
                return Err(PipelineError::InvalidConfiguration(format!(
                    "{} is set without {}",
                    SORT_KEY_TYPE_VAR, SORT_KEY_NAME_VAR
                )))
            }
            (None, None) => None,
        };

        let config = Self {
            state_machine_arn,
            partition_key,
            sort_key,
            metrics_endpoint: var(METRICS_ENDPOINT_VAR),
            pii_callback_attribute: var(PII_CALLBACK_ATTRIBUTE_VAR)
                .or_else(|| var(LEGACY_PII_CALLBACK_ATTRIBUTE_VAR))
                .unwrap_or_else(|| DEFAULT_PII_CALLBACK_ATTRIBUTE.to_string()),
        };

        info!(
            state_machine_arn = %config.state_machine_arn,
            partition_key = %config.partition_key.name,
            partition_key_type = %config.partition_key.kind,
            "Loaded dispatcher configuration"
        );
        if config.sort_key.is_none() {
            info!("No sort key configured, execution names omit the sort-key segment");
        }

        Ok(config)
    }
}
