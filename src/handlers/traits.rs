use async_trait::async_trait;
use thiserror::Error;

use super::types::{JobOutput, JobRequest};
use crate::command::DecodeError;
use crate::config::HandlersConfig;
use crate::convert::ConvertError;
use crate::fetch::FetchError;
use crate::imaging::{ComposeError, GridError};
use crate::storage::StorageError;

/// Errors a handler reports for a single job
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid {operation} command format")]
    CommandFormat { operation: String },
    #[error("invalid parameter '{field}': {reason}")]
    InvalidParameter { field: String, reason: String },
    #[error("{0}")]
    GridSize(String),
    #[error("{0}")]
    UpstreamResource(String),
    #[error("{0}")]
    ExternalProcess(String),
    #[error("{0}")]
    Encode(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl OperationError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        OperationError::InvalidParameter {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the request itself rather than by a
    /// dependency or by this service.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            OperationError::CommandFormat { .. }
                | OperationError::InvalidParameter { .. }
                | OperationError::GridSize(_)
        )
    }
}

impl From<DecodeError> for OperationError {
    fn from(err: DecodeError) -> Self {
        OperationError::InvalidParameter {
            field: err.field,
            reason: err.reason,
        }
    }
}

impl From<GridError> for OperationError {
    fn from(err: GridError) -> Self {
        OperationError::GridSize(err.to_string())
    }
}

impl From<ComposeError> for OperationError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::Grid(grid) => grid.into(),
            other => OperationError::Encode(other.to_string()),
        }
    }
}

impl From<StorageError> for OperationError {
    fn from(err: StorageError) -> Self {
        OperationError::UpstreamResource(err.to_string())
    }
}

impl From<FetchError> for OperationError {
    fn from(err: FetchError) -> Self {
        OperationError::UpstreamResource(format!("retrieve resource data failed, {err}"))
    }
}

impl From<ConvertError> for OperationError {
    fn from(err: ConvertError) -> Self {
        OperationError::ExternalProcess(err.to_string())
    }
}

impl From<std::io::Error> for OperationError {
    fn from(err: std::io::Error) -> Self {
        OperationError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for OperationError {
    fn from(err: tokio::task::JoinError) -> Self {
        OperationError::Internal(format!("worker task failed: {err}"))
    }
}

/// A handler rejected its configuration at registration time
#[derive(Debug, Error)]
pub enum HandlerConfigError {
    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },
    #[error("{field} must not exceed {max}")]
    LimitTooLarge { field: &'static str, max: u64 },
    #[error("executable path for {field} is empty")]
    MissingExecutable { field: &'static str },
}

/// One file operation behind the gateway.
///
/// Handlers are registered once at startup, initialised with their slice of
/// [`HandlersConfig`], then shared read-only by every request.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Operation literal, the first segment of the command
    fn name(&self) -> &'static str;

    /// Read limits and executable paths; called once before the handler is
    /// stored in the registry
    fn initialize(&mut self, config: &HandlersConfig) -> Result<(), HandlerConfigError>;

    /// Run one job to completion
    async fn execute(&self, request: JobRequest) -> Result<JobOutput, OperationError>;
}
