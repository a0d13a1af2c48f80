use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Field already written: {0}")]
    FieldAlreadyWritten(String),

    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Stage '{task_id}' failed: {message}")]
    StageFailed { task_id: String, message: String },

    #[error("Task '{task_id}' exceeded its {limit_ms} ms budget")]
    TaskTimeout { task_id: String, limit_ms: u128 },

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Step limit of {0} exceeded")]
    StepLimitExceeded(usize),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
