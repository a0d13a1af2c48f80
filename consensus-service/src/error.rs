use graph_flow::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workflow failed: {0}")]
    Workflow(#[from] GraphError),

    #[error("Run finished without a consensus report")]
    MissingReport,

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsensusError {
    pub fn is_config(&self) -> bool {
        matches!(self, ConsensusError::Config(_))
    }
}
