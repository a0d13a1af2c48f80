pub mod config;
pub mod consensus;
pub mod error;
pub mod llm;
pub mod logging;
pub mod models;
pub mod report;
pub mod retry;
pub mod search;
pub mod service;
pub mod specialists;
pub mod tasks;
pub mod translation;
pub mod verifier;
pub mod workflow;

pub use config::Settings;
pub use error::ConsensusError;
pub use models::*;
pub use service::{AppState, build_router, create_app};
pub use workflow::{ConsensusWorkflow, WorkflowState, build_consensus_graph, create_consensus_session};
