pub mod build_consensus;
pub mod diagnose;
pub mod lung_cancer;
pub mod research;
pub mod translate;
pub mod treat;
pub mod types;
pub mod utils;
pub mod verify_sources;

pub use build_consensus::BuildConsensusTask;
pub use diagnose::DiagnoseTask;
pub use lung_cancer::LungCancerSpecialistTask;
pub use research::ResearchTask;
pub use translate::TranslateTask;
pub use treat::TreatTask;
pub use types::{session_keys, stage_ids};
pub use utils::AgentDeps;
pub use verify_sources::VerifySourcesTask;
