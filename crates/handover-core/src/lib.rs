pub mod catalog;
pub mod config;
pub mod coverage;
pub mod error;
pub mod extract;
pub mod interview;
pub mod jobs;
pub mod knowledge;
pub mod persona;
pub mod prompts;
pub mod qa;
pub mod snapshot;

pub use catalog::{area_info, AreaInfo, ChecklistTopic, RoleCatalog, RoleProfile, KNOWLEDGE_AREAS};
pub use config::{load_config, MainConfig};
pub use coverage::{CoverageStrategy, KeywordCoverage};
pub use error::{HandoverError, Result};
pub use interview::{
    InterviewService, MessageOutcome, QuestionSeed, StartParams, UpdateParams,
};
pub use jobs::{spawn_snapshot_worker, Job, JobQueue};
pub use knowledge::KnowledgeService;
pub use persona::{PersonaService, PersonaUpdate};
pub use qa::{QaService, LOW_SCORE_THRESHOLD};
pub use snapshot::{format_transcript, SnapshotService};
