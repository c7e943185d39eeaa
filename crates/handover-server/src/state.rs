use std::sync::Arc;

use anyhow::Result;
use handover_core::{
    InterviewService, JobQueue, KeywordCoverage, KnowledgeService, MainConfig, PersonaService,
    QaService, RoleCatalog, SnapshotService,
};
use handover_provider::{create_client, LlmClient};
use handover_store::{DocumentStore, FsDocumentStore};
use tokio::task::JoinHandle;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub catalog: Arc<RoleCatalog>,
    pub interviews: Arc<InterviewService>,
    pub snapshots: Arc<SnapshotService>,
    pub personas: Arc<PersonaService>,
    pub qa: Arc<QaService>,
    pub knowledge: Arc<KnowledgeService>,
    pub token_ttl_hours: i64,
}

impl AppState {
    /// Wire up the store, LLM client, services, and the background snapshot
    /// worker. The returned handle owns the worker task.
    pub fn build(config: &MainConfig) -> Result<(Self, JoinHandle<()>)> {
        let store: Arc<dyn DocumentStore> = Arc::new(FsDocumentStore::new(&config.data_dir));
        let llm = create_client(&config.llm)?;
        Ok(Self::with_parts(config, store, llm))
    }

    /// Assembly seam for tests: inject the store and LLM client directly.
    pub fn with_parts(
        config: &MainConfig,
        store: Arc<dyn DocumentStore>,
        llm: Arc<dyn LlmClient>,
    ) -> (Self, JoinHandle<()>) {
        let catalog = Arc::new(RoleCatalog::builtin());
        let model = config.llm.model.clone();

        let snapshots = Arc::new(SnapshotService::new(
            store.clone(),
            llm.clone(),
            model.clone(),
        ));
        let (jobs, rx) = JobQueue::bounded(config.jobs.queue_capacity);
        let worker = handover_core::spawn_snapshot_worker(rx, snapshots.clone());

        let interviews = Arc::new(InterviewService::new(
            store.clone(),
            llm.clone(),
            catalog.clone(),
            Arc::new(KeywordCoverage::new()),
            jobs,
            model.clone(),
            config.snapshot_interval,
        ));
        let personas = Arc::new(PersonaService::new(
            store.clone(),
            llm.clone(),
            model.clone(),
        ));
        let qa = Arc::new(QaService::new(
            store.clone(),
            llm.clone(),
            catalog.clone(),
            model.clone(),
        ));
        let knowledge = Arc::new(KnowledgeService::new(
            store.clone(),
            llm,
            catalog.clone(),
            model,
        ));

        (
            Self {
                store,
                catalog,
                interviews,
                snapshots,
                personas,
                qa,
                knowledge,
                token_ttl_hours: config.auth.token_ttl_hours,
            },
            worker,
        )
    }
}
