//! Snapshot extraction: run the note-taker over the current transcript,
//! persist the structured result, and derive deduplicated knowledge points.

use std::sync::Arc;

use chrono::Utc;
use handover_provider::{ChatRequest, LlmClient};
use handover_schema::{
    Interview, KnowledgePoint, KnowledgePointSource, Message, MessageRole, ReviewStatus, Snapshot,
    SnapshotExtract,
};
use handover_store::{DocumentStore, DocumentStoreExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{HandoverError, Result, StoreErrExt};
use crate::extract::{categorize_insight, is_duplicate, parse_note_envelope};
use crate::prompts::note_taker_prompt;

/// Speaker-labeled transcript for extraction prompts.
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|msg| {
            let speaker = match msg.role {
                MessageRole::User => "Expert",
                MessageRole::Assistant => "Interviewer",
            };
            format!("{speaker}: {}", msg.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct SnapshotService {
    store: Arc<dyn DocumentStore>,
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl SnapshotService {
    pub fn new(store: Arc<dyn DocumentStore>, llm: Arc<dyn LlmClient>, model: String) -> Self {
        Self { store, llm, model }
    }

    /// Run the note-taker over the interview transcript and persist the
    /// snapshot. Strict variant: surfaces NotFound/Validation/Parse/Upstream
    /// to the caller (used by the manual snapshot endpoint).
    pub async fn extract(&self, interview_id: &str) -> Result<Snapshot> {
        let interview: Interview = self
            .store
            .get(&format!("interviews/{interview_id}"))
            .await
            .store_err()?
            .ok_or_else(|| HandoverError::not_found("Interview", interview_id))?;

        if interview.messages.is_empty() {
            return Err(HandoverError::validation(
                "Interview has no messages to snapshot",
            ));
        }

        let transcript = format_transcript(&interview.messages);
        let response = self
            .llm
            .chat(ChatRequest::simple(
                self.model.clone(),
                Some(note_taker_prompt().to_owned()),
                transcript,
            ))
            .await
            .map_err(HandoverError::upstream)?;

        let extract = parse_note_envelope(&response.text)?;

        let mut snapshot = Snapshot {
            id: Uuid::new_v4().to_string(),
            interview_id: interview_id.to_owned(),
            phase: interview.phase,
            message_count: interview.messages.len(),
            timestamp: Utc::now(),
            extract,
            knowledge_points_created: None,
        };

        let created = self
            .derive_knowledge_points(&interview, &snapshot.extract)
            .await?;
        snapshot.knowledge_points_created = Some(created);

        self.store
            .put(
                &format!("snapshots/{interview_id}/{}", snapshot.id),
                &snapshot,
            )
            .await
            .store_err()?;
        info!(interview_id, snapshot_id = %snapshot.id, created, "snapshot created");

        Ok(snapshot)
    }

    /// Best-effort variant used by the background worker: never surfaces an
    /// error to the triggering request, only logs.
    pub async fn extract_best_effort(&self, interview_id: &str) -> Option<Snapshot> {
        match self.extract(interview_id).await {
            Ok(snapshot) => Some(snapshot),
            Err(HandoverError::Validation(reason)) => {
                info!(interview_id, reason, "skipping snapshot");
                None
            }
            Err(error) => {
                warn!(interview_id, %error, "snapshot extraction failed");
                None
            }
        }
    }

    /// All snapshots for an interview, oldest first.
    pub async fn list(&self, interview_id: &str) -> Result<Vec<Snapshot>> {
        let mut snapshots: Vec<Snapshot> = self
            .store
            .get_all(&format!("snapshots/{interview_id}"))
            .await
            .store_err()?;
        snapshots.sort_by_key(|s| s.timestamp);
        Ok(snapshots)
    }

    /// Turn key insights and frameworks into knowledge points, skipping
    /// near-duplicates of existing points for the interview.
    async fn derive_knowledge_points(
        &self,
        interview: &Interview,
        extract: &SnapshotExtract,
    ) -> Result<usize> {
        let interview_id = &interview.id;
        let topic_id = interview
            .current_topic_id
            .clone()
            .unwrap_or_else(|| "general".to_owned());

        let existing: Vec<KnowledgePoint> = self
            .store
            .get_all(&format!("knowledge-points/{interview_id}"))
            .await
            .store_err()?;
        let mut seen: Vec<String> = existing
            .iter()
            .map(|p| p.content.to_lowercase())
            .collect();

        let mut created = 0;
        for insight in &extract.key_insights {
            if insight.len() < 10 || is_duplicate(&seen, insight) {
                continue;
            }
            let point = self.knowledge_point(
                interview_id,
                &topic_id,
                categorize_insight(insight),
                insight.trim().to_owned(),
            );
            self.store
                .put(
                    &format!("knowledge-points/{interview_id}/{}", point.id),
                    &point,
                )
                .await
                .store_err()?;
            seen.push(insight.to_lowercase());
            created += 1;
        }

        for framework in &extract.frameworks_mentioned {
            if framework.len() < 5 || is_duplicate(&seen, framework) {
                continue;
            }
            // Frameworks describe how work gets done, so they land in tasks.
            let point = self.knowledge_point(
                interview_id,
                &topic_id,
                handover_schema::AreaKey::Tasks,
                format!("Framework: {}", framework.trim()),
            );
            self.store
                .put(
                    &format!("knowledge-points/{interview_id}/{}", point.id),
                    &point,
                )
                .await
                .store_err()?;
            seen.push(framework.to_lowercase());
            created += 1;
        }

        Ok(created)
    }

    fn knowledge_point(
        &self,
        interview_id: &str,
        topic_id: &str,
        area: handover_schema::AreaKey,
        content: String,
    ) -> KnowledgePoint {
        let now = Utc::now();
        KnowledgePoint {
            id: format!("kp_{}", Uuid::new_v4().simple()),
            interview_id: interview_id.to_owned(),
            topic_id: topic_id.to_owned(),
            area,
            content,
            source: KnowledgePointSource::Snapshot,
            status: ReviewStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}
