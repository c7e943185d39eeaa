//! Knowledge-base synthesis: turn a finished topic interview into a
//! structured procedures-manual entry, and extract Mermaid workflow diagrams
//! for process-oriented checklist topics.

use std::sync::Arc;

use chrono::Utc;
use handover_provider::{ChatRequest, LlmClient};
use handover_schema::{
    Interview, KnowledgeEntry, KnowledgeEntryStatus, ReviewStatus, Topic, TopicStatus, Workflow,
};
use handover_store::{DocumentStore, DocumentStoreExt};
use tracing::info;
use uuid::Uuid;

use crate::catalog::RoleCatalog;
use crate::error::{HandoverError, Result, StoreErrExt};
use crate::extract::{extract_mermaid, parse_knowledge_entry, resolve_cross_references};
use crate::prompts::{knowledge_builder_prompt, workflow_prompt, workflow_user_prompt};
use crate::snapshot::format_transcript;

pub struct KnowledgeService {
    store: Arc<dyn DocumentStore>,
    llm: Arc<dyn LlmClient>,
    catalog: Arc<RoleCatalog>,
    model: String,
}

impl KnowledgeService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        llm: Arc<dyn LlmClient>,
        catalog: Arc<RoleCatalog>,
        model: String,
    ) -> Self {
        Self {
            store,
            llm,
            catalog,
            model,
        }
    }

    /// Synthesize the knowledge entry for a topic from its interview and mark
    /// the topic complete.
    pub async fn synthesize(&self, topic_id: &str) -> Result<KnowledgeEntry> {
        let mut topic: Topic = self
            .store
            .get(&format!("topics/{topic_id}"))
            .await
            .store_err()?
            .ok_or_else(|| HandoverError::not_found("Topic", topic_id))?;

        let interviews: Vec<Interview> = self.store.get_all("interviews").await.store_err()?;
        let interview = interviews
            .into_iter()
            .find(|i| i.topic_id.as_deref() == Some(topic_id))
            .ok_or_else(|| {
                HandoverError::validation(format!("No interview found for topic: {topic_id}"))
            })?;
        if interview.messages.is_empty() {
            return Err(HandoverError::validation(
                "Interview has no messages to synthesize",
            ));
        }

        let all_topics: Vec<Topic> = self.store.get_all("topics").await.store_err()?;
        let system_prompt = knowledge_builder_prompt(&topic, &all_topics);
        let transcript = format_transcript(&interview.messages);

        let response = self
            .llm
            .chat(ChatRequest::simple(
                self.model.clone(),
                Some(system_prompt),
                transcript,
            ))
            .await
            .map_err(HandoverError::upstream)?;

        let parsed = parse_knowledge_entry(&response.text)?;
        let cross_references = resolve_cross_references(parsed.cross_references, &all_topics);

        let now = Utc::now();
        let entry = KnowledgeEntry {
            id: Uuid::new_v4().to_string(),
            topic_id: topic_id.to_owned(),
            topic_name: topic.name.clone(),
            interview_id: interview.id.clone(),
            sections: parsed.sections,
            cross_references,
            quality_notes: parsed.quality_notes,
            status: KnowledgeEntryStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        self.store
            .put(&format!("knowledge-entries/{}", entry.id), &entry)
            .await
            .store_err()?;

        topic.status = TopicStatus::Complete;
        topic.knowledge_entry_id = Some(entry.id.clone());
        topic.updated_at = now;
        self.store
            .put(&format!("topics/{topic_id}"), &topic)
            .await
            .store_err()?;

        info!(topic_id, entry_id = %entry.id, "knowledge entry synthesized");
        Ok(entry)
    }

    /// Generate a workflow diagram for a process-oriented checklist topic.
    pub async fn generate_workflow(
        &self,
        interview_id: &str,
        checklist_topic_id: &str,
    ) -> Result<Workflow> {
        let mut interview: Interview = self
            .store
            .get(&format!("interviews/{interview_id}"))
            .await
            .store_err()?
            .ok_or_else(|| HandoverError::not_found("Interview", interview_id))?;

        let role = interview
            .role
            .as_deref()
            .and_then(|r| self.catalog.role(r))
            .ok_or_else(|| {
                HandoverError::validation("Interview role not found in topic checklists")
            })?;
        let topic = role
            .topics
            .iter()
            .find(|t| t.id == checklist_topic_id)
            .ok_or_else(|| HandoverError::not_found("Topic", checklist_topic_id))?;
        if !topic.is_process_oriented {
            return Err(HandoverError::validation(format!(
                "Topic \"{}\" is not process-oriented. Workflow diagrams are only available for process-oriented topics.",
                topic.name
            )));
        }

        let transcript = format_transcript(&interview.messages);
        let response = self
            .llm
            .chat(ChatRequest::simple(
                self.model.clone(),
                Some(workflow_prompt().to_owned()),
                workflow_user_prompt(topic.name, topic.description, &transcript),
            ))
            .await
            .map_err(HandoverError::upstream)?;

        let now = Utc::now();
        let workflow = Workflow {
            id: format!("wf_{}", Uuid::new_v4().simple()),
            interview_id: interview_id.to_owned(),
            topic_id: checklist_topic_id.to_owned(),
            topic_name: topic.name.to_owned(),
            mermaid_code: extract_mermaid(&response.text),
            status: ReviewStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        self.store
            .put(
                &format!("workflows/{interview_id}/{}", workflow.id),
                &workflow,
            )
            .await
            .store_err()?;

        if let Some(progress) = interview
            .topic_progress
            .as_mut()
            .and_then(|p| p.get_mut(checklist_topic_id))
        {
            progress.has_workflow = true;
            progress.workflow_id = Some(workflow.id.clone());
            self.store
                .put(&format!("interviews/{interview_id}"), &interview)
                .await
                .store_err()?;
        }

        Ok(workflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use handover_provider::ChatResponse;
    use handover_schema::{CoverageMap, Message, MessageRole, Phase, TopicFrequency};
    use handover_store::FsDocumentStore;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct FixedClient(String);

    #[async_trait]
    impl LlmClient for FixedClient {
        async fn chat(&self, _request: ChatRequest) -> anyhow::Result<ChatResponse> {
            Ok(ChatResponse {
                text: self.0.clone(),
                input_tokens: None,
                output_tokens: None,
            })
        }
    }

    fn topic(id: &str, name: &str) -> Topic {
        Topic {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            frequency: TopicFrequency::Monthly,
            category: String::new(),
            order: 0,
            status: TopicStatus::InProgress,
            knowledge_entry_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn interview(id: &str, topic_id: Option<&str>, role: Option<&str>) -> Interview {
        Interview {
            id: id.into(),
            role: role.map(Into::into),
            phase: Phase::Cases,
            messages: vec![
                Message {
                    role: MessageRole::User,
                    content: "First we receive the invoice, then we validate it".into(),
                    timestamp: Utc::now(),
                },
                Message {
                    role: MessageRole::Assistant,
                    content: "What happens after validation?".into(),
                    timestamp: Utc::now(),
                },
            ],
            coverage: CoverageMap::new(),
            questions: vec![],
            questions_completed: vec![],
            topic_progress: role.map(|_| {
                let mut p = BTreeMap::new();
                p.insert(
                    "invoice-processing".to_string(),
                    handover_schema::TopicProgress::default(),
                );
                p
            }),
            current_topic_id: None,
            topic_id: topic_id.map(Into::into),
            expert_id: None,
            expert_name: None,
            industry: None,
            description: None,
            created_at: Utc::now(),
            updated_at: None,
            completed_at: None,
        }
    }

    const ENTRY_JSON: &str = r#"{"sections":{"overview":"Month-end close","frequency":"Monthly, day 5","keyTasks":["post journals"],"keyDates":["working day 5"],"contacts":["chief accountant"],"systemsAndTools":["Oracle"],"watchOutFor":["suspense balances"],"proTips":["start reconciliations early"]},"crossReferences":[],"qualityNotes":""}"#;

    async fn setup(reply: &str) -> (KnowledgeService, Arc<FsDocumentStore>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FsDocumentStore::new(tmp.path()));
        let service = KnowledgeService::new(
            store.clone(),
            Arc::new(FixedClient(reply.to_owned())),
            Arc::new(RoleCatalog::builtin()),
            "test-model".into(),
        );
        (service, store, tmp)
    }

    #[tokio::test]
    async fn synthesize_creates_entry_and_completes_topic() {
        let (service, store, _tmp) = setup(ENTRY_JSON).await;
        store.put("topics/t1", &topic("t1", "Month-End Close")).await.unwrap();
        store
            .put("interviews/i1", &interview("i1", Some("t1"), None))
            .await
            .unwrap();

        let entry = service.synthesize("t1").await.unwrap();
        assert_eq!(entry.topic_id, "t1");
        assert_eq!(entry.sections.key_tasks, vec!["post journals"]);
        assert_eq!(entry.status, KnowledgeEntryStatus::Draft);

        let topic: Topic = store.get("topics/t1").await.unwrap().unwrap();
        assert_eq!(topic.status, TopicStatus::Complete);
        assert_eq!(topic.knowledge_entry_id, Some(entry.id));
    }

    #[tokio::test]
    async fn synthesize_requires_interview_with_messages() {
        let (service, store, _tmp) = setup(ENTRY_JSON).await;
        store.put("topics/t1", &topic("t1", "Month-End Close")).await.unwrap();

        // No interview at all.
        assert!(matches!(
            service.synthesize("t1").await.unwrap_err(),
            HandoverError::Validation(_)
        ));

        // Interview without messages.
        let mut empty = interview("i1", Some("t1"), None);
        empty.messages.clear();
        store.put("interviews/i1", &empty).await.unwrap();
        assert!(matches!(
            service.synthesize("t1").await.unwrap_err(),
            HandoverError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn synthesize_unknown_topic_is_not_found() {
        let (service, _store, _tmp) = setup(ENTRY_JSON).await;
        assert!(matches!(
            service.synthesize("ghost").await.unwrap_err(),
            HandoverError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn workflow_generation_requires_process_oriented_topic() {
        let (service, store, _tmp) = setup("```mermaid\nflowchart TD\n    A[Start] --> B[End]\n```").await;
        store
            .put("interviews/i1", &interview("i1", None, Some("Head of AP")))
            .await
            .unwrap();

        let workflow = service
            .generate_workflow("i1", "invoice-processing")
            .await
            .unwrap();
        assert!(workflow.id.starts_with("wf_"));
        assert!(workflow.mermaid_code.starts_with("flowchart TD"));

        // Topic progress now records the workflow.
        let reloaded: Interview = store.get("interviews/i1").await.unwrap().unwrap();
        let progress = reloaded
            .topic_progress
            .unwrap()
            .get("invoice-processing")
            .cloned()
            .unwrap();
        assert!(progress.has_workflow);
        assert_eq!(progress.workflow_id, Some(workflow.id));

        // "Fraud Detection & Prevention" is not process-oriented.
        let err = service
            .generate_workflow("i1", "fraud-prevention")
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::Validation(_)));
    }

    #[tokio::test]
    async fn workflow_generation_needs_known_checklist_topic() {
        let (service, store, _tmp) = setup("flowchart TD\n A-->B").await;
        store
            .put("interviews/i1", &interview("i1", None, Some("Head of AP")))
            .await
            .unwrap();
        assert!(matches!(
            service.generate_workflow("i1", "no-such").await.unwrap_err(),
            HandoverError::NotFound(_)
        ));

        store
            .put("interviews/i2", &interview("i2", None, None))
            .await
            .unwrap();
        assert!(matches!(
            service
                .generate_workflow("i2", "invoice-processing")
                .await
                .unwrap_err(),
            HandoverError::Validation(_)
        ));
    }
}
