//! Interview lifecycle: start, message exchange, completion, coverage and
//! progress reporting. Phase transitions are externally driven and may only
//! move forward; `complete` is terminal.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use handover_provider::{ChatMessage, ChatRequest, LlmClient};
use handover_schema::{
    AreaKey, ChecklistStatus, CoverageMap, Interview, InterviewQuestion, Message, MessageRole,
    Phase, ReviewStatus, Snapshot, Topic, TopicProgress, TopicStatus,
};
use handover_store::{DocumentStore, DocumentStoreExt};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::catalog::{RoleCatalog, KNOWLEDGE_AREAS};
use crate::coverage::CoverageStrategy;
use crate::error::{HandoverError, Result, StoreErrExt};
use crate::jobs::{Job, JobQueue};
use crate::prompts;

/// Phrases an expert uses to signal a topic is exhausted. Heuristic: a false
/// negative merely delays snapshotting, a false positive triggers an extra
/// idempotent snapshot.
const DONE_PATTERNS: [&str; 13] = [
    "i'm done",
    "im done",
    "that's everything",
    "thats everything",
    "let's move on",
    "lets move on",
    "nothing else",
    "that's all",
    "thats all",
    "we're done",
    "were done",
    "finished",
    "complete",
];

/// Phrases in the interviewer's reply that signal the interview is winding
/// down.
const COMPLETION_PATTERNS: [&str; 10] = [
    "thank you so much for sharing",
    "thank you for sharing",
    "this has been very helpful",
    "that concludes",
    "we've covered a lot",
    "that's a great place to stop",
    "shall we finish",
    "ready to finish",
    "wrap up",
    "that covers everything",
];

pub fn is_done_command(text: &str) -> bool {
    let lower = text.to_lowercase();
    DONE_PATTERNS.iter().any(|p| lower.contains(p))
}

pub fn signals_completion(text: &str) -> bool {
    let lower = text.to_lowercase();
    COMPLETION_PATTERNS.iter().any(|p| lower.contains(p))
}

#[derive(Debug, Clone, Default)]
pub struct QuestionSeed {
    pub id: Option<String>,
    pub text: String,
    pub order: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct StartParams {
    pub role: Option<String>,
    pub topic_id: Option<String>,
    pub expert_id: Option<String>,
    pub expert_name: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub questions: Vec<QuestionSeed>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateParams {
    pub expert_name: Option<String>,
    pub industry: Option<String>,
    pub phase: Option<Phase>,
    pub expert_id: Option<String>,
    pub topic_id: Option<String>,
    pub questions: Option<Vec<QuestionSeed>>,
    pub questions_completed: Option<Vec<String>>,
}

/// Result of one message exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageOutcome {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageMap>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub topic_complete: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub completion_detected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageArea {
    pub key: AreaKey,
    pub name: &'static str,
    pub description: &'static str,
    pub covered: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub covered: usize,
    pub total: usize,
    pub percent_complete: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub interview_id: String,
    pub topic_id: Option<String>,
    pub message_count: usize,
    pub areas: Vec<CoverageArea>,
    pub summary: CoverageSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptView {
    pub transcript: String,
    pub message_count: usize,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedCoverage {
    pub expected_topics: Vec<String>,
    pub covered_expected: Vec<String>,
    pub uncovered_expected: Vec<String>,
    pub percent: u32,
    pub depth: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSummary {
    pub interview_id: String,
    pub role: Option<String>,
    pub phase: Phase,
    pub message_count: usize,
    pub snapshot_count: usize,
    pub duration: Option<i64>,
    pub topics_covered: Vec<String>,
    pub key_insights: Vec<String>,
    pub gaps: Vec<String>,
    pub frameworks_mentioned: Vec<String>,
    pub coverage: ExpectedCoverage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgressRow {
    pub id: String,
    pub name: &'static str,
    pub description: &'static str,
    pub is_process_oriented: bool,
    pub required_areas: Vec<AreaKey>,
    pub progress: TopicProgress,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgressSummary {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub overall_percent: u32,
    pub meets_threshold: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgressReport {
    pub interview_id: String,
    pub role: String,
    pub current_topic_id: Option<String>,
    pub topics: Vec<TopicProgressRow>,
    pub summary: TopicProgressSummary,
}

pub struct InterviewService {
    store: Arc<dyn DocumentStore>,
    llm: Arc<dyn LlmClient>,
    catalog: Arc<RoleCatalog>,
    coverage: Arc<dyn CoverageStrategy>,
    jobs: JobQueue,
    model: String,
    snapshot_interval: usize,
}

impl InterviewService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        llm: Arc<dyn LlmClient>,
        catalog: Arc<RoleCatalog>,
        coverage: Arc<dyn CoverageStrategy>,
        jobs: JobQueue,
        model: String,
        snapshot_interval: usize,
    ) -> Self {
        Self {
            store,
            llm,
            catalog,
            coverage,
            jobs,
            model,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    pub async fn load(&self, id: &str) -> Result<Interview> {
        self.store
            .get(&format!("interviews/{id}"))
            .await
            .store_err()?
            .ok_or_else(|| HandoverError::not_found("Interview", id))
    }

    async fn save(&self, interview: &Interview) -> Result<()> {
        self.store
            .put(&format!("interviews/{}", interview.id), interview)
            .await
            .store_err()
    }

    pub async fn start(&self, params: StartParams) -> Result<Interview> {
        if params.topic_id.is_none() {
            let valid = params
                .role
                .as_deref()
                .map(|r| self.catalog.contains(r))
                .unwrap_or(false);
            if !valid {
                return Err(HandoverError::validation(format!(
                    "Invalid role. Must be one of: {} (or provide topicId)",
                    self.catalog.role_names().join(", ")
                )));
            }
        }

        if let Some(topic_id) = &params.topic_id {
            let topic: Option<Topic> = self
                .store
                .get(&format!("topics/{topic_id}"))
                .await
                .store_err()?;
            if topic.is_none() {
                return Err(HandoverError::validation(format!(
                    "Topic not found: {topic_id}"
                )));
            }
        }

        let questions = normalize_questions(params.questions);

        // Seed checklist tracking for recognized roles: every topic starts
        // untouched except the first, which becomes the current focus.
        let mut topic_progress = None;
        let mut current_topic_id = None;
        if let Some(role) = params.role.as_deref().and_then(|r| self.catalog.role(r)) {
            let mut progress = BTreeMap::new();
            for (index, topic) in role.topics.iter().enumerate() {
                let mut entry = TopicProgress::default();
                if index == 0 {
                    entry.status = ChecklistStatus::InProgress;
                    current_topic_id = Some(topic.id.to_owned());
                }
                progress.insert(topic.id.to_owned(), entry);
            }
            topic_progress = Some(progress);
        }

        let interview = Interview {
            id: Uuid::new_v4().to_string(),
            role: params.role,
            phase: Phase::WarmUp,
            messages: vec![],
            coverage: CoverageMap::new(),
            questions,
            questions_completed: vec![],
            topic_progress,
            current_topic_id,
            topic_id: params.topic_id,
            expert_id: params.expert_id,
            expert_name: params.expert_name,
            industry: params.industry,
            description: params.description,
            created_at: Utc::now(),
            updated_at: None,
            completed_at: None,
        };

        self.save(&interview).await?;
        info!(interview_id = %interview.id, role = ?interview.role, "interview started");
        Ok(interview)
    }

    pub async fn post_message(&self, id: &str, text: &str) -> Result<MessageOutcome> {
        if text.trim().is_empty() {
            return Err(HandoverError::validation(
                "Invalid request. Message is required and must be a string.",
            ));
        }

        let mut interview = self.load(id).await?;
        let done_command = is_done_command(text);

        interview.messages.push(Message {
            role: MessageRole::User,
            content: text.to_owned(),
            timestamp: Utc::now(),
        });

        let mut coverage_out = None;
        let system_prompt = if let Some(topic_id) = interview.topic_id.clone() {
            let topic: Option<Topic> = self
                .store
                .get(&format!("topics/{topic_id}"))
                .await
                .store_err()?;
            match topic {
                Some(topic) => {
                    let coverage = self.coverage.analyse(&interview.messages);
                    interview.coverage = coverage.clone();
                    coverage_out = Some(coverage.clone());

                    let mut prompt =
                        prompts::topic_prompt(&topic, &coverage, interview.messages.len());
                    if done_command {
                        prompt.push_str(prompts::WRAP_UP_INSTRUCTION);
                    }
                    prompt
                }
                // Topic vanished underneath the interview: fall back to the
                // role-based interviewer.
                None => self.role_prompt(&interview),
            }
        } else {
            let mut prompt = self.role_prompt(&interview);
            if let (Some(role), Some(current), Some(progress)) = (
                interview.role.as_deref().and_then(|r| self.catalog.role(r)),
                interview.current_topic_id.as_deref(),
                interview.topic_progress.as_ref(),
            ) {
                if let Some(section) = prompts::checklist_focus_section(role, current, progress) {
                    prompt.push_str(&section);
                }
            }
            prompt
        };

        let history = interview
            .messages
            .iter()
            .map(|m| ChatMessage {
                role: match m.role {
                    MessageRole::User => "user".to_owned(),
                    MessageRole::Assistant => "assistant".to_owned(),
                },
                content: m.content.clone(),
            })
            .collect();

        let reply = self
            .llm
            .chat(ChatRequest::new(
                self.model.clone(),
                Some(system_prompt),
                history,
            ))
            .await
            .map_err(HandoverError::upstream)?;

        interview.messages.push(Message {
            role: MessageRole::Assistant,
            content: reply.text.clone(),
            timestamp: Utc::now(),
        });

        // A done command closes the linked topic entity as well.
        if done_command {
            if let Some(topic_id) = &interview.topic_id {
                if let Some(mut topic) = self
                    .store
                    .get::<Topic>(&format!("topics/{topic_id}"))
                    .await
                    .store_err()?
                {
                    if topic.status != TopicStatus::Complete {
                        topic.status = TopicStatus::Complete;
                        topic.updated_at = Utc::now();
                        self.store
                            .put(&format!("topics/{topic_id}"), &topic)
                            .await
                            .store_err()?;
                    }
                }
            }
        }

        interview.updated_at = Some(Utc::now());
        self.save(&interview).await?;

        let user_count = interview.user_message_count();
        if user_count > 0 && user_count % self.snapshot_interval == 0 {
            self.jobs.submit(Job::ExtractSnapshot {
                interview_id: id.to_owned(),
            });
        }

        let completion_detected = done_command || signals_completion(&reply.text);
        if completion_detected {
            self.jobs.submit(Job::ExtractSnapshot {
                interview_id: id.to_owned(),
            });
        }

        Ok(MessageOutcome {
            response: reply.text,
            coverage: coverage_out,
            topic_complete: done_command,
            completion_detected,
        })
    }

    fn role_prompt(&self, interview: &Interview) -> String {
        let role = interview
            .role
            .as_deref()
            .and_then(|r| self.catalog.role(r))
            .unwrap_or(&self.catalog.roles()[0]);
        let phase = if interview.phase == Phase::Complete {
            Phase::Meta
        } else {
            interview.phase
        };
        prompts::interviewer_prompt(role, phase)
    }

    /// Idempotent: completing a completed interview just refreshes the stamp.
    pub async fn complete(&self, id: &str) -> Result<Interview> {
        let mut interview = self.load(id).await?;
        interview.phase = Phase::Complete;
        interview.completed_at = Some(Utc::now());
        interview.updated_at = Some(Utc::now());
        self.save(&interview).await?;

        self.jobs.submit(Job::ExtractSnapshot {
            interview_id: id.to_owned(),
        });
        Ok(interview)
    }

    pub async fn update(&self, id: &str, params: UpdateParams) -> Result<Interview> {
        let mut interview = self.load(id).await?;

        if let Some(phase) = params.phase {
            if !interview.phase.can_transition_to(phase) {
                return Err(HandoverError::conflict(format!(
                    "Cannot move phase from {} back to {}",
                    interview.phase.as_str(),
                    phase.as_str()
                )));
            }
            interview.phase = phase;
            if phase == Phase::Complete && interview.completed_at.is_none() {
                interview.completed_at = Some(Utc::now());
            }
        }
        if let Some(name) = params.expert_name {
            interview.expert_name = Some(name);
        }
        if let Some(industry) = params.industry {
            interview.industry = Some(industry);
        }
        if let Some(expert_id) = params.expert_id {
            interview.expert_id = Some(expert_id);
        }
        if let Some(topic_id) = params.topic_id {
            interview.topic_id = Some(topic_id);
        }
        if let Some(questions) = params.questions {
            interview.questions = normalize_questions(questions);
        }
        if let Some(completed) = params.questions_completed {
            interview.questions_completed = completed;
        }

        interview.updated_at = Some(Utc::now());
        self.save(&interview).await?;
        Ok(interview)
    }

    /// Delete an interview and cascade to its snapshots, knowledge points,
    /// and workflows. Personas keep their provenance reference.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _ = self.load(id).await?;
        self.store
            .remove(&format!("interviews/{id}"))
            .await
            .store_err()?;
        for namespace in ["snapshots", "knowledge-points", "workflows"] {
            self.store
                .remove_all(&format!("{namespace}/{id}"))
                .await
                .store_err()?;
        }
        info!(interview_id = id, "interview deleted with dependents");
        Ok(())
    }

    pub async fn coverage_report(&self, id: &str) -> Result<CoverageReport> {
        let interview = self.load(id).await?;
        let coverage = self.coverage.analyse(&interview.messages);

        let areas: Vec<CoverageArea> = KNOWLEDGE_AREAS
            .iter()
            .map(|info| CoverageArea {
                key: info.key,
                name: info.name,
                description: info.prompt,
                covered: coverage.get(&info.key).copied().unwrap_or(false),
            })
            .collect();

        let covered = areas.iter().filter(|a| a.covered).count();
        let total = areas.len();
        let percent_complete = ((covered as f64 / total as f64) * 100.0).round() as u32;

        Ok(CoverageReport {
            interview_id: interview.id,
            topic_id: interview.topic_id,
            message_count: interview.messages.len(),
            areas,
            summary: CoverageSummary {
                covered,
                total,
                percent_complete,
            },
        })
    }

    pub async fn transcript(&self, id: &str) -> Result<TranscriptView> {
        let interview = self.load(id).await?;

        let lines: Vec<String> = interview
            .messages
            .iter()
            .map(|msg| {
                let speaker = match msg.role {
                    MessageRole::User => "Expert",
                    MessageRole::Assistant => "Interviewer",
                };
                format!(
                    "[{}] {speaker}: {}",
                    msg.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    msg.content
                )
            })
            .collect();

        let duration = match (interview.messages.first(), interview.messages.last()) {
            (Some(first), Some(last)) if interview.messages.len() > 1 => {
                let elapsed = last.timestamp - first.timestamp;
                format!(
                    "{}m {}s",
                    elapsed.num_minutes(),
                    elapsed.num_seconds() % 60
                )
            }
            (Some(_), _) => "0m 0s".to_owned(),
            _ => "N/A".to_owned(),
        };

        Ok(TranscriptView {
            transcript: lines.join("\n\n"),
            message_count: interview.messages.len(),
            duration,
        })
    }

    pub async fn summary(&self, id: &str) -> Result<InterviewSummary> {
        let interview = self.load(id).await?;

        let mut snapshots: Vec<Snapshot> = self
            .store
            .get_all(&format!("snapshots/{id}"))
            .await
            .store_err()?;
        snapshots.sort_by_key(|s| s.timestamp);

        let mut topics = Vec::new();
        let mut insights = Vec::new();
        let mut gaps = Vec::new();
        let mut frameworks = Vec::new();
        for snapshot in &snapshots {
            dedup_extend(&mut topics, &snapshot.extract.topics_covered);
            dedup_extend(&mut insights, &snapshot.extract.key_insights);
            dedup_extend(&mut gaps, &snapshot.extract.gaps);
            dedup_extend(&mut frameworks, &snapshot.extract.frameworks_mentioned);
        }

        let duration = match (interview.messages.first(), interview.messages.last()) {
            (Some(first), Some(last)) if interview.messages.len() > 1 => {
                Some((last.timestamp - first.timestamp).num_minutes())
            }
            _ => None,
        };

        let expected: Vec<String> = interview
            .role
            .as_deref()
            .and_then(|r| self.catalog.role(r))
            .map(|r| r.key_areas.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        // Loose keyword match: an expected topic counts as covered when any
        // captured topic shares one of its longer words.
        let covered_expected: Vec<String> = expected
            .iter()
            .filter(|exp| {
                let exp_lower = exp.to_lowercase();
                topics.iter().any(|captured| {
                    let captured_lower = captured.to_lowercase();
                    exp_lower
                        .split_whitespace()
                        .any(|word| word.len() > 3 && captured_lower.contains(word))
                })
            })
            .cloned()
            .collect();
        let uncovered_expected: Vec<String> = expected
            .iter()
            .filter(|t| !covered_expected.contains(t))
            .cloned()
            .collect();

        let percent = if expected.is_empty() {
            0.0
        } else {
            covered_expected.len() as f64 / expected.len() as f64 * 100.0
        };
        let depth = if percent >= 70.0 {
            "deep"
        } else if percent >= 40.0 {
            "moderate"
        } else {
            "shallow"
        };

        Ok(InterviewSummary {
            interview_id: interview.id,
            role: interview.role,
            phase: interview.phase,
            message_count: interview.messages.len(),
            snapshot_count: snapshots.len(),
            duration,
            topics_covered: topics,
            key_insights: insights,
            gaps,
            frameworks_mentioned: frameworks,
            coverage: ExpectedCoverage {
                expected_topics: expected,
                covered_expected,
                uncovered_expected,
                percent: percent.round() as u32,
                depth,
            },
        })
    }

    /// Backfill checklist tracking for interviews created before a role was
    /// assigned.
    pub async fn initialize_topics(&self, id: &str) -> Result<usize> {
        let mut interview = self.load(id).await?;
        let role_name = interview
            .role
            .clone()
            .ok_or_else(|| HandoverError::validation("Interview has no role assigned"))?;
        let role = self
            .catalog
            .role(&role_name)
            .ok_or_else(|| {
                HandoverError::validation(format!("No checklist found for role: {role_name}"))
            })?;

        if interview.topic_progress.is_none() {
            let mut progress = BTreeMap::new();
            for topic in &role.topics {
                progress.insert(topic.id.to_owned(), TopicProgress::default());
            }
            interview.current_topic_id = role.topics.first().map(|t| t.id.to_owned());
            interview.topic_progress = Some(progress);
        }
        interview.updated_at = Some(Utc::now());
        let count = role.topics.len();
        self.save(&interview).await?;
        Ok(count)
    }

    pub async fn topic_progress_report(&self, id: &str) -> Result<TopicProgressReport> {
        let interview = self.load(id).await?;
        let (role_name, progress) = match (&interview.role, &interview.topic_progress) {
            (Some(role), Some(progress)) => (role.clone(), progress.clone()),
            _ => {
                return Err(HandoverError::validation(
                    "Interview does not have topic tracking enabled",
                ))
            }
        };
        let role = self.catalog.role(&role_name).ok_or_else(|| {
            HandoverError::validation(format!("No checklist found for role: {role_name}"))
        })?;

        let topics: Vec<TopicProgressRow> = role
            .topics
            .iter()
            .map(|topic| TopicProgressRow {
                id: topic.id.to_owned(),
                name: topic.name,
                description: topic.description,
                is_process_oriented: topic.is_process_oriented,
                required_areas: topic.required_areas.to_vec(),
                progress: progress.get(topic.id).cloned().unwrap_or_default(),
                is_current: interview.current_topic_id.as_deref() == Some(topic.id),
            })
            .collect();

        let completed = topics
            .iter()
            .filter(|t| t.progress.status == ChecklistStatus::Complete)
            .count();
        let in_progress = topics
            .iter()
            .filter(|t| t.progress.status == ChecklistStatus::InProgress)
            .count();
        let overall_percent = if topics.is_empty() {
            0
        } else {
            (topics
                .iter()
                .map(|t| t.progress.coverage_percent as u32)
                .sum::<u32>() as f64
                / topics.len() as f64)
                .round() as u32
        };

        Ok(TopicProgressReport {
            interview_id: interview.id,
            role: role_name,
            current_topic_id: interview.current_topic_id,
            summary: TopicProgressSummary {
                total: topics.len(),
                completed,
                in_progress,
                not_started: topics.len() - completed - in_progress,
                overall_percent,
                meets_threshold: overall_percent >= 70,
            },
            topics,
        })
    }

    pub async fn select_topic(&self, id: &str, topic_id: &str) -> Result<Interview> {
        let mut interview = self.load(id).await?;
        let progress = interview
            .topic_progress
            .as_mut()
            .and_then(|p| p.get_mut(topic_id))
            .ok_or_else(|| {
                HandoverError::validation(format!("Topic not found in interview: {topic_id}"))
            })?;

        if progress.status == ChecklistStatus::NotStarted {
            progress.status = ChecklistStatus::InProgress;
            progress.discussed_at = Some(Utc::now());
        }
        interview.current_topic_id = Some(topic_id.to_owned());
        interview.updated_at = Some(Utc::now());
        self.save(&interview).await?;
        Ok(interview)
    }

    /// Mark a checklist topic complete; when it was the current focus, move
    /// the focus to the next unfinished topic.
    pub async fn complete_topic(&self, id: &str, topic_id: &str) -> Result<Interview> {
        let mut interview = self.load(id).await?;
        {
            let progress = interview
                .topic_progress
                .as_mut()
                .and_then(|p| p.get_mut(topic_id))
                .ok_or_else(|| {
                    HandoverError::validation(format!("Topic not found in interview: {topic_id}"))
                })?;
            progress.status = ChecklistStatus::Complete;
            progress.completed_at = Some(Utc::now());
        }

        if interview.current_topic_id.as_deref() == Some(topic_id) {
            let role = interview.role.as_deref().and_then(|r| self.catalog.role(r));
            if let (Some(role), Some(progress)) = (role, interview.topic_progress.clone()) {
                let next = role.topics.iter().find(|t| {
                    t.id != topic_id
                        && progress
                            .get(t.id)
                            .map(|p| p.status != ChecklistStatus::Complete)
                            .unwrap_or(true)
                });
                if let Some(next) = next {
                    interview.current_topic_id = Some(next.id.to_owned());
                    if let Some(entry) = interview
                        .topic_progress
                        .as_mut()
                        .and_then(|p| p.get_mut(next.id))
                    {
                        if entry.status == ChecklistStatus::NotStarted {
                            entry.status = ChecklistStatus::InProgress;
                            entry.discussed_at = Some(Utc::now());
                        }
                    }
                }
            }
        }

        interview.updated_at = Some(Utc::now());
        self.save(&interview).await?;
        Ok(interview)
    }

    pub async fn validate_topic(
        &self,
        id: &str,
        topic_id: &str,
        status: ReviewStatus,
    ) -> Result<Interview> {
        let mut interview = self.load(id).await?;
        let progress = interview
            .topic_progress
            .as_mut()
            .ok_or_else(|| {
                HandoverError::validation("Interview does not have topic tracking enabled")
            })?
            .get_mut(topic_id)
            .ok_or_else(|| HandoverError::not_found("Topic", topic_id))?;

        progress.validation_status = Some(status);
        progress.validated = status == ReviewStatus::Approved;
        progress.validated_at = Some(Utc::now());
        interview.updated_at = Some(Utc::now());
        self.save(&interview).await?;
        Ok(interview)
    }
}

fn normalize_questions(seeds: Vec<QuestionSeed>) -> Vec<InterviewQuestion> {
    seeds
        .into_iter()
        .enumerate()
        .map(|(index, seed)| InterviewQuestion {
            id: seed
                .id
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string()[..8].to_owned()),
            text: seed.text,
            order: seed.order.unwrap_or(index),
        })
        .collect()
}

fn dedup_extend(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::KeywordCoverage;
    use async_trait::async_trait;
    use handover_provider::ChatResponse;
    use handover_schema::TopicFrequency;
    use handover_store::FsDocumentStore;
    use tempfile::TempDir;

    struct EchoClient;

    #[async_trait]
    impl LlmClient for EchoClient {
        async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatResponse> {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(ChatResponse {
                text: format!("Interesting - tell me more about: {last}"),
                input_tokens: None,
                output_tokens: None,
            })
        }
    }

    struct ConcludingClient;

    #[async_trait]
    impl LlmClient for ConcludingClient {
        async fn chat(&self, _request: ChatRequest) -> anyhow::Result<ChatResponse> {
            Ok(ChatResponse {
                text: "Thank you for sharing - that concludes our interview.".into(),
                input_tokens: None,
                output_tokens: None,
            })
        }
    }

    struct Harness {
        service: InterviewService,
        store: Arc<FsDocumentStore>,
        rx: tokio::sync::mpsc::Receiver<Job>,
        _tmp: TempDir,
    }

    fn harness_with(llm: Arc<dyn LlmClient>, interval: usize) -> Harness {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FsDocumentStore::new(tmp.path()));
        let (jobs, rx) = JobQueue::bounded(16);
        let service = InterviewService::new(
            store.clone(),
            llm,
            Arc::new(RoleCatalog::builtin()),
            Arc::new(KeywordCoverage::new()),
            jobs,
            "test-model".into(),
            interval,
        );
        Harness {
            service,
            store,
            rx,
            _tmp: tmp,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(EchoClient), 5)
    }

    #[tokio::test]
    async fn start_requires_role_or_topic() {
        let h = harness();
        let err = h.service.start(StartParams::default()).await.unwrap_err();
        assert!(matches!(err, HandoverError::Validation(_)));

        let err = h
            .service
            .start(StartParams {
                role: Some("Chief Vibes Officer".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::Validation(_)));
    }

    #[tokio::test]
    async fn start_with_role_seeds_warm_up_and_checklist() {
        let h = harness();
        let interview = h
            .service
            .start(StartParams {
                role: Some("Finance Director".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(interview.phase, Phase::WarmUp);
        assert!(interview.messages.is_empty());
        let progress = interview.topic_progress.as_ref().unwrap();
        assert_eq!(progress.len(), 9);
        assert_eq!(
            interview.current_topic_id.as_deref(),
            Some("mtfs-development")
        );
        assert_eq!(
            progress.get("mtfs-development").unwrap().status,
            ChecklistStatus::InProgress
        );
    }

    #[tokio::test]
    async fn start_with_unknown_topic_is_validation_error() {
        let h = harness();
        let err = h
            .service
            .start(StartParams {
                topic_id: Some("ghost".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::Validation(_)));
    }

    #[tokio::test]
    async fn post_message_appends_both_turns() {
        let h = harness();
        let interview = h
            .service
            .start(StartParams {
                role: Some("Finance Director".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let outcome = h
            .service
            .post_message(&interview.id, "We do month-end close")
            .await
            .unwrap();
        assert!(!outcome.response.is_empty());
        assert!(!outcome.topic_complete);

        let reloaded = h.service.load(&interview.id).await.unwrap();
        assert_eq!(reloaded.messages.len(), 2);
        assert_eq!(reloaded.messages[0].role, MessageRole::User);
        assert_eq!(reloaded.messages[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn post_message_rejects_empty_text_without_side_effects() {
        let h = harness();
        let interview = h
            .service
            .start(StartParams {
                role: Some("Head of AP".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let err = h.service.post_message(&interview.id, "  ").await.unwrap_err();
        assert!(matches!(err, HandoverError::Validation(_)));
        let reloaded = h.service.load(&interview.id).await.unwrap();
        assert!(reloaded.messages.is_empty());
    }

    #[tokio::test]
    async fn post_message_unknown_interview_is_not_found() {
        let h = harness();
        let err = h.service.post_message("ghost", "hello").await.unwrap_err();
        assert!(matches!(err, HandoverError::NotFound(_)));
    }

    #[tokio::test]
    async fn every_fifth_user_message_submits_snapshot_job() {
        let mut h = harness_with(Arc::new(EchoClient), 2);
        let interview = h
            .service
            .start(StartParams {
                role: Some("Head of AR".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        h.service.post_message(&interview.id, "first answer").await.unwrap();
        assert!(h.rx.try_recv().is_err());

        h.service.post_message(&interview.id, "second answer").await.unwrap();
        assert_eq!(
            h.rx.try_recv().unwrap(),
            Job::ExtractSnapshot {
                interview_id: interview.id.clone()
            }
        );
    }

    #[tokio::test]
    async fn topic_interview_reports_coverage_and_done_command() {
        let h = harness();
        let topic = Topic {
            id: "t1".into(),
            name: "Month-End Close".into(),
            description: String::new(),
            frequency: TopicFrequency::Monthly,
            category: String::new(),
            order: 0,
            status: TopicStatus::Pending,
            knowledge_entry_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        h.store.put("topics/t1", &topic).await.unwrap();

        let interview = h
            .service
            .start(StartParams {
                topic_id: Some("t1".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let outcome = h
            .service
            .post_message(&interview.id, "The process has clear steps and a strict schedule with a deadline")
            .await
            .unwrap();
        assert!(outcome.coverage.is_some());

        let outcome = h
            .service
            .post_message(&interview.id, "That's everything, nothing else to add")
            .await
            .unwrap();
        assert!(outcome.topic_complete);
        assert!(outcome.completion_detected);

        let topic: Topic = h.store.get("topics/t1").await.unwrap().unwrap();
        assert_eq!(topic.status, TopicStatus::Complete);
    }

    #[tokio::test]
    async fn interviewer_reply_can_signal_completion() {
        let mut h = harness_with(Arc::new(ConcludingClient), 50);
        let interview = h
            .service
            .start(StartParams {
                role: Some("Finance Director".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let outcome = h
            .service
            .post_message(&interview.id, "An ordinary answer")
            .await
            .unwrap();
        assert!(outcome.completion_detected);
        assert!(!outcome.topic_complete);
        // Completion triggers a snapshot even off-interval.
        assert!(h.rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn complete_is_terminal_and_idempotent() {
        let h = harness();
        let interview = h
            .service
            .start(StartParams {
                role: Some("Finance Director".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let completed = h.service.complete(&interview.id).await.unwrap();
        assert_eq!(completed.phase, Phase::Complete);
        assert!(completed.completed_at.is_some());

        let again = h.service.complete(&interview.id).await.unwrap();
        assert_eq!(again.phase, Phase::Complete);
    }

    #[tokio::test]
    async fn update_rejects_backward_phase() {
        let h = harness();
        let interview = h
            .service
            .start(StartParams {
                role: Some("Finance Director".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        h.service
            .update(
                &interview.id,
                UpdateParams {
                    phase: Some(Phase::Cases),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = h
            .service
            .update(
                &interview.id,
                UpdateParams {
                    phase: Some(Phase::WarmUp),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_cascades_dependents() {
        let h = harness();
        let interview = h
            .service
            .start(StartParams {
                role: Some("Finance Director".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let id = interview.id.clone();

        h.store
            .put(
                &format!("snapshots/{id}/s1"),
                &serde_json::json!({"id": "s1"}),
            )
            .await
            .unwrap();
        h.store
            .put(
                &format!("knowledge-points/{id}/kp_1"),
                &serde_json::json!({"id": "kp_1"}),
            )
            .await
            .unwrap();

        h.service.delete(&id).await.unwrap();
        assert!(matches!(
            h.service.load(&id).await.unwrap_err(),
            HandoverError::NotFound(_)
        ));
        assert!(h
            .store
            .list(&format!("snapshots/{id}"))
            .await
            .unwrap()
            .is_empty());
        assert!(h
            .store
            .list(&format!("knowledge-points/{id}"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn coverage_report_counts_and_percent() {
        let h = harness();
        let interview = h
            .service
            .start(StartParams {
                role: Some("Finance Director".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        h.service
            .post_message(
                &interview.id,
                "The monthly schedule has a hard deadline, and the process has steps",
            )
            .await
            .unwrap();

        let report = h.service.coverage_report(&interview.id).await.unwrap();
        assert_eq!(report.summary.total, 8);
        assert!(report.summary.covered >= 2);
        assert_eq!(
            report.summary.percent_complete,
            ((report.summary.covered as f64 / 8.0) * 100.0).round() as u32
        );
        let dates = report
            .areas
            .iter()
            .find(|a| a.key == AreaKey::Dates)
            .unwrap();
        assert!(dates.covered);
    }

    #[tokio::test]
    async fn checklist_topic_completion_advances_current() {
        let h = harness();
        let interview = h
            .service
            .start(StartParams {
                role: Some("Finance Director".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = h
            .service
            .complete_topic(&interview.id, "mtfs-development")
            .await
            .unwrap();
        assert_eq!(updated.current_topic_id.as_deref(), Some("budget-setting"));
        let progress = updated.topic_progress.as_ref().unwrap();
        assert_eq!(
            progress.get("mtfs-development").unwrap().status,
            ChecklistStatus::Complete
        );
        assert_eq!(
            progress.get("budget-setting").unwrap().status,
            ChecklistStatus::InProgress
        );
    }

    #[tokio::test]
    async fn topic_progress_report_summary() {
        let h = harness();
        let interview = h
            .service
            .start(StartParams {
                role: Some("Head of AP".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        h.service
            .complete_topic(&interview.id, "invoice-processing")
            .await
            .unwrap();
        let report = h.service.topic_progress_report(&interview.id).await.unwrap();
        assert_eq!(report.summary.total, 9);
        assert_eq!(report.summary.completed, 1);
        assert_eq!(report.summary.in_progress, 1);
        assert_eq!(report.summary.not_started, 7);
        let current = report.topics.iter().find(|t| t.is_current).unwrap();
        assert_eq!(current.id, "payment-runs");
    }

    #[tokio::test]
    async fn validate_topic_records_review_status() {
        let h = harness();
        let interview = h
            .service
            .start(StartParams {
                role: Some("Head of AP".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = h
            .service
            .validate_topic(&interview.id, "invoice-processing", ReviewStatus::Approved)
            .await
            .unwrap();
        let progress = updated
            .topic_progress
            .as_ref()
            .unwrap()
            .get("invoice-processing")
            .unwrap();
        assert!(progress.validated);
        assert_eq!(progress.validation_status, Some(ReviewStatus::Approved));
    }

    #[tokio::test]
    async fn summary_aggregates_snapshots_and_expected_topics() {
        let h = harness();
        let interview = h
            .service
            .start(StartParams {
                role: Some("Finance Director".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let id = interview.id.clone();

        let snapshot = Snapshot {
            id: "s1".into(),
            interview_id: id.clone(),
            phase: Phase::WarmUp,
            message_count: 2,
            timestamp: Utc::now(),
            extract: handover_schema::SnapshotExtract {
                topics_covered: vec!["Budget setting cycle".into(), "Reserves".into()],
                key_insights: vec!["insight".into()],
                frameworks_mentioned: vec![],
                gaps: vec![],
                suggested_probes: vec![],
            },
            knowledge_points_created: None,
        };
        h.store.put(&format!("snapshots/{id}/s1"), &snapshot).await.unwrap();

        let summary = h.service.summary(&id).await.unwrap();
        assert_eq!(summary.snapshot_count, 1);
        assert!(summary
            .coverage
            .covered_expected
            .iter()
            .any(|t| t.contains("Budget setting")));
        assert!(summary.coverage.percent < 70);
        assert_eq!(summary.coverage.depth, "shallow");
    }

    #[test]
    fn done_and_completion_patterns_match_substrings() {
        assert!(is_done_command("I think that's everything for today"));
        assert!(is_done_command("LET'S MOVE ON please"));
        assert!(!is_done_command("the work is never finishe"));
        assert!(signals_completion("Great - that concludes our session"));
        assert!(!signals_completion("let's dig deeper"));
    }
}
