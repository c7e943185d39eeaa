//! Shared domain types for the handover knowledge-capture platform.
//!
//! Everything here is plain serde data; behavior lives in `handover-core`.
//! Wire names are camelCase to stay compatible with the original HTTP API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interview phase. Ordinal order matters: transitions only ever move
/// forward, and `Complete` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    #[serde(rename = "warm-up")]
    WarmUp,
    #[serde(rename = "core-frameworks")]
    CoreFrameworks,
    #[serde(rename = "cases")]
    Cases,
    #[serde(rename = "meta")]
    Meta,
    #[serde(rename = "complete")]
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::WarmUp => "warm-up",
            Phase::CoreFrameworks => "core-frameworks",
            Phase::Cases => "cases",
            Phase::Meta => "meta",
            Phase::Complete => "complete",
        }
    }

    /// A phase change is legal iff it does not move backwards.
    pub fn can_transition_to(&self, next: Phase) -> bool {
        next >= *self
    }
}

/// The eight knowledge areas tracked per interview/topic.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum AreaKey {
    Overview,
    Tasks,
    Dates,
    Contacts,
    Systems,
    Pitfalls,
    Tips,
    Related,
}

impl AreaKey {
    pub const ALL: [AreaKey; 8] = [
        AreaKey::Overview,
        AreaKey::Tasks,
        AreaKey::Dates,
        AreaKey::Contacts,
        AreaKey::Systems,
        AreaKey::Pitfalls,
        AreaKey::Tips,
        AreaKey::Related,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AreaKey::Overview => "overview",
            AreaKey::Tasks => "tasks",
            AreaKey::Dates => "dates",
            AreaKey::Contacts => "contacts",
            AreaKey::Systems => "systems",
            AreaKey::Pitfalls => "pitfalls",
            AreaKey::Tips => "tips",
            AreaKey::Related => "related",
        }
    }

    pub fn parse(s: &str) -> Option<AreaKey> {
        Self::ALL.iter().copied().find(|a| a.as_str() == s)
    }
}

pub type CoverageMap = BTreeMap<AreaKey, bool>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single turn in an interview transcript. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Progress of one checklist topic inside a role-based interview.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    pub status: ChecklistStatus,
    pub coverage_percent: u8,
    pub validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_status: Option<ReviewStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_workflow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ChecklistStatus {
    #[default]
    #[serde(rename = "not-started")]
    NotStarted,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "complete")]
    Complete,
}

/// A structured question attached to an interview at start time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewQuestion {
    pub id: String,
    pub text: String,
    pub order: usize,
}

/// The conversational session between the system and a domain expert.
///
/// Messages are append-only and strictly ordered by insertion; the phase
/// never regresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    pub id: String,
    pub role: Option<String>,
    pub phase: Phase,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub coverage: CoverageMap,
    #[serde(default)]
    pub questions: Vec<InterviewQuestion>,
    #[serde(default)]
    pub questions_completed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_progress: Option<BTreeMap<String, TopicProgress>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_topic_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Listing status derived from stored state, never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InterviewStatus {
    Scheduled,
    InProgress,
    Completed,
}

impl Interview {
    pub fn status(&self) -> InterviewStatus {
        if self.phase == Phase::Complete {
            InterviewStatus::Completed
        } else if self.messages.is_empty() {
            InterviewStatus::Scheduled
        } else {
            InterviewStatus::InProgress
        }
    }

    pub fn user_message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .count()
    }
}

/// Structured fields a note-taker run extracts from a transcript slice.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotExtract {
    pub topics_covered: Vec<String>,
    pub key_insights: Vec<String>,
    pub frameworks_mentioned: Vec<String>,
    pub gaps: Vec<String>,
    pub suggested_probes: Vec<String>,
}

/// Point-in-time extraction from an interview transcript. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub interview_id: String,
    pub phase: Phase,
    pub message_count: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub extract: SnapshotExtract,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_points_created: Option<usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgePointSource {
    Snapshot,
    Manual,
}

/// Review workflow shared by knowledge points and workflow diagrams.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Draft,
    Reviewed,
    Approved,
}

/// A deduplicated unit of captured knowledge, categorized into an area.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgePoint {
    pub id: String,
    pub interview_id: String,
    pub topic_id: String,
    pub area: AreaKey,
    pub content: String,
    pub source: KnowledgePointSource,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A Mermaid process diagram extracted from a process-oriented topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub interview_id: String,
    pub topic_id: String,
    pub topic_name: String,
    pub mermaid_code: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PersonaStatus {
    Draft,
    Validated,
    Deprecated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackNote {
    pub feedback: String,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
}

/// A synthesized first-person expert persona, versioned per role.
///
/// At most one persona per role may be `Validated` at any time; validating a
/// draft deprecates every other validated persona of the same role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub role: Option<String>,
    pub version: u32,
    pub interview_id: String,
    pub prompt_text: String,
    pub status: PersonaStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub feedback_history: Vec<FeedbackNote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TopicFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
    #[serde(rename = "ad-hoc")]
    AdHoc,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TopicStatus {
    Pending,
    InProgress,
    Complete,
}

/// An operator-defined subject for a topic-focused interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub frequency: TopicFrequency,
    #[serde(default)]
    pub category: String,
    pub order: usize,
    pub status: TopicStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_entry_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The eight sections of a synthesized procedures-manual entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSections {
    pub overview: String,
    pub frequency: String,
    pub key_tasks: Vec<String>,
    pub key_dates: Vec<String>,
    pub contacts: Vec<String>,
    pub systems_and_tools: Vec<String>,
    pub watch_out_for: Vec<String>,
    pub pro_tips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrossReference {
    pub topic_id: Option<String>,
    pub topic_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeEntryStatus {
    #[default]
    Draft,
    Reviewed,
    Published,
}

/// A structured knowledge-base entry synthesized from a topic interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEntry {
    pub id: String,
    pub topic_id: String,
    pub topic_name: String,
    pub interview_id: String,
    pub sections: KnowledgeSections,
    #[serde(default)]
    pub cross_references: Vec<CrossReference>,
    #[serde(default)]
    pub quality_notes: String,
    pub status: KnowledgeEntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A fixed test question run against a persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub role: String,
    pub title: String,
    pub context: String,
    pub question: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Pending,
    Scored,
}

/// Human scores on the four review dimensions, each an integer in 1..=5.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub accuracy: u8,
    pub tone: u8,
    pub actionability: u8,
    pub risk_awareness: u8,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: String,
    pub persona_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_role: Option<String>,
    pub persona_version: u32,
    pub scenario_id: String,
    pub scenario_title: String,
    pub question: String,
    pub response: String,
    pub status: EvaluationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A registered domain expert account. The password digest never leaves the
/// server; list/detail responses use [`ExpertProfile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expert {
    pub id: String,
    pub username: String,
    pub password_digest: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpertProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Expert> for ExpertProfile {
    fn from(e: &Expert) -> Self {
        Self {
            id: e.id.clone(),
            username: e.username.clone(),
            name: e.name.clone(),
            job_title: e.job_title.clone(),
            department: e.department.clone(),
            bio: e.bio.clone(),
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

/// An opaque bearer credential issued at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    pub expert_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A record of one advisor question answered by a persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorLog {
    pub id: String,
    pub persona_id: String,
    pub persona_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub question: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_serializes_to_kebab_names() {
        assert_eq!(
            serde_json::to_value(Phase::WarmUp).unwrap(),
            serde_json::json!("warm-up")
        );
        assert_eq!(
            serde_json::to_value(Phase::CoreFrameworks).unwrap(),
            serde_json::json!("core-frameworks")
        );
        let parsed: Phase = serde_json::from_str("\"complete\"").unwrap();
        assert_eq!(parsed, Phase::Complete);
    }

    #[test]
    fn phase_transitions_are_forward_only() {
        assert!(Phase::WarmUp.can_transition_to(Phase::CoreFrameworks));
        assert!(Phase::WarmUp.can_transition_to(Phase::Complete));
        assert!(Phase::Cases.can_transition_to(Phase::Cases));
        assert!(!Phase::Cases.can_transition_to(Phase::WarmUp));
        assert!(!Phase::Complete.can_transition_to(Phase::Meta));
        assert!(Phase::Complete.can_transition_to(Phase::Complete));
    }

    #[test]
    fn area_key_round_trips_through_strings() {
        for area in AreaKey::ALL {
            assert_eq!(AreaKey::parse(area.as_str()), Some(area));
            let json = serde_json::to_string(&area).unwrap();
            assert_eq!(json, format!("\"{}\"", area.as_str()));
        }
        assert_eq!(AreaKey::parse("nonsense"), None);
    }

    #[test]
    fn interview_status_derivation() {
        let mut interview = Interview {
            id: "i1".into(),
            role: Some("Finance Director".into()),
            phase: Phase::WarmUp,
            messages: vec![],
            coverage: CoverageMap::new(),
            questions: vec![],
            questions_completed: vec![],
            topic_progress: None,
            current_topic_id: None,
            topic_id: None,
            expert_id: None,
            expert_name: None,
            industry: None,
            description: None,
            created_at: Utc::now(),
            updated_at: None,
            completed_at: None,
        };
        assert_eq!(interview.status(), InterviewStatus::Scheduled);

        interview.messages.push(Message {
            role: MessageRole::User,
            content: "hello".into(),
            timestamp: Utc::now(),
        });
        assert_eq!(interview.status(), InterviewStatus::InProgress);
        assert_eq!(interview.user_message_count(), 1);

        interview.phase = Phase::Complete;
        assert_eq!(interview.status(), InterviewStatus::Completed);
    }

    #[test]
    fn snapshot_flattens_extract_fields() {
        let snapshot = Snapshot {
            id: "s1".into(),
            interview_id: "i1".into(),
            phase: Phase::Cases,
            message_count: 4,
            timestamp: Utc::now(),
            extract: SnapshotExtract {
                topics_covered: vec!["month-end".into()],
                key_insights: vec!["reconcile early".into()],
                frameworks_mentioned: vec![],
                gaps: vec![],
                suggested_probes: vec![],
            },
            knowledge_points_created: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["topicsCovered"][0], "month-end");
        assert_eq!(json["keyInsights"][0], "reconcile early");
        assert_eq!(json["messageCount"], 4);
    }

    #[test]
    fn auth_token_expiry() {
        let now = Utc::now();
        let token = AuthToken {
            token: "t".into(),
            expert_id: "e1".into(),
            issued_at: now,
            expires_at: now + chrono::Duration::hours(24),
        };
        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + chrono::Duration::hours(25)));
    }

    #[test]
    fn expert_profile_drops_password_digest() {
        let expert = Expert {
            id: "e1".into(),
            username: "jsmith".into(),
            password_digest: "salt$digest".into(),
            name: "J Smith".into(),
            job_title: None,
            department: None,
            bio: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let profile = ExpertProfile::from(&expert);
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("passwordDigest").is_none());
        assert_eq!(json["username"], "jsmith");
    }

    #[test]
    fn coverage_map_serializes_with_area_keys() {
        let mut coverage = CoverageMap::new();
        coverage.insert(AreaKey::Overview, true);
        coverage.insert(AreaKey::Pitfalls, false);
        let json = serde_json::to_value(&coverage).unwrap();
        assert_eq!(json["overview"], true);
        assert_eq!(json["pitfalls"], false);
    }
}
