//! Persona synthesis, validation, and the advisor surface.
//!
//! Versioning invariants: versions per role are strictly increasing from 1
//! and never reused (the next version is always 1 + the highest version ever
//! stored for the role, deletions included only while their documents exist).
//! At most one persona per role holds Validated status; validating a draft
//! deprecates every other validated persona of the same role.

use std::sync::Arc;

use chrono::Utc;
use handover_provider::{ChatRequest, LlmClient};
use handover_schema::{
    AdvisorLog, FeedbackNote, Interview, Persona, PersonaStatus, Snapshot,
};
use handover_store::{DocumentStore, DocumentStoreExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::RoleCatalog;
use crate::error::{HandoverError, Result, StoreErrExt};
use crate::prompts::persona_builder_prompt;

/// Per-role allocation record. Versions survive persona deletion: the counter
/// only moves forward, so a deleted version number is never handed out again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionCounter {
    last_version: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub status: PersonaStatus,
    pub validated_at: chrono::DateTime<Utc>,
    pub validated_by: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub feedback_recorded: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviseOutcome {
    pub response: String,
    pub persona_id: String,
    pub role: Option<String>,
}

/// Profile fields an operator may edit on a persona. A status change to
/// Validated carries the same side effects as the feedback endpoint.
#[derive(Debug, Clone, Default)]
pub struct PersonaUpdate {
    pub name: Option<String>,
    pub role: Option<String>,
    pub organization: Option<String>,
    pub bio: Option<String>,
    pub industry: Option<String>,
    pub status: Option<PersonaStatus>,
    pub is_favorite: Option<bool>,
}

pub struct PersonaService {
    store: Arc<dyn DocumentStore>,
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl PersonaService {
    pub fn new(store: Arc<dyn DocumentStore>, llm: Arc<dyn LlmClient>, model: String) -> Self {
        Self { store, llm, model }
    }

    pub async fn load(&self, id: &str) -> Result<Persona> {
        self.store
            .get(&format!("personas/{id}"))
            .await
            .store_err()?
            .ok_or_else(|| HandoverError::not_found("Persona", id))
    }

    async fn save(&self, persona: &Persona) -> Result<()> {
        self.store
            .put(&format!("personas/{}", persona.id), persona)
            .await
            .store_err()
    }

    /// Synthesize a draft persona from all snapshots of an interview. An
    /// interview without snapshots still yields a persona: the builder prompt
    /// receives an empty list.
    pub async fn build(&self, interview_id: &str) -> Result<Persona> {
        let interview: Interview = self
            .store
            .get(&format!("interviews/{interview_id}"))
            .await
            .store_err()?
            .ok_or_else(|| HandoverError::not_found("Interview", interview_id))?;

        let mut snapshots: Vec<Snapshot> = self
            .store
            .get_all(&format!("snapshots/{interview_id}"))
            .await
            .store_err()?;
        snapshots.sort_by_key(|s| s.timestamp);

        let snapshots_input = serde_json::to_string_pretty(&snapshots)
            .map_err(|e| HandoverError::parse(e.to_string()))?;

        let response = self
            .llm
            .chat(ChatRequest::simple(
                self.model.clone(),
                Some(persona_builder_prompt().to_owned()),
                snapshots_input,
            ))
            .await
            .map_err(HandoverError::upstream)?;

        let version = self.next_version(interview.role.as_deref()).await?;
        let persona = Persona {
            id: Uuid::new_v4().to_string(),
            role: interview.role.clone(),
            version,
            interview_id: interview_id.to_owned(),
            prompt_text: response.text,
            status: PersonaStatus::Draft,
            validated_by: None,
            validated_at: None,
            is_favorite: false,
            feedback_history: vec![],
            name: None,
            bio: None,
            organization: None,
            industry: None,
            viewed_at: None,
            created_at: Utc::now(),
            updated_at: None,
        };

        self.save(&persona).await?;
        info!(persona_id = %persona.id, role = ?persona.role, version, "persona built");
        Ok(persona)
    }

    async fn next_version(&self, role: Option<&str>) -> Result<u32> {
        let slug = role
            .map(RoleCatalog::slug)
            .unwrap_or_else(|| "unassigned".to_owned());
        let key = format!("persona-versions/{slug}");

        let allocated = self
            .store
            .get::<VersionCounter>(&key)
            .await
            .store_err()?
            .map(|c| c.last_version)
            .unwrap_or(0);

        // Seed from live documents too, for stores predating the counter.
        let personas: Vec<Persona> = self.store.get_all("personas").await.store_err()?;
        let live_max = personas
            .iter()
            .filter(|p| p.role.as_deref() == role)
            .map(|p| p.version)
            .max()
            .unwrap_or(0);

        let next = allocated.max(live_max) + 1;
        self.store
            .put(&key, &VersionCounter { last_version: next })
            .await
            .store_err()?;
        Ok(next)
    }

    /// Expert review: only Draft personas can be validated. Success
    /// deprecates every other Validated persona of the same role
    /// (last-validated-wins, no undo).
    pub async fn validate(
        &self,
        persona_id: &str,
        validated_by: &str,
        feedback: Option<String>,
    ) -> Result<ValidationOutcome> {
        if validated_by.trim().is_empty() {
            return Err(HandoverError::validation(
                "Invalid request. validatedBy is required and must be a string (email or identifier).",
            ));
        }

        let mut persona = self.load(persona_id).await?;
        if persona.status != PersonaStatus::Draft {
            return Err(HandoverError::conflict(format!(
                "Cannot validate persona. Current status is \"{:?}\". Only Draft personas can be validated.",
                persona.status
            )));
        }

        let feedback_recorded = feedback.is_some();
        if let Some(feedback) = feedback {
            persona.feedback_history.push(FeedbackNote {
                feedback,
                submitted_by: validated_by.to_owned(),
                submitted_at: Utc::now(),
            });
        }

        let now = Utc::now();
        persona.status = PersonaStatus::Validated;
        persona.validated_by = Some(validated_by.to_owned());
        persona.validated_at = Some(now);
        persona.updated_at = Some(now);
        self.save(&persona).await?;

        if let Some(role) = persona.role.clone() {
            self.deprecate_others(&role, persona_id).await?;
        }

        Ok(ValidationOutcome {
            status: persona.status,
            validated_at: now,
            validated_by: validated_by.to_owned(),
            feedback_recorded,
        })
    }

    async fn deprecate_others(&self, role: &str, exclude_id: &str) -> Result<()> {
        let personas: Vec<Persona> = self.store.get_all("personas").await.store_err()?;
        for mut other in personas {
            if other.id == exclude_id
                || other.role.as_deref() != Some(role)
                || other.status != PersonaStatus::Validated
            {
                continue;
            }
            other.status = PersonaStatus::Deprecated;
            other.updated_at = Some(Utc::now());
            info!(persona_id = %other.id, role, "persona deprecated by newer validation");
            self.save(&other).await?;
        }
        Ok(())
    }

    pub async fn apply_update(&self, persona_id: &str, update: PersonaUpdate) -> Result<Persona> {
        let mut persona = self.load(persona_id).await?;
        let validating = update.status == Some(PersonaStatus::Validated)
            && persona.status != PersonaStatus::Validated;

        if let Some(name) = update.name {
            persona.name = Some(name);
        }
        if let Some(role) = update.role {
            persona.role = Some(role);
        }
        if let Some(organization) = update.organization {
            persona.organization = Some(organization);
        }
        if let Some(bio) = update.bio {
            persona.bio = Some(bio);
        }
        if let Some(industry) = update.industry {
            persona.industry = Some(industry);
        }
        if let Some(status) = update.status {
            persona.status = status;
        }
        if let Some(is_favorite) = update.is_favorite {
            persona.is_favorite = is_favorite;
        }
        persona.updated_at = Some(Utc::now());
        self.save(&persona).await?;

        if validating {
            if let Some(role) = persona.role.clone() {
                self.deprecate_others(&role, persona_id).await?;
            }
        }
        Ok(persona)
    }

    /// Ask the synthesized expert a question. The interaction log is
    /// best-effort: a logging failure never fails the advice itself.
    pub async fn advise(
        &self,
        persona_id: &str,
        question: &str,
        user_id: Option<String>,
    ) -> Result<AdviseOutcome> {
        if question.trim().is_empty() {
            return Err(HandoverError::validation(
                "Invalid request. Question is required and must be a string.",
            ));
        }
        let persona = self.load(persona_id).await?;

        let response = self
            .llm
            .chat(ChatRequest::simple(
                self.model.clone(),
                Some(persona.prompt_text.clone()),
                question.to_owned(),
            ))
            .await
            .map_err(HandoverError::upstream)?;

        let log = AdvisorLog {
            id: Uuid::new_v4().to_string(),
            persona_id: persona.id.clone(),
            persona_version: persona.version,
            user_id,
            question: question.to_owned(),
            response: response.text.clone(),
            created_at: Utc::now(),
        };
        if let Err(error) = self.store.put(&format!("advisor-logs/{}", log.id), &log).await {
            warn!(%error, "failed to log advisor interaction");
        }

        Ok(AdviseOutcome {
            response: response.text,
            persona_id: persona.id,
            role: persona.role,
        })
    }

    pub async fn record_view(&self, persona_id: &str) -> Result<chrono::DateTime<Utc>> {
        let mut persona = self.load(persona_id).await?;
        let now = Utc::now();
        persona.viewed_at = Some(now);
        self.save(&persona).await?;
        Ok(now)
    }

    pub async fn delete(&self, persona_id: &str) -> Result<()> {
        let persona = self.load(persona_id).await?;
        self.store
            .remove(&format!("personas/{persona_id}"))
            .await
            .store_err()?;
        info!(persona_id, role = ?persona.role, "persona deleted");
        Ok(())
    }
}
