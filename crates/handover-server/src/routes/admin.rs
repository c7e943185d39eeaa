use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use handover_schema::{AdvisorLog, Interview, InterviewStatus, Persona, PersonaStatus, Topic};
use handover_store::{DocumentStore, DocumentStoreExt};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard/stats", get(dashboard_stats))
        .route("/admin/dashboard", get(admin_dashboard))
        .route("/admin/advisor-logs", get(list_advisor_logs))
        .route("/admin/advisor-logs/{id}", get(get_advisor_log))
}

struct Counts {
    total_interviews: usize,
    scheduled: usize,
    active: usize,
    completed: usize,
    total_personas: usize,
    draft: usize,
    validated: usize,
    deprecated: usize,
    favorites: usize,
}

async fn gather_counts(store: &dyn DocumentStore) -> Result<Counts, ApiError> {
    let interviews: Vec<Interview> = store
        .get_all("interviews")
        .await
        .map_err(handover_core::HandoverError::store)?;
    let personas: Vec<Persona> = store
        .get_all("personas")
        .await
        .map_err(handover_core::HandoverError::store)?;

    let count_status = |status: InterviewStatus| {
        interviews.iter().filter(|i| i.status() == status).count()
    };
    let count_persona = |status: PersonaStatus| {
        personas.iter().filter(|p| p.status == status).count()
    };

    Ok(Counts {
        total_interviews: interviews.len(),
        scheduled: count_status(InterviewStatus::Scheduled),
        active: count_status(InterviewStatus::InProgress),
        completed: count_status(InterviewStatus::Completed),
        total_personas: personas.len(),
        draft: count_persona(PersonaStatus::Draft),
        validated: count_persona(PersonaStatus::Validated),
        deprecated: count_persona(PersonaStatus::Deprecated),
        favorites: personas.iter().filter(|p| p.is_favorite).count(),
    })
}

async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let counts = gather_counts(state.store.as_ref()).await?;

    let topics: Vec<Topic> = state
        .store
        .get_all("topics")
        .await
        .map_err(handover_core::HandoverError::store)?;
    let mut topics_by_status = json!({ "pending": 0, "in-progress": 0, "complete": 0 });
    for topic in &topics {
        let key = match serde_json::to_value(topic.status) {
            Ok(serde_json::Value::String(s)) => s,
            _ => continue,
        };
        topics_by_status[&key] = json!(topics_by_status[&key].as_u64().unwrap_or(0) + 1);
    }

    let experts = state
        .store
        .list("experts")
        .await
        .map_err(handover_core::HandoverError::store)?;
    let snapshot_dirs = state
        .store
        .list_namespaces("snapshots")
        .await
        .map_err(handover_core::HandoverError::store)?;

    Ok(Json(json!({
        "totalInterviews": counts.total_interviews,
        "scheduledInterviews": counts.scheduled,
        "activeInterviews": counts.active,
        "completedInterviews": counts.completed,
        "transcriptsReady": snapshot_dirs.len(),
        "totalPersonas": counts.total_personas,
        "personasByStatus": {
            "Draft": counts.draft,
            "Validated": counts.validated,
            "Deprecated": counts.deprecated,
        },
        "favoritePersonas": counts.favorites,
        "totalExperts": experts.len(),
        "totalTopics": topics.len(),
        "topicsByStatus": topics_by_status,
    })))
}

async fn admin_dashboard(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let counts = gather_counts(state.store.as_ref()).await?;
    Ok(Json(json!({
        "totalInterviews": counts.total_interviews,
        "completedPersonas": counts.total_personas,
        "validatedPersonas": counts.validated,
        "draftPersonas": counts.draft,
        "deprecatedPersonas": counts.deprecated,
        "scheduledInterviews": counts.scheduled,
        "activeInterviews": counts.active,
        "completedInterviews": counts.completed,
    })))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub persona_id: Option<String>,
    pub user_id: Option<String>,
    pub from_date: Option<chrono::DateTime<chrono::Utc>>,
    pub to_date: Option<chrono::DateTime<chrono::Utc>>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

async fn list_advisor_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut logs: Vec<AdvisorLog> = state
        .store
        .get_all("advisor-logs")
        .await
        .map_err(handover_core::HandoverError::store)?;

    if let Some(persona_id) = &query.persona_id {
        logs.retain(|l| &l.persona_id == persona_id);
    }
    if let Some(user_id) = &query.user_id {
        logs.retain(|l| l.user_id.as_deref() == Some(user_id.as_str()));
    }
    if let Some(from) = query.from_date {
        logs.retain(|l| l.created_at >= from);
    }
    if let Some(to) = query.to_date {
        logs.retain(|l| l.created_at <= to);
    }
    logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).max(1);
    let total = logs.len();
    let total_pages = total.div_ceil(limit);
    let page_logs: Vec<&AdvisorLog> = logs.iter().skip((page - 1) * limit).take(limit).collect();

    Ok(Json(json!({
        "logs": page_logs,
        "pagination": {
            "currentPage": page,
            "totalPages": total_pages,
            "totalLogs": total,
            "limit": limit,
        },
    })))
}

async fn get_advisor_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AdvisorLog>, ApiError> {
    let log: AdvisorLog = state
        .store
        .get(&format!("advisor-logs/{id}"))
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Advisor log", &id))?;
    Ok(Json(log))
}
