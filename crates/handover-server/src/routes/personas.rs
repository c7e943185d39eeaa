use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use handover_core::persona::{AdviseOutcome, ValidationOutcome};
use handover_core::PersonaUpdate;
use handover_schema::{Persona, PersonaStatus};
use handover_store::DocumentStoreExt;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_personas).delete(bulk_delete))
        .route("/build", post(build_persona))
        .route("/{id}", get(get_persona).put(update_persona).delete(delete_persona))
        .route("/{id}/view", post(record_view))
        .route("/{id}/advise", post(advise))
        .route("/{id}/feedback", post(feedback))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildBody {
    pub interview_id: Option<String>,
}

async fn build_persona(
    State(state): State<AppState>,
    Json(body): Json<BuildBody>,
) -> Result<Json<Persona>, ApiError> {
    let interview_id = body
        .interview_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            ApiError::validation("Invalid request. interviewId is required and must be a string.")
        })?;
    Ok(Json(state.personas.build(&interview_id).await?))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersonaListQuery {
    pub status: Option<PersonaStatus>,
    pub role: Option<String>,
    pub is_favorite: Option<bool>,
    pub latest_validated: Option<bool>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

async fn list_personas(
    State(state): State<AppState>,
    Query(query): Query<PersonaListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut personas: Vec<Persona> = state
        .store
        .get_all("personas")
        .await
        .map_err(handover_core::HandoverError::store)?;

    if let Some(status) = query.status {
        personas.retain(|p| p.status == status);
    }
    if let Some(role) = &query.role {
        personas.retain(|p| p.role.as_deref() == Some(role.as_str()));
    }
    if query.is_favorite == Some(true) {
        personas.retain(|p| p.is_favorite);
    }

    // Reduce to the highest validated version per role.
    if query.latest_validated == Some(true) {
        personas.retain(|p| p.status == PersonaStatus::Validated);
        let mut latest: Vec<Persona> = Vec::new();
        for persona in personas {
            match latest
                .iter_mut()
                .find(|existing| existing.role == persona.role)
            {
                Some(existing) if existing.version < persona.version => *existing = persona,
                Some(_) => {}
                None => latest.push(persona),
            }
        }
        personas = latest;
    }

    // Default ordering: role ascending, then version descending.
    personas.sort_by(|a, b| a.role.cmp(&b.role).then(b.version.cmp(&a.version)));

    Ok(Json(super::interviews::paginate(
        personas,
        query.page,
        query.limit,
        "personas",
    )))
}

async fn get_persona(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Persona>, ApiError> {
    Ok(Json(state.personas.load(&id).await?))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePersonaBody {
    pub name: Option<String>,
    pub role: Option<String>,
    pub organization: Option<String>,
    pub bio: Option<String>,
    pub industry: Option<String>,
    pub status: Option<PersonaStatus>,
    pub is_favorite: Option<bool>,
}

async fn update_persona(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdatePersonaBody>,
) -> Result<Json<Persona>, ApiError> {
    let persona = state
        .personas
        .apply_update(
            &id,
            PersonaUpdate {
                name: body.name,
                role: body.role,
                organization: body.organization,
                bio: body.bio,
                industry: body.industry,
                status: body.status,
                is_favorite: body.is_favorite,
            },
        )
        .await?;
    Ok(Json(persona))
}

async fn delete_persona(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.personas.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteBody {
    pub ids: Option<Vec<String>>,
}

async fn bulk_delete(
    State(state): State<AppState>,
    Json(body): Json<BulkDeleteBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ids = body
        .ids
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ApiError::validation("ids array is required in request body"))?;

    let mut deleted = Vec::new();
    let mut not_found = Vec::new();
    for id in ids {
        match state.personas.delete(&id).await {
            Ok(()) => deleted.push(id),
            Err(handover_core::HandoverError::NotFound(_)) => not_found.push(id),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Json(json!({
        "deleted": deleted,
        "notFound": not_found,
        "message": format!("Deleted {} persona(s)", deleted.len()),
    })))
}

async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let viewed_at = state.personas.record_view(&id).await?;
    Ok(Json(json!({ "viewedAt": viewed_at })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviseBody {
    pub question: Option<String>,
    pub user_id: Option<String>,
}

async fn advise(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AdviseBody>,
) -> Result<Json<AdviseOutcome>, ApiError> {
    let question = body.question.unwrap_or_default();
    Ok(Json(
        state.personas.advise(&id, &question, body.user_id).await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackBody {
    pub validated_by: Option<String>,
    pub feedback: Option<String>,
}

async fn feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<FeedbackBody>,
) -> Result<Json<ValidationOutcome>, ApiError> {
    let validated_by = body.validated_by.unwrap_or_default();
    Ok(Json(
        state
            .personas
            .validate(&id, &validated_by, body.feedback)
            .await?,
    ))
}
