use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use handover_schema::AreaKey;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roles))
        .route("/{role}/checklist", get(role_checklist))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRow {
    pub role: &'static str,
    pub description: &'static str,
    pub topic_count: usize,
    pub process_oriented_count: usize,
}

async fn list_roles(State(state): State<AppState>) -> Json<Vec<RoleRow>> {
    let roles = state
        .catalog
        .roles()
        .iter()
        .map(|role| RoleRow {
            role: role.name,
            description: role.description,
            topic_count: role.topics.len(),
            process_oriented_count: role
                .topics
                .iter()
                .filter(|t| t.is_process_oriented)
                .count(),
        })
        .collect();
    Json(roles)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistTopicRow {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub is_process_oriented: bool,
    pub required_areas: Vec<AreaKey>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistResponse {
    pub role: String,
    pub description: &'static str,
    pub topic_count: usize,
    pub topics: Vec<ChecklistTopicRow>,
    pub process_oriented_count: usize,
}

async fn role_checklist(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<ChecklistResponse>, ApiError> {
    let profile = state
        .catalog
        .role(&role)
        .ok_or_else(|| ApiError::not_found("Role", &role))?;

    let topics: Vec<ChecklistTopicRow> = profile
        .topics
        .iter()
        .map(|t| ChecklistTopicRow {
            id: t.id,
            name: t.name,
            description: t.description,
            is_process_oriented: t.is_process_oriented,
            required_areas: t.required_areas.to_vec(),
        })
        .collect();

    Ok(Json(ChecklistResponse {
        role,
        description: profile.description,
        topic_count: topics.len(),
        process_oriented_count: topics.iter().filter(|t| t.is_process_oriented).count(),
        topics,
    }))
}
