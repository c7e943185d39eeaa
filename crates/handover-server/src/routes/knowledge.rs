//! Top-level routes for knowledge points, workflow diagrams, and knowledge
//! entries (the per-interview listings live under `/interviews`).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use handover_schema::{
    AreaKey, KnowledgeEntry, KnowledgeEntryStatus, KnowledgePoint, KnowledgeSections,
    ReviewStatus, Topic, Workflow,
};
use handover_store::DocumentStoreExt;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/knowledge-points/{interview_id}/{point_id}",
            axum::routing::put(update_point).delete(delete_point),
        )
        .route(
            "/workflows/{interview_id}/{workflow_id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/knowledge-entries", get(list_entries))
        .route(
            "/knowledge-entries/{id}",
            get(get_entry).put(update_entry).delete(delete_entry),
        )
}

fn parse_review_status(raw: &str) -> Result<ReviewStatus, ApiError> {
    match raw {
        "draft" => Ok(ReviewStatus::Draft),
        "reviewed" => Ok(ReviewStatus::Reviewed),
        "approved" => Ok(ReviewStatus::Approved),
        _ => Err(ApiError::validation(
            "Invalid status. Must be one of: draft, reviewed, approved",
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePointBody {
    pub content: Option<String>,
    pub area: Option<String>,
    pub status: Option<String>,
    pub topic_id: Option<String>,
}

async fn update_point(
    State(state): State<AppState>,
    Path((interview_id, point_id)): Path<(String, String)>,
    Json(body): Json<UpdatePointBody>,
) -> Result<Json<KnowledgePoint>, ApiError> {
    let key = format!("knowledge-points/{interview_id}/{point_id}");
    let mut point: KnowledgePoint = state
        .store
        .get(&key)
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Knowledge point", &point_id))?;

    if let Some(area) = body.area.as_deref() {
        point.area = AreaKey::parse(area).ok_or_else(|| {
            ApiError::validation(format!(
                "Invalid area. Must be one of: {}",
                AreaKey::ALL
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;
    }
    if let Some(status) = body.status.as_deref() {
        point.status = parse_review_status(status)?;
    }
    if let Some(content) = body.content {
        point.content = content.trim().to_owned();
    }
    if let Some(topic_id) = body.topic_id {
        point.topic_id = topic_id;
    }
    point.updated_at = Utc::now();
    state
        .store
        .put(&key, &point)
        .await
        .map_err(handover_core::HandoverError::store)?;
    Ok(Json(point))
}

async fn delete_point(
    State(state): State<AppState>,
    Path((interview_id, point_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .store
        .remove(&format!("knowledge-points/{interview_id}/{point_id}"))
        .await
        .map_err(handover_core::HandoverError::store)?;
    if !removed {
        return Err(ApiError::not_found("Knowledge point", &point_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn get_workflow(
    State(state): State<AppState>,
    Path((interview_id, workflow_id)): Path<(String, String)>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow: Workflow = state
        .store
        .get(&format!("workflows/{interview_id}/{workflow_id}"))
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Workflow", &workflow_id))?;
    Ok(Json(workflow))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkflowBody {
    pub mermaid_code: Option<String>,
    pub status: Option<String>,
}

async fn update_workflow(
    State(state): State<AppState>,
    Path((interview_id, workflow_id)): Path<(String, String)>,
    Json(body): Json<UpdateWorkflowBody>,
) -> Result<Json<Workflow>, ApiError> {
    let key = format!("workflows/{interview_id}/{workflow_id}");
    let mut workflow: Workflow = state
        .store
        .get(&key)
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Workflow", &workflow_id))?;

    if let Some(status) = body.status.as_deref() {
        workflow.status = parse_review_status(status)?;
    }
    if let Some(code) = body.mermaid_code {
        workflow.mermaid_code = code;
    }
    workflow.updated_at = Utc::now();
    state
        .store
        .put(&key, &workflow)
        .await
        .map_err(handover_core::HandoverError::store)?;
    Ok(Json(workflow))
}

async fn delete_workflow(
    State(state): State<AppState>,
    Path((interview_id, workflow_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let key = format!("workflows/{interview_id}/{workflow_id}");
    let workflow: Workflow = state
        .store
        .get(&key)
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Workflow", &workflow_id))?;
    state
        .store
        .remove(&key)
        .await
        .map_err(handover_core::HandoverError::store)?;

    // Unlink from the interview's topic progress.
    if let Ok(mut interview) = state.interviews.load(&interview_id).await {
        if let Some(progress) = interview
            .topic_progress
            .as_mut()
            .and_then(|p| p.get_mut(&workflow.topic_id))
        {
            progress.has_workflow = false;
            progress.workflow_id = None;
            state
                .store
                .put(&format!("interviews/{interview_id}"), &interview)
                .await
                .map_err(handover_core::HandoverError::store)?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EntriesQuery {
    pub status: Option<KnowledgeEntryStatus>,
    pub topic_id: Option<String>,
}

async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<Vec<KnowledgeEntry>>, ApiError> {
    let mut entries: Vec<KnowledgeEntry> = state
        .store
        .get_all("knowledge-entries")
        .await
        .map_err(handover_core::HandoverError::store)?;

    if let Some(status) = query.status {
        entries.retain(|e| e.status == status);
    }
    if let Some(topic_id) = &query.topic_id {
        entries.retain(|e| &e.topic_id == topic_id);
    }
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(entries))
}

async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<KnowledgeEntry>, ApiError> {
    let entry: KnowledgeEntry = state
        .store
        .get(&format!("knowledge-entries/{id}"))
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Knowledge entry", &id))?;
    Ok(Json(entry))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntryBody {
    pub sections: Option<PartialSections>,
    pub status: Option<KnowledgeEntryStatus>,
    pub quality_notes: Option<String>,
}

/// Partial section edit: present fields replace, absent fields keep.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PartialSections {
    pub overview: Option<String>,
    pub frequency: Option<String>,
    pub key_tasks: Option<Vec<String>>,
    pub key_dates: Option<Vec<String>>,
    pub contacts: Option<Vec<String>>,
    pub systems_and_tools: Option<Vec<String>>,
    pub watch_out_for: Option<Vec<String>>,
    pub pro_tips: Option<Vec<String>>,
}

impl PartialSections {
    fn apply(self, sections: &mut KnowledgeSections) {
        if let Some(v) = self.overview {
            sections.overview = v;
        }
        if let Some(v) = self.frequency {
            sections.frequency = v;
        }
        if let Some(v) = self.key_tasks {
            sections.key_tasks = v;
        }
        if let Some(v) = self.key_dates {
            sections.key_dates = v;
        }
        if let Some(v) = self.contacts {
            sections.contacts = v;
        }
        if let Some(v) = self.systems_and_tools {
            sections.systems_and_tools = v;
        }
        if let Some(v) = self.watch_out_for {
            sections.watch_out_for = v;
        }
        if let Some(v) = self.pro_tips {
            sections.pro_tips = v;
        }
    }
}

async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateEntryBody>,
) -> Result<Json<KnowledgeEntry>, ApiError> {
    let key = format!("knowledge-entries/{id}");
    let mut entry: KnowledgeEntry = state
        .store
        .get(&key)
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Knowledge entry", &id))?;

    if let Some(sections) = body.sections {
        sections.apply(&mut entry.sections);
    }
    if let Some(status) = body.status {
        entry.status = status;
    }
    if let Some(notes) = body.quality_notes {
        entry.quality_notes = notes;
    }
    entry.updated_at = Utc::now();
    state
        .store
        .put(&key, &entry)
        .await
        .map_err(handover_core::HandoverError::store)?;
    Ok(Json(entry))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let key = format!("knowledge-entries/{id}");
    let entry: KnowledgeEntry = state
        .store
        .get(&key)
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Knowledge entry", &id))?;

    // Unlink from the owning topic before removing.
    let topic_key = format!("topics/{}", entry.topic_id);
    if let Some(mut topic) = state
        .store
        .get::<Topic>(&topic_key)
        .await
        .map_err(handover_core::HandoverError::store)?
    {
        if topic.knowledge_entry_id.as_deref() == Some(id.as_str()) {
            topic.knowledge_entry_id = None;
            topic.updated_at = Utc::now();
            state
                .store
                .put(&topic_key, &topic)
                .await
                .map_err(handover_core::HandoverError::store)?;
        }
    }

    state
        .store
        .remove(&key)
        .await
        .map_err(handover_core::HandoverError::store)?;
    Ok(StatusCode::NO_CONTENT)
}
