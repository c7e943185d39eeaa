use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use handover_core::interview::{
    CoverageReport, InterviewSummary, MessageOutcome, TopicProgressReport, TranscriptView,
};
use handover_core::{QuestionSeed, StartParams, UpdateParams};
use handover_schema::{
    AreaKey, Interview, InterviewStatus, KnowledgePoint, KnowledgePointSource, Phase,
    ReviewStatus, Snapshot, Workflow,
};
use handover_store::DocumentStoreExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_interviews).post(start_interview))
        .route("/start", post(start_interview))
        .route("/{id}", get(get_interview).put(update_interview).delete(delete_interview))
        .route("/{id}/message", post(post_message))
        .route("/{id}/complete", post(complete_interview))
        .route("/{id}/coverage", get(coverage))
        .route("/{id}/transcript", get(transcript))
        .route("/{id}/summary", get(summary))
        .route("/{id}/note-snapshot", post(note_snapshot))
        .route("/{id}/snapshots", get(list_snapshots))
        .route("/{id}/initialize-topics", post(initialize_topics))
        .route("/{id}/topic-progress", get(topic_progress))
        .route("/{id}/topic/{topic_id}/select", post(select_topic))
        .route("/{id}/topic/{topic_id}/complete", post(complete_topic))
        .route("/{id}/topics/{topic_id}/validate", post(validate_topic))
        .route("/{id}/topics/{topic_id}/workflow", post(generate_workflow))
        .route("/{id}/workflows", get(list_workflows))
        .route(
            "/{id}/knowledge-points",
            get(knowledge_points).post(add_knowledge_point),
        )
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestionBody {
    pub id: Option<String>,
    pub text: Option<String>,
    pub title: Option<String>,
    pub order: Option<usize>,
}

impl QuestionBody {
    fn into_seed(self) -> QuestionSeed {
        QuestionSeed {
            id: self.id,
            text: self.text.or(self.title).unwrap_or_default(),
            order: self.order,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartBody {
    pub role: Option<String>,
    pub topic_id: Option<String>,
    pub expert_id: Option<String>,
    pub expert_name: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionBody>,
}

async fn start_interview(
    State(state): State<AppState>,
    Json(body): Json<StartBody>,
) -> Result<Json<Interview>, ApiError> {
    let interview = state
        .interviews
        .start(StartParams {
            role: body.role,
            topic_id: body.topic_id,
            expert_id: body.expert_id,
            expert_name: body.expert_name,
            industry: body.industry,
            description: body.description,
            questions: body.questions.into_iter().map(QuestionBody::into_seed).collect(),
        })
        .await?;
    Ok(Json(interview))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<InterviewStatus>,
    pub role: Option<String>,
    pub topic_id: Option<String>,
    pub expert_id: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewRow {
    pub id: String,
    pub role: Option<String>,
    pub phase: Phase,
    pub status: InterviewStatus,
    pub message_count: usize,
    pub expert_name: String,
    pub industry: String,
    pub expert_id: Option<String>,
    pub topic_id: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl InterviewRow {
    fn from_interview(interview: &Interview) -> Self {
        Self {
            id: interview.id.clone(),
            role: interview.role.clone(),
            phase: interview.phase,
            status: interview.status(),
            message_count: interview.messages.len(),
            expert_name: interview
                .expert_name
                .clone()
                .unwrap_or_else(|| "Unknown Expert".to_owned()),
            industry: interview
                .industry
                .clone()
                .unwrap_or_else(|| "Finance & Banking".to_owned()),
            expert_id: interview.expert_id.clone(),
            topic_id: interview.topic_id.clone(),
            created_at: interview.created_at,
            updated_at: interview.updated_at.unwrap_or(interview.created_at),
        }
    }
}

async fn list_interviews(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let interviews: Vec<Interview> = state
        .store
        .get_all("interviews")
        .await
        .map_err(handover_core::HandoverError::store)?;
    let mut rows: Vec<InterviewRow> = interviews.iter().map(InterviewRow::from_interview).collect();

    if let Some(status) = query.status {
        rows.retain(|r| r.status == status);
    }
    if let Some(role) = &query.role {
        rows.retain(|r| r.role.as_deref() == Some(role.as_str()));
    }
    if let Some(topic_id) = &query.topic_id {
        rows.retain(|r| r.topic_id.as_deref() == Some(topic_id.as_str()));
    }
    if let Some(expert_id) = &query.expert_id {
        rows.retain(|r| r.expert_id.as_deref() == Some(expert_id.as_str()));
    }

    let descending = query.sort_order.as_deref() != Some("asc");
    match query.sort_by.as_deref() {
        Some("updatedAt") => rows.sort_by_key(|r| r.updated_at),
        Some("messageCount") => rows.sort_by_key(|r| r.message_count),
        Some("role") => rows.sort_by(|a, b| a.role.cmp(&b.role)),
        Some("expertName") => {
            rows.sort_by(|a, b| a.expert_name.to_lowercase().cmp(&b.expert_name.to_lowercase()))
        }
        _ => rows.sort_by_key(|r| r.created_at),
    }
    if descending {
        rows.reverse();
    }

    Ok(Json(paginate(rows, query.page, query.limit, "interviews")))
}

/// Optional pagination: with neither page nor limit the bare list is
/// returned, matching the original API.
pub(crate) fn paginate<T: Serialize>(
    rows: Vec<T>,
    page: Option<usize>,
    limit: Option<usize>,
    field: &str,
) -> serde_json::Value {
    if page.is_none() && limit.is_none() {
        return serde_json::to_value(rows).unwrap_or_default();
    }
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).max(1);
    let total = rows.len();
    let total_pages = total.div_ceil(limit);
    let page_rows: Vec<&T> = rows.iter().skip((page - 1) * limit).take(limit).collect();
    json!({
        field: page_rows,
        "pagination": {
            "currentPage": page,
            "totalPages": total_pages,
            "total": total,
            "limit": limit,
        },
    })
}

async fn get_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let interview = state.interviews.load(&id).await?;
    let mut value = serde_json::to_value(&interview)
        .map_err(|e| handover_core::HandoverError::store(e.into()))?;
    value["status"] = serde_json::to_value(interview.status())
        .map_err(|e| handover_core::HandoverError::store(e.into()))?;
    Ok(Json(value))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub expert_name: Option<String>,
    pub industry: Option<String>,
    pub phase: Option<Phase>,
    pub expert_id: Option<String>,
    pub topic_id: Option<String>,
    pub questions: Option<Vec<QuestionBody>>,
    pub questions_completed: Option<Vec<String>>,
}

async fn update_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<Interview>, ApiError> {
    let interview = state
        .interviews
        .update(
            &id,
            UpdateParams {
                expert_name: body.expert_name,
                industry: body.industry,
                phase: body.phase,
                expert_id: body.expert_id,
                topic_id: body.topic_id,
                questions: body
                    .questions
                    .map(|qs| qs.into_iter().map(QuestionBody::into_seed).collect()),
                questions_completed: body.questions_completed,
            },
        )
        .await?;
    Ok(Json(interview))
}

async fn delete_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.interviews.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub message: Option<String>,
}

async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MessageBody>,
) -> Result<Json<MessageOutcome>, ApiError> {
    let text = body.message.unwrap_or_default();
    let outcome = state.interviews.post_message(&id, &text).await?;
    Ok(Json(outcome))
}

async fn complete_interview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Interview>, ApiError> {
    Ok(Json(state.interviews.complete(&id).await?))
}

async fn coverage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CoverageReport>, ApiError> {
    Ok(Json(state.interviews.coverage_report(&id).await?))
}

async fn transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptView>, ApiError> {
    Ok(Json(state.interviews.transcript(&id).await?))
}

async fn summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InterviewSummary>, ApiError> {
    Ok(Json(state.interviews.summary(&id).await?))
}

/// Manual, synchronous snapshot. Unlike the background trigger this surfaces
/// parse and upstream failures to the caller.
async fn note_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Snapshot>, ApiError> {
    Ok(Json(state.snapshots.extract(&id).await?))
}

async fn list_snapshots(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Snapshot>>, ApiError> {
    let mut snapshots = state.snapshots.list(&id).await?;
    snapshots.reverse();
    Ok(Json(snapshots))
}

async fn initialize_topics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.interviews.initialize_topics(&id).await?;
    Ok(Json(json!({
        "success": true,
        "topicCount": count,
    })))
}

async fn topic_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TopicProgressReport>, ApiError> {
    Ok(Json(state.interviews.topic_progress_report(&id).await?))
}

async fn select_topic(
    State(state): State<AppState>,
    Path((id, topic_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let interview = state.interviews.select_topic(&id, &topic_id).await?;
    Ok(Json(json!({
        "success": true,
        "currentTopicId": interview.current_topic_id,
        "topicProgress": interview.topic_progress.and_then(|p| p.get(&topic_id).cloned()),
    })))
}

async fn complete_topic(
    State(state): State<AppState>,
    Path((id, topic_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let interview = state.interviews.complete_topic(&id, &topic_id).await?;
    Ok(Json(json!({
        "success": true,
        "topicId": topic_id,
        "newCurrentTopicId": interview.current_topic_id,
        "topicProgress": interview.topic_progress,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTopicBody {
    pub validation_status: Option<String>,
}

async fn validate_topic(
    State(state): State<AppState>,
    Path((id, topic_id)): Path<(String, String)>,
    Json(body): Json<ValidateTopicBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = match body.validation_status.as_deref() {
        Some("draft") => ReviewStatus::Draft,
        Some("reviewed") => ReviewStatus::Reviewed,
        Some("approved") => ReviewStatus::Approved,
        _ => {
            return Err(ApiError::validation(
                "Invalid validationStatus. Must be one of: draft, reviewed, approved",
            ))
        }
    };
    let interview = state.interviews.validate_topic(&id, &topic_id, status).await?;
    Ok(Json(json!({
        "success": true,
        "topicId": topic_id,
        "topicProgress": interview.topic_progress.and_then(|p| p.get(&topic_id).cloned()),
    })))
}

async fn generate_workflow(
    State(state): State<AppState>,
    Path((id, topic_id)): Path<(String, String)>,
) -> Result<Json<Workflow>, ApiError> {
    Ok(Json(state.knowledge.generate_workflow(&id, &topic_id).await?))
}

async fn list_workflows(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Workflow>>, ApiError> {
    let _ = state.interviews.load(&id).await?;
    let workflows: Vec<Workflow> = state
        .store
        .get_all(&format!("workflows/{id}"))
        .await
        .map_err(handover_core::HandoverError::store)?;
    Ok(Json(workflows))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AreaGroup {
    area: AreaKey,
    points: Vec<KnowledgePoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicPointsGroup {
    id: String,
    name: String,
    areas: Vec<AreaGroup>,
}

async fn knowledge_points(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let interview = state.interviews.load(&id).await?;
    let points: Vec<KnowledgePoint> = state
        .store
        .get_all(&format!("knowledge-points/{id}"))
        .await
        .map_err(handover_core::HandoverError::store)?;

    // Group by checklist topic (plus a bucket for untracked topics), then by
    // area within each topic.
    let checklist = interview
        .role
        .as_deref()
        .and_then(|r| state.catalog.role(r))
        .map(|r| r.topics.as_slice())
        .unwrap_or_default();

    let mut topic_ids: Vec<String> = checklist.iter().map(|t| t.id.to_owned()).collect();
    for point in &points {
        if !topic_ids.contains(&point.topic_id) {
            topic_ids.push(point.topic_id.clone());
        }
    }

    let groups: Vec<TopicPointsGroup> = topic_ids
        .into_iter()
        .map(|topic_id| {
            let name = checklist
                .iter()
                .find(|t| t.id == topic_id)
                .map(|t| t.name.to_owned())
                .unwrap_or_else(|| {
                    if topic_id == "general" {
                        "General Knowledge".to_owned()
                    } else {
                        topic_id.clone()
                    }
                });
            let areas = AreaKey::ALL
                .iter()
                .map(|area| AreaGroup {
                    area: *area,
                    points: points
                        .iter()
                        .filter(|p| p.topic_id == topic_id && p.area == *area)
                        .cloned()
                        .collect(),
                })
                .filter(|g| !g.points.is_empty())
                .collect();
            TopicPointsGroup {
                id: topic_id,
                name,
                areas,
            }
        })
        .collect();

    let approved = points
        .iter()
        .filter(|p| p.status == ReviewStatus::Approved)
        .count();
    let reviewed = points
        .iter()
        .filter(|p| p.status == ReviewStatus::Reviewed)
        .count();

    Ok(Json(json!({
        "interviewId": id,
        "role": interview.role,
        "topics": groups,
        "summary": {
            "totalPoints": points.len(),
            "approvedPoints": approved,
            "reviewedPoints": reviewed,
            "draftPoints": points.len() - approved - reviewed,
        },
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPointBody {
    pub topic_id: Option<String>,
    pub area: Option<String>,
    pub content: Option<String>,
}

async fn add_knowledge_point(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AddPointBody>,
) -> Result<(StatusCode, Json<KnowledgePoint>), ApiError> {
    let _ = state.interviews.load(&id).await?;

    let area = match body.area.as_deref() {
        None => AreaKey::Tips,
        Some(raw) => AreaKey::parse(raw).ok_or_else(|| {
            ApiError::validation(format!(
                "Invalid area. Must be one of: {}",
                AreaKey::ALL
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?,
    };
    let content = body
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            ApiError::validation("Content is required and must be a non-empty string")
        })?;

    let now = chrono::Utc::now();
    let point = KnowledgePoint {
        id: format!("kp_{}", uuid::Uuid::new_v4().simple()),
        interview_id: id.clone(),
        topic_id: body.topic_id.unwrap_or_else(|| "general".to_owned()),
        area,
        content: content.to_owned(),
        source: KnowledgePointSource::Manual,
        status: ReviewStatus::Draft,
        created_at: now,
        updated_at: now,
    };
    state
        .store
        .put(&format!("knowledge-points/{id}/{}", point.id), &point)
        .await
        .map_err(handover_core::HandoverError::store)?;

    Ok((StatusCode::CREATED, Json(point)))
}
