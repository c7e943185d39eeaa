use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use handover_schema::{KnowledgeEntry, Topic, TopicFrequency, TopicStatus};
use handover_store::DocumentStoreExt;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_topics).post(create_topic))
        .route("/reorder", put(reorder_topics))
        .route("/{id}", get(get_topic).put(update_topic).delete(delete_topic))
        .route("/{id}/synthesize", post(synthesize))
}

fn parse_frequency(raw: &str) -> Result<TopicFrequency, ApiError> {
    serde_json::from_value(serde_json::Value::String(raw.to_owned())).map_err(|_| {
        ApiError::validation(
            "Invalid frequency. Must be one of: daily, weekly, monthly, quarterly, annual, ad-hoc",
        )
    })
}

fn parse_status(raw: &str) -> Result<TopicStatus, ApiError> {
    serde_json::from_value(serde_json::Value::String(raw.to_owned())).map_err(|_| {
        ApiError::validation("Invalid status. Must be one of: pending, in-progress, complete")
    })
}

#[derive(Debug, Deserialize, Default)]
pub struct TopicsQuery {
    pub status: Option<String>,
    pub frequency: Option<String>,
}

async fn list_topics(
    State(state): State<AppState>,
    Query(query): Query<TopicsQuery>,
) -> Result<Json<Vec<Topic>>, ApiError> {
    let mut topics: Vec<Topic> = state
        .store
        .get_all("topics")
        .await
        .map_err(handover_core::HandoverError::store)?;

    if let Some(status) = query.status.as_deref() {
        let status = parse_status(status)?;
        topics.retain(|t| t.status == status);
    }
    if let Some(frequency) = query.frequency.as_deref() {
        let frequency = parse_frequency(frequency)?;
        topics.retain(|t| t.frequency == frequency);
    }

    topics.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
    Ok(Json(topics))
}

async fn get_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Topic>, ApiError> {
    let topic: Topic = state
        .store
        .get(&format!("topics/{id}"))
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Topic", &id))?;
    Ok(Json(topic))
}

#[derive(Debug, Deserialize)]
pub struct CreateTopicBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<String>,
    pub order: Option<usize>,
    pub category: Option<String>,
}

async fn create_topic(
    State(state): State<AppState>,
    Json(body): Json<CreateTopicBody>,
) -> Result<(StatusCode, Json<Topic>), ApiError> {
    let name = body
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            ApiError::validation("Invalid request. Name is required and must be a non-empty string.")
        })?;

    let frequency = match body.frequency.as_deref() {
        Some(raw) => parse_frequency(raw)?,
        None => TopicFrequency::AdHoc,
    };

    let order = match body.order {
        Some(order) => order,
        None => state
            .store
            .list("topics")
            .await
            .map_err(handover_core::HandoverError::store)?
            .len(),
    };

    let now = Utc::now();
    let topic = Topic {
        id: Uuid::new_v4().to_string(),
        name: name.to_owned(),
        description: body.description.unwrap_or_default(),
        frequency,
        category: body.category.unwrap_or_default(),
        order,
        status: TopicStatus::Pending,
        knowledge_entry_id: None,
        created_at: now,
        updated_at: now,
    };
    state
        .store
        .put(&format!("topics/{}", topic.id), &topic)
        .await
        .map_err(handover_core::HandoverError::store)?;

    Ok((StatusCode::CREATED, Json(topic)))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateTopicBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<String>,
    pub order: Option<usize>,
    pub status: Option<String>,
    pub category: Option<String>,
}

async fn update_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTopicBody>,
) -> Result<Json<Topic>, ApiError> {
    let key = format!("topics/{id}");
    let mut topic: Topic = state
        .store
        .get(&key)
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Topic", &id))?;

    if let Some(frequency) = body.frequency.as_deref() {
        topic.frequency = parse_frequency(frequency)?;
    }
    if let Some(status) = body.status.as_deref() {
        topic.status = parse_status(status)?;
    }
    if let Some(name) = body.name {
        topic.name = name.trim().to_owned();
    }
    if let Some(description) = body.description {
        topic.description = description;
    }
    if let Some(category) = body.category {
        topic.category = category;
    }
    if let Some(order) = body.order {
        topic.order = order;
    }
    topic.updated_at = Utc::now();
    state
        .store
        .put(&key, &topic)
        .await
        .map_err(handover_core::HandoverError::store)?;
    Ok(Json(topic))
}

async fn delete_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .store
        .remove(&format!("topics/{id}"))
        .await
        .map_err(handover_core::HandoverError::store)?;
    if !removed {
        return Err(ApiError::not_found("Topic", &id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderBody {
    pub topic_ids: Option<Vec<String>>,
}

async fn reorder_topics(
    State(state): State<AppState>,
    Json(body): Json<ReorderBody>,
) -> Result<Json<Vec<Topic>>, ApiError> {
    let topic_ids = body.topic_ids.ok_or_else(|| {
        ApiError::validation("Invalid request. topicIds must be an array of topic IDs.")
    })?;

    let mut updated = Vec::new();
    for (order, topic_id) in topic_ids.iter().enumerate() {
        let key = format!("topics/{topic_id}");
        if let Some(mut topic) = state
            .store
            .get::<Topic>(&key)
            .await
            .map_err(handover_core::HandoverError::store)?
        {
            topic.order = order;
            topic.updated_at = Utc::now();
            state
                .store
                .put(&key, &topic)
                .await
                .map_err(handover_core::HandoverError::store)?;
            updated.push(topic);
        }
    }
    Ok(Json(updated))
}

async fn synthesize(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<KnowledgeEntry>), ApiError> {
    let entry = state.knowledge.synthesize(&id).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
