use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use handover_core::qa::{
    PersonaAnalytics, QaSummary, RunOutcome, ScenarioAnalytics, ScoreOutcome,
};
use handover_schema::{Evaluation, EvaluationStatus, Scenario};
use handover_store::DocumentStoreExt;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/scenarios/{role}", get(scenarios_for_role))
        .route("/run", post(run_scenario))
        .route("/evaluate", post(evaluate))
        .route("/evaluations", get(list_evaluations))
        .route("/evaluations/{id}", get(get_evaluation))
        .route("/analytics/personas/{id}", get(persona_analytics))
        .route("/analytics/scenarios", get(scenario_analytics))
        .route("/analytics/summary", get(qa_summary))
        .route("/analytics/export", get(export))
}

async fn scenarios_for_role(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<Vec<Scenario>>, ApiError> {
    Ok(Json(state.qa.scenarios_for_role(&role).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunBody {
    pub persona_id: Option<String>,
    pub scenario_id: Option<String>,
}

async fn run_scenario(
    State(state): State<AppState>,
    Json(body): Json<RunBody>,
) -> Result<Json<RunOutcome>, ApiError> {
    let persona_id = body
        .persona_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            ApiError::validation("Invalid request. personaId is required and must be a string.")
        })?;
    let scenario_id = body
        .scenario_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            ApiError::validation("Invalid request. scenarioId is required and must be a string.")
        })?;
    Ok(Json(state.qa.run(&persona_id, &scenario_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateBody {
    pub evaluation_id: Option<String>,
    pub accuracy: Option<i64>,
    pub tone: Option<i64>,
    pub actionability: Option<i64>,
    pub risk_awareness: Option<i64>,
    pub comments: Option<String>,
}

async fn evaluate(
    State(state): State<AppState>,
    Json(body): Json<EvaluateBody>,
) -> Result<Json<ScoreOutcome>, ApiError> {
    let evaluation_id = body
        .evaluation_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            ApiError::validation("Invalid request. evaluationId is required and must be a string.")
        })?;

    let mut dims = [0i64; 4];
    for (slot, (name, value)) in dims.iter_mut().zip([
        ("accuracy", body.accuracy),
        ("tone", body.tone),
        ("actionability", body.actionability),
        ("riskAwareness", body.risk_awareness),
    ]) {
        *slot = value
            .ok_or_else(|| ApiError::validation(format!("Invalid request. {name} is required.")))?;
    }

    Ok(Json(
        state
            .qa
            .score(&evaluation_id, dims[0], dims[1], dims[2], dims[3], body.comments)
            .await?,
    ))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationsQuery {
    pub persona_id: Option<String>,
    pub scenario_id: Option<String>,
    pub status: Option<EvaluationStatus>,
}

async fn list_evaluations(
    State(state): State<AppState>,
    Query(query): Query<EvaluationsQuery>,
) -> Result<Json<Vec<Evaluation>>, ApiError> {
    let mut evaluations: Vec<Evaluation> = state
        .store
        .get_all("evaluations")
        .await
        .map_err(handover_core::HandoverError::store)?;

    if let Some(persona_id) = &query.persona_id {
        evaluations.retain(|e| &e.persona_id == persona_id);
    }
    if let Some(scenario_id) = &query.scenario_id {
        evaluations.retain(|e| &e.scenario_id == scenario_id);
    }
    if let Some(status) = query.status {
        evaluations.retain(|e| e.status == status);
    }
    evaluations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(evaluations))
}

async fn get_evaluation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Evaluation>, ApiError> {
    let evaluation: Evaluation = state
        .store
        .get(&format!("evaluations/{id}"))
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Evaluation", &id))?;
    Ok(Json(evaluation))
}

async fn persona_analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PersonaAnalytics>, ApiError> {
    Ok(Json(state.qa.persona_analytics(&id).await?))
}

async fn scenario_analytics(
    State(state): State<AppState>,
) -> Result<Json<ScenarioAnalytics>, ApiError> {
    Ok(Json(state.qa.scenario_analytics().await?))
}

async fn qa_summary(State(state): State<AppState>) -> Result<Json<QaSummary>, ApiError> {
    Ok(Json(state.qa.summary().await?))
}

#[derive(Debug, Deserialize, Default)]
pub struct ExportQuery {
    pub format: Option<String>,
}

async fn export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.format.as_deref() != Some("csv") {
        return Err(ApiError::validation("Invalid format. Only \"csv\" is supported."));
    }
    let csv = state.qa.export_csv().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"qa-evaluations.csv\"",
            ),
        ],
        csv,
    ))
}
