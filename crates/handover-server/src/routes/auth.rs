use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::Utc;
use handover_schema::{Expert, ExpertProfile};
use handover_store::DocumentStoreExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{hash_password, issue_token, verify_password, CurrentExpert};
use crate::error::ApiError;
use crate::state::AppState;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/me", put(update_me))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub username: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

async fn find_by_username(state: &AppState, username: &str) -> Result<Option<Expert>, ApiError> {
    let experts: Vec<Expert> = state
        .store
        .get_all("experts")
        .await
        .map_err(handover_core::HandoverError::store)?;
    Ok(experts.into_iter().find(|e| e.username == username))
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<ExpertProfile>), ApiError> {
    let username = body.username.as_deref().unwrap_or("").trim().to_owned();
    if username.len() < 3 {
        return Err(ApiError::validation(
            "Username is required and must be at least 3 characters.",
        ));
    }
    let password = body.password.unwrap_or_default();
    if password.len() < 6 {
        return Err(ApiError::validation(
            "Password is required and must be at least 6 characters.",
        ));
    }
    let Some(name) = body.name.filter(|n| !n.trim().is_empty()) else {
        return Err(ApiError::validation("Name is required."));
    };

    if find_by_username(&state, &username).await?.is_some() {
        return Err(ApiError::conflict("Username already exists."));
    }

    let now = Utc::now();
    let expert = Expert {
        id: Uuid::new_v4().to_string(),
        username,
        password_digest: hash_password(&password),
        name,
        job_title: body.job_title,
        department: body.department,
        bio: body.bio,
        created_at: now,
        updated_at: now,
    };
    state
        .store
        .put(&format!("experts/{}", expert.id), &expert)
        .await
        .map_err(handover_core::HandoverError::store)?;

    Ok((StatusCode::CREATED, Json(ExpertProfile::from(&expert))))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
    pub expert: ExpertProfile,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return Err(ApiError::validation("Username and password are required."));
    };

    let expert = find_by_username(&state, &username)
        .await?
        .filter(|e| verify_password(&password, &e.password_digest))
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials."))?;

    let token = issue_token(&state, &expert.id)
        .await
        .map_err(handover_core::HandoverError::store)?;

    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token: token.token,
        expires_at: token.expires_at,
        expert: ExpertProfile::from(&expert),
    }))
}

async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentExpert>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .store
        .remove(&format!("tokens/{}", current.token))
        .await
        .map_err(handover_core::HandoverError::store)?;
    Ok(Json(serde_json::json!({ "message": "Logout successful" })))
}

async fn me(Extension(current): Extension<CurrentExpert>) -> Json<ExpertProfile> {
    Json(current.expert)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeBody {
    pub name: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub bio: Option<String>,
    pub password: Option<String>,
}

async fn update_me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentExpert>,
    Json(body): Json<UpdateMeBody>,
) -> Result<Json<ExpertProfile>, ApiError> {
    let key = format!("experts/{}", current.expert.id);
    let mut expert: Expert = state
        .store
        .get(&key)
        .await
        .map_err(handover_core::HandoverError::store)?
        .ok_or_else(|| ApiError::not_found("Expert", &current.expert.id))?;

    if let Some(name) = body.name {
        expert.name = name;
    }
    if let Some(job_title) = body.job_title {
        expert.job_title = Some(job_title);
    }
    if let Some(department) = body.department {
        expert.department = Some(department);
    }
    if let Some(bio) = body.bio {
        expert.bio = Some(bio);
    }
    if let Some(password) = body.password {
        if password.len() < 6 {
            return Err(ApiError::validation(
                "Password must be at least 6 characters.",
            ));
        }
        expert.password_digest = hash_password(&password);
    }
    expert.updated_at = Utc::now();
    state
        .store
        .put(&key, &expert)
        .await
        .map_err(handover_core::HandoverError::store)?;

    Ok(Json(ExpertProfile::from(&expert)))
}
