//! Credential primitives and the bearer-token middleware.
//!
//! Passwords are stored as `{salt}${digest}` where digest is
//! SHA-256(salt || password), both hex. Login issues an opaque random token
//! stored as a document with a 24h expiry; protected routes resolve it via
//! the `Authorization: Bearer` header.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use handover_schema::{AuthToken, Expert, ExpertProfile};
use handover_store::DocumentStoreExt;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);
    format!("{salt_hex}${}", digest_hex(&salt_hex, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest)) = stored.split_once('$') else {
        return false;
    };
    digest_hex(salt_hex, password)
        .as_bytes()
        .ct_eq(digest.as_bytes())
        .into()
}

fn digest_hex(salt_hex: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Mint and persist a fresh bearer token for an expert.
pub async fn issue_token(
    state: &AppState,
    expert_id: &str,
) -> Result<AuthToken, anyhow::Error> {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    let now = Utc::now();
    let token = AuthToken {
        token: hex::encode(raw),
        expert_id: expert_id.to_owned(),
        issued_at: now,
        expires_at: now + Duration::hours(state.token_ttl_hours),
    };
    state
        .store
        .put(&format!("tokens/{}", token.token), &token)
        .await?;
    Ok(token)
}

/// The authenticated expert, injected into request extensions by
/// [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentExpert {
    pub expert: ExpertProfile,
    pub token: String,
}

pub fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Reject requests without a valid, unexpired bearer token.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(&request) else {
        return Err(ApiError::unauthorized(
            "Authentication required. Provide a bearer token.",
        ));
    };

    let stored: Option<AuthToken> = state
        .store
        .get(&format!("tokens/{token}"))
        .await
        .map_err(|e| ApiError::from(handover_core::HandoverError::store(e)))?;
    let Some(stored) = stored else {
        return Err(ApiError::unauthorized("Invalid or expired token"));
    };
    if stored.is_expired(Utc::now()) {
        let _ = state.store.remove(&format!("tokens/{token}")).await;
        return Err(ApiError::unauthorized("Invalid or expired token"));
    }

    let expert: Option<Expert> = state
        .store
        .get(&format!("experts/{}", stored.expert_id))
        .await
        .map_err(|e| ApiError::from(handover_core::HandoverError::store(e)))?;
    let Some(expert) = expert else {
        return Err(ApiError::unauthorized(
            "The account associated with this token no longer exists",
        ));
    };

    request.extensions_mut().insert(CurrentExpert {
        expert: ExpertProfile::from(&expert),
        token,
    });
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let stored = hash_password("hunter22");
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("same-password");
        let b = hash_password("same-password");
        assert_ne!(a, b);
        assert!(verify_password("same-password", &a));
        assert!(verify_password("same-password", &b));
    }

    #[test]
    fn malformed_stored_digest_never_verifies() {
        assert!(!verify_password("anything", "no-dollar-sign"));
        assert!(!verify_password("anything", ""));
    }
}
