use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};

use parley_moderation::Moderator;
use parley_store::{NewUser, Storage};
use parley_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use parley_types::models::User;

use crate::error::ApiError;
use crate::middleware::Claims;

pub type AppState = Arc<AppStateInner>;

/// Shared per-process state, constructed once at startup and injected into
/// every handler. No ambient globals.
pub struct AppStateInner {
    pub store: Arc<dyn Storage>,
    pub moderator: Moderator,
    pub prefilter: Vec<String>,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation(
            "username must be 3-32 characters".to_string(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".to_string(),
        ));
    }
    if req.domain.trim().is_empty() {
        return Err(ApiError::Validation("domain must not be empty".to_string()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string();

    // Username uniqueness is enforced by the store; a duplicate surfaces
    // as a constraint violation and maps to 409.
    let user = state
        .store
        .create_user(NewUser {
            username: req.username,
            password: password_hash,
            domain: req.domain.trim().to_string(),
        })
        .await?;

    let token = create_token(&state.jwt_secret, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .store
        .get_user_by_username(&req.username)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored password hash is invalid: {e}"))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let token = create_token(&state.jwt_secret, &user)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        username: user.username,
        token,
    }))
}

fn create_token(secret: &str, user: &User) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        domain: user.domain.clone(),
        is_admin: user.is_admin,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("token creation failed: {e}").into())
}
