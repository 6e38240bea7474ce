use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use parley_moderation::prefilter_hit;
use parley_store::NewMessage;
use parley_types::api::PostMessageRequest;
use parley_types::models::{Message, Visibility};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::Claims;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub visibility: Option<String>,
}

pub async fn post_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (visibility, domain) = validate_payload(&req)?;

    // Cheap boundary guard; trivially profane content never reaches the
    // classifier.
    if prefilter_hit(&req.content, &state.prefilter) {
        return Err(ApiError::Validation(
            "Message contains inappropriate content".to_string(),
        ));
    }

    let verdict = state.moderator.moderate(&req.content).await;
    if verdict.flagged {
        return Err(ApiError::Validation(verdict.reason.unwrap_or_else(|| {
            "Message rejected by moderation".to_string()
        })));
    }

    let message = state
        .store
        .create_message(NewMessage {
            author_id: claims.sub,
            content: req.content,
            visibility,
            domain,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Message>>, ApiError> {
    // Unknown or missing scopes match nothing.
    let Some(visibility) = query.visibility.as_deref().and_then(Visibility::parse) else {
        return Ok(Json(Vec::new()));
    };

    if visibility == Visibility::Admin && !claims.is_admin {
        return Err(ApiError::Forbidden);
    }

    // Domain reads are always scoped to the caller's own domain, never a
    // caller-supplied one.
    let domain = match visibility {
        Visibility::Domain => Some(claims.domain.as_str()),
        _ => None,
    };

    let messages = state.store.get_messages(visibility, domain).await?;
    Ok(Json(messages))
}

fn validate_payload(req: &PostMessageRequest) -> Result<(Visibility, Option<String>), ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("content must not be empty".to_string()));
    }

    let visibility = Visibility::parse(&req.visibility).ok_or_else(|| {
        ApiError::Validation(format!("unknown visibility '{}'", req.visibility))
    })?;

    match visibility {
        Visibility::Domain => {
            let domain = req.domain.as_deref().map(str::trim).unwrap_or("");
            if domain.is_empty() {
                return Err(ApiError::Validation(
                    "domain-visibility messages require a domain".to_string(),
                ));
            }
            Ok((visibility, Some(domain.to_string())))
        }
        _ => {
            if req.domain.is_some() {
                return Err(ApiError::Validation(
                    "domain is only valid with domain visibility".to_string(),
                ));
            }
            Ok((visibility, None))
        }
    }
}
