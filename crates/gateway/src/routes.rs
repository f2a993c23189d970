//! DetectIntent and the context relays.

use {
    axum::{
        extract::{Query, State},
        http::StatusCode,
        response::Json,
    },
    bpi_protocol::{Context, DetectIntentRequest, DetectIntentResponse},
    serde::Deserialize,
    tracing::debug,
};

use crate::{error::ApiError, server::AppState};

pub async fn detect_intent_handler(
    State(state): State<AppState>,
    Json(request): Json<DetectIntentRequest>,
) -> Result<Json<DetectIntentResponse>, ApiError> {
    if request.session.is_empty() {
        return Err(ApiError::invalid_request("session is required"));
    }
    let response = state.gateway.service.detect_intent(request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateContextBody {
    pub session: String,
    pub context: Context,
}

pub async fn get_context_handler(
    State(state): State<AppState>,
    Query(query): Query<ContextQuery>,
) -> Result<Json<Context>, ApiError> {
    debug!(context = %query.name, "relaying get_context");
    let context = state.gateway.service.client().get_context(&query.name).await?;
    Ok(Json(context))
}

pub async fn create_context_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateContextBody>,
) -> Result<(StatusCode, Json<Context>), ApiError> {
    if body.session.is_empty() || body.context.name.is_empty() {
        return Err(ApiError::invalid_request("session and context.name are required"));
    }
    debug!(session = %body.session, context = %body.context.name, "relaying create_context");
    let context = state
        .gateway
        .service
        .client()
        .create_context(&body.session, body.context)
        .await?;
    Ok((StatusCode::CREATED, Json(context)))
}

pub async fn update_context_handler(
    State(state): State<AppState>,
    Json(context): Json<Context>,
) -> Result<Json<Context>, ApiError> {
    if context.name.is_empty() {
        return Err(ApiError::invalid_request("context.name is required"));
    }
    debug!(context = %context.name, "relaying update_context");
    let context = state.gateway.service.client().update_context(context).await?;
    Ok(Json(context))
}

pub async fn delete_context_handler(
    State(state): State<AppState>,
    Query(query): Query<ContextQuery>,
) -> Result<StatusCode, ApiError> {
    debug!(context = %query.name, "relaying delete_context");
    state.gateway.service.client().delete_context(&query.name).await?;
    Ok(StatusCode::NO_CONTENT)
}
