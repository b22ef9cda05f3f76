use std::sync::Arc;

use axum::{
    Json, Router,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::auth;
use crate::config::ServerConfig;
use crate::db::DbHandle;
use crate::models::User;

pub mod catalog;
pub mod recipes;
pub mod users;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub config: ServerConfig,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

/// Handler-level errors mapped onto the wire format the API speaks:
/// `{"detail": ...}` bodies for status-style errors and arbitrary
/// `{field: [messages]}` objects for validation failures.
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Validation(serde_json::Value),
    Unauthorized(String),
    Forbidden(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found() -> Self {
        Self::NotFound("Not found.".to_string())
    }

    /// 400 with a single message under the given field name.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut body = serde_json::Map::new();
        body.insert(
            field.to_string(),
            serde_json::Value::from(vec![message.into()]),
        );
        Self::Validation(serde_json::Value::Object(body))
    }

    /// 400 with a message not tied to any one field.
    pub fn non_field(message: impl Into<String>) -> Self {
        Self::field("non_field_errors", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({"detail": msg})),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({"detail": msg}))
            }
            ApiError::Validation(body) => (StatusCode::BAD_REQUEST, body),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, serde_json::json!({"detail": msg}))
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, serde_json::json!({"detail": msg})),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({"detail": msg}))
            }
        };
        (status, Json(body)).into_response()
    }
}

// ── Validation helpers shared by the handler modules ──────────────────

pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::field(field, "This field is required.")),
    }
}

pub(crate) fn max_length(value: &str, field: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::field(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        ));
    }
    Ok(())
}

pub(crate) fn internal(e: anyhow::Error) -> ApiError {
    ApiError::Internal(e.to_string())
}

// ── Identity extractors ───────────────────────────────────────────────

/// Required authentication: rejects with 401 when the token header is
/// missing or does not resolve to a user.
pub struct CurrentUser(pub User);

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = auth::extract_token(&parts.headers).ok_or_else(|| {
            ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;
        let user = state
            .db
            .call(move |db| db.user_by_token(&token))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        user.map(CurrentUser)
            .ok_or_else(|| ApiError::Unauthorized("Invalid token.".to_string()))
    }
}

/// Optional authentication for public endpoints whose responses are
/// still viewer-scoped. A missing header yields `None`; a token that
/// fails to resolve is still a 401.
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<SharedState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        match auth::extract_token(&parts.headers) {
            None => Ok(MaybeUser(None)),
            Some(token) => {
                let user = state
                    .db
                    .call(move |db| db.user_by_token(&token))
                    .await
                    .map_err(|e| ApiError::Internal(e.to_string()))?;
                match user {
                    Some(user) => Ok(MaybeUser(Some(user))),
                    None => Err(ApiError::Unauthorized("Invalid token.".to_string())),
                }
            }
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/users/", get(users::list_users).post(users::register))
        .route("/api/users/me/", get(users::me))
        .route("/api/users/set_password/", post(users::set_password))
        .route("/api/users/subscriptions/", get(users::subscriptions))
        .route("/api/users/{id}/", get(users::get_profile))
        .route(
            "/api/users/{id}/subscribe/",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .route("/api/auth/token/login/", post(users::token_login))
        .route("/api/auth/token/logout/", post(users::token_logout))
        .route("/api/tags/", get(catalog::list_tags))
        .route("/api/tags/{id}/", get(catalog::get_tag))
        .route("/api/ingredients/", get(catalog::list_ingredients))
        .route("/api/ingredients/{id}/", get(catalog::get_ingredient))
        .route(
            "/api/recipes/",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/api/recipes/download_shopping_cart/",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/api/recipes/{id}/",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(
            "/api/recipes/{id}/favorite/",
            post(recipes::add_favorite).delete(recipes::remove_favorite),
        )
        .route(
            "/api/recipes/{id}/shopping_cart/",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "ok"
}

// ── Test plumbing shared by the handler test modules ──────────────────
