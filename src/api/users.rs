//! Account, authentication, and subscription endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::IntoResponse,
};
use serde::Deserialize;

use super::{ApiError, CurrentUser, SharedState, internal, max_length, required};
use crate::auth;
use crate::models::{Profile, SubscriptionEntry, UserRole};
use crate::pagination::{PageParams, Paginated};

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct TokenLoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Deserialize)]
pub struct SubscriptionListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub recipes_limit: Option<i64>,
}

// ── Handlers ──────────────────────────────────────────────────────────

pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = required(req.email, "email")?;
    let username = required(req.username, "username")?;
    let first_name = required(req.first_name, "first_name")?;
    let last_name = required(req.last_name, "last_name")?;
    let password = required(req.password, "password")?;
    max_length(&email, "email", 254)?;
    max_length(&username, "username", 150)?;
    max_length(&first_name, "first_name", 150)?;
    max_length(&last_name, "last_name", 150)?;
    auth::validate_password(&password).map_err(|e| ApiError::field("password", e.to_string()))?;

    let (email_taken, username_taken) = {
        let email = email.clone();
        let username = username.clone();
        state
            .db
            .call(move |db| Ok((db.email_taken(&email)?, db.username_taken(&username)?)))
            .await
            .map_err(internal)?
    };
    if email_taken {
        return Err(ApiError::field("email", "user with this email already exists."));
    }
    if username_taken {
        return Err(ApiError::field(
            "username",
            "A user with that username already exists.",
        ));
    }

    let password_hash = auth::hash_password(&password);
    let user = state
        .db
        .call(move |db| {
            db.create_user(
                &email,
                &username,
                &first_name,
                &last_name,
                &password_hash,
                &UserRole::User,
            )
        })
        .await
        .map_err(internal)?;

    let profile = Profile {
        email: user.email,
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed: false,
    };
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn token_login(
    State(state): State<SharedState>,
    Json(req): Json<TokenLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = required(req.email, "email")?;
    let password = required(req.password, "password")?;

    let user = state
        .db
        .call(move |db| db.get_user_by_email(&email))
        .await
        .map_err(internal)?;
    let user = match user {
        Some(user) if auth::verify_password(&password, &user.password_hash) => user,
        _ => {
            return Err(ApiError::non_field(
                "Unable to log in with provided credentials.",
            ));
        }
    };

    let token = auth::new_token();
    let key = token.clone();
    state
        .db
        .call(move |db| db.insert_token(&key, user.id))
        .await
        .map_err(internal)?;
    Ok(Json(serde_json::json!({ "auth_token": token })))
}

pub async fn token_logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
    CurrentUser(_user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let token = auth::extract_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("Invalid token.".to_string()))?;
    state
        .db
        .call(move |db| db.delete_token(&token))
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users(
    State(state): State<SharedState>,
    CurrentUser(viewer): CurrentUser,
    Query(params): Query<PageParams>,
    uri: Uri,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params.limit();
    let offset = params.offset();
    let viewer_id = viewer.id;
    let (count, profiles) = state
        .db
        .call(move |db| {
            let count = db.count_users()?;
            let users = db.list_users(limit, offset)?;
            let mut profiles = Vec::with_capacity(users.len());
            for user in &users {
                profiles.push(db.profile_for(user, Some(viewer_id))?);
            }
            Ok((count, profiles))
        })
        .await
        .map_err(internal)?;
    Ok(Json(Paginated::new(
        count,
        profiles,
        &params,
        uri.path(),
        uri.query(),
    )))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(Profile {
        email: user.email,
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed: false,
    }))
}

pub async fn get_profile(
    State(state): State<SharedState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer_id = viewer.id;
    let profile = state
        .db
        .call(move |db| {
            match db.get_user(id)? {
                Some(user) => Ok(Some(db.profile_for(&user, Some(viewer_id))?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(internal)?;
    match profile {
        Some(profile) => Ok(Json(profile)),
        None => Err(ApiError::not_found()),
    }
}

pub async fn set_password(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = required(req.current_password, "current_password")?;
    let new = required(req.new_password, "new_password")?;

    if !auth::verify_password(&current, &user.password_hash) {
        return Err(ApiError::field("current_password", "Wrong password."));
    }
    auth::validate_password(&new).map_err(|e| ApiError::field("new_password", e.to_string()))?;

    let password_hash = auth::hash_password(&new);
    let user_id = user.id;
    state
        .db
        .call(move |db| db.set_password_hash(user_id, &password_hash))
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn subscribe(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(author_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if author_id == user.id {
        return Err(ApiError::non_field("Cannot subscribe to yourself."));
    }
    let user_id = user.id;
    let outcome = state
        .db
        .call(move |db| {
            if db.get_user(author_id)?.is_none() {
                return Ok(SubscribeOutcome::AuthorMissing);
            }
            if db.is_subscribed(user_id, author_id)? {
                return Ok(SubscribeOutcome::AlreadySubscribed);
            }
            db.add_subscription(user_id, author_id)?;
            Ok(SubscribeOutcome::Created)
        })
        .await
        .map_err(internal)?;
    match outcome {
        SubscribeOutcome::AuthorMissing => Err(ApiError::not_found()),
        SubscribeOutcome::AlreadySubscribed => {
            Err(ApiError::non_field("Already subscribed to this user."))
        }
        SubscribeOutcome::Created => Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({ "user": user.id, "author": author_id })),
        )),
    }
}

enum SubscribeOutcome {
    AuthorMissing,
    AlreadySubscribed,
    Created,
}

pub async fn unsubscribe(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(author_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let removed = state
        .db
        .call(move |db| {
            if db.get_user(author_id)?.is_none() {
                return Ok(None);
            }
            Ok(Some(db.remove_subscription(user_id, author_id)?))
        })
        .await
        .map_err(internal)?;
    match removed {
        Some(true) => Ok(StatusCode::NO_CONTENT),
        _ => Err(ApiError::not_found()),
    }
}

pub async fn subscriptions(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SubscriptionListParams>,
    uri: Uri,
) -> Result<impl IntoResponse, ApiError> {
    let page_params = PageParams { page: params.page, limit: params.limit };
    let limit = page_params.limit();
    let offset = page_params.offset();
    let recipes_limit = params.recipes_limit;
    let user_id = user.id;

    let (count, entries) = state
        .db
        .call(move |db| {
            let count = db.count_subscribed_authors(user_id)?;
            let authors = db.list_subscribed_authors(user_id, limit, offset)?;
            let mut entries = Vec::with_capacity(authors.len());
            for author in &authors {
                entries.push(SubscriptionEntry {
                    author: db.profile_for(author, Some(user_id))?,
                    recipes: db.recipes_by_author(author.id, recipes_limit)?,
                    recipes_count: db.count_recipes_by_author(author.id)?,
                });
            }
            Ok((count, entries))
        })
        .await
        .map_err(internal)?;

    Ok(Json(Paginated::new(
        count,
        entries,
        &page_params,
        uri.path(),
        uri.query(),
    )))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn register_creates_profile_without_password_echo() {
        let state = test_state();
        let (status, body) = send(
            state,
            "POST",
            "/api/users/",
            None,
            Some(json!({
                "email": "ada@example.com",
                "username": "ada",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "password": "sturdy-password"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["is_subscribed"], false);
        assert!(body.get("password").is_none());
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_weak_passwords() {
        let state = test_state();
        seed_user(&state, "ada@example.com", "ada");

        let (status, body) = send(
            state.clone(),
            "POST",
            "/api/users/",
            None,
            Some(json!({
                "email": "ada@example.com",
                "username": "ada2",
                "first_name": "A",
                "last_name": "B",
                "password": "sturdy-password"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["email"][0].as_str().unwrap().contains("already exists"));

        let (status, body) = send(
            state.clone(),
            "POST",
            "/api/users/",
            None,
            Some(json!({
                "email": "new@example.com",
                "username": "new",
                "first_name": "A",
                "last_name": "B",
                "password": "12345678"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["password"][0].as_str().unwrap().contains("numeric"));

        let (status, body) = send(
            state,
            "POST",
            "/api/users/",
            None,
            Some(json!({"email": "x@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["username"][0], "This field is required.");
    }

    #[tokio::test]
    async fn login_returns_token_and_rejects_bad_credentials() {
        let state = test_state();
        seed_user(&state, "ada@example.com", "ada");

        let (status, body) = send(
            state.clone(),
            "POST",
            "/api/auth/token/login/",
            None,
            Some(json!({"email": "ada@example.com", "password": "sturdy-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["auth_token"].as_str().unwrap().to_string();
        assert!(!token.is_empty());

        let (status, body) = get(state.clone(), "/api/users/me/", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "ada");

        let (status, body) = send(
            state,
            "POST",
            "/api/auth/token/login/",
            None,
            Some(json!({"email": "ada@example.com", "password": "wrong"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["non_field_errors"][0]
            .as_str()
            .unwrap()
            .contains("Unable to log in"));
    }

    #[tokio::test]
    async fn logout_revokes_the_token() {
        let state = test_state();
        let (_, token) = seed_user(&state, "ada@example.com", "ada");

        let (status, _) = send(
            state.clone(),
            "POST",
            "/api/auth/token/logout/",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = get(state, "/api/users/me/", Some(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn user_list_requires_auth_and_paginates() {
        let state = test_state();
        let (_, token) = seed_user(&state, "ada@example.com", "ada");
        seed_user(&state, "bob@example.com", "bob");
        seed_user(&state, "cat@example.com", "cat");

        let (status, _) = get(state.clone(), "/api/users/", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = get(state, "/api/users/?limit=2", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 3);
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
        assert_eq!(body["results"][0]["username"], "ada");
        assert!(body["next"].as_str().unwrap().contains("page=2"));
        assert!(body["previous"].is_null());
    }

    #[tokio::test]
    async fn set_password_verifies_the_current_one() {
        let state = test_state();
        let (_, token) = seed_user(&state, "ada@example.com", "ada");

        let (status, body) = send(
            state.clone(),
            "POST",
            "/api/users/set_password/",
            Some(&token),
            Some(json!({"current_password": "nope", "new_password": "another-good-one"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["current_password"][0], "Wrong password.");

        let (status, _) = send(
            state.clone(),
            "POST",
            "/api/users/set_password/",
            Some(&token),
            Some(json!({"current_password": "sturdy-password", "new_password": "another-good-one"})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        // New password now works for login.
        let (status, _) = send(
            state,
            "POST",
            "/api/auth/token/login/",
            None,
            Some(json!({"email": "ada@example.com", "password": "another-good-one"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn subscribe_rejects_self_duplicates_and_unknown_authors() {
        let state = test_state();
        let (ada, token) = seed_user(&state, "ada@example.com", "ada");
        let (bob, _) = seed_user(&state, "bob@example.com", "bob");

        let (status, body) = send(
            state.clone(),
            "POST",
            &format!("/api/users/{}/subscribe/", bob.id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"], ada.id);
        assert_eq!(body["author"], bob.id);

        let (status, _) = send(
            state.clone(),
            "POST",
            &format!("/api/users/{}/subscribe/", bob.id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            state.clone(),
            "POST",
            &format!("/api/users/{}/subscribe/", ada.id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            state.clone(),
            "POST",
            "/api/users/999/subscribe/",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Profile of bob as seen by ada now shows the subscription.
        let (_, body) = get(state, &format!("/api/users/{}/", bob.id), Some(&token)).await;
        assert_eq!(body["is_subscribed"], true);
    }

    #[tokio::test]
    async fn unsubscribe_is_404_when_not_subscribed() {
        let state = test_state();
        let (_, token) = seed_user(&state, "ada@example.com", "ada");
        let (bob, _) = seed_user(&state, "bob@example.com", "bob");

        let (status, _) = send(
            state.clone(),
            "DELETE",
            &format!("/api/users/{}/subscribe/", bob.id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(
            state.clone(),
            "POST",
            &format!("/api/users/{}/subscribe/", bob.id),
            Some(&token),
            None,
        )
        .await;
        let (status, _) = send(
            state,
            "DELETE",
            &format!("/api/users/{}/subscribe/", bob.id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn subscriptions_list_carries_recipes_and_counts() {
        let state = test_state();
        let (_, token) = seed_user(&state, "reader@example.com", "reader");
        let (cook, _) = seed_user(&state, "cook@example.com", "cook");
        {
            let db = state.db.lock_sync().unwrap();
            for name in ["Soup", "Salad", "Stew"] {
                db.create_recipe(cook.id, name, None, "Steps.", 15, &[], &[])
                    .unwrap();
            }
        }
        send(
            state.clone(),
            "POST",
            &format!("/api/users/{}/subscribe/", cook.id),
            Some(&token),
            None,
        )
        .await;

        let (status, body) = get(
            state,
            "/api/users/subscriptions/?recipes_limit=2",
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        let entry = &body["results"][0];
        assert_eq!(entry["username"], "cook");
        assert_eq!(entry["is_subscribed"], true);
        assert_eq!(entry["recipes_count"], 3);
        assert_eq!(entry["recipes"].as_array().unwrap().len(), 2);
        assert_eq!(entry["recipes"][0]["name"], "Stew");
    }
}
