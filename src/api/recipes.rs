//! Recipe CRUD, favorites, shopping cart, and the shopping-list export.

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{ApiError, CurrentUser, MaybeUser, SharedState, internal, max_length, required};
use crate::filters::parse_recipe_query;
use crate::media;
use crate::models::IngredientAmountInput;
use crate::pagination::Paginated;
use crate::shopping;

pub const MIN_AMOUNT: i64 = 1;
pub const MAX_AMOUNT: i64 = 10_000;
pub const MIN_COOKING_TIME: i64 = 1;
pub const MAX_COOKING_TIME: i64 = 32_767;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RecipeUpsertRequest {
    pub ingredients: Option<Vec<IngredientAmountInput>>,
    pub tags: Option<Vec<i64>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
}

#[derive(Deserialize)]
pub struct DownloadParams {
    pub format: Option<String>,
}

// ── Validation helpers ────────────────────────────────────────────────

fn validate_cooking_time(cooking_time: i64) -> Result<(), ApiError> {
    if !(MIN_COOKING_TIME..=MAX_COOKING_TIME).contains(&cooking_time) {
        return Err(ApiError::field(
            "cooking_time",
            format!(
                "Cooking time must be between {} and {}.",
                MIN_COOKING_TIME, MAX_COOKING_TIME
            ),
        ));
    }
    Ok(())
}

fn validate_ingredients(items: &[IngredientAmountInput]) -> Result<(), ApiError> {
    for item in items {
        if !(MIN_AMOUNT..=MAX_AMOUNT).contains(&item.amount) {
            return Err(ApiError::field(
                "ingredients",
                format!("Amount must be between {} and {}.", MIN_AMOUNT, MAX_AMOUNT),
            ));
        }
    }
    Ok(())
}

/// 400 if any referenced tag or ingredient id is unknown.
async fn check_references(
    state: &SharedState,
    tags: Vec<i64>,
    ingredient_ids: Vec<i64>,
) -> Result<(), ApiError> {
    let (missing_tags, missing_ingredients) = state
        .db
        .call(move |db| {
            Ok((
                db.missing_tag_ids(&tags)?,
                db.missing_ingredient_ids(&ingredient_ids)?,
            ))
        })
        .await
        .map_err(internal)?;
    if let Some(id) = missing_tags.first() {
        return Err(ApiError::field(
            "tags",
            format!("Invalid pk \"{}\" - object does not exist.", id),
        ));
    }
    if let Some(id) = missing_ingredients.first() {
        return Err(ApiError::field(
            "ingredients",
            format!("Invalid pk \"{}\" - object does not exist.", id),
        ));
    }
    Ok(())
}

// ── Recipe CRUD ───────────────────────────────────────────────────────

pub async fn list_recipes(
    State(state): State<SharedState>,
    MaybeUser(viewer): MaybeUser,
    uri: Uri,
) -> Result<impl IntoResponse, ApiError> {
    let (filters, params) = parse_recipe_query(uri.query());
    let viewer_id = viewer.map(|u| u.id);
    let limit = params.limit();
    let offset = params.offset();
    let (count, results) = state
        .db
        .call(move |db| {
            Ok((
                db.count_recipes(&filters, viewer_id)?,
                db.list_recipes(&filters, viewer_id, limit, offset)?,
            ))
        })
        .await
        .map_err(internal)?;
    Ok(Json(Paginated::new(
        count,
        results,
        &params,
        uri.path(),
        uri.query(),
    )))
}

pub async fn get_recipe(
    State(state): State<SharedState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer_id = viewer.map(|u| u.id);
    let detail = state
        .db
        .call(move |db| db.recipe_detail(id, viewer_id))
        .await
        .map_err(internal)?;
    match detail {
        Some(detail) => Ok(Json(detail)),
        None => Err(ApiError::not_found()),
    }
}

pub async fn create_recipe(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<RecipeUpsertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = required(req.name, "name")?;
    max_length(&name, "name", 255)?;
    let text = required(req.text, "text")?;
    let cooking_time = req
        .cooking_time
        .ok_or_else(|| ApiError::field("cooking_time", "This field is required."))?;
    validate_cooking_time(cooking_time)?;
    let ingredients = req
        .ingredients
        .ok_or_else(|| ApiError::field("ingredients", "This field is required."))?;
    validate_ingredients(&ingredients)?;
    let tags = req
        .tags
        .ok_or_else(|| ApiError::field("tags", "This field is required."))?;
    let image_payload = required(req.image, "image")?;

    let ingredient_ids: Vec<i64> = ingredients.iter().map(|i| i.id).collect();
    check_references(&state, tags.clone(), ingredient_ids).await?;

    let image_path = media::save_image(&state.config.media_dir, &image_payload)
        .map_err(|e| ApiError::field("image", e.to_string()))?;

    let author_id = user.id;
    let view = state
        .db
        .call(move |db| {
            let recipe = db.create_recipe(
                author_id,
                &name,
                Some(&image_path),
                &text,
                cooking_time,
                &tags,
                &ingredients,
            )?;
            db.recipe_write_view(recipe.id)
        })
        .await
        .map_err(internal)?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_recipe(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<RecipeUpsertRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let recipe = state
        .db
        .call(move |db| db.get_recipe(id))
        .await
        .map_err(internal)?
        .ok_or_else(ApiError::not_found)?;
    if recipe.author_id != user.id {
        return Err(ApiError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ));
    }

    if let Some(ref name) = req.name {
        max_length(name, "name", 255)?;
    }
    if let Some(cooking_time) = req.cooking_time {
        validate_cooking_time(cooking_time)?;
    }
    if let Some(ref ingredients) = req.ingredients {
        validate_ingredients(ingredients)?;
    }
    let tags_to_check = req.tags.clone().unwrap_or_default();
    let ingredient_ids: Vec<i64> = req
        .ingredients
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|i| i.id)
        .collect();
    check_references(&state, tags_to_check, ingredient_ids).await?;

    let image_path = match req.image {
        Some(payload) => Some(
            media::save_image(&state.config.media_dir, &payload)
                .map_err(|e| ApiError::field("image", e.to_string()))?,
        ),
        None => None,
    };

    let view = state
        .db
        .call(move |db| {
            db.update_recipe(
                id,
                req.name.as_deref(),
                image_path.as_deref(),
                req.text.as_deref(),
                req.cooking_time,
                req.tags.as_deref(),
                req.ingredients.as_deref(),
            )?;
            db.recipe_write_view(id)
        })
        .await
        .map_err(internal)?;
    Ok(Json(view))
}

pub async fn delete_recipe(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let recipe = state
        .db
        .call(move |db| db.get_recipe(id))
        .await
        .map_err(internal)?
        .ok_or_else(ApiError::not_found)?;
    if recipe.author_id != user.id {
        return Err(ApiError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ));
    }
    state
        .db
        .call(move |db| db.delete_recipe(id))
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Favorites and shopping cart ───────────────────────────────────────

enum ToggleOutcome {
    MissingRecipe,
    Duplicate,
    Added,
}

pub async fn add_favorite(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let outcome = state
        .db
        .call(move |db| {
            if db.get_recipe(id)?.is_none() {
                return Ok(ToggleOutcome::MissingRecipe);
            }
            if db.has_favorite(user_id, id)? {
                return Ok(ToggleOutcome::Duplicate);
            }
            db.add_favorite(user_id, id)?;
            Ok(ToggleOutcome::Added)
        })
        .await
        .map_err(internal)?;
    match outcome {
        ToggleOutcome::MissingRecipe => Err(ApiError::field(
            "recipe",
            format!("Invalid pk \"{}\" - object does not exist.", id),
        )),
        ToggleOutcome::Duplicate => Err(ApiError::non_field("Recipe is already in favorites.")),
        ToggleOutcome::Added => Ok(Json(serde_json::json!({ "user": user.id, "recipe": id }))),
    }
}

pub async fn remove_favorite(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let removed = state
        .db
        .call(move |db| {
            if db.get_recipe(id)?.is_none() {
                return Ok(None);
            }
            Ok(Some(db.remove_favorite(user_id, id)?))
        })
        .await
        .map_err(internal)?;
    match removed {
        Some(true) => Ok(StatusCode::NO_CONTENT),
        _ => Err(ApiError::not_found()),
    }
}

pub async fn add_to_cart(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let outcome = state
        .db
        .call(move |db| {
            if db.get_recipe(id)?.is_none() {
                return Ok(ToggleOutcome::MissingRecipe);
            }
            if db.has_cart_item(user_id, id)? {
                return Ok(ToggleOutcome::Duplicate);
            }
            db.add_cart_item(user_id, id)?;
            Ok(ToggleOutcome::Added)
        })
        .await
        .map_err(internal)?;
    match outcome {
        ToggleOutcome::MissingRecipe => Err(ApiError::field(
            "recipe",
            format!("Invalid pk \"{}\" - object does not exist.", id),
        )),
        ToggleOutcome::Duplicate => {
            Err(ApiError::non_field("Recipe is already in the shopping cart."))
        }
        ToggleOutcome::Added => Ok(Json(serde_json::json!({ "user": user.id, "recipe": id }))),
    }
}

pub async fn remove_from_cart(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let removed = state
        .db
        .call(move |db| {
            if db.get_recipe(id)?.is_none() {
                return Ok(None);
            }
            Ok(Some(db.remove_cart_item(user_id, id)?))
        })
        .await
        .map_err(internal)?;
    match removed {
        Some(true) => Ok(StatusCode::NO_CONTENT),
        _ => Err(ApiError::not_found()),
    }
}

// ── Shopping-list export ──────────────────────────────────────────────

pub async fn download_shopping_cart(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    let user_id = user.id;
    let rows = state
        .db
        .call(move |db| db.cart_ingredient_rows(user_id))
        .await
        .map_err(internal)?;
    let items = shopping::aggregate(rows);

    match params.format.as_deref() {
        None | Some("txt") | Some("text") => {
            let text = shopping::render_text(&items);
            Response::builder()
                .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .header(
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"shopping_cart.txt\"",
                )
                .body(Body::from(text))
                .map_err(|e| ApiError::Internal(e.to_string()))
        }
        Some("pdf") => {
            let bytes =
                shopping::render_pdf(&items).map_err(|e| ApiError::Internal(e.to_string()))?;
            Response::builder()
                .header(header::CONTENT_TYPE, "application/pdf")
                .header(
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"shopping_cart.pdf\"",
                )
                .body(Body::from(bytes))
                .map_err(|e| ApiError::Internal(e.to_string()))
        }
        Some(other) => Err(ApiError::BadRequest(format!("Unknown format '{}'.", other))),
    }
}

#[cfg(test)]
mod tests {
    use crate::api::testing::*;
    use axum::http::StatusCode;
    use serde_json::json;

    // 1x1 transparent PNG.
    const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn image_payload() -> String {
        format!("data:image/png;base64,{}", TINY_PNG)
    }

    /// Seed a tag + two ingredients and return (tag_id, flour_id, egg_id).
    fn seed_catalog(state: &crate::api::SharedState) -> (i64, i64, i64) {
        let db = state.db.lock_sync().unwrap();
        let tag = db.create_tag("Dinner", "#49B64E", "dinner").unwrap();
        let flour = db.create_ingredient("flour", "g").unwrap();
        let egg = db.create_ingredient("egg", "pcs").unwrap();
        (tag.id, flour.id, egg.id)
    }

    fn recipe_body(tag: i64, flour: i64, egg: i64) -> serde_json::Value {
        json!({
            "ingredients": [
                {"id": flour, "amount": 200},
                {"id": egg, "amount": 2}
            ],
            "tags": [tag],
            "image": image_payload(),
            "name": "Pancakes",
            "text": "Mix and fry.",
            "cooking_time": 20
        })
    }

    async fn create_recipe(
        state: &crate::api::SharedState,
        token: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        send(state.clone(), "POST", "/api/recipes/", Some(token), Some(body)).await
    }

    #[tokio::test]
    async fn create_requires_authentication() {
        let state = test_state();
        let (tag, flour, egg) = seed_catalog(&state);
        let (status, _) = send(
            state,
            "POST",
            "/api/recipes/",
            None,
            Some(recipe_body(tag, flour, egg)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_returns_write_view_and_stores_image() {
        let state = test_state();
        let (cook, token) = seed_user(&state, "cook@example.com", "cook");
        let (tag, flour, egg) = seed_catalog(&state);

        let (status, body) = create_recipe(&state, &token, recipe_body(tag, flour, egg)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["author"], cook.id);
        assert_eq!(body["tags"], json!([tag]));
        assert_eq!(body["ingredients"].as_array().unwrap().len(), 2);
        let image_url = body["image"].as_str().unwrap();
        assert!(image_url.starts_with("/media/recipes/image/"));
        let relative = image_url.trim_start_matches("/media/");
        assert!(state.config.media_dir.join(relative).exists());

        // Detail view carries nested objects and viewer flags.
        let id = body["id"].as_i64().unwrap();
        let (status, detail) =
            get(state.clone(), &format!("/api/recipes/{}/", id), Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["tags"][0]["slug"], "dinner");
        assert_eq!(detail["author"]["username"], "cook");
        assert_eq!(detail["is_favorited"], false);
    }

    #[tokio::test]
    async fn create_validates_payload() {
        let state = test_state();
        let (_, token) = seed_user(&state, "cook@example.com", "cook");
        let (tag, flour, egg) = seed_catalog(&state);

        let mut body = recipe_body(tag, flour, egg);
        body["cooking_time"] = json!(0);
        let (status, errors) = create_recipe(&state, &token, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(errors.get("cooking_time").is_some());

        let mut body = recipe_body(tag, flour, egg);
        body["ingredients"][0]["amount"] = json!(0);
        let (status, errors) = create_recipe(&state, &token, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(errors.get("ingredients").is_some());

        let mut body = recipe_body(tag, flour, egg);
        body["tags"] = json!([999]);
        let (status, errors) = create_recipe(&state, &token, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(errors["tags"][0].as_str().unwrap().contains("Invalid pk"));

        let mut body = recipe_body(tag, flour, egg);
        body.as_object_mut().unwrap().remove("image");
        let (status, errors) = create_recipe(&state, &token, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(errors["image"][0], "This field is required.");
    }

    #[tokio::test]
    async fn update_is_author_only_and_replaces_sets() {
        let state = test_state();
        let (_, cook_token) = seed_user(&state, "cook@example.com", "cook");
        let (_, other_token) = seed_user(&state, "other@example.com", "other");
        let (tag, flour, egg) = seed_catalog(&state);
        let lunch = {
            let db = state.db.lock_sync().unwrap();
            db.create_tag("Lunch", "#F0E68C", "lunch").unwrap().id
        };

        let (_, body) = create_recipe(&state, &cook_token, recipe_body(tag, flour, egg)).await;
        let id = body["id"].as_i64().unwrap();

        let patch = json!({"name": "Crepes", "tags": [lunch]});
        let (status, _) = send(
            state.clone(),
            "PATCH",
            &format!("/api/recipes/{}/", id),
            Some(&other_token),
            Some(patch.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            state.clone(),
            "PATCH",
            &format!("/api/recipes/{}/", id),
            Some(&cook_token),
            Some(patch),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Crepes");
        assert_eq!(body["tags"], json!([lunch]));
        assert_eq!(
            body["ingredients"].as_array().unwrap().len(),
            2,
            "ingredients untouched when not sent"
        );

        let (status, _) = send(
            state,
            "PATCH",
            "/api/recipes/999/",
            Some(&cook_token),
            Some(json!({"name": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_author_only() {
        let state = test_state();
        let (_, cook_token) = seed_user(&state, "cook@example.com", "cook");
        let (_, other_token) = seed_user(&state, "other@example.com", "other");
        let (tag, flour, egg) = seed_catalog(&state);
        let (_, body) = create_recipe(&state, &cook_token, recipe_body(tag, flour, egg)).await;
        let id = body["id"].as_i64().unwrap();

        let (status, _) = send(
            state.clone(),
            "DELETE",
            &format!("/api/recipes/{}/", id),
            Some(&other_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            state.clone(),
            "DELETE",
            &format!("/api/recipes/{}/", id),
            Some(&cook_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = get(state, &format!("/api/recipes/{}/", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_is_paginated_and_filterable() {
        let state = test_state();
        let (cook, token) = seed_user(&state, "cook@example.com", "cook");
        {
            let db = state.db.lock_sync().unwrap();
            let dinner = db.create_tag("Dinner", "#49B64E", "dinner").unwrap();
            let lunch = db.create_tag("Lunch", "#F0E68C", "lunch").unwrap();
            let soup = db
                .create_recipe(cook.id, "Soup", None, "Boil.", 40, &[dinner.id], &[])
                .unwrap();
            db.create_recipe(cook.id, "Salad", None, "Chop.", 10, &[lunch.id], &[])
                .unwrap();
            db.add_favorite(cook.id, soup.id).unwrap();
        }

        let (status, body) = get(state.clone(), "/api/recipes/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["results"][0]["name"], "Salad", "newest first");

        let (_, body) = get(state.clone(), "/api/recipes/?tags=dinner", None).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["name"], "Soup");

        let (_, body) = get(state.clone(), "/api/recipes/?is_favorited=1", Some(&token)).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["is_favorited"], true);

        // Anonymous favorited filter matches nothing.
        let (_, body) = get(state.clone(), "/api/recipes/?is_favorited=1", None).await;
        assert_eq!(body["count"], 0);

        let (_, body) = get(state, "/api/recipes/?limit=1&tags=dinner&tags=lunch", None).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
        assert!(body["next"].as_str().unwrap().contains("page=2"));
    }

    #[tokio::test]
    async fn favorite_lifecycle() {
        let state = test_state();
        let (ada, token) = seed_user(&state, "ada@example.com", "ada");
        let recipe_id = {
            let db = state.db.lock_sync().unwrap();
            db.create_recipe(ada.id, "Soup", None, "Boil.", 40, &[], &[])
                .unwrap()
                .id
        };

        let uri = format!("/api/recipes/{}/favorite/", recipe_id);
        let (status, body) = send(state.clone(), "POST", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"], ada.id);
        assert_eq!(body["recipe"], recipe_id);

        let (status, _) = send(state.clone(), "POST", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Unknown recipe: POST is a validation error, DELETE is a 404.
        let (status, body) = send(
            state.clone(),
            "POST",
            "/api/recipes/999/favorite/",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["recipe"][0].as_str().unwrap().contains("Invalid pk"));

        let (status, _) = send(
            state.clone(),
            "DELETE",
            "/api/recipes/999/favorite/",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(state.clone(), "DELETE", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(state, "DELETE", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn shopping_cart_download_aggregates_amounts() {
        let state = test_state();
        let (ada, token) = seed_user(&state, "ada@example.com", "ada");
        {
            let db = state.db.lock_sync().unwrap();
            let flour = db.create_ingredient("flour", "g").unwrap();
            let egg = db.create_ingredient("egg", "pcs").unwrap();
            let pancakes = db
                .create_recipe(
                    ada.id,
                    "Pancakes",
                    None,
                    "Fry.",
                    20,
                    &[],
                    &[
                        crate::models::IngredientAmountInput { id: flour.id, amount: 200 },
                        crate::models::IngredientAmountInput { id: egg.id, amount: 2 },
                    ],
                )
                .unwrap();
            let bread = db
                .create_recipe(
                    ada.id,
                    "Bread",
                    None,
                    "Bake.",
                    120,
                    &[],
                    &[crate::models::IngredientAmountInput { id: flour.id, amount: 500 }],
                )
                .unwrap();
            db.add_cart_item(ada.id, pancakes.id).unwrap();
            db.add_cart_item(ada.id, bread.id).unwrap();
        }

        let (status, headers, body) = get_raw(
            state.clone(),
            "/api/recipes/download_shopping_cart/",
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers["content-type"].to_str().unwrap().starts_with("text/plain"));
        let text = String::from_utf8(body).unwrap();
        assert_eq!(text, "egg (pcs) - 2\nflour (g) - 700\n");

        let (status, headers, body) = get_raw(
            state.clone(),
            "/api/recipes/download_shopping_cart/?format=pdf",
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["content-type"], "application/pdf");
        assert!(body.starts_with(b"%PDF"));

        let (status, _, _) = get_raw(
            state.clone(),
            "/api/recipes/download_shopping_cart/?format=docx",
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = get_raw(state, "/api/recipes/download_shopping_cart/", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
