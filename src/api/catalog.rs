//! Read-only tag and ingredient endpoints. Both are public and
//! unpaginated; ingredients support a name search.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::{ApiError, SharedState};

#[derive(Deserialize)]
pub struct IngredientSearchParams {
    pub name: Option<String>,
}

pub async fn list_tags(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let tags = state
        .db
        .call(move |db| db.list_tags())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(tags))
}

pub async fn get_tag(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = state
        .db
        .call(move |db| db.get_tag(id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    match tag {
        Some(tag) => Ok(Json(tag)),
        None => Err(ApiError::not_found()),
    }
}

pub async fn list_ingredients(
    State(state): State<SharedState>,
    Query(params): Query<IngredientSearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let name = params.name;
    let ingredients = state
        .db
        .call(move |db| db.list_ingredients(name.as_deref()))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(ingredients))
}

pub async fn get_ingredient(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let ingredient = state
        .db
        .call(move |db| db.get_ingredient(id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    match ingredient {
        Some(ingredient) => Ok(Json(ingredient)),
        None => Err(ApiError::not_found()),
    }
}

#[cfg(test)]
mod tests {
    use crate::api::testing::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn tags_list_is_a_bare_sorted_array() {
        let state = test_state();
        {
            let db = state.db.lock_sync().unwrap();
            db.create_tag("Dinner", "#49B64E", "dinner").unwrap();
            db.create_tag("Breakfast", "#E26C2D", "breakfast").unwrap();
        }
        let (status, body) = get(state.clone(), "/api/tags/", None).await;
        assert_eq!(status, StatusCode::OK);
        let tags = body.as_array().expect("bare array");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0]["name"], "Breakfast");
        assert_eq!(tags[1]["slug"], "dinner");
    }

    #[tokio::test]
    async fn tag_detail_and_missing_tag() {
        let state = test_state();
        let tag_id = {
            let db = state.db.lock_sync().unwrap();
            db.create_tag("Dinner", "#49B64E", "dinner").unwrap().id
        };
        let (status, body) = get(state.clone(), &format!("/api/tags/{}/", tag_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["color"], "#49B64E");

        let (status, body) = get(state, "/api/tags/999/", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Not found.");
    }

    #[tokio::test]
    async fn ingredient_search_narrows_by_name() {
        let state = test_state();
        {
            let db = state.db.lock_sync().unwrap();
            db.create_ingredient("flour", "g").unwrap();
            db.create_ingredient("corn flour", "g").unwrap();
            db.create_ingredient("sugar", "g").unwrap();
        }
        let (status, body) = get(state.clone(), "/api/ingredients/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, body) = get(state.clone(), "/api/ingredients/?name=flour", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["corn flour", "flour"]);

        let (status, _) = get(state, "/api/ingredients/42/", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
