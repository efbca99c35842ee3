//! Protected locale API under `/api/v1`

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use super::{AppState, AuthenticatedUser};
use crate::auth::ErrorMessage;
use crate::error::LocaleMgmtError;
use crate::locale::{LocaleFilter, LocaleItem, LocaleQuery, MassiveResult};

/// Locale API failure
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast_ref::<LocaleMgmtError>() {
            Some(LocaleMgmtError::Validation(message)) => ApiError::BadRequest(message.clone()),
            _ => ApiError::Internal(error),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(error) => {
                let detail = format!("{:#}", error);
                tracing::error!(error = %detail, "Locale API request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal storage error".to_string(),
                )
            }
        };
        (status, Json(ErrorMessage::new(message))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub async fn restricted(Extension(user): Extension<AuthenticatedUser>) -> Json<serde_json::Value> {
    let name = user.profile.display_name().unwrap_or_default();
    Json(serde_json::json!({
        "Message": format!("Hi {} You are in the restricted area", name)
    }))
}

pub async fn list_langs(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.locales.langs(None).await?))
}

pub async fn list_bundles(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.locales.bundles().await?))
}

pub async fn list_bundle_langs(
    State(state): State<AppState>,
    WithRejection(Path(bundle_id), _): WithRejection<Path<String>, ApiError>,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.locales.langs(Some(&bundle_id)).await?))
}

pub async fn get_item(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<String>, ApiError>,
) -> ApiResult<Json<LocaleItem>> {
    state
        .locales
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No locale item with id {}", id)))
}

pub async fn post_item(
    State(state): State<AppState>,
    WithRejection(Json(item), _): WithRejection<Json<LocaleItem>, ApiError>,
) -> ApiResult<(StatusCode, Json<LocaleItem>)> {
    let saved = state.locales.upsert(item).await?;
    tracing::info!(id = %saved.id, bundle = %saved.bundle, lang = %saved.lang, "Saved locale item");
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn post_items(
    State(state): State<AppState>,
    WithRejection(Json(items), _): WithRejection<Json<Vec<LocaleItem>>, ApiError>,
) -> ApiResult<(StatusCode, Json<MassiveResult>)> {
    let result = state.locales.upsert_many(items).await?;
    tracing::info!(
        succeeded = result.num_successful,
        failed = result.num_failed,
        "Saved locale items"
    );
    Ok((StatusCode::CREATED, Json(result)))
}

/// Items of one bundle matching the query string filters
pub async fn query_items(
    State(state): State<AppState>,
    WithRejection(Path(bundle), _): WithRejection<Path<String>, ApiError>,
    WithRejection(Query(mut query), _): WithRejection<Query<LocaleQuery>, ApiError>,
) -> ApiResult<Json<Vec<LocaleItem>>> {
    query.bundle = Some(bundle);
    Ok(Json(state.locales.query(&query).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

/// Delete items of a bundle, narrowed by the `lang_id`/`key_id` path
/// segments or the `lang`/`key` query parameters.
pub async fn delete_items(
    State(state): State<AppState>,
    WithRejection(Path(mut segments), _): WithRejection<Path<HashMap<String, String>>, ApiError>,
    WithRejection(Query(params), _): WithRejection<Query<DeleteParams>, ApiError>,
) -> ApiResult<Json<MassiveResult>> {
    let filter = LocaleFilter {
        bundle: segments.remove("bundle").unwrap_or_default(),
        lang: segments.remove("lang_id").or(params.lang),
        key: segments.remove("key_id").or(params.key),
    };

    let removed = state.locales.delete(&filter).await?;
    tracing::info!(bundle = %filter.bundle, removed, "Deleted locale items");
    Ok(Json(MassiveResult {
        num_successful: removed,
        num_failed: 0,
    }))
}
