use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::services::settings::{SettingResponse, UpsertSettingRequest};
use crate::{errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SettingsQuery {
    pub category: Option<String>,
}

/// Key to value map written into one category.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct CategoryValues(pub BTreeMap<String, Value>);

#[utoipa::path(
    get,
    path = "/api/v1/settings",
    summary = "List settings",
    params(SettingsQuery),
    responses(
        (status = 200, description = "Settings retrieved", body = ApiResponse<Vec<SettingResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_settings(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> Result<Json<ApiResponse<Vec<SettingResponse>>>, ServiceError> {
    let settings = state
        .services
        .settings
        .list_settings(query.category.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(settings)))
}

#[utoipa::path(
    get,
    path = "/api/v1/settings/{category}/{key}",
    summary = "Get setting",
    params(
        ("category" = String, Path, description = "Setting category"),
        ("key" = String, Path, description = "Setting key"),
    ),
    responses(
        (status = 200, description = "Setting retrieved", body = ApiResponse<SettingResponse>),
        (status = 404, description = "Setting not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_setting(
    State(state): State<AppState>,
    Path((category, key)): Path<(String, String)>,
) -> Result<Json<ApiResponse<SettingResponse>>, ServiceError> {
    let setting = state.services.settings.get_setting(&category, &key).await?;
    Ok(Json(ApiResponse::success(setting)))
}

#[utoipa::path(
    post,
    path = "/api/v1/settings",
    summary = "Create or update setting",
    request_body = UpsertSettingRequest,
    responses(
        (status = 200, description = "Setting stored", body = ApiResponse<SettingResponse>),
        (status = 400, description = "Value does not match its type", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn upsert_setting(
    State(state): State<AppState>,
    Json(request): Json<UpsertSettingRequest>,
) -> Result<Json<ApiResponse<SettingResponse>>, ServiceError> {
    let setting = state.services.settings.upsert_setting(request).await?;
    Ok(Json(ApiResponse::success(setting)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/settings/{category}",
    summary = "Update a category",
    description = "Writes every supplied key of the category, creating missing ones",
    params(("category" = String, Path, description = "Setting category")),
    request_body = CategoryValues,
    responses(
        (status = 200, description = "Settings stored", body = ApiResponse<Vec<SettingResponse>>),
        (status = 400, description = "Empty or invalid values", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Json(CategoryValues(values)): Json<CategoryValues>,
) -> Result<Json<ApiResponse<Vec<SettingResponse>>>, ServiceError> {
    let settings = state
        .services
        .settings
        .update_category(&category, values)
        .await?;
    Ok(Json(ApiResponse::success(settings)))
}
