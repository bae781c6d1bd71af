use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::entities::store;
use crate::handlers::common::no_content_response;
use crate::services::stores::{CreateStoreRequest, UpdateStoreRequest};
use crate::{errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StoreListQuery {
    /// `active` or `inactive`
    pub status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/stores",
    summary = "List stores",
    params(StoreListQuery),
    responses(
        (status = 200, description = "Stores retrieved", body = ApiResponse<Vec<store::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_stores(
    State(state): State<AppState>,
    Query(query): Query<StoreListQuery>,
) -> Result<Json<ApiResponse<Vec<store::Model>>>, ServiceError> {
    let stores = state
        .services
        .stores
        .list_stores(query.status.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(stores)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stores/{id}",
    summary = "Get store",
    params(("id" = i32, Path, description = "Store ID")),
    responses(
        (status = 200, description = "Store retrieved", body = ApiResponse<store::Model>),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_store(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<store::Model>>, ServiceError> {
    let store = state.services.stores.get_store(id).await?;
    Ok(Json(ApiResponse::success(store)))
}

#[utoipa::path(
    post,
    path = "/api/v1/stores",
    summary = "Create store",
    request_body = CreateStoreRequest,
    responses(
        (status = 201, description = "Store created", body = ApiResponse<store::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_store(
    State(state): State<AppState>,
    Json(request): Json<CreateStoreRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let store = state.services.stores.create_store(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(store))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/stores/{id}",
    summary = "Update store",
    params(("id" = i32, Path, description = "Store ID")),
    request_body = UpdateStoreRequest,
    responses(
        (status = 200, description = "Store updated", body = ApiResponse<store::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_store(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateStoreRequest>,
) -> Result<Json<ApiResponse<store::Model>>, ServiceError> {
    let store = state.services.stores.update_store(id, request).await?;
    Ok(Json(ApiResponse::success(store)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stores/{id}",
    summary = "Delete store",
    params(("id" = i32, Path, description = "Store ID")),
    responses(
        (status = 204, description = "Store deleted"),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_store(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.stores.delete_store(id).await?;
    Ok(no_content_response())
}
