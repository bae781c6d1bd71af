use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};

use crate::auth::AuthUser;
use crate::handlers::common::no_content_response;
use crate::services::schedule::{
    CreateScheduleEntryRequest, ScheduleEntryResponse, ScheduleQuery, UpdateScheduleEntryRequest,
    WeekSchedule,
};
use crate::{errors::ServiceError, ApiResponse, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/schedule",
    summary = "Weekly schedule",
    description = "Entries of the Monday-to-Sunday week containing `week_start`. Installers only see their own.",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Schedule retrieved", body = ApiResponse<WeekSchedule>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_schedule(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ApiResponse<WeekSchedule>>, ServiceError> {
    let week = state.services.schedule.list_schedule(&auth_user, query).await?;
    Ok(Json(ApiResponse::success(week)))
}

#[utoipa::path(
    post,
    path = "/api/v1/schedule",
    summary = "Add schedule entry",
    request_body = CreateScheduleEntryRequest,
    responses(
        (status = 201, description = "Entry created", body = ApiResponse<ScheduleEntryResponse>),
        (status = 400, description = "Invalid slot or installer", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slot already taken (reject policy only)", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn add_schedule_entry(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateScheduleEntryRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let entry = state
        .services
        .schedule
        .add_schedule_entry(&auth_user, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(entry))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/schedule/{id}",
    summary = "Edit schedule entry",
    params(("id" = i32, Path, description = "Entry ID")),
    request_body = UpdateScheduleEntryRequest,
    responses(
        (status = 200, description = "Entry updated", body = ApiResponse<ScheduleEntryResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slot already taken (reject policy only)", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn edit_schedule_entry(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
    Json(request): Json<UpdateScheduleEntryRequest>,
) -> Result<Json<ApiResponse<ScheduleEntryResponse>>, ServiceError> {
    let entry = state
        .services
        .schedule
        .edit_schedule_entry(&auth_user, id, request)
        .await?;
    Ok(Json(ApiResponse::success(entry)))
}

#[utoipa::path(
    post,
    path = "/api/v1/schedule/{id}/complete",
    summary = "Mark schedule entry completed",
    params(("id" = i32, Path, description = "Entry ID")),
    responses(
        (status = 200, description = "Entry completed", body = ApiResponse<ScheduleEntryResponse>),
        (status = 403, description = "Not your entry", body = crate::errors::ErrorResponse),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn complete_schedule_entry(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<ScheduleEntryResponse>>, ServiceError> {
    let entry = state
        .services
        .schedule
        .complete_schedule_entry(&auth_user, id)
        .await?;
    Ok(Json(ApiResponse::success(entry)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/schedule/{id}",
    summary = "Delete schedule entry",
    params(("id" = i32, Path, description = "Entry ID")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_schedule_entry(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .schedule
        .delete_schedule_entry(&auth_user, id)
        .await?;
    Ok(no_content_response())
}
