use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};

use crate::entities::{company, company_store, store};
use crate::handlers::common::no_content_response;
use crate::services::companies::{CreateCompanyRequest, UpdateCompanyRequest};
use crate::{errors::ServiceError, ApiResponse, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/companies",
    summary = "List installation companies",
    responses(
        (status = 200, description = "Companies retrieved", body = ApiResponse<Vec<company::Model>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_companies(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<company::Model>>>, ServiceError> {
    let companies = state.services.companies.list_companies().await?;
    Ok(Json(ApiResponse::success(companies)))
}

#[utoipa::path(
    get,
    path = "/api/v1/companies/{id}",
    summary = "Get company",
    params(("id" = i32, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Company retrieved", body = ApiResponse<company::Model>),
        (status = 404, description = "Company not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<company::Model>>, ServiceError> {
    let company = state.services.companies.get_company(id).await?;
    Ok(Json(ApiResponse::success(company)))
}

#[utoipa::path(
    post,
    path = "/api/v1/companies",
    summary = "Create company",
    request_body = CreateCompanyRequest,
    responses(
        (status = 201, description = "Company created", body = ApiResponse<company::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_company(
    State(state): State<AppState>,
    Json(request): Json<CreateCompanyRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let company = state.services.companies.create_company(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(company))))
}

#[utoipa::path(
    patch,
    path = "/api/v1/companies/{id}",
    summary = "Update company",
    params(("id" = i32, Path, description = "Company ID")),
    request_body = UpdateCompanyRequest,
    responses(
        (status = 200, description = "Company updated", body = ApiResponse<company::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Company not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_company(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(request): Json<UpdateCompanyRequest>,
) -> Result<Json<ApiResponse<company::Model>>, ServiceError> {
    let company = state.services.companies.update_company(id, request).await?;
    Ok(Json(ApiResponse::success(company)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/companies/{id}",
    summary = "Delete company",
    params(("id" = i32, Path, description = "Company ID")),
    responses(
        (status = 204, description = "Company deleted"),
        (status = 404, description = "Company not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_company(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.companies.delete_company(id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    get,
    path = "/api/v1/companies/{id}/stores",
    summary = "Stores served by a company",
    params(("id" = i32, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Stores retrieved", body = ApiResponse<Vec<store::Model>>),
        (status = 404, description = "Company not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_company_stores(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<store::Model>>>, ServiceError> {
    let stores = state.services.companies.list_company_stores(id).await?;
    Ok(Json(ApiResponse::success(stores)))
}

#[utoipa::path(
    post,
    path = "/api/v1/companies/{id}/stores/{store_id}",
    summary = "Link company to store",
    params(
        ("id" = i32, Path, description = "Company ID"),
        ("store_id" = i32, Path, description = "Store ID"),
    ),
    responses(
        (status = 201, description = "Link created", body = ApiResponse<company_store::Model>),
        (status = 404, description = "Company or store not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already linked", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn link_store(
    State(state): State<AppState>,
    Path((id, store_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, ServiceError> {
    let link = state.services.companies.link_store(id, store_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(link))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/companies/{id}/stores/{store_id}",
    summary = "Unlink company from store",
    params(
        ("id" = i32, Path, description = "Company ID"),
        ("store_id" = i32, Path, description = "Store ID"),
    ),
    responses(
        (status = 204, description = "Link removed"),
        (status = 404, description = "No such link", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn unlink_store(
    State(state): State<AppState>,
    Path((id, store_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.companies.unlink_store(id, store_id).await?;
    Ok(no_content_response())
}
