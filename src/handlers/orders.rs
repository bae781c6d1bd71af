use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};

use crate::auth::{AuthUser, OrderPermissions};
use crate::handlers::common::{no_content_response, read_photo_uploads, total_pages};
use crate::services::order_lifecycle::{
    AssignCompanyRequest, AssignInstallerRequest, AssignTransporterRequest, ComplaintRequest,
    FinancialFlagsRequest, RemovePhotoRequest, UpdateStatusRequest,
};
use crate::services::orders::{CreateOrderRequest, OrderListQuery, OrderResponse, UpdateOrderRequest};
use crate::{errors::ServiceError, ApiResponse, AppState, PaginatedResponse};

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Paginated list of the orders the caller may read, with optional filters",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<PaginatedResponse<OrderResponse>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    let page = state.services.orders.list_orders(&auth_user, query).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse {
        total_pages: total_pages(page.total, page.limit),
        items: page.orders,
        total: page.total,
        page: page.page,
        limit: page.limit,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Register a new installation order. The order number is generated when omitted.",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order number already taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.create_order(&auth_user, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.get_order(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/by-number/{order_number}",
    summary = "Get order by number",
    description = "Retrieve an order by its public number (e.g. ZL-2025-04-1001)",
    params(("order_number" = String, Path, description = "Public order number")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .get_order_by_number(&auth_user, &order_number)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}",
    summary = "Update order",
    description = "Partial update of the descriptive fields of an order",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated successfully", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
    Json(request): Json<UpdateOrderRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.update_order(&auth_user, id, request).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete order",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.orders.delete_order(&auth_user, id).await?;
    Ok(no_content_response())
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/status",
    summary = "Update installation status",
    description = "Move the installation track. Legacy status labels are accepted and normalized.",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not allowed to change this order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_installation_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .lifecycle
        .update_installation_status(&auth_user, id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/transport-status",
    summary = "Update transport status",
    description = "Move the transport track. Rejected for orders without transport.",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Unknown status or order without transport", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not allowed to change this order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_transport_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .lifecycle
        .update_transport_status(&auth_user, id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/assign-installer",
    summary = "Assign installer",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = AssignInstallerRequest,
    responses(
        (status = 200, description = "Installer assigned", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid installation date", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or capable installer not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn assign_installer(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
    Json(request): Json<AssignInstallerRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .lifecycle
        .assign_installer(&auth_user, id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/assign-transporter",
    summary = "Assign transporter",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = AssignTransporterRequest,
    responses(
        (status = 200, description = "Transporter assigned", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Order without transport or invalid date", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or capable transporter not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn assign_transporter(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
    Json(request): Json<AssignTransporterRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .lifecycle
        .assign_transporter(&auth_user, id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/assign-company",
    summary = "Assign installation company",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = AssignCompanyRequest,
    responses(
        (status = 200, description = "Company assigned", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Company does not serve the order's store", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or company not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn assign_company(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
    Json(request): Json<AssignCompanyRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .lifecycle
        .assign_company(&auth_user, id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/financial-status",
    summary = "Update financial flags",
    description = "Documents provided, to be settled and invoice issued flags",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = FinancialFlagsRequest,
    responses(
        (status = 200, description = "Flags updated", body = ApiResponse<OrderResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_financial_flags(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
    Json(request): Json<FinancialFlagsRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .lifecycle
        .update_financial_flags(&auth_user, id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/complaint",
    summary = "Record complaint",
    description = "Store complaint notes and photo references. The order must be in complaint status.",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = ComplaintRequest,
    responses(
        (status = 200, description = "Complaint recorded", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Order is not in complaint status", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn record_complaint(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
    Json(request): Json<ComplaintRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .lifecycle
        .record_complaint(&auth_user, id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/photos",
    summary = "Upload complaint photos",
    description = "Multipart upload; every file field is stored and appended to the complaint photos",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 201, description = "Photos stored", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Unsupported or oversized file", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn upload_photos(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    let uploads = read_photo_uploads(multipart).await?;
    let lifecycle = state.services.lifecycle.clone();
    let order = crate::tracing::with_timing("upload_complaint_photos", || async {
        lifecycle.upload_complaint_photos(&auth_user, id, uploads).await
    })
    .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}/photos",
    summary = "Remove complaint photo",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = RemovePhotoRequest,
    responses(
        (status = 200, description = "Photo removed", body = ApiResponse<OrderResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or photo not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn remove_photo(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
    Json(request): Json<RemovePhotoRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .lifecycle
        .remove_complaint_photo(&auth_user, id, &request.photo)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/permissions",
    summary = "Order permissions",
    description = "What the caller may do with this order; the panel uses it to enable actions",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Permissions evaluated", body = ApiResponse<OrderPermissions>),
        (status = 403, description = "Order not readable", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order_permissions(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderPermissions>>, ServiceError> {
    let model = state.services.orders.get_model(id).await?;
    let permissions = OrderPermissions::evaluate(&auth_user, &model);
    if !permissions.can_read {
        return Err(ServiceError::Forbidden(format!(
            "Order {} is not visible to this account",
            model.order_number
        )));
    }
    Ok(Json(ApiResponse::success(permissions)))
}
