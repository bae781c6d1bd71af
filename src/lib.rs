//! Montaz API Library
//!
//! Backend for door and flooring installation orders: stores place orders,
//! installation companies take them, installers and transporters carry them out.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderValue,
    response::Json,
    routing::{delete, get, patch, post},
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
};
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AuthConfig, AuthRouterExt, AuthService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires the auth service and every domain service around one connection pool.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), &config);
        Self::with_services(db, config, event_sender, services)
    }

    pub fn with_services(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
        services: handlers::AppServices,
    ) -> Self {
        let auth = Arc::new(AuthService::new(
            AuthConfig::new(
                config.jwt_secret.clone(),
                Duration::from_secs(config.jwt_expiration as u64),
            ),
            db.clone(),
        ));
        Self {
            db,
            config,
            event_sender,
            services,
            auth,
        }
    }
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub search: Option<String>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[tokio::test]
    async fn validation_errors_response_includes_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("meta-validation"),
            async { ApiResponse::<()>::validation_errors(vec!["missing".into()]) },
        )
        .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-validation"));
        assert_eq!(response.errors.map(|e| e.len()), Some(1));
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    // Row-level rules (assignment, company membership) are enforced by the
    // services; the gates below only check the role-level permission.
    let orders_read = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/by-number/:order_number",
            get(handlers::orders::get_order_by_number),
        )
        .route(
            "/orders/:id/permissions",
            get(handlers::orders::get_order_permissions),
        )
        // Installers and transporters work through these on assigned orders
        .route(
            "/orders/:id/status",
            patch(handlers::orders::update_installation_status),
        )
        .route(
            "/orders/:id/transport-status",
            patch(handlers::orders::update_transport_status),
        )
        .route(
            "/orders/:id/complaint",
            patch(handlers::orders::record_complaint),
        )
        .route(
            "/orders/:id/photos",
            post(handlers::orders::upload_photos).delete(handlers::orders::remove_photo),
        )
        .with_permission(perm::ORDERS_READ);

    let orders_create = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .with_permission(perm::ORDERS_CREATE);

    let orders_update = Router::new()
        .route("/orders/:id", patch(handlers::orders::update_order))
        .route(
            "/orders/:id/assign-installer",
            patch(handlers::orders::assign_installer),
        )
        .route(
            "/orders/:id/assign-transporter",
            patch(handlers::orders::assign_transporter),
        )
        .route(
            "/orders/:id/assign-company",
            patch(handlers::orders::assign_company),
        )
        .route(
            "/orders/:id/financial-status",
            patch(handlers::orders::update_financial_flags),
        )
        .with_permission(perm::ORDERS_UPDATE);

    let orders_delete = Router::new()
        .route("/orders/:id", delete(handlers::orders::delete_order))
        .with_permission(perm::ORDERS_DELETE);

    // Users: admins manage everyone, company accounts their own installers
    let users = Router::new()
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/users/:id",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .with_auth();

    let stores_read = Router::new()
        .route("/stores", get(handlers::stores::list_stores))
        .route("/stores/:id", get(handlers::stores::get_store))
        .with_permission(perm::STORES_READ);

    let stores_manage = Router::new()
        .route("/stores", post(handlers::stores::create_store))
        .route(
            "/stores/:id",
            patch(handlers::stores::update_store).delete(handlers::stores::delete_store),
        )
        .with_permission(perm::STORES_MANAGE);

    let companies_read = Router::new()
        .route("/companies", get(handlers::companies::list_companies))
        .route("/companies/:id", get(handlers::companies::get_company))
        .route(
            "/companies/:id/stores",
            get(handlers::companies::list_company_stores),
        )
        .with_permission(perm::COMPANIES_READ);

    let companies_manage = Router::new()
        .route("/companies", post(handlers::companies::create_company))
        .route(
            "/companies/:id",
            patch(handlers::companies::update_company)
                .delete(handlers::companies::delete_company),
        )
        .route(
            "/companies/:id/stores/:store_id",
            post(handlers::companies::link_store).delete(handlers::companies::unlink_store),
        )
        .with_permission(perm::COMPANIES_MANAGE);

    let settings_read = Router::new()
        .route("/settings", get(handlers::settings::list_settings))
        .route(
            "/settings/:category/:key",
            get(handlers::settings::get_setting),
        )
        .with_permission(perm::SETTINGS_READ);

    let settings_manage = Router::new()
        .route("/settings", post(handlers::settings::upsert_setting))
        .route(
            "/settings/:category",
            patch(handlers::settings::update_category),
        )
        .with_permission(perm::SETTINGS_MANAGE);

    let schedule_read = Router::new()
        .route("/schedule", get(handlers::schedule::list_schedule))
        .with_permission(perm::SCHEDULE_READ);

    let schedule_manage = Router::new()
        .route("/schedule", post(handlers::schedule::add_schedule_entry))
        .route(
            "/schedule/:id",
            patch(handlers::schedule::edit_schedule_entry)
                .delete(handlers::schedule::delete_schedule_entry),
        )
        .with_permission(perm::SCHEDULE_MANAGE);

    let schedule_complete = Router::new()
        .route(
            "/schedule/:id/complete",
            post(handlers::schedule::complete_schedule_entry),
        )
        .with_permission(perm::SCHEDULE_COMPLETE);

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .route("/version", get(handlers::version::get_version))
        .nest("/auth", handlers::auth::auth_router())
        // Orders
        .merge(orders_read)
        .merge(orders_create)
        .merge(orders_update)
        .merge(orders_delete)
        // Directory
        .merge(users)
        .merge(stores_read)
        .merge(stores_manage)
        .merge(companies_read)
        .merge(companies_manage)
        // Configuration and planning
        .merge(settings_read)
        .merge(settings_manage)
        .merge(schedule_read)
        .merge(schedule_manage)
        .merge(schedule_complete)
}

/// CORS from configuration: explicit origins first, permissive in development.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    match configured_origins {
        Some(origins) => CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
        None => {
            ::tracing::info!(
                "Using permissive CORS because explicit origins were not configured ({})",
                if cfg.is_development() {
                    "development environment"
                } else {
                    "explicit override enabled"
                }
            );
            CorsLayer::permissive()
        }
    }
}

/// Full application: `/api/v1`, stored photos, Swagger UI and the
/// cross-cutting layers.
pub fn build_router(state: AppState) -> Router {
    let cfg = state.config.clone();
    let auth = state.auth.clone();

    Router::<AppState>::new()
        .route("/", get(|| async { "montaz-api up" }))
        .nest("/api/v1", api_v1_routes())
        .nest_service(
            services::photos::PUBLIC_PREFIX,
            ServeDir::new(cfg.upload_path()),
        )
        .merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn(request_logging_middleware))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors_layer(&cfg))
        // Multipart photo uploads may carry several files at once
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(cfg.max_upload_bytes.saturating_mul(4)))
        // Auth middleware reads the service from request extensions
        .layer(Extension(auth))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "build": state.config.build_label(),
        "build_time": option_env!("BUILD_TIME").unwrap_or("unknown"),
        "service": "montaz-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": state.config.environment,
        "date_ordering_policy": state.config.date_ordering_policy,
        "schedule_conflict_policy": state.config.schedule_conflict_policy,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };
    let uploads_status = if tokio::fs::metadata(state.config.upload_path())
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        "healthy"
    } else {
        "missing"
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
            "uploads": uploads_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

// Request logging middleware
async fn request_logging_middleware(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    ::tracing::debug!(method = %method, uri = %uri, "Incoming request");

    let response = next.run(request).await;

    let status = response.status();
    metrics::counter!(
        "montaz_http.requests",
        1,
        "method" => method.to_string(),
        "status" => status.as_u16().to_string()
    );
    ::tracing::info!(
        method = %method,
        uri = %uri,
        status = status.as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

pub mod prelude {
    pub use crate::auth::{AuthUser, OrderPermissions};
    pub use crate::config::AppConfig;
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::models::*;
    pub use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};
}
