//! Login, first-run bootstrap and the current profile.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{AuthError, AuthRouterExt, AuthUser, TokenResponse};
use crate::services::users::{CreateUserRequest, UserResponse};
use crate::{errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: TokenResponse,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetupStatus {
    /// True while no administrator account exists
    pub setup_required: bool,
}

pub fn auth_router() -> Router<AppState> {
    let me = Router::new().route("/me", get(me)).with_auth();

    Router::new()
        .route("/login", post(login))
        .route("/setup-admin", post(setup_admin))
        .route("/setup-status", get(setup_status))
        .merge(me)
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    summary = "Log in",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Malformed credentials", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid email or password", body = crate::errors::ErrorResponse),
        (status = 403, description = "Account deactivated", body = crate::errors::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ServiceError> {
    request.validate()?;

    let user = match state.auth.authenticate(&request.email, &request.password).await {
        Ok(user) => user,
        Err(err) => {
            counter!("montaz_auth.login_failures", 1);
            warn!(email = %request.email, error = %err, "login rejected");
            return Err(err.into());
        }
    };

    let token = state.auth.generate_token(&user)?;
    info!(user_id = user.id, role = %user.role, "user logged in");
    Ok(Json(ApiResponse::success(LoginResponse {
        token,
        user: UserResponse::try_from(user)?,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/setup-admin",
    summary = "Create the first administrator",
    description = "Only allowed while no administrator exists",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Administrator created and logged in", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "An administrator already exists", body = crate::errors::ErrorResponse),
    )
)]
pub async fn setup_admin(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let admin = state.services.users.setup_admin(request).await?;
    let token = state.auth.generate_token(&admin)?;
    info!(user_id = admin.id, "initial administrator created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(LoginResponse {
            token,
            user: UserResponse::try_from(admin)?,
        })),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/setup-status",
    summary = "Whether the first administrator still has to be created",
    responses(
        (status = 200, description = "Setup status", body = ApiResponse<SetupStatus>),
    )
)]
pub async fn setup_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SetupStatus>>, ServiceError> {
    let setup_required = state.services.users.setup_required().await?;
    Ok(Json(ApiResponse::success(SetupStatus { setup_required })))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    summary = "Current user",
    responses(
        (status = 200, description = "Profile of the caller", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ServiceError> {
    let profile = state
        .services
        .users
        .get_user(&auth_user, auth_user.user_id)
        .await
        .map_err(|err| match err {
            ServiceError::NotFound(_) => AuthError::InvalidToken.into(),
            other => other,
        })?;
    Ok(Json(ApiResponse::success(profile)))
}
