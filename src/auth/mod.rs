/*!
 * # Authentication Module
 *
 * JWT access tokens signed with HS256, argon2 password hashing and the
 * `AuthUser` extractor. The token only identifies the user: role, company
 * and store are reloaded from the database on every request so a changed
 * assignment or a deactivated account takes effect immediately.
 */

use crate::entities::user;
use crate::errors::ServiceError;
use crate::models::{UserProfile, UserRole};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub mod order_access;
pub mod password_policy;
pub mod permissions;
pub mod rbac;

pub use order_access::{OrderParties, OrderPermissions};
pub use password_policy::{PasswordPolicy, PasswordPolicyError};
pub use permissions::consts;
pub use rbac::role_has_permission;

const JWT_ISSUER: &str = "montaz-api";
const JWT_AUDIENCE: &str = "montaz-panel";

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,   // Subject (user ID)
    pub email: String, // Email at issue time, informational
    pub role: String,  // Role at issue time, informational
    pub jti: String,   // JWT ID
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// The authenticated caller, rebuilt from the users table on each request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthUser {
    pub user_id: i32,
    pub name: String,
    pub email: String,
    pub profile: UserProfile,
    #[serde(skip)]
    pub token_id: String,
}

impl AuthUser {
    pub fn from_model(model: &user::Model, token_id: String) -> Option<Self> {
        Some(Self {
            user_id: model.id,
            name: model.name.clone(),
            email: model.email.clone(),
            profile: model.profile()?,
            token_id,
        })
    }

    pub fn role(&self) -> UserRole {
        self.profile.role()
    }

    pub fn is_admin(&self) -> bool {
        self.role() == UserRole::Admin
    }

    pub fn is_worker(&self) -> bool {
        self.role() == UserRole::Worker
    }

    pub fn company_id(&self) -> Option<i32> {
        self.profile.company_id()
    }

    /// Check if the user's role holds a specific permission
    pub fn has_permission(&self, permission: &str) -> bool {
        role_has_permission(self.role(), permission)
    }

    /// Fails with `Forbidden` unless the role holds `permission`.
    pub fn require(&self, permission: &str) -> Result<(), ServiceError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "{} may not perform {}",
                self.role(),
                permission
            )))
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, access_token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            jwt_audience: JWT_AUDIENCE.to_string(),
            jwt_issuer: JWT_ISSUER.to_string(),
            access_token_expiration,
        }
    }
}

/// Token response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Account is inactive")]
    InactiveAccount,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth
            | AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired => ServiceError::Unauthorized(err.to_string()),
            AuthError::InactiveAccount => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) | AuthError::Hashing(msg) => {
                ServiceError::InternalError(msg)
            }
            AuthError::DatabaseError(e) => ServiceError::DatabaseError(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Generate a JWT access token for a user
    pub fn generate_token(&self, user: &user::Model) -> Result<TokenResponse, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }

    /// Checks credentials and returns the matching active user.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<user::Model, AuthError> {
        use sea_orm::{ColumnTrait, QueryFilter};

        let user = user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(&*self.db)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::InactiveAccount);
        }
        Ok(user)
    }

    /// Resolves a bearer token to the current state of its user.
    pub async fn resolve(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token)?;
        let user_id: i32 = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;

        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if !user.is_active {
            return Err(AuthError::InactiveAccount);
        }

        AuthUser::from_model(&user, claims.jti).ok_or_else(|| {
            warn!(user_id, role = %user.role, "user has an unrecognized role");
            AuthError::InvalidToken
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware that validates the bearer token and stores the
/// resolved `AuthUser` in request extensions. The service itself is provided
/// as an `Extension` layered over the whole API router.
pub async fn auth_middleware(
    Extension(auth_service): Extension<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(request.headers()).ok_or(AuthError::MissingAuth)?;
    let user = auth_service.resolve(token).await?;
    debug!(user_id = user.user_id, role = %user.role(), "authenticated request");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Rejects the request unless the authenticated user's role holds the permission.
pub async fn permission_middleware(
    State(permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ServiceError::from(AuthError::MissingAuth))?;
    user.require(&permission)?;
    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn service() -> AuthService {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        AuthService::new(
            AuthConfig::new(
                "test_secret_with_plenty_of_entropy_0123456789".into(),
                Duration::from_secs(600),
            ),
            Arc::new(db),
        )
    }

    fn user_model() -> user::Model {
        user::Model {
            id: 7,
            name: "Jan Monter".into(),
            email: "jan@example.com".into(),
            phone: None,
            password_hash: String::new(),
            role: "installer".into(),
            is_active: true,
            store_id: None,
            position: None,
            company_id: Some(2),
            company_name: None,
            nip: None,
            company_address: None,
            services: Some("door_installation".into()),
            company_owner_only: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trip() {
        let svc = service();
        let token = svc.generate_token(&user_model()).unwrap();
        let claims = svc.validate_token(&token.access_token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.role, "installer");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let svc = service();
        let mut other = service();
        other.config.jwt_secret = "another_secret_with_plenty_of_entropy_987654".into();
        let token = other.generate_token(&user_model()).unwrap();
        assert_matches!(
            svc.validate_token(&token.access_token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("Drzwi2025!").unwrap();
        assert!(verify_password("Drzwi2025!", &hash));
        assert!(!verify_password("drzwi2025!", &hash));
        assert!(!verify_password("anything", "not-a-hash"));
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
    }

    #[test]
    fn auth_errors_map_to_status_codes() {
        assert_eq!(
            ServiceError::from(AuthError::InvalidToken).status_code(),
            axum::http::StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::from(AuthError::InactiveAccount).status_code(),
            axum::http::StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn installer_permissions_follow_role() {
        let user = AuthUser::from_model(&user_model(), "t".into()).unwrap();
        assert!(user.require(consts::SCHEDULE_COMPLETE).is_ok());
        assert_matches!(
            user.require(consts::ORDERS_CREATE),
            Err(ServiceError::Forbidden(_))
        );
    }
}
