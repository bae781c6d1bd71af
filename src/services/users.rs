use crate::{
    auth::{hash_password, AuthUser, PasswordPolicy},
    auth::consts as perm,
    db::DbPool,
    entities::{company, store, user},
    errors::ServiceError,
    models::{
        role::{join_services, parse_services},
        Capability, CompanyAccount, UserRole,
    },
};
use lazy_static::lazy_static;
use metrics::counter;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9][0-9 \-]{5,18}[0-9]$").unwrap();
    static ref NIP_RE: Regex = Regex::new(r"^[0-9]{10}$").unwrap();
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(phone.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message = Some("Invalid phone number".into());
        Err(err)
    }
}

/// Polish tax id: ten digits, separators ignored, weighted checksum.
pub fn validate_nip(nip: &str) -> Result<(), ValidationError> {
    let digits: String = nip.chars().filter(|c| !matches!(c, '-' | ' ')).collect();
    let valid = NIP_RE.is_match(&digits) && {
        const WEIGHTS: [u32; 9] = [6, 5, 7, 2, 3, 4, 5, 6, 7];
        let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
        let sum: u32 = WEIGHTS.iter().zip(&values).map(|(w, d)| w * d).sum();
        sum % 11 == values[9]
    };
    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("nip");
        err.message = Some("Invalid NIP".into());
        Err(err)
    }
}

/// Accepts ids sent either as numbers or as numeric strings.
pub(crate) fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(id)) => Ok(Some(id)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("'{}' is not a numeric id", s))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    #[schema(example = "installer")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient_id")]
    #[schema(value_type = Option<i32>)]
    pub store_id: Option<i32>,
    pub position: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    #[schema(value_type = Option<i32>)]
    pub company_id: Option<i32>,
    pub company_name: Option<String>,
    #[validate(custom = "validate_nip")]
    pub nip: Option<String>,
    pub company_address: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    pub company_owner_only: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub password: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    #[schema(value_type = Option<i32>)]
    pub store_id: Option<i32>,
    pub position: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    #[schema(value_type = Option<i32>)]
    pub company_id: Option<i32>,
    pub company_name: Option<String>,
    #[validate(custom = "validate_nip")]
    pub nip: Option<String>,
    pub company_address: Option<String>,
    pub services: Option<Vec<String>>,
    pub company_owner_only: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub company_id: Option<i32>,
    pub store_id: Option<i32>,
    pub active: Option<bool>,
    /// Only users able to take this service (installers and working company owners)
    pub service: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub store_id: Option<i32>,
    pub position: Option<String>,
    pub company_id: Option<i32>,
    pub company_name: Option<String>,
    pub nip: Option<String>,
    pub company_address: Option<String>,
    pub services: Vec<Capability>,
    pub company_owner_only: bool,
    pub can_install: bool,
}

impl TryFrom<user::Model> for UserResponse {
    type Error = ServiceError;

    fn try_from(model: user::Model) -> Result<Self, Self::Error> {
        let profile = model.profile().ok_or_else(|| {
            ServiceError::InternalError(format!("user {} has unknown role {}", model.id, model.role))
        })?;
        Ok(Self {
            role: profile.role(),
            can_install: profile.can_install(),
            services: parse_services(model.services.as_deref()),
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone,
            is_active: model.is_active,
            store_id: model.store_id,
            position: model.position,
            company_id: model.company_id,
            company_name: model.company_name,
            nip: model.nip,
            company_address: model.company_address,
            company_owner_only: model.company_owner_only,
        })
    }
}

fn parse_role(raw: &str) -> Result<UserRole, ServiceError> {
    UserRole::from_str(raw.trim())
        .map_err(|_| ServiceError::ValidationError(format!("Unknown role '{}'", raw)))
}

fn parse_capabilities(raw: &[String]) -> Result<Vec<Capability>, ServiceError> {
    let mut out = Vec::with_capacity(raw.len());
    for s in raw {
        let cap = Capability::from_str(s).map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if !out.contains(&cap) {
            out.push(cap);
        }
    }
    Ok(out)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Service for user accounts of all four roles
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    password_policy: PasswordPolicy,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            db_pool,
            password_policy: PasswordPolicy::default(),
        }
    }

    /// Admins manage everyone; company accounts only the installers of their company.
    fn ensure_can_manage(
        &self,
        viewer: &AuthUser,
        role: UserRole,
        company_id: Option<i32>,
    ) -> Result<(), ServiceError> {
        if viewer.has_permission(perm::USERS_MANAGE) {
            return Ok(());
        }
        if viewer.has_permission(perm::INSTALLERS_MANAGE)
            && role == UserRole::Installer
            && viewer.company_id().is_some()
            && company_id == viewer.company_id()
        {
            return Ok(());
        }
        Err(ServiceError::Forbidden(format!(
            "{} {} may not manage this {} account",
            viewer.role(),
            viewer.user_id,
            role
        )))
    }

    #[instrument(skip(self, viewer, query), fields(user_id = viewer.user_id))]
    pub async fn list_users(
        &self,
        viewer: &AuthUser,
        query: UserListQuery,
    ) -> Result<Vec<UserResponse>, ServiceError> {
        let mut select = user::Entity::find().order_by_asc(user::Column::Name);

        if viewer.has_permission(perm::USERS_MANAGE) {
            if let Some(raw) = query.role.as_deref() {
                select = select.filter(user::Column::Role.eq(parse_role(raw)?.as_str()));
            }
            if let Some(company_id) = query.company_id {
                select = select.filter(user::Column::CompanyId.eq(company_id));
            }
        } else if viewer.has_permission(perm::INSTALLERS_MANAGE) {
            let company_id = viewer.company_id().ok_or_else(|| {
                ServiceError::Forbidden("Company account is not linked to a company".into())
            })?;
            select = select
                .filter(user::Column::Role.eq(UserRole::Installer.as_str()))
                .filter(user::Column::CompanyId.eq(company_id));
        } else {
            return Err(ServiceError::Forbidden(format!(
                "{} may not list users",
                viewer.role()
            )));
        }

        if let Some(store_id) = query.store_id {
            select = select.filter(user::Column::StoreId.eq(store_id));
        }
        if let Some(active) = query.active {
            select = select.filter(user::Column::IsActive.eq(active));
        }

        let service = match query.service.as_deref() {
            Some(raw) => Some(
                Capability::from_str(raw).map_err(|e| ServiceError::ValidationError(e.to_string()))?,
            ),
            None => None,
        };

        let models = select.all(&*self.db_pool).await?;
        models
            .into_iter()
            .filter(|m| match service {
                Some(cap) => m
                    .profile()
                    .map(|p| p.can_install() && p.services().contains(&cap))
                    .unwrap_or(false),
                None => true,
            })
            .map(UserResponse::try_from)
            .collect()
    }

    #[instrument(skip(self, viewer), fields(viewer_id = viewer.user_id))]
    pub async fn get_user(&self, viewer: &AuthUser, user_id: i32) -> Result<UserResponse, ServiceError> {
        let model = self.find(user_id).await?;
        if viewer.user_id != user_id {
            let role = parse_role(&model.role)?;
            self.ensure_can_manage(viewer, role, model.company_id)?;
        }
        UserResponse::try_from(model)
    }

    #[instrument(skip(self, viewer, request), fields(viewer_id = viewer.user_id, email = %request.email))]
    pub async fn create_user(
        &self,
        viewer: &AuthUser,
        mut request: CreateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request.validate()?;
        let role = parse_role(&request.role)?;

        // Company accounts can only add installers to their own company.
        if !viewer.has_permission(perm::USERS_MANAGE) && role == UserRole::Installer {
            request.company_id = request.company_id.or(viewer.company_id());
        }
        self.ensure_can_manage(viewer, role, request.company_id)?;

        let model = self.insert_user(role, request).await?;
        info!(user_id = model.id, role = %role, "User created");
        UserResponse::try_from(model)
    }

    /// Validates role-specific fields, hashes the password and inserts the row.
    async fn insert_user(
        &self,
        role: UserRole,
        request: CreateUserRequest,
    ) -> Result<user::Model, ServiceError> {
        let db = &*self.db_pool;
        let email = normalize_email(&request.email);
        self.password_policy
            .validate(&request.password, Some(&email))
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        self.ensure_email_free(&email, None).await?;

        let services = parse_capabilities(&request.services)?;
        let mut company_id = request.company_id;
        let mut company_name = request.company_name.clone();

        match role {
            UserRole::Admin => {}
            UserRole::Worker => {
                let store_id = request.store_id.ok_or_else(|| {
                    ServiceError::ValidationError("store_id is required for workers".into())
                })?;
                store::Entity::find_by_id(store_id)
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Store {} not found", store_id)))?;
            }
            UserRole::Company => match company_id {
                Some(id) => {
                    let linked = company::Entity::find_by_id(id)
                        .one(db)
                        .await?
                        .ok_or_else(|| ServiceError::NotFound(format!("Company {} not found", id)))?;
                    company_name = company_name.or(Some(linked.name));
                }
                None => {
                    let name = company_name.clone().filter(|n| !n.trim().is_empty()).ok_or_else(
                        || {
                            ServiceError::ValidationError(
                                "company_name or company_id is required for company accounts"
                                    .into(),
                            )
                        },
                    )?;
                    let created = company::ActiveModel {
                        name: Set(name),
                        nip: Set(request.nip.clone()),
                        address: Set(request.company_address.clone()),
                        phone: Set(request.phone.clone()),
                        email: Set(Some(email.clone())),
                        status: Set("active".to_string()),
                        ..Default::default()
                    }
                    .insert(db)
                    .await?;
                    info!(company_id = created.id, "Company created for new company account");
                    company_id = Some(created.id);
                }
            },
            UserRole::Installer => {
                let id = company_id.ok_or_else(|| {
                    ServiceError::ValidationError("company_id is required for installers".into())
                })?;
                let linked = company::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Company {} not found", id)))?;
                company_name = Some(linked.name);
            }
        }

        let (is_company, is_worker) = (
            matches!(role, UserRole::Company | UserRole::Installer),
            role == UserRole::Worker,
        );
        let account = CompanyAccount::from_owner_only(request.company_owner_only.unwrap_or(true));

        let active = user::ActiveModel {
            name: Set(request.name.trim().to_string()),
            email: Set(email),
            phone: Set(request.phone),
            password_hash: Set(hash_password(&request.password)?),
            role: Set(role.as_str().to_string()),
            is_active: Set(request.is_active.unwrap_or(true)),
            store_id: Set(request.store_id.filter(|_| is_worker)),
            position: Set(request.position.filter(|_| is_worker)),
            company_id: Set(company_id.filter(|_| is_company)),
            company_name: Set(company_name.filter(|_| is_company)),
            nip: Set(request.nip.filter(|_| role == UserRole::Company)),
            company_address: Set(request.company_address.filter(|_| role == UserRole::Company)),
            services: Set(is_company.then(|| join_services(&services))),
            company_owner_only: Set(role != UserRole::Company || account.owner_only()),
            ..Default::default()
        };

        let model = active.insert(db).await.map_err(|e| {
            error!(error = %e, "Failed to create user");
            ServiceError::DatabaseError(e)
        })?;
        counter!("montaz_users.created", 1);
        Ok(model)
    }

    #[instrument(skip(self, viewer, request), fields(viewer_id = viewer.user_id))]
    pub async fn update_user(
        &self,
        viewer: &AuthUser,
        user_id: i32,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, ServiceError> {
        request.validate()?;
        let db = &*self.db_pool;
        let existing = self.find(user_id).await?;
        let current_role = parse_role(&existing.role)?;
        let is_admin = viewer.has_permission(perm::USERS_MANAGE);
        let is_self = viewer.user_id == user_id;

        if !is_self {
            self.ensure_can_manage(viewer, current_role, existing.company_id)?;
        }
        if !is_admin
            && (request.role.is_some()
                || request.company_id.is_some()
                || request.store_id.is_some()
                || request.is_active.is_some() && is_self)
        {
            return Err(ServiceError::Forbidden(
                "Only administrators may change roles or assignments".into(),
            ));
        }

        let role = match request.role.as_deref() {
            Some(raw) => parse_role(raw)?,
            None => current_role,
        };
        let mut active: user::ActiveModel = existing.clone().into();

        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(email) = request.email {
            let email = normalize_email(&email);
            self.ensure_email_free(&email, Some(user_id)).await?;
            active.email = Set(email);
        }
        if let Some(password) = request.password {
            self.password_policy
                .validate(&password, Some(&existing.email))
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(active_flag) = request.is_active {
            active.is_active = Set(active_flag);
        }
        if role != current_role {
            active.role = Set(role.as_str().to_string());
        }
        if let Some(store_id) = request.store_id {
            store::Entity::find_by_id(store_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Store {} not found", store_id)))?;
            active.store_id = Set(Some(store_id));
        }
        if let Some(position) = request.position {
            active.position = Set(Some(position));
        }
        if let Some(company_id) = request.company_id {
            let linked = company::Entity::find_by_id(company_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Company {} not found", company_id)))?;
            active.company_id = Set(Some(company_id));
            active.company_name = Set(Some(linked.name));
        }
        if let Some(name) = request.company_name {
            active.company_name = Set(Some(name));
        }
        if let Some(nip) = request.nip {
            active.nip = Set(Some(nip));
        }
        if let Some(address) = request.company_address {
            active.company_address = Set(Some(address));
        }
        if let Some(services) = request.services {
            active.services = Set(Some(join_services(&parse_capabilities(&services)?)));
        }
        if let Some(owner_only) = request.company_owner_only {
            active.company_owner_only = Set(owner_only);
        }

        let model = active.update(db).await.map_err(|e| {
            error!(error = %e, user_id, "Failed to update user");
            ServiceError::DatabaseError(e)
        })?;
        info!(user_id, "User updated");
        UserResponse::try_from(model)
    }

    #[instrument(skip(self, viewer), fields(viewer_id = viewer.user_id))]
    pub async fn delete_user(&self, viewer: &AuthUser, user_id: i32) -> Result<(), ServiceError> {
        viewer.require(perm::USERS_MANAGE)?;
        if viewer.user_id == user_id {
            return Err(ServiceError::ValidationError(
                "You cannot delete your own account".into(),
            ));
        }

        let result = user::Entity::delete_by_id(user_id).exec(&*self.db_pool).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("User {} not found", user_id)));
        }
        info!(user_id, "User deleted");
        Ok(())
    }

    /// Whether the first administrator still has to be created.
    pub async fn setup_required(&self) -> Result<bool, ServiceError> {
        let admins = user::Entity::find()
            .filter(user::Column::Role.eq(UserRole::Admin.as_str()))
            .count(&*self.db_pool)
            .await?;
        Ok(admins == 0)
    }

    /// Creates the first administrator. Refused once any admin exists.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn setup_admin(&self, mut request: CreateUserRequest) -> Result<user::Model, ServiceError> {
        if !self.setup_required().await? {
            return Err(ServiceError::Conflict(
                "An administrator already exists".into(),
            ));
        }
        request.role = UserRole::Admin.as_str().to_string();
        request.is_active = Some(true);
        request.validate()?;

        let model = self.insert_user(UserRole::Admin, request).await?;
        info!(user_id = model.id, "Initial administrator created");
        Ok(model)
    }

    /// Installer or working company owner that can take the given capability.
    pub async fn find_capable(
        &self,
        user_id: i32,
        capability: Capability,
    ) -> Result<user::Model, ServiceError> {
        let model = user::Entity::find_by_id(user_id)
            .one(&*self.db_pool)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let capable = model
            .profile()
            .map(|p| p.can_install() && p.services().contains(&capability))
            .unwrap_or(false);
        if !capable {
            return Err(ServiceError::NotFound(format!(
                "No active installer {} offering {}",
                user_id, capability
            )));
        }
        Ok(model)
    }

    async fn find(&self, user_id: i32) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(user_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))
    }

    async fn ensure_email_free(&self, email: &str, except: Option<i32>) -> Result<(), ServiceError> {
        let mut select = user::Entity::find().filter(user::Column::Email.eq(email));
        if let Some(id) = except {
            select = select.filter(user::Column::Id.ne(id));
        }
        if select.count(&*self.db_pool).await? > 0 {
            return Err(ServiceError::Conflict(format!("Email {} is already in use", email)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("+48 600 100 200", true)]
    #[case("600-100-200", true)]
    #[case("12", false)]
    #[case("call me", false)]
    fn phone_format(#[case] phone: &str, #[case] valid: bool) {
        assert_eq!(validate_phone(phone).is_ok(), valid);
    }

    #[rstest]
    #[case("5260250274", true)]
    #[case("526-025-02-74", true)]
    #[case("5260250275", false)]
    #[case("123", false)]
    fn nip_checksum(#[case] nip: &str, #[case] valid: bool) {
        assert_eq!(validate_nip(nip).is_ok(), valid);
    }

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "lenient_id")]
        id: Option<i32>,
    }

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        let parse = |raw: &str| serde_json::from_str::<Probe>(raw).map(|p| p.id);
        assert_eq!(parse(r#"{"id": 4}"#).unwrap(), Some(4));
        assert_eq!(parse(r#"{"id": "12"}"#).unwrap(), Some(12));
        assert_eq!(parse(r#"{"id": ""}"#).unwrap(), None);
        assert_eq!(parse(r#"{}"#).unwrap(), None);
        assert!(parse(r#"{"id": "abc"}"#).is_err());
    }

    #[test]
    fn capabilities_are_deduplicated() {
        let caps = parse_capabilities(&["doors".into(), "door_installation".into(), "transport".into()])
            .unwrap();
        assert_eq!(caps, vec![Capability::DoorInstallation, Capability::Transport]);
        assert!(parse_capabilities(&["painting".into()]).is_err());
    }
}
