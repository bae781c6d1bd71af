use async_trait::async_trait;
use crate::models::role::{parse_services, CompanyAccount, UserProfile, UserRole};
use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};

/// Database entity for user accounts. The role-specific columns are only
/// meaningful for the matching `role`; see `models::role::UserProfile`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text")]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,

    // worker
    pub store_id: Option<i32>,
    pub position: Option<String>,

    // company and installer
    pub company_id: Option<i32>,
    pub company_name: Option<String>,
    pub nip: Option<String>,
    pub company_address: Option<String>,
    pub services: Option<String>,
    pub company_owner_only: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}

impl Model {
    /// Stored role, `None` for rows with an unrecognized value.
    pub fn user_role(&self) -> Option<UserRole> {
        self.role.parse().ok()
    }

    /// Builds the role-specific view of this row.
    pub fn profile(&self) -> Option<UserProfile> {
        let profile = match self.user_role()? {
            UserRole::Admin => UserProfile::Admin,
            UserRole::Worker => UserProfile::Worker {
                store_id: self.store_id,
                position: self.position.clone(),
            },
            UserRole::Company => UserProfile::Company {
                company_id: self.company_id,
                company_name: self.company_name.clone(),
                nip: self.nip.clone(),
                company_address: self.company_address.clone(),
                services: parse_services(self.services.as_deref()),
                account: CompanyAccount::from_owner_only(self.company_owner_only),
            },
            UserRole::Installer => UserProfile::Installer {
                company_id: self.company_id,
                services: parse_services(self.services.as_deref()),
            },
        };
        Some(profile)
    }
}
