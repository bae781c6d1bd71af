use crate::{
    db::DbPool,
    entities::{company, company_store, store},
    errors::ServiceError,
    services::{
        stores::validate_record_status,
        users::{validate_nip, validate_phone},
    },
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 2, message = "Company name is required"))]
    pub name: String,
    #[validate(custom = "validate_nip")]
    pub nip: Option<String>,
    pub address: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_record_status")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 2, message = "Company name cannot be empty"))]
    pub name: Option<String>,
    #[validate(custom = "validate_nip")]
    pub nip: Option<String>,
    pub address: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_record_status")]
    pub status: Option<String>,
}

/// Installation companies and the stores they serve
#[derive(Clone)]
pub struct CompanyService {
    db_pool: Arc<DbPool>,
}

impl CompanyService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_companies(&self) -> Result<Vec<company::Model>, ServiceError> {
        Ok(company::Entity::find()
            .order_by_asc(company::Column::Name)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_company(&self, company_id: i32) -> Result<company::Model, ServiceError> {
        company::Entity::find_by_id(company_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Company {} not found", company_id)))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_company(
        &self,
        request: CreateCompanyRequest,
    ) -> Result<company::Model, ServiceError> {
        request.validate()?;

        let model = company::ActiveModel {
            name: Set(request.name.trim().to_string()),
            nip: Set(request.nip),
            address: Set(request.address),
            phone: Set(request.phone),
            email: Set(request.email),
            status: Set(request.status.unwrap_or_else(|| "active".to_string())),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create company");
            ServiceError::DatabaseError(e)
        })?;

        info!(company_id = model.id, "Company created");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_company(
        &self,
        company_id: i32,
        request: UpdateCompanyRequest,
    ) -> Result<company::Model, ServiceError> {
        request.validate()?;
        let mut active: company::ActiveModel = self.get_company(company_id).await?.into();

        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(nip) = request.nip {
            active.nip = Set(Some(nip));
        }
        if let Some(address) = request.address {
            active.address = Set(Some(address));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(email) = request.email {
            active.email = Set(Some(email));
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }

        let model = active.update(&*self.db_pool).await?;
        info!(company_id, "Company updated");
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn delete_company(&self, company_id: i32) -> Result<(), ServiceError> {
        let result = company::Entity::delete_by_id(company_id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Company {} not found", company_id)));
        }
        info!(company_id, "Company deleted");
        Ok(())
    }

    /// Stores served by a company
    #[instrument(skip(self))]
    pub async fn list_company_stores(&self, company_id: i32) -> Result<Vec<store::Model>, ServiceError> {
        let company = self.get_company(company_id).await?;
        Ok(company
            .find_related(store::Entity)
            .order_by_asc(store::Column::Name)
            .all(&*self.db_pool)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn serves_store(&self, company_id: i32, store_id: i32) -> Result<bool, ServiceError> {
        let links = company_store::Entity::find()
            .filter(company_store::Column::CompanyId.eq(company_id))
            .filter(company_store::Column::StoreId.eq(store_id))
            .count(&*self.db_pool)
            .await?;
        Ok(links > 0)
    }

    /// Links a company to a store; linking twice is a conflict.
    #[instrument(skip(self))]
    pub async fn link_store(
        &self,
        company_id: i32,
        store_id: i32,
    ) -> Result<company_store::Model, ServiceError> {
        self.get_company(company_id).await?;
        store::Entity::find_by_id(store_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Store {} not found", store_id)))?;

        if self.serves_store(company_id, store_id).await? {
            return Err(ServiceError::Conflict(format!(
                "Company {} is already linked to store {}",
                company_id, store_id
            )));
        }

        let link = company_store::ActiveModel {
            company_id: Set(company_id),
            store_id: Set(store_id),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(company_id, store_id, "Company linked to store");
        Ok(link)
    }

    #[instrument(skip(self))]
    pub async fn unlink_store(&self, company_id: i32, store_id: i32) -> Result<(), ServiceError> {
        let result = company_store::Entity::delete_many()
            .filter(company_store::Column::CompanyId.eq(company_id))
            .filter(company_store::Column::StoreId.eq(store_id))
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Company {} is not linked to store {}",
                company_id, store_id
            )));
        }
        info!(company_id, store_id, "Company unlinked from store");
        Ok(())
    }
}
