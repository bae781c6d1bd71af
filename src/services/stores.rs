use crate::{
    db::DbPool,
    entities::store,
    errors::ServiceError,
    services::users::validate_phone,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

pub(crate) fn validate_record_status(status: &str) -> Result<(), ValidationError> {
    match status {
        "active" | "inactive" => Ok(()),
        _ => {
            let mut err = ValidationError::new("status");
            err.message = Some("Status must be 'active' or 'inactive'".into());
            Err(err)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateStoreRequest {
    #[validate(length(min = 2, message = "Store name is required"))]
    pub name: String,
    pub address: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_record_status")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateStoreRequest {
    #[validate(length(min = 2, message = "Store name cannot be empty"))]
    pub name: Option<String>,
    pub address: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_record_status")]
    pub status: Option<String>,
}

/// Stores (salony) that place installation orders
#[derive(Clone)]
pub struct StoreService {
    db_pool: Arc<DbPool>,
}

impl StoreService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_stores(&self, status: Option<&str>) -> Result<Vec<store::Model>, ServiceError> {
        let mut select = store::Entity::find().order_by_asc(store::Column::Name);
        if let Some(status) = status {
            select = select.filter(store::Column::Status.eq(status));
        }
        Ok(select.all(&*self.db_pool).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_store(&self, store_id: i32) -> Result<store::Model, ServiceError> {
        store::Entity::find_by_id(store_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Store {} not found", store_id)))
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_store(&self, request: CreateStoreRequest) -> Result<store::Model, ServiceError> {
        request.validate()?;

        let model = store::ActiveModel {
            name: Set(request.name.trim().to_string()),
            address: Set(request.address),
            phone: Set(request.phone),
            email: Set(request.email),
            status: Set(request.status.unwrap_or_else(|| "active".to_string())),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create store");
            ServiceError::DatabaseError(e)
        })?;

        info!(store_id = model.id, "Store created");
        Ok(model)
    }

    #[instrument(skip(self, request))]
    pub async fn update_store(
        &self,
        store_id: i32,
        request: UpdateStoreRequest,
    ) -> Result<store::Model, ServiceError> {
        request.validate()?;
        let mut active: store::ActiveModel = self.get_store(store_id).await?.into();

        if let Some(name) = request.name {
            active.name = Set(name.trim().to_string());
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
        info!(store_id, "Store updated");
        Ok(model)
    }

    /// Deleting a store drops its company links; orders keep the denormalized name.
    #[instrument(skip(self))]
    pub async fn delete_store(&self, store_id: i32) -> Result<(), ServiceError> {
        let result = store::Entity::delete_by_id(store_id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Store {} not found", store_id)));
        }
        info!(store_id, "Store deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_request_validation() {
        let ok = CreateStoreRequest {
            name: "Salon Kraków".into(),
            address: None,
            phone: Some("+48 12 600 70 80".into()),
            email: Some("krakow@example.com".into()),
            status: None,
        };
        assert!(ok.validate().is_ok());

        let bad = CreateStoreRequest {
            status: Some("closed".into()),
            ..ok
        };
        assert!(bad.validate().is_err());
    }
}
