use crate::{
    auth::{order_access, order_access::ListScope, AuthUser},
    cache::QueryCache,
    config::DateOrderingPolicy,
    db::DbPool,
    entities::{company, order, store},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        check_date_ordering, InstallationStatus, ServiceType, StatusTrack, TransportStatus,
        UserRole,
    },
    services::{photos::PhotoStore, users::validate_phone},
};
use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// One entry of the append-only side-note trail kept on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusComment {
    pub at: DateTime<Utc>,
    pub user_id: i32,
    pub user_name: String,
    pub track: StatusTrack,
    pub status: String,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    /// Generated as `ZL-YYYY-MM-NNNN` when omitted
    #[validate(length(min = 3, max = 40, message = "Order number must be 3-40 characters"))]
    pub order_number: Option<String>,
    #[validate(length(min = 2, message = "Client name is required"))]
    pub client_name: String,
    #[validate(custom = "validate_phone")]
    pub client_phone: Option<String>,
    #[validate(length(min = 3, message = "Installation address is required"))]
    pub installation_address: String,
    pub store_id: Option<i32>,
    pub company_id: Option<i32>,
    #[schema(example = "door_installation")]
    pub service_type: String,
    #[serde(default)]
    pub with_transport: bool,
    pub proposed_date: Option<String>,
    pub installation_date: Option<NaiveDate>,
    pub transport_date: Option<NaiveDate>,
    pub delivery_status: Option<String>,
    pub order_value: Option<Decimal>,
    pub warehouse_value: Option<Decimal>,
    pub service_value: Option<Decimal>,
    pub notes: Option<String>,
}

/// Partial update of the descriptive fields. Statuses and assignments have
/// their own operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    #[validate(length(min = 2, message = "Client name cannot be empty"))]
    pub client_name: Option<String>,
    #[validate(custom = "validate_phone")]
    pub client_phone: Option<String>,
    #[validate(length(min = 3, message = "Installation address cannot be empty"))]
    pub installation_address: Option<String>,
    pub service_type: Option<String>,
    pub with_transport: Option<bool>,
    pub proposed_date: Option<String>,
    pub installation_date: Option<NaiveDate>,
    pub transport_date: Option<NaiveDate>,
    pub delivery_status: Option<String>,
    pub order_value: Option<Decimal>,
    pub warehouse_value: Option<Decimal>,
    pub service_value: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub installation_status: Option<String>,
    pub transport_status: Option<String>,
    pub service_type: Option<String>,
    pub store_id: Option<i32>,
    pub company_id: Option<i32>,
    pub installer_id: Option<i32>,
    /// Matches order number, client name or address
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: i32,
    pub order_number: String,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub installation_address: String,
    pub store_id: Option<i32>,
    pub store_name: Option<String>,
    pub company_id: Option<i32>,
    pub company_name: Option<String>,
    pub installer_id: Option<i32>,
    pub transporter_id: Option<i32>,
    pub service_type: ServiceType,
    pub with_transport: bool,
    pub proposed_date: Option<String>,
    pub installation_date: Option<NaiveDate>,
    pub transport_date: Option<NaiveDate>,
    pub installation_status: InstallationStatus,
    pub transport_status: Option<TransportStatus>,
    pub delivery_status: Option<String>,
    pub documents_provided: bool,
    pub will_be_settled: bool,
    pub invoice_issued: bool,
    pub complaint_notes: Option<String>,
    pub complaint_photos: Vec<String>,
    pub order_value: Decimal,
    pub warehouse_value: Decimal,
    pub service_value: Decimal,
    pub notes: Option<String>,
    pub comments: Vec<StatusComment>,
    pub user_id: Option<i32>,
    pub user_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<order::Model> for OrderResponse {
    type Error = ServiceError;

    fn try_from(model: order::Model) -> Result<Self, Self::Error> {
        let service_type = service_of(&model)?;
        let installation_status = InstallationStatus::normalize(&model.installation_status)
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        // Transport status only exists on orders with transport.
        let transport_status = match (&model.transport_status, model.with_transport) {
            (Some(raw), true) => Some(
                TransportStatus::normalize(raw)
                    .map_err(|e| ServiceError::ValidationError(e.to_string()))?,
            ),
            _ => None,
        };

        Ok(Self {
            complaint_photos: photos_of(&model),
            comments: comments_of(&model),
            id: model.id,
            order_number: model.order_number,
            client_name: model.client_name,
            client_phone: model.client_phone,
            installation_address: model.installation_address,
            store_id: model.store_id,
            store_name: model.store_name,
            company_id: model.company_id,
            company_name: model.company_name,
            installer_id: model.installer_id,
            transporter_id: model.transporter_id,
            service_type,
            with_transport: model.with_transport,
            proposed_date: model.proposed_date,
            installation_date: model.installation_date,
            transport_date: model.transport_date,
            installation_status,
            transport_status,
            delivery_status: model.delivery_status,
            documents_provided: model.documents_provided,
            will_be_settled: model.will_be_settled,
            invoice_issued: model.invoice_issued,
            complaint_notes: model.complaint_notes,
            order_value: model.order_value,
            warehouse_value: model.warehouse_value,
            service_value: model.service_value,
            notes: model.notes,
            user_id: model.user_id,
            user_name: model.user_name,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

pub(crate) fn service_of(model: &order::Model) -> Result<ServiceType, ServiceError> {
    model
        .service_type
        .parse()
        .map_err(|e: crate::models::service_type::UnknownService| {
            ServiceError::ValidationError(e.to_string())
        })
}

pub(crate) fn photos_of(model: &order::Model) -> Vec<String> {
    serde_json::from_value(model.complaint_photos.clone()).unwrap_or_default()
}

pub(crate) fn comments_of(model: &order::Model) -> Vec<StatusComment> {
    serde_json::from_value(model.comments.clone()).unwrap_or_default()
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::InternalError(e.to_string()))
}

/// Applies the configured date-ordering policy to a pair of dates.
pub(crate) fn enforce_date_ordering(
    policy: DateOrderingPolicy,
    order_number: &str,
    service: ServiceType,
    transport: Option<NaiveDate>,
    installation: Option<NaiveDate>,
) -> Result<(), ServiceError> {
    let Err(violation) = check_date_ordering(service, transport, installation) else {
        return Ok(());
    };

    match policy {
        DateOrderingPolicy::Strict => Err(ServiceError::ValidationError(violation.to_string())),
        DateOrderingPolicy::Warn => {
            warn!(order_number, %violation, "date ordering violated, accepted under warn policy");
            counter!("montaz_orders.date_ordering_warnings", 1);
            Ok(())
        }
    }
}

pub(crate) fn ensure_non_negative(field: &str, value: Option<Decimal>) -> Result<(), ServiceError> {
    match value {
        Some(v) if v.is_sign_negative() && !v.is_zero() => Err(ServiceError::ValidationError(
            format!("{} must not be negative", field),
        )),
        _ => Ok(()),
    }
}

/// Loads an order straight from the database.
pub(crate) async fn load_order(db: &DbPool, order_id: i32) -> Result<order::Model, ServiceError> {
    order::Entity::find_by_id(order_id)
        .one(db)
        .await
        .map_err(|e| {
            error!(error = %e, order_id, "Failed to fetch order from database");
            ServiceError::DatabaseError(e)
        })?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

/// Service for creating, reading, editing and deleting orders
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    cache: QueryCache,
    date_policy: DateOrderingPolicy,
    photos: Arc<dyn PhotoStore>,
    default_page_size: u64,
    max_page_size: u64,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        cache: QueryCache,
        date_policy: DateOrderingPolicy,
        photos: Arc<dyn PhotoStore>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            cache,
            date_policy,
            photos,
            default_page_size: 20,
            max_page_size: 100,
        }
    }

    pub fn with_page_sizes(mut self, default_page_size: u64, max_page_size: u64) -> Self {
        self.default_page_size = default_page_size;
        self.max_page_size = max_page_size;
        self
    }

    /// Creates a new order. Workers default to their own store.
    #[instrument(skip(self, viewer, request), fields(user_id = viewer.user_id))]
    pub async fn create_order(
        &self,
        viewer: &AuthUser,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        let db = &*self.db_pool;

        let service: ServiceType = request
            .service_type
            .parse()
            .map_err(|e: crate::models::service_type::UnknownService| {
                ServiceError::ValidationError(e.to_string())
            })?;
        ensure_non_negative("order_value", request.order_value)?;
        ensure_non_negative("warehouse_value", request.warehouse_value)?;
        ensure_non_negative("service_value", request.service_value)?;

        let order_number = match request.order_number.as_deref().map(str::trim) {
            Some(number) if !number.is_empty() => {
                let taken = order::Entity::find()
                    .filter(order::Column::OrderNumber.eq(number))
                    .count(db)
                    .await?
                    > 0;
                if taken {
                    return Err(ServiceError::Conflict(format!(
                        "Order number {} already exists",
                        number
                    )));
                }
                number.to_string()
            }
            _ => self.next_order_number(Utc::now().date_naive()).await?,
        };

        let transport_date = request.transport_date.filter(|_| request.with_transport);
        enforce_date_ordering(
            self.date_policy,
            &order_number,
            service,
            transport_date,
            request.installation_date,
        )?;

        let store_id = request.store_id.or(viewer.profile.store_id());
        let store_name = match store_id {
            Some(id) => Some(
                store::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Store {} not found", id)))?
                    .name,
            ),
            None => None,
        };
        let company_name = match request.company_id {
            Some(id) => Some(
                company::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Company {} not found", id)))?
                    .name,
            ),
            None => None,
        };

        let now = Utc::now();
        let active = order::ActiveModel {
            order_number: Set(order_number.clone()),
            client_name: Set(request.client_name.trim().to_string()),
            client_phone: Set(request.client_phone),
            installation_address: Set(request.installation_address.trim().to_string()),
            store_id: Set(store_id),
            store_name: Set(store_name),
            company_id: Set(request.company_id),
            company_name: Set(company_name),
            installer_id: Set(None),
            transporter_id: Set(None),
            service_type: Set(service.as_str().to_string()),
            with_transport: Set(request.with_transport),
            proposed_date: Set(request.proposed_date),
            installation_date: Set(request.installation_date),
            transport_date: Set(transport_date),
            installation_status: Set(InstallationStatus::New.as_str().to_string()),
            transport_status: Set(request
                .with_transport
                .then(|| TransportStatus::Assembled.as_str().to_string())),
            delivery_status: Set(request.delivery_status),
            documents_provided: Set(false),
            will_be_settled: Set(false),
            invoice_issued: Set(false),
            complaint_notes: Set(None),
            complaint_photos: Set(serde_json::json!([])),
            order_value: Set(request.order_value.unwrap_or_default()),
            warehouse_value: Set(request.warehouse_value.unwrap_or_default()),
            service_value: Set(request.service_value.unwrap_or_default()),
            notes: Set(request.notes),
            comments: Set(serde_json::json!([])),
            user_id: Set(Some(viewer.user_id)),
            user_name: Set(Some(viewer.name.clone())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(db).await.map_err(|e| {
            error!(error = %e, order_number = %order_number, "Failed to create order");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = model.id, order_number = %model.order_number, "Order created");
        counter!("montaz_orders.created", 1);

        self.invalidate(model.id).await;
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: model.id,
                order_number: model.order_number.clone(),
            })
            .await;

        OrderResponse::try_from(model)
    }

    /// Retrieves an order the viewer may read.
    #[instrument(skip(self, viewer), fields(user_id = viewer.user_id))]
    pub async fn get_order(
        &self,
        viewer: &AuthUser,
        order_id: i32,
    ) -> Result<OrderResponse, ServiceError> {
        let model = self.fetch_cached(order_id).await?;
        ensure_readable(viewer, &model)?;
        OrderResponse::try_from(model)
    }

    #[instrument(skip(self, viewer), fields(user_id = viewer.user_id))]
    pub async fn get_order_by_number(
        &self,
        viewer: &AuthUser,
        order_number: &str,
    ) -> Result<OrderResponse, ServiceError> {
        let model = order::Entity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;
        ensure_readable(viewer, &model)?;
        OrderResponse::try_from(model)
    }

    /// Raw row for callers that evaluate permissions themselves.
    pub async fn get_model(&self, order_id: i32) -> Result<order::Model, ServiceError> {
        self.fetch_cached(order_id).await
    }

    /// Lists orders scoped to what the viewer may read.
    #[instrument(skip(self, viewer, query), fields(user_id = viewer.user_id))]
    pub async fn list_orders(
        &self,
        viewer: &AuthUser,
        query: OrderListQuery,
    ) -> Result<OrderListResponse, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let scope = ListScope::for_user(viewer);

        let cache_key = format!(
            "{}{:?}:{}:{}:{}",
            QueryCache::ORDER_LIST_PREFIX,
            scope,
            page,
            limit,
            serde_json::to_string(&query).unwrap_or_default()
        );
        let generation = self.cache.generation();
        match self.cache.get_json::<OrderListResponse>(&cache_key).await {
            Ok(Some(cached)) => {
                debug!("order list served from cache");
                return Ok(cached);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "order list cache read failed"),
        }

        let mut condition = Condition::all();
        condition = match scope {
            ListScope::All => condition,
            ListScope::Store(store_id) => condition.add(order::Column::StoreId.eq(store_id)),
            ListScope::Company(company_id) => {
                condition.add(order::Column::CompanyId.eq(company_id))
            }
            ListScope::AssignedTo(user_id) => condition.add(
                Condition::any()
                    .add(order::Column::InstallerId.eq(user_id))
                    .add(order::Column::TransporterId.eq(user_id)),
            ),
            ListScope::Nothing => {
                return Ok(OrderListResponse {
                    orders: Vec::new(),
                    total: 0,
                    page,
                    limit,
                })
            }
        };

        if let Some(raw) = query.installation_status.as_deref() {
            let status = InstallationStatus::normalize(raw)
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
            condition = condition.add(order::Column::InstallationStatus.eq(status.as_str()));
        }
        if let Some(raw) = query.transport_status.as_deref() {
            let status = TransportStatus::normalize(raw)
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
            condition = condition.add(order::Column::TransportStatus.eq(status.as_str()));
        }
        if let Some(raw) = query.service_type.as_deref() {
            let service: ServiceType = raw
                .parse()
                .map_err(|e: crate::models::service_type::UnknownService| {
                    ServiceError::ValidationError(e.to_string())
                })?;
            condition = condition.add(order::Column::ServiceType.eq(service.as_str()));
        }
        if let Some(store_id) = query.store_id {
            condition = condition.add(order::Column::StoreId.eq(store_id));
        }
        if let Some(company_id) = query.company_id {
            condition = condition.add(order::Column::CompanyId.eq(company_id));
        }
        if let Some(installer_id) = query.installer_id {
            condition = condition.add(order::Column::InstallerId.eq(installer_id));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            condition = condition.add(
                Condition::any()
                    .add(order::Column::OrderNumber.contains(search))
                    .add(order::Column::ClientName.contains(search))
                    .add(order::Column::InstallationAddress.contains(search)),
            );
        }

        let paginator = order::Entity::find()
            .filter(condition)
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .paginate(&*self.db_pool, limit);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;
        let models = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page, limit, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        let orders = models
            .into_iter()
            .map(OrderResponse::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let response = OrderListResponse {
            orders,
            total,
            page,
            limit,
        };

        if let Err(e) = self
            .cache
            .set_json_at(&cache_key, &response, generation)
            .await
        {
            warn!(error = %e, "order list cache write failed");
        }
        Ok(response)
    }

    /// Partial update of descriptive fields; dates are re-validated.
    #[instrument(skip(self, viewer, request), fields(user_id = viewer.user_id))]
    pub async fn update_order(
        &self,
        viewer: &AuthUser,
        order_id: i32,
        request: UpdateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        let db = &*self.db_pool;
        let existing = load_order(db, order_id).await?;

        if !order_access::can_edit(viewer, &(&existing).into()) {
            return Err(ServiceError::Forbidden(format!(
                "{} {} may not edit order {}",
                viewer.role(),
                viewer.user_id,
                order_id
            )));
        }
        ensure_non_negative("order_value", request.order_value)?;
        ensure_non_negative("warehouse_value", request.warehouse_value)?;
        ensure_non_negative("service_value", request.service_value)?;

        let service = match request.service_type.as_deref() {
            Some(raw) => raw
                .parse()
                .map_err(|e: crate::models::service_type::UnknownService| {
                    ServiceError::ValidationError(e.to_string())
                })?,
            None => service_of(&existing)?,
        };
        let with_transport = request.with_transport.unwrap_or(existing.with_transport);
        let transport_date = if with_transport {
            request.transport_date.or(existing.transport_date)
        } else {
            None
        };
        let installation_date = request.installation_date.or(existing.installation_date);
        enforce_date_ordering(
            self.date_policy,
            &existing.order_number,
            service,
            transport_date,
            installation_date,
        )?;

        let mut active: order::ActiveModel = existing.clone().into();
        if let Some(v) = request.client_name {
            active.client_name = Set(v.trim().to_string());
        }
        if let Some(v) = request.client_phone {
            active.client_phone = Set(Some(v));
        }
        if let Some(v) = request.installation_address {
            active.installation_address = Set(v.trim().to_string());
        }
        if let Some(v) = request.proposed_date {
            active.proposed_date = Set(Some(v));
        }
        if let Some(v) = request.delivery_status {
            active.delivery_status = Set(Some(v));
        }
        if let Some(v) = request.order_value {
            active.order_value = Set(v);
        }
        if let Some(v) = request.warehouse_value {
            active.warehouse_value = Set(v);
        }
        if let Some(v) = request.service_value {
            active.service_value = Set(v);
        }
        if let Some(v) = request.notes {
            active.notes = Set(Some(v));
        }
        active.service_type = Set(service.as_str().to_string());
        active.installation_date = Set(installation_date);
        active.transport_date = Set(transport_date);

        if with_transport != existing.with_transport {
            active.with_transport = Set(with_transport);
            if with_transport {
                active.transport_status = Set(Some(TransportStatus::Assembled.as_str().to_string()));
            } else {
                active.transport_status = Set(None);
                active.transporter_id = Set(None);
            }
        }

        let model = active.update(db).await.map_err(|e| {
            error!(error = %e, order_id, "Failed to update order");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id, "Order updated");
        self.invalidate(order_id).await;
        self.event_sender.send_or_log(Event::OrderUpdated(order_id)).await;

        OrderResponse::try_from(model)
    }

    /// Deletes an order. Admin only.
    #[instrument(skip(self, viewer), fields(user_id = viewer.user_id))]
    pub async fn delete_order(&self, viewer: &AuthUser, order_id: i32) -> Result<(), ServiceError> {
        if viewer.role() != UserRole::Admin {
            return Err(ServiceError::Forbidden(
                "Only administrators may delete orders".to_string(),
            ));
        }

        let result = order::Entity::delete_by_id(order_id)
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "Failed to delete order");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Order {} not found", order_id)));
        }

        info!(order_id, "Order deleted");
        counter!("montaz_orders.deleted", 1);
        self.invalidate(order_id).await;
        if let Err(e) = self.photos.remove_all(order_id).await {
            warn!(error = %e, order_id, "photos of deleted order could not be removed");
        }
        self.event_sender.send_or_log(Event::OrderDeleted(order_id)).await;
        Ok(())
    }

    /// Next free number in the current month, starting at 1001.
    async fn next_order_number(&self, today: NaiveDate) -> Result<String, ServiceError> {
        let prefix = format!("ZL-{}-", today.format("%Y-%m"));
        let existing: Vec<String> = order::Entity::find()
            .select_only()
            .column(order::Column::OrderNumber)
            .filter(order::Column::OrderNumber.starts_with(&prefix))
            .into_tuple()
            .all(&*self.db_pool)
            .await?;

        next_number_in(&prefix, &existing)
    }

    async fn fetch_cached(&self, order_id: i32) -> Result<order::Model, ServiceError> {
        let key = QueryCache::order_key(order_id);
        let generation = self.cache.generation();
        match self.cache.get_json::<order::Model>(&key).await {
            Ok(Some(model)) => return Ok(model),
            Ok(None) => {}
            Err(e) => warn!(error = %e, order_id, "order cache read failed"),
        }

        let model = load_order(&self.db_pool, order_id).await?;
        if let Err(e) = self.cache.set_json_at(&key, &model, generation).await {
            warn!(error = %e, order_id, "order cache write failed");
        }
        Ok(model)
    }

    async fn invalidate(&self, order_id: i32) {
        if let Err(e) = self.cache.invalidate_order(order_id).await {
            warn!(error = %e, order_id, "order cache invalidation failed");
        }
    }
}

fn ensure_readable(viewer: &AuthUser, model: &order::Model) -> Result<(), ServiceError> {
    if order_access::can_read(viewer, &model.into()) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "{} {} may not read order {}",
            viewer.role(),
            viewer.user_id,
            model.id
        )))
    }
}

const FIRST_ORDER_SUFFIX: u32 = 1001;

/// One past the highest numeric suffix. When that would overflow, the lowest
/// unused suffix from 1001 up is taken instead.
fn next_number_in(prefix: &str, existing: &[String]) -> Result<String, ServiceError> {
    let used: BTreeSet<u32> = existing
        .iter()
        .filter_map(|n| n.strip_prefix(prefix)?.parse::<u32>().ok())
        .collect();
    let next = match used.last() {
        None => Some(FIRST_ORDER_SUFFIX),
        Some(max) => max
            .checked_add(1)
            .or_else(|| (FIRST_ORDER_SUFFIX..=u32::MAX).find(|n| !used.contains(n))),
    };
    next.map(|n| format!("{}{:04}", prefix, n)).ok_or_else(|| {
        ServiceError::Conflict(format!("No order numbers left under {}", prefix))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[test]
    fn order_numbers_continue_the_month_sequence() {
        let prefix = "ZL-2025-04-";
        assert_eq!(next_number_in(prefix, &[]).unwrap(), "ZL-2025-04-1001");
        let existing = vec![
            "ZL-2025-04-1001".to_string(),
            "ZL-2025-04-1007".to_string(),
            "ZL-2025-04-custom".to_string(),
        ];
        assert_eq!(next_number_in(prefix, &existing).unwrap(), "ZL-2025-04-1008");
    }

    #[test]
    fn order_numbers_survive_the_largest_suffix() {
        let prefix = "ZL-2025-04-";
        let existing = vec![
            "ZL-2025-04-4294967295".to_string(),
            "ZL-2025-04-1001".to_string(),
        ];
        assert_eq!(next_number_in(prefix, &existing).unwrap(), "ZL-2025-04-1002");
        let only_max = vec!["ZL-2025-04-4294967295".to_string()];
        assert_eq!(next_number_in(prefix, &only_max).unwrap(), "ZL-2025-04-1001");
    }

    #[test]
    fn warn_policy_accepts_violations() {
        let transport = NaiveDate::from_ymd_opt(2025, 4, 20);
        let install = NaiveDate::from_ymd_opt(2025, 4, 18);
        assert_matches!(
            enforce_date_ordering(
                DateOrderingPolicy::Strict,
                "ZL-1",
                ServiceType::DoorInstallation,
                transport,
                install
            ),
            Err(ServiceError::ValidationError(_))
        );
        assert!(enforce_date_ordering(
            DateOrderingPolicy::Warn,
            "ZL-1",
            ServiceType::DoorInstallation,
            transport,
            install
        )
        .is_ok());
    }

    #[test]
    fn negative_values_are_rejected() {
        assert!(ensure_non_negative("order_value", Some(dec!(-1.50))).is_err());
        assert!(ensure_non_negative("order_value", Some(dec!(4200.00))).is_ok());
        assert!(ensure_non_negative("order_value", Some(Decimal::ZERO)).is_ok());
        assert!(ensure_non_negative("order_value", None).is_ok());
    }
}
