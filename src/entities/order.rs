use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};

/// The `orders` table. Status columns hold canonical snake_case values, but
/// rows imported from older deployments may still carry legacy labels, so
/// they are kept as text and normalized when read.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
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

    pub service_type: String,
    pub with_transport: bool,

    pub proposed_date: Option<String>,
    pub installation_date: Option<NaiveDate>,
    pub transport_date: Option<NaiveDate>,

    pub installation_status: String,
    pub transport_status: Option<String>,
    pub delivery_status: Option<String>,
    pub documents_provided: bool,
    pub will_be_settled: bool,
    pub invoice_issued: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub complaint_notes: Option<String>,
    /// JSON array of photo references
    pub complaint_photos: Json,

    pub order_value: Decimal,
    pub warehouse_value: Decimal,
    pub service_value: Decimal,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    /// JSON array of status comments
    pub comments: Json,

    pub user_id: Option<i32>,
    pub user_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id"
    )]
    Store,
    #[sea_orm(
        belongs_to = "super::company::Entity",
        from = "Column::CompanyId",
        to = "super::company::Column::Id"
    )]
    Company,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

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
