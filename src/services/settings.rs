use crate::{
    db::DbPool,
    entities::setting,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

/// How a setting's value is stored and returned.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SettingType {
    String,
    Boolean,
    Json,
}

impl SettingType {
    fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => Self::Boolean,
            Value::String(_) => Self::String,
            _ => Self::Json,
        }
    }
}

/// Stored representation: `(value, value_json)`.
fn encode_value(kind: SettingType, value: Value) -> Result<(Option<String>, Option<Value>), ServiceError> {
    match (kind, value) {
        (SettingType::Boolean, Value::Bool(b)) => Ok((Some(b.to_string()), None)),
        (SettingType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "tak" => Ok((Some("true".into()), None)),
            "false" | "0" | "no" | "nie" => Ok((Some("false".into()), None)),
            _ => Err(ServiceError::ValidationError(format!("'{}' is not a boolean", s))),
        },
        (SettingType::Boolean, Value::Number(n)) if n.as_i64() == Some(0) || n.as_i64() == Some(1) => {
            Ok((Some((n.as_i64() == Some(1)).to_string()), None))
        }
        (SettingType::Boolean, other) => Err(ServiceError::ValidationError(format!(
            "{} is not a boolean",
            other
        ))),
        (SettingType::String, Value::String(s)) => Ok((Some(s), None)),
        (SettingType::String, Value::Null) => Ok((None, None)),
        (SettingType::String, other) => Ok((Some(other.to_string()), None)),
        (SettingType::Json, other) => Ok((None, Some(other))),
    }
}

fn decode_value(model: &setting::Model) -> Value {
    match model.value_type.parse::<SettingType>() {
        Ok(SettingType::Boolean) => Value::Bool(model.value.as_deref() == Some("true")),
        Ok(SettingType::Json) => model.value_json.clone().unwrap_or(Value::Null),
        _ => model
            .value
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SettingResponse {
    pub id: i32,
    pub category: String,
    pub key: String,
    pub value: Value,
    pub value_type: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<setting::Model> for SettingResponse {
    fn from(model: setting::Model) -> Self {
        Self {
            value: decode_value(&model),
            id: model.id,
            category: model.category,
            key: model.key,
            value_type: model.value_type,
            description: model.description,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpsertSettingRequest {
    #[validate(length(min = 1, max = 64, message = "Category is required"))]
    pub category: String,
    #[validate(length(min = 1, max = 128, message = "Key is required"))]
    pub key: String,
    pub value: Value,
    /// `string`, `boolean` or `json`; inferred from the value when omitted
    pub value_type: Option<String>,
    pub description: Option<String>,
}

async fn find_setting<C: ConnectionTrait>(
    db: &C,
    category: &str,
    key: &str,
) -> Result<Option<setting::Model>, ServiceError> {
    Ok(setting::Entity::find()
        .filter(setting::Column::Category.eq(category))
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?)
}

/// Validates, coerces and stores one setting on the given connection.
async fn write_setting<C: ConnectionTrait>(
    db: &C,
    request: UpsertSettingRequest,
) -> Result<setting::Model, ServiceError> {
    request.validate()?;
    let existing = find_setting(db, &request.category, &request.key).await?;

    let kind = match request.value_type.as_deref() {
        Some(raw) => raw
            .parse::<SettingType>()
            .map_err(|_| ServiceError::ValidationError(format!("Unknown setting type '{}'", raw)))?,
        None => existing
            .as_ref()
            .and_then(|m| m.value_type.parse().ok())
            .unwrap_or_else(|| SettingType::infer(&request.value)),
    };
    let (value, value_json) = encode_value(kind, request.value)?;

    let model = match existing {
        Some(model) => {
            let mut active: setting::ActiveModel = model.into();
            active.value = Set(value);
            active.value_json = Set(value_json);
            active.value_type = Set(kind.to_string());
            if let Some(description) = request.description {
                active.description = Set(Some(description));
            }
            active.update(db).await?
        }
        None => {
            info!(category = %request.category, key = %request.key, "Creating missing setting");
            setting::ActiveModel {
                category: Set(request.category),
                key: Set(request.key),
                value: Set(value),
                value_json: Set(value_json),
                value_type: Set(kind.to_string()),
                description: Set(request.description),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };
    Ok(model)
}

/// Key/value configuration grouped by category
#[derive(Clone)]
pub struct SettingsService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SettingsService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_settings(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<SettingResponse>, ServiceError> {
        let mut select = setting::Entity::find()
            .order_by_asc(setting::Column::Category)
            .order_by_asc(setting::Column::Key);
        if let Some(category) = category {
            select = select.filter(setting::Column::Category.eq(category));
        }
        Ok(select
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(SettingResponse::from)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_setting(&self, category: &str, key: &str) -> Result<SettingResponse, ServiceError> {
        self.find(category, key)
            .await?
            .map(SettingResponse::from)
            .ok_or_else(|| ServiceError::NotFound(format!("Setting {}.{} not found", category, key)))
    }

    /// Writes a setting, creating it in the given category when missing.
    #[instrument(skip(self, request), fields(category = %request.category, key = %request.key))]
    pub async fn upsert_setting(
        &self,
        request: UpsertSettingRequest,
    ) -> Result<SettingResponse, ServiceError> {
        let model = write_setting(&*self.db_pool, request).await?;
        self.announce(&model).await;
        Ok(SettingResponse::from(model))
    }

    /// Writes several keys of one category in a single transaction: either
    /// every value is stored or none is.
    #[instrument(skip(self, values), fields(count = values.len()))]
    pub async fn update_category(
        &self,
        category: &str,
        values: BTreeMap<String, Value>,
    ) -> Result<Vec<SettingResponse>, ServiceError> {
        if values.is_empty() {
            return Err(ServiceError::ValidationError("No settings supplied".into()));
        }

        let txn = self.db_pool.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin transaction");
            ServiceError::DatabaseError(e)
        })?;
        let mut written = Vec::with_capacity(values.len());
        for (key, value) in values {
            let request = UpsertSettingRequest {
                category: category.to_string(),
                key,
                value,
                value_type: None,
                description: None,
            };
            // Dropping the transaction on error rolls back earlier keys
            written.push(write_setting(&txn, request).await?);
        }
        txn.commit().await.map_err(|e| {
            error!(error = %e, category, "Failed to commit settings");
            ServiceError::DatabaseError(e)
        })?;

        info!(category, count = written.len(), "Settings category updated");
        for model in &written {
            self.announce(model).await;
        }
        Ok(written.into_iter().map(SettingResponse::from).collect())
    }

    async fn announce(&self, model: &setting::Model) {
        self.event_sender
            .send_or_log(Event::SettingChanged {
                category: model.category.clone(),
                key: model.key.clone(),
                at: model.updated_at,
            })
            .await;
    }

    async fn find(&self, category: &str, key: &str) -> Result<Option<setting::Model>, ServiceError> {
        find_setting(&*self.db_pool, category, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn stored(kind: SettingType, value: Value) -> setting::Model {
        let (value, value_json) = encode_value(kind, value).unwrap();
        setting::Model {
            id: 1,
            category: "notifications".into(),
            key: "k".into(),
            value,
            value_json,
            value_type: kind.to_string(),
            description: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn boolean_coercion() {
        assert_eq!(decode_value(&stored(SettingType::Boolean, json!("TAK"))), json!(true));
        assert_eq!(decode_value(&stored(SettingType::Boolean, json!(0))), json!(false));
        assert_matches!(
            encode_value(SettingType::Boolean, json!("maybe")),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn json_and_string_values() {
        let hours = json!({"from": "08:00", "to": "20:00"});
        assert_eq!(decode_value(&stored(SettingType::Json, hours.clone())), hours);
        assert_eq!(decode_value(&stored(SettingType::String, json!(42))), json!("42"));
        assert_eq!(SettingType::infer(&json!(false)), SettingType::Boolean);
        assert_eq!(SettingType::infer(&json!([1, 2])), SettingType::Json);
    }
}
