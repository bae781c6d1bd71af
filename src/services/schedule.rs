use crate::{
    auth::{consts as perm, AuthUser},
    config::ScheduleConflictPolicy,
    db::DbPool,
    entities::{order, schedule_entry, user},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{schedule::week_range, TimeSlot, UserRole},
};
use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScheduleEntryResponse {
    pub id: i32,
    pub installer_id: i32,
    pub order_number: Option<String>,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "08-11")]
    pub time_slot: TimeSlot,
    pub notes: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<schedule_entry::Model> for ScheduleEntryResponse {
    type Error = ServiceError;

    fn try_from(model: schedule_entry::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            time_slot: parse_slot(&model.time_slot)?,
            id: model.id,
            installer_id: model.installer_id,
            order_number: model.order_number,
            date: model.date,
            notes: model.notes,
            completed: model.completed,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScheduleQuery {
    /// Any day of the requested week; defaults to today
    pub week_start: Option<NaiveDate>,
    pub installer_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateScheduleEntryRequest {
    pub installer_id: i32,
    #[validate(length(min = 1, message = "Order number cannot be empty"))]
    pub order_number: Option<String>,
    pub date: NaiveDate,
    #[schema(example = "08-11")]
    pub time_slot: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateScheduleEntryRequest {
    pub installer_id: Option<i32>,
    #[validate(length(min = 1, message = "Order number cannot be empty"))]
    pub order_number: Option<String>,
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub notes: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WeekSchedule {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub entries: Vec<ScheduleEntryResponse>,
}

fn parse_slot(raw: &str) -> Result<TimeSlot, ServiceError> {
    raw.parse().map_err(ServiceError::ValidationError)
}

/// Weekly installer board
#[derive(Clone)]
pub struct ScheduleService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    conflict_policy: ScheduleConflictPolicy,
}

impl ScheduleService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        conflict_policy: ScheduleConflictPolicy,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            conflict_policy,
        }
    }

    /// Entries of the week containing `week_start`, ordered by date then slot.
    #[instrument(skip(self, viewer, query), fields(user_id = viewer.user_id))]
    pub async fn list_schedule(
        &self,
        viewer: &AuthUser,
        query: ScheduleQuery,
    ) -> Result<WeekSchedule, ServiceError> {
        viewer.require(perm::SCHEDULE_READ)?;
        let (monday, next_monday) =
            week_range(query.week_start.unwrap_or_else(|| Utc::now().date_naive()));

        let mut select = schedule_entry::Entity::find()
            .filter(schedule_entry::Column::Date.gte(monday))
            .filter(schedule_entry::Column::Date.lt(next_monday));

        // Installers only ever see their own row of the board.
        match viewer.role() {
            UserRole::Installer => {
                select = select.filter(schedule_entry::Column::InstallerId.eq(viewer.user_id));
            }
            UserRole::Company => {
                let installers = self.company_installer_ids(viewer).await?;
                select = select.filter(schedule_entry::Column::InstallerId.is_in(installers));
                if let Some(installer_id) = query.installer_id {
                    select = select.filter(schedule_entry::Column::InstallerId.eq(installer_id));
                }
            }
            UserRole::Admin | UserRole::Worker => {
                if let Some(installer_id) = query.installer_id {
                    select = select.filter(schedule_entry::Column::InstallerId.eq(installer_id));
                }
            }
        }

        let mut entries = select
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(ScheduleEntryResponse::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by(|a, b| (a.date, a.time_slot, a.id).cmp(&(b.date, b.time_slot, b.id)));

        Ok(WeekSchedule {
            week_start: monday,
            week_end: next_monday,
            entries,
        })
    }

    #[instrument(skip(self, viewer, request), fields(user_id = viewer.user_id, installer_id = request.installer_id))]
    pub async fn add_schedule_entry(
        &self,
        viewer: &AuthUser,
        request: CreateScheduleEntryRequest,
    ) -> Result<ScheduleEntryResponse, ServiceError> {
        viewer.require(perm::SCHEDULE_MANAGE)?;
        request.validate()?;
        let slot = parse_slot(&request.time_slot)?;
        self.ensure_installer(viewer, request.installer_id).await?;
        if let Some(number) = request.order_number.as_deref() {
            self.ensure_order_exists(number).await?;
        }
        self.check_conflict(request.installer_id, request.date, slot, None)
            .await?;

        let model = schedule_entry::ActiveModel {
            installer_id: Set(request.installer_id),
            order_number: Set(request.order_number),
            date: Set(request.date),
            time_slot: Set(slot.as_str().to_string()),
            notes: Set(request.notes),
            completed: Set(false),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(entry_id = model.id, date = %model.date, slot = %slot, "Schedule entry created");
        counter!("montaz_schedule.entries_created", 1);
        self.event_sender
            .send_or_log(Event::ScheduleEntryCreated {
                entry_id: model.id,
                installer_id: model.installer_id,
                date: model.date,
            })
            .await;
        ScheduleEntryResponse::try_from(model)
    }

    #[instrument(skip(self, viewer, request), fields(user_id = viewer.user_id))]
    pub async fn edit_schedule_entry(
        &self,
        viewer: &AuthUser,
        entry_id: i32,
        request: UpdateScheduleEntryRequest,
    ) -> Result<ScheduleEntryResponse, ServiceError> {
        viewer.require(perm::SCHEDULE_MANAGE)?;
        request.validate()?;
        let existing = self.find(entry_id).await?;
        self.ensure_installer(viewer, existing.installer_id).await?;

        let installer_id = request.installer_id.unwrap_or(existing.installer_id);
        if installer_id != existing.installer_id {
            self.ensure_installer(viewer, installer_id).await?;
        }
        let date = request.date.unwrap_or(existing.date);
        let slot = match request.time_slot.as_deref() {
            Some(raw) => parse_slot(raw)?,
            None => parse_slot(&existing.time_slot)?,
        };
        if let Some(number) = request.order_number.as_deref() {
            self.ensure_order_exists(number).await?;
        }
        self.check_conflict(installer_id, date, slot, Some(entry_id))
            .await?;

        let mut active: schedule_entry::ActiveModel = existing.into();
        active.installer_id = Set(installer_id);
        active.date = Set(date);
        active.time_slot = Set(slot.as_str().to_string());
        if let Some(number) = request.order_number {
            active.order_number = Set(Some(number));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(completed) = request.completed {
            active.completed = Set(completed);
        }

        let model = active.update(&*self.db_pool).await?;
        info!(entry_id, "Schedule entry updated");
        ScheduleEntryResponse::try_from(model)
    }

    /// Marks an entry done. Installers may only complete their own.
    #[instrument(skip(self, viewer), fields(user_id = viewer.user_id))]
    pub async fn complete_schedule_entry(
        &self,
        viewer: &AuthUser,
        entry_id: i32,
    ) -> Result<ScheduleEntryResponse, ServiceError> {
        viewer.require(perm::SCHEDULE_COMPLETE)?;
        let existing = self.find(entry_id).await?;

        match viewer.role() {
            UserRole::Installer if existing.installer_id != viewer.user_id => {
                return Err(ServiceError::Forbidden(format!(
                    "installer {} may not complete entry {} of installer {}",
                    viewer.user_id, entry_id, existing.installer_id
                )));
            }
            UserRole::Company => self.ensure_installer(viewer, existing.installer_id).await?,
            _ => {}
        }

        let mut active: schedule_entry::ActiveModel = existing.into();
        active.completed = Set(true);
        let model = active.update(&*self.db_pool).await?;

        info!(entry_id, "Schedule entry completed");
        self.event_sender
            .send_or_log(Event::ScheduleEntryCompleted(entry_id))
            .await;
        ScheduleEntryResponse::try_from(model)
    }

    #[instrument(skip(self, viewer), fields(user_id = viewer.user_id))]
    pub async fn delete_schedule_entry(&self, viewer: &AuthUser, entry_id: i32) -> Result<(), ServiceError> {
        viewer.require(perm::SCHEDULE_MANAGE)?;
        let existing = self.find(entry_id).await?;
        self.ensure_installer(viewer, existing.installer_id).await?;

        schedule_entry::Entity::delete_by_id(entry_id)
            .exec(&*self.db_pool)
            .await?;
        info!(entry_id, "Schedule entry deleted");
        Ok(())
    }

    /// Finds another entry occupying the same installer, day and slot and
    /// applies the configured policy.
    async fn check_conflict(
        &self,
        installer_id: i32,
        date: NaiveDate,
        slot: TimeSlot,
        exclude: Option<i32>,
    ) -> Result<(), ServiceError> {
        let mut select = schedule_entry::Entity::find()
            .filter(schedule_entry::Column::InstallerId.eq(installer_id))
            .filter(schedule_entry::Column::Date.eq(date))
            .filter(schedule_entry::Column::TimeSlot.eq(slot.as_str()));
        if let Some(id) = exclude {
            select = select.filter(schedule_entry::Column::Id.ne(id));
        }

        let Some(existing) = select.one(&*self.db_pool).await? else {
            return Ok(());
        };

        warn!(
            installer_id,
            %date,
            slot = %slot,
            existing_entry_id = existing.id,
            "installer double-booked"
        );
        counter!("montaz_schedule.conflicts", 1);
        self.event_sender
            .send_or_log(Event::ScheduleConflict {
                installer_id,
                date,
                time_slot: slot.to_string(),
                existing_entry_id: existing.id,
            })
            .await;

        match self.conflict_policy {
            ScheduleConflictPolicy::Log => Ok(()),
            ScheduleConflictPolicy::Reject => Err(ServiceError::Conflict(format!(
                "Installer {} is already booked on {} {}",
                installer_id, date, slot
            ))),
        }
    }

    /// The installer must exist and be able to install; company accounts
    /// are limited to their own installers.
    async fn ensure_installer(&self, viewer: &AuthUser, installer_id: i32) -> Result<(), ServiceError> {
        let installer = user::Entity::find_by_id(installer_id)
            .one(&*self.db_pool)
            .await?
            .filter(|m| m.profile().map(|p| p.can_install()).unwrap_or(false))
            .ok_or_else(|| ServiceError::NotFound(format!("Installer {} not found", installer_id)))?;

        if viewer.role() == UserRole::Company
            && (viewer.company_id().is_none() || installer.company_id != viewer.company_id())
        {
            return Err(ServiceError::Forbidden(format!(
                "installer {} does not belong to your company",
                installer_id
            )));
        }
        Ok(())
    }

    async fn ensure_order_exists(&self, order_number: &str) -> Result<(), ServiceError> {
        let found = order::Entity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .count(&*self.db_pool)
            .await?;
        if found == 0 {
            return Err(ServiceError::NotFound(format!("Order {} not found", order_number)));
        }
        Ok(())
    }

    async fn company_installer_ids(&self, viewer: &AuthUser) -> Result<Vec<i32>, ServiceError> {
        let Some(company_id) = viewer.company_id() else {
            return Ok(Vec::new());
        };
        Ok(user::Entity::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::CompanyId.eq(company_id))
            .into_tuple()
            .all(&*self.db_pool)
            .await?)
    }

    async fn find(&self, entry_id: i32) -> Result<schedule_entry::Model, ServiceError> {
        schedule_entry::Entity::find_by_id(entry_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Schedule entry {} not found", entry_id)))
    }
}
