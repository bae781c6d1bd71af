//! Status transitions, assignments, financial flags and complaints.
//!
//! Every operation reloads the order, evaluates the caller against the
//! current row, persists, drops the cached copies and emits an event.

use crate::{
    auth::{order_access, AuthUser},
    cache::QueryCache,
    config::DateOrderingPolicy,
    db::DbPool,
    entities::order,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{Capability, InstallationStatus, StatusTrack, TransportStatus, UserRole},
    services::{
        companies::CompanyService,
        orders::{
            comments_of, enforce_date_ordering, load_order, photos_of, service_of, to_json,
            OrderResponse, StatusComment,
        },
        photos::{belongs_to_order, PhotoStore},
        users::UserService,
    },
};
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    /// Canonical value or a legacy label
    #[schema(example = "in_progress")]
    pub status: String,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignInstallerRequest {
    pub installer_id: i32,
    pub installation_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignTransporterRequest {
    pub transporter_id: i32,
    pub transport_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignCompanyRequest {
    pub company_id: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct FinancialFlagsRequest {
    pub documents_provided: Option<bool>,
    pub will_be_settled: Option<bool>,
    pub invoice_issued: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ComplaintRequest {
    #[validate(length(min = 1, max = 5000, message = "Complaint notes are required"))]
    pub notes: String,
    #[serde(default)]
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemovePhotoRequest {
    pub photo: String,
}

/// An uploaded file as received from a multipart form.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub data: Bytes,
}

fn forbidden(viewer: &AuthUser, action: &str, order_id: i32) -> ServiceError {
    ServiceError::Forbidden(format!(
        "{} {} may not {} of order {}",
        viewer.role(),
        viewer.user_id,
        action,
        order_id
    ))
}

fn comment_entry(
    viewer: &AuthUser,
    track: StatusTrack,
    status: &str,
    comment: Option<String>,
) -> Option<StatusComment> {
    let comment = comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())?;
    Some(StatusComment {
        at: Utc::now(),
        user_id: viewer.user_id,
        user_name: viewer.name.clone(),
        track,
        status: status.to_string(),
        comment,
    })
}

fn ensure_complaint_open(model: &order::Model) -> Result<(), ServiceError> {
    let status = InstallationStatus::normalize(&model.installation_status)
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    if status.is_complaint() {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(format!(
            "Order {} is not in complaint (installation status is {})",
            model.order_number, status
        )))
    }
}

/// Only references to this order's own uploads may be attached.
fn ensure_own_photos(order_id: i32, photos: &[String]) -> Result<(), ServiceError> {
    match photos
        .iter()
        .map(|p| p.trim())
        .find(|p| !p.is_empty() && !belongs_to_order(order_id, p))
    {
        Some(foreign) => Err(ServiceError::ValidationError(format!(
            "Photo {} was not uploaded for order {}",
            foreign, order_id
        ))),
        None => Ok(()),
    }
}

/// Appends references not already present, preserving order.
fn append_photos(existing: &mut Vec<String>, new: impl IntoIterator<Item = String>) -> usize {
    let before = existing.len();
    for photo in new {
        if !photo.trim().is_empty() && !existing.contains(&photo) {
            existing.push(photo);
        }
    }
    existing.len() - before
}

#[derive(Clone)]
pub struct OrderLifecycleService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    cache: QueryCache,
    date_policy: DateOrderingPolicy,
    users: Arc<UserService>,
    companies: Arc<CompanyService>,
    photos: Arc<dyn PhotoStore>,
}

impl OrderLifecycleService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        cache: QueryCache,
        date_policy: DateOrderingPolicy,
        users: Arc<UserService>,
        companies: Arc<CompanyService>,
        photos: Arc<dyn PhotoStore>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            cache,
            date_policy,
            users,
            companies,
            photos,
        }
    }

    #[instrument(skip(self, viewer, request), fields(user_id = viewer.user_id))]
    pub async fn update_installation_status(
        &self,
        viewer: &AuthUser,
        order_id: i32,
        request: UpdateStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        let existing = load_order(&self.db_pool, order_id).await?;
        let to = InstallationStatus::normalize(&request.status)
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if !order_access::can_change_installation_status(viewer, &(&existing).into()) {
            return Err(forbidden(viewer, "change installation status", order_id));
        }
        let from = InstallationStatus::normalize(&existing.installation_status)
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let mut comments = comments_of(&existing);
        let mut active: order::ActiveModel = existing.into();
        active.installation_status = Set(to.as_str().to_string());
        if let Some(entry) = comment_entry(viewer, StatusTrack::Installation, to.as_str(), request.comment) {
            comments.push(entry);
            active.comments = Set(to_json(&comments)?);
        }

        let model = self.save(active, order_id).await?;
        info!(order_id, %from, %to, "Installation status changed");
        counter!("montaz_orders.status_transitions", 1, "track" => "installation");

        self.event_sender
            .send_or_log(Event::InstallationStatusChanged {
                order_id,
                from,
                to,
                actor_id: viewer.user_id,
            })
            .await;
        OrderResponse::try_from(model)
    }

    #[instrument(skip(self, viewer, request), fields(user_id = viewer.user_id))]
    pub async fn update_transport_status(
        &self,
        viewer: &AuthUser,
        order_id: i32,
        request: UpdateStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        let existing = load_order(&self.db_pool, order_id).await?;
        let to = TransportStatus::normalize(&request.status)
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if !existing.with_transport {
            return Err(ServiceError::ValidationError(format!(
                "Order {} has no transport",
                existing.order_number
            )));
        }
        if !order_access::can_change_transport_status(viewer, &(&existing).into()) {
            return Err(forbidden(viewer, "change transport status", order_id));
        }
        let from = existing
            .transport_status
            .as_deref()
            .and_then(|raw| TransportStatus::normalize(raw).ok());

        let mut comments = comments_of(&existing);
        let mut active: order::ActiveModel = existing.into();
        active.transport_status = Set(Some(to.as_str().to_string()));
        if let Some(entry) = comment_entry(viewer, StatusTrack::Transport, to.as_str(), request.comment) {
            comments.push(entry);
            active.comments = Set(to_json(&comments)?);
        }

        let model = self.save(active, order_id).await?;
        info!(order_id, %to, "Transport status changed");
        counter!("montaz_orders.status_transitions", 1, "track" => "transport");

        self.event_sender
            .send_or_log(Event::TransportStatusChanged {
                order_id,
                from,
                to,
                actor_id: viewer.user_id,
            })
            .await;
        OrderResponse::try_from(model)
    }

    /// Assigns an installer, optionally with a date. A dated assignment
    /// moves a `new` order to `scheduled`.
    #[instrument(skip(self, viewer, request), fields(user_id = viewer.user_id, installer_id = request.installer_id))]
    pub async fn assign_installer(
        &self,
        viewer: &AuthUser,
        order_id: i32,
        request: AssignInstallerRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let existing = load_order(&self.db_pool, order_id).await?;
        if !order_access::can_assign(viewer, &(&existing).into()) {
            return Err(forbidden(viewer, "assign the installer", order_id));
        }
        let service = service_of(&existing)?;
        let installer = self
            .users
            .find_capable(request.installer_id, service.required_capability())
            .await?;
        if viewer.role() == UserRole::Company && installer.company_id != viewer.company_id() {
            return Err(ServiceError::Forbidden(format!(
                "installer {} does not belong to your company",
                installer.id
            )));
        }

        let installation_date = request.installation_date.or(existing.installation_date);
        let transport_date = existing.transport_date.filter(|_| existing.with_transport);
        enforce_date_ordering(
            self.date_policy,
            &existing.order_number,
            service,
            transport_date,
            installation_date,
        )?;

        let promote = request.installation_date.is_some()
            && InstallationStatus::normalize(&existing.installation_status).ok()
                == Some(InstallationStatus::New);

        let mut active: order::ActiveModel = existing.into();
        active.installer_id = Set(Some(installer.id));
        active.installation_date = Set(installation_date);
        if promote {
            active.installation_status = Set(InstallationStatus::Scheduled.as_str().to_string());
        }

        let model = self.save(active, order_id).await?;
        info!(order_id, installer_id = installer.id, "Installer assigned");
        counter!("montaz_orders.assignments", 1, "kind" => "installer");

        self.event_sender
            .send_or_log(Event::InstallerAssigned {
                order_id,
                installer_id: installer.id,
                installation_date,
            })
            .await;
        OrderResponse::try_from(model)
    }

    /// Symmetric to [`Self::assign_installer`] on the transport track.
    #[instrument(skip(self, viewer, request), fields(user_id = viewer.user_id, transporter_id = request.transporter_id))]
    pub async fn assign_transporter(
        &self,
        viewer: &AuthUser,
        order_id: i32,
        request: AssignTransporterRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let existing = load_order(&self.db_pool, order_id).await?;
        if !existing.with_transport {
            return Err(ServiceError::ValidationError(format!(
                "Order {} has no transport",
                existing.order_number
            )));
        }
        if !order_access::can_assign(viewer, &(&existing).into()) {
            return Err(forbidden(viewer, "assign the transporter", order_id));
        }
        let transporter = self
            .users
            .find_capable(request.transporter_id, Capability::Transport)
            .await?;
        if viewer.role() == UserRole::Company && transporter.company_id != viewer.company_id() {
            return Err(ServiceError::Forbidden(format!(
                "transporter {} does not belong to your company",
                transporter.id
            )));
        }

        let service = service_of(&existing)?;
        let transport_date = request.transport_date.or(existing.transport_date);
        enforce_date_ordering(
            self.date_policy,
            &existing.order_number,
            service,
            transport_date,
            existing.installation_date,
        )?;

        let promote = request.transport_date.is_some()
            && existing
                .transport_status
                .as_deref()
                .and_then(|raw| TransportStatus::normalize(raw).ok())
                .map_or(true, |s| s == TransportStatus::Assembled);

        let mut active: order::ActiveModel = existing.into();
        active.transporter_id = Set(Some(transporter.id));
        active.transport_date = Set(transport_date);
        if promote {
            active.transport_status = Set(Some(TransportStatus::Scheduled.as_str().to_string()));
        }

        let model = self.save(active, order_id).await?;
        info!(order_id, transporter_id = transporter.id, "Transporter assigned");
        counter!("montaz_orders.assignments", 1, "kind" => "transporter");

        self.event_sender
            .send_or_log(Event::TransporterAssigned {
                order_id,
                transporter_id: transporter.id,
                transport_date,
            })
            .await;
        OrderResponse::try_from(model)
    }

    /// Hands the order to a company serving its store. Changing company
    /// drops the installer assignment.
    #[instrument(skip(self, viewer, request), fields(user_id = viewer.user_id, company_id = request.company_id))]
    pub async fn assign_company(
        &self,
        viewer: &AuthUser,
        order_id: i32,
        request: AssignCompanyRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let existing = load_order(&self.db_pool, order_id).await?;
        if !order_access::can_assign(viewer, &(&existing).into()) {
            return Err(forbidden(viewer, "assign the company", order_id));
        }
        let company = self.companies.get_company(request.company_id).await?;
        if let Some(store_id) = existing.store_id {
            if !self.companies.serves_store(company.id, store_id).await? {
                return Err(ServiceError::ValidationError(format!(
                    "Company {} does not serve store {}",
                    company.name,
                    existing.store_name.as_deref().unwrap_or("of this order")
                )));
            }
        }

        let changed = existing.company_id != Some(company.id);
        let mut active: order::ActiveModel = existing.into();
        active.company_id = Set(Some(company.id));
        active.company_name = Set(Some(company.name.clone()));
        if changed {
            active.installer_id = Set(None);
        }

        let model = self.save(active, order_id).await?;
        info!(order_id, company_id = company.id, changed, "Company assigned");
        counter!("montaz_orders.assignments", 1, "kind" => "company");

        self.event_sender
            .send_or_log(Event::CompanyAssigned {
                order_id,
                company_id: company.id,
            })
            .await;
        OrderResponse::try_from(model)
    }

    #[instrument(skip(self, viewer, request), fields(user_id = viewer.user_id))]
    pub async fn update_financial_flags(
        &self,
        viewer: &AuthUser,
        order_id: i32,
        request: FinancialFlagsRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let existing = load_order(&self.db_pool, order_id).await?;
        if !order_access::can_edit(viewer, &(&existing).into()) {
            return Err(forbidden(viewer, "edit the financial status", order_id));
        }

        let mut active: order::ActiveModel = existing.into();
        if let Some(v) = request.documents_provided {
            active.documents_provided = Set(v);
        }
        if let Some(v) = request.will_be_settled {
            active.will_be_settled = Set(v);
        }
        if let Some(v) = request.invoice_issued {
            active.invoice_issued = Set(v);
        }

        let model = self.save(active, order_id).await?;
        info!(order_id, "Financial flags updated");
        self.event_sender
            .send_or_log(Event::FinancialFlagsUpdated(order_id))
            .await;
        OrderResponse::try_from(model)
    }

    /// Replaces the complaint notes and appends photo references. Only while
    /// the order is in complaint.
    #[instrument(skip(self, viewer, request), fields(user_id = viewer.user_id))]
    pub async fn record_complaint(
        &self,
        viewer: &AuthUser,
        order_id: i32,
        request: ComplaintRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        let existing = self.load_for_complaint(viewer, order_id).await?;
        ensure_own_photos(order_id, &request.photos)?;

        let mut photos = photos_of(&existing);
        append_photos(&mut photos, request.photos.into_iter().map(|p| p.trim().to_string()));
        let photo_count = photos.len();

        let mut active: order::ActiveModel = existing.into();
        active.complaint_notes = Set(Some(request.notes.trim().to_string()));
        active.complaint_photos = Set(to_json(&photos)?);

        let model = self.save(active, order_id).await?;
        info!(order_id, photo_count, "Complaint recorded");
        counter!("montaz_orders.complaints_recorded", 1);

        self.event_sender
            .send_or_log(Event::ComplaintRecorded {
                order_id,
                photo_count,
            })
            .await;
        OrderResponse::try_from(model)
    }

    /// Stores the files, then appends their references.
    #[instrument(skip(self, viewer, uploads), fields(user_id = viewer.user_id, files = uploads.len()))]
    pub async fn upload_complaint_photos(
        &self,
        viewer: &AuthUser,
        order_id: i32,
        uploads: Vec<PhotoUpload>,
    ) -> Result<OrderResponse, ServiceError> {
        if uploads.is_empty() {
            return Err(ServiceError::ValidationError("No photos uploaded".into()));
        }
        let existing = self.load_for_complaint(viewer, order_id).await?;

        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            stored.push(
                self.photos
                    .store(order_id, &upload.file_name, upload.data)
                    .await?,
            );
        }

        let mut photos = photos_of(&existing);
        let added = append_photos(&mut photos, stored);
        let photo_count = photos.len();

        let mut active: order::ActiveModel = existing.into();
        active.complaint_photos = Set(to_json(&photos)?);
        let model = self.save(active, order_id).await?;

        info!(order_id, added, "Complaint photos uploaded");
        self.event_sender
            .send_or_log(Event::ComplaintRecorded {
                order_id,
                photo_count,
            })
            .await;
        OrderResponse::try_from(model)
    }

    #[instrument(skip(self, viewer), fields(user_id = viewer.user_id))]
    pub async fn remove_complaint_photo(
        &self,
        viewer: &AuthUser,
        order_id: i32,
        photo: &str,
    ) -> Result<OrderResponse, ServiceError> {
        let existing = self.load_for_complaint(viewer, order_id).await?;

        let mut photos = photos_of(&existing);
        let Some(index) = photos.iter().position(|p| p == photo) else {
            return Err(ServiceError::NotFound(format!(
                "Photo {} is not attached to order {}",
                photo, existing.order_number
            )));
        };
        let removed = photos.remove(index);

        let mut active: order::ActiveModel = existing.into();
        active.complaint_photos = Set(to_json(&photos)?);
        let model = self.save(active, order_id).await?;

        if let Err(e) = self.photos.remove(order_id, &removed).await {
            warn!(error = %e, order_id, "stored photo could not be deleted");
        }
        info!(order_id, "Complaint photo removed");
        self.event_sender
            .send_or_log(Event::ComplaintPhotoRemoved {
                order_id,
                photo: removed,
            })
            .await;
        OrderResponse::try_from(model)
    }

    async fn load_for_complaint(
        &self,
        viewer: &AuthUser,
        order_id: i32,
    ) -> Result<order::Model, ServiceError> {
        let existing = load_order(&self.db_pool, order_id).await?;
        if !order_access::can_change_installation_status(viewer, &(&existing).into()) {
            return Err(forbidden(viewer, "manage the complaint", order_id));
        }
        ensure_complaint_open(&existing)?;
        Ok(existing)
    }

    async fn save(&self, active: order::ActiveModel, order_id: i32) -> Result<order::Model, ServiceError> {
        let model = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, order_id, "Failed to update order");
            ServiceError::DatabaseError(e)
        })?;
        if let Err(e) = self.cache.invalidate_order(order_id).await {
            warn!(error = %e, order_id, "order cache invalidation failed");
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use assert_matches::assert_matches;

    fn viewer() -> AuthUser {
        AuthUser {
            user_id: 3,
            name: "Anna".into(),
            email: "anna@example.com".into(),
            profile: UserProfile::Admin,
            token_id: String::new(),
        }
    }

    #[test]
    fn empty_comments_are_not_recorded() {
        assert!(comment_entry(&viewer(), StatusTrack::Installation, "new", None).is_none());
        assert!(comment_entry(&viewer(), StatusTrack::Installation, "new", Some("  ".into())).is_none());
        let entry =
            comment_entry(&viewer(), StatusTrack::Transport, "delivered", Some(" ok ".into())).unwrap();
        assert_eq!(entry.comment, "ok");
        assert_eq!(entry.user_id, 3);
    }

    #[test]
    fn complaints_attach_only_own_uploads() {
        assert!(ensure_own_photos(4, &["/uploads/orders/4/a.jpg".into(), " ".into()]).is_ok());
        assert_matches!(
            ensure_own_photos(4, &["/uploads/orders/5/a.jpg".into()]),
            Err(ServiceError::ValidationError(_))
        );
        assert!(ensure_own_photos(4, &["../orders/5/a.jpg".into()]).is_err());
    }

    #[test]
    fn photos_append_without_duplicates() {
        let mut photos = vec!["/uploads/a.jpg".to_string()];
        let added = append_photos(
            &mut photos,
            vec!["/uploads/a.jpg".into(), "/uploads/b.jpg".into(), "".into()],
        );
        assert_eq!(added, 1);
        assert_eq!(photos, vec!["/uploads/a.jpg", "/uploads/b.jpg"]);
    }
}
