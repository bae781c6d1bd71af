/*!
 * # Order Access Rules
 *
 * Assignment-based authorization on a single order. Evaluated against the
 * current user and the current row on every call; nothing here is cached.
 */

use super::AuthUser;
use crate::entities::order;
use crate::models::UserRole;
use serde::Serialize;
use utoipa::ToSchema;

/// The parts of an order that decide who may touch it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderParties {
    pub store_id: Option<i32>,
    pub company_id: Option<i32>,
    pub installer_id: Option<i32>,
    pub transporter_id: Option<i32>,
}

impl From<&order::Model> for OrderParties {
    fn from(order: &order::Model) -> Self {
        Self {
            store_id: order.store_id,
            company_id: order.company_id,
            installer_id: order.installer_id,
            transporter_id: order.transporter_id,
        }
    }
}

/// A company account whose company is the one assigned to the order.
pub fn is_company_member(user: &AuthUser, parties: &OrderParties) -> bool {
    user.role() == UserRole::Company
        && parties.company_id.is_some()
        && user.company_id() == parties.company_id
}

fn is_assigned_installer(user: &AuthUser, parties: &OrderParties) -> bool {
    parties.installer_id == Some(user.user_id)
}

fn is_assigned_transporter(user: &AuthUser, parties: &OrderParties) -> bool {
    parties.transporter_id == Some(user.user_id)
}

pub fn can_read(user: &AuthUser, parties: &OrderParties) -> bool {
    matches!(user.role(), UserRole::Admin | UserRole::Worker)
        || is_company_member(user, parties)
        || is_assigned_installer(user, parties)
        || is_assigned_transporter(user, parties)
}

/// Descriptive fields and financial flags.
pub fn can_edit(user: &AuthUser, parties: &OrderParties) -> bool {
    matches!(user.role(), UserRole::Admin | UserRole::Worker) || is_company_member(user, parties)
}

pub fn can_change_installation_status(user: &AuthUser, parties: &OrderParties) -> bool {
    can_edit(user, parties) || is_assigned_installer(user, parties)
}

pub fn can_change_transport_status(user: &AuthUser, parties: &OrderParties) -> bool {
    can_edit(user, parties) || is_assigned_transporter(user, parties)
}

/// Installer, transporter and company assignment. Being assigned yourself
/// grants nothing here.
pub fn can_assign(user: &AuthUser, parties: &OrderParties) -> bool {
    can_edit(user, parties)
}

pub fn can_delete(user: &AuthUser) -> bool {
    user.is_admin()
}

/// What the caller may do with one order, served to clients so they can
/// hide controls they would be refused anyway.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct OrderPermissions {
    pub order_id: i32,
    pub can_read: bool,
    pub can_edit: bool,
    pub can_change_installation_status: bool,
    pub can_change_transport_status: bool,
    pub can_assign: bool,
    pub can_manage_complaint: bool,
    pub can_delete: bool,
}

impl OrderPermissions {
    pub fn evaluate(user: &AuthUser, order: &order::Model) -> Self {
        let parties = OrderParties::from(order);
        let installation = can_change_installation_status(user, &parties);
        Self {
            order_id: order.id,
            can_read: can_read(user, &parties),
            can_edit: can_edit(user, &parties),
            can_change_installation_status: installation,
            can_change_transport_status: order.with_transport
                && can_change_transport_status(user, &parties),
            can_assign: can_assign(user, &parties),
            can_manage_complaint: installation,
            can_delete: can_delete(user),
        }
    }
}

/// Which orders a list query returns for a given user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    All,
    Store(i32),
    Company(i32),
    AssignedTo(i32),
    Nothing,
}

impl ListScope {
    pub fn for_user(user: &AuthUser) -> Self {
        match user.role() {
            UserRole::Admin => Self::All,
            UserRole::Worker => user
                .profile
                .store_id()
                .map(Self::Store)
                .unwrap_or(Self::All),
            UserRole::Company => user.company_id().map(Self::Company).unwrap_or(Self::Nothing),
            UserRole::Installer => Self::AssignedTo(user.user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Capability, CompanyAccount, UserProfile};

    fn user(id: i32, profile: UserProfile) -> AuthUser {
        AuthUser {
            user_id: id,
            name: format!("user {id}"),
            email: format!("user{id}@example.com"),
            profile,
            token_id: String::new(),
        }
    }

    fn installer(id: i32, company_id: i32) -> AuthUser {
        user(
            id,
            UserProfile::Installer {
                company_id: Some(company_id),
                services: vec![Capability::DoorInstallation],
            },
        )
    }

    fn company(id: i32, company_id: i32) -> AuthUser {
        user(
            id,
            UserProfile::Company {
                company_id: Some(company_id),
                company_name: None,
                nip: None,
                company_address: None,
                services: vec![],
                account: CompanyAccount::Owner,
            },
        )
    }

    fn parties() -> OrderParties {
        OrderParties {
            store_id: Some(1),
            company_id: Some(2),
            installer_id: Some(9),
            transporter_id: Some(11),
        }
    }

    #[test]
    fn unassigned_installer_cannot_change_status() {
        let other = installer(7, 2);
        assert!(!can_change_installation_status(&other, &parties()));
        assert!(!can_read(&other, &parties()));

        let assigned = installer(9, 2);
        assert!(can_change_installation_status(&assigned, &parties()));
        assert!(!can_change_transport_status(&assigned, &parties()));
        assert!(!can_assign(&assigned, &parties()));
    }

    #[test]
    fn transporter_only_gets_transport_track() {
        let transporter = installer(11, 5);
        assert!(can_read(&transporter, &parties()));
        assert!(can_change_transport_status(&transporter, &parties()));
        assert!(!can_change_installation_status(&transporter, &parties()));
    }

    #[test]
    fn company_membership_follows_company_id() {
        assert!(can_assign(&company(20, 2), &parties()));
        assert!(!can_read(&company(21, 3), &parties()));

        let unassigned = OrderParties {
            company_id: None,
            ..parties()
        };
        let no_company = user(
            22,
            UserProfile::Company {
                company_id: None,
                company_name: None,
                nip: None,
                company_address: None,
                services: vec![],
                account: CompanyAccount::Owner,
            },
        );
        assert!(!is_company_member(&no_company, &unassigned));
    }

    #[test]
    fn only_admin_deletes() {
        assert!(can_delete(&user(1, UserProfile::Admin)));
        let worker = user(
            2,
            UserProfile::Worker {
                store_id: Some(1),
                position: None,
            },
        );
        assert!(!can_delete(&worker));
        assert!(can_edit(&worker, &parties()));
    }

    #[test]
    fn list_scope_per_role() {
        assert_eq!(ListScope::for_user(&user(1, UserProfile::Admin)), ListScope::All);
        assert_eq!(ListScope::for_user(&company(3, 2)), ListScope::Company(2));
        assert_eq!(ListScope::for_user(&installer(7, 2)), ListScope::AssignedTo(7));
        let worker = user(
            2,
            UserProfile::Worker {
                store_id: Some(4),
                position: None,
            },
        );
        assert_eq!(ListScope::for_user(&worker), ListScope::Store(4));
    }
}
