/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Maps each of the four user roles to the coarse permissions it holds.
 */

use super::permissions::consts::*;
use crate::models::UserRole;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub role: UserRole,
    pub description: &'static str,
    pub permissions: Vec<&'static str>,
}

lazy_static! {
    pub static ref ROLES: HashMap<UserRole, Role> = {
        let mut roles = HashMap::new();

        roles.insert(
            UserRole::Admin,
            Role {
                role: UserRole::Admin,
                description: "Administrator with full access",
                permissions: vec!["*"],
            },
        );

        // Store staff place and coordinate orders
        roles.insert(
            UserRole::Worker,
            Role {
                role: UserRole::Worker,
                description: "Store worker placing and coordinating orders",
                permissions: vec![
                    ORDERS_READ,
                    ORDERS_CREATE,
                    ORDERS_UPDATE,
                    STORES_READ,
                    COMPANIES_READ,
                    SETTINGS_READ,
                    SCHEDULE_READ,
                    SCHEDULE_MANAGE,
                    SCHEDULE_COMPLETE,
                ],
            },
        );

        roles.insert(
            UserRole::Company,
            Role {
                role: UserRole::Company,
                description: "Installation company owner",
                permissions: vec![
                    ORDERS_READ,
                    ORDERS_UPDATE,
                    INSTALLERS_MANAGE,
                    STORES_READ,
                    COMPANIES_READ,
                    SETTINGS_READ,
                    SCHEDULE_READ,
                    SCHEDULE_MANAGE,
                    SCHEDULE_COMPLETE,
                ],
            },
        );

        roles.insert(
            UserRole::Installer,
            Role {
                role: UserRole::Installer,
                description: "Installer or transporter working on assigned orders",
                permissions: vec![ORDERS_READ, SETTINGS_READ, SCHEDULE_READ, SCHEDULE_COMPLETE],
            },
        );

        roles
    };
}

/// Check if a specific permission matches a required permission
pub fn check_permission(user_permission: &str, required_permission: &str) -> bool {
    if user_permission == "*" || user_permission == required_permission {
        return true;
    }

    if let Some(prefix) = user_permission.strip_suffix(":*") {
        return required_permission
            .split_once(':')
            .map(|(resource, _)| resource == prefix)
            .unwrap_or(false);
    }

    false
}

/// Whether `role` holds `permission`.
pub fn role_has_permission(role: UserRole, permission: &str) -> bool {
    ROLES
        .get(&role)
        .map(|r| r.permissions.iter().any(|p| check_permission(p, permission)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[test]
    fn every_role_is_defined() {
        for role in UserRole::iter() {
            assert!(ROLES.contains_key(&role), "missing role {role}");
        }
    }

    #[rstest]
    #[case(UserRole::Admin, STORES_MANAGE, true)]
    #[case(UserRole::Worker, ORDERS_CREATE, true)]
    #[case(UserRole::Worker, ORDERS_DELETE, false)]
    #[case(UserRole::Company, ORDERS_CREATE, false)]
    #[case(UserRole::Company, INSTALLERS_MANAGE, true)]
    #[case(UserRole::Installer, SCHEDULE_MANAGE, false)]
    #[case(UserRole::Installer, SCHEDULE_COMPLETE, true)]
    fn role_permissions(#[case] role: UserRole, #[case] permission: &str, #[case] expected: bool) {
        assert_eq!(role_has_permission(role, permission), expected);
    }

    #[test]
    fn wildcard_matches_resource_only() {
        assert!(check_permission("orders:*", "orders:delete"));
        assert!(!check_permission("orders:*", "ordersx:read"));
    }
}
