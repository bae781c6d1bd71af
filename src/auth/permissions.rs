/*!
 * # Permissions Module
 *
 * Coarse, role-level permissions. Assignment-based rules on individual
 * orders live in `order_access`.
 */

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const CREATE: &'static str = "create";
    pub const UPDATE: &'static str = "update";
    pub const DELETE: &'static str = "delete";
    pub const MANAGE: &'static str = "manage";
    pub const ALL: &'static str = "*";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const ORDERS: &'static str = "orders";
    pub const USERS: &'static str = "users";
    pub const INSTALLERS: &'static str = "installers";
    pub const STORES: &'static str = "stores";
    pub const COMPANIES: &'static str = "companies";
    pub const SETTINGS: &'static str = "settings";
    pub const SCHEDULE: &'static str = "schedule";
}

/// Common permission string constants for compile-time safety
pub mod consts {
    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_CREATE: &str = "orders:create";
    pub const ORDERS_UPDATE: &str = "orders:update";
    pub const ORDERS_DELETE: &str = "orders:delete";

    pub const USERS_MANAGE: &str = "users:manage";
    /// Company accounts manage the installers of their own company
    pub const INSTALLERS_MANAGE: &str = "installers:manage";

    pub const STORES_READ: &str = "stores:read";
    pub const STORES_MANAGE: &str = "stores:manage";

    pub const COMPANIES_READ: &str = "companies:read";
    pub const COMPANIES_MANAGE: &str = "companies:manage";

    pub const SETTINGS_READ: &str = "settings:read";
    pub const SETTINGS_MANAGE: &str = "settings:manage";

    pub const SCHEDULE_READ: &str = "schedule:read";
    pub const SCHEDULE_MANAGE: &str = "schedule:manage";
    pub const SCHEDULE_COMPLETE: &str = "schedule:complete";
}

/// Format a permission string
pub fn format_permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consts_match_formatted_permissions() {
        assert_eq!(
            format_permission(Resources::ORDERS, Actions::READ),
            consts::ORDERS_READ
        );
        assert_eq!(
            format_permission(Resources::SCHEDULE, Actions::MANAGE),
            consts::SCHEDULE_MANAGE
        );
        assert_eq!(
            format_permission(Resources::INSTALLERS, Actions::MANAGE),
            consts::INSTALLERS_MANAGE
        );
    }
}
