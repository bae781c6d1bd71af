use super::service_type::{Capability, ServiceType};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UserRole {
    Admin,
    Worker,
    Company,
    Installer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Worker => "worker",
            Self::Company => "company",
            Self::Installer => "installer",
        }
    }
}

/// Whether a company account only manages or also does installations itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompanyAccount {
    #[default]
    Owner,
    OwnerAndInstaller,
}

impl CompanyAccount {
    /// Maps the stored `company_owner_only` column.
    pub fn from_owner_only(owner_only: bool) -> Self {
        if owner_only {
            Self::Owner
        } else {
            Self::OwnerAndInstaller
        }
    }

    pub fn owner_only(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

/// Role-specific attributes of a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum UserProfile {
    Admin,
    Worker {
        store_id: Option<i32>,
        position: Option<String>,
    },
    Company {
        company_id: Option<i32>,
        company_name: Option<String>,
        nip: Option<String>,
        company_address: Option<String>,
        services: Vec<Capability>,
        account: CompanyAccount,
    },
    Installer {
        company_id: Option<i32>,
        services: Vec<Capability>,
    },
}

impl UserProfile {
    pub fn role(&self) -> UserRole {
        match self {
            Self::Admin => UserRole::Admin,
            Self::Worker { .. } => UserRole::Worker,
            Self::Company { .. } => UserRole::Company,
            Self::Installer { .. } => UserRole::Installer,
        }
    }

    pub fn company_id(&self) -> Option<i32> {
        match self {
            Self::Company { company_id, .. } | Self::Installer { company_id, .. } => *company_id,
            _ => None,
        }
    }

    pub fn store_id(&self) -> Option<i32> {
        match self {
            Self::Worker { store_id, .. } => *store_id,
            _ => None,
        }
    }

    pub fn services(&self) -> &[Capability] {
        match self {
            Self::Company { services, .. } | Self::Installer { services, .. } => services,
            _ => &[],
        }
    }

    /// Installers always install; company accounts only when they also work on site.
    pub fn can_install(&self) -> bool {
        match self {
            Self::Installer { .. } => true,
            Self::Company { account, .. } => *account == CompanyAccount::OwnerAndInstaller,
            _ => false,
        }
    }

    pub fn can_install_service(&self, service: ServiceType) -> bool {
        self.can_install() && self.services().contains(&service.required_capability())
    }

    pub fn can_transport(&self) -> bool {
        self.can_install() && self.services().contains(&Capability::Transport)
    }
}

/// Parses the comma separated `services` column, skipping unknown entries.
pub fn parse_services(raw: Option<&str>) -> Vec<Capability> {
    raw.unwrap_or_default()
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| Capability::from_str(s).ok())
        .collect()
}

pub fn join_services(services: &[Capability]) -> String {
    services
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(account: CompanyAccount, services: Vec<Capability>) -> UserProfile {
        UserProfile::Company {
            company_id: Some(3),
            company_name: Some("Montaż-Bud".into()),
            nip: None,
            company_address: None,
            services,
            account,
        }
    }

    #[test]
    fn owner_only_company_cannot_install() {
        let owner = company(CompanyAccount::Owner, vec![Capability::DoorInstallation]);
        assert!(!owner.can_install());
        assert!(!owner.can_install_service(ServiceType::DoorInstallation));

        let working = company(
            CompanyAccount::OwnerAndInstaller,
            vec![Capability::DoorInstallation],
        );
        assert!(working.can_install_service(ServiceType::DoorInstallation));
        assert!(!working.can_install_service(ServiceType::FlooringInstallation));
    }

    #[test]
    fn transport_needs_capability() {
        let installer = UserProfile::Installer {
            company_id: Some(1),
            services: vec![Capability::FlooringInstallation, Capability::Transport],
        };
        assert!(installer.can_transport());
        assert!(!UserProfile::Admin.can_transport());
    }

    #[test]
    fn services_column_round_trip() {
        let parsed = parse_services(Some("door_installation, transport,unknown"));
        assert_eq!(parsed, vec![Capability::DoorInstallation, Capability::Transport]);
        assert_eq!(join_services(&parsed), "door_installation,transport");
        assert!(parse_services(None).is_empty());
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("Installer".parse::<UserRole>().unwrap(), UserRole::Installer);
        assert!("guest".parse::<UserRole>().is_err());
    }
}
