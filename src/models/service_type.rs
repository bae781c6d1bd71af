use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown service '{0}'")]
pub struct UnknownService(pub String);

/// What the customer ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, ToSchema, strum::Display, strum::EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServiceType {
    DoorInstallation,
    FlooringInstallation,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoorInstallation => "door_installation",
            Self::FlooringInstallation => "flooring_installation",
        }
    }

    /// Minimum number of days between delivery and installation.
    ///
    /// Flooring has to acclimatize on site before it can be laid.
    pub fn min_days_after_transport(&self) -> i64 {
        match self {
            Self::DoorInstallation => 0,
            Self::FlooringInstallation => 2,
        }
    }

    /// The capability an installer needs to take this order.
    pub fn required_capability(&self) -> Capability {
        match self {
            Self::DoorInstallation => Capability::DoorInstallation,
            Self::FlooringInstallation => Capability::FlooringInstallation,
        }
    }
}

impl FromStr for ServiceType {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "door_installation" | "doors" | "door" | "montaz_drzwi" | "montaż_drzwi" => {
                Ok(Self::DoorInstallation)
            }
            "flooring_installation" | "flooring" | "floor" | "montaz_podlog"
            | "montaż_podłóg" => Ok(Self::FlooringInstallation),
            _ => Err(UnknownService(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for ServiceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A service an installer or company can perform.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    DoorInstallation,
    FlooringInstallation,
    Transport,
}

impl FromStr for Capability {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transport" => Ok(Self::Transport),
            other => other
                .parse::<ServiceType>()
                .map(|t| t.required_capability())
                .map_err(|_| UnknownService(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_short_names() {
        assert_eq!(
            "door_installation".parse::<ServiceType>().unwrap(),
            ServiceType::DoorInstallation
        );
        assert_eq!(
            "Flooring".parse::<ServiceType>().unwrap(),
            ServiceType::FlooringInstallation
        );
        assert!("plumbing".parse::<ServiceType>().is_err());
    }

    #[test]
    fn flooring_needs_two_days() {
        assert_eq!(ServiceType::FlooringInstallation.min_days_after_transport(), 2);
        assert_eq!(ServiceType::DoorInstallation.min_days_after_transport(), 0);
    }

    #[test]
    fn capability_parsing() {
        assert_eq!("transport".parse::<Capability>().unwrap(), Capability::Transport);
        assert_eq!(
            "doors".parse::<Capability>().unwrap(),
            Capability::DoorInstallation
        );
    }
}
