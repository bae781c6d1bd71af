//! Lifecycle status enums for the installation and transport tracks.
//!
//! Every status string that enters the system, whether from a request body
//! or a stored row, goes through [`InstallationStatus::normalize`] or
//! [`TransportStatus::normalize`]. Older clients and imported rows used
//! Polish UI labels and a few spelling variants; those are folded into the
//! canonical snake_case values here and nowhere else.

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {track} status '{value}'")]
pub struct UnknownStatus {
    pub track: &'static str,
    pub value: String,
}

/// Lowercases, trims and folds separators so `"W trakcie"`, `"in-progress"`
/// and `"IN_PROGRESS"` compare equal.
fn fold(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    ToSchema,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InstallationStatus {
    New,
    Scheduled,
    InProgress,
    Completed,
    Complaint,
}

impl InstallationStatus {
    pub fn normalize(raw: &str) -> Result<Self, UnknownStatus> {
        let status = match fold(raw).as_str() {
            "new" | "nowe" | "nowy" | "nowa" => Self::New,
            "scheduled" | "zaplanowane" | "zaplanowana" | "zaplanowany" => Self::Scheduled,
            "in_progress" | "inprogress" | "w_trakcie" | "w_realizacji" => Self::InProgress,
            "completed" | "done" | "zakończone" | "zakonczone" | "zakończona" | "zakonczona"
            | "zrealizowane" => Self::Completed,
            "complaint" | "reklamacja" => Self::Complaint,
            _ => {
                return Err(UnknownStatus {
                    track: "installation",
                    value: raw.to_string(),
                })
            }
        };
        Ok(status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Complaint => "complaint",
        }
    }

    pub fn is_complaint(&self) -> bool {
        matches!(self, Self::Complaint)
    }
}

impl FromStr for InstallationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl<'de> Deserialize<'de> for InstallationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::normalize(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    ToSchema,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransportStatus {
    Assembled,
    Scheduled,
    Delivered,
}

impl TransportStatus {
    pub fn normalize(raw: &str) -> Result<Self, UnknownStatus> {
        let status = match fold(raw).as_str() {
            "assembled" | "skompletowany" | "skompletowane" | "skompletowana" => Self::Assembled,
            "scheduled" | "zaplanowany" | "zaplanowane" | "transport_zaplanowany" => {
                Self::Scheduled
            }
            "delivered" | "dostarczony" | "dostarczono" | "dostarczone" => Self::Delivered,
            _ => {
                return Err(UnknownStatus {
                    track: "transport",
                    value: raw.to_string(),
                })
            }
        };
        Ok(status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assembled => "assembled",
            Self::Scheduled => "scheduled",
            Self::Delivered => "delivered",
        }
    }
}

impl FromStr for TransportStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl<'de> Deserialize<'de> for TransportStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::normalize(&raw).map_err(serde::de::Error::custom)
    }
}

/// Which track a comment or event refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusTrack {
    Installation,
    Transport,
    Financial,
    Complaint,
}
