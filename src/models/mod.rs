// Domain value types shared by entities, services and handlers
pub mod order_dates;
pub mod role;
pub mod schedule;
pub mod service_type;
pub mod status;

pub use order_dates::{check_date_ordering, DateOrderingViolation};
pub use role::{CompanyAccount, UserProfile, UserRole};
pub use schedule::TimeSlot;
pub use service_type::{Capability, ServiceType};
pub use status::{InstallationStatus, StatusTrack, TransportStatus, UnknownStatus};
