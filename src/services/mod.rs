// Orders and their lifecycle
pub mod order_lifecycle;
pub mod orders;
pub mod photos;

// Directory
pub mod companies;
pub mod stores;
pub mod users;

// Configuration and planning
pub mod schedule;
pub mod settings;
