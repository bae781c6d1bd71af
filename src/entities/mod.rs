pub mod company;
pub mod company_store;
pub mod order;
pub mod schedule_entry;
pub mod setting;
pub mod store;
pub mod user;
