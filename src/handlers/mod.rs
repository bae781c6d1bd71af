pub mod auth;
pub mod common;
pub mod companies;
pub mod orders;
pub mod schedule;
pub mod settings;
pub mod stores;
pub mod users;
pub mod version;

use crate::cache::QueryCache;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    companies::CompanyService,
    order_lifecycle::OrderLifecycleService,
    orders::OrderService,
    photos::{LocalPhotoStore, PhotoStore},
    schedule::ScheduleService,
    settings::SettingsService,
    stores::StoreService,
    users::UserService,
};
use std::sync::Arc;

pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub lifecycle: Arc<OrderLifecycleService>,
    pub users: Arc<UserService>,
    pub stores: Arc<StoreService>,
    pub companies: Arc<CompanyService>,
    pub settings: Arc<SettingsService>,
    pub schedule: Arc<ScheduleService>,
}

impl AppServices {
    /// Wires every service with photos stored under the configured upload directory.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let photos: Arc<dyn PhotoStore> = Arc::new(LocalPhotoStore::new(
            config.upload_path(),
            config.max_upload_bytes,
        ));
        Self::with_photo_store(db_pool, event_sender, config, photos)
    }

    pub fn with_photo_store(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
        photos: Arc<dyn PhotoStore>,
    ) -> Self {
        let cache = QueryCache::in_memory(config.cache_ttl());

        let users = Arc::new(UserService::new(db_pool.clone()));
        let companies = Arc::new(CompanyService::new(db_pool.clone()));
        let orders = Arc::new(
            OrderService::new(
                db_pool.clone(),
                event_sender.clone(),
                cache.clone(),
                config.date_ordering_policy,
                photos.clone(),
            )
            .with_page_sizes(config.api_default_page_size, config.api_max_page_size),
        );
        let lifecycle = Arc::new(OrderLifecycleService::new(
            db_pool.clone(),
            event_sender.clone(),
            cache,
            config.date_ordering_policy,
            users.clone(),
            companies.clone(),
            photos,
        ));
        let stores = Arc::new(StoreService::new(db_pool.clone()));
        let settings = Arc::new(SettingsService::new(db_pool.clone(), event_sender.clone()));
        let schedule = Arc::new(ScheduleService::new(
            db_pool,
            event_sender,
            config.schedule_conflict_policy,
        ));

        Self {
            orders,
            lifecycle,
            users,
            stores,
            companies,
            settings,
            schedule,
        }
    }
}
