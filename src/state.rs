use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::db::repository::{
    SubscriptionRepository, UserRepository, VideoRepository, ViewRepository,
};
use crate::db::{
    DbPool, PgSubscriptionRepository, PgUserRepository, PgVideoRepository, PgViewRepository,
};
use crate::services::media_storage::{LocalMediaStorage, MediaStorage};

/// Handles shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub videos: Arc<dyn VideoRepository>,
    pub views: Arc<dyn ViewRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub storage: Arc<dyn MediaStorage>,
    pub tokens: Arc<TokenService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn postgres(pool: DbPool, config: Arc<AppConfig>) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            videos: Arc::new(PgVideoRepository::new(pool.clone())),
            views: Arc::new(PgViewRepository::new(pool.clone())),
            subscriptions: Arc::new(PgSubscriptionRepository::new(pool)),
            storage: Arc::new(LocalMediaStorage::new(&config.storage, &config.media)),
            tokens: Arc::new(TokenService::new(&config.auth)),
            config,
        }
    }
}
