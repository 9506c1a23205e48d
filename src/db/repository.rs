use async_trait::async_trait;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use crate::db::models::{
    ChannelProfile, NewUser, NewVideo, Page, Subscription, User, UserChangeset, UserSummary,
    Video, VideoChangeset, VideoDetail, VideoListItem, VideoListQuery, View, WatchHistoryEntry,
};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("database error: {0}")]
    Database(DieselError),
}

impl From<DieselError> for RepoError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => RepoError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                RepoError::Conflict(info.message().to_string())
            }
            other => RepoError::Database(other),
        }
    }
}

impl<E: std::fmt::Display> From<deadpool::managed::PoolError<E>> for RepoError {
    fn from(err: deadpool::managed::PoolError<E>) -> Self {
        RepoError::Pool(err.to_string())
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> RepoResult<User>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Matches a user whose username equals `username` or whose email equals `email`.
    async fn find_by_username_or_email(&self, username: &str, email: &str)
        -> RepoResult<Option<User>>;
    async fn update(&self, id: Uuid, changes: UserChangeset) -> RepoResult<User>;
    /// Subscriber counts for `user` and whether `viewer` subscribes to it.
    async fn channel_profile(&self, user: &User, viewer: Uuid) -> RepoResult<ChannelProfile>;
}

#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn create(&self, video: NewVideo) -> RepoResult<Video>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Video>>;
    async fn list(&self, query: &VideoListQuery) -> RepoResult<Page<VideoListItem>>;
    async fn find_detail(&self, id: Uuid, viewer: Uuid) -> RepoResult<Option<VideoDetail>>;
    async fn update(&self, id: Uuid, changes: VideoChangeset) -> RepoResult<Video>;
    /// Removes the video row together with every view recorded against it.
    async fn delete(&self, id: Uuid) -> RepoResult<()>;
}

#[async_trait]
pub trait ViewRepository: Send + Sync {
    /// Replaces any earlier view of `video_id` by `viewer_id` with a fresh one.
    async fn record(&self, video_id: Uuid, owner_id: Uuid, viewer_id: Uuid) -> RepoResult<View>;
    async fn history(&self, viewer_id: Uuid) -> RepoResult<Vec<WatchHistoryEntry>>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find(&self, subscriber_id: Uuid, channel_id: Uuid) -> RepoResult<Option<Subscription>>;
    async fn create(&self, subscriber_id: Uuid, channel_id: Uuid) -> RepoResult<Subscription>;
    async fn delete(&self, id: Uuid) -> RepoResult<()>;
    async fn subscribers_of(&self, channel_id: Uuid) -> RepoResult<Vec<UserSummary>>;
    async fn channels_of(&self, subscriber_id: Uuid) -> RepoResult<Vec<UserSummary>>;
}
