pub mod media_storage;
pub mod subscriptions;
pub mod users;
pub mod videos;
