// src/api/mod.rs
pub mod health;
pub mod shared;
pub mod subscriptions;
pub mod upload;
pub mod users;
pub mod videos;

use actix_web::web;

use crate::error::ApiError;

const JSON_LIMIT: usize = 16 * 1024;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_LIMIT)
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .service(
        web::scope("/api/v1")
            .configure(users::configure)
            .configure(videos::configure)
            .configure(subscriptions::configure)
            .configure(health::configure),
    );
}
