use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::api::shared::ApiResponse;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::services::subscriptions;
use crate::state::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/subscriptions")
            .route("/c/{channel_id}", web::post().to(toggle_subscription))
            .route("/c/{channel_id}", web::get().to(channel_subscribers))
            .route("/u/{subscriber_id}", web::get().to(subscribed_channels)),
    );
}

pub async fn toggle_subscription(
    current: CurrentUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let result = subscriptions::toggle_subscription(&state, current.0.id, path.into_inner()).await?;
    let message = if result.subscribed {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };
    Ok(ApiResponse::ok(result, message))
}

pub async fn channel_subscribers(
    _current: CurrentUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let subscribers = subscriptions::channel_subscribers(&state, path.into_inner()).await?;
    Ok(ApiResponse::ok(subscribers, "Subscribers fetched successfully"))
}

pub async fn subscribed_channels(
    _current: CurrentUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let channels = subscriptions::subscribed_channels(&state, path.into_inner()).await?;
    Ok(ApiResponse::ok(channels, "Subscribed channels fetched successfully"))
}
