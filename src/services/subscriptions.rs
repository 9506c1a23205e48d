// src/services/subscriptions.rs
use serde::Serialize;
use uuid::Uuid;

use crate::db::models::UserSummary;
use crate::error::{internal_with, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionState {
    pub channel_id: Uuid,
    pub subscribed: bool,
}

async fn ensure_channel(state: &AppState, channel_id: Uuid) -> Result<(), ApiError> {
    state
        .users
        .find_by_id(channel_id)
        .await
        .map_err(internal_with("Failed to load channel"))?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;
    Ok(())
}

/// Subscribes `subscriber_id` to the channel, or unsubscribes when the edge
/// already exists.
pub async fn toggle_subscription(
    state: &AppState,
    subscriber_id: Uuid,
    channel_id: Uuid,
) -> Result<SubscriptionState, ApiError> {
    if subscriber_id == channel_id {
        return Err(ApiError::bad_request("You cannot subscribe to your own channel"));
    }
    ensure_channel(state, channel_id).await?;

    let existing = state
        .subscriptions
        .find(subscriber_id, channel_id)
        .await
        .map_err(internal_with("Failed to load subscription"))?;

    let subscribed = match existing {
        Some(subscription) => {
            state
                .subscriptions
                .delete(subscription.id)
                .await
                .map_err(internal_with("Failed to unsubscribe"))?;
            false
        }
        None => {
            state
                .subscriptions
                .create(subscriber_id, channel_id)
                .await
                .map_err(internal_with("Failed to subscribe"))?;
            true
        }
    };

    log::info!(
        "User {} {} channel {}",
        subscriber_id,
        if subscribed { "subscribed to" } else { "unsubscribed from" },
        channel_id
    );
    Ok(SubscriptionState {
        channel_id,
        subscribed,
    })
}

pub async fn channel_subscribers(
    state: &AppState,
    channel_id: Uuid,
) -> Result<Vec<UserSummary>, ApiError> {
    ensure_channel(state, channel_id).await?;
    state
        .subscriptions
        .subscribers_of(channel_id)
        .await
        .map_err(internal_with("Failed to fetch subscribers"))
}

pub async fn subscribed_channels(
    state: &AppState,
    subscriber_id: Uuid,
) -> Result<Vec<UserSummary>, ApiError> {
    ensure_channel(state, subscriber_id).await?;
    state
        .subscriptions
        .channels_of(subscriber_id)
        .await
        .map_err(internal_with("Failed to fetch subscribed channels"))
}
