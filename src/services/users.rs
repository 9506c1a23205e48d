// src/services/users.rs
use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::TokenPair;
use crate::db::models::{ChannelProfile, NewUser, User, UserChangeset, WatchHistoryEntry};
use crate::db::repository::RepoError;
use crate::error::{internal_with, ApiError};
use crate::services::media_storage::MediaKind;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct Registration {
    pub fullname: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

fn required(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn conflict_or_internal(message: &'static str) -> impl FnOnce(RepoError) -> ApiError {
    move |err| match err {
        RepoError::Conflict(_) => ApiError::conflict("User with email or username already exists"),
        other => internal_with(message)(other),
    }
}

pub async fn register(
    state: &AppState,
    registration: Registration,
    avatar: &Path,
    cover_image: Option<&Path>,
) -> Result<User, ApiError> {
    let (Some(fullname), Some(email), Some(username), Some(_)) = (
        required(&registration.fullname),
        required(&registration.email),
        required(&registration.username),
        required(&registration.password),
    ) else {
        return Err(ApiError::bad_request("All fields are required"));
    };
    let email = email.to_lowercase();
    let username = username.to_lowercase();

    let existing = state
        .users
        .find_by_username_or_email(&username, &email)
        .await
        .map_err(internal_with("Failed to check existing users"))?;
    if existing.is_some() {
        return Err(ApiError::conflict("User with email or username already exists"));
    }

    let avatar = state
        .storage
        .upload(avatar, MediaKind::Image)
        .await
        .map_err(internal_with("Failed to upload avatar"))?;
    let cover_image = match cover_image {
        Some(path) => Some(
            state
                .storage
                .upload(path, MediaKind::Image)
                .await
                .map_err(internal_with("Failed to upload cover image"))?
                .url,
        ),
        None => None,
    };

    let password_hash = hash_password(&registration.password)
        .await
        .map_err(internal_with("Failed to hash password"))?;

    let now = Utc::now().naive_utc();
    let user = state
        .users
        .create(NewUser {
            id: Uuid::new_v4(),
            username,
            email,
            fullname: fullname.to_string(),
            avatar: avatar.url,
            cover_image,
            password_hash,
            created_at: now,
            updated_at: now,
        })
        .await
        .map_err(conflict_or_internal("Failed to register user"))?;

    log::info!("Registered user {} ({})", user.username, user.id);
    Ok(user)
}

/// Issues a fresh token pair and stores the refresh token on the user row.
pub async fn issue_tokens(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    let pair = state
        .tokens
        .generate_pair(user)
        .map_err(internal_with("Failed to generate tokens"))?;

    state
        .users
        .update(
            user.id,
            UserChangeset {
                refresh_token: Some(Some(pair.refresh_token.clone())),
                ..Default::default()
            },
        )
        .await
        .map_err(internal_with("Failed to store refresh token"))?;

    Ok(pair)
}

/// `identifier` is matched against both username and email.
pub async fn login(
    state: &AppState,
    identifier: &str,
    password: &str,
) -> Result<(User, TokenPair), ApiError> {
    let identifier = required(identifier)
        .ok_or_else(|| ApiError::bad_request("Username or email is required"))?;

    let user = state
        .users
        .find_by_username_or_email(identifier, identifier)
        .await
        .map_err(internal_with("Failed to load user"))?
        .ok_or_else(|| ApiError::not_found("User does not exist"))?;

    let valid = verify_password(password, &user.password_hash)
        .await
        .map_err(internal_with("Failed to verify password"))?;
    if !valid {
        return Err(ApiError::unauthorized("Invalid user credentials"));
    }

    let tokens = issue_tokens(state, &user).await?;
    log::info!("User {} logged in", user.id);
    Ok((user, tokens))
}

pub async fn logout(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    state
        .users
        .update(
            user_id,
            UserChangeset {
                refresh_token: Some(None),
                ..Default::default()
            },
        )
        .await
        .map_err(internal_with("Failed to log out"))?;
    Ok(())
}

/// Rotates tokens. The presented refresh token must be the one last issued.
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<TokenPair, ApiError> {
    let claims = state.tokens.verify_refresh_token(refresh_token).map_err(|e| {
        log::debug!("Rejected refresh token: {}", e);
        ApiError::unauthorized("Invalid refresh token")
    })?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await
        .map_err(internal_with("Failed to load user"))?
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    if user.refresh_token.as_deref() != Some(refresh_token) {
        return Err(ApiError::unauthorized("Refresh token is expired or used"));
    }

    issue_tokens(state, &user).await
}

pub async fn change_password(
    state: &AppState,
    user: &User,
    old_password: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    if required(new_password).is_none() {
        return Err(ApiError::bad_request("New password is required"));
    }

    let valid = verify_password(old_password, &user.password_hash)
        .await
        .map_err(internal_with("Failed to verify password"))?;
    if !valid {
        return Err(ApiError::bad_request("Invalid old password"));
    }

    let password_hash = hash_password(new_password)
        .await
        .map_err(internal_with("Failed to hash password"))?;

    state
        .users
        .update(
            user.id,
            UserChangeset {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await
        .map_err(internal_with("Failed to change password"))?;

    log::info!("User {} changed password", user.id);
    Ok(())
}

/// Updates profile fields; the stored password hash is left as is.
pub async fn update_account(
    state: &AppState,
    user_id: Uuid,
    fullname: &str,
    email: &str,
) -> Result<User, ApiError> {
    let (Some(fullname), Some(email)) = (required(fullname), required(email)) else {
        return Err(ApiError::bad_request("All fields are required"));
    };

    state
        .users
        .update(
            user_id,
            UserChangeset {
                fullname: Some(fullname.to_string()),
                email: Some(email.to_lowercase()),
                ..Default::default()
            },
        )
        .await
        .map_err(conflict_or_internal("Failed to update account"))
}

pub async fn update_avatar(state: &AppState, user: &User, avatar: &Path) -> Result<User, ApiError> {
    let stored = state
        .storage
        .upload(avatar, MediaKind::Image)
        .await
        .map_err(internal_with("Failed to upload avatar"))?;

    let updated = state
        .users
        .update(
            user.id,
            UserChangeset {
                avatar: Some(stored.url),
                ..Default::default()
            },
        )
        .await
        .map_err(internal_with("Failed to update avatar"))?;

    // The new avatar is already live; a stale file is not worth failing for.
    if let Err(e) = state.storage.delete(&user.avatar).await {
        log::warn!("Failed to delete old avatar of {}: {}", user.id, e);
    }
    Ok(updated)
}

pub async fn update_cover_image(
    state: &AppState,
    user: &User,
    cover_image: &Path,
) -> Result<User, ApiError> {
    let stored = state
        .storage
        .upload(cover_image, MediaKind::Image)
        .await
        .map_err(internal_with("Failed to upload cover image"))?;

    let updated = state
        .users
        .update(
            user.id,
            UserChangeset {
                cover_image: Some(Some(stored.url)),
                ..Default::default()
            },
        )
        .await
        .map_err(internal_with("Failed to update cover image"))?;

    if let Some(old) = &user.cover_image {
        if let Err(e) = state.storage.delete(old).await {
            log::warn!("Failed to delete old cover image of {}: {}", user.id, e);
        }
    }
    Ok(updated)
}

pub async fn channel_profile(
    state: &AppState,
    username: &str,
    viewer: Uuid,
) -> Result<ChannelProfile, ApiError> {
    let username = required(username).ok_or_else(|| ApiError::bad_request("Username is missing"))?;

    let channel = state
        .users
        .find_by_username(username)
        .await
        .map_err(internal_with("Failed to load channel"))?
        .ok_or_else(|| ApiError::not_found("Channel does not exist"))?;

    state
        .users
        .channel_profile(&channel, viewer)
        .await
        .map_err(internal_with("Failed to load channel"))
}

pub async fn watch_history(
    state: &AppState,
    viewer: Uuid,
) -> Result<Vec<WatchHistoryEntry>, ApiError> {
    state
        .views
        .history(viewer)
        .await
        .map_err(internal_with("Failed to fetch watch history"))
}
