// src/services/videos.rs
use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use crate::db::models::{
    NewVideo, Page, User, Video, VideoChangeset, VideoDetail, VideoListItem, VideoListQuery,
};
use crate::error::{internal_with, ApiError};
use crate::services::media_storage::MediaKind;
use crate::state::AppState;

pub async fn list_videos(
    state: &AppState,
    query: &VideoListQuery,
) -> Result<Page<VideoListItem>, ApiError> {
    state
        .videos
        .list(query)
        .await
        .map_err(internal_with("Failed to fetch videos"))
}

pub async fn publish_video(
    state: &AppState,
    publisher: &User,
    title: &str,
    description: &str,
    video_file: &Path,
    thumbnail: &Path,
) -> Result<Video, ApiError> {
    let title = title.trim();
    let description = description.trim();
    if title.is_empty() || description.is_empty() {
        return Err(ApiError::bad_request("Title and description are required"));
    }

    let stored_video = state
        .storage
        .upload(video_file, MediaKind::Video)
        .await
        .map_err(internal_with("Failed to upload video file"))?;
    let duration = stored_video
        .duration
        .ok_or_else(|| ApiError::internal("Could not determine video duration"))?;

    let stored_thumbnail = state
        .storage
        .upload(thumbnail, MediaKind::Image)
        .await
        .map_err(internal_with("Failed to upload thumbnail"))?;

    let now = Utc::now().naive_utc();
    let video = state
        .videos
        .create(NewVideo {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.to_string(),
            duration,
            video_file: stored_video.url,
            thumbnail: stored_thumbnail.url,
            publisher_id: publisher.id,
            is_published: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .map_err(internal_with("Failed to save video"))?;

    log::info!("User {} published video {}", publisher.id, video.id);
    Ok(video)
}

/// Fetches a video for `viewer` and records the view. Unpublished videos are
/// only visible to their publisher.
pub async fn watch_video(
    state: &AppState,
    video_id: Uuid,
    viewer: Uuid,
) -> Result<VideoDetail, ApiError> {
    let detail = state
        .videos
        .find_detail(video_id, viewer)
        .await
        .map_err(internal_with("Failed to fetch video"))?
        .filter(|d| d.video.is_published || d.video.publisher_id == viewer)
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    state
        .views
        .record(video_id, detail.video.publisher_id, viewer)
        .await
        .map_err(internal_with("Failed to record view"))?;

    Ok(detail)
}

/// Loads a video that `user` is allowed to modify.
async fn owned_video(state: &AppState, video_id: Uuid, user: &User) -> Result<Video, ApiError> {
    let video = state
        .videos
        .find_by_id(video_id)
        .await
        .map_err(internal_with("Failed to fetch video"))?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    if video.publisher_id != user.id {
        return Err(ApiError::forbidden("You are not allowed to modify this video"));
    }
    Ok(video)
}

async fn apply_changes(
    state: &AppState,
    video_id: Uuid,
    changes: VideoChangeset,
) -> Result<Video, ApiError> {
    state
        .videos
        .update(video_id, changes)
        .await
        .map_err(internal_with("Failed to update video"))
}

pub async fn replace_video_file(
    state: &AppState,
    video_id: Uuid,
    user: &User,
    video_file: &Path,
) -> Result<Video, ApiError> {
    let video = owned_video(state, video_id, user).await?;

    let stored = state
        .storage
        .upload(video_file, MediaKind::Video)
        .await
        .map_err(internal_with("Failed to upload video file"))?;
    let duration = stored
        .duration
        .ok_or_else(|| ApiError::internal("Could not determine video duration"))?;

    let updated = apply_changes(
        state,
        video_id,
        VideoChangeset {
            video_file: Some(stored.url),
            duration: Some(duration),
            ..Default::default()
        },
    )
    .await?;

    state
        .storage
        .delete(&video.video_file)
        .await
        .map_err(internal_with("Failed to delete old video file"))?;

    Ok(updated)
}

pub async fn replace_thumbnail(
    state: &AppState,
    video_id: Uuid,
    user: &User,
    thumbnail: &Path,
) -> Result<Video, ApiError> {
    let video = owned_video(state, video_id, user).await?;

    let stored = state
        .storage
        .upload(thumbnail, MediaKind::Image)
        .await
        .map_err(internal_with("Failed to upload thumbnail"))?;

    let updated = apply_changes(
        state,
        video_id,
        VideoChangeset {
            thumbnail: Some(stored.url),
            ..Default::default()
        },
    )
    .await?;

    state
        .storage
        .delete(&video.thumbnail)
        .await
        .map_err(internal_with("Failed to delete old thumbnail"))?;

    Ok(updated)
}

pub async fn update_title(
    state: &AppState,
    video_id: Uuid,
    user: &User,
    title: &str,
) -> Result<Video, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }
    owned_video(state, video_id, user).await?;

    apply_changes(
        state,
        video_id,
        VideoChangeset {
            title: Some(title.to_string()),
            ..Default::default()
        },
    )
    .await
}

pub async fn update_description(
    state: &AppState,
    video_id: Uuid,
    user: &User,
    description: &str,
) -> Result<Video, ApiError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(ApiError::bad_request("Description is required"));
    }
    owned_video(state, video_id, user).await?;

    apply_changes(
        state,
        video_id,
        VideoChangeset {
            description: Some(description.to_string()),
            ..Default::default()
        },
    )
    .await
}

pub async fn toggle_publish(
    state: &AppState,
    video_id: Uuid,
    user: &User,
) -> Result<Video, ApiError> {
    let video = owned_video(state, video_id, user).await?;

    apply_changes(
        state,
        video_id,
        VideoChangeset {
            is_published: Some(!video.is_published),
            ..Default::default()
        },
    )
    .await
}

/// Removes both media assets, then the video and its views. Storage and
/// database are not rolled back against each other.
pub async fn delete_video(state: &AppState, video_id: Uuid, user: &User) -> Result<(), ApiError> {
    let video = owned_video(state, video_id, user).await?;

    state
        .storage
        .delete(&video.video_file)
        .await
        .map_err(internal_with("Failed to delete video file"))?;
    state
        .storage
        .delete(&video.thumbnail)
        .await
        .map_err(internal_with("Failed to delete thumbnail"))?;

    state
        .videos
        .delete(video_id)
        .await
        .map_err(internal_with("Failed to delete video"))?;

    log::info!("User {} deleted video {}", user.id, video_id);
    Ok(())
}
