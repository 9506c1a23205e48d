use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::shared::ApiResponse;
use crate::api::upload::MultipartForm;
use crate::auth::CurrentUser;
use crate::db::models::{SortField, VideoListQuery};
use crate::error::ApiError;
use crate::services::videos;
use crate::state::AppState;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;
const MAX_PAGE: i64 = 1_000_000;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/videos")
            .route("", web::get().to(list_videos))
            .route("", web::post().to(publish_video))
            .route("/toggle/publish/{video_id}", web::patch().to(toggle_publish))
            .route("/{video_id}", web::get().to(get_video))
            .route("/{video_id}", web::delete().to(delete_video))
            .route("/{video_id}/video", web::patch().to(update_video_file))
            .route("/{video_id}/thumbnail", web::patch().to(update_thumbnail))
            .route("/{video_id}/title", web::patch().to(update_title))
            .route("/{video_id}/description", web::patch().to(update_description)),
    );
}

/// Raw listing parameters; numbers stay strings so junk falls back to defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListQueryParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub query: Option<String>,
    pub sort_by: Option<String>,
    pub sort_type: Option<String>,
    pub channel: Option<String>,
}

fn positive_or(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(default)
}

impl ListQueryParams {
    /// A requester listing their own channel also sees unpublished videos.
    pub fn into_query(self, requester: Uuid) -> Result<VideoListQuery, ApiError> {
        let channel = match self.channel.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(raw) => Some(
                Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid channel id"))?,
            ),
        };

        Ok(VideoListQuery {
            text: self
                .query
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
            published_only: channel != Some(requester),
            channel,
            page: positive_or(self.page.as_deref(), DEFAULT_PAGE).min(MAX_PAGE),
            limit: positive_or(self.limit.as_deref(), DEFAULT_LIMIT).min(MAX_LIMIT),
            sort_by: self
                .sort_by
                .as_deref()
                .map(SortField::parse)
                .unwrap_or(SortField::CreatedAt),
            ascending: self.sort_type.as_deref() == Some("inc"),
        })
    }
}

pub async fn list_videos(
    current: CurrentUser,
    params: web::Query<ListQueryParams>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let query = params.into_inner().into_query(current.0.id)?;
    let page = videos::list_videos(&state, &query).await?;
    Ok(ApiResponse::ok(page, "Videos fetched successfully"))
}

pub async fn publish_video(
    current: CurrentUser,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let mut form =
        MultipartForm::read(payload, &state.config.storage, &["videoFile", "thumbnail"]).await?;
    let video_file = form.require_file("videoFile")?;
    let thumbnail = form.require_file("thumbnail")?;

    let video = videos::publish_video(
        &state,
        &current.0,
        form.text("title"),
        form.text("description"),
        video_file.path(),
        thumbnail.path(),
    )
    .await?;

    Ok(ApiResponse::created(video, "Video published successfully"))
}

pub async fn get_video(
    current: CurrentUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let video = videos::watch_video(&state, path.into_inner(), current.0.id).await?;
    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

pub async fn update_video_file(
    current: CurrentUser,
    path: web::Path<Uuid>,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let mut form = MultipartForm::read(payload, &state.config.storage, &["videoFile"]).await?;
    let video_file = form.require_file("videoFile")?;

    let video =
        videos::replace_video_file(&state, path.into_inner(), &current.0, video_file.path()).await?;
    Ok(ApiResponse::ok(video, "Video file updated successfully"))
}

pub async fn update_thumbnail(
    current: CurrentUser,
    path: web::Path<Uuid>,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let mut form = MultipartForm::read(payload, &state.config.storage, &["thumbnail"]).await?;
    let thumbnail = form.require_file("thumbnail")?;

    let video =
        videos::replace_thumbnail(&state, path.into_inner(), &current.0, thumbnail.path()).await?;
    Ok(ApiResponse::ok(video, "Thumbnail updated successfully"))
}

#[derive(Debug, Deserialize)]
pub struct TitleRequest {
    #[serde(default)]
    pub title: String,
}

pub async fn update_title(
    current: CurrentUser,
    path: web::Path<Uuid>,
    body: web::Json<TitleRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let video = videos::update_title(&state, path.into_inner(), &current.0, &body.title).await?;
    Ok(ApiResponse::ok(video, "Title updated successfully"))
}

#[derive(Debug, Deserialize)]
pub struct DescriptionRequest {
    #[serde(default)]
    pub description: String,
}

pub async fn update_description(
    current: CurrentUser,
    path: web::Path<Uuid>,
    body: web::Json<DescriptionRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let video =
        videos::update_description(&state, path.into_inner(), &current.0, &body.description)
            .await?;
    Ok(ApiResponse::ok(video, "Description updated successfully"))
}

pub async fn toggle_publish(
    current: CurrentUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let video = videos::toggle_publish(&state, path.into_inner(), &current.0).await?;
    let message = if video.is_published {
        "Video published"
    } else {
        "Video unpublished"
    };
    Ok(ApiResponse::ok(video, message))
}

pub async fn delete_video(
    current: CurrentUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let video_id = path.into_inner();
    videos::delete_video(&state, video_id, &current.0).await?;
    Ok(ApiResponse::ok(json!({ "videoId": video_id }), "Video deleted successfully"))
}
