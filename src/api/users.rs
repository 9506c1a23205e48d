use actix_multipart::Multipart;
use actix_web::cookie::Cookie;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::shared::ApiResponse;
use crate::api::upload::MultipartForm;
use crate::auth::{CurrentUser, TokenPair, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::db::models::User;
use crate::error::ApiError;
use crate::services::users::{self, Registration};
use crate::state::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/refresh-token", web::post().to(refresh_token))
            .route("/change-password", web::post().to(change_password))
            .route("/current-user", web::get().to(current_user))
            .route("/update-account", web::patch().to(update_account))
            .route("/avatar", web::patch().to(update_avatar))
            .route("/cover-image", web::patch().to(update_cover_image))
            .route("/c/{username}", web::get().to(channel_profile))
            .route("/history", web::get().to(watch_history)),
    );
}

fn token_cookie<'a>(state: &AppState, name: &'a str, value: String) -> Cookie<'a> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(state.config.auth.secure_cookies)
        .finish()
}

fn removal_cookie(name: &str) -> Cookie<'_> {
    let mut cookie = Cookie::build(name, "").path("/").http_only(true).finish();
    cookie.make_removal();
    cookie
}

fn with_token_cookies(state: &AppState, tokens: &TokenPair, response: ApiResponse<impl Serialize>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(token_cookie(state, ACCESS_TOKEN_COOKIE, tokens.access_token.clone()))
        .cookie(token_cookie(state, REFRESH_TOKEN_COOKIE, tokens.refresh_token.clone()))
        .json(response)
}

pub async fn register(
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let mut form =
        MultipartForm::read(payload, &state.config.storage, &["avatar", "coverImage"]).await?;

    let avatar = form.require_file("avatar")?;
    let cover_image = form.take_file("coverImage");
    let registration = Registration {
        fullname: form.text("fullname").to_string(),
        email: form.text("email").to_string(),
        username: form.text("username").to_string(),
        password: form.text("password").to_string(),
    };

    let user = users::register(
        &state,
        registration,
        avatar.path(),
        cover_image.as_ref().map(|f| f.path()),
    )
    .await?;

    Ok(ApiResponse::created(user, "User registered successfully"))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user: User,
    access_token: String,
    refresh_token: String,
}

pub async fn login(
    body: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let identifier = body.username.or(body.email).unwrap_or_default();

    let (user, tokens) = users::login(&state, &identifier, &body.password).await?;

    let response = ApiResponse::new(
        actix_web::http::StatusCode::OK,
        LoginResponse {
            user,
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
        },
        "User logged in successfully",
    );
    Ok(with_token_cookies(&state, &tokens, response))
}

pub async fn logout(
    current: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    users::logout(&state, current.0.id).await?;

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_TOKEN_COOKIE))
        .cookie(removal_cookie(REFRESH_TOKEN_COOKIE))
        .json(ApiResponse::new(
            actix_web::http::StatusCode::OK,
            json!({}),
            "User logged out",
        )))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

pub async fn refresh_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let incoming = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|b| b.into_inner().refresh_token))
        .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

    let tokens = users::refresh(&state, &incoming).await?;

    let response = ApiResponse::new(
        actix_web::http::StatusCode::OK,
        tokens.clone(),
        "Access token refreshed",
    );
    Ok(with_token_cookies(&state, &tokens, response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn change_password(
    current: CurrentUser,
    body: web::Json<ChangePasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    users::change_password(&state, &current.0, &body.old_password, &body.new_password).await?;
    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

pub async fn current_user(current: CurrentUser) -> HttpResponse {
    ApiResponse::ok(current.0, "Current user fetched successfully")
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub fullname: String,
    pub email: String,
}

pub async fn update_account(
    current: CurrentUser,
    body: web::Json<UpdateAccountRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user = users::update_account(&state, current.0.id, &body.fullname, &body.email).await?;
    Ok(ApiResponse::ok(user, "Account details updated successfully"))
}

pub async fn update_avatar(
    current: CurrentUser,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let mut form = MultipartForm::read(payload, &state.config.storage, &["avatar"]).await?;
    let avatar = form.require_file("avatar")?;

    let user = users::update_avatar(&state, &current.0, avatar.path()).await?;
    Ok(ApiResponse::ok(user, "Avatar updated successfully"))
}

pub async fn update_cover_image(
    current: CurrentUser,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let mut form = MultipartForm::read(payload, &state.config.storage, &["coverImage"]).await?;
    let cover_image = form.require_file("coverImage")?;

    let user = users::update_cover_image(&state, &current.0, cover_image.path()).await?;
    Ok(ApiResponse::ok(user, "Cover image updated successfully"))
}

pub async fn channel_profile(
    current: CurrentUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let profile = users::channel_profile(&state, &path, current.0.id).await?;
    Ok(ApiResponse::ok(profile, "Channel fetched successfully"))
}

pub async fn watch_history(
    current: CurrentUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let history = users::watch_history(&state, current.0.id).await?;
    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}
