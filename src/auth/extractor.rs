use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::db::models::User;
use crate::error::{internal_with, ApiError};
use crate::state::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// The user owning the access token presented with the request, read from
/// the `Authorization: Bearer` header or the access token cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = extract_access_token(req);

        Box::pin(async move {
            let state = state.ok_or_else(|| ApiError::internal("Application state is not configured"))?;
            let token = token.ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

            let claims = state.tokens.verify_access_token(&token).map_err(|e| {
                log::debug!("Rejected access token: {}", e);
                ApiError::unauthorized("Invalid access token")
            })?;

            let user = state
                .users
                .find_by_id(claims.sub)
                .await
                .map_err(internal_with("Failed to load user"))?
                .ok_or_else(|| ApiError::unauthorized("Invalid access token"))?;

            Ok(CurrentUser(user))
        })
    }
}

/// An explicit bearer header wins over a possibly stale cookie.
fn extract_access_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    bearer.or_else(|| {
        req.cookie(ACCESS_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
    })
}
