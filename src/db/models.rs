use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::schema::{subscriptions, users, videos, views};

#[derive(Debug, Serialize, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = users)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Partial user update. `None` leaves a column untouched; for the nullable
/// columns `Some(None)` clears it.
#[derive(Debug, AsChangeset, Clone)]
#[diesel(table_name = users)]
pub struct UserChangeset {
    pub email: Option<String>,
    pub fullname: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<Option<String>>,
    pub password_hash: Option<String>,
    pub refresh_token: Option<Option<String>>,
    pub updated_at: NaiveDateTime,
}

impl Default for UserChangeset {
    fn default() -> Self {
        Self {
            email: None,
            fullname: None,
            avatar: None,
            cover_image: None,
            password_hash: None,
            refresh_token: None,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Queryable, Selectable, Identifiable, Clone, PartialEq)]
#[diesel(table_name = videos)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub video_file: String,
    pub thumbnail: String,
    pub publisher_id: Uuid,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = videos)]
pub struct NewVideo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub video_file: String,
    pub thumbnail: String,
    pub publisher_id: Uuid,
    pub is_published: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset, Clone)]
#[diesel(table_name = videos)]
pub struct VideoChangeset {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration: Option<f64>,
    pub video_file: Option<String>,
    pub thumbnail: Option<String>,
    pub is_published: Option<bool>,
    pub updated_at: NaiveDateTime,
}

impl Default for VideoChangeset {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            duration: None,
            video_file: None,
            thumbnail: None,
            is_published: None,
            updated_at: chrono::Utc::now().naive_utc(),
        }
    }
}

#[derive(Debug, Serialize, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = subscriptions)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub subscriber_id: Uuid,
    pub channel_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = views)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: Uuid,
    pub video_id: Uuid,
    pub owner_id: Uuid,
    pub viewer_id: Uuid,
    pub created_at: NaiveDateTime,
}

/// Public fields of a user, embedded wherever another document points at one.
#[derive(Debug, Serialize, Queryable, Selectable, Clone, PartialEq)]
#[diesel(table_name = users)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub fullname: String,
    pub avatar: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            fullname: user.fullname.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub id: Uuid,
    pub username: String,
    pub fullname: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub subscribers_count: i64,
    pub subscribed_to_count: i64,
    pub is_subscribed: bool,
}

impl ChannelProfile {
    pub fn new(user: &User, subscribers_count: i64, subscribed_to_count: i64, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            fullname: user.fullname.clone(),
            avatar: user.avatar.clone(),
            cover_image: user.cover_image.clone(),
            subscribers_count,
            subscribed_to_count,
            is_subscribed,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct VideoListItem {
    #[serde(flatten)]
    pub video: Video,
    pub views: i64,
    pub publisher: UserSummary,
}

#[derive(Debug, Serialize, Clone)]
pub struct VideoDetail {
    #[serde(flatten)]
    pub video: Video,
    pub views: i64,
    pub publisher: ChannelProfile,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistoryEntry {
    pub watched_at: NaiveDateTime,
    pub video: Video,
    pub publisher: UserSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Title,
    Duration,
    Views,
}

impl SortField {
    /// Unknown names fall back to creation time.
    pub fn parse(name: &str) -> Self {
        match name {
            "title" => SortField::Title,
            "duration" => SortField::Duration,
            "views" => SortField::Views,
            _ => SortField::CreatedAt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoListQuery {
    pub text: Option<String>,
    pub channel: Option<Uuid>,
    pub published_only: bool,
    pub page: i64,
    pub limit: i64,
    pub sort_by: SortField,
    pub ascending: bool,
}

impl VideoListQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.limit)
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub docs: Vec<T>,
    pub total_docs: i64,
    pub limit: i64,
    pub page: i64,
    pub total_pages: i64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn new(docs: Vec<T>, total_docs: i64, page: i64, limit: i64) -> Self {
        let total_pages = (total_docs as f64 / limit as f64).ceil() as i64;
        Self {
            docs,
            total_docs,
            limit,
            page,
            total_pages,
            has_prev_page: page > 1,
            has_next_page: page < total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_counts_partial_last_page() {
        let page = Page::new(vec![1, 2, 3], 23, 3, 10);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_prev_page);
        assert!(!page.has_next_page);
    }

    #[test]
    fn empty_page_is_valid() {
        let page: Page<i32> = Page::new(Vec::new(), 0, 1, 10);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_prev_page);
        assert!(!page.has_next_page);
    }

    #[test]
    fn offset_saturates_instead_of_overflowing() {
        let query = VideoListQuery {
            text: None,
            channel: None,
            published_only: true,
            page: i64::MAX,
            limit: 10,
            sort_by: SortField::CreatedAt,
            ascending: false,
        };
        assert_eq!(query.offset(), i64::MAX);
    }

    #[test]
    fn sort_field_falls_back_to_created_at() {
        assert_eq!(SortField::parse("views"), SortField::Views);
        assert_eq!(SortField::parse("title"), SortField::Title);
        assert_eq!(SortField::parse("whatever"), SortField::CreatedAt);
        assert_eq!(SortField::parse("createdAt"), SortField::CreatedAt);
    }

    #[test]
    fn user_serialization_hides_secrets() {
        let now = chrono::Utc::now().naive_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            fullname: "Alice".into(),
            avatar: "http://x/a.png".into(),
            cover_image: None,
            password_hash: "$argon2id$...".into(),
            refresh_token: Some("token".into()),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("refreshToken").is_none());
        assert_eq!(json["username"], "alice");
    }
}
