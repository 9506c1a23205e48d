//! In-memory doubles for the repositories and media storage, plus fixtures.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::db::models::{
    ChannelProfile, NewUser, NewVideo, Page, SortField, Subscription, User, UserChangeset,
    UserSummary, Video, VideoChangeset, VideoDetail, VideoListItem, VideoListQuery, View,
    WatchHistoryEntry,
};
use crate::db::repository::{
    RepoError, RepoResult, SubscriptionRepository, UserRepository, VideoRepository,
    ViewRepository,
};
use crate::services::media_storage::{MediaKind, MediaStorage, StorageError, StoredMedia};
use crate::state::AppState;

pub const PASSWORD: &str = "secret123";
pub const FAKE_DURATION: f64 = 42.5;

fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(PASSWORD.as_bytes(), &salt)
            .unwrap()
            .to_string()
    })
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    videos: Vec<Video>,
    subscriptions: Vec<Subscription>,
    // Insertion order doubles as recency.
    views: Vec<View>,
}

impl Tables {
    fn profile(&self, user: &User, viewer: Uuid) -> ChannelProfile {
        let subscribers = self
            .subscriptions
            .iter()
            .filter(|s| s.channel_id == user.id)
            .count() as i64;
        let subscribed_to = self
            .subscriptions
            .iter()
            .filter(|s| s.subscriber_id == user.id)
            .count() as i64;
        let is_subscribed = self
            .subscriptions
            .iter()
            .any(|s| s.channel_id == user.id && s.subscriber_id == viewer);
        ChannelProfile::new(user, subscribers, subscribed_to, is_subscribed)
    }

    fn view_count(&self, video_id: Uuid) -> i64 {
        self.views.iter().filter(|v| v.video_id == video_id).count() as i64
    }

    fn user(&self, id: Uuid) -> RepoResult<&User> {
        self.users.iter().find(|u| u.id == id).ok_or(RepoError::NotFound)
    }

    fn summaries(&self, ids: impl Iterator<Item = Uuid>) -> RepoResult<Vec<UserSummary>> {
        ids.map(|id| self.user(id).map(UserSummary::from)).collect()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_listing: AtomicBool,
}

impl MemoryStore {
    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    pub fn views_for(&self, video_id: Uuid) -> Vec<View> {
        let tables = self.tables.lock().unwrap();
        tables
            .views
            .iter()
            .filter(|v| v.video_id == video_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(RepoError::Conflict("users_username_or_email_key".into()));
        }
        let user = User {
            id: user.id,
            username: user.username,
            email: user.email,
            fullname: user.fullname,
            avatar: user.avatar,
            cover_image: user.cover_image,
            password_hash: user.password_hash,
            refresh_token: None,
            created_at: user.created_at,
            updated_at: user.updated_at,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let username = username.to_lowercase();
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> RepoResult<Option<User>> {
        let (username, email) = (username.to_lowercase(), email.to_lowercase());
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .iter()
            .find(|u| u.username == username || u.email == email)
            .cloned())
    }

    async fn update(&self, id: Uuid, changes: UserChangeset) -> RepoResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(email) = &changes.email {
            if tables.users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(RepoError::Conflict("users_email_key".into()));
            }
        }
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(fullname) = changes.fullname {
            user.fullname = fullname;
        }
        if let Some(avatar) = changes.avatar {
            user.avatar = avatar;
        }
        if let Some(cover_image) = changes.cover_image {
            user.cover_image = cover_image;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(refresh_token) = changes.refresh_token {
            user.refresh_token = refresh_token;
        }
        user.updated_at = changes.updated_at;
        Ok(user.clone())
    }

    async fn channel_profile(&self, user: &User, viewer: Uuid) -> RepoResult<ChannelProfile> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.profile(user, viewer))
    }
}

#[async_trait]
impl VideoRepository for MemoryStore {
    async fn create(&self, video: NewVideo) -> RepoResult<Video> {
        let video = Video {
            id: video.id,
            title: video.title,
            description: video.description,
            duration: video.duration,
            video_file: video.video_file,
            thumbnail: video.thumbnail,
            publisher_id: video.publisher_id,
            is_published: video.is_published,
            created_at: video.created_at,
            updated_at: video.updated_at,
        };
        self.tables.lock().unwrap().videos.push(video.clone());
        Ok(video)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Video>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.videos.iter().find(|v| v.id == id).cloned())
    }

    async fn list(&self, query: &VideoListQuery) -> RepoResult<Page<VideoListItem>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(RepoError::Pool("listing disabled".into()));
        }
        let tables = self.tables.lock().unwrap();
        let needle = query.text.as_ref().map(|t| t.to_lowercase());

        let mut matches: Vec<(&Video, i64)> = tables
            .videos
            .iter()
            .filter(|v| match &needle {
                Some(n) => {
                    v.title.to_lowercase().contains(n) || v.description.to_lowercase().contains(n)
                }
                None => true,
            })
            .filter(|v| query.channel.map_or(true, |c| v.publisher_id == c))
            .filter(|v| !query.published_only || v.is_published)
            .map(|v| (v, tables.view_count(v.id)))
            .collect();

        matches.sort_by(|(a, a_views), (b, b_views)| {
            let ordering = match query.sort_by {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Title => a.title.cmp(&b.title),
                SortField::Duration => a.duration.total_cmp(&b.duration),
                SortField::Views => a_views.cmp(b_views),
            };
            let ordering = if query.ascending { ordering } else { ordering.reverse() };
            ordering.then(a.id.cmp(&b.id))
        });

        let total = matches.len() as i64;
        let docs = matches
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .map(|(video, views)| -> RepoResult<VideoListItem> {
                Ok(VideoListItem {
                    publisher: UserSummary::from(tables.user(video.publisher_id)?),
                    views,
                    video: video.clone(),
                })
            })
            .collect::<RepoResult<Vec<_>>>()?;

        Ok(Page::new(docs, total, query.page, query.limit))
    }

    async fn find_detail(&self, id: Uuid, viewer: Uuid) -> RepoResult<Option<VideoDetail>> {
        let tables = self.tables.lock().unwrap();
        let Some(video) = tables.videos.iter().find(|v| v.id == id) else {
            return Ok(None);
        };
        let publisher = tables.user(video.publisher_id)?;
        Ok(Some(VideoDetail {
            video: video.clone(),
            views: tables.view_count(id),
            publisher: tables.profile(publisher, viewer),
        }))
    }

    async fn update(&self, id: Uuid, changes: VideoChangeset) -> RepoResult<Video> {
        let mut tables = self.tables.lock().unwrap();
        let video = tables
            .videos
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(RepoError::NotFound)?;
        if let Some(title) = changes.title {
            video.title = title;
        }
        if let Some(description) = changes.description {
            video.description = description;
        }
        if let Some(duration) = changes.duration {
            video.duration = duration;
        }
        if let Some(video_file) = changes.video_file {
            video.video_file = video_file;
        }
        if let Some(thumbnail) = changes.thumbnail {
            video.thumbnail = thumbnail;
        }
        if let Some(is_published) = changes.is_published {
            video.is_published = is_published;
        }
        video.updated_at = changes.updated_at;
        Ok(video.clone())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.videos.len();
        tables.videos.retain(|v| v.id != id);
        if tables.videos.len() == before {
            return Err(RepoError::NotFound);
        }
        tables.views.retain(|v| v.video_id != id);
        Ok(())
    }
}

#[async_trait]
impl ViewRepository for MemoryStore {
    async fn record(&self, video_id: Uuid, owner_id: Uuid, viewer_id: Uuid) -> RepoResult<View> {
        let mut tables = self.tables.lock().unwrap();
        tables
            .views
            .retain(|v| !(v.video_id == video_id && v.viewer_id == viewer_id));
        let view = View {
            id: Uuid::new_v4(),
            video_id,
            owner_id,
            viewer_id,
            created_at: Utc::now().naive_utc(),
        };
        tables.views.push(view.clone());
        Ok(view)
    }

    async fn history(&self, viewer_id: Uuid) -> RepoResult<Vec<WatchHistoryEntry>> {
        let tables = self.tables.lock().unwrap();
        tables
            .views
            .iter()
            .rev()
            .filter(|v| v.viewer_id == viewer_id)
            .map(|view| -> RepoResult<WatchHistoryEntry> {
                let video = tables
                    .videos
                    .iter()
                    .find(|v| v.id == view.video_id)
                    .ok_or(RepoError::NotFound)?;
                Ok(WatchHistoryEntry {
                    watched_at: view.created_at,
                    video: video.clone(),
                    publisher: UserSummary::from(tables.user(video.publisher_id)?),
                })
            })
            .collect()
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn find(&self, subscriber_id: Uuid, channel_id: Uuid) -> RepoResult<Option<Subscription>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .subscriptions
            .iter()
            .find(|s| s.subscriber_id == subscriber_id && s.channel_id == channel_id)
            .cloned())
    }

    async fn create(&self, subscriber_id: Uuid, channel_id: Uuid) -> RepoResult<Subscription> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .subscriptions
            .iter()
            .any(|s| s.subscriber_id == subscriber_id && s.channel_id == channel_id)
        {
            return Err(RepoError::Conflict("subscriptions_pair_key".into()));
        }
        let subscription = Subscription {
            id: Uuid::new_v4(),
            subscriber_id,
            channel_id,
            created_at: Utc::now().naive_utc(),
        };
        tables.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<()> {
        self.tables
            .lock()
            .unwrap()
            .subscriptions
            .retain(|s| s.id != id);
        Ok(())
    }

    async fn subscribers_of(&self, channel_id: Uuid) -> RepoResult<Vec<UserSummary>> {
        let tables = self.tables.lock().unwrap();
        let ids = tables
            .subscriptions
            .iter()
            .rev()
            .filter(|s| s.channel_id == channel_id)
            .map(|s| s.subscriber_id);
        tables.summaries(ids)
    }

    async fn channels_of(&self, subscriber_id: Uuid) -> RepoResult<Vec<UserSummary>> {
        let tables = self.tables.lock().unwrap();
        let ids = tables
            .subscriptions
            .iter()
            .rev()
            .filter(|s| s.subscriber_id == subscriber_id)
            .map(|s| s.channel_id);
        tables.summaries(ids)
    }
}

/// Records uploads and deletions instead of touching the filesystem.
#[derive(Default)]
pub struct MemoryMedia {
    stored: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    fail_uploads: AtomicBool,
}

impl MemoryMedia {
    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStorage for MemoryMedia {
    async fn upload(&self, local: &Path, kind: MediaKind) -> Result<StoredMedia, StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("upload refused")));
        }
        let folder = match kind {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        };
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let url = format!("http://media.test/uploads/{}/{}-{}", folder, Uuid::new_v4(), name);
        self.stored.lock().unwrap().push(url.clone());
        Ok(StoredMedia {
            url,
            duration: (kind == MediaKind::Video).then_some(FAKE_DURATION),
        })
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        self.deleted.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

pub struct TestContext {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub media: Arc<MemoryMedia>,
    dir: tempfile::TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let media = Arc::new(MemoryMedia::default());
        let config = Arc::new(AppConfig::for_tests());
        let state = AppState {
            users: store.clone(),
            videos: store.clone(),
            views: store.clone(),
            subscriptions: store.clone(),
            storage: media.clone(),
            tokens: Arc::new(TokenService::new(&config.auth)),
            config,
        };
        Self {
            state,
            store,
            media,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Seeds a user whose password is [`PASSWORD`].
    pub async fn user(&self, username: &str) -> User {
        let now = Utc::now().naive_utc();
        self.state
            .users
            .create(NewUser {
                id: Uuid::new_v4(),
                username: username.to_string(),
                email: format!("{}@example.com", username),
                fullname: format!("{} tester", username),
                avatar: format!("http://media.test/uploads/images/{}.png", username),
                cover_image: None,
                password_hash: password_hash().to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    pub async fn video(&self, publisher: &User, title: &str, is_published: bool) -> Video {
        let now = Utc::now().naive_utc();
        let id = Uuid::new_v4();
        self.state
            .videos
            .create(NewVideo {
                id,
                title: title.to_string(),
                description: format!("{} description", title),
                duration: 10.0,
                video_file: format!("http://media.test/uploads/videos/{}.mp4", id),
                thumbnail: format!("http://media.test/uploads/images/{}.png", id),
                publisher_id: publisher.id,
                is_published,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap()
    }

    pub fn temp_file(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"media-bytes").unwrap();
        path
    }

    pub fn bearer(&self, user: &User) -> String {
        let token = self.state.tokens.generate_access_token(user).unwrap();
        format!("Bearer {}", token)
    }
}
