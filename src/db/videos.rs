use std::collections::HashMap;

use async_trait::async_trait;
use diesel::dsl::{count_star, sql};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::models::{
    NewVideo, Page, SortField, User, UserSummary, Video, VideoChangeset, VideoDetail,
    VideoListItem, VideoListQuery,
};
use crate::db::repository::{RepoError, RepoResult, VideoRepository};
use crate::db::schema::{users, videos, views};
use crate::db::subscriptions::load_channel_profile;
use crate::db::DbPool;

/// Correlated view count, usable as an ordering expression on `videos`.
const VIEW_COUNT_SQL: &str = "(SELECT COUNT(*) FROM views WHERE views.video_id = videos.id)";

pub struct PgVideoRepository {
    pool: DbPool,
}

impl PgVideoRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Escapes LIKE metacharacters so user text matches literally.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn filtered(query: &VideoListQuery) -> videos::BoxedQuery<'static, Pg> {
    let mut statement = videos::table.into_boxed();

    if let Some(text) = &query.text {
        let pattern = like_pattern(text);
        statement = statement.filter(
            videos::title
                .ilike(pattern.clone())
                .or(videos::description.ilike(pattern)),
        );
    }
    if let Some(channel) = query.channel {
        statement = statement.filter(videos::publisher_id.eq(channel));
    }
    if query.published_only {
        statement = statement.filter(videos::is_published.eq(true));
    }

    statement
}

fn sorted(
    statement: videos::BoxedQuery<'static, Pg>,
    sort_by: SortField,
    ascending: bool,
) -> videos::BoxedQuery<'static, Pg> {
    let statement = match (sort_by, ascending) {
        (SortField::CreatedAt, true) => statement.order(videos::created_at.asc()),
        (SortField::CreatedAt, false) => statement.order(videos::created_at.desc()),
        (SortField::Title, true) => statement.order(videos::title.asc()),
        (SortField::Title, false) => statement.order(videos::title.desc()),
        (SortField::Duration, true) => statement.order(videos::duration.asc()),
        (SortField::Duration, false) => statement.order(videos::duration.desc()),
        (SortField::Views, true) => statement.order(sql::<BigInt>(VIEW_COUNT_SQL).asc()),
        (SortField::Views, false) => statement.order(sql::<BigInt>(VIEW_COUNT_SQL).desc()),
    };
    // Stable pages when the sort key ties.
    statement.then_order_by(videos::id.asc())
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    async fn create(&self, video: NewVideo) -> RepoResult<Video> {
        let mut conn = self.pool.get().await?;
        let video = diesel::insert_into(videos::table)
            .values(&video)
            .returning(Video::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(video)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Video>> {
        let mut conn = self.pool.get().await?;
        let video = videos::table
            .find(id)
            .select(Video::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(video)
    }

    async fn list(&self, query: &VideoListQuery) -> RepoResult<Page<VideoListItem>> {
        let mut conn = self.pool.get().await?;

        let total_docs: i64 = filtered(query).count().get_result(&mut conn).await?;

        let video_list = sorted(filtered(query), query.sort_by, query.ascending)
            .offset(query.offset())
            .limit(query.limit)
            .select(Video::as_select())
            .load::<Video>(&mut conn)
            .await?;

        let video_ids: Vec<Uuid> = video_list.iter().map(|v| v.id).collect();
        let view_counts: HashMap<Uuid, i64> = views::table
            .filter(views::video_id.eq_any(video_ids))
            .group_by(views::video_id)
            .select((views::video_id, count_star()))
            .load::<(Uuid, i64)>(&mut conn)
            .await?
            .into_iter()
            .collect();

        let publisher_ids: Vec<Uuid> = video_list.iter().map(|v| v.publisher_id).collect();
        let publishers: HashMap<Uuid, UserSummary> = users::table
            .filter(users::id.eq_any(publisher_ids))
            .select(UserSummary::as_select())
            .load::<UserSummary>(&mut conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut docs = Vec::with_capacity(video_list.len());
        for video in video_list {
            // The foreign key guarantees a publisher row.
            let publisher = publishers
                .get(&video.publisher_id)
                .cloned()
                .ok_or(RepoError::NotFound)?;
            docs.push(VideoListItem {
                views: view_counts.get(&video.id).copied().unwrap_or(0),
                video,
                publisher,
            });
        }

        Ok(Page::new(docs, total_docs, query.page, query.limit))
    }

    async fn find_detail(&self, id: Uuid, viewer: Uuid) -> RepoResult<Option<VideoDetail>> {
        let mut conn = self.pool.get().await?;

        let found = videos::table
            .inner_join(users::table)
            .filter(videos::id.eq(id))
            .select((Video::as_select(), User::as_select()))
            .first::<(Video, User)>(&mut conn)
            .await
            .optional()?;

        let Some((video, publisher)) = found else {
            return Ok(None);
        };

        let views: i64 = views::table
            .filter(views::video_id.eq(video.id))
            .count()
            .get_result(&mut conn)
            .await?;

        let publisher = load_channel_profile(&mut conn, &publisher, viewer).await?;

        Ok(Some(VideoDetail {
            video,
            views,
            publisher,
        }))
    }

    async fn update(&self, id: Uuid, changes: VideoChangeset) -> RepoResult<Video> {
        let mut conn = self.pool.get().await?;
        let video = diesel::update(videos::table.find(id))
            .set(&changes)
            .returning(Video::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(video)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<()> {
        let mut conn = self.pool.get().await?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                diesel::delete(views::table.filter(views::video_id.eq(id)))
                    .execute(conn)
                    .await?;
                let deleted = diesel::delete(videos::table.find(id)).execute(conn).await?;
                if deleted == 0 {
                    return Err(diesel::result::Error::NotFound);
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await?;
        Ok(())
    }
}
