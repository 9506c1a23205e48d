use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::{QueryFragment, QueryId};
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db::models::{UserSummary, Video, View, WatchHistoryEntry};
use crate::db::repository::{RepoResult, ViewRepository};
use crate::db::schema::{users, videos, views};
use crate::db::DbPool;

pub struct PgViewRepository {
    pool: DbPool,
}

impl PgViewRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// One statement so concurrent views by the same viewer collapse onto the
/// (video_id, viewer_id) row instead of tripping its unique index.
fn upsert_view(view: &View) -> impl QueryFragment<Pg> + QueryId + Send + '_ {
    diesel::insert_into(views::table)
        .values(view)
        .on_conflict((views::video_id, views::viewer_id))
        .do_update()
        .set((
            views::id.eq(excluded(views::id)),
            views::owner_id.eq(excluded(views::owner_id)),
            views::created_at.eq(excluded(views::created_at)),
        ))
}

#[async_trait]
impl ViewRepository for PgViewRepository {
    async fn record(&self, video_id: Uuid, owner_id: Uuid, viewer_id: Uuid) -> RepoResult<View> {
        let mut conn = self.pool.get().await?;
        let view = View {
            id: Uuid::new_v4(),
            video_id,
            owner_id,
            viewer_id,
            created_at: chrono::Utc::now().naive_utc(),
        };

        upsert_view(&view).execute(&mut conn).await?;
        Ok(view)
    }

    async fn history(&self, viewer_id: Uuid) -> RepoResult<Vec<WatchHistoryEntry>> {
        let mut conn = self.pool.get().await?;
        let rows = views::table
            .inner_join(videos::table.inner_join(users::table))
            .filter(views::viewer_id.eq(viewer_id))
            .order(views::created_at.desc())
            .select((
                views::created_at,
                Video::as_select(),
                UserSummary::as_select(),
            ))
            .load::<(NaiveDateTime, Video, UserSummary)>(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(watched_at, video, publisher)| WatchHistoryEntry {
                watched_at,
                video,
                publisher,
            })
            .collect())
    }
}
