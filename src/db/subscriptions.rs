use async_trait::async_trait;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::models::{ChannelProfile, Subscription, User, UserSummary};
use crate::db::repository::{RepoResult, SubscriptionRepository};
use crate::db::schema::{subscriptions, users};
use crate::db::DbPool;

pub struct PgSubscriptionRepository {
    pool: DbPool,
}

impl PgSubscriptionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Counts both directions of `user`'s subscription edges and checks whether
/// `viewer` is one of its subscribers.
pub(crate) async fn load_channel_profile(
    conn: &mut AsyncPgConnection,
    user: &User,
    viewer: Uuid,
) -> QueryResult<ChannelProfile> {
    let subscribers_count: i64 = subscriptions::table
        .filter(subscriptions::channel_id.eq(user.id))
        .count()
        .get_result(conn)
        .await?;

    let subscribed_to_count: i64 = subscriptions::table
        .filter(subscriptions::subscriber_id.eq(user.id))
        .count()
        .get_result(conn)
        .await?;

    let is_subscribed: bool = diesel::select(exists(
        subscriptions::table
            .filter(subscriptions::channel_id.eq(user.id))
            .filter(subscriptions::subscriber_id.eq(viewer)),
    ))
    .get_result(conn)
    .await?;

    Ok(ChannelProfile::new(
        user,
        subscribers_count,
        subscribed_to_count,
        is_subscribed,
    ))
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn find(&self, subscriber_id: Uuid, channel_id: Uuid) -> RepoResult<Option<Subscription>> {
        let mut conn = self.pool.get().await?;
        let subscription = subscriptions::table
            .filter(subscriptions::subscriber_id.eq(subscriber_id))
            .filter(subscriptions::channel_id.eq(channel_id))
            .select(Subscription::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(subscription)
    }

    async fn create(&self, subscriber_id: Uuid, channel_id: Uuid) -> RepoResult<Subscription> {
        let mut conn = self.pool.get().await?;
        let subscription = Subscription {
            id: Uuid::new_v4(),
            subscriber_id,
            channel_id,
            created_at: chrono::Utc::now().naive_utc(),
        };
        let subscription = diesel::insert_into(subscriptions::table)
            .values(&subscription)
            .returning(Subscription::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(subscription)
    }

    async fn delete(&self, id: Uuid) -> RepoResult<()> {
        let mut conn = self.pool.get().await?;
        diesel::delete(subscriptions::table.find(id))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn subscribers_of(&self, channel_id: Uuid) -> RepoResult<Vec<UserSummary>> {
        let mut conn = self.pool.get().await?;
        let subscribers = subscriptions::table
            .inner_join(users::table.on(users::id.eq(subscriptions::subscriber_id)))
            .filter(subscriptions::channel_id.eq(channel_id))
            .order(subscriptions::created_at.desc())
            .select(UserSummary::as_select())
            .load(&mut conn)
            .await?;
        Ok(subscribers)
    }

    async fn channels_of(&self, subscriber_id: Uuid) -> RepoResult<Vec<UserSummary>> {
        let mut conn = self.pool.get().await?;
        let channels = subscriptions::table
            .inner_join(users::table.on(users::id.eq(subscriptions::channel_id)))
            .filter(subscriptions::subscriber_id.eq(subscriber_id))
            .order(subscriptions::created_at.desc())
            .select(UserSummary::as_select())
            .load(&mut conn)
            .await?;
        Ok(channels)
    }
}
