use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db::models::{ChannelProfile, NewUser, User, UserChangeset};
use crate::db::repository::{RepoResult, UserRepository};
use crate::db::schema::users;
use crate::db::subscriptions::load_channel_profile;
use crate::db::DbPool;

pub struct PgUserRepository {
    pool: DbPool,
}

impl PgUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> RepoResult<User> {
        let mut conn = self.pool.get().await?;
        let user = diesel::insert_into(users::table)
            .values(&user)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let mut conn = self.pool.get().await?;
        let user = users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let mut conn = self.pool.get().await?;
        let user = users::table
            .filter(users::username.eq(username.to_lowercase()))
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> RepoResult<Option<User>> {
        let mut conn = self.pool.get().await?;
        let user = users::table
            .filter(
                users::username
                    .eq(username.to_lowercase())
                    .or(users::email.eq(email.to_lowercase())),
            )
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserChangeset) -> RepoResult<User> {
        let mut conn = self.pool.get().await?;
        let user = diesel::update(users::table.find(id))
            .set(&changes)
            .returning(User::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(user)
    }

    async fn channel_profile(&self, user: &User, viewer: Uuid) -> RepoResult<ChannelProfile> {
        let mut conn = self.pool.get().await?;
        Ok(load_channel_profile(&mut conn, user, viewer).await?)
    }
}
