pub mod models;
pub mod repository;
pub mod schema;
pub mod subscriptions;
pub mod users;
pub mod videos;
pub mod views;

use diesel_async::pooled_connection::deadpool::{BuildError, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub use subscriptions::PgSubscriptionRepository;
pub use users::PgUserRepository;
pub use videos::PgVideoRepository;
pub use views::PgViewRepository;

pub type DbPool = deadpool::managed::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub fn create_pool(database_url: &str, max_connections: usize) -> Result<DbPool, BuildError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Pool::builder(config).max_size(max_connections).build()
}
