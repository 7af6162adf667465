mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::artifact::{ArtifactCodec, ArtifactStore};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Signs and verifies license artifacts with the injected pre-shared key.
    pub codec: ArtifactCodec,
    /// On-disk storage for generated `<license_id>.lic` files.
    pub artifacts: ArtifactStore,
    /// Shared secret for authenticating purchase-completed webhook deliveries.
    pub webhook_secret: String,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    // Activation transactions take the write lock up front; concurrent
    // writers must wait for it rather than fail with SQLITE_BUSY.
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", true)
    });
    Pool::builder().max_size(10).build(manager)
}
