use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use clientele_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the customer store, creating the database file when it is missing.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// An in-memory database lives and dies with its connection, so such pools
/// hold exactly one connection that is never recycled.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new().acquire_timeout(Duration::from_secs(timeout_secs.max(1)));
    let pool = if is_in_memory(database_url) {
        pool.max_connections(1).min_connections(1).idle_timeout(None).max_lifetime(None)
    } else {
        pool.max_connections(max_connections.max(1))
    };

    pool.connect_with(options).await
}

pub fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use clientele_core::config::DatabaseConfig;
    use tempfile::TempDir;

    use super::{connect, connect_with_settings, is_in_memory};

    #[test]
    fn recognises_in_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite::memory:?cache=shared"));
        assert!(is_in_memory("sqlite://customers?mode=memory"));
        assert!(!is_in_memory("sqlite://clientele.db"));
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_one_database_across_acquires() {
        let pool = connect_with_settings("sqlite::memory:", 8, 5).await.expect("connect");
        sqlx::query("CREATE TABLE marker (id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .expect("create table");

        for _ in 0..3 {
            let (count,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'marker'",
            )
            .fetch_one(&pool)
            .await
            .expect("lookup");
            assert_eq!(count, 1);
        }
        assert_eq!(pool.options().get_max_connections(), 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn file_database_is_created_with_foreign_keys_enabled() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("customers.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 2,
            timeout_secs: 5,
        };

        let pool = connect(&config).await.expect("connect");
        let (foreign_keys,): (i64,) =
            sqlx::query_as("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");

        assert_eq!(foreign_keys, 1);
        assert!(path.exists());
        pool.close().await;
    }
}
