//! SQLite persistence for the tag cache.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage. The cache is a
//! single table keyed by file path; each row carries the fingerprint columns
//! alongside the full extracted record serialized as JSON.
//!
//! # Example
//!
//! ```ignore
//! use music_indexer::db::SqliteCache;
//!
//! let cache = SqliteCache::open(&config::default_cache_path()).await?;
//! let songs = cache.read_all().await?;
//! ```

use async_trait::async_trait;
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::warn;

use crate::error::{Result, ResultExt};
use crate::extractor::{CacheRepository, RawSong};

/// Build a SQLite database URL for `path`.
pub fn db_url(path: &Path) -> String {
    format!("sqlite:{}", path.display())
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections, and runs all pending migrations.
pub async fn init_db(db_url: &str) -> Result<SqlitePool> {
    if !sqlx::Sqlite::database_exists(db_url).await.unwrap_or(false) {
        sqlx::Sqlite::create_database(db_url)
            .await
            .with_context(format!("creating {db_url}"))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// [`CacheRepository`] stored in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(format!("creating cache directory {}", dir.display()))?;
        }
        let pool = init_db(&db_url(path)).await?;
        Ok(Self { pool })
    }

    /// Drop every cached record. Returns how many were removed.
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM song_cache")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM song_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl CacheRepository for SqliteCache {
    async fn read_all(&self) -> Result<Vec<RawSong>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT path, data FROM song_cache ORDER BY path")
                .fetch_all(&self.pool)
                .await?;

        // A row that no longer deserializes is just a cache miss.
        Ok(rows
            .into_iter()
            .filter_map(|(path, data)| match serde_json::from_str::<RawSong>(&data) {
                Ok(song) => Some(song),
                Err(e) => {
                    warn!(target: "db", path, error = %e, "Skipping unreadable cache row");
                    None
                }
            })
            .collect())
    }

    async fn write_all(&self, songs: &[RawSong]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM song_cache").execute(&mut *tx).await?;

        for song in songs {
            let Some(path) = &song.path else { continue };
            let data = serde_json::to_string(song)?;
            sqlx::query(
                "INSERT OR REPLACE INTO song_cache (path, date_modified, size, data) VALUES (?, ?, ?, ?)",
            )
            .bind(path.to_string_lossy().as_ref())
            .bind(song.date_modified)
            .bind(song.size.map(|s| s as i64))
            .bind(data)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Date;
    use smallvec::smallvec;
    use std::path::PathBuf;

    fn song(path: &str, name: &str) -> RawSong {
        RawSong {
            path: Some(PathBuf::from(path)),
            date_modified: Some(1_700_000_000),
            size: Some(4096),
            name: Some(name.to_string()),
            date: Some(Date::from_year(1999)),
            artist_names: smallvec!["A".to_string(), "B".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_creates_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("cache.db");

        let cache = SqliteCache::open(&db_path).await.unwrap();
        assert!(db_path.exists());
        assert_eq!(cache.count().await.unwrap(), 0);
        assert!(cache.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_all_replaces_contents() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("cache.db"))
            .await
            .unwrap();

        cache
            .write_all(&[song("/m/a.mp3", "A"), song("/m/b.mp3", "B")])
            .await
            .unwrap();
        assert_eq!(cache.count().await.unwrap(), 2);

        let replacement = song("/m/c.mp3", "C");
        cache.write_all(std::slice::from_ref(&replacement)).await.unwrap();

        let stored = cache.read_all().await.unwrap();
        assert_eq!(stored, vec![replacement]);
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("cache.db");
        let original = song("/m/a.mp3", "A");

        {
            let cache = SqliteCache::open(&db_path).await.unwrap();
            cache.write_all(std::slice::from_ref(&original)).await.unwrap();
        }

        let cache = SqliteCache::open(&db_path).await.unwrap();
        assert_eq!(cache.read_all().await.unwrap(), vec![original]);
    }

    #[tokio::test]
    async fn test_clear_and_corrupt_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("cache.db"))
            .await
            .unwrap();
        cache.write_all(&[song("/m/a.mp3", "A")]).await.unwrap();

        sqlx::query("INSERT INTO song_cache (path, data) VALUES ('/m/bad.mp3', 'not json')")
            .execute(&cache.pool)
            .await
            .unwrap();
        assert_eq!(cache.read_all().await.unwrap().len(), 1);

        assert_eq!(cache.clear().await.unwrap(), 2);
        assert!(cache.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pathless_records_are_not_stored() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("cache.db"))
            .await
            .unwrap();
        cache.write_all(&[RawSong::default()]).await.unwrap();
        assert_eq!(cache.count().await.unwrap(), 0);
    }
}
