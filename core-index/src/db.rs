//! Catalog database connection management.
//!
//! The catalog is owned by an external scanner process; this crate only
//! reads it. The schema helpers here exist for embedded deployments and for
//! tests, where the crate has to stand up its own catalog file.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use store_traits::StoreError;

/// Connection configuration for a catalog database.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    path: Option<PathBuf>,
    max_connections: u32,
    create_if_missing: bool,
}

impl CatalogConfig {
    /// Configuration for a catalog file on disk.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        CatalogConfig {
            path: Some(path.into()),
            max_connections: 4,
            create_if_missing: false,
        }
    }

    /// In-memory catalog. A single connection keeps the in-memory database
    /// shared; extra connections would each see their own empty database.
    pub fn in_memory() -> Self {
        CatalogConfig {
            path: None,
            max_connections: 1,
            create_if_missing: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

/// Open a connection pool to the catalog.
pub async fn connect_catalog(config: CatalogConfig) -> Result<Pool<Sqlite>, StoreError> {
    let options = match &config.path {
        Some(path) => SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal),
        None => SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
    }
    .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))
}

/// Create the catalog tables if they do not exist.
///
/// Column nullability mirrors what external scanners actually write: audio
/// titles can be null for files with broken tags, and the genre table is
/// seeded with the scanner's implicit "no genre" bucket row.
pub async fn apply_catalog_schema(pool: &Pool<Sqlite>) -> Result<(), StoreError> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS audio (
            id INTEGER PRIMARY KEY,
            title TEXT,
            path TEXT NOT NULL,
            mime_type TEXT,
            size INTEGER,
            date_added INTEGER NOT NULL,
            date_modified INTEGER NOT NULL,
            duration_ms INTEGER NOT NULL,
            artist TEXT,
            artist_id INTEGER,
            album TEXT,
            album_id INTEGER,
            album_artist TEXT,
            composer TEXT,
            genre TEXT,
            genre_id INTEGER,
            year INTEGER,
            bitrate INTEGER,
            track_number INTEGER,
            disc_number INTEGER
        )",
        "CREATE TABLE IF NOT EXISTS artist (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            track_count INTEGER NOT NULL DEFAULT 0,
            album_count INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE TABLE IF NOT EXISTS album (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT,
            artist_id INTEGER,
            last_year INTEGER,
            track_count INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE TABLE IF NOT EXISTS genre (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS playlist (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            track_count INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE TABLE IF NOT EXISTS genre_member (
            genre_id INTEGER NOT NULL,
            audio_id INTEGER NOT NULL,
            PRIMARY KEY (genre_id, audio_id)
        )",
        "CREATE TABLE IF NOT EXISTS playlist_member (
            playlist_id INTEGER NOT NULL,
            audio_id INTEGER NOT NULL,
            play_order INTEGER NOT NULL,
            PRIMARY KEY (playlist_id, audio_id)
        )",
        // The scanner's bucket for untagged files. Diagnostics subtract it
        // from the raw genre row count.
        "INSERT OR IGNORE INTO genre (id, name) VALUES (0, '')",
    ];
    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
    }
    Ok(())
}

/// In-memory catalog with the schema applied, for tests.
#[cfg(test)]
pub async fn create_test_catalog() -> Pool<Sqlite> {
    let pool = connect_catalog(CatalogConfig::in_memory())
        .await
        .expect("in-memory catalog should open");
    apply_catalog_schema(&pool)
        .await
        .expect("schema should apply");
    pool
}
