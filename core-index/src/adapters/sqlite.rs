//! SQLite-backed content store.
//!
//! Wraps a catalog database behind the [`ContentStore`] protocol. Targets
//! map to whitelisted tables, selections stay parameterized end to end, and
//! external writers announce their mutations through [`SqliteCatalog::signal_change`].

use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Pool, Row, Sqlite};
use store_traits::{
    CancelToken, ChangeListener, ContentStore, ObserverRegistry, QueryRequest, StoreCapabilities,
    StoreError, StoreRow, StoreValue,
};

use crate::projection::targets;

pub struct SqliteCatalog {
    pool: Pool<Sqlite>,
    observers: ObserverRegistry,
    capabilities: StoreCapabilities,
}

impl SqliteCatalog {
    /// Wrap a catalog pool, probing its capabilities once.
    pub async fn open(pool: Pool<Sqlite>) -> Result<Self, StoreError> {
        let capabilities = probe_capabilities(&pool).await?;
        tracing::info!(
            structured_paging = capabilities.structured_paging,
            genre_link_column = capabilities.genre_link_column,
            "sqlite catalog opened"
        );
        Ok(SqliteCatalog {
            pool,
            observers: ObserverRegistry::new(),
            capabilities,
        })
    }

    /// Wrap a catalog pool with forced capabilities. Lets tests exercise the
    /// legacy paging and genre-resolution paths against a modern database.
    pub fn with_capabilities(pool: Pool<Sqlite>, capabilities: StoreCapabilities) -> Self {
        SqliteCatalog {
            pool,
            observers: ObserverRegistry::new(),
            capabilities,
        }
    }

    /// Announce an external mutation on a target, fanning out to every
    /// registered listener.
    pub fn signal_change(&self, target: &str) {
        tracing::debug!(store_target = %target, "change signalled");
        self.observers.notify(target);
    }

    pub fn observers(&self) -> &ObserverRegistry {
        &self.observers
    }
}

async fn probe_capabilities(pool: &Pool<Sqlite>) -> Result<StoreCapabilities, StoreError> {
    // Paging probe: a store that rejects bound limit/offset falls back to
    // inline paging text. Only a statement-level rejection means "legacy";
    // a connection failure is not a capability answer.
    let structured_paging = match sqlx::query("SELECT 1 AS probe LIMIT ? OFFSET ?")
        .bind(1_i64)
        .bind(0_i64)
        .fetch_optional(pool)
        .await
    {
        Ok(_) => true,
        Err(sqlx::Error::Database(_)) => false,
        Err(e) => return Err(StoreError::Backend(e.to_string())),
    };

    let genre_link_column: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM pragma_table_info('audio') WHERE name = 'genre_id'")
            .fetch_one(pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(StoreCapabilities {
        structured_paging,
        genre_link_column: genre_link_column.0 > 0,
    })
}

fn table_for(target: &str) -> Result<&'static str, StoreError> {
    match target {
        targets::AUDIO => Ok("audio"),
        targets::ARTIST => Ok("artist"),
        targets::ALBUM => Ok("album"),
        targets::GENRE => Ok("genre"),
        targets::PLAYLIST => Ok("playlist"),
        targets::GENRE_MEMBERS => Ok("genre_member"),
        targets::PLAYLIST_MEMBERS => Ok("playlist_member"),
        other => Err(StoreError::UnknownTarget(other.to_string())),
    }
}

fn render_sql(table: &str, request: &QueryRequest) -> String {
    let mut sql = format!("SELECT {} FROM {}", request.projection.join(", "), table);
    if let Some(selection) = &request.selection {
        sql.push_str(" WHERE ");
        sql.push_str(selection);
    }
    if let Some(sort) = &request.sort {
        sql.push_str(" ORDER BY ");
        sql.push_str(sort);
    }
    if request.paging.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
    }
    sql
}

/// Materialize one result row, probing each column as integer, then real,
/// then text. Columns that fit none of those come back as null.
fn materialize_row(row: &SqliteRow) -> StoreRow {
    let mut out = StoreRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = if let Ok(Some(i)) = row.try_get::<Option<i64>, _>(index) {
            StoreValue::Integer(i)
        } else if let Ok(Some(r)) = row.try_get::<Option<f64>, _>(index) {
            StoreValue::Real(r)
        } else if let Ok(Some(s)) = row.try_get::<Option<String>, _>(index) {
            StoreValue::Text(s)
        } else {
            StoreValue::Null
        };
        out.insert(column.name().to_string(), value);
    }
    out
}

#[async_trait::async_trait]
impl ContentStore for SqliteCatalog {
    async fn query(&self, request: QueryRequest) -> store_traits::Result<Vec<StoreRow>> {
        let table = table_for(&request.target)?;
        let sql = render_sql(table, &request);
        tracing::trace!(store_target = %request.target, %sql, "catalog sql");

        let mut query = sqlx::query(&sql);
        for arg in &request.args {
            query = match arg {
                StoreValue::Null => query.bind(None::<i64>),
                StoreValue::Integer(i) => query.bind(*i),
                StoreValue::Real(r) => query.bind(*r),
                StoreValue::Text(s) => query.bind(s.clone()),
            };
        }
        if let Some(paging) = request.paging {
            query = query.bind(paging.limit).bind(paging.offset);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(rows.iter().map(materialize_row).collect())
    }

    async fn capabilities(&self) -> store_traits::Result<StoreCapabilities> {
        Ok(self.capabilities)
    }

    fn register(&self, target: &str, listener: ChangeListener) -> store_traits::Result<CancelToken> {
        table_for(target)?;
        Ok(self.observers.register(target, listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_catalog;
    use crate::projection;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use store_traits::PageBundle;

    async fn seed_titles(pool: &Pool<Sqlite>, titles: &[&str]) {
        for (i, title) in titles.iter().enumerate() {
            sqlx::query(
                "INSERT INTO audio (id, title, path, date_added, date_modified, duration_ms)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(i as i64 + 1)
            .bind(title)
            .bind(format!("/music/{title}.mp3"))
            .bind(100 + i as i64)
            .bind(200 + i as i64)
            .bind(1000_i64)
            .execute(pool)
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn probe_detects_modern_catalog() {
        let pool = create_test_catalog().await;
        let catalog = SqliteCatalog::open(pool).await.unwrap();
        let caps = catalog.capabilities().await.unwrap();
        assert!(caps.structured_paging);
        assert!(caps.genre_link_column);
    }

    #[tokio::test]
    async fn open_fails_on_dead_pool() {
        let pool = create_test_catalog().await;
        pool.close().await;
        assert!(matches!(
            SqliteCatalog::open(pool).await,
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn unknown_target_is_rejected() {
        let pool = create_test_catalog().await;
        let catalog = SqliteCatalog::open(pool).await.unwrap();
        let request = QueryRequest {
            target: "video".to_string(),
            projection: vec!["id".to_string()],
            selection: None,
            args: Vec::new(),
            sort: None,
            paging: None,
        };
        assert!(matches!(
            catalog.query(request).await,
            Err(StoreError::UnknownTarget(t)) if t == "video"
        ));
    }

    #[tokio::test]
    async fn bundle_paging_limits_rows() {
        let pool = create_test_catalog().await;
        seed_titles(&pool, &["Apple", "Mango", "Zebra"]).await;
        let catalog = SqliteCatalog::open(pool).await.unwrap();

        let request = QueryRequest {
            target: targets::AUDIO.to_string(),
            projection: vec!["id".to_string(), "title".to_string()],
            selection: None,
            args: Vec::new(),
            sort: Some("title ASC".to_string()),
            paging: Some(PageBundle { limit: 2, offset: 1 }),
        };
        let rows = catalog.query(request).await.unwrap();
        let titles: Vec<_> = rows
            .iter()
            .map(|r| r.get("title").unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["Mango", "Zebra"]);
    }

    #[tokio::test]
    async fn inline_paging_rides_in_sort_text() {
        let pool = create_test_catalog().await;
        seed_titles(&pool, &["Apple", "Mango", "Zebra"]).await;
        let catalog = SqliteCatalog::open(pool).await.unwrap();

        let request = QueryRequest {
            target: targets::AUDIO.to_string(),
            projection: vec!["title".to_string()],
            selection: None,
            args: Vec::new(),
            sort: Some("title DESC LIMIT 1 OFFSET 0".to_string()),
            paging: None,
        };
        let rows = catalog.query(request).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("title").unwrap().as_str(), Some("Zebra"));
    }

    #[tokio::test]
    async fn selection_args_bind_positionally() {
        let pool = create_test_catalog().await;
        seed_titles(&pool, &["Apple", "Mango"]).await;
        let catalog = SqliteCatalog::open(pool).await.unwrap();

        let request = QueryRequest {
            target: targets::AUDIO.to_string(),
            projection: projection::ID_ONLY.iter().map(|c| c.to_string()).collect(),
            selection: Some("title = ?".to_string()),
            args: vec![StoreValue::Text("Mango".to_string())],
            sort: None,
            paging: None,
        };
        let rows = catalog.query(request).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id").unwrap().as_i64(), Some(2));
    }

    #[tokio::test]
    async fn null_columns_materialize_as_null() {
        let pool = create_test_catalog().await;
        sqlx::query(
            "INSERT INTO audio (id, title, path, date_added, date_modified, duration_ms)
             VALUES (1, NULL, '/music/x.mp3', 1, 1, 1)",
        )
        .execute(&pool)
        .await
        .unwrap();
        let catalog = SqliteCatalog::open(pool).await.unwrap();

        let request = QueryRequest {
            target: targets::AUDIO.to_string(),
            projection: vec!["id".to_string(), "title".to_string()],
            selection: None,
            args: Vec::new(),
            sort: None,
            paging: None,
        };
        let rows = catalog.query(request).await.unwrap();
        assert!(rows[0].get("title").unwrap().is_null());
    }

    #[tokio::test]
    async fn register_validates_target_and_receives_signals() {
        let pool = create_test_catalog().await;
        let catalog = SqliteCatalog::open(pool).await.unwrap();

        assert!(matches!(
            catalog.register("video", Arc::new(|| {})),
            Err(StoreError::UnknownTarget(_))
        ));

        let hits = Arc::new(AtomicUsize::new(0));
        let listener_hits = hits.clone();
        let _token = catalog
            .register(targets::AUDIO, Arc::new(move || {
                listener_hits.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        catalog.signal_change(targets::AUDIO);
        catalog.signal_change(targets::ALBUM);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
