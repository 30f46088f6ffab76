//! Query execution against a [`ContentStore`].
//!
//! The engine owns the paging strategy decision: the store's capability
//! probe answers once at startup whether paging travels as a structured
//! [`PageBundle`] or as `LIMIT n OFFSET m` text appended to the order-by
//! clause. Everything above the engine is strategy-agnostic, and both
//! strategies must produce the same logical row set.
//!
//! Row sets are lazy: [`QueryEngine::rows`] yields a stream that fetches
//! fixed-size pages on demand, so a consumer that stops early never pays for
//! the rest of the result.

use crate::error::{IndexError, Result};
use crate::projection;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use store_traits::{ContentStore, PageBundle, QueryRequest, StoreCapabilities, StoreRow, StoreValue};

/// Rows are pulled from the store in pages of this size.
const ROW_PAGE: i64 = 256;

/// Queries that take longer than this surface as `StoreUnavailable` instead
/// of hanging the caller.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Lazy sequence of catalog rows.
pub type RowSet = BoxStream<'static, Result<StoreRow>>;

/// How limit/offset reach the store. Chosen once from the capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingStrategy {
    /// Paging travels as a [`PageBundle`] alongside the request.
    Structured,
    /// Paging is rendered into the sort text as `LIMIT n OFFSET m`.
    Inline,
}

impl PagingStrategy {
    pub fn for_capabilities(capabilities: StoreCapabilities) -> Self {
        if capabilities.structured_paging {
            PagingStrategy::Structured
        } else {
            PagingStrategy::Inline
        }
    }
}

/// One order-by column with direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: &'static str,
    pub ascending: bool,
}

impl SortSpec {
    fn render(&self) -> String {
        format!(
            "{} {}",
            self.column,
            if self.ascending { "ASC" } else { "DESC" }
        )
    }
}

/// A query in domain terms, before the paging strategy shapes it into a
/// [`QueryRequest`].
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub target: &'static str,
    pub projection: &'static [&'static str],
    pub selection: Option<String>,
    pub args: Vec<StoreValue>,
    pub order: Option<SortSpec>,
    pub offset: i64,
    pub limit: Option<i64>,
}

impl QuerySpec {
    pub fn new(target: &'static str, projection: &'static [&'static str]) -> Self {
        QuerySpec {
            target,
            projection,
            selection: None,
            args: Vec::new(),
            order: None,
            offset: 0,
            limit: None,
        }
    }

    pub fn selection(mut self, clause: impl Into<String>, args: Vec<StoreValue>) -> Self {
        self.selection = Some(clause.into());
        self.args = args;
        self
    }

    pub fn order(mut self, column: &'static str, ascending: bool) -> Self {
        self.order = Some(SortSpec { column, ascending });
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

struct PageState {
    engine: QueryEngine,
    spec: QuerySpec,
    produced: i64,
    buffer: VecDeque<StoreRow>,
    done: bool,
}

/// Executes [`QuerySpec`]s against one store with one paging strategy.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn ContentStore>,
    strategy: PagingStrategy,
    timeout: Duration,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn ContentStore>, strategy: PagingStrategy) -> Self {
        QueryEngine {
            store,
            strategy,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn strategy(&self) -> PagingStrategy {
        self.strategy
    }

    /// Lazily stream the rows matching a spec.
    ///
    /// Pages of [`ROW_PAGE`] rows are fetched as the stream is polled. When
    /// the spec carries no explicit order, `rowid ASC` is injected so page
    /// boundaries stay stable across fetches.
    pub fn rows(&self, spec: QuerySpec) -> RowSet {
        let state = PageState {
            engine: self.clone(),
            spec,
            produced: 0,
            buffer: VecDeque::new(),
            done: false,
        };
        Box::pin(futures::stream::try_unfold(state, |mut state| async move {
            if let Some(row) = state.buffer.pop_front() {
                return Ok(Some((row, state)));
            }
            if state.done {
                return Ok(None);
            }
            let page_limit = match state.spec.limit {
                Some(limit) if limit - state.produced <= 0 => return Ok(None),
                Some(limit) => (limit - state.produced).min(ROW_PAGE),
                None => ROW_PAGE,
            };
            let request = state
                .engine
                .page_request(&state.spec, state.spec.offset + state.produced, page_limit);
            let rows = state.engine.run(request).await?;
            if (rows.len() as i64) < page_limit {
                state.done = true;
            }
            state.produced += rows.len() as i64;
            state.buffer = rows.into();
            match state.buffer.pop_front() {
                Some(row) => Ok(Some((row, state))),
                None => Ok(None),
            }
        }))
    }

    /// Materialize every row matching a spec.
    pub async fn execute(&self, spec: QuerySpec) -> Result<Vec<StoreRow>> {
        self.rows(spec).try_collect().await
    }

    /// Materialize and decode every row matching a spec.
    ///
    /// The first row that fails to decode aborts the whole batch.
    pub async fn execute_decoded<T, F>(&self, spec: QuerySpec, decode: F) -> Result<Vec<T>>
    where
        F: Fn(&StoreRow) -> Result<T>,
    {
        let rows = self.execute(spec).await?;
        rows.iter().map(decode).collect()
    }

    /// Fetch at most one row. Zero rows is `Ok(None)`, never an error.
    pub async fn fetch_one(&self, spec: QuerySpec) -> Result<Option<StoreRow>> {
        let request = self.page_request(&spec, spec.offset, 1);
        Ok(self.run(request).await?.into_iter().next())
    }

    /// Count the rows matching a selection without materializing them.
    pub async fn count(
        &self,
        target: &'static str,
        selection: Option<String>,
        args: Vec<StoreValue>,
    ) -> Result<i64> {
        // Aggregates bypass the paging path; an injected ORDER BY would be
        // meaningless on a single-row result.
        let request = QueryRequest {
            target: target.to_string(),
            projection: projection::COUNT.iter().map(|c| c.to_string()).collect(),
            selection,
            args,
            sort: None,
            paging: None,
        };
        let rows = self.run(request).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get("total"))
            .and_then(|value| value.as_i64())
            .unwrap_or(0))
    }

    fn page_request(&self, spec: &QuerySpec, offset: i64, limit: i64) -> QueryRequest {
        let order = spec.order.unwrap_or(SortSpec {
            column: "rowid",
            ascending: true,
        });
        let (sort, paging) = match self.strategy {
            PagingStrategy::Structured => (order.render(), Some(PageBundle { limit, offset })),
            PagingStrategy::Inline => (
                format!("{} LIMIT {} OFFSET {}", order.render(), limit, offset),
                None,
            ),
        };
        QueryRequest {
            target: spec.target.to_string(),
            projection: spec.projection.iter().map(|c| c.to_string()).collect(),
            selection: spec.selection.clone(),
            args: spec.args.clone(),
            sort: Some(sort),
            paging,
        }
    }

    async fn run(&self, request: QueryRequest) -> Result<Vec<StoreRow>> {
        let target = request.target.clone();
        tracing::debug!(store_target = %target, "executing catalog query");
        match tokio::time::timeout(self.timeout, self.store.query(request)).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(err)) => {
                tracing::warn!(store_target = %target, error = %err, "catalog query failed");
                Err(IndexError::store_unavailable(&target, &err))
            }
            Err(_) => {
                tracing::warn!(store_target = %target, "catalog query timed out");
                Err(IndexError::StoreUnavailable {
                    target,
                    reason: "query timed out".to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::targets;
    use futures::StreamExt;
    use std::sync::Mutex;
    use store_traits::{CancelToken, ChangeListener, ObserverRegistry, StoreError};

    /// Store double that records every request and replays scripted pages.
    struct RecordingStore {
        requests: Mutex<Vec<QueryRequest>>,
        responses: Mutex<VecDeque<Vec<StoreRow>>>,
        observers: ObserverRegistry,
    }

    impl RecordingStore {
        fn new(responses: Vec<Vec<StoreRow>>) -> Self {
            RecordingStore {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(responses.into()),
                observers: ObserverRegistry::new(),
            }
        }

        fn requests(&self) -> Vec<QueryRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ContentStore for RecordingStore {
        async fn query(&self, request: QueryRequest) -> store_traits::Result<Vec<StoreRow>> {
            self.requests.lock().unwrap().push(request);
            Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn capabilities(&self) -> store_traits::Result<StoreCapabilities> {
            Ok(StoreCapabilities {
                structured_paging: true,
                genre_link_column: true,
            })
        }

        fn register(
            &self,
            target: &str,
            listener: ChangeListener,
        ) -> store_traits::Result<CancelToken> {
            Ok(self.observers.register(target, listener))
        }
    }

    /// Store double whose queries never complete.
    struct StalledStore;

    #[async_trait::async_trait]
    impl ContentStore for StalledStore {
        async fn query(&self, _request: QueryRequest) -> store_traits::Result<Vec<StoreRow>> {
            futures::future::pending().await
        }

        async fn capabilities(&self) -> store_traits::Result<StoreCapabilities> {
            Ok(StoreCapabilities {
                structured_paging: true,
                genre_link_column: true,
            })
        }

        fn register(
            &self,
            _target: &str,
            _listener: ChangeListener,
        ) -> store_traits::Result<CancelToken> {
            Err(StoreError::Backend("no observers".to_string()))
        }
    }

    fn id_row(id: i64) -> StoreRow {
        let mut row = StoreRow::new();
        row.insert("id".into(), StoreValue::Integer(id));
        row
    }

    fn id_page(range: std::ops::Range<i64>) -> Vec<StoreRow> {
        range.map(id_row).collect()
    }

    #[tokio::test]
    async fn structured_strategy_sends_page_bundle() {
        let store = Arc::new(RecordingStore::new(vec![id_page(0..3)]));
        let engine = QueryEngine::new(store.clone(), PagingStrategy::Structured);

        let spec = QuerySpec::new(targets::AUDIO, projection::ID_ONLY).order("title", true);
        let rows = engine.execute(spec).await.unwrap();
        assert_eq!(rows.len(), 3);

        let requests = store.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].sort.as_deref(), Some("title ASC"));
        assert_eq!(
            requests[0].paging,
            Some(PageBundle {
                limit: ROW_PAGE,
                offset: 0
            })
        );
    }

    #[tokio::test]
    async fn inline_strategy_renders_paging_into_sort_text() {
        let store = Arc::new(RecordingStore::new(vec![id_page(0..3)]));
        let engine = QueryEngine::new(store.clone(), PagingStrategy::Inline);

        let spec = QuerySpec::new(targets::AUDIO, projection::ID_ONLY)
            .order("title", false)
            .offset(10)
            .limit(5);
        let rows = engine.execute(spec).await.unwrap();
        assert_eq!(rows.len(), 3);

        let requests = store.requests();
        assert_eq!(
            requests[0].sort.as_deref(),
            Some("title DESC LIMIT 5 OFFSET 10")
        );
        assert_eq!(requests[0].paging, None);
    }

    #[tokio::test]
    async fn unordered_spec_gets_stable_rowid_order() {
        let store = Arc::new(RecordingStore::new(vec![id_page(0..1)]));
        let engine = QueryEngine::new(store.clone(), PagingStrategy::Structured);

        engine
            .execute(QuerySpec::new(targets::AUDIO, projection::ID_ONLY))
            .await
            .unwrap();
        assert_eq!(store.requests()[0].sort.as_deref(), Some("rowid ASC"));
    }

    #[tokio::test]
    async fn row_stream_fetches_pages_on_demand() {
        // First page full, second page short: the stream must issue exactly
        // two requests with advancing offsets.
        let store = Arc::new(RecordingStore::new(vec![
            id_page(0..ROW_PAGE),
            id_page(ROW_PAGE..ROW_PAGE + 10),
        ]));
        let engine = QueryEngine::new(store.clone(), PagingStrategy::Structured);

        let rows: Vec<StoreRow> = engine
            .rows(QuerySpec::new(targets::AUDIO, projection::ID_ONLY))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(rows.len() as i64, ROW_PAGE + 10);

        let requests = store.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].paging.unwrap().offset, 0);
        assert_eq!(requests[1].paging.unwrap().offset, ROW_PAGE);
    }

    #[tokio::test]
    async fn row_stream_stops_at_spec_limit() {
        let store = Arc::new(RecordingStore::new(vec![id_page(0..4)]));
        let engine = QueryEngine::new(store.clone(), PagingStrategy::Structured);

        let spec = QuerySpec::new(targets::AUDIO, projection::ID_ONLY).limit(4);
        let rows = engine.execute(spec).await.unwrap();
        assert_eq!(rows.len(), 4);

        // The page limit is clamped to the spec limit, so one request covers
        // the whole result.
        let requests = store.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].paging.unwrap().limit, 4);
    }

    #[tokio::test]
    async fn early_drop_skips_remaining_pages() {
        let store = Arc::new(RecordingStore::new(vec![
            id_page(0..ROW_PAGE),
            id_page(ROW_PAGE..2 * ROW_PAGE),
        ]));
        let engine = QueryEngine::new(store.clone(), PagingStrategy::Structured);

        let mut rows = engine.rows(QuerySpec::new(targets::AUDIO, projection::ID_ONLY));
        let first = rows.next().await.unwrap().unwrap();
        assert_eq!(first.get("id").unwrap().as_i64(), Some(0));
        drop(rows);

        assert_eq!(store.requests().len(), 1);
    }

    #[tokio::test]
    async fn decode_failure_aborts_the_batch() {
        let mut bad = StoreRow::new();
        bad.insert("id".into(), StoreValue::Null);
        let store = Arc::new(RecordingStore::new(vec![vec![id_row(1), bad, id_row(3)]]));
        let engine = QueryEngine::new(store, PagingStrategy::Structured);

        let result = engine
            .execute_decoded(
                QuerySpec::new(targets::AUDIO, projection::ID_ONLY),
                crate::mapper::decode_audio_id,
            )
            .await;
        assert!(matches!(result, Err(IndexError::RowDecode { .. })));
    }

    #[tokio::test]
    async fn count_bypasses_sort_and_paging() {
        let mut total = StoreRow::new();
        total.insert("total".into(), StoreValue::Integer(12));
        let store = Arc::new(RecordingStore::new(vec![vec![total]]));
        let engine = QueryEngine::new(store.clone(), PagingStrategy::Inline);

        let count = engine.count(targets::AUDIO, None, Vec::new()).await.unwrap();
        assert_eq!(count, 12);

        let requests = store.requests();
        assert_eq!(requests[0].sort, None);
        assert_eq!(requests[0].paging, None);
        assert_eq!(requests[0].projection, vec!["COUNT(*) AS total"]);
    }

    #[tokio::test]
    async fn stalled_store_surfaces_as_unavailable() {
        let engine = QueryEngine::new(Arc::new(StalledStore), PagingStrategy::Structured)
            .with_timeout(Duration::from_millis(20));

        let result = engine
            .execute(QuerySpec::new(targets::AUDIO, projection::ID_ONLY))
            .await;
        match result {
            Err(IndexError::StoreUnavailable { target, reason }) => {
                assert_eq!(target, targets::AUDIO);
                assert_eq!(reason, "query timed out");
            }
            other => panic!("expected StoreUnavailable, got {other:?}"),
        }
    }
}
