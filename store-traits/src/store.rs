//! Query protocol types and the content store trait.
//!
//! A [`QueryRequest`] carries a parameterized, injection-safe query: the
//! predicate uses only positional `?` placeholders and the args are bound
//! positionally by the implementation. Never concatenate user input into the
//! selection string.

use crate::error::Result;
use crate::observe::{CancelToken, ChangeListener};
use serde::{Deserialize, Serialize};

/// A single row from a catalog query as a map of column names to values.
pub type StoreRow = std::collections::HashMap<String, StoreValue>;

/// A catalog value that can be null, integer, real, or text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoreValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl StoreValue {
    /// Convert to i64 if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StoreValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert to f64 if possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StoreValue::Real(r) => Some(*r),
            StoreValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Borrow as a string slice if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoreValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert to an owned string if this is a text value.
    pub fn as_string(&self) -> Option<String> {
        match self {
            StoreValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, StoreValue::Null)
    }
}

/// Limit/offset bundle for stores that accept paging as structured arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBundle {
    pub limit: i64,
    pub offset: i64,
}

/// A parameterized query against one catalog target.
///
/// `sort` is order-by text. Stores that lack structured paging support
/// receive `LIMIT n OFFSET m` concatenated onto that text instead of a
/// [`PageBundle`]; both forms must produce the same logical row set.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Target identifier, resolved by the store to a concrete record set.
    pub target: String,
    /// Ordered list of columns to materialize.
    pub projection: Vec<String>,
    /// Filter clause using positional `?` placeholders only.
    pub selection: Option<String>,
    /// Values bound positionally to the selection placeholders.
    pub args: Vec<StoreValue>,
    /// Order-by text, possibly carrying trailing paging tokens.
    pub sort: Option<String>,
    /// Structured paging; `None` when paging rides along in `sort` or the
    /// request is unpaged.
    pub paging: Option<PageBundle>,
}

/// Result of the one-time capability probe performed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCapabilities {
    /// Whether the store accepts limit/offset as a [`PageBundle`].
    pub structured_paging: bool,
    /// Whether audio rows carry a direct genre foreign-key column, allowing
    /// genre membership to be resolved in a single query.
    pub genre_link_column: bool,
}

/// Read-only access to the externally-owned media catalog.
///
/// Implementations must be thread-safe; concurrent queries against the same
/// or different targets are always permitted. All mutation happens outside
/// this interface, announced through the observer protocol.
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    /// Execute a parameterized query and materialize the matching rows.
    ///
    /// Zero rows is a valid result. Fails with
    /// [`StoreError::UnknownTarget`](crate::StoreError::UnknownTarget) when
    /// the target cannot be resolved at all.
    async fn query(&self, request: QueryRequest) -> Result<Vec<StoreRow>>;

    /// Report what this store supports. Called once at startup; the answer
    /// must stay valid for the lifetime of the store.
    async fn capabilities(&self) -> Result<StoreCapabilities>;

    /// Register a listener for external mutations on a target.
    ///
    /// The listener is invoked once per mutation announcement, with no
    /// payload. Cancelling (or dropping) the returned token deregisters the
    /// listener synchronously.
    fn register(&self, target: &str, listener: ChangeListener) -> Result<CancelToken>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_value_conversions() {
        let int_val = StoreValue::Integer(42);
        assert_eq!(int_val.as_i64(), Some(42));
        assert_eq!(int_val.as_f64(), Some(42.0));
        assert!(int_val.as_str().is_none());

        let text_val = StoreValue::Text("hello".to_string());
        assert_eq!(text_val.as_str(), Some("hello"));
        assert_eq!(text_val.as_string(), Some("hello".to_string()));
        assert!(text_val.as_i64().is_none());

        let null_val = StoreValue::Null;
        assert!(null_val.is_null());
        assert!(null_val.as_i64().is_none());
    }

    #[test]
    fn real_accepts_integer_widening() {
        assert_eq!(StoreValue::Real(1.5).as_f64(), Some(1.5));
        assert_eq!(StoreValue::Integer(3).as_f64(), Some(3.0));
        assert!(StoreValue::Text("3".into()).as_f64().is_none());
    }
}
