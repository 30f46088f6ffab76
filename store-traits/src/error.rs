use thiserror::Error;

/// Errors surfaced by a [`crate::ContentStore`] implementation.
///
/// An empty row set is a valid success and never an error; these variants
/// mean the store itself could not serve the request.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The query target does not resolve to anything in this store.
    #[error("unknown query target: {0}")]
    UnknownTarget(String),

    /// The underlying store failed while executing a request.
    #[error("content store failure: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
