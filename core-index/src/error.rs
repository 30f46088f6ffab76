use store_traits::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    /// The catalog target could not be reached at all. Distinct from an
    /// empty row set, which is a valid success.
    #[error("content store unavailable for target '{target}': {reason}")]
    StoreUnavailable { target: String, reason: String },

    /// A by-key lookup expected exactly one row and found none.
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    /// A row's columns could not be decoded into the requested record type.
    #[error("failed to decode row column '{column}': {message}")]
    RowDecode { column: String, message: String },
}

impl IndexError {
    pub(crate) fn store_unavailable(target: &str, source: &StoreError) -> Self {
        IndexError::StoreUnavailable {
            target: target.to_string(),
            reason: source.to_string(),
        }
    }

    pub(crate) fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        IndexError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub(crate) fn row_decode(column: &str, message: impl Into<String>) -> Self {
        IndexError::RowDecode {
            column: column.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
