//! Platform-facing contract for the external media catalog.
//!
//! The catalog is owned and mutated by the platform; this crate defines the
//! read-only query protocol, the capability probe, and the mutation-observer
//! registration used by the core index layer. Concrete stores implement
//! [`ContentStore`]; everything above it stays platform-agnostic.

pub mod error;
pub mod observe;
pub mod store;

pub use error::{Result, StoreError};
pub use observe::{CancelToken, ChangeListener, ObserverRegistry};
pub use store::{
    ContentStore, PageBundle, QueryRequest, StoreCapabilities, StoreRow, StoreValue,
};
