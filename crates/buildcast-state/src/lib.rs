//! Buildcast-State: Durable Preference Storage
//!
//! This crate provides the persistence layer for the Buildcast agent.
//! It hides the database behind a tiny versioned key-value contract so the
//! agent logic can be tested against an in-memory fake.
//!
//! ## Key Components
//!
//! - `PreferenceStore`: async key-value contract with optimistic versioning
//! - `SurrealHandle`: manages the SurrealDB connection and schema
//! - `SurrealPreferenceStore`: the production `PreferenceStore`
//! - `fakes::MemoryPreferenceStore`: the test double

mod error;
pub mod fakes;
mod handle;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::SurrealHandle;
pub use storage_traits::{PreferenceStore, StorageResult, StoredValue};
pub use surreal_store::SurrealPreferenceStore;

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
