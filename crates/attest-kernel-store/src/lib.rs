//! # Attest Kernel Store
//!
//! Storage abstraction for kernel state: module records, subjects,
//! executor delegations, governance, budget overrides and unlock history.
//!
//! ## Overview
//!
//! State is a set of key-value [`Namespace`]s behind the async
//! [`StateStore`] trait. Values are CBOR; [`StateStoreExt`] adds typed
//! helpers. A snapshot is written as one [`WriteBatch`], which every backend
//! applies atomically.
//!
//! ## Key Types
//!
//! - [`StateStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`WriteBatch`] - Ordered writes applied all-or-nothing
//!
//! ## Usage
//!
//! ```rust,no_run
//! use attest_kernel_store::{Namespace, SqliteStore, StateStoreExt};
//!
//! async fn example() {
//!     let store = SqliteStore::open("kernel.db").unwrap();
//!     store.put_value(&Namespace::Settings, b"version", &1u32).await.unwrap();
//!     let version: Option<u32> = store.get_value(&Namespace::Settings, b"version").await.unwrap();
//!     assert_eq!(version, Some(1));
//! }
//! ```

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{decode, encode, Namespace, StateStore, StateStoreExt, WriteBatch, WriteOp};
