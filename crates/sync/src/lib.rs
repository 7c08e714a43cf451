//! Storecart Sync - cart synchronization core.
//!
//! Keeps a shopper's cart consistent between a durable local mirror and the
//! remote cart service, with optimistic updates and rollback.
//!
//! # Architecture
//!
//! - [`store`] - In-memory cart mirrored to durable storage under `cartItems`
//! - [`session`] - Session context and the identity gate the engine consults
//! - [`engine`] - Optimistic mutations, remote calls, reconciliation
//! - [`remote`] - Cart service contract and its REST client
//!
//! # Modules
//!
//! - [`config`] - Environment-based configuration
//! - [`error`] - Engine error type and Sentry breadcrumbs
//! - [`model`] - Cart lines, snapshots, and line keys
//! - [`normalize`] - Lenient decoding of stored records and server replies
//! - [`reconcile`] - Pure rollback and reconciliation rules
//! - [`storage`] - Durable key-value storage backends

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod remote;
pub mod session;
pub mod storage;
pub mod store;

pub use config::{ApiConfig, ConfigError, SyncConfig};
pub use engine::SyncEngine;
pub use error::{CartError, Result};
pub use model::{CartLineItem, CartSnapshot, LineKey, ProductSummary};
pub use remote::{CartRemote, HttpCartRemote, RemoteReply, RemoteResult, TransportError};
pub use session::{IdentityGate, SessionContext};
pub use storage::{DurableStorage, FileStorage, MemoryStorage, SharedStorage, StorageError};
pub use store::LocalMirrorStore;
