//! CLI command implementations.
//!
//! Each command opens a [`Context`] over the data directory, runs one engine
//! operation, and prints the resulting cart.

pub mod cart;
pub mod session;

use std::sync::Arc;

use storecart_sync::{
    FileStorage, HttpCartRemote, SessionContext, SharedStorage, StorageError, SyncConfig,
    SyncEngine, TransportError,
};
use thiserror::Error;

/// Errors that can occur while opening the command context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Data directory could not be opened.
    #[error("Cannot open data directory: {0}")]
    Storage(#[from] StorageError),

    /// HTTP client could not be built.
    #[error("Cannot create cart service client: {0}")]
    Client(#[from] TransportError),
}

/// Session and engine shared by every command.
pub struct Context {
    pub session: Arc<SessionContext>,
    pub engine: SyncEngine<HttpCartRemote>,
}

impl Context {
    /// Restore the session and cart from the configured data directory.
    pub fn open(config: &SyncConfig) -> Result<Self, ContextError> {
        let files = FileStorage::open(&config.data_dir)?;
        tracing::debug!(
            data_dir = %files.dir().display(),
            api = %config.api.base_url,
            "opening cart context"
        );

        let storage: SharedStorage = Arc::new(files);
        let session = SessionContext::init(storage.clone());
        let remote = HttpCartRemote::new(&config.api, session.clone())?;
        let engine = SyncEngine::new(storage, remote, session.clone());
        Ok(Self { session, engine })
    }
}
