//! Local mirror of the cart.
//!
//! Holds the in-memory [`CartSnapshot`], mirrors it to durable storage under
//! [`CART_KEY`], and publishes every saved snapshot on a `watch` channel so
//! display code can observe the cart without borrowing the engine.

use tokio::sync::watch;
use tracing::{debug, error};

use crate::model::CartSnapshot;
use crate::normalize::parse_snapshot;
use crate::storage::{SharedStorage, StorageError};

/// Storage key of the persisted cart.
pub const CART_KEY: &str = "cartItems";

/// In-memory cart mirrored to durable storage.
pub struct LocalMirrorStore {
    storage: SharedStorage,
    snapshot: CartSnapshot,
    published: watch::Sender<CartSnapshot>,
}

impl LocalMirrorStore {
    /// An empty store backed by `storage`. Call [`load`](Self::load) to
    /// restore the persisted cart.
    #[must_use]
    pub fn new(storage: SharedStorage) -> Self {
        let (published, _) = watch::channel(CartSnapshot::new());
        Self {
            storage,
            snapshot: CartSnapshot::new(),
            published,
        }
    }

    /// Restore the cart from durable storage.
    ///
    /// A missing, unreadable, or malformed record yields an empty cart.
    pub fn load(&mut self) -> &CartSnapshot {
        self.snapshot = self.read_persisted();
        debug!(lines = self.snapshot.len(), "restored cart from storage");
        self.published.send_replace(self.snapshot.clone());
        &self.snapshot
    }

    /// Read the persisted cart without touching the in-memory copy.
    #[must_use]
    pub fn read_persisted(&self) -> CartSnapshot {
        match self.storage.get(CART_KEY) {
            Ok(Some(raw)) => parse_snapshot(&raw),
            Ok(None) => CartSnapshot::new(),
            Err(e) => {
                error!(error = %e, "failed to read stored cart");
                CartSnapshot::new()
            }
        }
    }

    /// Persist the current cart and publish it to observers.
    ///
    /// Storage failures are logged and otherwise ignored; the in-memory cart
    /// stays authoritative for the session.
    pub fn save(&self) {
        if let Err(e) = self.write() {
            error!(error = %e, "failed to persist cart");
        }
        self.published.send_replace(self.snapshot.clone());
    }

    fn write(&self) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(&self.snapshot)?;
        self.storage.set(CART_KEY, &serialized)
    }

    /// The current cart.
    #[must_use]
    pub const fn snapshot(&self) -> &CartSnapshot {
        &self.snapshot
    }

    pub(crate) fn snapshot_mut(&mut self) -> &mut CartSnapshot {
        &mut self.snapshot
    }

    /// Swap in a new cart, returning the previous one. Does not persist.
    pub fn replace(&mut self, snapshot: CartSnapshot) -> CartSnapshot {
        std::mem::replace(&mut self.snapshot, snapshot)
    }

    /// Observe saved snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.published.subscribe()
    }
}

impl std::fmt::Debug for LocalMirrorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMirrorStore")
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}
