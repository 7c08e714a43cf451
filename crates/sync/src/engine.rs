//! Cart sync engine.
//!
//! # Architecture
//!
//! - Every mutation is applied to the [`LocalMirrorStore`] and persisted first
//! - Signed-out sessions stop there; the local cart is the whole truth
//! - Signed-in sessions forward the change to the [`CartRemote`], then
//!   reconcile with the server's answer or roll back
//! - Mutations take `&mut self`, so at most one change is in flight per engine
//!
//! # Example
//!
//! ```rust,ignore
//! let mut engine = SyncEngine::new(storage, remote, session.clone());
//! engine.add(&product).await?;
//! engine.set_quantity(line, 3).await?;
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::{CartError, Result, add_breadcrumb};
use crate::model::{CartLineItem, CartSnapshot, LineKey, ProductSummary};
use crate::reconcile::{Checkpoint, EmptyReply, Resolution, SyncOutcome, adopt_server_cart, resolve};
use crate::remote::{CartRemote, RemoteReply};
use crate::session::IdentityGate;
use crate::storage::SharedStorage;
use crate::store::LocalMirrorStore;

/// Keeps the local cart and the remote cart service in agreement.
pub struct SyncEngine<R> {
    store: LocalMirrorStore,
    remote: R,
    gate: Arc<dyn IdentityGate>,
}

impl<R: CartRemote> SyncEngine<R> {
    /// Create an engine and restore the persisted cart.
    #[must_use]
    pub fn new(storage: SharedStorage, remote: R, gate: Arc<dyn IdentityGate>) -> Self {
        let mut store = LocalMirrorStore::new(storage);
        store.load();
        Self {
            store,
            remote,
            gate,
        }
    }

    /// The current cart.
    #[must_use]
    pub const fn snapshot(&self) -> &CartSnapshot {
        self.store.snapshot()
    }

    /// Observe every persisted cart.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.store.subscribe()
    }

    /// The local mirror store.
    #[must_use]
    pub const fn store(&self) -> &LocalMirrorStore {
        &self.store
    }

    /// The remote cart service.
    #[must_use]
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    fn is_authenticated(&self) -> bool {
        self.gate.is_authenticated()
    }

    /// Index and value of the line with `key`.
    fn find(&self, key: &LineKey) -> Option<(usize, CartLineItem)> {
        let snapshot = self.store.snapshot();
        let index = snapshot.position(key)?;
        snapshot.lines().get(index).cloned().map(|line| (index, line))
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Replace the cart with the authoritative copy.
    ///
    /// Signed out, that is the durable copy. Signed in, it is the server's
    /// cart; if fetching fails the durable copy is restored and the failure
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns `RemoteRejected` or `TransportFailure` if the fetch fails.
    #[instrument(skip(self))]
    pub async fn reload(&mut self) -> Result<()> {
        if !self.is_authenticated() {
            self.store.load();
            return Ok(());
        }

        let error = match self.remote.fetch_cart().await {
            Ok(RemoteReply::Success(lines)) => {
                let next = adopt_server_cart(self.store.snapshot(), lines);
                debug!(lines = next.len(), "reloaded cart from service");
                self.store.replace(next);
                self.store.save();
                return Ok(());
            }
            Ok(RemoteReply::Rejected { code, message }) => {
                CartError::RemoteRejected { code, message }
            }
            Err(e) => CartError::TransportFailure(e),
        };

        warn!(error = %error, "cart reload failed, restoring stored cart");
        add_breadcrumb("cart", "Reload failed, restored stored cart", None);
        self.store.load();
        Err(error)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `product`, appending a new selected line if the cart
    /// has none for it.
    ///
    /// # Errors
    ///
    /// Returns `RemoteRejected` or `TransportFailure` after undoing the
    /// addition.
    #[instrument(skip(self, product), fields(product = %product.id))]
    pub async fn add(&mut self, product: &ProductSummary) -> Result<()> {
        let existing = self
            .store
            .snapshot()
            .position_of_product(product.id)
            .and_then(|index| {
                self.store
                    .snapshot()
                    .lines()
                    .get(index)
                    .cloned()
                    .map(|line| (index, line))
            });

        let checkpoint = match existing {
            Some((index, prior)) => {
                let key = prior.key();
                if let Some(line) = self.store.snapshot_mut().get_mut(index) {
                    line.quantity = line.quantity.saturating_add(1);
                }
                Checkpoint::line(key, index, Some(prior))
            }
            None => {
                let line = product.to_line();
                let key = line.key();
                let index = self.store.snapshot().len();
                self.store.snapshot_mut().push(line);
                Checkpoint::line(key, index, None)
            }
        };
        self.store.save();

        if !self.is_authenticated() {
            debug!("signed out, addition kept locally");
            return Ok(());
        }

        let outcome = self.remote.add_line(product.id, 1).await.into();
        self.settle("add", checkpoint, outcome, EmptyReply::Keep).await
    }

    /// Set a line's quantity. Zero or less removes the line.
    ///
    /// An unknown key with a positive quantity is forwarded to the service
    /// when signed in and the cart is reloaded if that fails.
    ///
    /// # Errors
    ///
    /// Returns `RemoteRejected` or `TransportFailure` after restoring the
    /// prior quantity (or reloading when the line was removed).
    #[instrument(skip(self), fields(line = %key))]
    pub async fn set_quantity(&mut self, key: LineKey, quantity: i64) -> Result<()> {
        let target = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);

        let Some((index, prior)) = self.find(&key) else {
            return self.set_unknown_quantity(key, target).await;
        };

        if target == 0 {
            self.store.snapshot_mut().remove(&key);
        } else if let Some(line) = self.store.snapshot_mut().get_mut(index) {
            line.quantity = target;
        }
        self.store.save();

        if !self.is_authenticated() {
            debug!(quantity = target, "signed out, quantity kept locally");
            return Ok(());
        }
        let Some(id) = key.remote_id() else {
            warn!("line has no remote id, quantity kept locally");
            return Ok(());
        };

        let (checkpoint, empty) = if target == 0 {
            (Checkpoint::ambiguous(key, index, Some(prior)), EmptyReply::Keep)
        } else {
            (Checkpoint::line(key, index, Some(prior)), EmptyReply::Reload)
        };
        let outcome = self.remote.set_quantity(id, target).await.into();
        self.settle("set_quantity", checkpoint, outcome, empty).await
    }

    async fn set_unknown_quantity(&mut self, key: LineKey, target: u32) -> Result<()> {
        if target == 0 {
            debug!("line not in cart, nothing to remove");
            return Ok(());
        }
        let remote_id = key.remote_id().filter(|_| self.is_authenticated());
        let Some(id) = remote_id else {
            debug!("line not in cart, quantity change ignored");
            return Ok(());
        };

        let checkpoint = Checkpoint::ambiguous(key, self.store.snapshot().len(), None);
        let outcome = self.remote.set_quantity(id, target).await.into();
        self.settle("set_quantity", checkpoint, outcome, EmptyReply::Reload)
            .await
    }

    /// Flip the `selected` flag of one line.
    ///
    /// # Errors
    ///
    /// Returns `LineNotFound` (without touching anything) if the key is not
    /// in the cart, or `RemoteRejected` / `TransportFailure` after restoring
    /// the prior flag.
    #[instrument(skip(self), fields(line = %key))]
    pub async fn toggle_selection(&mut self, key: LineKey) -> Result<()> {
        let Some((index, prior)) = self.find(&key) else {
            return Err(CartError::LineNotFound(key));
        };

        let selected = !prior.selected;
        if let Some(line) = self.store.snapshot_mut().get_mut(index) {
            line.selected = selected;
        }
        self.store.save();

        if !self.is_authenticated() {
            return Ok(());
        }
        let Some(id) = key.remote_id() else {
            warn!("line has no remote id, selection kept locally");
            return Ok(());
        };

        let outcome = self.remote.toggle_selection(id, selected).await.into();
        self.settle(
            "toggle_selection",
            Checkpoint::line(key, index, Some(prior)),
            outcome,
            EmptyReply::Keep,
        )
        .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RemoteRejected` or `TransportFailure` after restoring every
    /// line in its original order.
    #[instrument(skip(self))]
    pub async fn clear(&mut self) -> Result<()> {
        let prior = self.store.replace(CartSnapshot::new());
        self.store.save();

        if !self.is_authenticated() {
            return Ok(());
        }

        let outcome = self.remote.clear().await.into();
        self.settle("clear", Checkpoint::Whole(prior), outcome, EmptyReply::Keep)
            .await
    }

    /// Remove every line whose key is in `keys`. Local only.
    ///
    /// Returns how many lines were removed.
    #[instrument(skip(self))]
    pub fn bulk_remove(&mut self, keys: &[LineKey]) -> usize {
        let removed = self.store.snapshot_mut().remove_all(keys);
        if removed > 0 {
            self.store.save();
        }
        debug!(removed, "bulk removed lines");
        removed
    }

    /// Remove one line.
    ///
    /// # Errors
    ///
    /// Returns `LineNotFound` if the key is not in the cart, or
    /// `RemoteRejected` / `TransportFailure` after putting the line back at
    /// its former position.
    #[instrument(skip(self), fields(line = %key))]
    pub async fn remove_line(&mut self, key: LineKey) -> Result<()> {
        let Some((index, prior)) = self.store.snapshot_mut().remove(&key) else {
            return Err(CartError::LineNotFound(key));
        };
        self.store.save();

        if !self.is_authenticated() {
            return Ok(());
        }
        let Some(id) = key.remote_id() else {
            warn!("line has no remote id, removal kept locally");
            return Ok(());
        };

        let outcome = self.remote.remove_line(id).await.into();
        self.settle(
            "remove_line",
            Checkpoint::line(key, index, Some(prior)),
            outcome,
            EmptyReply::Keep,
        )
        .await
    }

    /// Set the `selected` flag on every line.
    ///
    /// # Errors
    ///
    /// Returns `RemoteRejected` or `TransportFailure` after restoring the
    /// prior cart.
    #[instrument(skip(self))]
    pub async fn select_all(&mut self, selected: bool) -> Result<()> {
        let prior = self.store.snapshot().clone();
        let snapshot = self.store.snapshot_mut();
        for index in 0..snapshot.len() {
            if let Some(line) = snapshot.get_mut(index) {
                line.selected = selected;
            }
        }
        self.store.save();

        if !self.is_authenticated() {
            return Ok(());
        }

        let outcome = self.remote.select_all(selected).await.into();
        self.settle("select_all", Checkpoint::Whole(prior), outcome, EmptyReply::Keep)
            .await
    }

    // =========================================================================
    // Identity transitions
    // =========================================================================

    /// Adopt the server cart after signing in.
    ///
    /// # Errors
    ///
    /// Returns the reload failure; the stored cart is kept in that case.
    #[instrument(skip(self))]
    pub async fn on_login(&mut self) -> Result<()> {
        info!("session started, adopting server cart");
        self.reload().await
    }

    /// Empty the cart after signing out.
    #[instrument(skip(self))]
    pub fn on_logout(&mut self) {
        self.store.replace(CartSnapshot::new());
        self.store.save();
        info!("session ended, cart emptied");
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Apply the resolution for `outcome` and report it to the caller.
    async fn settle(
        &mut self,
        operation: &'static str,
        checkpoint: Checkpoint,
        outcome: SyncOutcome,
        empty: EmptyReply,
    ) -> Result<()> {
        match &outcome {
            SyncOutcome::Rejected { code, message } => {
                warn!(operation, code, %message, "cart service rejected change, rolling back");
                add_breadcrumb(
                    "cart",
                    "Rolled back rejected change",
                    Some(&[("operation", operation), ("code", &code.to_string())]),
                );
            }
            SyncOutcome::NetworkFailure(e) => {
                warn!(operation, error = %e, "cart service unavailable, rolling back");
                add_breadcrumb(
                    "cart",
                    "Rolled back unsynced change",
                    Some(&[("operation", operation), ("error", &e.to_string())]),
                );
            }
            SyncOutcome::Applied(_) | SyncOutcome::AppliedAll(_) => {
                debug!(operation, "cart service confirmed change");
            }
        }

        match resolve(self.store.snapshot(), &checkpoint, &outcome, empty) {
            Resolution::Keep => {}
            Resolution::Replace(next) => {
                self.store.replace(next);
                self.store.save();
            }
            Resolution::Reload { fallback } => {
                add_breadcrumb("cart", "Reloading cart", Some(&[("operation", operation)]));
                self.reload_or(fallback).await;
            }
        }

        outcome.into_result()
    }

    /// Fetch the server cart, or settle on `fallback` if that is not possible.
    async fn reload_or(&mut self, fallback: CartSnapshot) {
        if self.is_authenticated() {
            match self.remote.fetch_cart().await {
                Ok(RemoteReply::Success(lines)) => {
                    let next = adopt_server_cart(self.store.snapshot(), lines);
                    self.store.replace(next);
                    self.store.save();
                    return;
                }
                Ok(RemoteReply::Rejected { code, message }) => {
                    warn!(code, %message, "cart reload rejected, using local fallback");
                }
                Err(e) => {
                    warn!(error = %e, "cart reload failed, using local fallback");
                }
            }
        }
        self.store.replace(fallback);
        self.store.save();
    }
}

impl<R> std::fmt::Debug for SyncEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("store", &self.store)
            .field("authenticated", &self.gate.is_authenticated())
            .finish_non_exhaustive()
    }
}
