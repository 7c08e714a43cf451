//! Pure reconciliation of optimistic cart changes.
//!
//! Every mutating engine operation records a [`Checkpoint`] before touching
//! the cart, applies its change optimistically, and then turns the remote
//! call's [`SyncOutcome`] into a [`Resolution`] through [`resolve`]. Nothing
//! here performs I/O, so the rollback rules are tested directly.

use crate::error::CartError;
use crate::model::{CartLineItem, CartSnapshot, LineKey};
use crate::remote::{RemoteReply, RemoteResult, TransportError};

// =============================================================================
// SyncOutcome
// =============================================================================

/// What the cart service made of a mutation.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Accepted, optionally returning the resulting line.
    Applied(Option<CartLineItem>),
    /// Accepted, returning the resulting cart.
    AppliedAll(Vec<CartLineItem>),
    /// Refused with a business status code.
    Rejected {
        /// Business status code.
        code: i64,
        /// Human-readable reason.
        message: String,
    },
    /// No usable reply.
    NetworkFailure(TransportError),
}

impl SyncOutcome {
    /// The error to report to the caller, if any.
    ///
    /// # Errors
    ///
    /// Returns `RemoteRejected` or `TransportFailure` for failed outcomes.
    pub fn into_result(self) -> Result<(), CartError> {
        match self {
            Self::Applied(_) | Self::AppliedAll(_) => Ok(()),
            Self::Rejected { code, message } => Err(CartError::RemoteRejected { code, message }),
            Self::NetworkFailure(e) => Err(CartError::TransportFailure(e)),
        }
    }
}

impl From<RemoteResult<Option<CartLineItem>>> for SyncOutcome {
    fn from(result: RemoteResult<Option<CartLineItem>>) -> Self {
        match result {
            Ok(RemoteReply::Success(line)) => Self::Applied(line),
            Ok(RemoteReply::Rejected { code, message }) => Self::Rejected { code, message },
            Err(e) => Self::NetworkFailure(e),
        }
    }
}

impl From<RemoteResult<()>> for SyncOutcome {
    fn from(result: RemoteResult<()>) -> Self {
        match result {
            Ok(RemoteReply::Success(())) => Self::Applied(None),
            Ok(RemoteReply::Rejected { code, message }) => Self::Rejected { code, message },
            Err(e) => Self::NetworkFailure(e),
        }
    }
}

impl From<RemoteResult<Vec<CartLineItem>>> for SyncOutcome {
    fn from(result: RemoteResult<Vec<CartLineItem>>) -> Self {
        match result {
            Ok(RemoteReply::Success(lines)) => Self::AppliedAll(lines),
            Ok(RemoteReply::Rejected { code, message }) => Self::Rejected { code, message },
            Err(e) => Self::NetworkFailure(e),
        }
    }
}

// =============================================================================
// Checkpoint
// =============================================================================

/// Pre-mutation state needed to undo an optimistic change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checkpoint {
    /// A single line changed.
    Line {
        /// Key the line is found under after the optimistic change.
        key: LineKey,
        /// Index the line held before the change.
        index: usize,
        /// The line before the change; `None` if it did not exist.
        prior: Option<CartLineItem>,
        /// Undo by reloading from the service instead of restoring `prior`.
        reload_on_failure: bool,
    },
    /// The whole cart changed.
    Whole(CartSnapshot),
}

impl Checkpoint {
    /// Checkpoint for a change to one line that can be undone in place.
    #[must_use]
    pub const fn line(key: LineKey, index: usize, prior: Option<CartLineItem>) -> Self {
        Self::Line {
            key,
            index,
            prior,
            reload_on_failure: false,
        }
    }

    /// Checkpoint for a change whose undo is ambiguous.
    #[must_use]
    pub const fn ambiguous(key: LineKey, index: usize, prior: Option<CartLineItem>) -> Self {
        Self::Line {
            key,
            index,
            prior,
            reload_on_failure: true,
        }
    }

    /// `current` with the checkpointed state put back.
    #[must_use]
    pub fn restore(&self, current: &CartSnapshot) -> CartSnapshot {
        match self {
            Self::Whole(prior) => prior.clone(),
            Self::Line {
                key, index, prior, ..
            } => {
                let mut next = current.clone();
                match prior {
                    Some(prior) => match next.position(key) {
                        Some(position) => next.replace_at(position, prior.clone()),
                        None => next.insert(*index, prior.clone()),
                    },
                    None => {
                        next.remove(key);
                    }
                }
                next
            }
        }
    }

    const fn reloads_on_failure(&self) -> bool {
        matches!(
            self,
            Self::Line {
                reload_on_failure: true,
                ..
            }
        )
    }

    const fn target(&self) -> Option<&LineKey> {
        match self {
            Self::Line { key, .. } => Some(key),
            Self::Whole(_) => None,
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// How to treat a success that returned no line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReply {
    /// The optimistic state stands.
    Keep,
    /// Fetch the authoritative cart.
    Reload,
}

/// What the engine does with the cart after a remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Leave the optimistic state in place.
    Keep,
    /// Swap in this cart.
    Replace(CartSnapshot),
    /// Fetch the authoritative cart; use `fallback` if that fails.
    Reload {
        /// Cart to use when the reload fails.
        fallback: CartSnapshot,
    },
}

/// Decide the cart that follows `outcome`.
#[must_use]
pub fn resolve(
    current: &CartSnapshot,
    checkpoint: &Checkpoint,
    outcome: &SyncOutcome,
    empty: EmptyReply,
) -> Resolution {
    match outcome {
        SyncOutcome::Applied(Some(server)) => {
            let target = checkpoint.target().copied().unwrap_or_else(|| server.key());
            Resolution::Replace(apply_server_line(current, &target, server.clone()))
        }
        SyncOutcome::Applied(None) => match empty {
            EmptyReply::Keep => Resolution::Keep,
            EmptyReply::Reload => Resolution::Reload {
                fallback: current.clone(),
            },
        },
        SyncOutcome::AppliedAll(lines) => {
            Resolution::Replace(adopt_server_cart(current, lines.clone()))
        }
        SyncOutcome::Rejected { .. } | SyncOutcome::NetworkFailure(_) => {
            let restored = checkpoint.restore(current);
            if checkpoint.reloads_on_failure() {
                Resolution::Reload { fallback: restored }
            } else {
                Resolution::Replace(restored)
            }
        }
    }
}

/// `current` with one server-confirmed line applied.
///
/// A zero quantity removes the target (and any line holding the server's
/// ID). Otherwise the server line replaces the target in place, keeping
/// locally known display fields the server left out, or is appended if the
/// target is gone.
#[must_use]
pub fn apply_server_line(
    current: &CartSnapshot,
    target: &LineKey,
    server: CartLineItem,
) -> CartSnapshot {
    let mut next = current.clone();
    let server_key = server.id.map(LineKey::Remote);

    if server.quantity == 0 {
        next.remove(target);
        if let Some(key) = server_key {
            next.remove(&key);
        }
        return next;
    }

    let position = next
        .position(target)
        .or_else(|| server_key.and_then(|key| next.position(&key)));
    match position {
        Some(index) => {
            let merged = server.merged_over(next.lines().get(index));
            next.replace_at(index, merged);
        }
        None => next.push(server),
    }
    next
}

/// The server's cart, keeping locally known display fields it left out.
#[must_use]
pub fn adopt_server_cart(current: &CartSnapshot, lines: Vec<CartLineItem>) -> CartSnapshot {
    CartSnapshot::from_lines(lines.into_iter().map(|line| {
        let local = current.get(&line.key()).or_else(|| {
            current
                .position_of_product(line.product_id)
                .and_then(|index| current.lines().get(index))
        });
        line.merged_over(local)
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use storecart_core::{CartLineId, ProductId};

    use super::*;
    use crate::model::tests::line;

    fn key(id: i64) -> LineKey {
        LineKey::Remote(CartLineId::new(id))
    }

    fn rejected() -> SyncOutcome {
        SyncOutcome::Rejected {
            code: 1302,
            message: "insufficient stock".to_string(),
        }
    }

    #[test]
    fn test_rejection_restores_prior_quantity() {
        let before = CartSnapshot::from_lines([line(1, 10, 2), line(2, 11, 1)]);
        let mut after = before.clone();
        after.replace_at(0, line(1, 10, 3));

        let checkpoint = Checkpoint::line(key(1), 0, Some(line(1, 10, 2)));
        let resolution = resolve(&after, &checkpoint, &rejected(), EmptyReply::Reload);
        assert_eq!(resolution, Resolution::Replace(before));
    }

    #[test]
    fn test_failure_undoes_append() {
        let before = CartSnapshot::from_lines([line(1, 10, 2)]);
        let mut added = line(0, 11, 1);
        added.id = None;
        let mut after = before.clone();
        after.push(added);

        let checkpoint = Checkpoint::line(LineKey::Local(ProductId::new(11)), 1, None);
        let outcome = SyncOutcome::NetworkFailure(TransportError::Timeout);
        assert_eq!(
            resolve(&after, &checkpoint, &outcome, EmptyReply::Keep),
            Resolution::Replace(before)
        );
    }

    #[test]
    fn test_failure_reinserts_removed_line_at_index() {
        let before = CartSnapshot::from_lines([line(1, 10, 1), line(2, 11, 1), line(3, 12, 1)]);
        let mut after = before.clone();
        after.remove(&key(2));

        let checkpoint = Checkpoint::line(key(2), 1, Some(line(2, 11, 1)));
        assert_eq!(checkpoint.restore(&after), before);
    }

    #[test]
    fn test_ambiguous_failure_reloads_with_restored_fallback() {
        let before = CartSnapshot::from_lines([line(1, 10, 2)]);
        let mut after = before.clone();
        after.remove(&key(1));

        let checkpoint = Checkpoint::ambiguous(key(1), 0, Some(line(1, 10, 2)));
        assert_eq!(
            resolve(&after, &checkpoint, &rejected(), EmptyReply::Keep),
            Resolution::Reload { fallback: before }
        );
    }

    #[test]
    fn test_whole_checkpoint_restores_order() {
        let before = CartSnapshot::from_lines([line(1, 10, 1), line(2, 11, 2), line(3, 12, 3)]);
        let checkpoint = Checkpoint::Whole(before.clone());
        let outcome = SyncOutcome::NetworkFailure(TransportError::Timeout);
        assert_eq!(
            resolve(&CartSnapshot::new(), &checkpoint, &outcome, EmptyReply::Keep),
            Resolution::Replace(before)
        );
    }

    #[test]
    fn test_empty_success_policy() {
        let current = CartSnapshot::from_lines([line(1, 10, 2)]);
        let checkpoint = Checkpoint::line(key(1), 0, Some(line(1, 10, 1)));
        let outcome = SyncOutcome::Applied(None);
        assert_eq!(
            resolve(&current, &checkpoint, &outcome, EmptyReply::Keep),
            Resolution::Keep
        );
        assert_eq!(
            resolve(&current, &checkpoint, &outcome, EmptyReply::Reload),
            Resolution::Reload { fallback: current }
        );
    }

    #[test]
    fn test_server_zero_quantity_removes_line() {
        let current = CartSnapshot::from_lines([line(1, 10, 2), line(2, 11, 1)]);
        let next = apply_server_line(&current, &key(1), line(1, 10, 0));
        assert_eq!(next, CartSnapshot::from_lines([line(2, 11, 1)]));
    }

    #[test]
    fn test_server_line_adopts_remote_id() {
        let mut local = line(0, 10, 1);
        local.id = None;
        local.product_image = Some("img.png".to_string());
        let current = CartSnapshot::from_lines([local]);

        let mut server = line(9, 10, 1);
        server.price = Some("12.50".parse().unwrap());
        let next = apply_server_line(&current, &LineKey::Local(ProductId::new(10)), server);

        assert_eq!(next.len(), 1);
        let adopted = &next.lines()[0];
        assert_eq!(adopted.id, Some(CartLineId::new(9)));
        assert_eq!(adopted.price, Some("12.50".parse().unwrap()));
        assert_eq!(adopted.product_image.as_deref(), Some("img.png"));
    }

    #[test]
    fn test_server_line_for_missing_target_is_appended() {
        let current = CartSnapshot::from_lines([line(1, 10, 1)]);
        let next = apply_server_line(&current, &key(5), line(5, 12, 4));
        assert_eq!(next.len(), 2);
        assert_eq!(next.lines()[1].quantity, 4);
    }

    #[test]
    fn test_adopt_server_cart_keeps_local_display_fields() {
        let mut local = line(1, 10, 1);
        local.product_image = Some("a.png".to_string());
        let current = CartSnapshot::from_lines([local]);

        let mut server = line(1, 10, 3);
        server.product_image = None;
        server.selected = false;
        let next = adopt_server_cart(&current, vec![server, line(2, 11, 0)]);

        assert_eq!(next.len(), 1);
        assert_eq!(next.lines()[0].quantity, 3);
        assert!(!next.lines()[0].selected);
        assert_eq!(next.lines()[0].product_image.as_deref(), Some("a.png"));
    }

    #[test]
    fn test_server_line_without_price_keeps_cached_price() {
        let current = CartSnapshot::from_lines([line(1, 10, 2)]);
        let server = crate::normalize::normalize_line(&serde_json::json!({
            "id": 1,
            "productId": 10,
            "quantity": 3
        }))
        .unwrap();

        let next = apply_server_line(&current, &key(1), server.clone());
        let merged = &next.lines()[0];
        assert_eq!(merged.quantity, 3);
        assert_eq!(merged.price, Some("10".parse().unwrap()));
        assert_eq!(merged.name.as_deref(), Some("Product 10"));
        assert_eq!(next.total_price(), "30".parse().unwrap());

        let adopted = adopt_server_cart(&current, vec![server]);
        assert_eq!(adopted.lines()[0].price, Some("10".parse().unwrap()));
    }

    #[test]
    fn test_outcome_into_result() {
        assert!(SyncOutcome::Applied(None).into_result().is_ok());
        assert!(matches!(
            rejected().into_result(),
            Err(CartError::RemoteRejected { code: 1302, .. })
        ));
        assert!(matches!(
            SyncOutcome::NetworkFailure(TransportError::Timeout).into_result(),
            Err(CartError::TransportFailure(TransportError::Timeout))
        ));
    }

    #[test]
    fn test_outcome_from_remote_results() {
        let ok: RemoteResult<()> = Ok(RemoteReply::Success(()));
        assert!(matches!(SyncOutcome::from(ok), SyncOutcome::Applied(None)));

        let listed: RemoteResult<Vec<CartLineItem>> = Ok(RemoteReply::Success(vec![line(1, 10, 1)]));
        assert!(matches!(SyncOutcome::from(listed), SyncOutcome::AppliedAll(ref lines) if lines.len() == 1));

        let failed: RemoteResult<Option<CartLineItem>> = Err(TransportError::Unauthorized);
        assert!(matches!(
            SyncOutcome::from(failed),
            SyncOutcome::NetworkFailure(TransportError::Unauthorized)
        ));
    }
}
