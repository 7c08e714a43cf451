//! Engine error type with Sentry breadcrumbs.
//!
//! Every engine operation returns `Result<T, CartError>`. By the time an error
//! reaches the caller the cart has already been rolled back or reloaded, so
//! callers only decide how to tell the shopper.

use thiserror::Error;

use crate::model::LineKey;
use crate::remote::TransportError;

/// Errors surfaced by the sync engine.
#[derive(Debug, Error)]
pub enum CartError {
    /// No line with this key exists in the cart.
    #[error("cart line not found: {0}")]
    LineNotFound(LineKey),

    /// The cart service refused the change.
    #[error("cart service rejected the request ({code}): {message}")]
    RemoteRejected {
        /// Business status code.
        code: i64,
        /// Human-readable reason.
        message: String,
    },

    /// The cart service could not be reached or answered unusably.
    #[error("cart service unavailable: {0}")]
    TransportFailure(#[from] TransportError),
}

impl CartError {
    /// Whether the cart is still consistent and usable after this error.
    ///
    /// Always true: the engine restores or reloads before returning.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::LineNotFound(_) | Self::RemoteRejected { .. } | Self::TransportFailure(_)
        )
    }

    /// Whether the session was signed out while handling this error.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::TransportFailure(TransportError::Unauthorized))
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Add a breadcrumb for a cart decision.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// changes, rollbacks and reloads leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Rolled back quantity change", Some(&[("line", "42")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use storecart_core::CartLineId;

    use super::*;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::LineNotFound(LineKey::Remote(CartLineId::new(7)));
        assert_eq!(err.to_string(), "cart line not found: 7");

        let err = CartError::RemoteRejected {
            code: 1302,
            message: "insufficient stock".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cart service rejected the request (1302): insufficient stock"
        );
    }

    #[test]
    fn test_every_error_is_recoverable() {
        let errors = [
            CartError::LineNotFound(LineKey::Remote(CartLineId::new(1))),
            CartError::RemoteRejected {
                code: 500,
                message: String::new(),
            },
            CartError::from(TransportError::Timeout),
        ];
        assert!(errors.iter().all(CartError::is_recoverable));
    }

    #[test]
    fn test_unauthorized_detection() {
        assert!(CartError::from(TransportError::Unauthorized).is_unauthorized());
        assert!(!CartError::from(TransportError::Timeout).is_unauthorized());
    }

    #[test]
    fn test_breadcrumb_without_client_is_noop() {
        add_breadcrumb("cart", "test", Some(&[("line", "1")]));
        add_breadcrumb("cart", "test", None);
    }
}
