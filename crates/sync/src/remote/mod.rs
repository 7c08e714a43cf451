//! Remote cart service contract.
//!
//! # Architecture
//!
//! - The cart service is the source of truth for signed-in shoppers
//! - [`CartRemote`] is the seam the sync engine calls through; tests plug in
//!   scripted doubles, production uses [`HttpCartRemote`]
//! - Replies separate business outcomes ([`RemoteReply`]) from transport
//!   failures ([`TransportError`])
//!
//! # Example
//!
//! ```rust,ignore
//! use storecart_sync::remote::{CartRemote, HttpCartRemote};
//!
//! let remote = HttpCartRemote::new(&config.api, session.clone())?;
//! let reply = remote.fetch_cart().await?;
//! ```

mod http;

use std::future::Future;

use storecart_core::{CartLineId, ProductId};
use thiserror::Error;

use crate::model::CartLineItem;

pub use http::HttpCartRemote;

/// Business code the cart service uses for success.
pub const SUCCESS_CODE: i64 = 200;

/// Business code the cart service uses for an expired or missing session.
pub const UNAUTHORIZED_CODE: i64 = 401;

/// Errors that prevent a request from producing a business reply.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Non-success HTTP status without a business envelope.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Reply parsed but did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Session expired or was rejected; the session has been signed out.
    #[error("session expired, sign in again")]
    Unauthorized,

    /// Endpoint URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Business outcome of a cart service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteReply<T> {
    /// The service accepted the request.
    Success(T),
    /// The service refused the request (e.g. insufficient stock).
    Rejected {
        /// Business status code.
        code: i64,
        /// Human-readable reason.
        message: String,
    },
}

impl<T> RemoteReply<T> {
    /// Transform the success payload.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RemoteReply<U> {
        match self {
            Self::Success(value) => RemoteReply::Success(f(value)),
            Self::Rejected { code, message } => RemoteReply::Rejected { code, message },
        }
    }
}

/// Result of one cart service call.
pub type RemoteResult<T> = Result<RemoteReply<T>, TransportError>;

/// The remote cart service, as seen by the sync engine.
pub trait CartRemote: Send + Sync {
    /// Authoritative list of cart lines.
    fn fetch_cart(&self) -> impl Future<Output = RemoteResult<Vec<CartLineItem>>> + Send;

    /// Add `quantity` units of `product`. May return the resulting line.
    fn add_line(
        &self,
        product: ProductId,
        quantity: u32,
    ) -> impl Future<Output = RemoteResult<Option<CartLineItem>>> + Send;

    /// Set a line's quantity; zero removes it. May return the resulting line.
    fn set_quantity(
        &self,
        line: CartLineId,
        quantity: u32,
    ) -> impl Future<Output = RemoteResult<Option<CartLineItem>>> + Send;

    /// Set a line's selection flag. May return the resulting line.
    fn toggle_selection(
        &self,
        line: CartLineId,
        selected: bool,
    ) -> impl Future<Output = RemoteResult<Option<CartLineItem>>> + Send;

    /// Remove every line.
    fn clear(&self) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Remove one line.
    fn remove_line(&self, line: CartLineId) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Set the selection flag on every line. Returns the resulting lines.
    fn select_all(
        &self,
        selected: bool,
    ) -> impl Future<Output = RemoteResult<Vec<CartLineItem>>> + Send;
}
