//! REST implementation of [`CartRemote`].
//!
//! Every endpoint answers with the envelope `{code, message, data}` where
//! `code == 200` means success. Requests carry the session's bearer token.
//! An HTTP 401 or business code 401 signs the session out.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use storecart_core::{CartLineId, ProductId};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    CartRemote, RemoteReply, RemoteResult, SUCCESS_CODE, TransportError, UNAUTHORIZED_CODE,
};
use crate::config::ApiConfig;
use crate::model::CartLineItem;
use crate::normalize::normalize_line;
use crate::session::SessionContext;

/// Longest response body excerpt kept in errors and logs.
const BODY_EXCERPT_LEN: usize = 200;

/// Response envelope shared by all cart endpoints.
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    message: Option<String>,
    data: Option<Value>,
}

// =============================================================================
// HttpCartRemote
// =============================================================================

/// Client for the REST cart service.
#[derive(Clone)]
pub struct HttpCartRemote {
    inner: Arc<HttpCartRemoteInner>,
}

struct HttpCartRemoteInner {
    client: reqwest::Client,
    base_url: Url,
    session: Arc<SessionContext>,
}

impl HttpCartRemote {
    /// Create a client for the service at `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, session: Arc<SessionContext>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        // Url::join drops the last path segment unless the base ends in '/'
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(HttpCartRemoteInner {
                client,
                base_url,
                session,
            }),
        })
    }

    /// Base URL all endpoints are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Send a request and unwrap the business envelope.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<RemoteReply<Value>, TransportError> {
        let mut request = self.inner.client.request(method, url);
        if let Some(token) = self.inner.session.bearer_token() {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        let text = response.text().await.map_err(classify)?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(self.expire_session());
        }

        let envelope = match serde_json::from_str::<Envelope>(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body: excerpt(&text),
                });
            }
            Err(e) => {
                warn!(error = %e, body = %excerpt(&text), "cart service reply is not an envelope");
                return Err(TransportError::Parse(e));
            }
        };

        if envelope.code == UNAUTHORIZED_CODE {
            return Err(self.expire_session());
        }

        if status.is_success() && envelope.code == SUCCESS_CODE {
            return Ok(RemoteReply::Success(envelope.data.unwrap_or(Value::Null)));
        }

        let code = if envelope.code == SUCCESS_CODE {
            i64::from(status.as_u16())
        } else {
            envelope.code
        };
        let message = envelope
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("request failed ({code})"));
        debug!(code, %message, "cart service rejected request");
        Ok(RemoteReply::Rejected { code, message })
    }

    fn expire_session(&self) -> TransportError {
        warn!("cart service rejected the session, signing out");
        self.inner.session.logout();
        TransportError::Unauthorized
    }
}

impl CartRemote for HttpCartRemote {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> RemoteResult<Vec<CartLineItem>> {
        let url = self.endpoint("cart/list")?;
        let reply = self.execute(Method::GET, url, None).await?;
        match reply {
            RemoteReply::Success(data) => {
                let lines = decode_lines(data)?;
                debug!(lines = lines.len(), "fetched cart");
                Ok(RemoteReply::Success(lines))
            }
            RemoteReply::Rejected { code, message } => Ok(RemoteReply::Rejected { code, message }),
        }
    }

    #[instrument(skip(self), fields(product = %product))]
    async fn add_line(&self, product: ProductId, quantity: u32) -> RemoteResult<Option<CartLineItem>> {
        let url = self.endpoint("cart/add")?;
        let body = json!({ "productId": product, "quantity": quantity });
        Ok(self.execute(Method::POST, url, Some(body)).await?.map(decode_line))
    }

    #[instrument(skip(self), fields(line = %line))]
    async fn set_quantity(&self, line: CartLineId, quantity: u32) -> RemoteResult<Option<CartLineItem>> {
        let url = self.endpoint("cart/update")?;
        let body = json!({ "id": line, "quantity": quantity });
        Ok(self.execute(Method::PUT, url, Some(body)).await?.map(decode_line))
    }

    #[instrument(skip(self), fields(line = %line))]
    async fn toggle_selection(&self, line: CartLineId, selected: bool) -> RemoteResult<Option<CartLineItem>> {
        let url = self.endpoint(&format!("cart/{line}/select"))?;
        let body = json!({ "selected": selected });
        Ok(self.execute(Method::PUT, url, Some(body)).await?.map(decode_line))
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> RemoteResult<()> {
        let url = self.endpoint("cart/clear")?;
        Ok(self.execute(Method::DELETE, url, None).await?.map(|_| ()))
    }

    #[instrument(skip(self), fields(line = %line))]
    async fn remove_line(&self, line: CartLineId) -> RemoteResult<()> {
        let url = self.endpoint(&format!("cart/remove/{line}"))?;
        Ok(self.execute(Method::DELETE, url, None).await?.map(|_| ()))
    }

    #[instrument(skip(self))]
    async fn select_all(&self, selected: bool) -> RemoteResult<Vec<CartLineItem>> {
        let mut url = self.endpoint("cart/select-all")?;
        url.query_pairs_mut()
            .append_pair("selected", if selected { "true" } else { "false" });
        match self.execute(Method::PUT, url, None).await? {
            RemoteReply::Success(data) => Ok(RemoteReply::Success(decode_lines(data)?)),
            RemoteReply::Rejected { code, message } => Ok(RemoteReply::Rejected { code, message }),
        }
    }
}

impl std::fmt::Debug for HttpCartRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartRemote")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(e)
    }
}

/// A single line payload. Null or unrecognizable payloads mean "no line".
fn decode_line(data: Value) -> Option<CartLineItem> {
    normalize_line(&data)
}

/// A list payload. Anything but an array is a malformed reply.
fn decode_lines(data: Value) -> Result<Vec<CartLineItem>, TransportError> {
    match data {
        Value::Array(items) => Ok(items.iter().filter_map(normalize_line).collect()),
        other => Err(TransportError::UnexpectedShape(format!(
            "expected an array of cart lines, got {}",
            excerpt(&other.to_string())
        ))),
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(BODY_EXCERPT_LEN).collect()
}
