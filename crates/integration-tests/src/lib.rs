//! Integration tests for Storecart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p storecart-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `http_remote` - REST client against the fake cart service
//! - `engine_sync` - Sync engine end to end over HTTP
//!
//! # Fake cart service
//!
//! [`FakeCartService`] is an in-process `axum` server bound to an ephemeral
//! port. It mirrors the cart service's REST contract: the `{code, message,
//! data}` envelope, bearer-token checks, stock limits (business code 1302),
//! and the zero-quantity reply for removed lines. Tests queue [`Fault`]s to
//! make the next request misbehave.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::Deserialize;
use serde_json::{Value, json};
use storecart_core::UserRole;
use storecart_sync::{ApiConfig, HttpCartRemote, MemoryStorage, SessionContext, SyncEngine};
use url::Url;

/// Token the fake service accepts.
pub const TEST_TOKEN: &str = "test-token-8f3a";

/// Business code for insufficient stock.
pub const INSUFFICIENT_STOCK: i64 = 1302;

// =============================================================================
// Fake service state
// =============================================================================

/// A product the fake service can put in carts.
#[derive(Debug, Clone)]
pub struct FakeProduct {
    pub name: String,
    pub price: f64,
    pub stock: u32,
    pub status: i64,
}

/// A line in the fake service's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeLine {
    pub id: i64,
    pub product_id: i64,
    pub quantity: u32,
    pub selected: bool,
}

/// Misbehavior applied to the next request.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Plain HTTP error without an envelope.
    Status(u16, String),
    /// Envelope with a non-success business code.
    Business(i64, String),
    /// Envelope with business code 401.
    ExpiredSession,
    /// Answer normally after a delay.
    Delay(Duration),
    /// HTTP 200 with a body that is not JSON.
    NotJson,
    /// Success envelope whose `data` is the given value.
    Data(Value),
}

#[derive(Debug, Default)]
struct FakeState {
    token: String,
    products: HashMap<i64, FakeProduct>,
    lines: Vec<FakeLine>,
    next_id: i64,
    faults: VecDeque<Fault>,
    requests: Vec<String>,
}

impl FakeState {
    fn dto(&self, line: &FakeLine) -> Value {
        let product = self.products.get(&line.product_id);
        json!({
            "id": line.id,
            "productId": line.product_id,
            "quantity": line.quantity,
            "selected": line.selected,
            "productName": product.map(|p| p.name.clone()),
            "productImage": null,
            "productPrice": product.map(|p| p.price),
            "productStock": product.map(|p| p.stock),
            "productStatus": product.map(|p| p.status),
        })
    }

    fn all_dtos(&self) -> Value {
        Value::Array(self.lines.iter().map(|line| self.dto(line)).collect())
    }

    fn stock_of(&self, product_id: i64) -> u32 {
        self.products.get(&product_id).map_or(0, |p| p.stock)
    }
}

type Shared = Arc<Mutex<FakeState>>;

fn lock(shared: &Shared) -> MutexGuard<'_, FakeState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// FakeCartService
// =============================================================================

/// In-process fake of the remote cart service.
#[derive(Debug, Clone)]
pub struct FakeCartService {
    addr: SocketAddr,
    state: Shared,
}

impl FakeCartService {
    /// Start the service on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            token: TEST_TOKEN.to_string(),
            ..FakeState::default()
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = router(state.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "fake cart service stopped");
            }
        });

        Ok(Self { addr, state })
    }

    /// Base URL of the cart API.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not form a URL.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://{}/api", self.addr))
    }

    /// Register a product.
    pub fn add_product(&self, id: i64, name: &str, price: f64, stock: u32) {
        lock(&self.state).products.insert(
            id,
            FakeProduct {
                name: name.to_string(),
                price,
                stock,
                status: 1,
            },
        );
    }

    /// Put a line straight into the server cart.
    pub fn put_line(&self, id: i64, product_id: i64, quantity: u32) {
        let mut state = lock(&self.state);
        state.next_id = state.next_id.max(id);
        state.lines.push(FakeLine {
            id,
            product_id,
            quantity,
            selected: true,
        });
    }

    /// Make the next request misbehave. Faults apply in FIFO order.
    pub fn push_fault(&self, fault: Fault) {
        lock(&self.state).faults.push_back(fault);
    }

    /// Lines in the server cart.
    #[must_use]
    pub fn lines(&self) -> Vec<FakeLine> {
        lock(&self.state).lines.clone()
    }

    /// Requests received so far, as `METHOD path`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: Shared) -> Router {
    let cart = Router::new()
        .route("/cart/list", get(list))
        .route("/cart/add", post(add))
        .route("/cart/update", put(update))
        .route("/cart/{id}/select", put(select))
        .route("/cart/clear", delete(clear))
        .route("/cart/remove/{id}", delete(remove))
        .route("/cart/select-all", put(select_all))
        .with_state(state);
    Router::new().nest("/api", cart)
}

fn envelope(code: i64, message: &str, data: Value) -> Response {
    Json(json!({ "code": code, "message": message, "data": data })).into_response()
}

fn ok(data: Value) -> Response {
    envelope(200, "success", data)
}

/// Record the request, check the bearer token, and apply any queued fault.
async fn preflight(shared: &Shared, headers: &HeaderMap, request: String) -> Option<Response> {
    let (authorized, fault) = {
        let mut state = lock(shared);
        state.requests.push(request);
        let expected = format!("Bearer {}", state.token);
        let authorized = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected);
        (authorized, state.faults.pop_front())
    };

    if !authorized {
        return Some((StatusCode::UNAUTHORIZED, "missing or invalid token").into_response());
    }

    match fault? {
        Fault::Delay(delay) => {
            tokio::time::sleep(delay).await;
            None
        }
        Fault::Status(status, body) => Some(
            (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                body,
            )
                .into_response(),
        ),
        Fault::Business(code, message) => Some(envelope(code, &message, Value::Null)),
        Fault::ExpiredSession => Some(envelope(401, "session expired", Value::Null)),
        Fault::NotJson => Some((StatusCode::OK, "<html>maintenance</html>").into_response()),
        Fault::Data(data) => Some(ok(data)),
    }
}

async fn list(State(shared): State<Shared>, headers: HeaderMap) -> Response {
    if let Some(response) = preflight(&shared, &headers, "GET /cart/list".to_string()).await {
        return response;
    }
    ok(lock(&shared).all_dtos())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddBody {
    product_id: i64,
    quantity: u32,
}

async fn add(State(shared): State<Shared>, headers: HeaderMap, Json(body): Json<AddBody>) -> Response {
    if let Some(response) = preflight(&shared, &headers, "POST /cart/add".to_string()).await {
        return response;
    }

    let mut state = lock(&shared);
    if !state.products.contains_key(&body.product_id) {
        return envelope(404, "product not found", Value::Null);
    }
    let stock = state.stock_of(body.product_id);
    let existing = state
        .lines
        .iter()
        .position(|line| line.product_id == body.product_id);
    let current = existing
        .and_then(|index| state.lines.get(index))
        .map_or(0, |line| line.quantity);
    let wanted = current.saturating_add(body.quantity);
    if wanted > stock {
        return envelope(INSUFFICIENT_STOCK, "insufficient stock", Value::Null);
    }

    let line = match existing.and_then(|index| state.lines.get_mut(index)) {
        Some(line) => {
            line.quantity = wanted;
            line.clone()
        }
        None => {
            state.next_id += 1;
            let line = FakeLine {
                id: state.next_id,
                product_id: body.product_id,
                quantity: wanted,
                selected: true,
            };
            state.lines.push(line.clone());
            line
        }
    };
    ok(state.dto(&line))
}

#[derive(Debug, Deserialize)]
struct UpdateBody {
    id: i64,
    quantity: i64,
}

async fn update(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<UpdateBody>,
) -> Response {
    if let Some(response) = preflight(&shared, &headers, "PUT /cart/update".to_string()).await {
        return response;
    }

    let mut state = lock(&shared);
    let Some(index) = state.lines.iter().position(|line| line.id == body.id) else {
        return envelope(404, "cart item not found", Value::Null);
    };

    if body.quantity <= 0 {
        let removed = state.lines.remove(index);
        let mut dto = state.dto(&removed);
        dto["id"] = Value::Null;
        dto["quantity"] = json!(0);
        return ok(dto);
    }

    let quantity = u32::try_from(body.quantity).unwrap_or(u32::MAX);
    let stock = state
        .lines
        .get(index)
        .map_or(0, |line| state.stock_of(line.product_id));
    if quantity > stock {
        return envelope(INSUFFICIENT_STOCK, "insufficient stock", Value::Null);
    }
    let Some(line) = state.lines.get_mut(index) else {
        return envelope(404, "cart item not found", Value::Null);
    };
    line.quantity = quantity;
    let line = line.clone();
    ok(state.dto(&line))
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    selected: bool,
}

async fn select(
    State(shared): State<Shared>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<SelectBody>,
) -> Response {
    if let Some(response) = preflight(&shared, &headers, format!("PUT /cart/{id}/select")).await {
        return response;
    }

    let mut state = lock(&shared);
    let Some(line) = state.lines.iter_mut().find(|line| line.id == id) else {
        return envelope(404, "cart item not found", Value::Null);
    };
    line.selected = body.selected;
    let line = line.clone();
    ok(state.dto(&line))
}

async fn clear(State(shared): State<Shared>, headers: HeaderMap) -> Response {
    if let Some(response) = preflight(&shared, &headers, "DELETE /cart/clear".to_string()).await {
        return response;
    }
    lock(&shared).lines.clear();
    ok(Value::Null)
}

async fn remove(State(shared): State<Shared>, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    if let Some(response) = preflight(&shared, &headers, format!("DELETE /cart/remove/{id}")).await {
        return response;
    }

    let mut state = lock(&shared);
    let before = state.lines.len();
    state.lines.retain(|line| line.id != id);
    if state.lines.len() == before {
        return envelope(404, "cart item not found", Value::Null);
    }
    ok(Value::Null)
}

#[derive(Debug, Deserialize)]
struct SelectAllQuery {
    selected: bool,
}

async fn select_all(
    State(shared): State<Shared>,
    Query(query): Query<SelectAllQuery>,
    headers: HeaderMap,
) -> Response {
    let request = format!("PUT /cart/select-all?selected={}", query.selected);
    if let Some(response) = preflight(&shared, &headers, request).await {
        return response;
    }

    let mut state = lock(&shared);
    for line in &mut state.lines {
        line.selected = query.selected;
    }
    ok(state.all_dtos())
}

// =============================================================================
// Client harness
// =============================================================================

/// A fake service plus a client session, remote and engine wired to it.
pub struct Harness {
    pub service: FakeCartService,
    pub storage: Arc<MemoryStorage>,
    pub session: Arc<SessionContext>,
    pub engine: SyncEngine<HttpCartRemote>,
}

impl Harness {
    /// Start a fake service and a client with `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot start or the client cannot be
    /// built.
    pub async fn start(
        storage: MemoryStorage,
        signed_in: bool,
        timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let service = FakeCartService::spawn().await?;
        let storage = Arc::new(storage);
        let session = SessionContext::init(storage.clone());
        if signed_in {
            session.login(TEST_TOKEN, Some(UserRole::Customer));
        }
        let remote = remote_for(&service, session.clone(), timeout)?;
        let engine = SyncEngine::new(storage.clone(), remote, session.clone());

        Ok(Self {
            service,
            storage,
            session,
            engine,
        })
    }
}

/// An HTTP client for `service` sharing `session`.
///
/// # Errors
///
/// Returns an error if the client cannot be built.
pub fn remote_for(
    service: &FakeCartService,
    session: Arc<SessionContext>,
    timeout: Duration,
) -> Result<HttpCartRemote, Box<dyn std::error::Error>> {
    let config = ApiConfig {
        base_url: service.base_url()?,
        timeout,
    };
    Ok(HttpCartRemote::new(&config, session)?)
}
