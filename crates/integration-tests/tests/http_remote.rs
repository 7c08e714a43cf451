//! Integration tests for the REST cart client.
//!
//! These tests run [`HttpCartRemote`] against the in-process fake cart
//! service and check envelope handling, business codes, session teardown,
//! and transport failures.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde_json::json;
use storecart_core::{CartLineId, Price, ProductId, ProductStatus};
use storecart_integration_tests::{FakeCartService, Fault, INSUFFICIENT_STOCK, TEST_TOKEN, remote_for};
use storecart_sync::session::{ROLE_KEY, TOKEN_KEY};
use storecart_sync::{
    CartRemote, DurableStorage, HttpCartRemote, IdentityGate, MemoryStorage, RemoteReply,
    SessionContext, TransportError,
};

const TIMEOUT: Duration = Duration::from_secs(5);

struct Setup {
    service: FakeCartService,
    storage: Arc<MemoryStorage>,
    session: Arc<SessionContext>,
    remote: HttpCartRemote,
}

async fn setup_with_timeout(timeout: Duration) -> Setup {
    let service = FakeCartService::spawn().await.unwrap();
    service.add_product(10, "Dried Pineapple", 12.5, 5);
    service.add_product(11, "Coconut Chips", 4.0, 100);

    let storage = Arc::new(MemoryStorage::new());
    let session = SessionContext::init(storage.clone());
    session.login(TEST_TOKEN, None);
    let remote = remote_for(&service, session.clone(), timeout).unwrap();

    Setup {
        service,
        storage,
        session,
        remote,
    }
}

async fn setup() -> Setup {
    setup_with_timeout(TIMEOUT).await
}

// =============================================================================
// Envelope Mapping Tests
// =============================================================================

#[tokio::test]
async fn test_fetch_cart_normalizes_server_lines() {
    let s = setup().await;
    s.service.put_line(1, 10, 2);
    s.service.put_line(2, 11, 1);

    let RemoteReply::Success(lines) = s.remote.fetch_cart().await.unwrap() else {
        panic!("expected success");
    };

    assert_eq!(lines.len(), 2);
    let first = lines.first().unwrap();
    assert_eq!(first.id, Some(CartLineId::new(1)));
    assert_eq!(first.product_id, ProductId::new(10));
    assert_eq!(first.quantity, 2);
    assert_eq!(first.name.as_deref(), Some("Dried Pineapple"));
    assert_eq!(first.price, Some("12.5".parse::<Price>().unwrap()));
    assert_eq!(first.product_stock, Some(5));
    assert_eq!(first.product_status, Some(ProductStatus::OnSale));
    assert_eq!(s.service.requests(), vec!["GET /cart/list"]);
}

#[tokio::test]
async fn test_add_line_returns_server_line() {
    let s = setup().await;

    let reply = s.remote.add_line(ProductId::new(11), 1).await.unwrap();
    let RemoteReply::Success(Some(line)) = reply else {
        panic!("expected a line, got {reply:?}");
    };
    assert_eq!(line.id, Some(CartLineId::new(1)));
    assert_eq!(line.quantity, 1);

    let reply = s.remote.add_line(ProductId::new(11), 1).await.unwrap();
    assert!(matches!(reply, RemoteReply::Success(Some(ref line)) if line.quantity == 2));
}

#[tokio::test]
async fn test_add_beyond_stock_is_rejected() {
    let s = setup().await;
    s.service.put_line(1, 10, 5);

    let reply = s.remote.add_line(ProductId::new(10), 1).await.unwrap();

    assert_eq!(
        reply,
        RemoteReply::Rejected {
            code: INSUFFICIENT_STOCK,
            message: "insufficient stock".to_string()
        }
    );
}

#[tokio::test]
async fn test_set_quantity_zero_reports_removed_line() {
    let s = setup().await;
    s.service.put_line(1, 10, 2);

    let reply = s.remote.set_quantity(CartLineId::new(1), 0).await.unwrap();

    let RemoteReply::Success(Some(line)) = reply else {
        panic!("expected removed line, got {reply:?}");
    };
    assert_eq!(line.quantity, 0);
    assert_eq!(line.id, None);
    assert!(s.service.lines().is_empty());
}

#[tokio::test]
async fn test_selection_endpoints() {
    let s = setup().await;
    s.service.put_line(1, 10, 1);
    s.service.put_line(2, 11, 1);

    let reply = s.remote.toggle_selection(CartLineId::new(2), false).await.unwrap();
    assert!(matches!(reply, RemoteReply::Success(Some(ref line)) if !line.selected));

    let RemoteReply::Success(lines) = s.remote.select_all(false).await.unwrap() else {
        panic!("expected success");
    };
    assert!(lines.iter().all(|line| !line.selected));
    assert_eq!(
        s.service.requests(),
        vec!["PUT /cart/2/select", "PUT /cart/select-all?selected=false"]
    );
}

#[tokio::test]
async fn test_clear_and_remove() {
    let s = setup().await;
    s.service.put_line(1, 10, 1);
    s.service.put_line(2, 11, 1);

    assert_eq!(
        s.remote.remove_line(CartLineId::new(1)).await.unwrap(),
        RemoteReply::Success(())
    );
    assert!(matches!(
        s.remote.remove_line(CartLineId::new(1)).await.unwrap(),
        RemoteReply::Rejected { code: 404, .. }
    ));
    assert_eq!(s.remote.clear().await.unwrap(), RemoteReply::Success(()));
    assert!(s.service.lines().is_empty());
}

#[tokio::test]
async fn test_business_failure_is_rejection() {
    let s = setup().await;
    s.service.push_fault(Fault::Business(500, "internal error".to_string()));

    let reply = s.remote.clear().await.unwrap();

    assert_eq!(
        reply,
        RemoteReply::Rejected {
            code: 500,
            message: "internal error".to_string()
        }
    );
}

// =============================================================================
// Session Tests
// =============================================================================

#[tokio::test]
async fn test_http_401_signs_out() {
    let s = setup().await;
    s.session.login("stale-token", None);

    let err = s.remote.fetch_cart().await.unwrap_err();

    assert!(matches!(err, TransportError::Unauthorized));
    assert!(!s.session.is_authenticated());
    assert_eq!(s.storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(s.storage.get(ROLE_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_business_401_signs_out() {
    let s = setup().await;
    s.service.push_fault(Fault::ExpiredSession);

    let err = s.remote.clear().await.unwrap_err();

    assert!(matches!(err, TransportError::Unauthorized));
    assert!(!s.session.is_authenticated());
}

#[tokio::test]
async fn test_bearer_token_follows_session() {
    let s = setup().await;
    assert_eq!(s.session.bearer_token().unwrap().expose_secret(), TEST_TOKEN);
    assert!(s.remote.fetch_cart().await.is_ok());

    s.session.logout();
    assert!(matches!(
        s.remote.fetch_cart().await,
        Err(TransportError::Unauthorized)
    ));
}

// =============================================================================
// Transport Failure Tests
// =============================================================================

#[tokio::test]
async fn test_plain_http_error_keeps_status() {
    let s = setup().await;
    s.service.push_fault(Fault::Status(502, "bad gateway".to_string()));

    let err = s.remote.fetch_cart().await.unwrap_err();

    assert!(matches!(err, TransportError::Status { status: 502, ref body } if body == "bad gateway"));
    assert!(s.session.is_authenticated());
}

#[tokio::test]
async fn test_non_json_reply_is_parse_error() {
    let s = setup().await;
    s.service.push_fault(Fault::NotJson);

    let err = s.remote.fetch_cart().await.unwrap_err();

    assert!(matches!(err, TransportError::Parse(_)));
}

#[tokio::test]
async fn test_list_reply_must_be_array() {
    let s = setup().await;
    s.service.push_fault(Fault::Data(json!({ "items": [] })));

    let err = s.remote.fetch_cart().await.unwrap_err();

    assert!(matches!(err, TransportError::UnexpectedShape(_)));
}

#[tokio::test]
async fn test_slow_reply_times_out() {
    let s = setup_with_timeout(Duration::from_millis(200)).await;
    s.service.push_fault(Fault::Delay(Duration::from_secs(2)));

    let err = s.remote.fetch_cart().await.unwrap_err();

    assert!(matches!(err, TransportError::Timeout));
}
