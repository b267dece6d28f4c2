//! Integration test: RetryingClient over MockExchange behind the port trait

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tranche_core::{OrderSpec, OrderStatus, Side};
use tranche_gateway::{Backoff, MockExchange, MockOp, RetryPolicy, RetryingClient};
use tranche_ports::{ExchangeClient, ExchangeError};

fn client(mock: &Arc<MockExchange>, policy: RetryPolicy) -> Arc<dyn ExchangeClient> {
    Arc::new(RetryingClient::new(mock.clone(), policy))
}

#[tokio::test(start_paused = true)]
async fn test_order_lifecycle_through_port() {
    let _ = env_logger::try_init();

    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let exchange = client(&mock, RetryPolicy::default());

    let spec = OrderSpec::limit("BTCUSDT", Side::Buy, dec!(0.01), dec!(44000))
        .with_client_order_id("grid-0001-0");
    let ack = exchange.place_order(&spec).await.unwrap();
    assert_eq!(ack.status, OrderStatus::New);
    assert_eq!(ack.client_order_id.as_deref(), Some("grid-0001-0"));

    mock.set_price(dec!(43990));
    assert_eq!(
        exchange.order_status("BTCUSDT", &ack.order_id).await.unwrap(),
        OrderStatus::Filled
    );
    // Nothing left to cancel
    assert!(!exchange.cancel_order("BTCUSDT", &ack.order_id).await.unwrap());
    assert_eq!(exchange.name(), "mock");
}

#[tokio::test(start_paused = true)]
async fn test_transient_submit_failure_places_single_order() {
    let _ = env_logger::try_init();

    let mock = Arc::new(MockExchange::new(dec!(45000)));
    mock.fail_on(MockOp::PlaceOrder, 1, ExchangeError::transport("connection reset"));
    let exchange = client(
        &mock,
        RetryPolicy::default()
            .with_backoff(Backoff::Fixed)
            .with_base_delay(Duration::from_millis(100)),
    );

    let spec = OrderSpec::market("BTCUSDT", Side::Sell, dec!(0.02)).with_client_order_id("twap-x-0");
    let ack = exchange.place_order(&spec).await.unwrap();

    assert_eq!(ack.status, OrderStatus::Filled);
    assert_eq!(mock.call_count(MockOp::PlaceOrder), 2);
    assert_eq!(mock.orders().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy_surfaces_transport_error() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    mock.fail_on(MockOp::SymbolFilters, 1, ExchangeError::transport("timeout"));
    let exchange = client(&mock, RetryPolicy::none());

    let err = exchange.symbol_filters("BTCUSDT").await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(mock.call_count(MockOp::SymbolFilters), 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_orders_and_cancel_all_through_port() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    mock.fail_on(MockOp::CancelAll, 1, ExchangeError::transport("connection reset"));
    let exchange = client(&mock, RetryPolicy::default());

    let resting = OrderSpec::limit("BTCUSDT", Side::Buy, dec!(0.01), dec!(44000));
    exchange.place_order(&resting).await.unwrap();
    exchange
        .place_order(&OrderSpec::stop_market("BTCUSDT", Side::Sell, dec!(0.01), dec!(43000)))
        .await
        .unwrap();

    let open = exchange.list_open_orders("BTCUSDT").await.unwrap();
    assert_eq!(open.len(), 2);
    assert_eq!(open[1].stop_price, Some(dec!(43000)));

    exchange.cancel_all_orders("BTCUSDT").await.unwrap();
    assert_eq!(mock.call_count(MockOp::CancelAll), 2);
    assert!(exchange.list_open_orders("BTCUSDT").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_query_order_reports_fill() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let exchange = client(&mock, RetryPolicy::default());

    let ack = exchange
        .place_order(&OrderSpec::limit("BTCUSDT", Side::Sell, dec!(0.02), dec!(45500)))
        .await
        .unwrap();
    mock.set_price(dec!(45600));

    let report = exchange.query_order("BTCUSDT", &ack.order_id).await.unwrap();
    assert_eq!(report.status, OrderStatus::Filled);
    assert_eq!(report.executed_qty, dec!(0.02));
    assert_eq!(report.avg_price, Some(dec!(45500)));
}
