//! TWAP integration tests
//!
//! Runs the scheduler against the mock exchange behind the retrying client,
//! with tokio time paused so a ten-minute schedule completes instantly.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tranche_clock::FixedClock;
use tranche_core::{OrderId, OrderType, Side, SymbolFilters, ValidationError};
use tranche_execution::{
    CancelToken, Error, SliceState, TwapConfig, TwapRequest, TwapScheduler,
};
use tranche_gateway::{MemoryAuditSink, MockExchange, MockOp, RetryPolicy, RetryingClient};
use tranche_ports::{ExchangeClient, ExchangeError};

fn scheduler(mock: &Arc<MockExchange>, audit: &Arc<MemoryAuditSink>, config: TwapConfig) -> TwapScheduler {
    let client: Arc<dyn ExchangeClient> =
        Arc::new(RetryingClient::new(mock.clone(), RetryPolicy::default()));
    TwapScheduler::with_config(
        client,
        audit.clone(),
        Arc::new(FixedClock::now_frozen()),
        config,
    )
}

fn ten_minute_buy() -> TwapRequest {
    TwapRequest::market("BTCUSDT", Side::Buy, dec!(0.1), Duration::from_secs(600), 5)
}

#[tokio::test(start_paused = true)]
async fn test_five_slices_on_schedule() {
    let _ = env_logger::try_init();

    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    let t0 = Instant::now();
    let summary = twap.run(ten_minute_buy(), &CancelToken::new()).await.unwrap();

    assert_eq!(summary.total_slices, 5);
    assert_eq!(summary.filled_slices, 5);
    assert_eq!(summary.failed_slices, 0);
    assert_eq!(summary.total_quantity_filled, dec!(0.1));
    assert_eq!(summary.average_fill_price, Some(dec!(45000)));
    assert!(!summary.stopped_early);

    let orders = mock.orders();
    assert_eq!(orders.len(), 5);
    let offsets: Vec<u64> = orders
        .iter()
        .map(|o| o.placed_at.duration_since(t0).as_secs())
        .collect();
    assert_eq!(offsets, vec![0, 120, 240, 360, 480]);
    assert!(orders.iter().all(|o| o.spec.quantity() == dec!(0.02)));
    assert!(orders.iter().all(|o| o.spec.order_type() == OrderType::Market));

    // Client order ids are unique per slice
    let mut ids: Vec<_> = orders
        .iter()
        .filter_map(|o| o.spec.client_order_id().map(str::to_string))
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);

    assert_eq!(audit.named("slice_submitted").len(), 5);
    assert_eq!(audit.named("twap_completed").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_three_slices() {
    let _ = env_logger::try_init();

    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = Arc::new(scheduler(&mock, &audit, TwapConfig::default()));
    let cancel = CancelToken::new();

    let handle = {
        let twap = twap.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { twap.run(ten_minute_buy(), &cancel).await })
    };

    // Slices are due at 0, 120 and 240 seconds; cancel before the fourth
    tokio::time::sleep(Duration::from_secs(250)).await;
    cancel.cancel();

    let summary = handle.await.unwrap().unwrap();
    assert!(summary.stopped_early);
    assert_eq!(summary.attempted_slices(), 3);
    assert_eq!(summary.filled_slices, 3);
    assert_eq!(summary.cancelled_slices, 2);
    assert_eq!(mock.orders().len(), 3);
    assert!(
        summary.records[3..]
            .iter()
            .all(|r| r.state == SliceState::Cancelled && r.order_id.is_none())
    );

    // Nothing else is sent after cancellation
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(mock.call_count(MockOp::PlaceOrder), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start_sends_nothing() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    let cancel = CancelToken::new();
    cancel.cancel();
    let summary = twap.run(ten_minute_buy(), &cancel).await.unwrap();

    assert_eq!(summary.attempted_slices(), 0);
    assert_eq!(summary.cancelled_slices, 5);
    assert!(mock.orders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_slice_does_not_stop_schedule() {
    let _ = env_logger::try_init();

    let mock = Arc::new(MockExchange::new(dec!(45000)));
    mock.fail_on(
        MockOp::PlaceOrder,
        3,
        ExchangeError::rejected(-2019, "Margin is insufficient."),
    );
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    let summary = twap.run(ten_minute_buy(), &CancelToken::new()).await.unwrap();

    assert_eq!(summary.failed_slices, 1);
    assert_eq!(summary.failed_indices(), vec![2]);
    assert_eq!(summary.filled_slices, 4);
    assert_eq!(summary.attempted_slices(), 5);
    assert_eq!(summary.total_quantity_filled, dec!(0.08));
    assert!(
        summary.records[2]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("-2019"))
    );
    // Rejections are not retried
    assert_eq!(mock.call_count(MockOp::PlaceOrder), 5);
    assert_eq!(audit.named("slice_failed").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_retried_within_slice() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    mock.fail_on(MockOp::PlaceOrder, 2, ExchangeError::transport("connection reset"));
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    let t0 = Instant::now();
    let summary = twap.run(ten_minute_buy(), &CancelToken::new()).await.unwrap();

    assert_eq!(summary.filled_slices, 5);
    assert_eq!(mock.call_count(MockOp::PlaceOrder), 6);
    // The retry delay does not shift later slices
    let third = &mock.orders()[2];
    assert_eq!(third.placed_at.duration_since(t0), Duration::from_secs(240));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fail_only_that_slice() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    mock.fail_on_calls(MockOp::PlaceOrder, 2..=4, ExchangeError::transport("timeout"));
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    let summary = twap.run(ten_minute_buy(), &CancelToken::new()).await.unwrap();

    assert_eq!(summary.failed_indices(), vec![1]);
    assert_eq!(summary.filled_slices, 4);
    assert_eq!(mock.call_count(MockOp::PlaceOrder), 7);
}

#[tokio::test(start_paused = true)]
async fn test_limit_slices_sample_price_per_slice() {
    let _ = env_logger::try_init();

    let mock = Arc::new(MockExchange::new(dec!(45000)));
    // Third sample drops through the first two resting bids
    mock.push_prices([dec!(45000), dec!(46000), dec!(44000)]);
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    let request = TwapRequest::market("BTCUSDT", Side::Buy, dec!(0.03), Duration::from_secs(90), 3)
        .with_limit_offset(dec!(0.1));
    let summary = twap.run(request, &CancelToken::new()).await.unwrap();

    let prices: Vec<_> = summary.records.iter().map(|r| r.limit_price).collect();
    assert_eq!(
        prices,
        vec![Some(dec!(44955)), Some(dec!(45954)), Some(dec!(43956))]
    );
    assert!(
        mock.placed_orders()
            .iter()
            .all(|s| s.order_type() == OrderType::Limit && s.side() == Side::Buy)
    );

    // End-of-run reconciliation picks up the two crossed bids
    assert_eq!(summary.filled_slices, 2);
    assert_eq!(summary.open_slices, 1);
    assert_eq!(summary.total_quantity_filled, dec!(0.02));
    assert_eq!(summary.average_fill_price, Some(dec!(45454.5)));
    assert_eq!(summary.min_fill_price, Some(dec!(44955)));
    assert_eq!(summary.max_fill_price, Some(dec!(45954)));
}

#[tokio::test(start_paused = true)]
async fn test_limit_sell_slices_sit_above_market() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default().with_reconcile(false));

    let request = TwapRequest::market("BTCUSDT", Side::Sell, dec!(0.02), Duration::from_secs(10), 2)
        .with_limit_offset(dec!(0.5));
    let summary = twap.run(request, &CancelToken::new()).await.unwrap();

    assert!(
        summary
            .records
            .iter()
            .all(|r| r.limit_price == Some(dec!(45225)))
    );
    assert_eq!(summary.open_slices, 2);
    assert_eq!(summary.filled_slices, 0);
}

#[tokio::test(start_paused = true)]
async fn test_price_failure_fails_one_limit_slice() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    mock.fail_on(
        MockOp::CurrentPrice,
        1,
        ExchangeError::rejected(-1121, "Invalid symbol."),
    );
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    let request = TwapRequest::market("BTCUSDT", Side::Buy, dec!(0.02), Duration::from_secs(10), 2)
        .with_limit_offset(dec!(0.1));
    let summary = twap.run(request, &CancelToken::new()).await.unwrap();

    assert_eq!(summary.failed_indices(), vec![0]);
    assert_eq!(mock.orders().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_input_aborts_before_any_order() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    let too_small = TwapRequest::market("BTCUSDT", Side::Buy, dec!(0.003), Duration::from_secs(60), 5);
    assert!(matches!(
        twap.run(too_small, &CancelToken::new()).await,
        Err(Error::Validation(ValidationError::SliceTooSmall { .. }))
    ));

    let bad_symbol = TwapRequest::market("BTC-USD", Side::Buy, dec!(0.1), Duration::from_secs(60), 5);
    assert!(matches!(
        twap.run(bad_symbol, &CancelToken::new()).await,
        Err(Error::Validation(ValidationError::InvalidSymbol(_)))
    ));

    let bad_offset = ten_minute_buy().with_limit_offset(dec!(150));
    assert!(matches!(
        twap.run(bad_offset, &CancelToken::new()).await,
        Err(Error::Validation(ValidationError::InvalidOffset(_)))
    ));

    assert_eq!(mock.call_count(MockOp::PlaceOrder), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unaligned_total_rejected_by_step_size() {
    let mock = Arc::new(
        MockExchange::new(dec!(45000))
            .with_filters(SymbolFilters::new(dec!(0.1), dec!(0.01), dec!(0.01), dec!(0.1))),
    );
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    let request = TwapRequest::market("BTCUSDT", Side::Buy, dec!(0.105), Duration::from_secs(60), 5);
    assert!(matches!(
        twap.run(request, &CancelToken::new()).await,
        Err(Error::Validation(ValidationError::QuantityNotAligned { .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_missing_filters_is_setup_error() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    mock.fail_on_calls(MockOp::SymbolFilters, 1..=3, ExchangeError::transport("down"));
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    let err = twap.run(ten_minute_buy(), &CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::Setup { what: "symbol filters", .. }));
    assert!(mock.orders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_lost_acknowledgement_is_not_a_failed_slice() {
    let _ = env_logger::try_init();

    let mock = Arc::new(MockExchange::new(dec!(45000)));
    // The first order is accepted but its response never arrives
    mock.lose_response_on(MockOp::PlaceOrder, 1, ExchangeError::transport("read timeout"));
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    let request = TwapRequest::market("BTCUSDT", Side::Buy, dec!(0.02), Duration::from_secs(60), 2);
    let summary = twap.run(request, &CancelToken::new()).await.unwrap();

    assert_eq!(summary.failed_slices, 0);
    assert_eq!(summary.filled_slices, 2);
    assert_eq!(summary.total_quantity_filled, dec!(0.02));
    assert_eq!(summary.records[0].order_id, Some(OrderId::new("1000")));
    assert_eq!(summary.records[0].avg_price, Some(dec!(45000)));

    // Lost submission, duplicate retry, second slice
    assert_eq!(mock.call_count(MockOp::PlaceOrder), 3);
    assert_eq!(mock.call_count(MockOp::OrderLookup), 1);
    assert_eq!(mock.orders().len(), 2);
    assert!(audit.named("slice_failed").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_market_slice_filled_after_ack_counts_reported_price() {
    let mock = Arc::new(MockExchange::new(dec!(45000)).with_resting_market_orders());
    let audit = Arc::new(MemoryAuditSink::new());
    let twap = scheduler(&mock, &audit, TwapConfig::default());

    {
        let mock = mock.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            mock.set_price(dec!(45100));
        });
    }

    let request = TwapRequest::market("BTCUSDT", Side::Buy, dec!(0.02), Duration::from_secs(120), 2);
    let summary = twap.run(request, &CancelToken::new()).await.unwrap();

    // Slice 0 was acknowledged NEW and filled at 30s; slice 1 is still working
    assert_eq!(summary.filled_slices, 1);
    assert_eq!(summary.open_slices, 1);
    assert_eq!(summary.records[0].avg_price, Some(dec!(45100)));
    assert_eq!(summary.total_quantity_filled, dec!(0.01));
    assert_eq!(summary.average_fill_price, Some(dec!(45100)));
    assert_eq!(summary.min_fill_price, Some(dec!(45100)));
    assert_eq!(summary.max_fill_price, Some(dec!(45100)));
}
