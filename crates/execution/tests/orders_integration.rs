//! Direct orders and OCO brackets against the mock exchange

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tranche_clock::FixedClock;
use tranche_core::{
    OrderStatus, OrderType, PositionSide, Side, SymbolFilters, TimeInForce, ValidationError,
};
use tranche_execution::{CancelToken, Error, OcoOutcome, OcoRequest, OrderPlacer};
use tranche_gateway::{MemoryAuditSink, MockExchange, MockOp, RetryPolicy, RetryingClient};
use tranche_ports::{ExchangeClient, ExchangeError};

fn placer(mock: &Arc<MockExchange>, audit: &Arc<MemoryAuditSink>) -> OrderPlacer {
    let client: Arc<dyn ExchangeClient> =
        Arc::new(RetryingClient::new(mock.clone(), RetryPolicy::default()));
    OrderPlacer::new(client, audit.clone(), Arc::new(FixedClock::now_frozen()))
}

fn long_exit() -> OcoRequest {
    OcoRequest {
        symbol: "BTCUSDT".to_string(),
        side: Side::Sell,
        quantity: dec!(0.01),
        take_profit: dec!(46000),
        stop_loss: dec!(44000),
        position_side: PositionSide::Both,
    }
}

#[tokio::test]
async fn test_market_order_fills_and_is_audited() {
    let _ = env_logger::try_init();

    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);

    let ack = orders
        .market("BTCUSDT", Side::Buy, dec!(0.01), PositionSide::Both)
        .await
        .unwrap();

    assert_eq!(ack.status, OrderStatus::Filled);
    assert_eq!(ack.avg_price, Some(dec!(45000)));
    let client_id = ack.client_order_id.clone().unwrap();
    assert!(client_id.starts_with("cli-"));

    let events = audit.named("order_placed");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].attributes["symbol"], "BTCUSDT");
    assert_eq!(events[0].attributes["type"], "MARKET");
}

#[tokio::test]
async fn test_invalid_symbol_never_reaches_exchange() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);

    let result = orders
        .market("BTC-USDT", Side::Buy, dec!(0.01), PositionSide::Both)
        .await;

    assert!(matches!(
        result,
        Err(Error::Validation(ValidationError::InvalidSymbol(_)))
    ));
    assert_eq!(mock.call_count(MockOp::SymbolFilters), 0);
    assert_eq!(mock.call_count(MockOp::PlaceOrder), 0);
}

#[tokio::test]
async fn test_limit_price_checked_against_tick() {
    let mock = Arc::new(
        MockExchange::new(dec!(45000))
            .with_filters(SymbolFilters::new(dec!(0.1), dec!(0.001), dec!(0.001), dec!(0.1))),
    );
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);

    let result = orders
        .limit(
            "BTCUSDT",
            Side::Buy,
            dec!(0.01),
            dec!(44999.95),
            TimeInForce::GTC,
            PositionSide::Both,
        )
        .await;
    assert!(matches!(
        result,
        Err(Error::Validation(ValidationError::PriceNotAligned { .. }))
    ));
    assert_eq!(mock.call_count(MockOp::PlaceOrder), 0);

    let ack = orders
        .limit(
            "BTCUSDT",
            Side::Buy,
            dec!(0.01),
            dec!(44999.9),
            TimeInForce::GTC,
            PositionSide::Both,
        )
        .await
        .unwrap();
    assert_eq!(ack.status, OrderStatus::New);
}

#[tokio::test]
async fn test_stop_limit_carries_both_prices() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);

    orders
        .stop_limit(
            "BTCUSDT",
            Side::Sell,
            dec!(0.01),
            dec!(44000),
            dec!(43900),
            TimeInForce::GTC,
            PositionSide::Long,
        )
        .await
        .unwrap();

    let spec = &mock.placed_orders()[0];
    assert_eq!(spec.order_type(), OrderType::StopLimit);
    assert_eq!(spec.stop_price(), Some(dec!(44000)));
    assert_eq!(spec.price(), Some(dec!(43900)));
    assert_eq!(spec.position_side(), PositionSide::Long);
}

#[tokio::test]
async fn test_rejection_is_surfaced_and_audited() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    mock.fail_on(
        MockOp::PlaceOrder,
        1,
        ExchangeError::rejected(-2019, "Margin is insufficient."),
    );
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);

    let result = orders
        .market("BTCUSDT", Side::Buy, dec!(0.01), PositionSide::Both)
        .await;
    assert!(matches!(
        result,
        Err(Error::Exchange(ExchangeError::Rejected { code: -2019, .. }))
    ));
    assert_eq!(mock.call_count(MockOp::PlaceOrder), 1);
    assert_eq!(audit.named("order_failed").len(), 1);
}

#[tokio::test]
async fn test_oco_places_two_reduce_only_legs() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);

    let bracket = orders.oco(&long_exit()).await.unwrap();

    let placed = mock.placed_orders();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[0].order_type(), OrderType::Limit);
    assert_eq!(placed[0].price(), Some(dec!(46000)));
    assert_eq!(placed[1].order_type(), OrderType::StopMarket);
    assert_eq!(placed[1].stop_price(), Some(dec!(44000)));
    assert!(placed.iter().all(|s| s.reduce_only() && s.side() == Side::Sell));

    assert_eq!(bracket.symbol, "BTCUSDT");
    assert_eq!(bracket.take_profit.status, OrderStatus::New);
    assert_eq!(audit.named("oco_placed").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_oco_stop_loss_cancels_take_profit() {
    let _ = env_logger::try_init();

    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);
    let bracket = orders.oco(&long_exit()).await.unwrap();

    mock.set_price(dec!(43900));
    let outcome = orders
        .monitor_oco(&bracket, Duration::from_secs(1), None, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, OcoOutcome::StopLoss);
    assert_eq!(mock.cancelled_orders(), vec![bracket.take_profit.order_id.clone()]);
    assert_eq!(audit.named("oco_resolved").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_oco_take_profit_found_on_later_poll() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);
    let bracket = orders.oco(&long_exit()).await.unwrap();

    {
        let mock = mock.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            mock.set_price(dec!(46100));
        });
    }
    let started = tokio::time::Instant::now();
    let outcome = orders
        .monitor_oco(&bracket, Duration::from_secs(1), None, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, OcoOutcome::TakeProfit);
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(mock.cancelled_orders(), vec![bracket.stop_loss.order_id.clone()]);
    assert_eq!(
        mock.order(&bracket.take_profit.order_id).unwrap().avg_price,
        Some(dec!(46000))
    );
}

#[tokio::test]
async fn test_oco_rejects_inverted_prices() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);

    let short_exit_with_long_prices = OcoRequest {
        side: Side::Buy,
        ..long_exit()
    };
    assert!(matches!(
        orders.oco(&short_exit_with_long_prices).await,
        Err(Error::Validation(ValidationError::InvalidOcoPrices { .. }))
    ));
    assert!(mock.placed_orders().is_empty());
}

#[tokio::test]
async fn test_oco_stop_leg_failure_cancels_take_profit() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    mock.fail_on(
        MockOp::PlaceOrder,
        2,
        ExchangeError::rejected(-2021, "Order would immediately trigger."),
    );
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);

    let result = orders.oco(&long_exit()).await;

    assert!(matches!(
        result,
        Err(Error::Exchange(ExchangeError::Rejected { code: -2021, .. }))
    ));
    let tp = &mock.orders()[0];
    assert_eq!(tp.status, OrderStatus::Canceled);
    assert_eq!(mock.cancelled_orders(), vec![tp.order_id.clone()]);
    assert!(audit.named("oco_placed").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_oco_monitor_gives_up_after_max_checks() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);
    let bracket = orders.oco(&long_exit()).await.unwrap();

    let outcome = orders
        .monitor_oco(&bracket, Duration::from_secs(5), Some(3), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, OcoOutcome::Unresolved);
    assert_eq!(mock.call_count(MockOp::OrderStatus), 6);
    assert_eq!(mock.open_orders().len(), 2);
    assert!(mock.cancelled_orders().is_empty());
}

#[tokio::test]
async fn test_open_orders_listed_then_cancelled_together() {
    let mock = Arc::new(MockExchange::new(dec!(45000)));
    let audit = Arc::new(MemoryAuditSink::new());
    let orders = placer(&mock, &audit);

    for price in [dec!(44000), dec!(44500)] {
        orders
            .limit("BTCUSDT", Side::Buy, dec!(0.01), price, TimeInForce::GTC, PositionSide::Both)
            .await
            .unwrap();
    }
    orders
        .market("BTCUSDT", Side::Buy, dec!(0.01), PositionSide::Both)
        .await
        .unwrap();

    let open = orders.open_orders("BTCUSDT").await.unwrap();
    assert_eq!(open.len(), 2);
    assert!(open.iter().all(|o| o.order_type == OrderType::Limit && o.status == OrderStatus::New));
    assert_eq!(open[1].price, Some(dec!(44500)));

    assert_eq!(orders.cancel_all("BTCUSDT").await.unwrap(), 2);
    assert!(orders.open_orders("BTCUSDT").await.unwrap().is_empty());
    assert_eq!(mock.cancelled_orders().len(), 2);
    assert_eq!(mock.call_count(MockOp::CancelAll), 1);

    let events = audit.named("cancel_all_requested");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].attributes["openOrders"], 2);

    assert!(matches!(
        orders.cancel_all("BTC/USDT").await,
        Err(Error::Validation(ValidationError::InvalidSymbol(_)))
    ));
    assert_eq!(mock.call_count(MockOp::CancelAll), 1);
}
