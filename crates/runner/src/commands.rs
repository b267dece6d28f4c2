//! Command handlers
//!
//! Each handler builds the execution component it needs from the
//! [`Session`], runs it and prints the result. Errors returned here are
//! setup failures; a run that completes with failed slices or levels is
//! still a success.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::time::Duration;
use tranche_core::OrderId;
use tranche_execution::{
    CancelToken, ExecutionSummary, GridConfig, GridRequest, GridRunState, GridRunner, OcoRequest,
    OrderPlacer, TwapRequest, TwapScheduler,
};
use tranche_ports::{OpenOrder, OrderAck};

use crate::bootstrap::Session;
use crate::cli::{Command, GridArgs, OcoArgs, TwapArgs};

/// Run one command to completion or until `cancel` fires
pub async fn execute(
    session: &Session,
    command: Command,
    cancel: &CancelToken,
    json: bool,
) -> Result<()> {
    let placer = || {
        OrderPlacer::new(
            session.client.clone(),
            session.audit.clone(),
            session.clock.clone(),
        )
    };

    match command {
        Command::Market(args) => {
            let o = args.order;
            let ack = placer()
                .market(&o.symbol, o.side, o.quantity, o.position_side)
                .await?;
            print_ack(&ack, json)
        }
        Command::Limit(args) => {
            let o = args.order;
            let ack = placer()
                .limit(&o.symbol, o.side, o.quantity, args.price, args.tif, o.position_side)
                .await?;
            print_ack(&ack, json)
        }
        Command::StopLimit(args) => {
            let o = args.order;
            let ack = placer()
                .stop_limit(
                    &o.symbol,
                    o.side,
                    o.quantity,
                    args.stop_price,
                    args.price,
                    args.tif,
                    o.position_side,
                )
                .await?;
            print_ack(&ack, json)
        }
        Command::Oco(args) => oco(&placer(), args, cancel, json).await,
        Command::Twap(args) => twap(session, args, cancel, json).await,
        Command::Grid(args) => grid(session, args, cancel, json).await,
        Command::Price { symbol } => {
            let symbol = symbol.to_ascii_uppercase();
            let price = placer().current_price(&symbol).await?;
            if json {
                print_json(&serde_json::json!({ "symbol": symbol, "price": price }))
            } else {
                println!("{symbol}: {price}");
                Ok(())
            }
        }
        Command::Cancel { symbol, order_id } => {
            let symbol = symbol.to_ascii_uppercase();
            let order_id = OrderId::new(order_id);
            let cancelled = placer().cancel(&symbol, &order_id).await?;
            if json {
                print_json(&serde_json::json!({ "orderId": order_id, "cancelled": cancelled }))
            } else {
                if cancelled {
                    println!("Cancelled order {order_id}");
                } else {
                    println!("Order {order_id} was not open");
                }
                Ok(())
            }
        }
        Command::OpenOrders { symbol } => {
            let symbol = symbol.to_ascii_uppercase();
            let orders = placer().open_orders(&symbol).await?;
            if json {
                print_json(&orders)
            } else {
                print_open_orders(&symbol, &orders);
                Ok(())
            }
        }
        Command::CancelAll { symbol } => {
            let symbol = symbol.to_ascii_uppercase();
            let open = placer().cancel_all(&symbol).await?;
            if json {
                print_json(&serde_json::json!({ "symbol": symbol, "cancelled": open }))
            } else {
                println!("Cancelled all open orders on {symbol} ({open} were open)");
                Ok(())
            }
        }
    }
}

async fn oco(placer: &OrderPlacer, args: OcoArgs, cancel: &CancelToken, json: bool) -> Result<()> {
    let o = args.order;
    let request = OcoRequest {
        symbol: o.symbol.to_ascii_uppercase(),
        side: o.side,
        quantity: o.quantity,
        take_profit: args.take_profit,
        stop_loss: args.stop_loss,
        position_side: o.position_side,
    };
    let orders = placer.oco(&request).await?;
    if !json {
        println!(
            "OCO on {}: take-profit {} @ {}, stop-loss {} @ {}",
            orders.symbol,
            orders.take_profit.order_id,
            request.take_profit,
            orders.stop_loss.order_id,
            request.stop_loss
        );
    }
    if !args.monitor {
        if json {
            print_json(&serde_json::json!({
                "symbol": orders.symbol,
                "takeProfit": orders.take_profit,
                "stopLoss": orders.stop_loss,
            }))?;
        }
        return Ok(());
    }

    let interval = poll_interval(args.interval)?;
    let outcome = placer.monitor_oco(&orders, interval, None, cancel).await?;
    if json {
        print_json(&serde_json::json!({
            "symbol": orders.symbol,
            "takeProfit": orders.take_profit,
            "stopLoss": orders.stop_loss,
            "outcome": outcome,
        }))
    } else {
        println!("OCO outcome: {outcome:?}");
        Ok(())
    }
}

async fn twap(session: &Session, args: TwapArgs, cancel: &CancelToken, json: bool) -> Result<()> {
    let mut request = TwapRequest::market(
        args.symbol,
        args.side,
        args.total_quantity,
        Duration::from_secs(args.duration_seconds),
        args.slices,
    )
    .with_position_side(args.position_side);
    if args.limit {
        request = request.with_limit_offset(args.offset);
    }

    let scheduler = TwapScheduler::new(
        session.client.clone(),
        session.audit.clone(),
        session.clock.clone(),
    );
    let summary = scheduler.run(request, cancel).await?;
    if json {
        print_json(&summary)
    } else {
        print_summary(&summary);
        Ok(())
    }
}

async fn grid(session: &Session, args: GridArgs, cancel: &CancelToken, json: bool) -> Result<()> {
    let mut config = GridConfig::default();
    if let Some(max_polls) = args.max_polls {
        config = config.with_max_polls(max_polls);
    }
    let runner = GridRunner::new(
        session.client.clone(),
        session.audit.clone(),
        session.clock.clone(),
        config,
    );

    let mut request = GridRequest::new(
        args.symbol,
        args.lower,
        args.upper,
        args.levels,
        args.quantity_per_level,
    );
    request.position_side = args.position_side;

    let interval = args
        .monitor
        .then(|| poll_interval(args.interval))
        .transpose()?;

    let mut state = runner.plan(&request).await?;
    runner.submit_all(&mut state, cancel).await;

    if let Some(interval) = interval {
        runner.monitor(&mut state, interval, cancel).await?;
    }
    if cancel.is_cancelled() {
        runner.shutdown(&mut state).await;
    }

    if json {
        print_json(&state)
    } else {
        print_grid(&state);
        Ok(())
    }
}

fn poll_interval(seconds: u64) -> Result<Duration> {
    anyhow::ensure!(seconds > 0, "poll interval must be at least one second");
    Ok(Duration::from_secs(seconds))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to encode result")?;
    println!("{text}");
    Ok(())
}

fn print_ack(ack: &OrderAck, json: bool) -> Result<()> {
    if json {
        return print_json(ack);
    }
    match ack.avg_price {
        Some(price) => println!(
            "Order {}: {} ({} filled @ {})",
            ack.order_id, ack.status, ack.executed_qty, price
        ),
        None => println!("Order {}: {}", ack.order_id, ack.status),
    }
    Ok(())
}

fn print_summary(summary: &ExecutionSummary) {
    println!("TWAP {} {}", summary.side, summary.symbol);
    println!(
        "  slices: {} total, {} filled, {} open, {} failed, {} cancelled",
        summary.total_slices,
        summary.filled_slices,
        summary.open_slices,
        summary.failed_slices,
        summary.cancelled_slices
    );
    println!("  filled quantity: {}", summary.total_quantity_filled);
    if let Some(avg) = summary.average_fill_price {
        println!("  average price: {avg}");
    }
    if let (Some(min), Some(max)) = (summary.min_fill_price, summary.max_fill_price) {
        println!("  price range: {min} - {max}");
    }
    let failed = summary.failed_indices();
    if !failed.is_empty() {
        println!("  failed slices: {failed:?}");
    }
    if summary.stopped_early {
        warn!("TWAP on {} stopped before its schedule completed", summary.symbol);
    }
}

fn print_open_orders(symbol: &str, orders: &[OpenOrder]) {
    if orders.is_empty() {
        println!("No open orders on {symbol}");
        return;
    }
    println!("Open orders on {symbol}");
    for order in orders {
        let price = order
            .price
            .or(order.stop_price)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>12} {:<4} {:<11} {} @ {}  filled {}  {}",
            order.order_id.as_str(),
            order.side.as_str(),
            order.order_type.as_str(),
            order.quantity,
            price,
            order.executed_qty,
            order.status
        );
    }
}

fn print_grid(state: &GridRunState) {
    println!("Grid {} (market {})", state.symbol, state.market_price);
    for level in &state.levels {
        let side = level.side.map(|s| s.to_string()).unwrap_or_default();
        let order_id = level
            .order_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>3} {:<4} {} x {}  {:?}  {}",
            level.index, side, level.price, level.quantity, level.state, order_id
        );
    }
    info!(
        "Grid on {}: {} open, {} filled, {} failed, {} re-grids over {} polls",
        state.symbol,
        state.open_count(),
        state.filled_count(),
        state.failed_count(),
        state.regrids,
        state.polls
    );
}
