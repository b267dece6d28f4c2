//! Command line definition

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tranche_core::{PositionSide, Price, Quantity, Side, TimeInForce};

/// Order execution for Binance USDT-M futures
#[derive(Debug, Parser)]
#[command(name = "tranche")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Run against an in-process paper exchange instead of Binance
    #[arg(long, global = true)]
    pub paper: bool,

    /// Market price of the paper exchange
    #[arg(long, global = true, default_value = "45000")]
    pub paper_price: Price,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Place a market order
    Market(MarketArgs),

    /// Place a limit order
    Limit(LimitArgs),

    /// Place a stop-limit order
    StopLimit(StopLimitArgs),

    /// Place a take-profit / stop-loss bracket
    Oco(OcoArgs),

    /// Execute a quantity in equal slices over time
    Twap(TwapArgs),

    /// Place a ladder of limit orders across a price range
    Grid(GridArgs),

    /// Show the current price of a symbol
    Price {
        symbol: String,
    },

    /// Cancel an open order
    Cancel {
        symbol: String,
        order_id: String,
    },

    /// List the orders still working on a symbol
    OpenOrders {
        symbol: String,
    },

    /// Cancel every open order on a symbol
    CancelAll {
        symbol: String,
    },
}

/// Options shared by every direct order
#[derive(Debug, Clone, Args)]
pub struct OrderArgs {
    pub symbol: String,
    /// BUY or SELL
    pub side: Side,
    pub quantity: Quantity,

    /// BOTH, LONG or SHORT
    #[arg(long, default_value = "BOTH")]
    pub position_side: PositionSide,
}

#[derive(Debug, Clone, Args)]
pub struct MarketArgs {
    #[command(flatten)]
    pub order: OrderArgs,
}

#[derive(Debug, Clone, Args)]
pub struct LimitArgs {
    #[command(flatten)]
    pub order: OrderArgs,
    pub price: Price,

    /// GTC, IOC, FOK or GTX
    #[arg(long, default_value = "GTC")]
    pub tif: TimeInForce,
}

#[derive(Debug, Clone, Args)]
pub struct StopLimitArgs {
    #[command(flatten)]
    pub order: OrderArgs,
    pub stop_price: Price,
    pub price: Price,

    #[arg(long, default_value = "GTC")]
    pub tif: TimeInForce,
}

/// Bracket arguments. The side is the closing side: SELL exits a long,
/// BUY exits a short.
#[derive(Debug, Clone, Args)]
pub struct OcoArgs {
    #[command(flatten)]
    pub order: OrderArgs,
    pub take_profit: Price,
    pub stop_loss: Price,

    /// Watch both legs and cancel the survivor once one fills
    #[arg(long)]
    pub monitor: bool,

    /// Seconds between checks while monitoring
    #[arg(long, default_value_t = 5)]
    pub interval: u64,
}

#[derive(Debug, Clone, Args)]
pub struct TwapArgs {
    pub symbol: String,
    pub side: Side,
    pub total_quantity: Quantity,
    /// Schedule length in seconds
    pub duration_seconds: u64,
    pub slices: usize,

    /// Send resting limits instead of market orders
    #[arg(long)]
    pub limit: bool,

    /// Limit offset from the market, in percent
    #[arg(long, default_value = "0.1")]
    pub offset: Decimal,

    #[arg(long, default_value = "BOTH")]
    pub position_side: PositionSide,
}

#[derive(Debug, Clone, Args)]
pub struct GridArgs {
    pub symbol: String,
    pub lower: Price,
    pub upper: Price,
    pub levels: usize,
    pub quantity_per_level: Quantity,

    /// Keep running and re-grid on fills until Ctrl-C
    #[arg(long)]
    pub monitor: bool,

    /// Seconds between polls while monitoring
    #[arg(long, default_value_t = 30)]
    pub interval: u64,

    /// Stop monitoring after this many polls
    #[arg(long)]
    pub max_polls: Option<u64>,

    #[arg(long, default_value = "BOTH")]
    pub position_side: PositionSide,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_twap_with_limit_offset() {
        let cli = Cli::try_parse_from([
            "tranche", "twap", "BTCUSDT", "buy", "0.1", "90", "5", "--limit", "--offset", "0.2",
        ])
        .unwrap();

        let Command::Twap(args) = cli.command else {
            panic!("expected twap");
        };
        assert_eq!(args.side, Side::Buy);
        assert_eq!(args.total_quantity, dec!(0.1));
        assert_eq!(args.duration_seconds, 90);
        assert_eq!(args.slices, 5);
        assert!(args.limit);
        assert_eq!(args.offset, dec!(0.2));
        assert!(!cli.paper);
    }

    #[test]
    fn test_parse_grid_with_global_paper_flags() {
        let cli = Cli::try_parse_from([
            "tranche", "grid", "BTCUSDT", "44000", "46000", "10", "0.01", "--monitor",
            "--paper", "--paper-price", "45500",
        ])
        .unwrap();

        assert!(cli.paper);
        assert_eq!(cli.paper_price, dec!(45500));
        let Command::Grid(args) = cli.command else {
            panic!("expected grid");
        };
        assert_eq!(args.levels, 10);
        assert!(args.monitor);
        assert_eq!(args.interval, 30);
        assert_eq!(args.max_polls, None);
    }

    #[test]
    fn test_parse_oco_and_position_side() {
        let cli = Cli::try_parse_from([
            "tranche", "oco", "BTCUSDT", "SELL", "0.01", "46000", "44000",
            "--position-side", "long",
        ])
        .unwrap();

        let Command::Oco(args) = cli.command else {
            panic!("expected oco");
        };
        assert_eq!(args.order.position_side, PositionSide::Long);
        assert_eq!(args.take_profit, dec!(46000));
        assert!(!args.monitor);
    }

    #[test]
    fn test_parse_order_listing_commands() {
        let cli = Cli::try_parse_from(["tranche", "open-orders", "ethusdt", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::OpenOrders { symbol } if symbol == "ethusdt"));

        let cli = Cli::try_parse_from(["tranche", "cancel-all", "BTCUSDT"]).unwrap();
        assert!(matches!(cli.command, Command::CancelAll { symbol } if symbol == "BTCUSDT"));
        assert!(Cli::try_parse_from(["tranche", "cancel-all"]).is_err());
    }

    #[test]
    fn test_rejects_bad_side_and_numbers() {
        assert!(Cli::try_parse_from(["tranche", "market", "BTCUSDT", "HOLD", "1"]).is_err());
        assert!(Cli::try_parse_from(["tranche", "market", "BTCUSDT", "BUY", "lots"]).is_err());
        assert!(Cli::try_parse_from(["tranche", "limit", "BTCUSDT", "BUY", "1", "100", "--tif", "DAY"]).is_err());
        assert!(Cli::try_parse_from(["tranche", "twap", "BTCUSDT", "BUY", "1", "1.5", "3"]).is_err());
    }
}
