use clap::{Parser, Subcommand};

/// maker — market-making bot CLI.
#[derive(Parser, Debug)]
#[command(name = "maker", version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the market maker bot
    MarketMaker(MarketMakerArgs),
}

/// Arguments for the `market-maker` subcommand.
#[derive(Parser, Debug)]
pub struct MarketMakerArgs {
    /// Market symbol prefix (e.g. BTC, ETH, SOL)
    pub symbol: String,

    /// Base URL of the local venue's web server
    #[arg(long, env = "VENUE_URL")]
    pub venue_url: String,

    /// Primary external reference feed (binance, coinbase, none)
    #[arg(long, default_value = "binance")]
    pub reference_feed: String,

    /// Disable automatic failover to the next reference feed on staleness
    #[arg(long)]
    pub disable_feed_failover: bool,

    /// Spread from fair price in basis points
    #[arg(long, default_value = "10")]
    pub spread_bps: f64,

    /// Spread in close (position-reduction) mode in basis points
    #[arg(long, default_value = "5")]
    pub take_profit_bps: f64,

    /// Keep a live order if its price is within this many basis points of a
    /// fresh quote, instead of cancelling and replacing it
    #[arg(long, default_value = "3")]
    pub requote_threshold_bps: f64,

    /// Keep live orders in place for at least this long before replacing
    /// them (ms)
    #[arg(long, default_value = "10000")]
    pub min_order_age_ms: u64,

    /// Order size in USD
    #[arg(long, default_value = "100")]
    pub order_size_usd: f64,

    /// Position USD threshold that triggers close mode
    #[arg(long, default_value = "10")]
    pub close_threshold_usd: f64,

    /// Seconds of price samples before quoting
    #[arg(long, default_value = "10")]
    pub warmup_seconds: usize,

    /// Minimum interval between quote updates (ms)
    #[arg(long, default_value = "100")]
    pub update_throttle_ms: u64,

    /// Interval for syncing orders from the API (ms)
    #[arg(long, default_value = "3000")]
    pub order_sync_interval_ms: u64,

    /// Interval for status log lines (ms)
    #[arg(long, default_value = "1000")]
    pub status_interval_ms: u64,

    /// Fair price sample window (ms)
    #[arg(long, default_value = "300000")]
    pub fair_price_window_ms: u64,

    /// Interval for position sync from the server (ms)
    #[arg(long, default_value = "5000")]
    pub position_sync_interval_ms: u64,
}
