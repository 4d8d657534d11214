//! Market maker bot orchestrator.
//!
//! A single `tokio::select!` loop drives everything: reference-feed prices,
//! local orderbook prices, fills, periodic order/position resync, status
//! logging, and feed-health checks. Running it all on one task means no two
//! branches ever touch shared state concurrently — the re-entrancy guard
//! around quote updates exists to document that invariant, not to enforce it
//! against real concurrency.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use venue::{MidPrice, Side, VenueUser};

use crate::client::{create_client, MakerClient};
use crate::error::MakerError;
use crate::fair_price::{FairPriceCalculator, FairPriceConfig};
use crate::feed::{self, ReferenceFeedKind};
use crate::mm::account_refresh::AccountRefresher;
use crate::mm::config::MarketMakerConfig;
use crate::mm::position::{PositionConfig, PositionTracker};
use crate::mm::quoter::Quoter;
use crate::mm::requote_guard::{OrderAgeMap, RequoteGuard};
use crate::orders::{cancel_orders, update_quotes, CachedOrder};

/// How often to check whether the active reference feed has gone stale.
const FEED_HEALTH_INTERVAL: Duration = Duration::from_secs(5);

/// A reference feed with no price for this long is considered dead.
const FEED_STALE_THRESHOLD: Duration = Duration::from_secs(20);

/// Top-level market maker.
pub struct MarketMaker {
    config: MarketMakerConfig,
    venue_url: String,
    private_key: String,
}

// ---------------------------------------------------------------------------
// Helpers (pure, testable)
// ---------------------------------------------------------------------------

/// Convert server API orders to [`CachedOrder`]s.
pub fn map_api_orders_to_cached(orders: &[venue::OpenOrder]) -> Vec<CachedOrder> {
    orders
        .iter()
        .map(|o| CachedOrder {
            order_id: o.order_id,
            side: o.side,
            price: Decimal::from_f64_retain(o.price).unwrap_or_default(),
            size: Decimal::from_f64_retain(o.size).unwrap_or_default(),
        })
        .collect()
}

/// Leading+trailing throttle: the first request in a quiet period fires
/// immediately, further requests within `period` are coalesced into a single
/// trailing fire once `period` has elapsed since the last one.
struct Throttle {
    period: Duration,
    last_fire: Option<Instant>,
    trailing_due: bool,
}

impl Throttle {
    fn new(period: Duration) -> Self {
        Self {
            period,
            last_fire: None,
            trailing_due: false,
        }
    }

    /// Request a fire at `now`. Returns `true` if the caller should fire
    /// immediately (leading edge); otherwise the trailing edge is armed.
    fn request(&mut self, now: Instant) -> bool {
        match self.last_fire {
            Some(last) if now.duration_since(last) < self.period => {
                self.trailing_due = true;
                false
            }
            _ => {
                self.last_fire = Some(now);
                self.trailing_due = false;
                true
            }
        }
    }

    /// Deadline for the armed trailing fire, if any.
    fn trailing_deadline(&self) -> Option<Instant> {
        self.trailing_due.then(|| self.last_fire.unwrap() + self.period)
    }

    /// Consume the trailing fire if its deadline has elapsed at `now`.
    fn poll_trailing(&mut self, now: Instant) -> bool {
        match self.trailing_deadline() {
            Some(deadline) if now >= deadline => {
                self.trailing_due = false;
                self.last_fire = Some(now);
                true
            }
            _ => false,
        }
    }
}

impl MarketMaker {
    /// Create a new market maker (does not connect yet).
    pub fn new(config: MarketMakerConfig, venue_url: String, private_key: String) -> Self {
        Self {
            config,
            venue_url,
            private_key,
        }
    }

    /// Run the market maker until `cancel` is triggered.
    ///
    /// 1. Connects to the venue and the reference feed.
    /// 2. Finds the market and initialises strategy components.
    /// 3. Warms up the fair price calculator.
    /// 4. Enters the main event loop (quote, fill, resync, status, failover).
    /// 5. On shutdown, cancels all active orders.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), MakerError> {
        info!("starting market maker");

        // --- Initialise exchange client ---
        let MakerClient {
            venue,
            user,
            account_id,
        } = create_client(&self.venue_url, &self.private_key).await?;

        // --- Find market ---
        let market = venue
            .markets
            .iter()
            .find(|m| {
                m.symbol
                    .to_uppercase()
                    .starts_with(&self.config.symbol.to_uppercase())
            })
            .ok_or_else(|| {
                let available: Vec<_> = venue.markets.iter().map(|m| m.symbol.as_str()).collect();
                MakerError::MarketNotFound(format!(
                    "\"{}\" not found. Available: {}",
                    self.config.symbol,
                    available.join(", ")
                ))
            })?;

        let market_id = market.market_id;
        let market_symbol = market.symbol.clone();

        info!(
            market = %market_symbol,
            reference_feed = ?self.config.reference_feed,
            spread_bps = self.config.spread_bps,
            order_size_usd = self.config.order_size_usd,
            close_threshold_usd = self.config.close_threshold_usd,
            "CONFIG"
        );

        // --- Build strategy components ---
        let mut fair_price_calc = FairPriceCalculator::new(FairPriceConfig {
            window_ms: self.config.fair_price_window_ms,
            min_samples: self.config.warmup_seconds,
        });

        let position_tracker = PositionTracker::new(PositionConfig {
            close_threshold_usd: self.config.close_threshold_usd,
            sync_interval_ms: self.config.position_sync_interval_ms,
        });

        let quoter = Quoter::new(
            market.price_decimals,
            market.size_decimals,
            self.config.spread_bps,
            self.config.take_profit_bps,
            self.config.order_size_usd,
        );

        let requote_guard =
            RequoteGuard::new(self.config.requote_threshold_bps, self.config.min_order_age_ms);
        let mut ages = OrderAgeMap::new();

        // --- Build streams ---
        let mut ws = venue.create_websocket_client(
            std::slice::from_ref(&market_symbol),
            std::slice::from_ref(&account_id),
        );

        let mut orderbook =
            venue::OrderbookStream::new(market_symbol.clone(), (*venue).clone(), ws.subscribe_deltas());
        orderbook.connect().await?;

        let mut account_stream =
            venue::AccountStream::new(account_id, ws.subscribe_accounts(), Arc::clone(&venue));

        ws.connect();
        account_stream.connect();

        // --- Reference feed, with failover priority list ---
        let feed_priority = feed::priority_order(self.config.reference_feed);
        let mut feed_idx = 0usize;
        let mut current_feed_kind = feed_priority[feed_idx];
        let mut active_feed = feed::build_feed(current_feed_kind, &market_symbol);
        active_feed.connect();
        let mut feed_rx = active_feed.subscribe_price();
        let mut last_feed_price_at = Instant::now();

        // --- Shared, deduplicated account refresh for resync + position sync ---
        let refresher = Arc::new(AccountRefresher::new(Arc::clone(&venue), account_id));

        // --- Sync initial state ---
        let mut active_orders = {
            let account = refresher
                .refresh()
                .await
                .map_err(|e| MakerError::Config(format!("initial account fetch failed: {e}")))?;
            let market_orders: Vec<_> = account
                .orders
                .iter()
                .filter(|o| o.market_id == market_id)
                .cloned()
                .collect();
            let cached = map_api_orders_to_cached(&market_orders);
            if !cached.is_empty() {
                info!(count = cached.len(), "synced existing orders");
            }
            account_stream.sync_initial_orders(&market_orders);
            ages.sync(&cached, epoch_ms());
            cached
        };

        // Start position sync via the shared refresher.
        position_tracker.start_sync(Arc::clone(&refresher), market_id, cancel.clone());

        // --- Prepare event loop state ---
        let mut zo_price_rx = orderbook.subscribe_price();
        let mut fill_rx = account_stream
            .take_fill_rx()
            .expect("fill_rx already taken");

        let mut last_logged_sample_count: isize = -1;

        let mut order_sync_interval =
            time::interval(Duration::from_millis(self.config.order_sync_interval_ms));
        order_sync_interval.tick().await;

        let mut status_interval =
            time::interval(Duration::from_millis(self.config.status_interval_ms));
        status_interval.tick().await;

        let mut feed_health_interval = time::interval(FEED_HEALTH_INTERVAL);
        feed_health_interval.tick().await;

        let mut throttle = Throttle::new(Duration::from_millis(self.config.update_throttle_ms));
        let mut pending_fair_price: Option<f64> = None;
        let mut is_updating = false;

        info!("warming up price feeds...");

        // --- Main event loop ---
        loop {
            let far_future = Instant::now() + Duration::from_secs(86_400);
            let trailing_deadline = throttle.trailing_deadline().unwrap_or(far_future);
            let trailing_active = throttle.trailing_deadline().is_some();

            tokio::select! {
                // Reference feed price update.
                result = feed_rx.changed(), if current_feed_kind != ReferenceFeedKind::None => {
                    if result.is_err() { continue; }
                    let now_ms = epoch_ms();
                    let ref_mid = match *feed_rx.borrow_and_update() {
                        Some(p) => p,
                        None => continue,
                    };
                    last_feed_price_at = Instant::now();

                    if let Some(local_mid) = orderbook.get_mid_price() {
                        if (ref_mid.timestamp as i64 - local_mid.timestamp as i64).unsigned_abs() < 1000 {
                            fair_price_calc.add_sample(local_mid.mid, ref_mid.mid, now_ms);
                        }
                    }

                    let fair = match fair_price_calc.get_fair_price(ref_mid.mid, now_ms) {
                        Some(f) => f,
                        None => {
                            log_warmup(&fair_price_calc, &ref_mid, orderbook.get_mid_price(), &mut last_logged_sample_count, self.config.warmup_seconds, now_ms);
                            continue;
                        }
                    };

                    if last_logged_sample_count < self.config.warmup_seconds as isize {
                        last_logged_sample_count = self.config.warmup_seconds as isize;
                        info!(fair_price = format!("{fair:.2}"), "ready");
                    }

                    pending_fair_price = Some(fair);
                    if throttle.request(Instant::now()) && !is_updating {
                        is_updating = true;
                        execute_update(
                            fair, &user, market_id, &position_tracker, &quoter, &requote_guard,
                            &mut ages, &orderbook, &mut active_orders, &self.config,
                        ).await;
                        is_updating = false;
                    }
                }

                // Local orderbook price update. Samples the fair-price offset
                // normally; when there is no reference feed, quotes directly
                // off the local mid instead.
                result = zo_price_rx.changed() => {
                    if result.is_err() { continue; }
                    let now_ms = epoch_ms();
                    let local_mid = match *zo_price_rx.borrow_and_update() {
                        Some(p) => p,
                        None => continue,
                    };

                    if current_feed_kind == ReferenceFeedKind::None {
                        pending_fair_price = Some(local_mid.mid);
                        if throttle.request(Instant::now()) && !is_updating {
                            is_updating = true;
                            execute_update(
                                local_mid.mid, &user, market_id, &position_tracker, &quoter,
                                &requote_guard, &mut ages, &orderbook, &mut active_orders,
                                &self.config,
                            ).await;
                            is_updating = false;
                        }
                    } else if let Some(ref_mid) = active_feed.latest() {
                        if (local_mid.timestamp as i64 - ref_mid.timestamp as i64).unsigned_abs() < 1000 {
                            fair_price_calc.add_sample(local_mid.mid, ref_mid.mid, now_ms);
                        }
                    }
                }

                // Trailing edge of the throttle.
                _ = time::sleep_until(trailing_deadline), if trailing_active => {
                    if throttle.poll_trailing(Instant::now()) && !is_updating {
                        if let Some(fair) = pending_fair_price {
                            is_updating = true;
                            execute_update(
                                fair, &user, market_id, &position_tracker, &quoter,
                                &requote_guard, &mut ages, &orderbook, &mut active_orders,
                                &self.config,
                            ).await;
                            is_updating = false;
                        }
                    }
                }

                // Fill event — update position, cancel-all if entering close mode.
                Some(fill) = fill_rx.recv() => {
                    let dir = if fill.side == Side::Bid { "buy" } else { "sell" };
                    info!(
                        side = dir,
                        price = format!("{:.2}", fill.price),
                        size = fill.size,
                        "FILL"
                    );
                    position_tracker.apply_fill(fill.side, fill.size);

                    if position_tracker.is_close_mode(fill.price) && !active_orders.is_empty() {
                        if let Err(e) = cancel_orders(&user, &active_orders).await {
                            error!(error = %e, "failed to cancel on close mode");
                        }
                        active_orders.clear();
                    }
                }

                // Periodic order resync from the server, via the shared refresher.
                _ = order_sync_interval.tick() => {
                    match sync_orders_from_server(&refresher, market_id).await {
                        Ok(orders) => {
                            active_orders = orders;
                            ages.sync(&active_orders, epoch_ms());
                        }
                        Err(e) => error!(error = %e, "order sync error"),
                    }
                }

                // Periodic status log.
                _ = status_interval.tick() => {
                    log_status(&position_tracker, &active_orders);
                }

                // Reference feed health check — fail over on staleness.
                _ = feed_health_interval.tick() => {
                    if self.config.enable_feed_failover
                        && current_feed_kind != ReferenceFeedKind::None
                        && last_feed_price_at.elapsed() >= FEED_STALE_THRESHOLD
                        && feed_idx + 1 < feed_priority.len()
                    {
                        warn!(feed = active_feed.name(), "reference feed stale — failing over");
                        active_feed.close();
                        feed_idx += 1;
                        current_feed_kind = feed_priority[feed_idx];
                        active_feed = feed::build_feed(current_feed_kind, &market_symbol);
                        active_feed.connect();
                        feed_rx = active_feed.subscribe_price();
                        last_feed_price_at = Instant::now();
                        info!(feed = active_feed.name(), "reference feed switched");
                    }
                }

                // Shutdown.
                _ = cancel.cancelled() => {
                    info!("shutting down");
                    break;
                }
            }
        }

        // --- Shutdown: cancel all active orders ---
        if !active_orders.is_empty() {
            match cancel_orders(&user, &active_orders).await {
                Ok(()) => info!(count = active_orders.len(), "cancelled orders — goodbye"),
                Err(e) => error!(error = %e, "shutdown cancel error"),
            }
        } else {
            info!("no active orders — goodbye");
        }

        active_feed.close();
        orderbook.close();
        account_stream.close();

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
async fn execute_update(
    fair_price: f64,
    user: &VenueUser,
    market_id: u32,
    position_tracker: &PositionTracker,
    quoter: &Quoter,
    requote_guard: &RequoteGuard,
    ages: &mut OrderAgeMap,
    orderbook: &venue::OrderbookStream,
    active_orders: &mut Vec<CachedOrder>,
    config: &MarketMakerConfig,
) {
    let ctx = position_tracker.get_quoting_context(fair_price);
    let pos = &ctx.position_state;

    if pos.size_base != 0.0 {
        let dir = if pos.is_long { "LONG" } else { "SHORT" };
        let mode = if pos.is_close_mode { " [CLOSE]" } else { "" };
        info!(
            direction = dir,
            size_base = format!("{:.6}", pos.size_base.abs()),
            size_usd = format!("{:.2}", pos.size_usd.abs()),
            mode,
            "POS"
        );
    }

    let bbo = orderbook.get_bbo();
    let raw_quotes = quoter.get_quotes(&ctx, bbo.as_ref());

    if raw_quotes.is_empty() {
        warn!("no quotes generated (order size too small)");
        return;
    }

    let now_ms = epoch_ms();
    let quotes = requote_guard.filter(&raw_quotes, &active_orders[..], &*ages, now_ms);

    let bid = quotes.iter().find(|q| q.side == Side::Bid);
    let ask = quotes.iter().find(|q| q.side == Side::Ask);
    let spread_bps = if pos.is_close_mode {
        config.take_profit_bps
    } else {
        config.spread_bps
    };
    let mode = if pos.is_close_mode { "close" } else { "normal" };
    info!(
        bid = bid
            .map(|q| format!("${}", q.price))
            .unwrap_or_else(|| "--".into()),
        ask = ask
            .map(|q| format!("${}", q.price))
            .unwrap_or_else(|| "--".into()),
        fair = format!("${fair_price:.2}"),
        spread = format!("{spread_bps}bps"),
        mode,
        "QUOTE"
    );

    match update_quotes(user, market_id, &active_orders[..], &quotes).await {
        Ok(new_orders) => {
            *active_orders = new_orders;
            ages.sync(&active_orders[..], now_ms);
        }
        Err(e) => {
            error!(error = %e, "update error");
            active_orders.clear();
        }
    }
}

async fn sync_orders_from_server(
    refresher: &AccountRefresher,
    market_id: u32,
) -> Result<Vec<CachedOrder>, Arc<venue::VenueError>> {
    let account = refresher.refresh().await?;
    let market_orders: Vec<_> = account
        .orders
        .iter()
        .filter(|o| o.market_id == market_id)
        .cloned()
        .collect();
    Ok(map_api_orders_to_cached(&market_orders))
}

fn log_warmup(
    calc: &FairPriceCalculator,
    reference: &MidPrice,
    local: Option<MidPrice>,
    last_count: &mut isize,
    target: usize,
    now_ms: u64,
) {
    let state = calc.get_state(now_ms);
    if state.samples as isize == *last_count {
        return;
    }
    *last_count = state.samples as isize;

    let offset_bps = if let Some(offset) = state.offset {
        if reference.mid > 0.0 {
            format!("{:.1}", offset / reference.mid * 10000.0)
        } else {
            "--".into()
        }
    } else {
        "--".into()
    };

    let local_str = local
        .map(|p| format!("${:.2}", p.mid))
        .unwrap_or_else(|| "--".into());

    info!(
        samples = format!("{}/{target}", state.samples),
        reference = format!("${:.2}", reference.mid),
        local = local_str,
        offset_bps,
        "warming up"
    );
}

fn log_status(tracker: &PositionTracker, orders: &[CachedOrder]) {
    let pos = tracker.get_base_size();
    let bids: Vec<String> = orders
        .iter()
        .filter(|o| o.side == Side::Bid)
        .map(|o| format!("${}x{}", o.price, o.size))
        .collect();
    let asks: Vec<String> = orders
        .iter()
        .filter(|o| o.side == Side::Ask)
        .map(|o| format!("${}x{}", o.price, o.size))
        .collect();
    let bid_str = if bids.is_empty() { "-".to_string() } else { bids.join(",") };
    let ask_str = if asks.is_empty() { "-".to_string() } else { asks.join(",") };
    info!(
        pos = format!("{pos:.5}"),
        bid = bid_str,
        ask = ask_str,
        "STATUS"
    );
}

fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
