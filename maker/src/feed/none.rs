//! Degenerate reference feed: never produces a price.
//!
//! Selected when `reference_feed = none`, or reached as the last resort of
//! the failover priority list. With no reference feed, the orchestrator
//! falls back to quoting directly off the local venue's mid-price.

use tokio::sync::watch;

use super::ReferenceFeed;

pub struct NoneFeed {
    rx: watch::Receiver<Option<venue::MidPrice>>,
}

impl NoneFeed {
    pub fn new() -> Self {
        let (_tx, rx) = watch::channel(None);
        Self { rx }
    }
}

impl Default for NoneFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceFeed for NoneFeed {
    fn connect(&self) {}

    fn close(&self) {}

    fn latest(&self) -> Option<venue::MidPrice> {
        None
    }

    fn subscribe_price(&self) -> watch::Receiver<Option<venue::MidPrice>> {
        self.rx.clone()
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
