//! Shared, deduplicated authoritative account refresh.
//!
//! Fetching the account (orders + positions) is the one expensive,
//! network-bound operation both the order-resync timer and the
//! position-sync loop need. Rather than let them race independent REST
//! calls, every concurrent caller is coalesced onto a single in-flight
//! request: whoever calls first starts the fetch, everyone else awaits the
//! same [`Shared`] future, and the slot is cleared once it resolves.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use venue::{Account, Venue, VenueError};

type AccountResult = Result<Arc<Account>, Arc<VenueError>>;
type SharedAccountFuture = Shared<BoxFuture<'static, AccountResult>>;

/// Coalesces concurrent `get_account` calls for one account id.
pub struct AccountRefresher {
    venue: Arc<Venue>,
    account_id: u32,
    inflight: Mutex<Option<SharedAccountFuture>>,
}

impl AccountRefresher {
    pub fn new(venue: Arc<Venue>, account_id: u32) -> Self {
        Self {
            venue,
            account_id,
            inflight: Mutex::new(None),
        }
    }

    /// Fetch the authoritative account snapshot. If a fetch is already in
    /// flight, await its result instead of issuing a second request.
    pub async fn refresh(&self) -> AccountResult {
        let fut = {
            let mut slot = self.inflight.lock().await;
            match slot.as_ref() {
                Some(fut) => fut.clone(),
                None => {
                    let venue = Arc::clone(&self.venue);
                    let account_id = self.account_id;
                    let fut: BoxFuture<'static, AccountResult> = Box::pin(async move {
                        venue
                            .get_account(account_id)
                            .await
                            .map(Arc::new)
                            .map_err(Arc::new)
                    });
                    let shared = fut.shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };

        let result = fut.await;
        // Clear the slot so the next caller starts a fresh fetch rather than
        // replaying a stale cached result.
        let mut slot = self.inflight.lock().await;
        *slot = None;
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::future::{BoxFuture, FutureExt, Shared};
    use tokio::sync::Mutex;

    /// The coalescing pattern `AccountRefresher` uses, exercised directly
    /// against a counting fetcher instead of a live `Venue` so the test
    /// doesn't need network access.
    struct Coalescer {
        calls: Arc<AtomicUsize>,
        inflight: Mutex<Option<Shared<BoxFuture<'static, usize>>>>,
    }

    impl Coalescer {
        fn new() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                inflight: Mutex::new(None),
            }
        }

        async fn refresh(&self) -> usize {
            let fut = {
                let mut slot = self.inflight.lock().await;
                match slot.as_ref() {
                    Some(fut) => fut.clone(),
                    None => {
                        let calls = Arc::clone(&self.calls);
                        let fut: BoxFuture<'static, usize> = Box::pin(async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            calls.load(Ordering::SeqCst)
                        });
                        let shared = fut.shared();
                        *slot = Some(shared.clone());
                        shared
                    }
                }
            };
            let result = fut.await;
            let mut slot = self.inflight.lock().await;
            *slot = None;
            result
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_coalesce_to_one_fetch() {
        let c = Arc::new(Coalescer::new());
        let a = Arc::clone(&c);
        let b = Arc::clone(&c);
        let (ra, rb) = tokio::join!(a.refresh(), b.refresh());
        assert_eq!(ra, 1);
        assert_eq!(rb, 1);
        assert_eq!(c.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sequential_callers_each_trigger_a_fetch() {
        let c = Coalescer::new();
        c.refresh().await;
        c.refresh().await;
        c.refresh().await;
        assert_eq!(c.calls.load(Ordering::SeqCst), 3);
    }
}
