// Auto-next lock.
//
// A single in-process mutex guarding episode-advance navigations: two
// external signals (a progress-based auto-next and a player-reported
// episode change) can race toward the same transition, and exactly one
// may win. A watchdog force-clears the lock if an advance attempt never
// completes, so a failed navigation cannot deadlock the session.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Debug)]
struct Holder {
    token: u64,
    acquired_at: Instant,
}

#[derive(Debug)]
pub struct AutoNextLock {
    holder: Mutex<Option<Holder>>,
    next_token: AtomicU64,
    watchdog: std::time::Duration,
}

impl AutoNextLock {
    #[must_use]
    pub fn new(watchdog: std::time::Duration) -> Self {
        Self {
            holder: Mutex::new(None),
            next_token: AtomicU64::new(1),
            watchdog,
        }
    }

    /// Try to take the lock. Returns a guard that releases on drop, or
    /// None when another advance attempt currently holds it.
    ///
    /// A holder past the watchdog deadline is force-cleared first: its
    /// attempt is considered dead and must not block the session forever.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>) -> Option<AutoNextGuard> {
        let mut holder = self.holder.lock();
        if let Some(current) = holder.as_ref() {
            if current.acquired_at.elapsed() < self.watchdog {
                tracing::debug!("auto-next lock busy, advance already in flight");
                return None;
            }
            tracing::warn!(
                held_for_secs = current.acquired_at.elapsed().as_secs(),
                "auto-next lock watchdog expired, force-clearing stale holder"
            );
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        *holder = Some(Holder {
            token,
            acquired_at: Instant::now(),
        });
        Some(AutoNextGuard {
            lock: Arc::clone(self),
            token,
        })
    }

    #[must_use]
    pub fn is_held(&self) -> bool {
        self.holder
            .lock()
            .as_ref()
            .is_some_and(|h| h.acquired_at.elapsed() < self.watchdog)
    }

    /// Release by token. Only the matching holder clears the lock, so a
    /// stale guard dropped after a watchdog takeover cannot release the
    /// new holder.
    fn release(&self, token: u64) {
        let mut holder = self.holder.lock();
        match holder.as_ref() {
            Some(current) if current.token == token => {
                *holder = None;
                tracing::debug!("auto-next lock released");
            }
            _ => {
                tracing::debug!("auto-next lock release skipped, holder changed");
            }
        }
    }
}

/// RAII guard for [`AutoNextLock`]; dropping it releases the lock, so
/// error paths through an advance attempt can never leave it held.
#[derive(Debug)]
pub struct AutoNextGuard {
    lock: Arc<AutoNextLock>,
    token: u64,
}

impl Drop for AutoNextGuard {
    fn drop(&mut self) {
        self.lock.release(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn lock(watchdog_secs: u64) -> Arc<AutoNextLock> {
        Arc::new(AutoNextLock::new(Duration::from_secs(watchdog_secs)))
    }

    #[tokio::test]
    async fn second_acquire_fails_while_held() {
        let lock = lock(10);
        let guard = lock.try_acquire().expect("first acquire");
        assert!(lock.try_acquire().is_none());
        drop(guard);
        assert!(lock.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_force_clears_stale_holder() {
        let lock = lock(10);
        let stale = lock.try_acquire().expect("first acquire");
        // Holder never releases; past the watchdog a new attempt wins
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!lock.is_held());
        let fresh = lock.try_acquire().expect("takeover after watchdog");

        // The stale guard must not release the fresh holder
        drop(stale);
        assert!(lock.is_held());
        drop(fresh);
        assert!(!lock.is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_within_watchdog_window_is_refused() {
        let lock = lock(10);
        let _guard = lock.try_acquire().expect("first acquire");
        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(lock.try_acquire().is_none());
    }
}
