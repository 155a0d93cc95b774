use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use uuid::Uuid;

/// Fixed-rate throttle over outbound calls.
///
/// At most `max_concurrent` permits are outstanding at once; further callers
/// queue first-in-first-out. A permit frees itself `interval` after it was
/// granted, not when the caller finishes its work, approximating "at most N
/// requests started per interval". A call that runs longer than `interval`
/// can therefore push effective concurrency past `max_concurrent`; that is
/// the intended throttle behavior, not a bound on in-flight work.
///
/// Acquisition always eventually succeeds. There is no timeout or
/// cancellation here; callers needing either must wrap `acquire` themselves.
#[derive(Debug)]
pub struct RateLimiter {
    max_concurrent: usize,
    interval: Duration,
    state: Arc<Mutex<LimiterState>>,
    issued: AtomicU64,
}

#[derive(Debug, Default)]
struct LimiterState {
    outstanding: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Handle representing "one call may proceed now".
///
/// The slot behind it frees on the limiter's timer; dropping the permit
/// early does not release it sooner.
#[derive(Debug, Clone)]
pub struct RatePermit {
    pub granted_at: DateTime<Utc>,
    pub permit_id: Uuid,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, interval: Duration) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            interval,
            state: Arc::new(Mutex::new(LimiterState::default())),
            issued: AtomicU64::new(0),
        }
    }

    /// Wait for a permit, queued FIFO behind earlier callers when the
    /// concurrency limit is reached.
    pub async fn acquire(&self) -> RatePermit {
        let waiter = {
            let mut state = self.state.lock().await;
            if state.outstanding < self.max_concurrent {
                state.outstanding += 1;
                Self::schedule_release(Arc::clone(&self.state), self.interval);
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some(rx)
            }
        };

        if let Some(rx) = waiter {
            // The grantor never drops the sender before signaling, so this
            // only fails if the limiter itself is torn down mid-wait.
            let _ = rx.await;
        }

        self.issued.fetch_add(1, Ordering::Relaxed);
        RatePermit {
            granted_at: Utc::now(),
            permit_id: Uuid::new_v4(),
        }
    }

    /// Total permits granted since construction. Cache hits never show up
    /// here, which makes the counter useful for asserting that a code path
    /// stayed off the network.
    pub fn permits_issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// Permits currently outstanding (granted and not yet timer-released)
    pub async fn outstanding(&self) -> usize {
        self.state.lock().await.outstanding
    }

    /// One timer task per occupied slot. After each `interval` the slot is
    /// handed to the next queued waiter (restarting the timer for the new
    /// holder) or, with the queue empty, freed. A waiter that went away
    /// forfeits the grant and the next one is tried.
    fn schedule_release(state: Arc<Mutex<LimiterState>>, interval: Duration) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let handed_off = {
                    let mut guard = state.lock().await;
                    loop {
                        match guard.waiters.pop_front() {
                            Some(tx) => {
                                if tx.send(()).is_ok() {
                                    break true;
                                }
                            }
                            None => {
                                guard.outstanding = guard.outstanding.saturating_sub(1);
                                break false;
                            }
                        }
                    }
                };

                if !handed_off {
                    return;
                }
            }
        });
    }
}
