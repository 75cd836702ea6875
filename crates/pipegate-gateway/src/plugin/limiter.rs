//! Token bucket with waiting acquisition.
//!
//! Tokens refill continuously at `rate` per second up to `burst`. An
//! acquisition reserves a token immediately (the balance may go negative)
//! and then sleeps until the reservation matures. A reservation that cannot
//! mature before the caller's deadline is refused up front, and one whose
//! wait is cancelled hands back the part of its token that later
//! reservations have not already been scheduled against.

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Why a token was not granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("caller cancelled the wait")]
    Cancelled,
    #[error("token would not be available before the deadline")]
    DeadlineExceeded,
}

#[derive(Debug)]
struct Bucket {
    rate: f64,
    tokens: f64,
    last_refill: Instant,
    /// Maturity of the newest granted reservation.
    last_ready_at: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, burst: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.rate).min(burst);
        self.last_refill = now;
    }
}

/// Shared admission limiter; safe to call from many tasks at once.
#[derive(Debug)]
pub struct TokenBucket {
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl TokenBucket {
    /// Create a full bucket refilling `rate` tokens per second.
    pub fn new(rate: u32, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        let now = Instant::now();
        Self {
            burst,
            bucket: Mutex::new(Bucket {
                rate: f64::from(rate),
                tokens: burst,
                last_refill: now,
                last_ready_at: now,
            }),
        }
    }

    /// Change the refill rate in place. Tokens accrued so far are kept.
    pub fn set_rate(&self, rate: u32) {
        let mut bucket = self.bucket.lock();
        bucket.refill(Instant::now(), self.burst);
        bucket.rate = f64::from(rate);
    }

    pub fn rate(&self) -> f64 {
        self.bucket.lock().rate
    }

    /// Reserve one token, returning when it matures.
    fn reserve(&self, deadline: Option<Instant>) -> Result<Instant, AcquireError> {
        let now = Instant::now();
        let mut bucket = self.bucket.lock();
        bucket.refill(now, self.burst);

        let deficit = 1.0 - bucket.tokens;
        let ready_at = if deficit <= 0.0 {
            now
        } else if bucket.rate <= 0.0 {
            return Err(AcquireError::DeadlineExceeded);
        } else {
            now + std::time::Duration::from_secs_f64(deficit / bucket.rate)
        };

        if deadline.is_some_and(|d| ready_at > d) {
            return Err(AcquireError::DeadlineExceeded);
        }
        bucket.tokens -= 1.0;
        if ready_at > bucket.last_ready_at {
            bucket.last_ready_at = ready_at;
        }
        Ok(ready_at)
    }

    /// Give back the reservation maturing at `ready_at`.
    ///
    /// Reservations made after it were timed against the lowered balance, so
    /// only the share of the token they have not consumed is restored.
    fn release(&self, ready_at: Instant) {
        let mut bucket = self.bucket.lock();
        let restore = if bucket.rate > 0.0 {
            let queued_after = bucket.last_ready_at.saturating_duration_since(ready_at);
            1.0 - queued_after.as_secs_f64() * bucket.rate
        } else {
            1.0
        };
        if restore <= 0.0 {
            return;
        }
        bucket.tokens = (bucket.tokens + restore).min(self.burst);

        if ready_at >= bucket.last_ready_at && bucket.rate > 0.0 {
            let interval = std::time::Duration::from_secs_f64(1.0 / bucket.rate);
            bucket.last_ready_at = ready_at.checked_sub(interval).unwrap_or(ready_at);
        }
    }

    /// Wait for one token, bounded by `deadline` and by `cancel`.
    ///
    /// Only the calling task is suspended; the bucket lock is never held
    /// across the sleep.
    pub async fn acquire(
        &self,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<(), AcquireError> {
        if cancel.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }

        let ready_at = self.reserve(deadline)?;
        if ready_at <= Instant::now() {
            return Ok(());
        }

        tokio::select! {
            _ = sleep_until(ready_at) => Ok(()),
            _ = cancel.cancelled() => {
                self.release(ready_at);
                Err(AcquireError::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn first_token_is_immediate_then_paced() {
        let bucket = TokenBucket::new(10, 1);
        let never = CancellationToken::new();

        let start = Instant::now();
        bucket.acquire(None, &never).await.unwrap();
        assert_eq!(Instant::now(), start);

        bucket.acquire(None, &never).await.unwrap();
        assert!(Instant::now() - start >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_shorter_than_wait_is_refused_up_front() {
        let bucket = TokenBucket::new(1, 1);
        let never = CancellationToken::new();
        bucket.acquire(None, &never).await.unwrap();

        let start = Instant::now();
        let err = bucket
            .acquire(Some(start + Duration::from_millis(50)), &never)
            .await
            .unwrap_err();
        assert_eq!(err, AcquireError::DeadlineExceeded);
        assert_eq!(Instant::now(), start);

        // refused reservation left the balance untouched
        tokio::time::advance(Duration::from_secs(1)).await;
        bucket.acquire(Some(Instant::now()), &never).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_returns_promptly_and_refunds() {
        let bucket = std::sync::Arc::new(TokenBucket::new(1, 1));
        let never = CancellationToken::new();
        bucket.acquire(None, &never).await.unwrap();

        let cancel = CancellationToken::new();
        let waiter = {
            let bucket = bucket.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { bucket.acquire(None, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        assert_eq!(waiter.await.unwrap(), Err(AcquireError::Cancelled));

        // refunded token plus elapsed refill covers the next caller at t=1s
        tokio::time::advance(Duration::from_millis(990)).await;
        bucket.acquire(Some(Instant::now()), &never).await.unwrap();
    }

    #[tokio::test]
    async fn already_cancelled_caller_is_rejected() {
        let bucket = TokenBucket::new(100, 1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            bucket.acquire(None, &cancel).await,
            Err(AcquireError::Cancelled)
        );
    }

    fn spawn_waiter(
        bucket: &std::sync::Arc<TokenBucket>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<Result<Instant, AcquireError>> {
        let bucket = bucket.clone();
        tokio::spawn(async move {
            bucket.acquire(None, &cancel).await?;
            Ok(Instant::now())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waiter_ahead_of_queue_does_not_double_grant() {
        let bucket = std::sync::Arc::new(TokenBucket::new(1, 1));
        let never = CancellationToken::new();
        let start = Instant::now();
        bucket.acquire(None, &never).await.unwrap();

        // a takes the 1s slot, b the 2s slot
        let cancel_a = CancellationToken::new();
        let a = spawn_waiter(&bucket, cancel_a.clone());
        tokio::time::sleep(Duration::from_millis(1)).await;
        let b = spawn_waiter(&bucket, never.clone());
        tokio::time::sleep(Duration::from_millis(9)).await;

        cancel_a.cancel();
        assert_eq!(a.await.unwrap(), Err(AcquireError::Cancelled));
        let c = spawn_waiter(&bucket, never.clone());

        let b_at = b.await.unwrap().unwrap();
        let c_at = c.await.unwrap().unwrap();
        assert!(b_at - start >= Duration::from_millis(1990), "b at {:?}", b_at - start);
        assert!(
            c_at.saturating_duration_since(b_at) >= Duration::from_millis(990),
            "b at {:?}, c at {:?}",
            b_at - start,
            c_at - start
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_newest_waiter_hands_its_slot_to_the_next_caller() {
        let bucket = std::sync::Arc::new(TokenBucket::new(1, 1));
        let never = CancellationToken::new();
        let start = Instant::now();
        bucket.acquire(None, &never).await.unwrap();

        let a = spawn_waiter(&bucket, never.clone());
        tokio::time::sleep(Duration::from_millis(1)).await;
        let cancel_b = CancellationToken::new();
        let b = spawn_waiter(&bucket, cancel_b.clone());
        tokio::time::sleep(Duration::from_millis(9)).await;

        cancel_b.cancel();
        assert_eq!(b.await.unwrap(), Err(AcquireError::Cancelled));
        let c = spawn_waiter(&bucket, never.clone());

        let a_at = a.await.unwrap().unwrap();
        let c_at = c.await.unwrap().unwrap();
        assert!(c_at.saturating_duration_since(a_at) >= Duration::from_millis(990));
        // b's slot is reused rather than lost
        assert!(c_at - start <= Duration::from_millis(2010), "c at {:?}", c_at - start);
    }

    #[tokio::test(start_paused = true)]
    async fn set_rate_applies_in_place() {
        let bucket = TokenBucket::new(1, 1);
        let never = CancellationToken::new();
        bucket.acquire(None, &never).await.unwrap();

        bucket.set_rate(100);
        assert_eq!(bucket.rate(), 100.0);
        let start = Instant::now();
        bucket
            .acquire(Some(start + Duration::from_millis(20)), &never)
            .await
            .unwrap();
        assert!(Instant::now() - start <= Duration::from_millis(20));
    }
}
