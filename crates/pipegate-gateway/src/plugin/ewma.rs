//! Exponentially weighted moving average of an event rate.
//!
//! Events are counted lock-free with [`Ewma::update`]; a background task
//! calls [`Ewma::tick`] every [`TICK_INTERVAL`] to fold the pending count
//! into the smoothed per-second rate.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Cadence the owner must call [`Ewma::tick`] at.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct Smoothed {
    rate: f64,
    initialised: bool,
}

#[derive(Debug)]
pub struct Ewma {
    alpha: f64,
    uncounted: AtomicU64,
    smoothed: Mutex<Smoothed>,
}

impl Ewma {
    /// Average over a window of `minutes`, ticked every [`TICK_INTERVAL`].
    pub fn over_minutes(minutes: f64) -> Self {
        let alpha = 1.0 - (-TICK_INTERVAL.as_secs_f64() / 60.0 / minutes).exp();
        Self {
            alpha,
            uncounted: AtomicU64::new(0),
            smoothed: Mutex::new(Smoothed::default()),
        }
    }

    pub fn one_minute() -> Self {
        Self::over_minutes(1.0)
    }

    pub fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold the events counted since the last tick into the average.
    pub fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::Relaxed);
        let instant_rate = count as f64 / TICK_INTERVAL.as_secs_f64();

        let mut smoothed = self.smoothed.lock();
        if smoothed.initialised {
            smoothed.rate += self.alpha * (instant_rate - smoothed.rate);
        } else {
            smoothed.rate = instant_rate;
            smoothed.initialised = true;
        }
    }

    /// Smoothed events per second.
    pub fn rate(&self) -> f64 {
        self.smoothed.lock().rate
    }
}
