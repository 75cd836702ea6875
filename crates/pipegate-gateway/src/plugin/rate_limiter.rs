//! `RateLimiter` stage.
//!
//! Admits requests through a token bucket (rate = `tps`, burst = 1). A
//! request that cannot get a token before its timeout, or before its own
//! cancellation, receives the fallback response (if any), status 429 and the
//! named result `timeout`.
//!
//! The bucket, the admission-rate EWMA and the ticker task feeding it are
//! warm state: created once per plugin name, shared by every reconfigured
//! successor, and stopped only when the name is disposed.

use super::ewma::{Ewma, TICK_INTERVAL};
use super::fallback::{Fallback, FallbackSpec};
use super::limiter::TokenBucket;
use async_trait::async_trait;
use parking_lot::Mutex;
use pipegate_kernel::{
    KernelError, KernelResult, PluginSpec, Stage, StageContext, StageFactory, StageResult,
    parse_duration,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const KIND: &str = "RateLimiter";
pub const RESULT_TIMEOUT: &str = "timeout";

const MIN_TIMEOUT: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub name: String,
    pub tps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackSpec>,
}

impl RateLimiterConfig {
    fn validate(&self) -> KernelResult<()> {
        if self.tps < 1 {
            return Err(KernelError::invalid_field("tps", "must be >= 1"));
        }
        if let Some(timeout) = &self.timeout {
            let parsed = parse_duration(timeout)
                .map_err(|e| KernelError::invalid_field("timeout", e.to_string()))?;
            if parsed < MIN_TIMEOUT {
                return Err(KernelError::invalid_field("timeout", "must be >= 1ms"));
            }
        }
        Ok(())
    }

    /// Timeout as a duration. An unparsable value here means validation was
    /// skipped; the timeout is disabled rather than failing the stage.
    fn timeout(&self) -> Option<Duration> {
        let raw = self.timeout.as_deref()?;
        match parse_duration(raw) {
            Ok(timeout) => Some(timeout),
            Err(e) => {
                error!(plugin = %self.name, timeout = raw, error = %e, "BUG: timeout passed validation but does not parse; timeout disabled");
                None
            }
        }
    }
}

/// Observed admission rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterStatus {
    pub tps: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Warm state
// ─────────────────────────────────────────────────────────────────────────────

/// Per-name runtime shared by an instance and all its reconfigured successors.
#[derive(Debug)]
struct SharedRuntime {
    name: String,
    limiter: TokenBucket,
    rate1: Arc<Ewma>,
    done: CancellationToken,
    ticker: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl SharedRuntime {
    fn start(name: &str, tps: u32) -> KernelResult<Arc<Self>> {
        let handle = Handle::try_current().map_err(|_| KernelError::NoRuntime(name.to_string()))?;

        let rate1 = Arc::new(Ewma::one_minute());
        let done = CancellationToken::new();
        let ticker = handle.spawn(tick_ewma(name.to_string(), rate1.clone(), done.clone()));

        debug!(plugin = %name, tps, "rate limiter runtime started");
        Ok(Arc::new(Self {
            name: name.to_string(),
            limiter: TokenBucket::new(tps, 1),
            rate1,
            done,
            ticker: Mutex::new(Some(ticker)),
            disposed: AtomicBool::new(false),
        }))
    }

    fn stop(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            debug!(plugin = %self.name, "rate limiter runtime already stopped");
            return;
        }
        self.done.cancel();
        info!(plugin = %self.name, "rate limiter runtime stopped");
    }

    fn ticker_finished(&self) -> bool {
        self.ticker
            .lock()
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }
}

impl Drop for SharedRuntime {
    fn drop(&mut self) {
        // The last instance is gone without a dispose; still end the ticker.
        self.done.cancel();
    }
}

async fn tick_ewma(name: String, rate1: Arc<Ewma>, done: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
    loop {
        tokio::select! {
            _ = done.cancelled() => {
                debug!(plugin = %name, "ewma ticker exiting");
                return;
            }
            _ = ticker.tick() => rate1.tick(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    timeout: Option<Duration>,
    fallback: Option<Fallback>,
    runtime: Arc<SharedRuntime>,
}

impl RateLimiter {
    fn decode(spec: &PluginSpec) -> KernelResult<RateLimiterConfig> {
        let config: RateLimiterConfig = spec.decode()?;
        config.validate()?;
        Ok(config)
    }

    fn assemble(config: RateLimiterConfig, runtime: Arc<SharedRuntime>) -> Self {
        Self {
            timeout: config.timeout(),
            fallback: config.fallback.clone().map(Fallback::new),
            config,
            runtime,
        }
    }

    /// First instantiation of a name: fresh bucket, zeroed EWMA, one ticker.
    pub fn new(spec: &PluginSpec) -> KernelResult<Self> {
        let config = Self::decode(spec)?;
        let runtime = SharedRuntime::start(&config.name, config.tps)?;
        Ok(Self::assemble(config, runtime))
    }

    /// Successor for `spec`, reusing this instance's bucket, EWMA and ticker.
    pub fn successor(&self, spec: &PluginSpec) -> KernelResult<Self> {
        let config = Self::decode(spec)?;
        self.runtime.limiter.set_rate(config.tps);
        debug!(plugin = %config.name, tps = config.tps, "rate limiter reconfigured");
        Ok(Self::assemble(config, self.runtime.clone()))
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    pub fn current_status(&self) -> RateLimiterStatus {
        RateLimiterStatus {
            tps: self.runtime.rate1.rate() as u64,
        }
    }

    /// Whether `other` runs on the same warm state as `self`.
    pub fn shares_runtime_with(&self, other: &RateLimiter) -> bool {
        Arc::ptr_eq(&self.runtime, &other.runtime)
    }

    /// Whether the background ticker has exited.
    pub fn ticker_finished(&self) -> bool {
        self.runtime.ticker_finished()
    }
}

#[async_trait]
impl Stage for RateLimiter {
    fn kind(&self) -> &str {
        KIND
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn handle(&self, ctx: &mut StageContext) -> StageResult {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let admitted = self
            .runtime
            .limiter
            .acquire(deadline, ctx.cancellation())
            .await;
        self.runtime.rate1.update(1);

        match admitted {
            Ok(()) => StageResult::Continue,
            Err(reason) => {
                debug!(
                    plugin = %self.config.name,
                    request_id = %ctx.request.id,
                    reason = %reason,
                    "request not admitted"
                );
                if let Some(fallback) = &self.fallback {
                    fallback.apply(&mut ctx.response);
                }
                ctx.response.set_status(429);
                StageResult::named(RESULT_TIMEOUT)
            }
        }
    }

    fn status(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self.current_status()).ok()
    }

    fn reconfigure(&self, spec: &PluginSpec) -> KernelResult<Arc<dyn Stage>> {
        Ok(Arc::new(self.successor(spec)?))
    }

    fn dispose(&self) -> KernelResult<()> {
        self.runtime.stop();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RateLimiterFactory;

impl StageFactory for RateLimiterFactory {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn results(&self) -> &'static [&'static str] {
        &[RESULT_TIMEOUT]
    }

    fn create(&self, spec: &PluginSpec) -> KernelResult<Arc<dyn Stage>> {
        Ok(Arc::new(RateLimiter::new(spec)?))
    }
}
