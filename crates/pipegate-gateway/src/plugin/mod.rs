//! Built-in plugin types.

mod ewma;
mod fallback;
mod header;
mod limiter;
pub mod rate_limiter;
pub mod request_adaptor;

pub use ewma::{Ewma, TICK_INTERVAL};
pub use fallback::{Fallback, FallbackSpec};
pub use header::HeaderAdaptSpec;
pub use limiter::{AcquireError, TokenBucket};
pub use rate_limiter::{RateLimiter, RateLimiterConfig, RateLimiterFactory, RateLimiterStatus};
pub use request_adaptor::{RequestAdaptor, RequestAdaptorConfig, RequestAdaptorFactory};

use pipegate_kernel::StageFactory;
use std::sync::Arc;

/// Factories for every plugin type shipped with the gateway.
pub fn builtin_stage_factories() -> Vec<Arc<dyn StageFactory>> {
    vec![
        Arc::new(RateLimiterFactory),
        Arc::new(RequestAdaptorFactory),
    ]
}
