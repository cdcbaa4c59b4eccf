#[cfg(feature = "dashmap")]
#[cfg_attr(docsrs, doc(cfg(feature = "dashmap")))]
pub mod memory;

#[cfg(feature = "redis")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
pub mod redis;

use crate::policy::WindowPolicy;
use async_trait::async_trait;

/// A rate limiting discipline and the counter store backing it.
///
/// A strategy is required to implement [Clone], usually this means wrapping
/// your data store within an [Arc](std::sync::Arc), although many connection
/// handles already do so internally; there is no need to wrap it twice.
///
/// Alternative disciplines (sliding window, token bucket, leaky bucket) plug
/// into the same [RateLimiter](crate::RateLimiter) wrapper and key derivation
/// by substituting their own counting protocol here.
#[async_trait(?Send)]
pub trait Strategy: Clone {
    /// The policy this strategy was constructed with.
    fn policy(&self) -> &WindowPolicy;

    /// Count one request against `key`'s current window and report whether
    /// the window's quota is now exceeded.
    ///
    /// Implementations backed by fallible storage must fail open: a storage
    /// fault is reported as not exceeded, so that a counter outage never
    /// becomes a full API outage.
    async fn has_limit_exceeded(&self, key: &str) -> bool;
}
