use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("window size must be at least one second")]
    ZeroWindow,
    #[error("max requests must be greater than zero")]
    ZeroMaxRequests,
}

/// Immutable per-limiter configuration.
///
/// A policy is validated once at construction and never mutated afterwards;
/// every strategy holds its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPolicy {
    window: Duration,
    max_requests: u64,
    use_origin_address: bool,
}

impl WindowPolicy {
    /// Create a policy allowing `max_requests` per `window`.
    ///
    /// The window must be at least one whole second (counter expiry in shared
    /// storage has second resolution) and the threshold must be non-zero.
    pub fn new(window: Duration, max_requests: u64) -> Result<Self, PolicyError> {
        if window.as_secs() == 0 {
            return Err(PolicyError::ZeroWindow);
        }
        if max_requests == 0 {
            return Err(PolicyError::ZeroMaxRequests);
        }
        Ok(Self {
            window,
            max_requests,
            use_origin_address: false,
        })
    }

    /// Track each caller's origin address as a separate bucket, instead of
    /// one shared bucket per route.
    ///
    /// Default is false.
    pub fn with_origin_address(mut self, enabled: bool) -> Self {
        self.use_origin_address = enabled;
        self
    }

    /// The counting window, i.e. the time-to-live of each counter.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Inclusive number of requests allowed within one window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Whether the caller's origin address is part of the bucket key.
    pub fn use_origin_address(&self) -> bool {
        self.use_origin_address
    }
}
