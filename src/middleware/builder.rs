use crate::middleware::RateLimiter;
use crate::strategy::Strategy;

pub struct RateLimiterBuilder<T> {
    strategy: T,
    include_resource_id: bool,
}

impl<T: Strategy> RateLimiterBuilder<T> {
    pub(super) fn new(strategy: T) -> Self {
        Self {
            strategy,
            include_resource_id: false,
        }
    }

    /// Include the limited route as `resourceID` in the rejection body.
    ///
    /// Default is false.
    pub fn include_resource_id(mut self, include: bool) -> Self {
        self.include_resource_id = include;
        self
    }

    pub fn build(self) -> RateLimiter<T> {
        RateLimiter {
            strategy: self.strategy,
            include_resource_id: self.include_resource_id,
        }
    }
}
