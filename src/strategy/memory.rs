use crate::policy::WindowPolicy;
use crate::strategy::Strategy;
use actix_web::rt::task::JoinHandle;
use actix_web::rt::time::Instant;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_GC_INTERVAL_SECONDS: u64 = 60 * 10;

/// A fixed window limiter that uses [Dashmap](dashmap::DashMap) to keep
/// counters in process memory.
///
/// Counters are not shared with other instances of the service, so this is
/// only suitable for single-process deployments (and tests). For horizontal
/// scaling use [FixedWindowLimiter](crate::strategy::redis::FixedWindowLimiter).
#[derive(Clone)]
pub struct InMemoryLimiter {
    policy: WindowPolicy,
    map: Arc<DashMap<String, Window>>,
    gc_handle: Option<Arc<JoinHandle<()>>>,
}

struct Window {
    expires: Instant,
    count: u64,
}

impl InMemoryLimiter {
    pub fn builder(policy: WindowPolicy) -> InMemoryLimiterBuilder {
        InMemoryLimiterBuilder {
            policy,
            gc_interval: Some(Duration::from_secs(DEFAULT_GC_INTERVAL_SECONDS)),
        }
    }

    fn garbage_collector(map: Arc<DashMap<String, Window>>, interval: Duration) -> JoinHandle<()> {
        assert!(
            interval.as_secs_f64() > 0f64,
            "GC interval must be non-zero"
        );
        actix_web::rt::spawn(async move {
            loop {
                let now = Instant::now();
                map.retain(|_k, w| w.expires > now);
                actix_web::rt::time::sleep_until(now + interval).await;
            }
        })
    }
}

#[async_trait(?Send)]
impl Strategy for InMemoryLimiter {
    fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    async fn has_limit_exceeded(&self, key: &str) -> bool {
        let now = Instant::now();
        let expires = now + self.policy.window();
        let mut count = 1;
        self.map
            .entry(key.to_string())
            .and_modify(|w| {
                if w.expires > now {
                    // Within the window: count it, leave the expiry untouched.
                    w.count += 1;
                    count = w.count;
                } else {
                    // The window has elapsed: reset to 1 and set a new expiry.
                    w.expires = expires;
                    w.count = count;
                }
            })
            .or_insert_with(|| Window { expires, count });
        count > self.policy.max_requests()
    }
}

impl Drop for InMemoryLimiter {
    fn drop(&mut self) {
        // Stop the collector once the last clone is gone.
        if let Some(handle) = self.gc_handle.take() {
            if let Some(handle) = Arc::into_inner(handle) {
                handle.abort();
            }
        }
    }
}

pub struct InMemoryLimiterBuilder {
    policy: WindowPolicy,
    gc_interval: Option<Duration>,
}

impl InMemoryLimiterBuilder {
    /// Override the default garbage collector interval.
    ///
    /// Set to None to disable garbage collection.
    ///
    /// The garbage collector periodically scans the internal map, removing
    /// expired windows.
    pub fn with_gc_interval(mut self, interval: Option<Duration>) -> Self {
        self.gc_interval = interval;
        self
    }

    pub fn build(self) -> InMemoryLimiter {
        let map = Arc::new(DashMap::<String, Window>::new());
        let gc_handle = self
            .gc_interval
            .map(|interval| Arc::new(InMemoryLimiter::garbage_collector(map.clone(), interval)));
        InMemoryLimiter {
            policy: self.policy,
            map,
            gc_handle,
        }
    }
}
