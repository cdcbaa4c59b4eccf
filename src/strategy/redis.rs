use crate::policy::WindowPolicy;
use crate::strategy::Strategy;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::Script;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Namespaces this strategy's counters against other limiter strategies
/// sharing the same store.
const STRATEGY_TAG: &str = "fixed_window:";

// Increment the counter and, only when this increment created the key, attach
// the window's expiry. Redis runs the script as a single atomic unit, so
// concurrent callers racing on a fresh key observe distinct counts and the
// expiry is set exactly once per window (and never refreshed within one).
static INCREMENT_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local count = redis.call("INCR", KEYS[1])
if count == 1 then
    redis.call("EXPIRE", KEYS[1], ARGV[1])
end
return count
"#,
    )
});

#[derive(Debug, Error)]
pub enum Error {
    #[error("Redis error: {0}")]
    Redis(
        #[source]
        #[from]
        redis::RedisError,
    ),
    #[error("Storage call timed out after {0:?}")]
    Timeout(Duration),
}

/// A fixed window limiter that keeps its counters in Redis.
///
/// The store is shared by every instance of the service, so the decision is
/// safe under horizontal scaling; correctness rests on the atomicity of the
/// increment script, not on any in-process synchronization. Counter expiry is
/// delegated to Redis's native TTL mechanism, keys are never deleted by the
/// limiter itself.
///
/// Storage faults fail open: an error, malformed reply, or timeout allows the
/// request rather than turning a cache outage into an API outage.
#[derive(Clone)]
pub struct FixedWindowLimiter<C = ConnectionManager> {
    connection: C,
    policy: WindowPolicy,
    key_prefix: Option<String>,
    storage_timeout: Duration,
}

impl<C> FixedWindowLimiter<C>
where
    C: ConnectionLike + Clone + 'static,
{
    /// Create a FixedWindowLimiter builder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use actix_window_limit::strategy::redis::FixedWindowLimiter;
    /// # use actix_window_limit::WindowPolicy;
    /// # use redis::aio::ConnectionManager;
    /// # use std::time::Duration;
    /// # async fn example() {
    /// let client = redis::Client::open("redis://127.0.0.1/").unwrap();
    /// let manager = ConnectionManager::new(client).await.unwrap();
    /// let policy = WindowPolicy::new(Duration::from_secs(60), 100).unwrap();
    /// let limiter = FixedWindowLimiter::builder(manager, policy).build();
    /// # };
    /// ```
    pub fn builder(connection: C, policy: WindowPolicy) -> Builder<C> {
        Builder {
            connection,
            policy,
            key_prefix: None,
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    fn storage_key(&self, key: &str) -> String {
        match &self.key_prefix {
            None => format!("{STRATEGY_TAG}{key}"),
            Some(prefix) => format!("{prefix}{STRATEGY_TAG}{key}"),
        }
    }

    async fn try_increment(&self, storage_key: &str) -> Result<u64, Error> {
        let mut connection = self.connection.clone();
        let mut invocation = INCREMENT_SCRIPT.prepare_invoke();
        invocation
            .key(storage_key)
            .arg(self.policy.window().as_secs());
        match timeout(
            self.storage_timeout,
            invocation.invoke_async(&mut connection),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Timeout(self.storage_timeout)),
        }
    }
}

#[async_trait(?Send)]
impl<C> Strategy for FixedWindowLimiter<C>
where
    C: ConnectionLike + Clone + 'static,
{
    fn policy(&self) -> &WindowPolicy {
        &self.policy
    }

    async fn has_limit_exceeded(&self, key: &str) -> bool {
        let storage_key = self.storage_key(key);
        match self.try_increment(&storage_key).await {
            Ok(count) => count > self.policy.max_requests(),
            Err(e) => {
                log::warn!("Rate limit storage check failed, allowing the request: {e}");
                false
            }
        }
    }
}

pub struct Builder<C = ConnectionManager> {
    connection: C,
    policy: WindowPolicy,
    key_prefix: Option<String>,
    storage_timeout: Duration,
}

impl<C> Builder<C>
where
    C: ConnectionLike + Clone + 'static,
{
    /// Apply an optional prefix to all counter keys written by this limiter.
    ///
    /// This may be useful when the Redis instance is being used for other
    /// purposes; the prefix is used as a 'namespace' to avoid collision with
    /// other caches or keys inside Redis.
    pub fn key_prefix(mut self, key_prefix: Option<&str>) -> Self {
        self.key_prefix = key_prefix.map(ToOwned::to_owned);
        self
    }

    /// Bound the storage round trip per decision.
    ///
    /// An elapsed timeout is treated like any other storage failure: the
    /// request is allowed. Default is [DEFAULT_STORAGE_TIMEOUT].
    pub fn storage_timeout(mut self, storage_timeout: Duration) -> Self {
        self.storage_timeout = storage_timeout;
        self
    }

    pub fn build(self) -> FixedWindowLimiter<C> {
        FixedWindowLimiter {
            connection: self.connection,
            policy: self.policy,
            key_prefix: self.key_prefix,
            storage_timeout: self.storage_timeout,
        }
    }
}
