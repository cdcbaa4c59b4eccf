#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod strategy;

mod key;
mod middleware;
mod policy;

pub use key::derive_key;
pub use middleware::builder::RateLimiterBuilder;
pub use middleware::{RateLimitRejection, RateLimiter};
pub use policy::{PolicyError, WindowPolicy};
