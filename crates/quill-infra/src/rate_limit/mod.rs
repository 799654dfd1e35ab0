//! Rate limiting for the public form endpoints.

mod memory;

pub use memory::{InMemoryRateLimiter, RateLimitConfig};
