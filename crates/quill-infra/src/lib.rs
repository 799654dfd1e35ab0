//! # Quill Infrastructure
//!
//! Concrete implementations of the ports defined in `quill-core`: database
//! repositories, mail transports, authentication and rate limiting.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory only
//! - `postgres` - PostgreSQL repositories via SeaORM
//! - `auth` - JWT + Argon2 authentication
//! - `rate-limit` - Rate limiting via governor

pub mod mail;
pub mod memory;
pub mod search;

#[cfg(feature = "postgres")]
pub mod database;

#[cfg(feature = "auth")]
pub mod auth;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

// Re-exports - In-Memory
pub use mail::{ConsoleMailer, HttpMailer, HttpMailerConfig, InMemoryMailer};
pub use memory::InMemoryStore;

#[cfg(feature = "postgres")]
pub use database::DatabaseConfig;

#[cfg(feature = "auth")]
pub use auth::{Argon2PasswordService, JwtConfig, JwtTokenService};

#[cfg(feature = "rate-limit")]
pub use rate_limit::{InMemoryRateLimiter, RateLimitConfig};
