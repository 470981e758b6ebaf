//! Provider access for LeadCascade.
//!
//! - [`ProviderAdapter`]: the uniform contract over one vendor API, with the
//!   built-in Hunter, Apollo, People Data Labs and Lusha dialects
//! - [`ProviderRateLimiter`]: per-provider token bucket
//! - [`RetryPolicy`]: explicit backoff policy
//! - [`ProviderPool`]: the above wired together, built once per engine

pub mod adapters;
pub mod error;
pub mod pool;
pub mod rate_limit;
pub mod retry;

pub use adapters::{
    ApolloAdapter, HunterAdapter, LushaAdapter, PeopleDataLabsAdapter, ProviderAdapter,
    ProviderMatch, build_adapter,
};
pub use error::ProviderError;
pub use pool::ProviderPool;
pub use rate_limit::ProviderRateLimiter;
pub use retry::{Jitter, RetryPolicy};
