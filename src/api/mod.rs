pub mod types;
pub mod transport;
pub mod rate_limiter;
pub mod cache;
pub mod client;


pub use types::*;
pub use transport::{ApiRequest, HttpTransport, Method, RawResponse, Transport, TransportFailure};
pub use rate_limiter::{RateLimiter, RatePermit};
pub use cache::{ResponseCache, cache_key};
pub use client::ApiClient;
