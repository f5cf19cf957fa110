/// Resilience helpers shared by the Marquee crates
///
/// - **Timeout**: every cache and provider call is bounded so a slow
///   dependency can never stall a request
/// - **Retry / Backoff**: capped exponential backoff with jitter, used by the
///   Redis reconnect supervisor
/// - **Presets**: tuned settings for the cache backend, upstream source
///   providers and reconnect rounds
///
/// # Example: provider call with a timeout
///
/// ```rust,no_run
/// use resilience::{presets, with_timeout};
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::provider_config();
///
///     let result = with_timeout(config.timeout.duration, async {
///         // upstream HTTP call
///     })
///     .await;
///     assert!(result.is_ok());
/// }
/// ```

pub mod presets;
pub mod retry;
pub mod timeout;

pub use presets::{
    cache_config, invalidation_config, provider_config, reconnect_config, ServiceConfig,
};
pub use retry::{Backoff, RetryConfig};
pub use timeout::{with_timeout, TimeoutConfig, TimeoutError};
