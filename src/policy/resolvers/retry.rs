use super::resolve;
use crate::apis::policies::RetryConfig;

pub const DEFAULT_NUM_RETRIES: i32 = 3;
pub const DEFAULT_BACKOFF_BASE_INTERVAL: f32 = 1.0;

pub fn compute(config: Option<&RetryConfig>, default_config: Option<&RetryConfig>) -> Option<RetryConfig> {
    resolve(config, default_config, set_defaults, merge)
}

fn merge(mut config: RetryConfig, default_config: &RetryConfig) -> RetryConfig {
    if config.retry_on.is_empty() {
        config.retry_on.clone_from(&default_config.retry_on);
    }
    config.num_retries = config.num_retries.or(default_config.num_retries);
    config.backoff_base_interval = config.backoff_base_interval.or(default_config.backoff_base_interval);
    config
}

fn set_defaults(mut config: RetryConfig) -> RetryConfig {
    config.num_retries = Some(config.num_retries.unwrap_or(DEFAULT_NUM_RETRIES));
    config.backoff_base_interval = Some(config.backoff_base_interval.unwrap_or(DEFAULT_BACKOFF_BASE_INTERVAL));
    config
}
