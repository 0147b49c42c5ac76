use super::resolve;
use crate::apis::policies::{rate_limit::RateLimitPolicyMode, L7RateLimit};

pub const DEFAULT_BACKLOG: i32 = 10;
pub const DEFAULT_RESPONSE_STATUS_CODE: i32 = 429;

pub fn compute(config: Option<&L7RateLimit>, default_config: Option<&L7RateLimit>) -> Option<L7RateLimit> {
    resolve(config, default_config, set_defaults, merge)
}

fn merge(mut config: L7RateLimit, default_config: &L7RateLimit) -> L7RateLimit {
    if config.mode.is_none() {
        config.mode = default_config.mode;
    }
    if config.backlog.is_none() {
        config.backlog = default_config.backlog;
    }
    if config.burst.is_none() {
        config.burst = default_config.burst;
    }
    if config.response_status_code.is_none() {
        config.response_status_code = default_config.response_status_code;
    }
    if config.response_headers_to_add.is_empty() {
        config.response_headers_to_add.clone_from(&default_config.response_headers_to_add);
    }
    config
}

fn set_defaults(mut config: L7RateLimit) -> L7RateLimit {
    config.mode.get_or_insert(RateLimitPolicyMode::Local);
    config.backlog.get_or_insert(DEFAULT_BACKLOG);
    if config.burst.is_none() {
        config.burst = Some(config.requests);
    }
    config.response_status_code.get_or_insert(DEFAULT_RESPONSE_STATUS_CODE);
    config
}
