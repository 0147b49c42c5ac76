use super::resolve;
use crate::apis::policies::{health_check::HealthCheckMatch, HealthCheckConfig};

pub fn compute(config: Option<&HealthCheckConfig>, default_config: Option<&HealthCheckConfig>) -> Option<HealthCheckConfig> {
    resolve(config, default_config, set_defaults, merge)
}

fn merge(mut config: HealthCheckConfig, default_config: &HealthCheckConfig) -> HealthCheckConfig {
    if config.path.is_none() {
        config.path.clone_from(&default_config.path);
    }
    if config.matches.is_empty() {
        config.matches.clone_from(&default_config.matches);
    }
    if config.fail_timeout.is_none() {
        config.fail_timeout = default_config.fail_timeout;
    }
    config
}

fn set_defaults(mut config: HealthCheckConfig) -> HealthCheckConfig {
    if config.path.is_some() && config.matches.is_empty() {
        config.matches = vec![HealthCheckMatch { status_codes: vec![200], ..Default::default() }];
    }
    config
}
