use super::resolve;
use crate::apis::policies::CircuitBreakingConfig;

/// Circuit breaking has no fallback constants; optional thresholds stay unset unless the default declares them.
pub fn compute(config: Option<&CircuitBreakingConfig>, default_config: Option<&CircuitBreakingConfig>) -> Option<CircuitBreakingConfig> {
    resolve(config, default_config, |config| config, merge)
}

fn merge(mut config: CircuitBreakingConfig, default_config: &CircuitBreakingConfig) -> CircuitBreakingConfig {
    config.slow_time_threshold = config.slow_time_threshold.or(default_config.slow_time_threshold);
    config.slow_amount_threshold = config.slow_amount_threshold.or(default_config.slow_amount_threshold);
    config.slow_ratio_threshold = config.slow_ratio_threshold.or(default_config.slow_ratio_threshold);
    config.error_amount_threshold = config.error_amount_threshold.or(default_config.error_amount_threshold);
    config.error_ratio_threshold = config.error_ratio_threshold.or(default_config.error_ratio_threshold);
    if config.degraded_response_content.is_none() {
        config.degraded_response_content.clone_from(&default_config.degraded_response_content);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_configured() {
        assert_eq!(compute(None, None), None);
    }

    #[test]
    fn optional_thresholds_inherited() {
        let config = CircuitBreakingConfig { min_request_amount: 10, stat_time_window: 30, error_amount_threshold: Some(3), ..Default::default() };
        let default_config = CircuitBreakingConfig {
            min_request_amount: 100,
            error_amount_threshold: Some(50),
            slow_ratio_threshold: Some(0.5),
            degraded_response_content: Some("degraded".to_owned()),
            ..Default::default()
        };
        let effective = compute(Some(&config), Some(&default_config)).unwrap_or_default();
        assert_eq!(effective.min_request_amount, 10);
        assert_eq!(effective.error_amount_threshold, Some(3));
        assert_eq!(effective.slow_ratio_threshold, Some(0.5));
        assert_eq!(effective.degraded_response_content.as_deref(), Some("degraded"));
        assert_eq!(effective.slow_time_threshold, None);
    }
}
