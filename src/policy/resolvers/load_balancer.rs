use crate::apis::policies::LoadBalancerType;

/// A load balancer type is a single value, the scope type wins over the default.
pub fn compute(config: Option<LoadBalancerType>, default_config: Option<LoadBalancerType>) -> Option<LoadBalancerType> {
    config.or(default_config)
}

/// Type used for a port entry that names neither its own type nor inherits one.
pub fn compute_or_fallback(config: Option<LoadBalancerType>, default_config: Option<LoadBalancerType>) -> LoadBalancerType {
    compute(config, default_config).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_type_wins() {
        assert_eq!(compute(None, None), None);
        assert_eq!(compute(None, Some(LoadBalancerType::HashingLoadBalancer)), Some(LoadBalancerType::HashingLoadBalancer));
        assert_eq!(
            compute(Some(LoadBalancerType::LeastConnectionLoadBalancer), Some(LoadBalancerType::HashingLoadBalancer)),
            Some(LoadBalancerType::LeastConnectionLoadBalancer)
        );
        assert_eq!(compute_or_fallback(None, None), LoadBalancerType::RoundRobinLoadBalancer);
    }
}
