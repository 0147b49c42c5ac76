use super::{
    matchers::{grpc_match_config, hostname_config, http_match_config, port_config},
    resolvers, AttachedPolicy, PolicyKind, ScopeDescriptor, TargetKind, GATEWAY_TARGET, GRPC_ROUTE_TARGET, HTTP_ROUTE_TARGET, ROUTE_TARGETS,
    SERVICE_TARGETS,
};
use crate::apis::{
    policies::{
        AccessControlConfig, AccessControlPolicy, BackendLBPolicy, BackendTLSPolicy, BackendTLSPolicyValidation, CircuitBreakingConfig,
        CircuitBreakingPolicy, FaultInjectionConfig, FaultInjectionPolicy, GatewayTLSConfig, GatewayTLSPolicy, HealthCheckConfig, HealthCheckPolicy,
        LoadBalancerPolicy, LoadBalancerType, PolicyAncestorStatus, PolicyTargetReference, RateLimitConfig, RateLimitPolicy, RetryConfig, RetryPolicy,
        SessionStickyConfig, SessionStickyPolicy, UpstreamTLSConfig, UpstreamTLSPolicy,
    },
    routes::HTTPRouteRulesSessionPersistence,
};

macro_rules! attachment_accessors {
    () => {
        fn target_refs(&self) -> &[PolicyTargetReference] {
            &self.spec.target_refs
        }

        fn ancestors(&self) -> &[PolicyAncestorStatus] {
            self.status.as_ref().map(|status| status.ancestors.as_slice()).unwrap_or_default()
        }
    };
}

impl AttachedPolicy for AccessControlPolicy {
    type Config = AccessControlConfig;
    const POLICY_KIND: PolicyKind = PolicyKind::AccessControl;

    fn supported_targets() -> &'static [TargetKind] {
        ROUTE_TARGETS
    }

    attachment_accessors!();

    fn config_for(&self, scope: &ScopeDescriptor) -> Option<Self::Config> {
        let spec = &self.spec;
        let default_config = spec.default_config.as_ref();
        match scope {
            ScopeDescriptor::Port(port) => port_config(*port, &spec.ports, default_config, resolvers::access_control::compute),
            ScopeDescriptor::Hostname(hostname) => hostname_config(hostname, &spec.hostnames, default_config, resolvers::access_control::compute),
            ScopeDescriptor::HttpMatch(route_match) => http_match_config(route_match, &spec.http, default_config, resolvers::access_control::compute),
            ScopeDescriptor::GrpcMatch(route_match) => grpc_match_config(route_match, &spec.grpc, default_config, resolvers::access_control::compute),
        }
    }
}

impl AttachedPolicy for RateLimitPolicy {
    type Config = RateLimitConfig;
    const POLICY_KIND: PolicyKind = PolicyKind::RateLimit;

    fn supported_targets() -> &'static [TargetKind] {
        ROUTE_TARGETS
    }

    attachment_accessors!();

    /// Ports are limited in bytes per second, every other scope in requests.
    fn config_for(&self, scope: &ScopeDescriptor) -> Option<Self::Config> {
        let spec = &self.spec;
        let default_config = spec.default_config.as_ref();
        match scope {
            ScopeDescriptor::Port(port) => {
                spec.ports.iter().find(|entry| entry.port == *port).and_then(|entry| entry.bps.or(spec.default_bps)).map(RateLimitConfig::Bps)
            },
            ScopeDescriptor::Hostname(hostname) => {
                hostname_config(hostname, &spec.hostnames, default_config, resolvers::rate_limit::compute).map(RateLimitConfig::L7)
            },
            ScopeDescriptor::HttpMatch(route_match) => {
                http_match_config(route_match, &spec.http, default_config, resolvers::rate_limit::compute).map(RateLimitConfig::L7)
            },
            ScopeDescriptor::GrpcMatch(route_match) => {
                grpc_match_config(route_match, &spec.grpc, default_config, resolvers::rate_limit::compute).map(RateLimitConfig::L7)
            },
        }
    }
}

impl AttachedPolicy for FaultInjectionPolicy {
    type Config = FaultInjectionConfig;
    const POLICY_KIND: PolicyKind = PolicyKind::FaultInjection;

    fn supported_targets() -> &'static [TargetKind] {
        &[HTTP_ROUTE_TARGET, GRPC_ROUTE_TARGET]
    }

    attachment_accessors!();

    fn config_for(&self, scope: &ScopeDescriptor) -> Option<Self::Config> {
        let spec = &self.spec;
        let default_config = spec.default_config.as_ref();
        let unit = spec.unit.as_deref();
        let compute = |config: Option<&FaultInjectionConfig>, default_config: Option<&FaultInjectionConfig>| {
            resolvers::fault_injection::compute(config, default_config, unit)
        };
        match scope {
            ScopeDescriptor::Port(_) => None,
            ScopeDescriptor::Hostname(hostname) => hostname_config(hostname, &spec.hostnames, default_config, compute),
            ScopeDescriptor::HttpMatch(route_match) => http_match_config(route_match, &spec.http, default_config, compute),
            ScopeDescriptor::GrpcMatch(route_match) => grpc_match_config(route_match, &spec.grpc, default_config, compute),
        }
    }
}

/// Policies configured per port only.
macro_rules! port_scoped_policy {
    ($policy:ty, $config:ty, $kind:expr, $targets:expr, $compute:path) => {
        impl AttachedPolicy for $policy {
            type Config = $config;
            const POLICY_KIND: PolicyKind = $kind;

            fn supported_targets() -> &'static [TargetKind] {
                $targets
            }

            attachment_accessors!();

            fn config_for(&self, scope: &ScopeDescriptor) -> Option<Self::Config> {
                match scope {
                    ScopeDescriptor::Port(port) => port_config(*port, &self.spec.ports, self.spec.default_config.as_ref(), $compute),
                    _ => None,
                }
            }
        }
    };
}

port_scoped_policy!(GatewayTLSPolicy, GatewayTLSConfig, PolicyKind::GatewayTLS, &[GATEWAY_TARGET], resolvers::gateway_tls::compute);
port_scoped_policy!(CircuitBreakingPolicy, CircuitBreakingConfig, PolicyKind::CircuitBreaking, SERVICE_TARGETS, resolvers::circuit_breaking::compute);
port_scoped_policy!(HealthCheckPolicy, HealthCheckConfig, PolicyKind::HealthCheck, SERVICE_TARGETS, resolvers::health_check::compute);
port_scoped_policy!(RetryPolicy, RetryConfig, PolicyKind::Retry, SERVICE_TARGETS, resolvers::retry::compute);
port_scoped_policy!(SessionStickyPolicy, SessionStickyConfig, PolicyKind::SessionSticky, SERVICE_TARGETS, resolvers::session_sticky::compute);
port_scoped_policy!(UpstreamTLSPolicy, UpstreamTLSConfig, PolicyKind::UpstreamTLS, SERVICE_TARGETS, resolvers::upstream_tls::compute);

impl AttachedPolicy for LoadBalancerPolicy {
    type Config = LoadBalancerType;
    const POLICY_KIND: PolicyKind = PolicyKind::LoadBalancer;

    fn supported_targets() -> &'static [TargetKind] {
        SERVICE_TARGETS
    }

    attachment_accessors!();

    fn config_for(&self, scope: &ScopeDescriptor) -> Option<Self::Config> {
        let ScopeDescriptor::Port(port) = scope else {
            return None;
        };
        self.spec
            .ports
            .iter()
            .find(|entry| entry.port == *port)
            .map(|entry| resolvers::load_balancer::compute_or_fallback(entry.r#type, self.spec.default_type))
    }
}

/// Backend TLS applies to every port of its target services.
impl AttachedPolicy for BackendTLSPolicy {
    type Config = BackendTLSPolicyValidation;
    const POLICY_KIND: PolicyKind = PolicyKind::BackendTLS;

    fn supported_targets() -> &'static [TargetKind] {
        SERVICE_TARGETS
    }

    attachment_accessors!();

    fn config_for(&self, scope: &ScopeDescriptor) -> Option<Self::Config> {
        match scope {
            ScopeDescriptor::Port(_) => resolvers::backend_tls::compute(Some(&self.spec.validation), None),
            _ => None,
        }
    }
}

impl AttachedPolicy for BackendLBPolicy {
    type Config = HTTPRouteRulesSessionPersistence;
    const POLICY_KIND: PolicyKind = PolicyKind::BackendLB;

    fn supported_targets() -> &'static [TargetKind] {
        SERVICE_TARGETS
    }

    attachment_accessors!();

    fn config_for(&self, scope: &ScopeDescriptor) -> Option<Self::Config> {
        match scope {
            ScopeDescriptor::Port(_) => resolvers::backend_lb::compute(self.spec.session_persistence.as_ref(), None),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::policies::{
        load_balancer::{LoadBalancerPolicySpec, PortLoadBalancer},
        rate_limit::{PortRateLimit, RateLimitPolicySpec},
        retry::RetryPolicySpec,
        PortConfig,
    };

    #[test]
    fn rate_limit_port_falls_back_to_policy_bps() {
        let policy = RateLimitPolicy::new(
            "limits",
            RateLimitPolicySpec {
                ports: vec![PortRateLimit { port: 80, bps: None }, PortRateLimit { port: 443, bps: Some(2048) }],
                default_bps: Some(1024),
                ..Default::default()
            },
        );
        assert_eq!(policy.config_for(&ScopeDescriptor::Port(80)), Some(RateLimitConfig::Bps(1024)));
        assert_eq!(policy.config_for(&ScopeDescriptor::Port(443)), Some(RateLimitConfig::Bps(2048)));
        assert_eq!(policy.config_for(&ScopeDescriptor::Port(8080)), None);
        assert_eq!(policy.config_for(&ScopeDescriptor::Hostname("example.com".to_owned())), None);
    }

    #[test]
    fn load_balancer_port_type() {
        let policy = LoadBalancerPolicy::new(
            "lb",
            LoadBalancerPolicySpec {
                ports: vec![PortLoadBalancer { port: 80, r#type: None }, PortLoadBalancer { port: 81, r#type: Some(LoadBalancerType::HashingLoadBalancer) }],
                ..Default::default()
            },
        );
        assert_eq!(policy.config_for(&ScopeDescriptor::Port(80)), Some(LoadBalancerType::RoundRobinLoadBalancer));
        assert_eq!(policy.config_for(&ScopeDescriptor::Port(81)), Some(LoadBalancerType::HashingLoadBalancer));
        assert_eq!(policy.config_for(&ScopeDescriptor::Port(82)), None);
    }

    #[test]
    fn retry_port_gets_fallbacks() {
        let policy = RetryPolicy::new("retry", RetryPolicySpec { ports: vec![PortConfig { port: 80, config: None }], ..Default::default() });
        assert_eq!(policy.config_for(&ScopeDescriptor::Port(80)), None);

        let policy = RetryPolicy::new(
            "retry",
            RetryPolicySpec { ports: vec![PortConfig { port: 80, config: None }], default_config: Some(RetryConfig::default()), ..Default::default() },
        );
        let config = policy.config_for(&ScopeDescriptor::Port(80)).unwrap_or_default();
        assert_eq!(config.num_retries, Some(3));
        assert_eq!(config.backoff_base_interval, Some(1.0));
    }

    #[test]
    fn supported_targets() {
        let service = PolicyTargetReference { group: String::new(), kind: "Service".to_owned(), name: "svc".to_owned(), ..Default::default() };
        let gateway = PolicyTargetReference { group: "gateway.networking.k8s.io".to_owned(), kind: "Gateway".to_owned(), name: "gw".to_owned(), ..Default::default() };
        assert!(RetryPolicy::supports_target(&service));
        assert!(!RetryPolicy::supports_target(&gateway));
        assert!(AccessControlPolicy::supports_target(&gateway));
        assert!(!FaultInjectionPolicy::supports_target(&gateway));
    }
}
