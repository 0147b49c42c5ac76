//! Policy attachment objects.
//!
//! Every policy references its targets through `targetRefs` and records its acceptance per
//! ancestor in `status.ancestors`. Scoped configuration entries share the generic shapes below.

pub mod access_control;
pub mod backend_lb;
pub mod backend_tls;
pub mod circuit_breaking;
pub mod fault_injection;
pub mod gateway_tls;
pub mod health_check;
pub mod load_balancer;
pub mod rate_limit;
pub mod retry;
pub mod session_sticky;
pub mod upstream_tls;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use access_control::{AccessControlConfig, AccessControlPolicy};
pub use backend_lb::BackendLBPolicy;
pub use backend_tls::{BackendTLSPolicy, BackendTLSPolicyValidation};
pub use circuit_breaking::{CircuitBreakingConfig, CircuitBreakingPolicy};
pub use fault_injection::{FaultInjectionConfig, FaultInjectionPolicy};
pub use gateway_tls::{GatewayTLSConfig, GatewayTLSPolicy};
pub use health_check::{HealthCheckConfig, HealthCheckPolicy};
pub use load_balancer::{LoadBalancerPolicy, LoadBalancerType};
pub use rate_limit::{L7RateLimit, RateLimitConfig, RateLimitPolicy};
pub use retry::{RetryConfig, RetryPolicy};
pub use session_sticky::{SessionStickyConfig, SessionStickyPolicy};
pub use upstream_tls::{UpstreamTLSConfig, UpstreamTLSPolicy};

use super::{
    routes::{GRPCRouteRulesMatches, HTTPRouteRulesMatches},
    ParentReference,
};

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTargetReference {
    #[serde(default)]
    pub group: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

impl PolicyTargetReference {
    /// Target namespace. An absent namespace means the policy's own namespace.
    pub fn namespace_or(&self, policy_namespace: &str) -> String {
        self.namespace.clone().unwrap_or_else(|| policy_namespace.to_owned())
    }

    pub fn to_parent_reference(&self, policy_namespace: &str) -> ParentReference {
        ParentReference {
            group: Some(self.group.clone()),
            kind: Some(self.kind.clone()),
            namespace: Some(self.namespace_or(policy_namespace)),
            name: self.name.clone(),
            section_name: self.section_name.clone(),
            port: None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    #[serde(default)]
    pub ancestors: Vec<PolicyAncestorStatus>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAncestorStatus {
    pub ancestor_ref: ParentReference,
    pub controller_name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortConfig<C> {
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<C>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostnameConfig<C> {
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<C>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HTTPMatchConfig<C> {
    pub r#match: HTTPRouteRulesMatches,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<C>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GRPCMatchConfig<C> {
    pub r#match: GRPCRouteRulesMatches,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<C>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct HTTPHeader {
    pub name: String,
    pub value: String,
}
