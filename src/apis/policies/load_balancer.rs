use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{PolicyStatus, PolicyTargetReference};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "gateway.flomesh.io",
    version = "v1alpha1",
    kind = "LoadBalancerPolicy",
    status = "PolicyStatus",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerPolicySpec {
    pub target_refs: Vec<PolicyTargetReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortLoadBalancer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_type: Option<LoadBalancerType>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortLoadBalancer {
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<LoadBalancerType>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum LoadBalancerType {
    #[default]
    RoundRobinLoadBalancer,
    HashingLoadBalancer,
    LeastConnectionLoadBalancer,
}
