use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{PolicyStatus, PolicyTargetReference, PortConfig};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "gateway.flomesh.io",
    version = "v1alpha1",
    kind = "CircuitBreakingPolicy",
    status = "PolicyStatus",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakingPolicySpec {
    pub target_refs: Vec<PolicyTargetReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortConfig<CircuitBreakingConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "config")]
    pub default_config: Option<CircuitBreakingConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakingConfig {
    pub min_request_amount: i32,
    pub stat_time_window: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slow_time_threshold: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slow_amount_threshold: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slow_ratio_threshold: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_amount_threshold: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_ratio_threshold: Option<f32>,
    pub degraded_time_window: i32,
    pub degraded_status_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_response_content: Option<String>,
}
