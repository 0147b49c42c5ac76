use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{GRPCMatchConfig, HTTPHeader, HTTPMatchConfig, HostnameConfig, PolicyStatus, PolicyTargetReference};

/// Rate limiting for gateways and routes.
///
/// Ports are limited in bytes per second, with `bps` as the policy wide default. Hostnames and
/// route matches are limited in requests per window, with `config` as the policy wide default.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "gateway.flomesh.io",
    version = "v1alpha1",
    kind = "RateLimitPolicy",
    status = "PolicyStatus",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicySpec {
    pub target_refs: Vec<PolicyTargetReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortRateLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "bps")]
    pub default_bps: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<HostnameConfig<L7RateLimit>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http: Vec<HTTPMatchConfig<L7RateLimit>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grpc: Vec<GRPCMatchConfig<L7RateLimit>>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "config")]
    pub default_config: Option<L7RateLimit>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortRateLimit {
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bps: Option<i64>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum RateLimitPolicyMode {
    #[default]
    Local,
    Global,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct L7RateLimit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RateLimitPolicyMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlog: Option<i32>,
    pub requests: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<i32>,
    pub stat_time_window: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_status_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_headers_to_add: Vec<HTTPHeader>,
}

/// Effective configuration of a rate limit policy at one scope.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RateLimitConfig {
    Bps(i64),
    L7(L7RateLimit),
}
