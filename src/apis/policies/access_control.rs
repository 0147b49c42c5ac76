use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{GRPCMatchConfig, HTTPMatchConfig, HostnameConfig, PolicyStatus, PolicyTargetReference, PortConfig};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "gateway.flomesh.io",
    version = "v1alpha1",
    kind = "AccessControlPolicy",
    status = "PolicyStatus",
    namespaced,
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlPolicySpec {
    pub target_refs: Vec<PolicyTargetReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortConfig<AccessControlConfig>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<HostnameConfig<AccessControlConfig>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http: Vec<HTTPMatchConfig<AccessControlConfig>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grpc: Vec<GRPCMatchConfig<AccessControlConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "config")]
    pub default_config: Option<AccessControlConfig>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blacklist: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub whitelist: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "enableXFF")]
    pub enable_xff: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
