use std::collections::BTreeMap;

use serde::Serialize;

use crate::apis::{
    policies::{
        AccessControlConfig, CircuitBreakingConfig, FaultInjectionConfig, GatewayTLSConfig, HealthCheckConfig, L7RateLimit, LoadBalancerType,
        PortConfig, RetryConfig, SessionStickyConfig,
    },
    routes::{
        GRPCRouteRulesBackendRefsFilters, GRPCRouteRulesFilters, GRPCRouteRulesMatches, GRPCRouteRulesSessionPersistence, HTTPRouteRulesBackendRefsFilters,
        HTTPRouteRulesFilters, HTTPRouteRulesMatches, HTTPRouteRulesSessionPersistence, HTTPRouteRulesTimeouts,
    },
    ParentReference, ProtocolType, TLSModeType, KIND_BACKEND,
};

/// Compiled configuration of one gateway.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSpec {
    pub resources: Vec<Resource>,
    pub secrets: BTreeMap<String, String>,
    pub filters: BTreeMap<String, BTreeMap<String, String>>,
    pub version: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "kind")]
pub enum Resource {
    Gateway(CompiledGateway),
    #[serde(rename = "HTTPRoute")]
    HttpRoute(CompiledRoute<CompiledHTTPRule>),
    #[serde(rename = "GRPCRoute")]
    GrpcRoute(CompiledRoute<CompiledGRPCRule>),
    #[serde(rename = "TLSRoute")]
    TlsRoute(CompiledRoute<CompiledL4Rule>),
    #[serde(rename = "TCPRoute")]
    TcpRoute(CompiledRoute<CompiledL4Rule>),
    #[serde(rename = "UDPRoute")]
    UdpRoute(CompiledRoute<CompiledL4Rule>),
    Backend(Backend),
    #[serde(rename = "BackendTLSPolicy")]
    BackendTlsPolicy(CompiledPolicy<CompiledBackendTLS>),
    #[serde(rename = "BackendLBPolicy")]
    BackendLbPolicy(CompiledPolicy<CompiledBackendLB>),
    HealthCheckPolicy(CompiledPolicy<PortConfigs<HealthCheckConfig>>),
    RetryPolicy(CompiledPolicy<PortConfigs<RetryConfig>>),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Gateway(_) => "Gateway",
            Resource::HttpRoute(_) => "HTTPRoute",
            Resource::GrpcRoute(_) => "GRPCRoute",
            Resource::TlsRoute(_) => "TLSRoute",
            Resource::TcpRoute(_) => "TCPRoute",
            Resource::UdpRoute(_) => "UDPRoute",
            Resource::Backend(_) => KIND_BACKEND,
            Resource::BackendTlsPolicy(_) => "BackendTLSPolicy",
            Resource::BackendLbPolicy(_) => "BackendLBPolicy",
            Resource::HealthCheckPolicy(_) => "HealthCheckPolicy",
            Resource::RetryPolicy(_) => "RetryPolicy",
        }
    }

    pub fn metadata(&self) -> &ResourceMetadata {
        match self {
            Resource::Gateway(gateway) => &gateway.metadata,
            Resource::HttpRoute(route) => &route.metadata,
            Resource::GrpcRoute(route) => &route.metadata,
            Resource::TlsRoute(route) | Resource::TcpRoute(route) | Resource::UdpRoute(route) => &route.metadata,
            Resource::Backend(backend) => &backend.metadata,
            Resource::BackendTlsPolicy(policy) => &policy.metadata,
            Resource::BackendLbPolicy(policy) => &policy.metadata,
            Resource::HealthCheckPolicy(policy) => &policy.metadata,
            Resource::RetryPolicy(policy) => &policy.metadata,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceMetadata {
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        Self { name: name.to_owned(), namespace: Some(namespace.to_owned()) }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledGateway {
    pub metadata: ResourceMetadata,
    pub spec: CompiledGatewaySpec,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledGatewaySpec {
    pub gateway_class_name: String,
    pub listeners: Vec<CompiledListener>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<CompiledAddress>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "backendTLS")]
    pub backend_tls: Option<CompiledGatewayBackendTLS>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    pub value: String,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledGatewayBackendTLS {
    pub client_certificate: CertificateFiles,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledListener {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub port: u16,
    pub protocol: ProtocolType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<CompiledListenerTLS>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_control: Option<AccessControlConfig>,
    /// Bytes per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "gatewayTLS")]
    pub gateway_tls: Option<GatewayTLSConfig>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledListenerTLS {
    pub mode: TLSModeType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<CertificateFiles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend_validation: Option<CompiledFrontendValidation>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

/// Names of the secret files holding a certificate and its key.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateFiles {
    pub cert_file: String,
    pub key_file: String,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaFile {
    pub ca_file: String,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledFrontendValidation {
    pub ca_certificates: Vec<CaFile>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledRoute<Rule> {
    pub metadata: ResourceMetadata,
    pub spec: CompiledRouteSpec<Rule>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledRouteSpec<Rule> {
    pub parent_refs: Vec<ParentReference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,
    /// Route level policies evaluated per served hostname.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hostname_policies: Vec<HostnamePolicies>,
    pub rules: Vec<Rule>,
}

/// Access control, rate limit and fault injection in effect at one scope of a route.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScopedPolicies {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_control: Option<AccessControlConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<L7RateLimit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_injection: Option<FaultInjectionConfig>,
}

impl ScopedPolicies {
    pub fn is_empty(&self) -> bool {
        self.access_control.is_none() && self.rate_limit.is_none() && self.fault_injection.is_none()
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostnamePolicies {
    pub hostname: String,
    #[serde(flatten)]
    pub policies: ScopedPolicies,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledHTTPMatch {
    #[serde(flatten)]
    pub route_match: HTTPRouteRulesMatches,
    #[serde(flatten)]
    pub policies: ScopedPolicies,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledGRPCMatch {
    #[serde(flatten)]
    pub route_match: GRPCRouteRulesMatches,
    #[serde(flatten)]
    pub policies: ScopedPolicies,
}

/// L4 backend references carry no filters.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub enum NoFilter {}

/// Reference from a compiled rule to a compiled [`Backend`].
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledBackendRef<F = NoFilter> {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<F>,
}

impl<F> CompiledBackendRef<F> {
    pub fn new(name: String, weight: Option<i32>) -> Self {
        Self { kind: KIND_BACKEND.to_owned(), name, weight, filters: vec![] }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledHTTPRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Most specific first.
    pub matches: Vec<CompiledHTTPMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<HTTPRouteRulesFilters>,
    pub backend_refs: Vec<CompiledBackendRef<HTTPRouteRulesBackendRefsFilters>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<HTTPRouteRulesTimeouts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_persistence: Option<HTTPRouteRulesSessionPersistence>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledGRPCRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub matches: Vec<CompiledGRPCMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<GRPCRouteRulesFilters>,
    pub backend_refs: Vec<CompiledBackendRef<GRPCRouteRulesBackendRefsFilters>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_persistence: Option<GRPCRouteRulesSessionPersistence>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledL4Rule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub backend_refs: Vec<CompiledBackendRef>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    pub metadata: ResourceMetadata,
    pub spec: BackendSpec,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendSpec {
    pub targets: Vec<BackendTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaking: Option<CircuitBreakingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<LoadBalancerType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_sticky: Option<SessionStickyConfig>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "upstreamTLS")]
    pub upstream_tls: Option<CompiledUpstreamTLS>,
}

/// Client certificate presented to the backend, written to the config secrets.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledUpstreamTLS {
    #[serde(flatten)]
    pub certificate: CertificateFiles,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "mTLS")]
    pub m_tls: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct BackendTarget {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    pub weight: i32,
}

impl BackendTarget {
    pub fn new(address: String, port: Option<i32>) -> Self {
        Self { address, port, weight: 1 }
    }
}

/// A backend oriented policy narrowed to the compiled backends that referenced it.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledPolicy<S> {
    pub metadata: ResourceMetadata,
    pub spec: CompiledPolicySpec<S>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledPolicySpec<S> {
    pub target_refs: Vec<BackendTargetRef>,
    #[serde(flatten)]
    pub config: S,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackendTargetRef {
    pub kind: String,
    pub name: String,
}

impl BackendTargetRef {
    pub fn backend(name: &str) -> Self {
        Self { kind: KIND_BACKEND.to_owned(), name: name.to_owned() }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortConfigs<C> {
    pub ports: Vec<PortConfig<C>>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledBackendTLS {
    pub validation: CompiledBackendTLSValidation,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledBackendTLSValidation {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ca_certificates: Vec<CaFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub well_known_ca_certificates: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledBackendLB {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_persistence: Option<HTTPRouteRulesSessionPersistence>,
}
