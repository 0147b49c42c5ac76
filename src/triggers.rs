// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

//! Decides whether a cluster object change can affect any compiled configuration.
//!
//! Checks are deliberately coarse. Reference grants are not evaluated here; the generator applies
//! them when it compiles.

use std::collections::HashMap;

use k8s_openapi::api::{
    core::v1::{ConfigMap, Endpoints, Namespace, Secret, Service},
    discovery::v1::EndpointSlice,
};
use kube::ResourceExt;
use tracing::{debug, warn};

use crate::{
    apis::{
        policies::{
            AccessControlPolicy, BackendLBPolicy, BackendTLSPolicy, CircuitBreakingPolicy, FaultInjectionPolicy, GatewayTLSPolicy, HealthCheckPolicy,
            LoadBalancerPolicy, PolicyTargetReference, RateLimitPolicy, RetryPolicy, SessionStickyPolicy, UpstreamTLSPolicy,
        },
        gateway::backend_client_certificate_ref,
        GRPCRoute, Gateway, GatewayRoute, HTTPRoute, ListenerExt, ObjectReference, ReferenceGrant, ServiceImport, TCPRoute, TLSRoute, UDPRoute, CORE_GROUP, GATEWAY_API_GROUP,
        KIND_CONFIG_MAP, KIND_GATEWAY, KIND_GRPC_ROUTE, KIND_HTTP_ROUTE, KIND_SECRET, KIND_SERVICE, KIND_SERVICE_IMPORT, MULTICLUSTER_API_GROUP,
    },
    common::{
        gateway_api::{is_active_gateway, is_effective_route},
        ResourceKey,
    },
    generator::is_headless_service_without_selector,
    policy::{AttachedPolicy, PolicyKind},
    state::{Cache, Cached, StorageError, SERVICE_NAME_LABEL},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Gateway,
    HttpRoute,
    GrpcRoute,
    TcpRoute,
    UdpRoute,
    TlsRoute,
    Service,
    ServiceImport,
    Endpoints,
    EndpointSlice,
    Secret,
    ConfigMap,
    Namespace,
    ReferenceGrant,
    Policy,
}

/// Target references of a policy, as seen by the triggers.
#[derive(Clone, Debug)]
pub struct PolicyTargets {
    pub kind: PolicyKind,
    pub namespace: String,
    pub target_refs: Vec<PolicyTargetReference>,
}

/// A changed cluster object.
#[derive(Clone, Debug)]
pub enum ClusterObject {
    Gateway(Gateway),
    HttpRoute(HTTPRoute),
    GrpcRoute(GRPCRoute),
    TcpRoute(TCPRoute),
    UdpRoute(UDPRoute),
    TlsRoute(TLSRoute),
    Service(Service),
    ServiceImport(ServiceImport),
    Endpoints(Endpoints),
    EndpointSlice(EndpointSlice),
    Secret(Secret),
    ConfigMap(ConfigMap),
    Namespace(Namespace),
    ReferenceGrant(ReferenceGrant),
    Policy(PolicyTargets),
}

impl ClusterObject {
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            ClusterObject::Gateway(_) => ResourceKind::Gateway,
            ClusterObject::HttpRoute(_) => ResourceKind::HttpRoute,
            ClusterObject::GrpcRoute(_) => ResourceKind::GrpcRoute,
            ClusterObject::TcpRoute(_) => ResourceKind::TcpRoute,
            ClusterObject::UdpRoute(_) => ResourceKind::UdpRoute,
            ClusterObject::TlsRoute(_) => ResourceKind::TlsRoute,
            ClusterObject::Service(_) => ResourceKind::Service,
            ClusterObject::ServiceImport(_) => ResourceKind::ServiceImport,
            ClusterObject::Endpoints(_) => ResourceKind::Endpoints,
            ClusterObject::EndpointSlice(_) => ResourceKind::EndpointSlice,
            ClusterObject::Secret(_) => ResourceKind::Secret,
            ClusterObject::ConfigMap(_) => ResourceKind::ConfigMap,
            ClusterObject::Namespace(_) => ResourceKind::Namespace,
            ClusterObject::ReferenceGrant(_) => ResourceKind::ReferenceGrant,
            ClusterObject::Policy(_) => ResourceKind::Policy,
        }
    }
}

/// Conversion of a watched object into the shape the triggers inspect.
pub trait Watched: Cached + ResourceExt + std::fmt::Debug {
    fn cluster_object(&self) -> ClusterObject;
}

macro_rules! watched {
    ($($kind:ty => $variant:ident),* $(,)?) => {
        $(
            impl Watched for $kind {
                fn cluster_object(&self) -> ClusterObject {
                    ClusterObject::$variant(self.clone())
                }
            }
        )*
    };
}

watched!(
    Gateway => Gateway,
    HTTPRoute => HttpRoute,
    GRPCRoute => GrpcRoute,
    TCPRoute => TcpRoute,
    UDPRoute => UdpRoute,
    TLSRoute => TlsRoute,
    Service => Service,
    ServiceImport => ServiceImport,
    Endpoints => Endpoints,
    EndpointSlice => EndpointSlice,
    Secret => Secret,
    ConfigMap => ConfigMap,
    Namespace => Namespace,
    ReferenceGrant => ReferenceGrant,
);

macro_rules! watched_policy {
    ($($kind:ty),* $(,)?) => {
        $(
            impl Watched for $kind {
                fn cluster_object(&self) -> ClusterObject {
                    ClusterObject::Policy(PolicyTargets {
                        kind: <$kind as AttachedPolicy>::POLICY_KIND,
                        namespace: self.namespace().unwrap_or_default(),
                        target_refs: self.target_refs().to_vec(),
                    })
                }
            }
        )*
    };
}

watched_policy!(
    AccessControlPolicy,
    CircuitBreakingPolicy,
    FaultInjectionPolicy,
    GatewayTLSPolicy,
    HealthCheckPolicy,
    LoadBalancerPolicy,
    RateLimitPolicy,
    RetryPolicy,
    SessionStickyPolicy,
    UpstreamTLSPolicy,
    BackendTLSPolicy,
    BackendLBPolicy,
);

pub trait Trigger: Send + Sync {
    fn insert(&self, object: &ClusterObject, cache: &Cache) -> bool;

    fn delete(&self, object: &ClusterObject, cache: &Cache) -> bool {
        self.insert(object, cache)
    }
}

fn relevant(result: Result<bool, StorageError>) -> bool {
    result.unwrap_or_else(|e| {
        warn!("Relevance check failed {e}");
        false
    })
}

struct AlwaysTrigger;

impl Trigger for AlwaysTrigger {
    fn insert(&self, _object: &ClusterObject, _cache: &Cache) -> bool {
        true
    }
}

struct RouteTrigger;

impl Trigger for RouteTrigger {
    fn insert(&self, object: &ClusterObject, _cache: &Cache) -> bool {
        match object {
            ClusterObject::HttpRoute(route) => is_effective_route(&route.parents_status()),
            ClusterObject::GrpcRoute(route) => is_effective_route(&route.parents_status()),
            ClusterObject::TcpRoute(route) => is_effective_route(&route.parents_status()),
            ClusterObject::UdpRoute(route) => is_effective_route(&route.parents_status()),
            ClusterObject::TlsRoute(route) => is_effective_route(&route.parents_status()),
            _ => false,
        }
    }
}

struct ServiceTrigger;

impl Trigger for ServiceTrigger {
    fn insert(&self, object: &ClusterObject, cache: &Cache) -> bool {
        let (namespace, name) = match object {
            ClusterObject::Service(service) => (service.namespace().unwrap_or_default(), service.name_any()),
            ClusterObject::ServiceImport(service_import) => (service_import.namespace().unwrap_or_default(), service_import.name_any()),
            _ => return false,
        };
        relevant(is_routable_service(cache, &namespace, &name).and_then(|routable| Ok(routable || is_policy_target(cache, &namespace, &name)?)))
    }
}

struct EndpointsTrigger;

impl Trigger for EndpointsTrigger {
    fn insert(&self, object: &ClusterObject, cache: &Cache) -> bool {
        let (namespace, service_name) = match object {
            ClusterObject::Endpoints(endpoints) => (endpoints.namespace().unwrap_or_default(), Some(endpoints.name_any())),
            ClusterObject::EndpointSlice(slice) => (slice.namespace().unwrap_or_default(), slice.labels().get(SERVICE_NAME_LABEL).cloned()),
            _ => return false,
        };
        let Some(service_name) = service_name else {
            return false;
        };
        relevant(owning_service_relevant(cache, &namespace, &service_name))
    }
}

fn owning_service_relevant(cache: &Cache, namespace: &str, service_name: &str) -> Result<bool, StorageError> {
    if is_routable_service(cache, namespace, service_name)? {
        return Ok(true);
    }
    Ok(cache.get_service(namespace, service_name)?.is_some_and(|service| is_headless_service_without_selector(&service)))
}

/// Secrets and config maps holding certificates.
struct CertificateTrigger;

impl Trigger for CertificateTrigger {
    fn insert(&self, object: &ClusterObject, cache: &Cache) -> bool {
        let key = match object {
            ClusterObject::Secret(secret) => ResourceKey {
                group: CORE_GROUP.to_owned(),
                namespace: secret.namespace().unwrap_or_default(),
                name: secret.name_any(),
                kind: KIND_SECRET.to_owned(),
            },
            ClusterObject::ConfigMap(config_map) => ResourceKey {
                group: CORE_GROUP.to_owned(),
                namespace: config_map.namespace().unwrap_or_default(),
                name: config_map.name_any(),
                kind: KIND_CONFIG_MAP.to_owned(),
            },
            _ => return false,
        };
        relevant(is_certificate_referred(cache, &key))
    }
}

fn object_ref_key(object_ref: &ObjectReference, default_kind: &'static str, default_namespace: &str) -> ResourceKey {
    ResourceKey {
        group: object_ref.group_or_core().to_owned(),
        namespace: object_ref.namespace_or(default_namespace),
        name: object_ref.name.clone(),
        kind: object_ref.kind_or(default_kind),
    }
}

fn is_certificate_referred(cache: &Cache, key: &ResourceKey) -> Result<bool, StorageError> {
    for gateway in cache.list::<Gateway>()? {
        let namespace = gateway.namespace().unwrap_or_default();
        let mut referred = vec![];
        for listener in &gateway.spec.listeners {
            referred.extend(listener.certificate_refs().iter().map(|object_ref| object_ref_key(object_ref, KIND_SECRET, &namespace)));
            referred.extend(listener.ca_certificate_refs().iter().map(|object_ref| object_ref_key(object_ref, KIND_CONFIG_MAP, &namespace)));
        }
        referred.extend(backend_client_certificate_ref(&gateway).map(|object_ref| object_ref_key(&object_ref, KIND_SECRET, &namespace)));
        if referred.contains(key) {
            return Ok(true);
        }
    }

    Ok(cache.list::<BackendTLSPolicy>()?.iter().any(|policy| {
        let namespace = policy.namespace().unwrap_or_default();
        policy.spec.validation.ca_certificate_refs.iter().any(|object_ref| object_ref_key(object_ref, KIND_CONFIG_MAP, &namespace) == *key)
    }))
}

struct PolicyTrigger;

impl Trigger for PolicyTrigger {
    fn insert(&self, object: &ClusterObject, cache: &Cache) -> bool {
        let ClusterObject::Policy(policy) = object else {
            return false;
        };
        let effective = policy.target_refs.iter().any(|target_ref| relevant(is_effective_target(cache, &policy.namespace, target_ref)));
        debug!("{} in {} targets effective objects {effective}", policy.kind, policy.namespace);
        effective
    }
}

fn is_effective_target(cache: &Cache, policy_namespace: &str, target_ref: &PolicyTargetReference) -> Result<bool, StorageError> {
    let key = ResourceKey::from_target_ref(target_ref, policy_namespace);
    match (key.group.as_str(), key.kind.as_str()) {
        (GATEWAY_API_GROUP, KIND_GATEWAY) => Ok(cache.get::<Gateway>(&key)?.is_some_and(|gateway| is_active_gateway(&gateway))),
        (GATEWAY_API_GROUP, KIND_HTTP_ROUTE) => Ok(cache.get::<HTTPRoute>(&key)?.is_some()),
        (GATEWAY_API_GROUP, KIND_GRPC_ROUTE) => Ok(cache.get::<GRPCRoute>(&key)?.is_some()),
        (CORE_GROUP, KIND_SERVICE) | (MULTICLUSTER_API_GROUP, KIND_SERVICE_IMPORT) => is_routable_service(cache, &key.namespace, &key.name),
        _ => Ok(false),
    }
}

fn route_refers_to<R: GatewayRoute + Cached>(cache: &Cache, namespace: &str, name: &str) -> Result<bool, StorageError> {
    Ok(cache.list::<R>()?.iter().any(|route| {
        let route_namespace = route.namespace().unwrap_or_default();
        route.backend_refs().into_iter().any(|backend_ref| {
            let key = ResourceKey::from_backend_ref(&backend_ref, &route_namespace);
            (key.kind == KIND_SERVICE || key.kind == KIND_SERVICE_IMPORT) && key.namespace == namespace && key.name == name
        })
    }))
}

/// The service is a backend of some route.
pub fn is_routable_service(cache: &Cache, namespace: &str, name: &str) -> Result<bool, StorageError> {
    Ok(route_refers_to::<HTTPRoute>(cache, namespace, name)?
        || route_refers_to::<GRPCRoute>(cache, namespace, name)?
        || route_refers_to::<TLSRoute>(cache, namespace, name)?
        || route_refers_to::<TCPRoute>(cache, namespace, name)?
        || route_refers_to::<UDPRoute>(cache, namespace, name)?)
}

fn targeted_by<P: AttachedPolicy>(cache: &Cache, service: &ResourceKey, service_import: &ResourceKey) -> Result<bool, StorageError> {
    Ok(cache.list::<P>()?.iter().any(|policy| policy.targets(service) || policy.targets(service_import)))
}

fn is_policy_target(cache: &Cache, namespace: &str, name: &str) -> Result<bool, StorageError> {
    let service = ResourceKey { group: CORE_GROUP.to_owned(), namespace: namespace.to_owned(), name: name.to_owned(), kind: KIND_SERVICE.to_owned() };
    let service_import = ResourceKey { group: MULTICLUSTER_API_GROUP.to_owned(), kind: KIND_SERVICE_IMPORT.to_owned(), ..service.clone() };
    Ok(targeted_by::<CircuitBreakingPolicy>(cache, &service, &service_import)?
        || targeted_by::<HealthCheckPolicy>(cache, &service, &service_import)?
        || targeted_by::<LoadBalancerPolicy>(cache, &service, &service_import)?
        || targeted_by::<RetryPolicy>(cache, &service, &service_import)?
        || targeted_by::<SessionStickyPolicy>(cache, &service, &service_import)?
        || targeted_by::<UpstreamTLSPolicy>(cache, &service, &service_import)?
        || targeted_by::<BackendTLSPolicy>(cache, &service, &service_import)?
        || targeted_by::<BackendLBPolicy>(cache, &service, &service_import)?)
}

/// Triggers by the kind of object they judge.
pub struct TriggerRegistry {
    triggers: HashMap<ResourceKind, Box<dyn Trigger>>,
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerRegistry {
    pub fn new() -> Self {
        let mut triggers: HashMap<ResourceKind, Box<dyn Trigger>> = HashMap::new();
        for kind in [ResourceKind::Gateway, ResourceKind::Namespace, ResourceKind::ReferenceGrant] {
            triggers.insert(kind, Box::new(AlwaysTrigger));
        }
        for kind in [ResourceKind::HttpRoute, ResourceKind::GrpcRoute, ResourceKind::TcpRoute, ResourceKind::UdpRoute, ResourceKind::TlsRoute] {
            triggers.insert(kind, Box::new(RouteTrigger));
        }
        triggers.insert(ResourceKind::Service, Box::new(ServiceTrigger));
        triggers.insert(ResourceKind::ServiceImport, Box::new(ServiceTrigger));
        triggers.insert(ResourceKind::Endpoints, Box::new(EndpointsTrigger));
        triggers.insert(ResourceKind::EndpointSlice, Box::new(EndpointsTrigger));
        triggers.insert(ResourceKind::Secret, Box::new(CertificateTrigger));
        triggers.insert(ResourceKind::ConfigMap, Box::new(CertificateTrigger));
        triggers.insert(ResourceKind::Policy, Box::new(PolicyTrigger));
        Self { triggers }
    }

    pub fn insert(&self, object: &ClusterObject, cache: &Cache) -> bool {
        self.triggers.get(&object.resource_kind()).is_some_and(|trigger| trigger.insert(object, cache))
    }

    pub fn delete(&self, object: &ClusterObject, cache: &Cache) -> bool {
        self.triggers.get(&object.resource_kind()).is_some_and(|trigger| trigger.delete(object, cache))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::ServiceSpec;
    use kube::api::ObjectMeta;

    use super::*;

    const HTTP_ROUTE: &str = r#"
apiVersion: gateway.networking.k8s.io/v1
kind: HTTPRoute
metadata:
  name: web
  namespace: apps
spec:
  parentRefs:
    - name: edge
  rules:
    - backendRefs:
        - name: web
          port: 80
"#;

    const GATEWAY: &str = r#"
apiVersion: gateway.networking.k8s.io/v1
kind: Gateway
metadata:
  name: edge
  namespace: apps
spec:
  gatewayClassName: fsm
  listeners:
    - name: https
      port: 443
      protocol: HTTPS
      tls:
        certificateRefs:
          - name: edge-cert
        frontendValidation:
          caCertificateRefs:
            - name: client-ca
"#;

    fn meta(namespace: &str, name: &str) -> ObjectMeta {
        ObjectMeta { name: Some(name.to_owned()), namespace: Some(namespace.to_owned()), ..Default::default() }
    }

    fn service(name: &str, selector: Option<BTreeMap<String, String>>, cluster_ip: Option<&str>) -> Service {
        Service {
            metadata: meta("apps", name),
            spec: Some(ServiceSpec { selector, cluster_ip: cluster_ip.map(str::to_owned), ..Default::default() }),
            status: None,
        }
    }

    #[test]
    fn services_are_relevant_when_routed() {
        let cache = Cache::new();
        let registry = TriggerRegistry::new();
        let _ = cache.save(serde_yaml::from_str::<HTTPRoute>(HTTP_ROUTE).unwrap());

        assert!(registry.insert(&ClusterObject::Service(service("web", None, None)), &cache));
        assert!(!registry.insert(&ClusterObject::Service(service("other", None, None)), &cache));
    }

    #[test]
    fn endpoints_follow_their_service() {
        let cache = Cache::new();
        let registry = TriggerRegistry::new();
        let _ = cache.save(serde_yaml::from_str::<HTTPRoute>(HTTP_ROUTE).unwrap());
        let _ = cache.save(service("headless", None, Some("None")));

        let routed = Endpoints { metadata: meta("apps", "web"), ..Default::default() };
        let headless = Endpoints { metadata: meta("apps", "headless"), ..Default::default() };
        let unrelated = Endpoints { metadata: meta("apps", "unrelated"), ..Default::default() };
        assert!(registry.insert(&ClusterObject::Endpoints(routed), &cache));
        assert!(registry.insert(&ClusterObject::Endpoints(headless), &cache));
        assert!(!registry.delete(&ClusterObject::Endpoints(unrelated), &cache));

        let slice = EndpointSlice {
            metadata: ObjectMeta {
                labels: Some(BTreeMap::from([(SERVICE_NAME_LABEL.to_owned(), "web".to_owned())])),
                ..meta("apps", "web-abc")
            },
            ..Default::default()
        };
        assert!(registry.insert(&ClusterObject::EndpointSlice(slice), &cache));
    }

    #[test]
    fn certificates_are_relevant_when_referred() {
        let cache = Cache::new();
        let registry = TriggerRegistry::new();
        let _ = cache.save(serde_yaml::from_str::<Gateway>(GATEWAY).unwrap());

        let secret = Secret { metadata: meta("apps", "edge-cert"), ..Default::default() };
        let other_secret = Secret { metadata: meta("other", "edge-cert"), ..Default::default() };
        let config_map = ConfigMap { metadata: meta("apps", "client-ca"), ..Default::default() };
        assert!(registry.insert(&ClusterObject::Secret(secret), &cache));
        assert!(!registry.insert(&ClusterObject::Secret(other_secret), &cache));
        assert!(registry.insert(&ClusterObject::ConfigMap(config_map), &cache));
    }

    #[test]
    fn routes_and_policies() {
        let cache = Cache::new();
        let registry = TriggerRegistry::new();
        let route: HTTPRoute = serde_yaml::from_str(HTTP_ROUTE).unwrap();
        assert!(!registry.insert(&route.cluster_object(), &cache));
        let _ = cache.save(route);

        let retry = RetryPolicy {
            metadata: meta("apps", "retry"),
            spec: crate::apis::policies::retry::RetryPolicySpec {
                target_refs: vec![PolicyTargetReference { group: String::new(), kind: "Service".to_owned(), name: "web".to_owned(), ..Default::default() }],
                ..Default::default()
            },
            status: None,
        };
        assert!(registry.insert(&retry.cluster_object(), &cache));

        let inactive_gateway = AccessControlPolicy {
            metadata: meta("apps", "acl"),
            spec: crate::apis::policies::access_control::AccessControlPolicySpec {
                target_refs: vec![PolicyTargetReference {
                    group: GATEWAY_API_GROUP.to_owned(),
                    kind: KIND_GATEWAY.to_owned(),
                    name: "edge".to_owned(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            status: None,
        };
        let _ = cache.save(serde_yaml::from_str::<Gateway>(GATEWAY).unwrap());
        assert!(!registry.insert(&inactive_gateway.cluster_object(), &cache));
        assert!(registry.insert(&ClusterObject::Namespace(Namespace { metadata: meta("", "apps"), ..Default::default() }), &cache));
    }
}
