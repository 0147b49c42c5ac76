// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use k8s_openapi::api::{
    core::v1::{ConfigMap, Endpoints, Namespace, Secret, Service},
    discovery::v1::EndpointSlice,
};
use kube::Resource;

use crate::{
    apis::{
        policies::{
            AccessControlPolicy, BackendLBPolicy, BackendTLSPolicy, CircuitBreakingPolicy, FaultInjectionPolicy, GatewayTLSPolicy, HealthCheckPolicy,
            LoadBalancerPolicy, RateLimitPolicy, RetryPolicy, SessionStickyPolicy, UpstreamTLSPolicy,
        },
        routes::GatewayRoute,
        GRPCRoute, Gateway, HTTPRoute, ReferenceGrant, ServiceImport, TCPRoute, TLSRoute, UDPRoute,
    },
    common::{gateway_api::is_ref_to_gateway, sort_by_creation, ResourceKey},
};

pub const SERVICE_NAME_LABEL: &str = "kubernetes.io/service-name";
pub const MULTICLUSTER_SERVICE_NAME_LABEL: &str = "multicluster.kubernetes.io/service-name";

#[derive(thiserror::Error, Debug, PartialEq, PartialOrd)]
pub enum StorageError {
    LockingError,
}
impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Objects of one kind, keyed by [`ResourceKey`].
#[derive(Debug)]
pub struct ObjectStore<R> {
    objects: Arc<Mutex<HashMap<ResourceKey, Arc<R>>>>,
}

impl<R> Clone for ObjectStore<R> {
    fn clone(&self) -> Self {
        Self { objects: Arc::clone(&self.objects) }
    }
}

impl<R> Default for ObjectStore<R> {
    fn default() -> Self {
        Self { objects: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl<R> ObjectStore<R>
where
    R: Resource<DynamicType = ()>,
{
    pub fn save(&self, resource: R) -> Result<Option<Arc<R>>, StorageError> {
        let mut lock = self.objects.lock().map_err(|_| StorageError::LockingError)?;
        Ok(lock.insert(ResourceKey::from_resource(&resource), Arc::new(resource)))
    }

    pub fn delete(&self, id: &ResourceKey) -> Result<Option<Arc<R>>, StorageError> {
        let mut lock = self.objects.lock().map_err(|_| StorageError::LockingError)?;
        Ok(lock.remove(id))
    }

    pub fn get(&self, id: &ResourceKey) -> Result<Option<Arc<R>>, StorageError> {
        let lock = self.objects.lock().map_err(|_| StorageError::LockingError)?;
        Ok(lock.get(id).cloned())
    }

    pub fn list(&self) -> Result<Vec<Arc<R>>, StorageError> {
        let lock = self.objects.lock().map_err(|_| StorageError::LockingError)?;
        Ok(lock.values().cloned().collect())
    }

    pub fn replace_all(&self, resources: Vec<R>) -> Result<(), StorageError> {
        let mut lock = self.objects.lock().map_err(|_| StorageError::LockingError)?;
        lock.clear();
        for resource in resources {
            lock.insert(ResourceKey::from_resource(&resource), Arc::new(resource));
        }
        Ok(())
    }
}

/// Local read-through copy of the cluster objects the engine reads.
///
/// Populated and refreshed by the controllers, shared by reference with the generator, the
/// triggers and the status processor.
#[derive(Clone, Default)]
pub struct Cache {
    pub gateways: ObjectStore<Gateway>,
    pub http_routes: ObjectStore<HTTPRoute>,
    pub grpc_routes: ObjectStore<GRPCRoute>,
    pub tcp_routes: ObjectStore<TCPRoute>,
    pub udp_routes: ObjectStore<UDPRoute>,
    pub tls_routes: ObjectStore<TLSRoute>,
    pub services: ObjectStore<Service>,
    pub service_imports: ObjectStore<ServiceImport>,
    pub endpoints: ObjectStore<Endpoints>,
    pub endpoint_slices: ObjectStore<EndpointSlice>,
    pub secrets: ObjectStore<Secret>,
    pub config_maps: ObjectStore<ConfigMap>,
    pub namespaces: ObjectStore<Namespace>,
    pub reference_grants: ObjectStore<ReferenceGrant>,
    pub access_control_policies: ObjectStore<AccessControlPolicy>,
    pub circuit_breaking_policies: ObjectStore<CircuitBreakingPolicy>,
    pub fault_injection_policies: ObjectStore<FaultInjectionPolicy>,
    pub gateway_tls_policies: ObjectStore<GatewayTLSPolicy>,
    pub health_check_policies: ObjectStore<HealthCheckPolicy>,
    pub load_balancer_policies: ObjectStore<LoadBalancerPolicy>,
    pub rate_limit_policies: ObjectStore<RateLimitPolicy>,
    pub retry_policies: ObjectStore<RetryPolicy>,
    pub session_sticky_policies: ObjectStore<SessionStickyPolicy>,
    pub upstream_tls_policies: ObjectStore<UpstreamTLSPolicy>,
    pub backend_tls_policies: ObjectStore<BackendTLSPolicy>,
    pub backend_lb_policies: ObjectStore<BackendLBPolicy>,
}

/// Maps an object type to its store in the [`Cache`].
pub trait Cached: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    fn store(cache: &Cache) -> &ObjectStore<Self>;
}

macro_rules! cached {
    ($($kind:ty => $field:ident),* $(,)?) => {
        $(
            impl Cached for $kind {
                fn store(cache: &Cache) -> &ObjectStore<Self> {
                    &cache.$field
                }
            }
        )*
    };
}

cached!(
    Gateway => gateways,
    HTTPRoute => http_routes,
    GRPCRoute => grpc_routes,
    TCPRoute => tcp_routes,
    UDPRoute => udp_routes,
    TLSRoute => tls_routes,
    Service => services,
    ServiceImport => service_imports,
    Endpoints => endpoints,
    EndpointSlice => endpoint_slices,
    Secret => secrets,
    ConfigMap => config_maps,
    Namespace => namespaces,
    ReferenceGrant => reference_grants,
    AccessControlPolicy => access_control_policies,
    CircuitBreakingPolicy => circuit_breaking_policies,
    FaultInjectionPolicy => fault_injection_policies,
    GatewayTLSPolicy => gateway_tls_policies,
    HealthCheckPolicy => health_check_policies,
    LoadBalancerPolicy => load_balancer_policies,
    RateLimitPolicy => rate_limit_policies,
    RetryPolicy => retry_policies,
    SessionStickyPolicy => session_sticky_policies,
    UpstreamTLSPolicy => upstream_tls_policies,
    BackendTLSPolicy => backend_tls_policies,
    BackendLBPolicy => backend_lb_policies,
);

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save<R: Cached>(&self, resource: R) -> Result<Option<Arc<R>>, StorageError> {
        R::store(self).save(resource)
    }

    pub fn delete<R: Cached>(&self, id: &ResourceKey) -> Result<Option<Arc<R>>, StorageError> {
        R::store(self).delete(id)
    }

    pub fn get<R: Cached>(&self, id: &ResourceKey) -> Result<Option<Arc<R>>, StorageError> {
        R::store(self).get(id)
    }

    /// All objects of a kind, oldest first.
    pub fn list<R: Cached>(&self) -> Result<Vec<Arc<R>>, StorageError> {
        let mut resources = R::store(self).list()?;
        sort_by_creation(&mut resources);
        Ok(resources)
    }

    pub fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Arc<Service>>, StorageError> {
        self.services.get(&Self::core_key::<Service>(namespace, name))
    }

    pub fn get_service_import(&self, namespace: &str, name: &str) -> Result<Option<Arc<ServiceImport>>, StorageError> {
        self.service_imports.get(&ResourceKey { namespace: namespace.to_owned(), name: name.to_owned(), ..Self::kind_key::<ServiceImport>() })
    }

    pub fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Option<Arc<Endpoints>>, StorageError> {
        self.endpoints.get(&Self::core_key::<Endpoints>(namespace, name))
    }

    pub fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Arc<Secret>>, StorageError> {
        self.secrets.get(&Self::core_key::<Secret>(namespace, name))
    }

    pub fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<Arc<ConfigMap>>, StorageError> {
        self.config_maps.get(&Self::core_key::<ConfigMap>(namespace, name))
    }

    /// Namespaces are cluster scoped and are looked up by name alone.
    pub fn get_namespace(&self, name: &str) -> Result<Option<Arc<Namespace>>, StorageError> {
        Ok(self.namespaces.list()?.into_iter().find(|ns| ns.metadata.name.as_deref() == Some(name)))
    }

    pub fn endpoint_slices_for_service(&self, namespace: &str, name: &str, label: &str) -> Result<Vec<Arc<EndpointSlice>>, StorageError> {
        Ok(self
            .endpoint_slices
            .list()?
            .into_iter()
            .filter(|slice| {
                slice.metadata.namespace.as_deref() == Some(namespace)
                    && slice.metadata.labels.as_ref().and_then(|labels| labels.get(label)).map(String::as_str) == Some(name)
            })
            .collect())
    }

    /// Routes of one kind with a parent reference to the gateway, oldest first.
    pub fn routes_attached_to<R>(&self, gateway_key: &ResourceKey) -> Result<Vec<Arc<R>>, StorageError>
    where
        R: GatewayRoute + Cached,
    {
        Ok(self
            .list::<R>()?
            .into_iter()
            .filter(|route| {
                let route_namespace = route.meta().namespace.clone().unwrap_or_default();
                route.parent_refs().iter().any(|parent_ref| is_ref_to_gateway(parent_ref, &route_namespace, gateway_key))
            })
            .collect())
    }

    fn kind_key<R: Resource<DynamicType = ()>>() -> ResourceKey {
        ResourceKey { group: R::group(&()).into_owned(), kind: R::kind(&()).into_owned(), ..Default::default() }
    }

    fn core_key<R: Resource<DynamicType = ()>>(namespace: &str, name: &str) -> ResourceKey {
        ResourceKey { namespace: namespace.to_owned(), name: name.to_owned(), ..Self::kind_key::<R>() }
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::ServiceSpec;
    use kube::api::ObjectMeta;

    use super::*;

    #[test]
    fn saving_and_getting_services() {
        let cache = Cache::new();
        let service = Service {
            metadata: ObjectMeta { name: Some("backend".to_owned()), namespace: Some("apps".to_owned()), ..Default::default() },
            spec: Some(ServiceSpec::default()),
            ..Default::default()
        };
        assert_eq!(cache.save(service), Ok(None));
        assert!(cache.get_service("apps", "backend").ok().flatten().is_some());
        assert!(cache.get_service("default", "backend").ok().flatten().is_none());

        let key = ResourceKey { group: String::new(), namespace: "apps".to_owned(), name: "backend".to_owned(), kind: "Service".to_owned() };
        assert!(cache.delete::<Service>(&key).ok().flatten().is_some());
        assert!(cache.get_service("apps", "backend").ok().flatten().is_none());
    }
}
