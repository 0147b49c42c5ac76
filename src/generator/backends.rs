use std::{collections::BTreeSet, fmt::Display};

use k8s_openapi::api::{
    core::v1::{Endpoints, Service},
    discovery::v1::EndpointSlice,
};
use kube::{Resource, ResourceExt};
use tracing::{debug, warn};

use super::{
    model::{Backend, BackendSpec, BackendTarget, ResourceMetadata},
    processors::BackendPolicyProcessor,
    skip_unresolved, ConfigGenerator, GeneratorError,
};
use crate::{
    apis::{ReferenceGrant, RouteBackendRef, CORE_GROUP, KIND_SERVICE, KIND_SERVICE_IMPORT, MULTICLUSTER_API_GROUP},
    common::{
        reference_grants::{valid_cross_namespace_ref, FromResourceKey, ToResourceKey},
        ReferenceError, ResourceKey, ValidationError,
    },
    state::{MULTICLUSTER_SERVICE_NAME_LABEL, SERVICE_NAME_LABEL},
};

const SERVICE_TYPE_EXTERNAL_NAME: &str = "ExternalName";
const CLUSTER_IP_NONE: &str = "None";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceKind {
    Service,
    ServiceImport,
}

/// A single port of a service referenced by a route.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServicePortName {
    pub kind: ServiceKind,
    pub namespace: String,
    pub name: String,
    pub port: u16,
    /// Name of the service port, if it has one.
    pub section_name: Option<String>,
    pub app_protocol: Option<String>,
}

impl ServicePortName {
    pub fn backend_name(&self) -> String {
        format!("{}-{}-{}", self.namespace, self.name, self.port)
    }

    pub fn service_key(&self) -> ResourceKey {
        let (group, kind) = match self.kind {
            ServiceKind::Service => (CORE_GROUP, KIND_SERVICE),
            ServiceKind::ServiceImport => (MULTICLUSTER_API_GROUP, KIND_SERVICE_IMPORT),
        };
        ResourceKey { group: group.to_owned(), namespace: self.namespace.clone(), name: self.name.clone(), kind: kind.to_owned() }
    }
}

impl Display for ServicePortName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}:{}", self.namespace, self.name, self.port)
    }
}

fn same_port_name(this: Option<&str>, other: Option<&str>) -> bool {
    this.unwrap_or_default() == other.unwrap_or_default()
}

impl ConfigGenerator<'_> {
    /// Resolves a route backend reference to a service port. Unresolvable references are logged and skipped.
    pub(super) fn backend_ref_to_service_port<R>(&self, route: &R, backend_ref: &RouteBackendRef) -> Result<Option<ServicePortName>, GeneratorError>
    where
        R: Resource<DynamicType = ()>,
    {
        skip_unresolved(self.resolve_backend_ref(route, backend_ref))
    }

    fn resolve_backend_ref<R>(&self, route: &R, backend_ref: &RouteBackendRef) -> Result<ServicePortName, GeneratorError>
    where
        R: Resource<DynamicType = ()>,
    {
        let route_namespace = route.meta().namespace.clone().unwrap_or_default();
        let key = ResourceKey::from_backend_ref(backend_ref, &route_namespace);
        let kind = match (key.group.as_str(), key.kind.as_str()) {
            (CORE_GROUP, KIND_SERVICE) => ServiceKind::Service,
            (MULTICLUSTER_API_GROUP, KIND_SERVICE_IMPORT) => ServiceKind::ServiceImport,
            _ => return Err(ValidationError::UnsupportedKind { group: key.group, kind: key.kind }.into()),
        };
        let Some(port) = backend_ref.port else {
            return Err(ValidationError::MissingPort { key: key.namespaced_name() }.into());
        };

        if key.namespace != route_namespace {
            let reference_grants = self.cache.list::<ReferenceGrant>()?;
            let from = FromResourceKey { group: R::group(&()).into_owned(), kind: R::kind(&()).into_owned(), namespace: route_namespace.clone() };
            let to = ToResourceKey { group: key.group.clone(), kind: key.kind.clone(), namespace: key.namespace.clone(), name: key.name.clone() };
            if !valid_cross_namespace_ref(&reference_grants, &from, &to) {
                return Err(ReferenceError::NotPermitted {
                    from: format!("{} {route_namespace}/{}", from.kind, route.meta().name.clone().unwrap_or_default()),
                    kind: key.kind.clone(),
                    to: key.namespaced_name(),
                }
                .into());
            }
        }

        let (section_name, app_protocol) = match kind {
            ServiceKind::Service => {
                let service = self.cache.get_service(&key.namespace, &key.name)?.ok_or_else(|| ReferenceError::not_found(KIND_SERVICE, &key))?;
                let service_port = service
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.ports.as_ref())
                    .and_then(|ports| ports.iter().find(|service_port| service_port.port == i32::from(port)))
                    .ok_or_else(|| ReferenceError::PortNotFound { key: key.namespaced_name(), port })?;
                (service_port.name.clone(), service_port.app_protocol.clone())
            },
            ServiceKind::ServiceImport => {
                let service_import =
                    self.cache.get_service_import(&key.namespace, &key.name)?.ok_or_else(|| ReferenceError::not_found(KIND_SERVICE_IMPORT, &key))?;
                let service_port = service_import
                    .spec
                    .ports
                    .iter()
                    .find(|service_port| service_port.port == i32::from(port))
                    .ok_or_else(|| ReferenceError::PortNotFound { key: key.namespaced_name(), port })?;
                (service_port.name.clone(), service_port.app_protocol.clone())
            },
        };

        Ok(ServicePortName { kind, namespace: key.namespace, name: key.name, port, section_name, app_protocol })
    }

    /// Registers the backend of a service port and runs the backend policy processors against it,
    /// whether or not the backend has live targets.
    ///
    /// Returns whether the backend has live targets.
    pub(super) fn register_backend(&mut self, service_port: &ServicePortName, processors: &[BackendPolicyProcessor]) -> Result<bool, GeneratorError> {
        let name = service_port.backend_name();
        if !self.backends.contains_key(&name) {
            let backend = skip_unresolved(self.build_backend(service_port))?.flatten();
            self.backends.insert(name.clone(), backend);
        }

        for processor in processors {
            processor.process(self.cache, &mut self.backend_policies, &mut self.secrets, service_port)?;
        }
        Ok(self.backends.get(&name).is_some_and(Option::is_some))
    }

    /// Registers a backend pointing at a plain host, used by passthrough routes.
    pub(super) fn register_host_backend(&mut self, name: &str, port: Option<u16>) -> String {
        let backend_name = port.map_or_else(|| name.to_owned(), |port| format!("{name}-{port}"));
        self.backends.entry(backend_name.clone()).or_insert_with(|| {
            Some(Backend {
                metadata: ResourceMetadata { name: backend_name.clone(), namespace: None },
                spec: BackendSpec { targets: vec![BackendTarget::new(name.to_owned(), port.map(i32::from))], ..Default::default() },
            })
        });
        backend_name
    }

    fn build_backend(&mut self, service_port: &ServicePortName) -> Result<Option<Backend>, GeneratorError> {
        let targets = match service_port.kind {
            ServiceKind::Service => self.service_targets(service_port)?,
            ServiceKind::ServiceImport => {
                let slices = self.cache.endpoint_slices_for_service(&service_port.namespace, &service_port.name, MULTICLUSTER_SERVICE_NAME_LABEL)?;
                targets_from_endpoint_slices(&slices, service_port)
            },
        };

        if targets.is_empty() {
            debug!("No targets found for {service_port}");
            return Ok(None);
        }

        let mut spec = BackendSpec { targets, app_protocol: service_port.app_protocol.clone(), ..Default::default() };
        self.enrich_backend(&mut spec, service_port)?;
        Ok(Some(Backend { metadata: ResourceMetadata { name: service_port.backend_name(), namespace: None }, spec }))
    }

    fn service_targets(&self, service_port: &ServicePortName) -> Result<Vec<BackendTarget>, GeneratorError> {
        let key = service_port.service_key();
        let service = self.cache.get_service(&key.namespace, &key.name)?.ok_or_else(|| ReferenceError::not_found(KIND_SERVICE, &key))?;
        let spec = service.spec.clone().unwrap_or_default();
        if spec.type_.as_deref() == Some(SERVICE_TYPE_EXTERNAL_NAME) {
            return Err(ValidationError::ExternalNameService { key: key.namespaced_name() }.into());
        }

        if is_headless_service_without_selector(&service) || !self.options.use_endpoint_slices {
            let Some(endpoints) = self.cache.get_endpoints(&key.namespace, &key.name)? else {
                warn!("Endpoints for {} not found", service.name_any());
                return Ok(vec![]);
            };
            Ok(targets_from_endpoints(&endpoints, service_port))
        } else {
            let slices = self.cache.endpoint_slices_for_service(&key.namespace, &key.name, SERVICE_NAME_LABEL)?;
            Ok(targets_from_endpoint_slices(&slices, service_port))
        }
    }
}

pub fn is_headless_service_without_selector(service: &Service) -> bool {
    service.spec.as_ref().is_some_and(|spec| {
        spec.cluster_ip.as_deref() == Some(CLUSTER_IP_NONE) && spec.selector.as_ref().map_or(true, std::collections::BTreeMap::is_empty)
    })
}

fn targets_from_endpoints(endpoints: &Endpoints, service_port: &ServicePortName) -> Vec<BackendTarget> {
    let mut targets = BTreeSet::new();
    for subset in endpoints.subsets.iter().flatten() {
        let Some(port) = subset.ports.iter().flatten().find(|port| same_port_name(port.name.as_deref(), service_port.section_name.as_deref())) else {
            continue;
        };
        for address in subset.addresses.iter().flatten() {
            targets.insert(BackendTarget::new(address.ip.clone(), Some(port.port)));
        }
    }
    targets.into_iter().collect()
}

/// Endpoints without a readiness condition count as ready.
fn targets_from_endpoint_slices(slices: &[std::sync::Arc<EndpointSlice>], service_port: &ServicePortName) -> Vec<BackendTarget> {
    let mut targets = BTreeSet::new();
    for slice in slices {
        let Some(port) = slice
            .ports
            .iter()
            .flatten()
            .find(|port| same_port_name(port.name.as_deref(), service_port.section_name.as_deref()))
            .and_then(|port| port.port)
        else {
            continue;
        };
        for endpoint in &slice.endpoints {
            if endpoint.conditions.as_ref().and_then(|conditions| conditions.ready) == Some(false) {
                continue;
            }
            for address in &endpoint.addresses {
                targets.insert(BackendTarget::new(address.clone(), Some(port)));
            }
        }
    }
    targets.into_iter().collect()
}
