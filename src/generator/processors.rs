use std::{collections::BTreeMap, sync::Arc};

use kube::ResourceExt;
use tracing::warn;

use super::{
    backends::ServicePortName,
    certificates::resolve_ca_certificate,
    model::{BackendTargetRef, CaFile, CompiledBackendLB, CompiledBackendTLS, CompiledBackendTLSValidation, CompiledPolicy, CompiledPolicySpec, PortConfigs, ResourceMetadata, Resource},
    GeneratorError,
};
use crate::{
    apis::{
        policies::{BackendLBPolicy, BackendTLSPolicy, HealthCheckConfig, HealthCheckPolicy, PortConfig, RetryConfig, RetryPolicy},
        ReferenceGrant,
    },
    common::{reference_grants::FromResourceKey, ResourceKey},
    policy::{AttachedPolicy, ScopeDescriptor},
    state::Cache,
};

/// Backend oriented policies collected while the routes register their backends.
#[derive(Debug, Default)]
pub struct BackendPolicies {
    backend_tls: BTreeMap<ResourceKey, CompiledPolicy<CompiledBackendTLS>>,
    backend_lb: BTreeMap<ResourceKey, CompiledPolicy<CompiledBackendLB>>,
    health_check: BTreeMap<ResourceKey, CompiledPolicy<PortConfigs<HealthCheckConfig>>>,
    retry: BTreeMap<ResourceKey, CompiledPolicy<PortConfigs<RetryConfig>>>,
}

impl BackendPolicies {
    pub fn into_resources(self) -> impl Iterator<Item = Resource> {
        self.backend_tls
            .into_values()
            .map(Resource::BackendTlsPolicy)
            .chain(self.backend_lb.into_values().map(Resource::BackendLbPolicy))
            .chain(self.health_check.into_values().map(Resource::HealthCheckPolicy))
            .chain(self.retry.into_values().map(Resource::RetryPolicy))
    }
}

/// A processor attaching one kind of backend policy to the backends a route uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendPolicyProcessor {
    BackendTLS,
    BackendLB,
    HealthCheck,
    Retry,
}

pub const HTTP_PROCESSORS: &[BackendPolicyProcessor] =
    &[BackendPolicyProcessor::BackendTLS, BackendPolicyProcessor::BackendLB, BackendPolicyProcessor::HealthCheck, BackendPolicyProcessor::Retry];
pub const GRPC_PROCESSORS: &[BackendPolicyProcessor] = &[BackendPolicyProcessor::BackendTLS, BackendPolicyProcessor::BackendLB];
pub const TCP_PROCESSORS: &[BackendPolicyProcessor] = &[BackendPolicyProcessor::BackendTLS];
pub const UDP_PROCESSORS: &[BackendPolicyProcessor] = &[];

impl BackendPolicyProcessor {
    pub fn process(
        self,
        cache: &Cache,
        policies: &mut BackendPolicies,
        secrets: &mut BTreeMap<String, String>,
        service_port: &ServicePortName,
    ) -> Result<(), GeneratorError> {
        let backend_name = service_port.backend_name();
        let reference_grants = cache.list::<ReferenceGrant>()?;
        match self {
            BackendPolicyProcessor::BackendTLS => {
                let Some(policy) = find_backend_tls_policy(&cache.list::<BackendTLSPolicy>()?, &reference_grants, service_port) else {
                    return Ok(());
                };
                let key = policy.policy_key();
                if !policies.backend_tls.contains_key(&key) {
                    let config = compile_backend_tls(cache, secrets, &policy)?;
                    policies.backend_tls.insert(key.clone(), compiled_policy(&*policy, config));
                }
                if let Some(compiled) = policies.backend_tls.get_mut(&key) {
                    add_target(compiled, &backend_name);
                }
            },
            BackendPolicyProcessor::BackendLB => {
                let Some((policy, session_persistence)) = find_policy::<BackendLBPolicy>(cache, &reference_grants, service_port)? else {
                    return Ok(());
                };
                let compiled = policies
                    .backend_lb
                    .entry(policy.policy_key())
                    .or_insert_with(|| compiled_policy(&*policy, CompiledBackendLB { session_persistence: Some(session_persistence) }));
                add_target(compiled, &backend_name);
            },
            BackendPolicyProcessor::HealthCheck => {
                let Some((policy, config)) = find_policy::<HealthCheckPolicy>(cache, &reference_grants, service_port)? else {
                    return Ok(());
                };
                let compiled = policies.health_check.entry(policy.policy_key()).or_insert_with(|| compiled_policy(&*policy, PortConfigs::default()));
                add_target(compiled, &backend_name);
                add_port(&mut compiled.spec.config, service_port.port, config);
            },
            BackendPolicyProcessor::Retry => {
                let Some((policy, config)) = find_policy::<RetryPolicy>(cache, &reference_grants, service_port)? else {
                    return Ok(());
                };
                let compiled = policies.retry.entry(policy.policy_key()).or_insert_with(|| compiled_policy(&*policy, PortConfigs::default()));
                add_target(compiled, &backend_name);
                add_port(&mut compiled.spec.config, service_port.port, config);
            },
        }
        Ok(())
    }
}

/// Oldest accepted and permitted policy of kind `P` with a configuration for the service port.
fn find_policy<P: AttachedPolicy>(
    cache: &Cache,
    reference_grants: &[Arc<ReferenceGrant>],
    service_port: &ServicePortName,
) -> Result<Option<(Arc<P>, P::Config)>, GeneratorError> {
    let service_key = service_port.service_key();
    let scope = ScopeDescriptor::Port(service_port.port);
    Ok(cache.list::<P>()?.into_iter().find_map(|policy| {
        let target_ref = policy.accepted_target_ref(&service_key)?;
        if !policy.reference_permitted(target_ref, reference_grants) {
            return None;
        }
        let config = policy.config_for(&scope)?;
        Some((policy, config))
    }))
}

/// A target naming the service port with `sectionName` wins over a target naming the whole service.
fn find_backend_tls_policy(
    policies: &[Arc<BackendTLSPolicy>],
    reference_grants: &[Arc<ReferenceGrant>],
    service_port: &ServicePortName,
) -> Option<Arc<BackendTLSPolicy>> {
    let service_key = service_port.service_key();
    let mut fallback = None;
    for policy in policies {
        let namespace = policy.namespace().unwrap_or_default();
        for target_ref in policy.target_refs() {
            if ResourceKey::from_target_ref(target_ref, &namespace) != service_key
                || !policy.is_accepted_for(target_ref)
                || !policy.reference_permitted(target_ref, reference_grants)
            {
                continue;
            }
            match (target_ref.section_name.as_deref(), service_port.section_name.as_deref()) {
                (Some(section_name), Some(port_name)) if section_name == port_name => return Some(Arc::clone(policy)),
                (None, _) if fallback.is_none() => fallback = Some(Arc::clone(policy)),
                _ => {},
            }
        }
    }
    fallback
}

fn compile_backend_tls(cache: &Cache, secrets: &mut BTreeMap<String, String>, policy: &BackendTLSPolicy) -> Result<CompiledBackendTLS, GeneratorError> {
    let namespace = policy.namespace().unwrap_or_default();
    let name = policy.name_any();
    let from = FromResourceKey {
        group: <BackendTLSPolicy as kube::Resource>::group(&()).into_owned(),
        kind: <BackendTLSPolicy as kube::Resource>::kind(&()).into_owned(),
        namespace: namespace.clone(),
    };
    let validation = policy.config_for(&ScopeDescriptor::Port(0)).unwrap_or_default();

    let mut ca_certificates = vec![];
    for (index, ca_ref) in validation.ca_certificate_refs.iter().enumerate() {
        // CA bundles are always local to the policy
        let mut local_ref = ca_ref.clone();
        local_ref.namespace = None;
        match super::skip_unresolved(resolve_ca_certificate(cache, &from, &local_ref))? {
            Some(ca) => {
                let ca_file = format!("bk-tls-ca-{namespace}-{name}-{index}.crt");
                secrets.insert(ca_file.clone(), ca);
                ca_certificates.push(CaFile { ca_file });
            },
            None => warn!("CA certificate {} of {namespace}/{name} is not usable", ca_ref.name),
        }
    }

    Ok(CompiledBackendTLS {
        validation: CompiledBackendTLSValidation {
            ca_certificates,
            well_known_ca_certificates: validation.well_known_ca_certificates,
            hostname: validation.hostname,
        },
        options: policy.spec.options.clone(),
    })
}

fn compiled_policy<P: ResourceExt, S>(policy: &P, config: S) -> CompiledPolicy<S> {
    CompiledPolicy {
        metadata: ResourceMetadata::namespaced(&policy.namespace().unwrap_or_default(), &policy.name_any()),
        spec: CompiledPolicySpec { target_refs: vec![], config },
    }
}

fn add_target<S>(policy: &mut CompiledPolicy<S>, backend_name: &str) {
    if !policy.spec.target_refs.iter().any(|target_ref| target_ref.name == backend_name) {
        policy.spec.target_refs.push(BackendTargetRef::backend(backend_name));
    }
}

fn add_port<C>(configs: &mut PortConfigs<C>, port: u16, config: C) {
    if !configs.ports.iter().any(|entry| entry.port == port) {
        configs.ports.push(PortConfig { port, config: Some(config) });
    }
}
