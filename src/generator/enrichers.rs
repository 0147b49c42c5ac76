use kube::ResourceExt;
use tracing::warn;

use super::{
    backends::ServicePortName,
    certificates::resolve_tls_certificate,
    model::{BackendSpec, CompiledUpstreamTLS},
    skip_unresolved, ConfigGenerator, GeneratorError,
};
use crate::{
    apis::policies::{CircuitBreakingPolicy, LoadBalancerPolicy, SessionStickyPolicy, UpstreamTLSPolicy},
    common::{reference_grants::FromResourceKey, ResourceKey},
    policy::{effective_config, AttachedPolicy, ScopeDescriptor},
};

impl ConfigGenerator<'_> {
    /// Service level policies of the backend's port. The oldest accepted policy wins.
    pub(super) fn enrich_backend(&mut self, spec: &mut BackendSpec, service_port: &ServicePortName) -> Result<(), GeneratorError> {
        let service_key = service_port.service_key();
        let scope = ScopeDescriptor::Port(service_port.port);
        spec.circuit_breaking = effective_config::<CircuitBreakingPolicy>(self.cache, &service_key, &scope)?;
        spec.load_balancer = effective_config::<LoadBalancerPolicy>(self.cache, &service_key, &scope)?;
        spec.session_sticky = effective_config::<SessionStickyPolicy>(self.cache, &service_key, &scope)?;
        spec.upstream_tls = self.upstream_tls(&service_key, &scope)?;
        Ok(())
    }

    /// A policy whose secret can't be resolved is skipped and the next accepted one is tried.
    fn upstream_tls(&mut self, service_key: &ResourceKey, scope: &ScopeDescriptor) -> Result<Option<CompiledUpstreamTLS>, GeneratorError> {
        for policy in self.cache.list::<UpstreamTLSPolicy>()? {
            if policy.accepted_target_ref(service_key).is_none() {
                continue;
            }
            let Some(config) = policy.config_for(scope) else {
                continue;
            };

            let namespace = policy.namespace().unwrap_or_default();
            let name = policy.name_any();
            let from = FromResourceKey {
                group: <UpstreamTLSPolicy as kube::Resource>::group(&()).into_owned(),
                kind: <UpstreamTLSPolicy as kube::Resource>::kind(&()).into_owned(),
                namespace: namespace.clone(),
            };
            let Some(mut certificate) = skip_unresolved(resolve_tls_certificate(self.cache, &from, &config.certificate_ref))? else {
                warn!("Upstream TLS policy {namespace}/{name} is dropped for {}", service_key.namespaced_name());
                continue;
            };

            let prefix = format!("upstream-tls-{namespace}-{name}");
            let ca_file = certificate.ca.take().map(|ca| {
                let ca_file = format!("{prefix}-ca.crt");
                self.secrets.insert(ca_file.clone(), ca);
                ca_file
            });
            let certificate = self.add_certificate(&prefix, certificate);
            return Ok(Some(CompiledUpstreamTLS { certificate, ca_file, m_tls: config.m_tls }));
        }
        Ok(None)
    }
}
