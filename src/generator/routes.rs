use std::collections::BTreeSet;

use kube::ResourceExt;
use tracing::debug;

use super::{
    model::{
        CompiledBackendRef, CompiledGRPCMatch, CompiledGRPCRule, CompiledHTTPMatch, CompiledHTTPRule, CompiledL4Rule, CompiledRoute, CompiledRouteSpec,
        HostnamePolicies, Resource, ResourceMetadata, ScopedPolicies,
    },
    processors::{BackendPolicyProcessor, GRPC_PROCESSORS, HTTP_PROCESSORS, TCP_PROCESSORS, UDP_PROCESSORS},
    ConfigGenerator, GeneratorError,
};
use crate::{
    apis::{
        policies::{AccessControlPolicy, FaultInjectionPolicy, RateLimitConfig, RateLimitPolicy},
        routes::{GRPCRouteRules, HTTPRouteRules, L4Route, MirrorFilter, WeightedBackendRef},
        GRPCRoute, GatewayRoute, HTTPRoute, Listener, ListenerExt, ParentReference, ProtocolType, RouteBackendRef, TCPRoute, TLSModeType, TLSRoute,
        UDPRoute,
    },
    common::{
        conditions::{is_condition_true, CONDITION_ACCEPTED},
        gateway_api::{allowed_listeners, is_ref_to_gateway, valid_hostnames},
        ResourceKey,
    },
    policy::{effective_config, ScopeDescriptor},
    sorter::{sort_grpc_matches, sort_http_matches},
};

fn any_listener(_: &Listener) -> bool {
    true
}

fn passthrough_listener(listener: &Listener) -> bool {
    listener.protocol_type() == Some(ProtocolType::Tls) && listener.tls_mode() == TLSModeType::Passthrough
}

impl ConfigGenerator<'_> {
    pub(super) fn process_http_routes(&mut self) -> Result<Vec<Resource>, GeneratorError> {
        let mut resources = vec![];
        for route in self.cache.routes_attached_to::<HTTPRoute>(&self.gateway_key)? {
            let Some(hostnames) = self.effective_hostnames(&*route, any_listener)? else {
                continue;
            };
            let route_key = ResourceKey::from_resource(&*route);
            let mut rules = vec![];
            for rule in route.spec.rules.iter().flatten() {
                if let Some(rule) = self.compile_http_rule(&*route, &route_key, rule)? {
                    rules.push(rule);
                }
            }
            if let Some(compiled) = self.compiled_route(&*route, &route_key, hostnames, rules)? {
                resources.push(Resource::HttpRoute(compiled));
            }
        }
        Ok(resources)
    }

    pub(super) fn process_grpc_routes(&mut self) -> Result<Vec<Resource>, GeneratorError> {
        let mut resources = vec![];
        for route in self.cache.routes_attached_to::<GRPCRoute>(&self.gateway_key)? {
            let Some(hostnames) = self.effective_hostnames(&*route, any_listener)? else {
                continue;
            };
            let route_key = ResourceKey::from_resource(&*route);
            let mut rules = vec![];
            for rule in route.spec.rules.iter().flatten() {
                if let Some(rule) = self.compile_grpc_rule(&*route, &route_key, rule)? {
                    rules.push(rule);
                }
            }
            if let Some(compiled) = self.compiled_route(&*route, &route_key, hostnames, rules)? {
                resources.push(Resource::GrpcRoute(compiled));
            }
        }
        Ok(resources)
    }

    /// Passthrough routes forward to the named host directly, no service lookup is involved.
    pub(super) fn process_tls_routes(&mut self) -> Result<Vec<Resource>, GeneratorError> {
        let mut resources = vec![];
        for route in self.cache.routes_attached_to::<TLSRoute>(&self.gateway_key)? {
            let Some(hostnames) = self.effective_hostnames(&*route, passthrough_listener)? else {
                continue;
            };
            let mut rules = vec![];
            for rule in route.l4_rules() {
                let backend_refs: Vec<_> = rule
                    .backend_refs
                    .iter()
                    .map(|backend_ref| CompiledBackendRef::new(self.register_host_backend(&backend_ref.name, backend_ref.port), backend_weight(backend_ref)))
                    .collect();
                if !backend_refs.is_empty() {
                    rules.push(CompiledL4Rule { name: rule.name, backend_refs });
                }
            }
            if rules.is_empty() {
                continue;
            }
            resources.push(Resource::TlsRoute(CompiledRoute {
                metadata: route_metadata(&*route),
                spec: CompiledRouteSpec { parent_refs: self.gateway_parent_refs(&*route), hostnames, hostname_policies: vec![], rules },
            }));
        }
        Ok(resources)
    }

    pub(super) fn process_tcp_routes(&mut self) -> Result<Vec<Resource>, GeneratorError> {
        let mut resources = vec![];
        for route in self.cache.routes_attached_to::<TCPRoute>(&self.gateway_key)? {
            if let Some(compiled) = self.compile_l4_route(&*route, TCP_PROCESSORS)? {
                resources.push(Resource::TcpRoute(compiled));
            }
        }
        Ok(resources)
    }

    pub(super) fn process_udp_routes(&mut self) -> Result<Vec<Resource>, GeneratorError> {
        let mut resources = vec![];
        for route in self.cache.routes_attached_to::<UDPRoute>(&self.gateway_key)? {
            if let Some(compiled) = self.compile_l4_route(&*route, UDP_PROCESSORS)? {
                resources.push(Resource::UdpRoute(compiled));
            }
        }
        Ok(resources)
    }

    /// Hostnames a route serves through the listeners of this gateway that accepted it.
    ///
    /// `None` when the route is not in effect on the gateway.
    fn effective_hostnames<R>(&self, route: &R, listener_filter: fn(&Listener) -> bool) -> Result<Option<Vec<String>>, GeneratorError>
    where
        R: GatewayRoute,
    {
        let route_namespace = route.namespace().unwrap_or_default();
        let mut hostnames = BTreeSet::new();
        for status in route.parents_status() {
            if !is_ref_to_gateway(&status.parent_ref, &route_namespace, &self.gateway_key) || !is_condition_true(&status.conditions, CONDITION_ACCEPTED) {
                continue;
            }
            for listener in allowed_listeners(self.cache, self.gateway, &status.parent_ref, R::KIND, &route_namespace)? {
                if listener_filter(listener) {
                    hostnames.extend(valid_hostnames(listener.hostname.as_deref(), route.hostnames()));
                }
            }
        }

        if hostnames.is_empty() {
            debug!("{} {route_namespace}/{} is not effective on gateway {}", R::KIND, route.name_any(), self.gateway_key);
            Ok(None)
        } else {
            Ok(Some(hostnames.into_iter().collect()))
        }
    }

    fn gateway_parent_refs<R: GatewayRoute>(&self, route: &R) -> Vec<ParentReference> {
        let route_namespace = route.namespace().unwrap_or_default();
        route.parent_refs().into_iter().filter(|parent_ref| is_ref_to_gateway(parent_ref, &route_namespace, &self.gateway_key)).collect()
    }

    fn compiled_route<R, Rule>(&self, route: &R, route_key: &ResourceKey, hostnames: Vec<String>, rules: Vec<Rule>) -> Result<Option<CompiledRoute<Rule>>, GeneratorError>
    where
        R: GatewayRoute,
    {
        if rules.is_empty() {
            debug!("{} {} has no usable rules", R::KIND, route_key);
            return Ok(None);
        }

        let mut hostname_policies = vec![];
        for hostname in &hostnames {
            let policies = self.scoped_policies(route_key, &ScopeDescriptor::Hostname(hostname.clone()))?;
            if !policies.is_empty() {
                hostname_policies.push(HostnamePolicies { hostname: hostname.clone(), policies });
            }
        }

        Ok(Some(CompiledRoute {
            metadata: route_metadata(route),
            spec: CompiledRouteSpec { parent_refs: self.gateway_parent_refs(route), hostnames, hostname_policies, rules },
        }))
    }

    /// Route level policies at one scope. Only request based rate limits apply to routes.
    fn scoped_policies(&self, route_key: &ResourceKey, scope: &ScopeDescriptor) -> Result<ScopedPolicies, GeneratorError> {
        let rate_limit = match effective_config::<RateLimitPolicy>(self.cache, route_key, scope)? {
            Some(RateLimitConfig::L7(rate_limit)) => Some(rate_limit),
            Some(RateLimitConfig::Bps(_)) | None => None,
        };
        Ok(ScopedPolicies {
            access_control: effective_config::<AccessControlPolicy>(self.cache, route_key, scope)?,
            rate_limit,
            fault_injection: effective_config::<FaultInjectionPolicy>(self.cache, route_key, scope)?,
        })
    }

    fn compile_http_rule(&mut self, route: &HTTPRoute, route_key: &ResourceKey, rule: &HTTPRouteRules) -> Result<Option<CompiledHTTPRule>, GeneratorError> {
        let backend_refs = self.compile_http_backend_refs(route, rule.backend_refs.as_deref().unwrap_or_default(), HTTP_PROCESSORS)?;
        if self.options.drop_route_rule_if_no_available_backends && backend_refs.is_empty() {
            debug!("Dropping rule {:?} of {route_key}, no backend is available", rule.name);
            return Ok(None);
        }

        let mut route_matches = rule.matches.clone().unwrap_or_default();
        sort_http_matches(&mut route_matches);
        let mut matches = vec![];
        for route_match in route_matches {
            let policies = self.scoped_policies(route_key, &ScopeDescriptor::HttpMatch(route_match.clone()))?;
            matches.push(CompiledHTTPMatch { route_match, policies });
        }

        Ok(Some(CompiledHTTPRule {
            name: rule.name.clone(),
            matches,
            filters: self.compile_filters(route, rule.filters.as_deref().unwrap_or_default())?,
            backend_refs,
            timeouts: rule.timeouts.clone(),
            session_persistence: rule.session_persistence.clone(),
        }))
    }

    fn compile_grpc_rule(&mut self, route: &GRPCRoute, route_key: &ResourceKey, rule: &GRPCRouteRules) -> Result<Option<CompiledGRPCRule>, GeneratorError> {
        let backend_refs = self.compile_http_backend_refs(route, rule.backend_refs.as_deref().unwrap_or_default(), GRPC_PROCESSORS)?;
        if self.options.drop_route_rule_if_no_available_backends && backend_refs.is_empty() {
            debug!("Dropping rule {:?} of {route_key}, no backend is available", rule.name);
            return Ok(None);
        }

        let mut route_matches = rule.matches.clone().unwrap_or_default();
        sort_grpc_matches(&mut route_matches);
        let mut matches = vec![];
        for route_match in route_matches {
            let policies = self.scoped_policies(route_key, &ScopeDescriptor::GrpcMatch(route_match.clone()))?;
            matches.push(CompiledGRPCMatch { route_match, policies });
        }

        Ok(Some(CompiledGRPCRule {
            name: rule.name.clone(),
            matches,
            filters: self.compile_filters(route, rule.filters.as_deref().unwrap_or_default())?,
            backend_refs,
            session_persistence: rule.session_persistence.clone(),
        }))
    }

    fn compile_http_backend_refs<R, B>(
        &mut self,
        route: &R,
        backend_refs: &[B],
        processors: &[BackendPolicyProcessor],
    ) -> Result<Vec<CompiledBackendRef<B::Filter>>, GeneratorError>
    where
        R: GatewayRoute,
        B: WeightedBackendRef,
    {
        let mut compiled = vec![];
        for weighted_backend_ref in backend_refs {
            let route_backend_ref = weighted_backend_ref.backend_ref();
            let Some(service_port) = self.backend_ref_to_service_port(route, &route_backend_ref)? else {
                continue;
            };
            let has_targets = self.register_backend(&service_port, processors)?;
            if !has_targets && self.options.drop_route_rule_if_no_available_backends {
                continue;
            }
            let mut backend_ref = CompiledBackendRef::new(service_port.backend_name(), route_backend_ref.weight);
            backend_ref.filters = self.compile_filters(route, weighted_backend_ref.filters())?;
            compiled.push(backend_ref);
        }
        Ok(compiled)
    }

    /// Mirrors are pointed at their compiled backend and dropped when it has no targets.
    fn compile_filters<R, F>(&mut self, route: &R, filters: &[F]) -> Result<Vec<F>, GeneratorError>
    where
        R: GatewayRoute,
        F: MirrorFilter,
    {
        let mut compiled = vec![];
        for filter in filters {
            if !filter.is_mirror() {
                compiled.push(filter.clone());
                continue;
            }
            let Some(mirror) = filter.mirror_backend_ref() else {
                continue;
            };
            let Some(service_port) = self.backend_ref_to_service_port(route, &mirror)? else {
                continue;
            };
            if !self.register_backend(&service_port, &[])? {
                debug!("Dropping mirror to {service_port}, no targets");
                continue;
            }
            let mut filter = filter.clone();
            filter.set_mirror_backend(service_port.backend_name());
            compiled.push(filter);
        }
        Ok(compiled)
    }

    /// Layer four rules without a usable backend carry no traffic and are always dropped.
    fn compile_l4_route<R>(&mut self, route: &R, processors: &[BackendPolicyProcessor]) -> Result<Option<CompiledRoute<CompiledL4Rule>>, GeneratorError>
    where
        R: L4Route,
    {
        if self.effective_hostnames(route, any_listener)?.is_none() {
            return Ok(None);
        }

        let mut compiled_rules = vec![];
        for rule in route.l4_rules() {
            let mut backend_refs = vec![];
            for backend_ref in &rule.backend_refs {
                let Some(service_port) = self.backend_ref_to_service_port(route, backend_ref)? else {
                    continue;
                };
                if self.register_backend(&service_port, processors)? {
                    backend_refs.push(CompiledBackendRef::new(service_port.backend_name(), backend_weight(backend_ref)));
                }
            }
            if !backend_refs.is_empty() {
                compiled_rules.push(CompiledL4Rule { name: rule.name, backend_refs });
            }
        }

        if compiled_rules.is_empty() {
            return Ok(None);
        }
        Ok(Some(CompiledRoute {
            metadata: route_metadata(route),
            spec: CompiledRouteSpec { parent_refs: self.gateway_parent_refs(route), hostnames: vec![], hostname_policies: vec![], rules: compiled_rules },
        }))
    }
}

fn route_metadata<R: GatewayRoute>(route: &R) -> ResourceMetadata {
    ResourceMetadata::namespaced(&route.namespace().unwrap_or_default(), &route.name_any())
}

/// Layer four backends weigh 1 unless told otherwise.
fn backend_weight(backend_ref: &RouteBackendRef) -> Option<i32> {
    Some(backend_ref.weight.unwrap_or(1))
}
