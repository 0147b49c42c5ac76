use std::sync::Arc;

use itertools::Itertools;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tracing::debug;

use super::{AttachedPolicy, ScopeDescriptor};
use crate::{
    apis::{GRPCRoute, Gateway, GatewayRoute, HTTPRoute, ListenerExt, ServiceImport},
    common::{
        conditions::{is_condition_true, CONDITION_ACCEPTED},
        gateway_api::{allowed_listeners, valid_hostnames, valid_listeners},
        ResourceKey,
    },
    state::{Cache, StorageError},
};

/// First peer whose effective configuration at `scope` differs from the policy's own.
///
/// Peers must already be ordered oldest first. Scopes where either side has no configuration are skipped.
pub fn find_conflict<P: AttachedPolicy>(policy: &P, peers: &[Arc<P>], scope: &ScopeDescriptor) -> Option<ResourceKey> {
    let policy_key = policy.policy_key();
    let config = policy.config_for(scope)?;
    peers.iter().filter(|peer| peer.policy_key() != policy_key).find_map(|peer| {
        let peer_config = peer.config_for(scope)?;
        if peer_config == config {
            None
        } else {
            debug!("{} {} conflicts with {} at {scope}", P::POLICY_KIND, policy_key, peer.policy_key());
            Some(peer.policy_key())
        }
    })
}

pub fn find_conflict_in_scopes<P: AttachedPolicy>(policy: &P, peers: &[Arc<P>], scopes: &[ScopeDescriptor]) -> Option<ResourceKey> {
    scopes.iter().find_map(|scope| find_conflict(policy, peers, scope))
}

/// Same kind policies created before `policy` and accepted for `target`.
pub fn preceding_peers<P: AttachedPolicy>(cache: &Cache, policy: &P, target: &ResourceKey) -> Result<Vec<Arc<P>>, StorageError> {
    let policy_key = policy.policy_key();
    let mut peers = vec![];
    for peer in cache.list::<P>()? {
        if peer.policy_key() == policy_key {
            break;
        }
        if peer.accepted_target_ref(target).is_some() {
            peers.push(peer);
        }
    }
    Ok(peers)
}

pub fn gateway_scopes(gateway: &Gateway) -> Vec<ScopeDescriptor> {
    valid_listeners(gateway).iter().map(|listener| listener.port_number()).sorted_unstable().dedup().map(ScopeDescriptor::Port).collect()
}

pub fn service_scopes(service: &Service) -> Vec<ScopeDescriptor> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .map(|ports| ports.iter().filter_map(|port| u16::try_from(port.port).ok()).map(ScopeDescriptor::Port).collect())
        .unwrap_or_default()
}

pub fn service_import_scopes(service_import: &ServiceImport) -> Vec<ScopeDescriptor> {
    service_import.spec.ports.iter().filter_map(|port| u16::try_from(port.port).ok()).map(ScopeDescriptor::Port).collect()
}

/// Hostnames a route serves through every parent that accepted it.
pub fn route_hostname_scopes<R: GatewayRoute>(cache: &Cache, route: &R) -> Result<Vec<ScopeDescriptor>, StorageError> {
    let route_namespace = route.namespace().unwrap_or_default();
    let mut scopes = vec![];
    for parent in route.parents_status() {
        if !is_condition_true(&parent.conditions, CONDITION_ACCEPTED) {
            continue;
        }
        let gateway_key = ResourceKey::from_parent_ref(&parent.parent_ref, &route_namespace);
        let Some(gateway) = cache.get::<Gateway>(&gateway_key)? else {
            continue;
        };
        for listener in allowed_listeners(cache, &gateway, &parent.parent_ref, R::KIND, &route_namespace)? {
            for hostname in valid_hostnames(listener.hostname.as_deref(), route.hostnames()) {
                let scope = ScopeDescriptor::Hostname(hostname);
                if !scopes.contains(&scope) {
                    scopes.push(scope);
                }
            }
        }
    }
    Ok(scopes)
}

pub fn http_route_scopes(cache: &Cache, route: &HTTPRoute) -> Result<Vec<ScopeDescriptor>, StorageError> {
    let mut scopes = route_hostname_scopes(cache, route)?;
    scopes.extend(route.spec.rules.iter().flatten().flat_map(|rule| rule.matches.iter().flatten().cloned().map(ScopeDescriptor::HttpMatch)));
    Ok(scopes)
}

pub fn grpc_route_scopes(cache: &Cache, route: &GRPCRoute) -> Result<Vec<ScopeDescriptor>, StorageError> {
    let mut scopes = route_hostname_scopes(cache, route)?;
    scopes.extend(route.spec.rules.iter().flatten().flat_map(|rule| rule.matches.iter().flatten().cloned().map(ScopeDescriptor::GrpcMatch)));
    Ok(scopes)
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
    use kube::api::ObjectMeta;

    use super::*;
    use crate::apis::{
        policies::{
            access_control::AccessControlPolicySpec, AccessControlConfig, AccessControlPolicy, PolicyAncestorStatus, PolicyStatus, PolicyTargetReference,
            PortConfig,
        },
        ParentReference,
    };

    fn accepted(mut policy: AccessControlPolicy, status: &str) -> AccessControlPolicy {
        policy.status = Some(PolicyStatus {
            ancestors: vec![PolicyAncestorStatus {
                ancestor_ref: ParentReference::gateway("default", "gw"),
                controller_name: "flomesh.io/gateway-controller".to_owned(),
                conditions: vec![Condition {
                    type_: CONDITION_ACCEPTED.to_owned(),
                    status: status.to_owned(),
                    reason: "Accepted".to_owned(),
                    message: String::new(),
                    observed_generation: None,
                    last_transition_time: Time(chrono::DateTime::from_timestamp(0, 0).unwrap_or_default()),
                }],
            }],
        });
        policy
    }

    fn policy(name: &str, created: i64, blacklist: &str) -> AccessControlPolicy {
        AccessControlPolicy {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("default".to_owned()),
                creation_timestamp: chrono::DateTime::from_timestamp(created, 0).map(Time),
                ..Default::default()
            },
            spec: AccessControlPolicySpec {
                target_refs: vec![PolicyTargetReference {
                    group: "gateway.networking.k8s.io".to_owned(),
                    kind: "Gateway".to_owned(),
                    name: "gw".to_owned(),
                    ..Default::default()
                }],
                ports: vec![PortConfig { port: 8080, config: Some(AccessControlConfig { blacklist: vec![blacklist.to_owned()], ..Default::default() }) }],
                ..Default::default()
            },
            status: None,
        }
    }

    #[test]
    fn newer_policy_conflicts_with_older() {
        let cache = Cache::new();
        let older = accepted(policy("older", 100, "1.1.1.1"), "True");
        let newer = accepted(policy("newer", 200, "2.2.2.2"), "True");
        let _ = cache.save(older.clone());
        let _ = cache.save(newer.clone());
        let gateway_key = ResourceKey::namespaced("gw", "default");
        let scopes = vec![ScopeDescriptor::Port(8080)];

        let peers = preceding_peers(&cache, &newer, &gateway_key).unwrap_or_default();
        assert_eq!(peers.len(), 1);
        assert_eq!(find_conflict_in_scopes(&newer, &peers, &scopes).map(|key| key.name), Some("older".to_owned()));

        let peers = preceding_peers(&cache, &older, &gateway_key).unwrap_or_default();
        assert!(peers.is_empty());
        assert_eq!(find_conflict_in_scopes(&older, &peers, &scopes), None);
    }

    #[test]
    fn conflict_is_symmetric() {
        let first = policy("first", 100, "1.1.1.1");
        let second = policy("second", 100, "2.2.2.2");
        let scope = ScopeDescriptor::Port(8080);
        assert!(find_conflict(&first, &[Arc::new(second.clone())], &scope).is_some());
        assert!(find_conflict(&second, &[Arc::new(first.clone())], &scope).is_some());
    }

    #[test]
    fn equal_configs_and_other_scopes_do_not_conflict() {
        let first = policy("first", 100, "1.1.1.1");
        let same = policy("same", 200, "1.1.1.1");
        assert_eq!(find_conflict(&same, &[Arc::new(first.clone())], &ScopeDescriptor::Port(8080)), None);
        let other = policy("other", 300, "3.3.3.3");
        assert_eq!(find_conflict(&other, &[Arc::new(first)], &ScopeDescriptor::Port(9090)), None);
    }

    #[test]
    fn only_accepted_peers_precede() {
        let cache = Cache::new();
        let rejected = accepted(policy("rejected", 100, "1.1.1.1"), "False");
        let pending = policy("pending", 150, "1.1.1.1");
        let newer = policy("newer", 200, "2.2.2.2");
        let _ = cache.save(rejected);
        let _ = cache.save(pending);
        let _ = cache.save(newer.clone());

        let peers = preceding_peers(&cache, &newer, &ResourceKey::namespaced("gw", "default")).unwrap_or_default();
        assert!(peers.is_empty());
    }
}
