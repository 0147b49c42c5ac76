use std::collections::{BTreeMap, BTreeSet};

use eater_domainmatcher::DomainPattern;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use tracing::{debug, warn};

use super::{
    conditions::{is_condition_true, CONDITION_ACCEPTED, CONDITION_PROGRAMMED},
    ResourceKey,
};
use crate::{
    apis::{
        gateway::{FromNamespaces, ListenerSelector},
        Gateway, Listener, ListenerExt, ParentReference, ProtocolType, RouteParentStatus, GATEWAY_API_GROUP, KIND_GATEWAY, KIND_GRPC_ROUTE, KIND_HTTP_ROUTE, KIND_TCP_ROUTE, KIND_TLS_ROUTE, KIND_UDP_ROUTE,
    },
    state::{Cache, StorageError},
};

pub const DEFAULT_ROUTE_HOSTNAME: &str = "*";

pub fn is_ref_to_gateway(parent_ref: &ParentReference, route_namespace: &str, gateway_key: &ResourceKey) -> bool {
    if parent_ref.group.as_ref().is_some_and(|group| group != GATEWAY_API_GROUP) {
        return false;
    }
    if parent_ref.kind.as_ref().is_some_and(|kind| kind != KIND_GATEWAY) {
        return false;
    }
    let namespace = parent_ref.namespace.as_deref().unwrap_or(route_namespace);
    namespace == gateway_key.namespace && parent_ref.name == gateway_key.name
}

/// The route has been accepted by at least one of its parents.
pub fn is_effective_route(parents_status: &[RouteParentStatus]) -> bool {
    parents_status.iter().any(|parent| is_condition_true(&parent.conditions, CONDITION_ACCEPTED))
}

/// The route has been accepted by this particular parent.
pub fn is_accepted_by_parent(parents_status: &[RouteParentStatus], parent_ref: &ParentReference) -> bool {
    parents_status
        .iter()
        .filter(|status| status.parent_ref.name == parent_ref.name && status.parent_ref.namespace == parent_ref.namespace)
        .filter(|status| status.parent_ref.section_name == parent_ref.section_name && status.parent_ref.port == parent_ref.port)
        .any(|status| is_condition_true(&status.conditions, CONDITION_ACCEPTED))
}

/// Listeners reported both accepted and programmed in the gateway status.
pub fn valid_listeners(gateway: &Gateway) -> Vec<&Listener> {
    let Some(status) = gateway.status.as_ref() else {
        return vec![];
    };
    gateway
        .spec
        .listeners
        .iter()
        .filter(|listener| {
            status.listeners.iter().flatten().any(|listener_status| {
                listener_status.name == listener.name
                    && is_condition_true(&listener_status.conditions, CONDITION_ACCEPTED)
                    && is_condition_true(&listener_status.conditions, CONDITION_PROGRAMMED)
            })
        })
        .collect()
}

pub fn is_active_gateway(gateway: &Gateway) -> bool {
    let accepted = gateway.status.as_ref().is_some_and(|status| is_condition_true(status.conditions.as_deref().unwrap_or_default(), CONDITION_ACCEPTED));
    accepted && !valid_listeners(gateway).is_empty()
}

fn default_route_kinds(listener: &Listener) -> &'static [&'static str] {
    match listener.protocol_type() {
        Some(ProtocolType::Http | ProtocolType::Https) => &[KIND_HTTP_ROUTE, KIND_GRPC_ROUTE],
        Some(ProtocolType::Tls) => &[KIND_TLS_ROUTE, KIND_TCP_ROUTE],
        Some(ProtocolType::Tcp) => &[KIND_TCP_ROUTE],
        Some(ProtocolType::Udp) => &[KIND_UDP_ROUTE],
        None => &[],
    }
}

fn listener_allows_kind(listener: &Listener, route_kind: &str) -> bool {
    match listener.allowed_routes.as_ref().and_then(|allowed| allowed.kinds.as_ref()) {
        Some(kinds) if !kinds.is_empty() => kinds
            .iter()
            .any(|kind| kind.kind == route_kind && kind.group.as_deref().map_or(true, |group| group == GATEWAY_API_GROUP)),
        _ => default_route_kinds(listener).contains(&route_kind),
    }
}

fn namespace_matches(cache: &Cache, listener: &Listener, gateway_namespace: &str, route_namespace: &str) -> Result<bool, StorageError> {
    let Some(namespaces) = listener.allowed_routes.as_ref().and_then(|allowed| allowed.namespaces.as_ref()) else {
        return Ok(gateway_namespace == route_namespace);
    };
    match namespaces.from.as_ref() {
        Some(FromNamespaces::All) => Ok(true),
        Some(FromNamespaces::Same) | None => Ok(gateway_namespace == route_namespace),
        Some(FromNamespaces::Selector) => {
            let Some(selector) = namespaces.selector.as_ref() else {
                return Ok(false);
            };
            let Some(namespace) = cache.get_namespace(route_namespace)? else {
                debug!("Namespace {route_namespace} not found");
                return Ok(false);
            };
            let labels = namespace.metadata.labels.clone().unwrap_or_default();
            Ok(label_selector_matches(&label_selector(selector), &labels))
        },
    }
}

fn label_selector(selector: &ListenerSelector) -> LabelSelector {
    LabelSelector {
        match_labels: selector.match_labels.clone(),
        match_expressions: selector.match_expressions.as_ref().map(|expressions| {
            expressions
                .iter()
                .map(|expression| LabelSelectorRequirement {
                    key: expression.key.clone(),
                    operator: expression.operator.clone(),
                    values: expression.values.clone(),
                })
                .collect()
        }),
    }
}

pub fn label_selector_matches(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    let labels_match =
        selector.match_labels.as_ref().map_or(true, |match_labels| match_labels.iter().all(|(key, value)| labels.get(key) == Some(value)));

    let expressions_match = selector.match_expressions.as_ref().map_or(true, |expressions| {
        expressions.iter().all(|expression| {
            let values = expression.values.clone().unwrap_or_default();
            let value = labels.get(&expression.key);
            match expression.operator.as_str() {
                "In" => value.is_some_and(|v| values.contains(v)),
                "NotIn" => value.map_or(true, |v| !values.contains(v)),
                "Exists" => value.is_some(),
                "DoesNotExist" => value.is_none(),
                operator => {
                    warn!("Unknown label selector operator {operator}");
                    false
                },
            }
        })
    });
    labels_match && expressions_match
}

/// Listeners of the gateway a route parent reference may attach to.
pub fn allowed_listeners<'a>(
    cache: &Cache,
    gateway: &'a Gateway,
    parent_ref: &ParentReference,
    route_kind: &str,
    route_namespace: &str,
) -> Result<Vec<&'a Listener>, StorageError> {
    let gateway_namespace = gateway.metadata.namespace.clone().unwrap_or_default();
    let mut allowed = vec![];
    for listener in valid_listeners(gateway) {
        if parent_ref.section_name.as_ref().is_some_and(|section_name| *section_name != listener.name) {
            continue;
        }
        if parent_ref.port.is_some_and(|port| port != listener.port) {
            continue;
        }
        if !listener_allows_kind(listener, route_kind) {
            continue;
        }
        if !namespace_matches(cache, listener, &gateway_namespace, route_namespace)? {
            continue;
        }
        allowed.push(listener);
    }
    Ok(allowed)
}

/// `*` spans exactly one label. `*.example.com` does not match `example.com`.
pub fn hostname_matches_wildcard(hostname: &str, wildcard_hostname: &str) -> bool {
    let Some(suffix) = wildcard_hostname.strip_prefix('*') else {
        return hostname == wildcard_hostname;
    };
    let label = hostname.strip_suffix(suffix).unwrap_or_default();
    if label.is_empty() || label.contains('.') {
        return false;
    }
    match DomainPattern::<'_, '.'>::try_from(wildcard_hostname) {
        Ok(pattern) => {
            let res = pattern.matches(hostname);
            debug!("Comparing hostnames {wildcard_hostname} {hostname} {res}");
            res
        },
        Err(_) => {
            warn!("Hostname is not a valid domain {wildcard_hostname}");
            false
        },
    }
}

/// Hostnames served for a route attached to a listener.
pub fn valid_hostnames(listener_hostname: Option<&str>, route_hostnames: &[String]) -> Vec<String> {
    if route_hostnames.is_empty() {
        return vec![listener_hostname.unwrap_or(DEFAULT_ROUTE_HOSTNAME).to_owned()];
    }

    let mut hostnames = BTreeSet::new();
    for route_hostname in route_hostnames {
        match listener_hostname {
            None => {
                hostnames.insert(route_hostname.clone());
            },
            Some(listener_hostname) if listener_hostname == route_hostname => {
                hostnames.insert(route_hostname.clone());
            },
            Some(listener_hostname) if listener_hostname.starts_with('*') => {
                if hostname_matches_wildcard(route_hostname, listener_hostname) {
                    hostnames.insert(route_hostname.clone());
                }
            },
            Some(listener_hostname) if route_hostname.starts_with('*') => {
                if hostname_matches_wildcard(listener_hostname, route_hostname) {
                    hostnames.insert(listener_hostname.to_owned());
                }
            },
            Some(_) => {},
        }
    }
    hostnames.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostnames_without_route_hostnames() {
        assert_eq!(valid_hostnames(Some("test.com"), &[]), vec!["test.com"]);
        assert_eq!(valid_hostnames(None, &[]), vec!["*"]);
    }

    #[test]
    fn hostnames_intersection() {
        let route_hostnames = vec!["test.com".to_owned(), "no-test.com".to_owned()];
        assert_eq!(valid_hostnames(Some("test.com"), &route_hostnames), vec!["test.com"]);
        assert_eq!(valid_hostnames(None, &route_hostnames), vec!["no-test.com", "test.com"]);

        let route_hostnames = vec!["blah.test.com".to_owned(), "even.more.test.com".to_owned(), "test.com".to_owned()];
        assert_eq!(valid_hostnames(Some("*.test.com"), &route_hostnames), vec!["blah.test.com"]);

        let route_hostnames = vec!["*.test.com".to_owned()];
        assert_eq!(valid_hostnames(Some("more.test.com"), &route_hostnames), vec!["more.test.com"]);
        assert!(valid_hostnames(Some("other.com"), &route_hostnames).is_empty());
        assert!(valid_hostnames(Some("test.com"), &route_hostnames).is_empty());
    }

    #[test]
    fn wildcard_spans_one_label() {
        assert!(hostname_matches_wildcard("api.example.com", "*.example.com"));
        assert!(!hostname_matches_wildcard("example.com", "*.example.com"));
        assert!(!hostname_matches_wildcard(".example.com", "*.example.com"));
        assert!(!hostname_matches_wildcard("a.b.example.com", "*.example.com"));
        assert!(!hostname_matches_wildcard("api.example.org", "*.example.com"));
    }

    #[test]
    fn parent_ref_to_gateway() {
        let gateway_key = ResourceKey::namespaced("gw", "infra");
        let parent_ref = ParentReference { name: "gw".to_owned(), ..Default::default() };
        assert!(is_ref_to_gateway(&parent_ref, "infra", &gateway_key));
        assert!(!is_ref_to_gateway(&parent_ref, "apps", &gateway_key));

        let parent_ref = ParentReference { name: "gw".to_owned(), namespace: Some("infra".to_owned()), kind: Some("Service".to_owned()), ..Default::default() };
        assert!(!is_ref_to_gateway(&parent_ref, "apps", &gateway_key));
    }

    #[test]
    fn selector_matching() {
        let labels = BTreeMap::from([("team".to_owned(), "blue".to_owned())]);
        let selector = LabelSelector { match_labels: Some(BTreeMap::from([("team".to_owned(), "blue".to_owned())])), ..Default::default() };
        assert!(label_selector_matches(&selector, &labels));

        let selector = LabelSelector {
            match_expressions: Some(vec![LabelSelectorRequirement { key: "team".to_owned(), operator: "NotIn".to_owned(), values: Some(vec!["blue".to_owned()]) }]),
            ..Default::default()
        };
        assert!(!label_selector_matches(&selector, &labels));
    }
}
