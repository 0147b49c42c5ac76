use crate::{
    apis::{
        policies::{GRPCMatchConfig, HTTPMatchConfig, HostnameConfig, PortConfig},
        routes::{GRPCRouteRulesMatches, HTTPRouteRulesMatches},
    },
    common::gateway_api::hostname_matches_wildcard,
};

/// A route hostname and a policy hostname select the same traffic.
///
/// Either side may be a wildcard, in which case the other side must fall under it.
pub fn hostname_matches(route_hostname: &str, policy_hostname: &str) -> bool {
    if route_hostname == policy_hostname {
        return true;
    }
    if route_hostname.starts_with('*') {
        return hostname_matches_wildcard(policy_hostname, route_hostname);
    }
    if policy_hostname.starts_with('*') {
        return hostname_matches_wildcard(route_hostname, policy_hostname);
    }
    false
}

pub fn port_config<C, F>(port: u16, entries: &[PortConfig<C>], default_config: Option<&C>, compute: F) -> Option<C>
where
    F: FnOnce(Option<&C>, Option<&C>) -> Option<C>,
{
    entries.iter().find(|entry| entry.port == port).and_then(|entry| compute(entry.config.as_ref(), default_config))
}

pub fn hostname_config<C, F>(hostname: &str, entries: &[HostnameConfig<C>], default_config: Option<&C>, compute: F) -> Option<C>
where
    F: FnOnce(Option<&C>, Option<&C>) -> Option<C>,
{
    entries.iter().find(|entry| hostname_matches(hostname, &entry.hostname)).and_then(|entry| compute(entry.config.as_ref(), default_config))
}

/// Route matches select a policy entry only when structurally equal.
pub fn http_match_config<C, F>(route_match: &HTTPRouteRulesMatches, entries: &[HTTPMatchConfig<C>], default_config: Option<&C>, compute: F) -> Option<C>
where
    F: FnOnce(Option<&C>, Option<&C>) -> Option<C>,
{
    entries.iter().find(|entry| entry.r#match == *route_match).and_then(|entry| compute(entry.config.as_ref(), default_config))
}

pub fn grpc_match_config<C, F>(route_match: &GRPCRouteRulesMatches, entries: &[GRPCMatchConfig<C>], default_config: Option<&C>, compute: F) -> Option<C>
where
    F: FnOnce(Option<&C>, Option<&C>) -> Option<C>,
{
    entries.iter().find(|entry| entry.r#match == *route_match).and_then(|entry| compute(entry.config.as_ref(), default_config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        apis::{
            policies::AccessControlConfig,
            routes::{HTTPRouteRulesMatchesPath, HTTPRouteRulesMatchesPathType},
        },
        policy::resolvers::access_control,
    };

    fn blacklist(ip: &str) -> Option<AccessControlConfig> {
        Some(AccessControlConfig { blacklist: vec![ip.to_owned()], ..Default::default() })
    }

    #[test]
    fn wildcard_hostnames() {
        assert!(hostname_matches("foo.example.com", "foo.example.com"));
        assert!(hostname_matches("foo.example.com", "*.example.com"));
        assert!(hostname_matches("*.example.com", "foo.example.com"));
        assert!(!hostname_matches("foo.bar.example.com", "*.example.com"));
        assert!(!hostname_matches("foo.example.org", "*.example.com"));
    }

    #[test]
    fn port_entries_match_exactly() {
        let entries = vec![PortConfig { port: 8080, config: blacklist("1.1.1.1") }, PortConfig { port: 9090, config: None }];
        let default_config = AccessControlConfig { enable_xff: Some(true), ..Default::default() };

        let config = port_config(8080, &entries, Some(&default_config), access_control::compute).unwrap_or_default();
        assert_eq!(config.blacklist, vec!["1.1.1.1"]);
        assert_eq!(config.enable_xff, Some(true));

        let config = port_config(9090, &entries, Some(&default_config), access_control::compute).unwrap_or_default();
        assert!(config.blacklist.is_empty());
        assert_eq!(config.enable_xff, Some(true));

        assert_eq!(port_config(80, &entries, Some(&default_config), access_control::compute), None);
        assert_eq!(port_config(80, &[], Some(&default_config), access_control::compute), None);
    }

    #[test]
    fn route_matches_require_equality() {
        let exact = HTTPRouteRulesMatches {
            path: Some(HTTPRouteRulesMatchesPath { r#type: Some(HTTPRouteRulesMatchesPathType::Exact), value: Some("/a".to_owned()) }),
            ..Default::default()
        };
        let prefix = HTTPRouteRulesMatches {
            path: Some(HTTPRouteRulesMatchesPath { r#type: Some(HTTPRouteRulesMatchesPathType::PathPrefix), value: Some("/a".to_owned()) }),
            ..Default::default()
        };
        let entries = vec![HTTPMatchConfig { r#match: exact.clone(), config: blacklist("2.2.2.2") }];
        assert!(http_match_config(&exact, &entries, None, access_control::compute).is_some());
        assert!(http_match_config(&prefix, &entries, None, access_control::compute).is_none());
    }

    #[test]
    fn hostname_entries() {
        let entries = vec![HostnameConfig { hostname: "*.example.com".to_owned(), config: blacklist("3.3.3.3") }];
        assert!(hostname_config("api.example.com", &entries, None, access_control::compute).is_some());
        assert!(hostname_config("example.com", &entries, None, access_control::compute).is_none());
    }
}
