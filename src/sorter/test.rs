use gateway_api::apis::experimental::{
    grpcroutes::GRPCRouteRulesMatchesHeaders,
    httproutes::{HTTPRouteRulesMatchesHeaders, HTTPRouteRulesMatchesMethod, HTTPRouteRulesMatchesQueryParams},
};

use super::{compare_grpc_matches, compare_http_matches};
use crate::apis::routes::{
    GRPCRouteRulesMatches, GRPCRouteRulesMatchesMethod, GRPCRouteRulesMatchesMethodType, HTTPRouteRulesMatches, HTTPRouteRulesMatchesPath,
    HTTPRouteRulesMatchesPathType,
};

#[derive(Debug, PartialEq)]
struct HttpRule {
    name: &'static str,
    route_match: HTTPRouteRulesMatches,
}

impl PartialOrd for HttpRule {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(compare_http_matches(&self.route_match, &other.route_match))
    }
}

#[derive(Debug, PartialEq)]
struct GrpcRule {
    name: &'static str,
    route_match: GRPCRouteRulesMatches,
}

impl PartialOrd for GrpcRule {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(compare_grpc_matches(&self.route_match, &other.route_match))
    }
}

fn path(r#type: HTTPRouteRulesMatchesPathType, value: &str) -> Option<HTTPRouteRulesMatchesPath> {
    Some(HTTPRouteRulesMatchesPath { r#type: Some(r#type), value: Some(value.to_owned()) })
}

fn headers(pairs: &[(&str, &str)]) -> Option<Vec<HTTPRouteRulesMatchesHeaders>> {
    Some(pairs.iter().map(|(name, value)| HTTPRouteRulesMatchesHeaders { name: (*name).to_owned(), value: (*value).to_owned(), r#type: None }).collect())
}

fn query_params(pairs: &[(&str, &str)]) -> Option<Vec<HTTPRouteRulesMatchesQueryParams>> {
    Some(pairs.iter().map(|(name, value)| HTTPRouteRulesMatchesQueryParams { name: (*name).to_owned(), value: (*value).to_owned(), r#type: None }).collect())
}

fn grpc_headers(pairs: &[(&str, &str)]) -> Option<Vec<GRPCRouteRulesMatchesHeaders>> {
    Some(pairs.iter().map(|(name, value)| GRPCRouteRulesMatchesHeaders { name: (*name).to_owned(), value: (*value).to_owned(), r#type: None }).collect())
}

fn sorted_names<T: PartialOrd>(mut rules: Vec<T>, name: fn(&T) -> &'static str) -> Vec<&'static str> {
    rules.sort_by(|this, other| this.partial_cmp(other).unwrap_or(std::cmp::Ordering::Less));
    rules.iter().map(name).collect()
}

#[test]
pub fn test_exact_before_prefix() {
    let rules = vec![
        HttpRule { name: "prefix", route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::PathPrefix, "/a"), ..Default::default() } },
        HttpRule { name: "exact", route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::Exact, "/a"), ..Default::default() } },
    ];
    assert_eq!(sorted_names(rules, |r| r.name), vec!["exact", "prefix"]);
}

#[test]
pub fn test_path_sorting_rules() {
    let rules = vec![
        HttpRule { name: "root", route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::PathPrefix, "/"), ..Default::default() } },
        HttpRule { name: "no-path", route_match: HTTPRouteRulesMatches { headers: headers(&[("version", "one")]), ..Default::default() } },
        HttpRule { name: "one", route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::PathPrefix, "/one"), ..Default::default() } },
        HttpRule { name: "longer", route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::PathPrefix, "/one/two"), ..Default::default() } },
        HttpRule { name: "regex", route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::RegularExpression, "/one/two/three"), ..Default::default() } },
    ];
    assert_eq!(sorted_names(rules, |r| r.name), vec!["longer", "one", "root", "regex", "no-path"]);
}

#[test]
pub fn test_same_length_paths_sort_descending() {
    let rules = vec![
        HttpRule { name: "abc", route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::Exact, "/abc"), ..Default::default() } },
        HttpRule { name: "xyz", route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::Exact, "/xyz"), ..Default::default() } },
    ];
    assert_eq!(sorted_names(rules, |r| r.name), vec!["xyz", "abc"]);
}

#[test]
pub fn test_constraint_counts() {
    let rules = vec![
        HttpRule { name: "query", route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::PathPrefix, "/"), query_params: query_params(&[("q", "1")]), ..Default::default() } },
        HttpRule { name: "plain", route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::PathPrefix, "/"), ..Default::default() } },
        HttpRule {
            name: "headers",
            route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::PathPrefix, "/"), headers: headers(&[("a", "1"), ("b", "2")]), ..Default::default() },
        },
        HttpRule {
            name: "method",
            route_match: HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::PathPrefix, "/"), method: Some(HTTPRouteRulesMatchesMethod::Get), ..Default::default() },
        },
    ];
    assert_eq!(sorted_names(rules, |r| r.name), vec!["method", "headers", "query", "plain"]);
}

#[test]
pub fn test_distinct_matches_are_totally_ordered() {
    let matches = vec![
        HTTPRouteRulesMatches { headers: headers(&[("color", "blue")]), ..Default::default() },
        HTTPRouteRulesMatches { headers: headers(&[("color", "green")]), ..Default::default() },
        HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::Exact, "/a"), ..Default::default() },
        HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::Exact, "/b"), ..Default::default() },
        HTTPRouteRulesMatches { path: path(HTTPRouteRulesMatchesPathType::Exact, "/a"), method: Some(HTTPRouteRulesMatchesMethod::Post), ..Default::default() },
        HTTPRouteRulesMatches::default(),
    ];
    for this in &matches {
        for other in &matches {
            let forward = compare_http_matches(this, other);
            let backward = compare_http_matches(other, this);
            assert_eq!(forward, backward.reverse());
            assert_eq!(forward == std::cmp::Ordering::Equal, this == other);
        }
    }
}

fn method(service: Option<&str>, method: Option<&str>) -> Option<GRPCRouteRulesMatchesMethod> {
    Some(GRPCRouteRulesMatchesMethod { r#type: Some(GRPCRouteRulesMatchesMethodType::Exact), service: service.map(ToOwned::to_owned), method: method.map(ToOwned::to_owned) })
}

#[test]
pub fn test_grpc_sorting_rules() {
    let rules = vec![
        GrpcRule { name: "headers-only", route_match: GRPCRouteRulesMatches { headers: grpc_headers(&[("version", "one")]), ..Default::default() } },
        GrpcRule { name: "service", route_match: GRPCRouteRulesMatches { method: method(Some("echo.Echo"), None), ..Default::default() } },
        GrpcRule { name: "full", route_match: GRPCRouteRulesMatches { method: method(Some("echo.Echo"), Some("Ping")), ..Default::default() } },
        GrpcRule {
            name: "regex",
            route_match: GRPCRouteRulesMatches {
                method: Some(GRPCRouteRulesMatchesMethod { r#type: Some(GRPCRouteRulesMatchesMethodType::RegularExpression), service: Some("echo.*".to_owned()), method: None }),
                ..Default::default()
            },
        },
        GrpcRule { name: "nothing", route_match: GRPCRouteRulesMatches::default() },
    ];
    assert_eq!(sorted_names(rules, |r| r.name), vec!["full", "service", "regex", "headers-only", "nothing"]);
}

#[test]
pub fn test_grpc_same_method_more_headers_first() {
    let rules = vec![
        GrpcRule { name: "plain", route_match: GRPCRouteRulesMatches { method: method(Some("echo.Echo"), Some("Ping")), ..Default::default() } },
        GrpcRule {
            name: "headers",
            route_match: GRPCRouteRulesMatches { method: method(Some("echo.Echo"), Some("Ping")), headers: grpc_headers(&[("version", "two")]) },
        },
    ];
    assert_eq!(sorted_names(rules, |r| r.name), vec!["headers", "plain"]);
}
