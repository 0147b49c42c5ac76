use std::cmp::Ordering;

use tracing::trace;

use crate::apis::routes::{GRPCRouteRulesMatches, GRPCRouteRulesMatchesMethod, GRPCRouteRulesMatchesMethodType};

const ANY: &str = "*";

/// Exact methods first. An unset type is an exact match.
fn method_type_rank(method: &GRPCRouteRulesMatchesMethod) -> u8 {
    match method.r#type {
        Some(GRPCRouteRulesMatchesMethodType::Exact) | None => 0,
        Some(GRPCRouteRulesMatchesMethodType::RegularExpression) => 1,
    }
}

fn method_path(method: &GRPCRouteRulesMatchesMethod) -> String {
    format!("{}/{}", method.service.as_deref().unwrap_or(ANY), method.method.as_deref().unwrap_or(ANY))
}

fn method_matching(this: &GRPCRouteRulesMatchesMethod, other: &GRPCRouteRulesMatchesMethod) -> Ordering {
    let type_match = method_type_rank(this).cmp(&method_type_rank(other));
    if type_match != Ordering::Equal {
        return type_match;
    }
    let (this_path, other_path) = (method_path(this), method_path(other));
    if this_path.len() == other_path.len() {
        other_path.cmp(&this_path)
    } else {
        other_path.len().cmp(&this_path.len())
    }
}

type TiebreakKey = (Option<(String, Option<String>, Option<String>)>, Vec<(String, String, String)>);

/// Every field of the match, so only equal matches compare equal.
fn tiebreak_key(route_match: &GRPCRouteRulesMatches) -> TiebreakKey {
    (
        route_match.method.as_ref().map(|method| (format!("{:?}", method.r#type), method.service.clone(), method.method.clone())),
        constraint_keys!(route_match.headers),
    )
}

pub fn compare_grpc_matches(this: &GRPCRouteRulesMatches, other: &GRPCRouteRulesMatches) -> Ordering {
    let header_count = |route_match: &GRPCRouteRulesMatches| route_match.headers.as_ref().map_or(0, Vec::len);
    let header_match = header_count(other).cmp(&header_count(this));
    let result = match (this.method.as_ref(), other.method.as_ref()) {
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => header_match,
        (Some(this_method), Some(other_method)) => method_matching(this_method, other_method).then(header_match),
    };
    let result = result.then_with(|| tiebreak_key(this).cmp(&tiebreak_key(other)));
    trace!("Comparing {this:?} {other:?} {result:?}");
    result
}
