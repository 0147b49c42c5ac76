use std::cmp::Ordering;

use tracing::trace;

use crate::apis::routes::{HTTPRouteRulesMatches, HTTPRouteRulesMatchesPath, HTTPRouteRulesMatchesPathType};

const DEFAULT_PATH: &str = "/";

/// Exact paths first, regular expressions last. An unset type is a prefix match.
fn path_type_rank(path: &HTTPRouteRulesMatchesPath) -> u8 {
    match path.r#type {
        Some(HTTPRouteRulesMatchesPathType::Exact) => 0,
        Some(HTTPRouteRulesMatchesPathType::PathPrefix) | None => 1,
        Some(HTTPRouteRulesMatchesPathType::RegularExpression) => 2,
    }
}

fn path_value(path: &HTTPRouteRulesMatchesPath) -> &str {
    path.value.as_deref().unwrap_or(DEFAULT_PATH)
}

/// Rendering used to break ties between different paths of the same length.
fn path_expansion(path: &str) -> &str {
    match path {
        "" => "*",
        "/" => "/*",
        path => path,
    }
}

fn path_matching(this: &HTTPRouteRulesMatchesPath, other: &HTTPRouteRulesMatchesPath) -> Ordering {
    let type_match = path_type_rank(this).cmp(&path_type_rank(other));
    if type_match != Ordering::Equal {
        return type_match;
    }

    let (this_value, other_value) = (path_value(this), path_value(other));
    if this_value == other_value {
        return Ordering::Equal;
    }
    if this_value.len() == other_value.len() {
        path_expansion(other_value).cmp(path_expansion(this_value))
    } else {
        other_value.len().cmp(&this_value.len())
    }
}

fn constraint_count<T>(constraints: Option<&Vec<T>>) -> usize {
    constraints.map_or(0, Vec::len)
}

/// More constraints sort first.
fn constraint_count_matching(this: &HTTPRouteRulesMatches, other: &HTTPRouteRulesMatches) -> Ordering {
    let method_match = usize::from(other.method.is_some()).cmp(&usize::from(this.method.is_some()));
    let header_match = constraint_count(other.headers.as_ref()).cmp(&constraint_count(this.headers.as_ref()));
    let query_match = constraint_count(other.query_params.as_ref()).cmp(&constraint_count(this.query_params.as_ref()));
    method_match.then(header_match).then(query_match)
}

type TiebreakKey = (Option<(String, Option<String>)>, String, Vec<(String, String, String)>, Vec<(String, String, String)>);

/// Every field of the match, so only equal matches compare equal.
fn tiebreak_key(route_match: &HTTPRouteRulesMatches) -> TiebreakKey {
    (
        route_match.path.as_ref().map(|path| (format!("{:?}", path.r#type), path.value.clone())),
        format!("{:?}", route_match.method),
        constraint_keys!(route_match.headers),
        constraint_keys!(route_match.query_params),
    )
}

pub fn compare_http_matches(this: &HTTPRouteRulesMatches, other: &HTTPRouteRulesMatches) -> Ordering {
    let result = match (this.path.as_ref(), other.path.as_ref()) {
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => constraint_count_matching(this, other),
        (Some(this_path), Some(other_path)) => path_matching(this_path, other_path).then_with(|| constraint_count_matching(this, other)),
    };
    let result = result.then_with(|| tiebreak_key(this).cmp(&tiebreak_key(other)));
    trace!("Comparing {this:?} {other:?} {result:?}");
    result
}
