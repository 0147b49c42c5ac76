//! Specificity ordering of route matches, most specific first.
//!
//! The comparators order matches by how much traffic they select. Matches the rules cannot tell
//! apart are ordered structurally so the dispatch table is the same on every build.

/// Name, value and match type of header or query parameter matches, in declaration order.
macro_rules! constraint_keys {
    ($constraints:expr) => {
        $constraints.iter().flatten().map(|constraint| (constraint.name.clone(), constraint.value.clone(), format!("{:?}", constraint.r#type))).collect::<Vec<_>>()
    };
}

mod grpc;
mod http;
#[cfg(test)]
mod test;

pub use grpc::compare_grpc_matches;
pub use http::compare_http_matches;

use crate::apis::routes::{GRPCRouteRulesMatches, HTTPRouteRulesMatches};

pub fn sort_http_matches(matches: &mut [HTTPRouteRulesMatches]) {
    matches.sort_by(compare_http_matches);
}

pub fn sort_grpc_matches(matches: &mut [GRPCRouteRulesMatches]) {
    matches.sort_by(compare_grpc_matches);
}
