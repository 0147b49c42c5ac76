// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

//! Policy acceptance status: computation from the cache and the queue feeding the status writer.

mod processor;
mod store;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;

pub use processor::StatusProcessor;
pub use store::{KubePolicyStatusStore, PolicyStatusStore, StatusStoreError, StoredStatus};

use crate::{
    apis::{policies::PolicyAncestorStatus, ParentReference},
    common::{
        conditions::{conditions_equal_ignoring_time, set_status_condition},
        ResourceKey,
    },
    policy::PolicyKind,
};

/// Freshly computed ancestors of one policy, written by the status updater.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyStatusUpdate {
    pub kind: PolicyKind,
    pub key: ResourceKey,
    pub generation: Option<i64>,
    pub ancestors: Vec<PolicyAncestorStatus>,
}

fn same_ancestor(this: &PolicyAncestorStatus, other: &PolicyAncestorStatus) -> bool {
    this.controller_name == other.controller_name && same_parent(&this.ancestor_ref, &other.ancestor_ref)
}

fn same_parent(this: &ParentReference, other: &ParentReference) -> bool {
    this.group == other.group && this.kind == other.kind && this.namespace == other.namespace && this.name == other.name && this.section_name == other.section_name
}

/// Merges computed ancestors into the stored ones.
///
/// Conditions are merged by type. Ancestors owned by other controllers or not computed this time are kept.
pub fn merge_ancestors(stored: &[PolicyAncestorStatus], computed: &[PolicyAncestorStatus]) -> Vec<PolicyAncestorStatus> {
    let mut merged = stored.to_vec();
    for ancestor in computed {
        match merged.iter_mut().find(|existing| same_ancestor(existing, ancestor)) {
            Some(existing) => {
                for condition in &ancestor.conditions {
                    set_status_condition(&mut existing.conditions, condition.clone());
                }
            },
            None => merged.push(ancestor.clone()),
        }
    }
    merged
}

/// Equality of two ancestor lists, transition times aside.
pub fn ancestors_equal(this: &[PolicyAncestorStatus], other: &[PolicyAncestorStatus]) -> bool {
    this.len() == other.len()
        && this.iter().zip(other.iter()).all(|(a, b)| same_ancestor(a, b) && conditions_equal(&a.conditions, &b.conditions))
}

fn conditions_equal(this: &[Condition], other: &[Condition]) -> bool {
    conditions_equal_ignoring_time(this, other)
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    use super::*;
    use crate::common::conditions::{accepted_condition, PolicyConditionReason};

    fn ancestor(name: &str, controller_name: &str, reason: PolicyConditionReason) -> PolicyAncestorStatus {
        PolicyAncestorStatus {
            ancestor_ref: ParentReference { name: name.to_owned(), namespace: Some("default".to_owned()), ..Default::default() },
            controller_name: controller_name.to_owned(),
            conditions: vec![accepted_condition(reason, reason.as_str().to_owned(), Some(1))],
        }
    }

    #[test]
    fn merge_keeps_other_controllers() {
        let stored = vec![ancestor("gw", "other", PolicyConditionReason::Accepted), ancestor("gw", "fsm", PolicyConditionReason::Accepted)];
        let computed = vec![ancestor("gw", "fsm", PolicyConditionReason::Conflicted), ancestor("route", "fsm", PolicyConditionReason::Accepted)];
        let merged = merge_ancestors(&stored, &computed);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].conditions[0].reason, "Accepted");
        assert_eq!(merged[1].conditions[0].reason, "Conflicted");
        assert_eq!(merged[2].ancestor_ref.name, "route");
    }

    #[test]
    fn unchanged_status_ignores_time() {
        let stored = vec![ancestor("gw", "fsm", PolicyConditionReason::Accepted)];
        let mut computed = stored.clone();
        computed[0].conditions[0].last_transition_time = Time(chrono::Utc::now() + chrono::Duration::seconds(60));
        let merged = merge_ancestors(&stored, &computed);
        assert!(ancestors_equal(&stored, &merged));
        assert_eq!(merged[0].conditions[0].last_transition_time, stored[0].conditions[0].last_transition_time);
    }
}
