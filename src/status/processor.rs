// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

use std::sync::Arc;

use kube::{Resource, ResourceExt};
use tracing::{debug, warn};

use super::PolicyStatusUpdate;
use crate::{
    apis::{
        policies::{
            AccessControlPolicy, BackendLBPolicy, BackendTLSPolicy, CircuitBreakingPolicy, FaultInjectionPolicy, GatewayTLSPolicy, HealthCheckPolicy,
            LoadBalancerPolicy, PolicyAncestorStatus, PolicyTargetReference, RateLimitPolicy, RetryPolicy, SessionStickyPolicy, UpstreamTLSPolicy,
        },
        GRPCRoute, Gateway, HTTPRoute, ReferenceGrant, KIND_GATEWAY, KIND_GRPC_ROUTE, KIND_HTTP_ROUTE, KIND_SERVICE, KIND_SERVICE_IMPORT,
    },
    common::{
        conditions::{accepted_condition, PolicyConditionReason},
        ResourceKey,
    },
    policy::{
        conflict::{find_conflict_in_scopes, gateway_scopes, grpc_route_scopes, http_route_scopes, preceding_peers, service_import_scopes, service_scopes},
        AttachedPolicy, ScopeDescriptor,
    },
    state::{Cache, StorageError},
};

enum TargetLookup {
    Found(Vec<ScopeDescriptor>),
    NotFound,
}

/// Computes the acceptance of every policy against each of its targets.
pub struct StatusProcessor<'a> {
    cache: &'a Cache,
    controller_name: &'a str,
}

impl<'a> StatusProcessor<'a> {
    pub fn new(cache: &'a Cache, controller_name: &'a str) -> Self {
        Self { cache, controller_name }
    }

    pub fn process(&self) -> Result<Vec<PolicyStatusUpdate>, StorageError> {
        let reference_grants = self.cache.list::<ReferenceGrant>()?;
        let mut updates = vec![];
        updates.extend(self.process_kind::<AccessControlPolicy>(&reference_grants)?);
        updates.extend(self.process_kind::<CircuitBreakingPolicy>(&reference_grants)?);
        updates.extend(self.process_kind::<FaultInjectionPolicy>(&reference_grants)?);
        updates.extend(self.process_kind::<GatewayTLSPolicy>(&reference_grants)?);
        updates.extend(self.process_kind::<HealthCheckPolicy>(&reference_grants)?);
        updates.extend(self.process_kind::<LoadBalancerPolicy>(&reference_grants)?);
        updates.extend(self.process_kind::<RateLimitPolicy>(&reference_grants)?);
        updates.extend(self.process_kind::<RetryPolicy>(&reference_grants)?);
        updates.extend(self.process_kind::<SessionStickyPolicy>(&reference_grants)?);
        updates.extend(self.process_kind::<UpstreamTLSPolicy>(&reference_grants)?);
        updates.extend(self.process_kind::<BackendTLSPolicy>(&reference_grants)?);
        updates.extend(self.process_kind::<BackendLBPolicy>(&reference_grants)?);
        Ok(updates)
    }

    fn process_kind<P: AttachedPolicy>(&self, reference_grants: &[Arc<ReferenceGrant>]) -> Result<Vec<PolicyStatusUpdate>, StorageError> {
        let policies = self.cache.list::<P>()?;
        debug!("Computing status of {} {} objects", policies.len(), P::POLICY_KIND);
        Ok(policies.iter().map(|policy| self.policy_status(policy.as_ref(), reference_grants)).collect())
    }

    fn policy_status<P: AttachedPolicy>(&self, policy: &P, reference_grants: &[Arc<ReferenceGrant>]) -> PolicyStatusUpdate {
        let namespace = policy.namespace().unwrap_or_default();
        let generation = policy.meta().generation;
        let ancestors = policy
            .target_refs()
            .iter()
            .map(|target_ref| {
                let (reason, message) = self.target_acceptance(policy, target_ref, reference_grants);
                PolicyAncestorStatus {
                    ancestor_ref: target_ref.to_parent_reference(&namespace),
                    controller_name: self.controller_name.to_owned(),
                    conditions: vec![accepted_condition(reason, message, generation)],
                }
            })
            .collect();
        PolicyStatusUpdate { kind: P::POLICY_KIND, key: policy.policy_key(), generation, ancestors }
    }

    fn target_acceptance<P: AttachedPolicy>(
        &self,
        policy: &P,
        target_ref: &PolicyTargetReference,
        reference_grants: &[Arc<ReferenceGrant>],
    ) -> (PolicyConditionReason, String) {
        if !P::supports_target(target_ref) {
            return (PolicyConditionReason::Invalid, format!("Unsupported target group {} and kind {}", target_ref.group, target_ref.kind));
        }
        if !policy.reference_permitted(target_ref, reference_grants) {
            return (PolicyConditionReason::Invalid, format!("Cross namespace reference to {} {} is not permitted", target_ref.kind, target_ref.name));
        }

        let target = ResourceKey::from_target_ref(target_ref, &policy.namespace().unwrap_or_default());
        let scopes = match self.target_scopes(&target) {
            Ok(TargetLookup::Found(scopes)) => scopes,
            Ok(TargetLookup::NotFound) => {
                return (PolicyConditionReason::TargetNotFound, format!("Target {} {} not found", target.kind, target.namespaced_name()));
            },
            Err(e) => {
                warn!("Lookup of target {} of {} {} failed {e}", target.namespaced_name(), P::POLICY_KIND, policy.policy_key());
                return (PolicyConditionReason::Invalid, format!("Failed to get target {} {}: {e}", target.kind, target.namespaced_name()));
            },
        };

        let peers = match preceding_peers(self.cache, policy, &target) {
            Ok(peers) => peers,
            Err(e) => return (PolicyConditionReason::Invalid, format!("Failed to list {} objects: {e}", P::POLICY_KIND)),
        };
        match find_conflict_in_scopes(policy, &peers, &scopes) {
            Some(peer) => (PolicyConditionReason::Conflicted, format!("Conflict with {}: {}", P::POLICY_KIND, peer.namespaced_name())),
            None => (PolicyConditionReason::Accepted, PolicyConditionReason::Accepted.as_str().to_owned()),
        }
    }

    fn target_scopes(&self, target: &ResourceKey) -> Result<TargetLookup, StorageError> {
        let scopes = match target.kind.as_str() {
            KIND_GATEWAY => self.cache.get::<Gateway>(target)?.map(|gateway| gateway_scopes(&gateway)),
            KIND_HTTP_ROUTE => match self.cache.get::<HTTPRoute>(target)? {
                Some(route) => Some(http_route_scopes(self.cache, &route)?),
                None => None,
            },
            KIND_GRPC_ROUTE => match self.cache.get::<GRPCRoute>(target)? {
                Some(route) => Some(grpc_route_scopes(self.cache, &route)?),
                None => None,
            },
            KIND_SERVICE => self.cache.get_service(&target.namespace, &target.name)?.map(|service| service_scopes(&service)),
            KIND_SERVICE_IMPORT => self.cache.get_service_import(&target.namespace, &target.name)?.map(|service_import| service_import_scopes(&service_import)),
            _ => None,
        };
        Ok(scopes.map_or(TargetLookup::NotFound, TargetLookup::Found))
    }
}
