// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

//! Policy attachment: scopes, effective configuration lookup and conflict detection.

pub mod attachments;
pub mod conflict;
pub mod matchers;
pub mod resolvers;

use std::{
    fmt::{Debug, Display},
    sync::Arc,
};

use kube::ResourceExt;
use serde::Serialize;

use crate::{
    apis::{
        policies::{PolicyAncestorStatus, PolicyTargetReference},
        routes::{GRPCRouteRulesMatches, HTTPRouteRulesMatches},
        ParentReference, ReferenceGrant, CORE_GROUP, GATEWAY_API_GROUP, KIND_GATEWAY, KIND_GRPC_ROUTE, KIND_HTTP_ROUTE, KIND_SERVICE, KIND_SERVICE_IMPORT,
        MULTICLUSTER_API_GROUP,
    },
    common::{
        conditions::{is_condition_true, CONDITION_ACCEPTED},
        reference_grants::{valid_cross_namespace_ref, FromResourceKey, ToResourceKey},
        ResourceKey,
    },
    state::{Cache, Cached, StorageError},
};

/// The dimension at which a policy configuration is evaluated.
#[derive(Clone, Debug, PartialEq)]
pub enum ScopeDescriptor {
    Port(u16),
    Hostname(String),
    HttpMatch(HTTPRouteRulesMatches),
    GrpcMatch(GRPCRouteRulesMatches),
}

impl Display for ScopeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeDescriptor::Port(port) => write!(f, "port {port}"),
            ScopeDescriptor::Hostname(hostname) => write!(f, "hostname {hostname}"),
            ScopeDescriptor::HttpMatch(route_match) => write!(f, "http match {route_match:?}"),
            ScopeDescriptor::GrpcMatch(route_match) => write!(f, "grpc match {route_match:?}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PolicyKind {
    AccessControl,
    CircuitBreaking,
    FaultInjection,
    GatewayTLS,
    HealthCheck,
    LoadBalancer,
    RateLimit,
    Retry,
    SessionSticky,
    UpstreamTLS,
    BackendTLS,
    BackendLB,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 12] = [
        PolicyKind::AccessControl,
        PolicyKind::CircuitBreaking,
        PolicyKind::FaultInjection,
        PolicyKind::GatewayTLS,
        PolicyKind::HealthCheck,
        PolicyKind::LoadBalancer,
        PolicyKind::RateLimit,
        PolicyKind::Retry,
        PolicyKind::SessionSticky,
        PolicyKind::UpstreamTLS,
        PolicyKind::BackendTLS,
        PolicyKind::BackendLB,
    ];

    pub fn kind(self) -> &'static str {
        match self {
            PolicyKind::AccessControl => "AccessControlPolicy",
            PolicyKind::CircuitBreaking => "CircuitBreakingPolicy",
            PolicyKind::FaultInjection => "FaultInjectionPolicy",
            PolicyKind::GatewayTLS => "GatewayTLSPolicy",
            PolicyKind::HealthCheck => "HealthCheckPolicy",
            PolicyKind::LoadBalancer => "LoadBalancerPolicy",
            PolicyKind::RateLimit => "RateLimitPolicy",
            PolicyKind::Retry => "RetryPolicy",
            PolicyKind::SessionSticky => "SessionStickyPolicy",
            PolicyKind::UpstreamTLS => "UpstreamTLSPolicy",
            PolicyKind::BackendTLS => "BackendTLSPolicy",
            PolicyKind::BackendLB => "BackendLBPolicy",
        }
    }

    pub fn api_version(self) -> &'static str {
        match self {
            PolicyKind::BackendTLS => "gateway.networking.k8s.io/v1alpha3",
            PolicyKind::BackendLB => "gateway.networking.k8s.io/v1alpha2",
            _ => "gateway.flomesh.io/v1alpha1",
        }
    }
}

impl Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// Group and kind of an object a policy may target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetKind {
    pub group: &'static str,
    pub kind: &'static str,
}

pub const GATEWAY_TARGET: TargetKind = TargetKind { group: GATEWAY_API_GROUP, kind: KIND_GATEWAY };
pub const HTTP_ROUTE_TARGET: TargetKind = TargetKind { group: GATEWAY_API_GROUP, kind: KIND_HTTP_ROUTE };
pub const GRPC_ROUTE_TARGET: TargetKind = TargetKind { group: GATEWAY_API_GROUP, kind: KIND_GRPC_ROUTE };
pub const SERVICE_TARGET: TargetKind = TargetKind { group: CORE_GROUP, kind: KIND_SERVICE };
pub const SERVICE_IMPORT_TARGET: TargetKind = TargetKind { group: MULTICLUSTER_API_GROUP, kind: KIND_SERVICE_IMPORT };

pub const ROUTE_TARGETS: &[TargetKind] = &[GATEWAY_TARGET, HTTP_ROUTE_TARGET, GRPC_ROUTE_TARGET];
pub const SERVICE_TARGETS: &[TargetKind] = &[SERVICE_TARGET, SERVICE_IMPORT_TARGET];

/// A policy attachment object of one kind.
pub trait AttachedPolicy: Cached + ResourceExt + Debug {
    /// Effective configuration at a single scope.
    type Config: Clone + Debug + PartialEq + Serialize;

    const POLICY_KIND: PolicyKind;

    fn supported_targets() -> &'static [TargetKind];

    fn target_refs(&self) -> &[PolicyTargetReference];

    /// Effective configuration at `scope`, or `None` when the policy does not apply there.
    fn config_for(&self, scope: &ScopeDescriptor) -> Option<Self::Config>;

    fn ancestors(&self) -> &[PolicyAncestorStatus];

    fn policy_key(&self) -> ResourceKey {
        ResourceKey::from_resource(self)
    }

    fn supports_target(target_ref: &PolicyTargetReference) -> bool {
        Self::supported_targets().iter().any(|target| target.group == target_ref.group && target.kind == target_ref.kind)
    }

    /// The policy has a target reference resolving to `target`.
    fn targets(&self, target: &ResourceKey) -> bool {
        let namespace = self.namespace().unwrap_or_default();
        self.target_refs().iter().any(|target_ref| {
            let key = ResourceKey::from_target_ref(target_ref, &namespace);
            key.group == target.group && key.kind == target.kind && key.namespace == target.namespace && key.name == target.name
        })
    }

    /// Accepted status reported for the ancestor the target reference designates.
    fn is_accepted_for(&self, target_ref: &PolicyTargetReference) -> bool {
        let ancestor_ref = target_ref.to_parent_reference(&self.namespace().unwrap_or_default());
        self.ancestors().iter().any(|ancestor| same_ancestor(&ancestor.ancestor_ref, &ancestor_ref) && is_condition_true(&ancestor.conditions, CONDITION_ACCEPTED))
    }

    /// First target reference resolving to `target` that has been accepted.
    fn accepted_target_ref(&self, target: &ResourceKey) -> Option<&PolicyTargetReference> {
        let namespace = self.namespace().unwrap_or_default();
        self.target_refs().iter().find(|target_ref| ResourceKey::from_target_ref(target_ref, &namespace) == *target && self.is_accepted_for(target_ref))
    }

    /// A target in another namespace needs a grant in that namespace.
    fn reference_permitted(&self, target_ref: &PolicyTargetReference, reference_grants: &[Arc<ReferenceGrant>]) -> bool {
        let policy_namespace = self.namespace().unwrap_or_default();
        match target_ref.namespace.as_ref() {
            Some(namespace) if *namespace != policy_namespace => valid_cross_namespace_ref(
                reference_grants,
                &FromResourceKey { group: Self::group(&()).into_owned(), kind: Self::kind(&()).into_owned(), namespace: policy_namespace },
                &ToResourceKey { group: target_ref.group.clone(), kind: target_ref.kind.clone(), namespace: namespace.clone(), name: target_ref.name.clone() },
            ),
            _ => true,
        }
    }
}

/// Configuration at `scope` of the oldest accepted policy of kind `P` attached to `target`.
pub fn effective_config<P: AttachedPolicy>(cache: &Cache, target: &ResourceKey, scope: &ScopeDescriptor) -> Result<Option<P::Config>, StorageError> {
    Ok(cache.list::<P>()?.iter().filter(|policy| policy.accepted_target_ref(target).is_some()).find_map(|policy| policy.config_for(scope)))
}

fn same_ancestor(this: &ParentReference, other: &ParentReference) -> bool {
    this.name == other.name && this.namespace == other.namespace && this.kind == other.kind && this.group == other.group && this.section_name == other.section_name
}
