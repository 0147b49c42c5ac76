// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

pub mod gateway;
pub mod policies;
pub mod routes;
pub mod service_import;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use gateway::{Gateway, Listener, ListenerExt, ProtocolType, TLSModeType};
pub use gateway_api::apis::experimental::referencegrants::{ReferenceGrant, ReferenceGrantFrom, ReferenceGrantSpec, ReferenceGrantTo};
pub use routes::{GRPCRoute, GatewayRoute, HTTPRoute, RouteBackendRef, RouteParentStatus, TCPRoute, TLSRoute, UDPRoute};
pub use service_import::ServiceImport;

pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";
pub const POLICY_API_GROUP: &str = "gateway.flomesh.io";
pub const MULTICLUSTER_API_GROUP: &str = "multicluster.x-k8s.io";
pub const CORE_GROUP: &str = "";

pub const KIND_GATEWAY: &str = "Gateway";
pub const KIND_HTTP_ROUTE: &str = "HTTPRoute";
pub const KIND_GRPC_ROUTE: &str = "GRPCRoute";
pub const KIND_TCP_ROUTE: &str = "TCPRoute";
pub const KIND_UDP_ROUTE: &str = "UDPRoute";
pub const KIND_TLS_ROUTE: &str = "TLSRoute";
pub const KIND_SERVICE: &str = "Service";
pub const KIND_SERVICE_IMPORT: &str = "ServiceImport";
pub const KIND_SECRET: &str = "Secret";
pub const KIND_CONFIG_MAP: &str = "ConfigMap";
pub const KIND_BACKEND: &str = "Backend";

/// Reference to an object, possibly in another namespace. Used for certificate and CA references.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectReference {
    pub fn group_or_core(&self) -> &str {
        self.group.as_deref().unwrap_or(CORE_GROUP)
    }

    pub fn kind_or(&self, default_kind: &'static str) -> String {
        self.kind.clone().unwrap_or_else(|| default_kind.to_owned())
    }

    pub fn namespace_or(&self, default_namespace: &str) -> String {
        self.namespace.clone().unwrap_or_else(|| default_namespace.to_owned())
    }
}

/// Parent reference of a route, independent of the route kind. Also the ancestor reference recorded in policy status.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

impl ParentReference {
    pub fn gateway(namespace: &str, name: &str) -> Self {
        Self {
            group: Some(GATEWAY_API_GROUP.to_owned()),
            kind: Some(KIND_GATEWAY.to_owned()),
            namespace: Some(namespace.to_owned()),
            name: name.to_owned(),
            ..Default::default()
        }
    }
}
