// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

//! Compilation of one gateway and everything attached to it into a [`ConfigSpec`].
//!
//! A generator is created per gateway and per pass. It owns the registries it fills while walking
//! the routes: secret files, backends and the backend policy accumulator. Nothing is shared between
//! passes, so gateways can be compiled concurrently.

mod backends;
mod certificates;
mod enrichers;
mod gateway;
mod hash;
pub mod model;
mod processors;
mod routes;

use std::collections::BTreeMap;

use kube::ResourceExt;
use thiserror::Error;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

pub use backends::{is_headless_service_without_selector, ServicePortName};
pub use hash::config_version;
pub use model::{ConfigSpec, Resource};
use processors::BackendPolicies;

use crate::{
    apis::Gateway,
    common::{ReferenceError, ResourceKey, ValidationError},
    configuration::Configuration,
    state::{Cache, StorageError},
};

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("storage error {0}")]
    Storage(#[from] StorageError),
    #[error("serialization error {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Feature flags and static content of the compiled configuration.
#[derive(Clone, Debug, TypedBuilder)]
pub struct GeneratorOptions {
    #[builder(default = true)]
    pub use_endpoint_slices: bool,
    #[builder(default)]
    pub drop_route_rule_if_no_available_backends: bool,
    #[builder(default)]
    pub filters: BTreeMap<String, BTreeMap<String, String>>,
}

impl From<&Configuration> for GeneratorOptions {
    fn from(configuration: &Configuration) -> Self {
        GeneratorOptions::builder()
            .use_endpoint_slices(configuration.use_endpoint_slices)
            .drop_route_rule_if_no_available_backends(configuration.drop_route_rule_if_no_available_backends)
            .filters(configuration.filters.clone())
            .build()
    }
}

pub struct ConfigGenerator<'a> {
    gateway: &'a Gateway,
    gateway_key: ResourceKey,
    cache: &'a Cache,
    options: &'a GeneratorOptions,
    secrets: BTreeMap<String, String>,
    /// Backends by name. `None` marks a backend that was looked at and has no usable targets.
    backends: BTreeMap<String, Option<model::Backend>>,
    backend_policies: BackendPolicies,
}

impl<'a> ConfigGenerator<'a> {
    pub fn new(gateway: &'a Gateway, cache: &'a Cache, options: &'a GeneratorOptions) -> Self {
        Self {
            gateway,
            gateway_key: ResourceKey::from_resource(gateway),
            cache,
            options,
            secrets: BTreeMap::new(),
            backends: BTreeMap::new(),
            backend_policies: BackendPolicies::default(),
        }
    }

    pub fn generate(mut self) -> Result<ConfigSpec, GeneratorError> {
        debug!("Generating configuration for gateway {}", self.gateway_key);
        let mut resources = vec![Resource::Gateway(self.process_gateway()?)];
        resources.extend(self.process_http_routes()?);
        resources.extend(self.process_grpc_routes()?);
        resources.extend(self.process_tls_routes()?);
        resources.extend(self.process_tcp_routes()?);
        resources.extend(self.process_udp_routes()?);
        resources.extend(self.backends.into_values().flatten().map(Resource::Backend));
        resources.extend(self.backend_policies.into_resources());

        let mut config = ConfigSpec { resources, secrets: self.secrets, filters: self.options.filters.clone(), version: String::new() };
        config.version = config_version(&config)?;
        debug!("Generated configuration for gateway {} version {}", self.gateway.name_any(), config.version);
        Ok(config)
    }
}

/// Unresolvable references only drop the object that holds them. Storage failures abort the pass.
fn skip_unresolved<T>(result: Result<T, GeneratorError>) -> Result<Option<T>, GeneratorError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(GeneratorError::Reference(e)) => {
            warn!("Skipping unresolved reference {e}");
            Ok(None)
        },
        Err(GeneratorError::Validation(e)) => {
            warn!("Skipping invalid reference {e}");
            Ok(None)
        },
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test;
