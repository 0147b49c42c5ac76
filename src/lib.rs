// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

use std::sync::Arc;

use futures::FutureExt;
use kube::Client;
use tokio::sync::mpsc;
use tracing::info;

pub mod apis;
pub mod common;
mod configuration;
mod controllers;
pub mod generator;
pub mod policy;
pub mod publisher;
mod services;
pub mod sorter;
pub mod state;
pub mod status;
pub mod triggers;

pub use configuration::{Configuration, ConfigurationError};

use crate::{
    controllers::{controller_tasks, ResourceController},
    generator::GeneratorOptions,
    publisher::{ConfigRepository, FileConfigRepository},
    services::{BuildRequester, ConfigBuilderService, StatusUpdaterService},
    state::Cache,
    status::{KubePolicyStatusStore, PolicyStatusStore},
    triggers::TriggerRegistry,
};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;

pub async fn start(configuration: Configuration) -> Result<()> {
    configuration.validate()?;
    info!("Gateway policy engine started");
    let cache = Cache::new();
    let client = Client::try_default().await?;

    let (status_sender, status_receiver) = mpsc::channel(configuration.status_queue_size);
    let (build_requester, pass_requests) = BuildRequester::channel();

    let repository: Arc<dyn ConfigRepository> = Arc::new(FileConfigRepository::new(&configuration.repository_root));
    let status_store: Arc<dyn PolicyStatusStore> = Arc::new(KubePolicyStatusStore::new(client.clone()));

    let config_builder_service = ConfigBuilderService::builder()
        .cache(cache.clone())
        .options(Arc::new(GeneratorOptions::from(&configuration)))
        .repository(repository)
        .controller_name(configuration.controller_name.clone())
        .pass_requests(pass_requests)
        .status_sender(status_sender)
        .build();

    let status_updater_service =
        StatusUpdaterService::builder().store(status_store).receiver(status_receiver).max_retries(configuration.status_update_retries).build();

    let resource_controller =
        ResourceController::builder().cache(cache).triggers(Arc::new(TriggerRegistry::new())).build_requester(build_requester).build();

    let mut services = vec![config_builder_service.start().boxed(), status_updater_service.start().boxed()];
    services.extend(controller_tasks(&resource_controller, &client));

    futures::future::join_all(services).await;
    info!("Gateway policy engine stopped");
    Ok(())
}
