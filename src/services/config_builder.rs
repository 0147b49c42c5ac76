// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, span, warn, Instrument, Level};
use typed_builder::TypedBuilder;

use crate::{
    apis::Gateway,
    common::{gateway_api::is_active_gateway, ResourceKey},
    generator::{ConfigGenerator, GeneratorError, GeneratorOptions},
    publisher::{publish, ConfigRepository, PublishOutcome, RepositoryError},
    state::Cache,
    status::{PolicyStatusUpdate, StatusProcessor},
};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Sender side of the build queue.
///
/// Requests made while one is already pending are folded into it.
/// Requests full passes (build then status) and status only passes. Pending requests of the same kind coalesce.
#[derive(Clone)]
pub struct BuildRequester {
    build_sender: mpsc::Sender<()>,
    status_sender: mpsc::Sender<()>,
}

pub struct PassRequests {
    build: mpsc::Receiver<()>,
    status: mpsc::Receiver<()>,
}

impl PassRequests {
    #[cfg(test)]
    pub fn try_recv_build(&mut self) -> bool {
        self.build.try_recv().is_ok()
    }

    #[cfg(test)]
    pub fn try_recv_status(&mut self) -> bool {
        self.status.try_recv().is_ok()
    }
}

fn coalesced_send(sender: &mpsc::Sender<()>, pass: &str) {
    match sender.try_send(()) {
        Ok(()) => debug!("{pass} requested"),
        Err(mpsc::error::TrySendError::Full(())) => debug!("{pass} already pending"),
        Err(mpsc::error::TrySendError::Closed(())) => warn!("{pass} queue is closed"),
    }
}

impl BuildRequester {
    pub fn channel() -> (Self, PassRequests) {
        let (build_sender, build) = mpsc::channel(1);
        let (status_sender, status) = mpsc::channel(1);
        (Self { build_sender, status_sender }, PassRequests { build, status })
    }

    pub fn request(&self) {
        coalesced_send(&self.build_sender, "Build");
    }

    pub fn request_status(&self) {
        coalesced_send(&self.status_sender, "Status pass");
    }
}

/// Compiles and publishes the configuration of every active gateway, then recomputes policy statuses.
#[derive(TypedBuilder)]
pub struct ConfigBuilderService {
    cache: Cache,
    options: Arc<GeneratorOptions>,
    repository: Arc<dyn ConfigRepository>,
    controller_name: String,
    pass_requests: PassRequests,
    status_sender: mpsc::Sender<PolicyStatusUpdate>,
    #[builder(default)]
    build_lock: Arc<Mutex<()>>,
}

impl ConfigBuilderService {
    pub async fn start(mut self) -> crate::Result<()> {
        loop {
            tokio::select! {
                Some(()) = self.pass_requests.build.recv() => {
                    let results = self.build_configs().await;
                    let failed = results.iter().filter(|(_, result)| result.is_err()).count();
                    info!("Build finished for {} gateways, {failed} failed", results.len());
                    self.update_statuses().await;
                },
                Some(()) = self.pass_requests.status.recv() => {
                    self.update_statuses().await;
                },
                else => break,
            }
        }
        info!("Config builder stopped");
        crate::Result::<()>::Ok(())
    }

    /// One task per active gateway. A failing gateway does not stop the others.
    pub async fn build_configs(&self) -> Vec<(ResourceKey, Result<PublishOutcome, BuildError>)> {
        let _guard = self.build_lock.lock().await;
        let gateways = match self.cache.list::<Gateway>() {
            Ok(gateways) => gateways,
            Err(e) => {
                warn!("Can't list gateways {e}");
                return vec![];
            },
        };

        let mut tasks = vec![];
        for gateway in gateways.into_iter().filter(|gateway| is_active_gateway(gateway)) {
            let gateway_key = ResourceKey::from_resource(gateway.as_ref());
            let span = span!(Level::INFO, "ConfigBuilderService", id = %gateway_key);
            let cache = self.cache.clone();
            let options = Arc::clone(&self.options);
            let repository = Arc::clone(&self.repository);
            let task_key = gateway_key.clone();
            let task = tokio::spawn(
                async move {
                    let config = ConfigGenerator::new(&gateway, &cache, &options).generate()?;
                    Ok::<_, BuildError>(publish(repository.as_ref(), &task_key, &config).await?)
                }
                .instrument(span.clone()),
            );
            tasks.push((gateway_key, span, task));
        }

        let mut results = vec![];
        for (gateway_key, span, task) in tasks {
            match task.await {
                Ok(result) => {
                    match &result {
                        Ok(outcome) => span.in_scope(|| debug!("build result {outcome:?}")),
                        Err(e) => span.in_scope(|| warn!("build failed {e}")),
                    }
                    results.push((gateway_key, result));
                },
                Err(e) => span.in_scope(|| warn!("build task failed {e}")),
            }
        }
        results
    }

    async fn update_statuses(&self) {
        let updates = match StatusProcessor::new(&self.cache, &self.controller_name).process() {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Can't compute policy statuses {e}");
                return;
            },
        };
        debug!("Queueing {} policy status updates", updates.len());
        for update in updates {
            if self.status_sender.send(update).await.is_err() {
                warn!("Status queue is closed");
                return;
            }
        }
    }
}
