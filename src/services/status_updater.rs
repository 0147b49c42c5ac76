// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;
use tracing::{debug, info, span, warn, Instrument, Level, Span};
use typed_builder::TypedBuilder;

use crate::status::{ancestors_equal, merge_ancestors, PolicyStatusStore, PolicyStatusUpdate, StatusStoreError, StoredStatus};

const MAX_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq, Eq)]
enum UpdateOutcome {
    Written,
    Unchanged,
}

/// Single consumer of the policy status queue.
#[derive(TypedBuilder)]
pub struct StatusUpdaterService {
    store: Arc<dyn PolicyStatusStore>,
    receiver: mpsc::Receiver<PolicyStatusUpdate>,
    #[builder(default = 5)]
    max_retries: u32,
    #[builder(default = Duration::from_millis(100))]
    initial_backoff: Duration,
}

impl StatusUpdaterService {
    pub async fn start(mut self) -> crate::Result<()> {
        while let Some(update) = self.receiver.recv().await {
            let span = span!(Level::INFO, "StatusUpdaterService", kind = %update.kind, id = %update.key);
            match self.update_with_retries(&update, &span).instrument(span.clone()).await {
                Ok(UpdateOutcome::Written) => span.in_scope(|| info!("status updated")),
                Ok(UpdateOutcome::Unchanged) => span.in_scope(|| debug!("status unchanged")),
                Err(StatusStoreError::NotFound(_)) => span.in_scope(|| debug!("policy is gone, update dropped")),
                Err(e) => span.in_scope(|| warn!("status update failed {e}")),
            }
        }
        info!("Status updater stopped");
        crate::Result::<()>::Ok(())
    }

    async fn update_with_retries(&self, update: &PolicyStatusUpdate, span: &Span) -> Result<UpdateOutcome, StatusStoreError> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;
        loop {
            match self.update(update).await {
                Err(e) if e.is_retriable() && attempt < self.max_retries => {
                    attempt += 1;
                    span.in_scope(|| debug!("retrying status update {attempt}/{} in {backoff:?} {e}", self.max_retries));
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                },
                result => return result,
            }
        }
    }

    async fn update(&self, update: &PolicyStatusUpdate) -> Result<UpdateOutcome, StatusStoreError> {
        let stored = self.store.read(update.kind, &update.key).await?;
        let ancestors = merge_ancestors(&stored.ancestors, &update.ancestors);
        if ancestors_equal(&stored.ancestors, &ancestors) {
            return Ok(UpdateOutcome::Unchanged);
        }
        self.store.write(update.kind, &update.key, StoredStatus { ancestors, resource_version: stored.resource_version }).await?;
        Ok(UpdateOutcome::Written)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicU32, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        apis::{policies::PolicyAncestorStatus, ParentReference},
        common::{
            conditions::{accepted_condition, PolicyConditionReason},
            ResourceKey,
        },
        policy::PolicyKind,
    };

    #[derive(Default)]
    struct InMemoryStatusStore {
        statuses: Mutex<HashMap<ResourceKey, StoredStatus>>,
        writes: AtomicU32,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl PolicyStatusStore for InMemoryStatusStore {
        async fn read(&self, _kind: PolicyKind, key: &ResourceKey) -> Result<StoredStatus, StatusStoreError> {
            let statuses = self.statuses.lock().unwrap();
            statuses.get(key).cloned().ok_or_else(|| StatusStoreError::NotFound(key.clone()))
        }

        async fn write(&self, _kind: PolicyKind, key: &ResourceKey, status: StoredStatus) -> Result<(), StatusStoreError> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                return Err(StatusStoreError::Conflict(key.clone()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.statuses.lock().unwrap().insert(key.clone(), status);
            Ok(())
        }
    }

    fn key() -> ResourceKey {
        ResourceKey { group: "gateway.flomesh.io".to_owned(), namespace: "default".to_owned(), name: "acl".to_owned(), kind: "AccessControlPolicy".to_owned() }
    }

    fn update(reason: PolicyConditionReason) -> PolicyStatusUpdate {
        PolicyStatusUpdate {
            kind: PolicyKind::AccessControl,
            key: key(),
            generation: Some(1),
            ancestors: vec![PolicyAncestorStatus {
                ancestor_ref: ParentReference::gateway("default", "gw"),
                controller_name: "fsm".to_owned(),
                conditions: vec![accepted_condition(reason, reason.as_str().to_owned(), Some(1))],
            }],
        }
    }

    async fn run(store: &Arc<InMemoryStatusStore>, updates: Vec<PolicyStatusUpdate>, max_retries: u32) {
        let (sender, receiver) = mpsc::channel(16);
        for update in updates {
            sender.send(update).await.unwrap();
        }
        drop(sender);
        let service = StatusUpdaterService::builder()
            .store(Arc::clone(store) as Arc<dyn PolicyStatusStore>)
            .receiver(receiver)
            .max_retries(max_retries)
            .initial_backoff(Duration::from_millis(1))
            .build();
        service.start().await.unwrap();
    }

    #[tokio::test]
    async fn unchanged_status_is_not_written() {
        let store = Arc::new(InMemoryStatusStore::default());
        store.statuses.lock().unwrap().insert(key(), StoredStatus { ancestors: vec![], resource_version: Some("1".to_owned()) });

        run(&store, vec![update(PolicyConditionReason::Accepted), update(PolicyConditionReason::Accepted)], 5).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);

        run(&store, vec![update(PolicyConditionReason::Conflicted)], 5).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
        let statuses = store.statuses.lock().unwrap();
        assert_eq!(statuses[&key()].ancestors[0].conditions[0].reason, "Conflicted");
        assert_eq!(statuses[&key()].resource_version.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn conflicts_are_retried() {
        let store = Arc::new(InMemoryStatusStore::default());
        store.statuses.lock().unwrap().insert(key(), StoredStatus::default());
        store.conflicts.store(2, Ordering::SeqCst);

        run(&store, vec![update(PolicyConditionReason::Accepted)], 5).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(store.conflicts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let store = Arc::new(InMemoryStatusStore::default());
        store.statuses.lock().unwrap().insert(key(), StoredStatus::default());
        store.conflicts.store(10, Ordering::SeqCst);

        run(&store, vec![update(PolicyConditionReason::Accepted)], 2).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        assert_eq!(store.conflicts.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn missing_policies_are_dropped() {
        let store = Arc::new(InMemoryStatusStore::default());
        run(&store, vec![update(PolicyConditionReason::Accepted)], 5).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }
}
