// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

//! Watch tasks keeping the [`Cache`] current and requesting builds for relevant changes.

use std::{fmt::Debug, sync::Arc};

use futures::{future::BoxFuture, FutureExt, StreamExt};
use k8s_openapi::api::{
    core::v1::{ConfigMap, Endpoints, Namespace, Secret, Service},
    discovery::v1::EndpointSlice,
};
use kube::{
    runtime::{watcher, WatchStreamExt},
    Api, Client, ResourceExt,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, span, warn, Level};
use typed_builder::TypedBuilder;

use crate::{
    apis::{
        policies::{
            AccessControlPolicy, BackendLBPolicy, BackendTLSPolicy, CircuitBreakingPolicy, FaultInjectionPolicy, GatewayTLSPolicy, HealthCheckPolicy,
            LoadBalancerPolicy, RateLimitPolicy, RetryPolicy, SessionStickyPolicy, UpstreamTLSPolicy,
        },
        GRPCRoute, Gateway, HTTPRoute, ReferenceGrant, ServiceImport, TCPRoute, TLSRoute, UDPRoute,
    },
    common::ResourceKey,
    services::BuildRequester,
    state::Cache,
    triggers::{ClusterObject, TriggerRegistry, Watched},
};

#[derive(Debug, PartialEq, Eq)]
enum ResourceState {
    New,
    Changed,
    VersionNotChanged,
    Deleted,
}

/// Applies watch events of every kind to the cache and the trigger registry.
#[derive(Clone, TypedBuilder)]
pub struct ResourceController {
    cache: Cache,
    triggers: Arc<TriggerRegistry>,
    build_requester: BuildRequester,
}

impl ResourceController {
    pub async fn watch<K>(self, api: Api<K>)
    where
        K: Watched + DeserializeOwned + Debug,
    {
        let mut stream = watcher(api, watcher::Config::default()).default_backoff().boxed();
        while let Some(event) = stream.next().await {
            match event {
                Ok(watcher::Event::Apply(resource) | watcher::Event::InitApply(resource)) => {
                    self.on_apply(resource);
                },
                Ok(watcher::Event::Delete(resource)) => {
                    self.on_delete(&resource);
                },
                Ok(watcher::Event::Init) => debug!("{} resync started", std::any::type_name::<K>()),
                Ok(watcher::Event::InitDone) => {
                    info!("{} resync done", std::any::type_name::<K>());
                    self.build_requester.request();
                },
                Err(e) => warn!("{} watch failed {e}", std::any::type_name::<K>()),
            }
        }
    }

    fn on_apply<K: Watched>(&self, resource: K) -> ResourceState {
        let key = ResourceKey::from_resource(&resource);
        let span = span!(Level::INFO, "ResourceController", resource = std::any::type_name::<K>(), id = %key);
        let _entered = span.enter();
        let object = resource.cluster_object();
        let version = resource.resource_version();
        let state = match self.cache.save(resource) {
            Ok(Some(previous)) if previous.resource_version().is_some() && previous.resource_version() == version => ResourceState::VersionNotChanged,
            Ok(Some(_)) => ResourceState::Changed,
            Ok(None) => ResourceState::New,
            Err(e) => {
                warn!("Can't store resource {e}");
                return ResourceState::VersionNotChanged;
            },
        };
        debug!("Resource state {state:?}");
        if state != ResourceState::VersionNotChanged {
            let rebuild = self.triggers.insert(&object, &self.cache);
            self.request_pass(&object, rebuild);
        }
        state
    }

    /// Policy statuses depend on the policy itself, so a policy change always gets at least a status pass.
    fn request_pass(&self, object: &ClusterObject, rebuild: bool) {
        if rebuild {
            self.build_requester.request();
        } else if matches!(object, ClusterObject::Policy(_)) {
            self.build_requester.request_status();
        }
    }

    fn on_delete<K: Watched>(&self, resource: &K) -> ResourceState {
        let key = ResourceKey::from_resource(resource);
        let span = span!(Level::INFO, "ResourceController", resource = std::any::type_name::<K>(), id = %key);
        let _entered = span.enter();
        if let Err(e) = self.cache.delete::<K>(&key) {
            warn!("Can't remove resource {e}");
        }
        let object = resource.cluster_object();
        let rebuild = self.triggers.delete(&object, &self.cache);
        self.request_pass(&object, rebuild);
        ResourceState::Deleted
    }
}

fn controller_task<K>(name: &'static str, controller: ResourceController, client: Client) -> BoxFuture<'static, crate::Result<()>>
where
    K: Watched + DeserializeOwned + Debug,
{
    async move {
        info!("{name} controller...started");
        controller.watch(Api::<K>::all(client)).await;
        info!("{name} controller...stopped");
        crate::Result::<()>::Ok(())
    }
    .boxed()
}

/// One watch task per kind the engine reads.
pub fn controller_tasks(controller: &ResourceController, client: &Client) -> Vec<BoxFuture<'static, crate::Result<()>>> {
    vec![
        controller_task::<Namespace>("Namespace", controller.clone(), client.clone()),
        controller_task::<ReferenceGrant>("Reference Grant", controller.clone(), client.clone()),
        controller_task::<Secret>("Secret", controller.clone(), client.clone()),
        controller_task::<ConfigMap>("Config Map", controller.clone(), client.clone()),
        controller_task::<Service>("Service", controller.clone(), client.clone()),
        controller_task::<ServiceImport>("Service Import", controller.clone(), client.clone()),
        controller_task::<Endpoints>("Endpoints", controller.clone(), client.clone()),
        controller_task::<EndpointSlice>("Endpoint Slice", controller.clone(), client.clone()),
        controller_task::<Gateway>("Gateway", controller.clone(), client.clone()),
        controller_task::<HTTPRoute>("HTTP Route", controller.clone(), client.clone()),
        controller_task::<GRPCRoute>("GRPC Route", controller.clone(), client.clone()),
        controller_task::<TCPRoute>("TCP Route", controller.clone(), client.clone()),
        controller_task::<UDPRoute>("UDP Route", controller.clone(), client.clone()),
        controller_task::<TLSRoute>("TLS Route", controller.clone(), client.clone()),
        controller_task::<AccessControlPolicy>("Access Control Policy", controller.clone(), client.clone()),
        controller_task::<CircuitBreakingPolicy>("Circuit Breaking Policy", controller.clone(), client.clone()),
        controller_task::<FaultInjectionPolicy>("Fault Injection Policy", controller.clone(), client.clone()),
        controller_task::<GatewayTLSPolicy>("Gateway TLS Policy", controller.clone(), client.clone()),
        controller_task::<HealthCheckPolicy>("Health Check Policy", controller.clone(), client.clone()),
        controller_task::<LoadBalancerPolicy>("Load Balancer Policy", controller.clone(), client.clone()),
        controller_task::<RateLimitPolicy>("Rate Limit Policy", controller.clone(), client.clone()),
        controller_task::<RetryPolicy>("Retry Policy", controller.clone(), client.clone()),
        controller_task::<SessionStickyPolicy>("Session Sticky Policy", controller.clone(), client.clone()),
        controller_task::<UpstreamTLSPolicy>("Upstream TLS Policy", controller.clone(), client.clone()),
        controller_task::<BackendTLSPolicy>("Backend TLS Policy", controller.clone(), client.clone()),
        controller_task::<BackendLBPolicy>("Backend LB Policy", controller.clone(), client.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use kube_core::ObjectMeta;

    use super::*;
    use crate::{services::PassRequests, status::StatusProcessor};

    const GATEWAY: &str = r#"
apiVersion: gateway.networking.k8s.io/v1
kind: Gateway
metadata:
  name: edge
  namespace: apps
  resourceVersion: "1"
spec:
  gatewayClassName: fsm
  listeners:
    - name: http
      port: 80
      protocol: HTTP
"#;

    const ORPHAN_POLICY: &str = r#"
apiVersion: gateway.flomesh.io/v1alpha1
kind: AccessControlPolicy
metadata:
  name: deny-all
  namespace: apps
  resourceVersion: "1"
  generation: 1
spec:
  targetRefs:
    - group: gateway.networking.k8s.io
      kind: Gateway
      name: missing
"#;

    fn controller() -> (ResourceController, PassRequests) {
        let (build_requester, pass_requests) = BuildRequester::channel();
        let controller = ResourceController::builder().cache(Cache::new()).triggers(Arc::new(TriggerRegistry::new())).build_requester(build_requester).build();
        (controller, pass_requests)
    }

    #[test]
    fn gateway_changes_request_builds() {
        let (controller, mut pass_requests) = controller();
        let gateway: Gateway = serde_yaml::from_str(GATEWAY).unwrap();

        assert_eq!(controller.on_apply(gateway.clone()), ResourceState::New);
        assert!(pass_requests.try_recv_build());

        assert_eq!(controller.on_apply(gateway.clone()), ResourceState::VersionNotChanged);
        assert!(!pass_requests.try_recv_build());

        let mut changed = gateway.clone();
        changed.metadata.resource_version = Some("2".to_owned());
        assert_eq!(controller.on_apply(changed), ResourceState::Changed);
        assert!(pass_requests.try_recv_build());

        assert_eq!(controller.on_delete(&gateway), ResourceState::Deleted);
        assert!(pass_requests.try_recv_build());
        assert!(controller.cache.list::<Gateway>().unwrap().is_empty());
    }

    #[test]
    fn unrelated_services_are_cached_without_builds() {
        let (controller, mut pass_requests) = controller();
        let service = Service {
            metadata: ObjectMeta { name: Some("web".to_owned()), namespace: Some("apps".to_owned()), ..Default::default() },
            ..Default::default()
        };

        assert_eq!(controller.on_apply(service), ResourceState::New);
        assert!(!pass_requests.try_recv_build());
        assert!(!pass_requests.try_recv_status());
        assert!(controller.cache.get_service("apps", "web").unwrap().is_some());
    }

    #[test]
    fn orphan_policy_gets_target_not_found() {
        let (controller, mut pass_requests) = controller();
        let policy: AccessControlPolicy = serde_yaml::from_str(ORPHAN_POLICY).unwrap();

        assert_eq!(controller.on_apply(policy), ResourceState::New);
        assert!(!pass_requests.try_recv_build());
        assert!(pass_requests.try_recv_status());

        let updates = StatusProcessor::new(&controller.cache, "flomesh.io/gateway-controller").process().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].key.name, "deny-all");
        let condition = &updates[0].ancestors[0].conditions[0];
        assert_eq!(condition.status, "False");
        assert_eq!(condition.reason, "TargetNotFound");
    }
}
