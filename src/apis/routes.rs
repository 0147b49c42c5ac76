//! Route objects come from the `gateway-api` bindings. Every route kind generates its own reference
//! types, [`GatewayRoute`] reads them into the kind independent shapes below.

pub use gateway_api::apis::experimental::{
    grpcroutes::{
        GRPCRoute, GRPCRouteRules, GRPCRouteRulesBackendRefs, GRPCRouteRulesBackendRefsFilters, GRPCRouteRulesBackendRefsFiltersType,
        GRPCRouteRulesFilters, GRPCRouteRulesFiltersType, GRPCRouteRulesMatches, GRPCRouteRulesMatchesMethod, GRPCRouteRulesMatchesMethodType,
        GRPCRouteRulesSessionPersistence,
    },
    httproutes::{
        HTTPRoute, HTTPRouteRules, HTTPRouteRulesBackendRefs, HTTPRouteRulesBackendRefsFilters, HTTPRouteRulesBackendRefsFiltersType, HTTPRouteRulesFilters,
        HTTPRouteRulesFiltersType, HTTPRouteRulesMatches, HTTPRouteRulesMatchesPath, HTTPRouteRulesMatchesPathType, HTTPRouteRulesSessionPersistence,
        HTTPRouteRulesSessionPersistenceType, HTTPRouteRulesTimeouts,
    },
    tcproutes::TCPRoute,
    tlsroutes::TLSRoute,
    udproutes::UDPRoute,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::{Resource, ResourceExt};
use serde::Serialize;

use super::{ParentReference, KIND_BACKEND, KIND_GRPC_ROUTE, KIND_HTTP_ROUTE, KIND_TCP_ROUTE, KIND_TLS_ROUTE, KIND_UDP_ROUTE};

/// Backend reference of any route rule or mirror filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteBackendRef {
    pub group: Option<String>,
    pub kind: Option<String>,
    pub name: String,
    pub namespace: Option<String>,
    pub port: Option<u16>,
    pub weight: Option<i32>,
}

/// Status a parent controller reported for a route.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteParentStatus {
    pub parent_ref: ParentReference,
    pub controller_name: String,
    pub conditions: Vec<Condition>,
}

macro_rules! parent_reference {
    ($parent:expr) => {
        ParentReference {
            group: $parent.group.clone(),
            kind: $parent.kind.clone(),
            namespace: $parent.namespace.clone(),
            name: $parent.name.clone(),
            section_name: $parent.section_name.clone(),
            port: $parent.port,
        }
    };
}

macro_rules! backend_reference {
    ($backend:expr, $weight:expr) => {
        RouteBackendRef {
            group: $backend.group.clone(),
            kind: $backend.kind.clone(),
            name: $backend.name.clone(),
            namespace: $backend.namespace.clone(),
            port: $backend.port.and_then(|port| u16::try_from(port).ok()),
            weight: $weight,
        }
    };
}

/// Common view over the route kinds attached to gateways.
pub trait GatewayRoute: Resource<DynamicType = ()> + ResourceExt + Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn parent_refs(&self) -> Vec<ParentReference>;

    fn hostnames(&self) -> &[String] {
        &[]
    }

    fn parents_status(&self) -> Vec<RouteParentStatus>;

    fn backend_refs(&self) -> Vec<RouteBackendRef>;
}

macro_rules! route_parents {
    () => {
        fn parent_refs(&self) -> Vec<ParentReference> {
            self.spec.parent_refs.iter().flatten().map(|parent| parent_reference!(parent)).collect()
        }

        fn parents_status(&self) -> Vec<RouteParentStatus> {
            self.status
                .iter()
                .flat_map(|status| status.parents.iter())
                .map(|parent| RouteParentStatus {
                    parent_ref: parent_reference!(parent.parent_ref),
                    controller_name: parent.controller_name.clone(),
                    conditions: parent.conditions.clone().unwrap_or_default(),
                })
                .collect()
        }
    };
}

impl GatewayRoute for HTTPRoute {
    const KIND: &'static str = KIND_HTTP_ROUTE;

    route_parents!();

    fn hostnames(&self) -> &[String] {
        self.spec.hostnames.as_deref().unwrap_or_default()
    }

    fn backend_refs(&self) -> Vec<RouteBackendRef> {
        let mut backend_refs = vec![];
        for rule in self.spec.rules.iter().flatten() {
            backend_refs.extend(rule.backend_refs.iter().flatten().map(|backend| backend_reference!(backend, backend.weight)));
            for filter in rule.filters.iter().flatten() {
                if let Some(mirror) = filter.request_mirror.as_ref() {
                    backend_refs.push(backend_reference!(mirror.backend_ref, None));
                }
            }
        }
        backend_refs
    }
}

impl GatewayRoute for GRPCRoute {
    const KIND: &'static str = KIND_GRPC_ROUTE;

    route_parents!();

    fn hostnames(&self) -> &[String] {
        self.spec.hostnames.as_deref().unwrap_or_default()
    }

    fn backend_refs(&self) -> Vec<RouteBackendRef> {
        self.spec.rules.iter().flatten().flat_map(|rule| rule.backend_refs.iter().flatten()).map(|backend| backend_reference!(backend, backend.weight)).collect()
    }
}

/// Name and backend references of a layer four route rule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct L4RouteRule {
    pub name: Option<String>,
    pub backend_refs: Vec<RouteBackendRef>,
}

/// Layer four routes forward to their backends without looking at the traffic.
pub trait L4Route: GatewayRoute {
    fn l4_rules(&self) -> Vec<L4RouteRule>;
}

macro_rules! l4_route {
    ($route:ty, $kind:expr, hostnames) => {
        l4_route!($route, $kind, {
            fn hostnames(&self) -> &[String] {
                self.spec.hostnames.as_deref().unwrap_or_default()
            }
        });
    };
    ($route:ty, $kind:expr) => {
        l4_route!($route, $kind, {});
    };
    ($route:ty, $kind:expr, { $($extra:tt)* }) => {
        impl GatewayRoute for $route {
            const KIND: &'static str = $kind;

            route_parents!();

            $($extra)*

            fn backend_refs(&self) -> Vec<RouteBackendRef> {
                self.l4_rules().into_iter().flat_map(|rule| rule.backend_refs).collect()
            }
        }

        impl L4Route for $route {
            fn l4_rules(&self) -> Vec<L4RouteRule> {
                self.spec
                    .rules
                    .iter()
                    .map(|rule| L4RouteRule {
                        name: rule.name.clone(),
                        backend_refs: rule.backend_refs.iter().flatten().map(|backend| backend_reference!(backend, backend.weight)).collect(),
                    })
                    .collect()
            }
        }
    };
}

l4_route!(TCPRoute, KIND_TCP_ROUTE);
l4_route!(UDPRoute, KIND_UDP_ROUTE);
l4_route!(TLSRoute, KIND_TLS_ROUTE, hostnames);

/// A route filter that may mirror traffic to another backend.
pub trait MirrorFilter: Clone + Serialize {
    fn is_mirror(&self) -> bool;

    fn mirror_backend_ref(&self) -> Option<RouteBackendRef>;

    /// Points the mirror at a compiled backend.
    fn set_mirror_backend(&mut self, backend_name: String);
}

macro_rules! mirror_filter {
    ($filter:ty, $filter_type:ident) => {
        impl MirrorFilter for $filter {
            fn is_mirror(&self) -> bool {
                matches!(self.r#type, $filter_type::RequestMirror)
            }

            fn mirror_backend_ref(&self) -> Option<RouteBackendRef> {
                self.request_mirror.as_ref().map(|mirror| backend_reference!(mirror.backend_ref, None))
            }

            fn set_mirror_backend(&mut self, backend_name: String) {
                if let Some(mirror) = self.request_mirror.as_mut() {
                    mirror.backend_ref.group = None;
                    mirror.backend_ref.kind = Some(KIND_BACKEND.to_owned());
                    mirror.backend_ref.name = backend_name;
                    mirror.backend_ref.namespace = None;
                    mirror.backend_ref.port = None;
                }
            }
        }
    };
}

mirror_filter!(HTTPRouteRulesFilters, HTTPRouteRulesFiltersType);
mirror_filter!(HTTPRouteRulesBackendRefsFilters, HTTPRouteRulesBackendRefsFiltersType);
mirror_filter!(GRPCRouteRulesFilters, GRPCRouteRulesFiltersType);
mirror_filter!(GRPCRouteRulesBackendRefsFilters, GRPCRouteRulesBackendRefsFiltersType);

/// Route level backend reference together with the filters it carries.
pub trait WeightedBackendRef {
    type Filter: MirrorFilter;

    fn backend_ref(&self) -> RouteBackendRef;

    fn filters(&self) -> &[Self::Filter];
}

impl WeightedBackendRef for HTTPRouteRulesBackendRefs {
    type Filter = HTTPRouteRulesBackendRefsFilters;

    fn backend_ref(&self) -> RouteBackendRef {
        backend_reference!(self, self.weight)
    }

    fn filters(&self) -> &[Self::Filter] {
        self.filters.as_deref().unwrap_or_default()
    }
}

impl WeightedBackendRef for GRPCRouteRulesBackendRefs {
    type Filter = GRPCRouteRulesBackendRefsFilters;

    fn backend_ref(&self) -> RouteBackendRef {
        backend_reference!(self, self.weight)
    }

    fn filters(&self) -> &[Self::Filter] {
        self.filters.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTE: &str = r#"
apiVersion: gateway.networking.k8s.io/v1
kind: HTTPRoute
metadata:
  name: web
  namespace: apps
spec:
  parentRefs:
    - name: edge
      namespace: infra
      sectionName: http
  hostnames:
    - web.example.com
  rules:
    - backendRefs:
        - name: web
          port: 8080
          weight: 3
      filters:
        - type: RequestMirror
          requestMirror:
            backendRef:
              name: shadow
              port: 9090
status:
  parents:
    - parentRef:
        name: edge
        namespace: infra
      controllerName: flomesh.io/gateway-controller
      conditions:
        - type: Accepted
          status: "True"
          reason: Accepted
          message: ""
          lastTransitionTime: "2026-01-01T00:00:00Z"
"#;

    #[test]
    fn http_route_reads() {
        let route: HTTPRoute = serde_yaml::from_str(ROUTE).unwrap();
        assert_eq!(route.parent_refs(), vec![ParentReference {
            name: "edge".to_owned(),
            namespace: Some("infra".to_owned()),
            section_name: Some("http".to_owned()),
            ..Default::default()
        }]);
        assert_eq!(route.hostnames(), ["web.example.com"]);

        let backend_refs = route.backend_refs();
        assert_eq!(backend_refs.len(), 2);
        assert_eq!((backend_refs[0].name.as_str(), backend_refs[0].port, backend_refs[0].weight), ("web", Some(8080), Some(3)));
        assert_eq!((backend_refs[1].name.as_str(), backend_refs[1].port, backend_refs[1].weight), ("shadow", Some(9090), None));

        let parents_status = route.parents_status();
        assert_eq!(parents_status.len(), 1);
        assert_eq!(parents_status[0].parent_ref.name, "edge");
        assert_eq!(parents_status[0].conditions[0].type_, "Accepted");
    }

    #[test]
    fn mirror_filters_point_at_backends() {
        let route: HTTPRoute = serde_yaml::from_str(ROUTE).unwrap();
        let mut filter = route.spec.rules.unwrap_or_default()[0].filters.clone().unwrap_or_default().remove(0);
        assert!(filter.is_mirror());
        filter.set_mirror_backend("apps-shadow-9090".to_owned());
        let mirror = filter.mirror_backend_ref().unwrap();
        assert_eq!(mirror.kind.as_deref(), Some(KIND_BACKEND));
        assert_eq!(mirror.name, "apps-shadow-9090");
        assert_eq!(mirror.port, None);
    }
}
