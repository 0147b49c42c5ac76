use k8s_openapi::api::{core::v1::Service, discovery::v1::EndpointSlice};

use super::*;
use crate::apis::{
    policies::{RateLimitPolicy, RetryPolicy, UpstreamTLSPolicy},
    HTTPRoute, TCPRoute,
};

const GATEWAY: &str = r#"
apiVersion: gateway.networking.k8s.io/v1
kind: Gateway
metadata:
  name: edge
  namespace: apps
spec:
  gatewayClassName: fsm
  listeners:
    - name: http
      port: 80
      protocol: HTTP
    - name: tcp
      port: 9000
      protocol: TCP
    - name: broken
      port: 8080
      protocol: HTTP
status:
  conditions:
    - type: Accepted
      status: "True"
      reason: Accepted
      message: ""
      lastTransitionTime: "2026-01-01T00:00:00Z"
  listeners:
    - name: http
      attachedRoutes: 1
      supportedKinds: []
      conditions:
        - type: Accepted
          status: "True"
          reason: Accepted
          message: ""
          lastTransitionTime: "2026-01-01T00:00:00Z"
        - type: Programmed
          status: "True"
          reason: Programmed
          message: ""
          lastTransitionTime: "2026-01-01T00:00:00Z"
    - name: tcp
      attachedRoutes: 1
      supportedKinds: []
      conditions:
        - type: Accepted
          status: "True"
          reason: Accepted
          message: ""
          lastTransitionTime: "2026-01-01T00:00:00Z"
        - type: Programmed
          status: "True"
          reason: Programmed
          message: ""
          lastTransitionTime: "2026-01-01T00:00:00Z"
"#;

const HTTP_ROUTE: &str = r#"
apiVersion: gateway.networking.k8s.io/v1
kind: HTTPRoute
metadata:
  name: web
  namespace: apps
spec:
  parentRefs:
    - name: edge
  hostnames:
    - web.example.com
  rules:
    - name: main
      matches:
        - path:
            type: PathPrefix
            value: /
        - path:
            type: Exact
            value: /login
      backendRefs:
        - name: web
          port: 80
    - name: empty
      backendRefs:
        - name: web
          port: 81
status:
  parents:
    - parentRef:
        name: edge
      controllerName: flomesh.io/gateway-controller
      conditions:
        - type: Accepted
          status: "True"
          reason: Accepted
          message: ""
          lastTransitionTime: "2026-01-01T00:00:00Z"
"#;

const TCP_ROUTE: &str = r#"
apiVersion: gateway.networking.k8s.io/v1alpha2
kind: TCPRoute
metadata:
  name: db
  namespace: apps
spec:
  parentRefs:
    - name: edge
      sectionName: tcp
  rules:
    - backendRefs:
        - name: web
          port: 81
status:
  parents:
    - parentRef:
        name: edge
        sectionName: tcp
      controllerName: flomesh.io/gateway-controller
      conditions:
        - type: Accepted
          status: "True"
          reason: Accepted
          message: ""
          lastTransitionTime: "2026-01-01T00:00:00Z"
"#;

const SERVICE: &str = r#"
apiVersion: v1
kind: Service
metadata:
  name: web
  namespace: apps
spec:
  selector:
    app: web
  ports:
    - name: http
      port: 80
      targetPort: 8080
    - name: idle
      port: 81
      targetPort: 8081
"#;

const ENDPOINT_SLICE: &str = r#"
apiVersion: discovery.k8s.io/v1
kind: EndpointSlice
metadata:
  name: web-abc
  namespace: apps
  labels:
    kubernetes.io/service-name: web
addressType: IPv4
endpoints:
  - addresses:
      - 10.0.0.2
    conditions:
      ready: true
  - addresses:
      - 10.0.0.1
ports:
  - name: http
    port: 8080
"#;

const RATE_LIMIT: &str = r#"
apiVersion: gateway.flomesh.io/v1alpha1
kind: RateLimitPolicy
metadata:
  name: edge-bps
  namespace: apps
spec:
  targetRefs:
    - group: gateway.networking.k8s.io
      kind: Gateway
      name: edge
  ports:
    - port: 80
      bps: 100000
status:
  ancestors:
    - ancestorRef:
        group: gateway.networking.k8s.io
        kind: Gateway
        namespace: apps
        name: edge
      controllerName: flomesh.io/gateway-controller
      conditions:
        - type: Accepted
          status: "True"
          reason: Accepted
          message: ""
          lastTransitionTime: "2026-01-01T00:00:00Z"
"#;

const RETRY: &str = r#"
apiVersion: gateway.flomesh.io/v1alpha1
kind: RetryPolicy
metadata:
  name: web-retry
  namespace: apps
spec:
  targetRefs:
    - group: ""
      kind: Service
      name: web
  ports:
    - port: 80
      config:
        retryOn:
          - 5xx
        numRetries: 2
status:
  ancestors:
    - ancestorRef:
        group: ""
        kind: Service
        namespace: apps
        name: web
      controllerName: flomesh.io/gateway-controller
      conditions:
        - type: Accepted
          status: "True"
          reason: Accepted
          message: ""
          lastTransitionTime: "2026-01-01T00:00:00Z"
"#;

fn cache() -> (Cache, Gateway) {
    let cache = Cache::new();
    let gateway: Gateway = serde_yaml::from_str(GATEWAY).unwrap();
    let _ = cache.save(gateway.clone());
    let _ = cache.save(serde_yaml::from_str::<HTTPRoute>(HTTP_ROUTE).unwrap());
    let _ = cache.save(serde_yaml::from_str::<TCPRoute>(TCP_ROUTE).unwrap());
    let _ = cache.save(serde_yaml::from_str::<Service>(SERVICE).unwrap());
    let _ = cache.save(serde_yaml::from_str::<EndpointSlice>(ENDPOINT_SLICE).unwrap());
    let _ = cache.save(serde_yaml::from_str::<RateLimitPolicy>(RATE_LIMIT).unwrap());
    let _ = cache.save(serde_yaml::from_str::<RetryPolicy>(RETRY).unwrap());
    (cache, gateway)
}

fn resources_of_kind<'a>(config: &'a ConfigSpec, kind: &str) -> Vec<&'a Resource> {
    config.resources.iter().filter(|resource| resource.kind() == kind).collect()
}

#[test]
fn generates_listeners_routes_and_backends() {
    let (cache, gateway) = cache();
    let options = GeneratorOptions::builder().build();
    let config = ConfigGenerator::new(&gateway, &cache, &options).generate().unwrap();

    let Some(Resource::Gateway(compiled_gateway)) = config.resources.first() else {
        panic!("gateway must come first");
    };
    let listeners: Vec<_> = compiled_gateway.spec.listeners.iter().map(|listener| listener.name.as_str()).collect();
    assert_eq!(listeners, vec!["http", "tcp"]);
    assert_eq!(compiled_gateway.spec.listeners[0].rate_limit, Some(100_000));
    assert_eq!(compiled_gateway.spec.listeners[1].rate_limit, None);

    let routes = resources_of_kind(&config, "HTTPRoute");
    assert_eq!(routes.len(), 1);
    let Resource::HttpRoute(route) = routes[0] else {
        panic!("expected a http route");
    };
    assert_eq!(route.spec.hostnames, vec!["web.example.com".to_owned()]);
    assert_eq!(route.spec.rules.len(), 2);
    let paths: Vec<_> = route.spec.rules[0]
        .matches
        .iter()
        .map(|route_match| route_match.route_match.path.as_ref().and_then(|path| path.value.clone()).unwrap_or_default())
        .collect();
    assert_eq!(paths, vec!["/login".to_owned(), "/".to_owned()]);
    assert_eq!(route.spec.rules[0].backend_refs[0].name, "apps-web-80");

    let backends = resources_of_kind(&config, "Backend");
    assert_eq!(backends.len(), 1);
    let Resource::Backend(backend) = backends[0] else {
        panic!("expected a backend");
    };
    assert_eq!(backend.metadata.name, "apps-web-80");
    let addresses: Vec<_> = backend.spec.targets.iter().map(|target| target.address.as_str()).collect();
    assert_eq!(addresses, vec!["10.0.0.1", "10.0.0.2"]);

    // port 81 has no endpoints, so the tcp rule is gone and the route with it
    assert!(resources_of_kind(&config, "TCPRoute").is_empty());

    let retries = resources_of_kind(&config, "RetryPolicy");
    assert_eq!(retries.len(), 1);
    let Resource::RetryPolicy(retry) = retries[0] else {
        panic!("expected a retry policy");
    };
    assert_eq!(retry.spec.target_refs.len(), 1);
    assert_eq!(retry.spec.target_refs[0].name, "apps-web-80");
    assert_eq!(retry.spec.config.ports.len(), 1);
    assert_eq!(retry.spec.config.ports[0].port, 80);
}

#[test]
fn rules_without_backends_are_dropped_on_request() {
    let (cache, gateway) = cache();
    let options = GeneratorOptions::builder().drop_route_rule_if_no_available_backends(true).build();
    let config = ConfigGenerator::new(&gateway, &cache, &options).generate().unwrap();

    let Resource::HttpRoute(route) = resources_of_kind(&config, "HTTPRoute")[0] else {
        panic!("expected a http route");
    };
    let names: Vec<_> = route.spec.rules.iter().map(|rule| rule.name.clone().unwrap_or_default()).collect();
    assert_eq!(names, vec!["main".to_owned()]);
}

#[test]
fn version_is_stable_across_passes() {
    let (cache, gateway) = cache();
    let options = GeneratorOptions::builder().build();
    let first = ConfigGenerator::new(&gateway, &cache, &options).generate().unwrap();
    let second = ConfigGenerator::new(&gateway, &cache, &options).generate().unwrap();
    assert_eq!(first.version, second.version);
    assert_eq!(first, second);

    let _ = cache.delete::<RetryPolicy>(&ResourceKey {
        group: "gateway.flomesh.io".to_owned(),
        namespace: "apps".to_owned(),
        name: "web-retry".to_owned(),
        kind: "RetryPolicy".to_owned(),
    });
    let third = ConfigGenerator::new(&gateway, &cache, &options).generate().unwrap();
    assert_ne!(first.version, third.version);
}

#[test]
fn routes_without_accepted_parents_are_skipped() {
    let (cache, gateway) = cache();
    let mut route: HTTPRoute = serde_yaml::from_str(HTTP_ROUTE).unwrap();
    route.status = None;
    let _ = cache.save(route);

    let options = GeneratorOptions::builder().build();
    let config = ConfigGenerator::new(&gateway, &cache, &options).generate().unwrap();
    assert!(resources_of_kind(&config, "HTTPRoute").is_empty());
    assert!(resources_of_kind(&config, "Backend").is_empty());
}

const UPSTREAM_TLS: &str = r#"
apiVersion: gateway.flomesh.io/v1alpha1
kind: UpstreamTLSPolicy
metadata:
  name: web-tls
  namespace: apps
spec:
  targetRefs:
    - group: ""
      kind: Service
      name: web
  ports:
    - port: 80
      config:
        certificateRef:
          name: web-cert
        mTLS: true
status:
  ancestors:
    - ancestorRef:
        group: ""
        kind: Service
        namespace: apps
        name: web
      controllerName: flomesh.io/gateway-controller
      conditions:
        - type: Accepted
          status: "True"
          reason: Accepted
          message: ""
          lastTransitionTime: "2026-01-01T00:00:00Z"
"#;

fn web_cert() -> k8s_openapi::api::core::v1::Secret {
    k8s_openapi::api::core::v1::Secret {
        metadata: kube::api::ObjectMeta { name: Some("web-cert".to_owned()), namespace: Some("apps".to_owned()), ..Default::default() },
        type_: Some("kubernetes.io/tls".to_owned()),
        data: Some(BTreeMap::from([
            ("tls.crt".to_owned(), k8s_openapi::ByteString(b"CERT".to_vec())),
            ("tls.key".to_owned(), k8s_openapi::ByteString(b"KEY".to_vec())),
            ("ca.crt".to_owned(), k8s_openapi::ByteString(b"CA".to_vec())),
        ])),
        ..Default::default()
    }
}

fn backend<'a>(config: &'a ConfigSpec, name: &str) -> Option<&'a model::Backend> {
    config.resources.iter().find_map(|resource| match resource {
        Resource::Backend(backend) if backend.metadata.name == name => Some(backend),
        _ => None,
    })
}

#[test]
fn upstream_tls_certificates_land_in_secrets() {
    let (cache, gateway) = cache();
    let _ = cache.save(serde_yaml::from_str::<UpstreamTLSPolicy>(UPSTREAM_TLS).unwrap());
    let _ = cache.save(web_cert());

    let options = GeneratorOptions::builder().build();
    let config = ConfigGenerator::new(&gateway, &cache, &options).generate().unwrap();

    let upstream_tls = backend(&config, "apps-web-80").and_then(|backend| backend.spec.upstream_tls.clone()).unwrap();
    assert_eq!(upstream_tls.m_tls, Some(true));
    assert_eq!(config.secrets.get(&upstream_tls.certificate.cert_file).map(String::as_str), Some("CERT"));
    assert_eq!(config.secrets.get(&upstream_tls.certificate.key_file).map(String::as_str), Some("KEY"));
    assert_eq!(upstream_tls.ca_file.as_ref().and_then(|ca_file| config.secrets.get(ca_file)).map(String::as_str), Some("CA"));
}

#[test]
fn upstream_tls_without_secret_is_dropped() {
    let (cache, gateway) = cache();
    let _ = cache.save(serde_yaml::from_str::<UpstreamTLSPolicy>(UPSTREAM_TLS).unwrap());

    let options = GeneratorOptions::builder().build();
    let config = ConfigGenerator::new(&gateway, &cache, &options).generate().unwrap();

    assert_eq!(backend(&config, "apps-web-80").map(|backend| backend.spec.upstream_tls.is_none()), Some(true));
    assert!(config.secrets.is_empty());
}

#[test]
fn backend_policies_cover_backends_without_targets() {
    let (cache, gateway) = cache();
    let mut retry: RetryPolicy = serde_yaml::from_str(RETRY).unwrap();
    let mut idle_port = retry.spec.ports[0].clone();
    idle_port.port = 81;
    retry.spec.ports.push(idle_port);
    let _ = cache.save(retry);

    let options = GeneratorOptions::builder().build();
    let config = ConfigGenerator::new(&gateway, &cache, &options).generate().unwrap();

    // no endpoints on port 81, so no backend but still a retry entry
    assert!(backend(&config, "apps-web-81").is_none());
    let Resource::RetryPolicy(retry) = resources_of_kind(&config, "RetryPolicy")[0] else {
        panic!("expected a retry policy");
    };
    let mut targets: Vec<_> = retry.spec.target_refs.iter().map(|target_ref| target_ref.name.as_str()).collect();
    targets.sort_unstable();
    assert_eq!(targets, vec!["apps-web-80", "apps-web-81"]);
}
