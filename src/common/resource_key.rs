use std::fmt::Display;

use kube::{Resource, ResourceExt};

use crate::apis::{policies::PolicyTargetReference, ParentReference, RouteBackendRef, CORE_GROUP, GATEWAY_API_GROUP, KIND_GATEWAY, KIND_SERVICE};

pub const DEFAULT_GROUP_NAME: &str = GATEWAY_API_GROUP;
pub const DEFAULT_NAMESPACE_NAME: &str = "default";
pub const DEFAULT_KIND_NAME: &str = KIND_GATEWAY;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ResourceKey {
    pub group: String,
    pub namespace: String,
    pub name: String,
    pub kind: String,
}

impl ResourceKey {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned(), ..Default::default() }
    }

    pub fn namespaced(name: &str, namespace: &str) -> Self {
        Self { name: name.to_owned(), namespace: namespace.to_owned(), ..Default::default() }
    }

    pub fn from_resource<R>(resource: &R) -> Self
    where
        R: Resource<DynamicType = ()>,
    {
        Self {
            group: R::group(&()).into_owned(),
            namespace: resource.meta().namespace.clone().unwrap_or_else(|| DEFAULT_NAMESPACE_NAME.to_owned()),
            name: resource.meta().name.clone().unwrap_or_default(),
            kind: R::kind(&()).into_owned(),
        }
    }

    /// Key of the object a policy points at, with the namespace defaulting to the policy's own.
    pub fn from_target_ref(target_ref: &PolicyTargetReference, policy_namespace: &str) -> Self {
        Self {
            group: target_ref.group.clone(),
            namespace: target_ref.namespace_or(policy_namespace),
            name: target_ref.name.clone(),
            kind: target_ref.kind.clone(),
        }
    }

    pub fn from_parent_ref(parent_ref: &ParentReference, route_namespace: &str) -> Self {
        Self {
            group: parent_ref.group.clone().unwrap_or_else(|| DEFAULT_GROUP_NAME.to_owned()),
            namespace: parent_ref.namespace.clone().unwrap_or_else(|| route_namespace.to_owned()),
            name: parent_ref.name.clone(),
            kind: parent_ref.kind.clone().unwrap_or_else(|| DEFAULT_KIND_NAME.to_owned()),
        }
    }

    pub fn from_backend_ref(backend_ref: &RouteBackendRef, route_namespace: &str) -> Self {
        Self {
            group: backend_ref.group.clone().unwrap_or_else(|| CORE_GROUP.to_owned()),
            namespace: backend_ref.namespace.clone().unwrap_or_else(|| route_namespace.to_owned()),
            name: backend_ref.name.clone(),
            kind: backend_ref.kind.clone().unwrap_or_else(|| KIND_SERVICE.to_owned()),
        }
    }

    pub fn namespaced_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl Default for ResourceKey {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP_NAME.to_owned(),
            namespace: DEFAULT_NAMESPACE_NAME.to_owned(),
            name: String::default(),
            kind: DEFAULT_KIND_NAME.to_owned(),
        }
    }
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.namespaced_name())
    }
}

/// Orders objects by creation time, oldest first, then by namespace and name.
pub fn sort_by_creation<R>(resources: &mut [std::sync::Arc<R>])
where
    R: ResourceExt,
{
    resources.sort_by(|this, other| {
        let this_created = this.meta().creation_timestamp.as_ref().map(|t| t.0);
        let other_created = other.meta().creation_timestamp.as_ref().map(|t| t.0);
        this_created
            .cmp(&other_created)
            .then_with(|| this.namespace().cmp(&other.namespace()))
            .then_with(|| this.name_any().cmp(&other.name_any()))
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::api::ObjectMeta;

    use super::*;
    use crate::apis::Gateway;

    fn gateway(name: &str, created: i64) -> Arc<Gateway> {
        Arc::new(Gateway {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("default".to_owned()),
                creation_timestamp: chrono::DateTime::from_timestamp(created, 0).map(Time),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn sorting_by_creation_then_name() {
        let mut gateways = vec![gateway("c", 20), gateway("b", 10), gateway("a", 20)];
        sort_by_creation(&mut gateways);
        let names: Vec<_> = gateways.iter().map(|g| g.name_any()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn target_ref_defaults_namespace() {
        let target_ref = PolicyTargetReference {
            group: GATEWAY_API_GROUP.to_owned(),
            kind: KIND_GATEWAY.to_owned(),
            name: "gw".to_owned(),
            ..Default::default()
        };
        let key = ResourceKey::from_target_ref(&target_ref, "policies");
        assert_eq!(key.namespace, "policies");
        assert_eq!(key.to_string(), "policies/gw");
    }
}
