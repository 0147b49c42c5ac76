use std::sync::Arc;

use tracing::debug;

use crate::apis::ReferenceGrant;

/// Side of a cross namespace reference that holds the reference.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FromResourceKey {
    pub group: String,
    pub kind: String,
    pub namespace: String,
}

/// Side of a cross namespace reference that is being referred to.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ToResourceKey {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// Checks whether a grant in the target namespace allows the reference.
pub fn valid_cross_namespace_ref(reference_grants: &[Arc<ReferenceGrant>], from: &FromResourceKey, to: &ToResourceKey) -> bool {
    reference_grants.iter().any(|grant| {
        if grant.metadata.namespace.as_deref() != Some(to.namespace.as_str()) {
            return false;
        }
        let from_allowed = grant.spec.from.iter().any(|f| f.namespace == from.namespace && f.group == from.group && f.kind == from.kind);
        if !from_allowed {
            debug!("ReferenceGrant from {}/{}/{} is not allowed", from.group, from.kind, from.namespace);
            return false;
        }
        let to_allowed = grant
            .spec
            .to
            .iter()
            .any(|t| t.group == to.group && t.kind == to.kind && t.name.as_ref().map_or(true, |name| name.is_empty() || *name == to.name));
        if !to_allowed {
            debug!("ReferenceGrant to {}/{}/{}/{} is not allowed", to.group, to.kind, to.namespace, to.name);
        }
        to_allowed
    })
}

#[cfg(test)]
mod tests {
    use kube::api::ObjectMeta;

    use super::*;
    use crate::apis::{ReferenceGrantFrom, ReferenceGrantSpec, ReferenceGrantTo};

    fn grant(namespace: &str, to_name: Option<&str>) -> Arc<ReferenceGrant> {
        Arc::new(ReferenceGrant {
            metadata: ObjectMeta { name: Some("grant".to_owned()), namespace: Some(namespace.to_owned()), ..Default::default() },
            spec: ReferenceGrantSpec {
                from: vec![ReferenceGrantFrom { group: "gateway.networking.k8s.io".to_owned(), kind: "HTTPRoute".to_owned(), namespace: "apps".to_owned() }],
                to: vec![ReferenceGrantTo { group: String::new(), kind: "Service".to_owned(), name: to_name.map(ToOwned::to_owned) }],
            },
        })
    }

    #[test]
    fn cross_namespace_reference_grants() {
        let from = FromResourceKey { group: "gateway.networking.k8s.io".to_owned(), kind: "HTTPRoute".to_owned(), namespace: "apps".to_owned() };
        let to = ToResourceKey { group: String::new(), kind: "Service".to_owned(), namespace: "backends".to_owned(), name: "echo".to_owned() };

        assert!(!valid_cross_namespace_ref(&[], &from, &to));
        assert!(valid_cross_namespace_ref(&[grant("backends", None)], &from, &to));
        assert!(valid_cross_namespace_ref(&[grant("backends", Some("echo"))], &from, &to));
        assert!(!valid_cross_namespace_ref(&[grant("backends", Some("other"))], &from, &to));
        assert!(!valid_cross_namespace_ref(&[grant("apps", None)], &from, &to));
    }
}
