use k8s_openapi::ByteString;

use super::GeneratorError;
use crate::{
    apis::{ObjectReference, ReferenceGrant, CORE_GROUP, KIND_CONFIG_MAP, KIND_SECRET},
    common::{
        reference_grants::{valid_cross_namespace_ref, FromResourceKey, ToResourceKey},
        ReferenceError, ResourceKey, ValidationError,
    },
    state::Cache,
};

pub const TLS_CERT_ENTRY: &str = "tls.crt";
pub const TLS_KEY_ENTRY: &str = "tls.key";
pub const CA_CERT_ENTRY: &str = "ca.crt";
pub const SECRET_TYPE_TLS: &str = "kubernetes.io/tls";

pub struct TlsCertificate {
    pub cert: String,
    pub key: String,
    /// Issuing CA, when the secret carries one.
    pub ca: Option<String>,
}

fn check_reference(cache: &Cache, from: &FromResourceKey, to: &ToResourceKey) -> Result<(), GeneratorError> {
    if from.namespace == to.namespace || valid_cross_namespace_ref(&cache.list::<ReferenceGrant>()?, from, to) {
        Ok(())
    } else {
        Err(ReferenceError::NotPermitted {
            from: format!("{} {}", from.kind, from.namespace),
            kind: to.kind.clone(),
            to: format!("{}/{}", to.namespace, to.name),
        }
        .into())
    }
}

fn to_key(reference: &ObjectReference, kind: &str, from: &FromResourceKey) -> ToResourceKey {
    ToResourceKey { group: reference.group_or_core().to_owned(), kind: kind.to_owned(), namespace: reference.namespace_or(&from.namespace), name: reference.name.clone() }
}

fn resource_key(to: &ToResourceKey) -> ResourceKey {
    ResourceKey { group: to.group.clone(), namespace: to.namespace.clone(), name: to.name.clone(), kind: to.kind.clone() }
}

fn decode(bytes: &ByteString) -> String {
    String::from_utf8_lossy(&bytes.0).into_owned()
}

/// Certificate and key of a `kubernetes.io/tls` secret.
pub fn resolve_tls_certificate(cache: &Cache, from: &FromResourceKey, reference: &ObjectReference) -> Result<TlsCertificate, GeneratorError> {
    let kind = reference.kind_or(KIND_SECRET);
    if reference.group_or_core() != CORE_GROUP || kind != KIND_SECRET {
        return Err(ValidationError::UnsupportedKind { group: reference.group_or_core().to_owned(), kind }.into());
    }
    let to = to_key(reference, KIND_SECRET, from);
    check_reference(cache, from, &to)?;

    let key = resource_key(&to);
    let secret = cache.get_secret(&to.namespace, &to.name)?.ok_or_else(|| ReferenceError::not_found(KIND_SECRET, &key))?;
    if secret.type_.as_deref() != Some(SECRET_TYPE_TLS) {
        return Err(ValidationError::NotTlsSecret { key: key.namespaced_name() }.into());
    }
    let entry = |name: &str| {
        secret
            .data
            .as_ref()
            .and_then(|data| data.get(name))
            .map(decode)
            .ok_or_else(|| ReferenceError::MissingEntry { key: key.namespaced_name(), entry: name.to_owned() })
    };
    let ca = secret.data.as_ref().and_then(|data| data.get(CA_CERT_ENTRY)).map(decode);
    Ok(TlsCertificate { cert: entry(TLS_CERT_ENTRY)?, key: entry(TLS_KEY_ENTRY)?, ca })
}

/// The `ca.crt` entry of a config map or a secret. Config maps are assumed when no kind is given.
pub fn resolve_ca_certificate(cache: &Cache, from: &FromResourceKey, reference: &ObjectReference) -> Result<String, GeneratorError> {
    let kind = reference.kind_or(KIND_CONFIG_MAP);
    if reference.group_or_core() != CORE_GROUP || (kind != KIND_CONFIG_MAP && kind != KIND_SECRET) {
        return Err(ValidationError::UnsupportedKind { group: reference.group_or_core().to_owned(), kind }.into());
    }
    let to = to_key(reference, &kind, from);
    check_reference(cache, from, &to)?;

    let key = resource_key(&to);
    let missing = || ReferenceError::MissingEntry { key: key.namespaced_name(), entry: CA_CERT_ENTRY.to_owned() };
    if kind == KIND_CONFIG_MAP {
        let config_map = cache.get_config_map(&to.namespace, &to.name)?.ok_or_else(|| ReferenceError::not_found(KIND_CONFIG_MAP, &key))?;
        Ok(config_map.data.as_ref().and_then(|data| data.get(CA_CERT_ENTRY)).cloned().ok_or_else(missing)?)
    } else {
        let secret = cache.get_secret(&to.namespace, &to.name)?.ok_or_else(|| ReferenceError::not_found(KIND_SECRET, &key))?;
        Ok(secret.data.as_ref().and_then(|data| data.get(CA_CERT_ENTRY)).map(decode).ok_or_else(missing)?)
    }
}
