use thiserror::Error;

use super::ResourceKey;

/// A referenced object can not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: String },
    #[error("reference from {from} to {kind} {to} is not permitted")]
    NotPermitted { from: String, kind: String, to: String },
    #[error("port {port} is not found in {key}")]
    PortNotFound { key: String, port: u16 },
    #[error("{key} has no {entry} entry")]
    MissingEntry { key: String, entry: String },
}

impl ReferenceError {
    pub fn not_found(kind: &str, key: &ResourceKey) -> Self {
        ReferenceError::NotFound { kind: kind.to_owned(), key: key.namespaced_name() }
    }
}

/// A reference or object is malformed or unsupported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unsupported group {group} and kind {kind}")]
    UnsupportedKind { group: String, kind: String },
    #[error("port is not specified in the reference to {key}")]
    MissingPort { key: String },
    #[error("secret {key} is not of type kubernetes.io/tls")]
    NotTlsSecret { key: String },
    #[error("service {key} of type ExternalName is not supported")]
    ExternalNameService { key: String },
}
