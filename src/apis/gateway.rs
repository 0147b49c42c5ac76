use std::{collections::BTreeMap, fmt::Display};

pub use gateway_api::apis::experimental::gateways::{
    Gateway, GatewayListeners as Listener, GatewayListenersAllowedRoutesNamespacesFrom as FromNamespaces,
    GatewayListenersAllowedRoutesNamespacesSelector as ListenerSelector, GatewayListenersTlsMode, GatewaySpec, GatewayStatus,
};
use serde::Serialize;
use thiserror::Error;

use super::ObjectReference;

/// Converts any of the generated secret or object reference types.
macro_rules! object_reference {
    ($reference:expr) => {
        ObjectReference {
            group: $reference.group.clone().into(),
            kind: $reference.kind.clone().into(),
            name: $reference.name.clone(),
            namespace: $reference.namespace.clone(),
        }
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProtocolType {
    Http,
    Https,
    Tls,
    Tcp,
    Udp,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown protocol {0}")]
pub struct UnknownProtocol(pub String);

impl TryFrom<&str> for ProtocolType {
    type Error = UnknownProtocol;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(match value.to_uppercase().as_str() {
            "HTTP" => Self::Http,
            "HTTPS" => Self::Https,
            "TLS" => Self::Tls,
            "TCP" => Self::Tcp,
            "UDP" => Self::Udp,
            _ => return Err(UnknownProtocol(value.to_owned())),
        })
    }
}

impl Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut protocol = format!("{self:?}");
        protocol.make_ascii_uppercase();
        write!(f, "{protocol}")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum TLSModeType {
    #[default]
    Terminate,
    Passthrough,
}

/// Normalized reads of a gateway listener.
pub trait ListenerExt {
    /// `None` for protocols the engine does not serve.
    fn protocol_type(&self) -> Option<ProtocolType>;

    fn port_number(&self) -> u16;

    fn tls_mode(&self) -> TLSModeType;

    fn certificate_refs(&self) -> Vec<ObjectReference>;

    fn ca_certificate_refs(&self) -> Vec<ObjectReference>;

    fn tls_options(&self) -> BTreeMap<String, String>;
}

impl ListenerExt for Listener {
    fn protocol_type(&self) -> Option<ProtocolType> {
        ProtocolType::try_from(self.protocol.as_str()).ok()
    }

    fn port_number(&self) -> u16 {
        u16::try_from(self.port).unwrap_or_default()
    }

    fn tls_mode(&self) -> TLSModeType {
        match self.tls.as_ref().and_then(|tls| tls.mode.as_ref()) {
            Some(GatewayListenersTlsMode::Passthrough) => TLSModeType::Passthrough,
            Some(GatewayListenersTlsMode::Terminate) | None => TLSModeType::Terminate,
        }
    }

    fn certificate_refs(&self) -> Vec<ObjectReference> {
        self.tls.iter().flat_map(|tls| tls.certificate_refs.iter().flatten()).map(|reference| object_reference!(reference)).collect()
    }

    fn ca_certificate_refs(&self) -> Vec<ObjectReference> {
        self.tls
            .iter()
            .filter_map(|tls| tls.frontend_validation.as_ref())
            .flat_map(|validation| validation.ca_certificate_refs.iter().flatten())
            .map(|reference| object_reference!(reference))
            .collect()
    }

    fn tls_options(&self) -> BTreeMap<String, String> {
        self.tls.as_ref().and_then(|tls| tls.options.clone()).unwrap_or_default()
    }
}

/// Client certificate the gateway presents to backends.
pub fn backend_client_certificate_ref(gateway: &Gateway) -> Option<ObjectReference> {
    gateway.spec.backend_tls.as_ref().and_then(|backend_tls| backend_tls.client_certificate_ref.as_ref()).map(|reference| object_reference!(reference))
}
