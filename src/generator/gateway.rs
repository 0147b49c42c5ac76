// SPDX-FileCopyrightText: © 2026 Kubvernor authors
// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2026 Kubvernor authors.
//         This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, version 3.
//         This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//         You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
//
//

use kube::ResourceExt;
use tracing::{debug, warn};

use super::{
    certificates::{resolve_ca_certificate, resolve_tls_certificate},
    model::{
        CaFile, CertificateFiles, CompiledAddress, CompiledFrontendValidation, CompiledGateway, CompiledGatewayBackendTLS, CompiledGatewaySpec,
        CompiledListener, CompiledListenerTLS, ResourceMetadata,
    },
    skip_unresolved, ConfigGenerator, GeneratorError,
};
use crate::{
    apis::{
        gateway::backend_client_certificate_ref,
        policies::{AccessControlPolicy, GatewayTLSPolicy, RateLimitConfig, RateLimitPolicy},
        Listener, ListenerExt, ProtocolType, TLSModeType,
    },
    common::{gateway_api::valid_listeners, reference_grants::FromResourceKey},
    policy::{effective_config, ScopeDescriptor},
};

impl ConfigGenerator<'_> {
    pub(super) fn process_gateway(&mut self) -> Result<CompiledGateway, GeneratorError> {
        let gateway = self.gateway;
        let mut listeners = vec![];
        for listener in valid_listeners(gateway) {
            let Some(protocol) = listener.protocol_type() else {
                warn!("Listener {} has unsupported protocol {}", listener.name, listener.protocol);
                continue;
            };
            listeners.push(self.compile_listener(listener, protocol)?);
        }

        let backend_tls = match backend_client_certificate_ref(gateway) {
            Some(client_certificate_ref) => {
                let prefix = format!("gw-bk-tls-{}-{}", self.gateway_key.namespace, self.gateway_key.name);
                let certificate = skip_unresolved(resolve_tls_certificate(self.cache, &self.from_gateway(), &client_certificate_ref))?;
                certificate.map(|certificate| CompiledGatewayBackendTLS { client_certificate: self.add_certificate(&prefix, certificate) })
            },
            None => None,
        };

        Ok(CompiledGateway {
            metadata: ResourceMetadata::namespaced(&self.gateway_key.namespace, &gateway.name_any()),
            spec: CompiledGatewaySpec {
                gateway_class_name: gateway.spec.gateway_class_name.clone(),
                listeners,
                addresses: gateway
                    .spec
                    .addresses
                    .iter()
                    .flatten()
                    .map(|address| CompiledAddress { r#type: address.r#type.clone(), value: address.value.clone() })
                    .collect(),
                backend_tls,
            },
        })
    }

    fn compile_listener(&mut self, listener: &Listener, protocol: ProtocolType) -> Result<CompiledListener, GeneratorError> {
        let tls = match protocol {
            ProtocolType::Https | ProtocolType::Tls if listener.tls.is_some() => Some(self.compile_listener_tls(listener)?),
            _ => None,
        };

        let port = listener.port_number();
        let scope = ScopeDescriptor::Port(port);
        let rate_limit = match effective_config::<RateLimitPolicy>(self.cache, &self.gateway_key, &scope)? {
            Some(RateLimitConfig::Bps(bps)) => Some(bps),
            Some(RateLimitConfig::L7(_)) | None => None,
        };

        Ok(CompiledListener {
            name: listener.name.clone(),
            hostname: listener.hostname.clone(),
            port,
            protocol,
            tls,
            access_control: effective_config::<AccessControlPolicy>(self.cache, &self.gateway_key, &scope)?,
            rate_limit,
            gateway_tls: effective_config::<GatewayTLSPolicy>(self.cache, &self.gateway_key, &scope)?,
        })
    }

    fn compile_listener_tls(&mut self, listener: &Listener) -> Result<CompiledListenerTLS, GeneratorError> {
        let port = listener.port_number();
        let mode = listener.tls_mode();
        if mode == TLSModeType::Passthrough {
            return Ok(CompiledListenerTLS { mode, ..Default::default() });
        }

        let from = self.from_gateway();
        let mut certificates = vec![];
        for (index, certificate_ref) in listener.certificate_refs().iter().enumerate() {
            match skip_unresolved(resolve_tls_certificate(self.cache, &from, certificate_ref))? {
                Some(certificate) => certificates.push(self.add_certificate(&format!("tls-{port}-{index}"), certificate)),
                None => warn!("Certificate {} of listener port {port} is skipped", certificate_ref.name),
            }
        }

        let frontend_validation = if listener.tls.as_ref().is_some_and(|tls| tls.frontend_validation.is_some()) {
            let mut ca_certificates = vec![];
            for (index, ca_ref) in listener.ca_certificate_refs().iter().enumerate() {
                if let Some(ca) = skip_unresolved(resolve_ca_certificate(self.cache, &from, ca_ref))? {
                    let ca_file = format!("ca-{port}-{index}.crt");
                    self.secrets.insert(ca_file.clone(), ca);
                    ca_certificates.push(CaFile { ca_file });
                }
            }
            Some(CompiledFrontendValidation { ca_certificates })
        } else {
            None
        };

        debug!("Listener port {port} has {} certificates", certificates.len());
        Ok(CompiledListenerTLS { mode, certificates, frontend_validation, options: listener.tls_options() })
    }

    pub(super) fn add_certificate(&mut self, prefix: &str, certificate: super::certificates::TlsCertificate) -> CertificateFiles {
        let files = CertificateFiles { cert_file: format!("{prefix}.crt"), key_file: format!("{prefix}.key") };
        self.secrets.insert(files.cert_file.clone(), certificate.cert);
        self.secrets.insert(files.key_file.clone(), certificate.key);
        files
    }

    fn from_gateway(&self) -> FromResourceKey {
        FromResourceKey { group: self.gateway_key.group.clone(), kind: self.gateway_key.kind.clone(), namespace: self.gateway_key.namespace.clone() }
    }
}
