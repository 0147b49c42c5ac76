use super::resolve;
use crate::apis::policies::BackendTLSPolicyValidation;

/// Validation applying to one service port. `config` comes from a target naming the port with
/// `sectionName`, `default_config` from a target naming the whole service.
pub fn compute(config: Option<&BackendTLSPolicyValidation>, default_config: Option<&BackendTLSPolicyValidation>) -> Option<BackendTLSPolicyValidation> {
    resolve(config, default_config, |config| config, merge)
}

fn merge(mut config: BackendTLSPolicyValidation, default_config: &BackendTLSPolicyValidation) -> BackendTLSPolicyValidation {
    if config.ca_certificate_refs.is_empty() {
        config.ca_certificate_refs.clone_from(&default_config.ca_certificate_refs);
    }
    if config.well_known_ca_certificates.is_none() {
        config.well_known_ca_certificates.clone_from(&default_config.well_known_ca_certificates);
    }
    if config.hostname.is_none() {
        config.hostname.clone_from(&default_config.hostname);
    }
    config
}
