use super::resolve;
use crate::apis::policies::UpstreamTLSConfig;

/// The certificate reference is required on every entry, so only mTLS is inherited.
pub fn compute(config: Option<&UpstreamTLSConfig>, default_config: Option<&UpstreamTLSConfig>) -> Option<UpstreamTLSConfig> {
    resolve(config, default_config, set_defaults, |mut config, default_config| {
        config.m_tls = config.m_tls.or(default_config.m_tls);
        config
    })
}

fn set_defaults(mut config: UpstreamTLSConfig) -> UpstreamTLSConfig {
    config.m_tls = Some(config.m_tls.unwrap_or(false));
    config
}
