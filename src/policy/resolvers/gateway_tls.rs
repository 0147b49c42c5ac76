use super::resolve;
use crate::apis::policies::GatewayTLSConfig;

pub fn compute(config: Option<&GatewayTLSConfig>, default_config: Option<&GatewayTLSConfig>) -> Option<GatewayTLSConfig> {
    resolve(config, default_config, set_defaults, |mut config, default_config| {
        config.m_tls = config.m_tls.or(default_config.m_tls);
        config
    })
}

fn set_defaults(mut config: GatewayTLSConfig) -> GatewayTLSConfig {
    config.m_tls = Some(config.m_tls.unwrap_or(false));
    config
}
