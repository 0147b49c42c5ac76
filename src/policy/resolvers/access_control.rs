use super::resolve;
use crate::apis::policies::AccessControlConfig;

pub const DEFAULT_STATUS_CODE: i32 = 403;

pub fn compute(config: Option<&AccessControlConfig>, default_config: Option<&AccessControlConfig>) -> Option<AccessControlConfig> {
    resolve(config, default_config, set_defaults, merge)
}

fn merge(mut config: AccessControlConfig, default_config: &AccessControlConfig) -> AccessControlConfig {
    if config.enable_xff.is_none() {
        config.enable_xff = default_config.enable_xff;
    }
    if config.message.is_none() {
        config.message.clone_from(&default_config.message);
    }
    if config.status_code.is_none() {
        config.status_code = default_config.status_code;
    }
    config
}

fn set_defaults(mut config: AccessControlConfig) -> AccessControlConfig {
    config.enable_xff.get_or_insert(false);
    config.status_code.get_or_insert(DEFAULT_STATUS_CODE);
    config.message.get_or_insert_with(String::new);
    config
}
