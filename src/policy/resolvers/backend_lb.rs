use super::resolve;
use crate::apis::routes::{HTTPRouteRulesSessionPersistence as SessionPersistence, HTTPRouteRulesSessionPersistenceType};

pub fn compute(config: Option<&SessionPersistence>, default_config: Option<&SessionPersistence>) -> Option<SessionPersistence> {
    resolve(config, default_config, set_defaults, merge)
}

fn merge(mut config: SessionPersistence, default_config: &SessionPersistence) -> SessionPersistence {
    if config.session_name.is_none() {
        config.session_name.clone_from(&default_config.session_name);
    }
    if config.absolute_timeout.is_none() {
        config.absolute_timeout.clone_from(&default_config.absolute_timeout);
    }
    if config.idle_timeout.is_none() {
        config.idle_timeout.clone_from(&default_config.idle_timeout);
    }
    if config.r#type.is_none() {
        config.r#type.clone_from(&default_config.r#type);
    }
    config
}

fn set_defaults(mut config: SessionPersistence) -> SessionPersistence {
    if config.r#type.is_none() {
        config.r#type = Some(HTTPRouteRulesSessionPersistenceType::Cookie);
    }
    config
}
