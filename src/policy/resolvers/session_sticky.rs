use super::resolve;
use crate::apis::policies::SessionStickyConfig;

pub const DEFAULT_COOKIE_NAME: &str = "_srv_id";
pub const DEFAULT_EXPIRES: i32 = 3600;

pub fn compute(config: Option<&SessionStickyConfig>, default_config: Option<&SessionStickyConfig>) -> Option<SessionStickyConfig> {
    resolve(config, default_config, set_defaults, |mut config, default_config| {
        if config.cookie_name.is_none() {
            config.cookie_name.clone_from(&default_config.cookie_name);
        }
        config.expires = config.expires.or(default_config.expires);
        config
    })
}

fn set_defaults(mut config: SessionStickyConfig) -> SessionStickyConfig {
    if config.cookie_name.is_none() {
        config.cookie_name = Some(DEFAULT_COOKIE_NAME.to_owned());
    }
    config.expires = Some(config.expires.unwrap_or(DEFAULT_EXPIRES));
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_fallbacks() {
        assert_eq!(compute(None, None), None);
        let effective = compute(None, Some(&SessionStickyConfig::default())).unwrap_or_default();
        assert_eq!(effective, SessionStickyConfig { cookie_name: Some("_srv_id".to_owned()), expires: Some(3600) });

        let config = SessionStickyConfig { cookie_name: Some("sticky".to_owned()), expires: None };
        let default_config = SessionStickyConfig { cookie_name: Some("other".to_owned()), expires: Some(60) };
        let effective = compute(Some(&config), Some(&default_config)).unwrap_or_default();
        assert_eq!(effective, SessionStickyConfig { cookie_name: Some("sticky".to_owned()), expires: Some(60) });
    }
}
