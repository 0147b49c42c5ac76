use crate::apis::policies::FaultInjectionConfig;

pub const DEFAULT_DELAY_UNIT: &str = "ms";

/// Delay and abort are exclusive, so the default's delay or abort is only inherited by a scope
/// that declares neither, and only when the default itself declares just that one.
pub fn compute(config: Option<&FaultInjectionConfig>, default_config: Option<&FaultInjectionConfig>, unit: Option<&str>) -> Option<FaultInjectionConfig> {
    match (config, default_config) {
        (None, None) => None,
        (None, Some(default_config)) => Some(set_defaults(default_config.clone(), unit)),
        (Some(config), None) => Some(set_defaults(config.clone(), unit)),
        (Some(config), Some(default_config)) => Some(merge(config.clone(), default_config, unit)),
    }
}

fn merge(mut config: FaultInjectionConfig, default_config: &FaultInjectionConfig, unit: Option<&str>) -> FaultInjectionConfig {
    let scope_is_empty = config.delay.is_none() && config.abort.is_none();
    if scope_is_empty && default_config.delay.is_some() && default_config.abort.is_none() {
        config.delay.clone_from(&default_config.delay);
    }
    if scope_is_empty && default_config.abort.is_some() && default_config.delay.is_none() {
        config.abort.clone_from(&default_config.abort);
    }

    let default_delay = if default_config.abort.is_none() { default_config.delay.as_ref() } else { None };
    if let Some(delay) = config.delay.as_mut() {
        if delay.unit.is_none() {
            delay.unit = default_config
                .delay
                .as_ref()
                .and_then(|d| d.unit.clone())
                .or_else(|| unit.map(ToOwned::to_owned))
                .or_else(|| Some(DEFAULT_DELAY_UNIT.to_owned()));
        }
        if let Some(default_delay) = default_delay {
            if delay.fixed.is_none() && delay.range.is_none() {
                match (default_delay.fixed, default_delay.range.as_ref()) {
                    (Some(fixed), None) => delay.fixed = Some(fixed),
                    (None, Some(range)) => delay.range = Some(range.clone()),
                    _ => {},
                }
            }
        }
    }

    let default_abort = if default_config.delay.is_none() { default_config.abort.as_ref() } else { None };
    if let (Some(abort), Some(default_abort)) = (config.abort.as_mut(), default_abort) {
        if abort.status_code.is_none() {
            abort.status_code = default_abort.status_code;
        }
        if abort.message.is_none() {
            abort.message.clone_from(&default_abort.message);
        }
    }
    config
}

fn set_defaults(mut config: FaultInjectionConfig, unit: Option<&str>) -> FaultInjectionConfig {
    if let Some(delay) = config.delay.as_mut() {
        if delay.unit.is_none() {
            delay.unit = Some(unit.unwrap_or(DEFAULT_DELAY_UNIT).to_owned());
        }
    }
    config
}
