//! Merge of a scope configuration with the policy wide default configuration.
//!
//! Every resolver follows the same four way rule: nothing configured resolves to nothing, a single
//! configuration gets the fallback constants applied, and when both are present every field unset
//! on the scope is taken from the default before the fallback constants apply.

pub mod access_control;
pub mod backend_lb;
pub mod backend_tls;
pub mod circuit_breaking;
pub mod fault_injection;
pub mod gateway_tls;
pub mod health_check;
pub mod load_balancer;
pub mod rate_limit;
pub mod retry;
pub mod session_sticky;
pub mod upstream_tls;

pub(crate) fn resolve<T, D, M>(config: Option<&T>, default_config: Option<&T>, set_defaults: D, merge: M) -> Option<T>
where
    T: Clone,
    D: FnOnce(T) -> T,
    M: FnOnce(T, &T) -> T,
{
    match (config, default_config) {
        (None, None) => None,
        (None, Some(default_config)) => Some(set_defaults(default_config.clone())),
        (Some(config), None) => Some(set_defaults(config.clone())),
        (Some(config), Some(default_config)) => Some(set_defaults(merge(config.clone(), default_config))),
    }
}
