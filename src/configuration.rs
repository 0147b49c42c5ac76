use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;
use typed_builder::TypedBuilder;

const DEFAULT_STATUS_QUEUE_SIZE: usize = 1024;
const DEFAULT_STATUS_UPDATE_RETRIES: u32 = 5;

fn default_true() -> bool {
    true
}

fn default_status_queue_size() -> usize {
    DEFAULT_STATUS_QUEUE_SIZE
}

fn default_status_update_retries() -> u32 {
    DEFAULT_STATUS_UPDATE_RETRIES
}

#[derive(Debug, Clone, TypedBuilder, Deserialize)]
pub struct Configuration {
    pub controller_name: String,
    #[builder(default)]
    #[serde(default)]
    pub enable_open_telemetry: Option<bool>,
    #[builder(default = true)]
    #[serde(default = "default_true")]
    pub use_endpoint_slices: bool,
    #[builder(default)]
    #[serde(default)]
    pub drop_route_rule_if_no_available_backends: bool,
    #[builder(default = DEFAULT_STATUS_QUEUE_SIZE)]
    #[serde(default = "default_status_queue_size")]
    pub status_queue_size: usize,
    #[builder(default = DEFAULT_STATUS_UPDATE_RETRIES)]
    #[serde(default = "default_status_update_retries")]
    pub status_update_retries: u32,
    pub repository_root: String,
    /// Filter scripts by protocol and filter type, copied into every compiled configuration.
    #[builder(default)]
    #[serde(default)]
    pub filters: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("controller name must be not empty")]
    ControllerName,
    #[error("repository root must be not empty")]
    RepositoryRoot,
    #[error("status queue size must be greater than zero")]
    StatusQueueSize,
}

impl Configuration {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.controller_name.is_empty() {
            return Err(ConfigurationError::ControllerName);
        }
        if self.repository_root.is_empty() {
            return Err(ConfigurationError::RepositoryRoot);
        }
        if self.status_queue_size == 0 {
            return Err(ConfigurationError::StatusQueueSize);
        }
        Ok(())
    }
}
