//! Publication of compiled configurations to the repository the proxies read from.
//!
//! Every gateway owns a codebase at `/{namespace}/{name}`. A publication upserts `config.json`
//! and then commits the new version. Nothing is written when the committed version already
//! matches the content hash of the configuration.

mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

pub use file::FileConfigRepository;
pub use memory::InMemoryConfigRepository;

use crate::{common::ResourceKey, generator::ConfigSpec};

pub const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("repository io error {0}")]
    Io(#[from] std::io::Error),
    #[error("repository serialization error {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Version committed to the codebase, `None` when nothing was committed yet.
    async fn version(&self, path: &str) -> Result<Option<String>, RepositoryError>;

    async fn ensure_codebase(&self, path: &str) -> Result<(), RepositoryError>;

    /// Creates or replaces the file at `path`.
    async fn upsert(&self, path: &str, body: Vec<u8>) -> Result<(), RepositoryError>;

    async fn commit(&self, path: &str, version: &str) -> Result<(), RepositoryError>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Unchanged,
}

pub fn gateway_codebase_path(gateway_key: &ResourceKey) -> String {
    format!("/{}/{}", gateway_key.namespace, gateway_key.name)
}

pub async fn publish(repository: &dyn ConfigRepository, gateway_key: &ResourceKey, config: &ConfigSpec) -> Result<PublishOutcome, RepositoryError> {
    let codebase = gateway_codebase_path(gateway_key);
    let current = repository.version(&codebase).await?;
    debug!("Gateway {gateway_key} committed version {current:?}, compiled version {}", config.version);
    if current.as_deref() == Some(config.version.as_str()) {
        return Ok(PublishOutcome::Unchanged);
    }

    repository.ensure_codebase(&codebase).await?;
    repository.upsert(&format!("{codebase}/{CONFIG_FILE}"), serde_json::to_vec_pretty(config)?).await?;
    repository.commit(&codebase, &config.version).await?;
    info!("Published configuration of gateway {gateway_key} version {}", config.version);
    Ok(PublishOutcome::Published)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn config(version: &str) -> ConfigSpec {
        ConfigSpec { secrets: BTreeMap::from([("tls-443-0.crt".to_owned(), "PEM".to_owned())]), version: version.to_owned(), ..Default::default() }
    }

    #[tokio::test]
    async fn publishes_only_new_versions() {
        let repository = InMemoryConfigRepository::default();
        let gateway_key = ResourceKey::namespaced("edge", "apps");

        assert_eq!(publish(&repository, &gateway_key, &config("v1")).await.unwrap(), PublishOutcome::Published);
        assert_eq!(repository.version("/apps/edge").await.unwrap().as_deref(), Some("v1"));
        let body = repository.file("/apps/edge/config.json").unwrap();
        let published: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(published["version"], "v1");
        assert_eq!(published["secrets"]["tls-443-0.crt"], "PEM");

        assert_eq!(publish(&repository, &gateway_key, &config("v1")).await.unwrap(), PublishOutcome::Unchanged);
        assert_eq!(repository.commits(), 1);

        assert_eq!(publish(&repository, &gateway_key, &config("v2")).await.unwrap(), PublishOutcome::Published);
        assert_eq!(repository.commits(), 2);
    }
}
