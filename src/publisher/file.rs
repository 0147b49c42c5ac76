use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{ConfigRepository, RepositoryError};

const VERSION_FILE: &str = "version.json";

#[derive(Serialize, Deserialize)]
struct VersionMarker {
    version: String,
}

/// Repository rooted at a local directory, one subdirectory per codebase.
///
/// Files are written to a temporary sibling first and renamed into place, so readers never see
/// a partially written configuration.
#[derive(Clone, Debug)]
pub struct FileConfigRepository {
    root: PathBuf,
}

impl FileConfigRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    async fn write_atomically(path: &Path, body: &[u8]) -> Result<(), RepositoryError> {
        let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
        let temporary = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&temporary, body).await?;
        if let Err(e) = tokio::fs::rename(&temporary, path).await {
            let _ = tokio::fs::remove_file(&temporary).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigRepository for FileConfigRepository {
    async fn version(&self, path: &str) -> Result<Option<String>, RepositoryError> {
        match tokio::fs::read(self.resolve(path).join(VERSION_FILE)).await {
            Ok(body) => Ok(Some(serde_json::from_slice::<VersionMarker>(&body)?.version)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_codebase(&self, path: &str) -> Result<(), RepositoryError> {
        let directory = self.resolve(path);
        debug!("Ensuring codebase {}", directory.display());
        tokio::fs::create_dir_all(directory).await?;
        Ok(())
    }

    async fn upsert(&self, path: &str, body: Vec<u8>) -> Result<(), RepositoryError> {
        let file = self.resolve(path);
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Self::write_atomically(&file, &body).await
    }

    async fn commit(&self, path: &str, version: &str) -> Result<(), RepositoryError> {
        let body = serde_json::to_vec(&VersionMarker { version: version.to_owned() })?;
        Self::write_atomically(&self.resolve(path).join(VERSION_FILE), &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::ResourceKey,
        generator::ConfigSpec,
        publisher::{publish, PublishOutcome},
    };

    #[tokio::test]
    async fn writes_config_and_version_marker() {
        let root = std::env::temp_dir().join(format!("config-repository-{}", Uuid::new_v4()));
        let repository = FileConfigRepository::new(&root);
        let gateway_key = ResourceKey::namespaced("edge", "apps");
        let config = ConfigSpec { version: "abc".to_owned(), ..Default::default() };

        assert_eq!(repository.version("/apps/edge").await.unwrap(), None);
        assert_eq!(publish(&repository, &gateway_key, &config).await.unwrap(), PublishOutcome::Published);
        assert_eq!(repository.version("/apps/edge").await.unwrap().as_deref(), Some("abc"));
        assert!(root.join("apps/edge/config.json").exists());
        assert_eq!(publish(&repository, &gateway_key, &config).await.unwrap(), PublishOutcome::Unchanged);

        let leftovers = std::fs::read_dir(root.join("apps/edge"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
        let _ = std::fs::remove_dir_all(root);
    }
}
