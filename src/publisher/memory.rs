use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use super::{ConfigRepository, RepositoryError};

#[derive(Default, Debug)]
struct Codebases {
    versions: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    codebases: Vec<String>,
    commits: usize,
}

/// Repository kept in memory, for tests and dry runs.
#[derive(Clone, Default, Debug)]
pub struct InMemoryConfigRepository {
    codebases: Arc<Mutex<Codebases>>,
}

impl InMemoryConfigRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Codebases>, RepositoryError> {
        self.codebases.lock().map_err(|_| RepositoryError::Io(std::io::Error::other("repository lock poisoned")))
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().ok().and_then(|codebases| codebases.files.get(path).cloned())
    }

    pub fn commits(&self) -> usize {
        self.lock().map(|codebases| codebases.commits).unwrap_or_default()
    }
}

#[async_trait]
impl ConfigRepository for InMemoryConfigRepository {
    async fn version(&self, path: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.lock()?.versions.get(path).cloned())
    }

    async fn ensure_codebase(&self, path: &str) -> Result<(), RepositoryError> {
        let mut codebases = self.lock()?;
        if !codebases.codebases.iter().any(|codebase| codebase == path) {
            codebases.codebases.push(path.to_owned());
        }
        Ok(())
    }

    async fn upsert(&self, path: &str, body: Vec<u8>) -> Result<(), RepositoryError> {
        self.lock()?.files.insert(path.to_owned(), body);
        Ok(())
    }

    async fn commit(&self, path: &str, version: &str) -> Result<(), RepositoryError> {
        let mut codebases = self.lock()?;
        codebases.versions.insert(path.to_owned(), version.to_owned());
        codebases.commits += 1;
        Ok(())
    }
}
