//! Artifact loading (KQL scripts, sample data, connection and pipeline templates).

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use common::errors::{AppError, AppResult};

/// Source of named text artifacts such as `InvestmentInsights/KQL/trades.kql`.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn read(&self, name: &str) -> AppResult<String>;
}

/// Artifacts stored under a directory on disk.
#[derive(Debug, Clone)]
pub struct DirArtifacts {
    root: PathBuf,
}

impl DirArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves `name` under the root, refusing anything that escapes it.
    fn resolve(&self, name: &str) -> AppResult<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(AppError::Artifact(format!("invalid artifact name: {name}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactSource for DirArtifacts {
    async fn read(&self, name: &str) -> AppResult<String> {
        let path = self.resolve(name)?;
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "failed to read artifact");
            AppError::Artifact(format!("{name}: {e}"))
        })
    }
}

/// Artifacts held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifacts {
    files: HashMap<String, String>,
}

impl MemoryArtifacts {
    pub fn with(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }
}

#[async_trait]
impl ArtifactSource for MemoryArtifacts {
    async fn read(&self, name: &str) -> AppResult<String> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::Artifact(format!("{name}: not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_nested_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("InvestmentInsights/KQL")).unwrap();
        std::fs::write(
            dir.path().join("InvestmentInsights/KQL/trades.kql"),
            ".create-merge table trades (symbol:string)",
        )
        .unwrap();

        let artifacts = DirArtifacts::new(dir.path());
        let content = artifacts.read("InvestmentInsights/KQL/trades.kql").await.unwrap();

        assert!(content.starts_with(".create-merge table trades"));
    }

    #[tokio::test]
    async fn test_rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = DirArtifacts::new(dir.path());
        assert!(matches!(
            artifacts.read("../secrets.json").await,
            Err(AppError::Artifact(_))
        ));
        assert!(matches!(artifacts.read("/etc/passwd").await, Err(AppError::Artifact(_))));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirArtifacts::new(dir.path()).read("nope.kql").await.unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));
    }
}
