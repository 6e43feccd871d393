//! Filesystem [`BlobStore`]: one file per uploaded photo under a root
//! directory. Keys map to relative paths (`uploads/1700000000000-ab12cd34.jpg`).

use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use tokio::io::{AsyncRead, AsyncWriteExt};

use lost_found_core::store::BlobStore;

use crate::config::BlobConfig;

pub struct FsBlobStore {
    root: PathBuf,
    base_url: Option<String>,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn from_config(config: &BlobConfig) -> Self {
        Self::new(config.root.clone(), config.base_url.clone())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        if key.is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("invalid blob key: {:?}", key);
        }
        Ok(self.root.join(rel))
    }

    fn url_for(&self, key: &str, path: &Path) -> Result<String> {
        match &self.base_url {
            Some(base) => Ok(format!("{}/{}", base.trim_end_matches('/'), key)),
            None => Url::from_file_path(path)
                .map(String::from)
                .map_err(|_| anyhow!("blob path is not absolute: {}", path.display())),
        }
    }
}

/// Stream `source` into a new file at `path`. A failed write removes the
/// partial file so the key is not left holding truncated bytes.
async fn write_new<R>(path: &Path, mut source: R) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    // create_new: a key is never overwritten
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .with_context(|| format!("Create blob {}", path.display()))?;

    let written = async {
        tokio::io::copy(&mut source, &mut file).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(rm) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %rm, "failed to remove partial blob");
        }
        return Err(e).with_context(|| format!("Write blob {}", path.display()));
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Create blob directory {}", parent.display()))?;
        }

        write_new(&path, bytes).await?;

        let absolute = tokio::fs::canonicalize(&path).await?;
        self.url_for(key, &absolute)
    }
}
