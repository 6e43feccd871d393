//! Command-line image source.
//!
//! `pick_existing` reads the file given with `--image`; `capture` reads an
//! image piped on stdin (e.g. `camera-snap | lnf search-image --capture`).
//! No path, or nothing on stdin, counts as the user backing out.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use lost_found_core::source::ImageSource;
use lost_found_core::{LostFoundError, Result};

#[derive(Debug, Clone, Default)]
pub struct CliImageSource {
    path: Option<PathBuf>,
}

impl CliImageSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ImageSource for CliImageSource {
    async fn capture(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| LostFoundError::Validation(format!("read stdin: {}", e)))?;
        if bytes.is_empty() {
            return Err(LostFoundError::UserCancelled);
        }
        Ok(bytes)
    }

    async fn pick_existing(&self) -> Result<Vec<u8>> {
        let path = self.path.as_ref().ok_or(LostFoundError::UserCancelled)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LostFoundError::Validation(format!("read {}: {}", path.display(), e)))?;
        if bytes.is_empty() {
            return Err(LostFoundError::UserCancelled);
        }
        Ok(bytes)
    }
}
