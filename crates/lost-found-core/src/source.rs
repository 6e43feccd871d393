//! Image source contract.
//!
//! Produces raw encoded image bytes from a camera or an existing photo.
//! Permission prompts and picker mechanics belong to the implementation.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Take a new photo. Returns
    /// [`LostFoundError::UserCancelled`](crate::LostFoundError::UserCancelled) if the user backs
    /// out.
    async fn capture(&self) -> Result<Vec<u8>>;

    /// Pick an existing photo. Same cancellation semantics as
    /// [`capture`](ImageSource::capture).
    async fn pick_existing(&self) -> Result<Vec<u8>>;
}
