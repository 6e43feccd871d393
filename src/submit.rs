//! `lnf add`: catalogue a found item.

use anyhow::Result;
use std::path::Path;

use lost_found_core::catalogue::SubmitRequest;
use lost_found_core::LostFoundError;

use crate::ops::LostFound;

pub async fn run_add(
    service: &LostFound,
    name: &str,
    category: &str,
    image_path: &Path,
    labels: Vec<String>,
) -> Result<()> {
    let image = tokio::fs::read(image_path).await.map_err(|e| {
        LostFoundError::Validation(format!("read {}: {}", image_path.display(), e))
    })?;

    let request = SubmitRequest {
        name: name.to_string(),
        category: category.to_string(),
        image: Some(image),
        user_labels: labels,
    };

    let stored = service.spawn_submit(request).await?;

    println!("Added {} / {}", stored.item.category, stored.item.name);
    if stored.item.labels.is_empty() {
        println!("    labels: (none)");
    } else {
        println!("    labels: {}", stored.item.labels.join(", "));
    }
    println!("    image: {}", stored.item.image_url);
    println!("    key: {}", stored.key);
    Ok(())
}
