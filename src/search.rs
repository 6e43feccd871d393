//! `lnf search` and `lnf search-image`.

use anyhow::Result;

use lost_found_core::search::SearchResults;
use lost_found_core::source::ImageSource;

use crate::ops::LostFound;

pub async fn run_search(service: &LostFound, query: &str, json: bool) -> Result<()> {
    let results = service.spawn_search_text(query).await?;
    print_results(&results, json)
}

/// Label the photo from `source` and search by the detected labels.
///
/// `capture` selects the camera path (stdin) over an existing file.
pub async fn run_search_image(
    service: &LostFound,
    source: &dyn ImageSource,
    capture: bool,
    json: bool,
) -> Result<()> {
    let image = if capture {
        source.capture().await?
    } else {
        source.pick_existing().await?
    };
    let results = service.spawn_label_and_search(image).await?;
    print_results(&results, json)
}

fn print_results(results: &SearchResults, json: bool) -> Result<()> {
    for failure in &results.failures {
        eprintln!("warning: {} failed: {}", failure.predicate, failure.error);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    if !results.labels.is_empty() {
        println!("Labels: {}", results.labels.join(", "));
        println!();
    }

    if results.items.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, stored) in results.items.iter().enumerate() {
        let item = &stored.item;
        println!("{}. {} / {}", i + 1, item.category, item.name);
        println!("    added: {}", item.date_added.format("%Y-%m-%d"));
        if !item.labels.is_empty() {
            println!("    labels: {}", item.labels.join(", "));
        }
        println!("    image: {}", item.image_url);
        println!("    key: {}", stored.key);
        println!();
    }
    Ok(())
}
