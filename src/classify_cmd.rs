//! `lnf classify`: print the labels the configured classifier assigns to a photo.

use anyhow::Result;

use lost_found_core::normalize::normalize_label;
use lost_found_core::source::ImageSource;

use crate::ops::LostFound;

/// A missing or failing classifier is reported as "no labels", with the
/// reason on stderr.
pub async fn run_classify(
    service: &LostFound,
    source: &dyn ImageSource,
    capture: bool,
) -> Result<()> {
    let image = if capture {
        source.capture().await?
    } else {
        source.pick_existing().await?
    };

    let classifier = service.classifier().clone();
    let predictions = match classifier.classify(&image).await {
        Ok(predictions) => predictions,
        Err(e) if e.is_classification_failure() => {
            eprintln!("{}", e);
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    if predictions.is_empty() {
        println!("No labels detected.");
        return Ok(());
    }

    println!("Classifier: {}", classifier.name());
    for prediction in &predictions {
        println!(
            "  [{:.2}] {}  ({})",
            prediction.confidence,
            normalize_label(&prediction.text),
            prediction.text
        );
    }
    Ok(())
}
