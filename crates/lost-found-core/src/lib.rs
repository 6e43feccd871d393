//! # Lost & Found Core
//!
//! Runtime-free logic for the visual-label search pipeline: item model,
//! label normalization, classifier contract, store contracts, query
//! planner, result merger, and catalogue writer.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Concrete
//! classifier backends and persistent stores live in the `lost-found`
//! app crate.
//!
//! ```text
//! ImageSource ─▶ Classifier ─▶ normalize ─┬─▶ QueryPlanner ─▶ DocumentStore ─▶ merge
//!                                         └─▶ CatalogueWriter ─▶ BlobStore + DocumentStore
//! ```

pub mod catalogue;
pub mod classifier;
pub mod error;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod search;
pub mod source;
pub mod store;

pub use error::{LostFoundError, Result};
