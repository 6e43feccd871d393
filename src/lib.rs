//! # Lost & Found
//!
//! Catalogue found items with a photo and search them by text or by photo.
//!
//! The search and catalogue pipeline lives in `lost-found-core` and is
//! runtime-free. This crate supplies the concrete pieces around it:
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ Image      │──▶│ Classifier   │──▶│ QueryPlanner   │──▶ SQLite
//! │ (file/cam) │   │ ONNX/Vision  │   │ CatalogueWriter│──▶ blob dir
//! └────────────┘   └──────────────┘   └────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`classifier`] | Fixed-vocabulary (ONNX) and open-vocabulary (Cloud Vision) backends |
//! | [`sqlite_store`] | `DocumentStore` over SQLite |
//! | [`blob_fs`] | `BlobStore` over a local directory |
//! | [`image_source`] | File and stdin image source |
//! | [`ops`] | Cancellable operations and the [`ops::LostFound`] service |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod blob_fs;
pub mod classifier;
pub mod classify_cmd;
pub mod config;
pub mod db;
pub mod image_source;
pub mod migrate;
pub mod ops;
pub mod search;
pub mod sqlite_store;
pub mod submit;
