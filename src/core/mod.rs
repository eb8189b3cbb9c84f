//! Core library modules for sat-prep
//!
//! This module contains the internal implementation details of the sat-prep library.

pub mod catalog;
pub mod error;
pub mod fetch;
pub mod prepare;
pub mod stream;

// Re-export main types for internal use
pub use catalog::{Catalog, CatalogConfig};
pub use fetch::{DownloadTask, Fetcher};
pub use prepare::Preparer;
