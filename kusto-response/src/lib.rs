#![warn(missing_docs)]

//! # Kusto response decoding
//! Frame-oriented streaming decoder for Azure Data Explorer (Kusto) query
//! responses: the `v2` frame protocol in full and iterative modes, the
//! smaller `v1` tabular shape, and the typed value layer shared by both.
//! Learn more about Azure Data Explorer at [https://docs.microsoft.com/en-us/azure/data-explorer/](https://docs.microsoft.com/en-us/azure/data-explorer/).

pub mod dataset_options;
pub mod error;
pub mod models;
mod operations;
pub mod prelude;
pub mod types;

pub use operations::{full, iterative, row, v1};
