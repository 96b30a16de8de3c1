//! Decoding operations over kusto response streams.

pub(crate) mod binder;
pub(crate) mod frame_reader;
pub mod full;
pub mod iterative;
pub mod row;
pub mod v1;
