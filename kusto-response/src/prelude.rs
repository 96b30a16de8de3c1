//! The kusto response prelude.
//!
//! The prelude re-exports most commonly used items from this crate.
//!
//! # Examples
//!
//! Import the prelude with:
//!
//! ```
//! # #[allow(unused_imports)]
//! use kusto_response::prelude::*;
//! ```

pub use crate::dataset_options::{DatasetOptions, DatasetOptionsBuilder};
pub use crate::error::{Error, Kind, Op, Partial, PartialExt, Result};
pub use crate::models::v2::{Column, Frame, OneApiError, TableKind};
pub use crate::models::ColumnType;
pub use crate::operations::full::{parse_frames_full, KustoResponseDataSetV2, Table};
pub use crate::operations::iterative::{
    IterativeDataset, IterativeTable, RowResult, TableResult,
};
pub use crate::operations::row::Row;
pub use crate::operations::v1::{KustoResponseDataSetV1, TableV1};
pub use crate::types::{
    KustoBool, KustoDateTime, KustoDecimal, KustoDynamic, KustoGuid, KustoInt, KustoLong,
    KustoReal, KustoString, KustoTimespan, KustoValue,
};
