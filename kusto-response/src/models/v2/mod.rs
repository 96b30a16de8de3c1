//! The frame model of a V2 query response.
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{Error, Kind, KustoError, Op, Partial, Result};
use crate::models::ColumnType;

mod consts;
mod errors;
mod frames;
mod known_tables;

pub use consts::*;
pub use errors::*;
pub use frames::*;
pub use known_tables::*;

/// A result of a V2 query.
/// Could be a table, a part of a table, or metadata about the dataset.
#[derive(Serialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "PascalCase", tag = "FrameType")]
#[allow(clippy::enum_variant_names)]
pub enum Frame {
    /// The header of the dataset.
    DataSetHeader(DataSetHeader),
    /// A table in the dataset.
    DataTable(DataTable),
    /// The final result in the dataset.
    DataSetCompletion(DataSetCompletion),
    /// A header of a table.
    TableHeader(TableHeader),
    /// A part of a table.
    TableFragment(TableFragment),
    /// Progress report for a table.
    TableProgress(TableProgress),
    /// End of a table.
    TableCompletion(TableCompletion),
}

impl Frame {
    /// Decodes a single frame from its raw JSON text.
    ///
    /// Dispatch is by the self-tag, located with a bounded byte scan, so
    /// each frame body is decoded directly into its own shape without an
    /// intermediate representation.
    pub fn from_json(text: &str) -> Result<Frame> {
        let frame_type = crate::operations::frame_reader::peek_frame_type(text.as_bytes())
            .ok_or_else(|| {
                Error::from(KustoError::new(
                    Op::Query,
                    Kind::Internal,
                    "frame carries no FrameType tag",
                ))
            })?;

        let parsed = match frame_type {
            "DataSetHeader" => serde_json::from_str(text).map(Frame::DataSetHeader),
            "DataTable" => serde_json::from_str(text).map(Frame::DataTable),
            "DataSetCompletion" => serde_json::from_str(text).map(Frame::DataSetCompletion),
            "TableHeader" => serde_json::from_str(text).map(Frame::TableHeader),
            "TableFragment" => serde_json::from_str(text).map(Frame::TableFragment),
            "TableProgress" => serde_json::from_str(text).map(Frame::TableProgress),
            "TableCompletion" => serde_json::from_str(text).map(Frame::TableCompletion),
            other => {
                return Err(KustoError::new(
                    Op::Query,
                    Kind::Internal,
                    format!("unrecognized frame type {other:?}"),
                )
                .into())
            }
        };

        parsed.map_err(|e| {
            KustoError::new(
                Op::Query,
                Kind::Internal,
                format!("failed to decode a {frame_type} frame"),
            )
            .with_source(Error::Json(e))
            .into()
        })
    }
}

/// Represents a column in ADX, for a V2 query.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct Column {
    /// Column name.
    pub column_name: String,
    /// Data type of the column.
    pub column_type: ColumnType,
}

/// A single row of a table as it appeared on the wire: either an array of
/// values or an inline error envelope. The JSON is kept raw until the owning
/// table's column schema is known.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(transparent)]
pub struct RawRow(Box<RawValue>);

/// The decoded shape of a [RawRow].
#[derive(Debug)]
pub enum RawRowData<'a> {
    /// An array of raw cell values, in column order.
    Values(Vec<&'a RawValue>),
    /// An inline error envelope that took the place of a row.
    Errors(Vec<OneApiError>),
}

impl RawRow {
    /// Wraps a raw JSON row. The text must be a complete JSON value.
    pub fn from_json(text: impl Into<String>) -> Result<Self> {
        Ok(Self(RawValue::from_string(text.into()).map_err(Error::Json)?))
    }

    /// The raw JSON text of the row.
    pub fn as_str(&self) -> &str {
        self.0.get()
    }

    /// Whether the row is an inline error envelope rather than data.
    pub fn is_error(&self) -> bool {
        self.as_str().as_bytes().first() == Some(&b'{')
    }

    /// Splits the row into its raw cells, or into the errors it carries.
    pub fn split(&self) -> Result<RawRowData<'_>> {
        match self.as_str().as_bytes().first() {
            Some(b'[') => {
                let cells: Vec<&RawValue> =
                    serde_json::from_str(self.as_str()).map_err(Error::Json)?;
                Ok(RawRowData::Values(cells))
            }
            Some(b'{') => {
                let envelope: OneApiErrors =
                    serde_json::from_str(self.as_str()).map_err(Error::Json)?;
                Ok(RawRowData::Errors(envelope.errors))
            }
            _ => Err(KustoError::new(
                Op::Query,
                Kind::Internal,
                format!("a row must be an array or an error object, got {}", self.as_str()),
            )
            .into()),
        }
    }
}

impl PartialEq for RawRow {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for RawRow {}

impl DataTable {
    /// Whether this is a primary result table.
    pub fn is_primary_result(&self) -> bool {
        self.table_kind == TableKind::PrimaryResult
    }

    /// Deserializes every row into `T` positionally, accumulating inline
    /// errors and per-row failures instead of stopping at the first.
    pub fn deserialize_values<T: serde::de::DeserializeOwned>(&self) -> Partial<Vec<T>> {
        let mut errors = vec![];
        let mut values = vec![];
        for row in &self.rows {
            match row.split() {
                Ok(RawRowData::Values(_)) => match serde_json::from_str::<T>(row.as_str()) {
                    Ok(v) => values.push(v),
                    Err(e) => errors.push(Error::Json(e)),
                },
                Ok(RawRowData::Errors(es)) => errors.extend(es.into_iter().map(Error::QueryApi)),
                Err(e) => errors.push(e),
            }
        }

        match (values.len(), errors.len()) {
            (_, 0) => Ok(values),
            (0, _) => Err((None, errors.into())),
            (_, _) => Err((Some(values), errors.into())),
        }
    }
}
