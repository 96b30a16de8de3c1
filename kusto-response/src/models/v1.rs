//! The wire model of a V1 query response.
use serde::{Deserialize, Serialize};

use crate::models::v2::RawRow;
use crate::models::ColumnType;

/// A V1 response body: a list of tables, the last of which indexes the
/// others, plus any request-level exceptions.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct Dataset {
    /// The list of tables in the dataset.
    pub tables: Vec<Table>,
    /// Request-level failures reported alongside the data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<String>,
}

/// Represents a column in ADX, for a V1 (usually management) query.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct Column {
    /// Name of the column.
    pub column_name: String,
    /// Data type of the column.
    pub column_type: Option<ColumnType>,
    /// Data type of the column, under its legacy key.
    pub data_type: Option<ColumnType>,
}

impl Column {
    /// The effective type of the column: `ColumnType` when present, the
    /// legacy `DataType` otherwise.
    pub fn effective_type(&self) -> Option<ColumnType> {
        self.column_type.or(self.data_type)
    }
}

/// Represents a table in ADX, for a V1 (usually management) query.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct Table {
    /// Name of the table.
    pub table_name: String,
    /// Columns in the table.
    pub columns: Vec<Column>,
    /// Rows in the table. Each row is a list of values, corresponding to the
    /// columns in the table, or an inline exception envelope.
    pub rows: Vec<RawRow>,
}

/// An exception envelope emitted in place of a row in a V1 table.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct ExceptionsEnvelope {
    /// The exception messages.
    pub exceptions: Vec<String>,
}
