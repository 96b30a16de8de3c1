use serde::{Deserialize, Serialize};

use crate::error::{Kind, KustoError, Op, Result};
use crate::models::v2::consts::{ErrorReportingPlacement, TableFragmentType, TableKind};
use crate::models::v2::errors::OneApiError;
use crate::models::v2::{Column, RawRow};

/// The header of the V2 query response.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct DataSetHeader {
    /// Is the dataset progressive. Progressive responses are rejected by
    /// this decoder; see [DataSetHeader::validate].
    pub is_progressive: bool,
    /// Version of the header. Currently it is always `v2.0`.
    pub version: String,
    /// Whether or not the query fragmented the main table.
    pub is_fragmented: Option<bool>,
    /// Errors location.
    pub error_reporting_placement: Option<ErrorReportingPlacement>,
}

impl DataSetHeader {
    /// Checks that the header describes the only stream shape this decoder
    /// accepts: a fragmented, non-progressive `v2.0` response reporting
    /// errors at end of table.
    pub fn validate(&self) -> Result<()> {
        let violation = if self.version != "v2.0" {
            Some(format!(
                "expected version \"v2.0\", got {:?}",
                self.version
            ))
        } else if self.is_progressive {
            Some("progressive results are not supported".to_string())
        } else if self.is_fragmented != Some(true) {
            Some("expected a fragmented result stream".to_string())
        } else if self.error_reporting_placement != Some(ErrorReportingPlacement::EndOfTable) {
            Some("expected errors to be reported at end of table".to_string())
        } else {
            None
        };

        match violation {
            Some(message) => Err(KustoError::new(
                Op::Query,
                Kind::Internal,
                format!("invalid dataset header: {message}"),
            )
            .into()),
            None => Ok(()),
        }
    }
}

/// Query result DataTable, for a V2 Query.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct DataTable {
    /// Table id - unique identifier of the table.
    pub table_id: i32,
    /// Table name.
    pub table_name: String,
    /// Table kind - will be `PrimaryResult` for the actual query result, or other kinds for metadata.
    pub table_kind: TableKind,
    /// Columns in the table.
    pub columns: Vec<Column>,
    /// Rows in the table. Each row is a list of values, corresponding to the columns in the table, or an inline error.
    pub rows: Vec<RawRow>,
}

/// A header opening the transmission of a primary-result table.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct TableHeader {
    /// Table id - unique identifier of the table.
    pub table_id: i32,
    /// Table name.
    pub table_name: String,
    /// Table kind - must be `PrimaryResult` for a fragmented table.
    pub table_kind: TableKind,
    /// Columns in the table.
    pub columns: Vec<Column>,
}

/// Represents a fragment of a table.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct TableFragment {
    /// Table id - unique identifier of the table. Corresponds to the table_id in the TableHeader.
    pub table_id: i32,
    /// The type of the fragment, instructs to how to use it.
    pub table_fragment_type: Option<TableFragmentType>,
    /// Rows in the table. Each row is a list of values, corresponding to the columns in the TableHeader.
    pub rows: Vec<RawRow>,
}

/// Progress report for a table (in progressive mode, which this decoder
/// rejects; residual progress frames are tolerated and ignored).
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct TableProgress {
    /// Table id - unique identifier of the table. Corresponds to the table_id in the TableHeader.
    pub table_id: i32,
    /// Percentage of the progress so far.
    pub table_progress: f64,
}

/// End of a table.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct TableCompletion {
    /// Table id - unique identifier of the table. Corresponds to the table_id in the TableHeader.
    pub table_id: i32,
    /// Total row count
    pub row_count: i32,
    /// Errors in the table - if any.
    pub one_api_errors: Option<Vec<OneApiError>>,
}

/// Represents an end of the query result.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct DataSetCompletion {
    /// did the query errored.
    pub has_errors: bool,
    /// Was the query cancelled.
    pub cancelled: bool,
    /// Errors in the query - if any.
    pub one_api_errors: Option<Vec<OneApiError>>,
}
