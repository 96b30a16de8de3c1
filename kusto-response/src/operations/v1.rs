//! Decoding of V1 (tabular) responses, as returned by management commands.
//!
//! A v1 body is a single JSON object. The last table of a multi-table
//! response is a table of contents whose rows name and classify the other
//! tables; a single-table response is a bare primary result.

use std::sync::Arc;

use bytes::Bytes;
use futures::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Kind, KustoError, Op, Partial, Result};
use crate::models::v1;
use crate::models::v2::{Column as ColumnV2, RawRowData, TableKind};
use crate::operations::binder;
use crate::operations::frame_reader::envelope_error;
use crate::operations::row::{decode_cells, Row, Schema};
use crate::types::KustoValue;

/// A fully materialized v1 table.
#[derive(Debug, Clone)]
pub struct TableV1 {
    id: String,
    name: String,
    kind: TableKind,
    schema: Arc<Schema>,
    rows: Vec<Row>,
}

impl TableV1 {
    /// The id assigned to the table by the table of contents, if any.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The name of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind of the table.
    pub fn kind(&self) -> &TableKind {
        &self.kind
    }

    /// The columns of the table, in ordinal order.
    pub fn columns(&self) -> &[ColumnV2] {
        self.schema.columns()
    }

    /// Whether this table carries user-facing query results.
    pub fn is_primary_result(&self) -> bool {
        self.kind == TableKind::PrimaryResult
    }

    /// The rows of the table.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Binds every row onto a user record type, stopping at the first
    /// failure.
    pub fn to_records<T: serde::de::DeserializeOwned>(&self) -> Result<Vec<T>> {
        binder::records_from_rows(&self.rows)
    }
}

/// The result of decoding a v1 response.
#[derive(Debug, Clone, Default)]
pub struct KustoResponseDataSetV1 {
    tables: Vec<TableV1>,
}

impl KustoResponseDataSetV1 {
    /// Reads a whole response body and decodes it. Server-reported failures
    /// keep whatever part of the dataset was decodable.
    pub async fn from_reader(mut reader: impl AsyncRead + Send + Unpin) -> Partial<Self> {
        let mut body = String::new();
        if let Err(e) = reader.read_to_string(&mut body).await {
            return Err((None, e.into()));
        }
        Self::from_json(&body)
    }

    /// Decodes a v1 response body.
    pub fn from_json(body: &str) -> Partial<Self> {
        let dataset: v1::Dataset = match serde_json::from_str(body.trim_start()) {
            Ok(dataset) => dataset,
            Err(_) => {
                return Err((None, envelope_error(Bytes::copy_from_slice(body.as_bytes()))))
            }
        };
        Self::from_dataset(dataset)
    }

    fn from_dataset(dataset: v1::Dataset) -> Partial<Self> {
        let mut errors: Vec<Error> = dataset
            .exceptions
            .iter()
            .map(|message| {
                KustoError::new(Op::Mgmt, Kind::HttpError, message.clone()).into()
            })
            .collect();

        let mut tables = Vec::with_capacity(dataset.tables.len());
        for wire in dataset.tables {
            match decode_table(wire, &mut errors) {
                Ok(table) => tables.push(table),
                Err(e) => return Err((None, e)),
            }
        }

        apply_table_of_contents(&mut tables);

        let dataset = Self { tables };
        if errors.is_empty() {
            Ok(dataset)
        } else {
            Err((Some(dataset), errors.into()))
        }
    }

    /// The number of tables in the dataset.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// All tables, in response order.
    pub fn tables(&self) -> &[TableV1] {
        &self.tables
    }

    /// The primary result tables.
    pub fn primary_results(&self) -> impl Iterator<Item = &TableV1> {
        self.tables.iter().filter(|t| t.is_primary_result())
    }
}

/// Decodes one wire table; row-level exception envelopes land in `errors`.
fn decode_table(wire: v1::Table, errors: &mut Vec<Error>) -> Result<TableV1> {
    let columns = wire
        .columns
        .iter()
        .map(|c| {
            c.effective_type()
                .map(|column_type| ColumnV2 {
                    column_name: c.column_name.clone(),
                    column_type,
                })
                .ok_or_else(|| {
                    Error::from(KustoError::new(
                        Op::Mgmt,
                        Kind::Internal,
                        format!("column {:?} carries no type", c.column_name),
                    ))
                })
        })
        .collect::<Result<Vec<_>>>()?;
    let schema = Schema::new(columns);

    let mut rows = Vec::with_capacity(wire.rows.len());
    for raw in &wire.rows {
        if raw.is_error() {
            match serde_json::from_str::<v1::ExceptionsEnvelope>(raw.as_str()) {
                Ok(envelope) => errors.extend(envelope.exceptions.into_iter().map(|message| {
                    Error::from(KustoError::new(Op::Mgmt, Kind::HttpError, message))
                })),
                Err(e) => errors.push(Error::Json(e)),
            }
            continue;
        }
        match raw.split()? {
            RawRowData::Values(cells) => match decode_cells(&schema, &cells, rows.len()) {
                Ok(row) => rows.push(row),
                Err(e) => errors.push(e),
            },
            RawRowData::Errors(inline) => {
                errors.extend(inline.into_iter().map(Error::QueryApi))
            }
        }
    }

    Ok(TableV1 {
        id: String::new(),
        name: wire.table_name,
        kind: TableKind::PrimaryResult,
        schema,
        rows,
    })
}

/// Applies the table-of-contents (the last table of a multi-table response)
/// onto the tables it describes. A single-table response is a bare primary
/// result and stays untouched.
fn apply_table_of_contents(tables: &mut [TableV1]) {
    if tables.len() < 2 {
        return;
    }

    let toc_index = tables.len() - 1;
    let records: Vec<(usize, String, String, TableKind)> = tables[toc_index]
        .rows()
        .iter()
        .filter_map(|row| {
            let ordinal = match row.get("Ordinal") {
                Some(KustoValue::Long(v)) => v.0.map(|n| n as usize),
                Some(KustoValue::Int(v)) => v.0.map(|n| n as usize),
                _ => None,
            }?;
            let name = match row.get("Name") {
                Some(KustoValue::String(v)) => v.0.clone(),
                _ => None,
            }?;
            let id = match row.get("Id") {
                Some(KustoValue::String(v)) => v.0.clone(),
                _ => None,
            }
            .unwrap_or_default();
            let kind = match row.get("Kind") {
                Some(KustoValue::String(v)) => v.0.as_deref().map(kind_from_toc),
                _ => None,
            }?;
            Some((ordinal, name, id, kind))
        })
        .collect();

    for (ordinal, name, id, kind) in records {
        if ordinal >= toc_index {
            continue;
        }
        let table = &mut tables[ordinal];
        table.name = name;
        table.id = id;
        table.kind = kind;
    }
    tables[toc_index].kind = TableKind::TableOfContents;
}

/// Maps a table-of-contents `Kind` cell onto a table kind.
fn kind_from_toc(kind: &str) -> TableKind {
    match kind {
        "QueryResult" => TableKind::PrimaryResult,
        "QueryProperties" => TableKind::QueryProperties,
        "QueryStatus" => TableKind::QueryCompletionInformation,
        other => TableKind::from_wire(other),
    }
}
