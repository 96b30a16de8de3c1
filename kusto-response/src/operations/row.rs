//! Typed rows, and decoding them from their raw wire form.

use std::sync::{Arc, OnceLock};

use serde_json::value::RawValue;

use crate::error::{Error, Kind, KustoError, Op, Result};
use crate::models::v2::{Column, OneApiError, RawRow, RawRowData};
use crate::operations::binder;
use crate::types::KustoValue;

/// The column schema of a table, shared by every row of the table.
///
/// Column ordinals are the positions in the list. The binder's key map is
/// computed once per schema, on first use.
#[derive(Debug)]
pub(crate) struct Schema {
    columns: Box<[Column]>,
    binder_keys: OnceLock<Box<[binder::BinderKey]>>,
}

impl Schema {
    pub(crate) fn new(columns: Vec<Column>) -> Arc<Self> {
        Arc::new(Self {
            columns: columns.into_boxed_slice(),
            binder_keys: OnceLock::new(),
        })
    }

    pub(crate) fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub(crate) fn binder_keys(&self) -> &[binder::BinderKey] {
        self.binder_keys
            .get_or_init(|| binder::build_keys(&self.columns))
    }

    pub(crate) fn ordinal_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.column_name == name)
    }
}

/// A single decoded row of a table.
#[derive(Clone, Debug)]
pub struct Row {
    index: usize,
    schema: Arc<Schema>,
    values: Vec<KustoValue>,
}

impl Row {
    /// The position of the row within its table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The columns of the owning table, in ordinal order.
    pub fn columns(&self) -> &[Column] {
        self.schema.columns()
    }

    /// The values of the row, in column order.
    pub fn values(&self) -> &[KustoValue] {
        &self.values
    }

    /// Consumes the row into its values.
    pub fn into_values(self) -> Vec<KustoValue> {
        self.values
    }

    /// The value of the column with the given name. The lookup is
    /// case-sensitive.
    pub fn get(&self, name: &str) -> Option<&KustoValue> {
        self.schema.ordinal_of(name).map(|i| &self.values[i])
    }

    /// Binds the row onto a user record type by column name.
    pub fn to_record<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        binder::record_from_row(self)
    }

    pub(crate) fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

/// The outcome of decoding one raw row: data, or the inline errors that took
/// its place.
#[derive(Debug)]
pub(crate) enum DecodedRow {
    Values(Row),
    Errors(Vec<OneApiError>),
}

/// Decodes a raw row against a schema, assigning it the given index.
pub(crate) fn decode_row(schema: &Arc<Schema>, raw: &RawRow, index: usize) -> Result<DecodedRow> {
    match raw.split()? {
        RawRowData::Errors(errors) => Ok(DecodedRow::Errors(errors)),
        RawRowData::Values(cells) => decode_cells(schema, &cells, index).map(DecodedRow::Values),
    }
}

/// Decodes the raw cells of one row against a schema.
pub(crate) fn decode_cells(
    schema: &Arc<Schema>,
    cells: &[&RawValue],
    index: usize,
) -> Result<Row> {
    let columns = schema.columns();
    if cells.len() != columns.len() {
        return Err(KustoError::new(
            Op::Query,
            Kind::Internal,
            format!(
                "row {} has {} values but the table has {} columns",
                index,
                cells.len(),
                columns.len()
            ),
        )
        .into());
    }

    let mut values = Vec::with_capacity(columns.len());
    for (column, cell) in columns.iter().zip(cells) {
        let value = KustoValue::parse(column.column_type, cell).map_err(|e| {
            Error::from(
                KustoError::new(
                    Op::Query,
                    e.kind(),
                    format!("column {:?} of row {}", column.column_name, index),
                )
                .with_source(e),
            )
        })?;
        values.push(value);
    }

    Ok(Row {
        index,
        schema: schema.clone(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnType;
    use crate::types::{KustoInt, KustoString};

    fn schema(columns: &[(&str, ColumnType)]) -> Arc<Schema> {
        Schema::new(
            columns
                .iter()
                .map(|(name, ty)| Column {
                    column_name: name.to_string(),
                    column_type: *ty,
                })
                .collect(),
        )
    }

    fn decode(schema: &Arc<Schema>, raw: &str, index: usize) -> Result<DecodedRow> {
        decode_row(schema, &RawRow::from_json(raw).unwrap(), index)
    }

    #[test]
    fn decodes_a_row_in_column_order() {
        let schema = schema(&[("a", ColumnType::String), ("b", ColumnType::Int)]);
        let row = match decode(&schema, "[\"x\", 1]", 0).unwrap() {
            DecodedRow::Values(row) => row,
            DecodedRow::Errors(_) => panic!("expected values"),
        };
        assert_eq!(row.index(), 0);
        assert_eq!(
            row.values(),
            &[
                KustoValue::String(KustoString::new("x".to_string())),
                KustoValue::Int(KustoInt::new(1)),
            ]
        );
        assert_eq!(
            row.get("b"),
            Some(&KustoValue::Int(KustoInt::new(1)))
        );
        assert_eq!(row.get("B"), None, "lookups are case-sensitive");
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let schema = schema(&[("a", ColumnType::Int)]);
        let err = decode(&schema, "[1, 2]", 3).unwrap_err();
        assert_eq!(err.kind(), Kind::Internal);
        assert!(err.to_string().contains("row 3"), "{err}");
    }

    #[test]
    fn inline_error_envelopes_are_not_rows() {
        let schema = schema(&[("a", ColumnType::Int)]);
        let raw = "{\"Errors\":[{\"error\":{\"code\":\"LimitsExceeded\",\"message\":\"too big\",\"@permanent\":false}}]}";
        match decode(&schema, raw, 0).unwrap() {
            DecodedRow::Errors(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].code(), "LimitsExceeded");
            }
            DecodedRow::Values(_) => panic!("expected errors"),
        }
    }

    #[test]
    fn cell_failures_name_the_column_and_row() {
        let schema = schema(&[("a", ColumnType::Int)]);
        let err = decode(&schema, "[2147483648]", 7).unwrap_err();
        assert_eq!(err.kind(), Kind::FailedToParse);
        let rendered = format!("{err}");
        assert!(rendered.contains("\"a\"") && rendered.contains("row 7"), "{rendered}");
    }
}
