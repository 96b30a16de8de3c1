//! Binding rows onto user record types by column name.
//!
//! The mapping contract is serde's: a field binds to the column whose name
//! matches it, `#[serde(rename = "Col")]` pins a field to a differently
//! named column, and `#[serde(skip, default)]` excludes a field. When no
//! column matches a field exactly, a column whose lowercased name matches
//! binds instead. Columns without a matching field, and fields without a
//! matching column (given a default), are ignored.

use hashbrown::{HashMap, HashSet};

use crate::error::{Kind, KustoError, Op, Result};
use crate::models::v2::Column;
use crate::operations::row::Row;

/// The JSON object keys a column is published under: its exact name, plus a
/// lowercased fallback when that collides with nothing else.
#[derive(Debug)]
pub(crate) struct BinderKey {
    exact: String,
    folded: Option<String>,
}

/// Computes the key map for a schema. Done once per table.
pub(crate) fn build_keys(columns: &[Column]) -> Box<[BinderKey]> {
    let exact_names: HashSet<&str> = columns.iter().map(|c| c.column_name.as_str()).collect();
    let mut folded_counts: HashMap<String, usize> = HashMap::new();
    for column in columns {
        *folded_counts
            .entry(column.column_name.to_ascii_lowercase())
            .or_insert(0) += 1;
    }

    columns
        .iter()
        .map(|column| {
            let folded = column.column_name.to_ascii_lowercase();
            let unambiguous = folded != column.column_name
                && !exact_names.contains(folded.as_str())
                && folded_counts[&folded] == 1;
            BinderKey {
                exact: encode_key(&column.column_name),
                folded: unambiguous.then(|| encode_key(&folded)),
            }
        })
        .collect()
}

fn encode_key(name: &str) -> String {
    serde_json::to_string(name).expect("a string key always serializes")
}

/// Binds one row onto `T`, by rendering it as a JSON object keyed by column
/// name. Raw `dynamic` spans pass through unchanged.
pub(crate) fn record_from_row<T: serde::de::DeserializeOwned>(row: &Row) -> Result<T> {
    let keys = row.schema().binder_keys();
    let mut object = String::with_capacity(64 * keys.len());
    object.push('{');
    for (key, value) in keys.iter().zip(row.values()) {
        let rendered = serde_json::to_string(value)?;
        for name in std::iter::once(&key.exact).chain(key.folded.as_ref()) {
            if object.len() > 1 {
                object.push(',');
            }
            object.push_str(name);
            object.push(':');
            object.push_str(&rendered);
        }
    }
    object.push('}');

    serde_json::from_str(&object).map_err(|e| {
        KustoError::new(
            Op::Query,
            Kind::WrongColumnType,
            format!(
                "cannot bind row {} into {}: {}",
                row.index(),
                std::any::type_name::<T>(),
                e
            ),
        )
        .into()
    })
}

/// Binds a slice of rows onto `T`, stopping at the first failure.
pub(crate) fn records_from_rows<T: serde::de::DeserializeOwned>(rows: &[Row]) -> Result<Vec<T>> {
    rows.iter().map(record_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnType;
    use crate::operations::row::{decode_row, DecodedRow, Schema};
    use crate::models::v2::RawRow;
    use serde::Deserialize;
    use std::sync::Arc;

    fn row(columns: &[(&str, ColumnType)], raw: &str) -> Row {
        let schema = Schema::new(
            columns
                .iter()
                .map(|(name, ty)| Column {
                    column_name: name.to_string(),
                    column_type: *ty,
                })
                .collect(),
        );
        match decode_row(&schema, &RawRow::from_json(raw).unwrap(), 0).unwrap() {
            DecodedRow::Values(row) => row,
            DecodedRow::Errors(_) => panic!("expected values"),
        }
    }

    #[test]
    fn binds_by_renamed_tags() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Record {
            #[serde(rename = "a")]
            first: i32,
            #[serde(rename = "b")]
            second: String,
        }

        let row = row(
            &[("a", ColumnType::Int), ("b", ColumnType::String)],
            "[1, \"x\"]",
        );
        assert_eq!(
            row.to_record::<Record>().unwrap(),
            Record {
                first: 1,
                second: "x".to_string()
            }
        );
    }

    #[test]
    fn falls_back_to_a_case_insensitive_match() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Record {
            vnum: i32,
        }

        let row = row(&[("VNum", ColumnType::Int)], "[12]");
        assert_eq!(row.to_record::<Record>().unwrap(), Record { vnum: 12 });
    }

    #[test]
    fn exact_names_win_over_folded_ones() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Record {
            vnum: i32,
        }

        // "vnum" exists exactly, so "VNum" keeps only its exact key and the
        // field binds to the lowercase column.
        let row = row(
            &[("VNum", ColumnType::Int), ("vnum", ColumnType::Int)],
            "[1, 2]",
        );
        assert_eq!(row.to_record::<Record>().unwrap(), Record { vnum: 2 });
    }

    #[test]
    fn extra_columns_and_missing_fields_are_ignored() {
        #[derive(Deserialize, PartialEq, Debug, Default)]
        struct Record {
            a: i32,
            #[serde(skip)]
            ignored: Option<String>,
            #[serde(default)]
            missing: i64,
        }

        let row = row(
            &[("a", ColumnType::Int), ("unrelated", ColumnType::String)],
            "[5, \"noise\"]",
        );
        assert_eq!(
            row.to_record::<Record>().unwrap(),
            Record {
                a: 5,
                ignored: None,
                missing: 0
            }
        );
    }

    #[test]
    fn incompatible_destinations_are_wrong_column_type_errors() {
        #[derive(Deserialize, Debug)]
        #[allow(dead_code)]
        struct Record {
            a: String,
        }

        let row = row(&[("a", ColumnType::Int)], "[1]");
        let err = row.to_record::<Record>().unwrap_err();
        assert_eq!(err.kind(), Kind::WrongColumnType);
        assert!(err.to_string().contains('a'), "{err}");
    }

    #[test]
    fn nulls_bind_to_optional_fields() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Record {
            a: Option<i32>,
        }

        let row = row(&[("a", ColumnType::Int)], "[null]");
        assert_eq!(row.to_record::<Record>().unwrap(), Record { a: None });
    }

    #[test]
    fn key_map_is_cached_per_schema() {
        let schema: Arc<Schema> = Schema::new(vec![Column {
            column_name: "A".to_string(),
            column_type: ColumnType::Int,
        }]);
        let first = schema.binder_keys().as_ptr();
        let second = schema.binder_keys().as_ptr();
        assert_eq!(first, second);
    }
}
