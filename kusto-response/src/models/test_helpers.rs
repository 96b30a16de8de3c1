//! Literal wire fixtures and the frames they are expected to parse into.

use crate::models::v2::{
    Column, DataSetCompletion, DataSetHeader, DataTable, ErrorReportingPlacement, Frame, RawRow,
    TableCompletion, TableFragment, TableFragmentType, TableHeader, TableKind,
};
use crate::models::ColumnType;

pub(crate) const V2_VALID_FRAMES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/inputs/v2/validFrames.json"
));
pub(crate) const V2_TWO_TABLES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/inputs/v2/twoTables.json"
));
pub(crate) const V2_PARTIAL_ERROR: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/inputs/v2/partialError.json"
));
pub(crate) const V2_PARTIAL_ERROR_FULL_DATASET: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/inputs/v2/partialErrorFullDataset.json"
));

pub(crate) fn raw_row(text: &str) -> RawRow {
    RawRow::from_json(text).expect("fixture rows are valid JSON")
}

fn column(name: &str, column_type: ColumnType) -> Column {
    Column {
        column_name: name.to_string(),
        column_type,
    }
}

fn query_properties_table(table_id: i32) -> DataTable {
    DataTable {
        table_id,
        table_name: "@ExtendedProperties".to_string(),
        table_kind: TableKind::QueryProperties,
        columns: vec![
            column("TableId", ColumnType::Int),
            column("Key", ColumnType::String),
            column("Value", ColumnType::Dynamic),
        ],
        rows: vec![raw_row(
            r#"[1,"Visualization","{\"Visualization\":null,\"Accumulate\":false,\"IsQuerySorted\":false,\"Ymin\":\"NaN\",\"Ymax\":\"NaN\"}"]"#,
        )],
    }
}

fn query_completion_information_columns() -> Vec<Column> {
    vec![
        column("Timestamp", ColumnType::Datetime),
        column("ClientRequestId", ColumnType::String),
        column("ActivityId", ColumnType::Guid),
        column("SubActivityId", ColumnType::Guid),
        column("ParentActivityId", ColumnType::Guid),
        column("Level", ColumnType::Int),
        column("LevelName", ColumnType::String),
        column("StatusCode", ColumnType::Int),
        column("StatusCodeName", ColumnType::String),
        column("EventType", ColumnType::Int),
        column("EventTypeName", ColumnType::String),
        column("Payload", ColumnType::String),
    ]
}

pub(crate) fn expected_v2_two_tables() -> Vec<Frame> {
    vec![
        Frame::DataSetHeader(DataSetHeader {
            is_progressive: false,
            version: "v2.0".to_string(),
            is_fragmented: Some(true),
            error_reporting_placement: Some(ErrorReportingPlacement::EndOfTable),
        }),
        Frame::DataTable(query_properties_table(0)),
        Frame::TableHeader(TableHeader {
            table_id: 1,
            table_name: "PrimaryResult".to_string(),
            table_kind: TableKind::PrimaryResult,
            columns: vec![column("A", ColumnType::Int)],
        }),
        Frame::TableFragment(TableFragment {
            table_id: 1,
            table_fragment_type: Some(TableFragmentType::DataAppend),
            rows: vec![raw_row("[1]")],
        }),
        Frame::TableFragment(TableFragment {
            table_id: 1,
            table_fragment_type: Some(TableFragmentType::DataAppend),
            rows: vec![raw_row("[2]"), raw_row("[3]")],
        }),
        Frame::TableCompletion(TableCompletion {
            table_id: 1,
            row_count: 3,
            one_api_errors: None,
        }),
        Frame::TableHeader(TableHeader {
            table_id: 2,
            table_name: "PrimaryResult".to_string(),
            table_kind: TableKind::PrimaryResult,
            columns: vec![column("A", ColumnType::String), column("B", ColumnType::Int)],
        }),
        Frame::TableFragment(TableFragment {
            table_id: 2,
            table_fragment_type: Some(TableFragmentType::DataAppend),
            rows: vec![raw_row(r#"["a",1]"#)],
        }),
        Frame::TableFragment(TableFragment {
            table_id: 2,
            table_fragment_type: Some(TableFragmentType::DataAppend),
            rows: vec![raw_row(r#"["b",2]"#), raw_row(r#"["c",3]"#)],
        }),
        Frame::TableCompletion(TableCompletion {
            table_id: 2,
            row_count: 3,
            one_api_errors: None,
        }),
        Frame::DataTable(DataTable {
            table_id: 3,
            table_name: "QueryCompletionInformation".to_string(),
            table_kind: TableKind::QueryCompletionInformation,
            columns: query_completion_information_columns(),
            rows: vec![
                raw_row(
                    r#"["2023-11-28T11:13:43.2514779Z","blab6","123e27de-1e4e-49d9-b579-fe0b331d3642","123e27de-1e4e-49d9-b579-fe0b331d3642","123e27de-1e4e-49d9-b579-fe0b331d3642",4,"Info",0,"S_OK (0)",4,"QueryInfo","{\"Count\":1,\"Text\":\"Query completed successfully\"}"]"#,
                ),
                raw_row(
                    r#"["2023-11-28T11:13:43.2514779Z","blab6","123e27de-1e4e-49d9-b579-fe0b331d3642","123e27de-1e4e-49d9-b579-fe0b331d3642","123e27de-1e4e-49d9-b579-fe0b331d3642",4,"Info",0,"S_OK (0)",5,"WorkloadGroup","{\"Count\":1,\"Text\":\"default\"}"]"#,
                ),
            ],
        }),
        Frame::DataSetCompletion(DataSetCompletion {
            has_errors: false,
            cancelled: false,
            one_api_errors: None,
        }),
    ]
}
