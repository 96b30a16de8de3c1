//! Full-mode datasets: the entire response is read before any decoding, and
//! the dataset state machine runs synchronously.

use std::sync::Arc;

use bytes::Bytes;
use futures::{AsyncRead, AsyncReadExt};
use serde_json::value::RawValue;
use tracing::warn;

use crate::error::{Error, Kind, KustoError, Op, Partial, Result};
use crate::models::v2::{
    Column, DataTable, Frame, QueryCompletionInformation, QueryProperties, TableKind,
};
use crate::operations::binder;
use crate::operations::frame_reader::envelope_error;
use crate::operations::row::{decode_row, DecodedRow, Row, Schema};

/// A fully materialized table.
#[derive(Debug, Clone)]
pub struct Table {
    ordinal: usize,
    id: i32,
    name: String,
    kind: TableKind,
    schema: Arc<Schema>,
    rows: Vec<Row>,
}

impl Table {
    pub(crate) fn from_parts(
        ordinal: usize,
        id: i32,
        name: String,
        kind: TableKind,
        schema: Arc<Schema>,
        rows: Vec<Row>,
    ) -> Self {
        Self {
            ordinal,
            id,
            name,
            kind,
            schema,
            rows,
        }
    }

    /// The position of the table within the dataset, in emission order.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The wire id of the table.
    pub fn id(&self) -> i32 {
        self.id
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
    pub fn columns(&self) -> &[Column] {
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

    /// Consumes the table into its rows.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// The ordinal of the column with the given name. Case-sensitive.
    pub fn column_ordinal(&self, name: &str) -> Option<usize> {
        self.schema.ordinal_of(name)
    }

    /// Binds every row onto a user record type, stopping at the first
    /// failure.
    pub fn to_records<T: serde::de::DeserializeOwned>(&self) -> Result<Vec<T>> {
        binder::records_from_rows(&self.rows)
    }
}

/// Reads a whole response body and splits it into frames.
pub async fn parse_frames_full(
    mut reader: impl AsyncRead + Send + Unpin,
) -> Result<Vec<Frame>> {
    let mut body = String::new();
    reader.read_to_string(&mut body).await?;
    parse_frames(&body)
}

fn parse_frames(body: &str) -> Result<Vec<Frame>> {
    if body.trim_start().as_bytes().first() != Some(&b'[') {
        return Err(envelope_error(Bytes::copy_from_slice(body.as_bytes())));
    }
    let raw_frames: Vec<&RawValue> = serde_json::from_str(body)?;
    raw_frames
        .into_iter()
        .map(|raw| Frame::from_json(raw.get()))
        .collect()
}

/// The result of decoding a full v2 response: every table materialized, with
/// the known secondary tables additionally decoded into records.
#[derive(Debug, Clone, Default)]
pub struct KustoResponseDataSetV2 {
    tables: Vec<Table>,
    query_properties: Vec<QueryProperties>,
    query_completion_information: Vec<QueryCompletionInformation>,
}

impl KustoResponseDataSetV2 {
    /// Reads a whole response body and decodes it. Server-reported failures
    /// keep whatever part of the dataset was decodable.
    pub async fn from_reader(reader: impl AsyncRead + Send + Unpin) -> Partial<Self> {
        let frames = parse_frames_full(reader).await.map_err(|e| (None, e))?;
        Self::from_frames(frames)
    }

    pub(crate) fn from_parts(
        tables: Vec<Table>,
        query_properties: Vec<QueryProperties>,
        query_completion_information: Vec<QueryCompletionInformation>,
    ) -> Self {
        Self {
            tables,
            query_properties,
            query_completion_information,
        }
    }

    /// Runs the dataset state machine over a list of frames.
    pub fn from_frames(frames: Vec<Frame>) -> Partial<Self> {
        Decoder::default().run(frames)
    }

    /// The number of tables in the dataset.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// All tables, in emission order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// The primary result tables.
    pub fn primary_results(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().filter(|t| t.is_primary_result())
    }

    /// Consumes the response into an iterator over all primary result tables.
    pub fn into_primary_results(self) -> impl Iterator<Item = Table> {
        self.tables.into_iter().filter(Table::is_primary_result)
    }

    /// The decoded `QueryProperties` records.
    pub fn query_properties(&self) -> &[QueryProperties] {
        &self.query_properties
    }

    /// The decoded `QueryCompletionInformation` records.
    pub fn query_completion_information(&self) -> &[QueryCompletionInformation] {
        &self.query_completion_information
    }
}

/// An in-flight primary-result table.
struct OpenTable {
    id: i32,
    name: String,
    kind: TableKind,
    schema: Arc<Schema>,
    rows: Vec<Row>,
    seen_rows: usize,
}

#[derive(Default)]
struct Decoder {
    tables: Vec<Table>,
    errors: Vec<Error>,
    pending_properties: Option<DataTable>,
    query_properties: Vec<QueryProperties>,
    query_completion_information: Vec<QueryCompletionInformation>,
    current: Option<OpenTable>,
    seen_header: bool,
    done: bool,
}

impl Decoder {
    fn run(mut self, frames: Vec<Frame>) -> Partial<KustoResponseDataSetV2> {
        for frame in frames {
            if let Err(e) = self.accept(frame) {
                return Err((self.into_partial(), e));
            }
        }
        if !self.done {
            let e = internal("the stream ended without a DataSetCompletion");
            return Err((self.into_partial(), e));
        }

        let errors = std::mem::take(&mut self.errors);
        let dataset = self.into_dataset();
        if errors.is_empty() {
            Ok(dataset)
        } else {
            Err((Some(dataset), errors.into()))
        }
    }

    fn accept(&mut self, frame: Frame) -> Result<()> {
        if self.done {
            return Err(internal("a frame arrived after the DataSetCompletion"));
        }
        if !self.seen_header {
            return match frame {
                Frame::DataSetHeader(header) => {
                    header.validate()?;
                    self.seen_header = true;
                    Ok(())
                }
                Frame::TableProgress(_) => Ok(()),
                _ => Err(internal("the stream must open with a DataSetHeader")),
            };
        }

        match frame {
            Frame::DataSetHeader(_) => Err(internal("duplicate DataSetHeader")),
            Frame::TableProgress(_) => Ok(()),
            Frame::DataTable(table) => {
                if self.current.is_some() {
                    return Err(internal("DataTable while a primary result is open"));
                }
                match table.table_kind {
                    TableKind::QueryProperties => {
                        self.pending_properties = Some(table);
                        Ok(())
                    }
                    TableKind::QueryCompletionInformation => {
                        if let Some(properties) = self.pending_properties.take() {
                            self.materialize_data_table(properties);
                        }
                        self.materialize_data_table(table);
                        Ok(())
                    }
                    _ => {
                        self.materialize_data_table(table);
                        Ok(())
                    }
                }
            }
            Frame::TableHeader(header) => {
                if self.current.is_some() {
                    return Err(internal("TableHeader while another table is open"));
                }
                if header.table_kind != TableKind::PrimaryResult {
                    return Err(internal(format!(
                        "a fragmented table must be a PrimaryResult, got {}",
                        header.table_kind
                    )));
                }
                self.current = Some(OpenTable {
                    id: header.table_id,
                    name: header.table_name,
                    kind: header.table_kind,
                    schema: Schema::new(header.columns),
                    rows: Vec::new(),
                    seen_rows: 0,
                });
                Ok(())
            }
            Frame::TableFragment(fragment) => {
                let Some(open) = self.current.as_mut() else {
                    return Err(internal("TableFragment without a TableHeader"));
                };
                if open.id != fragment.table_id {
                    warn!(
                        table_id = fragment.table_id,
                        expected = open.id,
                        "dropping a fragment for an unexpected table"
                    );
                    self.errors.push(internal(format!(
                        "a fragment arrived for table {} while table {} is open",
                        fragment.table_id, open.id
                    )));
                    return Ok(());
                }
                let schema = open.schema.clone();
                for raw in &fragment.rows {
                    match decode_row(&schema, raw, open.rows.len()) {
                        Ok(DecodedRow::Values(row)) => {
                            open.seen_rows += 1;
                            open.rows.push(row);
                        }
                        Ok(DecodedRow::Errors(errors)) => self
                            .errors
                            .extend(errors.into_iter().map(Error::QueryApi)),
                        Err(e) => {
                            open.seen_rows += 1;
                            self.errors.push(e);
                        }
                    }
                }
                Ok(())
            }
            Frame::TableCompletion(completion) => {
                let Some(open) = self.current.take() else {
                    return Err(internal("TableCompletion without a TableHeader"));
                };
                if open.id != completion.table_id {
                    return Err(internal(format!(
                        "a completion arrived for table {} while table {} is open",
                        completion.table_id, open.id
                    )));
                }
                if completion.row_count as usize != open.seen_rows {
                    self.errors.push(internal(format!(
                        "table {} reported {} rows but delivered {}",
                        open.id, completion.row_count, open.seen_rows
                    )));
                }
                if let Some(errors) = completion.one_api_errors {
                    self.errors.extend(errors.into_iter().map(Error::QueryApi));
                }
                self.tables.push(Table::from_parts(
                    self.tables.len(),
                    open.id,
                    open.name,
                    open.kind,
                    open.schema,
                    open.rows,
                ));
                Ok(())
            }
            Frame::DataSetCompletion(completion) => {
                if self.current.is_some() {
                    return Err(internal("DataSetCompletion while a table is open"));
                }
                if let Some(properties) = self.pending_properties.take() {
                    self.materialize_data_table(properties);
                }
                if completion.has_errors {
                    if let Some(errors) = completion.one_api_errors {
                        self.errors.extend(errors.into_iter().map(Error::QueryApi));
                    }
                }
                self.done = true;
                Ok(())
            }
        }
    }

    /// Materializes a standalone `DataTable` frame, decoding the known
    /// secondary tables into records as well.
    fn materialize_data_table(&mut self, table: DataTable) {
        match table.table_kind {
            TableKind::QueryProperties => {
                match table.deserialize_values::<QueryProperties>() {
                    Ok(records) => self.query_properties = records,
                    Err((partial, e)) => {
                        self.query_properties = partial.unwrap_or_default();
                        self.errors.push(e);
                    }
                }
            }
            TableKind::QueryCompletionInformation => {
                match table.deserialize_values::<QueryCompletionInformation>() {
                    Ok(records) => self.query_completion_information = records,
                    Err((partial, e)) => {
                        self.query_completion_information = partial.unwrap_or_default();
                        self.errors.push(e);
                    }
                }
            }
            _ => {}
        }

        let schema = Schema::new(table.columns);
        let mut rows = Vec::with_capacity(table.rows.len());
        for raw in &table.rows {
            match decode_row(&schema, raw, rows.len()) {
                Ok(DecodedRow::Values(row)) => rows.push(row),
                Ok(DecodedRow::Errors(errors)) => self
                    .errors
                    .extend(errors.into_iter().map(Error::QueryApi)),
                Err(e) => self.errors.push(e),
            }
        }
        self.tables.push(Table::from_parts(
            self.tables.len(),
            table.table_id,
            table.table_name,
            table.table_kind,
            schema,
            rows,
        ));
    }

    fn into_partial(self) -> Option<KustoResponseDataSetV2> {
        if self.tables.is_empty() {
            None
        } else {
            Some(self.into_dataset())
        }
    }

    fn into_dataset(self) -> KustoResponseDataSetV2 {
        KustoResponseDataSetV2 {
            tables: self.tables,
            query_properties: self.query_properties,
            query_completion_information: self.query_completion_information,
        }
    }
}

fn internal(message: impl Into<String>) -> Error {
    KustoError::new(Op::Query, Kind::Internal, message).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PartialExt;
    use crate::models::test_helpers::{
        expected_v2_two_tables, raw_row, V2_PARTIAL_ERROR, V2_PARTIAL_ERROR_FULL_DATASET,
        V2_TWO_TABLES, V2_VALID_FRAMES,
    };
    use crate::models::v2::{
        DataSetCompletion, DataSetHeader, ErrorReportingPlacement, TableCompletion, TableFragment,
        TableHeader,
    };
    use crate::models::ColumnType;
    use crate::types::{KustoInt, KustoValue};
    use futures::io::Cursor;

    fn valid_header() -> Frame {
        Frame::DataSetHeader(DataSetHeader {
            is_progressive: false,
            version: "v2.0".to_string(),
            is_fragmented: Some(true),
            error_reporting_placement: Some(ErrorReportingPlacement::EndOfTable),
        })
    }

    fn completion() -> Frame {
        Frame::DataSetCompletion(DataSetCompletion {
            has_errors: false,
            cancelled: false,
            one_api_errors: None,
        })
    }

    fn int_table_header(table_id: i32) -> Frame {
        Frame::TableHeader(TableHeader {
            table_id,
            table_name: "PrimaryResult".to_string(),
            table_kind: TableKind::PrimaryResult,
            columns: vec![Column {
                column_name: "A".to_string(),
                column_type: ColumnType::Int,
            }],
        })
    }

    #[tokio::test]
    async fn test_parse_frames_full() {
        let reader = Cursor::new(V2_TWO_TABLES.as_bytes());
        let parsed = parse_frames_full(reader).await.unwrap();
        assert_eq!(parsed, expected_v2_two_tables());
    }

    #[tokio::test]
    async fn decodes_two_tables_in_emission_order() {
        let reader = Cursor::new(V2_TWO_TABLES.as_bytes());
        let dataset = KustoResponseDataSetV2::from_reader(reader).await.unwrap();

        let names: Vec<_> = dataset.tables().iter().map(Table::name).collect();
        assert_eq!(
            names,
            vec![
                "PrimaryResult",
                "PrimaryResult",
                "@ExtendedProperties",
                "QueryCompletionInformation"
            ]
        );
        let ordinals: Vec<_> = dataset.tables().iter().map(Table::ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
        let ids: Vec<_> = dataset.tables().iter().map(Table::id).collect();
        assert_eq!(ids, vec![1, 2, 0, 3]);

        let first = &dataset.tables()[0];
        let values: Vec<_> = first
            .rows()
            .iter()
            .map(|r| r.get("A").unwrap().clone())
            .collect();
        assert_eq!(
            values,
            vec![
                KustoValue::Int(KustoInt::new(1)),
                KustoValue::Int(KustoInt::new(2)),
                KustoValue::Int(KustoInt::new(3)),
            ]
        );
        let indices: Vec<_> = first.rows().iter().map(Row::index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        assert_eq!(dataset.query_properties().len(), 1);
        assert_eq!(dataset.query_completion_information().len(), 2);
        assert_eq!(dataset.primary_results().count(), 2);
    }

    #[tokio::test]
    async fn decodes_every_scalar_kind() {
        let reader = Cursor::new(V2_VALID_FRAMES.as_bytes());
        let dataset = KustoResponseDataSetV2::from_reader(reader).await.unwrap();

        let table = dataset
            .primary_results()
            .next()
            .expect("the fixture has a primary table");
        assert_eq!(table.name(), "AllDataTypes");
        let row = &table.rows()[0];
        assert_eq!(row.get("vnum").unwrap().to_string(), "1");
        assert_eq!(row.get("vdec").unwrap().to_string(), "2.00000000000001");
        assert_eq!(
            row.get("vdate").unwrap().to_string(),
            "2020-03-04T14:05:01.3109965Z"
        );
        assert_eq!(row.get("vspan").unwrap().to_string(), "01:23:45.6789000");
        assert_eq!(
            row.get("vobj").unwrap().to_string(),
            "{\"moshe\":\"value\"}"
        );
        assert_eq!(row.get("vb").unwrap().to_string(), "true");
        assert_eq!(row.get("vreal").unwrap().to_string(), "0.01");
        assert_eq!(row.get("vstr").unwrap().to_string(), "asdf");
        assert_eq!(row.get("vlong").unwrap().to_string(), "9223372036854775807");
        assert_eq!(
            row.get("vguid").unwrap().to_string(),
            "123e27de-1e4e-49d9-b579-fe0b331d3642"
        );

        let nulls = &table.rows()[1];
        assert!(nulls.values().iter().all(KustoValue::is_null));
    }

    #[tokio::test]
    async fn partial_error_keeps_decoded_rows() {
        let reader = Cursor::new(V2_PARTIAL_ERROR.as_bytes());
        let (partial, error) = match KustoResponseDataSetV2::from_reader(reader).await {
            Err((partial, error)) => (partial, error),
            Ok(_) => panic!("expected a partial failure"),
        };

        let dataset = partial.expect("the decoded rows are kept");
        let table = dataset
            .primary_results()
            .next()
            .expect("the primary table was decoded");
        assert_eq!(table.rows().len(), 1);
        assert!(error.to_string().contains("LimitsExceeded"), "{error}");
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn non_fragmented_header_is_fatal() {
        let frames = parse_frames_full(Cursor::new(V2_PARTIAL_ERROR_FULL_DATASET.as_bytes()))
            .await
            .unwrap();
        let error = KustoResponseDataSetV2::from_frames(frames)
            .ignore_partial_results()
            .unwrap_err();
        assert_eq!(error.kind(), Kind::Internal);
        assert!(error.to_string().contains("fragmented"), "{error}");
    }

    #[test]
    fn wrong_version_is_fatal() {
        let frames = vec![
            Frame::DataSetHeader(DataSetHeader {
                is_progressive: false,
                version: "V1".to_string(),
                is_fragmented: Some(true),
                error_reporting_placement: Some(ErrorReportingPlacement::EndOfTable),
            }),
            completion(),
        ];
        let error = KustoResponseDataSetV2::from_frames(frames)
            .ignore_partial_results()
            .unwrap_err();
        assert!(error.to_string().contains("v2"), "{error}");
    }

    #[test]
    fn fragment_before_header_is_fatal() {
        let frames = vec![
            valid_header(),
            Frame::TableFragment(TableFragment {
                table_id: 1,
                table_fragment_type: None,
                rows: vec![raw_row("[1]")],
            }),
        ];
        let error = KustoResponseDataSetV2::from_frames(frames)
            .ignore_partial_results()
            .unwrap_err();
        assert_eq!(error.kind(), Kind::Internal);
        assert!(error.to_string().contains("TableHeader"), "{error}");
    }

    #[test]
    fn non_primary_table_header_is_fatal() {
        let frames = vec![
            valid_header(),
            Frame::TableHeader(TableHeader {
                table_id: 1,
                table_name: "QueryProperties".to_string(),
                table_kind: TableKind::QueryProperties,
                columns: vec![],
            }),
        ];
        let error = KustoResponseDataSetV2::from_frames(frames)
            .ignore_partial_results()
            .unwrap_err();
        assert!(error.to_string().contains("PrimaryResult"), "{error}");
    }

    #[test]
    fn premature_dataset_completion_is_fatal() {
        let frames = vec![valid_header(), int_table_header(1), completion()];
        let error = KustoResponseDataSetV2::from_frames(frames)
            .ignore_partial_results()
            .unwrap_err();
        assert!(error.to_string().contains("open"), "{error}");
    }

    #[test]
    fn missing_completion_is_fatal() {
        let frames = vec![valid_header()];
        let error = KustoResponseDataSetV2::from_frames(frames)
            .ignore_partial_results()
            .unwrap_err();
        assert!(error.to_string().contains("DataSetCompletion"), "{error}");
    }

    #[test]
    fn row_count_mismatch_is_reported() {
        let frames = vec![
            valid_header(),
            int_table_header(1),
            Frame::TableFragment(TableFragment {
                table_id: 1,
                table_fragment_type: None,
                rows: vec![raw_row("[1]")],
            }),
            Frame::TableCompletion(TableCompletion {
                table_id: 1,
                row_count: 5,
                one_api_errors: None,
            }),
            completion(),
        ];
        let (partial, error) = match KustoResponseDataSetV2::from_frames(frames) {
            Err((partial, error)) => (partial, error),
            Ok(_) => panic!("expected the mismatch to be reported"),
        };
        assert_eq!(partial.unwrap().tables()[0].rows().len(), 1);
        assert!(error.to_string().contains("5"), "{error}");
    }

    #[test]
    fn mismatched_fragment_is_not_fatal() {
        let frames = vec![
            valid_header(),
            int_table_header(1),
            Frame::TableFragment(TableFragment {
                table_id: 9,
                table_fragment_type: None,
                rows: vec![raw_row("[1]")],
            }),
            Frame::TableFragment(TableFragment {
                table_id: 1,
                table_fragment_type: None,
                rows: vec![raw_row("[2]")],
            }),
            Frame::TableCompletion(TableCompletion {
                table_id: 1,
                row_count: 1,
                one_api_errors: None,
            }),
            completion(),
        ];
        let (partial, error) = match KustoResponseDataSetV2::from_frames(frames) {
            Err((partial, error)) => (partial, error),
            Ok(_) => panic!("expected the stray fragment to be reported"),
        };
        let dataset = partial.expect("decoding continued past the stray fragment");
        assert_eq!(dataset.tables()[0].rows().len(), 1);
        assert!(error.to_string().contains("table 9"), "{error}");
    }

    #[test]
    fn unknown_column_type_is_fatal() {
        let error = Frame::from_json(
            r#"{"FrameType":"TableHeader","TableId":1,"TableKind":"PrimaryResult","TableName":"T","Columns":[{"ColumnName":"A","ColumnType":"widget"}]}"#,
        )
        .unwrap_err();
        assert_eq!(error.kind(), Kind::Internal);
    }

    #[test]
    fn unknown_frame_type_is_fatal() {
        let error = Frame::from_json(r#"{"FrameType":"Mystery"}"#).unwrap_err();
        assert!(error.to_string().contains("Mystery"), "{error}");
    }
}
