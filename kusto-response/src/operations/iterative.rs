//! Iterative datasets: tables and rows are surfaced through bounded
//! channels as the response stream arrives.
//!
//! Three cooperating tasks drive the pipeline: a reader task advancing the
//! frame reader, a decoder task running the dataset state machine, and one
//! row task per table converting raw rows into typed ones. Every blocking
//! send, receive and read races a shared cancellation token, so cancelling
//! the dataset tears the whole pipeline down and releases the input stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures::AsyncBufRead;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::dataset_options::DatasetOptions;
use crate::error::{Error, Kind, KustoError, Op, Result};
use crate::models::v2::{
    Column, DataSetCompletion, DataSetHeader, DataTable, Frame, OneApiError,
    QueryCompletionInformation, QueryProperties, RawRow, TableHeader, TableKind,
};
use crate::operations::frame_reader::{peek_frame_type, FrameReader};
use crate::operations::full::{KustoResponseDataSetV2, Table};
use crate::operations::row::{decode_row, DecodedRow, Row, Schema};

/// A table surfaced by the dataset, or the error that took its place.
pub type TableResult = Result<IterativeTable>;
/// A row surfaced by a table, or the error that took its place.
pub type RowResult = Result<Row>;

/// The small mutable registry shared between the decoder task and the
/// consumer.
#[derive(Default)]
struct Registry {
    header: RwLock<Option<DataSetHeader>>,
    completion: RwLock<Option<DataSetCompletion>>,
    query_properties: RwLock<Option<Vec<QueryProperties>>>,
    query_completion_information: RwLock<Option<Vec<QueryCompletionInformation>>>,
}

impl Registry {
    fn store<T>(slot: &RwLock<Option<T>>, value: T) {
        if let Ok(mut guard) = slot.write() {
            *guard = Some(value);
        }
    }

    fn load<T: Clone>(slot: &RwLock<Option<T>>) -> Option<T> {
        slot.read().ok().and_then(|guard| guard.clone())
    }
}

/// A streaming view over a v2 response.
///
/// The dataset is single-consumer: receive tables with
/// [next_table](Self::next_table) in order, and drain (or
/// [skip](IterativeTable::skip_to_end)) each table's rows before moving to
/// the next. Dropping or [closing](Self::close) the dataset cancels the
/// pipeline and releases the input stream.
pub struct IterativeDataset {
    tables: Receiver<TableResult>,
    registry: Arc<Registry>,
    cancel: CancellationToken,
}

impl IterativeDataset {
    /// Starts decoding the given response body. Spawns the pipeline onto the
    /// current tokio runtime.
    pub fn from_reader(
        reader: impl AsyncBufRead + Send + Unpin + 'static,
        options: DatasetOptions,
    ) -> Self {
        let cancel = CancellationToken::new();
        let registry = Arc::new(Registry::default());
        let (frames_tx, frames_rx) = mpsc::channel(options.frame_capacity.max(1));
        let (tables_tx, tables_rx) = mpsc::channel(1);

        tokio::spawn(read_loop(reader, frames_tx, cancel.clone()));
        tokio::spawn(decode_loop(
            frames_rx,
            tables_tx,
            registry.clone(),
            options,
            cancel.clone(),
        ));

        Self {
            tables: tables_rx,
            registry,
            cancel,
        }
    }

    /// The next table result, or `None` once the stream has ended or the
    /// dataset was cancelled.
    pub async fn next_table(&mut self) -> Option<TableResult> {
        self.tables.recv().await
    }

    /// The validated dataset header, once it has been decoded.
    pub fn header(&self) -> Option<DataSetHeader> {
        Registry::load(&self.registry.header)
    }

    /// The dataset completion frame, once the stream has ended.
    pub fn completion(&self) -> Option<DataSetCompletion> {
        Registry::load(&self.registry.completion)
    }

    /// The decoded `QueryProperties` records. Available once the consumer
    /// has drained past the `QueryProperties` table handle.
    pub fn query_properties(&self) -> Option<Vec<QueryProperties>> {
        Registry::load(&self.registry.query_properties)
    }

    /// The decoded `QueryCompletionInformation` records. Available once the
    /// consumer has drained past the corresponding table handle.
    pub fn query_completion_information(&self) -> Option<Vec<QueryCompletionInformation>> {
        Registry::load(&self.registry.query_completion_information)
    }

    /// Drains the whole stream into a full dataset, returning the first
    /// error encountered instead.
    pub async fn to_dataset(mut self) -> Result<KustoResponseDataSetV2> {
        let mut tables = Vec::new();
        while let Some(result) = self.next_table().await {
            tables.push(result?.to_table().await?);
        }
        Ok(KustoResponseDataSetV2::from_parts(
            tables,
            self.query_properties().unwrap_or_default(),
            self.query_completion_information().unwrap_or_default(),
        ))
    }

    /// Cancels the pipeline and releases the input stream. Idempotent; also
    /// runs on drop.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for IterativeDataset {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// One table of an iterative dataset, with its rows arriving through a
/// bounded channel.
#[derive(Debug)]
pub struct IterativeTable {
    ordinal: usize,
    id: i32,
    name: String,
    kind: TableKind,
    schema: Arc<Schema>,
    rows: Receiver<RowResult>,
    skip: Arc<AtomicBool>,
}

impl IterativeTable {
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

    /// The next row result, or `None` once the table is complete or the
    /// dataset was cancelled.
    pub async fn next_row(&mut self) -> Option<RowResult> {
        self.rows.recv().await
    }

    /// Drains and drops the remaining rows, returning any errors collected
    /// on the way. After a full drain this returns no errors.
    pub async fn skip_to_end(&mut self) -> Vec<Error> {
        self.skip.store(true, Ordering::Relaxed);
        let mut errors = Vec::new();
        while let Some(result) = self.rows.recv().await {
            if let Err(e) = result {
                errors.push(e);
            }
        }
        errors
    }

    /// Materializes the remaining rows into a full table. Fails on the first
    /// row error, and fails outright if the rows were already skipped.
    pub async fn to_table(mut self) -> Result<Table> {
        if self.skip.load(Ordering::Relaxed) {
            return Err(KustoError::new(
                Op::Query,
                Kind::ClientArgs,
                format!("the rows of table {:?} were already skipped", self.name),
            )
            .into());
        }
        let mut rows = Vec::new();
        while let Some(result) = self.rows.recv().await {
            rows.push(result?);
        }
        Ok(Table::from_parts(
            self.ordinal,
            self.id,
            self.name,
            self.kind,
            self.schema,
            rows,
        ))
    }
}

/// One message of the per-table fragment channel.
enum FragmentEnvelope {
    /// Raw rows of one fragment.
    Rows(Vec<RawRow>),
    /// The table is complete: verify the count, surface trailing errors.
    Finish {
        row_count: Option<i32>,
        errors: Vec<OneApiError>,
    },
}

/// Advances the frame reader and feeds parsed frames into the pipeline.
/// Owns the input stream, which is released when this task ends.
async fn read_loop(
    reader: impl AsyncBufRead + Send + Unpin,
    frames_tx: Sender<Result<Frame>>,
    cancel: CancellationToken,
) {
    let mut reader = FrameReader::new(reader, cancel);
    loop {
        match reader.next_frame().await {
            Ok(Some(bytes)) => {
                if peek_frame_type(bytes) == Some("TableProgress") {
                    trace!("ignoring a TableProgress frame");
                    continue;
                }
                let parsed = std::str::from_utf8(bytes)
                    .map_err(|_| {
                        Error::from(KustoError::new(
                            Op::Query,
                            Kind::FailedToParse,
                            "a frame is not valid UTF-8",
                        ))
                    })
                    .and_then(Frame::from_json);
                let fatal = parsed.is_err();
                if frames_tx.send(parsed).await.is_err() || fatal {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = frames_tx.send(Err(e)).await;
                break;
            }
        }
    }
    debug!("response reader finished");
}

/// Runs the dataset state machine over the frame channel.
async fn decode_loop(
    mut frames: Receiver<Result<Frame>>,
    tables_tx: Sender<TableResult>,
    registry: Arc<Registry>,
    options: DatasetOptions,
    cancel: CancellationToken,
) {
    let mut decoder = Decoder {
        tables_tx,
        registry,
        options,
        cancel: cancel.clone(),
        next_ordinal: 0,
        pending_properties: None,
        current: None,
        seen_header: false,
        done: false,
    };

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = frames.recv() => received,
        };
        let Some(result) = received else {
            if !decoder.done && !cancel.is_cancelled() {
                decoder
                    .surface(internal("the stream ended without a DataSetCompletion"))
                    .await;
            }
            break;
        };
        let frame = match result {
            Ok(frame) => frame,
            Err(e) => {
                decoder.surface(e).await;
                break;
            }
        };
        if let Err(e) = decoder.accept(frame).await {
            decoder.surface(e).await;
            cancel.cancel();
            break;
        }
    }
    debug!("dataset decoder finished");
}

/// An in-flight primary-result table, as the decoder tracks it.
struct OpenTable {
    id: i32,
    fragments: Option<Sender<FragmentEnvelope>>,
}

struct Decoder {
    tables_tx: Sender<TableResult>,
    registry: Arc<Registry>,
    options: DatasetOptions,
    cancel: CancellationToken,
    next_ordinal: usize,
    pending_properties: Option<DataTable>,
    current: Option<OpenTable>,
    seen_header: bool,
    done: bool,
}

impl Decoder {
    async fn accept(&mut self, frame: Frame) -> Result<()> {
        if self.done {
            return Err(internal("a frame arrived after the DataSetCompletion"));
        }
        if !self.seen_header {
            return match frame {
                Frame::DataSetHeader(header) => {
                    header.validate()?;
                    Registry::store(&self.registry.header, header);
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
                            self.emit_data_table(properties).await?;
                        }
                        self.emit_data_table(table).await
                    }
                    _ => self.emit_data_table(table).await,
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
                self.open_primary_table(header).await
            }
            Frame::TableFragment(fragment) => {
                let Some(open) = self.current.as_ref() else {
                    return Err(internal("TableFragment without a TableHeader"));
                };
                if open.id != fragment.table_id {
                    warn!(
                        table_id = fragment.table_id,
                        expected = open.id,
                        "dropping a fragment for an unexpected table"
                    );
                    let mismatch = internal(format!(
                        "a fragment arrived for table {} while table {} is open",
                        fragment.table_id, open.id
                    ));
                    return self.report(Err(mismatch)).await;
                }
                self.feed(FragmentEnvelope::Rows(fragment.rows)).await;
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
                if let Some(fragments) = open.fragments {
                    send_or_cancelled(
                        &fragments,
                        FragmentEnvelope::Finish {
                            row_count: Some(completion.row_count),
                            errors: completion.one_api_errors.unwrap_or_default(),
                        },
                        &self.cancel,
                    )
                    .await;
                }
                Ok(())
            }
            Frame::DataSetCompletion(completion) => {
                if self.current.is_some() {
                    return Err(internal("DataSetCompletion while a table is open"));
                }
                if let Some(properties) = self.pending_properties.take() {
                    self.emit_data_table(properties).await?;
                }
                if completion.has_errors {
                    if let Some(errors) = &completion.one_api_errors {
                        for e in errors {
                            self.report(Err(Error::QueryApi(e.clone()))).await?;
                        }
                    }
                }
                Registry::store(&self.registry.completion, completion);
                self.done = true;
                Ok(())
            }
        }
    }

    /// Opens a primary-result table: spawns its row task and hands the
    /// table to the consumer.
    async fn open_primary_table(&mut self, header: TableHeader) -> Result<()> {
        let schema = Schema::new(header.columns);
        let (table, fragments) = self.spawn_table(
            header.table_id,
            header.table_name,
            header.table_kind,
            schema,
        );
        self.current = Some(OpenTable {
            id: header.table_id,
            fragments: Some(fragments),
        });
        self.report(Ok(table)).await
    }

    /// Emits a standalone `DataTable` frame as a table, first caching the
    /// known secondary records.
    async fn emit_data_table(&mut self, table: DataTable) -> Result<()> {
        match table.table_kind {
            TableKind::QueryProperties => {
                match table.deserialize_values::<QueryProperties>() {
                    Ok(records) => {
                        Registry::store(&self.registry.query_properties, records);
                    }
                    Err((partial, e)) => {
                        Registry::store(
                            &self.registry.query_properties,
                            partial.unwrap_or_default(),
                        );
                        self.report(Err(e)).await?;
                    }
                }
            }
            TableKind::QueryCompletionInformation => {
                match table.deserialize_values::<QueryCompletionInformation>() {
                    Ok(records) => {
                        Registry::store(&self.registry.query_completion_information, records);
                    }
                    Err((partial, e)) => {
                        Registry::store(
                            &self.registry.query_completion_information,
                            partial.unwrap_or_default(),
                        );
                        self.report(Err(e)).await?;
                    }
                }
            }
            _ => {}
        }

        let schema = Schema::new(table.columns);
        let (handle, fragments) = self.spawn_table(
            table.table_id,
            table.table_name,
            table.table_kind,
            schema,
        );
        self.report(Ok(handle)).await?;
        send_or_cancelled(&fragments, FragmentEnvelope::Rows(table.rows), &self.cancel).await;
        send_or_cancelled(
            &fragments,
            FragmentEnvelope::Finish {
                row_count: None,
                errors: Vec::new(),
            },
            &self.cancel,
        )
        .await;
        Ok(())
    }

    /// Creates the channels and row task backing one table.
    fn spawn_table(
        &mut self,
        id: i32,
        name: String,
        kind: TableKind,
        schema: Arc<Schema>,
    ) -> (IterativeTable, Sender<FragmentEnvelope>) {
        let skip = Arc::new(AtomicBool::new(false));
        let (fragments_tx, fragments_rx) = mpsc::channel(self.options.fragment_capacity.max(1));
        let (rows_tx, rows_rx) = mpsc::channel(self.options.row_capacity.max(1));
        tokio::spawn(row_loop(
            schema.clone(),
            fragments_rx,
            rows_tx,
            skip.clone(),
            self.cancel.clone(),
        ));
        let table = IterativeTable {
            ordinal: self.next_ordinal,
            id,
            name,
            kind,
            schema,
            rows: rows_rx,
            skip,
        };
        self.next_ordinal += 1;
        (table, fragments_tx)
    }

    /// Sends one table result to the consumer, failing on cancellation.
    async fn report(&self, result: TableResult) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            sent = self.tables_tx.send(result) => sent.map_err(|_| Error::Cancelled),
        }
    }

    /// Feeds the open table's row task. A send failure means the consumer
    /// abandoned the table; its remaining fragments are dropped.
    async fn feed(&mut self, envelope: FragmentEnvelope) {
        let Some(open) = self.current.as_mut() else {
            return;
        };
        if let Some(fragments) = &open.fragments {
            if !send_or_cancelled(fragments, envelope, &self.cancel).await {
                open.fragments = None;
            }
        }
    }

    /// Sends one error result to the consumer, best effort.
    async fn surface(&self, e: Error) {
        let _ = tokio::select! {
            _ = self.cancel.cancelled() => Err(()),
            sent = self.tables_tx.send(Err(e)) => sent.map_err(|_| ()),
        };
    }
}

/// Converts the raw rows of one table into typed row results.
async fn row_loop(
    schema: Arc<Schema>,
    mut fragments: Receiver<FragmentEnvelope>,
    rows_tx: Sender<RowResult>,
    skip: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    // `delivered` numbers the rows handed out; `seen` counts every data row
    // observed, delivered or not, for the row-count check.
    let mut delivered = 0usize;
    let mut seen = 0usize;
    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => return,
            envelope = fragments.recv() => envelope,
        };
        let Some(envelope) = envelope else {
            // The decoder dropped the table without completing it; the
            // channel close is the only signal the consumer needs.
            return;
        };
        match envelope {
            FragmentEnvelope::Rows(rows) => {
                for raw in rows {
                    if skip.load(Ordering::Relaxed) && !raw.is_error() {
                        seen += 1;
                        continue;
                    }
                    match decode_row(&schema, &raw, delivered) {
                        Ok(DecodedRow::Values(row)) => {
                            seen += 1;
                            delivered += 1;
                            if !send_row(&rows_tx, Ok(row), &cancel).await {
                                return;
                            }
                        }
                        Ok(DecodedRow::Errors(errors)) => {
                            for e in errors {
                                if !send_row(&rows_tx, Err(Error::QueryApi(e)), &cancel).await {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            seen += 1;
                            if !send_row(&rows_tx, Err(e), &cancel).await {
                                return;
                            }
                        }
                    }
                }
            }
            FragmentEnvelope::Finish { row_count, errors } => {
                if let Some(expected) = row_count {
                    if expected as usize != seen {
                        let mismatch = internal(format!(
                            "the table reported {expected} rows but delivered {seen}"
                        ));
                        if !send_row(&rows_tx, Err(mismatch), &cancel).await {
                            return;
                        }
                    }
                }
                for e in errors {
                    if !send_row(&rows_tx, Err(Error::QueryApi(e)), &cancel).await {
                        return;
                    }
                }
                return;
            }
        }
    }
}

async fn send_row(tx: &Sender<RowResult>, result: RowResult, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(result) => sent.is_ok(),
    }
}

async fn send_or_cancelled(
    tx: &Sender<FragmentEnvelope>,
    envelope: FragmentEnvelope,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(envelope) => sent.is_ok(),
    }
}

fn internal(message: impl Into<String>) -> Error {
    KustoError::new(Op::Query, Kind::Internal, message).into()
}
