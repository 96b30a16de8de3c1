//! Defines [Error] for representing failures in various operations.
use std::fmt::{Display, Formatter};

use crate::models::v2::OneApiError;

/// What a call site was attempting when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Op {
    /// Executing a query.
    Query,
    /// Executing a management command.
    Mgmt,
    /// Establishing or using a connection to the service.
    ServerConnection,
    /// Ingesting data.
    Ingest,
    /// Ingesting data from a file.
    FileIngest,
    /// Ingesting data from a stream.
    IngestStream,
    /// Accessing a table.
    TableAccess,
    /// The operation is not known.
    #[default]
    Unknown,
}

impl Op {
    fn as_str(&self) -> &'static str {
        match self {
            Op::Query => "Query",
            Op::Mgmt => "Mgmt",
            Op::ServerConnection => "ServerConnection",
            Op::Ingest => "Ingest",
            Op::FileIngest => "FileIngest",
            Op::IngestStream => "IngestStream",
            Op::TableAccess => "TableAccess",
            Op::Unknown => "Unknown",
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse category of a failure. Drives retry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kind {
    /// The operation timed out.
    Timeout,
    /// The service returned an HTTP-level error.
    HttpError,
    /// A local file system failure.
    LocalFileSystem,
    /// A protocol violation or another internal invariant failure.
    Internal,
    /// An I/O failure on the underlying stream.
    Io,
    /// The caller passed invalid arguments.
    ClientArgs,
    /// Multi-factor authentication is not supported for this flow.
    MfaNotSupported,
    /// The token provider failed to produce a credential.
    TokenProvider,
    /// The target database does not exist.
    DbNotExist,
    /// The query exceeded service limits.
    LimitsExceeded,
    /// A value or destination did not match the declared column type.
    WrongColumnType,
    /// A payload could not be parsed.
    FailedToParse,
    /// The request was blocked by the service.
    Blocked,
    /// The target table does not exist.
    TableNotExist,
    /// Any other failure.
    #[default]
    Other,
}

impl Kind {
    fn as_str(&self) -> &'static str {
        match self {
            Kind::Timeout => "Timeout",
            Kind::HttpError => "HttpError",
            Kind::LocalFileSystem => "LocalFileSystem",
            Kind::Internal => "Internal",
            Kind::Io => "Io",
            Kind::ClientArgs => "ClientArgs",
            Kind::MfaNotSupported => "MfaNotSupported",
            Kind::TokenProvider => "TokenProvider",
            Kind::DbNotExist => "DbNotExist",
            Kind::LimitsExceeded => "LimitsExceeded",
            Kind::WrongColumnType => "WrongColumnType",
            Kind::FailedToParse => "FailedToParse",
            Kind::Blocked => "Blocked",
            Kind::TableNotExist => "TableNotExist",
            Kind::Other => "Other",
        }
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single categorized failure: the attempted operation, the failure
/// category, a message, and optionally the cause, a permanence override and
/// the raw server error payload.
#[derive(thiserror::Error, Debug)]
#[error("{op}: {kind}: {message}")]
pub struct KustoError {
    op: Op,
    kind: Kind,
    message: String,
    #[source]
    source: Option<Box<Error>>,
    permanent: Option<bool>,
    payload: Option<Box<OneApiError>>,
}

impl KustoError {
    /// Creates a new error from its operation, kind and message.
    pub fn new(op: Op, kind: Kind, message: impl Into<String>) -> Self {
        Self {
            op,
            kind,
            message: message.into(),
            source: None,
            permanent: None,
            payload: None,
        }
    }

    /// Attaches the error that caused this one.
    pub fn with_source(mut self, source: Error) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Overrides the permanence of the error, regardless of its kind.
    pub fn with_permanence(mut self, permanent: bool) -> Self {
        self.permanent = Some(permanent);
        self
    }

    /// Attaches the raw server error payload.
    pub fn with_payload(mut self, payload: OneApiError) -> Self {
        self.payload = Some(Box::new(payload));
        self
    }

    /// The operation that was attempted.
    pub fn op(&self) -> Op {
        self.op
    }

    /// The category of the failure.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The raw server error payload, if one was attached.
    pub fn payload(&self) -> Option<&OneApiError> {
        self.payload.as_deref()
    }

    fn is_retryable(&self) -> bool {
        if self.permanent == Some(true) {
            return false;
        }
        match self.kind {
            // A timeout wrapping one of our own errors is only as retryable
            // as its cause; a foreign cause imposes no constraint.
            Kind::Timeout => match self.source.as_deref() {
                Some(inner @ (Error::Kusto(_) | Error::Multiple(_))) => inner.is_retryable(),
                _ => true,
            },
            Kind::HttpError => self.payload.as_deref().map_or(true, |p| !p.is_permanent()),
            _ => false,
        }
    }
}

/// Error type for kusto operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A categorized failure in a kusto operation.
    #[error(transparent)]
    Kusto(#[from] KustoError),

    /// Error relating to (de-)serialization of JSON data
    #[error("Error in JSON serialization/deserialization: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors raised for IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error in parsing
    #[error("Error in parsing: {0}")]
    Parse(#[from] ParseError),

    /// Errors raised from the api calls to kusto
    #[error("Query API error: {0}")]
    QueryApi(OneApiError),

    /// Multiple errors
    #[error("Multiple errors: {0:?}")]
    Multiple(Vec<Error>),

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// The category of the failure.
    pub fn kind(&self) -> Kind {
        match self {
            Error::Kusto(e) => e.kind(),
            Error::Json(_) => Kind::FailedToParse,
            Error::Io(_) => Kind::Io,
            Error::Parse(e) => e.kind(),
            Error::QueryApi(e) => e.kind(),
            Error::Multiple(_) | Error::Cancelled => Kind::Other,
        }
    }

    /// Whether the failed operation is worth retrying.
    ///
    /// Timeouts are retryable unless their cause is not; HTTP and server
    /// errors follow the payload's `@permanent` flag (missing means
    /// retryable); everything else is permanent. A combined error is
    /// retryable only if every constituent is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kusto(e) => e.is_retryable(),
            Error::QueryApi(e) => !e.is_permanent(),
            Error::Multiple(errors) => {
                !errors.is_empty() && errors.iter().all(Error::is_retryable)
            }
            _ => false,
        }
    }

    /// The individual failures inside a combined error; any other error
    /// yields itself as the single element.
    ///
    /// The returned slice never contains the combined container itself, so
    /// structural walks over an error graph terminate.
    pub fn constituents(&self) -> &[Error] {
        match self {
            Error::Multiple(errors) => errors,
            other => std::slice::from_ref(other),
        }
    }

    /// Combines errors into one, collapsing a singleton into the error
    /// itself.
    pub fn combine(errors: Vec<Error>) -> Self {
        errors.into()
    }
}

impl From<Vec<Error>> for Error {
    fn from(mut errors: Vec<Error>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Error::Multiple(errors)
        }
    }
}

impl From<Vec<OneApiError>> for Error {
    fn from(errors: Vec<OneApiError>) -> Self {
        errors
            .into_iter()
            .map(Error::QueryApi)
            .collect::<Vec<_>>()
            .into()
    }
}

/// Errors raised when parsing values.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    /// Raised when a value is null, but the type is not nullable.
    #[error("Error parsing null value for {0}")]
    ValueNull(String),
    /// Raised when an int value is failed to be parsed.
    #[error("Error parsing int: {0}")]
    Int(#[from] std::num::ParseIntError),
    /// Raised when a real value is failed to be parsed.
    #[error("Error parsing float: {0}")]
    Float(#[from] std::num::ParseFloatError),
    /// Raised when a bool value is failed to be parsed.
    #[error("Error parsing bool: {0}")]
    Bool(#[from] std::str::ParseBoolError),
    /// Raised when a timespan value is failed to be parsed.
    #[error("Error parsing timespan: {0}")]
    Timespan(String),
    /// Raised when a datetime value is failed to be parsed.
    #[error("Error parsing datetime: {0}")]
    DateTime(#[from] time::error::Parse),
    /// Raised when a guid value is failed to be parsed.
    #[error("Error parsing guid: {0}")]
    Guid(#[from] uuid::Error),
    /// Raised when a decimal value is failed to be parsed.
    #[error("Error parsing decimal: {0}")]
    Decimal(#[from] rust_decimal::Error),
    /// Raised when a dynamic value is failed to be parsed.
    #[error("Error parsing dynamic: {0}")]
    Dynamic(#[from] serde_json::Error),
    /// Raised when a value's JSON shape does not fit its declared column
    /// type.
    #[error("wrong column type: expected {expected}, got {actual}")]
    WrongColumnType {
        /// The declared kusto type.
        expected: &'static str,
        /// What the wire actually carried.
        actual: String,
    },
}

impl ParseError {
    pub(crate) fn kind(&self) -> Kind {
        match self {
            ParseError::WrongColumnType { .. } | ParseError::ValueNull(_) => Kind::WrongColumnType,
            _ => Kind::FailedToParse,
        }
    }
}

/// Result type for kusto operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A result that may carry both partial values and the error that prevented
/// the rest from being produced.
pub type Partial<T> = std::result::Result<T, (Option<T>, Error)>;

/// Convenience conversions out of a [Partial] result.
pub trait PartialExt<T> {
    /// Drops any partial values, keeping only the error.
    fn ignore_partial_results(self) -> Result<T>;
    /// Keeps whatever values were produced, discarding the error.
    fn ignore_errors(self) -> Option<T>;
}

impl<T> PartialExt<T> for Partial<T> {
    fn ignore_partial_results(self) -> Result<T> {
        self.map_err(|(_, e)| e)
    }

    fn ignore_errors(self) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err((v, _)) => v,
        }
    }
}
