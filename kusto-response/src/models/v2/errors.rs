use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// A server-side error envelope, as it appears inline in a response stream
/// (`OneApiErrors` lists and non-stream error bodies alike).
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct OneApiError {
    /// The error itself.
    #[serde(rename = "error")]
    pub error_message: ErrorMessage,
}

impl OneApiError {
    /// The server-assigned error code, e.g. `LimitsExceeded`.
    pub fn code(&self) -> &str {
        &self.error_message.code
    }

    /// Whether the server marked the failure as permanent.
    pub fn is_permanent(&self) -> bool {
        self.error_message.is_permanent
    }

    /// The failure category implied by the server error code.
    pub fn kind(&self) -> crate::error::Kind {
        match self.error_message.code.as_str() {
            "LimitsExceeded" => crate::error::Kind::LimitsExceeded,
            "Timeout" | "RequestExecutionTimeout" => crate::error::Kind::Timeout,
            "BadRequest_DatabaseNotExist" => crate::error::Kind::DbNotExist,
            "Request_EntityNotFound" => crate::error::Kind::TableNotExist,
            "RequestBlocked" => crate::error::Kind::Blocked,
            _ => crate::error::Kind::HttpError,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_code_and_permanence(code: &str, permanent: bool) -> Self {
        Self {
            error_message: ErrorMessage {
                code: code.to_string(),
                message: String::new(),
                r#type: String::new(),
                description: String::new(),
                context: None,
                is_permanent: permanent,
            },
        }
    }
}

impl Display for OneApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.error_message.code, self.error_message.message
        )?;
        if !self.error_message.description.is_empty() {
            write!(f, " ({})", self.error_message.description)?;
        }
        Ok(())
    }
}

/// The body of a server-side error.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    /// The error code.
    pub code: String,
    /// A short human readable message.
    pub message: String,
    /// The exception type on the service side.
    #[serde(rename = "@type", default)]
    pub r#type: String,
    /// A longer description of what went wrong.
    #[serde(default)]
    pub description: String,
    /// Correlation information for the failed activity.
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
    /// Whether retrying the request can possibly succeed.
    #[serde(rename = "@permanent", default)]
    pub is_permanent: bool,
}

/// Correlation information attached to a server-side error.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    /// When the failure happened.
    #[serde(default)]
    pub timestamp: String,
    /// The alias of the service that failed.
    #[serde(default)]
    pub service_alias: String,
    /// The machine the failure happened on.
    #[serde(default)]
    pub machine_name: String,
    /// The process the failure happened in.
    #[serde(default)]
    pub process_name: String,
    /// The id of the process the failure happened in.
    #[serde(default)]
    pub process_id: i64,
    /// The id of the thread the failure happened on.
    #[serde(default)]
    pub thread_id: i64,
    /// The client-supplied request id.
    #[serde(default)]
    pub client_request_id: String,
    /// The id of the failed activity.
    #[serde(default)]
    pub activity_id: String,
    /// The id of the failed sub-activity.
    #[serde(default)]
    pub sub_activity_id: String,
    /// The type of the failed activity.
    #[serde(default)]
    pub activity_type: String,
    /// The id of the parent activity.
    #[serde(default)]
    pub parent_activity_id: String,
    /// The full activity stack.
    #[serde(default)]
    pub activity_stack: String,
}

/// A list of inline errors, as emitted in place of a row in a table's data.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct OneApiErrors {
    /// The errors.
    #[serde(rename = "Errors")]
    pub errors: Vec<OneApiError>,
}
