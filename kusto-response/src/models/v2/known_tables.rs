use serde::{Deserialize, Serialize};

use crate::types::{KustoDateTime, KustoDynamic, KustoGuid, KustoInt, KustoString};

/// A row of the `QueryProperties` secondary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryProperties {
    /// The primary-result table the property applies to.
    pub table_id: KustoInt,
    /// The property name.
    pub key: KustoString,
    /// The property value.
    pub value: KustoDynamic,
}

/// A row of the `QueryCompletionInformation` secondary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryCompletionInformation {
    /// When the event was recorded.
    pub timestamp: KustoDateTime,
    /// The client-supplied request id.
    pub client_request_id: KustoString,
    /// The id of the query activity.
    pub activity_id: KustoGuid,
    /// The id of the query sub-activity.
    pub sub_activity_id: KustoGuid,
    /// The id of the parent activity.
    pub parent_activity_id: KustoGuid,
    /// The severity level of the event.
    pub level: KustoInt,
    /// The name of the severity level.
    pub level_name: KustoString,
    /// The status code of the event.
    pub status_code: KustoInt,
    /// The name of the status code.
    pub status_code_name: KustoString,
    /// The type of the event.
    pub event_type: KustoInt,
    /// The name of the event type.
    pub event_type_name: KustoString,
    /// The event payload.
    pub payload: KustoString,
}
