use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Where errors are reported - within the data, at the end of the table, or at the end of the dataset.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorReportingPlacement {
    /// Errors are reported within the data.
    InData,
    /// Errors are reported at the end of the table.
    EndOfTable,
    /// Errors are reported at the end of the dataset.
    EndOfDataSet,
}

/// The type of the fragment of a table, instructs to how to use it.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum TableFragmentType {
    /// Append the data to the rest of the fragments.
    DataAppend,
    /// Replace all previous data with this fragment.
    DataReplace,
}

/// Categorizes data tables according to the role they play in the data set that a Kusto query returns.
#[derive(Debug, PartialEq, Eq, Serialize, Clone)]
pub enum TableKind {
    /// The table contains the actual data returned by the query.
    PrimaryResult,
    /// Information about the runtime of query.
    QueryCompletionInformation,
    /// Trace Log for the query.
    QueryTraceLog,
    /// Perf log for the query.
    QueryPerfLog,
    /// Table of contents for the other parts.
    TableOfContents,
    /// Properties of the query.
    QueryProperties,
    /// Execution plan for the query.
    QueryPlan,
    /// Unknown table kind.
    Unknown,
}

impl TableKind {
    /// Maps a wire name onto a kind, collapsing anything unrecognized into
    /// [TableKind::Unknown].
    pub fn from_wire(name: &str) -> Self {
        match name {
            "PrimaryResult" => TableKind::PrimaryResult,
            "QueryCompletionInformation" => TableKind::QueryCompletionInformation,
            "QueryTraceLog" => TableKind::QueryTraceLog,
            "QueryPerfLog" => TableKind::QueryPerfLog,
            "TableOfContents" => TableKind::TableOfContents,
            "QueryProperties" => TableKind::QueryProperties,
            "QueryPlan" => TableKind::QueryPlan,
            _ => TableKind::Unknown,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            TableKind::PrimaryResult => "PrimaryResult",
            TableKind::QueryCompletionInformation => "QueryCompletionInformation",
            TableKind::QueryTraceLog => "QueryTraceLog",
            TableKind::QueryPerfLog => "QueryPerfLog",
            TableKind::TableOfContents => "TableOfContents",
            TableKind::QueryProperties => "QueryProperties",
            TableKind::QueryPlan => "QueryPlan",
            TableKind::Unknown => "Unknown",
        }
    }
}

impl Display for TableKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TableKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = std::borrow::Cow::<str>::deserialize(deserializer)?;
        Ok(TableKind::from_wire(&name))
    }
}
