//! Models to parse responses from ADX.
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub mod v1;
pub mod v2;

#[cfg(test)]
pub(crate) mod test_helpers;

/// Represents the scalar data types of ADX. see [the docs for more information](https://docs.microsoft.com/en-us/azure/data-explorer/kusto/query/scalar-data-types/)
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Boolean type, true or false.
    #[serde(alias = "Bool", alias = "Boolean", alias = "boolean", alias = "SByte")]
    Bool,
    /// Datetime, represents a specific point in time.
    #[serde(alias = "Datetime", alias = "DateTime", alias = "Date", alias = "date")]
    Datetime,
    /// A complex type, that is either an array or a dictionary of other values.
    #[serde(alias = "Dynamic", alias = "Object", alias = "object")]
    Dynamic,
    /// GUID type, represents a globally unique identifier.
    #[serde(
        alias = "Guid",
        alias = "GUID",
        alias = "UUID",
        alias = "uuid",
        alias = "Uuid"
    )]
    Guid,
    /// 32 bit integer type.
    #[serde(alias = "Int", alias = "Int32", alias = "int32")]
    Int,
    /// 64 bit integer type.
    #[serde(alias = "Long", alias = "Int64", alias = "int64")]
    Long,
    /// 64 bit floating point type.
    #[serde(
        alias = "Real",
        alias = "float",
        alias = "Float",
        alias = "Double",
        alias = "double"
    )]
    Real,
    /// String type, represents a string of characters.
    #[serde(alias = "String")]
    String,
    /// Timespan type, represents a duration of time.
    #[serde(alias = "Timespan", alias = "TimeSpan", alias = "Time", alias = "time")]
    Timespan,
    /// Decimal, represents a fixed-point number with a defined precision and scale.
    #[serde(alias = "Decimal")]
    Decimal,
}

impl ColumnType {
    /// The canonical lowercase kusto name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Bool => "bool",
            ColumnType::Datetime => "datetime",
            ColumnType::Dynamic => "dynamic",
            ColumnType::Guid => "guid",
            ColumnType::Int => "int",
            ColumnType::Long => "long",
            ColumnType::Real => "real",
            ColumnType::String => "string",
            ColumnType::Timespan => "timespan",
            ColumnType::Decimal => "decimal",
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_aliases_collapse_to_canonical_kinds() {
        for (wire, expected) in [
            ("\"int\"", ColumnType::Int),
            ("\"Int32\"", ColumnType::Int),
            ("\"long\"", ColumnType::Long),
            ("\"real\"", ColumnType::Real),
            ("\"Double\"", ColumnType::Real),
            ("\"datetime\"", ColumnType::Datetime),
            ("\"DateTime\"", ColumnType::Datetime),
            ("\"timespan\"", ColumnType::Timespan),
            ("\"TimeSpan\"", ColumnType::Timespan),
            ("\"dynamic\"", ColumnType::Dynamic),
            ("\"guid\"", ColumnType::Guid),
            ("\"decimal\"", ColumnType::Decimal),
            ("\"string\"", ColumnType::String),
            ("\"bool\"", ColumnType::Bool),
            ("\"Boolean\"", ColumnType::Bool),
        ] {
            assert_eq!(
                serde_json::from_str::<ColumnType>(wire).unwrap(),
                expected,
                "wire name {wire}"
            );
        }
    }

    #[test]
    fn unrecognized_type_name_is_rejected() {
        assert!(serde_json::from_str::<ColumnType>("\"varchar\"").is_err());
    }
}
