//! Types used for serialization and deserialization of ADX data.
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{Error, ParseError, Result};
use crate::models::ColumnType;

mod datetime;
mod dynamic;
mod timespan;

pub use datetime::KustoDateTime;
pub use dynamic::KustoDynamic;
pub use timespan::KustoTimespan;

macro_rules! kusto_type {
    ($name:ident, $inner:ty, $kusto:literal) => {
        #[doc = concat!("A nullable kusto `", $kusto, "` value, wrapping [`", stringify!($inner), "`].")]
        #[derive(Clone, PartialEq, Default, derive_more::From, derive_more::Into)]
        pub struct $name(pub Option<$inner>);

        impl $name {
            #[doc = concat!("Creates a non-null `", stringify!($name), "`.")]
            pub fn new(value: $inner) -> Self {
                Self(Some(value))
            }

            #[doc = concat!("Creates a null `", stringify!($name), "`.")]
            pub fn null() -> Self {
                Self(None)
            }

            /// Whether the value is null.
            pub fn is_null(&self) -> bool {
                self.0.is_none()
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(Some(value))
            }
        }

        impl TryFrom<$name> for $inner {
            type Error = Error;

            fn try_from(value: $name) -> Result<$inner> {
                value
                    .0
                    .ok_or_else(|| ParseError::ValueNull(stringify!($name).to_string()).into())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                match &self.0 {
                    Some(v) => write!(f, "{v}"),
                    None => write!(f, "null"),
                }
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "("))?;
                Display::fmt(self, f)?;
                write!(f, ")")
            }
        }
    };
}

kusto_type!(KustoBool, bool, "bool");
kusto_type!(KustoInt, i32, "int");
kusto_type!(KustoLong, i64, "long");
kusto_type!(KustoReal, f64, "real");
kusto_type!(KustoDecimal, rust_decimal::Decimal, "decimal");
kusto_type!(KustoString, String, "string");
kusto_type!(KustoGuid, uuid::Uuid, "guid");

/// A numeric wire token that may arrive either as a JSON number or as a
/// numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    String(String),
}

impl Serialize for KustoBool {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Some(v) => serializer.serialize_bool(v),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for KustoBool {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self(Option::<bool>::deserialize(deserializer)?))
    }
}

impl Serialize for KustoInt {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Some(v) => serializer.serialize_i32(v),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for KustoInt {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wide = match Option::<NumberOrString<i64>>::deserialize(deserializer)? {
            None => return Ok(Self::null()),
            Some(NumberOrString::Number(n)) => n,
            Some(NumberOrString::String(s)) => {
                s.parse::<i64>().map_err(serde::de::Error::custom)?
            }
        };
        let narrow = i32::try_from(wide)
            .map_err(|_| serde::de::Error::custom(format!("int value {wide} is out of range")))?;
        Ok(Self::new(narrow))
    }
}

impl Serialize for KustoLong {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Some(v) => serializer.serialize_i64(v),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for KustoLong {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<NumberOrString<i64>>::deserialize(deserializer)? {
            None => Self::null(),
            Some(NumberOrString::Number(n)) => Self::new(n),
            Some(NumberOrString::String(s)) => {
                Self::new(s.parse::<i64>().map_err(serde::de::Error::custom)?)
            }
        })
    }
}

impl Serialize for KustoReal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Some(v) if v.is_nan() => serializer.serialize_str("NaN"),
            Some(v) if v == f64::INFINITY => serializer.serialize_str("Infinity"),
            Some(v) if v == f64::NEG_INFINITY => serializer.serialize_str("-Infinity"),
            Some(v) => serializer.serialize_f64(v),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for KustoReal {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<NumberOrString<f64>>::deserialize(deserializer)? {
            None => Self::null(),
            Some(NumberOrString::Number(n)) => Self::new(n),
            Some(NumberOrString::String(s)) => Self::new(match s.as_str() {
                "NaN" => f64::NAN,
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                _ => s.parse::<f64>().map_err(serde::de::Error::custom)?,
            }),
        })
    }
}

impl Serialize for KustoDecimal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.0 {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for KustoDecimal {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Integer tokens are exact; anything fractional must arrive as a
        // string, a float would already have lost precision.
        Ok(match Option::<NumberOrString<i64>>::deserialize(deserializer)? {
            None => Self::null(),
            Some(NumberOrString::Number(n)) => Self::new(rust_decimal::Decimal::from(n)),
            Some(NumberOrString::String(s)) => Self::new(
                rust_decimal::Decimal::from_str(&s).map_err(serde::de::Error::custom)?,
            ),
        })
    }
}

impl Serialize for KustoString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.0 {
            Some(v) => serializer.serialize_str(v),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for KustoString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self(Option::<String>::deserialize(deserializer)?))
    }
}

impl Serialize for KustoGuid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.0 {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for KustoGuid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            None => Self::null(),
            Some(s) => Self::new(uuid::Uuid::parse_str(&s).map_err(serde::de::Error::custom)?),
        })
    }
}

/// A single typed value of a kusto column.
#[derive(Clone, PartialEq, Debug)]
pub enum KustoValue {
    /// A `bool` value.
    Bool(KustoBool),
    /// An `int` value.
    Int(KustoInt),
    /// A `long` value.
    Long(KustoLong),
    /// A `real` value.
    Real(KustoReal),
    /// A `decimal` value.
    Decimal(KustoDecimal),
    /// A `string` value.
    String(KustoString),
    /// A `guid` value.
    Guid(KustoGuid),
    /// A `datetime` value.
    DateTime(KustoDateTime),
    /// A `timespan` value.
    Timespan(KustoTimespan),
    /// A `dynamic` value.
    Dynamic(KustoDynamic),
}

/// The JSON shape of a raw wire token, determined from its first byte.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum TokenShape {
    Null,
    Bool,
    Number,
    String,
    Object,
    Array,
}

impl TokenShape {
    fn of(text: &str) -> Self {
        match text.as_bytes().first() {
            Some(b'n') | None => TokenShape::Null,
            Some(b't') | Some(b'f') => TokenShape::Bool,
            Some(b'"') => TokenShape::String,
            Some(b'{') => TokenShape::Object,
            Some(b'[') => TokenShape::Array,
            Some(_) => TokenShape::Number,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            TokenShape::Null => "null",
            TokenShape::Bool => "a boolean",
            TokenShape::Number => "a number",
            TokenShape::String => "a string",
            TokenShape::Object => "an object",
            TokenShape::Array => "an array",
        }
    }

    fn fits(&self, column_type: ColumnType) -> bool {
        match column_type {
            ColumnType::Dynamic => true,
            ColumnType::Bool => matches!(self, TokenShape::Bool),
            ColumnType::Int | ColumnType::Long | ColumnType::Real | ColumnType::Decimal => {
                matches!(self, TokenShape::Number | TokenShape::String)
            }
            ColumnType::String
            | ColumnType::Guid
            | ColumnType::Datetime
            | ColumnType::Timespan => matches!(self, TokenShape::String),
        }
    }
}

impl KustoValue {
    /// The zero-valued null scalar of a column type, used to pre-shape a
    /// column slot before its value is known.
    pub fn null_of(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Bool => KustoValue::Bool(KustoBool::null()),
            ColumnType::Int => KustoValue::Int(KustoInt::null()),
            ColumnType::Long => KustoValue::Long(KustoLong::null()),
            ColumnType::Real => KustoValue::Real(KustoReal::null()),
            ColumnType::Decimal => KustoValue::Decimal(KustoDecimal::null()),
            ColumnType::String => KustoValue::String(KustoString::null()),
            ColumnType::Guid => KustoValue::Guid(KustoGuid::null()),
            ColumnType::Datetime => KustoValue::DateTime(KustoDateTime::null()),
            ColumnType::Timespan => KustoValue::Timespan(KustoTimespan::null()),
            ColumnType::Dynamic => KustoValue::Dynamic(KustoDynamic::null()),
        }
    }

    /// The kusto type of the value.
    pub fn column_type(&self) -> ColumnType {
        match self {
            KustoValue::Bool(_) => ColumnType::Bool,
            KustoValue::Int(_) => ColumnType::Int,
            KustoValue::Long(_) => ColumnType::Long,
            KustoValue::Real(_) => ColumnType::Real,
            KustoValue::Decimal(_) => ColumnType::Decimal,
            KustoValue::String(_) => ColumnType::String,
            KustoValue::Guid(_) => ColumnType::Guid,
            KustoValue::DateTime(_) => ColumnType::Datetime,
            KustoValue::Timespan(_) => ColumnType::Timespan,
            KustoValue::Dynamic(_) => ColumnType::Dynamic,
        }
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        match self {
            KustoValue::Bool(v) => v.is_null(),
            KustoValue::Int(v) => v.is_null(),
            KustoValue::Long(v) => v.is_null(),
            KustoValue::Real(v) => v.is_null(),
            KustoValue::Decimal(v) => v.is_null(),
            KustoValue::String(v) => v.is_null(),
            KustoValue::Guid(v) => v.is_null(),
            KustoValue::DateTime(v) => v.is_null(),
            KustoValue::Timespan(v) => v.is_null(),
            KustoValue::Dynamic(v) => v.is_null(),
        }
    }

    /// Decodes a raw wire token into a typed value of the given column type.
    ///
    /// A `null` token produces the type's null value; a token whose JSON
    /// shape cannot carry the type fails with a wrong-column-type error.
    /// Nested objects and arrays are only valid for `dynamic`, where the raw
    /// span is captured without re-encoding.
    pub fn parse(column_type: ColumnType, raw: &RawValue) -> Result<Self> {
        let text = raw.get();
        let shape = TokenShape::of(text);
        if shape == TokenShape::Null {
            return Ok(Self::null_of(column_type));
        }
        if !shape.fits(column_type) {
            return Err(ParseError::WrongColumnType {
                expected: column_type.name(),
                actual: shape.describe().to_string(),
            }
            .into());
        }

        Ok(match column_type {
            ColumnType::Bool => KustoValue::Bool(from_json(text)?),
            ColumnType::Int => KustoValue::Int(from_json(text)?),
            ColumnType::Long => KustoValue::Long(from_json(text)?),
            ColumnType::Real => KustoValue::Real(from_json(text)?),
            ColumnType::Decimal => KustoValue::Decimal(from_json(text)?),
            ColumnType::String => KustoValue::String(from_json(text)?),
            ColumnType::Guid => KustoValue::Guid(from_json(text)?),
            ColumnType::Datetime => KustoValue::DateTime(from_json(text)?),
            ColumnType::Timespan => KustoValue::Timespan(from_json(text)?),
            ColumnType::Dynamic => KustoValue::Dynamic(KustoDynamic::new(raw.to_owned())),
        })
    }
}

fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(Error::Json)
}

impl Serialize for KustoValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            KustoValue::Bool(v) => v.serialize(serializer),
            KustoValue::Int(v) => v.serialize(serializer),
            KustoValue::Long(v) => v.serialize(serializer),
            KustoValue::Real(v) => v.serialize(serializer),
            KustoValue::Decimal(v) => v.serialize(serializer),
            KustoValue::String(v) => v.serialize(serializer),
            KustoValue::Guid(v) => v.serialize(serializer),
            KustoValue::DateTime(v) => v.serialize(serializer),
            KustoValue::Timespan(v) => v.serialize(serializer),
            KustoValue::Dynamic(v) => v.serialize(serializer),
        }
    }
}

impl Display for KustoValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KustoValue::Bool(v) => Display::fmt(v, f),
            KustoValue::Int(v) => Display::fmt(v, f),
            KustoValue::Long(v) => Display::fmt(v, f),
            KustoValue::Real(v) => Display::fmt(v, f),
            KustoValue::Decimal(v) => Display::fmt(v, f),
            KustoValue::String(v) => Display::fmt(v, f),
            KustoValue::Guid(v) => Display::fmt(v, f),
            KustoValue::DateTime(v) => Display::fmt(v, f),
            KustoValue::Timespan(v) => Display::fmt(v, f),
            KustoValue::Dynamic(v) => Display::fmt(v, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str) -> Box<RawValue> {
        RawValue::from_string(text.to_string()).unwrap()
    }

    #[test]
    fn int_accepts_numbers_and_numeric_strings() {
        assert_eq!(
            KustoValue::parse(ColumnType::Int, &raw("5")).unwrap(),
            KustoValue::Int(KustoInt::new(5))
        );
        assert_eq!(
            KustoValue::parse(ColumnType::Int, &raw("\"-17\"")).unwrap(),
            KustoValue::Int(KustoInt::new(-17))
        );
    }

    #[test]
    fn int_out_of_range_is_an_error() {
        let err = KustoValue::parse(ColumnType::Int, &raw("2147483648")).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
        assert!(KustoValue::parse(ColumnType::Int, &raw("2147483647")).is_ok());
        assert!(KustoValue::parse(ColumnType::Int, &raw("-2147483648")).is_ok());
    }

    #[test]
    fn long_holds_the_full_64_bit_range() {
        assert_eq!(
            KustoValue::parse(ColumnType::Long, &raw("9223372036854775807")).unwrap(),
            KustoValue::Long(KustoLong::new(i64::MAX))
        );
    }

    #[test]
    fn real_accepts_non_finite_literals() {
        let nan = KustoValue::parse(ColumnType::Real, &raw("\"NaN\"")).unwrap();
        match nan {
            KustoValue::Real(KustoReal(Some(v))) => assert!(v.is_nan()),
            other => panic!("expected a real, got {other:?}"),
        }
        assert_eq!(
            KustoValue::parse(ColumnType::Real, &raw("\"Infinity\"")).unwrap(),
            KustoValue::Real(KustoReal::new(f64::INFINITY))
        );
        assert_eq!(
            KustoValue::parse(ColumnType::Real, &raw("\"-Infinity\"")).unwrap(),
            KustoValue::Real(KustoReal::new(f64::NEG_INFINITY))
        );
        assert_eq!(
            KustoValue::parse(ColumnType::Real, &raw("0.01")).unwrap(),
            KustoValue::Real(KustoReal::new(0.01))
        );
    }

    #[test]
    fn decimal_preserves_precision() {
        let parsed = KustoValue::parse(ColumnType::Decimal, &raw("\"2.00000000000001\"")).unwrap();
        match parsed {
            KustoValue::Decimal(d) => assert_eq!(d.to_string(), "2.00000000000001"),
            other => panic!("expected a decimal, got {other:?}"),
        }
    }

    #[test]
    fn null_tokens_produce_null_values_of_every_kind() {
        for ty in [
            ColumnType::Bool,
            ColumnType::Int,
            ColumnType::Long,
            ColumnType::Real,
            ColumnType::Decimal,
            ColumnType::String,
            ColumnType::Guid,
            ColumnType::Datetime,
            ColumnType::Timespan,
            ColumnType::Dynamic,
        ] {
            let value = KustoValue::parse(ty, &raw("null")).unwrap();
            assert!(value.is_null(), "{ty} should decode null as null");
            assert_eq!(value.column_type(), ty);
            assert_eq!(value, KustoValue::null_of(ty));
        }
    }

    #[test]
    fn shape_mismatch_is_a_wrong_column_type_error() {
        let err = KustoValue::parse(ColumnType::Int, &raw("true")).unwrap_err();
        assert_eq!(err.kind(), crate::error::Kind::WrongColumnType);
        let err = KustoValue::parse(ColumnType::String, &raw("5")).unwrap_err();
        assert_eq!(err.kind(), crate::error::Kind::WrongColumnType);
        let err = KustoValue::parse(ColumnType::Long, &raw("{\"a\": 1}")).unwrap_err();
        assert_eq!(err.kind(), crate::error::Kind::WrongColumnType);
    }

    #[test]
    fn dynamic_captures_the_raw_span() {
        let parsed =
            KustoValue::parse(ColumnType::Dynamic, &raw("{\"moshe\":\"value\"}")).unwrap();
        match parsed {
            KustoValue::Dynamic(d) => {
                assert_eq!(d.as_str(), Some("{\"moshe\":\"value\"}"));
            }
            other => panic!("expected a dynamic, got {other:?}"),
        }
    }

    #[test]
    fn guid_parses_canonical_form() {
        let parsed = KustoValue::parse(
            ColumnType::Guid,
            &raw("\"123e27de-1e4e-49d9-b579-fe0b331d3642\""),
        )
        .unwrap();
        assert_eq!(
            parsed,
            KustoValue::Guid(KustoGuid::new(
                uuid::Uuid::parse_str("123e27de-1e4e-49d9-b579-fe0b331d3642").unwrap()
            ))
        );
    }

    #[test]
    fn round_trippable_kinds_survive_marshalling() {
        let values = [
            KustoValue::Bool(KustoBool::new(true)),
            KustoValue::Int(KustoInt::new(42)),
            KustoValue::Long(KustoLong::new(i64::MAX)),
            KustoValue::Real(KustoReal::new(0.25)),
            KustoValue::String(KustoString::new("asdf".to_string())),
            KustoValue::Guid(KustoGuid::new(
                uuid::Uuid::parse_str("123e27de-1e4e-49d9-b579-fe0b331d3642").unwrap(),
            )),
            KustoValue::Decimal(KustoDecimal::new(
                rust_decimal::Decimal::from_str("2.00000000000001").unwrap(),
            )),
        ];

        for value in values {
            let marshalled = serde_json::to_string(&value).unwrap();
            let reparsed = KustoValue::parse(value.column_type(), &raw(&marshalled)).unwrap();
            assert_eq!(reparsed, value, "round trip of {marshalled}");
        }
    }

    #[test]
    fn null_to_host_type_conversion_fails_while_option_is_none() {
        let null = KustoInt::null();
        assert_eq!(Option::<i32>::from(null.clone()), None);
        assert!(i32::try_from(null).is_err());
        assert_eq!(i32::try_from(KustoInt::new(3)).unwrap(), 3);
    }
}
