use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{Error, ParseError};

/// A nullable kusto `datetime` value, wrapping [`OffsetDateTime`].
///
/// The wire form is RFC 3339 with up to nanosecond precision, which is
/// preserved on both parse and format.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Default)]
pub struct KustoDateTime(pub Option<OffsetDateTime>);

impl KustoDateTime {
    /// Creates a non-null `KustoDateTime`.
    pub fn new(value: OffsetDateTime) -> Self {
        Self(Some(value))
    }

    /// Creates a null `KustoDateTime`.
    pub fn null() -> Self {
        Self(None)
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }
}

impl Display for KustoDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(v) => match v.format(&Rfc3339) {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "{v}"),
            },
            None => write!(f, "null"),
        }
    }
}

impl Debug for KustoDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "KustoDateTime(")?;
        Display::fmt(self, f)?;
        write!(f, ")")
    }
}

impl Serialize for KustoDateTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(v) => serializer.serialize_str(
                &v.format(&Rfc3339).map_err(serde::ser::Error::custom)?,
            ),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for KustoDateTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let opt = Option::<String>::deserialize(deserializer)?;
        if let Some(s) = opt {
            s.parse::<KustoDateTime>()
                .map_err(|e| serde::de::Error::custom(e.to_string()))
        } else {
            Ok(Self::null())
        }
    }
}

impl FromStr for KustoDateTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(
            OffsetDateTime::parse(s, &Rfc3339).map_err(|e| Error::from(ParseError::DateTime(e)))?,
        ))
    }
}

impl From<OffsetDateTime> for KustoDateTime {
    fn from(v: OffsetDateTime) -> Self {
        Self::new(v)
    }
}
