use std::fmt::{Debug, Display, Formatter};

use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{Error, ParseError, Result};

/// A nullable kusto `dynamic` value: an arbitrary JSON sub-document (object,
/// array or scalar) carried as its raw text, exactly as it appeared on the
/// wire.
#[derive(Clone, Default, From, Into)]
pub struct KustoDynamic(pub Option<Box<RawValue>>);

impl KustoDynamic {
    /// Creates a non-null `KustoDynamic` from a captured raw value.
    pub fn new(raw: Box<RawValue>) -> Self {
        Self(Some(raw))
    }

    /// Creates a null `KustoDynamic`.
    pub fn null() -> Self {
        Self(None)
    }

    /// Creates a `KustoDynamic` from JSON text. The text must be a complete
    /// JSON value.
    pub fn from_json_text(text: impl Into<String>) -> Result<Self> {
        Ok(Self(Some(
            RawValue::from_string(text.into()).map_err(Error::Json)?,
        )))
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// The raw JSON text of the value.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref().map(RawValue::get)
    }

    /// The raw JSON bytes of the value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.as_str().map(str::as_bytes)
    }

    /// Re-parses the stored JSON into a destination slice, map or struct.
    pub fn to_json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        match &self.0 {
            Some(raw) => {
                serde_json::from_str(raw.get()).map_err(|e| ParseError::Dynamic(e).into())
            }
            None => Err(ParseError::ValueNull("KustoDynamic".to_string()).into()),
        }
    }
}

impl From<Box<RawValue>> for KustoDynamic {
    fn from(raw: Box<RawValue>) -> Self {
        Self::new(raw)
    }
}

impl PartialEq for KustoDynamic {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Display for KustoDynamic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.as_str() {
            Some(s) => f.write_str(s),
            None => write!(f, "null"),
        }
    }
}

impl Debug for KustoDynamic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "KustoDynamic(")?;
        Display::fmt(self, f)?;
        write!(f, ")")
    }
}

impl Serialize for KustoDynamic {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.0 {
            Some(raw) => raw.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for KustoDynamic {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self(Option::<Box<RawValue>>::deserialize(deserializer)?))
    }
}
