use std::fmt::{Debug, Display, Formatter};
use std::num::TryFromIntError;
use std::str::FromStr;

use derive_more::{From, Into};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::error::{Error, ParseError};

static KUSTO_TIMESPAN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<neg>-)?((?P<days>\d+)\.)?(?P<hours>\d+):(?P<minutes>\d+):(?P<seconds>\d+)(\.(?P<ticks>\d{1,7}))?$")
        .expect("the timespan pattern is a valid regex")
});

fn parse_regex_segment(captures: &Captures, name: &str) -> i64 {
    captures
        .name(name)
        .map_or(0, |m| m.as_str().parse::<i64>().unwrap_or(0))
}

/// A nullable kusto `timespan` value, wrapping [`Duration`].
///
/// The wire form is `[-][d.]hh:mm:ss[.fffffff]`, with fractional seconds at
/// 100-nanosecond (tick) resolution. The zero duration formats as
/// `00:00:00`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Default)]
pub struct KustoTimespan(pub Option<Duration>);

impl KustoTimespan {
    /// Creates a non-null `KustoTimespan`.
    pub fn new(duration: Duration) -> Self {
        Self(Some(duration))
    }

    /// Creates a null `KustoTimespan`.
    pub fn null() -> Self {
        Self(None)
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    fn format(f: &mut Formatter, d: Duration) -> std::fmt::Result {
        if d.is_negative() {
            write!(f, "-")?;
        }
        let d = d.abs();
        let days = d.whole_days();
        if days > 0 {
            write!(f, "{days}.")?;
        }
        write!(
            f,
            "{:02}:{:02}:{:02}",
            d.whole_hours() - days * 24,
            d.whole_minutes() - d.whole_hours() * 60,
            d.whole_seconds() - d.whole_minutes() * 60,
        )?;
        let ticks =
            (d.whole_nanoseconds() - i128::from(d.whole_seconds()) * 1_000_000_000) / 100;
        if ticks > 0 {
            write!(f, ".{ticks:07}")?;
        }
        Ok(())
    }
}

impl FromStr for KustoTimespan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = KUSTO_TIMESPAN_REGEX
            .captures(s)
            .ok_or_else(|| ParseError::Timespan(s.to_string()))?;

        let neg = match captures.name("neg") {
            None => 1,
            Some(_) => -1,
        };

        let days = parse_regex_segment(&captures, "days");
        let hours = parse_regex_segment(&captures, "hours");
        let minutes = parse_regex_segment(&captures, "minutes");
        let seconds = parse_regex_segment(&captures, "seconds");
        // The fraction is in ticks, right-padded to the full seven digits.
        let ticks = captures.name("ticks").map_or(0, |m| {
            format!("{:0<7}", m.as_str())
                .parse::<i64>()
                .unwrap_or(0)
        });
        let duration = neg
            * (Duration::days(days)
                + Duration::hours(hours)
                + Duration::minutes(minutes)
                + Duration::seconds(seconds)
                + Duration::nanoseconds(ticks * 100));

        Ok(Self(Some(duration)))
    }
}

impl Display for KustoTimespan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(d) = self.0 {
            Self::format(f, d)
        } else {
            write!(f, "null")
        }
    }
}

impl Debug for KustoTimespan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "KustoTimespan(")?;
        Display::fmt(self, f)?;
        write!(f, ")")
    }
}

impl Serialize for KustoTimespan {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_some() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_none()
        }
    }
}

impl<'de> Deserialize<'de> for KustoTimespan {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let opt = Option::<String>::deserialize(deserializer)?;
        if let Some(s) = opt {
            s.parse::<KustoTimespan>()
                .map_err(|e| serde::de::Error::custom(e.to_string()))
        } else {
            Ok(Self::null())
        }
    }
}

impl TryFrom<std::time::Duration> for KustoTimespan {
    type Error = TryFromIntError;

    fn try_from(d: std::time::Duration) -> Result<Self, Self::Error> {
        Ok(Self(Some(Duration::new(
            d.as_secs().try_into()?,
            d.subsec_nanos().try_into()?,
        ))))
    }
}

impl From<Duration> for KustoTimespan {
    fn from(d: Duration) -> Self {
        Self(Some(d))
    }
}
