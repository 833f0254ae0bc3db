use std::fmt;
use std::str::FromStr;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound};

use crate::error::ProtocolError;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_LEN: usize = 10;
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

/// Zone-less instant with microsecond precision.
///
/// Precision is fixed at construction so that the ISO-8601 text written on the wire
/// parses back to exactly the same value; the update cursor depends on that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        Self(datetime.trunc_subsecs(6))
    }

    /// `0001-01-01T00:00:00`, the cursor used by a client that has no messages yet.
    pub fn min() -> Self {
        let datetime = NaiveDate::from_ymd_opt(1, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .expect("0001-01-01T00:00:00 is a valid datetime");
        Self(datetime)
    }

    /// Accepts `YYYY-MM-DD` optionally followed by `T` or a space and a time of
    /// `HH`, `HH:MM`, `HH:MM:SS` or `HH:MM:SS.f`. Zone offsets are rejected.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let invalid = || ProtocolError::InvalidTimestamp(text.to_string());

        let date = text
            .get(..DATE_LEN)
            .and_then(|date| NaiveDate::parse_from_str(date, DATE_FORMAT).ok())
            .ok_or_else(invalid)?;
        let rest = &text[DATE_LEN..];
        if rest.is_empty() {
            return date.and_hms_opt(0, 0, 0).map(Self).ok_or_else(invalid);
        }

        let time = rest
            .strip_prefix(|c: char| c == 'T' || c == ' ')
            .and_then(parse_time)
            .ok_or_else(invalid)?;
        Ok(Self::from_datetime(date.and_time(time)))
    }

    /// The next representable instant.
    pub fn succ(self) -> Self {
        Self(self.0 + Duration::microseconds(1))
    }

    pub fn to_iso(&self) -> String {
        self.0.format(ISO_FORMAT).to_string()
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    if let Some(time) = TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
    {
        return Some(time);
    }
    // chrono needs a minute, so a bare hour is handled here.
    if text.len() == 2 && text.bytes().all(|b| b.is_ascii_digit()) {
        return text
            .parse()
            .ok()
            .and_then(|hour| NaiveTime::from_hms_opt(hour, 0, 0));
    }
    None
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_iso())
    }
}

impl FromStr for Timestamp {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
