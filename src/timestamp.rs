use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ChapterError, ChapterResult};

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_MINUTE: u64 = 60 * NANOS_PER_SECOND;
const MS_PER_MINUTE: u64 = 60_000;
const MS_PER_HOUR: u64 = 3_600_000;

/// A point in an audio file, kept normalized as hours, minutes (0..=59) and
/// the nanoseconds into the minute.
///
/// Fields are normalized and declared most significant first, so the derived
/// comparisons order by elapsed time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    hours: u64,
    minutes: u32,
    nanos: u64,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp {
        hours: 0,
        minutes: 0,
        nanos: 0,
    };

    pub fn new(hours: u64, minutes: u32, seconds: f64) -> ChapterResult<Self> {
        let mut timestamp = Self::ZERO;
        timestamp.set_hours(hours)?;
        timestamp.set_minutes(minutes)?;
        timestamp.set_seconds(seconds)?;
        Ok(timestamp)
    }

    pub fn hours(&self) -> u64 {
        self.hours
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn seconds(&self) -> f64 {
        self.nanos as f64 / NANOS_PER_SECOND as f64
    }

    pub fn set_hours(&mut self, hours: u64) -> ChapterResult<()> {
        self.hours = hours;
        Ok(())
    }

    pub fn set_minutes(&mut self, minutes: u32) -> ChapterResult<()> {
        if minutes > 59 {
            return Err(ChapterError::range("minutes", minutes));
        }
        self.minutes = minutes;
        Ok(())
    }

    pub fn set_seconds(&mut self, seconds: f64) -> ChapterResult<()> {
        if !(0.0..60.0).contains(&seconds) {
            return Err(ChapterError::range("seconds", seconds));
        }
        let nanos = (seconds * NANOS_PER_SECOND as f64).round() as u64;
        self.nanos = nanos.min(NANOS_PER_MINUTE - 1);
        Ok(())
    }

    /// Parses `[[hh:]mm:]ss[.zzz]`.
    ///
    /// Overflowing components are carried upwards before the timestamp is
    /// built, so `"1:75:02"` parses as `02:15:02.000` and `"75"` as
    /// `00:01:15.000`. Digits past nanosecond precision are dropped.
    pub fn parse(text: &str) -> ChapterResult<Self> {
        let components: Vec<&str> = text.trim().split(':').map(str::trim).collect();
        if components.len() > 3 {
            return Err(ChapterError::format(text, "expected at most hh:mm:ss"));
        }

        let mut components = components.into_iter().rev();

        let seconds_token = components.next().unwrap_or_default();
        let nanos = parse_seconds_nanos(seconds_token).ok_or_else(|| {
            ChapterError::format(text, "seconds must be a non-negative decimal number")
        })?;

        let minutes = parse_integer_component(components.next(), "minutes", text)?;
        let hours = parse_integer_component(components.next(), "hours", text)?;

        let minutes = minutes
            .checked_add(nanos / NANOS_PER_MINUTE)
            .ok_or_else(|| ChapterError::format(text, "minutes overflow"))?;
        let hours = hours
            .checked_add(minutes / 60)
            .ok_or_else(|| ChapterError::format(text, "hours overflow"))?;

        Ok(Self {
            hours,
            minutes: (minutes % 60) as u32,
            nanos: nanos % NANOS_PER_MINUTE,
        })
    }

    pub fn from_milliseconds(milliseconds: u64) -> Self {
        Self {
            hours: milliseconds / MS_PER_HOUR,
            minutes: ((milliseconds % MS_PER_HOUR) / MS_PER_MINUTE) as u32,
            nanos: (milliseconds % MS_PER_MINUTE) * NANOS_PER_MILLI,
        }
    }

    /// Total elapsed milliseconds; sub-millisecond precision is truncated.
    pub fn to_milliseconds(&self) -> u64 {
        self.hours
            .saturating_mul(MS_PER_HOUR)
            .saturating_add(u64::from(self.minutes) * MS_PER_MINUTE)
            .saturating_add(self.nanos / NANOS_PER_MILLI)
    }
}

/// `ss[.fff]` as nanoseconds, without going through a float. `None` for
/// anything that is not plain decimal digits.
fn parse_seconds_nanos(token: &str) -> Option<u64> {
    let (whole, fraction) = token.split_once('.').unwrap_or((token, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction = fraction
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(9)
        .fold(0u64, |acc, digit| acc * 10 + u64::from(digit - b'0'));

    whole.checked_mul(NANOS_PER_SECOND)?.checked_add(fraction)
}

fn parse_integer_component(token: Option<&str>, field: &str, text: &str) -> ChapterResult<u64> {
    match token {
        None => Ok(0),
        Some(token) => token.parse::<u64>().map_err(|_| {
            ChapterError::format(text, format!("{field} is not a non-negative integer"))
        }),
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.nanos / NANOS_PER_MILLI;
        write!(
            f,
            "{:02}:{:02}:{:02}.{:03}",
            self.hours,
            self.minutes,
            millis / 1000,
            millis % 1000
        )
    }
}

impl FromStr for Timestamp {
    type Err = ChapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(h: u64, m: u32, s: f64) -> Timestamp {
        Timestamp::new(h, m, s).unwrap()
    }

    #[test]
    fn parse_full_and_partial_forms() {
        assert_eq!(Timestamp::parse("01:02:03.456").unwrap(), ts(1, 2, 3.456));
        assert_eq!(Timestamp::parse("5:07.250").unwrap(), ts(0, 5, 7.25));
        assert_eq!(Timestamp::parse("42").unwrap(), ts(0, 0, 42.0));
        assert_eq!(Timestamp::parse("  0:00:00 ").unwrap(), Timestamp::ZERO);
    }

    #[test]
    fn parse_carries_overflowing_components() {
        assert_eq!(Timestamp::parse("1:75:02").unwrap(), ts(2, 15, 2.0));
        assert_eq!(Timestamp::parse("75").unwrap(), ts(0, 1, 15.0));
        assert_eq!(Timestamp::parse("59:3600.5").unwrap(), ts(1, 59, 0.5));
        assert_eq!(Timestamp::parse("130:00").unwrap(), ts(2, 10, 0.0));
    }

    #[test]
    fn carried_seconds_equal_the_spelled_out_time() {
        let carried = Timestamp::parse("75.3").unwrap();
        assert_eq!(carried, Timestamp::parse("1:15.3").unwrap());
        assert_eq!(carried, Timestamp::from_milliseconds(75_300));
        assert_eq!(Timestamp::parse("3599.999").unwrap(), Timestamp::parse("59:59.999").unwrap());
        assert_eq!(Timestamp::parse(".5").unwrap(), ts(0, 0, 0.5));
        assert_eq!(Timestamp::parse("1.0000000009").unwrap(), ts(0, 0, 1.0));
    }

    #[test]
    fn parse_rejects_malformed_text() {
        for bad in ["", ".", "abc", "1:-2:00", "-1", "+1", "1e2", "1:2:3:4", "inf", "NaN", "1.5:00", "x:00:01", "1.2.3"] {
            assert!(
                matches!(Timestamp::parse(bad), Err(ChapterError::Format { .. })),
                "{bad:?} should be a format error"
            );
        }
    }

    #[test]
    fn setters_reject_out_of_range_values() {
        let mut timestamp = Timestamp::ZERO;
        assert!(matches!(timestamp.set_minutes(60), Err(ChapterError::Range { .. })));
        assert!(matches!(timestamp.set_seconds(60.0), Err(ChapterError::Range { .. })));
        assert!(matches!(timestamp.set_seconds(-0.5), Err(ChapterError::Range { .. })));
        assert!(matches!(timestamp.set_seconds(f64::NAN), Err(ChapterError::Range { .. })));
        assert!(Timestamp::new(0, 75, 0.0).is_err());
        assert_eq!(timestamp, Timestamp::ZERO);

        timestamp.set_minutes(59).unwrap();
        timestamp.set_seconds(59.999).unwrap();
        timestamp.set_hours(100).unwrap();
        assert_eq!(timestamp.to_string(), "100:59:59.999");
    }

    #[test]
    fn formats_fixed_width() {
        assert_eq!(Timestamp::ZERO.to_string(), "00:00:00.000");
        assert_eq!(ts(1, 2, 3.5).to_string(), "01:02:03.500");
        assert_eq!(ts(123, 4, 5.6).to_string(), "123:04:05.600");
        assert_eq!(ts(0, 0, 59.9999).to_string(), "00:00:59.999");
    }

    #[test]
    fn display_then_parse_round_trips() {
        for (h, m, millis) in [(0, 0, 0), (0, 5, 0), (1, 59, 59_999), (12, 30, 32_500), (101, 1, 1)] {
            let original = ts(h, m, millis as f64 / 1000.0);
            assert_eq!(Timestamp::parse(&original.to_string()).unwrap(), original);
        }
    }

    #[test]
    fn milliseconds_round_trip() {
        for ms in [0, 1, 999, 1_000, 32_500, 59_999, 60_000, 1_234_567, 3_600_000, 86_399_999, 360_000_001] {
            assert_eq!(Timestamp::from_milliseconds(ms).to_milliseconds(), ms);
        }
        assert_eq!(Timestamp::from_milliseconds(3_723_004), ts(1, 2, 3.004));
    }

    #[test]
    fn to_milliseconds_truncates() {
        assert_eq!(ts(0, 0, 1.0009).to_milliseconds(), 1_000);
        assert_eq!(ts(1, 1, 1.5).to_milliseconds(), 3_661_500);
    }

    #[test]
    fn ordering_follows_elapsed_time() {
        assert!(ts(0, 59, 59.0) < ts(1, 0, 0.0));
        assert!(ts(0, 1, 0.5) > ts(0, 1, 0.25));
        assert_eq!(ts(0, 0, 0.0), Timestamp::new(0, 0, -0.0).unwrap());
    }

    #[test]
    fn serializes_as_text() {
        let json = serde_json::to_string(&ts(0, 5, 0.0)).unwrap();
        assert_eq!(json, "\"00:05:00.000\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts(0, 5, 0.0));
    }
}
