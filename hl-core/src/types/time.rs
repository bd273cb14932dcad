//! Ledger time
//!
//! The witness stamps records in micromarks since the ledger epoch. A turn
//! is one sidereal day (`MICROS_PER_TURN` microseconds) divided into
//! `MICROMARKS_PER_TURN` micromarks.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

use crate::constants::{MICROMARKS_PER_TURN, MICROS_PER_TURN};
use crate::error::CoreError;

/// A point in ledger time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GeoTime {
    /// Whole turns since the epoch
    pub turns: u64,
    /// Micromarks into the current turn, always below `MICROMARKS_PER_TURN`
    pub micromarks: u64,
}

impl GeoTime {
    /// Split a micromark count into turns and remainder
    pub fn from_micromarks(total: u128) -> Self {
        Self {
            turns: (total / MICROMARKS_PER_TURN) as u64,
            micromarks: (total % MICROMARKS_PER_TURN) as u64,
        }
    }

    /// Total micromarks since the epoch
    pub fn total_micromarks(&self) -> u128 {
        self.turns as u128 * MICROMARKS_PER_TURN + self.micromarks as u128
    }

    /// Convert Unix milliseconds; instants before the epoch clamp to zero
    pub fn from_unix_ms(unix_ms: i64, epoch_ms: i64) -> Self {
        Self::from_micromarks(unix_ms_to_micromarks(unix_ms, epoch_ms))
    }

    /// Convert back to Unix milliseconds
    pub fn to_unix_ms(&self, epoch_ms: i64) -> i64 {
        micromarks_to_unix_ms(self.total_micromarks(), epoch_ms)
    }

    /// Convert a UTC instant
    pub fn from_datetime(dt: DateTime<Utc>, epoch_ms: i64) -> Self {
        Self::from_unix_ms(dt.timestamp_millis(), epoch_ms)
    }

    /// Convert to a UTC instant
    pub fn to_datetime(&self, epoch_ms: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.to_unix_ms(epoch_ms)).single()
    }

    /// Fractional turns
    pub fn as_f64(&self) -> f64 {
        self.turns as f64 + self.micromarks as f64 / MICROMARKS_PER_TURN as f64
    }
}

/// Micromarks elapsed between the epoch and a Unix millisecond instant
pub fn unix_ms_to_micromarks(unix_ms: i64, epoch_ms: i64) -> u128 {
    let delta_ms = unix_ms.saturating_sub(epoch_ms);
    if delta_ms <= 0 {
        return 0;
    }
    let micros = delta_ms as u128 * 1_000;
    micros * MICROMARKS_PER_TURN / MICROS_PER_TURN
}

/// Unix milliseconds for a micromark count
pub fn micromarks_to_unix_ms(micromarks: u128, epoch_ms: i64) -> i64 {
    let micros = micromarks * MICROS_PER_TURN / MICROMARKS_PER_TURN;
    let ms = (micros / 1_000).min(i64::MAX as u128) as i64;
    ms.saturating_add(epoch_ms)
}

impl fmt::Display for GeoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GT[{}.{:09}]", self.turns, self.micromarks)
    }
}

impl FromStr for GeoTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix("GT[")
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| CoreError::MalformedRecord(format!("not a GeoTime: {}", s)))?;
        let (turns, micromarks) = inner
            .split_once('.')
            .ok_or_else(|| CoreError::MalformedRecord(format!("not a GeoTime: {}", s)))?;
        if micromarks.len() != 9 {
            return Err(CoreError::MalformedRecord(format!(
                "GeoTime needs 9 micromark digits: {}",
                s
            )));
        }
        let turns = turns
            .parse::<u64>()
            .map_err(|e| CoreError::MalformedRecord(format!("invalid turns: {}", e)))?;
        let micromarks = micromarks
            .parse::<u64>()
            .map_err(|e| CoreError::MalformedRecord(format!("invalid micromarks: {}", e)))?;
        Ok(Self { turns, micromarks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_EPOCH_MS;

    #[test]
    fn test_one_turn() {
        let one_turn_ms = (MICROS_PER_TURN / 1_000) as i64;
        let gt = GeoTime::from_unix_ms(DEFAULT_EPOCH_MS + one_turn_ms, DEFAULT_EPOCH_MS);
        // 86_164_090 ms is 500 micros short of a full turn
        assert_eq!(gt.turns, 0);
        assert!(gt.micromarks > 999_999_990);

        let gt = GeoTime::from_unix_ms(DEFAULT_EPOCH_MS + one_turn_ms + 1, DEFAULT_EPOCH_MS);
        assert_eq!(gt.turns, 1);
    }

    #[test]
    fn test_before_epoch_clamps() {
        assert_eq!(GeoTime::from_unix_ms(0, DEFAULT_EPOCH_MS), GeoTime::default());
    }

    #[test]
    fn test_display_and_parse() {
        let gt = GeoTime { turns: 12, micromarks: 345 };
        assert_eq!(gt.to_string(), "GT[12.000000345]");
        assert_eq!("GT[12.000000345]".parse::<GeoTime>().unwrap(), gt);
        assert!("GT[12.345]".parse::<GeoTime>().is_err());
        assert!("12.000000345".parse::<GeoTime>().is_err());
    }

    #[test]
    fn test_unix_round_trip_within_a_millisecond() {
        let unix_ms = DEFAULT_EPOCH_MS + 1_234_567_890;
        let gt = GeoTime::from_unix_ms(unix_ms, DEFAULT_EPOCH_MS);
        let back = gt.to_unix_ms(DEFAULT_EPOCH_MS);
        assert!((unix_ms - back).abs() <= 1);
    }
}
