//! Wall-clock helpers for log records and log file names.
//!
//! UTC only; the civil-date conversion is done by hand so the crate does not
//! pull in a date/time dependency for two format strings.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the UNIX epoch (0 if the clock is before the epoch).
pub fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimpleUtc {
    pub year: i32,
    pub mon: u32,
    pub day: u32,
    pub hour: u32,
    pub min: u32,
    pub sec: u32,
}

#[derive(Debug)]
pub enum UtcConvError {
    Year,
    Month,
    Day,
}

/// `YYYY-MM-DD HH:MM:SS.mmm` for a millisecond timestamp.
pub fn format_log_timestamp(ts_ms: u128) -> String {
    let secs = u64::try_from(ts_ms / 1_000).unwrap_or(u64::MAX);
    let millis = (ts_ms % 1_000) as u32;
    unix_to_utc(secs).map_or_else(
        |_| format!("unix_{secs}.{millis:03}"),
        |tm| {
            format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
                tm.year, tm.mon, tm.day, tm.hour, tm.min, tm.sec, millis
            )
        },
    )
}

/// `YYYYMMDD_HHMMSS` for the current time, used in log file names.
pub fn timestamp_for_filename() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    unix_to_utc(secs).map_or_else(
        |_| format!("unix_{secs}"),
        |tm| {
            format!(
                "{:04}{:02}{:02}_{:02}{:02}{:02}",
                tm.year, tm.mon, tm.day, tm.hour, tm.min, tm.sec
            )
        },
    )
}

/// Converts a UNIX timestamp (seconds) to a proleptic Gregorian UTC date.
///
/// # Errors
///
/// Returns a [`UtcConvError`] if a component does not fit its integer type.
#[allow(clippy::many_single_char_names)]
pub fn unix_to_utc(mut s: u64) -> Result<SimpleUtc, UtcConvError> {
    let sec = (s % 60) as u32;
    s /= 60;
    let min = (s % 60) as u32;
    s /= 60;
    let hour = (s % 24) as u32;
    s /= 24;

    let z: i128 = i128::from(s) + 719_468;

    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097; // [0, 146096]
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = doy - (153 * mp + 2) / 5 + 1; // [1, 31]
    let m = mp + if mp < 10 { 3 } else { -9 }; // [1, 12]

    let year_i = y + i128::from(m <= 2);

    let year = i32::try_from(year_i).map_err(|_| UtcConvError::Year)?;
    let mon = u32::try_from(m).map_err(|_| UtcConvError::Month)?;
    let day = u32::try_from(d).map_err(|_| UtcConvError::Day)?;

    Ok(SimpleUtc {
        year,
        mon,
        day,
        hour,
        min,
        sec,
    })
}
