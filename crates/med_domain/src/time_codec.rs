use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, NaiveTime, TimeZone};

use crate::error::{ReminderError, Result};

const DST_GAP_SEARCH_MINUTES: i64 = 180;

/// Parse a strict `HH:MM` string in the range `00:00..=23:59`.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    let invalid = || ReminderError::InvalidTimeFormat(raw.to_string());
    let bytes = raw.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(invalid());
    }
    let digit = |idx: usize| -> Result<u32> {
        let byte = bytes[idx];
        if byte.is_ascii_digit() {
            Ok(u32::from(byte - b'0'))
        } else {
            Err(invalid())
        }
    };
    let hour = digit(0)? * 10 + digit(1)?;
    let minute = digit(3)? * 10 + digit(4)?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

/// Next instant strictly after `now` at which the wall clock reads
/// `time_of_day` (seconds zeroed). A time equal to `now` rolls to tomorrow.
pub fn next_occurrence<Tz: TimeZone>(time_of_day: &str, now: &DateTime<Tz>) -> Result<DateTime<Tz>> {
    let time = parse_time_of_day(time_of_day)?;
    let tz = now.timezone();
    let today = now.date_naive();

    let candidate = resolve_local(&tz, today.and_time(time))?;
    if candidate > *now {
        return Ok(candidate);
    }

    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| ReminderError::UnrepresentableTime(today.to_string()))?;
    resolve_local(&tz, tomorrow.and_time(time))
}

pub fn format_time_of_day<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    instant.naive_local().format("%H:%M").to_string()
}

pub fn delay_until<Tz: TimeZone, Tz2: TimeZone>(fire_at: &DateTime<Tz>, now: &DateTime<Tz2>) -> Duration {
    fire_at
        .clone()
        .signed_duration_since(now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>> {
    // Ambiguous (fall back) picks the earlier instant; a gap (spring forward)
    // moves to the first minute that exists.
    (0..=DST_GAP_SEARCH_MINUTES)
        .find_map(|offset| {
            tz.from_local_datetime(&(naive + ChronoDuration::minutes(offset)))
                .earliest()
        })
        .ok_or_else(|| ReminderError::UnrepresentableTime(naive.to_string()))
}
