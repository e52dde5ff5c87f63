// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The `YYYYMMDDcc` zone serial scheme.
//!
//! Serials are ten decimal digits: today's UTC date followed by a two-digit
//! counter. A stored serial of zero is never emitted on the wire; the
//! resolver substitutes [`default_serial`] at response time, and save
//! tooling advances serials with [`increment_serial`].

use thiserror::Error;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::warn;

const SERIAL_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year][month][day]");

/// An error advancing a zone serial
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SerialError {
    /// The two-digit counter cannot go past 99 on a single day
    #[error("counter > 99")]
    CounterExceeded,

    /// The date encoded in the serial has not happened yet
    #[error("date of serial is in the future")]
    SerialInFuture,

    /// A non-zero serial that is not ten digits cannot be advanced
    #[error("the provided serial is in the wrong format (!= 10 digits)")]
    WrongFormat,
}

fn compose(date: Date, counter: u32) -> Option<u32> {
    let date = date.format(SERIAL_DATE_FORMAT).ok()?;
    format!("{date}{counter:02}").parse::<u32>().ok()
}

/// Returns a serial for the current UTC day.
///
/// The counter is derived from the time of day,
/// `floor((hour + 1) * (minute + 1) / 14.5454)`, which walks 0..=99 over the
/// day so repeated generations within the same day remain monotonic at
/// minute granularity. If the date cannot be composed into ten digits the
/// current Unix timestamp is used instead.
pub fn default_serial() -> u32 {
    let now = OffsetDateTime::now_utc();
    let counter =
        (((f64::from(now.hour()) + 1.0) * (f64::from(now.minute()) + 1.0)) / 14.5454).floor();
    let counter = (counter as u32).min(99);

    match compose(now.date(), counter) {
        Some(serial) => serial,
        None => {
            warn!("serial date out of range, falling back to unix timestamp");
            now.unix_timestamp() as u32
        }
    }
}

/// Returns a fresh serial for today with the counter at zero
pub fn new_serial() -> u32 {
    let now = OffsetDateTime::now_utc();
    compose(now.date(), 0).unwrap_or(now.unix_timestamp() as u32)
}

/// Advances a serial by one within the current UTC day.
///
/// A serial dated today increments its counter; one dated in the past is
/// reset to today with the counter at zero; zero (no serial assigned yet)
/// becomes today's first serial. Errors on a future date, a counter past
/// 99, or a non-zero serial that is not exactly ten digits.
pub fn increment_serial(serial: u32) -> Result<u32, SerialError> {
    let today = OffsetDateTime::now_utc().date();
    let digits = serial.to_string();

    let counter = if digits.len() == 10 {
        let date =
            Date::parse(&digits[..8], SERIAL_DATE_FORMAT).map_err(|_| SerialError::WrongFormat)?;
        match date.cmp(&today) {
            std::cmp::Ordering::Less => 0,
            std::cmp::Ordering::Greater => return Err(SerialError::SerialInFuture),
            std::cmp::Ordering::Equal => {
                let counter: u32 = digits[8..].parse().map_err(|_| SerialError::WrongFormat)?;
                counter + 1
            }
        }
    } else if serial > 0 {
        return Err(SerialError::WrongFormat);
    } else {
        0
    };

    if counter > 99 {
        return Err(SerialError::CounterExceeded);
    }

    compose(today, counter).ok_or(SerialError::WrongFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today_serial(counter: u32) -> u32 {
        compose(OffsetDateTime::now_utc().date(), counter).expect("date out of range")
    }

    #[test]
    fn test_default_serial_shape() {
        let serial = default_serial();
        let digits = serial.to_string();
        assert_eq!(digits.len(), 10);

        // the first eight digits are today's date
        let date = Date::parse(&digits[..8], SERIAL_DATE_FORMAT).expect("not a date");
        assert_eq!(date, OffsetDateTime::now_utc().date());

        let counter: u32 = digits[8..].parse().expect("not a counter");
        assert!(counter <= 99);
    }

    #[test]
    fn test_new_serial_counter_zero() {
        let serial = new_serial();
        assert_eq!(serial % 100, 0);
    }

    #[test]
    fn test_increment_same_day() {
        let serial = today_serial(4);
        assert_eq!(increment_serial(serial), Ok(today_serial(5)));
    }

    #[test]
    fn test_increment_zero() {
        assert_eq!(increment_serial(0), Ok(today_serial(0)));
    }

    #[test]
    fn test_increment_past_date_resets() {
        assert_eq!(increment_serial(2019010105), Ok(today_serial(0)));
    }

    #[test]
    fn test_increment_counter_exhausted() {
        let serial = today_serial(99);
        assert_eq!(increment_serial(serial), Err(SerialError::CounterExceeded));
    }

    #[test]
    fn test_increment_future_date() {
        assert_eq!(
            increment_serial(4000010100),
            Err(SerialError::SerialInFuture)
        );
    }

    #[test]
    fn test_increment_wrong_format() {
        assert_eq!(increment_serial(12345), Err(SerialError::WrongFormat));
    }
}
