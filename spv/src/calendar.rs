// PSPP - a program for statistical analysis.
// Copyright (C) 2025 Free Software Foundation, Inc.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};

const EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1582, 10, 14) {
    Some(date) => date,
    None => panic!(),
};
const EPOCH_DATETIME: NaiveDateTime = EPOCH.and_time(NaiveTime::MIN);

/// Returns the number of seconds from midnight on 14 Oct 1582 to `date_time`.
pub fn date_time_to_pspp(date_time: NaiveDateTime) -> f64 {
    (date_time - EPOCH_DATETIME).as_seconds_f64()
}

/// Takes a count of days from 14 Oct 1582 and translates it into a Gregorian
/// calendar date, if possible.  Positive and negative offsets are supported.
pub fn calendar_offset_to_gregorian(offset: f64) -> Option<NaiveDate> {
    let offset = offset as i64;
    if offset >= 0 {
        EPOCH.checked_add_days(Days::new(offset as u64))
    } else {
        EPOCH.checked_sub_days(Days::new(offset.unsigned_abs()))
    }
}

/// Returns the day of the year, where January 1 is day 1.
pub fn day_of_year(date: NaiveDate) -> Option<u32> {
    let january1 = NaiveDate::from_ymd_opt(date.year(), 1, 1)?;
    let delta = date - january1;
    Some(delta.num_days() as u32 + 1)
}

/// Returns the name for a month as a 3-character all-caps string.
pub fn short_month_name(month: u32) -> Option<&'static str> {
    let name = match month {
        1 => "JAN",
        2 => "FEB",
        3 => "MAR",
        4 => "APR",
        5 => "MAY",
        6 => "JUN",
        7 => "JUL",
        8 => "AUG",
        9 => "SEP",
        10 => "OCT",
        11 => "NOV",
        12 => "DEC",
        _ => return None,
    };
    Some(name)
}

/// Returns the name for a month as an all-caps string.
pub fn month_name(month: u32) -> Option<&'static str> {
    let name = match month {
        1 => "JANUARY",
        2 => "FEBRUARY",
        3 => "MARCH",
        4 => "APRIL",
        5 => "MAY",
        6 => "JUNE",
        7 => "JULY",
        8 => "AUGUST",
        9 => "SEPTEMBER",
        10 => "OCTOBER",
        11 => "NOVEMBER",
        12 => "DECEMBER",
        _ => return None,
    };
    Some(name)
}

/// Parses `s` in the form `YYYY-MM-DDThh:mm:ss.mmm`, as written into legacy
/// table data, and returns the number of seconds since the PSPP epoch.
///
/// The fractional seconds are optional.
pub fn parse_iso_date_time(s: &str) -> Option<f64> {
    let date_time = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    if date_time.date() < EPOCH {
        return None;
    }
    Some(date_time_to_pspp(date_time))
}

/// Parses `s` in the form `hh:mm:ss.mmm`, as written into legacy table data,
/// and returns the number of seconds it represents.
///
/// The hour field may exceed 23 (it represents a duration) and the fractional
/// seconds are optional.
pub fn parse_time(s: &str) -> Option<f64> {
    let mut fields = s.splitn(3, ':');
    let hours = fields.next()?;
    let minutes = fields.next()?;
    let seconds = fields.next()?;
    if hours.is_empty()
        || !hours.bytes().all(|b| b.is_ascii_digit())
        || minutes.len() != 2
        || !minutes.bytes().all(|b| b.is_ascii_digit())
        || seconds.len() < 2
        || !seconds.as_bytes()[..2].iter().all(u8::is_ascii_digit)
    {
        return None;
    }
    let hours: f64 = hours.parse().ok()?;
    let minutes: f64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    if minutes >= 60.0 || seconds >= 60.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{calendar_offset_to_gregorian, day_of_year, parse_iso_date_time, parse_time};

    #[test]
    fn offsets() {
        assert_eq!(
            calendar_offset_to_gregorian(1.0),
            NaiveDate::from_ymd_opt(1582, 10, 15)
        );
        assert_eq!(
            calendar_offset_to_gregorian(-1.0),
            NaiveDate::from_ymd_opt(1582, 10, 13)
        );
        assert_eq!(
            day_of_year(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            Some(61)
        );
    }

    #[test]
    fn legacy_date_strings() {
        assert_eq!(parse_iso_date_time("1582-10-15T00:00:00.000"), Some(86400.0));
        assert_eq!(parse_iso_date_time("1582-10-15T01:00:00"), Some(90000.0));
        assert_eq!(parse_iso_date_time("2001-13-01T00:00:00.000"), None);
        assert_eq!(parse_iso_date_time("bogus"), None);
        assert_eq!(parse_time("01:02:03.500"), Some(3723.5));
        assert_eq!(parse_time("100:00:00"), Some(360000.0));
        assert_eq!(parse_time("1:2:3"), None);
        assert_eq!(parse_time("1:00:\u{20ac}"), None);
        assert_eq!(parse_time("1:00:5\u{20ac}"), None);
    }
}
