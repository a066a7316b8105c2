//! # Civil Date and Timestamp Helpers
//!
//! Conversions between the store's two temporal field encodings and their
//! string forms:
//!
//! - `Date`: signed 32-bit day count since 1970-01-01, rendered `YYYY-MM-DD`
//! - `Timestamp`: signed 64-bit millisecond count since
//!   1970-01-01T00:00:00 UTC (no leap seconds), rendered
//!   `YYYY-MM-DDTHH:MM:SS.sss`
//!
//! The calendar math decomposes dates into 400-year Gregorian eras with
//! March-based years (the leap day falls at year end), which makes both
//! directions exact closed-form arithmetic over the full `i32` day range
//! — no lookup tables, no iteration.
//!
//! Parsing comes in two shapes: the fixed ISO forms above (used by the
//! `view` CLI and tests), and a small strptime-style subset used by the
//! CSV import pipeline:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `%Y`  | 4-digit year |
//! | `%m`  | 2-digit month |
//! | `%d`  | 2-digit day |
//! | `%H`  | 2-digit hour (24h) |
//! | `%M`  | 2-digit minute |
//! | `%S`  | 2-digit second |
//! | `%F`  | optional fractional seconds (`.` + digits), truncated to ms |
//!
//! Any other byte in the format must match the input literally.

use eyre::{bail, ensure, Result};

pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Days per 400-year Gregorian era (97 of the 400 years are leap).
const DAYS_PER_ERA: i64 = 146_097;

/// Day count of 1970-01-01 on an era timeline anchored at 0000-03-01.
/// Anchoring years at March 1 puts the leap day last, so month lengths
/// follow one fixed pattern and leap handling collapses into the era
/// arithmetic.
const UNIX_EPOCH_ERA_DAY: i64 = 719_468;

/// Days since 1970-01-01 for a civil date.
///
/// The Gregorian calendar repeats exactly every 400 years, so the date is
/// decomposed into (era, year of era, day of year) on March-based years
/// and reassembled as a flat day count. Euclidean division keeps the
/// decomposition exact for dates before the era origin.
pub fn date_to_days(year: i64, month: u32, day: u32) -> i64 {
    let march_year = if month <= 2 { year - 1 } else { year };
    let era = march_year.div_euclid(400);
    let year_of_era = march_year.rem_euclid(400);

    // Months counted from March; (153 m + 2) / 5 walks the fixed
    // 31,30,31,30,31... pattern of March-based month lengths.
    let month_from_march = (if month > 2 { month - 3 } else { month + 9 }) as i64;
    let day_of_year = (153 * month_from_march + 2) / 5 + (day as i64 - 1);

    let day_of_era =
        year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;

    era * DAYS_PER_ERA + day_of_era - UNIX_EPOCH_ERA_DAY
}

/// Civil date for a day count since 1970-01-01. Exact inverse of
/// [`date_to_days`] over the full representable range.
pub fn days_to_date(days: i64) -> (i64, u32, u32) {
    let era_day = days + UNIX_EPOCH_ERA_DAY;
    let era = era_day.div_euclid(DAYS_PER_ERA);
    let day_of_era = era_day.rem_euclid(DAYS_PER_ERA);

    // Undo the leap-day corrections: every 1460 days of era one leap day
    // has accrued, minus the 36524-day century exceptions, plus the one
    // era-closing leap day at day 146096.
    let year_of_era = (day_of_era - day_of_era / 1460 + day_of_era / 36_524
        - day_of_era / (DAYS_PER_ERA - 1))
        / 365;
    let day_of_year =
        day_of_era - (year_of_era * 365 + year_of_era / 4 - year_of_era / 100);

    let month_from_march = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * month_from_march + 2) / 5 + 1) as u32;

    let march_year = year_of_era + era * 400;
    if month_from_march < 10 {
        (march_year, month_from_march as u32 + 3, day)
    } else {
        (march_year + 1, month_from_march as u32 - 9, day)
    }
}

pub fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

pub fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Renders a day count as `YYYY-MM-DD`.
pub fn format_date(days: i32) -> String {
    let (year, month, day) = days_to_date(days as i64);
    format!("{:04}-{:02}-{:02}", year, month, day)
}

/// Renders a millisecond timestamp as `YYYY-MM-DDTHH:MM:SS.sss`.
pub fn format_timestamp(ts: i64) -> String {
    let days = ts.div_euclid(MILLIS_PER_DAY);
    let in_day = ts.rem_euclid(MILLIS_PER_DAY);
    let (year, month, day) = days_to_date(days);
    let millis = in_day % 1000;
    let seconds = in_day / 1000;
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}",
        year,
        month,
        day,
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60,
        millis
    )
}

fn timestamp_from_parts(
    year: i64,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    millis: u32,
) -> Result<i64> {
    ensure!((1..=12).contains(&month), "month {} out of range", month);
    ensure!(
        day >= 1 && day <= days_in_month(year, month),
        "day {} out of range for {:04}-{:02}",
        day,
        year,
        month
    );
    ensure!(hour < 24, "hour {} out of range", hour);
    ensure!(minute < 60, "minute {} out of range", minute);
    ensure!(second < 60, "second {} out of range", second);

    let days = date_to_days(year, month, day);
    let in_day = ((hour as i64 * 60 + minute as i64) * 60 + second as i64) * 1000 + millis as i64;
    Ok(days * MILLIS_PER_DAY + in_day)
}

fn parse_fixed_digits(bytes: &[u8], pos: &mut usize, n: usize) -> Result<i64> {
    ensure!(
        *pos + n <= bytes.len(),
        "timestamp string too short at offset {}",
        *pos
    );
    let mut value: i64 = 0;
    for &b in &bytes[*pos..*pos + n] {
        ensure!(b.is_ascii_digit(), "expected digit, found '{}'", b as char);
        value = value * 10 + (b - b'0') as i64;
    }
    *pos += n;
    Ok(value)
}

/// Parses an ISO timestamp `YYYY-MM-DDTHH:MM:SS[.fff]`. The time part may
/// be omitted entirely (midnight is assumed), and a space is accepted in
/// place of the `T` separator.
pub fn parse_iso_timestamp(s: &str) -> Result<i64> {
    let bytes = s.trim().as_bytes();
    let mut pos = 0;

    let year = parse_fixed_digits(bytes, &mut pos, 4)?;
    expect_byte(bytes, &mut pos, b'-')?;
    let month = parse_fixed_digits(bytes, &mut pos, 2)? as u32;
    expect_byte(bytes, &mut pos, b'-')?;
    let day = parse_fixed_digits(bytes, &mut pos, 2)? as u32;

    if pos == bytes.len() {
        return timestamp_from_parts(year, month, day, 0, 0, 0, 0);
    }

    ensure!(
        bytes[pos] == b'T' || bytes[pos] == b' ',
        "expected 'T' between date and time in '{}'",
        s
    );
    pos += 1;

    let hour = parse_fixed_digits(bytes, &mut pos, 2)? as u32;
    expect_byte(bytes, &mut pos, b':')?;
    let minute = parse_fixed_digits(bytes, &mut pos, 2)? as u32;
    expect_byte(bytes, &mut pos, b':')?;
    let second = parse_fixed_digits(bytes, &mut pos, 2)? as u32;

    let millis = if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        parse_fraction_millis(bytes, &mut pos)?
    } else {
        0
    };

    ensure!(pos == bytes.len(), "trailing input in timestamp '{}'", s);
    timestamp_from_parts(year, month, day, hour, minute, second, millis)
}

/// Parses a date `YYYY-MM-DD` into a day count.
pub fn parse_iso_date(s: &str) -> Result<i32> {
    let bytes = s.trim().as_bytes();
    let mut pos = 0;
    let year = parse_fixed_digits(bytes, &mut pos, 4)?;
    expect_byte(bytes, &mut pos, b'-')?;
    let month = parse_fixed_digits(bytes, &mut pos, 2)? as u32;
    expect_byte(bytes, &mut pos, b'-')?;
    let day = parse_fixed_digits(bytes, &mut pos, 2)? as u32;
    ensure!(pos == bytes.len(), "trailing input in date '{}'", s);
    ensure!((1..=12).contains(&month), "month {} out of range", month);
    ensure!(
        day >= 1 && day <= days_in_month(year, month),
        "day {} out of range",
        day
    );
    Ok(date_to_days(year, month, day) as i32)
}

fn expect_byte(bytes: &[u8], pos: &mut usize, expected: u8) -> Result<()> {
    ensure!(
        *pos < bytes.len() && bytes[*pos] == expected,
        "expected '{}' at offset {}",
        expected as char,
        *pos
    );
    *pos += 1;
    Ok(())
}

fn parse_fraction_millis(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    let start = *pos;
    while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    ensure!(*pos > start, "empty fractional seconds");
    // Truncate to millisecond precision.
    let mut millis: u32 = 0;
    for (i, &b) in bytes[start..*pos].iter().enumerate() {
        if i >= 3 {
            break;
        }
        millis = millis * 10 + (b - b'0') as u32;
    }
    for _ in (*pos - start)..3 {
        millis *= 10;
    }
    Ok(millis)
}

/// Parses a timestamp string under a strptime-subset format. The input is
/// interpreted as UTC with no leap seconds.
pub fn parse_timestamp_format(input: &str, format: &str) -> Result<i64> {
    let bytes = input.as_bytes();
    let fmt = format.as_bytes();
    let mut pos = 0;
    let mut fpos = 0;

    let mut year: i64 = 1970;
    let mut month: u32 = 1;
    let mut day: u32 = 1;
    let mut hour: u32 = 0;
    let mut minute: u32 = 0;
    let mut second: u32 = 0;
    let mut millis: u32 = 0;

    while fpos < fmt.len() {
        if fmt[fpos] == b'%' {
            ensure!(fpos + 1 < fmt.len(), "dangling '%' in format '{}'", format);
            let spec = fmt[fpos + 1];
            fpos += 2;
            match spec {
                b'Y' => year = parse_fixed_digits(bytes, &mut pos, 4)?,
                b'm' => month = parse_fixed_digits(bytes, &mut pos, 2)? as u32,
                b'd' => day = parse_fixed_digits(bytes, &mut pos, 2)? as u32,
                b'H' => hour = parse_fixed_digits(bytes, &mut pos, 2)? as u32,
                b'M' => minute = parse_fixed_digits(bytes, &mut pos, 2)? as u32,
                b'S' => second = parse_fixed_digits(bytes, &mut pos, 2)? as u32,
                b'F' => {
                    // Optional fraction: consume ".digits" when present.
                    if pos < bytes.len() && bytes[pos] == b'.' {
                        pos += 1;
                        millis = parse_fraction_millis(bytes, &mut pos)?;
                    }
                }
                b'%' => expect_byte(bytes, &mut pos, b'%')?,
                other => bail!("unsupported format token '%{}'", other as char),
            }
        } else {
            expect_byte(bytes, &mut pos, fmt[fpos])?;
            fpos += 1;
        }
    }

    ensure!(
        pos == bytes.len(),
        "trailing input '{}' after timestamp",
        input.get(pos..).unwrap_or("")
    );
    timestamp_from_parts(year, month, day, hour, minute, second, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_is_day_zero() {
        assert_eq!(date_to_days(1970, 1, 1), 0);
        assert_eq!(days_to_date(0), (1970, 1, 1));
    }

    #[test]
    fn date_roundtrip_covers_leap_years() {
        for days in [
            -800_000, -719_162, -1, 0, 59, 60, 365, 11_016, 18_321, 2_932_896,
        ] {
            let (y, m, d) = days_to_date(days);
            assert_eq!(date_to_days(y, m, d), days, "day {}", days);
        }
        assert_eq!(days_to_date(11016), (2000, 2, 29));
    }

    #[test]
    fn era_boundary_dates_are_exact() {
        // 2000-02-29 is the last day of an era; 2000-03-01 opens the next.
        assert_eq!(days_to_date(11_016), (2000, 2, 29));
        assert_eq!(days_to_date(11_017), (2000, 3, 1));
        assert_eq!(date_to_days(2000, 2, 29), 11_016);
        assert_eq!(date_to_days(2000, 3, 1), 11_017);

        // Same boundary one era earlier.
        assert_eq!(date_to_days(1600, 2, 29), 11_016 - 146_097);
        assert_eq!(days_to_date(11_016 - 146_097), (1600, 2, 29));
    }

    #[test]
    fn format_date_iso() {
        assert_eq!(format_date(0), "1970-01-01");
        assert_eq!(format_date(11016), "2000-02-29");
        assert_eq!(format_date(-1), "1969-12-31");
    }

    #[test]
    fn format_timestamp_truncates_to_millis() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00.000");
        assert_eq!(format_timestamp(1000), "1970-01-01T00:00:01.000");
        assert_eq!(format_timestamp(86_400_000 + 1500), "1970-01-02T00:00:01.500");
        assert_eq!(format_timestamp(-1), "1969-12-31T23:59:59.999");
    }

    #[test]
    fn iso_timestamp_roundtrip() {
        for ts in [0, 1, 999, 1000, 86_400_000, 1_262_307_661_100] {
            let s = format_timestamp(ts);
            assert_eq!(parse_iso_timestamp(&s).unwrap(), ts, "{}", s);
        }
    }

    #[test]
    fn iso_timestamp_date_only_is_midnight() {
        assert_eq!(parse_iso_timestamp("1970-01-02").unwrap(), MILLIS_PER_DAY);
    }

    #[test]
    fn iso_date_parses_and_validates() {
        assert_eq!(parse_iso_date("1970-01-01").unwrap(), 0);
        assert_eq!(parse_iso_date("2000-02-29").unwrap(), 11016);
        assert!(parse_iso_date("2001-02-29").is_err());
        assert!(parse_iso_date("1970-01-01T00:00:00").is_err());
    }

    #[test]
    fn iso_timestamp_rejects_garbage() {
        assert!(parse_iso_timestamp("not-a-date").is_err());
        assert!(parse_iso_timestamp("2010-13-01").is_err());
        assert!(parse_iso_timestamp("2010-02-30").is_err());
        assert!(parse_iso_timestamp("2010-01-01T25:00:00").is_err());
        assert!(parse_iso_timestamp("2010-01-01T00:00:00junk").is_err());
    }

    #[test]
    fn strptime_subset_parses_import_formats() {
        let ts = parse_timestamp_format("2010/01/01 01:01:01.100", "%Y/%m/%d %H:%M:%S%F").unwrap();
        assert_eq!(format_timestamp(ts), "2010-01-01T01:01:01.100");

        let ts = parse_timestamp_format("20100101T010101", "%Y%m%dT%H%M%S%F").unwrap();
        assert_eq!(format_timestamp(ts), "2010-01-01T01:01:01.000");
    }

    #[test]
    fn strptime_subset_rejects_mismatches() {
        assert!(parse_timestamp_format("2010-01-01", "%Y/%m/%d").is_err());
        assert!(parse_timestamp_format("2010/01/01 extra", "%Y/%m/%d").is_err());
        assert!(parse_timestamp_format("2010/01/01", "%Y/%m/%d%Q").is_err());
    }

    #[test]
    fn fraction_truncates_beyond_millis() {
        let ts = parse_timestamp_format("00:00:00.123456", "%H:%M:%S%F").unwrap();
        assert_eq!(ts, 123);
        let ts = parse_timestamp_format("00:00:00.5", "%H:%M:%S%F").unwrap();
        assert_eq!(ts, 500);
    }
}
