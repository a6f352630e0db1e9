use chrono::{NaiveDate, TimeZone, Utc};
use tracing::warn;

/// Decode a single binary-coded-decimal byte. Values above 0x99 are clamped.
#[must_use]
pub fn bcd2char(bcd: u8) -> u8 {
    let bcd = bcd.min(153);
    (bcd & 15) + 10 * (bcd >> 4)
}

/// Expand a two digit year; years before 90 are in the 2000s.
#[must_use]
pub fn full_year(year: u8) -> i32 {
    let year = i32::from(year);
    if year >= 90 {
        1900 + year
    } else {
        2000 + year
    }
}

/// Decode the 6 byte instrument clock (minute, second, day, hour, year, month, all
/// BCD) into seconds since the Unix epoch, UTC.
///
/// Returns NaN if the bytes do not form a valid calendar date and time.
#[must_use]
pub fn decode_bcd_time(dat: &[u8]) -> f64 {
    let [minute, second, day, hour, year, month] = match dat {
        [a, b, c, d, e, f, ..] => [*a, *b, *c, *d, *e, *f].map(bcd2char),
        _ => return f64::NAN,
    };
    let dt = NaiveDate::from_ymd_opt(full_year(year), u32::from(month), u32::from(day))
        .and_then(|d| d.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second)));
    match dt {
        Some(dt) => Utc.from_utc_datetime(&dt).timestamp() as f64,
        None => {
            warn!(?dat, "invalid instrument clock bytes");
            f64::NAN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_bytes() {
        assert_eq!(bcd2char(0x00), 0);
        assert_eq!(bcd2char(0x09), 9);
        assert_eq!(bcd2char(0x59), 59);
        assert_eq!(bcd2char(0xff), 99);
    }

    #[test]
    fn two_digit_years() {
        assert_eq!(full_year(12), 2012);
        assert_eq!(full_year(89), 2089);
        assert_eq!(full_year(90), 1990);
        assert_eq!(full_year(99), 1999);
    }

    #[test]
    fn decode_clock() {
        // 2012-06-12 10:30:15
        let dat = [0x30, 0x15, 0x12, 0x10, 0x12, 0x06];
        assert_eq!(decode_bcd_time(&dat), 1_339_497_015.0);
    }

    #[test]
    fn decode_invalid_clock_is_nan() {
        let dat = [0x00, 0x00, 0x00, 0x00, 0x12, 0x00];
        assert!(decode_bcd_time(&dat).is_nan());
        assert!(decode_bcd_time(&dat[..3]).is_nan());
    }
}
