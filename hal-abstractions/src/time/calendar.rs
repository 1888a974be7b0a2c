//! Calendar date conversions using O(1) algorithms
//!
//! Implements Howard Hinnant's days_from_civil algorithm.
//! Reference: http://howardhinnant.github.io/date_algorithms.html

/// Convert civil date (year, month, day) to days since Unix epoch
pub(crate) fn days_from_civil(year: u16, month: u8, day: u8) -> i32 {
    let y = year as i32;
    let m = month as i32;
    let d = day as i32;

    // March = month 0, February = month 11
    let (y, m) = if m <= 2 { (y - 1, m + 9) } else { (y, m - 3) };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u32;
    let doy = (153 * (m as u32) + 2) / 5 + (d as u32) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;

    era * 146097 + (doe as i32) - 719468
}

/// ISO weekday (1 = Monday ... 7 = Sunday) for a day count since the epoch
pub(crate) fn weekday_from_days(days_since_epoch: i32) -> u8 {
    // 1970-01-01 was a Thursday (ISO 4)
    ((days_since_epoch + 3).rem_euclid(7) + 1) as u8
}
