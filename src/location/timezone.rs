//! Local-time and DST derivation for providers that only report a zone id.
//!
//! Offsets come from the tz database via `chrono-tz`; nothing here keeps its
//! own offset table.

use chrono::{DateTime, Datelike, Offset, TimeZone, Utc};
use chrono_tz::Tz;

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d, %H:%M:%S";

fn parse_zone(id: &str) -> Option<Tz> {
    id.trim().parse::<Tz>().ok()
}

/// Current wall-clock time in `id`, formatted `YYYY-MM-DD, HH:MM:SS`.
pub fn current_time_for_zone(id: &str) -> Option<String> {
    current_time_at(id, Utc::now())
}

pub fn current_time_at(id: &str, now: DateTime<Utc>) -> Option<String> {
    let tz = parse_zone(id)?;
    Some(now.with_timezone(&tz).format(LOCAL_TIME_FORMAT).to_string())
}

/// Best-effort DST flag for `id` right now. See [`is_dst_at`].
pub fn is_dst_now_in_zone(id: &str) -> Option<bool> {
    is_dst_at(id, Utc::now())
}

/// Compares the zone's offset at `now` against the larger of its Jan 1 and
/// Jul 1 offsets; a smaller current offset is reported as DST.
///
/// This is a heuristic. Zones whose DST moves the clock in an unusual
/// direction or at unusual times can be misclassified.
pub fn is_dst_at(id: &str, now: DateTime<Utc>) -> Option<bool> {
    let tz = parse_zone(id)?;
    let year = now.year();
    let jan = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
    let jul = Utc.with_ymd_and_hms(year, 7, 1, 0, 0, 0).single()?;

    let now_offset = zoned_offset_minutes(&tz, now);
    let baseline = zoned_offset_minutes(&tz, jan).max(zoned_offset_minutes(&tz, jul));
    Some(now_offset < baseline)
}

/// Offset east of UTC, in minutes, that `tz` observes at instant `at`.
fn zoned_offset_minutes(tz: &Tz, at: DateTime<Utc>) -> i32 {
    tz.offset_from_utc_datetime(&at.naive_utc())
        .fix()
        .local_minus_utc()
        / 60
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn formats_local_time_in_zone() {
        assert_eq!(
            current_time_at("Asia/Kolkata", at(2024, 3, 10, 12)).as_deref(),
            Some("2024-03-10, 17:30:00")
        );
        assert_eq!(
            current_time_at("America/New_York", at(2024, 7, 1, 3)).as_deref(),
            Some("2024-06-30, 23:00:00")
        );
    }

    #[test]
    fn unknown_zone_yields_nothing() {
        assert_eq!(current_time_at("Mars/Olympus_Mons", at(2024, 1, 1, 0)), None);
        assert_eq!(is_dst_at("Mars/Olympus_Mons", at(2024, 1, 1, 0)), None);
    }

    #[test]
    fn fixed_offset_zones_never_report_dst() {
        assert_eq!(is_dst_at("UTC", at(2024, 1, 15, 12)), Some(false));
        assert_eq!(is_dst_at("Asia/Kolkata", at(2024, 7, 15, 12)), Some(false));
    }

    #[test]
    fn offset_below_larger_seasonal_offset_counts_as_dst() {
        // New York: -300 in January, -240 in July. Baseline is -240.
        assert_eq!(is_dst_at("America/New_York", at(2024, 1, 15, 12)), Some(true));
        assert_eq!(is_dst_at("America/New_York", at(2024, 7, 15, 12)), Some(false));
    }

    #[test]
    fn offsets_are_minutes_east_of_utc() {
        let tz: Tz = "Asia/Kathmandu".parse().unwrap();
        assert_eq!(zoned_offset_minutes(&tz, at(2024, 5, 1, 0)), 345);
        let tz: Tz = "America/Los_Angeles".parse().unwrap();
        assert_eq!(zoned_offset_minutes(&tz, at(2024, 1, 1, 12)), -480);
    }
}
