use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use chrono_tz::America::New_York;
use nodestore_core::{RelativeRange, TimeWindow, TimeWindowResolver, WindowError};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 12, 30, 0).unwrap()
}

fn relative(time_range: &str, anchor: Option<&str>) -> TimeWindow {
    TimeWindow::Relative {
        time_range: time_range.to_string(),
        anchor: anchor.map(str::to_string),
    }
}

fn explicit(start: &str, end: &str) -> TimeWindow {
    TimeWindow::Explicit {
        start: start.to_string(),
        end: end.to_string(),
    }
}

#[test]
fn one_day_before_march_first_lands_on_leap_day() {
    let resolver = TimeWindowResolver::utc();
    let window = resolver
        .resolve(&relative("1d", Some("01/03/2024 10:00:00")))
        .unwrap();

    assert_eq!(window.start, utc(2024, 2, 29, 10, 0, 0));
    assert_eq!(window.end, Some(utc(2024, 3, 1, 10, 0, 0)));
}

#[test]
fn one_day_before_march_first_in_common_year() {
    let resolver = TimeWindowResolver::utc();
    let window = resolver
        .resolve(&relative("1d", Some("01/03/2023 10:00:00")))
        .unwrap();

    assert_eq!(window.start, utc(2023, 2, 28, 10, 0, 0));
}

#[test]
fn one_day_rolls_back_across_year_boundary() {
    let resolver = TimeWindowResolver::utc();
    let window = resolver
        .resolve(&relative("1d", Some("01/01/2024 00:15:00")))
        .unwrap();

    assert_eq!(window.start, utc(2023, 12, 31, 0, 15, 0));
}

#[test]
fn hour_ranges_roll_back_across_day_and_month() {
    let resolver = TimeWindowResolver::utc();

    let one_hour = resolver
        .resolve(&relative("1h", Some("01/05/2024 00:20:00")))
        .unwrap();
    assert_eq!(one_hour.start, utc(2024, 4, 30, 23, 20, 0));

    let five_hours = resolver
        .resolve(&relative("5h", Some("01/05/2024 03:00:00")))
        .unwrap();
    assert_eq!(five_hours.start, utc(2024, 4, 30, 22, 0, 0));
    assert_eq!(five_hours.end, Some(utc(2024, 5, 1, 3, 0, 0)));
}

#[test]
fn anchor_seconds_are_kept_as_given() {
    let resolver = TimeWindowResolver::utc();
    let window = resolver
        .resolve(&relative("1h", Some("2024-05-01T10:20:37Z")))
        .unwrap();

    assert_eq!(window.end, Some(utc(2024, 5, 1, 10, 20, 37)));
    assert_eq!(window.start, utc(2024, 5, 1, 9, 20, 37));
}

#[test]
fn unanchored_window_has_no_upper_bound() {
    let resolver = TimeWindowResolver::utc().with_now(fixed_now);

    let window = resolver.resolve(&relative("5h", None)).unwrap();
    assert_eq!(window.start, utc(2024, 6, 10, 7, 30, 0));
    assert_eq!(window.end, None);

    let range = window.to_range();
    assert_eq!(range.gte, Some(utc(2024, 6, 10, 7, 30, 0)));
    assert_eq!(range.lte, None);

    let day = resolver.resolve_relative(RelativeRange::OneDay, None).unwrap();
    assert_eq!(day.start, utc(2024, 6, 9, 12, 30, 0));
}

#[test]
fn invalid_token_fails_regardless_of_anchor() {
    let resolver = TimeWindowResolver::utc();

    for anchor in [None, Some("01/03/2024 10:00:00"), Some("garbage")] {
        assert_eq!(
            resolver.resolve(&relative("2d", anchor)).unwrap_err(),
            WindowError::InvalidTimeRange("2d".to_string())
        );
    }
    assert!(matches!(
        resolver.resolve(&relative("1H", None)),
        Err(WindowError::InvalidTimeRange(_))
    ));
}

#[test]
fn malformed_anchor_is_a_date_format_error() {
    let resolver = TimeWindowResolver::utc();

    assert!(matches!(
        resolver.resolve(&relative("1h", Some("yesterday"))),
        Err(WindowError::InvalidDateFormat(_))
    ));
}

#[test]
fn explicit_literal_boundaries_are_taken_as_is() {
    let resolver = TimeWindowResolver::utc();
    let window = resolver
        .resolve(&explicit("15/04/2025 08:10:17", "15/04/2025 09:45:03"))
        .unwrap();

    assert_eq!(window.start, utc(2025, 4, 15, 8, 10, 17));
    assert_eq!(window.end, Some(utc(2025, 4, 15, 9, 45, 3)));
}

#[test]
fn explicit_generic_boundaries_are_minute_normalized() {
    let resolver = TimeWindowResolver::utc();
    let window = resolver
        .resolve(&explicit("2025-04-15T08:10:17", "2025-04-15 09:45:03"))
        .unwrap();

    assert_eq!(window.start, utc(2025, 4, 15, 8, 10, 0));
    assert_eq!(window.end, Some(utc(2025, 4, 15, 9, 45, 59)));
}

#[test]
fn explicit_date_only_input_starts_at_midnight() {
    let resolver = TimeWindowResolver::utc();

    assert_eq!(
        resolver.normalize_boundary("2025-04-15", false).unwrap(),
        utc(2025, 4, 15, 0, 0, 0)
    );
    assert_eq!(
        resolver.normalize_boundary("2025-04-15", true).unwrap(),
        utc(2025, 4, 15, 0, 0, 59)
    );
}

#[test]
fn explicit_rejects_unparseable_boundaries() {
    let resolver = TimeWindowResolver::utc();

    for (start, end) in [
        ("not a date", "15/04/2025 09:45:03"),
        ("15/04/2025 08:10:17", "32/04/2025 09:45:03"),
        ("", "15/04/2025 09:45:03"),
    ] {
        assert!(matches!(
            resolver.resolve(&explicit(start, end)),
            Err(WindowError::InvalidDateFormat(_))
        ));
    }
}

#[test]
fn wall_clock_is_interpreted_in_the_configured_zone() {
    let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
    let resolver = TimeWindowResolver::new(plus_two);

    assert_eq!(
        resolver.parse_boundary("01/03/2024 10:00:00").unwrap(),
        utc(2024, 3, 1, 8, 0, 0)
    );

    let window = resolver
        .resolve(&relative("1d", Some("01/03/2024 01:00:00")))
        .unwrap();
    assert_eq!(window.end, Some(utc(2024, 2, 29, 23, 0, 0)));
    assert_eq!(window.start, utc(2024, 2, 28, 23, 0, 0));
}

#[test]
fn rfc3339_offsets_are_honoured_over_the_configured_zone() {
    let resolver = TimeWindowResolver::utc();

    assert_eq!(
        resolver.parse_instant("2024-03-01T10:00:00+02:00").unwrap(),
        utc(2024, 3, 1, 8, 0, 0)
    );
}

#[test]
fn one_day_keeps_wall_clock_across_spring_forward() {
    let resolver = TimeWindowResolver::new(New_York);
    let window = resolver
        .resolve(&relative("1d", Some("10/03/2024 12:00:00")))
        .unwrap();

    assert_eq!(window.end, Some(utc(2024, 3, 10, 16, 0, 0)));
    assert_eq!(window.start, utc(2024, 3, 9, 17, 0, 0));
    assert_eq!(window.end.unwrap() - window.start, Duration::hours(23));
}

#[test]
fn one_day_keeps_wall_clock_across_fall_back() {
    let resolver = TimeWindowResolver::new(New_York);
    let window = resolver
        .resolve(&relative("1d", Some("03/11/2024 12:00:00")))
        .unwrap();

    assert_eq!(window.end, Some(utc(2024, 11, 3, 17, 0, 0)));
    assert_eq!(window.start, utc(2024, 11, 2, 16, 0, 0));
    assert_eq!(window.end.unwrap() - window.start, Duration::hours(25));
}

#[test]
fn one_day_landing_in_skipped_hour_moves_past_the_gap() {
    let resolver = TimeWindowResolver::new(New_York);
    let window = resolver
        .resolve(&relative("1d", Some("11/03/2024 02:30:00")))
        .unwrap();

    // 10/03/2024 02:30 does not exist in New York; 03:30 EDT is used.
    assert_eq!(window.start, utc(2024, 3, 10, 7, 30, 0));
    assert_eq!(window.end, Some(utc(2024, 3, 11, 6, 30, 0)));
}

#[test]
fn hour_ranges_stay_exact_across_spring_forward() {
    let resolver = TimeWindowResolver::new(New_York);
    let window = resolver
        .resolve(&relative("5h", Some("10/03/2024 05:00:00")))
        .unwrap();

    assert_eq!(window.end.unwrap() - window.start, Duration::hours(5));
}
