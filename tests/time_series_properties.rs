use chrono::{Duration, NaiveDate};
use market_dashboard_wasm::domain::time_series::{
    DisplayZone, LookbackDays, SmoothingWindow, TimePoint, TimeSeriesProcessor,
};
use quickcheck_macros::quickcheck;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
}

fn points_from(raw: &[(u16, Option<f64>)]) -> Vec<TimePoint> {
    raw.iter()
        .map(|&(offset, value)| {
            let date = base_date() + Duration::days((offset % 900) as i64);
            TimePoint::new(date.format("%Y-%m-%d").to_string(), value)
        })
        .collect()
}

#[quickcheck]
fn dedupe_dates_strictly_increase(raw: Vec<(u16, Option<f64>)>) -> bool {
    let out = TimeSeriesProcessor::default().dedupe(&points_from(&raw));
    out.windows(2).all(|w| w[0].date_num < w[1].date_num)
        && out.iter().all(|p| p.value.is_none_or(f64::is_finite))
}

#[quickcheck]
fn moving_average_keeps_length_and_first_value(raw: Vec<(u16, Option<f64>)>, window: u8) -> bool {
    let svc = TimeSeriesProcessor::default();
    let points = svc.dedupe(&points_from(&raw));
    let window = SmoothingWindow::new(window as i64 % 30 + 1).unwrap();
    let smoothed = svc.moving_average(&points, window);

    smoothed.len() == points.len()
        && smoothed.first().map(|p| p.value) == points.first().map(|p| p.value)
}

#[quickcheck]
fn filter_range_stays_inside_lookback(raw: Vec<(u16, Option<f64>)>, days: u16, zone_minutes: i16) -> bool {
    let zone = DisplayZone::from_offset_minutes(zone_minutes as i32 % 720).unwrap();
    let svc = TimeSeriesProcessor::new(zone);
    let today = base_date() + Duration::days(500);
    let lookback = LookbackDays::new(days as i64 % 400 + 1).unwrap();

    let points = svc.dedupe(&points_from(&raw));
    let filtered = svc.filter_range(&points, lookback, today);

    let earliest = zone.midnight_ms(today - Duration::days(lookback.get() as i64)).unwrap();
    let latest = zone.end_of_day_ms(today).unwrap();
    filtered.points.iter().all(|p| p.date_num >= earliest && p.date_num <= latest)
}

#[test]
fn empty_input_yields_empty_output_everywhere() {
    let svc = TimeSeriesProcessor::default();
    let today = base_date();
    assert!(svc.dedupe(&[]).is_empty());
    assert!(svc.moving_average(&[], SmoothingWindow::new(3).unwrap()).is_empty());
    assert!(svc.filter_range(&[], LookbackDays::new(30).unwrap(), today).points.is_empty());
}

#[test]
fn malformed_points_are_dropped_not_fatal() {
    let out = TimeSeriesProcessor::default().dedupe(&[
        TimePoint::new("not a date", Some(1.0)),
        TimePoint::new("2024-02-30", Some(1.0)),
        TimePoint::new("2024-03-01", Some(f64::NAN)),
        TimePoint::new("2024-03-02", Some(4.0)),
    ]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].date, "2024-03-02");
}
