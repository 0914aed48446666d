use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use derive_more::{Deref, Display, Into};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay};

use crate::domain::errors::{AppError, PipelineResult};

pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Raw observation as delivered by the backend.
///
/// `value: None` means "no data for this date", which is distinct from zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    #[serde(alias = "timestamp")]
    pub date: String,
    #[serde(default)]
    pub value: Option<f64>,
}

impl TimePoint {
    pub fn new(date: impl Into<String>, value: Option<f64>) -> Self {
        Self { date: date.into(), value }
    }
}

/// Where a processed point came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, StrumDisplay, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PointOrigin {
    #[default]
    #[strum(serialize = "observed")]
    Observed,
    /// Flat continuation of the last known value up to today. Never a forecast.
    #[strum(serialize = "extended")]
    Extended,
}

/// Observation tagged with its epoch-millisecond position in the display timezone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatedPoint {
    pub date: String,
    pub date_num: i64,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub origin: PointOrigin,
}

impl DatedPoint {
    pub fn observed(date: impl Into<String>, date_num: i64, value: Option<f64>) -> Self {
        Self { date: date.into(), date_num, value, origin: PointOrigin::Observed }
    }

    pub fn extended(date: NaiveDate, date_num: i64, value: f64) -> Self {
        Self {
            date: date.to_string(),
            date_num,
            value: Some(value),
            origin: PointOrigin::Extended,
        }
    }

    pub fn is_extended(&self) -> bool {
        self.origin == PointOrigin::Extended
    }
}

/// Named, date-ordered series ready for alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSeries {
    pub name: String,
    pub points: Vec<DatedPoint>,
}

impl NamedSeries {
    pub fn new(name: impl Into<String>, points: Vec<DatedPoint>) -> Self {
        Self { name: name.into(), points }
    }
}

/// Closed epoch-millisecond bounds used for filtering and for chart axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_time: i64,
    pub end_time: i64,
}

impl DateRange {
    pub fn contains(&self, date_num: i64) -> bool {
        date_num >= self.start_time && date_num <= self.end_time
    }

    pub fn span_ms(&self) -> i64 {
        self.end_time - self.start_time
    }
}

/// Trailing number of observations averaged per smoothed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deref, Into, Display)]
#[display(fmt = "{}", _0)]
pub struct SmoothingWindow(usize);

impl SmoothingWindow {
    pub fn new(size: i64) -> PipelineResult<Self> {
        if size < 1 {
            return Err(AppError::config(format!("windowSize must be >= 1, got {size}")));
        }
        Ok(Self(size as usize))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for SmoothingWindow {
    fn default() -> Self {
        Self(7)
    }
}

/// Number of days shown before today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deref, Into, Display)]
#[display(fmt = "{}", _0)]
pub struct LookbackDays(u32);

impl LookbackDays {
    pub fn new(days: i64) -> PipelineResult<Self> {
        if days < 1 || days > u32::MAX as i64 {
            return Err(AppError::config(format!("lookbackDays must be >= 1, got {days}")));
        }
        Ok(Self(days as u32))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for LookbackDays {
    fn default() -> Self {
        Self(365)
    }
}

/// Month step between flat-line continuation points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deref, Into, Display)]
#[display(fmt = "{}", _0)]
pub struct StaleCadence(u32);

impl StaleCadence {
    pub fn new(months: i64) -> PipelineResult<Self> {
        if months < 1 || months > 120 {
            return Err(AppError::config(format!(
                "staleCadenceMonths must be within 1..=120, got {months}"
            )));
        }
        Ok(Self(months as u32))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for StaleCadence {
    fn default() -> Self {
        Self(1)
    }
}

/// Display timezone as a fixed offset from UTC.
///
/// Calendar dates are anchored at local midnight of this zone; ISO timestamps
/// carrying an explicit offset keep their own instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayZone(FixedOffset);

impl Default for DisplayZone {
    fn default() -> Self {
        Self::utc()
    }
}

impl DisplayZone {
    pub fn utc() -> Self {
        Self(Utc.fix())
    }

    pub fn from_offset_minutes(minutes: i32) -> PipelineResult<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self)
            .ok_or_else(|| AppError::config(format!("utcOffsetMinutes out of range: {minutes}")))
    }

    pub fn offset(&self) -> FixedOffset {
        self.0
    }

    /// Parse a calendar date or ISO timestamp into epoch milliseconds.
    pub fn parse_date_ms(&self, raw: &str) -> Option<i64> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return self.midnight_ms(date);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.timestamp_millis());
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .and_then(|naive| self.local_ms(&naive))
    }

    pub fn midnight_ms(&self, date: NaiveDate) -> Option<i64> {
        self.local_ms(&date.and_hms_opt(0, 0, 0)?)
    }

    pub fn end_of_day_ms(&self, date: NaiveDate) -> Option<i64> {
        self.midnight_ms(date).map(|start| start + MS_PER_DAY - 1)
    }

    /// Calendar date of an epoch-millisecond instant in this zone.
    pub fn date_of(&self, ms: i64) -> Option<NaiveDate> {
        DateTime::from_timestamp_millis(ms).map(|utc| utc.with_timezone(&self.0).date_naive())
    }

    fn local_ms(&self, naive: &NaiveDateTime) -> Option<i64> {
        self.0.from_local_datetime(naive).single().map(|dt| dt.timestamp_millis())
    }
}

/// First day of the month `months` after the month containing `date`.
pub fn first_of_month_after(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.checked_add_months(Months::new(months))
}

/// `today - days` at calendar resolution.
pub fn days_before(today: NaiveDate, days: u32) -> Option<NaiveDate> {
    today.checked_sub_signed(Duration::days(days as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn calendar_dates_anchor_at_local_midnight() {
        let utc = DisplayZone::utc();
        assert_eq!(utc.parse_date_ms("1970-01-02"), Some(MS_PER_DAY));

        let plus_two = DisplayZone::from_offset_minutes(120).unwrap();
        assert_eq!(plus_two.parse_date_ms("1970-01-02"), Some(MS_PER_DAY - 2 * 60 * 60 * 1000));
    }

    #[test]
    fn iso_timestamps_keep_their_instant() {
        let zone = DisplayZone::from_offset_minutes(-300).unwrap();
        assert_eq!(zone.parse_date_ms("1970-01-01T00:00:01Z"), Some(1000));
        assert_eq!(zone.parse_date_ms("1970-01-01T00:00:01+00:00"), Some(1000));
    }

    #[test]
    fn naive_timestamps_use_display_zone() {
        let utc = DisplayZone::utc();
        assert_eq!(utc.parse_date_ms("1970-01-01T00:01:00"), Some(60_000));
        assert_eq!(utc.parse_date_ms("1970-01-01 00:01:00"), Some(60_000));
        assert_eq!(utc.parse_date_ms("1970-01-01T00:01:00.500"), Some(60_500));
    }

    #[test]
    fn garbage_dates_are_rejected() {
        let utc = DisplayZone::utc();
        assert_eq!(utc.parse_date_ms(""), None);
        assert_eq!(utc.parse_date_ms("yesterday"), None);
        assert_eq!(utc.parse_date_ms("2024-13-40"), None);
    }

    #[test]
    fn end_of_day_is_last_millisecond() {
        let utc = DisplayZone::utc();
        let day = ymd(2024, 3, 1);
        assert_eq!(
            utc.end_of_day_ms(day).unwrap() + 1,
            utc.midnight_ms(ymd(2024, 3, 2)).unwrap()
        );
        assert_eq!(utc.date_of(utc.end_of_day_ms(day).unwrap()), Some(day));
    }

    #[test]
    fn month_stepping_rolls_over_years() {
        assert_eq!(first_of_month_after(ymd(2024, 12, 17), 1), Some(ymd(2025, 1, 1)));
        assert_eq!(first_of_month_after(ymd(2024, 1, 1), 3), Some(ymd(2024, 4, 1)));
    }

    #[test]
    fn parameter_constructors_fail_fast() {
        assert!(SmoothingWindow::new(0).unwrap_err().is_configuration());
        assert!(SmoothingWindow::new(-3).is_err());
        assert_eq!(SmoothingWindow::new(5).unwrap().get(), 5);
        assert!(LookbackDays::new(0).is_err());
        assert!(StaleCadence::new(0).is_err());
        assert!(DisplayZone::from_offset_minutes(24 * 60).is_err());
    }
}
