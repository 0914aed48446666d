use std::collections::{BTreeMap, VecDeque};

use chrono::NaiveDate;
use serde::Serialize;

use super::value_objects::{
    DateRange, DatedPoint, DisplayZone, LookbackDays, MS_PER_DAY, SmoothingWindow, StaleCadence,
    TimePoint, days_before, first_of_month_after,
};
use crate::domain::logging::LogComponent;
use crate::{log_debug, log_warn};

/// Range-filtered points plus the axis bounds they were filtered against.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredSeries {
    pub points: Vec<DatedPoint>,
    pub range: DateRange,
}

/// Parameters for the full clean/filter/smooth/extend pass over one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSettings {
    pub window: SmoothingWindow,
    pub lookback: LookbackDays,
    /// `Some` continues slow-updating series flat up to today.
    pub extend_stale: Option<StaleCadence>,
}

/// Output of [`TimeSeriesProcessor::process`]: raw and smoothed variants share the same range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSeries {
    pub raw: Vec<DatedPoint>,
    pub smoothed: Vec<DatedPoint>,
    pub range: DateRange,
}

impl ProcessedSeries {
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Domain service turning raw backend observations into chart-ready series.
///
/// Stateless: every method is a pure function of its arguments and the display zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSeriesProcessor {
    zone: DisplayZone,
}

impl TimeSeriesProcessor {
    pub fn new(zone: DisplayZone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> DisplayZone {
        self.zone
    }

    /// Tag points with timestamps, drop malformed ones and collapse duplicate dates.
    ///
    /// The later occurrence of a date in input order wins. Output is strictly
    /// ascending by `date_num`.
    pub fn dedupe(&self, points: &[TimePoint]) -> Vec<DatedPoint> {
        let mut by_date: BTreeMap<i64, DatedPoint> = BTreeMap::new();
        let mut dropped = 0usize;

        for point in points {
            let Some(date_num) = self.zone.parse_date_ms(&point.date) else {
                dropped += 1;
                continue;
            };
            if point.value.is_some_and(|v| !v.is_finite()) {
                dropped += 1;
                continue;
            }
            by_date.insert(date_num, DatedPoint::observed(point.date.clone(), date_num, point.value));
        }

        if dropped > 0 {
            log_warn!(
                LogComponent::Domain("TimeSeries"),
                "dropped {} malformed point(s) out of {}",
                dropped,
                points.len()
            );
        }

        by_date.into_values().collect()
    }

    /// Axis bounds for `lookback` days ending at the end of `today`.
    pub fn lookback_range(&self, lookback: LookbackDays, today: NaiveDate) -> DateRange {
        let end_time = self.zone.end_of_day_ms(today).unwrap_or(i64::MAX);
        let start_time = days_before(today, lookback.get())
            .and_then(|start| self.zone.midnight_ms(start))
            .unwrap_or_else(|| end_time.saturating_sub(lookback.get() as i64 * MS_PER_DAY));
        DateRange { start_time, end_time }
    }

    /// Keep points inside `[today - days, end of today]`.
    ///
    /// When anything survives, `end_time` is tightened to the last retained
    /// point so the axis has no trailing empty space.
    pub fn filter_range(
        &self,
        points: &[DatedPoint],
        lookback: LookbackDays,
        today: NaiveDate,
    ) -> FilteredSeries {
        let mut range = self.lookback_range(lookback, today);
        let kept: Vec<DatedPoint> =
            points.iter().filter(|p| range.contains(p.date_num)).cloned().collect();

        if let Some(last) = kept.iter().map(|p| p.date_num).max() {
            range.end_time = last;
        }

        FilteredSeries { points: kept, range }
    }

    /// Causal moving average over the trailing `window` observations.
    ///
    /// Nulls are not observations: they neither enter the average nor count
    /// toward the window. A position with no observation at or before it is
    /// `None`. Output length always equals input length.
    pub fn moving_average(&self, points: &[DatedPoint], window: SmoothingWindow) -> Vec<DatedPoint> {
        let size = window.get();
        let mut recent: VecDeque<f64> = VecDeque::with_capacity(size);

        points
            .iter()
            .map(|point| {
                if let Some(v) = point.value {
                    recent.push_back(v);
                    if recent.len() > size {
                        recent.pop_front();
                    }
                }
                let value = if recent.is_empty() {
                    None
                } else {
                    Some(recent.iter().sum::<f64>() / recent.len() as f64)
                };
                DatedPoint { value, ..point.clone() }
            })
            .collect()
    }

    /// Repeat the last known value on the first day of each following month up to `today`.
    ///
    /// Appended points are tagged [`PointOrigin::Extended`](super::PointOrigin::Extended).
    pub fn extend_stale(
        &self,
        points: &[DatedPoint],
        today: NaiveDate,
        cadence: StaleCadence,
    ) -> Vec<DatedPoint> {
        let mut out = points.to_vec();
        let (Some(last), Some(last_value)) =
            (points.last(), points.iter().rev().find_map(|p| p.value))
        else {
            return out;
        };
        let Some(last_date) = self.zone.date_of(last.date_num) else {
            return out;
        };

        let mut step = cadence.get();
        while let Some(next) = first_of_month_after(last_date, step) {
            if next > today {
                break;
            }
            if let Some(date_num) = self.zone.midnight_ms(next) {
                out.push(DatedPoint::extended(next, date_num, last_value));
            }
            step += cadence.get();
        }

        if out.len() > points.len() {
            log_debug!(
                LogComponent::Domain("TimeSeries"),
                "extended stale series by {} point(s) from {}",
                out.len() - points.len(),
                last_date
            );
        }
        out
    }

    /// Whether the last observed value is older than `max_age_days` before `today`.
    pub fn is_stale(&self, points: &[DatedPoint], today: NaiveDate, max_age_days: u32) -> bool {
        let Some(last_observed) = points.iter().rev().find(|p| p.value.is_some()) else {
            return false;
        };
        match (self.zone.date_of(last_observed.date_num), days_before(today, max_age_days)) {
            (Some(last), Some(cutoff)) => last < cutoff,
            _ => false,
        }
    }

    /// Dedupe, smooth over the full history, filter to the lookback window and
    /// optionally continue the series flat up to today.
    pub fn process(
        &self,
        raw: &[TimePoint],
        settings: &SeriesSettings,
        today: NaiveDate,
    ) -> ProcessedSeries {
        let deduped = self.dedupe(raw);
        let smoothed_full = self.moving_average(&deduped, settings.window);

        let raw_filtered = self.filter_range(&deduped, settings.lookback, today);
        let smoothed_filtered = self.filter_range(&smoothed_full, settings.lookback, today);
        let mut range = raw_filtered.range;

        let (raw_points, smoothed_points) = match settings.extend_stale {
            Some(cadence) => (
                self.extend_stale(&raw_filtered.points, today, cadence),
                self.extend_stale(&smoothed_filtered.points, today, cadence),
            ),
            None => (raw_filtered.points, smoothed_filtered.points),
        };

        if let Some(last) = raw_points.last().map(|p| p.date_num) {
            range.end_time = range.end_time.max(last);
        }

        ProcessedSeries { raw: raw_points, smoothed: smoothed_points, range }
    }
}
