use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use super::value_objects::NamedSeries;
use crate::domain::errors::{AppError, PipelineResult};

/// Which dates become rows of the aligned table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RowSpine {
    /// Sorted union of every date in every series.
    #[default]
    Union,
    /// Dates of the named series only, e.g. the smoothed line under which raw points are overlaid.
    Series(String),
}

/// What to do where a series has no value for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapPolicy {
    /// Leave `null`; the rendering sink draws a gap.
    #[default]
    Preserve,
    /// Linear interpolation by timestamp across interior gaps. Leading and trailing gaps stay `null`.
    Interpolate,
}

/// Row fields a series name may not shadow once values are flattened.
pub const RESERVED_COLUMNS: [&str; 2] = ["date", "dateNum"];

/// One chart row: `{ date, dateNum, <series>: number | null, ... }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedRow {
    pub date: String,
    pub date_num: i64,
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl AlignedRow {
    pub fn value(&self, series: &str) -> Option<f64> {
        self.values.get(series).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignedTable {
    pub series_names: Vec<String>,
    pub rows: Vec<AlignedRow>,
}

impl AlignedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, series: &str) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.value(series)).collect()
    }
}

/// Merges named series into one date-ordered table with `null` where a series lacks a point.
#[derive(Debug, Clone, Default)]
pub struct SeriesAligner {
    spine: RowSpine,
    gaps: GapPolicy,
}

impl SeriesAligner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spine(mut self, spine: RowSpine) -> Self {
        self.spine = spine;
        self
    }

    pub fn with_gap_policy(mut self, gaps: GapPolicy) -> Self {
        self.gaps = gaps;
        self
    }

    pub fn align(&self, series: &[NamedSeries]) -> PipelineResult<AlignedTable> {
        let mut seen = HashSet::new();
        if let Some(dup) = series.iter().find(|s| !seen.insert(s.name.as_str())) {
            return Err(AppError::Validation(format!("duplicate series name '{}'", dup.name)));
        }
        if let Some(clash) = series.iter().find(|s| RESERVED_COLUMNS.contains(&s.name.as_str())) {
            return Err(AppError::Validation(format!(
                "series name '{}' collides with a row column",
                clash.name
            )));
        }

        let lookups: Vec<(&str, HashMap<i64, Option<f64>>)> = series
            .iter()
            .map(|s| (s.name.as_str(), s.points.iter().map(|p| (p.date_num, p.value)).collect()))
            .collect();

        let mut spine: BTreeMap<i64, &str> = BTreeMap::new();
        match &self.spine {
            RowSpine::Union => {
                for s in series {
                    for p in &s.points {
                        spine.entry(p.date_num).or_insert(p.date.as_str());
                    }
                }
            }
            RowSpine::Series(name) => {
                let driver = series.iter().find(|s| &s.name == name).ok_or_else(|| {
                    AppError::Validation(format!("spine series '{name}' is not among the inputs"))
                })?;
                for p in &driver.points {
                    spine.entry(p.date_num).or_insert(p.date.as_str());
                }
            }
        }

        let mut rows: Vec<AlignedRow> = spine
            .into_iter()
            .map(|(date_num, date)| AlignedRow {
                date: date.to_string(),
                date_num,
                values: lookups
                    .iter()
                    .map(|(name, lookup)| {
                        (name.to_string(), lookup.get(&date_num).copied().flatten())
                    })
                    .collect(),
            })
            .collect();

        if self.gaps == GapPolicy::Interpolate {
            for (name, _) in &lookups {
                interpolate_column(&mut rows, name);
            }
        }

        Ok(AlignedTable {
            series_names: series.iter().map(|s| s.name.clone()).collect(),
            rows,
        })
    }
}

fn interpolate_column(rows: &mut [AlignedRow], name: &str) {
    let known: Vec<(usize, i64, f64)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| row.value(name).map(|v| (i, row.date_num, v)))
        .collect();

    for pair in known.windows(2) {
        let (i0, t0, v0) = pair[0];
        let (i1, t1, v1) = pair[1];
        if i1 <= i0 + 1 {
            continue;
        }
        let span = (t1 - t0) as f64;
        for row in &mut rows[i0 + 1..i1] {
            let v = v0 + (v1 - v0) * (row.date_num - t0) as f64 / span;
            row.values.insert(name.to_string(), Some(v));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time_series::DatedPoint;

    fn series(name: &str, pts: &[(i64, Option<f64>)]) -> NamedSeries {
        NamedSeries::new(
            name,
            pts.iter().map(|&(t, v)| DatedPoint::observed(format!("d{t}"), t, v)).collect(),
        )
    }

    #[test]
    fn union_spine_fills_missing_with_null() {
        let table = SeriesAligner::new()
            .align(&[
                series("raw", &[(1, Some(1.0)), (3, Some(3.0))]),
                series("smooth", &[(1, Some(1.0)), (2, Some(1.5)), (3, Some(2.0))]),
            ])
            .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[1].value("raw"), None);
        assert_eq!(table.rows[1].value("smooth"), Some(1.5));
        assert!(table.rows[1].values.contains_key("raw"));
    }

    #[test]
    fn series_spine_limits_rows_to_driver() {
        let table = SeriesAligner::new()
            .with_spine(RowSpine::Series("smooth".into()))
            .align(&[
                series("raw", &[(0, Some(9.0)), (1, Some(1.0))]),
                series("smooth", &[(1, Some(1.0)), (2, Some(1.5))]),
            ])
            .unwrap();
        assert_eq!(table.rows.iter().map(|r| r.date_num).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn unknown_spine_and_duplicate_names_are_rejected() {
        let a = series("a", &[(1, Some(1.0))]);
        assert!(
            SeriesAligner::new()
                .with_spine(RowSpine::Series("zzz".into()))
                .align(std::slice::from_ref(&a))
                .is_err()
        );
        assert!(SeriesAligner::new().align(&[a.clone(), a]).is_err());
    }

    #[test]
    fn row_column_names_cannot_be_series_names() {
        for name in RESERVED_COLUMNS {
            let err = SeriesAligner::new()
                .align(&[series(name, &[(1, Some(7.0))]), series("raw", &[(1, Some(1.0))])])
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{name}");
        }
        let table = SeriesAligner::new().align(&[series("value", &[(1, Some(7.0))])]).unwrap();
        let row = serde_json::to_value(&table.rows[0]).unwrap();
        assert_eq!(row["date"], "d1");
        assert_eq!(row["value"], 7.0);
    }

    #[test]
    fn interpolation_fills_interior_gaps_only() {
        let table = SeriesAligner::new()
            .with_gap_policy(GapPolicy::Interpolate)
            .align(&[
                series("a", &[(10, Some(0.0)), (40, Some(30.0))]),
                series("b", &[(0, Some(1.0)), (20, Some(1.0)), (30, Some(1.0)), (50, Some(1.0))]),
            ])
            .unwrap();
        assert_eq!(
            table.column("a"),
            vec![None, Some(0.0), Some(10.0), Some(20.0), Some(30.0), None]
        );
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let table = SeriesAligner::new().align(&[]).unwrap();
        assert!(table.is_empty());
        assert!(table.series_names.is_empty());
    }
}
