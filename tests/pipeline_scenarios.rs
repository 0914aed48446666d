use chrono::NaiveDate;
use market_dashboard_wasm::application::{DashboardConfig, DashboardPipeline};
use market_dashboard_wasm::domain::layout::{BubbleLayoutEngine, SectorGroup, StockPoint};
use market_dashboard_wasm::domain::regime::{PressureRegime, RegimeClassifier};
use market_dashboard_wasm::domain::time_series::{
    DatedPoint, NamedSeries, SeriesAligner, SmoothingWindow, TimePoint, TimeSeriesProcessor,
};

#[test]
fn null_gap_is_bridged_by_trailing_observations() {
    let svc = TimeSeriesProcessor::default();
    let points = svc.dedupe(&[
        TimePoint::new("2024-01-01", Some(10.0)),
        TimePoint::new("2024-01-02", None),
        TimePoint::new("2024-01-03", Some(20.0)),
    ]);
    let smoothed = svc.moving_average(&points, SmoothingWindow::new(2).unwrap());
    let values: Vec<Option<f64>> = smoothed.iter().map(|p| p.value).collect();
    assert_eq!(values, vec![Some(10.0), Some(10.0), Some(15.0)]);
}

#[test]
fn flat_stock_sits_on_the_midline() {
    let sector = SectorGroup::from_stocks(
        "Industrials",
        vec![
            StockPoint::new("LOW", 50.0, -5.0, 1_000.0),
            StockPoint::new("MID", 50.0, 0.0, 1_000.0),
            StockPoint::new("HIGH", 50.0, 5.0, 1_000.0),
        ],
    );
    let layout = BubbleLayoutEngine::default().layout_sector(&sector);
    let mid = layout.positions.iter().find(|p| p.ticker == "MID").unwrap();
    assert!((mid.y - 50.0).abs() < 1e-9);
}

#[test]
fn score_on_the_top_breakpoint_is_low_pressure() {
    let classifier = RegimeClassifier::default();
    assert_eq!(classifier.classify_pressure(Some(67.0)).regime, PressureRegime::LowPressure);
    assert_eq!(classifier.classify_pressure(Some(66.99)).regime, PressureRegime::Moderate);
    assert_eq!(classifier.classify_pressure(Some(67.01)).regime, PressureRegime::LowPressure);
    assert_eq!(classifier.classify_pressure(Some(34.0)).regime, PressureRegime::Elevated);
    assert_eq!(classifier.classify_pressure(Some(33.99)).regime, PressureRegime::Severe);
}

#[test]
fn sparse_series_gets_null_in_aligned_row() {
    let point = |day: i64, v: f64| DatedPoint::observed(format!("d{day}"), day, Some(v));
    let table = SeriesAligner::new()
        .align(&[
            NamedSeries::new("raw", vec![point(1, 1.0), point(3, 3.0)]),
            NamedSeries::new("smooth", vec![point(1, 1.0), point(2, 1.5), point(3, 2.0)]),
        ])
        .unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(table.rows[1].date, "d2");
    assert_eq!(table.rows[1].value("raw"), None);
    assert_eq!(table.rows[1].value("smooth"), Some(1.5));

    let json = serde_json::to_value(&table.rows[1]).unwrap();
    assert_eq!(json["raw"], serde_json::Value::Null);
    assert_eq!(json["dateNum"], 2);
}

#[test]
fn configured_pipeline_uses_custom_window() {
    let settings = DashboardConfig::from_json(r#"{"windowSize": 2, "extendStale": false, "utcOffsetMinutes": 0}"#)
        .unwrap()
        .validate()
        .unwrap();
    let pipeline = DashboardPipeline::new(settings);
    let panel = pipeline
        .prepare_history(
            "stability",
            &[
                TimePoint::new("2024-01-01", Some(10.0)),
                TimePoint::new("2024-01-02", None),
                TimePoint::new("2024-01-03", Some(20.0)),
            ],
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        )
        .unwrap();
    assert_eq!(panel.table.column("smoothed"), vec![Some(10.0), Some(10.0), Some(15.0)]);
    assert_eq!(panel.table.column("raw"), vec![Some(10.0), None, Some(20.0)]);
}
