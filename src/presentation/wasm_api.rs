use std::rc::Rc;

use gloo::utils::format::JsValueSerdeExt;
use js_sys::{Function, Promise};
use serde::Serialize;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::application::{
    DashboardConfig, DashboardCoordinator, DashboardPipeline, ObserverId, PendingRequests,
    RefreshHandle,
};
use crate::domain::errors::AppError;
use crate::domain::layout::{SectorGroup, ticker_x};
use crate::domain::logging::{LogComponent, get_logger};
use crate::domain::projection::ProjectionPoint;
use crate::domain::time_series::{
    DatedPoint, LookbackDays, NamedSeries, SmoothingWindow, StaleCadence, TimePoint,
};
use crate::infrastructure::DashboardHttpClient;

fn js_error(error: AppError) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    JsValue::from_serde(value).map_err(|e| js_error(e.into()))
}

fn from_js<T: DeserializeOwned>(value: &JsValue, what: &str) -> Result<T, JsValue> {
    value
        .into_serde()
        .map_err(|e| js_error(AppError::Presentation(format!("invalid {what}: {e}"))))
}

/// Logs a failed JS callback; returns whether it succeeded.
fn report_callback<T, E: std::fmt::Debug>(what: &str, outcome: Result<T, E>) -> bool {
    match outcome {
        Ok(_) => true,
        Err(e) => {
            get_logger().error(
                LogComponent::Presentation("DashboardApi"),
                &format!("❌ {what} callback failed: {e:?}"),
            );
            false
        }
    }
}

/// JavaScript entry point: every transformation plus the polling refresh cycle.
///
/// All structured arguments and results are plain JSON-compatible objects
/// with camelCase keys.
#[wasm_bindgen]
pub struct DashboardApi {
    pipeline: DashboardPipeline,
    pending: PendingRequests,
    coordinator: Rc<DashboardCoordinator<DashboardHttpClient>>,
    refresh: Option<RefreshHandle>,
    pending_observers: Vec<ObserverId>,
}

#[wasm_bindgen]
impl DashboardApi {
    /// `config` may be `undefined` for all defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<DashboardApi, JsValue> {
        let config: DashboardConfig = if config.is_undefined() || config.is_null() {
            DashboardConfig::default()
        } else {
            from_js(&config, "config")?
        };
        let settings = config.validate().map_err(|e| {
            get_logger().error(LogComponent::Presentation("DashboardApi"), &e.to_string());
            js_error(e)
        })?;

        let client =
            DashboardHttpClient::new(settings.api_base_url.clone(), settings.series.lookback.get());
        let pipeline = DashboardPipeline::new(settings);
        let pending = PendingRequests::new();
        let coordinator =
            Rc::new(DashboardCoordinator::new(client, pipeline.clone(), pending.clone()));

        get_logger().info(
            LogComponent::Presentation("DashboardApi"),
            &format!("🚀 Dashboard API ready ({})", pipeline.settings().api_base_url),
        );

        Ok(Self { pipeline, pending, coordinator, refresh: None, pending_observers: Vec::new() })
    }

    #[wasm_bindgen(js_name = dedupe)]
    pub fn dedupe(&self, points: JsValue) -> Result<JsValue, JsValue> {
        let points: Vec<TimePoint> = from_js(&points, "points")?;
        to_js(&self.pipeline.processor().dedupe(&points))
    }

    #[wasm_bindgen(js_name = filterRange)]
    pub fn filter_range(&self, points: JsValue, days: i32) -> Result<JsValue, JsValue> {
        let points: Vec<DatedPoint> = from_js(&points, "points")?;
        let lookback = LookbackDays::new(days.into()).map_err(js_error)?;
        to_js(&self.pipeline.processor().filter_range(&points, lookback, self.pipeline.today()))
    }

    #[wasm_bindgen(js_name = movingAverage)]
    pub fn moving_average(&self, points: JsValue, window: i32) -> Result<JsValue, JsValue> {
        let points: Vec<DatedPoint> = from_js(&points, "points")?;
        let window = SmoothingWindow::new(window.into()).map_err(js_error)?;
        to_js(&self.pipeline.processor().moving_average(&points, window))
    }

    #[wasm_bindgen(js_name = extendStale)]
    pub fn extend_stale(&self, points: JsValue, cadence_months: Option<i32>) -> Result<JsValue, JsValue> {
        let points: Vec<DatedPoint> = from_js(&points, "points")?;
        let cadence = match cadence_months {
            Some(months) => StaleCadence::new(months.into()).map_err(js_error)?,
            None => StaleCadence::default(),
        };
        to_js(&self.pipeline.processor().extend_stale(&points, self.pipeline.today(), cadence))
    }

    /// Full clean/smooth/filter/align pass for one raw history series.
    #[wasm_bindgen(js_name = prepareHistory)]
    pub fn prepare_history(&self, key: String, points: JsValue) -> Result<JsValue, JsValue> {
        let points: Vec<TimePoint> = from_js(&points, "points")?;
        let panel = self
            .pipeline
            .prepare_history(&key, &points, self.pipeline.today())
            .map_err(js_error)?;
        to_js(&panel)
    }

    #[wasm_bindgen(js_name = alignSeries)]
    pub fn align_series(&self, series: JsValue, interpolate: Option<bool>) -> Result<JsValue, JsValue> {
        use crate::domain::time_series::{GapPolicy, SeriesAligner};

        let series: Vec<NamedSeries> = from_js(&series, "series")?;
        let gaps = match interpolate {
            Some(true) => GapPolicy::Interpolate,
            Some(false) => GapPolicy::Preserve,
            None => self.pipeline.settings().gap_policy,
        };
        let table = SeriesAligner::new().with_gap_policy(gaps).align(&series).map_err(js_error)?;
        to_js(&table)
    }

    #[wasm_bindgen(js_name = classifyComposite)]
    pub fn classify_composite(&self, score: Option<f64>) -> Result<JsValue, JsValue> {
        to_js(&self.pipeline.classifier().classify_pressure(score))
    }

    #[wasm_bindgen(js_name = classifyDivergence)]
    pub fn classify_divergence(
        &self,
        defensive: Option<f64>,
        cyclical: Option<f64>,
        state: Option<String>,
    ) -> Result<JsValue, JsValue> {
        use crate::domain::regime::RegimeClassifier;

        let state = state.as_deref().and_then(RegimeClassifier::parse_state);
        to_js(&self.pipeline.classifier().classify_divergence(defensive, cyclical, state))
    }

    #[wasm_bindgen(js_name = layoutSector)]
    pub fn layout_sector(&self, sector: JsValue) -> Result<JsValue, JsValue> {
        let sector: SectorGroup = from_js(&sector, "sector")?;
        to_js(&self.pipeline.layout_engine().layout_sector(&sector))
    }

    #[wasm_bindgen(js_name = layoutSectors)]
    pub fn layout_sectors(&self, sectors: JsValue) -> Result<JsValue, JsValue> {
        let sectors: Vec<SectorGroup> = from_js(&sectors, "sectors")?;
        to_js(&self.pipeline.layout_sectors(&sectors))
    }

    #[wasm_bindgen(js_name = tickerX)]
    pub fn ticker_x(&self, ticker: &str) -> f64 {
        ticker_x(ticker)
    }

    /// Cone from projection points; `sigmas` overrides the computed widths.
    #[wasm_bindgen(js_name = buildCone)]
    pub fn build_cone(&self, points: JsValue, sigmas: Option<Vec<f64>>) -> Result<JsValue, JsValue> {
        let points: Vec<ProjectionPoint> = from_js(&points, "projection points")?;
        let cone = match sigmas {
            Some(sigmas) => self
                .pipeline
                .cone_builder()
                .build_with_sigmas(&points, &sigmas)
                .map_err(js_error)?,
            None => self.pipeline.build_cone(&points),
        };
        to_js(&cone)
    }

    /// Fetch every panel once and resolve with the frame.
    #[wasm_bindgen(js_name = refresh)]
    pub fn refresh(&self) -> Promise {
        let coordinator = Rc::clone(&self.coordinator);
        future_to_promise(async move {
            let frame = coordinator.refresh_once().await;
            to_js(&frame)
        })
    }

    /// Refresh now and every `pollIntervalSecs`, calling `callback(frame)` each time.
    #[wasm_bindgen(js_name = startPolling)]
    pub fn start_polling(&mut self, callback: Function) {
        let handle = self.coordinator.start_polling(move |frame| {
            let delivered = to_js(frame).and_then(|value| callback.call1(&JsValue::NULL, &value));
            report_callback("Frame", delivered);
        });
        // Replacing the handle drops, and so stops, any previous loop.
        self.refresh = Some(handle);
    }

    #[wasm_bindgen(js_name = stopPolling)]
    pub fn stop_polling(&mut self) {
        if let Some(handle) = self.refresh.take() {
            handle.stop();
        }
    }

    #[wasm_bindgen(js_name = isPolling)]
    pub fn is_polling(&self) -> bool {
        self.refresh.is_some()
    }

    #[wasm_bindgen(js_name = pendingCount)]
    pub fn pending_count(&self) -> usize {
        self.pending.count()
    }

    /// `callback(count)` after every change in the number of in-flight requests.
    #[wasm_bindgen(js_name = onPendingChange)]
    pub fn on_pending_change(&mut self, callback: Function) {
        let id = self.pending.subscribe(move |count| {
            report_callback(
                "Pending",
                callback.call1(&JsValue::NULL, &JsValue::from_f64(count as f64)),
            );
        });
        self.pending_observers.push(id);
    }

    #[wasm_bindgen(js_name = clearPendingObservers)]
    pub fn clear_pending_observers(&mut self) {
        for id in self.pending_observers.drain(..) {
            self.pending.unsubscribe(id);
        }
    }

    #[wasm_bindgen(js_name = latestFrame)]
    pub fn latest_frame(&self) -> Result<JsValue, JsValue> {
        match self.coordinator.latest_frame() {
            Some(frame) => to_js(&frame),
            None => Ok(JsValue::NULL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_outcome_is_reported() {
        assert!(report_callback::<(), String>("Pending", Ok(())));
        assert!(!report_callback::<(), _>("Pending", Err("observer threw".to_string())));
    }
}
