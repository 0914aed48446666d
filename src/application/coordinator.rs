use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::future::{AbortHandle, Abortable, join_all};

use super::loading::PendingRequests;
use super::pipeline::{DashboardFrame, DashboardInputs, DashboardPipeline, MarketSnapshot};
use crate::domain::errors::NetworkResult;
use crate::domain::layout::SectorGroup;
use crate::domain::logging::{LogComponent, get_logger};
use crate::domain::projection::ProjectionPoint;
use crate::domain::time_series::TimePoint;

/// Backend endpoints feeding one dashboard refresh.
#[allow(async_fn_in_trait)]
pub trait DashboardDataSource {
    async fn fetch_history(&self, key: &str) -> NetworkResult<Vec<TimePoint>>;
    async fn fetch_snapshot(&self) -> NetworkResult<MarketSnapshot>;
    async fn fetch_sectors(&self) -> NetworkResult<Vec<SectorGroup>>;
    async fn fetch_projections(&self) -> NetworkResult<Vec<ProjectionPoint>>;
}

/// Fetch-then-transform cycle for one dashboard view.
///
/// All requests of a cycle run concurrently and are counted in the shared
/// [`PendingRequests`]; a failed request leaves its panel empty.
pub struct DashboardCoordinator<S: DashboardDataSource> {
    source: S,
    pipeline: DashboardPipeline,
    pending: PendingRequests,
    latest: RefCell<Option<DashboardFrame>>,
}

impl<S: DashboardDataSource> DashboardCoordinator<S> {
    pub fn new(source: S, pipeline: DashboardPipeline, pending: PendingRequests) -> Self {
        get_logger().info(
            LogComponent::Application("DashboardCoordinator"),
            &format!(
                "Creating dashboard coordinator for {} history series",
                pipeline.settings().history_keys.len()
            ),
        );
        Self { source, pipeline, pending, latest: RefCell::new(None) }
    }

    pub fn pipeline(&self) -> &DashboardPipeline {
        &self.pipeline
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn latest_frame(&self) -> Option<DashboardFrame> {
        self.latest.borrow().clone()
    }

    /// Issue every request of one cycle concurrently and wait for all of them.
    pub async fn fetch_inputs(&self) -> DashboardInputs {
        let keys = &self.pipeline.settings().history_keys;
        let histories = join_all(keys.iter().map(|key| async move {
            self.tracked("history", self.source.fetch_history(key))
                .await
                .map(|points| (key.clone(), points))
        }));

        let (histories, snapshot, sectors, projections) = futures::join!(
            histories,
            self.tracked("snapshot", self.source.fetch_snapshot()),
            self.tracked("sectors", self.source.fetch_sectors()),
            self.tracked("projections", self.source.fetch_projections()),
        );

        DashboardInputs {
            histories: histories.into_iter().flatten().collect(),
            snapshot,
            sectors: sectors.unwrap_or_default(),
            projections: projections.unwrap_or_default(),
        }
    }

    pub async fn refresh_once(&self) -> DashboardFrame {
        let today = self.pipeline.today();
        self.refresh_at(today).await
    }

    /// One cycle with an explicit "today".
    pub async fn refresh_at(&self, today: NaiveDate) -> DashboardFrame {
        let inputs = self.fetch_inputs().await;
        let frame = self.pipeline.build_frame(&inputs, today);
        self.latest.replace(Some(frame.clone()));
        frame
    }

    async fn tracked<T>(
        &self,
        panel: &str,
        request: impl Future<Output = NetworkResult<T>>,
    ) -> Option<T> {
        let _guard = self.pending.begin();
        match request.await {
            Ok(value) => Some(value),
            Err(e) => {
                get_logger().error(
                    LogComponent::Application("DashboardCoordinator"),
                    &format!("❌ Failed to load {panel}: {e}"),
                );
                None
            }
        }
    }
}

impl<S: DashboardDataSource + 'static> DashboardCoordinator<S> {
    /// Refresh immediately, then every `pollInterval` until the handle is stopped or dropped.
    pub fn start_polling<F>(self: &Rc<Self>, on_frame: F) -> RefreshHandle
    where
        F: Fn(&DashboardFrame) + 'static,
    {
        let (handle, registration) = AbortHandle::new_pair();
        let interval = self.pipeline.settings().poll_interval;
        let coordinator = Rc::clone(self);
        let on_frame = Rc::new(on_frame);

        get_logger().info(
            LogComponent::Application("DashboardCoordinator"),
            &format!("🔁 Polling every {}s", interval.as_secs()),
        );

        let polling = poll_loop(interval, move || {
            let coordinator = Rc::clone(&coordinator);
            let on_frame = Rc::clone(&on_frame);
            async move {
                let frame = coordinator.refresh_once().await;
                on_frame(&frame);
            }
        });
        wasm_bindgen_futures::spawn_local(async move {
            if Abortable::new(polling, registration).await.is_err() {
                get_logger().info(
                    LogComponent::Application("DashboardCoordinator"),
                    "🛑 Polling stopped",
                );
            }
        });

        RefreshHandle { abort: handle }
    }
}

/// Run `cycle`, then sleep `interval`, forever.
pub async fn poll_loop<C, Fut>(interval: Duration, cycle: C)
where
    C: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        cycle().await;
        gloo_timers::future::sleep(interval).await;
    }
}

/// Cancels a polling loop; dropping the handle also stops it.
#[derive(Debug)]
pub struct RefreshHandle {
    abort: AbortHandle,
}

impl RefreshHandle {
    pub fn stop(&self) {
        self.abort.abort();
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use futures::executor::block_on;

    use super::*;
    use crate::application::config::PipelineSettings;
    use crate::domain::errors::AppError;
    use crate::domain::regime::{MarketState, PressureRegime};

    struct FailingSnapshot {
        peak_pending: Rc<Cell<usize>>,
        pending: PendingRequests,
    }

    impl FailingSnapshot {
        fn observe(&self) {
            let now = self.pending.count();
            self.peak_pending.set(self.peak_pending.get().max(now));
        }
    }

    impl DashboardDataSource for FailingSnapshot {
        async fn fetch_history(&self, key: &str) -> NetworkResult<Vec<TimePoint>> {
            self.observe();
            Ok(vec![TimePoint::new("2024-06-01", Some(key.len() as f64))])
        }

        async fn fetch_snapshot(&self) -> NetworkResult<MarketSnapshot> {
            self.observe();
            Err(AppError::Network("503 Service Unavailable".into()))
        }

        async fn fetch_sectors(&self) -> NetworkResult<Vec<SectorGroup>> {
            self.observe();
            Ok(vec![SectorGroup { name: "Utilities".into(), pct_change: 1.0, stocks: vec![] }])
        }

        async fn fetch_projections(&self) -> NetworkResult<Vec<ProjectionPoint>> {
            self.observe();
            Ok(vec![ProjectionPoint::new("now", 55.0)])
        }
    }

    #[test]
    fn failed_panel_degrades_and_counter_returns_to_zero() {
        let pending = PendingRequests::new();
        let peak = Rc::new(Cell::new(0));
        let source = FailingSnapshot { peak_pending: Rc::clone(&peak), pending: pending.clone() };
        let coordinator =
            DashboardCoordinator::new(source, DashboardPipeline::default(), pending.clone());

        let frame = block_on(coordinator.refresh_at(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()));

        assert_eq!(frame.histories.len(), 1);
        assert_eq!(frame.regime.pressure.regime, PressureRegime::InsufficientData);
        assert_eq!(frame.cone.len(), 1);
        assert!(pending.is_idle());
        assert!(peak.get() >= 1);
        assert_eq!(coordinator.latest_frame(), Some(frame));
    }

    struct Static;

    impl DashboardDataSource for Static {
        async fn fetch_history(&self, _key: &str) -> NetworkResult<Vec<TimePoint>> {
            Ok(vec![])
        }

        async fn fetch_snapshot(&self) -> NetworkResult<MarketSnapshot> {
            Ok(MarketSnapshot {
                composite_score: Some(15.0),
                market_state: Some(MarketState::RiskOff),
                ..Default::default()
            })
        }

        async fn fetch_sectors(&self) -> NetworkResult<Vec<SectorGroup>> {
            Ok(vec![])
        }

        async fn fetch_projections(&self) -> NetworkResult<Vec<ProjectionPoint>> {
            Ok(vec![])
        }
    }

    #[test]
    fn one_history_request_per_configured_key() {
        let mut settings = PipelineSettings::default();
        settings.history_keys = vec!["stability".into(), "liquidity".into()];
        let coordinator =
            DashboardCoordinator::new(Static, DashboardPipeline::new(settings), PendingRequests::new());
        let inputs = block_on(coordinator.fetch_inputs());
        let keys: Vec<&str> = inputs.histories.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["stability", "liquidity"]);
        assert_eq!(inputs.snapshot.unwrap().composite_score, Some(15.0));
    }
}
