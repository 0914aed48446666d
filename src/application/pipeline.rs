use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::config::PipelineSettings;
use crate::domain::errors::PipelineResult;
use crate::domain::layout::{BubbleLayoutEngine, SectorGroup, SectorLayout};
use crate::domain::logging::{LogComponent, get_logger, get_time_provider};
use crate::domain::projection::{Cone, ConeRow, ProjectionConeBuilder, ProjectionPoint};
use crate::domain::regime::{
    DivergenceReading, MarketState, PressureReading, RegimeBadge, RegimeClassifier, group_average,
};
use crate::domain::time_series::{
    AlignedTable, DateRange, DatedPoint, DisplayZone, NamedSeries, RowSpine, SeriesAligner,
    TimePoint, TimeSeriesProcessor,
};

/// Column names used in every history table.
pub const RAW_SERIES: &str = "raw";
pub const SMOOTHED_SERIES: &str = "smoothed";

/// A history series whose last observation is older than this is flagged stale.
pub const STALE_AFTER_DAYS: u32 = 45;

/// Latest aggregate readings published by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub composite_score: Option<f64>,
    pub market_state: Option<MarketState>,
    /// Pre-computed group averages; sector data is used when absent.
    pub defensive_avg: Option<f64>,
    pub cyclical_avg: Option<f64>,
}

/// Everything fetched in one refresh cycle, before any transformation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardInputs {
    pub histories: Vec<(String, Vec<TimePoint>)>,
    pub snapshot: Option<MarketSnapshot>,
    pub sectors: Vec<SectorGroup>,
    pub projections: Vec<ProjectionPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPanel {
    pub key: String,
    pub table: AlignedTable,
    pub range: DateRange,
    /// Last observation is older than [`STALE_AFTER_DAYS`].
    pub stale: bool,
    /// Flat-line points appended after the last observation.
    pub extended_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimePanel {
    pub pressure: PressureReading,
    pub pressure_badge: RegimeBadge,
    pub divergence: DivergenceReading,
    pub divergence_badge: RegimeBadge,
}

/// Render-ready output of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardFrame {
    pub histories: Vec<HistoryPanel>,
    pub regime: RegimePanel,
    pub sectors: Vec<SectorLayout>,
    pub cone: Cone,
    pub cone_rows: Vec<ConeRow>,
    /// Epoch ms from the installed time provider.
    pub generated_at: u64,
}

/// Composes the five transformations behind one set of validated settings.
#[derive(Debug, Clone)]
pub struct DashboardPipeline {
    settings: PipelineSettings,
    processor: TimeSeriesProcessor,
    aligner: SeriesAligner,
    layout: BubbleLayoutEngine,
    cones: ProjectionConeBuilder,
}

impl Default for DashboardPipeline {
    fn default() -> Self {
        Self::new(PipelineSettings::default())
    }
}

impl DashboardPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            processor: TimeSeriesProcessor::new(settings.zone),
            aligner: SeriesAligner::new()
                .with_spine(RowSpine::Union)
                .with_gap_policy(settings.gap_policy),
            layout: BubbleLayoutEngine::new(settings.sizing),
            cones: ProjectionConeBuilder::new(settings.cone),
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn processor(&self) -> &TimeSeriesProcessor {
        &self.processor
    }

    pub fn classifier(&self) -> &RegimeClassifier {
        &self.settings.classifier
    }

    pub fn layout_engine(&self) -> &BubbleLayoutEngine {
        &self.layout
    }

    pub fn cone_builder(&self) -> &ProjectionConeBuilder {
        &self.cones
    }

    /// Today's calendar date in the display zone according to the time provider.
    pub fn today(&self) -> NaiveDate {
        today_in(self.settings.zone)
    }

    /// Clean, smooth, filter and align one history series into a chart table.
    pub fn prepare_history(
        &self,
        key: &str,
        raw: &[TimePoint],
        today: NaiveDate,
    ) -> PipelineResult<HistoryPanel> {
        let processed = self.processor.process(raw, &self.settings.series, today);

        let observed: Vec<DatedPoint> =
            processed.raw.iter().filter(|p| !p.is_extended()).cloned().collect();
        let extended_points = processed.raw.len() - observed.len();
        let stale = self.processor.is_stale(&observed, today, STALE_AFTER_DAYS);
        if stale {
            get_logger().warn(
                LogComponent::Application("Pipeline"),
                &format!("⏳ History '{key}' has no observation in the last {STALE_AFTER_DAYS} days"),
            );
        }

        let table = self.aligner.align(&[
            NamedSeries::new(RAW_SERIES, processed.raw),
            NamedSeries::new(SMOOTHED_SERIES, processed.smoothed),
        ])?;

        Ok(HistoryPanel {
            key: key.to_string(),
            table,
            range: processed.range,
            stale,
            extended_points,
        })
    }

    /// Pressure band from the composite score and divergence from the group spread.
    pub fn classify_snapshot(
        &self,
        snapshot: Option<&MarketSnapshot>,
        sectors: &[SectorGroup],
    ) -> RegimePanel {
        let classifier = &self.settings.classifier;
        let snapshot = snapshot.cloned().unwrap_or_default();

        let defensive = snapshot
            .defensive_avg
            .filter(|v| v.is_finite())
            .or_else(|| group_average(sectors, &self.settings.defensive_sectors));
        let cyclical = snapshot
            .cyclical_avg
            .filter(|v| v.is_finite())
            .or_else(|| group_average(sectors, &self.settings.cyclical_sectors));

        let pressure = classifier.classify_pressure(snapshot.composite_score);
        let divergence = classifier.classify_divergence(defensive, cyclical, snapshot.market_state);

        RegimePanel {
            pressure_badge: pressure.regime.into(),
            divergence_badge: divergence.label.into(),
            pressure,
            divergence,
        }
    }

    pub fn layout_sectors(&self, sectors: &[SectorGroup]) -> Vec<SectorLayout> {
        self.layout.layout_sectors(sectors)
    }

    pub fn build_cone(&self, projections: &[ProjectionPoint]) -> Cone {
        self.cones.build(projections)
    }

    /// Run every transformation over one cycle's inputs.
    ///
    /// A history that cannot be aligned is left out of the frame; other panels
    /// are unaffected.
    pub fn build_frame(&self, inputs: &DashboardInputs, today: NaiveDate) -> DashboardFrame {
        let histories = inputs
            .histories
            .iter()
            .filter_map(|(key, points)| match self.prepare_history(key, points, today) {
                Ok(panel) => Some(panel),
                Err(e) => {
                    get_logger().error(
                        LogComponent::Application("Pipeline"),
                        &format!("❌ History '{key}' skipped: {e}"),
                    );
                    None
                }
            })
            .collect();

        let cone = self.build_cone(&inputs.projections);
        let frame = DashboardFrame {
            histories,
            regime: self.classify_snapshot(inputs.snapshot.as_ref(), &inputs.sectors),
            sectors: self.layout_sectors(&inputs.sectors),
            cone_rows: cone.rows(),
            cone,
            generated_at: get_time_provider().current_timestamp(),
        };

        get_logger().debug(
            LogComponent::Application("Pipeline"),
            &format!(
                "📊 Frame built: {} histories, {} sectors, {} cone points, regime {}",
                frame.histories.len(),
                frame.sectors.len(),
                frame.cone.len(),
                frame.regime.pressure.regime
            ),
        );
        frame
    }
}

/// Calendar date of the time provider's "now" in `zone`.
pub fn today_in(zone: DisplayZone) -> NaiveDate {
    let now = get_time_provider().current_timestamp();
    zone.date_of(now as i64).unwrap_or_default()
}
