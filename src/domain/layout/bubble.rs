use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay};

use crate::domain::errors::{AppError, PipelineResult};
use crate::domain::logging::LogComponent;
use crate::log_warn;

/// Horizontal bounds every bubble centre is clamped into.
pub const X_MIN: f64 = 5.0;
pub const X_MAX: f64 = 95.0;
/// Vertical span substituted when every stock in a sector has the same change.
const FALLBACK_SPAN: f64 = 2.0;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockPoint {
    pub ticker: String,
    #[serde(default)]
    pub price: f64,
    pub pct_change: f64,
    #[serde(default)]
    pub volume: f64,
}

impl StockPoint {
    pub fn new(ticker: impl Into<String>, price: f64, pct_change: f64, volume: f64) -> Self {
        Self { ticker: ticker.into(), price, pct_change, volume }
    }

    fn is_plottable(&self) -> bool {
        !self.ticker.is_empty() && self.pct_change.is_finite() && self.volume.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorGroup {
    pub name: String,
    /// Sector average percent change.
    pub pct_change: f64,
    #[serde(default)]
    pub stocks: Vec<StockPoint>,
}

impl SectorGroup {
    /// Build a group whose average is computed from its finite stock changes.
    pub fn from_stocks(name: impl Into<String>, stocks: Vec<StockPoint>) -> Self {
        let finite: Vec<f64> =
            stocks.iter().map(|s| s.pct_change).filter(|v| v.is_finite()).collect();
        let pct_change = if finite.is_empty() {
            0.0
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };
        Self { name: name.into(), pct_change, stocks }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, AsRefStr, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ColorKey {
    Gain,
    Loss,
    Flat,
}

impl ColorKey {
    pub fn for_change(pct_change: f64) -> Self {
        if pct_change > 0.0 {
            ColorKey::Gain
        } else if pct_change < 0.0 {
            ColorKey::Loss
        } else {
            ColorKey::Flat
        }
    }
}

/// Renderable bubble: `x`/`y` in percent of the chart area, `size` in pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPosition {
    pub ticker: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub color_key: ColorKey,
}

/// Percent-change values drawn at the top (y = 0) and bottom (y = 100) of a sector panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisScale {
    pub top: f64,
    pub bottom: f64,
}

impl AxisScale {
    /// Padded axis over `[min, max]`, widened to a fixed span when degenerate.
    pub fn padded(min: f64, max: f64, padding: f64) -> Self {
        let (top, bottom) = (max + padding, min - padding);
        if (top - bottom).is_finite() && top - bottom > f64::EPSILON {
            return Self { top, bottom };
        }
        let center = if (min + max).is_finite() { (min + max) / 2.0 } else { 0.0 };
        let widened = Self { top: center + FALLBACK_SPAN / 2.0, bottom: center - FALLBACK_SPAN / 2.0 };
        // Past ~1e16 the half span is lost to rounding.
        if widened.span().is_finite() && widened.span() > 0.0 {
            widened
        } else {
            Self { top: FALLBACK_SPAN / 2.0, bottom: -FALLBACK_SPAN / 2.0 }
        }
    }

    pub fn span(&self) -> f64 {
        self.top - self.bottom
    }

    /// Inverted linear map so gains sit near the top.
    pub fn y_for(&self, pct_change: f64) -> f64 {
        let ratio = (self.top - pct_change) / self.span();
        if !ratio.is_finite() {
            return 50.0;
        }
        (ratio * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorLayout {
    pub name: String,
    pub pct_change: f64,
    pub axis: AxisScale,
    pub positions: Vec<LayoutPosition>,
}

/// Bubble pixel range and vertical padding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleSizing {
    min_size: f64,
    max_size: f64,
    pct_padding: f64,
}

impl Default for BubbleSizing {
    fn default() -> Self {
        Self { min_size: 8.0, max_size: 40.0, pct_padding: 1.0 }
    }
}

impl BubbleSizing {
    pub fn new(min_size: f64, max_size: f64, pct_padding: f64) -> PipelineResult<Self> {
        if !min_size.is_finite() || !max_size.is_finite() || min_size <= 0.0 {
            return Err(AppError::config(format!(
                "minSize/maxSize must be finite and positive, got {min_size}/{max_size}"
            )));
        }
        if max_size < min_size {
            return Err(AppError::config(format!(
                "maxSize ({max_size}) must not be below minSize ({min_size})"
            )));
        }
        if !pct_padding.is_finite() || pct_padding < 0.0 {
            return Err(AppError::config(format!(
                "pctPadding must be finite and non-negative, got {pct_padding}"
            )));
        }
        Ok(Self { min_size, max_size, pct_padding })
    }

    pub fn min_size(&self) -> f64 {
        self.min_size
    }

    pub fn max_size(&self) -> f64 {
        self.max_size
    }

    pub fn pct_padding(&self) -> f64 {
        self.pct_padding
    }

    /// Linear volume share mapped into `[min_size, max_size]`.
    pub fn size_for(&self, volume: f64, max_volume: f64) -> f64 {
        let share = if max_volume > 0.0 { volume.max(0.0) / max_volume } else { 0.0 };
        (self.min_size + share * (self.max_size - self.min_size)).clamp(self.min_size, self.max_size)
    }
}

/// 32-bit FNV-1a over the ticker's UTF-8 bytes.
pub fn ticker_hash(ticker: &str) -> u32 {
    ticker
        .bytes()
        .fold(FNV_OFFSET_BASIS, |hash, byte| (hash ^ byte as u32).wrapping_mul(FNV_PRIME))
}

/// Deterministic horizontal scatter position for a ticker.
///
/// Base offset in `[10, 90]` from [`ticker_hash`], plus a jitter in `[-10, 10]`
/// from `len * first_byte`, clamped into `[X_MIN, X_MAX]`.
pub fn ticker_x(ticker: &str) -> f64 {
    let primary = ticker_hash(ticker);
    let first = ticker.bytes().next().unwrap_or(0) as u32;
    let secondary = (ticker.len() as u32).wrapping_mul(first);

    let base = 10.0 + (primary % 801) as f64 / 10.0;
    let jitter = (secondary % 201) as f64 / 10.0 - 10.0;
    (base + jitter).clamp(X_MIN, X_MAX)
}

/// Lays out one bubble per stock inside a bounded sector panel.
#[derive(Debug, Clone, Copy, Default)]
pub struct BubbleLayoutEngine {
    sizing: BubbleSizing,
}

impl BubbleLayoutEngine {
    pub fn new(sizing: BubbleSizing) -> Self {
        Self { sizing }
    }

    pub fn sizing(&self) -> &BubbleSizing {
        &self.sizing
    }

    pub fn layout_sector(&self, sector: &SectorGroup) -> SectorLayout {
        let stocks: Vec<&StockPoint> = sector.stocks.iter().filter(|s| s.is_plottable()).collect();
        if stocks.len() < sector.stocks.len() {
            log_warn!(
                LogComponent::Domain("BubbleLayout"),
                "{}: skipped {} stock(s) with missing ticker or non-finite values",
                sector.name,
                sector.stocks.len() - stocks.len()
            );
        }

        let (min_pct, max_pct) = stocks
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.pct_change), hi.max(s.pct_change))
            });
        let axis = if stocks.is_empty() {
            AxisScale::padded(0.0, 0.0, self.sizing.pct_padding)
        } else {
            AxisScale::padded(min_pct, max_pct, self.sizing.pct_padding)
        };
        let max_volume = stocks.iter().map(|s| s.volume).fold(0.0_f64, f64::max);

        let positions = stocks
            .iter()
            .map(|stock| LayoutPosition {
                ticker: stock.ticker.clone(),
                x: ticker_x(&stock.ticker),
                y: axis.y_for(stock.pct_change),
                size: self.sizing.size_for(stock.volume, max_volume),
                color_key: ColorKey::for_change(stock.pct_change),
            })
            .collect();

        SectorLayout {
            name: sector.name.clone(),
            pct_change: sector.pct_change,
            axis,
            positions,
        }
    }

    pub fn layout_sectors(&self, sectors: &[SectorGroup]) -> Vec<SectorLayout> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            sectors.par_iter().map(|sector| self.layout_sector(sector)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            sectors.iter().map(|sector| self.layout_sector(sector)).collect()
        }
    }
}
