//! Application layer: configuration, the transformation pipeline and the
//! refresh cycle that feeds it.

pub mod config;
pub mod coordinator;
pub mod loading;
pub mod pipeline;

pub use config::{DashboardConfig, PipelineSettings};
pub use coordinator::{DashboardCoordinator, DashboardDataSource, RefreshHandle};
pub use loading::{ObserverId, PendingGuard, PendingRequests};
pub use pipeline::{
    DashboardFrame, DashboardInputs, DashboardPipeline, HistoryPanel, MarketSnapshot, RegimePanel,
};
