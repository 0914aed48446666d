pub mod signals;
pub mod wasm_api;

pub use signals::DashboardSignals;
pub use wasm_api::DashboardApi;
