pub mod errors;
pub mod layout;
pub mod logging;
pub mod projection;
pub mod regime;
pub mod time_series;
