pub mod analytics;
pub mod batch;
pub mod config;
pub mod logging;
pub mod telemetry;
