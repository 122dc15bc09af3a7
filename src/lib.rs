// Runestone hunt: team fragment backend and device core.

pub mod api;
pub mod config;
pub mod device;
pub mod metrics;
pub mod password;
pub mod scoring;
pub mod store;
