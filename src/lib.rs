// Re-export modules so they can be used from tests
pub mod cli;
pub mod config;
pub mod k8s;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod poller;
pub mod prometheus;
pub mod ui;
