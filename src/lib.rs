//! Library exports for the tracker binaries, benchmarks and tests.
/// Application directory helpers.
pub mod app_dirs;
/// TOML-backed application settings.
pub mod config;
/// Tracing setup shared by the binaries.
pub mod logging;
/// Outcome estimation over tracked applications.
pub mod ml;
/// Per-user application tables and their flat-file store.
pub mod tracker;
