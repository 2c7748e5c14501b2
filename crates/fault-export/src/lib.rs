//! Fault source-set exporter.
//!
//! Rows from a fault table are projected into validated [`sources::FaultRecord`]s,
//! grouped by region into [`sources::SourceSet`]s and rendered as XML or GeoJSON.

pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod projection;
pub mod render;
pub mod sources;
pub mod telemetry;
