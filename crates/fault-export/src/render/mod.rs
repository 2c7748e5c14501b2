//! Serializers for source sets: hierarchical XML markup and GeoJSON.

pub mod geojson;
pub mod markup;

pub use geojson::{GeoJsonWriter, GeometryStyle};

use crate::sources::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to format document: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("failed to encode or decode GeoJSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid GeoJSON document: {0}")]
    GeoJson(String),
    #[error("invalid trace line '{0}'")]
    TraceLine(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
