use super::RenderError;
use crate::projection::MaxMagnitudeTable;
use crate::sources::{
    FaultRecord, FaultRecordBuilder, Location, RateKind, RegionSettings, SourceSet, Trace,
    ValidationPolicy,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Placeholder id for imported features that carry none.
pub const PLACEHOLDER_ID: i64 = -1;

const MIN_RING_POSITIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub geometry: Geometry,
    pub properties: FaultProperties,
}

/// Positions are `[longitude, latitude]`; extra ordinates are ignored on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    LineString(Vec<Vec<f64>>),
    Polygon(Vec<Vec<Vec<f64>>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultProperties {
    #[serde(alias = "title")]
    pub name: String,
    pub depth: f64,
    pub dip: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rake: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q_fault_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default)]
    pub rate_models: Vec<RateModelProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateModelProperties {
    pub id: String,
    #[serde(rename = "type")]
    pub rate_type: String,
    pub rake: f64,
    pub value: f64,
}

/// How a trace is written: as an open line or as a closed polygon border.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeometryStyle {
    #[default]
    Line,
    Polygon,
}

/// Writes fault records as GeoJSON features, optionally attaching
/// maximum-magnitude overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonWriter<'a> {
    style: GeometryStyle,
    max_magnitudes: Option<&'a MaxMagnitudeTable>,
}

impl<'a> GeoJsonWriter<'a> {
    pub fn new(style: GeometryStyle) -> Self {
        Self {
            style,
            max_magnitudes: None,
        }
    }

    pub fn with_max_magnitudes(mut self, table: &'a MaxMagnitudeTable) -> Self {
        self.max_magnitudes = Some(table);
        self
    }

    /// Polygon style requires a border trace: a ring needs at least four
    /// positions once closed.
    pub fn feature(&self, fault: &FaultRecord) -> Result<Feature, RenderError> {
        let m_max = match (self.max_magnitudes, fault.legacy_id()) {
            (Some(table), Some(legacy_id)) => table.lookup(legacy_id),
            _ => None,
        };

        Ok(Feature {
            id: Some(fault.id()),
            geometry: self.geometry(fault)?,
            properties: FaultProperties {
                name: fault.name().to_string(),
                depth: fault.depth(),
                dip: fault.dip(),
                rake: fault.rake(),
                q_fault_id: fault.legacy_id().map(str::to_string),
                width: fault.width(),
                rate_models: fault
                    .rate_models()
                    .iter()
                    .map(|model| RateModelProperties {
                        id: model.kind().id().to_string(),
                        rate_type: model.kind().rate_type().label().to_string(),
                        rake: model.rake(),
                        value: model.value(),
                    })
                    .collect(),
                m_max,
            },
        })
    }

    pub fn collection<'f>(
        &self,
        faults: impl IntoIterator<Item = &'f FaultRecord>,
    ) -> Result<FeatureCollection, RenderError> {
        let features = faults
            .into_iter()
            .map(|fault| self.feature(fault))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FeatureCollection { features })
    }

    /// A single-feature collection for one fault.
    pub fn render_fault(&self, fault: &FaultRecord) -> Result<String, RenderError> {
        to_text(&self.collection([fault])?)
    }

    pub fn render_source_set(&self, set: &SourceSet) -> Result<String, RenderError> {
        to_text(&self.collection(set.sources())?)
    }

    fn geometry(&self, fault: &FaultRecord) -> Result<Geometry, RenderError> {
        let trace = fault.trace();
        let mut positions: Vec<Vec<f64>> = trace
            .locations()
            .iter()
            .map(|location| vec![location.longitude, location.latitude])
            .collect();
        match self.style {
            GeometryStyle::Line => Ok(Geometry::LineString(positions)),
            GeometryStyle::Polygon => {
                if !trace.is_closed() {
                    if let Some(first) = positions.first().cloned() {
                        positions.push(first);
                    }
                }
                if positions.len() < MIN_RING_POSITIONS {
                    return Err(RenderError::GeoJson(format!(
                        "fault '{}' (id {}) has {} trace locations, too few for a polygon border",
                        fault.name(),
                        fault.id(),
                        trace.len()
                    )));
                }
                Ok(Geometry::Polygon(vec![positions]))
            }
        }
    }
}

fn to_text<T: Serialize>(value: &T) -> Result<String, RenderError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

/// Builds a source set from a GeoJSON feature collection.
///
/// Polygon features contribute their outer border as the trace.
pub fn read_source_set(
    text: &str,
    name: &str,
    settings: Arc<RegionSettings>,
    policy: ValidationPolicy,
) -> Result<SourceSet, RenderError> {
    let collection: FeatureCollection = serde_json::from_str(text)?;
    let mut faults = Vec::with_capacity(collection.features.len());
    for feature in &collection.features {
        faults.push(read_feature(feature, policy)?);
    }

    let mut builder = SourceSet::builder();
    builder.name(name)?.settings(settings).sources(faults);
    Ok(builder.build()?)
}

pub fn read_feature(feature: &Feature, policy: ValidationPolicy) -> Result<FaultRecord, RenderError> {
    let properties = &feature.properties;
    let positions = match &feature.geometry {
        Geometry::LineString(positions) => positions.as_slice(),
        Geometry::Polygon(rings) => rings.first().map(Vec::as_slice).unwrap_or_default(),
    };
    let mut locations = Vec::with_capacity(positions.len());
    for position in positions {
        match position.as_slice() {
            [longitude, latitude, ..] => locations.push(Location::new(*latitude, *longitude)),
            _ => {
                return Err(RenderError::GeoJson(format!(
                    "feature '{}' has a position with fewer than two ordinates",
                    properties.name
                )))
            }
        }
    }

    let mut builder = FaultRecordBuilder::new(policy);
    builder
        .name(&properties.name)?
        .id(feature.id.unwrap_or(PLACEHOLDER_ID))?
        .depth(properties.depth)?
        .dip(properties.dip)?;
    if let Some(rake) = properties.rake {
        builder.rake(rake)?;
    }
    if let Some(width) = properties.width {
        builder.width(width)?;
    }
    if let Some(legacy_id) = &properties.q_fault_id {
        builder.legacy_id(legacy_id)?;
    }
    for model in &properties.rate_models {
        let kind: RateKind = model.id.parse().map_err(RenderError::GeoJson)?;
        builder.rate_model(kind, model.rake, model.value)?;
    }
    builder.trace(Trace::new(locations)?);
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::ValidationError;
    use std::io::Cursor;

    fn fault() -> FaultRecord {
        let mut builder = FaultRecord::builder(ValidationPolicy::checked());
        builder
            .name("Wasatch")
            .and_then(|b| b.id(11))
            .and_then(|b| b.depth(0.0))
            .and_then(|b| b.dip(50.0))
            .and_then(|b| b.legacy_id("2351"))
            .and_then(|b| b.rate_model(RateKind::Bird, -90.0, 1.2))
            .expect("fault fields");
        builder.trace(
            Trace::from_xy(&[(-111.9, 40.7), (-111.8, 40.9), (-111.7, 41.1)]).expect("trace"),
        );
        builder.build().expect("fault builds")
    }

    #[test]
    fn feature_properties_follow_fixed_order() {
        let text = GeoJsonWriter::new(GeometryStyle::Line)
            .render_fault(&fault())
            .expect("renders");
        let name = text.find("\"name\"").expect("name");
        let depth = text.find("\"depth\"").expect("depth");
        let dip = text.find("\"dip\"").expect("dip");
        let legacy = text.find("\"qFaultId\"").expect("qFaultId");
        let rates = text.find("\"rateModels\"").expect("rateModels");
        assert!(name < depth && depth < dip && dip < legacy && legacy < rates);
        assert!(text.contains("\"type\": \"FeatureCollection\""));
        assert!(text.contains("\"type\": \"LineString\""));
        assert!(text.contains("\"type\": \"DISPLACEMENT\""));
        assert!(!text.contains("mMax"));
    }

    #[test]
    fn max_magnitude_override_is_attached_unless_excluded() {
        let table = MaxMagnitudeTable::from_reader(Cursor::new("cfault_id,mMax\n2351,7.3\n"))
            .expect("table");
        let feature = GeoJsonWriter::new(GeometryStyle::Line)
            .with_max_magnitudes(&table)
            .feature(&fault())
            .expect("feature");
        assert_eq!(feature.properties.m_max, Some(7.3));

        let table = table.with_exclusions(["2351"]);
        let feature = GeoJsonWriter::new(GeometryStyle::Line)
            .with_max_magnitudes(&table)
            .feature(&fault())
            .expect("feature");
        assert_eq!(feature.properties.m_max, None);
    }

    #[test]
    fn polygon_style_closes_the_ring() {
        let feature = GeoJsonWriter::new(GeometryStyle::Polygon)
            .feature(&fault())
            .expect("feature");
        match feature.geometry {
            Geometry::Polygon(rings) => {
                assert_eq!(rings[0].len(), 4);
                assert_eq!(rings[0].first(), rings[0].last());
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn polygon_style_rejects_two_point_traces() {
        let mut builder = FaultRecord::builder(ValidationPolicy::checked());
        builder
            .name("Stub")
            .and_then(|b| b.id(5))
            .and_then(|b| b.depth(0.0))
            .and_then(|b| b.dip(70.0))
            .expect("fault fields");
        builder.trace(Trace::from_xy(&[(-120.0, 39.0), (-120.1, 39.2)]).expect("trace"));
        let stub = builder.build().expect("fault builds");

        match GeoJsonWriter::new(GeometryStyle::Polygon).render_fault(&stub) {
            Err(RenderError::GeoJson(message)) => assert!(message.contains("'Stub' (id 5)")),
            other => panic!("expected short ring rejection, got {other:?}"),
        }
        assert!(GeoJsonWriter::new(GeometryStyle::Line).render_fault(&stub).is_ok());
    }

    #[test]
    fn reads_feature_collection_into_source_set() {
        let text = r#"{
          "type": "FeatureCollection",
          "features": [{
            "type": "Feature",
            "id": 91,
            "geometry": {"type": "Polygon", "coordinates": [[[-120.0, 39.0, 0.0], [-120.1, 39.2, 0.0], [-120.0, 39.0, 0.0]]]},
            "properties": {"title": "Genoa", "depth": 1.0, "dip": 60.0, "width": 18.0,
              "rateModels": [{"id": "GEO", "type": "DISPLACEMENT", "rake": -90.0, "value": 0.8}]}
          }]
        }"#;
        let settings = Arc::new(RegionSettings::western_us().expect("settings"));
        let set = read_source_set(text, "Genoa", settings, ValidationPolicy::checked())
            .expect("imports");
        let genoa = &set.sources()[0];
        assert_eq!(genoa.name(), "Genoa");
        assert_eq!(genoa.id(), 91);
        assert_eq!(genoa.width(), Some(18.0));
        assert_eq!(genoa.trace().len(), 3);
        assert_eq!(genoa.rate_models()[0].kind(), RateKind::Geo);
    }

    #[test]
    fn import_validates_through_builders() {
        let text = r#"{"type": "FeatureCollection", "features": [{"type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[-120.0, 39.0], [-120.1, 39.2]]},
            "properties": {"name": "Steep", "depth": 1.0, "dip": 120.0}}]}"#;
        let settings = Arc::new(RegionSettings::western_us().expect("settings"));

        match read_source_set(text, "Steep", Arc::clone(&settings), ValidationPolicy::checked()) {
            Err(RenderError::Validation(ValidationError::OutOfRange { field: "dip", .. })) => {}
            other => panic!("expected dip rejection, got {other:?}"),
        }

        let set = read_source_set(text, "Steep", settings, ValidationPolicy::Unchecked)
            .expect("unchecked import accepts");
        assert_eq!(set.sources()[0].id(), PLACEHOLDER_ID);
    }

    #[test]
    fn empty_collection_cannot_form_a_source_set() {
        let settings = Arc::new(RegionSettings::western_us().expect("settings"));
        let text = r#"{"type": "FeatureCollection", "features": []}"#;
        match read_source_set(text, "Empty", settings, ValidationPolicy::checked()) {
            Err(RenderError::Validation(ValidationError::Incomplete(err))) => {
                assert_eq!(err.missing, vec!["sources"]);
            }
            other => panic!("expected incomplete set, got {other:?}"),
        }
    }
}
