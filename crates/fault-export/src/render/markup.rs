use super::RenderError;
use crate::sources::record::{format_decimal, AttributeKey};
use crate::sources::settings::UncertaintyKey;
use crate::sources::{FaultRecord, Location, SourceSet, Trace};
use std::fmt::{self, Write};

pub const ROOT_ELEMENT: &str = "FaultSourceSet";
pub const DISCLAIMER: &str = " This model is an example and for review purposes only ";
const MFD_ELEMENT: &str = "IncrementalMfd";
const INDENT: &str = "  ";

/// Renders a source set as the XML document consumed by the hazard model.
///
/// Attributes appear in builder insertion order, so rendering an unchanged
/// set is byte-identical.
pub fn render(set: &SourceSet) -> Result<String, RenderError> {
    let mut writer = MarkupWriter::default();
    writer.declaration()?;
    writer.open(
        ROOT_ELEMENT,
        &[
            ("name", set.name().to_string()),
            ("id", set.id().to_string()),
            ("weight", format_decimal(set.weight())),
        ],
    )?;
    writer.comment(DISCLAIMER)?;
    write_settings(&mut writer, set)?;
    for fault in set.sources() {
        write_source(&mut writer, fault)?;
    }
    writer.close(ROOT_ELEMENT)?;
    Ok(writer.finish())
}

fn write_settings(writer: &mut MarkupWriter, set: &SourceSet) -> fmt::Result {
    let settings = set.settings();
    writer.open("Settings", &[])?;

    writer.open("DefaultMfds", &[])?;
    for mfd in settings.mfds() {
        let attributes: Vec<_> = mfd
            .attributes()
            .iter()
            .map(|(key, value)| (key.name(), value.to_string()))
            .collect();
        writer.empty(MFD_ELEMENT, &attributes)?;
    }
    writer.close("DefaultMfds")?;

    writer.open("MagUncertainty", &[])?;
    for uncertainty in settings.uncertainties() {
        let attributes: Vec<_> = uncertainty
            .attributes()
            .iter()
            .filter(|(key, _)| *key != UncertaintyKey::Type)
            .map(|(key, value)| (key.name(), value.to_string()))
            .collect();
        writer.empty(uncertainty.kind().tag(), &attributes)?;
    }
    writer.close("MagUncertainty")?;

    writer.open("SourceProperties", &[])?;
    writer.open("RuptureScalingModels", &[])?;
    for model in settings.rupture_scaling() {
        writer.empty("Model", &[("id", model.id().to_string())])?;
    }
    writer.close("RuptureScalingModels")?;
    writer.close("SourceProperties")?;

    writer.close("Settings")
}

fn write_source(writer: &mut MarkupWriter, fault: &FaultRecord) -> fmt::Result {
    writer.open(
        "Source",
        &[("name", fault.name().to_string()), ("id", fault.id().to_string())],
    )?;
    for model in fault.rate_models() {
        writer.empty(
            "DeformationModel",
            &[
                ("id", model.kind().id().to_string()),
                ("rate", format_decimal(model.value())),
            ],
        )?;
    }

    let geometry: Vec<_> = fault
        .geometry_attributes()
        .map(|(key, value)| (key.name(), value.to_string()))
        .collect();
    writer.open("Geometry", &geometry)?;
    writer.text_element("Trace", &trace_text(fault.trace()))?;
    writer.close("Geometry")?;

    writer.close("Source")
}

/// One `longitude,latitude,0.00000` line per location, each newline terminated,
/// after a leading newline.
pub fn trace_text(trace: &Trace) -> String {
    let mut text = String::from("\n");
    for location in trace.locations() {
        text.push_str(&format!(
            "{:.5},{:.5},0.00000\n",
            location.longitude, location.latitude
        ));
    }
    text
}

/// Parses `Trace` element text back into locations.
pub fn read_trace(text: &str) -> Result<Trace, RenderError> {
    let mut locations = Vec::new();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let mut parts = line.split(',').map(|part| part.trim().parse::<f64>());
        match (parts.next(), parts.next()) {
            (Some(Ok(longitude)), Some(Ok(latitude))) => {
                locations.push(Location::new(latitude, longitude));
            }
            _ => return Err(RenderError::TraceLine(line.to_string())),
        }
    }
    Ok(Trace::new(locations)?)
}

#[derive(Debug, Default)]
struct MarkupWriter {
    out: String,
    depth: usize,
}

impl MarkupWriter {
    fn declaration(&mut self) -> fmt::Result {
        writeln!(
            self.out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"
        )
    }

    fn open(&mut self, tag: &str, attributes: &[(&str, String)]) -> fmt::Result {
        self.start_tag(tag, attributes)?;
        writeln!(self.out, ">")?;
        self.depth += 1;
        Ok(())
    }

    fn empty(&mut self, tag: &str, attributes: &[(&str, String)]) -> fmt::Result {
        self.start_tag(tag, attributes)?;
        writeln!(self.out, "/>")
    }

    fn close(&mut self, tag: &str) -> fmt::Result {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        writeln!(self.out, "</{tag}>")
    }

    fn comment(&mut self, text: &str) -> fmt::Result {
        self.indent();
        writeln!(self.out, "<!--{}-->", text.replace("--", "- -"))
    }

    /// Text content is written verbatim after escaping; the closing tag
    /// follows the text directly.
    fn text_element(&mut self, tag: &str, text: &str) -> fmt::Result {
        self.start_tag(tag, &[])?;
        writeln!(self.out, ">{}</{tag}>", escape_xml(text))
    }

    fn start_tag(&mut self, tag: &str, attributes: &[(&str, String)]) -> fmt::Result {
        self.indent();
        write!(self.out, "<{tag}")?;
        for (name, value) in attributes {
            write!(self.out, " {name}=\"{}\"", escape_xml(value))?;
        }
        Ok(())
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{RateKind, RegionSettings, ValidationPolicy};
    use std::sync::Arc;

    fn fault(name: &str, id: i64, rates: &[(RateKind, f64)]) -> FaultRecord {
        let mut builder = FaultRecord::builder(ValidationPolicy::checked());
        builder
            .name(name)
            .and_then(|b| b.id(id))
            .and_then(|b| b.depth(0.0))
            .and_then(|b| b.dip(50.0))
            .and_then(|b| b.rake(-90.0))
            .and_then(|b| b.width(14.5))
            .expect("fault fields");
        for (kind, value) in rates {
            builder.rate_model(*kind, -90.0, *value).expect("rate model");
        }
        builder.trace(
            Trace::from_xy(&[(-119.123456, 37.5), (-119.2, 37.654321)]).expect("trace"),
        );
        builder.build().expect("fault builds")
    }

    fn source_set() -> SourceSet {
        SourceSet::builder()
            .name("Nevada Faults")
            .map(|b| {
                b.settings(Arc::new(RegionSettings::western_us().expect("settings")))
                    .source(fault("Black & Rock", 3, &[(RateKind::APriori, 0.3)]))
                    .source(fault("Carson", 4, &[(RateKind::Geo, 0.2), (RateKind::Bird, 0.1)]))
            })
            .and_then(|b| b.build())
            .expect("source set")
    }

    #[test]
    fn renders_settings_block() {
        let xml = render(&source_set()).expect("renders");
        assert!(xml.starts_with(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<FaultSourceSet name=\"Nevada Faults\" id=\"-1\" weight=\"1.0\">\n  <!-- This model is an example and for review purposes only -->\n  <Settings>\n"
        ));
        assert!(xml.contains(
            "      <IncrementalMfd floats=\"false\" m=\"6.5\" rate=\"0.0\" weight=\"1.0\" type=\"SINGLE\"/>\n"
        ));
        assert!(xml.contains(
            "      <IncrementalMfd a=\"0.0\" b=\"0.8\" dMag=\"0.1\" mMax=\"7.5\" mMin=\"6.55\" weight=\"1.0\" type=\"GR\"/>\n"
        ));
        assert!(xml.contains(
            "      <Aleatory count=\"11\" cutoff=\"6.5\" moBalance=\"true\" sigma=\"0.12\"/>\n"
        ));
        assert!(xml.contains(
            "      <Epistemic cutoff=\"6.5\" deltas=\"[-0.2, 0.0, 0.2]\" weights=\"[0.2, 0.6, 0.2]\"/>\n"
        ));
        assert!(xml.contains("        <Model id=\"NSHM_FAULT_WC94_LENGTH\"/>\n"));
        assert!(xml.ends_with("</FaultSourceSet>\n"));
    }

    #[test]
    fn renders_sources_with_models_and_geometry() {
        let xml = render(&source_set()).expect("renders");
        assert!(xml.contains("  <Source name=\"Black &amp; Rock\" id=\"3\">\n"));
        assert!(xml.contains("    <DeformationModel id=\"A_PRIORI\" rate=\"0.3\"/>\n"));
        assert!(xml.contains(
            "    <DeformationModel id=\"GEO\" rate=\"0.2\"/>\n    <DeformationModel id=\"BIRD\" rate=\"0.1\"/>\n"
        ));
        assert!(xml.contains(
            "    <Geometry depth=\"0.0\" dip=\"50.0\" rake=\"-90.0\" width=\"14.5\">\n      <Trace>\n-119.12346,37.50000,0.00000\n-119.20000,37.65432,0.00000\n</Trace>\n    </Geometry>\n"
        ));
        assert_eq!(xml.matches("<Source ").count(), 2);
    }

    #[test]
    fn rendering_is_deterministic() {
        let set = source_set();
        assert_eq!(render(&set).expect("first"), render(&set).expect("second"));
    }

    #[test]
    fn trace_text_round_trips_to_five_decimals() {
        let original = Trace::from_xy(&[(-118.000004, 34.123456), (-118.5, 34.9)]).expect("trace");
        let parsed = read_trace(&trace_text(&original)).expect("parses");
        assert_eq!(parsed.len(), original.len());
        for (a, b) in parsed.locations().iter().zip(original.locations()) {
            assert!((a.latitude - b.latitude).abs() < 5e-6);
            assert!((a.longitude - b.longitude).abs() < 5e-6);
        }
    }

    #[test]
    fn rendered_trace_elements_read_back_to_source_traces() {
        let set = source_set();
        let xml = render(&set).expect("renders");
        let bodies: Vec<&str> = xml
            .split("<Trace>")
            .skip(1)
            .map(|rest| rest.split("</Trace>").next().expect("closing tag"))
            .collect();
        assert_eq!(bodies.len(), set.sources().len());

        for (body, fault) in bodies.into_iter().zip(set.sources()) {
            let parsed = read_trace(body).expect("parses");
            assert_eq!(parsed.len(), fault.trace().len());
            for (a, b) in parsed.locations().iter().zip(fault.trace().locations()) {
                assert!((a.latitude - b.latitude).abs() < 5e-6);
                assert!((a.longitude - b.longitude).abs() < 5e-6);
            }
        }
    }

    #[test]
    fn unreadable_trace_line_is_reported() {
        match read_trace("\n-118.0,north,0.0\n") {
            Err(RenderError::TraceLine(line)) => assert_eq!(line, "-118.0,north,0.0"),
            other => panic!("expected trace line error, got {other:?}"),
        }
    }
}
