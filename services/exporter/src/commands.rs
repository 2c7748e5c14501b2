use clap::Args;
use fault_export::config::{self, AppConfig, TelemetryConfig};
use fault_export::database::SqliteDatabase;
use fault_export::error::AppError;
use fault_export::export::{
    document_stem, write_atomically, ExportFormat, ExportOptions, ExportSummary, FaultExporter,
};
use fault_export::projection::{DatasetEra, MaxMagnitudeTable, RowProjector};
use fault_export::render::{geojson, markup, GeometryStyle};
use fault_export::sources::{RegionSettings, ValidationPolicy};
use fault_export::telemetry;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Dataset era selecting columns and rate-model precedence
    #[arg(long)]
    pub(crate) era: DatasetEra,
    /// Output format: xml, geojson (one file per fault) or geojson-combined
    #[arg(long, default_value = "xml")]
    pub(crate) format: ExportFormat,
    /// Override the configured fault table
    #[arg(long)]
    pub(crate) table: Option<String>,
    /// Override the configured output directory
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Write GeoJSON traces as closed polygons instead of lines
    #[arg(long)]
    pub(crate) polygon: bool,
    /// Skip range checks on dip, rake, depth and width
    #[arg(long)]
    pub(crate) unchecked: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ConvertArgs {
    /// GeoJSON feature collection to read
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Name of the resulting source set; also the output file stem
    #[arg(long)]
    pub(crate) name: String,
    /// Skip range checks on dip, rake, depth and width
    #[arg(long)]
    pub(crate) unchecked: bool,
    /// Directory receiving the XML file (defaults to ./output)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig, AppError> {
    let config = match path {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    Ok(config)
}

pub(crate) fn run_export(config_path: Option<PathBuf>, args: ExportArgs) -> Result<(), AppError> {
    let config = load_config(config_path)?;
    telemetry::init(&config.telemetry)?;

    let ExportArgs {
        era,
        format,
        table,
        output,
        polygon,
        unchecked,
    } = args;

    let policy = if unchecked {
        ValidationPolicy::Unchecked
    } else {
        ValidationPolicy::Checked(config.export.limits)
    };
    let max_magnitudes = match &config.export.max_magnitude_table {
        Some(path) => MaxMagnitudeTable::from_path(path)?,
        None => MaxMagnitudeTable::default(),
    };
    let options = ExportOptions {
        table: table.unwrap_or_else(|| config.database.table.clone()),
        output_dir: output.unwrap_or_else(|| config.export.output_dir.clone()),
        format,
        geometry: if polygon {
            GeometryStyle::Polygon
        } else {
            GeometryStyle::Line
        },
    };

    let database = SqliteDatabase::from_config(&config.database);
    info!(database = %database.path().display(), "using fault database");

    let mut exporter = FaultExporter::new(
        database,
        RowProjector::new(era, policy),
        Arc::new(RegionSettings::western_us()?),
        options.clone(),
    )
    .with_max_magnitudes(max_magnitudes);
    let summary = exporter.run()?;

    render_summary(&options, era, &summary);
    Ok(())
}

fn render_summary(options: &ExportOptions, era: DatasetEra, summary: &ExportSummary) {
    println!(
        "Exported table {} ({} era, {}) to {}",
        options.table,
        era,
        options.format,
        options.table_dir().display()
    );
    for report in &summary.regions {
        match &report.error {
            Some(error) => println!("- {}: failed: {}", report.region, error),
            None => println!(
                "- {}: {} rows | {} files | {} skipped",
                report.region,
                report.rows,
                report.files.len(),
                report.skipped.len()
            ),
        }
        for skipped in &report.skipped {
            println!("    skipped {}: {}", skipped.row, skipped.reason);
        }
    }
    println!(
        "{} files written, {} records skipped, {} regions failed",
        summary.files_written(),
        summary.records_skipped(),
        summary.failed_regions().count()
    );
}

pub(crate) fn run_convert(config_path: Option<PathBuf>, args: ConvertArgs) -> Result<(), AppError> {
    config::load_env_file(config_path.as_deref())?;
    telemetry::init(&TelemetryConfig::from_env())?;

    let ConvertArgs {
        input,
        name,
        unchecked,
        output,
    } = args;
    let policy = if unchecked {
        ValidationPolicy::Unchecked
    } else {
        ValidationPolicy::checked()
    };
    let output_dir = output.unwrap_or_else(|| PathBuf::from("output"));

    let (path, sources) = convert(&input, &name, policy, &output_dir)?;
    info!(input = %input.display(), sources, "converted feature collection");
    println!("Wrote {} sources to {}", sources, path.display());
    Ok(())
}

/// Reads a feature collection and writes it as `<output_dir>/<name>.xml`.
fn convert(
    input: &Path,
    name: &str,
    policy: ValidationPolicy,
    output_dir: &Path,
) -> Result<(PathBuf, usize), AppError> {
    let stem = document_stem(name)?;
    let text = fs::read_to_string(input)?;
    let set = geojson::read_source_set(
        &text,
        name,
        Arc::new(RegionSettings::western_us()?),
        policy,
    )?;
    let document = markup::render(&set)?;

    let path = output_dir.join(format!("{stem}.xml"));
    write_atomically(&path, &document)?;
    Ok((path, set.sources().len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault_export::sources::ValidationError;

    const COLLECTION: &str = r#"{"type": "FeatureCollection", "features": [{"type": "Feature", "id": 3,
        "geometry": {"type": "LineString", "coordinates": [[-111.9, 40.7], [-111.8, 40.9]]},
        "properties": {"name": "Wasatch", "depth": 0.0, "dip": 50.0}}]}"#;

    #[test]
    fn convert_writes_markup_under_the_output_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("wasatch.geojson");
        fs::write(&input, COLLECTION).expect("input");
        let output = dir.path().join("out");

        let (path, sources) =
            convert(&input, "Wasatch Faults", ValidationPolicy::checked(), &output)
                .expect("converts");
        assert_eq!(path, output.join("Wasatch Faults.xml"));
        assert_eq!(sources, 1);
        let xml = fs::read_to_string(&path).expect("written");
        assert!(xml.contains("<FaultSourceSet name=\"Wasatch Faults\""));
        assert!(!output.join("Wasatch Faults.xml.tmp").exists());
    }

    #[test]
    fn convert_rejects_names_that_leave_the_output_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("wasatch.geojson");
        fs::write(&input, COLLECTION).expect("input");
        let output = dir.path().join("out");

        match convert(&input, "../escaped", ValidationPolicy::checked(), &output) {
            Err(AppError::Validation(ValidationError::Invalid { field: "name", .. })) => {}
            other => panic!("expected name rejection, got {other:?}"),
        }
        assert!(!dir.path().join("escaped.xml").exists());
        assert!(!output.exists());
    }

    #[test]
    fn convert_reports_missing_input_as_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out");

        match convert(
            &dir.path().join("absent.geojson"),
            "Absent Faults",
            ValidationPolicy::checked(),
            &output,
        ) {
            Err(AppError::Io(err)) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected io error, got {other:?}"),
        }
        assert!(!output.exists());
    }
}
