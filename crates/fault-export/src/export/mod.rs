//! Region-by-region export: query, project, aggregate, render, write.

pub mod naming;

pub use naming::{clean_name, document_stem, region_name, source_set_name};

use crate::database::{ColumnError, FaultDatabase, QueryError};
use crate::projection::columns::STATE_ABBREV;
use crate::projection::{DatasetEra, MaxMagnitudeTable, RowProjector};
use crate::render::{markup, GeoJsonWriter, GeometryStyle, RenderError};
use crate::sources::{FaultRecord, RegionSettings, SourceSet, ValidationError};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One XML source set per region.
    Markup,
    /// One GeoJSON collection per fault, grouped in a directory per region.
    GeoJsonPerFault,
    /// One GeoJSON collection per region.
    GeoJsonPerRegion,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "xml" | "markup" => Ok(ExportFormat::Markup),
            "geojson" => Ok(ExportFormat::GeoJsonPerFault),
            "geojson-combined" | "geojson-region" => Ok(ExportFormat::GeoJsonPerRegion),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExportFormat::Markup => "xml",
            ExportFormat::GeoJsonPerFault => "geojson",
            ExportFormat::GeoJsonPerRegion => "geojson-combined",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub table: String,
    pub output_dir: PathBuf,
    pub format: ExportFormat,
    pub geometry: GeometryStyle,
}

impl ExportOptions {
    /// Directory every file of this run lands in: `<output>/<table>`.
    pub fn table_dir(&self) -> PathBuf {
        self.output_dir.join(&self.table)
    }
}

/// Errors that stop a whole run.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("unreadable region list: {0}")]
    Column(#[from] ColumnError),
}

/// Errors that stop a single region; the run moves on to the next one.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error(transparent)]
    Incomplete(#[from] ValidationError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub row: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionReport {
    pub region: String,
    pub rows: usize,
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedRecord>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSummary {
    pub regions: Vec<RegionReport>,
}

impl ExportSummary {
    pub fn files_written(&self) -> usize {
        self.regions.iter().map(|report| report.files.len()).sum()
    }

    pub fn records_skipped(&self) -> usize {
        self.regions.iter().map(|report| report.skipped.len()).sum()
    }

    pub fn failed_regions(&self) -> impl Iterator<Item = &RegionReport> + '_ {
        self.regions.iter().filter(|report| report.error.is_some())
    }
}

/// Drives one export run over every region of a fault table.
pub struct FaultExporter<D: FaultDatabase> {
    database: D,
    projector: RowProjector,
    settings: Arc<RegionSettings>,
    max_magnitudes: MaxMagnitudeTable,
    options: ExportOptions,
}

impl<D: FaultDatabase> FaultExporter<D> {
    pub fn new(
        database: D,
        projector: RowProjector,
        settings: Arc<RegionSettings>,
        options: ExportOptions,
    ) -> Self {
        Self {
            database,
            projector,
            settings,
            max_magnitudes: MaxMagnitudeTable::default(),
            options,
        }
    }

    pub fn with_max_magnitudes(mut self, table: MaxMagnitudeTable) -> Self {
        self.max_magnitudes = table;
        self
    }

    /// Connects, exports every region, and closes the connection even when
    /// the run fails.
    pub fn run(&mut self) -> Result<ExportSummary, ExportError> {
        self.database.connect()?;
        info!(
            table = %self.options.table,
            era = %self.projector.era(),
            format = %self.options.format,
            "export started"
        );

        let outcome = self.export_regions();
        let closed = self.database.close();
        let summary = outcome?;
        closed?;

        info!(
            regions = summary.regions.len(),
            files = summary.files_written(),
            skipped = summary.records_skipped(),
            "export finished"
        );
        Ok(summary)
    }

    fn export_regions(&mut self) -> Result<ExportSummary, ExportError> {
        let mut summary = ExportSummary::default();
        for (region, stored) in self.regions()? {
            let report = self.export_region(&region, &stored)?;
            summary.regions.push(report);
        }
        Ok(summary)
    }

    /// Distinct regions keyed by their trimmed abbreviation, each with the
    /// stored values (padding kept) that select its rows.
    fn regions(&mut self) -> Result<BTreeMap<String, Vec<String>>, ExportError> {
        let rows = self
            .database
            .query(&DatasetEra::regions_query(&self.options.table))?;
        let mut regions: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            match row.string(STATE_ABBREV)? {
                Some(stored) if !stored.trim().is_empty() => {
                    regions
                        .entry(stored.trim().to_string())
                        .or_default()
                        .push(stored);
                }
                _ => warn!("ignoring rows without a state abbreviation"),
            }
        }
        Ok(regions)
    }

    fn export_region(&mut self, region: &str, stored: &[String]) -> Result<RegionReport, ExportError> {
        let mut rows = Vec::new();
        for value in stored {
            let query = self
                .projector
                .era()
                .region_query(&self.options.table, value);
            rows.extend(self.database.query(&query)?);
        }
        info!(region, rows = rows.len(), "exporting region");

        let mut report = RegionReport {
            region: region.to_string(),
            rows: rows.len(),
            files: Vec::new(),
            skipped: Vec::new(),
            error: None,
        };

        let mut faults = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.projector.project(row) {
                Ok(fault) => faults.push(fault),
                Err(err) => {
                    warn!(region, row = err.row(), error = %err, "skipping fault record");
                    report.skipped.push(SkippedRecord {
                        row: err.row().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        match self.write_region(region, faults) {
            Ok(files) => {
                info!(region, files = files.len(), "region written");
                report.files = files;
            }
            Err(err) => {
                warn!(region, error = %err, "region export failed");
                report.error = Some(err.to_string());
            }
        }
        Ok(report)
    }

    fn write_region(
        &self,
        region: &str,
        faults: Vec<FaultRecord>,
    ) -> Result<Vec<PathBuf>, RegionError> {
        let set = SourceSet::builder()
            .name(&source_set_name(region))?
            .settings(Arc::clone(&self.settings))
            .sources(faults)
            .build()?;

        let documents = self.render(region, &set)?;
        let mut written = Vec::with_capacity(documents.len());
        for (path, contents) in documents {
            write_atomically(&path, &contents).map_err(|source| RegionError::Io {
                path: path.clone(),
                source,
            })?;
            written.push(path);
        }
        Ok(written)
    }

    /// Every document of the region, rendered in memory before any write.
    fn render(&self, region: &str, set: &SourceSet) -> Result<Vec<(PathBuf, String)>, RegionError> {
        let table_dir = self.options.table_dir();
        let geojson = GeoJsonWriter::new(self.options.geometry)
            .with_max_magnitudes(&self.max_magnitudes);

        match self.options.format {
            ExportFormat::Markup => {
                let path = table_dir.join(format!("{}.xml", region_name(region)));
                Ok(vec![(path, markup::render(set)?)])
            }
            ExportFormat::GeoJsonPerRegion => {
                let path = table_dir.join(format!("{region}.geojson"));
                Ok(vec![(path, geojson.render_source_set(set)?)])
            }
            ExportFormat::GeoJsonPerFault => {
                let region_dir = table_dir.join(region);
                let mut used = HashSet::new();
                let mut documents = Vec::with_capacity(set.sources().len());
                for fault in set.sources() {
                    let stem = unique_stem(&mut used, fault);
                    let path = region_dir.join(format!("{stem}.geojson"));
                    documents.push((path, geojson.render_fault(fault)?));
                }
                Ok(documents)
            }
        }
    }
}

/// File stem for one fault, unique within its region directory. A clash
/// appends the fault id, then a counter until the stem is free.
fn unique_stem(used: &mut HashSet<String>, fault: &FaultRecord) -> String {
    let base = clean_name(fault.name());
    let mut stem = base.clone();
    if stem.is_empty() || used.contains(&stem) {
        warn!(name = fault.name(), id = fault.id(), "duplicate file name, appending id");
        let with_id = format!("{base} {}", fault.id()).trim().to_string();
        stem = with_id.clone();
        let mut counter = 2;
        while used.contains(&stem) {
            stem = format!("{with_id} ({counter})");
            counter += 1;
        }
    }
    used.insert(stem.clone());
    stem
}

/// Writes to a sibling temp file then renames, so a partial document is
/// never visible under the final name. Parent directories are created.
pub fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);
    fs::write(&staging, contents)?;
    fs::rename(&staging, path)
}
