//! Maps fault table rows onto [`FaultRecord`]s, including each dataset
//! era's rate-model precedence.

pub mod reference;
pub mod wkt;

pub use reference::{MaxMagnitudeTable, ReferenceTableError, DEFAULT_EXCLUSIONS};
pub use wkt::WktError;

use crate::database::{ColumnError, Query, QueryRow, SortOrder};
use crate::sources::{
    FaultRecord, FaultRecordBuilder, RateKind, Trace, ValidationError, ValidationPolicy,
};
use std::fmt;
use std::str::FromStr;

pub mod columns {
    pub const BIRD_DISPLACEMENT_RATE: &str = "bird_displacement_rate";
    pub const CALC_WIDTH: &str = "calc_width";
    pub const CFAULT_ID: &str = "cfault_id";
    pub const DIP: &str = "dip";
    pub const DISPLACEMENT_RATE: &str = "displacement_rate";
    pub const FAULT_TRACE: &str = "fault_trace";
    pub const GEO_DISPLACEMENT_RATE: &str = "geo_displacement_rate";
    pub const GEO_RAKE: &str = "geo_rake";
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const PRIMARY_STATE: &str = "primary_state";
    pub const PROBABILITY_OF_ACTIVITY: &str = "probability_of_activity";
    pub const RAKE: &str = "rake";
    pub const SLIP_RATE: &str = "slip_rate";
    pub const STATE_ABBREV: &str = "state_abbrev";
    pub const UPPER_DEPTH: &str = "upper_depth";
    pub const ZENG_DISPLACEMENT_RATE: &str = "zeng_displacement_rate";
}

use columns::*;

const BASE_COLUMNS: &[&str] = &[
    CFAULT_ID,
    DIP,
    ID,
    NAME,
    PRIMARY_STATE,
    PROBABILITY_OF_ACTIVITY,
    STATE_ABBREV,
    UPPER_DEPTH,
    FAULT_TRACE,
];

/// Vintage of the fault table. Each era selects its own columns and
/// applies its own rate-model precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetEra {
    Generic,
    Hazfaults2008,
    Hazfaults2014,
}

impl DatasetEra {
    pub fn label(self) -> &'static str {
        match self {
            DatasetEra::Generic => "generic",
            DatasetEra::Hazfaults2008 => "2008",
            DatasetEra::Hazfaults2014 => "2014",
        }
    }

    fn extra_columns(self) -> &'static [&'static str] {
        match self {
            DatasetEra::Generic => &[GEO_RAKE],
            DatasetEra::Hazfaults2008 => &[DISPLACEMENT_RATE, RAKE, SLIP_RATE],
            DatasetEra::Hazfaults2014 => &[
                BIRD_DISPLACEMENT_RATE,
                CALC_WIDTH,
                GEO_DISPLACEMENT_RATE,
                GEO_RAKE,
                ZENG_DISPLACEMENT_RATE,
            ],
        }
    }

    pub fn columns(self) -> Vec<&'static str> {
        BASE_COLUMNS
            .iter()
            .chain(self.extra_columns())
            .copied()
            .collect()
    }

    /// Column paired with every rate model of this era, a-priori included.
    pub fn rake_column(self) -> &'static str {
        match self {
            DatasetEra::Hazfaults2008 => RAKE,
            DatasetEra::Generic | DatasetEra::Hazfaults2014 => GEO_RAKE,
        }
    }

    pub fn width_column(self) -> Option<&'static str> {
        match self {
            DatasetEra::Hazfaults2014 => Some(CALC_WIDTH),
            DatasetEra::Generic | DatasetEra::Hazfaults2008 => None,
        }
    }

    /// Rate models for one row, as `(kind, value)` pairs in emission order.
    pub fn rate_values(self, row: &QueryRow) -> Result<Vec<(RateKind, f64)>, ColumnError> {
        if let Some(probability) = a_priori(row)? {
            return Ok(vec![(RateKind::APriori, probability)]);
        }
        match self {
            DatasetEra::Generic => Ok(Vec::new()),
            DatasetEra::Hazfaults2008 => slip_or_geologic_2008(row),
            DatasetEra::Hazfaults2014 => displacement_models_2014(row),
        }
    }

    pub fn regions_query(table: &str) -> Query {
        Query::select_distinct([STATE_ABBREV])
            .from(table)
            .order_by(STATE_ABBREV, SortOrder::Ascending)
    }

    pub fn region_query(self, table: &str, region: &str) -> Query {
        Query::select(self.columns())
            .from(table)
            .where_eq(STATE_ABBREV, region)
            .order_by(NAME, SortOrder::Ascending)
    }
}

impl fmt::Display for DatasetEra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DatasetEra {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(DatasetEra::Generic),
            "2008" | "hazfaults2008" => Ok(DatasetEra::Hazfaults2008),
            "2014" | "hazfaults2014" => Ok(DatasetEra::Hazfaults2014),
            other => Err(format!("unknown dataset era '{other}'")),
        }
    }
}

/// A probability of activity below one replaces every other rate model.
fn a_priori(row: &QueryRow) -> Result<Option<f64>, ColumnError> {
    if !row.contains(PROBABILITY_OF_ACTIVITY) {
        return Ok(None);
    }
    Ok(row
        .double(PROBABILITY_OF_ACTIVITY)?
        .filter(|probability| *probability < 1.0))
}

/// California rows carry slip rates; elsewhere the geologic displacement rate.
fn slip_or_geologic_2008(row: &QueryRow) -> Result<Vec<(RateKind, f64)>, ColumnError> {
    let state = row.string(STATE_ABBREV)?.unwrap_or_default();
    let (kind, column) = if state.trim() == "CA" {
        (RateKind::Slip, SLIP_RATE)
    } else {
        (RateKind::Geo, DISPLACEMENT_RATE)
    };
    Ok(row
        .double(column)?
        .map(|value| vec![(kind, value)])
        .unwrap_or_default())
}

fn displacement_models_2014(row: &QueryRow) -> Result<Vec<(RateKind, f64)>, ColumnError> {
    let mut models = Vec::new();
    for (kind, column) in [
        (RateKind::Bird, BIRD_DISPLACEMENT_RATE),
        (RateKind::Geo, GEO_DISPLACEMENT_RATE),
        (RateKind::Zeng, ZENG_DISPLACEMENT_RATE),
    ] {
        if let Some(value) = row.double(column)? {
            models.push((kind, value));
        }
    }
    Ok(models)
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("row {row}: {source}")]
    Column {
        row: String,
        #[source]
        source: ColumnError,
    },
    #[error("row {row}: invalid fault trace: {source}")]
    Trace {
        row: String,
        #[source]
        source: WktError,
    },
    #[error("row {row}: {source}")]
    Validation {
        row: String,
        #[source]
        source: ValidationError,
    },
}

impl RecordError {
    pub fn row(&self) -> &str {
        match self {
            RecordError::Column { row, .. }
            | RecordError::Trace { row, .. }
            | RecordError::Validation { row, .. } => row,
        }
    }
}

/// Turns rows of one era into fault records under a validation policy.
#[derive(Debug, Clone, Copy)]
pub struct RowProjector {
    era: DatasetEra,
    policy: ValidationPolicy,
}

impl RowProjector {
    pub fn new(era: DatasetEra, policy: ValidationPolicy) -> Self {
        Self { era, policy }
    }

    pub fn era(&self) -> DatasetEra {
        self.era
    }

    pub fn project(&self, row: &QueryRow) -> Result<FaultRecord, RecordError> {
        let label = row_label(row);
        let column = |source| RecordError::Column {
            row: label.clone(),
            source,
        };
        let validation = |source| RecordError::Validation {
            row: label.clone(),
            source,
        };

        let trace_text = row
            .string(FAULT_TRACE)
            .map_err(column)?
            .ok_or_else(|| column(ColumnError::Null(FAULT_TRACE.to_string())))?;
        let points = wkt::parse(&trace_text).map_err(|source| RecordError::Trace {
            row: label.clone(),
            source,
        })?;
        let trace = Trace::from_xy(&points).map_err(validation)?;

        let name = row.string(NAME).map_err(column)?.unwrap_or_default();
        let id = row.int(ID).map_err(column)?;
        let depth = require(row, UPPER_DEPTH).map_err(column)?;
        let dip = require(row, DIP).map_err(column)?;
        let rake = row.double(self.era.rake_column()).map_err(column)?;
        let rates = self.era.rate_values(row).map_err(column)?;

        let mut builder = FaultRecordBuilder::new(self.policy);
        builder
            .name(&name)
            .and_then(|b| b.id(id))
            .and_then(|b| b.depth(depth))
            .and_then(|b| b.dip(dip))
            .map_err(validation)?;
        if let Some(rake) = rake {
            builder.rake(rake).map_err(validation)?;
        }
        if let Some(width_column) = self.era.width_column() {
            if let Some(width) = row.double(width_column).map_err(column)? {
                builder.width(width).map_err(validation)?;
            }
        }
        if let Some(legacy_id) = row.string(CFAULT_ID).map_err(column)? {
            if !legacy_id.trim().is_empty() {
                builder.legacy_id(&legacy_id).map_err(validation)?;
            }
        }
        if let Some(region) = row.string(STATE_ABBREV).map_err(column)? {
            builder.region(&region).map_err(validation)?;
        }

        if !rates.is_empty() {
            let rake = rake.ok_or_else(|| {
                column(ColumnError::Null(self.era.rake_column().to_string()))
            })?;
            for (kind, value) in rates {
                builder.rate_model(kind, rake, value).map_err(validation)?;
            }
        }

        builder.trace(trace);
        builder.build().map_err(validation)
    }
}

fn require(row: &QueryRow, column: &str) -> Result<f64, ColumnError> {
    row.double(column)?
        .ok_or_else(|| ColumnError::Null(column.to_string()))
}

fn row_label(row: &QueryRow) -> String {
    let name = row.string(NAME).ok().flatten();
    let id = row.int(ID).ok();
    match (name, id) {
        (Some(name), Some(id)) => format!("'{name}' (id {id})"),
        (Some(name), None) => format!("'{name}'"),
        (None, Some(id)) => format!("id {id}"),
        (None, None) => "<unidentified>".to_string(),
    }
}
