use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

/// Legacy identifiers whose maximum magnitude is never overridden.
pub const DEFAULT_EXCLUSIONS: [&str; 6] = ["570n", "570m", "570s", "572", "572n", "572s"];

const SUPPORTED_COLUMNS: [&str; 3] = ["cfault_id", "mMax", "name"];
const REQUIRED_COLUMNS: [&str; 2] = ["cfault_id", "mMax"];

#[derive(Debug, thiserror::Error)]
pub enum ReferenceTableError {
    #[error("failed to read maximum magnitude table: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid maximum magnitude table: {0}")]
    Csv(#[from] csv::Error),
    #[error("unsupported column '{0}' in maximum magnitude table")]
    UnsupportedColumn(String),
    #[error("maximum magnitude table is missing column '{0}'")]
    MissingColumn(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaxMagnitudeEntry {
    pub legacy_id: String,
    pub m_max: f64,
    pub name: Option<String>,
}

/// Maximum-magnitude overrides keyed by legacy fault identifier.
#[derive(Debug, Clone)]
pub struct MaxMagnitudeTable {
    entries: HashMap<String, MaxMagnitudeEntry>,
    excluded: HashSet<String>,
}

impl Default for MaxMagnitudeTable {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            excluded: DEFAULT_EXCLUSIONS.iter().map(|id| id.to_string()).collect(),
        }
    }
}

impl MaxMagnitudeTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ReferenceTableError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads `cfault_id,mMax[,name]` rows; `#` lines and blank lines are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ReferenceTableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if let Some(unsupported) = headers
            .iter()
            .find(|header| !SUPPORTED_COLUMNS.contains(header))
        {
            return Err(ReferenceTableError::UnsupportedColumn(unsupported.to_string()));
        }
        if let Some(missing) = REQUIRED_COLUMNS
            .into_iter()
            .find(|column| !headers.iter().any(|header| header == *column))
        {
            return Err(ReferenceTableError::MissingColumn(missing));
        }

        let mut table = Self::default();
        for row in csv_reader.deserialize::<ReferenceRow>() {
            let row = row?;
            table.entries.insert(
                row.legacy_id.clone(),
                MaxMagnitudeEntry {
                    legacy_id: row.legacy_id,
                    m_max: row.m_max,
                    name: row.name,
                },
            );
        }
        Ok(table)
    }

    pub fn with_exclusions<I, S>(mut self, excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = excluded.into_iter().map(Into::into).collect();
        self
    }

    /// Override for `legacy_id`, unless the identifier is excluded.
    pub fn lookup(&self, legacy_id: &str) -> Option<f64> {
        let legacy_id = legacy_id.trim();
        if self.excluded.contains(legacy_id) {
            return None;
        }
        self.entries.get(legacy_id).map(|entry| entry.m_max)
    }

    pub fn entry(&self, legacy_id: &str) -> Option<&MaxMagnitudeEntry> {
        self.entries.get(legacy_id.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceRow {
    #[serde(rename = "cfault_id")]
    legacy_id: String,
    #[serde(rename = "mMax")]
    m_max: f64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    name: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TABLE: &str = "# western US fixed maximum magnitudes\n\
cfault_id,mMax,name\n\
\n\
101,7.1,Owens Valley\n\
570n,7.4,Excluded north\n\
# trailing note\n\
202,6.8,\n";

    #[test]
    fn reads_rows_skipping_comments_and_blanks() {
        let table = MaxMagnitudeTable::from_reader(Cursor::new(TABLE)).expect("table parses");
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup("101"), Some(7.1));
        assert_eq!(table.lookup(" 202 "), Some(6.8));
        assert_eq!(table.entry("202").and_then(|e| e.name.clone()), None);
        assert_eq!(table.lookup("999"), None);
    }

    #[test]
    fn excluded_ids_are_never_overridden() {
        let table = MaxMagnitudeTable::from_reader(Cursor::new(TABLE)).expect("table parses");
        assert!(table.entry("570n").is_some());
        assert_eq!(table.lookup("570n"), None);

        let table = table.with_exclusions(Vec::<String>::new());
        assert_eq!(table.lookup("570n"), Some(7.4));
    }

    #[test]
    fn unsupported_header_is_an_error() {
        let csv = "cfault_id,mMax,slip\n1,7.0,2.0\n";
        match MaxMagnitudeTable::from_reader(Cursor::new(csv)) {
            Err(ReferenceTableError::UnsupportedColumn(column)) => assert_eq!(column, "slip"),
            other => panic!("expected unsupported column, got {other:?}"),
        }
    }

    #[test]
    fn required_columns_must_be_present() {
        match MaxMagnitudeTable::from_reader(Cursor::new("cfault_id,name\n1,x\n")) {
            Err(ReferenceTableError::MissingColumn("mMax")) => {}
            other => panic!("expected missing column, got {other:?}"),
        }
    }
}
