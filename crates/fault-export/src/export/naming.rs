use crate::sources::ValidationError;
use std::collections::HashMap;
use std::sync::OnceLock;

static STATE_NAMES: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

fn state_names() -> &'static HashMap<&'static str, &'static str> {
    STATE_NAMES.get_or_init(|| {
        const ABBREV_TO_NAME: &[(&str, &str)] = &[
            ("AK", "Alaska"),
            ("AL", "Alabama"),
            ("AR", "Arkansas"),
            ("AZ", "Arizona"),
            ("CA", "California"),
            ("CO", "Colorado"),
            ("CT", "Connecticut"),
            ("DC", "District of Columbia"),
            ("DE", "Delaware"),
            ("FL", "Florida"),
            ("GA", "Georgia"),
            ("HI", "Hawaii"),
            ("IA", "Iowa"),
            ("ID", "Idaho"),
            ("IL", "Illinois"),
            ("IN", "Indiana"),
            ("KS", "Kansas"),
            ("KY", "Kentucky"),
            ("LA", "Louisiana"),
            ("MA", "Massachusetts"),
            ("MD", "Maryland"),
            ("ME", "Maine"),
            ("MI", "Michigan"),
            ("MN", "Minnesota"),
            ("MO", "Missouri"),
            ("MS", "Mississippi"),
            ("MT", "Montana"),
            ("NC", "North Carolina"),
            ("ND", "North Dakota"),
            ("NE", "Nebraska"),
            ("NH", "New Hampshire"),
            ("NJ", "New Jersey"),
            ("NM", "New Mexico"),
            ("NV", "Nevada"),
            ("NY", "New York"),
            ("OH", "Ohio"),
            ("OK", "Oklahoma"),
            ("OR", "Oregon"),
            ("PA", "Pennsylvania"),
            ("PR", "Puerto Rico"),
            ("RI", "Rhode Island"),
            ("SC", "South Carolina"),
            ("SD", "South Dakota"),
            ("TN", "Tennessee"),
            ("TX", "Texas"),
            ("UT", "Utah"),
            ("VA", "Virginia"),
            ("VT", "Vermont"),
            ("WA", "Washington"),
            ("WI", "Wisconsin"),
            ("WV", "West Virginia"),
            ("WY", "Wyoming"),
        ];
        ABBREV_TO_NAME.iter().copied().collect()
    })
}

/// Full name for a state abbreviation, falling back to the abbreviation.
pub fn region_name(abbrev: &str) -> String {
    let abbrev = abbrev.trim();
    state_names()
        .get(abbrev.to_ascii_uppercase().as_str())
        .map(|name| name.to_string())
        .unwrap_or_else(|| abbrev.to_string())
}

pub fn source_set_name(abbrev: &str) -> String {
    format!("{} Faults", region_name(abbrev))
}

/// File stem for a per-fault document.
pub fn clean_name(name: &str) -> String {
    let replaced = name
        .replace("faults", "")
        .replace("fault", "")
        .replace("zone", "")
        .replace('-', " - ")
        .replace('/', " - ")
        .replace(" , ", " - ")
        .replace(", ", " - ")
        .replace(';', " : ");
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// File stem for a document named by the caller. Names that would resolve
/// outside the output directory are rejected.
pub fn document_stem(name: &str) -> Result<String, ValidationError> {
    let stem = name.trim();
    let reason = if stem.is_empty() {
        Some("must not be blank")
    } else if stem.contains(['/', '\\', '\0']) {
        Some("must not contain path separators")
    } else if stem.starts_with('.') {
        Some("must not start with '.'")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ValidationError::Invalid {
            owner: format!("document '{name}'"),
            field: "name",
            reason: reason.to_string(),
        }),
        None => Ok(stem.to_string()),
    }
}
