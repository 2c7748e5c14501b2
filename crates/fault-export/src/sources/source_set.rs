use super::fault::FaultRecord;
use super::record::{IncompleteRecordError, ValidationError};
use super::settings::RegionSettings;
use std::sync::Arc;

pub const SOURCE_SET_ID: i64 = -1;
pub const SOURCE_SET_WEIGHT: f64 = 1.0;

/// The exportable unit: one region's faults plus the shared settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSet {
    name: String,
    settings: Arc<RegionSettings>,
    sources: Vec<FaultRecord>,
}

impl SourceSet {
    pub fn builder() -> SourceSetBuilder {
        SourceSetBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> i64 {
        SOURCE_SET_ID
    }

    pub fn weight(&self) -> f64 {
        SOURCE_SET_WEIGHT
    }

    pub fn settings(&self) -> &RegionSettings {
        &self.settings
    }

    pub fn sources(&self) -> &[FaultRecord] {
        &self.sources
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceSetBuilder {
    name: Option<String>,
    settings: Option<Arc<RegionSettings>>,
    sources: Vec<FaultRecord>,
    built: bool,
}

impl SourceSetBuilder {
    pub fn name(&mut self, name: &str) -> Result<&mut Self, ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Invalid {
                owner: "source set".to_string(),
                field: "name",
                reason: "must not be blank".to_string(),
            });
        }
        self.name = Some(trimmed.to_string());
        Ok(self)
    }

    pub fn settings(&mut self, settings: Arc<RegionSettings>) -> &mut Self {
        self.settings = Some(settings);
        self
    }

    pub fn source(&mut self, fault: FaultRecord) -> &mut Self {
        self.sources.push(fault);
        self
    }

    pub fn sources(&mut self, faults: impl IntoIterator<Item = FaultRecord>) -> &mut Self {
        self.sources.extend(faults);
        self
    }

    pub fn build(&mut self) -> Result<SourceSet, ValidationError> {
        let owner = match &self.name {
            Some(name) => format!("source set '{name}'"),
            None => "source set".to_string(),
        };
        if self.built {
            return Err(ValidationError::AlreadyBuilt { owner });
        }

        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("name");
        }
        if self.settings.is_none() {
            missing.push("settings");
        }
        if self.sources.is_empty() {
            missing.push("sources");
        }

        match (self.name.take(), self.settings.take()) {
            (Some(name), Some(settings)) if missing.is_empty() => {
                self.built = true;
                Ok(SourceSet {
                    name,
                    settings,
                    sources: std::mem::take(&mut self.sources),
                })
            }
            (name, settings) => {
                self.name = name;
                self.settings = settings;
                Err(IncompleteRecordError { owner, missing }.into())
            }
        }
    }
}
