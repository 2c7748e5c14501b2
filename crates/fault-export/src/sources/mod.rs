//! Validated domain records and the builders that assemble them.

pub mod fault;
pub mod record;
pub mod settings;
pub mod source_set;

pub use fault::{FaultRecord, FaultRecordBuilder, Location, RateKind, RateModel, RateType, Trace};
pub use record::{
    CrustalLimits, IncompleteRecordError, Quantity, ValidationError, ValidationPolicy, Value,
};
pub use settings::{
    MagUncertainty, Mfd, MfdKind, RegionSettings, RuptureScaling, UncertaintyKind,
};
pub use source_set::{SourceSet, SourceSetBuilder, SOURCE_SET_ID, SOURCE_SET_WEIGHT};
