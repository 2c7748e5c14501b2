use super::record::{
    AttributeKey, Attributes, Quantity, RecordBuilder, ValidationError, ValidationPolicy, Value,
};
use std::fmt;
use std::str::FromStr;

/// A point on the earth's surface; elevation is in kilometres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: 0.0,
        }
    }
}

/// Ordered, non-empty polyline along a fault, start to end.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    locations: Vec<Location>,
}

impl Trace {
    pub fn new(locations: Vec<Location>) -> Result<Self, ValidationError> {
        if locations.is_empty() {
            return Err(ValidationError::Invalid {
                owner: "trace".to_string(),
                field: "trace",
                reason: "must contain at least one location".to_string(),
            });
        }
        Ok(Self { locations })
    }

    /// Builds a trace from `(x, y)` pairs where x is longitude and y latitude.
    pub fn from_xy(points: &[(f64, f64)]) -> Result<Self, ValidationError> {
        Self::new(
            points
                .iter()
                .map(|&(longitude, latitude)| Location::new(latitude, longitude))
                .collect(),
        )
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.locations.len() > 2 && self.locations.first() == self.locations.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateKind {
    Bird,
    Geo,
    Zeng,
    Slip,
    APriori,
}

impl RateKind {
    pub fn id(self) -> &'static str {
        match self {
            RateKind::Bird => "BIRD",
            RateKind::Geo => "GEO",
            RateKind::Zeng => "ZENG",
            RateKind::Slip => "SLIP",
            RateKind::APriori => "A_PRIORI",
        }
    }

    pub fn rate_type(self) -> RateType {
        match self {
            RateKind::APriori => RateType::ProbabilityOfActivity,
            RateKind::Slip => RateType::Slip,
            RateKind::Bird | RateKind::Geo | RateKind::Zeng => RateType::Displacement,
        }
    }
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for RateKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "BIRD" => Ok(RateKind::Bird),
            "GEO" => Ok(RateKind::Geo),
            "ZENG" => Ok(RateKind::Zeng),
            "SLIP" => Ok(RateKind::Slip),
            "A_PRIORI" => Ok(RateKind::APriori),
            other => Err(format!("unknown rate model '{other}'")),
        }
    }
}

/// Unit family of a rate model's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateType {
    ProbabilityOfActivity,
    Displacement,
    Slip,
}

impl RateType {
    pub fn label(self) -> &'static str {
        match self {
            RateType::ProbabilityOfActivity => "PROBABILITY_OF_ACTIVITY",
            RateType::Displacement => "DISPLACEMENT",
            RateType::Slip => "SLIP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateModel {
    kind: RateKind,
    rake: f64,
    value: f64,
}

impl RateModel {
    pub fn new(
        kind: RateKind,
        rake: f64,
        value: f64,
        policy: &ValidationPolicy,
    ) -> Result<Self, ValidationError> {
        let owner = format!("{} rate model", kind.id());
        policy.check(&owner, "rake", Quantity::Rake, rake)?;
        if !value.is_finite() {
            return Err(ValidationError::NotFinite {
                owner,
                field: "rate",
            });
        }
        Ok(Self { kind, rake, value })
    }

    pub fn kind(&self) -> RateKind {
        self.kind
    }

    pub fn rake(&self) -> f64 {
        self.rake
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKey {
    Name,
    Id,
    Depth,
    Dip,
    Rake,
    Width,
    LegacyId,
    Region,
}

impl FaultKey {
    pub fn is_geometry(self) -> bool {
        matches!(
            self,
            FaultKey::Depth | FaultKey::Dip | FaultKey::Rake | FaultKey::Width
        )
    }
}

impl AttributeKey for FaultKey {
    fn name(self) -> &'static str {
        match self {
            FaultKey::Name => "name",
            FaultKey::Id => "id",
            FaultKey::Depth => "depth",
            FaultKey::Dip => "dip",
            FaultKey::Rake => "rake",
            FaultKey::Width => "width",
            FaultKey::LegacyId => "qFaultId",
            FaultKey::Region => "region",
        }
    }

    fn quantity(self) -> Option<Quantity> {
        match self {
            FaultKey::Depth => Some(Quantity::Depth),
            FaultKey::Dip => Some(Quantity::Dip),
            FaultKey::Rake => Some(Quantity::Rake),
            FaultKey::Width => Some(Quantity::Width),
            FaultKey::Name | FaultKey::Id | FaultKey::LegacyId | FaultKey::Region => None,
        }
    }
}

const FAULT_REQUIRED: &[FaultKey] = &[FaultKey::Name, FaultKey::Id, FaultKey::Depth, FaultKey::Dip];

/// One fault: identity, geometry, and its candidate rate models.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultRecord {
    attributes: Attributes<FaultKey>,
    trace: Trace,
    rate_models: Vec<RateModel>,
}

impl FaultRecord {
    pub fn builder(policy: ValidationPolicy) -> FaultRecordBuilder {
        FaultRecordBuilder::new(policy)
    }

    pub fn name(&self) -> &str {
        self.attributes
            .get(FaultKey::Name)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn id(&self) -> i64 {
        self.attributes
            .get(FaultKey::Id)
            .and_then(Value::as_i64)
            .unwrap_or_default()
    }

    pub fn depth(&self) -> f64 {
        self.number(FaultKey::Depth).unwrap_or_default()
    }

    pub fn dip(&self) -> f64 {
        self.number(FaultKey::Dip).unwrap_or_default()
    }

    pub fn rake(&self) -> Option<f64> {
        self.number(FaultKey::Rake)
    }

    pub fn width(&self) -> Option<f64> {
        self.number(FaultKey::Width)
    }

    pub fn legacy_id(&self) -> Option<&str> {
        self.attributes.get(FaultKey::LegacyId).and_then(Value::as_str)
    }

    pub fn region(&self) -> Option<&str> {
        self.attributes.get(FaultKey::Region).and_then(Value::as_str)
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn rate_models(&self) -> &[RateModel] {
        &self.rate_models
    }

    /// Depth, dip, rake and width in the order they were set.
    pub fn geometry_attributes(&self) -> impl Iterator<Item = (FaultKey, &Value)> + '_ {
        self.attributes.iter().filter(|(key, _)| key.is_geometry())
    }

    fn number(&self, key: FaultKey) -> Option<f64> {
        self.attributes.get(key).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone)]
pub struct FaultRecordBuilder {
    record: RecordBuilder<FaultKey>,
    trace: Option<Trace>,
    rate_models: Vec<RateModel>,
}

impl FaultRecordBuilder {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self {
            record: RecordBuilder::new("fault", FAULT_REQUIRED, policy),
            trace: None,
            rate_models: Vec::new(),
        }
    }

    pub fn name(&mut self, name: &str) -> Result<&mut Self, ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
            return Err(ValidationError::Invalid {
                owner: self.record.owner().to_string(),
                field: "name",
                reason: format!("'{name}' is not a valid fault name"),
            });
        }
        self.record.set(FaultKey::Name, trimmed)?;
        self.relabel();
        Ok(self)
    }

    pub fn id(&mut self, id: i64) -> Result<&mut Self, ValidationError> {
        self.record.set(FaultKey::Id, id)?;
        self.relabel();
        Ok(self)
    }

    pub fn depth(&mut self, depth: f64) -> Result<&mut Self, ValidationError> {
        self.record.set(FaultKey::Depth, depth)?;
        Ok(self)
    }

    pub fn dip(&mut self, dip: f64) -> Result<&mut Self, ValidationError> {
        self.record.set(FaultKey::Dip, dip)?;
        Ok(self)
    }

    pub fn rake(&mut self, rake: f64) -> Result<&mut Self, ValidationError> {
        self.record.set(FaultKey::Rake, rake)?;
        Ok(self)
    }

    pub fn width(&mut self, width: f64) -> Result<&mut Self, ValidationError> {
        self.record.set(FaultKey::Width, width)?;
        Ok(self)
    }

    pub fn legacy_id(&mut self, legacy_id: &str) -> Result<&mut Self, ValidationError> {
        self.record.set(FaultKey::LegacyId, legacy_id.trim())?;
        Ok(self)
    }

    pub fn region(&mut self, region: &str) -> Result<&mut Self, ValidationError> {
        self.record.set(FaultKey::Region, region.trim())?;
        Ok(self)
    }

    pub fn trace(&mut self, trace: Trace) -> &mut Self {
        self.trace = Some(trace);
        self
    }

    pub fn rate_model(
        &mut self,
        kind: RateKind,
        rake: f64,
        value: f64,
    ) -> Result<&mut Self, ValidationError> {
        let model = RateModel::new(kind, rake, value, &self.record.policy())?;
        self.rate_models.push(model);
        Ok(self)
    }

    pub fn build(&mut self) -> Result<FaultRecord, ValidationError> {
        let missing_trace = if self.trace.is_none() {
            vec!["trace"]
        } else {
            Vec::new()
        };
        let attributes = self.record.finish(missing_trace)?;
        let trace = self.trace.take().ok_or_else(|| ValidationError::Invalid {
            owner: self.record.owner().to_string(),
            field: "trace",
            reason: "was consumed by an earlier build".to_string(),
        })?;

        Ok(FaultRecord {
            attributes,
            trace,
            rate_models: std::mem::take(&mut self.rate_models),
        })
    }

    fn relabel(&mut self) {
        let name = self.record.get(FaultKey::Name).and_then(Value::as_str);
        let id = self.record.get(FaultKey::Id).and_then(Value::as_i64);
        let label = match (name, id) {
            (Some(name), Some(id)) => format!("fault '{name}' (id {id})"),
            (Some(name), None) => format!("fault '{name}'"),
            (None, Some(id)) => format!("fault id {id}"),
            (None, None) => "fault".to_string(),
        };
        self.record.relabel(label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::record::CrustalLimits;

    fn sample_trace() -> Trace {
        Trace::from_xy(&[(-117.5, 34.0), (-117.25, 34.1)]).expect("trace")
    }

    #[test]
    fn builds_fault_with_geometry_in_insertion_order() {
        let mut builder = FaultRecord::builder(ValidationPolicy::checked());
        builder
            .name("Elsinore")
            .and_then(|b| b.id(42))
            .and_then(|b| b.depth(0.0))
            .and_then(|b| b.dip(90.0))
            .and_then(|b| b.rake(180.0))
            .and_then(|b| b.width(15.0))
            .and_then(|b| b.rate_model(RateKind::Geo, 180.0, 2.5))
            .expect("valid fault");
        builder.trace(sample_trace());

        let fault = builder.build().expect("fault builds");
        assert_eq!(fault.name(), "Elsinore");
        assert_eq!(fault.id(), 42);
        let geometry: Vec<_> = fault
            .geometry_attributes()
            .map(|(key, _)| key.name())
            .collect();
        assert_eq!(geometry, vec!["depth", "dip", "rake", "width"]);
        assert_eq!(fault.rate_models().len(), 1);
        assert_eq!(fault.trace().locations()[0].latitude, 34.0);
        assert_eq!(fault.trace().locations()[0].longitude, -117.5);
    }

    #[test]
    fn accepts_boundary_dips_and_rakes() {
        for dip in [0.001, 45.0, 90.0] {
            FaultRecord::builder(ValidationPolicy::checked())
                .dip(dip)
                .expect("dip in range");
        }
        for rake in [-180.0, 0.0, 180.0] {
            FaultRecord::builder(ValidationPolicy::checked())
                .rake(rake)
                .expect("rake in range");
        }
    }

    #[test]
    fn rejects_out_of_range_quantities_naming_the_field() {
        let mut builder = FaultRecord::builder(ValidationPolicy::checked());
        builder.name("Garlock").and_then(|b| b.id(7)).expect("identity");

        let err = builder.dip(91.0).expect_err("dip too steep");
        assert_eq!(err.field(), Some("dip"));
        assert!(err.to_string().contains("Garlock"));

        assert_eq!(builder.rake(-180.5).expect_err("rake").field(), Some("rake"));
        assert_eq!(builder.depth(-0.1).expect_err("depth").field(), Some("depth"));
        assert_eq!(builder.width(0.0).expect_err("width").field(), Some("width"));
    }

    #[test]
    fn crustal_limits_are_configurable() {
        let policy = ValidationPolicy::Checked(CrustalLimits {
            max_depth: 10.0,
            max_width: 20.0,
        });
        let mut builder = FaultRecord::builder(policy);
        builder.depth(10.0).expect("at limit");
        assert!(builder.depth(10.5).is_err());
        builder.width(20.0).expect("at limit");
        assert!(builder.width(20.5).is_err());
    }

    #[test]
    fn rate_model_rake_is_validated() {
        let mut builder = FaultRecord::builder(ValidationPolicy::checked());
        match builder.rate_model(RateKind::Bird, 200.0, 1.0) {
            Err(ValidationError::OutOfRange { field: "rake", .. }) => {}
            other => panic!("expected rake rejection, got {other:?}"),
        }
    }

    #[test]
    fn missing_trace_is_reported_with_other_keys() {
        let mut builder = FaultRecord::builder(ValidationPolicy::checked());
        builder.name("Hayward").expect("name");
        match builder.build() {
            Err(ValidationError::Incomplete(err)) => {
                assert_eq!(err.missing, vec!["id", "depth", "dip", "trace"]);
                assert!(err.owner.contains("Hayward"));
            }
            other => panic!("expected incomplete fault, got {other:?}"),
        }
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut builder = FaultRecord::builder(ValidationPolicy::Unchecked);
        assert!(builder.name("   ").is_err());
    }

    #[test]
    fn empty_trace_is_rejected() {
        assert!(Trace::new(Vec::new()).is_err());
    }

    #[test]
    fn rate_kinds_map_to_rate_types() {
        assert_eq!(RateKind::APriori.rate_type().label(), "PROBABILITY_OF_ACTIVITY");
        assert_eq!(RateKind::Zeng.rate_type(), RateType::Displacement);
        assert_eq!("a_priori".parse::<RateKind>(), Ok(RateKind::APriori));
    }
}
