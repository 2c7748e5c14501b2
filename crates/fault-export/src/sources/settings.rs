use super::record::{
    AttributeKey, Attributes, IncompleteRecordError, RecordBuilder, ValidationError,
    ValidationPolicy, Value,
};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfdKey {
    Floats,
    M,
    Rate,
    A,
    B,
    CMag,
    DMag,
    MMin,
    MMax,
    Mags,
    Rates,
    Weight,
    Type,
}

impl AttributeKey for MfdKey {
    fn name(self) -> &'static str {
        match self {
            MfdKey::Floats => "floats",
            MfdKey::M => "m",
            MfdKey::Rate => "rate",
            MfdKey::A => "a",
            MfdKey::B => "b",
            MfdKey::CMag => "cMag",
            MfdKey::DMag => "dMag",
            MfdKey::MMin => "mMin",
            MfdKey::MMax => "mMax",
            MfdKey::Mags => "mags",
            MfdKey::Rates => "rates",
            MfdKey::Weight => "weight",
            MfdKey::Type => "type",
        }
    }
}

/// Magnitude-frequency distribution variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfdKind {
    Single,
    GutenbergRichter,
    TaperedGutenbergRichter,
    Incremental,
}

impl MfdKind {
    pub fn tag(self) -> &'static str {
        match self {
            MfdKind::Single => "SINGLE",
            MfdKind::GutenbergRichter => "GR",
            MfdKind::TaperedGutenbergRichter => "GR_TAPER",
            MfdKind::Incremental => "INCR",
        }
    }

    pub fn required(self) -> &'static [MfdKey] {
        use MfdKey::*;
        match self {
            MfdKind::Single => &[Floats, M, Rate, Weight],
            MfdKind::GutenbergRichter => &[A, B, DMag, MMin, MMax, Weight],
            MfdKind::TaperedGutenbergRichter => &[A, B, CMag, DMag, MMin, MMax, Weight],
            MfdKind::Incremental => &[Floats, Mags, Rates, Weight],
        }
    }
}

/// One flat, ordered MFD mapping ending with its `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Mfd {
    kind: MfdKind,
    attributes: Attributes<MfdKey>,
}

impl Mfd {
    pub fn single() -> MfdBuilder {
        MfdBuilder::new(MfdKind::Single)
    }

    pub fn gutenberg_richter() -> MfdBuilder {
        MfdBuilder::new(MfdKind::GutenbergRichter)
    }

    pub fn tapered_gutenberg_richter() -> MfdBuilder {
        MfdBuilder::new(MfdKind::TaperedGutenbergRichter)
    }

    pub fn incremental() -> MfdBuilder {
        MfdBuilder::new(MfdKind::Incremental)
    }

    pub fn kind(&self) -> MfdKind {
        self.kind
    }

    pub fn attributes(&self) -> &Attributes<MfdKey> {
        &self.attributes
    }
}

#[derive(Debug, Clone)]
pub struct MfdBuilder {
    kind: MfdKind,
    record: RecordBuilder<MfdKey>,
}

impl MfdBuilder {
    fn new(kind: MfdKind) -> Self {
        Self {
            kind,
            record: RecordBuilder::new(
                format!("{} mfd", kind.tag()),
                kind.required(),
                ValidationPolicy::Unchecked,
            ),
        }
    }

    /// Sets a variant attribute; keys outside the variant are rejected.
    pub fn set(&mut self, key: MfdKey, value: impl Into<Value>) -> Result<&mut Self, ValidationError> {
        if !self.kind.required().contains(&key) {
            return Err(ValidationError::Invalid {
                owner: self.record.owner().to_string(),
                field: key.name(),
                reason: "is not an attribute of this distribution".to_string(),
            });
        }
        self.record.set(key, value)?;
        Ok(self)
    }

    pub fn floats(&mut self, floats: bool) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::Floats, floats)
    }

    pub fn magnitude(&mut self, m: f64) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::M, m)
    }

    pub fn rate(&mut self, rate: f64) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::Rate, rate)
    }

    pub fn a(&mut self, a: f64) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::A, a)
    }

    pub fn b(&mut self, b: f64) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::B, b)
    }

    pub fn c_mag(&mut self, c_mag: f64) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::CMag, c_mag)
    }

    pub fn d_mag(&mut self, d_mag: f64) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::DMag, d_mag)
    }

    pub fn m_min(&mut self, m_min: f64) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::MMin, m_min)
    }

    pub fn m_max(&mut self, m_max: f64) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::MMax, m_max)
    }

    pub fn magnitudes(&mut self, mags: Vec<f64>) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::Mags, mags)
    }

    pub fn rates(&mut self, rates: Vec<f64>) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::Rates, rates)
    }

    pub fn weight(&mut self, weight: f64) -> Result<&mut Self, ValidationError> {
        self.set(MfdKey::Weight, weight)
    }

    pub fn build(&mut self) -> Result<Mfd, ValidationError> {
        if self.kind == MfdKind::Incremental {
            check_same_length(&self.record, MfdKey::Rates, MfdKey::Mags)?;
        }
        let mut attributes = self.record.build()?;
        attributes.insert(MfdKey::Type, Value::from(self.kind.tag()));
        Ok(Mfd {
            kind: self.kind,
            attributes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncertaintyKey {
    Count,
    Cutoff,
    MoBalance,
    Sigma,
    Deltas,
    Weights,
    Type,
}

impl AttributeKey for UncertaintyKey {
    fn name(self) -> &'static str {
        match self {
            UncertaintyKey::Count => "count",
            UncertaintyKey::Cutoff => "cutoff",
            UncertaintyKey::MoBalance => "moBalance",
            UncertaintyKey::Sigma => "sigma",
            UncertaintyKey::Deltas => "deltas",
            UncertaintyKey::Weights => "weights",
            UncertaintyKey::Type => "type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UncertaintyKind {
    Aleatory,
    Epistemic,
}

impl UncertaintyKind {
    pub fn tag(self) -> &'static str {
        match self {
            UncertaintyKind::Aleatory => "Aleatory",
            UncertaintyKind::Epistemic => "Epistemic",
        }
    }

    pub fn required(self) -> &'static [UncertaintyKey] {
        use UncertaintyKey::*;
        match self {
            UncertaintyKind::Aleatory => &[Count, Cutoff, MoBalance, Sigma],
            UncertaintyKind::Epistemic => &[Cutoff, Deltas, Weights],
        }
    }
}

/// Magnitude uncertainty; the `type` tag becomes the element name when rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct MagUncertainty {
    kind: UncertaintyKind,
    attributes: Attributes<UncertaintyKey>,
}

impl MagUncertainty {
    pub fn aleatory() -> UncertaintyBuilder {
        UncertaintyBuilder::new(UncertaintyKind::Aleatory)
    }

    pub fn epistemic() -> UncertaintyBuilder {
        UncertaintyBuilder::new(UncertaintyKind::Epistemic)
    }

    pub fn kind(&self) -> UncertaintyKind {
        self.kind
    }

    pub fn attributes(&self) -> &Attributes<UncertaintyKey> {
        &self.attributes
    }
}

#[derive(Debug, Clone)]
pub struct UncertaintyBuilder {
    kind: UncertaintyKind,
    record: RecordBuilder<UncertaintyKey>,
}

impl UncertaintyBuilder {
    fn new(kind: UncertaintyKind) -> Self {
        Self {
            kind,
            record: RecordBuilder::new(
                format!("{} uncertainty", kind.tag()),
                kind.required(),
                ValidationPolicy::Unchecked,
            ),
        }
    }

    pub fn set(
        &mut self,
        key: UncertaintyKey,
        value: impl Into<Value>,
    ) -> Result<&mut Self, ValidationError> {
        if !self.kind.required().contains(&key) {
            return Err(ValidationError::Invalid {
                owner: self.record.owner().to_string(),
                field: key.name(),
                reason: "is not an attribute of this uncertainty model".to_string(),
            });
        }
        self.record.set(key, value)?;
        Ok(self)
    }

    pub fn count(&mut self, count: i64) -> Result<&mut Self, ValidationError> {
        self.set(UncertaintyKey::Count, count)
    }

    pub fn cutoff(&mut self, cutoff: f64) -> Result<&mut Self, ValidationError> {
        self.set(UncertaintyKey::Cutoff, cutoff)
    }

    pub fn mo_balance(&mut self, mo_balance: bool) -> Result<&mut Self, ValidationError> {
        self.set(UncertaintyKey::MoBalance, mo_balance)
    }

    pub fn sigma(&mut self, sigma: f64) -> Result<&mut Self, ValidationError> {
        self.set(UncertaintyKey::Sigma, sigma)
    }

    pub fn deltas(&mut self, deltas: Vec<f64>) -> Result<&mut Self, ValidationError> {
        self.set(UncertaintyKey::Deltas, deltas)
    }

    pub fn weights(&mut self, weights: Vec<f64>) -> Result<&mut Self, ValidationError> {
        self.set(UncertaintyKey::Weights, weights)
    }

    pub fn build(&mut self) -> Result<MagUncertainty, ValidationError> {
        if self.kind == UncertaintyKind::Epistemic {
            check_same_length(&self.record, UncertaintyKey::Weights, UncertaintyKey::Deltas)?;
        }
        let mut attributes = self.record.build()?;
        attributes.insert(UncertaintyKey::Type, Value::from(self.kind.tag()));
        Ok(MagUncertainty {
            kind: self.kind,
            attributes,
        })
    }
}

fn check_same_length<K: AttributeKey>(
    record: &RecordBuilder<K>,
    field: K,
    other: K,
) -> Result<(), ValidationError> {
    let lengths = (
        record.get(field).and_then(Value::as_floats).map(<[f64]>::len),
        record.get(other).and_then(Value::as_floats).map(<[f64]>::len),
    );
    match lengths {
        (Some(found), Some(expected)) if found != expected => Err(ValidationError::LengthMismatch {
            owner: record.owner().to_string(),
            field: field.name(),
            other: other.name(),
            expected,
            found,
        }),
        _ => Ok(()),
    }
}

/// Named magnitude-scaling relations understood by the downstream model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuptureScaling {
    None,
    NshmFaultCaEllbWc94Area,
    NshmFaultWc94Length,
    NshmPointWc94Length,
    NshmSomerville,
    NshmSubGeomatLength,
    Peer,
}

impl RuptureScaling {
    pub const ALL: [RuptureScaling; 7] = [
        RuptureScaling::None,
        RuptureScaling::NshmFaultCaEllbWc94Area,
        RuptureScaling::NshmFaultWc94Length,
        RuptureScaling::NshmPointWc94Length,
        RuptureScaling::NshmSomerville,
        RuptureScaling::NshmSubGeomatLength,
        RuptureScaling::Peer,
    ];

    pub fn id(self) -> &'static str {
        match self {
            RuptureScaling::None => "NONE",
            RuptureScaling::NshmFaultCaEllbWc94Area => "NSHM_FAULT_CA_ELLB_WC94_AREA",
            RuptureScaling::NshmFaultWc94Length => "NSHM_FAULT_WC94_LENGTH",
            RuptureScaling::NshmPointWc94Length => "NSHM_POINT_WC94_LENGTH",
            RuptureScaling::NshmSomerville => "NSHM_SOMERVILLE",
            RuptureScaling::NshmSubGeomatLength => "NSHM_SUB_GEOMAT_LENGTH",
            RuptureScaling::Peer => "PEER",
        }
    }
}

impl fmt::Display for RuptureScaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for RuptureScaling {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        Self::ALL
            .into_iter()
            .find(|model| model.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown rupture scaling model '{wanted}'"))
    }
}

/// Modeling parameters shared by every source set of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSettings {
    mfds: Vec<Mfd>,
    uncertainties: Vec<MagUncertainty>,
    rupture_scaling: Vec<RuptureScaling>,
}

impl RegionSettings {
    pub fn builder() -> RegionSettingsBuilder {
        RegionSettingsBuilder::default()
    }

    /// Default profile used for western US fault exports.
    pub fn western_us() -> Result<Self, ValidationError> {
        let single = Mfd::single()
            .floats(false)?
            .magnitude(6.5)?
            .rate(0.0)?
            .weight(1.0)?
            .build()?;
        let gr = Mfd::gutenberg_richter()
            .a(0.0)?
            .b(0.8)?
            .d_mag(0.1)?
            .m_max(7.5)?
            .m_min(6.55)?
            .weight(1.0)?
            .build()?;
        let aleatory = MagUncertainty::aleatory()
            .count(11)?
            .cutoff(6.5)?
            .mo_balance(true)?
            .sigma(0.12)?
            .build()?;
        let epistemic = MagUncertainty::epistemic()
            .cutoff(6.5)?
            .deltas(vec![-0.2, 0.0, 0.2])?
            .weights(vec![0.2, 0.6, 0.2])?
            .build()?;

        Self::builder()
            .mfd(single)
            .mfd(gr)
            .uncertainty(aleatory)
            .uncertainty(epistemic)
            .rupture_scaling(RuptureScaling::NshmFaultWc94Length)
            .build()
    }

    pub fn mfds(&self) -> &[Mfd] {
        &self.mfds
    }

    pub fn uncertainties(&self) -> &[MagUncertainty] {
        &self.uncertainties
    }

    pub fn rupture_scaling(&self) -> &[RuptureScaling] {
        &self.rupture_scaling
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegionSettingsBuilder {
    mfds: Vec<Mfd>,
    uncertainties: Vec<MagUncertainty>,
    rupture_scaling: Vec<RuptureScaling>,
    built: bool,
}

impl RegionSettingsBuilder {
    pub fn mfd(&mut self, mfd: Mfd) -> &mut Self {
        self.mfds.push(mfd);
        self
    }

    pub fn uncertainty(&mut self, uncertainty: MagUncertainty) -> &mut Self {
        self.uncertainties.push(uncertainty);
        self
    }

    pub fn rupture_scaling(&mut self, model: RuptureScaling) -> &mut Self {
        self.rupture_scaling.push(model);
        self
    }

    pub fn build(&mut self) -> Result<RegionSettings, ValidationError> {
        if self.built {
            return Err(ValidationError::AlreadyBuilt {
                owner: "region settings".to_string(),
            });
        }

        let mut missing = Vec::new();
        if self.mfds.is_empty() {
            missing.push("mfds");
        }
        if self.uncertainties.is_empty() {
            missing.push("magUncertainty");
        }
        if self.rupture_scaling.is_empty() {
            missing.push("ruptureScaling");
        }
        if !missing.is_empty() {
            return Err(IncompleteRecordError {
                owner: "region settings".to_string(),
                missing,
            }
            .into());
        }

        self.built = true;
        Ok(RegionSettings {
            mfds: std::mem::take(&mut self.mfds),
            uncertainties: std::mem::take(&mut self.uncertainties),
            rupture_scaling: std::mem::take(&mut self.rupture_scaling),
        })
    }
}
