use std::fmt;

/// Physical quantities whose ranges are enforced when a value is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Dip,
    Rake,
    Depth,
    Width,
}

/// Closed set of attribute names for one record kind.
pub trait AttributeKey: Copy + Eq + fmt::Debug + 'static {
    /// Name used when the attribute is serialized.
    fn name(self) -> &'static str;

    fn quantity(self) -> Option<Quantity> {
        None
    }
}

/// A single attribute value held by a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Floats(Vec<f64>),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Value::Floats(values) => Some(values),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Value::Floats(values)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Renders values the way the downstream hazard codes parse them:
/// whole numbers keep one decimal (`6.0`) and sequences are bracketed
/// and comma separated (`[-0.2, 0.0, 0.2]`).
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => f.write_str(&format_decimal(*value)),
            Value::Floats(values) => {
                f.write_str("[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&format_decimal(*value))?;
                }
                f.write_str("]")
            }
            Value::Text(value) => f.write_str(value),
        }
    }
}

pub fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e7 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Insertion-ordered attribute mapping. Replacing a key keeps its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes<K> {
    entries: Vec<(K, Value)>,
}

impl<K> Default for Attributes<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: AttributeKey> Attributes<K> {
    pub fn insert(&mut self, key: K, value: Value) -> Option<Value> {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: K) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &Value)> + '_ {
        self.entries.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Upper bounds applied to crustal depth and width, in kilometres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrustalLimits {
    pub max_depth: f64,
    pub max_width: f64,
}

impl Default for CrustalLimits {
    fn default() -> Self {
        Self {
            max_depth: 40.0,
            max_width: 60.0,
        }
    }
}

/// Decides whether physical quantities are range checked at `set` time.
///
/// Non-finite numbers are rejected under either policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationPolicy {
    Checked(CrustalLimits),
    Unchecked,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::Checked(CrustalLimits::default())
    }
}

impl ValidationPolicy {
    pub fn checked() -> Self {
        Self::default()
    }

    pub fn check(
        &self,
        owner: &str,
        field: &'static str,
        quantity: Quantity,
        value: f64,
    ) -> Result<(), ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NotFinite {
                owner: owner.to_string(),
                field,
            });
        }

        let limits = match self {
            ValidationPolicy::Checked(limits) => limits,
            ValidationPolicy::Unchecked => return Ok(()),
        };

        let (in_range, range) = match quantity {
            Quantity::Dip => (value > 0.0 && value <= 90.0, "(0, 90]".to_string()),
            Quantity::Rake => (
                (-180.0..=180.0).contains(&value),
                "[-180, 180]".to_string(),
            ),
            Quantity::Depth => (
                (0.0..=limits.max_depth).contains(&value),
                format!("[0, {}]", limits.max_depth),
            ),
            Quantity::Width => (
                value > 0.0 && value <= limits.max_width,
                format!("(0, {}]", limits.max_width),
            ),
        };

        if in_range {
            Ok(())
        } else {
            Err(ValidationError::OutOfRange {
                owner: owner.to_string(),
                field,
                value,
                range,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{owner} is missing required attributes: {}", .missing.join(", "))]
pub struct IncompleteRecordError {
    pub owner: String,
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{owner}: {field} = {value} is outside {range}")]
    OutOfRange {
        owner: String,
        field: &'static str,
        value: f64,
        range: String,
    },
    #[error("{owner}: {field} must be a finite number")]
    NotFinite { owner: String, field: &'static str },
    #[error("{owner}: {field} {reason}")]
    Invalid {
        owner: String,
        field: &'static str,
        reason: String,
    },
    #[error("{owner}: {field} has {found} values but {other} has {expected}")]
    LengthMismatch {
        owner: String,
        field: &'static str,
        other: &'static str,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Incomplete(#[from] IncompleteRecordError),
    #[error("{owner}: builder has already produced a record")]
    AlreadyBuilt { owner: String },
}

impl ValidationError {
    /// Attribute name the error refers to, when there is exactly one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::OutOfRange { field, .. }
            | ValidationError::NotFinite { field, .. }
            | ValidationError::Invalid { field, .. }
            | ValidationError::LengthMismatch { field, .. } => Some(*field),
            ValidationError::Incomplete(_) | ValidationError::AlreadyBuilt { .. } => None,
        }
    }
}

/// Single-use, insertion-ordered attribute accumulator shared by every
/// record kind.
#[derive(Debug, Clone)]
pub struct RecordBuilder<K: AttributeKey> {
    owner: String,
    required: &'static [K],
    policy: ValidationPolicy,
    attributes: Attributes<K>,
    built: bool,
}

impl<K: AttributeKey> RecordBuilder<K> {
    pub fn new(owner: impl Into<String>, required: &'static [K], policy: ValidationPolicy) -> Self {
        Self {
            owner: owner.into(),
            required,
            policy,
            attributes: Attributes::default(),
            built: false,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    pub(crate) fn relabel(&mut self, owner: impl Into<String>) {
        self.owner = owner.into();
    }

    pub fn set(&mut self, key: K, value: impl Into<Value>) -> Result<&mut Self, ValidationError> {
        let value = value.into();
        if let Some(quantity) = key.quantity() {
            let number = value.as_f64().ok_or_else(|| ValidationError::Invalid {
                owner: self.owner.clone(),
                field: key.name(),
                reason: format!("expects a number, found '{value}'"),
            })?;
            self.policy.check(&self.owner, key.name(), quantity, number)?;
        }
        self.attributes.insert(key, value);
        Ok(self)
    }

    pub fn get(&self, key: K) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn missing(&self) -> Vec<&'static str> {
        self.required
            .iter()
            .filter(|key| !self.attributes.contains(**key))
            .map(|key| key.name())
            .collect()
    }

    pub fn build(&mut self) -> Result<Attributes<K>, ValidationError> {
        self.finish(Vec::new())
    }

    /// Completes the record, also reporting required parts held outside
    /// the attribute mapping (a fault trace, for example).
    pub(crate) fn finish(
        &mut self,
        missing_elsewhere: Vec<&'static str>,
    ) -> Result<Attributes<K>, ValidationError> {
        if self.built {
            return Err(ValidationError::AlreadyBuilt {
                owner: self.owner.clone(),
            });
        }

        let mut missing = self.missing();
        missing.extend(missing_elsewhere);
        if !missing.is_empty() {
            return Err(IncompleteRecordError {
                owner: self.owner.clone(),
                missing,
            }
            .into());
        }

        self.built = true;
        Ok(self.attributes.clone())
    }
}
