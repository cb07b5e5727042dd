//! Parameter combinations and the axis values they are built from.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// A single value on a sweep axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    /// Integral values such as problem sizes or worker counts.
    Int(i64),
    /// Fractional values such as sparsity ratios.
    Float(f64),
}

impl AxisValue {
    /// Returns the value widened to `f64` for threshold comparisons.
    pub fn as_f64(&self) -> f64 {
        match self {
            AxisValue::Int(value) => *value as f64,
            AxisValue::Float(value) => *value,
        }
    }

    /// Canonical rendering used for equality keys and table cells.
    ///
    /// Floats use the shortest representation that parses back to the same
    /// bits.
    pub fn canonical(&self) -> String {
        match self {
            AxisValue::Int(value) => value.to_string(),
            AxisValue::Float(value) => format!("{value}"),
        }
    }

    /// Renders the value for a command line, using `precision` decimals for
    /// floats when provided.
    pub fn render(&self, precision: Option<usize>) -> String {
        match (self, precision) {
            (AxisValue::Float(value), Some(digits)) => format!("{value:.digits$}"),
            _ => self.canonical(),
        }
    }
}

impl Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<i64> for AxisValue {
    fn from(value: i64) -> Self {
        AxisValue::Int(value)
    }
}

impl From<f64> for AxisValue {
    fn from(value: f64) -> Self {
        AxisValue::Float(value)
    }
}

/// Order-independent identity of a combination: axis name to canonical value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombinationKey(BTreeMap<String, String>);

impl CombinationKey {
    /// Builds a key from `(axis, value)` pairs in any order.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a AxisValue)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.canonical()))
                .collect(),
        )
    }

    /// Returns the canonical value recorded for an axis.
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.0.get(axis).map(String::as_str)
    }
}

/// One point of the parameter sweep plus the number of repeats assigned to it.
///
/// Axis values keep their declaration order; equality between combinations is
/// decided through [`Combination::key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combination {
    axes: Vec<(String, AxisValue)>,
    repeats: u32,
}

impl Combination {
    /// Creates a combination from ordered axis values.
    pub fn new(axes: Vec<(String, AxisValue)>, repeats: u32) -> Self {
        Self { axes, repeats }
    }

    /// Ordered `(axis, value)` pairs.
    pub fn axes(&self) -> &[(String, AxisValue)] {
        &self.axes
    }

    /// Number of repeats assigned by the enumerator.
    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    /// Looks up the value of a named axis.
    pub fn get(&self, axis: &str) -> Option<&AxisValue> {
        self.axes
            .iter()
            .find(|(name, _)| name == axis)
            .map(|(_, value)| value)
    }

    /// Order-independent identity.
    pub fn key(&self) -> CombinationKey {
        CombinationKey::from_pairs(self.axes.iter().map(|(name, value)| (name.as_str(), value)))
    }

    /// Key restricted to a subset of axes, used to group combinations.
    pub fn sub_key(&self, axes: &[String]) -> CombinationKey {
        CombinationKey::from_pairs(
            self.axes
                .iter()
                .filter(|(name, _)| axes.contains(name))
                .map(|(name, value)| (name.as_str(), value)),
        )
    }

    /// Human readable `axis=value` listing.
    pub fn label(&self) -> String {
        self.axes
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Filesystem friendly identifier.
    pub fn slug(&self) -> String {
        self.axes
            .iter()
            .map(|(name, value)| {
                let rendered: String = value
                    .canonical()
                    .chars()
                    .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
                    .collect();
                format!("{name}-{rendered}")
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}
