//! Package versions, relation conditions, and the version intervals they
//! imply. Interval arithmetic is what the lookup index and the best-match
//! queries delegate to.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::GraphError;

/// A package version string.
///
/// Ordering is rpm-style: the string splits into alternating numeric and
/// alphabetic segments, numeric segments compare as integers, alphabetic
/// segments lexically, and a numeric segment always beats an alphabetic one.
/// Ties on the segment level fall back to plain string order so that the
/// total order stays consistent with equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Version {
    fn from(version: &str) -> Self {
        Self(version.to_owned())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_versions(&self.0, &other.0).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

enum Segment<'a> {
    Number(&'a str),
    Alpha(&'a str),
}

fn segments(version: &str) -> Vec<Segment<'_>> {
    let mut result = Vec::new();
    let mut rest = version;
    while let Some(start) = rest.find(|c: char| c.is_ascii_alphanumeric()) {
        rest = &rest[start..];
        let numeric = rest.starts_with(|c: char| c.is_ascii_digit());
        let end = rest
            .find(|c: char| {
                if numeric {
                    !c.is_ascii_digit()
                } else {
                    !c.is_ascii_alphabetic()
                }
            })
            .unwrap_or(rest.len());
        let (segment, tail) = rest.split_at(end);
        result.push(if numeric {
            Segment::Number(segment)
        } else {
            Segment::Alpha(segment)
        });
        rest = tail;
    }
    result
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);
    for pair in left.iter().zip(right.iter()) {
        let ordering = match pair {
            (Segment::Number(x), Segment::Number(y)) => compare_numeric(x, y),
            (Segment::Alpha(x), Segment::Alpha(y)) => x.cmp(y),
            (Segment::Number(_), Segment::Alpha(_)) => Ordering::Greater,
            (Segment::Alpha(_), Segment::Number(_)) => Ordering::Less,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}

/// Relation between a dependency and a version, e.g. `>= 1.2`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum VersionCondition {
    #[default]
    #[strum(serialize = "")]
    Any,
    #[strum(serialize = "=")]
    Equal,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterOrEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessOrEqual,
}

/// A package name with up to two version conditions, as found in a
/// provides/requires relation. The secondary condition narrows the primary
/// one (`>= 1, < 2`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedPackage {
    pub name: String,
    pub condition: VersionCondition,
    pub version: Version,
    pub secondary_condition: VersionCondition,
    pub secondary_version: Version,
}

impl VersionedPackage {
    /// A package relation without any version constraint.
    pub fn unconstrained(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A `name = version` relation.
    pub fn exact(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: VersionCondition::Equal,
            version: Version::new(version),
            ..Self::default()
        }
    }

    /// A relation with both a primary and a secondary condition.
    pub fn ranged(
        name: impl Into<String>,
        condition: VersionCondition,
        version: impl Into<String>,
        secondary_condition: VersionCondition,
        secondary_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            condition,
            version: Version::new(version),
            secondary_condition,
            secondary_version: Version::new(secondary_version),
        }
    }

    /// Implicit provides are synthesized rather than declared: file provides
    /// (`/usr/bin/sh`) and parameterized provides (`libfoo(x86-64)`).
    pub fn is_implicit(&self) -> bool {
        self.name.starts_with('/') || self.name.contains('(')
    }

    /// The version interval implied by both conditions.
    pub fn interval(&self) -> Result<VersionInterval, GraphError> {
        let primary = VersionInterval::from_condition(self.condition, &self.version);
        let secondary =
            VersionInterval::from_condition(self.secondary_condition, &self.secondary_version);
        primary
            .intersect(&secondary)
            .ok_or_else(|| GraphError::InvalidInterval {
                name: self.name.clone(),
                reason: "conditions do not overlap".to_owned(),
            })
    }
}

impl fmt::Display for VersionedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.condition, self.version)
    }
}

/// A contiguous range of versions. `None` bounds are unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInterval {
    pub lower_bound: Option<Version>,
    pub upper_bound: Option<Version>,
    pub lower_inclusive: bool,
    pub upper_inclusive: bool,
}

impl VersionInterval {
    fn from_condition(condition: VersionCondition, version: &Version) -> Self {
        let (lower_bound, upper_bound, lower_inclusive, upper_inclusive) = match condition {
            VersionCondition::Any => (None, None, true, true),
            VersionCondition::Equal => (Some(version.clone()), Some(version.clone()), true, true),
            VersionCondition::Greater => (Some(version.clone()), None, false, true),
            VersionCondition::GreaterOrEqual => (Some(version.clone()), None, true, true),
            VersionCondition::Less => (None, Some(version.clone()), true, false),
            VersionCondition::LessOrEqual => (None, Some(version.clone()), true, true),
        };
        Self {
            lower_bound,
            upper_bound,
            lower_inclusive,
            upper_inclusive,
        }
    }

    /// The overlap of two intervals, or `None` when they do not intersect.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let (lower_bound, lower_inclusive) = if compare_lower(
            (&self.lower_bound, self.lower_inclusive),
            (&other.lower_bound, other.lower_inclusive),
        ) == Ordering::Less
        {
            (other.lower_bound.clone(), other.lower_inclusive)
        } else {
            (self.lower_bound.clone(), self.lower_inclusive)
        };
        let (upper_bound, upper_inclusive) = if compare_upper(
            (&self.upper_bound, self.upper_inclusive),
            (&other.upper_bound, other.upper_inclusive),
        ) == Ordering::Greater
        {
            (other.upper_bound.clone(), other.upper_inclusive)
        } else {
            (self.upper_bound.clone(), self.upper_inclusive)
        };
        if let (Some(lower), Some(upper)) = (&lower_bound, &upper_bound) {
            match lower.cmp(upper) {
                Ordering::Greater => return None,
                Ordering::Equal if !(lower_inclusive && upper_inclusive) => return None,
                _ => {}
            }
        }
        Some(Self {
            // unbounded sides are always inclusive so that equal intervals
            // compare equal structurally
            lower_inclusive: lower_bound.is_none() || lower_inclusive,
            upper_inclusive: upper_bound.is_none() || upper_inclusive,
            lower_bound,
            upper_bound,
        })
    }

    /// Whether the two intervals share at least one version.
    pub fn satisfies(&self, other: &Self) -> bool {
        self.intersect(other).is_some()
    }

    /// Total order on intervals: lower bound first, then upper bound.
    pub fn compare(&self, other: &Self) -> Ordering {
        compare_lower(
            (&self.lower_bound, self.lower_inclusive),
            (&other.lower_bound, other.lower_inclusive),
        )
        .then_with(|| {
            compare_upper(
                (&self.upper_bound, self.upper_inclusive),
                (&other.upper_bound, other.upper_inclusive),
            )
        })
    }

    /// True for intervals of the shape `= v` or `>= v` or unbounded, the
    /// only shapes a local provides entry can have.
    pub fn is_single_version_or_open(&self) -> bool {
        self.upper_bound.is_none() || self.lower_bound == self.upper_bound
    }
}

fn compare_lower(a: (&Option<Version>, bool), b: (&Option<Version>, bool)) -> Ordering {
    match (a.0, b.0) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(y).then(match (a.1, b.1) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        }),
    }
}

fn compare_upper(a: (&Option<Version>, bool), b: (&Option<Version>, bool)) -> Ordering {
    match (a.0, b.0) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x.cmp(y).then(match (a.1, b.1) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => Ordering::Equal,
        }),
    }
}
