//! Version specifications: predicates over [`Version`]s like `>=1.2,<2|3.*`.

pub(crate) mod parse;

use crate::{ParseStrictness, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    borrow::Cow,
    fmt::{Display, Formatter},
    str::FromStr,
};

pub use parse::ParseVersionSpecError;

/// An operator that compares a version against a bound.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum RangeOperator {
    /// `>`
    Greater,
    /// `>=`
    GreaterEquals,
    /// `<`
    Less,
    /// `<=`
    LessEquals,
}

/// An operator that matches versions by their leading segments.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum StrictRangeOperator {
    /// `1.2.*`, `=1.2`
    StartsWith,
    /// `!=1.2.*`
    NotStartsWith,
    /// `~=1.2`
    Compatible,
}

/// An operator that matches versions by equality.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum EqualityOperator {
    /// `==`
    Equals,
    /// `!=`
    NotEquals,
}

/// Joins multiple version specs.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum LogicalOperator {
    /// All specs must match, written as `,`
    And,
    /// At least one spec must match, written as `|`
    Or,
}

impl LogicalOperator {
    /// The operator with the other meaning.
    pub fn complement(self) -> Self {
        match self {
            LogicalOperator::And => LogicalOperator::Or,
            LogicalOperator::Or => LogicalOperator::And,
        }
    }
}

impl Display for RangeOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeOperator::Greater => write!(f, ">"),
            RangeOperator::GreaterEquals => write!(f, ">="),
            RangeOperator::Less => write!(f, "<"),
            RangeOperator::LessEquals => write!(f, "<="),
        }
    }
}

impl Display for EqualityOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EqualityOperator::Equals => write!(f, "=="),
            EqualityOperator::NotEquals => write!(f, "!="),
        }
    }
}

impl Display for LogicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalOperator::And => write!(f, ","),
            LogicalOperator::Or => write!(f, "|"),
        }
    }
}

/// A predicate over versions.
///
/// ```
/// # use rattler_conda_types::{ParseStrictness, Version, VersionSpec};
/// # use std::str::FromStr;
/// let spec = VersionSpec::from_str(">=1.0,<2.0|3.*", ParseStrictness::Strict).unwrap();
/// assert!(spec.matches(&Version::from_str("1.5").unwrap()));
/// assert!(spec.matches(&Version::from_str("3.1.4").unwrap()));
/// assert!(!spec.matches(&Version::from_str("2.5").unwrap()));
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum VersionSpec {
    /// Matches no version at all
    None,
    /// Matches any version, `*`
    Any,
    /// Compares a version against a bound
    Range(RangeOperator, Version),
    /// Matches versions by their leading segments
    StrictRange(StrictRangeOperator, Version),
    /// Matches versions by (in)equality
    Exact(EqualityOperator, Version),
    /// A combination of specs
    Group(LogicalOperator, Vec<VersionSpec>),
}

impl VersionSpec {
    /// Parses a version spec with the given strictness.
    pub fn from_str(source: &str, strictness: ParseStrictness) -> Result<Self, ParseVersionSpecError> {
        parse::parse_version_spec(source, strictness)
    }

    /// Returns true if the version satisfies this spec.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionSpec::None => false,
            VersionSpec::Any => true,
            VersionSpec::Range(op, limit) => match op {
                RangeOperator::Greater => version > limit,
                RangeOperator::GreaterEquals => version >= limit,
                RangeOperator::Less => version < limit,
                RangeOperator::LessEquals => version <= limit,
            },
            VersionSpec::StrictRange(op, limit) => match op {
                StrictRangeOperator::StartsWith => version.starts_with(limit),
                StrictRangeOperator::NotStartsWith => !version.starts_with(limit),
                StrictRangeOperator::Compatible => version.compatible_with(limit),
            },
            VersionSpec::Exact(op, limit) => match op {
                EqualityOperator::Equals => version == limit,
                EqualityOperator::NotEquals => version != limit,
            },
            VersionSpec::Group(LogicalOperator::And, specs) => {
                specs.iter().all(|spec| spec.matches(version))
            }
            VersionSpec::Group(LogicalOperator::Or, specs) => {
                specs.iter().any(|spec| spec.matches(version))
            }
        }
    }

    /// Returns true if this spec is a plain exact `==` match.
    pub fn is_exact(&self) -> bool {
        matches!(self, VersionSpec::Exact(EqualityOperator::Equals, _))
    }

    fn fmt_with_parent(
        &self,
        f: &mut Formatter<'_>,
        parent: Option<LogicalOperator>,
    ) -> std::fmt::Result {
        match self {
            VersionSpec::None => write!(f, "!=*"),
            VersionSpec::Any => write!(f, "*"),
            VersionSpec::Range(op, version) => write!(f, "{op}{version}"),
            VersionSpec::StrictRange(StrictRangeOperator::StartsWith, version) => {
                write!(f, "{version}.*")
            }
            VersionSpec::StrictRange(StrictRangeOperator::NotStartsWith, version) => {
                write!(f, "!={version}.*")
            }
            VersionSpec::StrictRange(StrictRangeOperator::Compatible, version) => {
                write!(f, "~={version}")
            }
            VersionSpec::Exact(op, version) => write!(f, "{op}{version}"),
            VersionSpec::Group(op, specs) => {
                // `,` binds stronger than `|` so an or-group nested in an and-group needs
                // parentheses.
                let parenthesize =
                    *op == LogicalOperator::Or && parent == Some(LogicalOperator::And);
                if parenthesize {
                    write!(f, "(")?;
                }
                for (idx, spec) in specs.iter().enumerate() {
                    if idx > 0 {
                        write!(f, "{op}")?;
                    }
                    spec.fmt_with_parent(f, Some(*op))?;
                }
                if parenthesize {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for VersionSpec {
    type Err = ParseVersionSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionSpec::from_str(s, ParseStrictness::Lenient)
    }
}

impl Display for VersionSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.fmt_with_parent(f, None)
    }
}

impl Serialize for VersionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let str = Cow::<'de, str>::deserialize(deserializer)?;
        VersionSpec::from_str(&str, ParseStrictness::Lenient).map_err(serde::de::Error::custom)
    }
}
