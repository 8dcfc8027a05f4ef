//! Conda version strings and their ordering.
//!
//! A version is made up of an optional epoch (`1!`), a sequence of segments separated by `.`,
//! `-` or `_`, and an optional local part (`+local`). Every segment is split further into
//! components at each boundary between digits and letters, so `1.0rc1` is the segments `[1]`
//! and `[0, rc, 1]`.

mod bump;
mod parse;
mod with_source;

use std::{
    borrow::Cow,
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};

use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

pub use bump::{VersionBumpError, VersionBumpType};
pub use parse::{ParseVersionError, ParseVersionErrorKind};
pub use with_source::VersionWithSource;

/// A single component of a version segment.
///
/// The ordering between components is `dev` < identifiers (lexical) < numbers < `post`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    /// A number
    Numeral(u64),

    /// The `post` keyword, ordered after everything else.
    Post,

    /// The `dev` keyword, ordered before everything else.
    Dev,

    /// Any other alphabetic string.
    Iden(Box<str>),
}

impl Component {
    /// Returns the numeric value of this component, if it is a number.
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Component::Numeral(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns true if this is the implicit padding value.
    fn is_zero(&self) -> bool {
        matches!(self, Component::Numeral(0))
    }

    fn rank(&self) -> u8 {
        match self {
            Component::Dev => 0,
            Component::Iden(_) => 1,
            Component::Numeral(_) => 2,
            Component::Post => 3,
        }
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Component::Numeral(a), Component::Numeral(b)) => a.cmp(b),
            (Component::Iden(a), Component::Iden(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Component::Numeral(n) => write!(f, "{n}"),
            Component::Post => write!(f, "post"),
            Component::Dev => write!(f, "dev"),
            Component::Iden(s) => write!(f, "{s}"),
        }
    }
}

/// A segment of a version, e.g. `0rc1` in `1.0rc1`.
#[derive(Debug, Clone)]
pub(crate) struct Segment {
    /// The separator that preceded this segment in the source, `None` for the first segment.
    separator: Option<char>,

    /// True if the segment started with a letter and a `0` was inserted in front of it.
    implicit_zero: bool,

    components: SmallVec<[Component; 3]>,
}

impl Segment {
    fn components(&self) -> &[Component] {
        &self.components
    }

    /// The components with the trailing zeros removed. Two segments that compare equal have the
    /// same significant components.
    fn significant_components(&self) -> &[Component] {
        let len = self
            .components
            .iter()
            .rposition(|c| !c.is_zero())
            .map_or(0, |idx| idx + 1);
        &self.components[..len]
    }
}

/// A conda version.
///
/// Versions are totally ordered. Two versions that differ only in trailing zeros compare equal,
/// `1.0 == 1.0.0`, and hash to the same value.
///
/// ```
/// # use rattler_conda_types::Version;
/// # use std::str::FromStr;
/// let a = Version::from_str("1.0a1").unwrap();
/// let b = Version::from_str("1.0").unwrap();
/// let c = Version::from_str("1.0.post1").unwrap();
/// assert!(a < b && b < c);
/// ```
#[derive(Debug, Clone)]
pub struct Version {
    epoch: u64,
    segments: SmallVec<[Segment; 4]>,
    local: SmallVec<[Segment; 1]>,
}

impl Version {
    /// Constructs a version that consists of the given numeric segments.
    pub fn major_minor(major: u64, minor: u64) -> Self {
        Self::from_numbers([major, minor])
    }

    /// Constructs a version from numeric segments.
    pub fn from_numbers(numbers: impl IntoIterator<Item = u64>) -> Self {
        let segments = numbers
            .into_iter()
            .enumerate()
            .map(|(idx, n)| Segment {
                separator: (idx > 0).then_some('.'),
                implicit_zero: false,
                components: smallvec::smallvec![Component::Numeral(n)],
            })
            .collect();
        Self {
            epoch: 0,
            segments,
            local: SmallVec::new(),
        }
    }

    /// The epoch of the version, `0` when none was specified.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns true if the version has a local part (`+local`).
    pub fn has_local(&self) -> bool {
        !self.local.is_empty()
    }

    /// The number of segments in the version (excluding the local part).
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Iterates over the components of every segment.
    pub fn segments(&self) -> impl DoubleEndedIterator<Item = &[Component]> + ExactSizeIterator {
        self.segments.iter().map(Segment::components)
    }

    /// Iterates over the components of every segment of the local part.
    pub fn local_segments(
        &self,
    ) -> impl DoubleEndedIterator<Item = &[Component]> + ExactSizeIterator {
        self.local.iter().map(Segment::components)
    }

    /// Returns true if any component of the version is the `dev` keyword.
    pub fn is_dev(&self) -> bool {
        self.segments
            .iter()
            .flat_map(Segment::components)
            .any(|c| matches!(c, Component::Dev))
    }

    /// Returns the first two segments as numbers if both start with a number.
    pub fn as_major_minor(&self) -> Option<(u64, u64)> {
        let mut segments = self.segments.iter();
        let major = segments.next()?.components.first()?.as_number()?;
        let minor = segments.next()?.components.first()?.as_number()?;
        Some((major, minor))
    }

    /// Returns the version without its local part.
    pub fn strip_local(&self) -> Cow<'_, Version> {
        if self.local.is_empty() {
            Cow::Borrowed(self)
        } else {
            Cow::Owned(Version {
                epoch: self.epoch,
                segments: self.segments.clone(),
                local: SmallVec::new(),
            })
        }
    }

    /// Returns a copy of this version with the last `n` segments removed, or `None` if that would
    /// leave no segments at all.
    pub fn pop_segments(&self, n: usize) -> Option<Version> {
        if n >= self.segments.len() {
            return None;
        }
        Some(Version {
            epoch: self.epoch,
            segments: self.segments[..self.segments.len() - n].iter().cloned().collect(),
            local: SmallVec::new(),
        })
    }

    /// Returns true if this version starts with `prefix`.
    ///
    /// All segments of the prefix except the last must equal the corresponding segment of this
    /// version. The components of the last prefix segment must be a prefix of the corresponding
    /// components in this version, where a trailing identifier may be a string prefix. This is
    /// what `1.2.*` means in a version spec.
    pub fn starts_with(&self, prefix: &Version) -> bool {
        if self.epoch != prefix.epoch {
            return false;
        }

        let (own, other) = if prefix.local.is_empty() {
            (self.segments.as_slice(), prefix.segments.as_slice())
        } else {
            if cmp_segments(&self.segments, &prefix.segments) != Ordering::Equal {
                return false;
            }
            (self.local.as_slice(), prefix.local.as_slice())
        };

        let Some((last, leading)) = other.split_last() else {
            return true;
        };

        for (idx, segment) in leading.iter().enumerate() {
            let own_components = own.get(idx).map_or(&[][..], Segment::components);
            if cmp_components(own_components, segment.components()) != Ordering::Equal {
                return false;
            }
        }

        let own_last = own.get(leading.len()).map_or(&[][..], Segment::components);
        let Some((last_component, leading_components)) = last.components().split_last() else {
            return true;
        };
        for (idx, component) in leading_components.iter().enumerate() {
            let own_component = own_last.get(idx).unwrap_or(&Component::Numeral(0));
            if own_component != component {
                return false;
            }
        }
        let own_component = own_last
            .get(leading_components.len())
            .unwrap_or(&Component::Numeral(0));
        match (own_component, last_component) {
            (Component::Iden(own), Component::Iden(prefix)) => own.starts_with(prefix.as_ref()),
            (own, prefix) => own == prefix,
        }
    }

    /// Returns true if this version is compatible with `other` in the sense of `~=`: it is at
    /// least `other` and starts with `other` minus its last segment.
    pub fn compatible_with(&self, other: &Version) -> bool {
        if self < other {
            return false;
        }
        match other.pop_segments(1) {
            Some(prefix) => self.starts_with(&prefix),
            None => true,
        }
    }

    fn fmt_segments(f: &mut Formatter<'_>, segments: &[Segment]) -> fmt::Result {
        for segment in segments {
            if let Some(sep) = segment.separator {
                write!(f, "{sep}")?;
            }
            let skip = usize::from(segment.implicit_zero);
            for component in segment.components.iter().skip(skip) {
                write!(f, "{component}")?;
            }
        }
        Ok(())
    }
}

fn cmp_components(a: &[Component], b: &[Component]) -> Ordering {
    const ZERO: Component = Component::Numeral(0);
    for pair in a.iter().zip_longest(b.iter()) {
        let ordering = match pair {
            EitherOrBoth::Both(a, b) => a.cmp(b),
            EitherOrBoth::Left(a) => a.cmp(&ZERO),
            EitherOrBoth::Right(b) => ZERO.cmp(b),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn cmp_segments(a: &[Segment], b: &[Segment]) -> Ordering {
    for pair in a.iter().zip_longest(b.iter()) {
        let ordering = match pair {
            EitherOrBoth::Both(a, b) => cmp_components(a.components(), b.components()),
            EitherOrBoth::Left(a) => cmp_components(a.components(), &[]),
            EitherOrBoth::Right(b) => cmp_components(&[], b.components()),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn hash_segments<H: Hasher>(segments: &[Segment], state: &mut H) {
    let significant = segments
        .iter()
        .rposition(|s| !s.significant_components().is_empty())
        .map_or(0, |idx| idx + 1);
    significant.hash(state);
    for segment in &segments[..significant] {
        segment.significant_components().hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| cmp_segments(&self.segments, &other.segments))
            .then_with(|| cmp_segments(&self.local, &other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        hash_segments(&self.segments, state);
        hash_segments(&self.local, state);
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        Self::fmt_segments(f, &self.segments)?;
        if !self.local.is_empty() {
            write!(f, "+")?;
            Self::fmt_segments(f, &self.local)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse::parse_version(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let str = Cow::<'de, str>::deserialize(deserializer)?;
        Version::from_str(&str).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::Version;
    use rstest::rstest;
    use std::{
        cmp::Ordering,
        collections::hash_map::DefaultHasher,
        hash::{Hash, Hasher},
        str::FromStr,
    };

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    fn hash(version: &Version) -> u64 {
        let mut hasher = DefaultHasher::new();
        version.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_ordering_chain() {
        // Ordered from low to high, taken from the conda documentation.
        let versions = [
            "0.4",
            "0.4.1.rc",
            "0.4.1.RC",
            "0.4.1",
            "0.5a1",
            "0.5b3",
            "0.5C1",
            "0.5z",
            "0.5",
            "0.9.6",
            "0.960923",
            "1.0",
            "1.1dev1",
            "1.1a1",
            "1.1.0dev1",
            "1.1.dev1",
            "1.1.a1",
            "1.1.0rc1",
            "1.1.0",
            "1.1.0post1",
            "1.1post1",
            "1996.07.12",
            "1!0.4.1",
            "1!3.1.1.6",
            "2!0.4.1",
        ];
        let parsed = versions
            .iter()
            .map(|s| Version::from_str(s).unwrap_or_else(|e| panic!("{s}: {e}")))
            .collect::<Vec<_>>();
        for (a, b) in parsed.iter().zip(parsed.iter().skip(1)) {
            assert!(a <= b, "expected {a} <= {b}");
        }
    }

    #[rstest]
    #[case("1.0a1", "1.0b1", Ordering::Less)]
    #[case("1.0b1", "1.0rc1", Ordering::Less)]
    #[case("1.0rc1", "1.0", Ordering::Less)]
    #[case("1.0", "1.0.post1", Ordering::Less)]
    #[case("1.0dev1", "1.0a1", Ordering::Less)]
    #[case("1.0.dev1", "1.0a1", Ordering::Greater)]
    #[case("1.0", "1.0.0", Ordering::Equal)]
    #[case("1.0", "1.0.1", Ordering::Less)]
    #[case("1.2", "1.10", Ordering::Less)]
    #[case("1!1.0", "2.0", Ordering::Greater)]
    #[case("1.0+1", "1.0+2", Ordering::Less)]
    #[case("1.0", "1.0+abc", Ordering::Greater)]
    fn test_compare(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(v(a).cmp(&v(b)), expected);
        assert_eq!(v(b).cmp(&v(a)), expected.reverse());
    }

    #[rstest]
    #[case("1.0", "1.0.0")]
    #[case("1.0.0", "1")]
    #[case("1.0.0+1.0", "1+1")]
    #[case("0!1.2", "1.2")]
    fn test_hash_consistent_with_eq(#[case] a: &str, #[case] b: &str) {
        assert_eq!(v(a), v(b));
        assert_eq!(hash(&v(a)), hash(&v(b)));
    }

    #[rstest]
    #[case("1.0")]
    #[case("1!2.3.4+local.1")]
    #[case("1.0rc1")]
    #[case("2.0.post1.dev3")]
    #[case("1_2-3")]
    #[case("a1")]
    #[case("2023.1.1")]
    fn test_display_roundtrip(#[case] input: &str) {
        let version = v(input);
        let rendered = version.to_string();
        assert_eq!(v(&rendered), version);
        assert_eq!(rendered, input);
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(v("1.0RC1").to_string(), "1.0rc1");
    }

    #[rstest]
    #[case("1.2.3", "1.2", true)]
    #[case("1.2", "1.2", true)]
    #[case("1.20", "1.2", false)]
    #[case("1.2a", "1.2", true)]
    #[case("1.2.3", "1.3", false)]
    #[case("1.2rc1", "1.2r", true)]
    #[case("1!1.2", "1.2", false)]
    #[case("1", "1.0", true)]
    fn test_starts_with(#[case] version: &str, #[case] prefix: &str, #[case] expected: bool) {
        assert_eq!(v(version).starts_with(&v(prefix)), expected);
    }

    #[rstest]
    #[case("1.2.5", "1.2.3", true)]
    #[case("1.3", "1.2.3", false)]
    #[case("1.2.1", "1.2.3", false)]
    #[case("2.9", "2.2", true)]
    #[case("3.0", "2.2", false)]
    fn test_compatible_with(#[case] version: &str, #[case] limit: &str, #[case] expected: bool) {
        assert_eq!(v(version).compatible_with(&v(limit)), expected);
    }

    #[test]
    fn test_queries() {
        let version = v("3!1.2.3dev+4");
        assert_eq!(version.epoch(), 3);
        assert_eq!(version.segment_count(), 3);
        assert!(version.has_local());
        assert!(version.is_dev());
        assert_eq!(version.as_major_minor(), Some((1, 2)));
        assert_eq!(version.strip_local().to_string(), "3!1.2.3dev");
        assert_eq!(version.pop_segments(2).unwrap().to_string(), "3!1");
        assert!(version.pop_segments(3).is_none());
    }
}
