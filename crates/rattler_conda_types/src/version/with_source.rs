use super::{ParseVersionError, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    borrow::Cow,
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    ops::Deref,
    str::FromStr,
};

/// Holds a [`Version`] together with the string it was parsed from.
///
/// Different strings can parse to the same version (`1.0` and `1.0.0`, `1.01` and `1.1`). When
/// a version is read from repodata or a lock-file it should be written back exactly as it was
/// read, which is what this type is for. Comparisons and hashing only look at the parsed version.
#[derive(Debug, Clone)]
pub struct VersionWithSource {
    version: Version,
    source: Option<Box<str>>,
}

impl VersionWithSource {
    /// Constructs a new instance from a version and its source representation.
    pub fn new(version: Version, source: impl ToString) -> Self {
        Self {
            version,
            source: Some(source.to_string().into_boxed_str()),
        }
    }

    /// Returns the parsed version
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Returns the string representation, the original source if it is available.
    pub fn as_str(&self) -> Cow<'_, str> {
        match &self.source {
            Some(source) => Cow::Borrowed(source.as_ref()),
            None => Cow::Owned(self.version.to_string()),
        }
    }

    /// Converts this instance back into a [`Version`].
    pub fn into_version(self) -> Version {
        self.version
    }
}

impl PartialEq for VersionWithSource {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for VersionWithSource {}

impl Hash for VersionWithSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
    }
}

impl PartialOrd for VersionWithSource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionWithSource {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version)
    }
}

impl PartialEq<Version> for VersionWithSource {
    fn eq(&self, other: &Version) -> bool {
        &self.version == other
    }
}

impl Deref for VersionWithSource {
    type Target = Version;

    fn deref(&self) -> &Self::Target {
        &self.version
    }
}

impl AsRef<Version> for VersionWithSource {
    fn as_ref(&self) -> &Version {
        &self.version
    }
}

impl From<Version> for VersionWithSource {
    fn from(version: Version) -> Self {
        Self {
            version,
            source: None,
        }
    }
}

impl From<VersionWithSource> for Version {
    fn from(version: VersionWithSource) -> Self {
        version.version
    }
}

impl FromStr for VersionWithSource {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            version: Version::from_str(s)?,
            source: Some(s.to_owned().into_boxed_str()),
        })
    }
}

impl Display for VersionWithSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{source}"),
            None => write!(f, "{}", &self.version),
        }
    }
}

impl Serialize for VersionWithSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_str().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VersionWithSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        let version = Version::from_str(&source).map_err(serde::de::Error::custom)?;
        Ok(Self {
            version,
            source: Some(source.into_boxed_str()),
        })
    }
}

#[cfg(test)]
mod test {
    use super::VersionWithSource;
    use crate::Version;
    use std::str::FromStr;

    #[test]
    fn test_source_is_preserved() {
        let a = VersionWithSource::from_str("1.01").unwrap();
        let b = VersionWithSource::from_str("1.1.0").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "1.01");
        assert_eq!(b.to_string(), "1.1.0");
        assert_eq!(a.version().to_string(), "1.1");

        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"1.01\"");
        let back: VersionWithSource = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), "1.01");
    }

    #[test]
    fn test_from_version() {
        let version = VersionWithSource::from(Version::from_str("2.0").unwrap());
        assert_eq!(version.as_str(), "2.0");
    }
}
