use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    borrow::Borrow,
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};
use thiserror::Error;

/// A conda package name.
///
/// Package names are case insensitive: the name is stored both as it was written and in its
/// normalized lowercase form. Comparison and hashing only use the normalized form.
#[derive(Debug, Clone)]
pub struct PackageName {
    normalized: Option<Box<str>>,
    source: Box<str>,
}

/// An error that is returned when a string is not a valid package name.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum InvalidPackageNameError {
    /// The name is empty
    #[error("a package name cannot be empty")]
    Empty,

    /// The name contains characters that are not allowed
    #[error("'{0}' is not a valid package name. Package names can only contain 0-9, a-z, A-Z, -, _, or .")]
    InvalidCharacters(String),
}

impl PackageName {
    /// Constructs a package name without validating it.
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        let source: String = name.into();
        let normalized = source
            .chars()
            .any(|c| c.is_ascii_uppercase())
            .then(|| source.to_ascii_lowercase().into_boxed_str());
        Self {
            normalized,
            source: source.into_boxed_str(),
        }
    }

    /// The name as it was written.
    pub fn as_source(&self) -> &str {
        &self.source
    }

    /// The lowercase name.
    pub fn as_normalized(&self) -> &str {
        self.normalized.as_deref().unwrap_or(&self.source)
    }

    /// Returns true if this is the name of a virtual package, which start with `__`.
    pub fn is_virtual(&self) -> bool {
        self.source.starts_with("__")
    }
}

impl TryFrom<String> for PackageName {
    type Error = InvalidPackageNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(InvalidPackageNameError::Empty);
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(InvalidPackageNameError::InvalidCharacters(value));
        }
        Ok(Self::new_unchecked(value))
    }
}

impl TryFrom<&str> for PackageName {
    type Error = InvalidPackageNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.to_owned().try_into()
    }
}

impl FromStr for PackageName {
    type Err = InvalidPackageNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.try_into()
    }
}

impl PartialEq for PackageName {
    fn eq(&self, other: &Self) -> bool {
        self.as_normalized() == other.as_normalized()
    }
}

impl Eq for PackageName {}

impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_normalized().hash(state);
    }
}

impl PartialOrd for PackageName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_normalized().cmp(other.as_normalized())
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        self.as_normalized()
    }
}

impl Display for PackageName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_source())
    }
}

impl Serialize for PackageName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_source().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .try_into()
            .map_err(serde::de::Error::custom)
    }
}
