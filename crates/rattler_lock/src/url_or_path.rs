use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use url::Url;

/// Represents either a URL or a path.
///
/// Paths are stored with forward slashes so that a lock-file renders the same
/// on every platform. Relative paths are relative to the directory that
/// contains the lock-file.
#[derive(Debug, Clone, Eq, SerializeDisplay, DeserializeFromStr)]
pub enum UrlOrPath {
    /// A URL.
    Url(Url),

    /// A local path.
    Path(String),
}

impl PartialEq for UrlOrPath {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (UrlOrPath::Url(a), UrlOrPath::Url(b)) => a == b,
            (UrlOrPath::Path(a), UrlOrPath::Path(b)) => a == b,
            _ => false,
        }
    }
}

impl Hash for UrlOrPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            UrlOrPath::Url(url) => url.as_str().hash(state),
            UrlOrPath::Path(path) => path.hash(state),
        }
    }
}

impl PartialOrd for UrlOrPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UrlOrPath {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (UrlOrPath::Url(a), UrlOrPath::Url(b)) => a.as_str().cmp(b.as_str()),
            (UrlOrPath::Url(_), UrlOrPath::Path(_)) => Ordering::Less,
            (UrlOrPath::Path(_), UrlOrPath::Url(_)) => Ordering::Greater,
            (UrlOrPath::Path(a), UrlOrPath::Path(b)) => a.cmp(b),
        }
    }
}

impl From<Url> for UrlOrPath {
    fn from(value: Url) -> Self {
        UrlOrPath::Url(value)
    }
}

impl Display for UrlOrPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlOrPath::Url(url) => write!(f, "{url}"),
            UrlOrPath::Path(path) => write!(f, "{path}"),
        }
    }
}

impl UrlOrPath {
    /// Returns the URL if this is a URL.
    pub fn as_url(&self) -> Option<&Url> {
        match self {
            UrlOrPath::Url(url) => Some(url),
            UrlOrPath::Path(_) => None,
        }
    }

    /// Returns the path if this is a path.
    pub fn as_path(&self) -> Option<&str> {
        match self {
            UrlOrPath::Url(_) => None,
            UrlOrPath::Path(path) => Some(path),
        }
    }

    /// Returns the last segment of the location, which for package archives
    /// is the file name.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            UrlOrPath::Url(url) => url.path_segments().and_then(Iterator::last),
            UrlOrPath::Path(path) => path.rsplit('/').next(),
        }
        .filter(|name| !name.is_empty())
    }
}

/// An error that can occur when parsing a [`UrlOrPath`] from a string.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum PathOrUrlError {
    /// The string is empty.
    #[error("a location cannot be empty")]
    Empty,

    /// The string looks like a URL but could not be parsed.
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
}

/// Returns true if the string starts with a URL scheme. A single letter
/// followed by a colon is a windows drive letter, not a scheme.
fn has_scheme(s: &str) -> bool {
    match s.split_once("://") {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

impl FromStr for UrlOrPath {
    type Err = PathOrUrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathOrUrlError::Empty);
        }
        if has_scheme(s) {
            return Ok(UrlOrPath::Url(Url::parse(s)?));
        }
        Ok(UrlOrPath::Path(s.replace('\\', "/")))
    }
}
