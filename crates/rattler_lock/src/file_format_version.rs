use std::fmt::{Display, Formatter};

use serde_repr::{Deserialize_repr, Serialize_repr};

/// The different versions of the lock-file format that this crate can read
/// and write.
#[derive(
    Serialize_repr, Deserialize_repr, Eq, PartialEq, Debug, Copy, Clone, PartialOrd, Ord, Default,
)]
#[repr(u16)]
pub enum FileFormatVersion {
    /// Environments carry channels, solve options and per-platform package
    /// selectors. Packages are listed once, tagged with their `kind`.
    #[default]
    V6 = 6,
}

impl FileFormatVersion {
    /// The latest version this crate supports.
    pub const LATEST: Self = FileFormatVersion::V6;

    /// Returns the version for a number that occurs in a document, if this
    /// crate can read it.
    pub fn from_number(version: u64) -> Option<Self> {
        match version {
            6 => Some(FileFormatVersion::V6),
            _ => None,
        }
    }
}

impl Display for FileFormatVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", *self as u16)
    }
}
