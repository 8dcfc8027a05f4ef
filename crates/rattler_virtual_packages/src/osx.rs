//! Provides an interface to detect the version of macOS.

use once_cell::sync::OnceCell;
use rattler_conda_types::{GenericVirtualPackage, PackageName, ParseVersionError, Version};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// OSX virtual package description
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Osx {
    /// The OSX version
    pub version: Version,
}

impl Osx {
    /// Returns the macOS version of the host, detected once per process. Returns `None` when not
    /// running on macOS or when the version cannot be read.
    pub fn current() -> Option<Self> {
        static CURRENT: OnceCell<Option<Version>> = OnceCell::new();
        CURRENT
            .get_or_init(detect_osx_version)
            .clone()
            .map(|version| Self { version })
    }
}

impl From<Osx> for GenericVirtualPackage {
    fn from(osx: Osx) -> Self {
        GenericVirtualPackage {
            name: PackageName::new_unchecked("__osx"),
            version: osx.version,
            build_string: "0".into(),
        }
    }
}

impl From<Osx> for crate::VirtualPackage {
    fn from(osx: Osx) -> Self {
        crate::VirtualPackage::Osx(osx)
    }
}

/// An error that occurs when a string is not a macOS version.
#[derive(Debug, thiserror::Error)]
pub enum ParseOsxVersionError {
    /// macOS versions consist of at most three numbers.
    #[error("'{0}' is not a macOS version, expected something like 13.4 or 10.15.7")]
    InvalidFormat(String),

    /// The version could not be parsed
    #[error(transparent)]
    InvalidVersion(#[from] ParseVersionError),
}

/// Parses a macOS version like `13.4` or `10.15.7`.
pub fn parse_version(value: &str) -> Result<Version, ParseOsxVersionError> {
    let value = value.trim();
    let parts: Vec<&str> = value.split('.').collect();
    let is_numeric = |part: &&str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
    if parts.len() > 3 || !parts.iter().all(is_numeric) {
        return Err(ParseOsxVersionError::InvalidFormat(value.to_owned()));
    }
    Ok(Version::from_str(value)?)
}

#[cfg(target_os = "macos")]
fn detect_osx_version() -> Option<Version> {
    const SYSTEM_VERSION: &str = "/System/Library/CoreServices/SystemVersion.plist";

    let plist = match plist::Value::from_file(SYSTEM_VERSION) {
        Ok(plist) => plist,
        Err(err) => {
            tracing::warn!("failed to read {SYSTEM_VERSION}: {err}");
            return None;
        }
    };
    let product_version = plist
        .as_dictionary()
        .and_then(|dict| dict.get("ProductVersion"))
        .and_then(plist::Value::as_string)?;
    match parse_version(product_version) {
        Ok(version) => Some(version),
        Err(err) => {
            tracing::warn!("unexpected macOS product version: {err}");
            None
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn detect_osx_version() -> Option<Version> {
    None
}

#[cfg(test)]
mod test {
    use super::parse_version;
    use rstest::rstest;

    #[rstest]
    #[case("13.4", true)]
    #[case("10.15.7", true)]
    #[case("14", true)]
    #[case("11.0.1.2", false)]
    #[case("13.x", false)]
    #[case("", false)]
    fn test_parse_version(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(parse_version(value).is_ok(), valid, "{value}");
    }

    #[test]
    fn doesnt_crash() {
        let version = super::Osx::current();
        println!("MacOS version {version:?}");
    }

    #[test]
    #[cfg(target_os = "macos")]
    fn detects_a_version_on_macos() {
        assert!(super::Osx::current().is_some());
    }
}
