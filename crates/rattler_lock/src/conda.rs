use std::cmp::Ordering;

use rattler_conda_types::{
    MatchSpec, Matches, NamelessMatchSpec, PackageArchiveRef, PackageRecord, RepoDataRecord,
};
use url::Url;

use crate::{hash::compute_record_hash, PackageHashes, UrlOrPath};

/// A locked conda package. This is either a binary package that was taken
/// from a channel or a package that is built from source.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[allow(clippy::large_enum_variant)]
pub enum CondaPackageData {
    /// A binary package. A binary package is identified by looking at the
    /// location or filename of the package file and checking if it ends with
    /// a known archive extension.
    Binary(CondaBinaryData),

    /// A source package.
    Source(CondaSourceData),
}

/// A record of a binary conda package that is stored in the lock-file.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CondaBinaryData {
    /// The package record.
    pub package_record: PackageRecord,

    /// The location of the package.
    pub location: UrlOrPath,

    /// The filename of the package.
    pub file_name: String,

    /// The channel of the package.
    pub channel: Option<String>,
}

/// A record of a conda package that still requires building.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CondaSourceData {
    /// The package record.
    pub package_record: PackageRecord,

    /// The location of the source of the package.
    pub location: UrlOrPath,
}

impl CondaPackageData {
    /// Returns the location of the package.
    pub fn location(&self) -> &UrlOrPath {
        match self {
            Self::Binary(data) => &data.location,
            Self::Source(data) => &data.location,
        }
    }

    /// Returns the package record of the package.
    pub fn record(&self) -> &PackageRecord {
        match self {
            CondaPackageData::Binary(data) => &data.package_record,
            CondaPackageData::Source(data) => &data.package_record,
        }
    }

    /// Returns the binary representation of the package if it is a binary
    /// package.
    pub fn as_binary(&self) -> Option<&CondaBinaryData> {
        match self {
            Self::Binary(data) => Some(data),
            Self::Source(_) => None,
        }
    }

    /// Returns the source representation of the package if it is a source
    /// package.
    pub fn as_source(&self) -> Option<&CondaSourceData> {
        match self {
            Self::Binary(_) => None,
            Self::Source(data) => Some(data),
        }
    }

    /// Returns the hashes stored for this package.
    pub fn hashes(&self) -> Option<PackageHashes> {
        let record = self.record();
        PackageHashes::from_hashes(record.md5, record.sha256)
    }
}

impl CondaBinaryData {
    /// Returns a view of the package archive that specs with a channel or
    /// file name can be matched against.
    pub fn as_archive(&self) -> PackageArchiveRef<'_> {
        PackageArchiveRef {
            record: &self.package_record,
            file_name: &self.file_name,
            url: self.location.as_url(),
            channel: self.channel.as_deref(),
        }
    }
}

impl Matches<CondaPackageData> for MatchSpec {
    fn matches(&self, other: &CondaPackageData) -> bool {
        match other {
            CondaPackageData::Binary(binary) => self.matches(&binary.as_archive()),
            CondaPackageData::Source(source) => self.matches(&source.package_record),
        }
    }
}

impl Matches<CondaPackageData> for NamelessMatchSpec {
    fn matches(&self, other: &CondaPackageData) -> bool {
        match other {
            CondaPackageData::Binary(binary) => self.matches(&binary.as_archive()),
            CondaPackageData::Source(source) => self.matches(&source.package_record),
        }
    }
}

impl AsRef<PackageRecord> for CondaPackageData {
    fn as_ref(&self) -> &PackageRecord {
        self.record()
    }
}

impl PartialOrd for CondaPackageData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CondaPackageData {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.record();
        let b = other.record();
        a.name
            .cmp(&b.name)
            .then_with(|| a.version.cmp(&b.version))
            .then_with(|| a.build.cmp(&b.build))
            .then_with(|| a.subdir.cmp(&b.subdir))
            .then_with(|| self.location().cmp(other.location()))
            .then_with(|| self.as_binary().is_some().cmp(&other.as_binary().is_some()))
    }
}

impl From<RepoDataRecord> for CondaBinaryData {
    fn from(value: RepoDataRecord) -> Self {
        let mut package_record = value.package_record;
        if package_record.md5.is_none() && package_record.sha256.is_none() {
            package_record.sha256 = Some(compute_record_hash(&package_record));
        }
        Self {
            package_record,
            location: UrlOrPath::Url(value.url),
            file_name: value.file_name,
            channel: value.channel,
        }
    }
}

impl From<RepoDataRecord> for CondaPackageData {
    fn from(value: RepoDataRecord) -> Self {
        Self::Binary(value.into())
    }
}

impl From<CondaBinaryData> for CondaPackageData {
    fn from(value: CondaBinaryData) -> Self {
        Self::Binary(value)
    }
}

impl From<CondaSourceData> for CondaPackageData {
    fn from(value: CondaSourceData) -> Self {
        Self::Source(value)
    }
}

/// An error that can occur when converting a locked package back into a
/// [`RepoDataRecord`].
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// Only binary packages that live at a URL correspond to repodata.
    #[error("'{0}' is not a URL")]
    LocationToUrlConversionError(UrlOrPath),
}

impl TryFrom<&CondaBinaryData> for RepoDataRecord {
    type Error = ConversionError;

    fn try_from(value: &CondaBinaryData) -> Result<Self, Self::Error> {
        Self::try_from(value.clone())
    }
}

impl TryFrom<CondaBinaryData> for RepoDataRecord {
    type Error = ConversionError;

    fn try_from(value: CondaBinaryData) -> Result<Self, Self::Error> {
        let url: Url = match value.location {
            UrlOrPath::Url(url) => url,
            location @ UrlOrPath::Path(_) => {
                return Err(ConversionError::LocationToUrlConversionError(location))
            }
        };
        Ok(RepoDataRecord {
            package_record: value.package_record,
            file_name: value.file_name,
            url,
            channel: value.channel,
        })
    }
}

#[cfg(test)]
mod test {
    use super::{CondaBinaryData, CondaPackageData, ConversionError};
    use crate::UrlOrPath;
    use assert_matches::assert_matches;
    use rattler_conda_types::{PackageRecord, RepoDataRecord, Version};

    fn record(md5: bool) -> RepoDataRecord {
        let mut package_record = PackageRecord::new(
            "foo".parse().unwrap(),
            "1.0".parse::<Version>().unwrap(),
            "h0_0".to_owned(),
        );
        package_record.subdir = "linux-64".to_owned();
        if md5 {
            package_record.md5 =
                rattler_digest::parse_digest_from_hex::<rattler_digest::Md5>(
                    "4eccaeba205f0aed9ac3a9ea58568ca3",
                );
        }
        RepoDataRecord {
            package_record,
            file_name: "foo-1.0-h0_0.conda".to_owned(),
            url: "https://example.com/linux-64/foo-1.0-h0_0.conda".parse().unwrap(),
            channel: Some("https://example.com/".to_owned()),
        }
    }

    #[test]
    fn test_existing_hashes_are_kept() {
        let data = CondaPackageData::from(record(true));
        let hashes = data.hashes().unwrap();
        assert!(hashes.md5().is_some());
        assert!(hashes.sha256().is_none());
    }

    #[test]
    fn test_missing_hashes_are_computed() {
        let data = CondaPackageData::from(record(false));
        assert!(data.hashes().unwrap().sha256().is_some());

        // Computing the hash is deterministic.
        assert_eq!(data, CondaPackageData::from(record(false)));
    }

    #[test]
    fn test_repodata_roundtrip() {
        let original = record(true);
        let binary = CondaBinaryData::from(original.clone());
        assert_eq!(RepoDataRecord::try_from(&binary).unwrap(), original);

        let local = CondaBinaryData {
            location: UrlOrPath::Path("../foo-1.0-h0_0.conda".to_owned()),
            ..binary
        };
        assert_matches!(
            RepoDataRecord::try_from(local),
            Err(ConversionError::LocationToUrlConversionError(_))
        );
    }
}
