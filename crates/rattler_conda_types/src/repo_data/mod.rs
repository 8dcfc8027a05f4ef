//! Defines [`RepoData`]. `RepoData` stores information of all packages present in a subdirectory
//! of a channel. It provides indexing functionality.

mod patches;
mod topological_sort;

use crate::{
    build_spec::BuildNumber, utils::serde::Timestamp, Channel, PackageName, Platform,
    VersionWithSource,
};
use chrono::{DateTime, Utc};
use fs_err as fs;
use indexmap::{IndexMap, IndexSet};
use rattler_digest::{serde::SerializableHash, Md5, Md5Hash, Sha256, Sha256Hash};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::{
    fmt::{Display, Formatter},
    path::Path,
};
use url::Url;

pub use patches::{PackageRecordPatch, PatchInstructions};

/// [`RepoData`] is an index of package binaries available on in a subdirectory of a Conda
/// channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoData {
    /// The channel information contained in the repodata.json file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ChannelInfo>,

    /// The tar.bz2 packages contained in the repodata.json file
    #[serde(default)]
    pub packages: IndexMap<String, PackageRecord>,

    /// The conda packages contained in the repodata.json file (under a different key for
    /// backwards compatibility with previous conda versions)
    #[serde(default, rename = "packages.conda")]
    pub conda_packages: IndexMap<String, PackageRecord>,

    /// removed packages (files are still accessible, but they are not installable like regular
    /// packages)
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub removed: IndexSet<String>,

    /// The version of the repodata format
    #[serde(rename = "repodata_version", skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

/// Information about subdirectory of channel in the Conda [`RepoData`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// The channel's subdirectory
    pub subdir: String,

    /// The `base_url` for all package urls. Can be an absolute or relative url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// The kind of a `noarch` package.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoArchKind {
    /// A package that contains no architecture specific files.
    Generic,
    /// A python package that is compiled on installation.
    Python,
}

/// A single record in the Conda repodata. A single record refers to a single binary distribution
/// of a package on a Conda channel.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PackageRecord {
    /// The name of the package
    pub name: PackageName,

    /// The version of the package
    pub version: VersionWithSource,

    /// The build string of the package
    pub build: String,

    /// The build number of the package
    #[serde(default)]
    pub build_number: BuildNumber,

    /// The subdirectory where the package can be found
    #[serde(default)]
    pub subdir: String,

    /// Optionally a MD5 hash of the package archive
    #[serde_as(as = "Option<SerializableHash::<Md5>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<Md5Hash>,

    /// Optionally a SHA256 hash of the package archive
    #[serde_as(as = "Option<SerializableHash::<Sha256>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Sha256Hash>,

    /// Optionally the size of the package archive in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Optionally the architecture the package supports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    /// Optionally the platform the package supports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Specification of packages this package depends on
    #[serde(default)]
    pub depends: Vec<String>,

    /// Additional constraints on packages. `constrains` are different from `depends` in that
    /// packages specified in `depends` must be installed next to this package, whereas packages
    /// specified in `constrains` are not required to be installed, but if they are installed
    /// they must follow these constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constrains: Vec<String>,

    /// Track features are nowadays only used to downweigh packages (ie. give them less priority).
    #[serde_as(as = "crate::utils::serde::Features")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub track_features: Vec<String>,

    /// Features are a deprecated way to specify different feature sets for the conda solver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<String>,

    /// If this package is independent of architecture this field specifies in what way.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::utils::serde::deserialize_noarch"
    )]
    pub noarch: Option<NoArchKind>,

    /// The specific license of the package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// The license family
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_family: Option<String>,

    /// The date this entry was created.
    #[serde_as(as = "Option<Timestamp>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PackageRecord {
    /// A simple helper method that constructs a `PackageRecord` with the bare minimum values.
    pub fn new(name: PackageName, version: impl Into<VersionWithSource>, build: String) -> Self {
        Self {
            name,
            version: version.into(),
            build,
            build_number: 0,
            subdir: Platform::current().to_string(),
            md5: None,
            sha256: None,
            size: None,
            arch: None,
            platform: None,
            depends: vec![],
            constrains: vec![],
            track_features: vec![],
            features: None,
            noarch: None,
            license: None,
            license_family: None,
            timestamp: None,
        }
    }

    /// Sorts the records topologically: every record is placed after the records it depends on.
    ///
    /// The order is deterministic. Cycles are broken by picking the alphabetically first package
    /// of the cycle.
    pub fn sort_topologically<T: AsRef<PackageRecord>>(records: Vec<T>) -> Vec<T> {
        topological_sort::sort_topologically(records)
    }
}

impl Display for PackageRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.build.is_empty() {
            write!(f, "{} {}", self.name.as_normalized(), self.version)
        } else {
            write!(
                f,
                "{}={}={}",
                self.name.as_normalized(),
                self.version,
                self.build
            )
        }
    }
}

impl AsRef<PackageRecord> for PackageRecord {
    fn as_ref(&self) -> &PackageRecord {
        self
    }
}

/// Information about a package from repodata. It includes a [`PackageRecord`] but it also stores
/// the source of the data (like the url and the channel).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoDataRecord {
    /// The data stored in the repodata.json.
    #[serde(flatten)]
    pub package_record: PackageRecord,

    /// The filename of the package
    #[serde(rename = "fn")]
    pub file_name: String,

    /// The canonical URL from where to get this package.
    pub url: Url,

    /// String representation of the channel where the package comes from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl AsRef<PackageRecord> for RepoDataRecord {
    fn as_ref(&self) -> &PackageRecord {
        &self.package_record
    }
}

impl Display for RepoDataRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.package_record)
    }
}

/// The file formats of conda packages.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum ArchiveType {
    /// A file with the `.tar.bz2` extension
    TarBz2,
    /// A file with the `.conda` extension
    Conda,
}

impl ArchiveType {
    /// The extension of the archive type, including the leading dot.
    pub const fn extension(self) -> &'static str {
        match self {
            ArchiveType::TarBz2 => ".tar.bz2",
            ArchiveType::Conda => ".conda",
        }
    }

    /// Splits a filename into the part before the extension and the archive type.
    pub fn split_str(file_name: &str) -> Option<(&str, ArchiveType)> {
        if let Some(stem) = file_name.strip_suffix(ArchiveType::TarBz2.extension()) {
            Some((stem, ArchiveType::TarBz2))
        } else {
            file_name
                .strip_suffix(ArchiveType::Conda.extension())
                .map(|stem| (stem, ArchiveType::Conda))
        }
    }
}

/// Extracts the package name from a file name like `python-3.11.4-h2755cc3_0.conda`.
pub fn package_name_from_file_name(file_name: &str) -> Option<&str> {
    let (stem, _) = ArchiveType::split_str(file_name)?;
    let mut parts = stem.rsplitn(3, '-');
    let _build = parts.next()?;
    let _version = parts.next()?;
    parts.next()
}

/// An error that occurred while reading repodata.
#[derive(Debug, thiserror::Error)]
pub enum RepoDataError {
    /// The file could not be read
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The contents are not valid repodata
    #[error("failed to parse repodata: {0}")]
    Parse(#[from] serde_json::Error),

    /// The url of a package could not be constructed
    #[error("failed to construct the url for '{file_name}': {source}")]
    InvalidUrl {
        /// The file name of the package
        file_name: String,
        /// The underlying error
        #[source]
        source: url::ParseError,
    },
}

impl RepoData {
    /// Parses [`RepoData`] from a file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RepoDataError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Returns the `base_url` specified in the repodata.
    pub fn base_url(&self) -> Option<&str> {
        self.info.as_ref().and_then(|i| i.base_url.as_deref())
    }

    /// Builds a [`Vec<RepoDataRecord>`] from the packages in a [`RepoData`] given the source of
    /// the data. Records appear in file order, `.tar.bz2` packages first.
    pub fn into_repo_data_records(
        self,
        channel: &Channel,
    ) -> Result<Vec<RepoDataRecord>, RepoDataError> {
        let mut records = Vec::with_capacity(self.packages.len() + self.conda_packages.len());
        let channel_name = channel.record_channel();
        let base_url = self.base_url().map(ToOwned::to_owned);
        let subdir = self.info.as_ref().map(|info| info.subdir.clone());

        for (file_name, package_record) in self.packages.into_iter().chain(self.conda_packages) {
            let subdir = subdir.as_deref().unwrap_or(&package_record.subdir);
            let url = compute_package_url(channel, base_url.as_deref(), subdir, &file_name)
                .map_err(|source| RepoDataError::InvalidUrl {
                    file_name: file_name.clone(),
                    source,
                })?;
            records.push(RepoDataRecord {
                url,
                channel: Some(channel_name.clone()),
                package_record,
                file_name,
            });
        }
        Ok(records)
    }
}

/// Computes the url of a package. A `base_url` in the repodata takes precedence over the
/// subdirectory of the channel.
pub fn compute_package_url(
    channel: &Channel,
    base_url: Option<&str>,
    subdir: &str,
    file_name: &str,
) -> Result<Url, url::ParseError> {
    let subdir_url = channel.base_url.join(&format!("{subdir}/"))?;
    let root = match base_url {
        Some(base_url) => {
            let base_url = if base_url.ends_with('/') {
                base_url.to_owned()
            } else {
                format!("{base_url}/")
            };
            subdir_url.join(&base_url)?
        }
        None => subdir_url,
    };
    root.join(file_name)
}
