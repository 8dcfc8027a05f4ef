//! The serialized form of a lock-file. These types map one-to-one onto the
//! YAML document and are converted from and to the in-memory [`crate::LockFile`].

use std::{cmp::Ordering, collections::BTreeMap, collections::BTreeSet};

use pep440_rs::VersionSpecifiers;
use pep508_rs::{ExtraName, Requirement};
use rattler_conda_types::{PackageName, PackageRecord, Platform, VersionWithSource};
use rattler_digest::{serde::SerializableHash, Md5, Md5Hash, Sha256, Sha256Hash};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use url::Url;

use crate::{file_format_version::FileFormatVersion, Channel, SolveOptions, UrlOrPath};

/// The root of the document.
#[derive(Serialize, Deserialize)]
pub(crate) struct LockFileModel {
    pub version: FileFormatVersion,
    pub environments: BTreeMap<String, EnvironmentModel>,
    pub packages: Vec<PackageModel>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct EnvironmentModel {
    pub channels: Vec<Channel>,
    #[serde(default, skip_serializing_if = "SolveOptions::is_default")]
    pub options: SolveOptions,
    #[serde(default)]
    pub packages: BTreeMap<Platform, Vec<PackageSelector>>,
}

/// Refers to a package in the `packages` section. Most of the time the
/// location is enough, the other fields are only written when multiple
/// packages share a location.
#[derive(Serialize, Deserialize, Eq, PartialEq, Debug)]
#[serde(untagged)]
pub(crate) enum PackageSelector {
    Conda {
        conda: UrlOrPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<PackageName>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<VersionWithSource>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        build: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subdir: Option<String>,
    },
    Pypi {
        pypi: UrlOrPath,
        #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
        extras: BTreeSet<ExtraName>,
    },
}

impl PartialOrd for PackageSelector {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageSelector {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Conda packages are written before pypi packages
            (PackageSelector::Conda { .. }, PackageSelector::Pypi { .. }) => Ordering::Less,
            (PackageSelector::Pypi { .. }, PackageSelector::Conda { .. }) => Ordering::Greater,
            (
                PackageSelector::Conda {
                    conda: a,
                    name: name_a,
                    version: version_a,
                    build: build_a,
                    subdir: subdir_a,
                },
                PackageSelector::Conda {
                    conda: b,
                    name: name_b,
                    version: version_b,
                    build: build_b,
                    subdir: subdir_b,
                },
            ) => compare_url_by_location(a, b)
                .then_with(|| name_a.cmp(name_b))
                .then_with(|| version_a.cmp(version_b))
                .then_with(|| build_a.cmp(build_b))
                .then_with(|| subdir_a.cmp(subdir_b)),
            (
                PackageSelector::Pypi {
                    pypi: a,
                    extras: extras_a,
                },
                PackageSelector::Pypi {
                    pypi: b,
                    extras: extras_b,
                },
            ) => compare_url_by_location(a, b).then_with(|| extras_a.cmp(extras_b)),
        }
    }
}

/// First sort packages just by their filename. Since most of the time the urls
/// end in the packages filename this causes the urls to be sorted by package
/// name.
fn compare_url_by_filename(a: &Url, b: &Url) -> Ordering {
    if let (Some(a), Some(b)) = (
        a.path_segments()
            .and_then(Iterator::last)
            .map(str::to_lowercase),
        b.path_segments()
            .and_then(Iterator::last)
            .map(str::to_lowercase),
    ) {
        match a.cmp(&b) {
            Ordering::Equal => {}
            ordering => return ordering,
        }
    }

    // Otherwise just sort by their full URL
    a.cmp(b)
}

pub(crate) fn compare_url_by_location(a: &UrlOrPath, b: &UrlOrPath) -> Ordering {
    match (a, b) {
        (UrlOrPath::Url(a), UrlOrPath::Url(b)) => compare_url_by_filename(a, b),
        (UrlOrPath::Url(_), UrlOrPath::Path(_)) => Ordering::Less,
        (UrlOrPath::Path(_), UrlOrPath::Url(_)) => Ordering::Greater,
        (UrlOrPath::Path(a), UrlOrPath::Path(b)) => a.cmp(b),
    }
}

/// A single entry of the `packages` section, discriminated by `kind`.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[allow(clippy::large_enum_variant)]
pub(crate) enum PackageModel {
    CondaBinary(CondaBinaryModel),
    CondaSource(CondaSourceModel),
    Pypi(PypiModel),
}

#[derive(Serialize, Deserialize)]
pub(crate) struct CondaBinaryModel {
    pub conda: UrlOrPath,

    #[serde(flatten)]
    pub package_record: PackageRecord,

    /// Only written when it differs from the last segment of the location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct CondaSourceModel {
    pub conda: UrlOrPath,

    #[serde(flatten)]
    pub package_record: PackageRecord,
}

#[serde_as]
#[derive(Serialize, Deserialize)]
pub(crate) struct PypiModel {
    pub pypi: UrlOrPath,

    #[serde_as(as = "DisplayFromStr")]
    pub name: pep508_rs::PackageName,

    #[serde_as(as = "DisplayFromStr")]
    pub version: pep440_rs::Version,

    #[serde_as(as = "Option<SerializableHash::<Md5>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<Md5Hash>,

    #[serde_as(as = "Option<SerializableHash::<Sha256>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<Sha256Hash>,

    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires_dist: Vec<Requirement>,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_python: Option<VersionSpecifiers>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub editable: bool,
}
