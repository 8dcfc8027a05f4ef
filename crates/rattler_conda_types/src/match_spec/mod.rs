//! Match specifications: predicates over package records like `conda-forge::numpy >=1.20`.

pub(crate) mod matcher;
mod parse;

use crate::{
    build_spec::BuildNumberSpec, Channel, GenericVirtualPackage, PackageName, PackageRecord,
    RepoDataRecord, VersionSpec,
};
use itertools::Itertools;
use rattler_digest::{Md5Hash, Sha256Hash};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};
use url::Url;

pub use matcher::{StringMatcher, StringMatcherParseError};
pub use parse::ParseMatchSpecError;

/// A [`MatchSpec`] is, fundamentally, a query language for conda packages. Any of the fields that
/// comprise a [`crate::PackageRecord`] can be used to compose a [`MatchSpec`].
///
/// The canonical string form is
///
/// ```text
/// (channel(/subdir)::)name(version(build))[key1=value1,key2=value2]
/// ```
///
/// where `()` denotes optional parts. Keys in brackets override the values outside of them.
/// Supported keys are `version`, `build`, `build_number`, `fn`, `md5`, `sha256`, `subdir`,
/// `channel` and `license`.
///
/// A few special cases:
///
/// - `numpy=1.8` or `numpy 1.8` without a build matches all versions that start with `1.8`.
/// - `numpy=1.8=py27_0` and `numpy 1.8 py27_0` match version `1.8` exactly.
/// - `numpy 1.8.*` matches all versions starting with `1.8`, `numpy ==1.8` only `1.8`.
///
/// ```
/// # use rattler_conda_types::{MatchSpec, ParseStrictness};
/// let spec = MatchSpec::from_str("conda-forge::foo >=1.0,<2.0 py*", ParseStrictness::Strict).unwrap();
/// assert_eq!(spec.name.as_normalized(), "foo");
/// assert_eq!(spec.to_string(), "conda-forge::foo >=1.0,<2.0 py*");
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct MatchSpec {
    /// The name of the package
    pub name: PackageName,
    /// The version spec of the package (e.g. `1.2.3`, `>=1.2.3`, `1.2.*`)
    pub version: Option<VersionSpec>,
    /// The build string of the package (e.g. `py37_0`, `py37h6de7cb9_0`, `py*`)
    pub build: Option<StringMatcher>,
    /// The build number of the package
    pub build_number: Option<BuildNumberSpec>,
    /// Match the specific filename of the package
    pub file_name: Option<String>,
    /// The channel of the package
    pub channel: Option<Arc<Channel>>,
    /// The subdir of the channel
    pub subdir: Option<String>,
    /// The md5 hash of the package
    pub md5: Option<Md5Hash>,
    /// The sha256 hash of the package
    pub sha256: Option<Sha256Hash>,
    /// The license of the package
    pub license: Option<String>,
}

/// Similar to a [`MatchSpec`] but does not include the package name. This is useful in places
/// where the package name is already known (e.g. `foo = "3.4.1 *cuda"`).
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct NamelessMatchSpec {
    /// The version spec of the package (e.g. `1.2.3`, `>=1.2.3`, `1.2.*`)
    pub version: Option<VersionSpec>,
    /// The build string of the package (e.g. `py37_0`, `py37h6de7cb9_0`, `py*`)
    pub build: Option<StringMatcher>,
    /// The build number of the package
    pub build_number: Option<BuildNumberSpec>,
    /// Match the specific filename of the package
    pub file_name: Option<String>,
    /// The channel of the package
    pub channel: Option<Arc<Channel>>,
    /// The subdir of the channel
    pub subdir: Option<String>,
    /// The md5 hash of the package
    pub md5: Option<Md5Hash>,
    /// The sha256 hash of the package
    pub sha256: Option<Sha256Hash>,
    /// The license of the package
    pub license: Option<String>,
}

impl MatchSpec {
    /// Constructs a [`MatchSpec`] from a [`NamelessMatchSpec`] and a name.
    pub fn from_nameless(spec: NamelessMatchSpec, name: PackageName) -> Self {
        Self {
            name,
            version: spec.version,
            build: spec.build,
            build_number: spec.build_number,
            file_name: spec.file_name,
            channel: spec.channel,
            subdir: spec.subdir,
            md5: spec.md5,
            sha256: spec.sha256,
            license: spec.license,
        }
    }

    /// Decomposes this instance into a name and a [`NamelessMatchSpec`].
    pub fn into_nameless(self) -> (PackageName, NamelessMatchSpec) {
        (
            self.name,
            NamelessMatchSpec {
                version: self.version,
                build: self.build,
                build_number: self.build_number,
                file_name: self.file_name,
                channel: self.channel,
                subdir: self.subdir,
                md5: self.md5,
                sha256: self.sha256,
                license: self.license,
            },
        )
    }

    /// Returns true if this spec refers to a virtual package.
    pub fn is_virtual(&self) -> bool {
        self.name.is_virtual()
    }

    /// Returns true if the spec only restricts the name of the package.
    pub fn is_name_only(&self) -> bool {
        self.version.as_ref().map_or(true, |v| *v == VersionSpec::Any)
            && self.build.is_none()
            && self.build_number.is_none()
            && self.file_name.is_none()
            && self.channel.is_none()
            && self.subdir.is_none()
            && self.md5.is_none()
            && self.sha256.is_none()
            && self.license.is_none()
    }
}

impl From<PackageName> for MatchSpec {
    fn from(name: PackageName) -> Self {
        MatchSpec::from_nameless(NamelessMatchSpec::default(), name)
    }
}

impl From<MatchSpec> for NamelessMatchSpec {
    fn from(spec: MatchSpec) -> Self {
        spec.into_nameless().1
    }
}

/// A trait that defines the behavior of matching a spec against a record.
pub trait Matches<T> {
    /// Returns true if the record matches the spec.
    fn matches(&self, other: &T) -> bool;
}

/// A borrowed view of a package archive: its record plus where the archive comes from.
///
/// Records that are not read from a repodata file (for instance the packages of a lock file)
/// can be matched against channel and file name predicates through this view.
#[derive(Debug, Clone, Copy)]
pub struct PackageArchiveRef<'a> {
    /// The metadata of the package.
    pub record: &'a PackageRecord,

    /// The file name of the archive.
    pub file_name: &'a str,

    /// The url of the archive, if it is known.
    pub url: Option<&'a Url>,

    /// The channel the archive comes from, if it is known.
    pub channel: Option<&'a str>,
}

impl<'a> From<&'a RepoDataRecord> for PackageArchiveRef<'a> {
    fn from(record: &'a RepoDataRecord) -> Self {
        Self {
            record: &record.package_record,
            file_name: &record.file_name,
            url: Some(&record.url),
            channel: record.channel.as_deref(),
        }
    }
}

/// Borrowed view of the predicates shared by [`MatchSpec`] and [`NamelessMatchSpec`].
struct Predicates<'a> {
    version: Option<&'a VersionSpec>,
    build: Option<&'a StringMatcher>,
    build_number: Option<&'a BuildNumberSpec>,
    file_name: Option<&'a str>,
    channel: Option<&'a Channel>,
    subdir: Option<&'a str>,
    md5: Option<&'a Md5Hash>,
    sha256: Option<&'a Sha256Hash>,
    license: Option<&'a str>,
}

impl Predicates<'_> {
    /// Evaluates the predicates in order of cost: channel, subdir, version, build, build number,
    /// file name, license and hashes. The channel and file name can only be verified when the
    /// archive the record belongs to is known.
    fn matches_record(
        &self,
        record: &PackageRecord,
        source: Option<PackageArchiveRef<'_>>,
    ) -> bool {
        if let Some(channel) = self.channel {
            if !source.is_some_and(|source| record_from_channel(channel, source)) {
                return false;
            }
        }

        if let Some(subdir) = self.subdir {
            if subdir != record.subdir {
                return false;
            }
        }

        if let Some(spec) = self.version {
            if !spec.matches(&record.version) {
                return false;
            }
        }

        if let Some(build) = self.build {
            if !build.matches(&record.build) {
                return false;
            }
        }

        if let Some(build_number) = self.build_number {
            if !build_number.matches(&record.build_number) {
                return false;
            }
        }

        if let Some(file_name) = self.file_name {
            if !source.is_some_and(|source| source.file_name == file_name) {
                return false;
            }
        }

        if let Some(license) = self.license {
            if record.license.as_deref() != Some(license) {
                return false;
            }
        }

        if let Some(md5) = self.md5 {
            if record.md5.as_ref() != Some(md5) {
                return false;
            }
        }

        if let Some(sha256) = self.sha256 {
            if record.sha256.as_ref() != Some(sha256) {
                return false;
            }
        }

        true
    }

    fn matches_virtual_package(&self, package: &GenericVirtualPackage) -> bool {
        // Virtual packages have no archive, channel or metadata beyond their version and build.
        if self.channel.is_some()
            || self.subdir.is_some()
            || self.file_name.is_some()
            || self.md5.is_some()
            || self.sha256.is_some()
            || self.license.is_some()
            || self.build_number.is_some()
        {
            return false;
        }

        if let Some(spec) = self.version {
            if !spec.matches(&package.version) {
                return false;
            }
        }

        if let Some(build) = self.build {
            if !build.matches(&package.build_string) {
                return false;
            }
        }

        true
    }
}

/// Returns true if the archive originates from the channel, restricted to the platforms of the
/// channel if it has any.
fn record_from_channel(channel: &Channel, archive: PackageArchiveRef<'_>) -> bool {
    let from_channel = archive
        .channel
        .is_some_and(|name| channel.matches_record_channel(name))
        || archive
            .url
            .is_some_and(|url| url.as_str().starts_with(channel.base_url.as_str()));
    if !from_channel {
        return false;
    }

    match &channel.platforms {
        Some(platforms) => platforms
            .iter()
            .any(|p| p.as_str() == archive.record.subdir),
        None => true,
    }
}

impl NamelessMatchSpec {
    fn predicates(&self) -> Predicates<'_> {
        Predicates {
            version: self.version.as_ref(),
            build: self.build.as_ref(),
            build_number: self.build_number.as_ref(),
            file_name: self.file_name.as_deref(),
            channel: self.channel.as_deref(),
            subdir: self.subdir.as_deref(),
            md5: self.md5.as_ref(),
            sha256: self.sha256.as_ref(),
            license: self.license.as_deref(),
        }
    }
}

impl MatchSpec {
    fn predicates(&self) -> Predicates<'_> {
        Predicates {
            version: self.version.as_ref(),
            build: self.build.as_ref(),
            build_number: self.build_number.as_ref(),
            file_name: self.file_name.as_deref(),
            channel: self.channel.as_deref(),
            subdir: self.subdir.as_deref(),
            md5: self.md5.as_ref(),
            sha256: self.sha256.as_ref(),
            license: self.license.as_deref(),
        }
    }
}

impl Matches<PackageRecord> for NamelessMatchSpec {
    fn matches(&self, other: &PackageRecord) -> bool {
        self.predicates().matches_record(other, None)
    }
}

impl Matches<RepoDataRecord> for NamelessMatchSpec {
    fn matches(&self, other: &RepoDataRecord) -> bool {
        self.matches(&PackageArchiveRef::from(other))
    }
}

impl Matches<PackageArchiveRef<'_>> for NamelessMatchSpec {
    fn matches(&self, other: &PackageArchiveRef<'_>) -> bool {
        self.predicates().matches_record(other.record, Some(*other))
    }
}

impl Matches<GenericVirtualPackage> for NamelessMatchSpec {
    fn matches(&self, other: &GenericVirtualPackage) -> bool {
        self.predicates().matches_virtual_package(other)
    }
}

impl Matches<PackageRecord> for MatchSpec {
    fn matches(&self, other: &PackageRecord) -> bool {
        self.name == other.name && self.predicates().matches_record(other, None)
    }
}

impl Matches<RepoDataRecord> for MatchSpec {
    fn matches(&self, other: &RepoDataRecord) -> bool {
        self.matches(&PackageArchiveRef::from(other))
    }
}

impl Matches<PackageArchiveRef<'_>> for MatchSpec {
    fn matches(&self, other: &PackageArchiveRef<'_>) -> bool {
        self.name == other.record.name
            && self.predicates().matches_record(other.record, Some(*other))
    }
}

impl Matches<GenericVirtualPackage> for MatchSpec {
    fn matches(&self, other: &GenericVirtualPackage) -> bool {
        self.name == other.name && self.predicates().matches_virtual_package(other)
    }
}

/// Writes the version and build part of a spec. A build without a version is written with a
/// `*` version so it parses back into the build.
fn write_version_and_build(
    f: &mut Formatter<'_>,
    version: Option<&VersionSpec>,
    build: Option<&StringMatcher>,
    leading_space: bool,
) -> std::fmt::Result {
    let space = if leading_space { " " } else { "" };
    match (version, build) {
        (Some(version), Some(build)) => write!(f, "{space}{version} {build}"),
        (Some(version), None) => write!(f, "{space}{version}"),
        (None, Some(build)) => write!(f, "{space}* {build}"),
        (None, None) => Ok(()),
    }
}

/// Writes the attributes that have no positional syntax as `[key="value", ...]`.
fn write_brackets(f: &mut Formatter<'_>, attributes: &[(&str, String)]) -> std::fmt::Result {
    if attributes.is_empty() {
        return Ok(());
    }
    write!(
        f,
        "[{}]",
        attributes
            .iter()
            .format_with(", ", |(key, value), f| f(&format_args!("{key}=\"{value}\"")))
    )
}

#[allow(clippy::too_many_arguments)]
fn bracket_attributes(
    build_number: Option<&BuildNumberSpec>,
    file_name: Option<&String>,
    md5: Option<&Md5Hash>,
    sha256: Option<&Sha256Hash>,
    license: Option<&String>,
    subdir: Option<&String>,
    channel: Option<&Arc<Channel>>,
) -> Vec<(&'static str, String)> {
    let mut attributes = Vec::new();
    if let Some(channel) = channel {
        attributes.push(("channel", channel.canonical_name()));
    }
    if let Some(subdir) = subdir {
        attributes.push(("subdir", subdir.clone()));
    }
    if let Some(build_number) = build_number {
        attributes.push(("build_number", build_number.to_string()));
    }
    if let Some(file_name) = file_name {
        attributes.push(("fn", file_name.clone()));
    }
    if let Some(md5) = md5 {
        attributes.push(("md5", format!("{md5:x}")));
    }
    if let Some(sha256) = sha256 {
        attributes.push(("sha256", format!("{sha256:x}")));
    }
    if let Some(license) = license {
        attributes.push(("license", license.clone()));
    }
    attributes
}

impl Display for MatchSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(channel) = &self.channel {
            write!(f, "{}", channel.canonical_name())?;
            if let Some(subdir) = &self.subdir {
                write!(f, "/{subdir}")?;
            }
            write!(f, "::")?;
        }

        write!(f, "{}", self.name.as_source())?;
        write_version_and_build(f, self.version.as_ref(), self.build.as_ref(), true)?;

        let attributes = bracket_attributes(
            self.build_number.as_ref(),
            self.file_name.as_ref(),
            self.md5.as_ref(),
            self.sha256.as_ref(),
            self.license.as_ref(),
            self.subdir.as_ref().filter(|_| self.channel.is_none()),
            None,
        );
        write_brackets(f, &attributes)
    }
}

impl Display for NamelessMatchSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.version, &self.build) {
            (None, None) => write!(f, "*")?,
            (version, build) => write_version_and_build(f, version.as_ref(), build.as_ref(), false)?,
        }

        let attributes = bracket_attributes(
            self.build_number.as_ref(),
            self.file_name.as_ref(),
            self.md5.as_ref(),
            self.sha256.as_ref(),
            self.license.as_ref(),
            self.subdir.as_ref(),
            self.channel.as_ref(),
        );
        write_brackets(f, &attributes)
    }
}
