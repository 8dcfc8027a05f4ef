use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
    io::{BufWriter, Write},
    path::Path,
};

use itertools::Itertools;
use serde::{Serialize, Serializer};

use super::models::{
    CondaBinaryModel, CondaSourceModel, EnvironmentModel, LockFileModel, PackageModel,
    PackageSelector, PypiModel,
};
use crate::{
    file_format_version::FileFormatVersion, CondaPackageData, EnvironmentData,
    EnvironmentPackageData, LockFile, LockFileInner, PypiPackageData,
};

impl LockFile {
    /// Writes the lock-file to a file
    pub fn to_path(&self, path: &Path) -> Result<(), std::io::Error> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_yaml::to_writer(&mut writer, &LockFileModel::from(self))
            .map_err(std::io::Error::other)?;
        writer.flush()
    }

    /// Writes the lock-file to a string
    pub fn render_to_string(&self) -> Result<String, std::io::Error> {
        serde_yaml::to_string(&LockFileModel::from(self)).map_err(std::io::Error::other)
    }
}

impl Serialize for LockFile {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        LockFileModel::from(self).serialize(serializer)
    }
}

#[derive(Copy, Clone)]
enum CondaDisambiguityFilter {
    Name,
    Version,
    Build,
    Subdir,
}

impl CondaDisambiguityFilter {
    fn all() -> [CondaDisambiguityFilter; 4] {
        [Self::Name, Self::Version, Self::Build, Self::Subdir]
    }

    fn filter(&self, package: &CondaPackageData, other: &CondaPackageData) -> bool {
        match self {
            Self::Name => package.record().name == other.record().name,
            Self::Version => package.record().version == other.record().version,
            Self::Build => package.record().build == other.record().build,
            Self::Subdir => package.record().subdir == other.record().subdir,
        }
    }
}

/// Constructs the selector for a conda package. Only adds the fields that are
/// required to tell the package apart from the other packages at the same
/// location.
fn conda_selector(
    inner: &LockFileInner,
    package: &CondaPackageData,
    used_conda_packages: &HashSet<usize>,
) -> PackageSelector {
    // Find all packages that share the same location
    let mut similar_packages = inner
        .conda_packages
        .iter()
        .enumerate()
        .filter_map(|(idx, p)| used_conda_packages.contains(&idx).then_some(p))
        .filter(|p| p.location() == package.location())
        .collect::<Vec<_>>();

    // Iterate over other distinguishing factors and reduce the set of possible
    // packages to a minimum with the least number of keys added.
    let mut name = None;
    let mut version = None;
    let mut build = None;
    let mut subdir = None;
    while similar_packages.len() > 1 {
        let Some((filter, similar)) = CondaDisambiguityFilter::all()
            .into_iter()
            .map(|filter| {
                (
                    filter,
                    similar_packages
                        .iter()
                        .copied()
                        .filter(|p| filter.filter(package, p))
                        .collect_vec(),
                )
            })
            .min_by_key(|(_filter, set)| set.len())
        else {
            break;
        };

        if similar.len() == similar_packages.len() {
            // No further disambiguation possible. Assume that the package is a duplicate.
            break;
        }

        similar_packages = similar;
        let record = package.record();
        match filter {
            CondaDisambiguityFilter::Name => name = Some(record.name.clone()),
            CondaDisambiguityFilter::Version => version = Some(record.version.clone()),
            CondaDisambiguityFilter::Build => build = Some(record.build.clone()),
            CondaDisambiguityFilter::Subdir => subdir = Some(record.subdir.clone()),
        }
    }

    PackageSelector::Conda {
        conda: package.location().clone(),
        name,
        version,
        build,
        subdir,
    }
}

fn environment_model(
    inner: &LockFileInner,
    environment: &EnvironmentData,
    used_conda_packages: &HashSet<usize>,
) -> EnvironmentModel {
    EnvironmentModel {
        channels: environment.channels.clone(),
        options: environment.options.clone(),
        packages: environment
            .packages
            .iter()
            .map(|(platform, packages)| {
                let selectors = packages
                    .iter()
                    .map(|package| match *package {
                        EnvironmentPackageData::Conda(idx) => {
                            conda_selector(inner, &inner.conda_packages[idx], used_conda_packages)
                        }
                        EnvironmentPackageData::Pypi(idx, env_idx) => PackageSelector::Pypi {
                            pypi: inner.pypi_packages[idx].location.clone(),
                            extras: inner.pypi_environment_package_data[env_idx]
                                .extras
                                .clone(),
                        },
                    })
                    .sorted()
                    .collect();
                (*platform, selectors)
            })
            .collect(),
    }
}

/// A reference to a package in the `packages` section, used to order them.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
enum PackageData<'a> {
    Conda(&'a CondaPackageData),
    Pypi(&'a PypiPackageData),
}

impl PackageData<'_> {
    fn source_name(&self) -> &str {
        match self {
            PackageData::Conda(p) => p.record().name.as_source(),
            PackageData::Pypi(p) => p.name.as_ref(),
        }
    }
}

impl PartialOrd<Self> for PackageData<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageData<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        use PackageData::{Conda, Pypi};
        self.source_name()
            .cmp(other.source_name())
            .then_with(|| match (self, other) {
                (Conda(a), Conda(b)) => a.cmp(b),
                (Pypi(a), Pypi(b)) => a.cmp(b),
                (Pypi(_), _) => Ordering::Less,
                (_, Pypi(_)) => Ordering::Greater,
            })
    }
}

impl From<PackageData<'_>> for PackageModel {
    fn from(package: PackageData<'_>) -> Self {
        match package {
            PackageData::Conda(CondaPackageData::Binary(binary)) => {
                let derived_file_name = binary.location.file_name();
                PackageModel::CondaBinary(CondaBinaryModel {
                    conda: binary.location.clone(),
                    package_record: binary.package_record.clone(),
                    file_name: (derived_file_name != Some(binary.file_name.as_str()))
                        .then(|| binary.file_name.clone()),
                    channel: binary.channel.clone(),
                })
            }
            PackageData::Conda(CondaPackageData::Source(source)) => {
                PackageModel::CondaSource(CondaSourceModel {
                    conda: source.location.clone(),
                    package_record: source.package_record.clone(),
                })
            }
            PackageData::Pypi(pypi) => PackageModel::Pypi(PypiModel {
                pypi: pypi.location.clone(),
                name: pypi.name.clone(),
                version: pypi.version.clone(),
                md5: pypi.hash.as_ref().and_then(|h| h.md5()).copied(),
                sha256: pypi.hash.as_ref().and_then(|h| h.sha256()).copied(),
                requires_dist: pypi.requires_dist.clone(),
                requires_python: pypi.requires_python.clone(),
                editable: pypi.editable,
            }),
        }
    }
}

impl From<&LockFile> for LockFileModel {
    fn from(value: &LockFile) -> Self {
        let inner = value.inner.as_ref();

        // Determine the package indexes that are used in the lock-file.
        let mut used_conda_packages = HashSet::new();
        let mut used_pypi_packages = HashSet::new();
        for env in &inner.environments {
            for package in env.packages.values().flatten() {
                match package {
                    EnvironmentPackageData::Conda(idx) => {
                        used_conda_packages.insert(*idx);
                    }
                    EnvironmentPackageData::Pypi(pkg_idx, _env_idx) => {
                        used_pypi_packages.insert(*pkg_idx);
                    }
                }
            }
        }

        let environments = inner
            .environment_lookup
            .iter()
            .map(|(name, env_idx)| {
                (
                    name.clone(),
                    environment_model(inner, &inner.environments[*env_idx], &used_conda_packages),
                )
            })
            .collect::<BTreeMap<_, _>>();

        let conda_packages = inner
            .conda_packages
            .iter()
            .enumerate()
            .filter(|(idx, _)| used_conda_packages.contains(idx))
            .map(|(_, p)| PackageData::Conda(p));

        let pypi_packages = inner
            .pypi_packages
            .iter()
            .enumerate()
            .filter(|(idx, _)| used_pypi_packages.contains(idx))
            .map(|(_, p)| PackageData::Pypi(p));

        // Sort the packages in a deterministic order.
        let packages = itertools::chain!(conda_packages, pypi_packages)
            .sorted()
            .map(PackageModel::from)
            .collect();

        LockFileModel {
            version: FileFormatVersion::LATEST,
            environments,
            packages,
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use rattler_conda_types::{PackageRecord, Platform, RepoDataRecord, Version};

    use crate::{LockFile, DEFAULT_ENVIRONMENT_NAME};

    fn record(name: &str, version: &str, subdir: &str, depends: &[&str]) -> RepoDataRecord {
        let mut package_record = PackageRecord::new(
            name.parse().unwrap(),
            Version::from_str(version).unwrap(),
            "h0_0".to_owned(),
        );
        package_record.subdir = subdir.to_owned();
        package_record.depends = depends.iter().map(|d| (*d).to_owned()).collect();
        package_record.md5 = rattler_digest::parse_digest_from_hex::<rattler_digest::Md5>(
            "4eccaeba205f0aed9ac3a9ea58568ca3",
        );
        RepoDataRecord {
            package_record,
            file_name: format!("{name}-{version}-h0_0.conda"),
            url: format!("https://example.com/{subdir}/{name}-{version}-h0_0.conda")
                .parse()
                .unwrap(),
            channel: Some("https://example.com/".to_owned()),
        }
    }

    #[test]
    fn test_render_is_independent_of_insertion_order() {
        let bar = record("bar", "1.2", "linux-64", &[]);
        let foo = record("foo", "1.5", "linux-64", &["bar >=1.0"]);

        let a = LockFile::builder()
            .with_channels(DEFAULT_ENVIRONMENT_NAME, ["https://example.com/"])
            .with_conda_package(DEFAULT_ENVIRONMENT_NAME, Platform::Linux64, foo.clone().into())
            .with_conda_package(DEFAULT_ENVIRONMENT_NAME, Platform::Linux64, bar.clone().into())
            .finish();
        let b = LockFile::builder()
            .with_channels(DEFAULT_ENVIRONMENT_NAME, ["https://example.com/"])
            .with_conda_package(DEFAULT_ENVIRONMENT_NAME, Platform::Linux64, bar.into())
            .with_conda_package(DEFAULT_ENVIRONMENT_NAME, Platform::Linux64, foo.into())
            .finish();

        similar_asserts::assert_eq!(a.render_to_string().unwrap(), b.render_to_string().unwrap());
    }

    #[test]
    fn test_document_layout() {
        let lock_file = LockFile::builder()
            .with_channels(DEFAULT_ENVIRONMENT_NAME, ["https://example.com/"])
            .with_conda_package(
                DEFAULT_ENVIRONMENT_NAME,
                Platform::Linux64,
                record("foo", "1.5", "linux-64", &["bar >=1.0"]).into(),
            )
            .finish();
        let rendered = lock_file.render_to_string().unwrap();

        let document: serde_yaml::Value = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(document["version"].as_u64(), Some(6));
        assert_eq!(
            document["environments"]["default"]["channels"][0]["url"].as_str(),
            Some("https://example.com/")
        );
        let package = &document["packages"][0];
        assert_eq!(package["kind"].as_str(), Some("conda-binary"));
        assert_eq!(
            package["conda"].as_str(),
            Some("https://example.com/linux-64/foo-1.5-h0_0.conda")
        );
        assert_eq!(package["md5"].as_str(), Some("4eccaeba205f0aed9ac3a9ea58568ca3"));
        // The file name matches the url so it is not repeated.
        assert!(package.get("file_name").is_none());
        assert!(rendered.starts_with("version: 6\n"), "{rendered}");
    }

    #[test]
    fn test_only_named_environments_are_written() {
        let lock_file = LockFile::builder()
            .with_conda_package(
                "test",
                Platform::Linux64,
                record("foo", "1.5", "linux-64", &[]).into(),
            )
            .finish();
        let document: serde_yaml::Value =
            serde_yaml::from_str(&lock_file.render_to_string().unwrap()).unwrap();
        assert_eq!(document["packages"].as_sequence().map(Vec::len), Some(1));
        assert!(document["environments"].get("default").is_none());
    }
}
