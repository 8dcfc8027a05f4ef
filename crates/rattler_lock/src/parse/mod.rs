mod models;
mod serialize;

use std::{str::FromStr, sync::Arc};

use fxhash::FxHashMap;
use indexmap::IndexSet;
use rattler_conda_types::Platform;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    file_format_version::FileFormatVersion, CondaBinaryData, CondaPackageData, CondaSourceData,
    EnvironmentData, EnvironmentPackageData, LockFile, LockFileInner, PackageHashes,
    PypiPackageData, PypiPackageEnvironmentData, UrlOrPath,
};
use models::{LockFileModel, PackageModel, PackageSelector};

/// An error that can occur when parsing a lock-file.
#[derive(Debug, Error)]
pub enum ParseCondaLockError {
    /// An error occurred while reading the lock-file.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// The lock-file is not a valid YAML document or does not have the
    /// expected structure.
    #[error(transparent)]
    ParseError(#[from] serde_yaml::Error),

    /// The version of the lock-file cannot be read by this crate.
    #[error("lock-file version {lock_file_version} is not supported, only version {supported_version} can be read")]
    IncompatibleVersion {
        /// The version found in the document.
        lock_file_version: u64,

        /// The version this crate reads and writes.
        supported_version: FileFormatVersion,
    },

    /// An environment refers to a package that is not listed in the
    /// `packages` section.
    #[error("environment '{environment}' refers to a package at '{location}' for {platform} that is not part of the lock-file")]
    MissingPackage {
        /// The environment that contains the reference.
        environment: String,

        /// The platform for which the package is referenced.
        platform: Platform,

        /// The location of the package.
        location: UrlOrPath,
    },

    /// A binary conda package without a file name.
    #[error("cannot determine the file name of the conda package at '{0}'")]
    MissingFileName(UrlOrPath),
}

impl FromStr for LockFile {
    type Err = ParseCondaLockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Read only the version first, the rest of the document depends on it.
        #[derive(Deserialize)]
        struct DocumentVersion {
            version: u64,
        }

        let DocumentVersion { version } = serde_yaml::from_str(s)?;
        if FileFormatVersion::from_number(version).is_none() {
            return Err(ParseCondaLockError::IncompatibleVersion {
                lock_file_version: version,
                supported_version: FileFormatVersion::LATEST,
            });
        }

        let model: LockFileModel = serde_yaml::from_str(s)?;
        LockFile::try_from(model)
    }
}

impl TryFrom<LockFileModel> for LockFile {
    type Error = ParseCondaLockError;

    fn try_from(model: LockFileModel) -> Result<Self, Self::Error> {
        let mut conda_packages = Vec::new();
        let mut pypi_packages = Vec::new();
        for package in model.packages {
            match package {
                PackageModel::CondaBinary(binary) => {
                    let file_name = match binary.file_name {
                        Some(file_name) => file_name,
                        None => binary
                            .conda
                            .file_name()
                            .map(ToOwned::to_owned)
                            .ok_or_else(|| {
                                ParseCondaLockError::MissingFileName(binary.conda.clone())
                            })?,
                    };
                    conda_packages.push(CondaPackageData::Binary(CondaBinaryData {
                        package_record: binary.package_record,
                        location: binary.conda,
                        file_name,
                        channel: binary.channel,
                    }));
                }
                PackageModel::CondaSource(source) => {
                    conda_packages.push(CondaPackageData::Source(CondaSourceData {
                        package_record: source.package_record,
                        location: source.conda,
                    }));
                }
                PackageModel::Pypi(pypi) => pypi_packages.push(PypiPackageData {
                    name: pypi.name,
                    version: pypi.version,
                    location: pypi.pypi,
                    hash: PackageHashes::from_hashes(pypi.md5, pypi.sha256),
                    requires_dist: pypi.requires_dist,
                    requires_python: pypi.requires_python,
                    editable: pypi.editable,
                }),
            }
        }

        let mut pypi_environment_package_data = IndexSet::new();
        let mut environments = Vec::with_capacity(model.environments.len());
        let mut environment_lookup = FxHashMap::default();
        for (environment_name, environment) in model.environments {
            let mut packages = std::collections::BTreeMap::new();
            for (platform, selectors) in environment.packages {
                let mut platform_packages = IndexSet::with_capacity(selectors.len());
                for selector in selectors {
                    let package = resolve_selector(
                        &conda_packages,
                        &pypi_packages,
                        &mut pypi_environment_package_data,
                        selector,
                    )
                    .map_err(|location| ParseCondaLockError::MissingPackage {
                        environment: environment_name.clone(),
                        platform,
                        location,
                    })?;
                    platform_packages.insert(package);
                }
                packages.insert(platform, platform_packages);
            }

            environment_lookup.insert(environment_name, environments.len());
            environments.push(EnvironmentData {
                channels: environment.channels,
                options: environment.options,
                packages,
            });
        }

        Ok(LockFile {
            inner: Arc::new(LockFileInner {
                version: model.version,
                environments,
                conda_packages,
                pypi_packages,
                pypi_environment_package_data: pypi_environment_package_data
                    .into_iter()
                    .collect(),
                environment_lookup,
            }),
        })
    }
}

/// Finds the package a selector refers to. Returns the location of the
/// selector if no package matches.
fn resolve_selector(
    conda_packages: &[CondaPackageData],
    pypi_packages: &[PypiPackageData],
    pypi_environment_package_data: &mut IndexSet<PypiPackageEnvironmentData>,
    selector: PackageSelector,
) -> Result<EnvironmentPackageData, UrlOrPath> {
    match selector {
        PackageSelector::Conda {
            conda,
            name,
            version,
            build,
            subdir,
        } => conda_packages
            .iter()
            .position(|package| {
                let record = package.record();
                package.location() == &conda
                    && name.as_ref().map_or(true, |name| name == &record.name)
                    && version.as_ref().map_or(true, |v| v == &record.version)
                    && build.as_ref().map_or(true, |b| b == &record.build)
                    && subdir.as_ref().map_or(true, |s| s == &record.subdir)
            })
            .map(EnvironmentPackageData::Conda)
            .ok_or(conda),
        PackageSelector::Pypi { pypi, extras } => {
            let Some(package_idx) = pypi_packages
                .iter()
                .position(|package| package.location == pypi)
            else {
                return Err(pypi);
            };
            let (env_idx, _) =
                pypi_environment_package_data.insert_full(PypiPackageEnvironmentData { extras });
            Ok(EnvironmentPackageData::Pypi(package_idx, env_idx))
        }
    }
}
