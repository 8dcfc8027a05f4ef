//! Builder for the creation of lock files.

use std::{collections::BTreeMap, sync::Arc};

use fxhash::FxHashMap;
use indexmap::{IndexMap, IndexSet};
use rattler_conda_types::{Platform, SolverResult};

use crate::{
    file_format_version::FileFormatVersion, Channel, CondaBinaryData, CondaPackageData,
    CondaSourceData, EnvironmentData, EnvironmentPackageData, LockFile, LockFileInner,
    PypiPackageData, PypiPackageEnvironmentData, SolveOptions, UrlOrPath,
};

/// A struct to incrementally build a lock-file.
#[derive(Default)]
pub struct LockFileBuilder {
    /// Metadata about the different environments stored in the lock file.
    environments: IndexMap<String, EnvironmentData>,

    /// A list of all package metadata stored in the lock file.
    conda_packages: IndexSet<CondaPackageData>,
    pypi_packages: IndexSet<PypiPackageData>,
    pypi_runtime_configurations: IndexSet<PypiPackageEnvironmentData>,
}

/// An owned version of a package in a lock-file.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[allow(clippy::large_enum_variant)]
pub enum LockedPackage {
    /// A binary conda package
    CondaBinary(CondaBinaryData),

    /// A conda package that is built from source
    CondaSource(CondaSourceData),

    /// A pypi package with the environment specific data
    Pypi(PypiPackageData, PypiPackageEnvironmentData),
}

impl From<CondaPackageData> for LockedPackage {
    fn from(value: CondaPackageData) -> Self {
        match value {
            CondaPackageData::Binary(data) => LockedPackage::CondaBinary(data),
            CondaPackageData::Source(data) => LockedPackage::CondaSource(data),
        }
    }
}

impl LockedPackage {
    /// Returns the name of the package as it is written in the lock-file.
    pub fn name(&self) -> &str {
        match self {
            LockedPackage::CondaBinary(data) => data.package_record.name.as_source(),
            LockedPackage::CondaSource(data) => data.package_record.name.as_source(),
            LockedPackage::Pypi(data, _) => data.name.as_ref(),
        }
    }

    /// Returns the location of the package.
    pub fn location(&self) -> &UrlOrPath {
        match self {
            LockedPackage::CondaBinary(data) => &data.location,
            LockedPackage::CondaSource(data) => &data.location,
            LockedPackage::Pypi(data, _) => &data.location,
        }
    }
}

impl LockFileBuilder {
    /// Generate a new lock file using the builder pattern
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a mutable reference to the environment with the given name,
    /// creating it if it does not exist yet.
    fn environment_data(&mut self, environment: impl Into<String>) -> &mut EnvironmentData {
        self.environments
            .entry(environment.into())
            .or_insert_with(|| EnvironmentData {
                channels: vec![],
                options: SolveOptions::default(),
                packages: BTreeMap::default(),
            })
    }

    /// Sets the channels of an environment. Note that the order of channels
    /// is significant. The channels should be ordered by priority.
    pub fn set_channels(
        &mut self,
        environment: impl Into<String>,
        channels: impl IntoIterator<Item = impl Into<Channel>>,
    ) -> &mut Self {
        self.environment_data(environment).channels =
            channels.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the options that were used to solve an environment.
    pub fn set_options(
        &mut self,
        environment: impl Into<String>,
        options: SolveOptions,
    ) -> &mut Self {
        self.environment_data(environment).options = options;
        self
    }

    /// Adds a conda locked package to a specific environment and platform.
    ///
    /// This function is similar to [`Self::with_conda_package`] but differs in
    /// that it takes a mutable reference to self instead of consuming it.
    /// This allows for a more fluent with chaining calls.
    pub fn add_conda_package(
        &mut self,
        environment: impl Into<String>,
        platform: Platform,
        locked_package: CondaPackageData,
    ) -> &mut Self {
        let (package_idx, _) = self.conda_packages.insert_full(locked_package);
        self.environment_data(environment)
            .packages
            .entry(platform)
            .or_default()
            .insert(EnvironmentPackageData::Conda(package_idx));
        self
    }

    /// Adds a pypi locked package to a specific environment and platform.
    ///
    /// This function is similar to [`Self::with_pypi_package`] but differs in
    /// that it takes a mutable reference to self instead of consuming it.
    /// This allows for a more fluent with chaining calls.
    pub fn add_pypi_package(
        &mut self,
        environment: impl Into<String>,
        platform: Platform,
        locked_package: PypiPackageData,
        environment_data: PypiPackageEnvironmentData,
    ) -> &mut Self {
        let (package_idx, _) = self.pypi_packages.insert_full(locked_package);
        let (runtime_idx, _) = self
            .pypi_runtime_configurations
            .insert_full(environment_data);
        self.environment_data(environment)
            .packages
            .entry(platform)
            .or_default()
            .insert(EnvironmentPackageData::Pypi(package_idx, runtime_idx));
        self
    }

    /// Adds any locked package to a specific environment and platform.
    pub fn add_package(
        &mut self,
        environment: impl Into<String>,
        platform: Platform,
        locked_package: LockedPackage,
    ) -> &mut Self {
        match locked_package {
            LockedPackage::CondaBinary(data) => {
                self.add_conda_package(environment, platform, data.into())
            }
            LockedPackage::CondaSource(data) => {
                self.add_conda_package(environment, platform, data.into())
            }
            LockedPackage::Pypi(data, env_data) => {
                self.add_pypi_package(environment, platform, data, env_data)
            }
        }
    }

    /// Adds all the records of a solution to a specific environment and
    /// platform.
    pub fn add_solution(
        &mut self,
        environment: impl Into<String>,
        platform: Platform,
        solution: &SolverResult,
    ) -> &mut Self {
        let environment = environment.into();
        // Register the platform even if the solution is empty.
        self.environment_data(environment.clone())
            .packages
            .entry(platform)
            .or_default();
        for record in &solution.records {
            self.add_conda_package(environment.clone(), platform, record.clone().into());
        }
        self
    }

    /// Sets the channels of an environment. Note that the order of channels
    /// is significant. The channels should be ordered by priority.
    pub fn with_channels(
        mut self,
        environment: impl Into<String>,
        channels: impl IntoIterator<Item = impl Into<Channel>>,
    ) -> Self {
        self.set_channels(environment, channels);
        self
    }

    /// Sets the options that were used to solve an environment.
    pub fn with_options(mut self, environment: impl Into<String>, options: SolveOptions) -> Self {
        self.set_options(environment, options);
        self
    }

    /// Adds a conda locked package to a specific environment and platform.
    pub fn with_conda_package(
        mut self,
        environment: impl Into<String>,
        platform: Platform,
        locked_package: CondaPackageData,
    ) -> Self {
        self.add_conda_package(environment, platform, locked_package);
        self
    }

    /// Adds a pypi locked package to a specific environment and platform.
    pub fn with_pypi_package(
        mut self,
        environment: impl Into<String>,
        platform: Platform,
        locked_package: PypiPackageData,
        environment_data: PypiPackageEnvironmentData,
    ) -> Self {
        self.add_pypi_package(environment, platform, locked_package, environment_data);
        self
    }

    /// Adds any locked package to a specific environment and platform.
    pub fn with_package(
        mut self,
        environment: impl Into<String>,
        platform: Platform,
        locked_package: LockedPackage,
    ) -> Self {
        self.add_package(environment, platform, locked_package);
        self
    }

    /// Adds all the records of a solution to a specific environment and
    /// platform.
    pub fn with_solution(
        mut self,
        environment: impl Into<String>,
        platform: Platform,
        solution: &SolverResult,
    ) -> Self {
        self.add_solution(environment, platform, solution);
        self
    }

    /// Build a [`LockFile`]
    pub fn finish(self) -> LockFile {
        let (environment_lookup, environments) = self
            .environments
            .into_iter()
            .enumerate()
            .map(|(idx, (name, env))| ((name, idx), env))
            .unzip::<_, _, FxHashMap<_, _>, Vec<_>>();

        LockFile {
            inner: Arc::new(LockFileInner {
                version: FileFormatVersion::LATEST,
                environments,
                environment_lookup,
                conda_packages: self.conda_packages.into_iter().collect(),
                pypi_packages: self.pypi_packages.into_iter().collect(),
                pypi_environment_package_data: self
                    .pypi_runtime_configurations
                    .into_iter()
                    .collect(),
            }),
        }
    }
}
