//! Static verification of a lock-file against the specs it was created from.
//!
//! Verification never solves. It checks that the dependency graph stored in
//! the lock-file is closed and that the requested specs are still satisfied
//! by the locked packages.

use std::{
    collections::{HashSet, VecDeque},
    str::FromStr,
};

use pep508_rs::{Requirement, VersionOrUrl};
use rattler_conda_types::{
    GenericVirtualPackage, MatchSpec, Matches, PackageRecord, ParseStrictness, Platform,
    RepoDataRecord,
};
use thiserror::Error;

use crate::{CondaPackageData, LockFile, PackageHashes, PypiPackageData};

/// The outcome of verifying a lock-file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Satisfiability {
    /// The locked environment satisfies the requested specs.
    Satisfied,

    /// The lock-file is internally consistent but no longer matches the
    /// requested specs. The environment should be solved again.
    Stale(StaleReason),

    /// The lock-file is internally inconsistent.
    Invalid(InvalidReason),
}

impl Satisfiability {
    /// Returns true if the lock-file can be used as is.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Satisfiability::Satisfied)
    }

    /// Converts the outcome into a result for callers that require a
    /// satisfied lock-file.
    pub fn into_result(self) -> Result<(), LockVerificationError> {
        match self {
            Satisfiability::Satisfied => Ok(()),
            Satisfiability::Stale(reason) => Err(LockVerificationError::Stale(reason)),
            Satisfiability::Invalid(reason) => {
                Err(LockVerificationError::InconsistentLock(reason))
            }
        }
    }
}

/// Why a lock-file no longer matches the requested specs.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StaleReason {
    /// The environment is not part of the lock-file.
    #[error("the environment '{0}' is missing from the lock-file")]
    MissingEnvironment(String),

    /// The environment was not locked for the platform.
    #[error("the environment is not locked for {0}")]
    MissingPlatform(Platform),

    /// No locked package matches a requested spec.
    #[error("no locked package satisfies '{0}'")]
    UnsatisfiedSpec(String),

    /// No locked package matches a requested pypi requirement.
    #[error("no locked pypi package satisfies '{0}'")]
    UnsatisfiedPypiRequirement(String),

    /// A locked package is not required by any of the requested specs.
    #[error("'{0}' is locked but not required by any of the requested packages")]
    UnreachablePackage(String),
}

/// Why a lock-file is internally inconsistent.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum InvalidReason {
    /// A dependency of a locked package cannot be parsed.
    #[error("the dependency '{dependency}' of '{package}' is invalid: {error}")]
    InvalidDependency {
        /// The package that declares the dependency.
        package: String,
        /// The dependency as written in the package.
        dependency: String,
        /// Why the dependency could not be parsed.
        error: String,
    },

    /// A dependency of a conda package is not satisfied by any package in
    /// the environment.
    #[error("the dependency '{dependency}' of '{package}' is not satisfied by any locked package")]
    DanglingDependency {
        /// The package that declares the dependency.
        package: String,
        /// The dependency as written in the package.
        dependency: String,
    },

    /// A requirement of a pypi package is not satisfied by any package in the
    /// environment.
    #[error("the requirement '{requirement}' of '{package}' is not satisfied by any locked package")]
    DanglingPypiRequirement {
        /// The package that declares the requirement.
        package: String,
        /// The requirement as written in the package.
        requirement: String,
    },

    /// The hash of a locked package differs from the current metadata.
    #[error("the hash of '{package}' does not match the current metadata")]
    HashMismatch {
        /// The package with the mismatching hash.
        package: String,
    },
}

/// An error returned when a lock-file was required to be satisfied.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum LockVerificationError {
    /// The lock-file is internally inconsistent.
    #[error("the lock-file is inconsistent")]
    InconsistentLock(#[source] InvalidReason),

    /// The lock-file does not match the requested specs.
    #[error("the lock-file is out of date")]
    Stale(#[source] StaleReason),
}

/// Verifies that a locked environment satisfies the given specs.
///
/// This is a shorthand for [`LockVerifier::new`] followed by
/// [`LockVerifier::verify`].
pub fn verify(
    lock_file: &LockFile,
    specs: &[MatchSpec],
    environment_name: &str,
    platform: Platform,
) -> Satisfiability {
    LockVerifier::new(specs).verify(lock_file, environment_name, platform)
}

/// Verifies locked environments with optional additional inputs.
#[derive(Debug, Clone, Copy)]
pub struct LockVerifier<'a> {
    specs: &'a [MatchSpec],
    pypi_requirements: &'a [Requirement],
    virtual_packages: Option<&'a [GenericVirtualPackage]>,
    current_records: &'a [RepoDataRecord],
}

/// A package in the environment that is being verified.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
enum Node {
    Conda(usize),
    Pypi(usize),
}

impl<'a> LockVerifier<'a> {
    /// Constructs a verifier for the given conda specs.
    pub fn new(specs: &'a [MatchSpec]) -> Self {
        Self {
            specs,
            pypi_requirements: &[],
            virtual_packages: None,
            current_records: &[],
        }
    }

    /// Also require these pypi requirements to be satisfied.
    pub fn with_pypi_requirements(self, pypi_requirements: &'a [Requirement]) -> Self {
        Self {
            pypi_requirements,
            ..self
        }
    }

    /// Check dependencies on virtual packages against these packages. Without
    /// them dependencies on virtual packages are assumed to be satisfied.
    pub fn with_virtual_packages(self, virtual_packages: &'a [GenericVirtualPackage]) -> Self {
        Self {
            virtual_packages: Some(virtual_packages),
            ..self
        }
    }

    /// Compare the hashes of locked binary packages with these records. Records
    /// are matched by their url.
    pub fn with_current_records(self, current_records: &'a [RepoDataRecord]) -> Self {
        Self {
            current_records,
            ..self
        }
    }

    /// Verifies the environment for the given platform.
    pub fn verify(
        &self,
        lock_file: &LockFile,
        environment_name: &str,
        platform: Platform,
    ) -> Satisfiability {
        let result = self.verify_inner(lock_file, environment_name, platform);
        match &result {
            Satisfiability::Satisfied => {
                tracing::debug!("environment '{environment_name}' for {platform} is satisfied");
            }
            Satisfiability::Stale(reason) => {
                tracing::debug!("environment '{environment_name}' for {platform} is stale: {reason}");
            }
            Satisfiability::Invalid(reason) => {
                tracing::warn!(
                    "environment '{environment_name}' for {platform} is inconsistent: {reason}"
                );
            }
        }
        result
    }

    fn verify_inner(
        &self,
        lock_file: &LockFile,
        environment_name: &str,
        platform: Platform,
    ) -> Satisfiability {
        let Some(environment) = lock_file.environment(environment_name) else {
            return Satisfiability::Stale(StaleReason::MissingEnvironment(
                environment_name.to_owned(),
            ));
        };
        let Some(packages) = environment.packages(platform) else {
            return Satisfiability::Stale(StaleReason::MissingPlatform(platform));
        };

        let mut conda_packages = Vec::new();
        let mut pypi_packages = Vec::new();
        for package in packages {
            if let Some(conda) = package.as_conda() {
                conda_packages.push(conda);
            } else if let Some((pypi, _)) = package.as_pypi() {
                pypi_packages.push(pypi);
            }
        }

        let graph = match self.dependency_graph(&conda_packages, &pypi_packages) {
            Ok(graph) => graph,
            Err(reason) => return Satisfiability::Invalid(reason),
        };

        if let Err(reason) = self.verify_hashes(&conda_packages) {
            return Satisfiability::Invalid(reason);
        }

        let roots = match self.roots(&conda_packages, &pypi_packages) {
            Ok(roots) => roots,
            Err(reason) => return Satisfiability::Stale(reason),
        };

        // Every locked package must be reachable from the requested specs.
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from(roots);
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            let edges = match node {
                Node::Conda(idx) => &graph.conda[idx],
                Node::Pypi(idx) => &graph.pypi[idx],
            };
            queue.extend(edges.iter().copied());
        }

        let unreachable_conda = (0..conda_packages.len())
            .find(|idx| !visited.contains(&Node::Conda(*idx)))
            .map(|idx| conda_packages[idx].record().name.as_source().to_owned());
        let unreachable_pypi = (0..pypi_packages.len())
            .find(|idx| !visited.contains(&Node::Pypi(*idx)))
            .map(|idx| pypi_packages[idx].name.to_string());
        if let Some(name) = unreachable_conda.or(unreachable_pypi) {
            return Satisfiability::Stale(StaleReason::UnreachablePackage(name));
        }

        Satisfiability::Satisfied
    }

    /// Resolves every dependency edge of every package to a package in the
    /// same environment.
    fn dependency_graph(
        &self,
        conda_packages: &[&CondaPackageData],
        pypi_packages: &[&PypiPackageData],
    ) -> Result<DependencyGraph, InvalidReason> {
        let mut graph = DependencyGraph::default();

        for package in conda_packages {
            let record = package.record();
            let mut edges = Vec::new();
            for dependency in &record.depends {
                let spec = MatchSpec::from_str(dependency, ParseStrictness::Lenient).map_err(
                    |err| InvalidReason::InvalidDependency {
                        package: record.to_string(),
                        dependency: dependency.clone(),
                        error: err.to_string(),
                    },
                )?;

                if spec.name.is_virtual() {
                    match self.virtual_packages {
                        None => continue,
                        Some(virtual_packages)
                            if virtual_packages.iter().any(|vp| spec.matches(vp)) =>
                        {
                            continue
                        }
                        Some(_) => {}
                    }
                } else if let Some(idx) = find_conda(conda_packages, &spec) {
                    edges.push(Node::Conda(idx));
                    continue;
                }

                return Err(InvalidReason::DanglingDependency {
                    package: record.to_string(),
                    dependency: dependency.clone(),
                });
            }
            graph.conda.push(edges);
        }

        for package in pypi_packages {
            let mut edges = Vec::new();
            for requirement in &package.requires_dist {
                match find_pypi(conda_packages, pypi_packages, requirement) {
                    Some(node) => edges.push(node),
                    // Requirements that depend on markers or extras might not apply.
                    None if !requirement.marker.is_true() => {}
                    None => {
                        return Err(InvalidReason::DanglingPypiRequirement {
                            package: format!("{}=={}", package.name, package.version),
                            requirement: requirement.to_string(),
                        })
                    }
                }
            }
            graph.pypi.push(edges);
        }

        Ok(graph)
    }

    fn verify_hashes(&self, conda_packages: &[&CondaPackageData]) -> Result<(), InvalidReason> {
        if self.current_records.is_empty() {
            return Ok(());
        }

        for binary in conda_packages.iter().filter_map(|p| p.as_binary()) {
            let Some(url) = binary.location.as_url() else {
                continue;
            };
            let Some(current) = self.current_records.iter().find(|r| &r.url == url) else {
                continue;
            };
            let locked = PackageHashes::from_hashes(
                binary.package_record.md5,
                binary.package_record.sha256,
            );
            let current = PackageHashes::from_hashes(
                current.package_record.md5,
                current.package_record.sha256,
            );
            if let (Some(locked), Some(current)) = (locked, current) {
                if locked.conflicts_with(&current) {
                    return Err(InvalidReason::HashMismatch {
                        package: binary.package_record.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Finds the packages that satisfy the requested specs.
    fn roots(
        &self,
        conda_packages: &[&CondaPackageData],
        pypi_packages: &[&PypiPackageData],
    ) -> Result<Vec<Node>, StaleReason> {
        let mut roots = Vec::new();
        for spec in self.specs {
            if spec.name.is_virtual() {
                let satisfied = self
                    .virtual_packages
                    .map_or(true, |vps| vps.iter().any(|vp| spec.matches(vp)));
                if satisfied {
                    continue;
                }
                return Err(StaleReason::UnsatisfiedSpec(spec.to_string()));
            }
            match find_conda(conda_packages, spec) {
                Some(idx) => roots.push(Node::Conda(idx)),
                None => return Err(StaleReason::UnsatisfiedSpec(spec.to_string())),
            }
        }

        for requirement in self.pypi_requirements {
            match find_pypi(conda_packages, pypi_packages, requirement) {
                Some(node) => roots.push(node),
                None => {
                    return Err(StaleReason::UnsatisfiedPypiRequirement(
                        requirement.to_string(),
                    ))
                }
            }
        }
        Ok(roots)
    }
}

#[derive(Default)]
struct DependencyGraph {
    conda: Vec<Vec<Node>>,
    pypi: Vec<Vec<Node>>,
}

fn find_conda(conda_packages: &[&CondaPackageData], spec: &MatchSpec) -> Option<usize> {
    conda_packages
        .iter()
        .position(|package| spec.matches(*package))
}

/// Pypi requirements can be satisfied by a pypi package or by a conda package
/// with the same name.
fn find_pypi(
    conda_packages: &[&CondaPackageData],
    pypi_packages: &[&PypiPackageData],
    requirement: &Requirement,
) -> Option<Node> {
    if let Some(idx) = pypi_packages.iter().position(|p| p.satisfies(requirement)) {
        return Some(Node::Pypi(idx));
    }
    let name = requirement.name.as_ref();
    conda_packages
        .iter()
        .position(|p| {
            let record = p.record();
            record.name.as_normalized() == name && conda_version_satisfies(record, requirement)
        })
        .map(Node::Conda)
}

/// Checks the version of a conda package against the version specifiers of a
/// pypi requirement. Conda versions that are not valid PEP 440 versions only
/// satisfy requirements without specifiers.
fn conda_version_satisfies(record: &PackageRecord, requirement: &Requirement) -> bool {
    match &requirement.version_or_url {
        None => true,
        Some(VersionOrUrl::VersionSpecifier(specifiers)) => {
            pep440_rs::Version::from_str(&record.version.to_string())
                .is_ok_and(|version| specifiers.contains(&version))
        }
        Some(VersionOrUrl::Url(_)) => false,
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use assert_matches::assert_matches;
    use rattler_conda_types::{
        GenericVirtualPackage, MatchSpec, PackageName, PackageRecord, ParseStrictness, Platform,
        RepoDataRecord, Version,
    };

    use super::{verify, InvalidReason, LockVerifier, Satisfiability, StaleReason};
    use crate::{
        LockFile, LockVerificationError, PypiPackageData, PypiPackageEnvironmentData, UrlOrPath,
        DEFAULT_ENVIRONMENT_NAME,
    };

    fn record(name: &str, version: &str, depends: &[&str]) -> RepoDataRecord {
        let mut package_record = PackageRecord::new(
            name.parse().unwrap(),
            Version::from_str(version).unwrap(),
            "h0_0".to_owned(),
        );
        package_record.subdir = "linux-64".to_owned();
        package_record.depends = depends.iter().map(|d| (*d).to_owned()).collect();
        package_record.md5 = rattler_digest::parse_digest_from_hex::<rattler_digest::Md5>(
            "4eccaeba205f0aed9ac3a9ea58568ca3",
        );
        RepoDataRecord {
            package_record,
            file_name: format!("{name}-{version}-h0_0.conda"),
            url: format!("https://example.com/linux-64/{name}-{version}-h0_0.conda")
                .parse()
                .unwrap(),
            channel: Some("https://example.com/".to_owned()),
        }
    }

    fn lock(records: &[RepoDataRecord]) -> LockFile {
        records
            .iter()
            .fold(LockFile::builder(), |builder, record| {
                builder.with_conda_package(
                    DEFAULT_ENVIRONMENT_NAME,
                    Platform::Linux64,
                    record.clone().into(),
                )
            })
            .finish()
    }

    fn specs(specs: &[&str]) -> Vec<MatchSpec> {
        specs
            .iter()
            .map(|s| MatchSpec::from_str(s, ParseStrictness::Strict).unwrap())
            .collect()
    }

    #[test]
    fn test_satisfied() {
        let lock_file = lock(&[record("foo", "1.5", &["bar >=1.0"]), record("bar", "1.2", &[])]);
        assert_eq!(
            verify(&lock_file, &specs(&["foo"]), DEFAULT_ENVIRONMENT_NAME, Platform::Linux64),
            Satisfiability::Satisfied
        );
    }

    #[test]
    fn test_missing_environment_or_platform() {
        let lock_file = lock(&[record("foo", "1.5", &[])]);
        assert_matches!(
            verify(&lock_file, &specs(&["foo"]), "test", Platform::Linux64),
            Satisfiability::Stale(StaleReason::MissingEnvironment(name)) if name == "test"
        );
        assert_matches!(
            verify(&lock_file, &specs(&["foo"]), DEFAULT_ENVIRONMENT_NAME, Platform::Osx64),
            Satisfiability::Stale(StaleReason::MissingPlatform(Platform::Osx64))
        );
    }

    #[test]
    fn test_changed_spec_is_stale() {
        let lock_file = lock(&[record("foo", "1.5", &[])]);
        assert_matches!(
            verify(&lock_file, &specs(&["foo >=2"]), DEFAULT_ENVIRONMENT_NAME, Platform::Linux64),
            Satisfiability::Stale(StaleReason::UnsatisfiedSpec(_))
        );
        assert_matches!(
            verify(&lock_file, &specs(&["foo", "baz"]), DEFAULT_ENVIRONMENT_NAME, Platform::Linux64),
            Satisfiability::Stale(StaleReason::UnsatisfiedSpec(spec)) if spec == "baz"
        );
    }

    #[test]
    fn test_channel_specific_specs() {
        let lock_file = lock(&[record("foo", "1.5", &[])]);
        let verify_specs = |s: &[&str]| {
            verify(&lock_file, &specs(s), DEFAULT_ENVIRONMENT_NAME, Platform::Linux64)
        };

        assert!(verify_specs(&["https://example.com::foo"]).is_satisfied());
        assert!(verify_specs(&["https://example.com/linux-64::foo >=1"]).is_satisfied());
        assert!(verify_specs(&["foo[fn=\"foo-1.5-h0_0.conda\"]"]).is_satisfied());
        assert_matches!(
            verify_specs(&["https://example.com/osx-64::foo"]),
            Satisfiability::Stale(StaleReason::UnsatisfiedSpec(_))
        );
        assert_matches!(
            verify_specs(&["conda-forge::foo"]),
            Satisfiability::Stale(StaleReason::UnsatisfiedSpec(_))
        );
    }

    #[test]
    fn test_removed_spec_is_stale() {
        let lock_file = lock(&[record("foo", "1.5", &[]), record("baz", "1.0", &[])]);
        assert_eq!(
            verify(&lock_file, &specs(&["foo"]), DEFAULT_ENVIRONMENT_NAME, Platform::Linux64),
            Satisfiability::Stale(StaleReason::UnreachablePackage("baz".to_owned()))
        );
    }

    #[test]
    fn test_dangling_dependency_is_invalid() {
        let lock_file = lock(&[record("foo", "1.5", &["bar >=1.0"])]);
        let result = verify(&lock_file, &specs(&["foo"]), DEFAULT_ENVIRONMENT_NAME, Platform::Linux64);
        assert_matches!(
            &result,
            Satisfiability::Invalid(InvalidReason::DanglingDependency { dependency, .. }) if dependency == "bar >=1.0"
        );
        assert_matches!(
            result.into_result(),
            Err(LockVerificationError::InconsistentLock(_))
        );

        // A locked package with the wrong version does not close the edge either.
        let lock_file = lock(&[record("foo", "1.5", &["bar >=2.0"]), record("bar", "1.2", &[])]);
        assert_matches!(
            verify(&lock_file, &specs(&["foo"]), DEFAULT_ENVIRONMENT_NAME, Platform::Linux64),
            Satisfiability::Invalid(InvalidReason::DanglingDependency { .. })
        );
    }

    #[test]
    fn test_virtual_dependencies() {
        let lock_file = lock(&[record("qux", "1.0", &["__unix"])]);
        let specs = specs(&["qux"]);

        // Without virtual packages the dependency is assumed to be satisfied.
        assert!(verify(&lock_file, &specs, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64)
            .is_satisfied());

        let unix = [GenericVirtualPackage {
            name: PackageName::new_unchecked("__unix"),
            version: Version::from_str("0").unwrap(),
            build_string: "0".to_owned(),
        }];
        let win = [GenericVirtualPackage {
            name: PackageName::new_unchecked("__win"),
            version: Version::from_str("0").unwrap(),
            build_string: "0".to_owned(),
        }];
        assert!(LockVerifier::new(&specs)
            .with_virtual_packages(&unix)
            .verify(&lock_file, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64)
            .is_satisfied());
        assert_matches!(
            LockVerifier::new(&specs).with_virtual_packages(&win).verify(
                &lock_file,
                DEFAULT_ENVIRONMENT_NAME,
                Platform::Linux64
            ),
            Satisfiability::Invalid(InvalidReason::DanglingDependency { .. })
        );
    }

    #[test]
    fn test_hash_mismatch() {
        let foo = record("foo", "1.5", &[]);
        let lock_file = lock(&[foo.clone()]);
        let specs = specs(&["foo"]);

        let verifier = LockVerifier::new(&specs);
        let current = [foo.clone()];
        assert!(verifier
            .with_current_records(&current)
            .verify(&lock_file, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64)
            .is_satisfied());

        let mut rebuilt = foo;
        rebuilt.package_record.md5 = rattler_digest::parse_digest_from_hex::<rattler_digest::Md5>(
            "00000000000000000000000000000000",
        );
        let current = [rebuilt];
        assert_matches!(
            verifier.with_current_records(&current).verify(
                &lock_file,
                DEFAULT_ENVIRONMENT_NAME,
                Platform::Linux64
            ),
            Satisfiability::Invalid(InvalidReason::HashMismatch { .. })
        );
    }

    fn pypi(name: &str, version: &str, requires_dist: &[&str]) -> PypiPackageData {
        PypiPackageData {
            name: pep508_rs::PackageName::new(name.to_owned()).unwrap(),
            version: pep440_rs::Version::from_str(version).unwrap(),
            location: UrlOrPath::from_str(&format!(
                "https://files.example.com/{name}-{version}-py3-none-any.whl"
            ))
            .unwrap(),
            hash: None,
            requires_dist: requires_dist
                .iter()
                .map(|req| pep508_rs::Requirement::from_str(req).unwrap())
                .collect(),
            requires_python: None,
            editable: false,
        }
    }

    #[test]
    fn test_pypi_requirements() {
        let lock_file = LockFile::builder()
            .with_conda_package(
                DEFAULT_ENVIRONMENT_NAME,
                Platform::Linux64,
                record("python", "3.12.0", &[]).into(),
            )
            .with_pypi_package(
                DEFAULT_ENVIRONMENT_NAME,
                Platform::Linux64,
                pypi(
                    "requests",
                    "2.31.0",
                    &["urllib3>=1.21.1,<3", "PySocks>=1.5.6 ; extra == 'socks'"],
                ),
                PypiPackageEnvironmentData::default(),
            )
            .with_pypi_package(
                DEFAULT_ENVIRONMENT_NAME,
                Platform::Linux64,
                pypi("urllib3", "2.2.1", &[]),
                PypiPackageEnvironmentData::default(),
            )
            .finish();

        let specs = specs(&["python 3.12.*"]);
        let requirements = [pep508_rs::Requirement::from_str("requests>=2").unwrap()];
        assert!(LockVerifier::new(&specs)
            .with_pypi_requirements(&requirements)
            .verify(&lock_file, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64)
            .is_satisfied());

        // Without the pypi requirement the pypi packages are not needed.
        assert_matches!(
            verify(&lock_file, &specs, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64),
            Satisfiability::Stale(StaleReason::UnreachablePackage(name)) if name == "requests"
        );

        let requirements = [pep508_rs::Requirement::from_str("requests>=3").unwrap()];
        assert_matches!(
            LockVerifier::new(&specs)
                .with_pypi_requirements(&requirements)
                .verify(&lock_file, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64),
            Satisfiability::Stale(StaleReason::UnsatisfiedPypiRequirement(_))
        );
    }

    #[test]
    fn test_conda_package_satisfies_pypi_requirement() {
        let lock_file = LockFile::builder()
            .with_conda_package(
                DEFAULT_ENVIRONMENT_NAME,
                Platform::Linux64,
                record("urllib3", "1.0", &[]).into(),
            )
            .with_pypi_package(
                DEFAULT_ENVIRONMENT_NAME,
                Platform::Linux64,
                pypi("requests", "2.31.0", &["urllib3>=1"]),
                PypiPackageEnvironmentData::default(),
            )
            .finish();

        let requirements = [pep508_rs::Requirement::from_str("requests").unwrap()];
        assert!(LockVerifier::new(&[])
            .with_pypi_requirements(&requirements)
            .verify(&lock_file, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64)
            .is_satisfied());

        // The version of the conda package must satisfy the requirement as well.
        let requirements = [pep508_rs::Requirement::from_str("urllib3>=3").unwrap()];
        assert_matches!(
            LockVerifier::new(&[])
                .with_pypi_requirements(&requirements)
                .verify(&lock_file, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64),
            Satisfiability::Stale(StaleReason::UnsatisfiedPypiRequirement(_))
        );

        let lock_file = LockFile::builder()
            .with_conda_package(
                DEFAULT_ENVIRONMENT_NAME,
                Platform::Linux64,
                record("urllib3", "1.0", &[]).into(),
            )
            .with_pypi_package(
                DEFAULT_ENVIRONMENT_NAME,
                Platform::Linux64,
                pypi("requests", "2.31.0", &["urllib3>=3"]),
                PypiPackageEnvironmentData::default(),
            )
            .finish();
        let requirements = [pep508_rs::Requirement::from_str("requests").unwrap()];
        assert_matches!(
            LockVerifier::new(&[])
                .with_pypi_requirements(&requirements)
                .verify(&lock_file, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64),
            Satisfiability::Invalid(InvalidReason::DanglingPypiRequirement { requirement, .. })
                if requirement.starts_with("urllib3")
        );
    }

    #[test]
    fn test_dangling_pypi_requirement() {
        let lock_file = LockFile::builder()
            .with_pypi_package(
                DEFAULT_ENVIRONMENT_NAME,
                Platform::Linux64,
                pypi("requests", "2.31.0", &["urllib3>=1.21.1,<3"]),
                PypiPackageEnvironmentData::default(),
            )
            .finish();
        let requirements = [pep508_rs::Requirement::from_str("requests").unwrap()];
        assert_matches!(
            LockVerifier::new(&[])
                .with_pypi_requirements(&requirements)
                .verify(&lock_file, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64),
            Satisfiability::Invalid(InvalidReason::DanglingPypiRequirement { .. })
        );
    }
}
