//! `rattler_solve` is a crate that provides functionality to solve Conda
//! environments. It currently exposes the functionality through the
//! [`SolverImpl::solve`] function and its background counterpart
//! [`solve_async`].

#![deny(missing_docs)]

pub mod libsolv_rs;

use std::fmt;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use rattler_conda_types::{GenericVirtualPackage, MatchSpec, RepoDataRecord, SolverResult};

/// Represents a solver implementation, capable of solving [`SolverTask`]s
pub trait SolverImpl {
    /// The repo data associated to a channel and platform combination
    type RepoData<'a>: SolverRepoData<'a>;

    /// Resolve the dependencies and return the [`RepoDataRecord`]s that should
    /// be present in the environment.
    fn solve<
        'a,
        R: IntoRepoData<'a, Self::RepoData<'a>>,
        TAvailablePackagesIterator: IntoIterator<Item = R>,
    >(
        &mut self,
        task: SolverTask<TAvailablePackagesIterator>,
    ) -> Result<SolverResult, SolveError>;
}

/// Represents an error when solving the dependencies for a given environment
#[derive(thiserror::Error, Debug)]
pub enum SolveError {
    /// There is no set of dependencies that satisfies the requirements
    #[error(transparent)]
    Unsolvable(#[from] UnsolvableError),

    /// The solve did not finish within the time or step budget of the task.
    #[error("the solve did not finish within its time or step budget")]
    Timeout,

    /// Error when converting matchspec
    #[error(transparent)]
    ParseMatchSpecError(#[from] rattler_conda_types::ParseMatchSpecError),

    /// Encountered duplicate records in the available packages.
    #[error("encountered duplicate records for {0}")]
    DuplicateRecords(String),

    /// The background task running the solve was cancelled
    #[error("solve operation has been cancelled")]
    Cancelled,
}

/// A requested spec, constraint or pin that takes part in a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictingConstraint {
    /// One of the specs of the task
    Spec(MatchSpec),

    /// One of the constraints of the task
    Constraint(MatchSpec),

    /// One of the pinned packages of the task
    Pin(RepoDataRecord),
}

impl fmt::Display for ConflictingConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictingConstraint::Spec(spec) => write!(f, "{spec}"),
            ConflictingConstraint::Constraint(spec) => write!(f, "the constraint {spec}"),
            ConflictingConstraint::Pin(record) => {
                write!(f, "the pinned package {}", record.package_record)
            }
        }
    }
}

/// The requested specs, constraints and pins that cannot be satisfied together.
///
/// The list is minimal in the sense that removing any single entry from the
/// task makes the remaining entries solvable, unless minimization ran out of
/// budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsolvableError {
    /// The conflicting constraints, in the order in which they appear in the
    /// task.
    pub conflicts: Vec<ConflictingConstraint>,

    /// A human readable explanation of the conflict.
    pub explanation: String,
}

impl std::error::Error for UnsolvableError {}

impl fmt::Display for UnsolvableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot solve the request because of: {}",
            self.conflicts.iter().format(", ")
        )?;
        if !self.explanation.is_empty() {
            write!(f, "\n\n{}", self.explanation.trim_end())?;
        }
        Ok(())
    }
}

/// Represents the channel priority option to use during solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ChannelPriority {
    /// The channel that the package is first found in will be used as the only
    /// channel for that package.
    #[default]
    Strict,

    /// Packages can be retrieved from any channel but candidates from channels
    /// with a higher priority are preferred.
    Flexible,

    /// Packages can be retrieved from any channel as package version takes
    /// precedence.
    Disabled,
}

/// A criterion used to order the candidates of a package. Earlier keys in
/// [`SolverTask::preferences`] take precedence over later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum PreferenceKey {
    /// Prefer the records in [`SolverTask::locked_packages`].
    Locked,

    /// Prefer records from channels that come first in the available packages.
    /// Has no effect with [`ChannelPriority::Disabled`].
    ChannelPriority,

    /// Prefer higher versions, or lower versions depending on the
    /// [`SolveStrategy`].
    Version,

    /// Prefer higher build numbers.
    BuildNumber,

    /// Prefer more recent records.
    Timestamp,

    /// Prefer records with fewer dependencies.
    FewerDependencies,
}

impl PreferenceKey {
    /// The order used when a task does not specify one.
    pub fn default_order() -> Vec<PreferenceKey> {
        vec![
            PreferenceKey::Locked,
            PreferenceKey::ChannelPriority,
            PreferenceKey::Version,
            PreferenceKey::BuildNumber,
            PreferenceKey::Timestamp,
            PreferenceKey::FewerDependencies,
        ]
    }
}

/// Represents a dependency resolution task, to be solved by one of the backends
pub struct SolverTask<TAvailablePackagesIterator> {
    /// An iterator over all available packages, one entry per channel and
    /// subdir. Entries that come first have a higher channel priority.
    pub available_packages: TAvailablePackagesIterator,

    /// Records of packages that are previously selected.
    ///
    /// If the solver encounters multiple variants of a single package
    /// (identified by its name), it will sort the records and select the
    /// best possible version. However, if there exists a locked version it
    /// will prefer that variant instead. This is useful to reduce the number of
    /// packages that are updated when installing new packages.
    ///
    /// Usually you add the currently installed packages or packages from a
    /// lock-file here.
    pub locked_packages: Vec<RepoDataRecord>,

    /// Records of packages that are previously selected and CANNOT be changed.
    ///
    /// If a package with the same name as a pinned package is installed it
    /// will be the pinned package, even if that means other packages have to
    /// be downgraded. If that is impossible the solve fails with a conflict
    /// that names the pin.
    pub pinned_packages: Vec<RepoDataRecord>,

    /// Virtual packages considered active
    pub virtual_packages: Vec<GenericVirtualPackage>,

    /// The specs we want to solve
    pub specs: Vec<MatchSpec>,

    /// Additional constraints that should be satisfied by the solver.
    /// Packages included in the `constraints` are not necessarily
    /// installed, but they must be satisfied by the solution.
    pub constraints: Vec<MatchSpec>,

    /// The timeout after which the solver should stop
    pub timeout: Option<std::time::Duration>,

    /// The maximum number of decisions and conflicts the solver may go through
    pub max_steps: Option<u64>,

    /// The channel priority to solve with
    pub channel_priority: ChannelPriority,

    /// Exclude any package that has a timestamp newer than the specified
    /// timestamp.
    pub exclude_newer: Option<DateTime<Utc>>,

    /// The solve strategy.
    pub strategy: SolveStrategy,

    /// The order in which candidates are preferred.
    pub preferences: Vec<PreferenceKey>,
}

impl<'r, I: IntoIterator<Item = &'r RepoDataRecord>> FromIterator<I>
    for SolverTask<Vec<RepoDataIter<I>>>
{
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        SolverTask::new(iter.into_iter().map(|iter| RepoDataIter(iter)).collect())
    }
}

impl<TAvailablePackagesIterator> SolverTask<TAvailablePackagesIterator> {
    /// Creates a task without specs that uses the default settings.
    pub fn new(available_packages: TAvailablePackagesIterator) -> Self {
        Self {
            available_packages,
            locked_packages: Vec::new(),
            pinned_packages: Vec::new(),
            virtual_packages: Vec::new(),
            specs: Vec::new(),
            constraints: Vec::new(),
            timeout: None,
            max_steps: None,
            channel_priority: ChannelPriority::default(),
            exclude_newer: None,
            strategy: SolveStrategy::default(),
            preferences: PreferenceKey::default_order(),
        }
    }
}

/// Represents the strategy to use when solving dependencies
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum SolveStrategy {
    /// Resolve the highest version of each package.
    #[default]
    Highest,

    /// Resolve the lowest compatible version for each package.
    ///
    /// All candidates with the same version are still ordered the same as
    /// with `Highest`. This ensures that the candidate with the highest build
    /// number is used.
    LowestVersion,

    /// Resolve the lowest compatible version for direct dependencies but the
    /// highest for transitive dependencies. This is similar to `LowestVersion`
    /// but only for direct dependencies.
    LowestVersionDirect,
}

/// A representation of a collection of [`RepoDataRecord`] usable by a
/// [`SolverImpl`] implementation.
///
/// Some solvers might be able to cache the collection between different runs of
/// the solver which could potentially eliminate some overhead. This trait
/// enables creating a representation of the repodata that is most suitable for
/// a specific backend.
pub trait SolverRepoData<'a>: FromIterator<&'a RepoDataRecord> {}

/// Defines the ability to convert a type into [`SolverRepoData`].
pub trait IntoRepoData<'a, S: SolverRepoData<'a>> {
    /// Converts this instance into an instance of [`SolverRepoData`] which is
    /// consumable by a specific [`SolverImpl`] implementation.
    fn into(self) -> S;
}

impl<'a, S: SolverRepoData<'a>> IntoRepoData<'a, S> for &'a Vec<RepoDataRecord> {
    fn into(self) -> S {
        self.iter().collect()
    }
}

impl<'a, S: SolverRepoData<'a>> IntoRepoData<'a, S> for &'a [RepoDataRecord] {
    fn into(self) -> S {
        self.iter().collect()
    }
}

impl<'a, S: SolverRepoData<'a>> IntoRepoData<'a, S> for S {
    fn into(self) -> S {
        self
    }
}

/// A helper struct that implements `IntoRepoData` for anything that can
/// iterate over `RepoDataRecord`s.
pub struct RepoDataIter<T>(pub T);

impl<'a, T: IntoIterator<Item = &'a RepoDataRecord>, S: SolverRepoData<'a>> IntoRepoData<'a, S>
    for RepoDataIter<T>
{
    fn into(self) -> S {
        self.0.into_iter().collect()
    }
}

/// Solves a task on a `tokio` blocking worker so that an asynchronous caller
/// is not blocked while the solver runs. The task owns its available
/// packages, one `Vec` per channel and subdir.
pub async fn solve_async(
    task: SolverTask<Vec<Vec<RepoDataRecord>>>,
) -> Result<SolverResult, SolveError> {
    tokio::task::spawn_blocking(move || {
        let SolverTask {
            available_packages,
            locked_packages,
            pinned_packages,
            virtual_packages,
            specs,
            constraints,
            timeout,
            max_steps,
            channel_priority,
            exclude_newer,
            strategy,
            preferences,
        } = task;
        crate::libsolv_rs::Solver.solve(SolverTask {
            available_packages: &available_packages,
            locked_packages,
            pinned_packages,
            virtual_packages,
            specs,
            constraints,
            timeout,
            max_steps,
            channel_priority,
            exclude_newer,
            strategy,
            preferences,
        })
    })
    .await
    .map_err(|_| SolveError::Cancelled)?
}
