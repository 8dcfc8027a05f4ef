//! Provides a solver implementation based on the [`libsolv_rs`](::libsolv_rs) SAT solver.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use ::libsolv_rs::{
    MatchSpecId, Pool, Problem, SolvableId, SolveBudget, SolveFailure, SolveJobs,
    Solver as SatSolver, StringId,
};
use chrono::{DateTime, Utc};
use rattler_conda_types::{
    ArchiveType, Channel, GenericVirtualPackage, MatchSpec, PackageRecord, RepoDataRecord,
    SolverResult,
};

use crate::{
    ChannelPriority, ConflictingConstraint, IntoRepoData, PreferenceKey, SolveError,
    SolveStrategy, SolverRepoData, SolverTask, UnsolvableError,
};
use sorting::{CandidateComparator, SortKey};

mod sorting;

/// Represents the information required to load available packages into the
/// solver for a single channel and platform combination
#[derive(Clone)]
pub struct RepoData<'a> {
    /// The actual records after parsing `repodata.json`
    pub records: Vec<&'a RepoDataRecord>,
}

impl<'a> FromIterator<&'a RepoDataRecord> for RepoData<'a> {
    fn from_iter<T: IntoIterator<Item = &'a RepoDataRecord>>(iter: T) -> Self {
        Self {
            records: Vec::from_iter(iter),
        }
    }
}

impl<'a> SolverRepoData<'a> for RepoData<'a> {}

/// A [`Solver`] implemented using the `libsolv_rs` library
#[derive(Default)]
pub struct Solver;

impl super::SolverImpl for Solver {
    type RepoData<'a> = RepoData<'a>;

    fn solve<
        'a,
        R: IntoRepoData<'a, Self::RepoData<'a>>,
        TAvailablePackagesIterator: IntoIterator<Item = R>,
    >(
        &mut self,
        task: SolverTask<TAvailablePackagesIterator>,
    ) -> Result<SolverResult, SolveError> {
        let budget = SolveBudget {
            deadline: task.timeout.map(|timeout| Instant::now() + timeout),
            max_steps: task.max_steps,
        };

        let SolverTask {
            available_packages,
            locked_packages,
            pinned_packages,
            virtual_packages,
            specs,
            constraints,
            channel_priority,
            exclude_newer,
            strategy,
            preferences,
            ..
        } = task;
        let repo_data: Vec<RepoData<'a>> = available_packages
            .into_iter()
            .map(IntoRepoData::into)
            .collect();

        let _span = tracing::info_span!("solve", specs = specs.len()).entered();
        let settings = Settings {
            specs: &specs,
            constraints: &constraints,
            locked_packages: &locked_packages,
            pinned_packages: &pinned_packages,
            virtual_packages: &virtual_packages,
            channel_priority,
            exclude_newer,
            strategy,
            preferences: &preferences,
        };
        let candidates = Candidates::new(repo_data, &settings)?;
        candidates.solve(&settings, budget)
    }
}

/// The parts of a [`SolverTask`] that are borrowed while solving.
struct Settings<'t> {
    specs: &'t [MatchSpec],
    constraints: &'t [MatchSpec],
    locked_packages: &'t [RepoDataRecord],
    pinned_packages: &'t [RepoDataRecord],
    virtual_packages: &'t [GenericVirtualPackage],
    channel_priority: ChannelPriority,
    exclude_newer: Option<DateTime<Utc>>,
    strategy: SolveStrategy,
    preferences: &'t [PreferenceKey],
}

/// A requested spec, constraint or pin, identified by its index in the task.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum RootItem {
    Spec(usize),
    Constraint(usize),
    Pin(usize),
}

/// The pool of candidates for a task together with the information needed to
/// turn a selection of the task's specs, constraints and pins into solver
/// jobs.
struct Candidates<'t> {
    pool: Pool<'t>,
    specs: Vec<MatchSpecId>,
    constraints: Vec<MatchSpecId>,
    pins: Vec<SolvableId>,
    virtual_requirements: Vec<MatchSpecId>,
    excluded: Vec<(SolvableId, StringId)>,
}

/// Returns true if the record was downloaded from the channel.
fn is_from_channel(record: &RepoDataRecord, channel: &Channel) -> bool {
    record
        .channel
        .as_deref()
        .is_some_and(|name| channel.matches_record_channel(name))
        || record.url.as_str().starts_with(channel.base_url.as_str())
}

/// Removes records that refer to the same package with a different archive
/// type, preferring `.conda` over `.tar.bz2` unless the `.conda` record would
/// be excluded and the other would not. Two records with the same archive
/// type are an error. The order of the records is retained.
fn deduplicate_archives<'a>(
    records: Vec<&'a RepoDataRecord>,
    exclude_newer: Option<&DateTime<Utc>>,
) -> Result<Vec<&'a RepoDataRecord>, SolveError> {
    let mut ordered: Vec<&'a RepoDataRecord> = Vec::with_capacity(records.len());
    let mut package_to_type: HashMap<&'a str, (ArchiveType, usize, bool)> =
        HashMap::with_capacity(records.len());

    for record in records {
        let excluded = matches!(
            (exclude_newer, &record.package_record.timestamp),
            (Some(exclude_newer), Some(timestamp)) if timestamp > exclude_newer
        );
        let (stem, archive_type) = ArchiveType::split_str(&record.file_name)
            .unwrap_or((record.file_name.as_str(), ArchiveType::TarBz2));

        let Some((previous_type, idx, previous_excluded)) = package_to_type.get_mut(stem) else {
            package_to_type.insert(stem, (archive_type, ordered.len(), excluded));
            ordered.push(record);
            continue;
        };

        if *previous_excluded && !excluded {
            *previous_type = archive_type;
            *previous_excluded = false;
            ordered[*idx] = record;
        } else if excluded && !*previous_excluded {
            // Keep the record that can be installed regardless of its type.
        } else {
            match archive_type.cmp(previous_type) {
                Ordering::Greater => {
                    *previous_type = archive_type;
                    *previous_excluded = excluded;
                    ordered[*idx] = record;
                }
                Ordering::Less => {}
                Ordering::Equal => {
                    return Err(SolveError::DuplicateRecords(record.file_name.clone()));
                }
            }
        }
    }

    Ok(ordered)
}

impl<'t> Candidates<'t> {
    fn new(repo_data: Vec<RepoData<'t>>, settings: &Settings<'t>) -> Result<Self, SolveError> {
        let mut pool = Pool::new();
        let mut excluded: Vec<(SolvableId, String)> = Vec::new();
        let mut favored = HashSet::new();
        let mut channel_ranks: HashMap<Option<&'t str>, usize> = HashMap::new();
        let mut solvable_channel: HashMap<SolvableId, Option<&'t str>> = HashMap::new();
        let mut solvable_by_url = HashMap::new();

        for virtual_package in settings.virtual_packages {
            pool.add_virtual_package(virtual_package);
        }

        let channel_specific_specs: Vec<(&str, &Channel)> = settings
            .specs
            .iter()
            .filter_map(|spec| {
                let channel = spec.channel.as_deref()?;
                Some((spec.name.as_normalized(), channel))
            })
            .collect();

        // The channel in which each package name was first encountered.
        let mut first_channel_of_name: HashMap<&str, Option<&str>> = HashMap::new();

        for repo_data in repo_data {
            let records = deduplicate_archives(repo_data.records, settings.exclude_newer.as_ref())?;
            for record in records {
                let solvable = pool.add_package(record)?;
                let name = record.package_record.name.as_normalized();
                let channel = record.channel.as_deref();
                let rank = channel_ranks.len();
                channel_ranks.entry(channel).or_insert(rank);
                solvable_channel.insert(solvable, channel);
                solvable_by_url.entry(&record.url).or_insert(solvable);

                if let (Some(exclude_newer), Some(timestamp)) =
                    (&settings.exclude_newer, &record.package_record.timestamp)
                {
                    if timestamp > exclude_newer {
                        tracing::debug!(
                            "ignoring '{}' because it is newer than {exclude_newer}",
                            record.file_name
                        );
                        excluded.push((
                            solvable,
                            format!("because it was published after the cutoff date of {exclude_newer}"),
                        ));
                    }
                }

                if let Some((_, requested_channel)) = channel_specific_specs
                    .iter()
                    .find(|(spec_name, _)| *spec_name == name)
                {
                    if !is_from_channel(record, requested_channel) {
                        tracing::debug!(
                            "ignoring '{}' from {} because it was not requested from that channel",
                            record.file_name,
                            channel.unwrap_or("an unknown channel")
                        );
                        excluded.push((
                            solvable,
                            format!(
                                "because it is not from the requested channel '{}'",
                                requested_channel.canonical_name()
                            ),
                        ));
                        continue;
                    }
                }

                match first_channel_of_name.get(name) {
                    None => {
                        first_channel_of_name.insert(name, channel);
                    }
                    Some(first_channel)
                        if settings.channel_priority == ChannelPriority::Strict
                            && *first_channel != channel =>
                    {
                        tracing::debug!(
                            "ignoring '{}' from {} because of strict channel priority",
                            record.file_name,
                            channel.unwrap_or("an unknown channel")
                        );
                        excluded.push((
                            solvable,
                            format!(
                                "because of strict channel priority, '{name}' is available from '{}'",
                                first_channel.unwrap_or("an unknown channel")
                            ),
                        ));
                    }
                    Some(_) => {}
                }
            }
        }

        // Locked and pinned records are reused when they are also available
        // from the channels.
        let mut add_record = |pool: &mut Pool<'t>,
                              record: &'t RepoDataRecord|
         -> Result<SolvableId, SolveError> {
            if let Some(&solvable) = solvable_by_url.get(&record.url) {
                return Ok(solvable);
            }
            let solvable = pool.add_package(record)?;
            solvable_channel.insert(solvable, record.channel.as_deref());
            solvable_by_url.insert(&record.url, solvable);
            Ok(solvable)
        };
        for record in settings.locked_packages {
            favored.insert(add_record(&mut pool, record)?);
        }
        let pins = settings
            .pinned_packages
            .iter()
            .map(|record| add_record(&mut pool, record))
            .collect::<Result<Vec<_>, _>>()?;

        Self::sort_candidates(
            &mut pool,
            settings,
            &favored,
            &solvable_channel,
            &channel_ranks,
        );

        let virtual_requirements = settings
            .virtual_packages
            .iter()
            .map(|package| pool.add_match_spec(MatchSpec::from(package.name.clone())))
            .collect();
        let specs = settings
            .specs
            .iter()
            .map(|spec| pool.add_match_spec(spec.clone()))
            .collect();
        let constraints = settings
            .constraints
            .iter()
            .map(|spec| pool.add_match_spec(spec.clone()))
            .collect();
        let excluded = excluded
            .into_iter()
            .map(|(solvable, reason)| (solvable, pool.intern_string(reason)))
            .collect();

        Ok(Self {
            pool,
            specs,
            constraints,
            pins,
            virtual_requirements,
            excluded,
        })
    }

    fn sort_candidates(
        pool: &mut Pool<'t>,
        settings: &Settings<'t>,
        favored: &HashSet<SolvableId>,
        solvable_channel: &HashMap<SolvableId, Option<&'t str>>,
        channel_ranks: &HashMap<Option<&'t str>, usize>,
    ) {
        let mut keys: Vec<Option<SortKey<'t>>> = Vec::new();
        keys.resize_with(pool.solvable_count(), || None);
        for (id, package) in pool.packages() {
            let record = package.record();
            let package_record = record.package_record();
            let channel_rank = solvable_channel
                .get(&id)
                .and_then(|channel| channel_ranks.get(channel))
                .copied()
                .unwrap_or(usize::MAX);
            keys[id.index()] = Some(SortKey {
                name: record.name(),
                favored: favored.contains(&id),
                channel_rank,
                version: record.version(),
                build_number: package_record.map_or(0, |r| r.build_number),
                timestamp: package_record.and_then(|r| r.timestamp),
                dependency_count: package_record.map_or(0, |r| r.depends.len()),
                input_order: id.index(),
            });
        }

        let direct_dependencies: HashSet<String> = settings
            .specs
            .iter()
            .map(|spec| spec.name.as_normalized().to_owned())
            .collect();
        let comparator = CandidateComparator {
            preferences: settings.preferences,
            strategy: settings.strategy,
            use_channel_priority: settings.channel_priority != ChannelPriority::Disabled,
            direct_dependencies: &direct_dependencies,
        };
        pool.sort_candidates(|a, b| match (&keys[a.index()], &keys[b.index()]) {
            (Some(a), Some(b)) => comparator.compare(a, b),
            _ => a.cmp(&b),
        });
    }

    fn all_items(&self) -> Vec<RootItem> {
        (0..self.specs.len())
            .map(RootItem::Spec)
            .chain((0..self.constraints.len()).map(RootItem::Constraint))
            .chain((0..self.pins.len()).map(RootItem::Pin))
            .collect()
    }

    /// Builds the jobs for a subset of the task's specs, constraints and
    /// pins. Virtual packages and exclusions are always part of the jobs.
    fn jobs(&self, items: &[RootItem]) -> SolveJobs {
        let mut jobs = SolveJobs::default();
        for &spec in &self.virtual_requirements {
            jobs.install(spec);
        }
        for item in items {
            match *item {
                RootItem::Spec(idx) => jobs.install(self.specs[idx]),
                RootItem::Constraint(idx) => jobs.constrain(self.constraints[idx]),
                RootItem::Pin(idx) => jobs.lock(self.pins[idx]),
            }
        }
        for &(solvable, reason) in &self.excluded {
            jobs.exclude(solvable, reason);
        }
        jobs
    }

    /// Maps the root level clauses of a problem back to the task.
    fn root_items(&self, problem: &Problem, solver: &SatSolver<'_, '_>) -> Vec<RootItem> {
        let requirements: HashSet<MatchSpecId> =
            problem.root_requirements(solver).into_iter().collect();
        let constraints: HashSet<MatchSpecId> =
            problem.root_constraints(solver).into_iter().collect();
        let locked: HashSet<SolvableId> = problem.locked(solver).into_iter().collect();

        self.all_items()
            .into_iter()
            .filter(|item| match *item {
                RootItem::Spec(idx) => requirements.contains(&self.specs[idx]),
                RootItem::Constraint(idx) => constraints.contains(&self.constraints[idx]),
                RootItem::Pin(idx) => locked.contains(&self.pins[idx]),
            })
            .collect()
    }

    fn solve(&self, settings: &Settings<'t>, budget: SolveBudget) -> Result<SolverResult, SolveError> {
        let mut solver = SatSolver::new(&self.pool);
        match solver.solve(&self.jobs(&self.all_items()), budget) {
            Ok(solvables) => {
                let records = solvables
                    .into_iter()
                    .filter_map(|id| self.pool.resolve_package(id))
                    .filter_map(|package| package.record().repo_data_record())
                    .cloned()
                    .collect();
                Ok(SolverResult {
                    records: PackageRecord::sort_topologically(records),
                })
            }
            Err(SolveFailure::Timeout) => Err(SolveError::Timeout),
            Err(SolveFailure::Unsolvable(problem)) => {
                let explanation = problem.display_user_friendly(&solver).to_string();
                let core = self.root_items(&problem, &solver);
                let (core, explanation) = self.minimize(core, explanation, budget);
                let conflicts = core
                    .into_iter()
                    .map(|item| match item {
                        RootItem::Spec(idx) => ConflictingConstraint::Spec(settings.specs[idx].clone()),
                        RootItem::Constraint(idx) => {
                            ConflictingConstraint::Constraint(settings.constraints[idx].clone())
                        }
                        RootItem::Pin(idx) => {
                            ConflictingConstraint::Pin(settings.pinned_packages[idx].clone())
                        }
                    })
                    .collect();
                Err(SolveError::Unsolvable(UnsolvableError {
                    conflicts,
                    explanation,
                }))
            }
        }
    }

    /// Removes entries from an unsolvable selection of specs, constraints and
    /// pins one at a time. An entry is dropped when the selection stays
    /// unsolvable without it. Stops early when the budget is exhausted.
    fn minimize(
        &self,
        mut core: Vec<RootItem>,
        mut explanation: String,
        budget: SolveBudget,
    ) -> (Vec<RootItem>, String) {
        let mut idx = 0;
        while idx < core.len() {
            let mut reduced = core.clone();
            reduced.remove(idx);

            let mut solver = SatSolver::new(&self.pool);
            match solver.solve(&self.jobs(&reduced), budget) {
                Ok(_) => idx += 1,
                Err(SolveFailure::Unsolvable(problem)) => {
                    explanation = problem.display_user_friendly(&solver).to_string();
                    let involved: HashSet<RootItem> =
                        self.root_items(&problem, &solver).into_iter().collect();
                    core = reduced
                        .into_iter()
                        .filter(|item| involved.contains(item))
                        .collect();
                    idx = idx.min(core.len());
                }
                Err(SolveFailure::Timeout) => {
                    tracing::debug!("the budget is exhausted, the conflict is not minimal");
                    break;
                }
            }
        }
        (core, explanation)
    }
}

#[cfg(test)]
mod test {
    use super::deduplicate_archives;
    use crate::SolveError;
    use assert_matches::assert_matches;
    use rattler_conda_types::{PackageName, PackageRecord, RepoDataRecord, Version};
    use std::str::FromStr;

    fn record(file_name: &str) -> RepoDataRecord {
        RepoDataRecord {
            package_record: PackageRecord::new(
                PackageName::new_unchecked("foo"),
                Version::from_str("1.0").unwrap(),
                "0".to_owned(),
            ),
            file_name: file_name.to_owned(),
            url: format!("https://conda.example.com/test/noarch/{file_name}")
                .parse()
                .unwrap(),
            channel: Some("test".to_owned()),
        }
    }

    #[test]
    fn test_conda_archive_is_preferred() {
        let tar_bz2 = record("foo-1.0-0.tar.bz2");
        let conda = record("foo-1.0-0.conda");
        let other = record("foo-2.0-0.tar.bz2");

        let records = deduplicate_archives(vec![&tar_bz2, &other, &conda], None).unwrap();
        let file_names: Vec<_> = records.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(file_names, vec!["foo-1.0-0.conda", "foo-2.0-0.tar.bz2"]);
    }

    #[test]
    fn test_duplicate_records() {
        let first = record("foo-1.0-0.conda");
        let second = record("foo-1.0-0.conda");
        assert_matches!(
            deduplicate_archives(vec![&first, &second], None),
            Err(SolveError::DuplicateRecords(name)) if name == "foo-1.0-0.conda"
        );
    }
}
