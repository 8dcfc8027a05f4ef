use crate::arena::Arena;
use crate::id::{ClauseId, LearntClauseId, MatchSpecId, NameId, SolvableId};
use crate::pool::Pool;
use crate::problem::Problem;
use crate::solve_jobs::SolveJobs;
use itertools::Itertools;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Instant;

use clause::{Clause, ClauseState, Literal};
use decision_tracker::DecisionTracker;
use watch_map::WatchMap;

pub(crate) mod clause;
mod decision_tracker;
mod watch_map;

/// Limits the amount of work a single solve may do.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SolveBudget {
    /// The solve fails with [`SolveFailure::Timeout`] when this moment has passed.
    pub deadline: Option<Instant>,

    /// The maximum number of decisions and conflicts the solver may go through.
    pub max_steps: Option<u64>,
}

impl SolveBudget {
    /// A budget without limits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    fn is_exceeded(&self, steps: u64) -> bool {
        self.max_steps.is_some_and(|max_steps| steps > max_steps)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// The reasons a solve can fail.
#[derive(Debug)]
pub enum SolveFailure {
    /// The jobs cannot be satisfied
    Unsolvable(Problem),

    /// The solve ran out of budget before a solution or a refutation was found
    Timeout,
}

/// A requirement of an installed solvable, with its candidates in preference order.
struct Requirement {
    parent: SolvableId,
    candidates: Rc<[SolvableId]>,
}

/// A CDCL SAT solver operating on the solvables of a [`Pool`].
pub struct Solver<'p, 'a> {
    pool: &'p Pool<'a>,

    pub(crate) clauses: Arena<ClauseId, ClauseState>,
    pub(crate) learnt_why: Arena<LearntClauseId, Vec<ClauseId>>,
    requirements: Vec<Requirement>,
    watches: WatchMap,
    decisions: DecisionTracker,

    steps: u64,
    conflicts: u64,
}

impl<'p, 'a> Solver<'p, 'a> {
    /// Creates a solver for the packages in the pool.
    pub fn new(pool: &'p Pool<'a>) -> Self {
        Self {
            pool,
            clauses: Arena::new(),
            learnt_why: Arena::new(),
            requirements: Vec::new(),
            watches: WatchMap::new(0),
            decisions: DecisionTracker::new(0),
            steps: 0,
            conflicts: 0,
        }
    }

    /// The pool this solver operates on.
    pub fn pool(&self) -> &'p Pool<'a> {
        self.pool
    }

    /// Solves the jobs. On success the installed solvables are returned, ordered by id. The root
    /// solvable is never part of the result.
    pub fn solve(
        &mut self,
        jobs: &SolveJobs,
        budget: SolveBudget,
    ) -> Result<Vec<SolvableId>, SolveFailure> {
        let solvable_count = self.pool.solvable_count();
        self.clauses = Arena::new();
        self.learnt_why = Arena::new();
        self.requirements.clear();
        self.watches = WatchMap::new(solvable_count);
        self.decisions = DecisionTracker::new(solvable_count);
        self.steps = 0;
        self.conflicts = 0;

        self.add_clauses(jobs);
        tracing::debug!(
            "generated {} clauses for {} solvables",
            self.clauses.len(),
            solvable_count
        );

        let result = self.run_sat(budget);
        tracing::debug!(
            "solver finished after {} steps and {} conflicts, learnt {} clauses",
            self.steps,
            self.conflicts,
            self.learnt_why.len()
        );
        result.map(|()| self.decisions.installed())
    }

    fn add_clause(&mut self, clause: ClauseState) -> ClauseId {
        let watched = clause.is_watched();
        let id = self.clauses.alloc(clause);
        if watched {
            self.watches.start_watching(id, &self.clauses[id]);
        }
        id
    }

    /// Encodes the jobs and every package that is reachable from them as clauses.
    fn add_clauses(&mut self, jobs: &SolveJobs) {
        let pool = self.pool;
        self.add_clause(ClauseState::install_root());

        let mut visited = vec![false; pool.solvable_count()];
        visited[SolvableId::root().index()] = true;
        let mut queue = VecDeque::new();

        for &spec in &jobs.install {
            self.add_requires(SolvableId::root(), spec, &mut visited, &mut queue);
        }
        for &spec in &jobs.constrain {
            self.add_constrains(SolvableId::root(), spec);
        }

        while let Some(solvable) = queue.pop_front() {
            let Some(package) = pool.resolve_package(solvable) else {
                continue;
            };
            for &spec in package.dependencies() {
                self.add_requires(solvable, spec, &mut visited, &mut queue);
            }
            for &spec in package.constrains() {
                self.add_constrains(solvable, spec);
            }
        }

        // Only one solvable per package name can be installed.
        let mut by_name: BTreeMap<NameId, Vec<SolvableId>> = BTreeMap::new();
        for (id, package) in pool.packages() {
            if visited[id.index()] {
                by_name.entry(package.name()).or_default().push(id);
            }
        }
        for solvables in by_name.values() {
            for (a, b) in solvables.iter().copied().tuple_combinations() {
                self.add_clause(ClauseState::forbid_multiple(a, b));
            }
        }

        for &locked in &jobs.lock {
            let Some(package) = pool.resolve_package(locked) else {
                continue;
            };
            for &other in pool.packages_by_name(package.name()) {
                if other != locked && visited[other.index()] {
                    self.add_clause(ClauseState::lock(locked, other));
                }
            }
        }

        for &(solvable, reason) in &jobs.exclude {
            self.add_clause(ClauseState::excluded(solvable, reason));
        }
    }

    fn add_requires(
        &mut self,
        parent: SolvableId,
        spec: MatchSpecId,
        visited: &mut [bool],
        queue: &mut VecDeque<SolvableId>,
    ) {
        let candidates = self.pool.candidates(spec);
        for &candidate in candidates.iter() {
            if !visited[candidate.index()] {
                visited[candidate.index()] = true;
                queue.push_back(candidate);
            }
        }
        self.add_clause(ClauseState::requires(parent, spec, &candidates));
        self.requirements.push(Requirement {
            parent,
            candidates,
        });
    }

    fn add_constrains(&mut self, parent: SolvableId, spec: MatchSpecId) {
        for &forbidden in self.pool.forbidden(spec).iter() {
            self.add_clause(ClauseState::constrains(parent, forbidden, spec));
        }
    }

    fn run_sat(&mut self, budget: SolveBudget) -> Result<(), SolveFailure> {
        // Assertions are decided before anything else.
        let assertions: Vec<ClauseId> = self
            .clauses
            .iter()
            .filter(|(_, clause)| !clause.is_watched())
            .map(|(id, _)| id)
            .collect();
        for clause_id in assertions {
            let literal = self.clauses[clause_id].literals[0];
            match literal.eval(&self.decisions) {
                Some(true) => {}
                Some(false) => return Err(self.unsolvable(clause_id)),
                None => self.decisions.assign(
                    literal.solvable,
                    literal.satisfying_value(),
                    Some(clause_id),
                ),
            }
        }
        if let Err(conflict) = self.propagate() {
            return Err(self.unsolvable(conflict));
        }

        loop {
            if budget.is_exceeded(self.steps) {
                return Err(SolveFailure::Timeout);
            }
            let Some(candidate) = self.next_decision() else {
                return Ok(());
            };
            self.steps += 1;
            self.decisions.new_level();
            tracing::trace!(
                "level {}: deciding to install {}",
                self.decisions.level(),
                self.pool.solvable_display(candidate)
            );
            self.decisions.assign(candidate, true, None);

            while let Err(conflict) = self.propagate() {
                if self.decisions.level() == 0 {
                    return Err(self.unsolvable(conflict));
                }
                self.steps += 1;
                self.conflicts += 1;

                let (literals, backjump_level, why) = self.analyze(conflict);
                tracing::trace!(
                    "conflict at level {}, learnt a clause of {} literals, backjumping to level {}",
                    self.decisions.level(),
                    literals.len(),
                    backjump_level
                );
                self.decisions.undo_until(backjump_level);

                let asserting = literals[0];
                let learnt_id = self.learnt_why.alloc(why);
                let clause_id = self.add_clause(ClauseState::learnt(learnt_id, literals));
                self.decisions.assign(
                    asserting.solvable,
                    asserting.satisfying_value(),
                    Some(clause_id),
                );

                if budget.is_exceeded(self.steps) {
                    return Err(SolveFailure::Timeout);
                }
            }
        }
    }

    /// Unit propagation using the two watched literals of every clause. Returns the clause that
    /// became false if a conflict is found.
    fn propagate(&mut self) -> Result<(), ClauseId> {
        while let Some(solvable) = self.decisions.next_unpropagated() {
            let Some(value) = self.decisions.value(solvable) else {
                continue;
            };
            let false_literal = Literal {
                solvable,
                negate: value,
            };

            let mut remaining = self.watches.take(false_literal).into_iter();
            let mut kept = Vec::new();
            let mut conflict = None;

            for clause_id in remaining.by_ref() {
                let clause = &mut self.clauses[clause_id];
                if clause.literals[0] == false_literal {
                    clause.literals.swap(0, 1);
                }

                let other = clause.literals[0];
                let other_value = other.eval(&self.decisions);
                if other_value == Some(true) {
                    kept.push(clause_id);
                    continue;
                }

                let replacement = (2..clause.literals.len())
                    .find(|&idx| clause.literals[idx].eval(&self.decisions) != Some(false));
                if let Some(idx) = replacement {
                    clause.literals.swap(1, idx);
                    self.watches.watch(clause.literals[1], clause_id);
                    continue;
                }

                kept.push(clause_id);
                if other_value == Some(false) {
                    conflict = Some(clause_id);
                    break;
                }
                self.decisions
                    .assign(other.solvable, other.satisfying_value(), Some(clause_id));
            }

            kept.extend(remaining);
            self.watches.restore(false_literal, kept);
            if let Some(conflict) = conflict {
                return Err(conflict);
            }
        }
        Ok(())
    }

    /// Picks the requirement of an installed solvable that is not yet satisfied and has the
    /// fewest undecided candidates, and returns its most preferred undecided candidate.
    fn next_decision(&self) -> Option<SolvableId> {
        let mut best: Option<(usize, SolvableId)> = None;
        for requirement in &self.requirements {
            if self.decisions.value(requirement.parent) != Some(true) {
                continue;
            }

            let mut undecided = 0;
            let mut first_undecided = None;
            let mut satisfied = false;
            for &candidate in requirement.candidates.iter() {
                match self.decisions.value(candidate) {
                    Some(true) => {
                        satisfied = true;
                        break;
                    }
                    Some(false) => {}
                    None => {
                        undecided += 1;
                        first_undecided.get_or_insert(candidate);
                    }
                }
            }

            let Some(candidate) = first_undecided.filter(|_| !satisfied) else {
                continue;
            };
            match best {
                Some((count, _)) if count <= undecided => {}
                _ => best = Some((undecided, candidate)),
            }
        }
        best.map(|(_, candidate)| candidate)
    }

    /// First-UIP conflict analysis. Returns the learnt clause with the asserting literal first
    /// and the literal of the highest remaining level second, the level to backjump to and the
    /// clauses that were resolved to derive it.
    fn analyze(&self, conflict: ClauseId) -> (Vec<Literal>, u32, Vec<ClauseId>) {
        let current_level = self.decisions.level();
        let trail = self.decisions.trail();

        let mut seen = HashSet::new();
        let mut learnt = Vec::new();
        let mut why = vec![conflict];
        let mut pending = 0usize;
        let mut trail_idx = trail.len();
        let mut clause_id = conflict;

        let uip = loop {
            for &literal in &self.clauses[clause_id].literals {
                if !seen.insert(literal.solvable) {
                    continue;
                }
                let level = self.decisions.level_of(literal.solvable);
                if level == current_level {
                    pending += 1;
                } else if level > 0 {
                    learnt.push(literal);
                }
            }

            let solvable = loop {
                trail_idx -= 1;
                let solvable = trail[trail_idx];
                if seen.contains(&solvable) && self.decisions.level_of(solvable) == current_level
                {
                    break solvable;
                }
            };

            pending -= 1;
            if pending == 0 {
                break solvable;
            }
            match self.decisions.reason(solvable) {
                Some(reason) => {
                    why.push(reason);
                    clause_id = reason;
                }
                None => break solvable,
            }
        };

        let asserting = Literal {
            solvable: uip,
            negate: self.decisions.value(uip).unwrap_or(false),
        };
        let mut literals = Vec::with_capacity(learnt.len() + 1);
        literals.push(asserting);
        literals.extend(learnt);

        let highest = literals
            .iter()
            .enumerate()
            .skip(1)
            .map(|(idx, literal)| (idx, self.decisions.level_of(literal.solvable)))
            .max_by_key(|&(_, level)| level);
        let backjump_level = match highest {
            Some((idx, level)) => {
                literals.swap(1, idx);
                level
            }
            None => 0,
        };

        (literals, backjump_level, why)
    }

    /// Collects the original clauses that take part in a conflict at level 0.
    fn unsolvable(&self, conflict: ClauseId) -> SolveFailure {
        let mut problem = Vec::new();
        let mut visited_clauses = HashSet::new();
        let mut visited_solvables = HashSet::new();
        let mut stack = vec![conflict];

        while let Some(clause_id) = stack.pop() {
            if !visited_clauses.insert(clause_id) {
                continue;
            }
            let clause = &self.clauses[clause_id];
            match clause.kind {
                Clause::Learnt(learnt_id) => stack.extend(self.learnt_why[learnt_id].iter()),
                _ => problem.push(clause_id),
            }
            for literal in &clause.literals {
                if visited_solvables.insert(literal.solvable) {
                    stack.extend(self.decisions.reason(literal.solvable));
                }
            }
        }

        problem.sort();
        tracing::debug!("the jobs are unsolvable, {} clauses are involved", problem.len());
        SolveFailure::Unsolvable(Problem::new(problem))
    }
}

#[cfg(test)]
mod test {
    use super::{SolveBudget, SolveFailure, Solver};
    use crate::{Pool, SolvableId, SolveJobs};
    use rattler_conda_types::{
        GenericVirtualPackage, MatchSpec, PackageName, PackageRecord, RepoDataRecord, Version,
    };
    use std::str::FromStr;

    fn record(name: &str, version: &str, depends: &[&str], constrains: &[&str]) -> RepoDataRecord {
        let mut package_record = PackageRecord::new(
            PackageName::new_unchecked(name),
            Version::from_str(version).unwrap(),
            "0".to_owned(),
        );
        package_record.subdir = "linux-64".to_owned();
        package_record.depends = depends.iter().map(|s| (*s).to_owned()).collect();
        package_record.constrains = constrains.iter().map(|s| (*s).to_owned()).collect();
        let file_name = format!("{name}-{version}-0.conda");
        RepoDataRecord {
            url: format!("https://conda.example.com/test/linux-64/{file_name}")
                .parse()
                .unwrap(),
            file_name,
            channel: Some("test".to_owned()),
            package_record,
        }
    }

    /// Builds a pool where the candidates of each name are sorted by descending version.
    fn pool(records: &[RepoDataRecord]) -> Pool<'_> {
        let mut pool = Pool::new();
        for record in records {
            pool.add_package(record).unwrap();
        }
        sort_highest_first(&mut pool);
        pool
    }

    fn sort_highest_first(pool: &mut Pool<'_>) {
        let versions: Vec<Option<Version>> = (0..pool.solvable_count())
            .map(|idx| {
                pool.packages()
                    .find(|(id, _)| id.index() == idx)
                    .map(|(_, package)| package.record().version().clone())
            })
            .collect();
        pool.sort_candidates(|a, b| versions[b.index()].cmp(&versions[a.index()]));
    }

    fn install(pool: &mut Pool<'_>, specs: &[&str]) -> SolveJobs {
        let mut jobs = SolveJobs::default();
        for spec in specs {
            let spec = pool.add_match_spec(spec.parse::<MatchSpec>().unwrap());
            jobs.install(spec);
        }
        jobs
    }

    fn solution(pool: &Pool<'_>, solvables: &[SolvableId]) -> Vec<String> {
        let mut names: Vec<_> = solvables
            .iter()
            .map(|&id| {
                let record = pool.resolve_package(id).unwrap().record();
                format!("{}={}", record.name(), record.version())
            })
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_installs_highest_versions() {
        let records = [
            record("foo", "1.0", &[], &[]),
            record("foo", "2.0", &["bar"], &[]),
            record("bar", "1.0", &[], &[]),
            record("bar", "1.5", &[], &[]),
        ];
        let mut pool = pool(&records);
        let jobs = install(&mut pool, &["foo"]);

        let mut solver = Solver::new(&pool);
        let solved = solver.solve(&jobs, SolveBudget::unlimited()).unwrap();
        assert_eq!(solution(&pool, &solved), vec!["bar=1.5", "foo=2.0"]);
    }

    #[test]
    fn test_backtracks_to_compatible_version() {
        let records = [
            record("foo", "2.0", &["bar >=2"], &[]),
            record("foo", "1.0", &["bar <2"], &[]),
            record("bar", "1.0", &[], &[]),
            record("bar", "2.0", &["baz"], &[]),
        ];
        let mut pool = pool(&records);
        // `bar 2.0` needs `baz` which does not exist, so `foo 1.0` must be used.
        let jobs = install(&mut pool, &["foo"]);

        let mut solver = Solver::new(&pool);
        let solved = solver.solve(&jobs, SolveBudget::unlimited()).unwrap();
        assert_eq!(solution(&pool, &solved), vec!["bar=1.0", "foo=1.0"]);
    }

    #[test]
    fn test_learns_from_conflicts() {
        let records = [
            record("a", "2.0", &["b 2.*"], &[]),
            record("a", "1.0", &["b 1.*"], &[]),
            record("b", "2.0", &[], &[]),
            record("b", "1.0", &[], &[]),
            record("c", "2.0", &[], &["b <2"]),
            record("c", "1.0", &[], &["b >=3"]),
        ];
        let mut pool = pool(&records);
        let jobs = install(&mut pool, &["c", "a"]);

        let mut solver = Solver::new(&pool);
        let solved = solver.solve(&jobs, SolveBudget::unlimited()).unwrap();
        assert_eq!(solution(&pool, &solved), vec!["a=1.0", "b=1.0", "c=2.0"]);
    }

    #[test]
    fn test_constraints_do_not_install() {
        let records = [
            record("foo", "1.0", &[], &["bar <2"]),
            record("bar", "2.0", &[], &[]),
        ];
        let mut pool = pool(&records);
        let jobs = install(&mut pool, &["foo"]);

        let mut solver = Solver::new(&pool);
        let solved = solver.solve(&jobs, SolveBudget::unlimited()).unwrap();
        assert_eq!(solution(&pool, &solved), vec!["foo=1.0"]);
    }

    #[test]
    fn test_virtual_packages() {
        let records = [
            record("foo", "2.0", &["__glibc >=2.28"], &[]),
            record("foo", "1.0", &["__glibc >=2.17"], &[]),
        ];
        let glibc = GenericVirtualPackage {
            name: PackageName::new_unchecked("__glibc"),
            version: Version::from_str("2.17").unwrap(),
            build_string: "0".to_owned(),
        };
        let mut pool = Pool::new();
        for record in &records {
            pool.add_package(record).unwrap();
        }
        pool.add_virtual_package(&glibc);
        sort_highest_first(&mut pool);
        let jobs = install(&mut pool, &["foo"]);

        let mut solver = Solver::new(&pool);
        let solved = solver.solve(&jobs, SolveBudget::unlimited()).unwrap();
        assert_eq!(solution(&pool, &solved), vec!["__glibc=2.17", "foo=1.0"]);
    }

    #[test]
    fn test_excluded_solvable() {
        let records = [record("foo", "2.0", &[], &[]), record("foo", "1.0", &[], &[])];
        let mut pool = pool(&records);
        let mut jobs = install(&mut pool, &["foo"]);
        let reason = pool.intern_string("because it is too new");
        let newest = pool.packages_by_name(pool.lookup_package_name("foo").unwrap())[0];
        jobs.exclude(newest, reason);

        let mut solver = Solver::new(&pool);
        let solved = solver.solve(&jobs, SolveBudget::unlimited()).unwrap();
        assert_eq!(solution(&pool, &solved), vec!["foo=1.0"]);
    }

    #[test]
    fn test_contradictory_requests() {
        let records = [record("foo", "1.0", &[], &[]), record("foo", "2.0", &[], &[])];
        let mut pool = pool(&records);
        let jobs = install(&mut pool, &["foo ==1.0", "foo ==2.0"]);

        let mut solver = Solver::new(&pool);
        let Err(SolveFailure::Unsolvable(problem)) = solver.solve(&jobs, SolveBudget::unlimited())
        else {
            panic!("expected the solve to fail");
        };
        assert_eq!(problem.root_requirements(&solver), jobs.install);
    }

    #[test]
    fn test_missing_dependency() {
        let records = [record("foo", "1.0", &["bar"], &[])];
        let mut pool = pool(&records);
        let jobs = install(&mut pool, &["foo"]);

        let mut solver = Solver::new(&pool);
        let Err(SolveFailure::Unsolvable(problem)) = solver.solve(&jobs, SolveBudget::unlimited())
        else {
            panic!("expected the solve to fail");
        };
        insta::assert_snapshot!(problem.display_user_friendly(&solver).to_string(), @r###"
        The following packages are incompatible
        - foo can be installed with foo 1.0
        - foo 1.0 requires bar, for which no candidates were found
        "###);
    }

    #[test]
    fn test_step_budget() {
        let records = [record("foo", "1.0", &[], &[]), record("foo", "2.0", &[], &[])];
        let mut pool = pool(&records);
        let jobs = install(&mut pool, &["foo"]);

        let mut solver = Solver::new(&pool);
        let budget = SolveBudget {
            max_steps: Some(0),
            ..SolveBudget::default()
        };
        assert!(matches!(
            solver.solve(&jobs, budget),
            Err(SolveFailure::Timeout)
        ));
    }
}
