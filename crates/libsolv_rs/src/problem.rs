use crate::id::{ClauseId, MatchSpecId, SolvableId, StringId};
use crate::pool::Pool;
use crate::solver::clause::Clause;
use crate::solver::Solver;
use itertools::Itertools;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::{Display, Formatter};

/// The clauses that together make a solve impossible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    clauses: Vec<ClauseId>,
}

impl Problem {
    pub(crate) fn new(clauses: Vec<ClauseId>) -> Self {
        Self { clauses }
    }

    /// The specs requested by the jobs that take part in the conflict, in the order in which
    /// they were requested.
    pub fn root_requirements(&self, solver: &Solver<'_, '_>) -> Vec<MatchSpecId> {
        self.kinds(solver)
            .filter_map(|kind| match kind {
                Clause::Requires(parent, spec) if parent.is_root() => Some(spec),
                _ => None,
            })
            .unique()
            .collect()
    }

    /// The constraints of the jobs that take part in the conflict.
    pub fn root_constraints(&self, solver: &Solver<'_, '_>) -> Vec<MatchSpecId> {
        self.kinds(solver)
            .filter_map(|kind| match kind {
                Clause::Constrains(parent, _, spec) if parent.is_root() => Some(spec),
                _ => None,
            })
            .unique()
            .collect()
    }

    /// The locked solvables that take part in the conflict.
    pub fn locked(&self, solver: &Solver<'_, '_>) -> Vec<SolvableId> {
        self.kinds(solver)
            .filter_map(|kind| match kind {
                Clause::Lock(locked, _) => Some(locked),
                _ => None,
            })
            .unique()
            .collect()
    }

    fn kinds<'s>(&'s self, solver: &'s Solver<'_, '_>) -> impl Iterator<Item = Clause> + 's {
        self.clauses.iter().map(|&id| solver.clauses[id].kind)
    }

    /// Builds a graph of the conflict, see [`ProblemGraph`].
    pub fn graph(&self, solver: &Solver<'_, '_>) -> ProblemGraph {
        let clauses = self
            .clauses
            .iter()
            .map(|&id| (id, solver.clauses[id].kind))
            .collect();
        ProblemGraph::new(solver.pool(), clauses)
    }

    /// Returns an object that renders the conflict as a list of statements that a user can read,
    /// starting at the request and following the dependencies.
    pub fn display_user_friendly<'s>(
        &'s self,
        solver: &'s Solver<'_, '_>,
    ) -> DisplayProblem<'s> {
        DisplayProblem {
            clauses: self.graph(solver).clauses_from_root(),
            pool: solver.pool(),
        }
    }
}

/// A node in the [`ProblemGraph`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProblemNode {
    /// A solvable, or the request itself
    Solvable(SolvableId),

    /// The missing candidates of a requirement
    Missing(MatchSpecId),

    /// The reason a solvable was excluded
    Excluded(StringId),
}

/// The clauses of a [`Problem`] laid out as a graph: requirements point from a solvable to its
/// candidates, constraints and conflicts point from the solvable that imposes them to the
/// solvable they forbid.
pub struct ProblemGraph {
    graph: DiGraph<ProblemNode, (ClauseId, Clause)>,
    root: NodeIndex,
}

impl ProblemGraph {
    fn new(pool: &Pool<'_>, clauses: Vec<(ClauseId, Clause)>) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        let mut node = |graph: &mut DiGraph<ProblemNode, (ClauseId, Clause)>, kind: ProblemNode| {
            *nodes.entry(kind).or_insert_with(|| graph.add_node(kind))
        };
        let root = node(&mut graph, ProblemNode::Solvable(SolvableId::root()));

        for (id, clause) in clauses {
            let edges = match clause {
                Clause::InstallRoot | Clause::Learnt(_) => continue,
                Clause::Requires(parent, spec) => {
                    let candidates = pool.candidates(spec);
                    if candidates.is_empty() {
                        vec![(ProblemNode::Solvable(parent), ProblemNode::Missing(spec))]
                    } else {
                        candidates
                            .iter()
                            .map(|&candidate| {
                                (ProblemNode::Solvable(parent), ProblemNode::Solvable(candidate))
                            })
                            .collect()
                    }
                }
                Clause::ForbidMultipleInstances(a, b)
                | Clause::Constrains(a, b, _)
                | Clause::Lock(a, b) => vec![(ProblemNode::Solvable(a), ProblemNode::Solvable(b))],
                Clause::Excluded(solvable, reason) => vec![(
                    ProblemNode::Solvable(solvable),
                    ProblemNode::Excluded(reason),
                )],
            };
            for (from, to) in edges {
                let from = node(&mut graph, from);
                let to = node(&mut graph, to);
                graph.add_edge(from, to, (id, clause));
            }
        }

        Self { graph, root }
    }

    /// The number of distinct solvables and reasons that take part in the conflict.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// The clauses of the graph in the order in which they are encountered when walking the
    /// graph breadth first from the request. Clauses that cannot be reached from the request
    /// follow in their original order.
    pub(crate) fn clauses_from_root(&self) -> Vec<Clause> {
        let mut ordered = Vec::new();
        let mut emitted = HashSet::new();
        let mut visited = HashSet::from([self.root]);
        let mut queue = VecDeque::from([self.root]);

        while let Some(node) = queue.pop_front() {
            // Edges are returned most recent first, sort them back into clause order.
            let mut edges = self
                .graph
                .edges_directed(node, Direction::Outgoing)
                .collect_vec();
            edges.sort_by_key(|edge| edge.id());
            for edge in edges {
                let (id, clause) = *edge.weight();
                if emitted.insert(id) {
                    ordered.push(clause);
                }
                if visited.insert(edge.target()) {
                    queue.push_back(edge.target());
                }
            }
        }

        let mut remaining = self
            .graph
            .edge_weights()
            .filter(|(id, _)| !emitted.contains(id))
            .copied()
            .collect_vec();
        remaining.sort_by_key(|(id, _)| *id);
        ordered.extend(remaining.into_iter().dedup_by(|a, b| a.0 == b.0).map(|(_, clause)| clause));
        ordered
    }
}

/// Renders a [`Problem`], see [`Problem::display_user_friendly`].
pub struct DisplayProblem<'s> {
    clauses: Vec<Clause>,
    pool: &'s Pool<'s>,
}

impl DisplayProblem<'_> {
    fn solvable(&self, id: SolvableId) -> String {
        match self.pool.resolve_package(id) {
            Some(package) => {
                let record = package.record();
                format!("{} {}", record.name(), record.version())
            }
            None => "the request".to_owned(),
        }
    }

    fn candidates(&self, spec: MatchSpecId) -> Option<String> {
        let candidates = self.pool.candidates(spec);
        let first = self.pool.resolve_package(*candidates.first()?)?;
        let versions = candidates
            .iter()
            .filter_map(|&id| self.pool.resolve_package(id))
            .map(|package| package.record().version().to_string())
            .unique()
            .join(" | ");
        Some(format!("{} {}", first.record().name(), versions))
    }
}

impl Display for DisplayProblem<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "The following packages are incompatible")?;
        for &clause in &self.clauses {
            match clause {
                Clause::InstallRoot | Clause::Learnt(_) => continue,
                Clause::Requires(parent, spec) => {
                    let spec_str = self.pool.resolve_match_spec(spec);
                    match (parent.is_root(), self.candidates(spec)) {
                        (true, Some(candidates)) => {
                            writeln!(f, "- {spec_str} can be installed with {candidates}")?
                        }
                        (true, None) => {
                            writeln!(f, "- no candidates were found for {spec_str}")?
                        }
                        (false, Some(candidates)) => writeln!(
                            f,
                            "- {} requires {spec_str}, which can be installed with {candidates}",
                            self.solvable(parent)
                        )?,
                        (false, None) => writeln!(
                            f,
                            "- {} requires {spec_str}, for which no candidates were found",
                            self.solvable(parent)
                        )?,
                    }
                }
                Clause::ForbidMultipleInstances(a, b) => writeln!(
                    f,
                    "- {} and {} cannot be installed together",
                    self.solvable(a),
                    self.solvable(b)
                )?,
                Clause::Constrains(parent, forbidden, spec) => {
                    let spec = self.pool.resolve_match_spec(spec);
                    if parent.is_root() {
                        writeln!(
                            f,
                            "- {} is forbidden by the constraint {spec}",
                            self.solvable(forbidden)
                        )?
                    } else {
                        writeln!(
                            f,
                            "- {} constrains {spec}, which forbids {}",
                            self.solvable(parent),
                            self.solvable(forbidden)
                        )?
                    }
                }
                Clause::Lock(locked, other) => writeln!(
                    f,
                    "- {} cannot be installed because {} is locked",
                    self.solvable(other),
                    self.solvable(locked)
                )?,
                Clause::Excluded(solvable, reason) => writeln!(
                    f,
                    "- {} is excluded {}",
                    self.solvable(solvable),
                    self.pool.resolve_string(reason)
                )?,
            }
        }
        Ok(())
    }
}
