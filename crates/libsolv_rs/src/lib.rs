//! `libsolv_rs` is a SAT solver for conda package dependencies. It is inspired by the solver in
//! [libsolv](https://github.com/openSUSE/libsolv) but only implements what is needed to solve
//! conda environments.
//!
//! Packages are added to a [`Pool`], the packages a solve has to install are described by
//! [`SolveJobs`], and a [`Solver`] either returns the solvables that should be installed or a
//! [`Problem`] that explains why that is impossible.
//!
//! The solver is a conflict-driven clause learning (CDCL) solver. Every package is a boolean
//! variable. Requirements, constraints and the rule that at most one version of a package can be
//! installed are encoded as clauses, which are propagated with two watched literals per clause.
//! When a conflict is found, the solver learns a new clause through first-UIP conflict analysis
//! and backjumps to the level at which the learnt clause becomes unit.

mod arena;
mod id;
mod pool;
mod problem;
mod solvable;
mod solve_jobs;
mod solver;

pub use id::{MatchSpecId, NameId, SolvableId, StringId};
pub use pool::Pool;
pub use problem::{DisplayProblem, Problem, ProblemGraph, ProblemNode};
pub use solvable::{PackageSolvable, Solvable, SolvableRecord};
pub use solve_jobs::SolveJobs;
pub use solver::{SolveBudget, SolveFailure, Solver};
