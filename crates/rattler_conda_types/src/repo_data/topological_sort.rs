use super::PackageRecord;
use std::collections::{BTreeSet, HashMap};

/// Extracts the package name from a dependency string like `python >=3.8` or
/// `conda-forge::numpy 1.*`.
fn dependency_name(spec: &str) -> &str {
    let spec = spec.trim();
    let spec = spec.rsplit_once("::").map_or(spec, |(_, rest)| rest);
    let end = spec
        .find(|c: char| c.is_whitespace() || matches!(c, '=' | '<' | '>' | '!' | '~' | '['))
        .unwrap_or(spec.len());
    &spec[..end]
}

/// Sorts records so that dependencies come before the packages that depend on them using
/// Kahn's algorithm. Among the packages that are ready to be placed, the alphabetically first is
/// picked. If only packages that are part of a cycle remain, the alphabetically first one of
/// them is placed regardless of its unplaced dependencies.
pub(super) fn sort_topologically<T: AsRef<PackageRecord>>(records: Vec<T>) -> Vec<T> {
    let names: Vec<String> = records
        .iter()
        .map(|r| r.as_ref().name.as_normalized().to_owned())
        .collect();
    let index_by_name: HashMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();

    // For every record, the records that depend on it.
    let mut dependents = vec![Vec::new(); records.len()];
    let mut unplaced_dependencies = vec![0usize; records.len()];
    for (idx, record) in records.iter().enumerate() {
        let mut seen = BTreeSet::new();
        for dependency in &record.as_ref().depends {
            let name = dependency_name(dependency).to_lowercase();
            let Some(&dependency_idx) = index_by_name.get(name.as_str()) else {
                continue;
            };
            if dependency_idx != idx && seen.insert(dependency_idx) {
                dependents[dependency_idx].push(idx);
                unplaced_dependencies[idx] += 1;
            }
        }
    }

    let mut ready: BTreeSet<(&str, usize)> = unplaced_dependencies
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(idx, _)| (names[idx].as_str(), idx))
        .collect();
    let mut remaining: BTreeSet<(&str, usize)> = names
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();

    let mut order = Vec::with_capacity(records.len());
    while let Some(&first_remaining) = remaining.first() {
        let next = match ready.pop_first() {
            Some(next) => next,
            None => {
                tracing::trace!("breaking dependency cycle at '{}'", first_remaining.0);
                first_remaining
            }
        };
        remaining.remove(&next);
        let idx = next.1;
        order.push(idx);
        for &dependent in &dependents[idx] {
            if !remaining.contains(&(names[dependent].as_str(), dependent)) {
                continue;
            }
            unplaced_dependencies[dependent] = unplaced_dependencies[dependent].saturating_sub(1);
            if unplaced_dependencies[dependent] == 0 {
                ready.insert((names[dependent].as_str(), dependent));
            }
        }
    }

    let mut records: Vec<Option<T>> = records.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|idx| records[idx].take())
        .collect()
}
