use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rattler_conda_types::Version;

use crate::{PreferenceKey, SolveStrategy};

/// The properties of a candidate that are used to order it relative to the
/// other candidates with the same name.
pub(super) struct SortKey<'a> {
    pub name: &'a str,
    pub favored: bool,
    pub channel_rank: usize,
    pub version: &'a Version,
    pub build_number: u64,
    pub timestamp: Option<DateTime<Utc>>,
    pub dependency_count: usize,
    pub input_order: usize,
}

/// Orders candidates by an ordered list of [`PreferenceKey`]s. The most
/// preferred candidate compares as the smallest.
pub(super) struct CandidateComparator<'a> {
    pub preferences: &'a [PreferenceKey],
    pub strategy: SolveStrategy,
    pub use_channel_priority: bool,
    pub direct_dependencies: &'a HashSet<String>,
}

impl CandidateComparator<'_> {
    pub fn compare(&self, a: &SortKey<'_>, b: &SortKey<'_>) -> Ordering {
        self.preferences
            .iter()
            .map(|key| self.compare_by(*key, a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(b.name))
            .then_with(|| a.input_order.cmp(&b.input_order))
    }

    fn compare_by(&self, key: PreferenceKey, a: &SortKey<'_>, b: &SortKey<'_>) -> Ordering {
        match key {
            PreferenceKey::Locked => b.favored.cmp(&a.favored),
            PreferenceKey::ChannelPriority if self.use_channel_priority => {
                a.channel_rank.cmp(&b.channel_rank)
            }
            PreferenceKey::ChannelPriority => Ordering::Equal,
            PreferenceKey::Version => {
                let lowest_first = match self.strategy {
                    SolveStrategy::Highest => false,
                    SolveStrategy::LowestVersion => true,
                    SolveStrategy::LowestVersionDirect => {
                        self.direct_dependencies.contains(a.name)
                    }
                };
                if lowest_first {
                    a.version.cmp(b.version)
                } else {
                    b.version.cmp(a.version)
                }
            }
            PreferenceKey::BuildNumber => b.build_number.cmp(&a.build_number),
            // Records without a timestamp are the least preferred.
            PreferenceKey::Timestamp => b.timestamp.cmp(&a.timestamp),
            PreferenceKey::FewerDependencies => a.dependency_count.cmp(&b.dependency_count),
        }
    }
}
