//! Options that were used to solve an environment.
//!
//! These are persisted next to the channels of an environment so that an
//! environment can be re-solved with the same settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Options that were used to solve an environment.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SolveOptions {
    /// The strategy that was used to select versions.
    #[serde(default, skip_serializing_if = "is_default")]
    pub strategy: SolveStrategy,

    /// How channel priority was taken into account.
    #[serde(default, skip_serializing_if = "is_default")]
    pub channel_priority: ChannelPriority,

    /// Records published after this date were ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_newer: Option<DateTime<Utc>>,
}

impl SolveOptions {
    /// Returns true if these are the default options, in which case they are
    /// not written to the lock-file.
    pub fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

/// The strategy to use when selecting versions.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveStrategy {
    /// Select the highest compatible version of all packages.
    #[default]
    Highest,

    /// Select the lowest compatible version for all packages.
    LowestVersion,

    /// Select the lowest version of direct dependencies and the highest
    /// version of transitive dependencies.
    LowestVersionDirect,
}

/// How channel priority was used while solving.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelPriority {
    /// A package is only taken from the first channel that contains it.
    #[default]
    Strict,

    /// Packages from higher priority channels are preferred.
    Flexible,

    /// The channel a package comes from is ignored.
    Disabled,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    value == &T::default()
}

#[cfg(test)]
mod test {
    use super::{ChannelPriority, SolveOptions, SolveStrategy};

    #[test]
    fn test_defaults_are_omitted() {
        let options = SolveOptions {
            strategy: SolveStrategy::LowestVersionDirect,
            ..SolveOptions::default()
        };
        insta::assert_snapshot!(serde_yaml::to_string(&options).unwrap(), @"strategy: lowest-version-direct");
        assert!(SolveOptions::default().is_default());
    }

    #[test]
    fn test_parse() {
        let options: SolveOptions = serde_yaml::from_str(
            "channel-priority: disabled\nexclude-newer: 2021-01-01T00:00:00Z\n",
        )
        .unwrap();
        assert_eq!(options.strategy, SolveStrategy::Highest);
        assert_eq!(options.channel_priority, ChannelPriority::Disabled);
        assert_eq!(
            options.exclude_newer.map(|date| date.timestamp()),
            Some(1_609_459_200)
        );
    }
}
