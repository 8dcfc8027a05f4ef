use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::sparse::PackageFormatSelection;

/// Describes additional properties that influence how the gateway reads
/// repodata from a particular channel.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Which archive formats to return when a package is available in
    /// multiple formats.
    #[serde(default)]
    pub package_format_selection: PackageFormatSelection,
}

/// Describes additional information for fetching channels.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChannelConfig {
    /// The default source configuration. If a channel does not have a
    /// specific source configuration this configuration will be used.
    #[serde(default)]
    pub default: SourceConfig,

    /// Source configuration on a per-url basis. This url is used as a prefix,
    /// so any channel that starts with the URL uses the configuration. The
    /// configuration with the longest matching url is used.
    #[serde(default)]
    pub per_channel: HashMap<Url, SourceConfig>,
}

impl ChannelConfig {
    /// Returns the source configuration for the channel with the given base
    /// url.
    pub fn get(&self, url: &Url) -> &SourceConfig {
        self.per_channel
            .iter()
            .filter(|(prefix, _)| url.as_str().starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.as_str().len())
            .map_or(&self.default, |(_, config)| config)
    }
}
