mod builder;
mod channel_config;
mod error;
mod query;
mod repo_data;
mod subdir;
mod subdir_source;

use std::sync::Arc;

use rattler_conda_types::{Channel, MatchSpec, Platform};

pub use builder::GatewayBuilder;
pub use channel_config::{ChannelConfig, SourceConfig};
pub use error::GatewayError;
pub use query::RepoDataQuery;
pub use repo_data::{RepoData, RepoDataIterator};

use crate::utils::cache_map::CoalescingMap;
use subdir::Subdir;
use subdir_source::open_subdir;

/// Central access point for repodata.
///
/// The gateway reads the repodata of local channels and caches the subdirs
/// and records it has seen. Multiple requests for the same subdir or the
/// same package are coalesced.
///
/// The gateway is cheaply clonable, clones share the same cache.
///
/// ```no_run
/// # use rattler_conda_types::{Channel, MatchSpec, Platform};
/// # use rattler_repodata_gateway::Gateway;
/// # async fn run(channel: Channel) -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = Gateway::new();
/// let repo_data = gateway
///     .query(
///         [&channel],
///         [Platform::Linux64, Platform::NoArch],
///         ["python".parse::<MatchSpec>()?],
///     )
///     .recursive(true)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Default for Gateway {
    fn default() -> Self {
        Gateway::new()
    }
}

impl Gateway {
    /// Constructs a simple gateway with the default configuration. Use
    /// [`Gateway::builder`] if you want more control over how the gateway is
    /// constructed.
    pub fn new() -> Self {
        Gateway::builder().finish()
    }

    /// Constructs a new gateway with the given configuration.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Constructs a new [`RepoDataQuery`] which can be used to query repodata
    /// records for the given specs from the given channels and platforms.
    ///
    /// The query returns one [`RepoData`] per channel, in the order of the
    /// channels.
    pub fn query<'c>(
        &self,
        channels: impl IntoIterator<Item = &'c Channel>,
        platforms: impl IntoIterator<Item = Platform>,
        specs: impl IntoIterator<Item = MatchSpec>,
    ) -> RepoDataQuery {
        RepoDataQuery::new(
            self.clone(),
            channels.into_iter().cloned().collect(),
            platforms.into_iter().collect(),
            specs.into_iter().collect(),
        )
    }

    /// Clears all cached repodata so it is read again on the next query.
    pub fn clear_repodata_cache(&self) {
        self.inner.subdirs.clear();
    }

    /// Returns the [`Subdir`] for the given channel and platform.
    ///
    /// This function caches any existing `Subdir`. If multiple requests are
    /// made for the same subdir the requests are coalesced and a single
    /// `Subdir` instance is returned.
    async fn subdir(
        &self,
        channel: &Channel,
        platform: Platform,
    ) -> Result<Arc<Subdir>, GatewayError> {
        let key = (channel.clone(), platform);
        let source_config = self.inner.channel_config.get(&channel.base_url).clone();
        let channel = channel.clone();
        Ok(self
            .inner
            .subdirs
            .get_or_cache(&key, move || async move {
                let source = open_subdir(&channel, platform, &source_config).await?;
                Ok::<_, GatewayError>(Arc::new(Subdir::new(source)))
            })
            .await?)
    }
}

struct GatewayInner {
    /// Configuration per channel.
    channel_config: ChannelConfig,

    /// The number of packages a single query loads concurrently.
    max_concurrent_requests: usize,

    /// A mapping of all channel subdirs this instance keeps track of and the
    /// data we know about their contents.
    subdirs: CoalescingMap<(Channel, Platform), Arc<Subdir>, GatewayError>,
}
