use std::{
    collections::{HashMap, HashSet, VecDeque},
    future::IntoFuture,
    sync::Arc,
};

use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use itertools::Itertools;
use rattler_conda_types::{Channel, MatchSpec, Matches, PackageName, Platform, RepoDataRecord};

use super::{Gateway, GatewayError, RepoData};
use crate::sparse::dependency_names;

/// Represents a query to execute with a [`Gateway`].
///
/// When executed the query will asynchronously load the repodata from all
/// subdirectories (combination of channels and platforms).
///
/// Most processing will happen on the background so downloading and parsing
/// can happen simultaneously.
///
/// Repodata is cached by the [`Gateway`] so executing the same query twice
/// with the same channels will not result in the repodata being read twice.
#[derive(Clone)]
#[must_use = "a query does nothing until it is executed or awaited"]
pub struct RepoDataQuery {
    /// The gateway that manages all resources
    gateway: Gateway,

    /// The channels to fetch from
    channels: Vec<Channel>,

    /// The platforms the fetch from
    platforms: Vec<Platform>,

    /// The specs to fetch records for
    specs: Vec<MatchSpec>,

    /// Whether to recursively fetch dependencies
    recursive: bool,
}

impl RepoDataQuery {
    pub(crate) fn new(
        gateway: Gateway,
        channels: Vec<Channel>,
        platforms: Vec<Platform>,
        specs: Vec<MatchSpec>,
    ) -> Self {
        Self {
            gateway,
            channels,
            platforms,
            specs,
            recursive: false,
        }
    }

    /// Define whether the dependencies of the returned records should be
    /// fetched as well.
    ///
    /// Records of the packages named by the specs are filtered by those
    /// specs. The records of their dependencies are returned unfiltered.
    pub fn recursive(self, recursive: bool) -> Self {
        Self { recursive, ..self }
    }

    /// Execute the query and return the resulting repodata records, one
    /// [`RepoData`] per channel in the order the channels were specified.
    pub async fn execute(self) -> Result<Vec<RepoData>, GatewayError> {
        let gateway = &self.gateway;
        let platforms = self.platforms.iter().copied().unique().collect_vec();

        // Open all the subdirectories concurrently.
        let subdirs = futures::future::try_join_all(
            self.channels
                .iter()
                .enumerate()
                .cartesian_product(platforms)
                .map(|((channel_idx, channel), platform)| async move {
                    gateway
                        .subdir(channel, platform)
                        .await
                        .map(|subdir| (channel_idx, subdir))
                }),
        )
        .await?;

        // The records of the packages that are directly requested are filtered by
        // the specs.
        let mut direct_specs: HashMap<PackageName, Vec<MatchSpec>> = HashMap::new();
        for spec in self.specs {
            direct_specs.entry(spec.name.clone()).or_default().push(spec);
        }

        // Construct a set of packages that we have seen and have been added to the pending list.
        let mut seen: HashSet<PackageName> = direct_specs.keys().cloned().collect();

        // Construct a queue to store packages in that still need to be processed
        let mut pending: VecDeque<PackageName> = direct_specs.keys().cloned().sorted().collect();

        // Stores the result per channel
        let mut shards: Vec<Vec<(PackageName, usize, Arc<[RepoDataRecord]>)>> =
            vec![Vec::new(); self.channels.len()];

        // Keep a list of all pending futures
        let mut pending_futures = FuturesUnordered::new();
        let mut pending_for_execution = VecDeque::new();
        loop {
            // Start fetching the records of any pending packages
            for name in pending.drain(..) {
                for (subdir_idx, (channel_idx, subdir)) in subdirs.iter().enumerate() {
                    let name = name.clone();
                    let subdir = subdir.clone();
                    let channel_idx = *channel_idx;
                    pending_for_execution.push_back(async move {
                        let records = subdir.get_or_fetch_records(&name).await?;
                        Ok::<_, GatewayError>((channel_idx, subdir_idx, name, records))
                    });
                }
            }

            // Limit the number of requests that run at the same time.
            while pending_futures.len() < gateway.inner.max_concurrent_requests {
                match pending_for_execution.pop_front() {
                    Some(future) => pending_futures.push(future),
                    None => break,
                }
            }

            // Wait for any pending requests to come in, or if we processed them all, stop the loop.
            let (channel_idx, subdir_idx, name, records) = match pending_futures.next().await {
                Some(request) => request?,
                None => break,
            };

            let records = match direct_specs.get(&name) {
                Some(specs) => Arc::from(
                    records
                        .iter()
                        .filter(|record| specs.iter().any(|spec| spec.matches(*record)))
                        .cloned()
                        .collect_vec(),
                ),
                None => records,
            };

            // Iterate over all dependencies in the records and try to get their data as well.
            if self.recursive {
                for dependency in records.iter().flat_map(dependency_names) {
                    if seen.insert(dependency.clone()) {
                        pending.push_back(dependency);
                    }
                }
            }

            shards[channel_idx].push((name, subdir_idx, records));
        }

        // Requests complete in any order, sort the result to make it deterministic.
        let result = shards
            .into_iter()
            .map(|mut channel_shards| {
                channel_shards.sort_by(|(a, a_idx, _), (b, b_idx, _)| {
                    a.cmp(b).then(a_idx.cmp(b_idx))
                });
                let mut repo_data = RepoData::default();
                for (_, _, records) in channel_shards {
                    repo_data.push_shard(records);
                }
                repo_data
            })
            .collect_vec();

        tracing::debug!(
            "query returned {} records from {} channels",
            result.iter().map(RepoData::len).sum::<usize>(),
            result.len()
        );

        Ok(result)
    }
}

impl IntoFuture for RepoDataQuery {
    type Output = Result<Vec<RepoData>, GatewayError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.execute().boxed()
    }
}
