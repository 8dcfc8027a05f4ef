use std::sync::Arc;

use rattler_conda_types::{PackageName, RepoDataRecord};

use super::GatewayError;
use crate::{sparse::SparseRepoData, utils::cache_map::CoalescingMap};

/// Keeps track of a single channel subdirectory and all the packages we
/// retrieved from it so far.
pub(crate) struct Subdir {
    /// Where to get the data from. `None` if the subdirectory does not exist.
    source: Option<Arc<SparseRepoData>>,

    /// Records per package
    records: CoalescingMap<PackageName, Arc<[RepoDataRecord]>, GatewayError>,
}

impl Subdir {
    /// Constructs a new subdir from a source.
    pub fn new(source: Option<SparseRepoData>) -> Self {
        Self {
            source: source.map(Arc::new),
            records: CoalescingMap::default(),
        }
    }

    /// Returns all the records associated with the specified package.
    /// Concurrent requests for the same package are coalesced and the result
    /// is cached.
    pub async fn get_or_fetch_records(
        &self,
        package_name: &PackageName,
    ) -> Result<Arc<[RepoDataRecord]>, GatewayError> {
        let Some(source) = &self.source else {
            return Ok(Arc::from(Vec::new()));
        };

        let source = source.clone();
        let name = package_name.clone();
        Ok(self
            .records
            .get_or_cache(package_name, move || async move {
                let records =
                    tokio::task::spawn_blocking(move || source.load_records(&name)).await??;
                Ok::<_, GatewayError>(Arc::from(records))
            })
            .await?)
    }
}
