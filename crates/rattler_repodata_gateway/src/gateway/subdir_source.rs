use std::path::PathBuf;

use rattler_conda_types::{Channel, Platform};

use super::{GatewayError, SourceConfig};
use crate::sparse::SparseRepoData;

/// Opens the repodata of a single channel subdirectory.
///
/// The kind of source is determined by the url scheme of the channel. Only
/// `file://` urls are supported. Returns `None` if the subdirectory does not
/// exist. Every channel must have a `noarch` subdirectory, a missing `noarch`
/// subdirectory is an error.
pub(crate) async fn open_subdir(
    channel: &Channel,
    platform: Platform,
    source_config: &SourceConfig,
) -> Result<Option<SparseRepoData>, GatewayError> {
    let platform_url = channel.platform_url(platform);
    if platform_url.scheme() != "file" {
        return Err(GatewayError::UnsupportedUrl(platform_url));
    }

    let root = platform_url
        .to_file_path()
        .map_err(|_| GatewayError::InvalidPath(platform_url.clone()))?;
    let repodata_path = root.join("repodata.json");
    if !repodata_path.is_file() {
        if platform == Platform::NoArch {
            return Err(GatewayError::SubdirNotFound {
                channel: channel.canonical_name(),
                platform,
            });
        }
        tracing::debug!(
            "{} does not contain repodata, treating it as empty",
            root.display()
        );
        return Ok(None);
    }

    from_path(repodata_path, channel.clone(), platform, source_config.clone())
        .await
        .map(Some)
}

/// Sparsely reads the contents of a `repodata.json` file on a blocking
/// worker.
async fn from_path(
    repodata_path: PathBuf,
    channel: Channel,
    platform: Platform,
    source_config: SourceConfig,
) -> Result<SparseRepoData, GatewayError> {
    tracing::debug!("reading {}", repodata_path.display());
    tokio::task::spawn_blocking(move || {
        SparseRepoData::new(channel, platform.as_str(), &repodata_path, None)
            .map(|sparse| {
                sparse.with_package_format_selection(source_config.package_format_selection)
            })
            .map_err(|err| GatewayError::ReadRepoData(repodata_path, err.into()))
    })
    .await?
}
