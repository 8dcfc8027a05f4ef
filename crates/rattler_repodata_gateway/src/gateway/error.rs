use std::{path::PathBuf, sync::Arc};

use rattler_conda_types::Platform;
use thiserror::Error;
use tokio::task::JoinError;
use url::Url;

use crate::utils::cache_map::CoalescingError;

/// An error that can occur when requesting repodata from the [`super::Gateway`].
///
/// The error is cheap to clone so that it can be delivered to every request
/// that was waiting on the same subdirectory or package.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// An I/O error occurred.
    #[error(transparent)]
    IoError(Arc<std::io::Error>),

    /// The `repodata.json` of a subdirectory could not be read.
    #[error("failed to read repodata from '{}'", .0.display())]
    ReadRepoData(PathBuf, #[source] Arc<std::io::Error>),

    /// The url of a channel uses a scheme that the gateway cannot serve.
    #[error("'{0}' is not supported, only local channels (file:// urls or paths) can be queried")]
    UnsupportedUrl(Url),

    /// A `file://` url could not be converted to a path.
    #[error("'{0}' does not refer to a valid path")]
    InvalidPath(Url),

    /// A required subdirectory of a channel does not exist.
    #[error("the '{platform}' subdirectory of channel '{channel}' does not exist")]
    SubdirNotFound {
        /// The name of the channel.
        channel: String,

        /// The subdirectory that was requested.
        platform: Platform,
    },

    /// The request was cancelled before it completed.
    #[error("the operation was cancelled")]
    Cancelled,
}

impl From<std::io::Error> for GatewayError {
    fn from(value: std::io::Error) -> Self {
        GatewayError::IoError(Arc::new(value))
    }
}

impl From<JoinError> for GatewayError {
    fn from(value: JoinError) -> Self {
        match value.try_into_panic() {
            Ok(panic) => std::panic::resume_unwind(panic),
            Err(_) => GatewayError::Cancelled,
        }
    }
}

impl From<CoalescingError<GatewayError>> for GatewayError {
    fn from(value: CoalescingError<GatewayError>) -> Self {
        match value {
            CoalescingError::CacheError(err) => err,
            CoalescingError::Cancelled => GatewayError::Cancelled,
        }
    }
}
