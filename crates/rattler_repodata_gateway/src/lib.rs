#![deny(missing_docs)]

//! `rattler_repodata_gateway` is a crate that provides functionality to
//! retrieve conda repodata for a set of channels and platforms and hand it to
//! a solver.
//!
//! Two layers are provided:
//!
//! * [`sparse::SparseRepoData`] (feature `sparse`) memory maps a
//!   `repodata.json` file and only parses the records of the packages that
//!   are actually requested. Most solves only touch a small fraction of a
//!   channel so this avoids parsing the bulk of the file.
//! * [`Gateway`] (feature `gateway`) fetches the data of many channels and
//!   platforms concurrently, caches every subdirectory it opened and
//!   coalesces concurrent requests for the same subdirectory or package.
//!
//! Only local channels (`file://` urls or paths) can be queried. Fetching
//! and caching repodata over the network is left to the embedding
//! application.

#[cfg(feature = "gateway")]
mod gateway;
#[cfg(feature = "sparse")]
pub mod sparse;
#[cfg(feature = "gateway")]
mod utils;

#[cfg(feature = "gateway")]
pub use gateway::{
    ChannelConfig, Gateway, GatewayBuilder, GatewayError, RepoData, RepoDataIterator,
    RepoDataQuery, SourceConfig,
};
#[cfg(feature = "sparse")]
pub use sparse::PackageFormatSelection;
