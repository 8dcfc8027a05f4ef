#![deny(missing_docs)]

//! `rattler_conda_types` contains data models for types commonly found within the Conda ecosystem.
//! The library itself doesn't provide any functionality besides parsing the data types.

mod build_spec;
mod channel;
mod generic_virtual_package;
mod match_spec;
mod package_name;
mod platform;
mod repo_data;
mod solver_result;
mod utils;
mod version;
mod version_spec;

pub use build_spec::{BuildNumber, BuildNumberSpec, OrdOperator, ParseBuildNumberSpecError};
pub use channel::{Channel, ChannelConfig, ParseChannelError};
pub use generic_virtual_package::GenericVirtualPackage;
pub use match_spec::{
    Matches, MatchSpec, NamelessMatchSpec, PackageArchiveRef, ParseMatchSpecError, StringMatcher,
    StringMatcherParseError,
};
pub use package_name::{InvalidPackageNameError, PackageName};
pub use platform::{ParsePlatformError, Platform};
pub use repo_data::{
    compute_package_url, package_name_from_file_name, ArchiveType, ChannelInfo, NoArchKind,
    PackageRecord, PackageRecordPatch, PatchInstructions, RepoData, RepoDataError,
    RepoDataRecord,
};
pub use solver_result::SolverResult;
pub use version::{
    Component, ParseVersionError, ParseVersionErrorKind, Version, VersionBumpError,
    VersionBumpType, VersionWithSource,
};
pub use version_spec::{
    EqualityOperator, LogicalOperator, ParseVersionSpecError, RangeOperator,
    StrictRangeOperator, VersionSpec,
};

/// Defines how strict a parser should behave.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ParseStrictness {
    /// Allows guessing the user's intent: unknown match spec keys are ignored and globs after
    /// range operators are dropped, both with a warning.
    #[default]
    Lenient,

    /// Very strictly follow the specification.
    Strict,
}
