use crate::id::{MatchSpecId, NameId};
use rattler_conda_types::{
    GenericVirtualPackage, MatchSpec, Matches, PackageRecord, RepoDataRecord, Version,
};
use std::fmt::{Display, Formatter};

/// The record a package solvable was created from.
#[derive(Debug, Copy, Clone)]
pub enum SolvableRecord<'a> {
    /// A package from a channel
    Package(&'a RepoDataRecord),

    /// A capability of the system
    Virtual(&'a GenericVirtualPackage),
}

impl<'a> SolvableRecord<'a> {
    /// The normalized name of the package
    pub fn name(&self) -> &'a str {
        match self {
            SolvableRecord::Package(record) => record.package_record.name.as_normalized(),
            SolvableRecord::Virtual(package) => package.name.as_normalized(),
        }
    }

    /// The version of the package
    pub fn version(&self) -> &'a Version {
        match self {
            SolvableRecord::Package(record) => &record.package_record.version,
            SolvableRecord::Virtual(package) => &package.version,
        }
    }

    /// The build string of the package
    pub fn build(&self) -> &'a str {
        match self {
            SolvableRecord::Package(record) => &record.package_record.build,
            SolvableRecord::Virtual(package) => &package.build_string,
        }
    }

    /// The package record, `None` for virtual packages.
    pub fn package_record(&self) -> Option<&'a PackageRecord> {
        match self {
            SolvableRecord::Package(record) => Some(&record.package_record),
            SolvableRecord::Virtual(_) => None,
        }
    }

    /// The repodata record, `None` for virtual packages.
    pub fn repo_data_record(&self) -> Option<&'a RepoDataRecord> {
        match self {
            SolvableRecord::Package(record) => Some(record),
            SolvableRecord::Virtual(_) => None,
        }
    }

    pub(crate) fn matches(&self, spec: &MatchSpec) -> bool {
        match self {
            SolvableRecord::Package(record) => spec.matches(*record),
            SolvableRecord::Virtual(package) => spec.matches(*package),
        }
    }
}

impl Display for SolvableRecord<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.name(), self.version(), self.build())
    }
}

/// A package that can be part of the solution.
#[derive(Debug)]
pub struct PackageSolvable<'a> {
    pub(crate) name: NameId,
    pub(crate) record: SolvableRecord<'a>,
    pub(crate) dependencies: Vec<MatchSpecId>,
    pub(crate) constrains: Vec<MatchSpecId>,
}

impl<'a> PackageSolvable<'a> {
    /// The interned name of the package
    pub fn name(&self) -> NameId {
        self.name
    }

    /// The record this solvable was created from
    pub fn record(&self) -> SolvableRecord<'a> {
        self.record
    }

    /// The interned dependencies of the package
    pub fn dependencies(&self) -> &[MatchSpecId] {
        &self.dependencies
    }

    /// The interned constraints of the package
    pub fn constrains(&self) -> &[MatchSpecId] {
        &self.constrains
    }
}

/// A variable of the SAT problem: either the solve request itself or a package.
#[derive(Debug)]
pub enum Solvable<'a> {
    /// The request, it is always installed
    Root,

    /// A package or virtual package
    Package(PackageSolvable<'a>),
}

impl<'a> Solvable<'a> {
    /// Returns the package information or `None` for the root.
    pub fn package(&self) -> Option<&PackageSolvable<'a>> {
        match self {
            Solvable::Root => None,
            Solvable::Package(package) => Some(package),
        }
    }
}
