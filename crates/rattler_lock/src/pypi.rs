use std::{cmp::Ordering, collections::BTreeSet};

use pep440_rs::VersionSpecifiers;
use pep508_rs::{ExtraName, PackageName, Requirement};

use crate::{PackageHashes, UrlOrPath};

/// A pinned Pypi package
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PypiPackageData {
    /// The name of the package.
    pub name: PackageName,

    /// The version of the package.
    pub version: pep440_rs::Version,

    /// The location of the package. This can be a URL or a path.
    pub location: UrlOrPath,

    /// Hashes of the file pointed to by `location`.
    pub hash: Option<PackageHashes>,

    /// A list of dependencies on other packages.
    pub requires_dist: Vec<Requirement>,

    /// The python version that this package requires.
    pub requires_python: Option<VersionSpecifiers>,

    /// Whether the project should be installed in editable mode or not.
    pub editable: bool,
}

/// Additional optional information about a pypi package that is specific to
/// an environment.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct PypiPackageEnvironmentData {
    /// The extras enabled for the package. Note that the order doesn't matter
    /// here.
    pub extras: BTreeSet<ExtraName>,
}

impl PartialOrd<Self> for PypiPackageData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PypiPackageData {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.location.cmp(&other.location))
    }
}

impl PypiPackageData {
    /// Returns true if this package satisfies the given requirement. A
    /// requirement without version specifiers is satisfied by any version
    /// of a package with the same name.
    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        if requirement.name != self.name {
            return false;
        }
        match &requirement.version_or_url {
            None => true,
            Some(pep508_rs::VersionOrUrl::VersionSpecifier(specifiers)) => {
                specifiers.contains(&self.version)
            }
            Some(pep508_rs::VersionOrUrl::Url(url)) => {
                matches!(&self.location, UrlOrPath::Url(location) if location.as_str() == url.to_string())
            }
        }
    }

    /// Returns the requirements of this package that always apply, regardless
    /// of the environment markers or the extras that are enabled.
    pub fn unconditional_requirements(&self) -> impl Iterator<Item = &Requirement> + '_ {
        self.requires_dist
            .iter()
            .filter(|requirement| requirement.marker.is_true())
    }
}

#[cfg(test)]
mod test {
    use super::PypiPackageData;
    use crate::UrlOrPath;
    use std::str::FromStr;

    fn package(name: &str, version: &str, requires_dist: &[&str]) -> PypiPackageData {
        PypiPackageData {
            name: pep508_rs::PackageName::new(name.to_owned()).unwrap(),
            version: pep440_rs::Version::from_str(version).unwrap(),
            location: UrlOrPath::from_str(&format!(
                "https://files.example.com/{name}-{version}-py3-none-any.whl"
            ))
            .unwrap(),
            hash: None,
            requires_dist: requires_dist
                .iter()
                .map(|req| pep508_rs::Requirement::from_str(req).unwrap())
                .collect(),
            requires_python: None,
            editable: false,
        }
    }

    #[test]
    fn test_satisfies() {
        let requests = package("requests", "2.31.0", &[]);
        let requirement = |s: &str| pep508_rs::Requirement::from_str(s).unwrap();

        assert!(requests.satisfies(&requirement("requests")));
        assert!(requests.satisfies(&requirement("Requests>=2.0")));
        assert!(!requests.satisfies(&requirement("requests<2")));
        assert!(!requests.satisfies(&requirement("urllib3")));
    }

    #[test]
    fn test_unconditional_requirements() {
        let requests = package(
            "requests",
            "2.31.0",
            &[
                "urllib3>=1.21.1,<3",
                "PySocks!=1.5.7,>=1.5.6 ; extra == 'socks'",
                "win-inet-pton ; sys_platform == 'win32'",
            ],
        );
        let names: Vec<_> = requests
            .unconditional_requirements()
            .map(|req| req.name.to_string())
            .collect();
        assert_eq!(names, vec!["urllib3"]);
    }
}
