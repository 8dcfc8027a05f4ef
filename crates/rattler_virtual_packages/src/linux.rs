//! Provides an interface to detect the version of the linux kernel.

use once_cell::sync::OnceCell;
use rattler_conda_types::{GenericVirtualPackage, PackageName, Version};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Linux virtual package description
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Linux {
    /// The version of linux
    pub version: Version,
}

impl Linux {
    /// Returns the kernel version of the host, detected once per process. Returns `None` when
    /// not running on linux or when the version cannot be determined.
    pub fn current() -> Option<Self> {
        static CURRENT: OnceCell<Option<Version>> = OnceCell::new();
        CURRENT
            .get_or_init(detect_linux_version)
            .clone()
            .map(|version| Self { version })
    }
}

impl From<Linux> for GenericVirtualPackage {
    fn from(linux: Linux) -> Self {
        GenericVirtualPackage {
            name: PackageName::new_unchecked("__linux"),
            version: linux.version,
            build_string: "0".into(),
        }
    }
}

impl From<Linux> for crate::VirtualPackage {
    fn from(linux: Linux) -> Self {
        crate::VirtualPackage::Linux(linux)
    }
}

#[cfg(target_os = "linux")]
fn detect_linux_version() -> Option<Version> {
    let release = match std::fs::read_to_string("/proc/sys/kernel/osrelease") {
        Ok(release) => release,
        Err(err) => {
            tracing::warn!("failed to read the linux kernel release: {err}");
            return None;
        }
    };
    let version = parse_kernel_version(&release);
    if version.is_none() {
        tracing::warn!("unable to parse the linux kernel release '{}'", release.trim());
    }
    version
}

#[cfg(not(target_os = "linux"))]
fn detect_linux_version() -> Option<Version> {
    None
}

/// Extracts the numeric part of a kernel release, `5.15.0-76-generic` becomes `5.15.0`. WSL
/// kernels append more components which are dropped as well.
fn parse_kernel_version(release: &str) -> Option<Version> {
    static KERNEL_VERSION: OnceCell<Regex> = OnceCell::new();
    let regex = KERNEL_VERSION.get_or_init(|| {
        Regex::new(r"^(\d+(?:\.\d+){0,3})").expect("the kernel version pattern is valid")
    });
    let numeric = regex.captures(release.trim())?.get(1)?.as_str();
    Version::from_str(numeric).ok()
}
