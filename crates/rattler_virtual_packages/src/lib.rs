#![deny(missing_docs)]

//! A library to detect Conda virtual packages present on a system.
//!
//! A virtual package represents a package that is injected into the solver to provide system
//! information to packages. This allows packages to add dependencies on specific system features,
//! like the platform version, the machines architecture, or the availability of a Cuda driver
//! with a specific version.
//!
//! This library provides both a low- and high level API to detect versions of virtual packages
//! for the host system.
//!
//! To detect all virtual packages for the host system use the [`VirtualPackages::detect`]
//! function. It returns a [`VirtualPackages`] that can be converted into
//! [`GenericVirtualPackage`]s, which is the type the solver works with.
//!
//! Overrides, for instance `CONDA_OVERRIDE_CUDA`, are controlled through
//! [`VirtualPackageOverrides`]. They make it possible to pretend a different host, which is
//! required to solve environments for other platforms.

pub mod cuda;
pub mod libc;
pub mod linux;
pub mod osx;

use std::env;
use std::str::FromStr;

use once_cell::sync::OnceCell;
use rattler_conda_types::{
    GenericVirtualPackage, PackageName, ParseVersionError, Platform, Version,
};
use serde::{Deserialize, Serialize};

use crate::osx::ParseOsxVersionError;

/// Configure the overrides used in this crate.
///
/// The default value does not consult any environment variables and detects everything from the
/// host, see [`VirtualPackageOverrides::none`].
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct VirtualPackageOverrides {
    /// The override for the osx virtual package
    pub osx: Override,
    /// The override for the libc virtual package
    pub libc: Override,
    /// The override for the cuda virtual package
    pub cuda: Override,
    /// The override for the archspec virtual package
    pub archspec: Override,
    /// The override for the linux virtual package
    pub linux: Override,
}

impl VirtualPackageOverrides {
    /// Returns overrides that read the default `CONDA_OVERRIDE_*` environment variable of every
    /// virtual package.
    pub fn from_env() -> Self {
        Self {
            osx: Override::Default,
            libc: Override::Default,
            cuda: Override::Default,
            archspec: Override::Default,
            linux: Override::Default,
        }
    }

    /// Returns overrides that do not override anything.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Describes where the value of a virtual package comes from.
#[derive(Clone, Debug, PartialEq, Eq, Default, Hash)]
pub enum Override {
    /// Read the default environment variable of the virtual package, for instance
    /// `CONDA_OVERRIDE_CUDA`. If the variable is not set the value is detected.
    Default,

    /// Do not override the value, always detect it.
    #[default]
    None,

    /// Use the given value. An empty string marks the virtual package as absent.
    String(String),

    /// Read the value from the environment variable with the given name. If the variable is not
    /// set the value is detected. An empty value marks the virtual package as absent.
    EnvVar(String),
}

impl Override {
    /// Returns the override value, `Some(None)` if the override marks the package as absent and
    /// `None` if the value should be detected.
    fn value(&self, default_env_var: &str) -> Result<Option<Option<String>>, DetectVirtualPackageError> {
        let from_env = |name: &str| match env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(source) => Err(DetectVirtualPackageError::VarError {
                name: name.to_owned(),
                source,
            }),
        };

        let value = match self {
            Override::None => None,
            Override::Default => from_env(default_env_var)?,
            Override::EnvVar(name) => from_env(name)?,
            Override::String(value) => Some(value.clone()),
        };
        Ok(value.map(|value| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_owned())
        }))
    }

    /// Resolves the override or falls back to `detect`. A value that cannot be parsed is an
    /// error.
    fn resolve<T, E: Into<ParseOverrideError>>(
        &self,
        default_env_var: &'static str,
        parse: impl FnOnce(&str) -> Result<T, E>,
        detect: impl FnOnce() -> Option<T>,
    ) -> Result<Option<T>, DetectVirtualPackageError> {
        match self.value(default_env_var)? {
            None => Ok(detect()),
            Some(None) => Ok(None),
            Some(Some(value)) => parse(&value).map(Some).map_err(|err| {
                DetectVirtualPackageError::ParseOverride {
                    name: default_env_var,
                    value,
                    source: err.into(),
                }
            }),
        }
    }
}

/// An error that occurs when the value of an override cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ParseOverrideError {
    /// The value is not a valid version.
    #[error(transparent)]
    InvalidVersion(#[from] ParseVersionError),

    /// The value is not a valid macOS version.
    #[error(transparent)]
    InvalidOsxVersion(#[from] ParseOsxVersionError),
}

impl From<std::convert::Infallible> for ParseOverrideError {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

/// An error that might be returned when detecting virtual packages.
#[derive(Debug, thiserror::Error)]
pub enum DetectVirtualPackageError {
    /// The value of an override cannot be parsed.
    #[error("the override {name}='{value}' is invalid")]
    ParseOverride {
        /// The environment variable the override corresponds to
        name: &'static str,
        /// The value of the override
        value: String,
        /// The reason the value is invalid
        #[source]
        source: ParseOverrideError,
    },

    /// An environment variable holds a value that is not valid unicode.
    #[error("failed to read the environment variable {name}")]
    VarError {
        /// The name of the variable
        name: String,
        /// The underlying error
        #[source]
        source: env::VarError,
    },
}

/// An enum that represents all virtual package types provided by this library.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum VirtualPackage {
    /// Available on windows
    Win,

    /// Available on `Unix` based platforms
    Unix,

    /// Available when running on `Linux`
    Linux(Linux),

    /// Available when running on `OSX`
    Osx(Osx),

    /// Available `LibC` family and version
    LibC(LibC),

    /// Available `Cuda` version
    Cuda(Cuda),

    /// The CPU architecture
    Archspec(Archspec),
}

impl From<VirtualPackage> for GenericVirtualPackage {
    fn from(package: VirtualPackage) -> Self {
        match package {
            VirtualPackage::Win => GenericVirtualPackage {
                name: PackageName::new_unchecked("__win"),
                version: Version::from_numbers([0]),
                build_string: "0".into(),
            },
            VirtualPackage::Unix => GenericVirtualPackage {
                name: PackageName::new_unchecked("__unix"),
                version: Version::from_numbers([0]),
                build_string: "0".into(),
            },
            VirtualPackage::Linux(linux) => linux.into(),
            VirtualPackage::Osx(osx) => osx.into(),
            VirtualPackage::LibC(libc) => libc.into(),
            VirtualPackage::Cuda(cuda) => cuda.into(),
            VirtualPackage::Archspec(archspec) => archspec.into(),
        }
    }
}

impl VirtualPackage {
    /// Detects the virtual packages of the host system.
    pub fn detect(
        overrides: &VirtualPackageOverrides,
    ) -> Result<Vec<VirtualPackage>, DetectVirtualPackageError> {
        Ok(VirtualPackages::detect(overrides)?
            .into_virtual_packages()
            .collect())
    }
}

/// The virtual packages of a system, at most one of every kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct VirtualPackages {
    /// Available on windows
    pub win: bool,

    /// Available on `Unix` based platforms
    pub unix: bool,

    /// Available when running on `Linux`
    pub linux: Option<Linux>,

    /// Available when running on `OSX`
    pub osx: Option<Osx>,

    /// Available `LibC` family and version
    pub libc: Option<LibC>,

    /// Available `Cuda` version
    pub cuda: Option<Cuda>,

    /// The CPU architecture
    pub archspec: Option<Archspec>,
}

impl VirtualPackages {
    /// Returns the virtual packages in a fixed order.
    pub fn into_virtual_packages(self) -> impl Iterator<Item = VirtualPackage> {
        let Self {
            win,
            unix,
            linux,
            osx,
            libc,
            cuda,
            archspec,
        } = self;

        [
            win.then_some(VirtualPackage::Win),
            unix.then_some(VirtualPackage::Unix),
            linux.map(VirtualPackage::Linux),
            osx.map(VirtualPackage::Osx),
            libc.map(VirtualPackage::LibC),
            cuda.map(VirtualPackage::Cuda),
            archspec.map(VirtualPackage::Archspec),
        ]
        .into_iter()
        .flatten()
    }

    /// Returns the virtual packages as [`GenericVirtualPackage`]s, the form the solver accepts.
    pub fn into_generic_virtual_packages(self) -> impl Iterator<Item = GenericVirtualPackage> {
        self.into_virtual_packages().map(Into::into)
    }

    /// Detects the virtual packages of the host system.
    pub fn detect(overrides: &VirtualPackageOverrides) -> Result<Self, DetectVirtualPackageError> {
        Self::detect_for_platform(Platform::current(), overrides)
    }

    /// Determines the virtual packages of a platform. The host is only inspected when the
    /// platform is the platform of the host, otherwise the values of other platforms come from the
    /// overrides alone. `__archspec` falls back to the generic architecture of the platform.
    pub fn detect_for_platform(
        platform: Platform,
        overrides: &VirtualPackageOverrides,
    ) -> Result<Self, DetectVirtualPackageError> {
        let is_host = platform == Platform::current();

        let linux = if platform.is_linux() {
            overrides
                .linux
                .resolve("CONDA_OVERRIDE_LINUX", Version::from_str, || {
                    on_host(is_host, Linux::current).map(|linux| linux.version)
                })?
                .map(|version| Linux { version })
        } else {
            None
        };

        let libc = if platform.is_linux() {
            overrides
                .libc
                .resolve("CONDA_OVERRIDE_GLIBC", Version::from_str, || {
                    on_host(is_host, LibC::current)
                        .filter(|libc| libc.family == "glibc")
                        .map(|libc| libc.version)
                })?
                .map(|version| LibC {
                    family: String::from("glibc"),
                    version,
                })
        } else {
            None
        };

        let osx = if platform.is_osx() {
            overrides
                .osx
                .resolve("CONDA_OVERRIDE_OSX", osx::parse_version, || {
                    on_host(is_host, Osx::current).map(|osx| osx.version)
                })?
                .map(|version| Osx { version })
        } else {
            None
        };

        let cuda = overrides
            .cuda
            .resolve("CONDA_OVERRIDE_CUDA", Version::from_str, || {
                on_host(is_host, Cuda::current).map(|cuda| cuda.version)
            })?
            .map(|version| Cuda { version });

        let archspec = overrides
            .archspec
            .resolve("CONDA_OVERRIDE_ARCHSPEC", String::from_str, || {
                on_host(is_host, Archspec::current)
                    .or_else(|| Archspec::from_platform(platform))
                    .map(|archspec| archspec.spec)
            })?
            .map(|spec| Archspec { spec });

        Ok(Self {
            win: platform.is_windows(),
            unix: platform.is_unix(),
            linux,
            osx,
            libc,
            cuda,
            archspec,
        })
    }
}

/// Only runs host detection when solving for the platform of the host.
fn on_host<T>(is_host: bool, detect: impl FnOnce() -> Option<T>) -> Option<T> {
    if is_host {
        detect()
    } else {
        None
    }
}

pub use cuda::Cuda;
pub use libc::LibC;
pub use linux::Linux;
pub use osx::Osx;

/// Archspec describes the CPU architecture
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Archspec {
    /// The associated microarchitecture
    pub spec: String,
}

impl Archspec {
    /// Returns the microarchitecture of the host, detected once per process.
    pub fn current() -> Option<Self> {
        static CURRENT: OnceCell<Option<Archspec>> = OnceCell::new();
        CURRENT
            .get_or_init(|| match archspec::cpu::host() {
                Ok(microarchitecture) => Some(Archspec {
                    spec: microarchitecture.name().to_owned(),
                }),
                Err(err) => {
                    tracing::warn!("failed to determine the cpu microarchitecture: {err:?}");
                    None
                }
            })
            .clone()
    }

    /// Returns the most generic microarchitecture of a platform.
    pub fn from_platform(platform: Platform) -> Option<Self> {
        let spec = match platform {
            Platform::NoArch | Platform::EmscriptenWasm32 | Platform::WasiWasm32 => return None,
            Platform::Linux32 | Platform::Win32 => "x86",
            Platform::Linux64 | Platform::Osx64 | Platform::Win64 => "x86_64",
            Platform::LinuxAarch64 | Platform::WinArm64 => "aarch64",
            Platform::LinuxArmV6l => "armv6l",
            Platform::LinuxArmV7l => "armv7l",
            Platform::LinuxPpc64le => "ppc64le",
            Platform::LinuxPpc64 => "ppc64",
            Platform::LinuxS390X => "s390x",
            Platform::LinuxRiscv64 => "riscv64",
            Platform::OsxArm64 => "arm64",
        };
        Some(Self {
            spec: spec.to_owned(),
        })
    }
}

impl From<Archspec> for GenericVirtualPackage {
    fn from(archspec: Archspec) -> Self {
        GenericVirtualPackage {
            name: PackageName::new_unchecked("__archspec"),
            version: Version::from_numbers([1]),
            build_string: archspec.spec,
        }
    }
}

impl From<Archspec> for VirtualPackage {
    fn from(archspec: Archspec) -> Self {
        VirtualPackage::Archspec(archspec)
    }
}
