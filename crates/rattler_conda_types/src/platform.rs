use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

/// A platform supported by Conda, also known as a subdir.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, EnumIter)]
#[allow(missing_docs)]
pub enum Platform {
    NoArch,

    Linux32,
    Linux64,
    LinuxAarch64,
    LinuxArmV6l,
    LinuxArmV7l,
    LinuxPpc64le,
    LinuxPpc64,
    LinuxS390X,
    LinuxRiscv64,

    Osx64,
    OsxArm64,

    Win32,
    Win64,
    WinArm64,

    EmscriptenWasm32,
    WasiWasm32,
}

/// An error that occurred when parsing a platform from a string.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("'{string}' is not a known platform")]
pub struct ParsePlatformError {
    /// The platform string that could not be parsed.
    pub string: String,
}

impl Platform {
    /// Returns the platform for which the current binary was built.
    pub fn current() -> Platform {
        match (std::env::consts::OS, std::env::consts::ARCH) {
            ("linux", "x86") => Platform::Linux32,
            ("linux", "x86_64") => Platform::Linux64,
            ("linux", "aarch64") => Platform::LinuxAarch64,
            ("linux", "arm") => Platform::LinuxArmV7l,
            ("linux", "powerpc64") => Platform::LinuxPpc64le,
            ("linux", "s390x") => Platform::LinuxS390X,
            ("linux", "riscv64") => Platform::LinuxRiscv64,
            ("macos", "x86_64") => Platform::Osx64,
            ("macos", "aarch64") => Platform::OsxArm64,
            ("windows", "x86") => Platform::Win32,
            ("windows", "x86_64") => Platform::Win64,
            ("windows", "aarch64") => Platform::WinArm64,
            ("emscripten", _) => Platform::EmscriptenWasm32,
            ("wasi", _) => Platform::WasiWasm32,
            _ => Platform::NoArch,
        }
    }

    /// Returns all known platforms.
    pub fn all() -> impl Iterator<Item = Self> {
        Platform::iter()
    }

    /// Returns the string representation of the platform, e.g. `linux-64`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Platform::NoArch => "noarch",
            Platform::Linux32 => "linux-32",
            Platform::Linux64 => "linux-64",
            Platform::LinuxAarch64 => "linux-aarch64",
            Platform::LinuxArmV6l => "linux-armv6l",
            Platform::LinuxArmV7l => "linux-armv7l",
            Platform::LinuxPpc64le => "linux-ppc64le",
            Platform::LinuxPpc64 => "linux-ppc64",
            Platform::LinuxS390X => "linux-s390x",
            Platform::LinuxRiscv64 => "linux-riscv64",
            Platform::Osx64 => "osx-64",
            Platform::OsxArm64 => "osx-arm64",
            Platform::Win32 => "win-32",
            Platform::Win64 => "win-64",
            Platform::WinArm64 => "win-arm64",
            Platform::EmscriptenWasm32 => "emscripten-wasm32",
            Platform::WasiWasm32 => "wasi-wasm32",
        }
    }

    /// Returns true if the platform is `noarch`.
    pub const fn is_noarch(self) -> bool {
        matches!(self, Platform::NoArch)
    }

    /// Returns true if the platform is a windows platform.
    pub const fn is_windows(self) -> bool {
        matches!(self, Platform::Win32 | Platform::Win64 | Platform::WinArm64)
    }

    /// Returns true if the platform is a macOS platform.
    pub const fn is_osx(self) -> bool {
        matches!(self, Platform::Osx64 | Platform::OsxArm64)
    }

    /// Returns true if the platform is a linux platform.
    pub const fn is_linux(self) -> bool {
        matches!(
            self,
            Platform::Linux32
                | Platform::Linux64
                | Platform::LinuxAarch64
                | Platform::LinuxArmV6l
                | Platform::LinuxArmV7l
                | Platform::LinuxPpc64le
                | Platform::LinuxPpc64
                | Platform::LinuxS390X
                | Platform::LinuxRiscv64
        )
    }

    /// Returns true if the platform is a unix platform.
    pub const fn is_unix(self) -> bool {
        self.is_linux() || self.is_osx()
    }

    /// Returns the operating system part of the platform, `None` for `noarch`.
    pub const fn only_platform(self) -> Option<&'static str> {
        if self.is_linux() {
            Some("linux")
        } else if self.is_osx() {
            Some("osx")
        } else if self.is_windows() {
            Some("win")
        } else {
            match self {
                Platform::EmscriptenWasm32 => Some("emscripten"),
                Platform::WasiWasm32 => Some("wasi"),
                _ => None,
            }
        }
    }

    /// Returns the architecture part of the platform, `None` for `noarch`.
    pub fn arch(self) -> Option<&'static str> {
        match self {
            Platform::NoArch => None,
            platform => platform.as_str().split_once('-').map(|(_, arch)| arch),
        }
    }
}

impl FromStr for Platform {
    type Err = ParsePlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::all()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParsePlatformError {
                string: s.to_owned(),
            })
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Platform {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_str().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Platform::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::Platform;
    use std::str::FromStr;

    #[test]
    fn test_roundtrip() {
        for platform in Platform::all() {
            assert_eq!(Platform::from_str(platform.as_str()), Ok(platform));
        }
        assert!(Platform::from_str("linux-128").is_err());
    }

    #[test]
    fn test_properties() {
        assert!(Platform::Linux64.is_linux());
        assert!(Platform::OsxArm64.is_unix());
        assert!(!Platform::Win64.is_unix());
        assert_eq!(Platform::LinuxAarch64.arch(), Some("aarch64"));
        assert_eq!(Platform::Win64.only_platform(), Some("win"));
        assert_eq!(Platform::NoArch.only_platform(), None);
    }
}
