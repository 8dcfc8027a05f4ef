//! Provides an interface to detect the C standard library of the host by running `ldd`.

use once_cell::sync::OnceCell;
use rattler_conda_types::{GenericVirtualPackage, PackageName, Version};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// `LibC` virtual package description
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct LibC {
    /// The family of `LibC`. This could be glibc for instance.
    pub family: String,

    /// The version of the libc distribution.
    pub version: Version,
}

impl LibC {
    /// Returns the libc of the host, detected once per process. Returns `None` when not running
    /// on linux or when `ldd` is unavailable or prints something unexpected.
    pub fn current() -> Option<Self> {
        static CURRENT: OnceCell<Option<LibC>> = OnceCell::new();
        CURRENT.get_or_init(detect_libc).clone()
    }
}

impl From<LibC> for GenericVirtualPackage {
    fn from(libc: LibC) -> Self {
        GenericVirtualPackage {
            name: PackageName::new_unchecked(format!("__{}", libc.family.to_lowercase())),
            version: libc.version,
            build_string: "0".into(),
        }
    }
}

impl From<LibC> for crate::VirtualPackage {
    fn from(libc: LibC) -> Self {
        crate::VirtualPackage::LibC(libc)
    }
}

#[cfg(target_os = "linux")]
fn detect_libc() -> Option<LibC> {
    let output = match std::process::Command::new("ldd").arg("--version").output() {
        Ok(output) => output,
        Err(err) => {
            tracing::debug!("failed to run `ldd --version`: {err}");
            return None;
        }
    };

    // glibc prints to stdout, musl prints to stderr and exits with an error.
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let libc = parse_ldd_output(&stdout).or_else(|| parse_ldd_output(&stderr));
    if libc.is_none() {
        tracing::warn!("unable to determine the libc version from the output of `ldd --version`");
    }
    libc
}

#[cfg(not(target_os = "linux"))]
fn detect_libc() -> Option<LibC> {
    None
}

/// Parses the output of `ldd --version`.
fn parse_ldd_output(output: &str) -> Option<LibC> {
    static GLIBC: OnceCell<Regex> = OnceCell::new();
    static MUSL: OnceCell<Regex> = OnceCell::new();

    let glibc = GLIBC.get_or_init(|| {
        Regex::new(r"(?mi)^ldd .*(?:glibc|gnu libc|gnu c library).*?(\d+\.\d+(?:\.\d+)?)\s*$")
            .expect("the glibc pattern is valid")
    });
    if let Some(version) = glibc.captures(output).and_then(|c| c.get(1)) {
        return Some(LibC {
            family: String::from("glibc"),
            version: Version::from_str(version.as_str()).ok()?,
        });
    }

    let musl = MUSL.get_or_init(|| {
        Regex::new(r"(?ms)^musl libc.*?^Version (\d+\.\d+(?:\.\d+)?)")
            .expect("the musl pattern is valid")
    });
    let version = musl.captures(output)?.get(1)?;
    Some(LibC {
        family: String::from("musl"),
        version: Version::from_str(version.as_str()).ok()?,
    })
}

#[cfg(test)]
mod test {
    use super::parse_ldd_output;

    #[test]
    fn test_parse_glibc() {
        let output = "ldd (Ubuntu GLIBC 2.35-0ubuntu3.1) 2.35\nCopyright (C) 2022 Free Software Foundation, Inc.\n";
        let libc = parse_ldd_output(output).unwrap();
        assert_eq!(libc.family, "glibc");
        assert_eq!(libc.version.to_string(), "2.35");

        let output = "ldd (GNU libc) 2.17\nCopyright (C) 2012 Free Software Foundation, Inc.\n";
        assert_eq!(parse_ldd_output(output).unwrap().version.to_string(), "2.17");
    }

    #[test]
    fn test_parse_musl() {
        let output = "musl libc (x86_64)\nVersion 1.2.4\nDynamic Program Loader\n";
        let libc = parse_ldd_output(output).unwrap();
        assert_eq!(libc.family, "musl");
        assert_eq!(libc.version.to_string(), "1.2.4");
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(parse_ldd_output("ldd: command not found"), None);
    }

    #[test]
    fn doesnt_crash() {
        let libc = super::LibC::current();
        println!("LibC {libc:?}");
    }
}
