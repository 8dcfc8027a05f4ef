//! Provides functionality to detect the CUDA version supported by the installed driver. The
//! driver library is loaded at runtime with [`libloading`] so that no CUDA installation is
//! required to build or run this crate.

use std::os::raw::{c_int, c_uint};

use libloading::{Library, Symbol};
use once_cell::sync::OnceCell;
use rattler_conda_types::{GenericVirtualPackage, PackageName, Version};
use serde::{Deserialize, Serialize};

/// Cuda virtual package description
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Cuda {
    /// The maximum supported Cuda version.
    pub version: Version,
}

impl Cuda {
    /// Returns the maximum CUDA version supported by the driver of the host, detected once per
    /// process. Returns `None` when there is no driver.
    pub fn current() -> Option<Self> {
        static CURRENT: OnceCell<Option<Version>> = OnceCell::new();
        CURRENT
            .get_or_init(detect_cuda_version)
            .clone()
            .map(|version| Self { version })
    }
}

impl From<Cuda> for GenericVirtualPackage {
    fn from(cuda: Cuda) -> Self {
        GenericVirtualPackage {
            name: PackageName::new_unchecked("__cuda"),
            version: cuda.version,
            build_string: "0".into(),
        }
    }
}

impl From<Cuda> for crate::VirtualPackage {
    fn from(cuda: Cuda) -> Self {
        crate::VirtualPackage::Cuda(cuda)
    }
}

/// The names under which the driver library may be found.
fn cuda_library_paths() -> &'static [&'static str] {
    if cfg!(target_os = "macos") {
        &[
            "libcuda.1.dylib",
            "libcuda.dylib",
            "/usr/local/cuda/lib/libcuda.1.dylib",
            "/usr/local/cuda/lib/libcuda.dylib",
        ]
    } else if cfg!(target_os = "windows") {
        &["nvcuda.dll"]
    } else {
        &[
            "libcuda.so",
            "libcuda.so.1",
            "/usr/lib64/nvidia/libcuda.so",
            "/usr/lib64/nvidia/libcuda.so.1",
            "/usr/lib/wsl/lib/libcuda.so",
            "/usr/lib/wsl/lib/libcuda.so.1",
        ]
    }
}

fn detect_cuda_version() -> Option<Version> {
    let library = cuda_library_paths()
        .iter()
        // SAFETY: loading the driver runs its initializers, which have no preconditions.
        .find_map(|path| unsafe { Library::new(*path) }.ok())?;

    match driver_version(&library) {
        Ok(version) => version_from_driver(version),
        Err(err) => {
            tracing::debug!("failed to query the cuda driver version: {err}");
            None
        }
    }
}

/// Calls `cuInit` and `cuDriverGetVersion` of a loaded driver library.
fn driver_version(library: &Library) -> Result<c_int, String> {
    // SAFETY: the signatures match the CUDA driver API.
    unsafe {
        let cu_init: Symbol<'_, unsafe extern "C" fn(c_uint) -> c_uint> =
            library.get(b"cuInit\0").map_err(|e| e.to_string())?;
        let cu_driver_get_version: Symbol<'_, unsafe extern "C" fn(*mut c_int) -> c_uint> =
            library
                .get(b"cuDriverGetVersion\0")
                .map_err(|e| e.to_string())?;

        let result = cu_init(0);
        if result != 0 {
            return Err(format!("cuInit returned {result}"));
        }

        let mut version: c_int = 0;
        let result = cu_driver_get_version(&mut version);
        if result != 0 {
            return Err(format!("cuDriverGetVersion returned {result}"));
        }
        Ok(version)
    }
}

/// The driver encodes its version as `1000 * major + 10 * minor`.
fn version_from_driver(version: c_int) -> Option<Version> {
    let version = u64::try_from(version).ok().filter(|v| *v > 0)?;
    Some(Version::major_minor(version / 1000, (version % 1000) / 10))
}

#[cfg(test)]
mod test {
    use super::version_from_driver;

    #[test]
    fn test_version_from_driver() {
        assert_eq!(
            version_from_driver(12020).map(|v| v.to_string()),
            Some("12.2".to_owned())
        );
        assert_eq!(
            version_from_driver(11080).map(|v| v.to_string()),
            Some("11.8".to_owned())
        );
        assert_eq!(version_from_driver(0), None);
    }

    #[test]
    fn doesnt_crash() {
        let version = super::Cuda::current();
        println!("Cuda {version:?}");
    }
}
