#![deny(missing_docs)]

//! A module that provides utility functions for computing hashes using the
//! [RustCrypto/hashes](https://github.com/RustCrypto/hashes) library.
//!
//! This module provides several functions that wrap around the hashing algorithms provided by the
//! RustCrypto library. These functions allow you to easily compute the hash of a file, or a stream
//! of bytes using a variety of hashing algorithms.
//!
//! By utilizing the [`Digest`] trait, any hashing algorithm that implements that trait can be used
//! with the functions provided in this crate.
//!
//! # Examples
//!
//! ```
//! use rattler_digest::{compute_bytes_digest, Sha256};
//!
//! let digest = compute_bytes_digest::<Sha256>("hello");
//! assert_eq!(
//!     format!("{digest:x}"),
//!     "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
//! );
//! ```

#[cfg(feature = "serde")]
pub mod serde;

pub use digest;

use digest::{Digest, Output};
use std::{fs::File, io::Write, path::Path};

pub use md5::Md5;
pub use sha2::Sha256;

/// A type alias for the output of a SHA256 hash.
pub type Sha256Hash = Output<Sha256>;

/// A type alias for the output of an MD5 hash.
pub type Md5Hash = Output<Md5>;

/// Compute a hash of the file at the specified location.
pub fn compute_file_digest<D: Digest + Default + Write>(
    path: impl AsRef<Path>,
) -> Result<Output<D>, std::io::Error> {
    let mut file = File::open(path)?;
    let mut hasher = D::default();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}

/// Compute the hash of the specified bytes.
pub fn compute_bytes_digest<D: Digest + Default>(path: impl AsRef<[u8]>) -> Output<D> {
    let mut hasher = D::default();
    hasher.update(path);
    hasher.finalize()
}

/// Parses a hash hex string to a digest.
pub fn parse_digest_from_hex<D: Digest>(str: &str) -> Option<Output<D>> {
    let mut hash = <Output<D>>::default();
    match hex::decode_to_slice(str, &mut hash) {
        Ok(_) => Some(hash),
        Err(_) => None,
    }
}

/// A simple object that provides a [`Write`] implementation that also immediately hashes the bytes
/// written to it. Call [`HashingWriter::finalize`] to retrieve both the original `impl Write`
/// object as well as the hash.
///
/// If the generic type implements [`Write`] it is forwarded, the writer then acts as a tee.
pub struct HashingWriter<W, D: Digest> {
    writer: W,
    hasher: D,
}

impl<W, D: Digest + Default> HashingWriter<W, D> {
    /// Constructs a new instance from a writer and a new (empty) hasher.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            hasher: Default::default(),
        }
    }
}

impl<W, D: Digest> HashingWriter<W, D> {
    /// Consumes this instance and returns the original writer and the hash of all bytes written to
    /// this instance.
    pub fn finalize(self) -> (W, Output<D>) {
        (self.writer, self.hasher.finalize())
    }
}

impl<W: Write, D: Digest> Write for HashingWriter<W, D> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let bytes = self.writer.write(buf)?;
        self.hasher.update(&buf[..bytes]);
        Ok(bytes)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod test {
    use super::{HashingWriter, Md5, Sha256};
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    #[case(
        "1234567890",
        "c775e7b757ede630cd0aa1113bd102661ab38829ca52a6422ab782862f268646"
    )]
    #[case(
        "Hello, world!",
        "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3"
    )]
    fn test_compute_file_sha256(#[case] input: &str, #[case] expected_hash: &str) {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test");
        std::fs::write(&file_path, input).unwrap();
        let hash = super::compute_file_digest::<Sha256>(&file_path).unwrap();

        assert_eq!(format!("{hash:x}"), expected_hash);
    }

    #[test]
    fn test_bytes_md5() {
        let hash = super::compute_bytes_digest::<Md5>("Hello, world!");
        assert_eq!(format!("{hash:x}"), "6cd3556deb0da54bca060b4c39479839");
    }

    #[test]
    fn test_parse_digest_from_hex() {
        let hash = super::parse_digest_from_hex::<Md5>("6cd3556deb0da54bca060b4c39479839");
        assert_eq!(
            hash,
            Some(super::compute_bytes_digest::<Md5>("Hello, world!"))
        );
        assert!(super::parse_digest_from_hex::<Md5>("not-hex").is_none());
        assert!(super::parse_digest_from_hex::<Md5>("6cd3").is_none());
    }

    #[test]
    fn test_hashing_writer() {
        let mut writer = HashingWriter::<_, Sha256>::new(Vec::new());
        writer.write_all(b"Hello, ").unwrap();
        writer.write_all(b"world!").unwrap();
        let (bytes, hash) = writer.finalize();
        assert_eq!(bytes, b"Hello, world!");
        assert_eq!(
            format!("{hash:x}"),
            "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3"
        );
    }
}
