use rattler_conda_types::PackageRecord;
use rattler_digest::{Md5Hash, Sha256, Sha256Hash};

/// This implementation of the `Deserialize` trait for the `PackageHashes`
/// struct
///
/// It expects the input to have either a `md5` field, a `sha256` field, or
/// both. If both fields are present, it constructs a `Md5Sha256` instance
/// with their values. If only the `md5` field is present, it constructs a
/// `Md5` instance with its value. If only the `sha256` field is present, it
/// constructs a `Sha256` instance with its value. If neither field is present
/// there is no hash at all.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum PackageHashes {
    /// Contains an MD5 hash
    Md5(Md5Hash),
    /// Contains as Sha256 Hash
    Sha256(Sha256Hash),
    /// Contains both hashes
    Md5Sha256(Md5Hash, Sha256Hash),
}

impl PackageHashes {
    /// Create correct enum from hashes
    pub fn from_hashes(md5: Option<Md5Hash>, sha256: Option<Sha256Hash>) -> Option<Self> {
        match (md5, sha256) {
            (Some(md5), None) => Some(Self::Md5(md5)),
            (None, Some(sha256)) => Some(Self::Sha256(sha256)),
            (Some(md5), Some(sha256)) => Some(Self::Md5Sha256(md5, sha256)),
            (None, None) => None,
        }
    }

    /// Returns the Sha256 hash
    pub fn sha256(&self) -> Option<&Sha256Hash> {
        match self {
            PackageHashes::Md5(_) => None,
            PackageHashes::Sha256(sha256) | PackageHashes::Md5Sha256(_, sha256) => Some(sha256),
        }
    }

    /// Returns the MD5 hash
    pub fn md5(&self) -> Option<&Md5Hash> {
        match self {
            PackageHashes::Sha256(_) => None,
            PackageHashes::Md5(md5) | PackageHashes::Md5Sha256(md5, _) => Some(md5),
        }
    }

    /// Returns true if any hash that both sides carry differs. Two sets of
    /// hashes without an algorithm in common never conflict.
    pub fn conflicts_with(&self, other: &PackageHashes) -> bool {
        let md5_differs = matches!((self.md5(), other.md5()), (Some(a), Some(b)) if a != b);
        let sha256_differs =
            matches!((self.sha256(), other.sha256()), (Some(a), Some(b)) if a != b);
        md5_differs || sha256_differs
    }
}

/// Computes a SHA256 over the canonical JSON form of a record. Used for
/// records that come without an artifact hash so that the lock still pins
/// the exact metadata that was resolved.
pub(crate) fn compute_record_hash(record: &PackageRecord) -> Sha256Hash {
    let mut record = record.clone();
    record.md5 = None;
    record.sha256 = None;
    // Serializing a record only fails for non-string map keys, which it does not have.
    let canonical = serde_json::to_vec(&record).unwrap_or_default();
    rattler_digest::compute_bytes_digest::<Sha256>(canonical)
}

#[cfg(test)]
mod test {
    use super::{compute_record_hash, PackageHashes};
    use rattler_conda_types::PackageRecord;
    use rattler_digest::{parse_digest_from_hex, Md5, Sha256};

    #[test]
    fn test_from_hashes() {
        let md5 = parse_digest_from_hex::<Md5>("4eccaeba205f0aed9ac3a9ea58568ca3").unwrap();
        let sha256 = parse_digest_from_hex::<Sha256>(
            "f240217476e148e825420c6bc3a0c0efb08c0718b7042fae960400c02af858a3",
        )
        .unwrap();

        assert_eq!(PackageHashes::from_hashes(None, None), None);
        assert_eq!(
            PackageHashes::from_hashes(Some(md5), None),
            Some(PackageHashes::Md5(md5))
        );
        let both = PackageHashes::from_hashes(Some(md5), Some(sha256)).unwrap();
        assert_eq!(both.md5(), Some(&md5));
        assert_eq!(both.sha256(), Some(&sha256));
    }

    #[test]
    fn test_conflicts_with() {
        let md5_a = parse_digest_from_hex::<Md5>("4eccaeba205f0aed9ac3a9ea58568ca3").unwrap();
        let md5_b = parse_digest_from_hex::<Md5>("00000000000000000000000000000000").unwrap();
        let sha256 = parse_digest_from_hex::<Sha256>(
            "f240217476e148e825420c6bc3a0c0efb08c0718b7042fae960400c02af858a3",
        )
        .unwrap();

        assert!(PackageHashes::Md5(md5_a).conflicts_with(&PackageHashes::Md5(md5_b)));
        assert!(!PackageHashes::Md5(md5_a).conflicts_with(&PackageHashes::Sha256(sha256)));
        assert!(!PackageHashes::Md5Sha256(md5_a, sha256)
            .conflicts_with(&PackageHashes::Md5(md5_a)));
    }

    #[test]
    fn test_record_hash_is_stable() {
        let record = PackageRecord::new(
            "foo".parse().unwrap(),
            "1.0".parse::<rattler_conda_types::Version>().unwrap(),
            "h0_0".to_owned(),
        );
        let mut other = record.clone();
        assert_eq!(compute_record_hash(&record), compute_record_hash(&other));

        other.depends.push("bar".to_owned());
        assert_ne!(compute_record_hash(&record), compute_record_hash(&other));
    }
}
