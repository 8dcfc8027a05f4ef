use super::{ArchiveType, PackageRecord, RepoData};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// The dependency that is added to revoked packages. No package provides it, so a revoked package
/// can never be installed.
const REVOKED_DEPENDENCY: &str = "package_has_been_revoked";

/// A changeset for a single [`PackageRecord`]. Fields that are `None` are left untouched.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecordPatch {
    /// Replaces the dependencies of the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends: Option<Vec<String>>,

    /// Replaces the constraints of the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constrains: Option<Vec<String>>,

    /// Replaces the track features of the record
    #[serde_as(as = "Option<crate::utils::serde::Features>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_features: Option<Vec<String>>,

    /// Replaces (or with `null`, clears) the features of the record
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub features: Option<Option<String>>,

    /// Replaces (or with `null`, clears) the license of the record
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub license: Option<Option<String>>,

    /// Replaces (or with `null`, clears) the license family of the record
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub license_family: Option<Option<String>>,
}

/// Repodata patch instructions as published by channels in `patch_instructions.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchInstructions {
    /// Patches for `.tar.bz2` packages. A patch also applies to the `.conda` variant of the same
    /// package unless that variant has its own patch.
    #[serde(default)]
    pub packages: IndexMap<String, PackageRecordPatch>,

    /// Patches for `.conda` packages
    #[serde(default, rename = "packages.conda")]
    pub conda_packages: IndexMap<String, PackageRecordPatch>,

    /// Files that are moved to the `removed` set of the repodata
    #[serde(default)]
    pub remove: IndexSet<String>,

    /// Files that stay in the repodata but can no longer be installed
    #[serde(default)]
    pub revoke: IndexSet<String>,
}

impl PackageRecord {
    /// Applies a patch to this record.
    pub fn apply_patch(&mut self, patch: &PackageRecordPatch) {
        if let Some(depends) = &patch.depends {
            self.depends.clone_from(depends);
        }
        if let Some(constrains) = &patch.constrains {
            self.constrains.clone_from(constrains);
        }
        if let Some(track_features) = &patch.track_features {
            self.track_features.clone_from(track_features);
        }
        if let Some(features) = &patch.features {
            self.features.clone_from(features);
        }
        if let Some(license) = &patch.license {
            self.license.clone_from(license);
        }
        if let Some(license_family) = &patch.license_family {
            self.license_family.clone_from(license_family);
        }
    }
}

/// Returns the name of the `.conda` file that belongs to a `.tar.bz2` file.
fn conda_twin(file_name: &str) -> Option<String> {
    match ArchiveType::split_str(file_name)? {
        (stem, ArchiveType::TarBz2) => Some(format!("{stem}{}", ArchiveType::Conda.extension())),
        (_, ArchiveType::Conda) => None,
    }
}

impl RepoData {
    /// Applies patch instructions to the records in this repodata.
    pub fn apply_patches(&mut self, instructions: &PatchInstructions) {
        for (file_name, patch) in &instructions.packages {
            if let Some(record) = self.packages.get_mut(file_name) {
                record.apply_patch(patch);
            }
            if let Some(twin) = conda_twin(file_name) {
                if instructions.conda_packages.contains_key(&twin) {
                    continue;
                }
                if let Some(record) = self.conda_packages.get_mut(&twin) {
                    record.apply_patch(patch);
                }
            }
        }

        for (file_name, patch) in &instructions.conda_packages {
            if let Some(record) = self.conda_packages.get_mut(file_name) {
                record.apply_patch(patch);
            }
        }

        for file_name in &instructions.remove {
            let targets = std::iter::once(file_name.clone()).chain(conda_twin(file_name));
            for target in targets {
                let removed = self.packages.shift_remove(&target).is_some()
                    | self.conda_packages.shift_remove(&target).is_some();
                if removed {
                    self.removed.insert(target);
                }
            }
        }

        for file_name in &instructions.revoke {
            let targets = std::iter::once(file_name.clone()).chain(conda_twin(file_name));
            for target in targets {
                let record = match self.packages.get_mut(&target) {
                    Some(record) => Some(record),
                    None => self.conda_packages.get_mut(&target),
                };
                if let Some(record) = record {
                    if !record.depends.iter().any(|dep| dep == REVOKED_DEPENDENCY) {
                        record.depends.push(REVOKED_DEPENDENCY.to_owned());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{PackageRecordPatch, PatchInstructions};
    use crate::{PackageName, PackageRecord, RepoData, Version};
    use std::str::FromStr;

    fn record(name: &str) -> PackageRecord {
        let mut record = PackageRecord::new(
            PackageName::new_unchecked(name),
            Version::from_str("1.0").unwrap(),
            "0".to_owned(),
        );
        record.depends = vec!["python >=3.8".to_owned()];
        record.license = Some("MIT".to_owned());
        record
    }

    fn repo_data() -> RepoData {
        let mut repo_data = RepoData::default();
        repo_data
            .packages
            .insert("foo-1.0-0.tar.bz2".to_owned(), record("foo"));
        repo_data
            .conda_packages
            .insert("foo-1.0-0.conda".to_owned(), record("foo"));
        repo_data
            .conda_packages
            .insert("bar-1.0-0.conda".to_owned(), record("bar"));
        repo_data
    }

    #[test]
    fn test_patch_applies_to_conda_twin() {
        let mut repo_data = repo_data();
        let instructions: PatchInstructions = serde_json::from_str(
            r#"{
                "packages": {
                    "foo-1.0-0.tar.bz2": { "depends": ["python >=3.8,<3.12"], "license": null }
                }
            }"#,
        )
        .unwrap();
        repo_data.apply_patches(&instructions);

        for record in [
            &repo_data.packages["foo-1.0-0.tar.bz2"],
            &repo_data.conda_packages["foo-1.0-0.conda"],
        ] {
            assert_eq!(record.depends, vec!["python >=3.8,<3.12"]);
            assert_eq!(record.license, None);
        }
        assert_eq!(
            repo_data.conda_packages["bar-1.0-0.conda"].license.as_deref(),
            Some("MIT")
        );
    }

    #[test]
    fn test_remove_and_revoke() {
        let mut repo_data = repo_data();
        let instructions = PatchInstructions {
            remove: ["foo-1.0-0.tar.bz2".to_owned()].into_iter().collect(),
            revoke: ["bar-1.0-0.conda".to_owned()].into_iter().collect(),
            ..PatchInstructions::default()
        };
        repo_data.apply_patches(&instructions);

        assert!(repo_data.packages.is_empty());
        assert!(!repo_data.conda_packages.contains_key("foo-1.0-0.conda"));
        assert!(repo_data.removed.contains("foo-1.0-0.tar.bz2"));
        assert!(repo_data.removed.contains("foo-1.0-0.conda"));
        assert!(repo_data.conda_packages["bar-1.0-0.conda"]
            .depends
            .contains(&"package_has_been_revoked".to_owned()));
    }

    #[test]
    fn test_untouched_fields() {
        let mut record = record("foo");
        record.apply_patch(&PackageRecordPatch {
            constrains: Some(vec!["baz <2".to_owned()]),
            ..PackageRecordPatch::default()
        });
        assert_eq!(record.depends, vec!["python >=3.8"]);
        assert_eq!(record.constrains, vec!["baz <2"]);
    }
}
