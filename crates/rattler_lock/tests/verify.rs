use std::path::{Path, PathBuf};

use assert_matches::assert_matches;
use rattler_conda_types::{
    Channel, GenericVirtualPackage, MatchSpec, PackageName, Platform, RepoData, RepoDataRecord,
    Version,
};
use rattler_lock::{
    verify, InvalidReason, LockFile, LockVerifier, Satisfiability, StaleReason,
    DEFAULT_ENVIRONMENT_NAME,
};
use rattler_solve::{libsolv_rs, SolverImpl, SolverTask};

fn dummy_channel_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../test-data/channels/dummy")
}

fn dummy_channel() -> (Channel, Vec<Vec<RepoDataRecord>>) {
    let path = dummy_channel_path();
    let channel = Channel::from_directory(&path).unwrap();
    let records = ["linux-64", "noarch"]
        .into_iter()
        .map(|subdir| {
            RepoData::from_path(path.join(subdir).join("repodata.json"))
                .unwrap()
                .into_repo_data_records(&channel)
                .unwrap()
        })
        .collect();
    (channel, records)
}

fn specs(specs: &[&str]) -> Vec<MatchSpec> {
    specs.iter().map(|s| s.parse().unwrap()).collect()
}

fn unix() -> Vec<GenericVirtualPackage> {
    vec![GenericVirtualPackage {
        name: PackageName::new_unchecked("__unix"),
        version: "0".parse::<Version>().unwrap(),
        build_string: "0".to_owned(),
    }]
}

/// Solves the specs against the dummy channel and writes the result to a
/// lock-file that went through a render and parse cycle.
fn solve_and_lock(requested: &[&str]) -> LockFile {
    let (channel, records) = dummy_channel();
    let task = SolverTask {
        specs: specs(requested),
        virtual_packages: unix(),
        ..SolverTask::new(&records)
    };
    let result = libsolv_rs::Solver.solve(task).unwrap();

    let lock_file = LockFile::builder()
        .with_channels(DEFAULT_ENVIRONMENT_NAME, [&channel])
        .with_solution(DEFAULT_ENVIRONMENT_NAME, Platform::Linux64, &result)
        .finish();

    lock_file.render_to_string().unwrap().parse().unwrap()
}

#[test]
fn test_fresh_solve_is_satisfied() {
    let lock_file = solve_and_lock(&["foo >=1.0,<2.0"]);
    assert_eq!(
        verify(
            &lock_file,
            &specs(&["foo >=1.0,<2.0"]),
            DEFAULT_ENVIRONMENT_NAME,
            Platform::Linux64
        ),
        Satisfiability::Satisfied
    );

    // The records are the current metadata, so the hashes match as well.
    let (_, records) = dummy_channel();
    let current = records.concat();
    let specs = specs(&["foo >=1.0,<2.0"]);
    assert!(LockVerifier::new(&specs)
        .with_current_records(&current)
        .verify(&lock_file, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64)
        .is_satisfied());
}

#[test]
fn test_channel_specific_spec_is_satisfied() {
    let (channel, _) = dummy_channel();
    let spec = format!(
        "{}::foo >=1.0,<2.0",
        channel.base_url.as_str().trim_end_matches('/')
    );
    let lock_file = solve_and_lock(&[&spec]);
    assert_eq!(
        verify(
            &lock_file,
            &specs(&[&spec]),
            DEFAULT_ENVIRONMENT_NAME,
            Platform::Linux64
        ),
        Satisfiability::Satisfied
    );

    // The same package requested from another channel is not satisfied by the lock-file.
    assert_matches!(
        verify(
            &lock_file,
            &specs(&["conda-forge::foo >=1.0,<2.0"]),
            DEFAULT_ENVIRONMENT_NAME,
            Platform::Linux64
        ),
        Satisfiability::Stale(StaleReason::UnsatisfiedSpec(_))
    );
}

#[test]
fn test_stale_after_spec_changes() {
    let lock_file = solve_and_lock(&["foo >=1.0,<2.0"]);

    assert_matches!(
        verify(
            &lock_file,
            &specs(&["foo >=2.0"]),
            DEFAULT_ENVIRONMENT_NAME,
            Platform::Linux64
        ),
        Satisfiability::Stale(StaleReason::UnsatisfiedSpec(_))
    );
    assert_matches!(
        verify(
            &lock_file,
            &specs(&["bar"]),
            DEFAULT_ENVIRONMENT_NAME,
            Platform::Linux64
        ),
        Satisfiability::Stale(StaleReason::UnreachablePackage(name)) if name == "foo"
    );
    assert_matches!(
        verify(
            &lock_file,
            &specs(&["foo"]),
            DEFAULT_ENVIRONMENT_NAME,
            Platform::Osx64
        ),
        Satisfiability::Stale(StaleReason::MissingPlatform(Platform::Osx64))
    );
}

#[test]
fn test_virtual_package_dependencies() {
    let lock_file = solve_and_lock(&["qux"]);
    let specs = specs(&["qux"]);

    assert!(verify(&lock_file, &specs, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64).is_satisfied());

    let virtual_packages = unix();
    assert!(LockVerifier::new(&specs)
        .with_virtual_packages(&virtual_packages)
        .verify(&lock_file, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64)
        .is_satisfied());

    assert_matches!(
        LockVerifier::new(&specs)
            .with_virtual_packages(&[])
            .verify(&lock_file, DEFAULT_ENVIRONMENT_NAME, Platform::Linux64),
        Satisfiability::Invalid(InvalidReason::DanglingDependency { dependency, .. }) if dependency == "__unix"
    );
}

#[test]
fn test_modified_lock_file_is_invalid() {
    let lock_file = solve_and_lock(&["foo >=1.0,<2.0"]);

    // Remove `bar` from the document, `foo` still depends on it.
    let rendered = lock_file.render_to_string().unwrap();
    let mut document: serde_yaml::Value = serde_yaml::from_str(&rendered).unwrap();
    let selectors = document["environments"][DEFAULT_ENVIRONMENT_NAME]["packages"]["linux-64"]
        .as_sequence_mut()
        .unwrap();
    selectors.retain(|selector| {
        !selector["conda"]
            .as_str()
            .is_some_and(|location| location.ends_with("bar-1.2-h0_0.conda"))
    });
    let modified: LockFile = serde_yaml::to_string(&document).unwrap().parse().unwrap();

    assert_matches!(
        verify(
            &modified,
            &specs(&["foo"]),
            DEFAULT_ENVIRONMENT_NAME,
            Platform::Linux64
        ),
        Satisfiability::Invalid(InvalidReason::DanglingDependency { .. })
    );
}
