use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use rattler_conda_types::{
    Channel, GenericVirtualPackage, MatchSpec, PackageName, PackageRecord, RepoData,
    RepoDataRecord, SolverResult, Version,
};
use rattler_solve::{
    libsolv_rs, solve_async, ChannelPriority, ConflictingConstraint, SolveError, SolveStrategy,
    SolverImpl, SolverTask,
};
use rstest::rstest;
use std::str::FromStr;

fn dummy_channel_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../test-data/channels/dummy")
}

/// Reads the linux-64 and noarch records of the dummy test channel.
fn dummy_channel() -> Vec<Vec<RepoDataRecord>> {
    let path = dummy_channel_path();
    let channel = Channel::from_directory(&path).unwrap();
    ["linux-64", "noarch"]
        .into_iter()
        .map(|subdir| {
            RepoData::from_path(path.join(subdir).join("repodata.json"))
                .unwrap()
                .into_repo_data_records(&channel)
                .unwrap()
        })
        .collect()
}

fn record(channel: &str, name: &str, version: &str, depends: &[&str]) -> RepoDataRecord {
    let mut package_record = PackageRecord::new(
        PackageName::new_unchecked(name),
        Version::from_str(version).unwrap(),
        "0".to_owned(),
    );
    package_record.depends = depends.iter().map(|s| (*s).to_owned()).collect();
    package_record.subdir = "linux-64".to_owned();

    let file_name = format!("{name}-{version}-0.tar.bz2");
    RepoDataRecord {
        url: format!("https://conda.example.com/{channel}/linux-64/{file_name}")
            .parse()
            .unwrap(),
        channel: Some(channel.to_owned()),
        package_record,
        file_name,
    }
}

fn specs(specs: &[&str]) -> Vec<MatchSpec> {
    specs.iter().map(|s| s.parse().unwrap()).collect()
}

fn solve(task: SolverTask<&Vec<Vec<RepoDataRecord>>>) -> Result<SolverResult, SolveError> {
    libsolv_rs::Solver.solve(task)
}

/// Formats the result as `name=version` pairs in installation order.
fn installed(result: &SolverResult) -> Vec<String> {
    result
        .records
        .iter()
        .map(|r| {
            format!(
                "{}={}",
                r.package_record.name.as_normalized(),
                r.package_record.version
            )
        })
        .collect()
}

fn find_version(result: &SolverResult, name: &str) -> Option<String> {
    result
        .find(name)
        .map(|record| record.package_record.version.to_string())
}

#[test]
fn test_solve_dummy_channel() {
    let channel = dummy_channel();
    let task = SolverTask {
        specs: specs(&["foo>=1.0,<2.0"]),
        ..SolverTask::new(&channel)
    };

    let result = solve(task).unwrap();
    similar_asserts::assert_eq!(installed(&result), vec!["bar=1.2", "foo=1.5"]);

    // The `.conda` archive is preferred over the `.tar.bz2` of the same package.
    assert_eq!(result.records[0].file_name, "bar-1.2-h0_0.conda");
}

#[test]
fn test_solve_is_deterministic() {
    let channel = dummy_channel();
    let make_task = || SolverTask {
        specs: specs(&["foo", "baz", "dummy-data"]),
        ..SolverTask::new(&channel)
    };

    let first = solve(make_task()).unwrap();
    for _ in 0..5 {
        assert_eq!(solve(make_task()).unwrap(), first);
    }
    assert_eq!(find_version(&first, "foo").as_deref(), Some("1.0"));
}

#[test]
fn test_contradictory_specs() {
    let channel = vec![vec![
        record("a", "foo", "1.0", &[]),
        record("a", "foo", "2.0", &[]),
        record("a", "bar", "1.0", &[]),
    ]];
    let task = SolverTask {
        specs: specs(&["bar", "foo==1.0", "foo==2.0"]),
        ..SolverTask::new(&channel)
    };

    let err = assert_matches!(solve(task), Err(SolveError::Unsolvable(err)) => err);
    assert_eq!(
        err.conflicts,
        vec![
            ConflictingConstraint::Spec("foo==1.0".parse().unwrap()),
            ConflictingConstraint::Spec("foo==2.0".parse().unwrap()),
        ]
    );
    assert!(err.explanation.contains("foo 1.0"), "{}", err.explanation);
    assert!(err.explanation.contains("foo 2.0"), "{}", err.explanation);

    let message = SolveError::Unsolvable(err).to_string();
    let (first, second): (MatchSpec, MatchSpec) =
        ("foo==1.0".parse().unwrap(), "foo==2.0".parse().unwrap());
    assert!(message.starts_with(&format!(
        "Cannot solve the request because of: {first}, {second}"
    )));
}

#[test]
fn test_missing_package() {
    let channel = dummy_channel();
    let task = SolverTask {
        specs: specs(&["foo", "does-not-exist"]),
        ..SolverTask::new(&channel)
    };

    let err = assert_matches!(solve(task), Err(SolveError::Unsolvable(err)) => err);
    assert_eq!(
        err.conflicts,
        vec![ConflictingConstraint::Spec(
            "does-not-exist".parse().unwrap()
        )]
    );
    insta::assert_snapshot!(err.explanation, @r"
    The following packages are incompatible
    - no candidates were found for does-not-exist
    ");
}

#[test]
fn test_locked_packages_are_preferred() {
    let channel = dummy_channel();
    let locked = channel[0]
        .iter()
        .find(|r| r.file_name == "bar-1.0-h0_0.tar.bz2")
        .cloned()
        .unwrap();

    let result = solve(SolverTask {
        specs: specs(&["bar"]),
        ..SolverTask::new(&channel)
    })
    .unwrap();
    assert_eq!(find_version(&result, "bar").as_deref(), Some("1.2"));

    let result = solve(SolverTask {
        specs: specs(&["bar"]),
        locked_packages: vec![locked.clone()],
        ..SolverTask::new(&channel)
    })
    .unwrap();
    assert_eq!(find_version(&result, "bar").as_deref(), Some("1.0"));

    // A locked package does not prevent an update that is required.
    let result = solve(SolverTask {
        specs: specs(&["bar>=1.0.5"]),
        locked_packages: vec![locked],
        ..SolverTask::new(&channel)
    })
    .unwrap();
    assert_eq!(find_version(&result, "bar").as_deref(), Some("1.2"));
}

#[test]
fn test_pinned_packages_cannot_change() {
    let channel = dummy_channel();
    let pinned = channel[0]
        .iter()
        .find(|r| r.file_name == "bar-1.0-h0_0.tar.bz2")
        .cloned()
        .unwrap();

    let result = solve(SolverTask {
        specs: specs(&["foo"]),
        pinned_packages: vec![pinned.clone()],
        ..SolverTask::new(&channel)
    })
    .unwrap();
    assert_eq!(installed(&result), vec!["bar=1.0", "foo=1.5"]);

    let err = assert_matches!(
        solve(SolverTask {
            specs: specs(&["foo", "bar>=1.2"]),
            pinned_packages: vec![pinned.clone()],
            ..SolverTask::new(&channel)
        }),
        Err(SolveError::Unsolvable(err)) => err
    );
    assert_eq!(
        err.conflicts,
        vec![
            ConflictingConstraint::Spec("bar>=1.2".parse().unwrap()),
            ConflictingConstraint::Pin(pinned),
        ]
    );
}

#[test]
fn test_constraints_restrict_without_installing() {
    let channel = dummy_channel();
    let result = solve(SolverTask {
        specs: specs(&["foo"]),
        constraints: specs(&["bar<1.2", "baz>=5"]),
        ..SolverTask::new(&channel)
    })
    .unwrap();
    assert_eq!(installed(&result), vec!["bar=1.0.5", "foo=1.5"]);

    let err = assert_matches!(
        solve(SolverTask {
            specs: specs(&["bar>=1.2"]),
            constraints: specs(&["bar<1.2"]),
            ..SolverTask::new(&channel)
        }),
        Err(SolveError::Unsolvable(err)) => err
    );
    assert_eq!(
        err.conflicts,
        vec![
            ConflictingConstraint::Spec("bar>=1.2".parse().unwrap()),
            ConflictingConstraint::Constraint("bar<1.2".parse().unwrap()),
        ]
    );
}

#[rstest]
#[case::highest(SolveStrategy::Highest, vec!["bar=1.2", "foo=1.5"])]
#[case::lowest(SolveStrategy::LowestVersion, vec!["bar=1.0", "foo=1.0"])]
#[case::lowest_direct(SolveStrategy::LowestVersionDirect, vec!["bar=1.2", "foo=1.0"])]
fn test_solve_strategy(#[case] strategy: SolveStrategy, #[case] expected: Vec<&str>) {
    let channel = dummy_channel();
    let result = solve(SolverTask {
        specs: specs(&["foo<2"]),
        strategy,
        ..SolverTask::new(&channel)
    })
    .unwrap();
    assert_eq!(installed(&result), expected);
}

fn two_channels() -> Vec<Vec<RepoDataRecord>> {
    vec![
        vec![record("a", "foo", "1.0", &[])],
        vec![record("b", "foo", "2.0", &[]), record("b", "bar", "1.0", &[])],
    ]
}

#[rstest]
#[case::strict(ChannelPriority::Strict, Some("1.0"))]
#[case::flexible(ChannelPriority::Flexible, Some("1.0"))]
#[case::disabled(ChannelPriority::Disabled, Some("2.0"))]
fn test_channel_priority(#[case] channel_priority: ChannelPriority, #[case] expected: Option<&str>) {
    let channels = two_channels();
    let result = solve(SolverTask {
        specs: specs(&["foo", "bar"]),
        channel_priority,
        ..SolverTask::new(&channels)
    })
    .unwrap();
    assert_eq!(find_version(&result, "foo").as_deref(), expected);
}

#[test]
fn test_strict_channel_priority_excludes_lower_channels() {
    let channels = two_channels();

    let err = assert_matches!(
        solve(SolverTask {
            specs: specs(&["foo>=2"]),
            channel_priority: ChannelPriority::Strict,
            ..SolverTask::new(&channels)
        }),
        Err(SolveError::Unsolvable(err)) => err
    );
    assert!(
        err.explanation.contains("strict channel priority"),
        "{}",
        err.explanation
    );

    let result = solve(SolverTask {
        specs: specs(&["foo>=2"]),
        channel_priority: ChannelPriority::Flexible,
        ..SolverTask::new(&channels)
    })
    .unwrap();
    assert_eq!(find_version(&result, "foo").as_deref(), Some("2.0"));
}

#[test]
fn test_channel_specific_spec() {
    let channels = two_channels();
    let mut spec: MatchSpec = "foo".parse().unwrap();
    spec.channel = Some(Arc::new(Channel {
        platforms: None,
        base_url: "https://conda.example.com/b/".parse().unwrap(),
        name: Some("b".to_owned()),
    }));

    let result = solve(SolverTask {
        specs: vec![spec],
        ..SolverTask::new(&channels)
    })
    .unwrap();
    let foo = result.find("foo").unwrap();
    assert_eq!(foo.channel.as_deref(), Some("b"));
    assert_eq!(foo.package_record.version.to_string(), "2.0");
}

#[test]
fn test_exclude_newer() {
    let channel = dummy_channel();
    let result = solve(SolverTask {
        specs: specs(&["foo"]),
        exclude_newer: Some(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()),
        ..SolverTask::new(&channel)
    })
    .unwrap();
    assert_eq!(installed(&result), vec!["bar=1.0", "foo=1.0"]);

    let err = assert_matches!(
        solve(SolverTask {
            specs: specs(&["foo>=1.5"]),
            exclude_newer: Some(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()),
            ..SolverTask::new(&channel)
        }),
        Err(SolveError::Unsolvable(err)) => err
    );
    assert!(err.explanation.contains("cutoff"), "{}", err.explanation);
}

#[test]
fn test_duplicate_records() {
    let channel = vec![vec![
        record("a", "foo", "1.0", &[]),
        record("a", "foo", "1.0", &[]),
    ]];
    assert_matches!(
        solve(SolverTask {
            specs: specs(&["foo"]),
            ..SolverTask::new(&channel)
        }),
        Err(SolveError::DuplicateRecords(name)) if name == "foo-1.0-0.tar.bz2"
    );
}

#[test]
fn test_virtual_packages() {
    let channel = dummy_channel();
    assert_matches!(
        solve(SolverTask {
            specs: specs(&["qux"]),
            ..SolverTask::new(&channel)
        }),
        Err(SolveError::Unsolvable(_))
    );

    let result = solve(SolverTask {
        specs: specs(&["qux"]),
        virtual_packages: vec![GenericVirtualPackage {
            name: PackageName::new_unchecked("__unix"),
            version: Version::from_str("0").unwrap(),
            build_string: "0".to_owned(),
        }],
        ..SolverTask::new(&channel)
    })
    .unwrap();

    // Virtual packages are never part of the result.
    assert_eq!(installed(&result), vec!["qux=1.0"]);
}

#[test]
fn test_step_budget() {
    let channel = dummy_channel();
    assert_matches!(
        solve(SolverTask {
            specs: specs(&["foo"]),
            max_steps: Some(0),
            ..SolverTask::new(&channel)
        }),
        Err(SolveError::Timeout)
    );
}

#[test]
fn test_timeout() {
    let channel = dummy_channel();
    assert_matches!(
        solve(SolverTask {
            specs: specs(&["foo", "dummy-data"]),
            timeout: Some(Duration::ZERO),
            ..SolverTask::new(&channel)
        }),
        Err(SolveError::Timeout)
    );

    // A generous timeout does not get in the way.
    let result = solve(SolverTask {
        specs: specs(&["foo<2"]),
        timeout: Some(Duration::from_secs(600)),
        ..SolverTask::new(&channel)
    })
    .unwrap();
    assert_eq!(find_version(&result, "foo").as_deref(), Some("1.5"));
}

#[tokio::test]
async fn test_solve_async() {
    let result = solve_async(SolverTask {
        specs: specs(&["foo<2", "dummy-data"]),
        ..SolverTask::new(dummy_channel())
    })
    .await
    .unwrap();
    assert_eq!(
        installed(&result),
        vec!["bar=1.2", "dummy-data=1.0", "foo=1.5"]
    );
}

#[test]
#[tracing_test::traced_test]
fn test_exclusions_are_logged() {
    let channel = dummy_channel();
    solve(SolverTask {
        specs: specs(&["foo"]),
        exclude_newer: Some(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()),
        ..SolverTask::new(&channel)
    })
    .unwrap();
    assert!(logs_contain("ignoring 'foo-2.0-h0_0.tar.bz2'"));
}
