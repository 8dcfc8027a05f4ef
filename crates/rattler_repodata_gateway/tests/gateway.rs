use std::path::{Path, PathBuf};

use assert_matches::assert_matches;
use itertools::Itertools;
use rattler_conda_types::{Channel, MatchSpec, Platform, RepoDataRecord};
use rattler_repodata_gateway::{
    ChannelConfig, Gateway, GatewayError, PackageFormatSelection, RepoData, SourceConfig,
};
use rattler_solve::{libsolv_rs, RepoDataIter, SolverImpl, SolverTask};
use url::Url;

fn dummy_channel_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../test-data/channels/dummy")
}

fn dummy_channel() -> Channel {
    Channel::from_directory(&dummy_channel_path()).unwrap()
}

fn specs(specs: &[&str]) -> Vec<MatchSpec> {
    specs.iter().map(|s| s.parse().unwrap()).collect()
}

fn file_names(repo_data: &RepoData) -> Vec<String> {
    repo_data
        .iter()
        .map(|record| format!("{}/{}", record.package_record.subdir, record.file_name))
        .sorted()
        .collect()
}

#[tokio::test]
async fn test_direct_query_filters_by_spec() {
    let gateway = Gateway::new();
    let channel = dummy_channel();

    let records = gateway
        .query(
            [&channel],
            [Platform::Linux64, Platform::NoArch],
            specs(&["foo >=1.5"]),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(
        file_names(&records[0]),
        vec!["linux-64/foo-1.5-h0_0.tar.bz2", "linux-64/foo-2.0-h0_0.tar.bz2"]
    );
}

#[tokio::test]
async fn test_recursive_query() {
    let gateway = Gateway::new();
    let channel = dummy_channel();

    let records = gateway
        .query(
            [&channel],
            [Platform::Linux64, Platform::NoArch],
            specs(&["foo >=1.0,<2.0", "dummy-data"]),
        )
        .recursive(true)
        .await
        .unwrap();

    insta::assert_yaml_snapshot!(file_names(&records[0]), @r###"
    - linux-64/bar-1.0-h0_0.tar.bz2
    - linux-64/bar-1.0.5-h0_0.tar.bz2
    - linux-64/bar-1.2-h0_0.conda
    - linux-64/foo-1.0-h0_0.tar.bz2
    - linux-64/foo-1.5-h0_0.tar.bz2
    - noarch/dummy-data-1.0-0.tar.bz2
    "###);
}

#[tokio::test]
async fn test_package_format_selection() {
    let channel = dummy_channel();
    let gateway = Gateway::builder()
        .with_channel_config(ChannelConfig {
            default: SourceConfig::default(),
            per_channel: [(
                channel.base_url.clone(),
                SourceConfig {
                    package_format_selection: PackageFormatSelection::OnlyTarBz2,
                },
            )]
            .into_iter()
            .collect(),
        })
        .finish();

    let records = gateway
        .query([&channel], [Platform::Linux64], specs(&["bar 1.2"]))
        .await
        .unwrap();
    assert_eq!(
        file_names(&records[0]),
        vec!["linux-64/bar-1.2-h0_0.tar.bz2"]
    );
}

#[tokio::test]
async fn test_one_result_per_channel_in_order() {
    let gateway = Gateway::new();
    let dummy = dummy_channel();

    // A channel without any repodata except for an empty noarch subdir.
    let empty_dir = tempfile::tempdir().unwrap();
    fs_err::create_dir_all(empty_dir.path().join("noarch")).unwrap();
    fs_err::write(
        empty_dir.path().join("noarch/repodata.json"),
        r#"{"info": {"subdir": "noarch"}, "packages": {}}"#,
    )
    .unwrap();
    let empty = Channel::from_directory(empty_dir.path()).unwrap();

    let records = gateway
        .query(
            [&empty, &dummy],
            [Platform::Linux64, Platform::NoArch],
            specs(&["bar"]),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert!(records[0].is_empty());
    assert_eq!(records[1].len(), 3);
}

#[tokio::test]
async fn test_missing_noarch_is_an_error() {
    let gateway = Gateway::new();
    let empty_dir = tempfile::tempdir().unwrap();
    let channel = Channel::from_directory(empty_dir.path()).unwrap();

    let err = gateway
        .query([&channel], [Platform::NoArch], specs(&["foo"]))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        GatewayError::SubdirNotFound {
            platform: Platform::NoArch,
            ..
        }
    );

    // Other subdirs are treated as empty.
    let records = gateway
        .query([&channel], [Platform::Osx64], specs(&["foo"]))
        .await
        .unwrap();
    assert!(records[0].is_empty());
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_missing_subdir_is_logged() {
    let gateway = Gateway::new();
    let channel = dummy_channel();

    let records = gateway
        .query([&channel], [Platform::Win64], specs(&["foo"]))
        .await
        .unwrap();
    assert!(records[0].is_empty());
    assert!(logs_contain("does not contain repodata, treating it as empty"));
}

#[tokio::test]
async fn test_remote_channels_are_unsupported() {
    let gateway = Gateway::new();
    let channel = Channel::from_url(
        Url::parse("https://conda.anaconda.org/conda-forge/").unwrap(),
        &rattler_conda_types::ChannelConfig::default(),
    );

    let err = gateway
        .query([&channel], [Platform::Linux64], specs(&["python"]))
        .await
        .unwrap_err();
    assert_matches!(err, GatewayError::UnsupportedUrl(url) if url.scheme() == "https");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_queries_share_the_cache() {
    let gateway = Gateway::new();
    let channel = dummy_channel();

    let queries = (0..8).map(|_| {
        gateway
            .query(
                [&channel],
                [Platform::Linux64, Platform::NoArch],
                specs(&["foo"]),
            )
            .recursive(true)
            .execute()
    });
    let results = futures::future::try_join_all(queries).await.unwrap();

    let first = file_names(&results[0][0]);
    for result in &results[1..] {
        assert_eq!(file_names(&result[0]), first);
    }
}

#[tokio::test]
async fn test_solve_with_gateway_records() {
    let gateway = Gateway::new();
    let channel = dummy_channel();
    let specs = specs(&["foo >=1.0,<2.0"]);

    let repo_data = gateway
        .query(
            [&channel],
            [Platform::Linux64, Platform::NoArch],
            specs.clone(),
        )
        .recursive(true)
        .await
        .unwrap();

    let task = SolverTask {
        specs,
        ..SolverTask::new(repo_data.iter().map(|r| RepoDataIter(r.iter())).collect_vec())
    };
    let result = libsolv_rs::Solver.solve(task).unwrap();
    let installed: Vec<&RepoDataRecord> = result.records.iter().collect();
    assert_eq!(
        installed
            .iter()
            .map(|r| r.file_name.as_str())
            .collect_vec(),
        vec!["bar-1.2-h0_0.conda", "foo-1.5-h0_0.tar.bz2"]
    );
}
