use criterion::{criterion_group, criterion_main, Criterion};
use rattler_conda_types::{MatchSpec, PackageName, PackageRecord, RepoDataRecord, Version};
use rattler_solve::{libsolv_rs, SolverImpl, SolverTask};
use std::hint::black_box;
use std::str::FromStr;

/// Builds a channel of `layers` packages with `versions` versions each. Every version of a
/// package depends on a range of versions of the next package, so the solver has to look
/// through the versions to find a compatible combination.
fn layered_channel(layers: usize, versions: usize) -> Vec<RepoDataRecord> {
    let mut records = Vec::with_capacity(layers * versions);
    for layer in 0..layers {
        for version in 0..versions {
            let name = format!("pkg{layer}");
            let mut package_record = PackageRecord::new(
                PackageName::new_unchecked(name.clone()),
                Version::from_str(&format!("{version}.0")).unwrap(),
                "0".to_owned(),
            );
            if layer + 1 < layers {
                package_record.depends = vec![format!(
                    "pkg{} >={},<{}",
                    layer + 1,
                    version / 2,
                    version / 2 + 2
                )];
            }
            let file_name = format!("{name}-{version}.0-0.tar.bz2");
            records.push(RepoDataRecord {
                url: format!("https://conda.example.com/bench/linux-64/{file_name}")
                    .parse()
                    .unwrap(),
                channel: Some("bench".to_owned()),
                package_record,
                file_name,
            });
        }
    }
    records
}

fn criterion_benchmark(c: &mut Criterion) {
    let channel = vec![layered_channel(50, 40)];
    let specs: Vec<MatchSpec> = vec!["pkg0".parse().unwrap()];

    c.bench_function("solve layered channel", |b| {
        b.iter(|| {
            let task = SolverTask {
                specs: specs.clone(),
                ..SolverTask::new(black_box(&channel))
            };
            libsolv_rs::Solver.solve(task).unwrap()
        })
    });

    let conflicting: Vec<MatchSpec> = vec![
        "pkg0 >=30".parse().unwrap(),
        "pkg49 >=10".parse().unwrap(),
    ];
    c.bench_function("explain conflict in layered channel", |b| {
        b.iter(|| {
            let task = SolverTask {
                specs: conflicting.clone(),
                ..SolverTask::new(black_box(&channel))
            };
            libsolv_rs::Solver.solve(task).unwrap_err()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
