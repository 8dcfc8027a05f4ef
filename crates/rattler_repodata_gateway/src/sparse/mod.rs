//! Lazily parse the records of a `repodata.json` file.
//!
//! [`SparseRepoData`] memory maps the file and only splits it into raw
//! records, sorted by package name. A record is deserialized when the records
//! of its package are requested.

use std::{
    collections::{HashSet, VecDeque},
    fmt, io,
    marker::PhantomData,
    path::Path,
};

use itertools::Itertools;
use rattler_conda_types::{
    compute_package_url, package_name_from_file_name, ArchiveType, Channel, ChannelInfo,
    MatchSpec, PackageName, PackageRecord, ParseStrictness, RepoDataRecord,
};
use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};
use serde_json::value::RawValue;
use superslice::Ext;

/// Selects which archive formats are returned when a subdirectory contains
/// the same package in both the `.tar.bz2` and the `.conda` format.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageFormatSelection {
    /// Only return `.tar.bz2` archives.
    OnlyTarBz2,

    /// Only return `.conda` archives.
    OnlyConda,

    /// Return the `.conda` archive of a package if it exists and otherwise
    /// the `.tar.bz2` archive.
    #[default]
    PreferConda,

    /// Return both archives.
    Both,
}

/// A struct to enable loading records from a `repodata.json` file on demand.
/// Since most of the time you don't need all the records from the
/// `repodata.json` this can help provide some significant speedups.
pub struct SparseRepoData {
    /// Data structure that holds a memory mapped repodata.json file and an
    /// index into the records store in that data.
    inner: SparseRepoDataInner,

    /// The channel from which this data was downloaded.
    channel: Channel,

    /// The subdirectory from where the repodata is downloaded
    subdir: String,

    /// A function that can be used to patch the package record after it has
    /// been parsed. This is mainly used to add `pip` to `python` if desired
    patch_record_fn: Option<fn(&mut PackageRecord)>,

    package_format_selection: PackageFormatSelection,
}

self_cell::self_cell!(
    /// A struct that holds a memory map of a `repodata.json` file and also a
    /// self-referential field which indexes the data in the memory map with a
    /// sparsely parsed json struct.
    struct SparseRepoDataInner {
        owner: memmap2::Mmap,

        #[covariant]
        dependent: LazyRepoData,
    }
);

impl SparseRepoData {
    /// Construct an instance of self from a file on disk and a [`Channel`].
    ///
    /// The `patch_function` can be used to patch the package record after it
    /// has been parsed.
    pub fn new(
        channel: Channel,
        subdir: impl Into<String>,
        path: impl AsRef<Path>,
        patch_function: Option<fn(&mut PackageRecord)>,
    ) -> Result<Self, io::Error> {
        let file = fs_err::File::open(path.as_ref())?;
        // SAFETY: the file is opened read-only and the mapping is never handed
        // out mutably.
        let memory_map = unsafe { memmap2::Mmap::map(file.file()) }?;
        let inner = SparseRepoDataInner::try_new(memory_map, |memory_map| {
            serde_json::from_slice(memory_map.as_ref())
        })?;
        Ok(Self {
            inner,
            channel,
            subdir: subdir.into(),
            patch_record_fn: patch_function,
            package_format_selection: PackageFormatSelection::default(),
        })
    }

    /// Sets which archive formats are returned when a package exists in
    /// multiple formats.
    #[must_use]
    pub fn with_package_format_selection(mut self, selection: PackageFormatSelection) -> Self {
        self.package_format_selection = selection;
        self
    }

    /// Returns the channel this data belongs to.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Returns the subdirectory this data belongs to.
    pub fn subdir(&self) -> &str {
        &self.subdir
    }

    /// Returns an iterator over all package names in this repodata file. The
    /// names are sorted and unique.
    pub fn package_names(&self) -> impl Iterator<Item = &'_ str> + '_ {
        let repo_data = self.inner.borrow_dependent();
        repo_data
            .packages
            .iter()
            .merge_by(repo_data.conda_packages.iter(), |a, b| {
                a.0.package <= b.0.package
            })
            .map(|(filename, _)| filename.package)
            .dedup()
    }

    /// Returns all the records for the specified package name. Records of
    /// `.tar.bz2` archives come first.
    pub fn load_records(&self, package_name: &PackageName) -> io::Result<Vec<RepoDataRecord>> {
        let repo_data = self.inner.borrow_dependent();
        let base_url = repo_data
            .info
            .as_ref()
            .and_then(|info| info.base_url.as_deref());

        let tar_bz2 = find_package(&repo_data.packages, package_name.as_normalized());
        let conda = find_package(&repo_data.conda_packages, package_name.as_normalized());

        let selected = match self.package_format_selection {
            PackageFormatSelection::OnlyTarBz2 => tar_bz2.iter().collect_vec(),
            PackageFormatSelection::OnlyConda => conda.iter().collect_vec(),
            PackageFormatSelection::Both => tar_bz2.iter().chain(conda).collect_vec(),
            PackageFormatSelection::PreferConda => {
                let conda_stems: HashSet<&str> =
                    conda.iter().map(|(filename, _)| filename.stem).collect();
                tar_bz2
                    .iter()
                    .filter(|(filename, _)| !conda_stems.contains(filename.stem))
                    .chain(conda)
                    .collect_vec()
            }
        };

        let mut records = Vec::with_capacity(selected.len());
        for (filename, raw) in selected {
            let mut package_record: PackageRecord = serde_json::from_str(raw.get())?;
            let url =
                compute_package_url(&self.channel, base_url, &self.subdir, filename.filename)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            if let Some(patch) = self.patch_record_fn {
                patch(&mut package_record);
            }
            records.push(RepoDataRecord {
                url,
                channel: Some(self.channel.record_channel()),
                package_record,
                file_name: filename.filename.to_owned(),
            });
        }

        tracing::trace!(
            "loaded {} records of '{}' from {}/{}",
            records.len(),
            package_name.as_normalized(),
            self.channel.canonical_name(),
            self.subdir
        );
        Ok(records)
    }

    /// Given a set of [`SparseRepoData`]s load all the records for the
    /// packages with the specified names and all the packages these records
    /// depend on.
    ///
    /// This will parse the records for the specified packages as well as all
    /// the packages these records depend on. The result has one entry per
    /// input repodata, in the same order.
    pub fn load_records_recursive<'a>(
        repo_data: impl IntoIterator<Item = &'a SparseRepoData>,
        package_names: impl IntoIterator<Item = PackageName>,
    ) -> io::Result<Vec<Vec<RepoDataRecord>>> {
        let repo_data: Vec<_> = repo_data.into_iter().collect();

        // Construct the result map
        let mut result: Vec<Vec<RepoDataRecord>> = vec![Vec::new(); repo_data.len()];

        // Keep track of which packages we already processed
        let mut seen: HashSet<PackageName> = HashSet::new();
        let mut pending = VecDeque::new();
        for name in package_names {
            if seen.insert(name.clone()) {
                pending.push_back(name);
            }
        }

        while let Some(next_package) = pending.pop_front() {
            for (i, repo_data) in repo_data.iter().enumerate() {
                let records = repo_data.load_records(&next_package)?;

                for dependency in records.iter().flat_map(dependency_names) {
                    if !seen.contains(&dependency) {
                        seen.insert(dependency.clone());
                        pending.push_back(dependency);
                    }
                }

                result[i].extend(records);
            }
        }

        Ok(result)
    }
}

/// Returns the names of the packages the record depends on. Dependencies that
/// cannot be parsed are skipped, the solver reports them.
pub(crate) fn dependency_names(record: &RepoDataRecord) -> impl Iterator<Item = PackageName> + '_ {
    record
        .package_record
        .depends
        .iter()
        .filter_map(|dependency| {
            match MatchSpec::from_str(dependency, ParseStrictness::Lenient) {
                Ok(spec) => Some(spec.name),
                Err(err) => {
                    tracing::trace!(
                        "skipping invalid dependency '{dependency}' of {}: {err}",
                        record.package_record
                    );
                    None
                }
            }
        })
}

/// Returns the range of entries that belong to the given package.
fn find_package<'s, 'i>(
    packages: &'s [(PackageFilename<'i>, &'i RawValue)],
    package_name: &str,
) -> &'s [(PackageFilename<'i>, &'i RawValue)] {
    let range = packages.equal_range_by(|(filename, _)| filename.package.cmp(package_name));
    &packages[range]
}

/// The lazily parsed contents of a `repodata.json` file.
#[derive(Deserialize)]
struct LazyRepoData<'i> {
    /// The channel information contained in the repodata.json file
    #[serde(default)]
    info: Option<ChannelInfo>,

    /// The tar.bz2 packages contained in the repodata.json file
    #[serde(
        borrow,
        default,
        deserialize_with = "deserialize_filename_and_raw_record"
    )]
    packages: Vec<(PackageFilename<'i>, &'i RawValue)>,

    /// The conda packages contained in the repodata.json file (under a
    /// different key for backwards compatibility with previous conda
    /// versions)
    #[serde(
        borrow,
        default,
        deserialize_with = "deserialize_filename_and_raw_record",
        rename = "packages.conda"
    )]
    conda_packages: Vec<(PackageFilename<'i>, &'i RawValue)>,
}

#[derive(Debug, Clone, Copy)]
struct PackageFilename<'i> {
    package: &'i str,
    stem: &'i str,
    filename: &'i str,
}

impl<'i> TryFrom<&'i str> for PackageFilename<'i> {
    type Error = &'static str;

    fn try_from(filename: &'i str) -> Result<Self, Self::Error> {
        let (stem, _) = ArchiveType::split_str(filename).ok_or("unknown archive extension")?;
        let package = package_name_from_file_name(filename).ok_or("invalid package filename")?;
        Ok(PackageFilename {
            package,
            stem,
            filename,
        })
    }
}

/// Deserializes a map of filenames to records into a list sorted by package
/// name, without parsing the records.
fn deserialize_filename_and_raw_record<'d, D: Deserializer<'d>>(
    deserializer: D,
) -> Result<Vec<(PackageFilename<'d>, &'d RawValue)>, D::Error> {
    #[allow(clippy::type_complexity)]
    struct MapVisitor<'d>(PhantomData<fn() -> Vec<(PackageFilename<'d>, &'d RawValue)>>);

    impl<'d> Visitor<'d> for MapVisitor<'d> {
        type Value = Vec<(PackageFilename<'d>, &'d RawValue)>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a map of package filenames to records")
        }

        fn visit_map<A: MapAccess<'d>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or_default());
            while let Some((key, value)) = map.next_entry::<&'d str, &'d RawValue>()? {
                let filename = PackageFilename::try_from(key).map_err(|err| {
                    serde::de::Error::custom(format!("'{key}': {err}"))
                })?;
                entries.push((filename, value));
            }
            Ok(entries)
        }
    }

    let mut entries = deserializer.deserialize_map(MapVisitor(PhantomData))?;

    // Sort the entries by package name so records of a package can be found
    // with a binary search.
    entries.sort_by(|(a, _), (b, _)| a.package.cmp(b.package).then(a.filename.cmp(b.filename)));

    Ok(entries)
}
