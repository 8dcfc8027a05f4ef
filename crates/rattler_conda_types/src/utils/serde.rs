use crate::repo_data::NoArchKind;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{DeserializeAs, SerializeAs};

/// Timestamps in repodata are stored as milliseconds since the epoch, but older packages store
/// seconds. Values that are too small to be milliseconds of a reasonable date are read as seconds.
pub struct Timestamp;

/// Timestamps above this value (in seconds this is the year 9999) must be milliseconds.
const MAX_SECONDS_TIMESTAMP: i64 = 253_402_300_799;

impl<'de> DeserializeAs<'de, DateTime<Utc>> for Timestamp {
    fn deserialize_as<D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let timestamp = i64::deserialize(deserializer)?;
        let millis = if timestamp > MAX_SECONDS_TIMESTAMP {
            timestamp
        } else {
            timestamp.saturating_mul(1000)
        };
        DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| serde::de::Error::custom("timestamp is out of range"))
    }
}

impl SerializeAs<DateTime<Utc>> for Timestamp {
    fn serialize_as<S>(source: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        source.timestamp_millis().serialize(serializer)
    }
}

/// Track features are stored as a single string of space or comma separated features but some
/// tools write a list instead. Both are accepted, a string is written.
pub struct Features;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    String(String),
    List(Vec<String>),
}

impl<'de> DeserializeAs<'de, Vec<String>> for Features {
    fn deserialize_as<D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match StringOrList::deserialize(deserializer)? {
            StringOrList::String(features) => features
                .split([' ', ','])
                .filter(|feature| !feature.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
            StringOrList::List(features) => features,
        })
    }
}

impl SerializeAs<Vec<String>> for Features {
    fn serialize_as<S>(source: &Vec<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        source.iter().join(" ").serialize(serializer)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNoArch {
    Bool(bool),
    Kind(NoArchKind),
}

/// Reads the `noarch` field, which is either a kind or the legacy `true` for generic packages.
pub fn deserialize_noarch<'de, D>(deserializer: D) -> Result<Option<NoArchKind>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawNoArch>::deserialize(deserializer)? {
        None | Some(RawNoArch::Bool(false)) => None,
        Some(RawNoArch::Bool(true)) => Some(NoArchKind::Generic),
        Some(RawNoArch::Kind(kind)) => Some(kind),
    })
}
