//! Provides [`SerializableHash`] which can be used with `serde_with` to (de)serialize a digest as
//! a hex string.
//!
//! ```
//! use rattler_digest::{serde::SerializableHash, Sha256, Sha256Hash};
//! use serde::{Deserialize, Serialize};
//! use serde_with::serde_as;
//!
//! #[serde_as]
//! #[derive(Serialize, Deserialize)]
//! struct Record {
//!     #[serde_as(as = "SerializableHash::<Sha256>")]
//!     sha256: Sha256Hash,
//! }
//! ```

use digest::{Digest, Output};
use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{DeserializeAs, SerializeAs};
use std::fmt::LowerHex;

/// Deserialize into [`Output`] of a [`Digest`]
pub fn deserialize<'de, D, Dig: Digest>(deserializer: D) -> Result<Output<Dig>, D::Error>
where
    D: Deserializer<'de>,
{
    let str = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
    super::parse_digest_from_hex::<Dig>(str.as_ref())
        .ok_or_else(|| Error::custom(format!("failed to parse digest '{str}'")))
}

/// Serializes the [`Output`] of a [`Digest`] into a lowercase hex string.
pub fn serialize<'a, S: Serializer, Dig: Digest>(
    digest: &'a Output<Dig>,
    s: S,
) -> Result<S::Ok, S::Error>
where
    &'a Output<Dig>: LowerHex,
{
    format!("{digest:x}").serialize(s)
}

/// Wrapper type for easily serializing a hash with `serde_with`.
pub struct SerializableHash<T: Digest>(pub Output<T>);

impl<T: Digest> SerializeAs<Output<T>> for SerializableHash<T>
where
    for<'a> &'a Output<T>: LowerHex,
{
    fn serialize_as<S>(source: &Output<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize::<S, T>(source, serializer)
    }
}

impl<'de, T: Digest> DeserializeAs<'de, Output<T>> for SerializableHash<T> {
    fn deserialize_as<D>(deserializer: D) -> Result<Output<T>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize::<D, T>(deserializer)
    }
}

impl<T: Digest> From<Output<T>> for SerializableHash<T> {
    fn from(value: Output<T>) -> Self {
        SerializableHash(value)
    }
}
