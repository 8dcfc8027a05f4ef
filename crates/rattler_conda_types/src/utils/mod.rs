pub(crate) mod serde;
