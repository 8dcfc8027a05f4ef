pub(crate) mod cache_map;
