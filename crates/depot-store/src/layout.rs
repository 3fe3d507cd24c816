//! Substrate key layout shared by the store strategies.
//!
//! - `["blobs", hash]` -- full bodies (every body for the plain store; chain
//!   bases and raw per-revision bytes for the delta-chain store)
//! - `["packs", hash]` -- JSON [`Pack`](crate::Pack) records
//! - `["deltas", hash]` -- encoded [`Delta`](crate::Delta) patches

use depot_kv::Key;
use depot_types::Hash;

pub const BLOBS: &str = "blobs";
pub const PACKS: &str = "packs";
pub const DELTAS: &str = "deltas";

pub fn blob_key<T>(hash: &Hash<T>) -> Key {
    Key::new([BLOBS.to_string(), hash.to_hex()])
}

pub fn pack_key<T>(hash: &Hash<T>) -> Key {
    Key::new([PACKS.to_string(), hash.to_hex()])
}

pub fn delta_key<T>(hash: &Hash<T>) -> Key {
    Key::new([DELTAS.to_string(), hash.to_hex()])
}

/// Range key selecting every `namespace` entry whose hash starts with `prefix`.
pub fn prefix_key(namespace: &str, prefix: &str) -> Key {
    Key::new([namespace.to_string(), prefix.to_ascii_lowercase()])
}

/// Parse the hash out of a `[namespace, hex]` key.
pub fn hash_from_key(key: &Key) -> Option<Hash> {
    key.last().and_then(|hex| Hash::from_hex(hex).ok())
}
