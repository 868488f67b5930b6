//! Hash containers and hashing shared by the reconciler and runtime.
//!
//! The default build uses `hashbrown` with `ahash`; the `std-hash` feature
//! swaps both for the standard library versions.

use std::hash::{Hash, Hasher};

#[cfg(feature = "std-hash")]
pub(crate) use std::collections::{HashMap, HashSet};

#[cfg(not(feature = "std-hash"))]
pub(crate) use hashbrown::{HashMap, HashSet};

use crate::vnode::Key;

/// Previous siblings by key, pointing at their slot in the old child list.
pub(crate) type KeyIndex = HashMap<Key, usize>;

#[cfg(feature = "std-hash")]
fn hasher() -> std::collections::hash_map::DefaultHasher {
    std::collections::hash_map::DefaultHasher::new()
}

#[cfg(not(feature = "std-hash"))]
fn hasher() -> ahash::AHasher {
    ahash::AHasher::default()
}

/// Hashes a single value with whichever hasher is active.
pub(crate) fn hash_one<T: Hash>(value: &T) -> u64 {
    let mut state = hasher();
    value.hash(&mut state);
    state.finish()
}
