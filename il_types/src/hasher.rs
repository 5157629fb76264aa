//! Deterministic hashing collections.
//!
//! Join and pivot outputs must not depend on hash-seed randomization, so all
//! keyed collections in this workspace use a fixed-seed hasher.

use ahash::AHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

/// A deterministic and fast hasher.
#[derive(Clone, Copy, Default)]
pub struct DetHasher;

impl DetHasher {
    fn random_state() -> ahash::RandomState {
        ahash::RandomState::with_seeds(0, 0, 0, 0)
    }

    /// Return a new hasher.
    pub fn hasher() -> AHasher {
        Self::random_state().build_hasher()
    }

    /// Calculate the hash of a single value.
    pub fn hash(x: impl Hash) -> u64 {
        Self::random_state().hash_one(x)
    }
}

impl BuildHasher for DetHasher {
    type Hasher = AHasher;

    fn build_hasher(&self) -> Self::Hasher {
        Self::hasher()
    }
}

/// A HashMap with a deterministic hashing scheme.
pub type DetHashMap<K, V> = HashMap<K, V, DetHasher>;

/// A HashSet with a deterministic hashing scheme.
pub type DetHashSet<K> = HashSet<K, DetHasher>;
