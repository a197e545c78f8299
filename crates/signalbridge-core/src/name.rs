//! Whitespace-insensitive signal and slot names.
//!
//! Producers format signatures differently (`"valueChanged(int,int)"` vs
//! `"valueChanged( int , int )"`), so every comparison ignores embedded
//! whitespace on both sides. [`NameHash`] hashes the same normalized form,
//! making it usable as a map key that agrees with [`same_name`].

use std::fmt;

use xxhash_rust::xxh64::Xxh64;

/// Seed for name hashes; distinct from zero so an empty name does not hash to
/// the xxh64 default.
const NAME_SEED: u64 = 0x1a095090689d4647;

fn significant(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().filter(|c| !c.is_whitespace())
}

/// Compare two names ignoring embedded whitespace.
pub fn same_name(a: &str, b: &str) -> bool {
    significant(a).eq(significant(b))
}

/// Strip all whitespace from a name.
pub fn normalize_name(text: &str) -> String {
    significant(text).collect()
}

/// Deterministic 64-bit hash of a normalized name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameHash(pub u64);

impl NameHash {
    pub fn of(text: &str) -> Self {
        let mut hasher = Xxh64::new(NAME_SEED);
        let mut buf = [0u8; 4];
        for c in significant(text) {
            hasher.update(c.encode_utf8(&mut buf).as_bytes());
        }
        NameHash(hasher.digest())
    }
}

impl fmt::Debug for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameHash({:#018x})", self.0)
    }
}
