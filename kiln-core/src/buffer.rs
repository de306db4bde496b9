use core::fmt::{Display, Formatter};
use core::hash::{BuildHasherDefault, Hasher};
use std::collections::HashSet;

/// Identity of one computed tensor value.
///
/// Buffer ids are indices into the arena of the graph they were created by,
/// so two buffers are the same buffer only if their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct BufferId(u32);

/// Create buffer id from arena index
#[must_use]
pub const fn id(i: usize) -> BufferId {
    BufferId(i as u32)
}

impl BufferId {
    /// Index into the arena
    #[must_use]
    pub const fn i(self) -> usize {
        self.0 as usize
    }
}

impl Display for BufferId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("b{}", self.0))
    }
}

/// Fnv hasher, const initializable
pub struct CHasher(u64);

impl Default for CHasher {
    fn default() -> CHasher {
        CHasher(0xcbf2_9ce4_8422_2325)
    }
}

impl Hasher for CHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let CHasher(mut hash) = *self;
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x100_0000_01b3);
        }
        *self = CHasher(hash);
    }
}

/// Hash set with deterministic fnv hashing.
/// Used for root sets and dependency sets.
pub type Set<T> = HashSet<T, BuildHasherDefault<CHasher>>;

/// Sorted, comma separated list of buffers, for logs and reports.
#[must_use]
pub fn display_set(set: &Set<BufferId>) -> String {
    let mut ids: Vec<BufferId> = set.iter().copied().collect();
    ids.sort_unstable();
    ids.iter().map(ToString::to_string).collect::<Vec<String>>().join(", ")
}

#[test]
fn display_set_is_sorted() {
    let set: Set<BufferId> = [id(3), id(0), id(12)].into_iter().collect();
    assert_eq!(display_set(&set), "b0, b3, b12");
    assert_eq!(id(7).to_string(), "b7");
}
