//! A concurrent map from members to monotonically increasing stamps.
//!
//! `StampMap` is the building block the LWW set is assembled from: one
//! map records the latest add stamp for each member, a second records
//! the latest remove stamp. The only mutation, `witness`, raises a
//! member's stamp and never lowers it, so racing writers cannot lose
//! updates: whichever order their locks are granted in, the largest
//! stamp is what remains.
//!
//! The map is striped into a fixed number of shards, each guarded by
//! its own reader-writer lock. Writers touching different members
//! mostly land on different shards and proceed in parallel, where a
//! single structure-wide lock would serialize them.
//!
//! # Examples
//!
//! ```
//! use lwwset::StampMap;
//! let map = StampMap::new();
//! map.witness("A".to_string(), 2);
//! map.witness("A".to_string(), 1);
//! assert_eq!(map.get(&"A".to_string()), Some(2));
//! ```

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::FromIterator;

use parking_lot::RwLock;

/// A stamp is the logical timestamp attached to every add and remove.
///
/// Stamps are compared, never inspected, so any strictly positive
/// source works (Lamport clocks, hybrid clocks, wall-clock micros) as
/// long as writers that must order themselves hand out growing values.
pub type Timestamp = i64;

/// Shards per map when no explicit count is given.
const DEFAULT_SHARDS: usize = 16;

/// Common Member type, Members are the elements stored in a set.
/// Set based CRDT's will need to expose this Member type to the user.
///
/// `Send + Sync` is part of the bargain: the whole point of the
/// structure is to be shared across threads.
pub trait Member: Clone + Eq + Hash + Send + Sync + Debug {}
impl<M: Clone + Eq + Hash + Send + Sync + Debug> Member for M {}

/// A thread-safe member to stamp map where stamps only ever grow.
///
/// All mutation goes through [`StampMap::witness`], which takes `&self`
/// so the map can be hammered from many threads behind an `Arc` (or a
/// plain borrow, with scoped threads).
pub struct StampMap<M: Member> {
    shards: Vec<RwLock<HashMap<M, Timestamp>>>,
    hasher: RandomState,
}

impl<M: Member> StampMap<M> {
    /// Returns an empty map with the default shard count.
    pub fn new() -> StampMap<M> {
        StampMap::with_shards(DEFAULT_SHARDS)
    }

    /// Returns an empty map striped across roughly `count` shards.
    ///
    /// The count is clamped to at least one shard and rounded up to a
    /// power of two so that members route to shards with a mask.
    pub fn with_shards(count: usize) -> StampMap<M> {
        let count = count.max(1).next_power_of_two();
        let shards = (0..count).map(|_| RwLock::new(HashMap::new())).collect();
        StampMap {
            shards,
            hasher: RandomState::new(),
        }
    }

    /// For a particular member, possibly store a new stamp if it
    /// dominates the stamp already held.
    ///
    /// Raising is atomic per member: of two racing writers the larger
    /// stamp survives and the smaller is absorbed, never the other way
    /// around. Stale and duplicate stamps are no-ops.
    ///
    /// # Examples
    ///
    /// ```
    /// use lwwset::StampMap;
    /// let map = StampMap::new();
    /// map.witness("A".to_string(), 2);
    /// map.witness("A".to_string(), 1); // ignored because 2 dominates 1
    /// assert_eq!(map.get(&"A".to_string()), Some(2));
    /// ```
    pub fn witness(&self, member: M, stamp: Timestamp) {
        debug_assert!(stamp > 0, "stamps are strictly positive");
        let shard = self.shard(&member);
        {
            // Dominated stamps need no exclusive access.
            let map = shard.read();
            if map.get(&member).map_or(false, |&seen| seen >= stamp) {
                return;
            }
        }
        let mut map = shard.write();
        // Re-check under the write lock: another writer may have
        // slipped in between the two locks.
        map.entry(member)
            .and_modify(|seen| {
                if *seen < stamp {
                    *seen = stamp;
                }
            })
            .or_insert(stamp);
    }

    /// Returns the largest stamp witnessed for this member, or `None`
    /// if the member was never witnessed.
    pub fn get(&self, member: &M) -> Option<Timestamp> {
        self.shard(member).read().get(member).copied()
    }

    /// Returns an owned snapshot of every `(member, stamp)` pair.
    ///
    /// Each shard is copied atomically. Racing writers may land between
    /// shard copies, but since stamps only grow, the union is always a
    /// state that some interleaving of those writers produces. Ordering
    /// is unspecified.
    pub fn entries(&self) -> Vec<(M, Timestamp)> {
        let mut entries = Vec::new();
        for shard in self.shards.iter() {
            let map = shard.read();
            entries.extend(map.iter().map(|(member, &stamp)| (member.clone(), stamp)));
        }
        entries
    }

    /// Returns the number of members ever witnessed.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    /// Returns `true` if this map has witnessed nothing.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    fn shard(&self, member: &M) -> &RwLock<HashMap<M, Timestamp>> {
        let mut hasher = self.hasher.build_hasher();
        member.hash(&mut hasher);
        // Shard counts are powers of two, so the mask picks a shard.
        let index = hasher.finish() as usize & (self.shards.len() - 1);
        &self.shards[index]
    }
}

impl<M: Member> Default for StampMap<M> {
    fn default() -> StampMap<M> {
        StampMap::new()
    }
}

impl<M: Member> Clone for StampMap<M> {
    /// Deep copy: later witnesses on either map leave the other alone.
    /// The hasher is cloned along with the shards so member routing in
    /// the copy matches where the entries already landed.
    fn clone(&self) -> StampMap<M> {
        let shards = self
            .shards
            .iter()
            .map(|shard| RwLock::new(shard.read().clone()))
            .collect();
        StampMap {
            shards,
            hasher: self.hasher.clone(),
        }
    }
}

impl<M: Member> Debug for StampMap<M> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

impl<M: Member> PartialEq for StampMap<M> {
    /// Content equality: two maps are equal when they witnessed the
    /// same stamps, regardless of how each is sharded.
    fn eq(&self, other: &StampMap<M>) -> bool {
        let ours: HashMap<M, Timestamp> = self.entries().into_iter().collect();
        let theirs: HashMap<M, Timestamp> = other.entries().into_iter().collect();
        ours == theirs
    }
}

impl<M: Member> Eq for StampMap<M> {}

impl<M: Member> FromIterator<(M, Timestamp)> for StampMap<M> {
    /// Builds a map by witnessing each pair, so duplicate members keep
    /// their largest stamp. Stamps must be strictly positive.
    fn from_iter<I: IntoIterator<Item = (M, Timestamp)>>(iter: I) -> StampMap<M> {
        let map = StampMap::new();
        for (member, stamp) in iter {
            map.witness(member, stamp);
        }
        map
    }
}

impl<M: Member> From<Vec<(M, Timestamp)>> for StampMap<M> {
    fn from(vec: Vec<(M, Timestamp)>) -> StampMap<M> {
        vec.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    use quickcheck_macros::quickcheck;

    fn positive(raw: u16) -> Timestamp {
        Timestamp::from(raw) + 1
    }

    #[test]
    fn test_witness_keeps_max() {
        let map = StampMap::new();
        map.witness("a", 10);
        map.witness("a", 3);
        assert_eq!(map.get(&"a"), Some(10));

        map.witness("a", 12);
        assert_eq!(map.get(&"a"), Some(12));
    }

    #[test]
    fn test_unseen_member_is_none() {
        let map: StampMap<&str> = StampMap::new();
        assert_eq!(map.get(&"nope"), None);
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_entries_snapshot() {
        let map = StampMap::new();
        map.witness(1u8, 4);
        map.witness(2u8, 9);

        let mut entries = map.entries();
        entries.sort();
        assert_eq!(entries, vec![(1, 4), (2, 9)]);

        // later witnesses must not show up in the snapshot we took
        map.witness(3u8, 1);
        assert_eq!(entries.len(), 2);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_eq_across_shard_layouts() {
        let one: StampMap<u8> = StampMap::with_shards(1);
        let many: StampMap<u8> = StampMap::with_shards(64);
        for stamp in 1..20 {
            one.witness(stamp as u8, stamp);
            many.witness(stamp as u8, stamp);
        }
        assert_eq!(one, many);

        many.witness(1, 99);
        assert_ne!(one, many);
    }

    #[test]
    fn test_zero_shards_is_clamped() {
        let map: StampMap<u8> = StampMap::with_shards(0);
        map.witness(7, 7);
        assert_eq!(map.get(&7), Some(7));
    }

    #[test]
    fn test_clone_is_detached() {
        let map = StampMap::new();
        map.witness("x", 5);

        let copy = map.clone();
        map.witness("x", 8);
        map.witness("y", 1);

        assert_eq!(copy.get(&"x"), Some(5));
        assert_eq!(copy.get(&"y"), None);
        assert_eq!(map.get(&"x"), Some(8));
    }

    #[quickcheck]
    fn prop_witness_order_of_entries_should_not_matter(entries: Vec<(u8, u16)>) -> bool {
        let forward: StampMap<u8> = entries
            .iter()
            .map(|&(member, raw)| (member, positive(raw)))
            .collect();
        let reverse: StampMap<u8> = entries
            .iter()
            .rev()
            .map(|&(member, raw)| (member, positive(raw)))
            .collect();

        forward == reverse
    }

    #[quickcheck]
    fn prop_witness_is_idempotent(entries: Vec<(u8, u16)>) -> bool {
        let single: StampMap<u8> = entries
            .iter()
            .map(|&(member, raw)| (member, positive(raw)))
            .collect();
        let double: StampMap<u8> = entries
            .iter()
            .chain(entries.iter())
            .map(|&(member, raw)| (member, positive(raw)))
            .collect();

        single == double
    }

    #[quickcheck]
    fn prop_get_is_max_of_witnessed(member: u8, raws: Vec<u16>) -> bool {
        let map = StampMap::new();
        for &raw in raws.iter() {
            map.witness(member, positive(raw));
        }
        let expected = raws.iter().map(|&raw| positive(raw)).max();
        map.get(&member) == expected
    }

    #[test]
    fn test_parallel_writers_keep_max() {
        let map = Arc::new(StampMap::new());
        let writers = 8;
        let stamps_per_writer = 100;

        let handles: Vec<_> = (0..writers)
            .map(|writer| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    // writers interleave ranges so the max keeps moving
                    for step in 1..=stamps_per_writer {
                        map.witness("contended", step * writers + writer);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let expected = stamps_per_writer * writers + (writers - 1);
        assert_eq!(map.get(&"contended"), Some(expected));
    }

    #[test]
    fn test_parallel_disjoint_writers_all_land() {
        let map = Arc::new(StampMap::new());
        let writers: i64 = 4;
        let members_per_writer: i64 = 250;

        let handles: Vec<_> = (0..writers)
            .map(|writer| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for offset in 0..members_per_writer {
                        let member = writer * members_per_writer + offset;
                        map.witness(member, member + 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.len() as i64, writers * members_per_writer);
        for member in 0..(writers * members_per_writer) {
            assert_eq!(map.get(&member), Some(member + 1));
        }
    }
}
