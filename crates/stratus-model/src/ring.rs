use std::collections::HashMap;

use xxhash_rust::xxh64::xxh64;

/// Ring defaults. Partitions are distributed over members with a bounded
/// per-member load, so the mapping stays near-uniform and adding a member
/// relocates only a small fraction of the key space.
pub const DEFAULT_PARTITION_COUNT: u64 = 271;
pub const DEFAULT_REPLICATION_FACTOR: usize = 20;
pub const DEFAULT_LOAD_FACTOR: f64 = 1.25;

/// Consistent-hash ring with bounded loads.
///
/// Each member is placed on the ring `replication_factor` times (xxh64 of
/// `"<member><replica>"`). The key space is split into `partition_count`
/// partitions; each partition is assigned to the first member found walking
/// clockwise from the partition's hash whose load is still below
/// `ceil(partition_count / members * load_factor)`. Locating a key is then
/// hash → partition → owner.
///
/// The mapping is a deterministic function of the member set: two rings
/// built from the same additions agree on every key.
pub struct HashRing {
    partition_count: u64,
    replication_factor: usize,
    load_factor: f64,
    members: Vec<String>,
    sorted_hashes: Vec<u64>,
    replicas: HashMap<u64, usize>,
    partitions: Vec<usize>,
}

impl HashRing {
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_PARTITION_COUNT,
            DEFAULT_REPLICATION_FACTOR,
            DEFAULT_LOAD_FACTOR,
        )
    }

    pub fn with_config(
        partition_count: u64,
        replication_factor: usize,
        load_factor: f64,
    ) -> Self {
        Self {
            partition_count,
            replication_factor,
            load_factor,
            members: Vec::new(),
            sorted_hashes: Vec::new(),
            replicas: HashMap::new(),
            partitions: Vec::new(),
        }
    }

    /// Number of members on the ring.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add a member and redistribute the partitions. Members are only ever
    /// added; the simulated peer set never shrinks during a run.
    pub fn add(&mut self, member: &str) {
        let index = self.members.len();
        self.members.push(member.to_string());

        for replica in 0..self.replication_factor {
            let hash = xxh64(format!("{member}{replica}").as_bytes(), 0);
            self.replicas.insert(hash, index);
        }

        self.sorted_hashes = self.replicas.keys().copied().collect();
        self.sorted_hashes.sort_unstable();

        self.distribute();
    }

    /// Owner of the partition containing `key`, as an index into the order
    /// members were added. `None` on an empty ring.
    pub fn locate(&self, key: &str) -> Option<usize> {
        if self.members.is_empty() {
            return None;
        }
        let partition = xxh64(key.as_bytes(), 0) % self.partition_count;
        Some(self.partitions[partition as usize])
    }

    fn average_load(&self) -> u64 {
        let avg = self.partition_count as f64 / self.members.len() as f64 * self.load_factor;
        avg.ceil() as u64
    }

    fn distribute(&mut self) {
        self.partitions = vec![0; self.partition_count as usize];
        let mut loads = vec![0u64; self.members.len()];
        let capacity = self.average_load();

        for partition in 0..self.partition_count {
            let hash = xxh64(partition.to_string().as_bytes(), 0);
            let mut cursor = match self.sorted_hashes.binary_search(&hash) {
                Ok(index) => index,
                Err(index) => index % self.sorted_hashes.len(),
            };

            // Walk clockwise past members that already carry a full load.
            // Total capacity (members * average_load) exceeds the partition
            // count, so the walk always finds a seat.
            loop {
                let member = self.replicas[&self.sorted_hashes[cursor]];
                if loads[member] < capacity {
                    self.partitions[partition as usize] = member;
                    loads[member] += 1;
                    break;
                }
                cursor = (cursor + 1) % self.sorted_hashes.len();
            }
        }
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ring_with(members: &[&str]) -> HashRing {
        let mut ring = HashRing::new();
        for member in members {
            ring.add(member);
        }
        ring
    }

    #[test]
    fn empty_ring_locates_nothing() {
        let ring = HashRing::new();
        assert_eq!(ring.locate("anything"), None);
    }

    #[test]
    fn single_member_owns_everything() {
        let ring = ring_with(&["only"]);
        for i in 0..100 {
            assert_eq!(ring.locate(&format!("/object/{i}")), Some(0));
        }
    }

    #[test]
    fn deterministic_across_instances() {
        let a = ring_with(&["cache-0", "cache-1", "cache-2"]);
        let b = ring_with(&["cache-0", "cache-1", "cache-2"]);

        for i in 0..1000 {
            let key = format!("/object/{i}");
            assert_eq!(a.locate(&key), b.locate(&key));
        }
    }

    #[test]
    fn every_member_carries_partitions() {
        let ring = ring_with(&["a", "b", "c", "d", "e", "f", "g", "h"]);

        let mut counts = vec![0u64; 8];
        for partition in &ring.partitions {
            counts[*partition] += 1;
        }

        let cap = ring.average_load();
        for (member, count) in counts.iter().enumerate() {
            assert!(*count > 0, "member {member} owns no partitions");
            assert!(
                *count <= cap,
                "member {member} carries {count} partitions, cap is {cap}"
            );
        }
    }

    #[test]
    fn adding_a_member_moves_few_partitions() {
        let mut ring = ring_with(&["cache-0", "cache-1", "cache-2", "cache-3", "cache-4"]);
        let before = ring.partitions.clone();

        ring.add("cache-5");

        let moved = before
            .iter()
            .zip(ring.partitions.iter())
            .filter(|(a, b)| a != b)
            .count();

        // Far from a full reshuffle: the bulk of the key space stays put
        assert!(
            moved < before.len() / 2,
            "{moved} of {} partitions moved",
            before.len()
        );
        assert!(moved > 0, "the new member should take over some partitions");
    }

    proptest! {
        /// `locate` always returns a registered member.
        #[test]
        fn locate_returns_registered_member(
            member_count in 1usize..12,
            keys in prop::collection::vec("[a-z/0-9]{1,20}", 1..50),
        ) {
            let members: Vec<String> =
                (0..member_count).map(|i| format!("cache-{i}")).collect();
            let mut ring = HashRing::new();
            for member in &members {
                ring.add(member);
            }

            for key in keys {
                let located = ring.locate(&key);
                prop_assert!(located.is_some());
                prop_assert!(located.unwrap() < member_count);
            }
        }
    }
}
