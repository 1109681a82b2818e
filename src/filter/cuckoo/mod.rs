pub mod bamboo;

use rand::Rng;
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

// lingo:
// - bucket: as in the cuckoo paper, a group of up to `slots_per_bucket`
//   entries. A fingerprint can live in one of two buckets.
// - slot: a single place in the flat array of fingerprints, holding one
//   fingerprint or zero for "empty".

// fixed digest keys; fingerprints must be stable across tables and runs
const DIGEST_KEY_0: u64 = 0x8c13_39b1_6d5a_8b47;
const DIGEST_KEY_1: u64 = 0x7e4a_92ff_03c1_d2e5;

/// odd mixer spreading the fingerprint over the bucket range
const FLIP_MIX: u64 = 0x5bd1_e995;

#[inline]
pub fn digest(key: &[u8]) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(DIGEST_KEY_0, DIGEST_KEY_1);
    hasher.write(key);
    hasher.finish()
}

/// Create a 16-bit fingerprint from a key digest.
/// 0 is an invalid fingerprint as it demarks an empty slot, so a zero low
/// half is remapped to 1. Valid fingerprints have a range of [1, 65536).
#[inline]
pub fn fingerprint(digest: u64) -> u16 {
    match digest as u16 {
        0 => 1,
        fp => fp,
    }
}

/// Primary bucket for a digest. Uses the digest bits above the fingerprint
/// so that equal fingerprints do not consistently hit the same buckets.
#[inline]
pub fn bucket(digest: u64, buckets: u64) -> u64 {
    debug_assert!(buckets.is_power_of_two());
    (digest >> 16) & (buckets - 1)
}

/// The other legitimate bucket for a fingerprint. Involutory for any power
/// of two `buckets`: flipping twice returns the original bucket.
#[inline]
pub fn flip_bucket(fingerprint: u16, bucket: u64, buckets: u64) -> u64 {
    debug_assert!(buckets.is_power_of_two());
    bucket ^ ((fingerprint as u64).wrapping_mul(FLIP_MIX) & (buckets - 1))
}

/// A fixed-size sequence of buckets, stored as one flat array of 16 bit
/// fingerprints. 0 marks an empty slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    data: Vec<u16>,
    buckets: u64,
    slots_per_bucket: u64,
}

impl Table {
    pub fn new(buckets: u64, slots_per_bucket: u64) -> Self {
        Table {
            data: vec![0; (buckets * slots_per_bucket) as usize],
            buckets,
            slots_per_bucket,
        }
    }

    pub fn buckets(&self) -> u64 {
        self.buckets
    }

    fn slot_range(&self, bucket: u64) -> std::ops::Range<usize> {
        let start = (bucket * self.slots_per_bucket) as usize;
        start..start + self.slots_per_bucket as usize
    }

    pub fn has(&self, bucket: u64, fingerprint: u16) -> bool {
        assert!(bucket < self.buckets);
        self.data[self.slot_range(bucket)]
            .iter()
            .any(|slot| *slot == fingerprint)
    }

    /// Claim the first empty slot of the bucket. The only operation that
    /// grows a bucket, so the slot bound holds everywhere else.
    pub fn try_put(&mut self, bucket: u64, fingerprint: u16) -> bool {
        assert!(bucket < self.buckets);
        let range = self.slot_range(bucket);
        for slot in &mut self.data[range] {
            if *slot == 0 {
                *slot = fingerprint;
                return true;
            }
        }
        false
    }

    /// Replace a random entry of a full bucket, returning the touched slot
    /// and the displaced fingerprint. Random victims, non-random selection
    /// can cycle.
    fn swap_random(&mut self, bucket: u64, fingerprint: u16, rng: &mut impl Rng) -> (usize, u16) {
        let slot =
            (bucket * self.slots_per_bucket + rng.gen_range(0..self.slots_per_bucket)) as usize;
        let displaced = self.data[slot];
        debug_assert!(displaced != 0, "evicting from a bucket with empty slots");
        self.data[slot] = fingerprint;
        (slot, displaced)
    }

    /// Remove and return all fingerprints of a bucket, leaving it empty.
    pub(crate) fn take_bucket(&mut self, bucket: u64) -> Vec<u16> {
        let range = self.slot_range(bucket);
        let mut taken = vec![];
        for slot in &mut self.data[range] {
            if *slot != 0 {
                taken.push(*slot);
                *slot = 0;
            }
        }
        taken
    }

    pub(crate) fn occupied(&self, bucket: u64) -> usize {
        self.data[self.slot_range(bucket)]
            .iter()
            .filter(|slot| **slot != 0)
            .count()
    }

    pub(crate) fn fingerprints(&self) -> impl Iterator<Item = u16> + '_ {
        self.data.iter().copied().filter(|fp| *fp != 0)
    }

    /// Place a fingerprint at `start` or, evicting entries along their
    /// alternate buckets, anywhere reachable within `max_evictions` steps.
    /// A failed walk is unwound completely, leaving the table unchanged.
    ///
    /// `flip_buckets` is the width of the alternate-bucket mask; it stays at
    /// the construction capacity even after the table has grown past it.
    pub(crate) fn cuckoo(
        &mut self,
        start: u64,
        fingerprint: u16,
        flip_buckets: u64,
        max_evictions: u32,
        rng: &mut impl Rng,
    ) -> bool {
        if self.try_put(start, fingerprint) {
            return true;
        }
        let mut bucket = start;
        let mut fingerprint = fingerprint;
        let mut trail: Vec<(usize, u16)> = vec![];
        for _ in 0..max_evictions {
            let (slot, displaced) = self.swap_random(bucket, fingerprint, rng);
            trail.push((slot, displaced));
            // the displaced entry moves on to its other legitimate bucket;
            // displacing an equal fingerprint advances the walk all the same
            bucket = flip_bucket(displaced, bucket, flip_buckets);
            if self.try_put(bucket, displaced) {
                return true;
            }
            fingerprint = displaced;
        }
        // walk exhausted: undo the swaps so the caller sees the table it had
        for (slot, displaced) in trail.into_iter().rev() {
            self.data[slot] = displaced;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{bucket, digest, fingerprint, flip_bucket, Table};
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn digest_is_stable() {
        assert_eq!(digest(b"ACGTACGT"), digest(b"ACGTACGT"));
        assert_ne!(digest(b"ACGTACGT"), digest(b"ACGTACGA"));
    }

    #[test]
    fn fingerprint_never_zero() {
        assert_eq!(fingerprint(0), 1);
        assert_eq!(fingerprint(0xdead_0000), 1);
        assert_eq!(fingerprint(0x1234_5678), 0x5678);
    }

    #[test]
    fn bucket_ignores_fingerprint_bits() {
        // two digests differing only in the low 16 bits share a bucket
        assert_eq!(bucket(0xaaaa_0001, 1024), bucket(0xaaaa_ffff, 1024));
    }

    fn flip_roundtrip(fingerprint: u16, bucket: u64, buckets: u64) {
        let b1 = flip_bucket(fingerprint, bucket, buckets);
        let b2 = flip_bucket(fingerprint, b1, buckets);
        assert_eq!(bucket, b2, "flip did not return to {} (via {})", bucket, b1);
    }

    #[test]
    fn flip_roundtrips() {
        flip_roundtrip(1, 0, 8);
        flip_roundtrip(0xffff, 7, 8);
        let mut data_rng = Xoshiro256PlusPlus::seed_from_u64(13);
        for _ in 0..10_000 {
            let buckets = 1024;
            flip_roundtrip(data_rng.gen(), data_rng.gen_range(0..buckets), buckets);
        }
    }

    #[test]
    fn try_put_enforces_the_slot_bound() {
        let mut table = Table::new(1, 2);
        assert!(table.try_put(0, 7));
        assert!(table.try_put(0, 7)); // duplicates within a bucket are fine
        assert!(!table.try_put(0, 9));
        assert!(table.has(0, 7));
        assert!(!table.has(0, 9));
    }

    #[test]
    fn take_bucket_empties_the_bucket() {
        let mut table = Table::new(2, 2);
        assert!(table.try_put(1, 3));
        assert!(table.try_put(1, 5));
        let mut taken = table.take_bucket(1);
        taken.sort_unstable();
        assert_eq!(taken, vec![3, 5]);
        assert!(!table.has(1, 3));
        assert_eq!(table.occupied(1), 0);
        assert!(table.take_bucket(1).is_empty());
    }

    #[test]
    fn cuckoo_relocates_the_displaced_entry() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(13);
        // single-slot buckets: fingerprint 1 must give way and move to its
        // alternate bucket for 3 to land
        let mut table = Table::new(2, 1);
        assert!(table.try_put(0, 1));
        assert!(table.cuckoo(0, 3, 2, 8, &mut rng));
        assert!(table.has(0, 3) || table.has(1, 3));
        assert!(table.has(0, 1) || table.has(1, 1));
        assert_eq!(table.occupied(0) + table.occupied(1), 2);
    }

    #[test]
    fn failed_cuckoo_walk_unwinds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(13);
        let mut table = Table::new(2, 1);
        // odd fingerprints alternate between the two buckets, so the walk
        // keeps bouncing until the eviction bound trips
        assert!(table.try_put(0, 1));
        assert!(table.try_put(1, 3));
        let before = table.clone();
        assert!(!table.cuckoo(0, 5, 2, 8, &mut rng));
        assert_eq!(before, table);
    }

    #[test]
    fn zero_evictions_degrades_to_try_put() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(13);
        let mut table = Table::new(2, 1);
        assert!(table.cuckoo(0, 1, 2, 0, &mut rng));
        assert!(!table.cuckoo(0, 2, 2, 0, &mut rng));
    }
}
