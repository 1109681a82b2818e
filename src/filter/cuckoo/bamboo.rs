use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use super::{bucket, digest, fingerprint, flip_bucket, Table};
use crate::filter::{Filter, FilterError, InsertResult};

/// Construction parameters of a [`BambooFilter`].
///
/// `buckets` must be a power of two, which makes [`flip_bucket`] an
/// involution; nothing else in the filter works without that.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// initial number of buckets
    pub buckets: u64,
    /// slots per bucket
    pub slots_per_bucket: u64,
    /// load factor beyond which the table doubles
    pub load_threshold: f64,
    /// eviction walk bound
    pub max_evictions: u32,
    /// buckets drained from the old table per insert while expanding
    pub segment_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            buckets: 1024,
            slots_per_bucket: 4,
            load_threshold: 0.9,
            max_evictions: 500,
            segment_size: 128,
        }
    }
}

impl Config {
    fn validate(&self) -> Result<(), FilterError> {
        if self.buckets == 0 || !self.buckets.is_power_of_two() {
            return Err(FilterError::invalid(
                "buckets",
                self.buckets,
                "must be a power of two",
            ));
        }
        if self.slots_per_bucket == 0 {
            return Err(FilterError::invalid(
                "slots_per_bucket",
                self.slots_per_bucket,
                "must be positive",
            ));
        }
        if !(self.load_threshold > 0.0 && self.load_threshold <= 1.0) {
            return Err(FilterError::invalid(
                "load_threshold",
                self.load_threshold,
                "must be in (0, 1]",
            ));
        }
        if self.segment_size == 0 || self.segment_size > self.buckets {
            return Err(FilterError::invalid(
                "segment_size",
                self.segment_size,
                "must be in [1, buckets]",
            ));
        }
        Ok(())
    }
}

/// A cuckoo filter that grows by doubling, bamboo style: instead of a
/// stop-the-world rebuild, each insert during an expansion drains a segment
/// of the old table into a table of twice the size, and queries consult both
/// tables until the migration is done.
///
/// Migration re-places a fingerprint under its old bucket index (the key,
/// and with it the real new-capacity index, is long gone). To keep such
/// entries reachable, the alternate-bucket mask stays at the construction
/// capacity and a lookup probes one bucket pair per capacity doubling, the
/// way a scalable filter queries each of its levels.
#[derive(Debug, Clone, PartialEq)]
pub struct BambooFilter {
    live: Table,
    staging: Option<Table>,
    migrate_cursor: u64,
    base_buckets: u64,
    slots_per_bucket: u64,
    load_threshold: f64,
    max_evictions: u32,
    segment_size: u64,
    size: u64,
    dropped: u64,
    rng: Xoshiro256PlusPlus,
}

impl BambooFilter {
    pub fn new(config: Config) -> Result<Self, FilterError> {
        Self::with_seed(config, rand::thread_rng().gen())
    }

    /// A filter with a deterministic eviction order, for tests.
    pub fn with_seed(config: Config, seed: u64) -> Result<Self, FilterError> {
        config.validate()?;
        Ok(BambooFilter {
            live: Table::new(config.buckets, config.slots_per_bucket),
            staging: None,
            migrate_cursor: 0,
            base_buckets: config.buckets,
            slots_per_bucket: config.slots_per_bucket,
            load_threshold: config.load_threshold,
            max_evictions: config.max_evictions,
            segment_size: config.segment_size,
            size: 0,
            dropped: 0,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        })
    }

    /// Number of accepted inserts.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bucket count, across both tables while an expansion is in progress.
    pub fn capacity(&self) -> u64 {
        self.live.buckets() + self.staging.as_ref().map_or(0, Table::buckets)
    }

    pub fn is_expanding(&self) -> bool {
        self.staging.is_some()
    }

    pub fn load_factor(&self) -> f64 {
        self.size as f64 / (self.live.buckets() * self.slots_per_bucket) as f64
    }

    /// Fingerprints lost during segment migration. Keys counted here may
    /// have become unqueryable; the filter keeps operating.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn insert(&mut self, key: &[u8]) -> InsertResult {
        let digest = digest(key);
        let fingerprint = fingerprint(digest);
        if self.lookup(digest, fingerprint) {
            return InsertResult::Duplicate;
        }
        if self.staging.is_none() && self.load_factor() > self.load_threshold {
            self.staging = Some(Table::new(
                self.live.buckets() * 2,
                self.slots_per_bucket,
            ));
            self.migrate_cursor = 0;
        }
        self.advance_migration();
        // while expanding, fresh entries go straight into the staging table;
        // a bucket behind the migration cursor would never be drained again
        let placed = match self.staging.as_mut() {
            Some(staging) => Self::place(
                staging,
                digest,
                fingerprint,
                self.base_buckets,
                self.max_evictions,
                &mut self.rng,
            ),
            None => Self::place(
                &mut self.live,
                digest,
                fingerprint,
                self.base_buckets,
                self.max_evictions,
                &mut self.rng,
            ),
        };
        if placed {
            self.size += 1;
            InsertResult::Success
        } else {
            InsertResult::Overflow
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let digest = digest(key);
        self.lookup(digest, fingerprint(digest))
    }

    /// Primary bucket first, full eviction walk from it, then the same from
    /// the alternate bucket.
    fn place(
        table: &mut Table,
        digest: u64,
        fingerprint: u16,
        flip_buckets: u64,
        max_evictions: u32,
        rng: &mut Xoshiro256PlusPlus,
    ) -> bool {
        let primary = bucket(digest, table.buckets());
        if table.cuckoo(primary, fingerprint, flip_buckets, max_evictions, rng) {
            return true;
        }
        let alternate = flip_bucket(fingerprint, primary, flip_buckets);
        table.cuckoo(alternate, fingerprint, flip_buckets, max_evictions, rng)
    }

    /// Drain one segment of the old table into the staging table; swap the
    /// tables once the cursor has passed the last bucket.
    fn advance_migration(&mut self) {
        let staging = match self.staging.as_mut() {
            Some(staging) => staging,
            None => return,
        };
        let end = (self.migrate_cursor + self.segment_size).min(self.live.buckets());
        for b in self.migrate_cursor..end {
            for fp in self.live.take_bucket(b) {
                // the old bucket index doubles as the primary index in the
                // staging table
                if staging.cuckoo(b, fp, self.base_buckets, self.max_evictions, &mut self.rng) {
                    continue;
                }
                let alternate = flip_bucket(fp, b, self.base_buckets);
                if !staging.cuckoo(
                    alternate,
                    fp,
                    self.base_buckets,
                    self.max_evictions,
                    &mut self.rng,
                ) {
                    self.dropped += 1;
                }
            }
        }
        self.migrate_cursor = end;
        if self.migrate_cursor == self.live.buckets() {
            if let Some(staging) = self.staging.take() {
                self.live = staging;
            }
            self.migrate_cursor = 0;
        }
    }

    fn lookup(&self, digest: u64, fingerprint: u16) -> bool {
        if self.probe(&self.live, digest, fingerprint) {
            return true;
        }
        match &self.staging {
            Some(staging) => self.probe(staging, digest, fingerprint),
            None => false,
        }
    }

    /// Check one (primary, alternate) bucket pair per capacity doubling
    /// between the construction capacity and the table's length. Entries
    /// placed before an expansion keep their old bucket index, so the older
    /// pairs stay live as long as the filter does.
    fn probe(&self, table: &Table, digest: u64, fingerprint: u16) -> bool {
        let mut generation = self.base_buckets;
        loop {
            let primary = bucket(digest, generation);
            if table.has(primary, fingerprint) {
                return true;
            }
            let alternate = flip_bucket(fingerprint, primary, self.base_buckets);
            if table.has(alternate, fingerprint) {
                return true;
            }
            if generation == table.buckets() {
                return false;
            }
            generation *= 2;
        }
    }

    /// Number of live-table buckets per fill level, `0 ..= slots_per_bucket`.
    pub fn occupancy_histogram(&self) -> Vec<u64> {
        let mut histogram = vec![0; self.slots_per_bucket as usize + 1];
        for b in 0..self.live.buckets() {
            histogram[self.live.occupied(b)] += 1;
        }
        histogram
    }

    /// All stored fingerprints, across both tables.
    pub fn fingerprints(&self) -> impl Iterator<Item = u16> + '_ {
        self.live
            .fingerprints()
            .chain(self.staging.iter().flat_map(|table| table.fingerprints()))
    }
}

impl Filter for BambooFilter {
    fn insert(&mut self, key: &[u8]) -> InsertResult {
        BambooFilter::insert(self, key)
    }

    fn contains(&self, key: &[u8]) -> bool {
        BambooFilter::contains(self, key)
    }
}
