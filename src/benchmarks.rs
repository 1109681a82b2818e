use std::time::{Duration, SystemTime};

use anyhow::Context;
use itertools::Itertools;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::filter::cuckoo::bamboo::BambooFilter;
use crate::filter::InsertResult;

/// One timed pass over a filter, in a shape that serializes to a CSV line.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub label: String,
    pub keys: u64,
    pub duration: Duration,
    pub parallelism: usize,
    pub positives: u64,
    pub capacity: u64,
    pub dropped: u64,
}

pub fn result_csv_header() -> String {
    [
        "label",
        "keys",
        "micros",
        "parallelism",
        "positives",
        "capacity",
        "dropped",
    ]
    .iter()
    .join(",")
}

pub fn result_csv_line(result: &BenchmarkResult) -> String {
    [
        result.label.clone(),
        result.keys.to_string(),
        result.duration.as_micros().to_string(),
        result.parallelism.to_string(),
        result.positives.to_string(),
        result.capacity.to_string(),
        result.dropped.to_string(),
    ]
    .iter()
    .join(",")
}

/// Insert every key, timing the whole pass. `positives` reports the number
/// of accepted (non-duplicate, non-overflow) inserts.
pub fn run_insert_benchmark(
    filter: &mut BambooFilter,
    keys: &[&[u8]],
) -> anyhow::Result<BenchmarkResult> {
    let start = SystemTime::now();
    let mut accepted = 0u64;
    for key in keys {
        if filter.insert(key) == InsertResult::Success {
            accepted += 1;
        }
    }
    Ok(BenchmarkResult {
        label: "insert".to_string(),
        keys: keys.len() as u64,
        duration: start.elapsed()?,
        parallelism: 1,
        positives: accepted,
        capacity: filter.capacity(),
        dropped: filter.dropped(),
    })
}

/// Query every key from `parallelism` threads. The filter is quiescent, so
/// shared read access is fine.
pub fn run_query_benchmark(
    filter: &BambooFilter,
    keys: &[&[u8]],
    parallelism: usize,
) -> anyhow::Result<BenchmarkResult> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism)
        .build()
        .context("building query thread pool")?;
    let start = SystemTime::now();
    let positives =
        pool.install(|| keys.par_iter().filter(|key| filter.contains(key)).count() as u64);
    Ok(BenchmarkResult {
        label: "query".to_string(),
        keys: keys.len() as u64,
        duration: start.elapsed()?,
        parallelism,
        positives,
        capacity: filter.capacity(),
        dropped: filter.dropped(),
    })
}

/// Query `count` random 16-byte keys that were (almost surely) never
/// inserted and report the fraction that still comes back positive.
pub fn false_positive_probe(filter: &BambooFilter, count: u64, seed: u64) -> f64 {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut positives = 0u64;
    for _ in 0..count {
        let key: [u8; 16] = rng.gen();
        if filter.contains(&key) {
            positives += 1;
        }
    }
    positives as f64 / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::cuckoo::bamboo::Config;

    fn small_filter() -> BambooFilter {
        BambooFilter::with_seed(
            Config {
                buckets: 64,
                slots_per_bucket: 2,
                ..Config::default()
            },
            13,
        )
        .unwrap()
    }

    #[test]
    fn csv_line_matches_the_header() {
        let result = BenchmarkResult {
            label: "query".to_string(),
            keys: 10,
            duration: Duration::from_micros(250),
            parallelism: 2,
            positives: 7,
            capacity: 64,
            dropped: 0,
        };
        let header_fields = result_csv_header().split(',').count();
        let line = result_csv_line(&result);
        assert_eq!(line.split(',').count(), header_fields);
        assert_eq!(line, "query,10,250,2,7,64,0");
    }

    #[test]
    fn query_benchmark_counts_positives() -> anyhow::Result<()> {
        let mut filter = small_filter();
        let keys: Vec<Vec<u8>> = (0..10u64).map(|key| key.to_le_bytes().to_vec()).collect();
        let keys: Vec<&[u8]> = keys.iter().map(Vec::as_slice).collect();
        let inserted = run_insert_benchmark(&mut filter, &keys)?;
        assert_eq!(inserted.positives, 10);
        let queried = run_query_benchmark(&filter, &keys, 2)?;
        assert_eq!(queried.positives, 10);
        Ok(())
    }
}
