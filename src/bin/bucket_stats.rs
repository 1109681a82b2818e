use bamboo_filter::filter::cuckoo::bamboo::{BambooFilter, Config};

// Occupancy and fingerprint distribution of a filled filter. The bucket
// projection uses the digest bits above the fingerprint; if fingerprints
// ever cluster in a few buckets again, it shows up here as a lopsided
// histogram and a wide fingerprint count range.
fn main() -> anyhow::Result<()> {
    use std::env;
    let args: Vec<String> = env::args().collect();
    let keys: u64 = args[1].parse()?;
    let config = Config {
        buckets: args[2].parse()?,
        slots_per_bucket: args[3].parse()?,
        ..Config::default()
    };
    let slots_per_bucket = config.slots_per_bucket;

    let mut filter = BambooFilter::new(config)?;
    for key in 0..keys {
        filter.insert(&key.to_le_bytes());
    }
    eprintln!(
        "tp;bucket stats: {} keys, size {}, capacity {} buckets, load factor {:.3}, dropped {}",
        keys,
        filter.size(),
        filter.capacity(),
        filter.load_factor(),
        filter.dropped(),
    );

    let histogram = filter.occupancy_histogram();
    for (fill, buckets) in histogram.iter().enumerate() {
        eprintln!(
            "tp;buckets with {}/{} slots used: {}",
            fill, slots_per_bucket, buckets
        );
    }

    let mut fingerprint_counts = vec![0u32; 1 << 16];
    for fp in filter.fingerprints() {
        fingerprint_counts[fp as usize] += 1;
    }
    // slot 0 is the empty sentinel, fingerprint derivation never emits it
    assert_eq!(fingerprint_counts[0], 0);
    eprintln!(
        "tp;fingerprint count range: [{}, {}]",
        fingerprint_counts[1..].iter().min().unwrap_or(&0),
        fingerprint_counts[1..].iter().max().unwrap_or(&0),
    );
    Ok(())
}
