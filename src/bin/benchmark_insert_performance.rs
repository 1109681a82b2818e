use bamboo_filter::benchmarks::run_insert_benchmark;
use bamboo_filter::filter::cuckoo::bamboo::{BambooFilter, Config};
use bamboo_filter::genome;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

// fixed sampling seed so that repeated runs insert the same k-mers
static SAMPLE_SEED: u64 = 4242;

fn main() -> anyhow::Result<()> {
    use std::env;
    let args: Vec<String> = env::args().collect();
    let genome_path = &args[1];
    let kmers: usize = args[2].parse()?;
    let kmer_width: usize = args[3].parse()?;
    let config = Config {
        buckets: args[4].parse()?,
        slots_per_bucket: args[5].parse()?,
        load_threshold: args[6].parse()?,
        max_evictions: args[7].parse()?,
        segment_size: args[8].parse()?,
    };

    let sequence = genome::read_sequence(genome_path)?;
    let mut sample_rng = Xoshiro256PlusPlus::seed_from_u64(SAMPLE_SEED);
    let keys = genome::sample_kmers(&sequence, kmer_width, kmers, &mut sample_rng)?;

    let mut filter = BambooFilter::new(config.clone())?;
    let result = run_insert_benchmark(&mut filter, &keys)?;
    eprintln!(
        "tp;bench insert: {} k-mers in {:?} ({:?} ops)",
        result.keys,
        result.duration,
        result.keys as u128 * 1000 / result.duration.as_millis().max(1)
    );
    eprintln!(
        "tp;bench insert: accepted {}, buckets {} -> {}, load factor {:.3}, dropped {}",
        result.positives,
        config.buckets,
        filter.capacity(),
        filter.load_factor(),
        filter.dropped(),
    );
    Ok(())
}
