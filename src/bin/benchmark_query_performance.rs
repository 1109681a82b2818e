use bamboo_filter::benchmarks::{
    false_positive_probe, result_csv_header, result_csv_line, run_insert_benchmark,
    run_query_benchmark,
};
use bamboo_filter::filter::cuckoo::bamboo::{BambooFilter, Config};
use bamboo_filter::genome;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rstats::{Medianf64, Stats};
use std::time::SystemTime;

static SAMPLE_SEED: u64 = 4242;
static PROBE_SEED: u64 = 9999;

fn main() -> anyhow::Result<()> {
    use std::env;
    let args: Vec<String> = env::args().collect();
    let genome_path = &args[1];
    let kmers: usize = args[2].parse()?;
    let kmer_width: usize = args[3].parse()?;
    let config = Config {
        buckets: args[4].parse()?,
        slots_per_bucket: args[5].parse()?,
        ..Config::default()
    };
    let parallelism: Vec<usize> = args[6..]
        .iter()
        .map(|p| p.parse())
        .collect::<Result<_, _>>()?;
    let parallelism = if parallelism.is_empty() {
        vec![1]
    } else {
        parallelism
    };

    let sequence = genome::read_sequence(genome_path)?;
    let mut sample_rng = Xoshiro256PlusPlus::seed_from_u64(SAMPLE_SEED);
    let keys = genome::sample_kmers(&sequence, kmer_width, kmers, &mut sample_rng)?;

    let mut filter = BambooFilter::new(config)?;
    let inserted = run_insert_benchmark(&mut filter, &keys)?;
    eprintln!(
        "tp;bench query: prepared {} k-mers ({} accepted, capacity {})",
        inserted.keys, inserted.positives, inserted.capacity
    );

    // per-query latency distribution, single threaded
    let latencies: Vec<f64> = keys
        .iter()
        .map(|key| {
            let start = SystemTime::now();
            let _ = filter.contains(key);
            start.elapsed().map(|d| d.as_nanos() as f64)
        })
        .collect::<Result<_, _>>()?;
    eprintln!("Median     {}", latencies.medstats()?);
    eprintln!("Arithmetic {}", latencies.ameanstd()?);

    // throughput with the same keys at each parallelism level
    let results = parallelism
        .iter()
        .map(|p| run_query_benchmark(&filter, &keys, *p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    println!("{}", result_csv_header());
    for line in &results {
        println!("{}", result_csv_line(line));
    }

    let fp_rate = false_positive_probe(&filter, 100_000, PROBE_SEED);
    eprintln!("tp;bench query: false positive rate {:.4}%", fp_rate * 100.0);
    Ok(())
}
