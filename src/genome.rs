use anyhow::{bail, Context};
use rand::Rng;
use std::fs;
use std::path::Path;

/// Read a FASTA or plain-text sequence file into one contiguous run of
/// bases. FASTA header lines (leading '>') are skipped, whitespace within
/// and between sequence lines is dropped.
pub fn read_sequence(path: impl AsRef<Path>) -> anyhow::Result<Vec<u8>> {
    let path = path.as_ref();
    let raw = fs::read(path).with_context(|| format!("reading sequence file {:?}", path))?;
    let mut sequence = Vec::with_capacity(raw.len());
    for line in raw.split(|byte| *byte == b'\n') {
        if line.first() == Some(&b'>') {
            continue;
        }
        sequence.extend(line.iter().filter(|byte| !byte.is_ascii_whitespace()));
    }
    if sequence.is_empty() {
        bail!("sequence file {:?} contains no bases", path);
    }
    Ok(sequence)
}

/// Sample `count` k-mers at uniformly random offsets, with replacement.
pub fn sample_kmers<'a>(
    sequence: &'a [u8],
    k: usize,
    count: usize,
    rng: &mut impl Rng,
) -> anyhow::Result<Vec<&'a [u8]>> {
    if k == 0 || k > sequence.len() {
        bail!(
            "k-mer width {} not in [1, {}] (the sequence length)",
            k,
            sequence.len()
        );
    }
    let offsets = sequence.len() - k + 1;
    Ok((0..count)
        .map(|_| {
            let start = rng.gen_range(0..offsets);
            &sequence[start..start + k]
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{read_sequence, sample_kmers};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::io::Write;

    fn sequence_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("creating sequence fixture");
        file.write_all(content).expect("writing sequence fixture");
        file
    }

    #[test]
    fn reads_fasta_without_headers_or_breaks() {
        let file = sequence_file(b">chr1 test\nACGT\nACGT\n>chr2\nTTAA\n");
        let sequence = read_sequence(file.path()).unwrap();
        assert_eq!(sequence, b"ACGTACGTTTAA");
    }

    #[test]
    fn reads_plain_text_with_crlf() {
        let file = sequence_file(b"ACGT\r\nTTGG\r\n");
        let sequence = read_sequence(file.path()).unwrap();
        assert_eq!(sequence, b"ACGTTTGG");
    }

    #[test]
    fn rejects_empty_sequences() {
        let file = sequence_file(b">only a header\n");
        assert!(read_sequence(file.path()).is_err());
    }

    #[test]
    fn sampled_kmers_are_windows_of_the_sequence() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(13);
        let sequence = b"ACGTACGTAC";
        let kmers = sample_kmers(sequence, 4, 100, &mut rng).unwrap();
        assert_eq!(kmers.len(), 100);
        for kmer in kmers {
            assert_eq!(kmer.len(), 4);
            assert!(sequence.windows(4).any(|window| window == kmer));
        }
    }

    #[test]
    fn rejects_degenerate_widths() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(13);
        assert!(sample_kmers(b"ACGT", 0, 1, &mut rng).is_err());
        assert!(sample_kmers(b"ACGT", 5, 1, &mut rng).is_err());
        assert!(sample_kmers(b"ACGT", 4, 1, &mut rng).is_ok());
    }
}
