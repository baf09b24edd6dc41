
extern crate log;

use log::info;
use std::io::{BufRead, Write};

use crate::design_matrix::MAX_MATRIX_K;
use crate::errors::{KmerError, Result};
use crate::kmer_encoder::KmerEncoder;
use crate::stats_util::format_thousands;

/// Accumulates the observed k-mer count vector `y` of a read collection, aligned with the design matrix rows.
pub struct KmerCounter {
    encoder: KmerEncoder,
    counts: Vec<u64>,
    reads: u64,
    invalid_windows: u64
}

impl KmerCounter {
    /// Creates a counter with `4^k` zeroed bins.
    /// # Arguments
    /// * `k` - the k-mer length, between 1 and `MAX_MATRIX_K`
    pub fn new(k: usize) -> Result<Self> {
        if k == 0 || k > MAX_MATRIX_K {
            return Err(KmerError::KmerTooLarge { k, max: MAX_MATRIX_K });
        }
        let encoder = KmerEncoder::new(k)?;
        Ok(Self {
            counts: vec![0; encoder.space_size() as usize],
            encoder,
            reads: 0,
            invalid_windows: 0
        })
    }

    /// Counts every valid window of a read, skipping windows with invalid bases.
    /// # Arguments
    /// * `seq` - the read bases
    /// # Examples
    /// ```rust
    /// use kmers::kmer_counter::KmerCounter;
    /// let mut counter = KmerCounter::new(2).unwrap();
    /// counter.add_sequence(b"AAANA");
    /// assert_eq!(counter.counts()[0], 2);
    /// assert_eq!(counter.invalid_windows(), 2);
    /// ```
    pub fn add_sequence(&mut self, seq: &[u8]) {
        for window in self.encoder.scan(seq) {
            match window {
                Some(id) => self.counts[id as usize] += 1,
                None => self.invalid_windows += 1
            }
        }
        self.reads += 1;
    }

    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    #[inline]
    pub fn reads(&self) -> u64 {
        self.reads
    }

    #[inline]
    pub fn invalid_windows(&self) -> u64 {
        self.invalid_windows
    }

    /// Looks up the count of one k-mer given as bases.
    /// # Arguments
    /// * `kmer` - exactly `k` bases from `{A, C, G, T}`
    /// # Errors
    /// `InvalidBase` if the k-mer has the wrong length or a base outside the alphabet.
    /// # Examples
    /// ```rust
    /// use kmers::kmer_counter::KmerCounter;
    /// let mut counter = KmerCounter::new(2).unwrap();
    /// counter.add_sequence(b"GTGT");
    /// assert_eq!(counter.count_of(b"GT").unwrap(), 2);
    /// assert!(counter.count_of(b"GN").is_err());
    /// ```
    pub fn count_of(&self, kmer: &[u8]) -> Result<u64> {
        let id = self.encoder.encode(kmer)?;
        Ok(self.counts[id as usize])
    }

    /// The counts as the real-valued vector consumed by the model.
    pub fn to_count_vector(&self) -> Vec<f64> {
        self.counts.iter().map(|&c| c as f64).collect()
    }

    /// Writes the counts as CSV with header `id,count`, one line per k-mer including zeros.
    /// # Arguments
    /// * `writer` - the destination
    pub fn write_histogram<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "id,count")?;
        for (id, count) in self.counts.iter().enumerate() {
            writeln!(writer, "{},{}", id, count)?;
        }
        writer.flush()?;
        let total: u64 = self.counts.iter().sum();
        info!("Wrote histogram of {} k-mers from {} reads", format_thousands(total), format_thousands(self.reads));
        Ok(())
    }
}

/// Parses an `id,count` CSV into a dense count vector of length `rows`; ids that are not listed count as zero.
/// # Arguments
/// * `reader` - the CSV source
/// * `rows` - the length of the count vector, normally `4^K`
/// # Examples
/// ```rust
/// use kmers::kmer_counter::read_histogram;
/// let csv = "id,count\n0,3\n2,1.5\n";
/// assert_eq!(read_histogram(csv.as_bytes(), 4).unwrap(), vec![3.0, 0.0, 1.5, 0.0]);
/// ```
pub fn read_histogram<R: BufRead>(reader: R, rows: usize) -> Result<Vec<f64>> {
    let mut ret: Vec<f64> = vec![0.0; rows];
    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || (line_number == 0 && line == "id,count") {
            continue;
        }
        let bad_line = || KmerError::Parse(format!("line {}: expected \"id,count\", found {:?}", line_number + 1, line));
        let mut fields = line.split(',');
        let id: usize = match fields.next().map(|f| f.trim().parse::<usize>()) {
            Some(Ok(id)) => id,
            _ => return Err(bad_line())
        };
        let count: f64 = match fields.next().map(|f| f.trim().parse::<f64>()) {
            Some(Ok(count)) if count >= 0.0 => count,
            _ => return Err(bad_line())
        };
        if fields.next().is_some() {
            return Err(bad_line());
        }
        if id >= rows {
            return Err(KmerError::Parse(format!("line {}: k-mer id {} outside [0, {})", line_number + 1, id, rows)));
        }
        ret[id] += count;
    }
    Ok(ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EncodeError;

    #[test]
    fn test_counts() {
        let mut counter = KmerCounter::new(3).unwrap();
        counter.add_sequence(b"ACGTACG");
        counter.add_sequence(b"AC");
        counter.add_sequence(b"ACGNACG");
        assert_eq!(counter.reads(), 3);
        //ACG x4, CGT, GTA, TAC
        assert_eq!(counter.counts()[6], 4);
        assert_eq!(counter.counts()[27], 1);
        assert_eq!(counter.counts().iter().sum::<u64>(), 7);
        assert_eq!(counter.invalid_windows(), 3);
        assert_eq!(counter.to_count_vector().len(), 64);
    }

    #[test]
    fn test_count_of() {
        let mut counter = KmerCounter::new(3).unwrap();
        counter.add_sequence(b"ACGTACG");
        assert_eq!(counter.count_of(b"ACG").unwrap(), 2);
        assert_eq!(counter.count_of(b"TTT").unwrap(), 0);
        assert!(matches!(
            counter.count_of(b"ACN"),
            Err(KmerError::InvalidBase(EncodeError::InvalidBase { base: 'N', offset: 2 }))
        ));
        assert!(matches!(
            counter.count_of(b"ACGT"),
            Err(KmerError::InvalidBase(EncodeError::WrongLength { expected: 3, found: 4 }))
        ));
    }

    #[test]
    fn test_bad_k() {
        assert!(KmerCounter::new(0).is_err());
        assert!(KmerCounter::new(16).is_err());
    }

    #[test]
    fn test_histogram_round_trip() {
        let mut counter = KmerCounter::new(2).unwrap();
        counter.add_sequence(b"ACGTTTT");
        let mut out: Vec<u8> = vec![];
        counter.write_histogram(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("id,count\n0,0\n1,1\n"));
        assert_eq!(text.lines().count(), 17);
        assert_eq!(read_histogram(text.as_bytes(), 16).unwrap(), counter.to_count_vector());
    }

    #[test]
    fn test_read_histogram_errors() {
        assert!(matches!(read_histogram("id,count\n16,1\n".as_bytes(), 16), Err(KmerError::Parse(_))));
        assert!(matches!(read_histogram("id,count\n1\n".as_bytes(), 16), Err(KmerError::Parse(_))));
        assert!(matches!(read_histogram("id,count\nx,1\n".as_bytes(), 16), Err(KmerError::Parse(_))));
        assert!(matches!(read_histogram("1,-2\n".as_bytes(), 16), Err(KmerError::Parse(_))));
        assert!(matches!(read_histogram("1,2,3\n".as_bytes(), 16), Err(KmerError::Parse(_))));
        //header is optional and blank lines are ignored
        assert_eq!(read_histogram("3,2\n\n3,1\n".as_bytes(), 4).unwrap(), vec![0.0, 0.0, 0.0, 3.0]);
    }
}
