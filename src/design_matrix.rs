
extern crate log;

use log::{debug, info};
use std::io::Write;

use crate::errors::{KmerError, Result};
use crate::kmer_encoder::{KmerEncoder, KmerId};
use crate::sparse_matrix::SparseMatrix;
use crate::stats_util::{truncate_label, BuildStats};

/// Largest k-mer size for a design matrix; `4^15 + 1` row pointers still fit the 32-bit file format
pub const MAX_MATRIX_K: usize = 15;

/// Default number of entries per arena chunk (12 MiB per chunk)
pub const DEFAULT_CHUNK_CAPACITY: usize = 1 << 20;

/// Number of characters of a label shown in diagnostics
const LABEL_DISPLAY_LEN: usize = 15;

/// stores options for building a design matrix
#[derive(Clone, Debug)]
pub struct BuildParameters {
    /// The k-mer size, `K`
    pub kmer_size: usize,
    /// Keep records whose identifier is marked `PREDICTED`
    pub include_predicted: bool,
    /// Number of shredding threads, 1 runs everything on the calling thread
    pub threads: usize,
    /// Entries per arena chunk
    pub chunk_capacity: usize
}

impl Default for BuildParameters {
    fn default() -> Self {
        Self {
            kmer_size: 10,
            include_predicted: false,
            threads: 1,
            chunk_capacity: DEFAULT_CHUNK_CAPACITY
        }
    }
}

/// One accumulated `(row, column, value)` entry; unique per `(row, column)`
#[derive(Clone, Copy, Debug, PartialEq)]
struct Entry {
    row: u32,
    col: u32,
    value: f32
}

/// Append-only storage made of fixed-capacity chunks, so growth never reallocates and copies existing entries.
struct EntryArena {
    chunks: Vec<Vec<Entry>>,
    chunk_capacity: usize,
    len: usize
}

impl EntryArena {
    fn new(chunk_capacity: usize) -> Self {
        Self {
            chunks: Vec::new(),
            chunk_capacity: chunk_capacity.max(1),
            len: 0
        }
    }

    #[inline]
    fn push(&mut self, entry: Entry) {
        let full = match self.chunks.last() {
            Some(chunk) => chunk.len() == self.chunk_capacity,
            None => true
        };
        if full {
            self.chunks.push(Vec::with_capacity(self.chunk_capacity));
        }
        if let Some(chunk) = self.chunks.last_mut() {
            chunk.push(entry);
        }
        self.len += 1;
    }
}

/// The k-mer content of a single sequence, ready to be placed in a column.
#[derive(Clone, Debug)]
pub struct ColumnContribution {
    /// The input index of the sequence, used to restore input order after parallel shredding
    pub read_index: u64,
    /// The k-mer size used to shred the sequence
    pub k: usize,
    /// The sequence label/identifier
    pub label: String,
    /// Distinct k-mers in ascending order, each with its summed weight
    pub entries: Vec<(KmerId, f32)>,
    /// The number of bases in the sequence
    pub bases: u64,
    /// Windows that encoded successfully
    pub valid_windows: u64,
    /// Windows skipped because of an invalid base
    pub invalid_windows: u64
}

/// Shreds one sequence into its k-mer distribution. Every valid window receives weight `1 / valid_windows`, and repeated
/// k-mers are collapsed into a single summed entry. Invalid windows are skipped and counted.
/// # Arguments
/// * `encoder` - the k-mer encoder
/// * `read_index` - the input index of the sequence
/// * `label` - the sequence identifier
/// * `seq` - the sequence bases
/// # Examples
/// ```rust
/// use kmers::design_matrix::shred_sequence;
/// use kmers::kmer_encoder::KmerEncoder;
/// let encoder = KmerEncoder::new(3).unwrap();
/// let contribution = shred_sequence(&encoder, 0, "seq", b"ACGNT");
/// assert_eq!(contribution.entries, vec![(6, 1.0)]);
/// assert_eq!(contribution.invalid_windows, 2);
/// ```
pub fn shred_sequence(encoder: &KmerEncoder, read_index: u64, label: &str, seq: &[u8]) -> ColumnContribution {
    let mut ids: Vec<KmerId> = Vec::with_capacity(encoder.scan(seq).len());
    let mut invalid_windows: u64 = 0;
    for window in encoder.scan(seq) {
        match window {
            Some(id) => ids.push(id),
            None => invalid_windows += 1
        }
    }
    let valid_windows = ids.len() as u64;
    if invalid_windows > 0 {
        debug!("{} illegal k-mer windows in ref id = {}", invalid_windows, truncate_label(label, LABEL_DISPLAY_LEN));
    }

    //collapse repeats so each k-mer appears once with weight count / valid_windows
    ids.sort_unstable();
    let mut entries: Vec<(KmerId, f32)> = Vec::new();
    let mut i = 0;
    while i < ids.len() {
        let id = ids[i];
        let mut j = i + 1;
        while j < ids.len() && ids[j] == id {
            j += 1;
        }
        entries.push((id, ((j - i) as f64 / valid_windows as f64) as f32));
        i = j;
    }

    ColumnContribution {
        read_index,
        k: encoder.k(),
        label: label.to_string(),
        entries,
        bases: seq.len() as u64,
        valid_windows,
        invalid_windows
    }
}

/// Streaming builder for the `4^K x N` k-mer-by-sequence design matrix.
/// Each sequence with at least one valid window becomes the next column, holding its k-mer distribution.
pub struct SparseDesignMatrixBuilder {
    encoder: KmerEncoder,
    arena: EntryArena,
    /// per-row entry counts, one slot longer than the row count so it can become the row pointer array in place
    row_counts: Vec<usize>,
    labels: Vec<String>,
    stats: BuildStats
}

impl SparseDesignMatrixBuilder {
    /// Creates a builder with default parameters for k-mers of length `k`.
    /// # Arguments
    /// * `k` - the k-mer length, between 1 and `MAX_MATRIX_K`
    /// # Examples
    /// ```rust
    /// use kmers::design_matrix::SparseDesignMatrixBuilder;
    /// let mut builder = SparseDesignMatrixBuilder::new(3).unwrap();
    /// builder.ingest("a", b"AAAAA");
    /// let matrix = builder.finalize().unwrap();
    /// assert_eq!(matrix.rows(), 64);
    /// assert_eq!(matrix.cols(), 1);
    /// assert_eq!(matrix.get(0, 0), 1.0);
    /// ```
    pub fn new(k: usize) -> Result<Self> {
        let params = BuildParameters {
            kmer_size: k,
            ..Default::default()
        };
        Self::with_parameters(&params)
    }

    /// Creates a builder from a full parameter set.
    /// # Arguments
    /// * `params` - the build parameters; only `kmer_size` and `chunk_capacity` matter here
    pub fn with_parameters(params: &BuildParameters) -> Result<Self> {
        let k = params.kmer_size;
        if k == 0 || k > MAX_MATRIX_K {
            return Err(KmerError::KmerTooLarge { k, max: MAX_MATRIX_K });
        }
        let encoder = KmerEncoder::new(k)?;
        let rows = encoder.space_size() as usize;
        info!("Allocating design matrix builder with {} k-mer rows...", rows);
        Ok(Self {
            encoder,
            arena: EntryArena::new(params.chunk_capacity),
            row_counts: vec![0; rows + 1],
            labels: Vec::new(),
            stats: BuildStats::default()
        })
    }

    #[inline]
    pub fn encoder(&self) -> &KmerEncoder {
        &self.encoder
    }

    /// The number of rows, `4^K`
    #[inline]
    pub fn rows(&self) -> usize {
        self.row_counts.len() - 1
    }

    /// The number of columns emitted so far
    #[inline]
    pub fn columns(&self) -> usize {
        self.labels.len()
    }

    /// The number of accumulated entries
    #[inline]
    pub fn num_entries(&self) -> usize {
        self.arena.len
    }

    #[inline]
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Shreds a sequence and adds it as the next column. Invalid windows are skipped, never reported as errors.
    /// Returns the column index assigned, or `None` if the sequence had no valid window and was left out.
    /// # Arguments
    /// * `label` - the sequence identifier
    /// * `seq` - the sequence bases
    pub fn ingest(&mut self, label: &str, seq: &[u8]) -> Option<usize> {
        let read_index = self.stats.sequences;
        let contribution = shred_sequence(&self.encoder, read_index, label, seq);
        self.add_column(contribution)
    }

    /// Adds an already shredded sequence as the next column, see `ingest`.
    /// # Arguments
    /// * `contribution` - the output of `shred_sequence` with this builder's `k`
    /// # Errors
    /// `DimensionMismatch` if the contribution was shredded with another `k` or holds a k-mer outside `[0, 4^K)`.
    pub fn push_contribution(&mut self, contribution: ColumnContribution) -> Result<Option<usize>> {
        if contribution.k != self.encoder.k() {
            return Err(KmerError::DimensionMismatch { what: "k-mer size", expected: self.encoder.k(), found: contribution.k });
        }
        let rows = self.rows();
        if let Some(&(row, _)) = contribution.entries.iter().find(|&&(row, _)| row as usize >= rows) {
            return Err(KmerError::DimensionMismatch { what: "k-mer row", expected: rows, found: row as usize });
        }
        Ok(self.add_column(contribution))
    }

    fn add_column(&mut self, contribution: ColumnContribution) -> Option<usize> {
        self.stats.sequences += 1;
        self.stats.bases += contribution.bases;
        self.stats.valid_windows += contribution.valid_windows;
        self.stats.invalid_windows += contribution.invalid_windows;
        if contribution.entries.is_empty() {
            self.stats.empty_sequences += 1;
            return None;
        }

        let col = self.labels.len();
        for (row, value) in contribution.entries {
            self.row_counts[row as usize] += 1;
            self.arena.push(Entry {
                row: row as u32,
                col: col as u32,
                value
            });
        }
        self.labels.push(contribution.label);
        self.stats.columns += 1;
        Some(col)
    }

    /// Appends the columns of an independently built builder after the columns of this one.
    /// # Arguments
    /// * `other` - a builder using the same `k`
    pub fn append(&mut self, other: SparseDesignMatrixBuilder) -> Result<()> {
        if other.encoder.k() != self.encoder.k() {
            return Err(KmerError::DimensionMismatch { what: "k-mer size", expected: self.encoder.k(), found: other.encoder.k() });
        }
        let offset = self.labels.len() as u32;
        for chunk in other.arena.chunks {
            for entry in chunk {
                self.row_counts[entry.row as usize] += 1;
                self.arena.push(Entry {
                    col: entry.col + offset,
                    ..entry
                });
            }
        }
        self.labels.extend(other.labels);
        self.stats.merge(&other.stats);
        Ok(())
    }

    /// Converts the accumulated entries into a CSR matrix with `4^K` rows and one column per emitted sequence.
    /// This is a counting sort over rows: O(E + M), column indices ascend within each row, and each arena chunk is
    /// released once it has been placed.
    pub fn finalize(self) -> Result<SparseMatrix> {
        self.finalize_with_labels().map(|(matrix, _)| matrix)
    }

    /// Same as `finalize`, also returning the label of each column.
    pub fn finalize_with_labels(self) -> Result<(SparseMatrix, Vec<String>)> {
        let SparseDesignMatrixBuilder { arena, mut row_counts, labels, stats, .. } = self;
        if labels.is_empty() {
            return Err(KmerError::EmptyInput);
        }
        let rows = row_counts.len() - 1;
        let nnz = arena.len;
        info!("Finalizing design matrix with {} entries over {} columns...", nnz, labels.len());

        //exclusive prefix sum, row_counts[r] becomes the first slot of row r
        let mut offset: usize = 0;
        for slot in row_counts.iter_mut() {
            let count = *slot;
            *slot = offset;
            offset += count;
        }

        let mut col_idx: Vec<u32> = vec![0; nnz];
        let mut values: Vec<f32> = vec![0.0; nnz];
        for chunk in arena.chunks {
            for entry in chunk {
                let slot = &mut row_counts[entry.row as usize];
                col_idx[*slot] = entry.col;
                values[*slot] = entry.value;
                *slot += 1;
            }
        }

        //each slot now holds the end of its row, shift right to recover the starts
        for r in (1..=rows).rev() {
            row_counts[r] = row_counts[r - 1];
        }
        row_counts[0] = 0;

        stats.report();
        Ok((SparseMatrix::from_csr_unchecked(rows, labels.len(), row_counts, col_idx, values), labels))
    }

    /// Writes one label per line, in column order.
    /// # Arguments
    /// * `labels` - the column labels from `finalize_with_labels`
    /// * `writer` - the destination
    pub fn write_labels<W: Write>(labels: &[String], mut writer: W) -> Result<()> {
        for label in labels {
            writeln!(writer, "{}", label)?;
        }
        writer.flush()?;
        Ok(())
    }
}
