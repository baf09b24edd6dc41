/// Runs the end-to-end design matrix build, optionally over a thread pool
pub mod build_pipeline;
/// Shreds sequences into k-mer columns and assembles the sparse design matrix
pub mod design_matrix;
/// Error types shared by the crate
pub mod errors;
/// Observed k-mer count vectors and their CSV histogram form
pub mod kmer_counter;
/// 2-bit k-mer encoding and rolling window scans
pub mod kmer_encoder;
/// Binary little-endian CSR file format
pub mod matrix_codec;
/// Multinomial-softmax log posterior and its gradient
pub mod multinomial_model;
/// Restores input order of shredded sequences coming back from worker threads
pub mod ordered_collector;
/// FASTA/FASTQ record iteration
pub mod sequence_source;
/// Compressed sparse row matrix and its products
pub mod sparse_matrix;
/// Build statistics and formatting helpers
pub mod stats_util;
