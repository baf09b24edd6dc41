
extern crate log;
extern crate threadpool;

use log::info;
use std::sync::mpsc;
use threadpool::ThreadPool;

use crate::design_matrix::{shred_sequence, BuildParameters, ColumnContribution, SparseDesignMatrixBuilder};
use crate::errors::{KmerError, Result};
use crate::kmer_encoder::KmerEncoder;
use crate::ordered_collector::OrderedCollector;
use crate::sequence_source::SequenceRecord;
use crate::sparse_matrix::SparseMatrix;

/// Maximum number of shredding jobs in flight before the reader waits on results
pub const JOB_SLOTS: u64 = 10000;
/// Number of processed sequences between progress messages
pub const UPDATE_INTERVAL: u64 = 10000;

/// Builds the design matrix and column labels for every record of `source`.
/// With `params.threads > 1`, sequences are shredded on a thread pool and re-ordered before they reach the builder, so
/// the output is identical to a single-threaded build.
/// # Arguments
/// * `source` - the sequence records in column order, e.g. a `FastxSource`
/// * `params` - the build options
/// # Examples
/// ```rust
/// use kmers::build_pipeline::build_design_matrix;
/// use kmers::design_matrix::BuildParameters;
/// use kmers::sequence_source::SequenceRecord;
/// let records = vec![
///     SequenceRecord { index: 0, label: "a".to_string(), seq: b"AAAA".to_vec() },
///     SequenceRecord { index: 1, label: "b".to_string(), seq: b"ACGT".to_vec() }
/// ];
/// let params = BuildParameters { kmer_size: 3, threads: 2, ..Default::default() };
/// let (matrix, labels) = build_design_matrix(records.into_iter().map(Ok), &params).unwrap();
/// assert_eq!((matrix.rows(), matrix.cols()), (64, 2));
/// assert_eq!(labels, vec!["a", "b"]);
/// ```
pub fn build_design_matrix<I>(source: I, params: &BuildParameters) -> Result<(SparseMatrix, Vec<String>)>
where
    I: Iterator<Item = Result<SequenceRecord>>
{
    let builder = SparseDesignMatrixBuilder::with_parameters(params)?;
    info!("Shredding sequences into {}-mers with {} thread(s)...", params.kmer_size, params.threads.max(1));
    let builder = if params.threads <= 1 {
        build_sequential(source, builder)?
    } else {
        build_parallel(source, builder, params.threads, shred_record)?
    };
    info!("Finalizing {} columns...", builder.columns());
    builder.finalize_with_labels()
}

fn build_sequential<I>(source: I, mut builder: SparseDesignMatrixBuilder) -> Result<SparseDesignMatrixBuilder>
where
    I: Iterator<Item = Result<SequenceRecord>>
{
    let mut processed: u64 = 0;
    for raw_record in source {
        let record = raw_record?;
        builder.ingest(&record.label, &record.seq);
        processed += 1;
        if processed % UPDATE_INTERVAL == 0 {
            info!("Processed {} sequences...", processed);
        }
    }
    Ok(builder)
}

/// Signature of the per-record work done on the pool
type ShredJob = fn(&KmerEncoder, u64, &SequenceRecord) -> ColumnContribution;

fn shred_record(encoder: &KmerEncoder, read_index: u64, record: &SequenceRecord) -> ColumnContribution {
    shred_sequence(encoder, read_index, &record.label, &record.seq)
}

fn build_parallel<I>(source: I, builder: SparseDesignMatrixBuilder, threads: usize, job: ShredJob) -> Result<SparseDesignMatrixBuilder>
where
    I: Iterator<Item = Result<SequenceRecord>>
{
    let encoder = *builder.encoder();
    let mut collector = OrderedCollector::new(builder);

    //we need to set up the multiprocessing components now
    let pool = ThreadPool::new(threads);
    let (tx, rx) = mpsc::channel::<ColumnContribution>();
    let mut jobs_queued: u64 = 0;
    let mut results_received: u64 = 0;

    let receive_one = |collector: &mut OrderedCollector, results_received: &mut u64| -> Result<()> {
        let contribution = rx.recv()
            .map_err(|_| KmerError::JobOrder("worker channel closed before all results arrived".to_string()))?;
        collector.submit(contribution)?;
        *results_received += 1;
        if *results_received % UPDATE_INTERVAL == 0 {
            info!("Processed {} sequences...", results_received);
        }
        Ok(())
    };

    for raw_record in source {
        let record = raw_record?;

        //if we've filled our queue, then we should wait until we get some results back
        if jobs_queued - results_received >= JOB_SLOTS {
            receive_one(&mut collector, &mut results_received)?;
        }

        let tx = tx.clone();
        let read_index = jobs_queued;
        pool.execute(move || {
            let contribution = job(&encoder, read_index, &record);
            //the receiver is only gone if the build already failed
            let _ = tx.send(contribution);
        });
        jobs_queued += 1;
    }
    //workers now hold the only senders
    drop(tx);

    while results_received < jobs_queued {
        receive_one(&mut collector, &mut results_received)?;
    }
    collector.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(count: usize) -> Vec<SequenceRecord> {
        let bases = b"ACGTN";
        (0..count).map(|i| {
            //deterministic pseudo-random sequences of varying length
            let len = 1 + (i * 7) % 40;
            let seq: Vec<u8> = (0..len).map(|j| bases[(i * 31 + j * j * 17 + j) % bases.len()]).collect();
            SequenceRecord { index: i as u64, label: format!("seq_{}", i), seq }
        }).collect()
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let data = records(500);
        let sequential = BuildParameters { kmer_size: 4, threads: 1, chunk_capacity: 64, ..Default::default() };
        let parallel = BuildParameters { threads: 4, ..sequential.clone() };
        let expected = build_design_matrix(data.clone().into_iter().map(Ok), &sequential).unwrap();
        let found = build_design_matrix(data.into_iter().map(Ok), &parallel).unwrap();
        assert_eq!(found, expected);
        assert!(found.0.cols() > 0);
        assert_eq!(found.1.len(), found.0.cols());
    }

    #[test]
    fn test_error_propagates() {
        let mut data: Vec<Result<SequenceRecord>> = records(10).into_iter().map(Ok).collect();
        data.insert(5, Err(KmerError::Parse("bad record".to_string())));
        for &threads in &[1usize, 3] {
            let params = BuildParameters { kmer_size: 3, threads, ..Default::default() };
            let source = data.iter().map(|r| match r {
                Ok(record) => Ok(record.clone()),
                Err(_) => Err(KmerError::Parse("bad record".to_string()))
            });
            assert!(matches!(build_design_matrix(source, &params), Err(KmerError::Parse(_))));
        }
    }

    #[test]
    fn test_failed_job() {
        let data = records(20);
        let builder = SparseDesignMatrixBuilder::new(3).unwrap();
        let failing: ShredJob = |encoder, read_index, record| {
            if read_index == 7 {
                panic!("shredding failed for {}", record.label);
            }
            shred_record(encoder, read_index, record)
        };
        let result = build_parallel(data.into_iter().map(Ok), builder, 3, failing);
        assert!(matches!(result, Err(KmerError::JobOrder(_))));
    }

    #[test]
    fn test_empty_source() {
        let params = BuildParameters { kmer_size: 3, threads: 2, ..Default::default() };
        let source = vec![SequenceRecord { index: 0, label: "short".to_string(), seq: b"AC".to_vec() }];
        assert!(matches!(build_design_matrix(source.into_iter().map(Ok), &params), Err(KmerError::EmptyInput)));
    }
}
