
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kmers::design_matrix::{shred_sequence, SparseDesignMatrixBuilder};
use kmers::kmer_encoder::KmerEncoder;
use kmers::multinomial_model::MultinomialSoftmaxModel;
use kmers::sparse_matrix::SparseMatrix;
use kmers::stats_util::*;

const TRANSCRIPT: &str = "AACGGATCAAGCTTACCAGTATTTACGTAACGGATCAAGCTTACCAGTATTTACGTNNACGGATCAAGCTTACCAGTATTTACGT";

fn get_transcripts(count: usize) -> Vec<Vec<u8>> {
    //rotate the base transcript so the columns differ
    (0..count).map(|i| {
        let shift = i % TRANSCRIPT.len();
        let mut seq: Vec<u8> = TRANSCRIPT.as_bytes()[shift..].to_vec();
        seq.extend_from_slice(&TRANSCRIPT.as_bytes()[..shift]);
        seq
    }).collect()
}

fn get_matrix(k: usize, count: usize) -> SparseMatrix {
    let mut builder = SparseDesignMatrixBuilder::new(k).unwrap();
    for (i, seq) in get_transcripts(count).iter().enumerate() {
        builder.ingest(&format!("seq_{}", i), seq);
    }
    builder.finalize().unwrap()
}

pub fn bench_kmer_encoder(c: &mut Criterion) {
    let encoder = KmerEncoder::new(12).unwrap();
    let query = TRANSCRIPT.as_bytes();

    c.bench_function("encode", |b| b.iter(|| {
        black_box(encoder.encode(&query[..12]).unwrap());
    }));

    c.bench_function("scan", |b| b.iter(|| {
        black_box(encoder.scan(query).flatten().sum::<u64>());
    }));

    c.bench_function("shred_sequence", |b| b.iter(|| {
        black_box(shred_sequence(&encoder, 0, "seq", query));
    }));
}

pub fn bench_design_matrix(c: &mut Criterion) {
    let transcripts = get_transcripts(200);
    c.bench_function("build_and_finalize", |b| b.iter(|| {
        let mut builder = SparseDesignMatrixBuilder::new(10).unwrap();
        for seq in transcripts.iter() {
            builder.ingest("seq", seq);
        }
        black_box(builder.finalize().unwrap());
    }));
}

pub fn bench_model(c: &mut Criterion) {
    let matrix = get_matrix(6, 50);
    let counts: Vec<f64> = (0..matrix.rows()).map(|i| (i % 5) as f64).collect();
    let model = MultinomialSoftmaxModel::new(&matrix, &counts).unwrap();
    let beta: Vec<f64> = (0..model.num_params()).map(|i| (i as f64) * 0.01).collect();

    c.bench_function("log_density", |b| b.iter(|| {
        black_box(model.log_density(&beta).unwrap());
    }));

    c.bench_function("evaluate", |b| b.iter(|| {
        black_box(model.evaluate(&beta).unwrap());
    }));
}

pub fn bench_stats_util(c: &mut Criterion) {
    c.bench_function("format_thousands", |b| b.iter(|| {
        for x in 0..7 {
            black_box(format_thousands(1234567 * x));
        }
    }));
}

criterion_group!(benches, bench_kmer_encoder, bench_design_matrix, bench_model, bench_stats_util);
criterion_main!(benches);
