
use std::io::{BufReader, Write};
use tempfile::{Builder, NamedTempFile};

use kmers::build_pipeline::build_design_matrix;
use kmers::design_matrix::BuildParameters;
use kmers::kmer_counter::{read_histogram, KmerCounter};
use kmers::matrix_codec::{load_matrix, save_matrix, serialized_len};
use kmers::multinomial_model::{softmax, MultinomialSoftmaxModel};
use kmers::sequence_source::FastxSource;

const TRANSCRIPTS: &str = ">NM_1 first\nACGTACGGTCA\n>XM_2 PREDICTED: second\nTTTTGGGGCC\n>NR_3 third\nGGCATTACNNAC\n>NR_4 too short\nAC\n";

fn write_temp(suffix: &str, data: &[u8]) -> NamedTempFile {
    let mut file: NamedTempFile = Builder::new().prefix("temp_data_").suffix(suffix).tempfile().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_fasta_to_model() {
    let fasta = write_temp(".fa", TRANSCRIPTS.as_bytes());
    let fasta_fn = fasta.path().to_str().unwrap();

    //build with and without threads, predicted records are filtered
    let params = BuildParameters { kmer_size: 3, threads: 1, ..Default::default() };
    let source = FastxSource::with_parameters(fasta_fn, &params).unwrap();
    let (matrix, labels) = build_design_matrix(source, &params).unwrap();
    assert_eq!(labels, vec!["NM_1 first", "NR_3 third"]);
    assert_eq!((matrix.rows(), matrix.cols()), (64, 2));
    for sum in matrix.column_sums() {
        assert!((sum - 1.0).abs() < 1e-6);
    }

    let threaded = BuildParameters { threads: 3, ..params.clone() };
    let source = FastxSource::with_parameters(fasta_fn, &threaded).unwrap();
    assert_eq!(build_design_matrix(source, &threaded).unwrap(), (matrix.clone(), labels.clone()));

    //save and reload
    let matrix_file = Builder::new().prefix("temp_matrix_").suffix(".bin").tempfile().unwrap();
    let matrix_fn = matrix_file.path().to_str().unwrap();
    save_matrix(&matrix, matrix_fn).unwrap();
    let file_len = std::fs::metadata(matrix_fn).unwrap().len();
    assert_eq!(file_len, serialized_len(matrix.rows() as u64, matrix.nnz() as u64));
    let loaded = load_matrix(matrix_fn).unwrap();
    assert_eq!(loaded, matrix);

    //count reads sampled from the first transcript
    let mut counter = KmerCounter::new(3).unwrap();
    counter.add_sequence(b"ACGTACGG");
    counter.add_sequence(b"CGGTCA");
    let mut csv: Vec<u8> = vec![];
    counter.write_histogram(&mut csv).unwrap();
    let csv_file = write_temp(".csv", &csv);
    let reader = BufReader::new(std::fs::File::open(csv_file.path()).unwrap());
    let counts = read_histogram(reader, loaded.rows()).unwrap();
    assert_eq!(counts, counter.to_count_vector());

    //the reads only hit the first column, so moving mass there must increase the density
    let model = MultinomialSoftmaxModel::new(&loaded, &counts).unwrap();
    let uniform = model.evaluate(&[0.0, 0.0]).unwrap();
    assert!(uniform.log_density.is_finite());
    assert!(uniform.gradient[0] > 0.0);
    assert!(uniform.gradient[1] < 0.0);
    let shifted = model.log_density(&[1.0, -1.0]).unwrap();
    assert!(shifted > uniform.log_density);

    let theta = softmax(&[1.0, -1.0]);
    assert!((theta.iter().sum::<f64>() - 1.0).abs() < 1e-12);
}

#[test]
fn test_include_predicted() {
    let fasta = write_temp(".fa", TRANSCRIPTS.as_bytes());
    let params = BuildParameters { kmer_size: 4, include_predicted: true, ..Default::default() };
    let source = FastxSource::with_parameters(fasta.path().to_str().unwrap(), &params).unwrap();
    let (matrix, labels) = build_design_matrix(source, &params).unwrap();
    assert_eq!(labels.len(), 3);
    assert_eq!((matrix.rows(), matrix.cols()), (256, 3));
}
