extern crate clap;
extern crate env_logger;
extern crate exitcode;
extern crate log;

use clap::{Arg, App, value_t};
use log::{info, error};
use std::fs::File;
use std::io::BufWriter;

use kmers::build_pipeline::build_design_matrix;
use kmers::design_matrix::{BuildParameters, SparseDesignMatrixBuilder};
use kmers::errors::KmerError;
use kmers::matrix_codec::save_matrix;
use kmers::sequence_source::FastxSource;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

fn main() {
    //initialize logging for our benefit later
    env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

    //this is the CLI block, params that get populated appear before
    let transcripts_fn: String;
    let matrix_fn: String;
    let default_params: BuildParameters = Default::default();
    let mut kmer_size: usize = default_params.kmer_size;
    let mut threads: usize = default_params.threads;
    let include_predicted: bool;
    let labels_fn: Option<String>;

    let matches = App::new("kmers-build")
        .version(VERSION.unwrap_or("?"))
        .about("Builds the sparse k-mer design matrix of a transcript collection")
        .arg(Arg::with_name("kmer_size")
            .short("k")
            .long("kmer_size")
            .takes_value(true)
            .help("k-mer size, between 1 and 15 (default: 10)"))
        .arg(Arg::with_name("threads")
            .short("t")
            .long("threads")
            .takes_value(true)
            .help("number of shredding threads (default: 1)"))
        .arg(Arg::with_name("include_predicted")
            .long("include-predicted")
            .help("keep transcripts whose identifier contains \"PREDICTED\""))
        .arg(Arg::with_name("labels")
            .short("l")
            .long("labels")
            .takes_value(true)
            .help("file to write one column label per line to"))
        .arg(Arg::with_name("TRANSCRIPTS.FA")
            .help("The FASTX file with one transcript per record, optionally gzipped")
            .required(true)
            .index(1))
        .arg(Arg::with_name("MATRIX.BIN")
            .help("The file to write the serialized design matrix to")
            .required(true)
            .index(2))
        .get_matches();

    //pull out required values
    transcripts_fn = matches.value_of("TRANSCRIPTS.FA").unwrap().to_string();
    matrix_fn = matches.value_of("MATRIX.BIN").unwrap().to_string();

    //now check options
    kmer_size = value_t!(matches.value_of("kmer_size"), usize).unwrap_or(kmer_size);
    threads = value_t!(matches.value_of("threads"), usize).unwrap_or(threads);
    include_predicted = matches.is_present("include_predicted");
    labels_fn = matches.value_of("labels").map(|s| s.to_string());

    info!("Input parameters (required):");
    info!("\tTranscripts: \"{}\"", transcripts_fn);
    info!("\tOutput matrix: \"{}\"", matrix_fn);
    info!("Optional parameters:");
    info!("\tk-mer size: {}", kmer_size);
    info!("\tthreads: {}", threads);
    info!("\tinclude predicted: {}", include_predicted);
    info!("\tlabels: {:?}", labels_fn);
    if threads == 0 {
        error!("--threads must be at least 1");
        std::process::exit(exitcode::USAGE);
    }

    let params: BuildParameters = BuildParameters {
        kmer_size,
        include_predicted,
        threads,
        ..default_params
    };
    let source: FastxSource = match FastxSource::with_parameters(&transcripts_fn, &params) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open transcripts file: {}", e);
            std::process::exit(exitcode::NOINPUT);
        }
    };
    let (matrix, labels) = match build_design_matrix(source, &params) {
        Ok(result) => result,
        Err(e @ KmerError::KmerTooLarge { .. }) => {
            error!("Invalid k-mer size: {}", e);
            std::process::exit(exitcode::USAGE);
        },
        Err(e @ KmerError::Io(_)) => {
            error!("Failed while reading transcripts: {}", e);
            std::process::exit(exitcode::IOERR);
        },
        Err(e) => {
            error!("Failed to build design matrix: {}", e);
            std::process::exit(exitcode::DATAERR);
        }
    };
    info!("Design matrix: {} rows, {} columns, {} non-zero entries", matrix.rows(), matrix.cols(), matrix.nnz());

    info!("Saving matrix to \"{}\"...", matrix_fn);
    match save_matrix(&matrix, &matrix_fn) {
        Ok(()) => {},
        Err(e) => {
            error!("Failed to save design matrix: {}", e);
            std::process::exit(exitcode::IOERR);
        }
    };

    if let Some(labels_fn) = labels_fn {
        info!("Saving {} labels to \"{}\"...", labels.len(), labels_fn);
        let write_file: File = match File::create(&labels_fn) {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to create labels file: {:?}", e);
                std::process::exit(exitcode::CANTCREAT);
            }
        };
        match SparseDesignMatrixBuilder::write_labels(&labels, BufWriter::new(write_file)) {
            Ok(()) => {},
            Err(e) => {
                error!("Failed to write labels: {}", e);
                std::process::exit(exitcode::IOERR);
            }
        };
    }
    info!("Design matrix construction complete.");
}
