extern crate clap;
extern crate env_logger;
extern crate exitcode;
extern crate log;

use clap::{Arg, App};
use log::{info, error};
use std::fs::File;
use std::io::BufReader;

use kmers::kmer_counter::read_histogram;
use kmers::matrix_codec::load_matrix;
use kmers::multinomial_model::MultinomialSoftmaxModel;
use kmers::sparse_matrix::SparseMatrix;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

fn main() {
    //initialize logging for our benefit later
    env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

    //this is the CLI block, params that get populated appear before
    let matrix_fn: String;
    let histogram_fn: Option<String>;

    let matches = App::new("kmers-inspect")
        .version(VERSION.unwrap_or("?"))
        .about("Summarizes a serialized design matrix and optionally evaluates the model at uniform proportions")
        .arg(Arg::with_name("histogram")
            .short("c")
            .long("counts")
            .takes_value(true)
            .help("id,count histogram CSV of observed k-mers"))
        .arg(Arg::with_name("MATRIX.BIN")
            .help("The serialized design matrix")
            .required(true)
            .index(1))
        .get_matches();

    //pull out required values
    matrix_fn = matches.value_of("MATRIX.BIN").unwrap().to_string();
    histogram_fn = matches.value_of("histogram").map(|s| s.to_string());

    info!("Input parameters (required):");
    info!("\tMatrix: \"{}\"", matrix_fn);
    info!("Optional parameters:");
    info!("\tHistogram: {:?}", histogram_fn);

    let matrix: SparseMatrix = match load_matrix(&matrix_fn) {
        Ok(matrix) => matrix,
        Err(e) => {
            error!("Failed to load design matrix: {}", e);
            std::process::exit(exitcode::DATAERR);
        }
    };
    info!("Matrix summary:");
    info!("\trows: {}", matrix.rows());
    info!("\tcolumns: {}", matrix.cols());
    info!("\tnon-zero entries: {}", matrix.nnz());
    let column_sums: Vec<f64> = matrix.column_sums();
    let min_sum: f64 = column_sums.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_sum: f64 = column_sums.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    info!("\tcolumn sums: [{:.6}, {:.6}]", min_sum, max_sum);

    if let Some(histogram_fn) = histogram_fn {
        let file: File = match File::open(&histogram_fn) {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to open histogram file: {:?}", e);
                std::process::exit(exitcode::NOINPUT);
            }
        };
        let counts: Vec<f64> = match read_histogram(BufReader::new(file), matrix.rows()) {
            Ok(counts) => counts,
            Err(e) => {
                error!("Failed to parse histogram: {}", e);
                std::process::exit(exitcode::DATAERR);
            }
        };
        let model = match MultinomialSoftmaxModel::new(&matrix, &counts) {
            Ok(model) => model,
            Err(e) => {
                error!("Histogram does not match the matrix: {}", e);
                std::process::exit(exitcode::DATAERR);
            }
        };
        let beta: Vec<f64> = vec![0.0; model.num_params()];
        match model.evaluate(&beta) {
            Ok(evaluation) => {
                let grad_norm: f64 = evaluation.gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
                info!("Model at uniform proportions:");
                info!("\tobserved k-mers: {}", counts.iter().sum::<f64>());
                info!("\tlog density: {:.6}", evaluation.log_density);
                info!("\tgradient norm: {:.6}", grad_norm);
            },
            Err(e) => {
                error!("Failed to evaluate model: {}", e);
                std::process::exit(exitcode::DATAERR);
            }
        };
    }
}
