extern crate clap;
extern crate env_logger;
extern crate exitcode;
extern crate log;

use clap::{Arg, App, value_t};
use log::{info, error};
use std::fs::File;
use std::io::{self, BufWriter, Write};

use kmers::build_pipeline::UPDATE_INTERVAL;
use kmers::kmer_counter::KmerCounter;
use kmers::sequence_source::FastxSource;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

fn main() {
    //initialize logging for our benefit later
    env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

    //this is the CLI block, params that get populated appear before
    let reads_fn: String;
    let mut out_fn: String = "stdout".to_string();
    let mut kmer_size: usize = 10;

    let matches = App::new("kmers-shred")
        .version(VERSION.unwrap_or("?"))
        .about("Counts the k-mers of a read set into an id,count histogram")
        .arg(Arg::with_name("kmer_size")
            .short("k")
            .long("kmer_size")
            .takes_value(true)
            .help("k-mer size, must match the design matrix (default: 10)"))
        .arg(Arg::with_name("out_fn")
            .short("o")
            .long("output")
            .takes_value(true)
            .help("The histogram CSV (default: stdout)"))
        .arg(Arg::with_name("READS.FQ")
            .help("The FASTX file with reads, optionally gzipped")
            .required(true)
            .index(1))
        .get_matches();

    //pull out required values
    reads_fn = matches.value_of("READS.FQ").unwrap().to_string();

    //optional values
    kmer_size = value_t!(matches.value_of("kmer_size"), usize).unwrap_or(kmer_size);
    out_fn = value_t!(matches.value_of("out_fn"), String).unwrap_or(out_fn);

    info!("Input parameters (required):");
    info!("\tReads: \"{}\"", reads_fn);
    //reads are never filtered by the PREDICTED marker
    let source: FastxSource = match FastxSource::from_path(&reads_fn, true) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open reads file: {}", e);
            std::process::exit(exitcode::NOINPUT);
        }
    };
    info!("\tOutput histogram: \"{}\"", out_fn);
    info!("Optional parameters:");
    info!("\tk-mer size: {}", kmer_size);

    let mut counter: KmerCounter = match KmerCounter::new(kmer_size) {
        Ok(counter) => counter,
        Err(e) => {
            error!("Invalid k-mer size: {}", e);
            std::process::exit(exitcode::USAGE);
        }
    };

    for raw_record in source {
        let record = match raw_record {
            Ok(record) => record,
            Err(e) => {
                error!("Invalid record while parsing reads file: {}", e);
                std::process::exit(exitcode::IOERR);
            }
        };
        counter.add_sequence(&record.seq);
        if counter.reads() % UPDATE_INTERVAL == 0 {
            info!("Processed {} reads...", counter.reads());
        }
    }
    info!("Finished counting {} reads ({} invalid windows skipped)", counter.reads(), counter.invalid_windows());

    let writer: Box<dyn Write> = if &out_fn == "stdout" {
        Box::new(io::stdout())
    } else {
        Box::new(match File::create(&out_fn) {
            Ok(fp) => fp,
            Err(e) => {
                error!("Failed to create histogram file: {:?}", e);
                std::process::exit(exitcode::CANTCREAT);
            }
        })
    };
    match counter.write_histogram(BufWriter::new(writer)) {
        Ok(()) => {},
        Err(e) => {
            error!("Failed to write histogram: {}", e);
            std::process::exit(exitcode::IOERR);
        }
    };
}
