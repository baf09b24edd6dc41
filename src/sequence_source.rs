
extern crate log;
extern crate needletail;

use log::debug;
use needletail::{parse_fastx_file, parse_fastx_reader, FastxReader};
use std::io::Read;

use crate::design_matrix::BuildParameters;
use crate::errors::{KmerError, Result};

/// Identifier fragment marking predicted (unverified) transcripts, e.g. RefSeq `XM_`/`XR_` records
pub const PREDICTED_MARKER: &str = "PREDICTED";

/// a struct for storing a generic sequence record
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SequenceRecord {
    /// The index of the record among the records yielded so far
    pub index: u64,
    /// The record label/identifier
    pub label: String,
    /// The raw sequence bytes
    pub seq: Vec<u8>
}

/// Iterates the records of a FASTA/FASTQ file or stream (gzip is detected automatically), optionally skipping records
/// whose identifier contains `PREDICTED`.
pub struct FastxSource {
    reader: Box<dyn FastxReader>,
    include_predicted: bool,
    yielded: u64,
    skipped: u64
}

impl FastxSource {
    /// Opens a FASTX file.
    /// # Arguments
    /// * `filename` - the path of the FASTA/FASTQ file, optionally gzipped
    /// * `include_predicted` - if `false`, records marked `PREDICTED` are skipped
    pub fn from_path(filename: &str, include_predicted: bool) -> Result<Self> {
        let reader = parse_fastx_file(filename)
            .map_err(|e| KmerError::Parse(format!("failed to open {:?}: {}", filename, e)))?;
        Ok(Self::from_fastx_reader(reader, include_predicted))
    }

    /// Opens a FASTX file for a design matrix build, honoring `params.include_predicted`.
    /// # Arguments
    /// * `filename` - the path of the FASTA/FASTQ file, optionally gzipped
    /// * `params` - the build parameters
    pub fn with_parameters(filename: &str, params: &BuildParameters) -> Result<Self> {
        Self::from_path(filename, params.include_predicted)
    }

    /// Wraps any byte stream, such as stdin.
    /// # Arguments
    /// * `reader` - the FASTA/FASTQ stream, optionally gzipped
    /// * `include_predicted` - if `false`, records marked `PREDICTED` are skipped
    pub fn from_reader<R: Read + Send + 'static>(reader: R, include_predicted: bool) -> Result<Self> {
        let reader = parse_fastx_reader(reader)
            .map_err(|e| KmerError::Parse(format!("failed to read FASTX stream: {}", e)))?;
        Ok(Self::from_fastx_reader(reader, include_predicted))
    }

    fn from_fastx_reader(reader: Box<dyn FastxReader>, include_predicted: bool) -> Self {
        Self {
            reader,
            include_predicted,
            yielded: 0,
            skipped: 0
        }
    }

    /// Number of records skipped for carrying the `PREDICTED` marker
    #[inline]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Iterator for FastxSource {
    type Item = Result<SequenceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (label, seq) = match self.reader.next()? {
                Ok(record) => {
                    let label = String::from_utf8_lossy(record.id()).into_owned();
                    if !self.include_predicted && label.contains(PREDICTED_MARKER) {
                        (label, None)
                    } else {
                        let seq = record.seq().into_owned();
                        (label, Some(seq))
                    }
                },
                Err(e) => {
                    return Some(Err(KmerError::Parse(format!("invalid record after {} records: {}", self.yielded, e))));
                }
            };
            match seq {
                Some(seq) => {
                    let record = SequenceRecord {
                        index: self.yielded,
                        label,
                        seq
                    };
                    self.yielded += 1;
                    return Some(Ok(record));
                },
                None => {
                    debug!("Skipping predicted record {}", label);
                    self.skipped += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, GzBuilder};
    use std::io::{Cursor, Write};
    use tempfile::{Builder, NamedTempFile};

    const FASTA: &str = ">NM_0001 verified transcript\nACGT\nACGT\n>XM_0002 PREDICTED: something\nTTTT\n>NR_0003\nGGNN\n";

    fn write_fasta(data: &str) -> NamedTempFile {
        let mut file: NamedTempFile = Builder::new().prefix("temp_data_").suffix(".fa").tempfile().unwrap();
        file.write_all(data.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_skip_predicted() {
        let file = write_fasta(FASTA);
        let mut source = FastxSource::from_path(file.path().to_str().unwrap(), false).unwrap();
        let records: Vec<SequenceRecord> = source.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], SequenceRecord { index: 0, label: "NM_0001 verified transcript".to_string(), seq: b"ACGTACGT".to_vec() });
        assert_eq!(records[1], SequenceRecord { index: 1, label: "NR_0003".to_string(), seq: b"GGNN".to_vec() });
        assert_eq!(source.skipped(), 1);
    }

    #[test]
    fn test_include_predicted() {
        let file = write_fasta(FASTA);
        let source = FastxSource::from_path(file.path().to_str().unwrap(), true).unwrap();
        let labels: Vec<String> = source.map(|r| r.unwrap().label).collect();
        assert_eq!(labels, vec!["NM_0001 verified transcript", "XM_0002 PREDICTED: something", "NR_0003"]);
    }

    #[test]
    fn test_with_parameters() {
        let file = write_fasta(FASTA);
        let filename = file.path().to_str().unwrap();
        let mut params = BuildParameters::default();
        assert_eq!(FastxSource::with_parameters(filename, &params).unwrap().count(), 2);
        params.include_predicted = true;
        assert_eq!(FastxSource::with_parameters(filename, &params).unwrap().count(), 3);
    }

    #[test]
    fn test_from_reader() {
        let source = FastxSource::from_reader(Cursor::new(FASTA.as_bytes().to_vec()), false).unwrap();
        assert_eq!(source.count(), 2);
    }

    #[test]
    fn test_gzipped_fastq() {
        let file: NamedTempFile = Builder::new().prefix("temp_data_").suffix(".fq.gz").tempfile().unwrap();
        let mut gz = GzBuilder::new().write(file, Compression::default());
        let data: Vec<&str> = vec!["CCGT", "ACG", "N"];
        for (i, s) in data.iter().enumerate() {
            writeln!(gz, "@seq_{}\n{}\n+\n{}", i, s, "F".repeat(s.len())).unwrap();
        }
        //have to keep the file handle or the temp file is removed
        let file = gz.finish().unwrap();

        let source = FastxSource::from_path(file.path().to_str().unwrap(), false).unwrap();
        let seqs: Vec<Vec<u8>> = source.map(|r| r.unwrap().seq).collect();
        assert_eq!(seqs, vec![b"CCGT".to_vec(), b"ACG".to_vec(), b"N".to_vec()]);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(FastxSource::from_path("/nonexistent/reads.fa", false), Err(KmerError::Parse(_))));
    }
}
