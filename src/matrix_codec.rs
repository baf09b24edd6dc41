
extern crate log;

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use log::info;
use std::convert::TryFrom;
use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};

use crate::errors::{KmerError, Result};
use crate::sparse_matrix::SparseMatrix;

/// Bytes in the `rows, cols, nnz` header
pub const HEADER_BYTES: u64 = 12;

/// Returns the exact byte length of a serialized matrix with the given dimensions:
/// `12 + 4*(rows+1) + 4*nnz + 4*nnz`.
/// # Arguments
/// * `rows` - the number of rows
/// * `nnz` - the number of stored values
/// # Examples
/// ```rust
/// use kmers::matrix_codec::serialized_len;
/// assert_eq!(serialized_len(3, 2), 12 + 16 + 8 + 8);
/// ```
#[inline]
pub fn serialized_len(rows: u64, nnz: u64) -> u64 {
    HEADER_BYTES + 4 * (rows + 1) + 8 * nnz
}

fn to_i32(what: &'static str, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| KmerError::TooLargeToSerialize { what, value })
}

/// Writes a matrix in the fixed little-endian layout:
/// `int32 rows, int32 cols, int32 nnz, int32[rows+1] row_pointer, int32[nnz] column_index, float32[nnz] value`.
/// # Arguments
/// * `matrix` - the matrix to write
/// * `writer` - the destination
/// # Errors
/// `TooLargeToSerialize` if any dimension or offset exceeds `i32::MAX`.
pub fn write_matrix<W: Write>(matrix: &SparseMatrix, writer: W) -> Result<()> {
    let rows = to_i32("rows", matrix.rows())?;
    let cols = to_i32("cols", matrix.cols())?;
    let nnz = to_i32("nnz", matrix.nnz())?;

    let mut writer = BufWriter::new(writer);
    writer.write_i32::<LE>(rows)?;
    writer.write_i32::<LE>(cols)?;
    writer.write_i32::<LE>(nnz)?;
    //every offset is <= nnz, and every column < cols, so neither can overflow once the header fits
    for &offset in matrix.row_ptr() {
        writer.write_i32::<LE>(offset as i32)?;
    }
    for &c in matrix.col_indices() {
        writer.write_i32::<LE>(c as i32)?;
    }
    for &v in matrix.values() {
        writer.write_f32::<LE>(v)?;
    }
    writer.flush()?;
    Ok(())
}

/// maps a premature end of stream to a corrupt file error
fn truncated(e: io::Error, section: &str) -> KmerError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        KmerError::CorruptFile(format!("file ends inside the {} array", section))
    } else {
        KmerError::Io(e)
    }
}

fn read_len<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value = reader.read_i32::<LE>().map_err(|e| truncated(e, "header"))?;
    if value < 0 {
        return Err(KmerError::CorruptFile(format!("negative {} = {}", what, value)));
    }
    Ok(value as usize)
}

/// Reads a matrix written by `write_matrix`. The stream must end exactly after the value array.
/// # Arguments
/// * `reader` - the source
/// # Errors
/// `CorruptFile` if the declared lengths disagree with the bytes available, the row pointers are inconsistent, or a
/// column index falls outside `[0, cols)`.
/// # Examples
/// ```rust
/// use kmers::matrix_codec::{read_matrix, write_matrix};
/// use kmers::sparse_matrix::SparseMatrix;
/// let m = SparseMatrix::from_triplets(4, 2, &[(0, 1, 0.5), (3, 0, 1.0), (3, 1, 0.5)]).unwrap();
/// let mut bytes: Vec<u8> = vec![];
/// write_matrix(&m, &mut bytes).unwrap();
/// assert_eq!(bytes.len(), 12 + 4 * 5 + 8 * 3);
/// assert_eq!(read_matrix(&bytes[..]).unwrap(), m);
/// ```
pub fn read_matrix<R: Read>(reader: R) -> Result<SparseMatrix> {
    let mut reader = BufReader::new(reader);
    let rows = read_len(&mut reader, "rows")?;
    let cols = read_len(&mut reader, "cols")?;
    let nnz = read_len(&mut reader, "nnz")?;
    read_body(&mut reader, rows, cols, nnz)
}

/// Elements read per block; allocation grows with the bytes actually present, not the declared lengths
const READ_BLOCK: usize = 1 << 16;

fn read_i32_array<R: Read>(reader: &mut R, len: usize, section: &str) -> Result<Vec<i32>> {
    let mut ret: Vec<i32> = Vec::with_capacity(len.min(READ_BLOCK));
    let mut block: Vec<i32> = vec![0; len.min(READ_BLOCK)];
    while ret.len() < len {
        let n = (len - ret.len()).min(READ_BLOCK);
        reader.read_i32_into::<LE>(&mut block[..n]).map_err(|e| truncated(e, section))?;
        ret.extend_from_slice(&block[..n]);
    }
    Ok(ret)
}

fn read_f32_array<R: Read>(reader: &mut R, len: usize, section: &str) -> Result<Vec<f32>> {
    let mut ret: Vec<f32> = Vec::with_capacity(len.min(READ_BLOCK));
    let mut block: Vec<f32> = vec![0.0; len.min(READ_BLOCK)];
    while ret.len() < len {
        let n = (len - ret.len()).min(READ_BLOCK);
        reader.read_f32_into::<LE>(&mut block[..n]).map_err(|e| truncated(e, section))?;
        ret.extend_from_slice(&block[..n]);
    }
    Ok(ret)
}

fn read_body<R: Read>(reader: &mut R, rows: usize, cols: usize, nnz: usize) -> Result<SparseMatrix> {
    let row_ptr_raw = read_i32_array(reader, rows + 1, "row pointer")?;
    let col_raw = read_i32_array(reader, nnz, "column index")?;
    let values = read_f32_array(reader, nnz, "value")?;

    let mut trailing: [u8; 1] = [0];
    if reader.read(&mut trailing)? != 0 {
        return Err(KmerError::CorruptFile("unexpected bytes after the value array".to_string()));
    }

    if row_ptr_raw.iter().any(|&p| p < 0) {
        return Err(KmerError::CorruptFile("negative row pointer".to_string()));
    }
    let row_ptr: Vec<usize> = row_ptr_raw.into_iter().map(|p| p as usize).collect();

    let mut col_idx: Vec<u32> = Vec::with_capacity(nnz);
    for c in col_raw {
        if c < 0 || c as usize >= cols {
            return Err(KmerError::CorruptFile(format!("column index {} outside [0, {})", c, cols)));
        }
        col_idx.push(c as u32);
    }

    SparseMatrix::from_csr(rows, cols, row_ptr, col_idx, values)
}

/// Saves a matrix to a file, see `write_matrix`.
/// # Arguments
/// * `matrix` - the matrix to save
/// * `filename` - the output path
pub fn save_matrix(matrix: &SparseMatrix, filename: &str) -> Result<()> {
    let file = fs::File::create(filename)?;
    write_matrix(matrix, file)?;
    info!("Saved {}x{} matrix with {} non-zeros to {:?}", matrix.rows(), matrix.cols(), matrix.nnz(), filename);
    Ok(())
}

/// Loads a matrix from a file, see `read_matrix`. The file size is checked against the header before any array is
/// allocated.
/// # Arguments
/// * `filename` - the input path
pub fn load_matrix(filename: &str) -> Result<SparseMatrix> {
    let full_file_size: u64 = fs::metadata(filename)?.len();
    let mut reader = BufReader::new(fs::File::open(filename)?);
    let rows = read_len(&mut reader, "rows")?;
    let cols = read_len(&mut reader, "cols")?;
    let nnz = read_len(&mut reader, "nnz")?;
    let expected = serialized_len(rows as u64, nnz as u64);
    if expected != full_file_size {
        return Err(KmerError::CorruptFile(format!(
            "header declares {} rows and {} non-zeros ({} bytes) but file {:?} has {} bytes",
            rows, nnz, expected, filename, full_file_size
        )));
    }
    info!("Loading {}x{} matrix with {} non-zeros from {:?}", rows, cols, nnz, filename);
    read_body(&mut reader, rows, cols, nnz)
}
