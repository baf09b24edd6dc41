
use crate::errors::{EncodeError, KmerError};

/// Identifier of a k-mer, a base-4 number in `[0, 4^K)`
pub type KmerId = u64;

/// Largest `K` for which `4^K` still fits in a `u64`
pub const MAX_ENCODER_K: usize = 31;

/// marks a byte that is not a valid base
const INVALID: u8 = 0xFF;

/// contains ASCII to base identifier encoding
const BASE_TO_ID: [u8; 256] = build_base_lut();

/// contains base identifier to ASCII encoding
const ID_TO_BASE: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// builds up the BASE_TO_ID const for us; lower-case and ambiguity codes stay invalid
const fn build_base_lut() -> [u8; 256] {
    let mut ret: [u8; 256] = [INVALID; 256];

    ret['A' as usize] = 0;
    ret['C' as usize] = 1;
    ret['G' as usize] = 2;
    ret['T' as usize] = 3;

    ret
}

/// Returns the number of distinct k-mers of length `k`, i.e. `4^k`, or `None` if that overflows a `u64`.
/// # Arguments
/// * `k` - the k-mer length
/// # Examples
/// ```rust
/// use kmers::kmer_encoder::space_size;
/// assert_eq!(space_size(0), Some(1));
/// assert_eq!(space_size(4), Some(256));
/// assert_eq!(space_size(31), Some(1 << 62));
/// assert_eq!(space_size(32), None);
/// ```
#[inline]
pub fn space_size(k: usize) -> Option<u64> {
    if k > MAX_ENCODER_K {
        return None;
    }
    Some(1u64 << (2 * k))
}

/// Fixed-radix encoder between length-`k` nucleotide windows and integer identifiers.
/// Each window is read as a base-4 number, most significant base first, with `A=0, C=1, G=2, T=3`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KmerEncoder {
    k: usize,
    space: u64
}

impl KmerEncoder {
    /// Creates an encoder for k-mers of length `k`.
    /// # Arguments
    /// * `k` - the k-mer length, at most `MAX_ENCODER_K`
    /// # Examples
    /// ```rust
    /// use kmers::kmer_encoder::KmerEncoder;
    /// let encoder = KmerEncoder::new(4).unwrap();
    /// assert_eq!(encoder.space_size(), 256);
    /// assert!(KmerEncoder::new(32).is_err());
    /// ```
    pub fn new(k: usize) -> Result<Self, KmerError> {
        match space_size(k) {
            Some(space) => Ok(Self { k, space }),
            None => Err(KmerError::KmerTooLarge { k, max: MAX_ENCODER_K })
        }
    }

    /// The k-mer length for this encoder
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// The number of distinct identifiers, `4^k`
    #[inline]
    pub fn space_size(&self) -> u64 {
        self.space
    }

    /// Encodes a window of exactly `k` bases.
    /// # Arguments
    /// * `window` - the bases to encode
    /// # Examples
    /// ```rust
    /// use kmers::kmer_encoder::KmerEncoder;
    /// let encoder = KmerEncoder::new(4).unwrap();
    /// assert_eq!(encoder.encode(b"AAAA").unwrap(), 0);
    /// assert_eq!(encoder.encode(b"ACGT").unwrap(), 27);
    /// assert_eq!(encoder.encode(b"TTTT").unwrap(), 255);
    /// assert!(encoder.encode(b"ACNT").is_err());
    /// ```
    #[inline]
    pub fn encode(&self, window: &[u8]) -> Result<KmerId, EncodeError> {
        if window.len() != self.k {
            return Err(EncodeError::WrongLength { expected: self.k, found: window.len() });
        }
        let mut id: KmerId = 0;
        for (offset, &b) in window.iter().enumerate() {
            let v = BASE_TO_ID[b as usize];
            if v == INVALID {
                return Err(EncodeError::InvalidBase { base: b as char, offset });
            }
            id = (id << 2) | v as u64;
        }
        Ok(id)
    }

    /// Decodes an identifier back into its window, `None` if `id` is outside `[0, 4^k)`.
    /// # Arguments
    /// * `id` - the k-mer identifier
    /// # Examples
    /// ```rust
    /// use kmers::kmer_encoder::KmerEncoder;
    /// let encoder = KmerEncoder::new(4).unwrap();
    /// assert_eq!(encoder.decode(27).unwrap(), "ACGT");
    /// assert_eq!(encoder.decode(256), None);
    /// ```
    pub fn decode(&self, id: KmerId) -> Option<String> {
        if id >= self.space {
            return None;
        }
        let ret: String = (0..self.k)
            .rev()
            .map(|i| ID_TO_BASE[((id >> (2 * i)) & 0b11) as usize] as char)
            .collect();
        Some(ret)
    }

    /// Returns an iterator over every length-`k` window of `seq` (stride 1) yielding `Some(id)` for valid windows and
    /// `None` for windows containing an invalid base. Runs in O(L) using a rolling code.
    /// # Arguments
    /// * `seq` - the sequence to scan
    /// # Examples
    /// ```rust
    /// use kmers::kmer_encoder::KmerEncoder;
    /// let encoder = KmerEncoder::new(3).unwrap();
    /// let windows: Vec<Option<u64>> = encoder.scan(b"ACGNT").collect();
    /// assert_eq!(windows, vec![Some(6), None, None]);
    /// ```
    pub fn scan<'a>(&self, seq: &'a [u8]) -> KmerScan<'a> {
        KmerScan {
            k: self.k,
            mask: self.space - 1,
            seq,
            start: 0,
            pos: 0,
            code: 0,
            run: 0
        }
    }
}

/// Number of length-`k` windows in a sequence of length `seq_len`
#[inline]
pub fn window_count(seq_len: usize, k: usize) -> usize {
    (seq_len + 1).saturating_sub(k)
}

/// Rolling scan over the windows of a sequence, see `KmerEncoder::scan`
pub struct KmerScan<'a> {
    k: usize,
    mask: u64,
    seq: &'a [u8],
    /// start of the next window to emit
    start: usize,
    /// next base to fold into the code
    pos: usize,
    code: u64,
    /// consecutive valid bases ending just before `pos`
    run: usize
}

impl<'a> Iterator for KmerScan<'a> {
    type Item = Option<KmerId>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let end = self.start + self.k;
        if end > self.seq.len() {
            return None;
        }
        while self.pos < end {
            let v = BASE_TO_ID[self.seq[self.pos] as usize];
            if v == INVALID {
                self.run = 0;
                self.code = 0;
            } else {
                self.code = ((self.code << 2) | v as u64) & self.mask;
                self.run += 1;
            }
            self.pos += 1;
        }
        self.start += 1;
        Some(if self.run >= self.k { Some(self.code) } else { None })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = window_count(self.seq.len(), self.k).saturating_sub(self.start);
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for KmerScan<'a> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_space_size() {
        let mut expected: u64 = 1;
        for k in 0..=MAX_ENCODER_K {
            assert_eq!(space_size(k), Some(expected));
            expected = expected.wrapping_mul(4);
        }
        assert_eq!(space_size(32), None);
        assert_eq!(space_size(64), None);
    }

    #[test]
    fn test_known_ids() {
        let encoder = KmerEncoder::new(4).unwrap();
        assert_eq!(encoder.encode(b"AAAA").unwrap(), 0);
        assert_eq!(encoder.encode(b"TTTT").unwrap(), 255);
        assert_eq!(encoder.encode(b"ACGT").unwrap(), 27);
        assert_eq!(encoder.encode(b"CAAA").unwrap(), 64);
    }

    #[test]
    fn test_invalid_windows() {
        let encoder = KmerEncoder::new(4).unwrap();
        assert_eq!(encoder.encode(b"ACGN"), Err(EncodeError::InvalidBase { base: 'N', offset: 3 }));
        //lower-case is not accepted
        assert_eq!(encoder.encode(b"aCGT"), Err(EncodeError::InvalidBase { base: 'a', offset: 0 }));
        assert_eq!(encoder.encode(b"ACG"), Err(EncodeError::WrongLength { expected: 4, found: 3 }));
    }

    #[test]
    fn test_too_large() {
        assert!(KmerEncoder::new(MAX_ENCODER_K).is_ok());
        match KmerEncoder::new(MAX_ENCODER_K + 1) {
            Err(KmerError::KmerTooLarge { k, max }) => {
                assert_eq!(k, 32);
                assert_eq!(max, 31);
            },
            other => panic!("unexpected result {:?}", other)
        }
    }

    #[test]
    fn test_zero_k() {
        let encoder = KmerEncoder::new(0).unwrap();
        assert_eq!(encoder.space_size(), 1);
        assert_eq!(encoder.encode(b"").unwrap(), 0);
        assert_eq!(encoder.decode(0).unwrap(), "");
        assert_eq!(encoder.scan(b"AC").count(), 3);
    }

    #[test]
    fn test_bijection_small_k() {
        for k in 1..=5 {
            let encoder = KmerEncoder::new(k).unwrap();
            for id in 0..encoder.space_size() {
                let window = encoder.decode(id).unwrap();
                assert_eq!(window.len(), k);
                assert_eq!(encoder.encode(window.as_bytes()).unwrap(), id);
            }
        }
    }

    #[test]
    fn test_window_count() {
        assert_eq!(window_count(5, 3), 3);
        assert_eq!(window_count(3, 3), 1);
        assert_eq!(window_count(2, 3), 0);
        assert_eq!(window_count(0, 3), 0);
        assert_eq!(KmerEncoder::new(3).unwrap().scan(b"AC").len(), 0);
    }

    #[test]
    fn test_scan_resets_after_invalid() {
        let encoder = KmerEncoder::new(2).unwrap();
        let windows: Vec<Option<u64>> = encoder.scan(b"ACNGTA").collect();
        //AC, CN, NG, GT, TA
        assert_eq!(windows, vec![Some(1), None, None, Some(11), Some(12)]);
    }

    proptest! {
        #[test]
        fn prop_decode_encode(k in 1usize..=MAX_ENCODER_K, seed in any::<u64>()) {
            let encoder = KmerEncoder::new(k).unwrap();
            let id = seed & (encoder.space_size() - 1);
            let window = encoder.decode(id).unwrap();
            prop_assert_eq!(encoder.encode(window.as_bytes()).unwrap(), id);
        }

        #[test]
        fn prop_encode_decode(window in prop::collection::vec(prop::sample::select(b"ACGT".to_vec()), 1..=MAX_ENCODER_K)) {
            let encoder = KmerEncoder::new(window.len()).unwrap();
            let id = encoder.encode(&window).unwrap();
            prop_assert_eq!(encoder.decode(id).unwrap().into_bytes(), window);
        }

        #[test]
        fn prop_scan_matches_encode(
            k in 1usize..=12,
            seq in prop::collection::vec(prop::sample::select(b"ACGTN".to_vec()), 0..200)
        ) {
            let encoder = KmerEncoder::new(k).unwrap();
            let scanned: Vec<Option<u64>> = encoder.scan(&seq).collect();
            prop_assert_eq!(scanned.len(), window_count(seq.len(), k));
            for (i, got) in scanned.iter().enumerate() {
                prop_assert_eq!(*got, encoder.encode(&seq[i..i+k]).ok());
            }
        }
    }
}
