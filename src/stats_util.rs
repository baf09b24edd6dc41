
extern crate log;

use log::info;

/// Counters collected while building a design matrix
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BuildStats {
    /// Sequences passed to the builder
    pub sequences: u64,
    /// Total bases across those sequences
    pub bases: u64,
    /// Columns emitted, i.e. sequences with at least one valid window
    pub columns: u64,
    /// Windows that were encoded and contributed an entry
    pub valid_windows: u64,
    /// Windows skipped because they contain an invalid base
    pub invalid_windows: u64,
    /// Sequences that produced no valid window and therefore no column
    pub empty_sequences: u64
}

impl BuildStats {
    /// Folds another set of counters into this one.
    pub fn merge(&mut self, other: &BuildStats) {
        self.sequences += other.sequences;
        self.bases += other.bases;
        self.columns += other.columns;
        self.valid_windows += other.valid_windows;
        self.invalid_windows += other.invalid_windows;
        self.empty_sequences += other.empty_sequences;
    }

    /// Logs the counters at info level.
    pub fn report(&self) {
        info!("Build statistics:");
        info!("\tsequences: {}", format_thousands(self.sequences));
        info!("\tbases: {}", format_thousands(self.bases));
        info!("\tcolumns: {}", format_thousands(self.columns));
        info!("\tvalid k-mer windows: {}", format_thousands(self.valid_windows));
        info!("\tinvalid k-mer windows: {}", format_thousands(self.invalid_windows));
        info!("\tsequences without a valid window: {}", format_thousands(self.empty_sequences));
    }
}

/// Formats an integer with `,` between groups of three digits.
/// # Arguments
/// * `value` - the value to format
/// # Examples
/// ```rust
/// use kmers::stats_util::format_thousands;
/// assert_eq!(format_thousands(0), "0");
/// assert_eq!(format_thousands(999), "999");
/// assert_eq!(format_thousands(1234567), "1,234,567");
/// ```
pub fn format_thousands(value: u64) -> String {
    let digits: String = value.to_string();
    let mut ret = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            ret.push(',');
        }
        ret.push(c);
    }
    ret
}

/// Returns at most the first `max_chars` characters of a sequence label, for log output.
/// # Arguments
/// * `label` - the label to shorten
/// * `max_chars` - the maximum number of characters to keep
/// # Examples
/// ```rust
/// use kmers::stats_util::truncate_label;
/// assert_eq!(truncate_label("NM_000001.1 some gene", 11), "NM_000001.1");
/// assert_eq!(truncate_label("short", 11), "short");
/// ```
pub fn truncate_label(label: &str, max_chars: usize) -> &str {
    match label.char_indices().nth(max_chars) {
        Some((offset, _)) => &label[..offset],
        None => label
    }
}
