use std::collections::HashMap;

use crate::design_matrix::{ColumnContribution, SparseDesignMatrixBuilder};
use crate::errors::{KmerError, Result};

/// This is a wrapper for the `SparseDesignMatrixBuilder` that forces contributions to be added in input order.
/// Contributions that are not ready to be added are stored until the contributions before them are added, so column
/// indices do not depend on the order in which worker threads finish.
/// # Examples
/// ```rust
/// use kmers::design_matrix::{shred_sequence, SparseDesignMatrixBuilder};
/// use kmers::ordered_collector::OrderedCollector;
///
/// let builder = SparseDesignMatrixBuilder::new(2).unwrap();
/// let encoder = *builder.encoder();
/// let mut collector = OrderedCollector::new(builder);
///
/// //submit some contributions out of order
/// collector.submit(shred_sequence(&encoder, 1, "b", b"TTT")).unwrap();
/// collector.submit(shred_sequence(&encoder, 0, "a", b"AAA")).unwrap();
/// let (matrix, labels) = collector.finish().unwrap().finalize_with_labels().unwrap();
/// assert_eq!(labels, vec!["a".to_string(), "b".to_string()]);
/// assert_eq!(matrix.get(0, 0), 1.0);
/// assert_eq!(matrix.get(15, 1), 1.0);
/// ```
pub struct OrderedCollector {
    /// the actual matrix builder
    builder: SparseDesignMatrixBuilder,
    /// contains results we aren't ready to add yet
    map_store: HashMap<u64, ColumnContribution>,
    /// the index for the next contribution to add
    current_index: u64
}

impl OrderedCollector {
    /// Creates an `OrderedCollector` wrapping a builder; the first expected `read_index` is 0.
    /// # Arguments
    /// `builder` - the builder receiving contributions in order
    pub fn new(builder: SparseDesignMatrixBuilder) -> Self {
        OrderedCollector {
            builder,
            map_store: HashMap::<u64, ColumnContribution>::new(),
            current_index: 0
        }
    }

    /// Adds a contribution to the builder or buffers it if earlier contributions are still missing.
    /// # Arguments
    /// `contribution` - a shredded sequence carrying its input index
    pub fn submit(&mut self, contribution: ColumnContribution) -> Result<()> {
        if contribution.read_index < self.current_index {
            return Err(KmerError::JobOrder(format!(
                "read index {} is smaller than next expected index {}", contribution.read_index, self.current_index
            )));
        }
        let read_index = contribution.read_index;
        if self.map_store.insert(read_index, contribution).is_some() {
            return Err(KmerError::JobOrder(format!("read index {} was already submitted", read_index)));
        }
        self.drain_map_store()
    }

    fn drain_map_store(&mut self) -> Result<()> {
        while let Some(contribution) = self.map_store.remove(&self.current_index) {
            self.builder.push_contribution(contribution)?;
            self.current_index += 1;
        }
        Ok(())
    }

    /// Number of contributions waiting for an earlier index
    #[inline]
    pub fn pending(&self) -> usize {
        self.map_store.len()
    }

    /// Number of contributions handed to the builder so far
    #[inline]
    pub fn collected(&self) -> u64 {
        self.current_index
    }

    /// Returns the builder once every submitted contribution has been added.
    pub fn finish(self) -> Result<SparseDesignMatrixBuilder> {
        if !self.map_store.is_empty() {
            let mut missing: Vec<u64> = self.map_store.keys().cloned().collect();
            missing.sort_unstable();
            return Err(KmerError::JobOrder(format!(
                "{} contributions still waiting for read index {}, first buffered is {}",
                missing.len(), self.current_index, missing[0]
            )));
        }
        Ok(self.builder)
    }
}
