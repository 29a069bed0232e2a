//! Virtual storage allocation.
//!
//! Output-file descriptors map a logical file path to a small integer id
//! and carry one monotonically increasing allocation cursor per
//! partition. Allocation never writes storage; it only reserves address
//! ranges that the emit passes later fill through `storage::Store`.

use std::collections::HashMap;

use crate::storage::element_size;

/// Partition count per output file.
pub const PART_COUNT: usize = 4;

/// One registered output file.
pub struct OutFile {
    pub path: String,
    pub info: String,
    cursors: [u64; PART_COUNT],
}

impl OutFile {
    pub fn cursor(&self, part: u16) -> u64 {
        self.cursors[part as usize]
    }
}

/// Addressing failure when indexing into an allocated block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DimError {
    /// Reference dimensionality differs from the declaration.
    Mismatch,
    /// Index out of range, with the offending dimension (0 based).
    Range(usize),
}

pub struct FileTable {
    files: Vec<OutFile>,
    by_path: HashMap<String, u16>,
}

impl FileTable {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    /// Register an output file, deduplicated by path. Returns the file id
    /// and whether the descriptor already existed (the caller compares
    /// info strings and warns on mismatch).
    pub fn open(&mut self, path: &str, info: &str) -> (u16, bool) {
        if let Some(&id) = self.by_path.get(path) {
            return (id, true);
        }
        let id = self.files.len() as u16;
        self.files.push(OutFile {
            path: path.to_string(),
            info: info.to_string(),
            cursors: [0; PART_COUNT],
        });
        self.by_path.insert(path.to_string(), id);
        (id, false)
    }

    pub fn get(&self, id: u16) -> Option<&OutFile> {
        self.files.get(id as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &OutFile)> {
        self.files.iter().enumerate().map(|(i, f)| (i as u16, f))
    }

    /// Reserve `count` contiguous elements in one partition.
    ///
    /// Returns the pre-increment cursor as the base offset, plus a wrap
    /// flag: cursor wraparound is reported as "file space full" by the
    /// caller but the wrapped offset is still handed out and the cursor
    /// keeps the wrapped value. `None` means the file id is unknown,
    /// which is an internal error, not a user one.
    pub fn allocate(&mut self, file: u16, part: u16, count: u64) -> Option<(u64, bool)> {
        let f = self.files.get_mut(file as usize)?;
        let old = f.cursors[part as usize];
        let new = old.wrapping_add(element_size(part).wrapping_mul(count));
        let wrapped = new < old;
        f.cursors[part as usize] = new;
        Some((old, wrapped))
    }
}

/// Offset of element `i` within a block allocated at `base`.
pub fn index(base: u64, i: u64, part: u16) -> u64 {
    base + i * element_size(part)
}

/// Flattened row-major element number for a 1-based multi-dimensional
/// reference: `e = ((x1-1)*b2 + (x2-1))*b3 + ...`. A scalar takes no
/// indexes and is element zero.
pub fn element_number(bounds: &[i32], dim: usize, indexes: &[i32]) -> Result<u64, DimError> {
    if indexes.len() != dim {
        return Err(DimError::Mismatch);
    }
    let mut e: u64 = 0;
    for (i, &x) in indexes.iter().enumerate() {
        let bound = bounds[i];
        if x < 1 || x > bound {
            return Err(DimError::Range(i));
        }
        e = e * bound as u64 + (x as u64 - 1);
    }
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PART_FANIN, PART_NEURON};
    use crate::sym::DEFAULT_BOUNDS;

    #[test]
    fn test_open_dedupes_by_path() {
        let mut files = FileTable::new();
        let (a, existing) = files.open("net.000", "first");
        assert!(!existing);
        let (b, existing) = files.open("net.000", "second");
        assert!(existing);
        assert_eq!(a, b);
        assert_eq!(files.get(a).unwrap().info, "first");

        let (c, _) = files.open("net.001", "");
        assert_ne!(a, c);
    }

    #[test]
    fn test_allocate_monotonic() {
        let mut files = FileTable::new();
        let (id, _) = files.open("net.000", "");
        let mut last_end = 0;
        for n in 1..6 {
            let (base, wrapped) = files.allocate(id, PART_NEURON, n).unwrap();
            assert!(!wrapped);
            assert!(base >= last_end);
            last_end = index(base, n, PART_NEURON);
            assert_eq!(last_end, base + n * 32);
        }
        // Partitions have independent cursors.
        let (base, _) = files.allocate(id, PART_FANIN, 2).unwrap();
        assert_eq!(base, 0);
        let (base, _) = files.allocate(id, PART_FANIN, 1).unwrap();
        assert_eq!(base, 32);
    }

    #[test]
    fn test_allocate_wrap_reported_but_returned() {
        let mut files = FileTable::new();
        let (id, _) = files.open("net.000", "");
        let (_, wrapped) = files.allocate(id, PART_NEURON, u64::MAX / 32).unwrap();
        assert!(!wrapped);
        let (base, wrapped) = files.allocate(id, PART_NEURON, 2).unwrap();
        assert!(wrapped);
        // The wrapped cursor stays in effect for later allocations.
        assert!(files.get(id).unwrap().cursor(PART_NEURON) < base);
        assert!(files.allocate(99, PART_NEURON, 1).is_none());
    }

    #[test]
    fn test_element_number() {
        // foo[3][4]: foo[2][3] is element (2-1)*4 + (3-1) = 6.
        assert_eq!(element_number(&[3, 4], 2, &[2, 3]), Ok(6));
        assert_eq!(element_number(&[3, 4], 2, &[1, 1]), Ok(0));
        assert_eq!(element_number(&[3, 4], 2, &[3, 4]), Ok(11));
        // Out of range must fail, not wrap.
        assert_eq!(element_number(&[3, 4], 2, &[4, 1]), Err(DimError::Range(0)));
        assert_eq!(element_number(&[3, 4], 2, &[1, 0]), Err(DimError::Range(1)));
        assert_eq!(element_number(&[3, 4], 2, &[2]), Err(DimError::Mismatch));
        // Scalars and default-bounded vectors.
        assert_eq!(element_number(&DEFAULT_BOUNDS, 0, &[]), Ok(0));
        assert_eq!(element_number(&DEFAULT_BOUNDS, 1, &[5]), Ok(4));
    }
}
