//! Paged-storage collaborator.
//!
//! The compiler addresses every stored byte by a (file-id, partition-id,
//! offset) triple. This implementation keeps each partition as a growable
//! in-memory byte vector and flushes the whole image into one container
//! file per output file at termination; the record layouts inside the
//! partitions are defined in `record`.

use std::collections::HashMap;
use std::io::Write;

use bytemuck::Pod;

/// Partition identifiers within an output file.
pub const PART_CONTROL: u16 = 0;
pub const PART_NEURON: u16 = 1;
pub const PART_FANIN: u16 = 2;
pub const PART_BUNDLE: u16 = 3;

/// Hard cap on a single partition image.
pub const MAX_PARTITION: u64 = 1 << 28;

/// Container header magic.
pub const FILE_MAGIC: [u8; 8] = *b"NNETF100";

/// Allocation unit for each partition. Control and bundle partitions are
/// byte granular; neuron and fanin partitions hold fixed records.
pub fn element_size(part: u16) -> u64 {
    match part {
        PART_NEURON => std::mem::size_of::<crate::record::NeuronRecord>() as u64,
        PART_FANIN => std::mem::size_of::<crate::record::FaninRecord>() as u64,
        _ => 1,
    }
}

/// Storage access fault: the requested range cannot be materialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreFault;

pub struct Store {
    parts: HashMap<(u16, u16), Vec<u8>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            parts: HashMap::new(),
        }
    }

    fn part_mut(&mut self, file: u16, part: u16, end: u64) -> Result<&mut Vec<u8>, StoreFault> {
        if end > MAX_PARTITION {
            return Err(StoreFault);
        }
        let buf = self.parts.entry((file, part)).or_default();
        if (buf.len() as u64) < end {
            buf.resize(end as usize, 0);
        }
        Ok(buf)
    }

    pub fn write(
        &mut self,
        file: u16,
        part: u16,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), StoreFault> {
        let end = offset
            .checked_add(bytes.len() as u64)
            .ok_or(StoreFault)?;
        let buf = self.part_mut(file, part, end)?;
        buf[offset as usize..end as usize].copy_from_slice(bytes);
        Ok(())
    }

    pub fn read(&self, file: u16, part: u16, offset: u64, len: u64) -> Result<&[u8], StoreFault> {
        let end = offset.checked_add(len).ok_or(StoreFault)?;
        let buf = self.parts.get(&(file, part)).ok_or(StoreFault)?;
        if end > buf.len() as u64 {
            return Err(StoreFault);
        }
        Ok(&buf[offset as usize..end as usize])
    }

    pub fn write_pod<T: Pod>(
        &mut self,
        file: u16,
        part: u16,
        offset: u64,
        value: &T,
    ) -> Result<(), StoreFault> {
        self.write(file, part, offset, bytemuck::bytes_of(value))
    }

    pub fn read_pod<T: Pod>(&self, file: u16, part: u16, offset: u64) -> Result<T, StoreFault> {
        let bytes = self.read(file, part, offset, std::mem::size_of::<T>() as u64)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Scoped read-modify-write of one record.
    pub fn update_pod<T: Pod>(
        &mut self,
        file: u16,
        part: u16,
        offset: u64,
        f: impl FnOnce(&mut T),
    ) -> Result<(), StoreFault> {
        let mut value: T = self.read_pod(file, part, offset)?;
        f(&mut value);
        self.write_pod(file, part, offset, &value)
    }

    /// Bytes currently held for one partition; empty if never written.
    pub fn partition(&self, file: u16, part: u16) -> &[u8] {
        self.parts
            .get(&(file, part))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Flush one output file's partitions into its container on disk.
    ///
    /// Layout: magic, partition count, then a (part-id, length) directory
    /// followed by the partition images in directory order.
    pub fn flush_file(&self, file: u16, path: &str) -> std::io::Result<()> {
        let mut ids: Vec<u16> = self
            .parts
            .keys()
            .filter(|(f, _)| *f == file)
            .map(|(_, p)| *p)
            .collect();
        ids.sort_unstable();

        let mut out = std::fs::File::create(path)?;
        out.write_all(&FILE_MAGIC)?;
        out.write_all(&(ids.len() as u32).to_le_bytes())?;
        for &part in &ids {
            out.write_all(&part.to_le_bytes())?;
            out.write_all(&[0u8; 2])?;
            out.write_all(&(self.partition(file, part).len() as u64).to_le_bytes())?;
        }
        for &part in &ids {
            out.write_all(self.partition(file, part))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NeuronRecord;

    #[test]
    fn test_element_sizes() {
        assert_eq!(element_size(PART_CONTROL), 1);
        assert_eq!(element_size(PART_NEURON), 32);
        assert_eq!(element_size(PART_FANIN), 16);
        assert_eq!(element_size(PART_BUNDLE), 1);
    }

    #[test]
    fn test_write_read_pod() {
        let mut store = Store::new();
        let rec = NeuronRecord::new(22, 0.25);
        store.write_pod(1, PART_NEURON, 64, &rec).unwrap();
        let back: NeuronRecord = store.read_pod(1, PART_NEURON, 64).unwrap();
        assert_eq!(back, rec);
        // The gap before the record is zero filled.
        assert_eq!(store.read(1, PART_NEURON, 0, 64).unwrap(), &[0u8; 64][..]);
    }

    #[test]
    fn test_update_pod() {
        let mut store = Store::new();
        store
            .write_pod(0, PART_NEURON, 0, &NeuronRecord::new(29, 0.0))
            .unwrap();
        store
            .update_pod::<NeuronRecord>(0, PART_NEURON, 0, |r| r.fanin_count += 1)
            .unwrap();
        let rec: NeuronRecord = store.read_pod(0, PART_NEURON, 0).unwrap();
        assert_eq!(rec.fanin_count, 1);
    }

    #[test]
    fn test_faults() {
        let store = Store::new();
        assert_eq!(store.read(0, PART_NEURON, 0, 1), Err(StoreFault));

        let mut store = Store::new();
        assert_eq!(
            store.write(0, PART_NEURON, MAX_PARTITION, &[1]),
            Err(StoreFault)
        );
    }

    #[test]
    fn test_flush_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.000");
        let mut store = Store::new();
        store.write(0, PART_NEURON, 0, &[7u8; 32]).unwrap();
        store.write(0, PART_CONTROL, 0, &[1u8; 4]).unwrap();
        store.flush_file(0, path.to_str().unwrap()).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..8], b"NNETF100");
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 2);
    }
}
