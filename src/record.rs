//! Fixed binary record layouts shared with the network runtime.
//!
//! Every record is `#[repr(C)]` with explicit padding so the on-disk
//! image is identical across platforms. Field order and widths are load
//! bearing: the runtime reads these bytes back without this crate.

use bytemuck::{Pod, Zeroable};

/// Control-block tag stored in every neuron record ("NN").
pub const NEURON_CBID: u16 = 0x4E4E;

/// Magic tag opening the process-state-vector record.
pub const PSV_MAGIC: [u8; 8] = *b"NNETPSV1";

/// Enumerated neuron type codes. The runtime dispatches its evaluation
/// function on this value; the compiler only stores it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum NeuronType {
    Abort = 0,
    Constant = 1,
    Clock = 2,
    // Code 3 is reserved in the record format; no keyword selects it.
    FileRd = 4,
    FileWr = 5,
    Store = 6,
    Train = 19,
    Inc = 20,
    Dec = 21,
    Add = 22,
    Sub = 23,
    Mul = 24,
    Div = 25,
    Abs = 27,
    Neg = 28,
    Sigmoid = 29,
    And = 40,
    Or = 41,
    Nand = 42,
    Nor = 43,
    If = 50,
    While = 51,
    Until = 52,
}

impl NeuronType {
    /// Resolve a NEURON type keyword, case-insensitively.
    pub fn from_keyword(word: &str) -> Option<NeuronType> {
        use NeuronType::*;
        Some(match word.to_ascii_lowercase().as_str() {
            "abort" => Abort,
            "constant" => Constant,
            "clock" => Clock,
            "filerd" => FileRd,
            "filewr" => FileWr,
            "store" => Store,
            "train" => Train,
            "inc" => Inc,
            "dec" => Dec,
            "add" => Add,
            "sub" => Sub,
            "mul" => Mul,
            "div" => Div,
            "abs" => Abs,
            "neg" => Neg,
            "sigmoid" => Sigmoid,
            "and" => And,
            "or" => Or,
            "nand" => Nand,
            "nor" => Nor,
            "if" => If,
            "while" => While,
            "until" => Until,
            _ => return None,
        })
    }

    pub fn code(self) -> u16 {
        self as u16
    }
}

/// One computational unit. 32 bytes, identical for every neuron type.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct NeuronRecord {
    /// Always `NEURON_CBID`.
    pub cbid: u16,
    pub type_code: u16,
    /// Status and exception bits; zero at compile time.
    pub status: u16,
    pub _pad0: u16,
    /// Clock tick of the last evaluation.
    pub clock: u32,
    pub value: f32,
    /// Base offset of this neuron's fanin array within the fanin
    /// partition of the same file.
    pub fanin_vaddr: u64,
    /// Fanin array element count. The compiler also uses this field as a
    /// running counter between the count and emit passes.
    pub fanin_count: u32,
    pub _pad1: u32,
}

impl NeuronRecord {
    pub fn new(type_code: u16, value: f32) -> Self {
        Self {
            cbid: NEURON_CBID,
            type_code,
            status: 0,
            _pad0: 0,
            clock: 0,
            value,
            fanin_vaddr: 0,
            fanin_count: 0,
            _pad1: 0,
        }
    }
}

/// One weighted incoming connection. 16 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct FaninRecord {
    /// Source neuron offset within the neuron partition.
    pub neuron: u64,
    /// Source neuron file id; partition is implied (always neuron).
    pub file_id: u16,
    pub _pad0: u16,
    pub weight: f32,
}

/// Process state vector: the runtime's fixed entry-point record, written
/// once at ENTRY processing. 32 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct PsvRecord {
    pub magic: [u8; 8],
    /// Entry neuron address triple.
    pub file_id: u16,
    pub part_id: u16,
    pub _pad0: u32,
    pub offset: u64,
    pub clock: u32,
    pub train: u32,
}

impl PsvRecord {
    pub fn new(file_id: u16, part_id: u16, offset: u64) -> Self {
        Self {
            magic: PSV_MAGIC,
            file_id,
            part_id,
            _pad0: 0,
            offset,
            clock: 0,
            train: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(std::mem::size_of::<NeuronRecord>(), 32);
        assert_eq!(std::mem::size_of::<FaninRecord>(), 16);
        assert_eq!(std::mem::size_of::<PsvRecord>(), 32);
    }

    #[test]
    fn test_neuron_record_roundtrip() {
        let rec = NeuronRecord::new(NeuronType::Add.code(), 1.5);
        let bytes = bytemuck::bytes_of(&rec);
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[0..2], &NEURON_CBID.to_ne_bytes());
        let back: NeuronRecord = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(back, rec);
    }

    #[test]
    fn test_type_keywords() {
        assert_eq!(NeuronType::from_keyword("ADD"), Some(NeuronType::Add));
        assert_eq!(NeuronType::from_keyword("sigmoid"), Some(NeuronType::Sigmoid));
        assert_eq!(NeuronType::from_keyword("Constant"), Some(NeuronType::Constant));
        assert_eq!(NeuronType::from_keyword("bogus"), None);
        // The reserved code-3 slot has no keyword.
        assert_eq!(NeuronType::from_keyword("nop"), None);
        assert_eq!(NeuronType::Sigmoid.code(), 29);
        assert_eq!(NeuronType::Add.code(), 22);
    }

    #[test]
    fn test_psv_magic() {
        let psv = PsvRecord::new(1, 1, 64);
        let bytes = bytemuck::bytes_of(&psv);
        assert_eq!(&bytes[0..8], b"NNETPSV1");
    }
}
