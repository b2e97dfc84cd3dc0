use bitvec::prelude::*;
use thiserror::Error;

/// Storage used once a bitfield is neither all clear nor all set
pub type BitVector = BitVec<u8, Msb0>;

/// Errors while loading a bitfield out of its serialized form
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitfieldError {
    /// The byte string doesn't have exactly one bit per position, rounded up to whole bytes
    #[error("bitfield of {bits} bits needs {expected} bytes, got {actual}")]
    WrongLength { bits: usize, expected: usize, actual: usize },

    /// Some of the padding bits after the last position are set
    #[error("spare bits at the end of the bitfield are set")]
    SpareBitsSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Bits {
    HasNone,
    HasAll,
    /// Never holds zero or `len` set bits, those collapse back into the sentinels
    Materialized { bits: BitVector, ones: usize },
}

/// A set over a fixed universe of `len` positions.
///
/// A bitfield with nothing set or everything set doesn't allocate, which is what a freshly added
/// or a fully seeded torrent looks like for most of its lifetime. Positions are only materialized
/// into a [BitVector] once the bitfield sits somewhere in between.
///
/// Every index passed in is expected to be below [Bitfield::len], anything else panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitfield {
    len: usize,
    bits: Bits,
}

impl Bitfield {
    /// Creates a bitfield of `len` positions with nothing set
    pub fn new(len: usize) -> Self {
        Self { len, bits: Bits::HasNone }
    }

    /// Creates a bitfield of `len` positions with everything set
    pub fn with_all(len: usize) -> Self {
        let mut bitfield = Self::new(len);
        bitfield.set_has_all();
        bitfield
    }

    /// Creates a bitfield with one position per flag
    pub fn from_flags(flags: &[bool]) -> Self {
        let mut bitfield = Self::new(flags.len());
        bitfield.set_from_flags(flags);
        bitfield
    }

    /// Loads a bitfield of `len` positions out of its compact form, the most significant bit of
    /// the first byte being position 0
    pub fn from_bytes(bytes: &[u8], len: usize) -> Result<Self, BitfieldError> {
        let expected = byte_count(len);
        if bytes.len() != expected {
            return Err(BitfieldError::WrongLength {
                bits: len,
                expected,
                actual: bytes.len(),
            });
        }
        if let Some(last) = bytes.last() {
            if last & !last_byte_mask(len) != 0 {
                return Err(BitfieldError::SpareBitsSet);
            }
        }

        let mut bits = BitVector::from_slice(bytes);
        bits.truncate(len);
        let ones = bits.count_ones();
        let mut bitfield = Self {
            len,
            bits: Bits::Materialized { bits, ones },
        };
        bitfield.normalize();
        Ok(bitfield)
    }

    /// Total no of positions
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether every position is set, an empty universe never has it all
    pub fn has_all(&self) -> bool {
        matches!(self.bits, Bits::HasAll)
    }

    /// Whether no position is set
    pub fn has_none(&self) -> bool {
        matches!(self.bits, Bits::HasNone)
    }

    /// No of positions that are set
    pub fn count(&self) -> usize {
        match &self.bits {
            Bits::HasNone => 0,
            Bits::HasAll => self.len,
            Bits::Materialized { ones, .. } => *ones,
        }
    }

    /// No of positions set within `lo..hi`
    pub fn count_range(&self, lo: usize, hi: usize) -> usize {
        self.check_range(lo, hi);
        match &self.bits {
            Bits::HasNone => 0,
            Bits::HasAll => hi - lo,
            Bits::Materialized { bits, .. } => bits[lo..hi].count_ones(),
        }
    }

    pub fn get(&self, index: usize) -> bool {
        self.check_index(index);
        match &self.bits {
            Bits::HasNone => false,
            Bits::HasAll => true,
            Bits::Materialized { bits, .. } => bits[index],
        }
    }

    pub fn set(&mut self, index: usize) {
        self.check_index(index);
        if self.has_all() {
            return;
        }
        let (bits, ones) = self.materialize();
        if !bits[index] {
            bits.set(index, true);
            *ones += 1;
        }
        self.normalize();
    }

    /// Sets every position within `lo..hi`
    pub fn set_range(&mut self, lo: usize, hi: usize) {
        self.check_range(lo, hi);
        if lo == hi || self.has_all() {
            return;
        }
        let (bits, ones) = self.materialize();
        let already = bits[lo..hi].count_ones();
        bits[lo..hi].fill(true);
        *ones += (hi - lo) - already;
        self.normalize();
    }

    /// Clears every position within `lo..hi`
    pub fn clear_range(&mut self, lo: usize, hi: usize) {
        self.check_range(lo, hi);
        if lo == hi || self.has_none() {
            return;
        }
        let (bits, ones) = self.materialize();
        let cleared = bits[lo..hi].count_ones();
        bits[lo..hi].fill(false);
        *ones -= cleared;
        self.normalize();
    }

    pub fn set_has_all(&mut self) {
        self.bits = if self.len == 0 { Bits::HasNone } else { Bits::HasAll };
    }

    pub fn set_has_none(&mut self) {
        self.bits = Bits::HasNone;
    }

    /// Copies the positions of `other`, both must be over the same universe
    pub fn set_from_bitfield(&mut self, other: &Bitfield) {
        assert_eq!(
            self.len, other.len,
            "bitfield of {} bits can't be loaded from one of {} bits",
            self.len, other.len
        );
        self.bits = other.bits.clone();
    }

    /// Sets position `i` iff `flags[i]` is true, there has to be exactly one flag per position
    pub fn set_from_flags(&mut self, flags: &[bool]) {
        assert_eq!(
            self.len,
            flags.len(),
            "bitfield of {} bits can't be loaded from {} flags",
            self.len,
            flags.len()
        );
        let bits: BitVector = flags.iter().copied().collect();
        let ones = bits.count_ones();
        self.bits = Bits::Materialized { bits, ones };
        self.normalize();
    }

    /// The compact form of the bitfield, position 0 being the most significant bit of the first
    /// byte and the spare bits of the last byte left clear
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = match &self.bits {
            Bits::HasNone => vec![0; byte_count(self.len)],
            Bits::HasAll => vec![0xff; byte_count(self.len)],
            Bits::Materialized { bits, .. } => bits.as_raw_slice().to_vec(),
        };
        if let Some(last) = bytes.last_mut() {
            *last &= last_byte_mask(self.len);
        }
        bytes
    }

    fn materialize(&mut self) -> (&mut BitVector, &mut usize) {
        let len = self.len;
        match self.bits {
            Bits::HasNone => {
                self.bits = Bits::Materialized {
                    bits: BitVector::repeat(false, len),
                    ones: 0,
                }
            }
            Bits::HasAll => {
                self.bits = Bits::Materialized {
                    bits: BitVector::repeat(true, len),
                    ones: len,
                }
            }
            Bits::Materialized { .. } => {}
        }
        match &mut self.bits {
            Bits::Materialized { bits, ones } => (bits, ones),
            _ => unreachable!("bitfield was just materialized"),
        }
    }

    fn normalize(&mut self) {
        if let Bits::Materialized { ones, .. } = self.bits {
            if ones == 0 {
                self.bits = Bits::HasNone;
            } else if ones == self.len {
                self.bits = Bits::HasAll;
            }
        }
    }

    fn check_index(&self, index: usize) {
        assert!(index < self.len, "bit {} out of range for bitfield of {} bits", index, self.len);
    }

    fn check_range(&self, lo: usize, hi: usize) {
        assert!(
            lo <= hi && hi <= self.len,
            "range {}..{} out of range for bitfield of {} bits",
            lo,
            hi,
            self.len
        );
    }
}

fn byte_count(len: usize) -> usize {
    (len + 7) / 8
}

/// Mask of the bits of the last byte that hold positions
fn last_byte_mask(len: usize) -> u8 {
    match len % 8 {
        0 => 0xff,
        used => 0xff << (8 - used),
    }
}
