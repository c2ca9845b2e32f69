// src/memory.rs
//
// Typed access to the compute engine's linear memory.
//
// The engine reports byte addresses into one flat little-endian region.
// Everything here turns those raw addresses into checked `f32` offsets
// and copies blocks in and out without ever panicking on a bad address.

use std::fmt;

use crate::error::MemoryError;

/// Width of one engine sample in bytes.
pub const BYTES_PER_F32: u32 = 4;

/// Value the engine pre-writes at the start of a fresh data table.
pub const DATA_TABLE_MARKER: f32 = -1.0;

/// The engine-owned regions this crate reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineBuffer {
    WavetableData,
    Mixes,
    Frequencies,
    GeneratedSamples,
}

impl fmt::Display for EngineBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineBuffer::WavetableData => write!(f, "wavetable data"),
            EngineBuffer::Mixes => write!(f, "mix buffer"),
            EngineBuffer::Frequencies => write!(f, "frequency buffer"),
            EngineBuffer::GeneratedSamples => write!(f, "generated samples"),
        }
    }
}

/// A validated, 4-byte aligned position in engine memory, in `f32` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct F32Offset(usize);

impl F32Offset {
    /// Convert an engine byte address, rejecting anything not `f32` aligned.
    #[inline]
    pub fn from_byte_address(address: u32, buffer: EngineBuffer) -> Result<Self, MemoryError> {
        if address % BYTES_PER_F32 != 0 {
            return Err(MemoryError::MisalignedPointer { buffer, address });
        }
        Ok(Self((address / BYTES_PER_F32) as usize))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0
    }

    #[inline]
    pub fn byte_address(self) -> usize {
        self.0 * BYTES_PER_F32 as usize
    }
}

/// A checked region: `len` floats starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub buffer: EngineBuffer,
    pub start: F32Offset,
    pub len: usize,
}

impl Region {
    /// Validate an address and make sure `len` floats fit inside `memory_len` bytes.
    pub fn new(
        buffer: EngineBuffer,
        address: u32,
        len: usize,
        memory_len: usize,
    ) -> Result<Self, MemoryError> {
        let start = F32Offset::from_byte_address(address, buffer)?;
        let region = Self { buffer, start, len };
        region.check_bounds(memory_len)?;
        Ok(region)
    }

    /// Byte range covered by this region, if it fits inside `memory_len` bytes.
    #[inline]
    fn byte_range(&self, memory_len: usize) -> Result<(usize, usize), MemoryError> {
        let begin = self.start.byte_address();
        let end = self
            .len
            .checked_mul(BYTES_PER_F32 as usize)
            .and_then(|bytes| begin.checked_add(bytes));
        match end {
            Some(end) if end <= memory_len => Ok((begin, end)),
            _ => Err(MemoryError::OutOfBounds {
                buffer: self.buffer,
                address: begin,
                len: self.len,
            }),
        }
    }

    #[inline]
    pub fn check_bounds(&self, memory_len: usize) -> Result<(), MemoryError> {
        self.byte_range(memory_len).map(|_| ())
    }

    /// Read the first float of the region.
    pub fn read_first(&self, memory: &[u8]) -> Result<f32, MemoryError> {
        let first = Region { len: 1, ..*self };
        let (begin, _) = first.byte_range(memory.len())?;
        Ok(f32_at(memory, begin))
    }

    /// Copy `values` into the region. `values` may be shorter than the region.
    pub fn write(&self, memory: &mut [u8], values: &[f32]) -> Result<(), MemoryError> {
        let target = Region { len: values.len().min(self.len), ..*self };
        let (begin, end) = target.byte_range(memory.len())?;
        for (chunk, value) in memory[begin..end].chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    /// Copy the region out into `out`. `out` may be shorter than the region.
    pub fn read(&self, memory: &[u8], out: &mut [f32]) -> Result<(), MemoryError> {
        let source = Region { len: out.len().min(self.len), ..*self };
        let (begin, end) = source.byte_range(memory.len())?;
        for (value, chunk) in out.iter_mut().zip(memory[begin..end].chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(())
    }
}

#[inline]
fn f32_at(memory: &[u8], byte: usize) -> f32 {
    f32::from_le_bytes([memory[byte], memory[byte + 1], memory[byte + 2], memory[byte + 3]])
}
