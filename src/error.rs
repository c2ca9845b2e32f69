// src/error.rs
//
// Error taxonomy.
//
// Setup-time errors are terminal for the processor. Quantum errors only
// silence the quantum that raised them.

use thiserror::Error;

use crate::lifecycle::LifecycleState;
use crate::memory::EngineBuffer;
use crate::params::ParamId;
use crate::wavetable::MAX_DIMENSIONS;

/// Error while flattening waveforms into a wavetable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WavetableError {
    #[error("dimension count {0} is outside 1..={max}", max = MAX_DIMENSIONS)]
    InvalidDimensionCount(usize),

    #[error("waveforms must contain at least one sample and each dimension at least one waveform")]
    EmptyShape,

    #[error("base frequency {0} must be finite and positive")]
    InvalidBaseFrequency(f32),

    /// A waveform (or a dimension's waveform list) does not have the expected length.
    #[error("shape mismatch at dimension {dimension}: expected {expected} {what}, found {found}")]
    ShapeMismatch {
        dimension: usize,
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Error while reading or writing engine memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("{buffer} pointer {address} is not 4-byte aligned")]
    MisalignedPointer { buffer: EngineBuffer, address: u32 },

    #[error("{buffer} region of {len} samples at byte {address} lies outside engine memory")]
    OutOfBounds {
        buffer: EngineBuffer,
        address: usize,
        len: usize,
    },
}

/// Fatal error while bringing the compute engine up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineInitError {
    #[error("failed to load compute engine module: {0}")]
    ModuleLoad(String),

    #[error("invalid wavetable: {0}")]
    Wavetable(#[from] WavetableError),

    #[error("{buffer} pointer {address} is not 4-byte aligned")]
    MisalignedPointer { buffer: EngineBuffer, address: u32 },

    #[error("marker value not found at wavetable data address {address} (read {found})")]
    HandshakeFailed { address: u32, found: f32 },

    #[error("{buffer} region of {len} samples at byte {address} lies outside engine memory")]
    OutOfBounds {
        buffer: EngineBuffer,
        address: usize,
        len: usize,
    },

    #[error("setup context exited without publishing an engine")]
    SetupAbandoned,
}

impl From<MemoryError> for EngineInitError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::MisalignedPointer { buffer, address } => {
                EngineInitError::MisalignedPointer { buffer, address }
            }
            MemoryError::OutOfBounds { buffer, address, len } => {
                EngineInitError::OutOfBounds { buffer, address, len }
            }
        }
    }
}

/// Error raised while processing a single quantum.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum QuantumError {
    #[error("automation for `{param}` has {len} values, expected 1 or {frame_size}")]
    MalformedAutomation {
        param: ParamId,
        len: usize,
        frame_size: usize,
    },

    #[error("{buffer} pointer {address} is not 4-byte aligned")]
    MisalignedPointer { buffer: EngineBuffer, address: u32 },

    #[error("{buffer} region of {len} samples at byte {address} lies outside engine memory")]
    OutOfBounds {
        buffer: EngineBuffer,
        address: usize,
        len: usize,
    },
}

impl From<MemoryError> for QuantumError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::MisalignedPointer { buffer, address } => {
                QuantumError::MisalignedPointer { buffer, address }
            }
            MemoryError::OutOfBounds { buffer, address, len } => {
                QuantumError::OutOfBounds { buffer, address, len }
            }
        }
    }
}

/// Setup was requested while the processor had already left `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("setup rejected: processor is already {state}")]
pub struct SetupRejected {
    pub state: LifecycleState,
}
