// src/compute.rs
//
// Contract with the external compute engine.
//
// The engine owns one flat linear memory. Every address it hands back is a
// byte offset into that memory; samples are little-endian `f32`.

use crate::error::EngineInitError;

/// Opaque reference to a wavetable instance inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceRef(pub u32);

/// Opaque reference to a sampling handle inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRef(pub u32);

/// Capability interface of the sample-generation engine.
///
/// Implementations are driven from the setup context first and then
/// exclusively from the audio context, never both at once.
pub trait ComputeEngine: Send {
    /// Allocate a wavetable with the given shape.
    fn create_wavetable(
        &mut self,
        waveforms_per_dimension: u32,
        dimension_count: u32,
        waveform_length: u32,
        base_frequency: f32,
    ) -> InstanceRef;

    /// Byte address of the wavetable's sample storage.
    fn data_table_address(&mut self, table: InstanceRef) -> u32;

    /// Create a sampling handle over a populated wavetable.
    fn create_sampling_handle(&mut self, table: InstanceRef) -> HandleRef;

    /// Byte address of the per-sample mix buffer
    /// (`dimension_count * 2 * frame_size` floats).
    fn mix_buffer_address(&mut self, handle: HandleRef, frame_size: u32) -> u32;

    /// Byte address of the per-sample frequency buffer (`frame_size` floats).
    fn frequency_buffer_address(&mut self, handle: HandleRef, frame_size: u32) -> u32;

    /// Generate `frame_size` samples and return the byte address of the block.
    ///
    /// Called from the audio thread.
    fn generate_samples(&mut self, handle: HandleRef, frame_size: u32) -> u32;

    /// The engine's linear memory.
    fn memory(&self) -> &[u8];

    fn memory_mut(&mut self) -> &mut [u8];
}

/// Turns engine module bytes into a running engine.
///
/// Runs on the setup context only.
pub trait EngineLoader {
    type Engine: ComputeEngine + 'static;

    fn load(&self, module: &[u8]) -> Result<Self::Engine, EngineInitError>;
}
