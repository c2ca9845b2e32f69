// src/engine_handle.rs
//
// Validated view of the compute engine's published buffers.

use log::{debug, info};

use crate::compute::{ComputeEngine, HandleRef, InstanceRef};
use crate::error::{EngineInitError, MemoryError};
use crate::memory::{DATA_TABLE_MARKER, EngineBuffer, Region};
use crate::wavetable::{WavetableDescriptor, WavetableSettings};

/// Owns the compute engine and every address it has published.
///
/// Only constructed through [`EngineHandle::acquire`], so each region
/// held here has passed alignment and bounds validation.
pub struct EngineHandle<E: ComputeEngine> {
    engine: E,
    settings: WavetableSettings,
    frame_size: usize,

    table: InstanceRef,
    sampler: HandleRef,

    data_table: Region,
    mixes: Region,
    frequencies: Region,

    /// Last validated generated-samples block.
    samples: Option<Region>,
}

impl<E: ComputeEngine> EngineHandle<E> {
    /// Create the wavetable inside the engine, hand it the table samples and
    /// validate every buffer address the engine reports.
    ///
    /// Checks run in a fixed order: data-table alignment, marker, mix-buffer
    /// alignment, frequency-buffer alignment. The first failure is returned.
    pub fn acquire(
        mut engine: E,
        descriptor: &WavetableDescriptor,
        frame_size: usize,
    ) -> Result<Self, EngineInitError> {
        let settings = *descriptor.settings();
        settings.validate()?;

        let table = engine.create_wavetable(
            settings.waveforms_per_dimension as u32,
            settings.dimension_count as u32,
            settings.waveform_length as u32,
            settings.base_frequency,
        );

        let data_address = engine.data_table_address(table);
        let data_table = Region::new(
            EngineBuffer::WavetableData,
            data_address,
            settings.table_len(),
            engine.memory().len(),
        )?;

        // The engine pre-writes a marker; seeing it proves the address points
        // at the table we are about to fill.
        let found = data_table.read_first(engine.memory())?;
        if found != DATA_TABLE_MARKER {
            return Err(EngineInitError::HandshakeFailed {
                address: data_address,
                found,
            });
        }
        data_table.write(engine.memory_mut(), descriptor.samples())?;
        debug!(
            "wavetable data written: {} samples at byte {}",
            settings.table_len(),
            data_address
        );

        let sampler = engine.create_sampling_handle(table);

        let mix_address = engine.mix_buffer_address(sampler, frame_size as u32);
        let mixes = Region::new(
            EngineBuffer::Mixes,
            mix_address,
            settings.dimension_count * 2 * frame_size,
            engine.memory().len(),
        )?;

        let frequency_address = engine.frequency_buffer_address(sampler, frame_size as u32);
        let frequencies = Region::new(
            EngineBuffer::Frequencies,
            frequency_address,
            frame_size,
            engine.memory().len(),
        )?;

        info!(
            "engine handle acquired: {} dimensions x {} waveforms x {} samples, base {} Hz",
            settings.dimension_count,
            settings.waveforms_per_dimension,
            settings.waveform_length,
            settings.base_frequency
        );

        Ok(Self {
            engine,
            settings,
            frame_size,
            table,
            sampler,
            data_table,
            mixes,
            frequencies,
            samples: None,
        })
    }

    /// Copy packed mix and frequency blocks into engine memory.
    ///
    /// Audio-thread-safe: no allocation.
    #[inline]
    pub fn write_parameters(&mut self, mixes: &[f32], frequencies: &[f32]) -> Result<(), MemoryError> {
        // Memory may have grown or shrunk since acquisition
        let memory = self.engine.memory_mut();
        self.mixes.write(memory, mixes)?;
        self.frequencies.write(memory, frequencies)
    }

    /// Run the engine for one quantum and copy the generated block into `out`.
    ///
    /// The returned address is re-validated on every call.
    pub fn generate(&mut self, out: &mut [f32]) -> Result<(), MemoryError> {
        let address = self
            .engine
            .generate_samples(self.sampler, self.frame_size as u32);
        let region = Region::new(
            EngineBuffer::GeneratedSamples,
            address,
            self.frame_size,
            self.engine.memory().len(),
        )?;
        self.samples = Some(region);
        region.read(self.engine.memory(), out)
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    #[inline]
    pub fn settings(&self) -> &WavetableSettings {
        &self.settings
    }

    #[inline]
    pub fn table(&self) -> InstanceRef {
        self.table
    }

    #[inline]
    pub fn sampler(&self) -> HandleRef {
        self.sampler
    }

    /// Byte addresses of the data table, mix buffer, frequency buffer and
    /// most recent sample block.
    pub fn addresses(&self) -> [Option<usize>; 4] {
        [
            Some(self.data_table.start.byte_address()),
            Some(self.mixes.start.byte_address()),
            Some(self.frequencies.start.byte_address()),
            self.samples.map(|r| r.start.byte_address()),
        ]
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::FRAME_SIZE;
    use crate::test::ScriptedEngine;

    fn table(dims: usize, len: usize) -> WavetableDescriptor {
        let waveforms: Vec<Vec<Vec<f32>>> = (0..dims)
            .map(|d| (0..2).map(|w| vec![(d * 2 + w) as f32; len]).collect())
            .collect();
        WavetableDescriptor::build(&waveforms, len, 30.0).unwrap()
    }

    #[test]
    fn test_acquire_copies_table_after_marker() {
        let descriptor = table(2, 8);
        let handle = EngineHandle::acquire(ScriptedEngine::new(), &descriptor, FRAME_SIZE).unwrap();

        let engine = handle.engine();
        let mut copied = vec![0.0; descriptor.samples().len()];
        Region::new(
            EngineBuffer::WavetableData,
            engine.data_table,
            copied.len(),
            engine.memory().len(),
        )
        .unwrap()
        .read(engine.memory(), &mut copied)
        .unwrap();
        assert_eq!(copied, descriptor.samples());

        let created = engine.created.unwrap();
        assert_eq!(created, (2, 2, 8, 30.0));
    }

    #[test]
    fn test_misaligned_data_table() {
        let engine = ScriptedEngine::new().with_data_table(6);
        let err = EngineHandle::acquire(engine, &table(1, 4), FRAME_SIZE).err().unwrap();
        assert_eq!(
            err,
            EngineInitError::MisalignedPointer {
                buffer: EngineBuffer::WavetableData,
                address: 6,
            }
        );
    }

    #[test]
    fn test_missing_marker_fails_handshake() {
        let engine = ScriptedEngine::new().without_marker();
        let err = EngineHandle::acquire(engine, &table(1, 4), FRAME_SIZE).err().unwrap();
        assert!(matches!(err, EngineInitError::HandshakeFailed { found, .. } if found == 0.0));
    }

    #[test]
    fn test_misaligned_mix_buffer() {
        let engine = ScriptedEngine::new().with_mixes(6);
        let err = EngineHandle::acquire(engine, &table(1, 4), FRAME_SIZE).err().unwrap();
        assert_eq!(
            err,
            EngineInitError::MisalignedPointer {
                buffer: EngineBuffer::Mixes,
                address: 6,
            }
        );
    }

    #[test]
    fn test_misaligned_frequency_buffer() {
        let engine = ScriptedEngine::new().with_frequencies(6);
        let err = EngineHandle::acquire(engine, &table(1, 4), FRAME_SIZE).err().unwrap();
        assert_eq!(
            err,
            EngineInitError::MisalignedPointer {
                buffer: EngineBuffer::Frequencies,
                address: 6,
            }
        );
    }

    #[test]
    fn test_validation_order_reports_first_failure() {
        // Both the marker and the mix buffer are broken; the marker is checked first
        let engine = ScriptedEngine::new().without_marker().with_mixes(6);
        let err = EngineHandle::acquire(engine, &table(1, 4), FRAME_SIZE).err().unwrap();
        assert!(matches!(err, EngineInitError::HandshakeFailed { .. }));
    }

    #[test]
    fn test_table_past_end_of_memory() {
        let engine = ScriptedEngine::new().with_data_table(32_000);
        let err = EngineHandle::acquire(engine, &table(2, 64), FRAME_SIZE).err().unwrap();
        assert!(matches!(
            err,
            EngineInitError::OutOfBounds { buffer: EngineBuffer::WavetableData, .. }
        ));
    }

    #[test]
    fn test_generate_revalidates_sample_address() {
        let descriptor = table(1, 4);
        let mut handle =
            EngineHandle::acquire(ScriptedEngine::new(), &descriptor, FRAME_SIZE).unwrap();

        let mut out = vec![0.0; FRAME_SIZE];
        handle.generate(&mut out).unwrap();
        assert_eq!(out[5], 5.0);
        assert!(handle.addresses()[3].is_some());

        handle.engine.samples = 6;
        assert_eq!(
            handle.generate(&mut out).unwrap_err(),
            MemoryError::MisalignedPointer {
                buffer: EngineBuffer::GeneratedSamples,
                address: 6,
            }
        );
    }
}
