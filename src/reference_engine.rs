// src/reference_engine.rs
//
// In-process compute engine implementing the `ComputeEngine` contract.
//
// Used by the sanity binary, the host bindings and the tests so there is
// always something to drive. It keeps the same linear-memory discipline as
// an external module: every buffer lives in one growable byte region and is
// only reachable through the byte addresses handed out.

use log::debug;

use crate::compute::{ComputeEngine, EngineLoader, HandleRef, InstanceRef};
use crate::error::EngineInitError;
use crate::memory::{BYTES_PER_F32, DATA_TABLE_MARKER, EngineBuffer, Region};
use crate::wavetable::WavetableSettings;

/// Bytes kept free at the start of memory so no buffer lives at address 0.
const RESERVED_BYTES: usize = 8;

/// Aligned address that is never inside memory, reported when a request
/// cannot be served so the caller's bounds check fails.
const UNMAPPED: u32 = u32::MAX & !(BYTES_PER_F32 - 1);

struct Table {
    settings: WavetableSettings,
    data: u32,
}

struct Sampler {
    table: usize,
    /// Table samples, cached when the handle is created
    samples: Vec<f32>,
    /// Horizontal read position within a waveform
    sample_ix: f32,

    mixes: Option<(u32, usize)>,
    frequencies: Option<(u32, usize)>,
    output: Option<(u32, usize)>,

    mix_scratch: Vec<f32>,
    frequency_scratch: Vec<f32>,
    output_scratch: Vec<f32>,
    mixes_for_sample: Vec<f32>,
}

/// Wavetable engine with its own linear memory.
pub struct ReferenceEngine {
    memory: Vec<u8>,
    tables: Vec<Table>,
    samplers: Vec<Sampler>,
}

impl ReferenceEngine {
    pub fn new() -> Self {
        Self {
            memory: vec![0; RESERVED_BYTES],
            tables: Vec::new(),
            samplers: Vec::new(),
        }
    }

    /// Bump-allocate `len` floats, returning a 4-byte aligned byte address.
    fn alloc(&mut self, len: usize) -> u32 {
        let address = self.memory.len();
        debug_assert_eq!(address % BYTES_PER_F32 as usize, 0);
        self.memory
            .resize(address + len.max(1) * BYTES_PER_F32 as usize, 0);
        address as u32
    }

    fn fill(&mut self, address: u32, len: usize, value: f32) {
        let begin = address as usize;
        let end = begin + len * BYTES_PER_F32 as usize;
        for chunk in self.memory[begin..end].chunks_exact_mut(4) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Reuse `slot` if it is large enough, otherwise allocate a new buffer.
    fn ensure_buffer(&mut self, slot: Option<(u32, usize)>, len: usize) -> (u32, usize) {
        match slot {
            Some((address, capacity)) if capacity >= len => (address, capacity),
            _ => (self.alloc(len), len),
        }
    }

    fn sampler_mut(&mut self, handle: HandleRef) -> Option<&mut Sampler> {
        self.samplers.get_mut(handle.0 as usize)
    }
}

impl Default for ReferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn mix(factor: f32, low: f32, high: f32) -> f32 {
    (1.0 - factor) * low + factor * high
}

/// Linear interpolation between neighbouring samples of one waveform,
/// wrapping at the end of the period.
#[inline]
fn sample_waveform(
    samples: &[f32],
    settings: &WavetableSettings,
    dimension: usize,
    waveform: usize,
    sample_ix: f32,
) -> f32 {
    let len = settings.waveform_length;
    let base = settings.offset(dimension, waveform, 0);
    let low = sample_ix.floor() as usize % len;
    let high = (low + 1) % len;
    mix(sample_ix.fract(), samples[base + low], samples[base + high])
}

/// Interpolate between the two waveforms surrounding `waveform_pos`.
#[inline]
fn sample_dimension(
    samples: &[f32],
    settings: &WavetableSettings,
    dimension: usize,
    waveform_pos: f32,
    sample_ix: f32,
) -> f32 {
    let last = settings.waveforms_per_dimension - 1;
    let low = (waveform_pos.floor() as usize).min(last);
    let high = (waveform_pos.ceil() as usize).min(last);
    let a = sample_waveform(samples, settings, dimension, low, sample_ix);
    let b = sample_waveform(samples, settings, dimension, high, sample_ix);
    mix(waveform_pos.fract(), a, b)
}

/// Fold every dimension into one output sample.
///
/// `mixes` holds `[intra, inter]` pairs per dimension.
fn sample_table(samples: &[f32], settings: &WavetableSettings, sample_ix: f32, mixes: &[f32]) -> f32 {
    let span = (settings.waveforms_per_dimension - 1) as f32;
    let mut sample = sample_dimension(samples, settings, 0, mixes[0] * span, sample_ix);
    for dimension in 1..settings.dimension_count {
        let for_dimension =
            sample_dimension(samples, settings, dimension, mixes[dimension * 2] * span, sample_ix);
        sample = mix(mixes[dimension * 2 + 1], sample, for_dimension);
    }
    sample
}

impl ComputeEngine for ReferenceEngine {
    fn create_wavetable(
        &mut self,
        waveforms_per_dimension: u32,
        dimension_count: u32,
        waveform_length: u32,
        base_frequency: f32,
    ) -> InstanceRef {
        let settings = WavetableSettings::new(
            dimension_count as usize,
            waveforms_per_dimension as usize,
            waveform_length as usize,
            base_frequency,
        );
        let len = settings.table_len();
        let data = self.alloc(len);
        self.fill(data, len, DATA_TABLE_MARKER);

        self.tables.push(Table { settings, data });
        InstanceRef((self.tables.len() - 1) as u32)
    }

    fn data_table_address(&mut self, table: InstanceRef) -> u32 {
        self.tables.get(table.0 as usize).map_or(UNMAPPED, |t| t.data)
    }

    fn create_sampling_handle(&mut self, table: InstanceRef) -> HandleRef {
        let ix = table.0 as usize;
        let (settings, data) = match self.tables.get(ix) {
            Some(t) => (t.settings, t.data),
            None => (WavetableSettings::new(0, 0, 0, 1.0), 0),
        };

        let mut samples = vec![0.0; settings.table_len()];
        if let Ok(region) = Region::new(
            EngineBuffer::WavetableData,
            data,
            samples.len(),
            self.memory.len(),
        ) {
            // Bounds were just checked
            let _ = region.read(&self.memory, &mut samples);
        }

        self.samplers.push(Sampler {
            table: ix,
            samples,
            sample_ix: 0.0,
            mixes: None,
            frequencies: None,
            output: None,
            mix_scratch: Vec::new(),
            frequency_scratch: Vec::new(),
            output_scratch: Vec::new(),
            mixes_for_sample: vec![0.0; settings.dimension_count * 2],
        });
        HandleRef((self.samplers.len() - 1) as u32)
    }

    fn mix_buffer_address(&mut self, handle: HandleRef, frame_size: u32) -> u32 {
        let Some(table) = self.sampler_mut(handle).map(|s| s.table) else {
            return UNMAPPED;
        };
        let Some(dimension_count) = self.tables.get(table).map(|t| t.settings.dimension_count)
        else {
            return UNMAPPED;
        };
        let len = dimension_count * 2 * frame_size as usize;

        let current = self.samplers[handle.0 as usize].mixes;
        let buffer = self.ensure_buffer(current, len);
        let output = self.samplers[handle.0 as usize].output;
        let output = self.ensure_buffer(output, frame_size as usize);

        let sampler = &mut self.samplers[handle.0 as usize];
        sampler.mixes = Some(buffer);
        sampler.output = Some(output);
        sampler.mix_scratch.resize(len, 0.0);
        sampler.output_scratch.resize(frame_size as usize, 0.0);
        buffer.0
    }

    fn frequency_buffer_address(&mut self, handle: HandleRef, frame_size: u32) -> u32 {
        let Some(current) = self.sampler_mut(handle).map(|s| s.frequencies) else {
            return UNMAPPED;
        };
        let buffer = self.ensure_buffer(current, frame_size as usize);
        let start = buffer.0;

        // Default playback frequency until the host writes its own
        let fresh = current.map_or(true, |(address, _)| address != start);
        if fresh {
            self.fill(start, frame_size as usize, 440.0);
        }

        let sampler = &mut self.samplers[handle.0 as usize];
        sampler.frequencies = Some(buffer);
        sampler.frequency_scratch.resize(frame_size as usize, 0.0);
        start
    }

    fn generate_samples(&mut self, handle: HandleRef, frame_size: u32) -> u32 {
        let frame_size = frame_size as usize;
        let ix = handle.0 as usize;
        let Some(sampler) = self.samplers.get(ix) else {
            return UNMAPPED;
        };

        // Grow lazily if the host asks for a bigger block than it set up for
        if sampler.output_scratch.len() < frame_size
            || sampler.frequency_scratch.len() < frame_size
        {
            debug!("reference engine: growing buffers to {} frames", frame_size);
            self.mix_buffer_address(handle, frame_size as u32);
            self.frequency_buffer_address(handle, frame_size as u32);
        }

        let Some(settings) = self.tables.get(self.samplers[ix].table).map(|t| t.settings) else {
            return UNMAPPED;
        };
        let memory = &self.memory;
        let sampler = &mut self.samplers[ix];

        let mix_len = settings.dimension_count * 2 * frame_size;
        if sampler.mix_scratch.len() < mix_len
            || sampler.frequency_scratch.len() < frame_size
            || sampler.output_scratch.len() < frame_size
        {
            return UNMAPPED;
        }

        let (Some((mix_address, _)), Some((freq_address, _)), Some((out_address, _))) =
            (sampler.mixes, sampler.frequencies, sampler.output)
        else {
            return UNMAPPED;
        };

        let inputs = Region::new(EngineBuffer::Mixes, mix_address, mix_len, memory.len())
            .and_then(|r| r.read(memory, &mut sampler.mix_scratch[..mix_len]))
            .and_then(|_| {
                Region::new(EngineBuffer::Frequencies, freq_address, frame_size, memory.len())
            })
            .and_then(|r| r.read(memory, &mut sampler.frequency_scratch[..frame_size]));
        if inputs.is_err() {
            return UNMAPPED;
        }

        let period = settings.waveform_length as f32;
        for i in 0..frame_size {
            for d in 0..settings.dimension_count {
                let base = d * 2 * frame_size;
                sampler.mixes_for_sample[d * 2] = sampler.mix_scratch[base + i];
                sampler.mixes_for_sample[d * 2 + 1] = sampler.mix_scratch[base + frame_size + i];
            }

            sampler.output_scratch[i] = sample_table(
                &sampler.samples,
                &settings,
                sampler.sample_ix,
                &sampler.mixes_for_sample,
            );

            let next = sampler.sample_ix + sampler.frequency_scratch[i] / settings.base_frequency;
            sampler.sample_ix = if !next.is_finite() {
                0.0
            } else if next >= period || next < 0.0 {
                next.rem_euclid(period)
            } else {
                next
            };
        }

        if let Ok(region) = Region::new(
            EngineBuffer::GeneratedSamples,
            out_address,
            frame_size,
            self.memory.len(),
        ) {
            let _ = region.write(&mut self.memory, &self.samplers[ix].output_scratch[..frame_size]);
        }
        out_address
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }
}

/// Loader for [`ReferenceEngine`].
///
/// The engine is built in, so the module bytes are not interpreted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceLoader;

impl EngineLoader for ReferenceLoader {
    type Engine = ReferenceEngine;

    fn load(&self, module: &[u8]) -> Result<Self::Engine, EngineInitError> {
        debug!("reference engine ignoring {} module bytes", module.len());
        Ok(ReferenceEngine::new())
    }
}
