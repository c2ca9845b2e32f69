// src/wavetable.rs
//
// Wavetable layout.
//
// Flattens per-dimension waveform sets into one contiguous buffer. One
// dimension's full waveform set occupies one contiguous region:
//
//   offset(d, w, s) = d * waveforms_per_dimension * waveform_length
//                   + w * waveform_length
//                   + s

use crate::error::WavetableError;

/// Maximum number of morph dimensions a table can carry.
pub const MAX_DIMENSIONS: usize = 16;

/// Waveforms per dimension: a "from" and a "to" waveform.
pub const WAVEFORMS_PER_DIMENSION: usize = 2;

const DEFAULT_SAMPLE_RATE: f32 = 44_100.0;
const DEFAULT_BASE_FREQUENCY: f32 = 30.0;

/// Shape of a wavetable, as handed to the compute engine at setup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavetableSettings {
    /// Number of dimensions that can be mixed.
    pub dimension_count: usize,
    /// Number of waveforms in each dimension.
    pub waveforms_per_dimension: usize,
    /// Number of `f32` samples in a single waveform period.
    pub waveform_length: usize,
    /// Frequency the stored waveforms were generated at.
    pub base_frequency: f32,
}

impl WavetableSettings {
    pub fn new(
        dimension_count: usize,
        waveforms_per_dimension: usize,
        waveform_length: usize,
        base_frequency: f32,
    ) -> Self {
        Self {
            dimension_count,
            waveforms_per_dimension,
            waveform_length,
            base_frequency,
        }
    }

    /// Samples occupied by one dimension's waveform set.
    #[inline]
    pub fn samples_per_dimension(&self) -> usize {
        self.waveforms_per_dimension * self.waveform_length
    }

    /// Total number of samples in the flattened table.
    #[inline]
    pub fn table_len(&self) -> usize {
        self.dimension_count * self.samples_per_dimension()
    }

    /// Offset of sample `s` of waveform `w` in dimension `d`.
    #[inline]
    pub fn offset(&self, dimension: usize, waveform: usize, sample: usize) -> usize {
        dimension * self.samples_per_dimension() + waveform * self.waveform_length + sample
    }

    /// Reject shapes the engine contract cannot describe.
    pub fn validate(&self) -> Result<(), WavetableError> {
        if self.dimension_count == 0 || self.dimension_count > MAX_DIMENSIONS {
            return Err(WavetableError::InvalidDimensionCount(self.dimension_count));
        }
        if self.waveforms_per_dimension == 0 || self.waveform_length == 0 {
            return Err(WavetableError::EmptyShape);
        }
        if !self.base_frequency.is_finite() || self.base_frequency <= 0.0 {
            return Err(WavetableError::InvalidBaseFrequency(self.base_frequency));
        }
        Ok(())
    }
}

impl Default for WavetableSettings {
    /// Two dimensions of two waveforms, one 30 Hz period at 44.1 kHz each.
    fn default() -> Self {
        Self {
            dimension_count: 2,
            waveforms_per_dimension: WAVEFORMS_PER_DIMENSION,
            waveform_length: (DEFAULT_SAMPLE_RATE / DEFAULT_BASE_FREQUENCY) as usize,
            base_frequency: DEFAULT_BASE_FREQUENCY,
        }
    }
}

/// An immutable, flattened wavetable.
#[derive(Debug, Clone, PartialEq)]
pub struct WavetableDescriptor {
    settings: WavetableSettings,
    samples: Vec<f32>,
}

impl WavetableDescriptor {
    /// Flatten `dimensions[d][w]` waveforms into a single table.
    ///
    /// Every dimension must carry the same number of waveforms and every
    /// waveform must be exactly `waveform_length` samples long. On error
    /// nothing is produced.
    pub fn build<D, W>(
        dimensions: &[D],
        waveform_length: usize,
        base_frequency: f32,
    ) -> Result<Self, WavetableError>
    where
        D: AsRef<[W]>,
        W: AsRef<[f32]>,
    {
        let waveforms_per_dimension = dimensions.first().map_or(0, |d| d.as_ref().len());
        let settings = WavetableSettings::new(
            dimensions.len(),
            waveforms_per_dimension,
            waveform_length,
            base_frequency,
        );
        settings.validate()?;

        // Check the whole shape before allocating anything
        for (dimension, waveforms) in dimensions.iter().enumerate() {
            let waveforms = waveforms.as_ref();
            if waveforms.len() != waveforms_per_dimension {
                return Err(WavetableError::ShapeMismatch {
                    dimension,
                    what: "waveforms",
                    expected: waveforms_per_dimension,
                    found: waveforms.len(),
                });
            }
            for waveform in waveforms {
                let found = waveform.as_ref().len();
                if found != waveform_length {
                    return Err(WavetableError::ShapeMismatch {
                        dimension,
                        what: "samples per waveform",
                        expected: waveform_length,
                        found,
                    });
                }
            }
        }

        let mut samples = Vec::with_capacity(settings.table_len());
        for waveforms in dimensions {
            for waveform in waveforms.as_ref() {
                samples.extend_from_slice(waveform.as_ref());
            }
        }
        debug_assert_eq!(samples.len(), settings.table_len());

        Ok(Self { settings, samples })
    }

    /// Wrap an already flattened buffer, checking it matches `settings`.
    pub fn from_parts(settings: WavetableSettings, samples: Vec<f32>) -> Result<Self, WavetableError> {
        settings.validate()?;
        if samples.len() != settings.table_len() {
            return Err(WavetableError::ShapeMismatch {
                dimension: 0,
                what: "table samples",
                expected: settings.table_len(),
                found: samples.len(),
            });
        }
        Ok(Self { settings, samples })
    }

    #[inline]
    pub fn settings(&self) -> &WavetableSettings {
        &self.settings
    }

    #[inline]
    pub fn dimension_count(&self) -> usize {
        self.settings.dimension_count
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample `s` of waveform `w` in dimension `d`.
    #[inline]
    pub fn sample(&self, dimension: usize, waveform: usize, sample: usize) -> Option<f32> {
        if dimension >= self.settings.dimension_count
            || waveform >= self.settings.waveforms_per_dimension
            || sample >= self.settings.waveform_length
        {
            return None;
        }
        self.samples
            .get(self.settings.offset(dimension, waveform, sample))
            .copied()
    }
}
