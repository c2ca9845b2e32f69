// src/marshal.rs
//
// Packs automation curves into the engine's fixed per-quantum layout.
//
// Mix buffer layout (floats), for each dimension `d`:
//
//   [d * frame * 2          .. d * frame * 2 + frame)      intra-dimensional mix
//   [d * frame * 2 + frame  .. (d + 1) * frame * 2)        inter-dimensional mix
//
// Frequency buffer: `frame` floats.

use crate::automation::{AutomationCurve, AutomationFrame};
use crate::compute::ComputeEngine;
use crate::engine_handle::EngineHandle;
use crate::error::QuantumError;
use crate::params::ParamId;

/// Turns an [`AutomationFrame`] into the engine's mix and frequency blocks.
///
/// Scratch buffers are sized once at construction; `pack` never allocates.
pub struct FrameMarshaler {
    dimension_count: usize,
    frame_size: usize,
    mixes: Vec<f32>,
    frequencies: Vec<f32>,
}

impl FrameMarshaler {
    pub fn new(dimension_count: usize, frame_size: usize) -> Self {
        Self {
            dimension_count,
            frame_size,
            mixes: vec![0.0; dimension_count * 2 * frame_size],
            frequencies: vec![0.0; frame_size],
        }
    }

    /// Validate every curve the quantum will read.
    ///
    /// Mix curves may be any length in `1..=frame_size` (hold policy). The
    /// frequency curve must be exactly 1 or `frame_size` long.
    fn validate(&self, frame: &AutomationFrame) -> Result<(), QuantumError> {
        for dimension in 0..self.dimension_count {
            let intra = ParamId::IntraMix(dimension as u8);
            self.check_mix(intra, frame.curve(intra))?;
            if let Some(inter) = ParamId::inter_mix_into(dimension) {
                self.check_mix(inter, frame.curve(inter))?;
            }
        }

        let frequency = frame.curve(ParamId::Frequency);
        if frequency.is_truncated()
            || (frequency.len() != 1 && frequency.len() != self.frame_size)
        {
            return Err(self.malformed(ParamId::Frequency, frequency));
        }
        Ok(())
    }

    #[inline]
    fn check_mix(&self, id: ParamId, curve: AutomationCurve) -> Result<(), QuantumError> {
        if curve.is_empty() || curve.is_truncated() || curve.len() > self.frame_size {
            return Err(self.malformed(id, curve));
        }
        Ok(())
    }

    #[inline]
    fn malformed(&self, param: ParamId, curve: AutomationCurve) -> QuantumError {
        QuantumError::MalformedAutomation {
            param,
            len: curve.len(),
            frame_size: self.frame_size,
        }
    }

    /// Fill the scratch blocks from `frame`.
    ///
    /// On error the scratch blocks are left untouched.
    pub fn pack(&mut self, frame: &AutomationFrame) -> Result<(), QuantumError> {
        self.validate(frame)?;

        let n = self.frame_size;
        for dimension in 0..self.dimension_count {
            let intra = frame.curve(ParamId::IntraMix(dimension as u8));
            let inter = ParamId::inter_mix_into(dimension).map(|id| frame.curve(id));

            let base = dimension * n * 2;
            let (intra_block, inter_block) = self.mixes[base..base + n * 2].split_at_mut(n);

            for (i, slot) in intra_block.iter_mut().enumerate() {
                *slot = clamp_mix(intra.value_at(i));
            }
            match inter {
                Some(inter) => {
                    for (i, slot) in inter_block.iter_mut().enumerate() {
                        *slot = clamp_mix(inter.value_at(i));
                    }
                }
                // The first dimension has nothing to cross-fade from
                None => inter_block.fill(0.0),
            }
        }

        let frequency = frame.curve(ParamId::Frequency);
        if frequency.len() == 1 {
            self.frequencies.fill(frequency.value_at(0));
        } else {
            self.frequencies.copy_from_slice(frequency.values());
        }
        Ok(())
    }

    /// Pack `frame` and write the result into engine memory.
    pub fn pack_into<E: ComputeEngine>(
        &mut self,
        frame: &AutomationFrame,
        handle: &mut EngineHandle<E>,
    ) -> Result<(), QuantumError> {
        self.pack(frame)?;
        handle.write_parameters(&self.mixes, &self.frequencies)?;
        Ok(())
    }

    #[inline]
    pub fn mixes(&self) -> &[f32] {
        &self.mixes
    }

    #[inline]
    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}

/// Clamp a mix weight to [0, 1]; NaN becomes 0.
#[inline]
fn clamp_mix(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::FRAME_SIZE;

    fn intra(marshaler: &FrameMarshaler, dimension: usize) -> &[f32] {
        let base = dimension * FRAME_SIZE * 2;
        &marshaler.mixes()[base..base + FRAME_SIZE]
    }

    fn inter(marshaler: &FrameMarshaler, dimension: usize) -> &[f32] {
        let base = dimension * FRAME_SIZE * 2 + FRAME_SIZE;
        &marshaler.mixes()[base..base + FRAME_SIZE]
    }

    #[test]
    fn test_single_value_is_held_across_frame() {
        let mut marshaler = FrameMarshaler::new(1, FRAME_SIZE);
        let values = [0.7];
        let frame = AutomationFrame::new().with(ParamId::IntraMix(0), &values);
        marshaler.pack(&frame).unwrap();

        assert!(intra(&marshaler, 0).iter().all(|&v| v == 0.7));
    }

    #[test]
    fn test_full_curve_copied_elementwise() {
        let mut marshaler = FrameMarshaler::new(1, FRAME_SIZE);
        let values: Vec<f32> = (0..FRAME_SIZE).map(|i| i as f32 / FRAME_SIZE as f32).collect();
        let frame = AutomationFrame::new().with(ParamId::IntraMix(0), &values);
        marshaler.pack(&frame).unwrap();

        assert_eq!(intra(&marshaler, 0), values.as_slice());
    }

    #[test]
    fn test_short_curve_holds_last_value() {
        let mut marshaler = FrameMarshaler::new(1, FRAME_SIZE);
        let values = [0.0, 0.1, 0.2, 0.3, 0.4];
        let frame = AutomationFrame::new().with(ParamId::IntraMix(0), &values);
        marshaler.pack(&frame).unwrap();

        let packed = intra(&marshaler, 0);
        assert_eq!(&packed[..5], &values);
        assert!(packed[5..].iter().all(|&v| v == 0.4));
        assert_eq!(packed[5..].len(), 123);
    }

    #[test]
    fn test_hold_policy_indices_unclamped() {
        // Index clamp on its own, independent of value clamping
        let values = [0.0, 1.0, 2.0, 3.0, 4.0];
        let curve = AutomationCurve::new(&values);
        let held: Vec<f32> = (0..FRAME_SIZE).map(|i| curve.value_at(i)).collect();
        assert_eq!(&held[..5], &values);
        assert_eq!(held[5..].len(), 123);
        assert!(held[5..].iter().all(|&v| v == 4.0));
    }

    #[test]
    fn test_mix_values_clamped() {
        let mut marshaler = FrameMarshaler::new(2, FRAME_SIZE);
        let low = [-0.3];
        let high = [1.8];
        let frame = AutomationFrame::new()
            .with(ParamId::IntraMix(0), &low)
            .with(ParamId::IntraMix(1), &high)
            .with(ParamId::InterMix(0), &high);
        marshaler.pack(&frame).unwrap();

        assert!(intra(&marshaler, 0).iter().all(|&v| v == 0.0));
        assert!(intra(&marshaler, 1).iter().all(|&v| v == 1.0));
        assert!(inter(&marshaler, 1).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_nan_mix_packs_as_zero() {
        let mut marshaler = FrameMarshaler::new(1, FRAME_SIZE);
        let values = [f32::NAN];
        let frame = AutomationFrame::new().with(ParamId::IntraMix(0), &values);
        marshaler.pack(&frame).unwrap();
        assert!(intra(&marshaler, 0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_first_dimension_has_no_inter_mix() {
        let mut marshaler = FrameMarshaler::new(3, FRAME_SIZE);
        let a = [0.25];
        let b = [0.75];
        let frame = AutomationFrame::new()
            .with(ParamId::InterMix(0), &a)
            .with(ParamId::InterMix(1), &b);
        marshaler.pack(&frame).unwrap();

        assert!(inter(&marshaler, 0).iter().all(|&v| v == 0.0));
        assert!(inter(&marshaler, 1).iter().all(|&v| v == 0.25));
        assert!(inter(&marshaler, 2).iter().all(|&v| v == 0.75));
    }

    #[test]
    fn test_unused_dimensions_are_ignored() {
        // A malformed curve on a dimension beyond the table does not matter
        let mut marshaler = FrameMarshaler::new(1, FRAME_SIZE);
        let empty: [f32; 0] = [];
        let frame = AutomationFrame::new().with(ParamId::IntraMix(5), &empty);
        assert!(marshaler.pack(&frame).is_ok());
    }

    #[test]
    fn test_frequency_broadcast() {
        let mut marshaler = FrameMarshaler::new(1, FRAME_SIZE);
        let values = [440.0];
        let frame = AutomationFrame::new().with(ParamId::Frequency, &values);
        marshaler.pack(&frame).unwrap();

        assert_eq!(marshaler.frequencies().len(), FRAME_SIZE);
        assert!(marshaler.frequencies().iter().all(|&v| v == 440.0));
    }

    #[test]
    fn test_frequency_copied_elementwise() {
        let mut marshaler = FrameMarshaler::new(1, FRAME_SIZE);
        let values: Vec<f32> = (0..FRAME_SIZE).map(|i| 100.0 + i as f32).collect();
        let frame = AutomationFrame::new().with(ParamId::Frequency, &values);
        marshaler.pack(&frame).unwrap();

        assert_eq!(marshaler.frequencies(), values.as_slice());
    }

    #[test]
    fn test_frequency_with_other_length_is_malformed() {
        let mut marshaler = FrameMarshaler::new(1, FRAME_SIZE);
        let values = [440.0; 5];
        let frame = AutomationFrame::new().with(ParamId::Frequency, &values);

        assert_eq!(
            marshaler.pack(&frame).unwrap_err(),
            QuantumError::MalformedAutomation {
                param: ParamId::Frequency,
                len: 5,
                frame_size: FRAME_SIZE,
            }
        );
    }

    #[test]
    fn test_malformed_quantum_leaves_scratch_untouched() {
        let mut marshaler = FrameMarshaler::new(1, FRAME_SIZE);
        let first = [0.5];
        marshaler
            .pack(&AutomationFrame::new().with(ParamId::IntraMix(0), &first))
            .unwrap();

        let mix = [0.9];
        let bad_freq = [1.0, 2.0];
        let frame = AutomationFrame::new()
            .with(ParamId::IntraMix(0), &mix)
            .with(ParamId::Frequency, &bad_freq);
        assert!(marshaler.pack(&frame).is_err());
        assert!(intra(&marshaler, 0).iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_mix_longer_than_frame_is_malformed() {
        let mut marshaler = FrameMarshaler::new(2, FRAME_SIZE);
        let values = vec![0.5; FRAME_SIZE + 1];
        let frame = AutomationFrame::new().with(ParamId::InterMix(0), &values);
        assert!(matches!(
            marshaler.pack(&frame),
            Err(QuantumError::MalformedAutomation { param: ParamId::InterMix(0), .. })
        ));
    }

    #[test]
    fn test_custom_frame_size_layout() {
        let mut marshaler = FrameMarshaler::new(2, 4);
        let a = [0.1, 0.2];
        let b = [0.3];
        let c = [0.4, 0.5, 0.6, 0.7];
        let frame = AutomationFrame::new()
            .with(ParamId::IntraMix(0), &a)
            .with(ParamId::IntraMix(1), &b)
            .with(ParamId::InterMix(0), &c);
        marshaler.pack(&frame).unwrap();

        assert_eq!(
            marshaler.mixes(),
            &[
                0.1, 0.2, 0.2, 0.2, // d0 intra
                0.0, 0.0, 0.0, 0.0, // d0 inter
                0.3, 0.3, 0.3, 0.3, // d1 intra
                0.4, 0.5, 0.6, 0.7, // d1 inter
            ]
        );
        assert_eq!(marshaler.frequencies(), &[440.0; 4]);
    }
}
