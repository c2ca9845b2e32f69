// src/automation.rs
//
// Per-quantum automation curves.

use crate::error::QuantumError;
use crate::params::{DEFAULT_FREQUENCY, PARAM_COUNT, ParamId};

/// Number of samples in one processing quantum.
pub const FRAME_SIZE: usize = 128;

static FREQUENCY_DEFAULT: [f32; 1] = [DEFAULT_FREQUENCY];
static MIX_DEFAULT: [f32; 1] = [0.0];

/// A read-only view of one parameter's values for a quantum.
///
/// Either held (one value) or audio-rate (one value per sample). Curves
/// shorter than the frame repeat their last value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutomationCurve<'a> {
    values: &'a [f32],
    /// Length the host supplied; larger than `values.len()` when storage
    /// could only keep a prefix.
    len: usize,
}

impl<'a> AutomationCurve<'a> {
    #[inline]
    pub fn new(values: &'a [f32]) -> Self {
        Self {
            values,
            len: values.len(),
        }
    }

    /// A stored prefix of a curve that was originally `len` values long.
    #[inline]
    pub(crate) fn truncated(values: &'a [f32], len: usize) -> Self {
        Self {
            values,
            len: len.max(values.len()),
        }
    }

    /// Length as supplied by the host.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether only a prefix of the supplied values is available.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.len > self.values.len()
    }

    #[inline]
    pub fn values(&self) -> &'a [f32] {
        self.values
    }

    /// Value at `frame`, holding the last value past the end of the curve.
    ///
    /// The curve must not be empty.
    #[inline]
    pub fn value_at(&self, frame: usize) -> f32 {
        self.values[frame.min(self.values.len() - 1)]
    }
}

/// One curve per parameter slot for a single quantum.
///
/// Slots the host does not set keep their default (length-1) curve, so
/// every parameter always resolves.
#[derive(Debug, Clone, Copy)]
pub struct AutomationFrame<'a> {
    curves: [AutomationCurve<'a>; PARAM_COUNT],
}

impl<'a> AutomationFrame<'a> {
    pub fn new() -> Self {
        let mut curves = [AutomationCurve::new(&MIX_DEFAULT); PARAM_COUNT];
        curves[ParamId::Frequency.slot()] = AutomationCurve::new(&FREQUENCY_DEFAULT);
        Self { curves }
    }

    #[inline]
    pub fn set(&mut self, id: ParamId, values: &'a [f32]) {
        self.curves[id.slot()] = AutomationCurve::new(values);
    }

    #[inline]
    pub(crate) fn set_curve(&mut self, id: ParamId, curve: AutomationCurve<'a>) {
        self.curves[id.slot()] = curve;
    }

    pub fn with(mut self, id: ParamId, values: &'a [f32]) -> Self {
        self.set(id, values);
        self
    }

    #[inline]
    pub fn curve(&self, id: ParamId) -> AutomationCurve<'a> {
        self.curves[id.slot()]
    }
}

impl Default for AutomationFrame<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned, fixed-capacity curve storage for hosts that push values in.
///
/// Holds up to `FRAME_SIZE` values per slot. Nothing here allocates after
/// construction.
pub struct AutomationBuffers {
    values: Box<[[f32; FRAME_SIZE]; PARAM_COUNT]>,
    lens: [usize; PARAM_COUNT],
}

impl AutomationBuffers {
    pub fn new() -> Self {
        let mut buffers = Self {
            values: Box::new([[0.0; FRAME_SIZE]; PARAM_COUNT]),
            lens: [1; PARAM_COUNT],
        };
        buffers.set_constant(ParamId::Frequency, DEFAULT_FREQUENCY);
        buffers
    }

    /// Hold a single value for the whole quantum.
    #[inline]
    pub fn set_constant(&mut self, id: ParamId, value: f32) {
        let slot = id.slot();
        self.values[slot][0] = value;
        self.lens[slot] = 1;
    }

    /// Store a curve. An empty curve leaves the slot unchanged.
    ///
    /// A curve longer than `FRAME_SIZE` cannot be stored: the slot keeps its
    /// original length so every quantum using it is rejected as malformed
    /// until it is replaced, and the error is also returned here.
    ///
    /// Returns the number of values stored.
    pub fn set_curve(&mut self, id: ParamId, values: &[f32]) -> Result<usize, QuantumError> {
        if values.is_empty() {
            return Ok(0);
        }
        let slot = id.slot();
        let stored = values.len().min(FRAME_SIZE);
        self.values[slot][..stored].copy_from_slice(&values[..stored]);
        self.lens[slot] = values.len();

        if values.len() > FRAME_SIZE {
            return Err(QuantumError::MalformedAutomation {
                param: id,
                len: values.len(),
                frame_size: FRAME_SIZE,
            });
        }
        Ok(stored)
    }

    /// Borrow all slots as a frame.
    pub fn frame(&self) -> AutomationFrame<'_> {
        let mut frame = AutomationFrame::new();
        for slot in 0..PARAM_COUNT {
            if let Some(id) = ParamId::from_slot(slot) {
                let len = self.lens[slot];
                let values = &self.values[slot][..len.min(FRAME_SIZE)];
                frame.set_curve(id, AutomationCurve::truncated(values, len));
            }
        }
        frame
    }
}

impl Default for AutomationBuffers {
    fn default() -> Self {
        Self::new()
    }
}
