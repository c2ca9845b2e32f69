// src/params.rs
//
// Parameter identities and metadata.
//
// Every automatable parameter gets a fixed slot index. Names are only
// resolved at setup time through `ParamTable`; the audio path works on
// `ParamId` / slot indices exclusively.

use std::fmt;

use crate::wavetable::MAX_DIMENSIONS;

/// Number of intra-dimensional mix parameters.
pub const INTRA_MIX_COUNT: usize = MAX_DIMENSIONS;

/// Number of inter-dimensional mix parameters.
pub const INTER_MIX_COUNT: usize = MAX_DIMENSIONS - 1;

/// Total number of parameter slots (frequency + all mixes).
pub const PARAM_COUNT: usize = 1 + INTRA_MIX_COUNT + INTER_MIX_COUNT;

/// Playback frequency used when the host supplies none.
pub const DEFAULT_FREQUENCY: f32 = 440.0;

const INTRA_BASE: usize = 1;
const INTER_BASE: usize = INTRA_BASE + INTRA_MIX_COUNT;

/// Identity of an automatable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    /// `frequency`: playback frequency in Hz.
    Frequency,
    /// `dimension_<d>_mix`: crossfade between the waveforms of dimension `d`.
    IntraMix(u8),
    /// `dimension_<i>x<i+1>_mix`: crossfade from dimension `i` into `i + 1`.
    InterMix(u8),
}

impl ParamId {
    /// Fixed slot index in `0..PARAM_COUNT`.
    #[inline]
    pub const fn slot(self) -> usize {
        match self {
            ParamId::Frequency => 0,
            ParamId::IntraMix(d) => INTRA_BASE + d as usize,
            ParamId::InterMix(i) => INTER_BASE + i as usize,
        }
    }

    pub const fn from_slot(slot: usize) -> Option<Self> {
        if slot == 0 {
            Some(ParamId::Frequency)
        } else if slot < INTER_BASE {
            Some(ParamId::IntraMix((slot - INTRA_BASE) as u8))
        } else if slot < PARAM_COUNT {
            Some(ParamId::InterMix((slot - INTER_BASE) as u8))
        } else {
            None
        }
    }

    /// The inter-dimensional mix feeding into `dimension`, if any.
    #[inline]
    pub const fn inter_mix_into(dimension: usize) -> Option<Self> {
        if dimension == 0 || dimension >= MAX_DIMENSIONS {
            None
        } else {
            Some(ParamId::InterMix((dimension - 1) as u8))
        }
    }

    /// Whether the parameter is a mix weight bounded to [0, 1].
    #[inline]
    pub const fn is_mix(self) -> bool {
        !matches!(self, ParamId::Frequency)
    }

    /// Canonical parameter name.
    pub fn name(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamId::Frequency => write!(f, "frequency"),
            ParamId::IntraMix(d) => write!(f, "dimension_{}_mix", d),
            ParamId::InterMix(i) => write!(f, "dimension_{}x{}_mix", i, i + 1),
        }
    }
}

/// Metadata describing a parameter.
///
/// Every parameter is audio-rate: one value per sample, held when shorter.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub id: ParamId,

    /// Canonical name
    pub name: String,

    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamDescriptor {
    pub fn new(id: ParamId) -> Self {
        Self {
            id,
            name: id.name(),
            min: f32::MIN,
            max: f32::MAX,
            default: 0.0,
        }
    }

    pub fn range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn default(mut self, value: f32) -> Self {
        self.default = value;
        self
    }
}

/// Precomputed name → slot table for every parameter.
///
/// Built once at setup. Lookups by name never happen on the audio thread.
pub struct ParamTable {
    descriptors: Vec<ParamDescriptor>,
    /// (name, slot), sorted by name for binary search
    by_name: Vec<(String, usize)>,
}

impl ParamTable {
    pub fn new() -> Self {
        let descriptors: Vec<ParamDescriptor> = (0..PARAM_COUNT)
            .filter_map(ParamId::from_slot)
            .map(|id| match id {
                ParamId::Frequency => ParamDescriptor::new(id)
                    .range(0.0, f32::MAX)
                    .default(DEFAULT_FREQUENCY),
                _ => ParamDescriptor::new(id).range(0.0, 1.0).default(0.0),
            })
            .collect();

        let mut by_name: Vec<(String, usize)> = descriptors
            .iter()
            .map(|d| (d.name.clone(), d.id.slot()))
            .collect();
        by_name.sort_by(|a, b| a.0.cmp(&b.0));

        Self { descriptors, by_name }
    }

    /// Resolve a canonical parameter name.
    pub fn lookup(&self, name: &str) -> Option<ParamId> {
        self.by_name
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .and_then(|ix| ParamId::from_slot(self.by_name[ix].1))
    }

    pub fn descriptor(&self, id: ParamId) -> &ParamDescriptor {
        &self.descriptors[id.slot()]
    }

    pub fn descriptors(&self) -> &[ParamDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for ParamTable {
    fn default() -> Self {
        Self::new()
    }
}
