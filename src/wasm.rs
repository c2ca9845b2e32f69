//! WebAssembly bindings via wasm-bindgen for AudioWorklet integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { wavetable_init, WavetableNode } from './wtsynth.js';
//!
//! await init();
//! wavetable_init();
//!
//! const node = new WavetableNode();
//! // From the port's message handler, never from process():
//! node.setup(moduleBytes, 2, 2, 1470, 30.0, flatSamples);
//!
//! // In the AudioWorkletProcessor:
//! process(inputs, outputs, parameters) {
//!     node.set_param(0, parameters.frequency);
//!     node.process(scratch, 2);
//!     // copy planar scratch into outputs[0][ch]
//!     return true;
//! }
//! ```

use wasm_bindgen::prelude::*;

use crate::audio_buffer::AudioBuffer;
use crate::automation::AutomationBuffers;
use crate::bridge::StatusHandle;
use crate::lifecycle::WavetableProcessor;
use crate::params::{ParamId, ParamTable};
use crate::reference_engine::{ReferenceEngine, ReferenceLoader};
use crate::setup::{SetupPayload, setup_inline};
use crate::wavetable::{WavetableDescriptor, WavetableSettings};

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn wavetable_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Node
// ═══════════════════════════════════════════════════════════════════════════

/// One wavetable voice, driven from an AudioWorkletProcessor.
#[wasm_bindgen]
pub struct WavetableNode {
    processor: WavetableProcessor<ReferenceEngine>,
    status: StatusHandle,
    automation: AutomationBuffers,
    params: ParamTable,
}

#[wasm_bindgen]
impl WavetableNode {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        let processor: WavetableProcessor<ReferenceEngine> = WavetableProcessor::new();
        let status = processor.status();
        Self {
            processor,
            status,
            automation: AutomationBuffers::new(),
            params: ParamTable::new(),
        }
    }

    /// Load the engine module and hand it the flattened wavetable.
    ///
    /// Setup problems put the node into the failed state (it then renders
    /// silence); only a malformed wavetable or a second call is reported
    /// back as an error.
    pub fn setup(
        &mut self,
        module: &[u8],
        dimension_count: u32,
        waveforms_per_dimension: u32,
        waveform_length: u32,
        base_frequency: f32,
        samples: Vec<f32>,
    ) -> Result<(), JsValue> {
        let settings = WavetableSettings::new(
            dimension_count as usize,
            waveforms_per_dimension as usize,
            waveform_length as usize,
            base_frequency,
        );
        let wavetable = WavetableDescriptor::from_parts(settings, samples)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let payload = SetupPayload::new(module.to_vec(), wavetable);
        self.processor
            .begin_setup(setup_inline(&ReferenceLoader, &payload))
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Lifecycle state: 0 uninitialized, 1 loading, 2 ready, 3 failed.
    pub fn state(&self) -> u8 {
        self.status.state() as u8
    }

    /// Number of quanta that were silenced by a per-quantum error.
    pub fn quantum_errors(&self) -> u64 {
        self.status.readback().quantum_errors
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Parameters
    // ─────────────────────────────────────────────────────────────────────────

    pub fn param_count(&self) -> u32 {
        self.params.len() as u32
    }

    /// Canonical name of the parameter in `slot`.
    pub fn param_name(&self, slot: u32) -> Option<String> {
        ParamId::from_slot(slot as usize).map(|id| self.params.descriptor(id).name.clone())
    }

    pub fn param_default(&self, slot: u32) -> Option<f32> {
        ParamId::from_slot(slot as usize).map(|id| self.params.descriptor(id).default)
    }

    /// `[min, max]` of the parameter in `slot`, empty for an unknown slot.
    pub fn param_range(&self, slot: u32) -> Vec<f32> {
        ParamId::from_slot(slot as usize)
            .map(|id| {
                let descriptor = self.params.descriptor(id);
                vec![descriptor.min, descriptor.max]
            })
            .unwrap_or_default()
    }

    /// Slot for a canonical parameter name.
    pub fn param_slot(&self, name: &str) -> Option<u32> {
        self.params.lookup(name).map(|id| id.slot() as u32)
    }

    /// Store this quantum's curve for `slot`. Returns how many values were kept.
    ///
    /// Curves longer than one quantum are rejected; quanta render silence
    /// until the slot is set again.
    pub fn set_param(&mut self, slot: u32, values: &[f32]) -> Result<u32, JsValue> {
        let id = ParamId::from_slot(slot as usize)
            .ok_or_else(|| JsValue::from_str(&format!("no parameter in slot {}", slot)))?;
        self.automation
            .set_curve(id, values)
            .map(|stored| stored as u32)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────────

    /// Render one quantum into a planar buffer of `channels` channels.
    ///
    /// Always returns `true` so the worklet stays alive.
    pub fn process(&mut self, output: &mut [f32], channels: u32) -> bool {
        let mut outputs = [AudioBuffer::new(output, channels as usize)];
        // Errors are counted and logged by the processor
        let _ = self
            .processor
            .process(&self.automation.frame(), &mut outputs);
        true
    }
}

impl Default for WavetableNode {
    fn default() -> Self {
        Self::new()
    }
}
