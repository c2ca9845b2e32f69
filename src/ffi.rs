// C-compatible FFI bindings for Swift/iOS integration.
//
// Safety requirements:
// - All pointers must be non-null unless documented otherwise
// - All handles must be created by this module and not fabricated
// - Caller must call wt_processor_destroy for each wt_processor_create

use log::{LevelFilter, error};
use oslog::OsLogger;

use crate::audio_buffer::AudioBuffer;
use crate::automation::{AutomationBuffers, FRAME_SIZE};
use crate::bridge::{ProcessorReadback, StatusHandle};
use crate::lifecycle::WavetableProcessor;
use crate::params::ParamId;
use crate::reference_engine::{ReferenceEngine, ReferenceLoader};
use crate::setup::{SetupPayload, spawn_setup};
use crate::wavetable::{WavetableDescriptor, WavetableSettings};

// Logger subsystem identifier
const LOG_SUBSYSTEM: &str = "com.wtsynth.engine";

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the oslog logger.
///
/// Call once at application startup. Output appears in Console.app and
/// Xcode's debug console.
#[unsafe(no_mangle)]
pub extern "C" fn wt_init_logger() {
    OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Handle Types
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle to a wavetable processor plus its host-side state.
pub struct WtProcessor {
    inner: WavetableProcessor<ReferenceEngine>,
    status: StatusHandle,
    automation: AutomationBuffers,
    /// Planar stereo scratch for one quantum
    scratch: Vec<f32>,
}

/// Processor readback (for UI meters/displays).
#[repr(C)]
pub struct WtReadback {
    /// 0 uninitialized, 1 loading, 2 ready, 3 failed
    pub state: u8,
    pub rendered_quanta: u64,
    pub silent_quanta: u64,
    pub quantum_errors: u64,
}

impl From<ProcessorReadback> for WtReadback {
    fn from(r: ProcessorReadback) -> Self {
        Self {
            state: r.state as u8,
            rendered_quanta: r.rendered_quanta,
            silent_quanta: r.silent_quanta,
            quantum_errors: r.quantum_errors,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Processor Lifecycle
// ═══════════════════════════════════════════════════════════════════════════

/// Create a processor in the uninitialized state.
///
/// Returns an opaque pointer that must be freed with `wt_processor_destroy`.
#[unsafe(no_mangle)]
pub extern "C" fn wt_processor_create() -> *mut WtProcessor {
    let inner: WavetableProcessor<ReferenceEngine> = WavetableProcessor::new();
    let status = inner.status();
    Box::into_raw(Box::new(WtProcessor {
        inner,
        status,
        automation: AutomationBuffers::new(),
        scratch: vec![0.0; FRAME_SIZE * 2],
    }))
}

/// Destroy a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wt_processor_create`
/// - `processor` must not be used after this call
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wt_processor_destroy(processor: *mut WtProcessor) {
    if !processor.is_null() {
        unsafe { drop(Box::from_raw(processor)) };
    }
}

/// Start engine setup on a background thread.
///
/// `samples` is the flattened table (`dimension_count * waveforms_per_dimension
/// * waveform_length` floats). Returns `false` if the table is malformed, the
/// processor has already been set up, or the setup thread could not start.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wt_processor_create`
/// - `module` must point to `module_len` readable bytes (or be null with length 0)
/// - `samples` must point to `samples_len` readable floats
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wt_processor_setup(
    processor: *mut WtProcessor,
    module: *const u8,
    module_len: usize,
    dimension_count: u32,
    waveforms_per_dimension: u32,
    waveform_length: u32,
    base_frequency: f32,
    samples: *const f32,
    samples_len: usize,
) -> bool {
    if processor.is_null() || samples.is_null() {
        return false;
    }
    let processor = unsafe { &mut *processor };

    let module = if module.is_null() || module_len == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(module, module_len) }.to_vec()
    };
    let samples = unsafe { std::slice::from_raw_parts(samples, samples_len) }.to_vec();

    let settings = WavetableSettings::new(
        dimension_count as usize,
        waveforms_per_dimension as usize,
        waveform_length as usize,
        base_frequency,
    );
    let wavetable = match WavetableDescriptor::from_parts(settings, samples) {
        Ok(wavetable) => wavetable,
        Err(e) => {
            error!("wt_processor_setup: {}", e);
            return false;
        }
    };

    let receiver = match spawn_setup(ReferenceLoader, SetupPayload::new(module, wavetable)) {
        Ok(receiver) => receiver,
        Err(e) => {
            error!("wt_processor_setup: failed to spawn setup thread: {}", e);
            return false;
        }
    };
    processor.inner.begin_setup(receiver).is_ok()
}

/// Current lifecycle state: 0 uninitialized, 1 loading, 2 ready, 3 failed.
///
/// # Safety
/// `processor` must be a valid pointer returned by `wt_processor_create`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wt_processor_state(processor: *const WtProcessor) -> u8 {
    if processor.is_null() {
        return 0;
    }
    unsafe { (*processor).status.state() as u8 }
}

/// Counters and state for UI display.
///
/// # Safety
/// `processor` must be a valid pointer returned by `wt_processor_create`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wt_processor_readback(processor: *const WtProcessor) -> WtReadback {
    if processor.is_null() {
        return WtReadback {
            state: 0,
            rendered_quanta: 0,
            silent_quanta: 0,
            quantum_errors: 0,
        };
    }
    unsafe { (*processor).status.readback().into() }
}

// ═══════════════════════════════════════════════════════════════════════════
// Parameters
// ═══════════════════════════════════════════════════════════════════════════

/// Set the automation curve for parameter `slot`.
///
/// The curve is held until replaced. Returns the number of values stored,
/// or 0 if `len` exceeds `FRAME_SIZE`; the slot then renders silence until
/// it is set again.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wt_processor_create`
/// - `values` must point to `len` readable floats
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wt_processor_set_param(
    processor: *mut WtProcessor,
    slot: u32,
    values: *const f32,
    len: usize,
) -> u32 {
    if processor.is_null() || values.is_null() {
        return 0;
    }
    let Some(id) = ParamId::from_slot(slot as usize) else {
        return 0;
    };
    let processor = unsafe { &mut *processor };
    let values = unsafe { std::slice::from_raw_parts(values, len) };
    processor.automation.set_curve(id, values).map_or(0, |stored| stored as u32)
}

// ═══════════════════════════════════════════════════════════════════════════
// Rendering
// ═══════════════════════════════════════════════════════════════════════════

/// Render audio to separate left/right buffers.
///
/// Call from the audio render callback. Audio is produced in quanta of
/// `FRAME_SIZE` frames; a trailing partial quantum is cut short.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wt_processor_create`
/// - `output_left` and `output_right` must point to `frames` writable floats
#[unsafe(no_mangle)]
pub unsafe extern "C" fn wt_processor_render(
    processor: *mut WtProcessor,
    frames: u32,
    output_left: *mut f32,
    output_right: *mut f32,
) {
    let total_frames = frames as usize;

    // Fill with silence if invalid
    if processor.is_null() || output_left.is_null() || output_right.is_null() {
        if !output_left.is_null() {
            unsafe { std::ptr::write_bytes(output_left, 0, total_frames) };
        }
        if !output_right.is_null() {
            unsafe { std::ptr::write_bytes(output_right, 0, total_frames) };
        }
        return;
    }

    let processor = unsafe { &mut *processor };
    let out_left = unsafe { std::slice::from_raw_parts_mut(output_left, total_frames) };
    let out_right = unsafe { std::slice::from_raw_parts_mut(output_right, total_frames) };

    let mut offset = 0;
    while offset < total_frames {
        let chunk_frames = (total_frames - offset).min(FRAME_SIZE);

        {
            let mut outputs = [AudioBuffer::new(&mut processor.scratch, 2)];
            // Errors are counted and logged by the processor
            let _ = processor
                .inner
                .process(&processor.automation.frame(), &mut outputs);
        }

        // Scratch is planar: [L0..LN, R0..RN]
        let (left, right) = processor.scratch.split_at(FRAME_SIZE);
        out_left[offset..offset + chunk_frames].copy_from_slice(&left[..chunk_frames]);
        out_right[offset..offset + chunk_frames].copy_from_slice(&right[..chunk_frames]);

        offset += chunk_frames;
    }
}
