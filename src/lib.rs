// src/lib.rs
//
// Library entry point for Rust, FFI (iOS/Swift) and wasm consumers.

pub mod audio_buffer;
pub mod automation;
pub mod bridge;
pub mod compute;
pub mod engine_handle;
pub mod error;
pub mod lifecycle;
pub mod marshal;
pub mod memory;
pub mod params;
pub mod reference_engine;
pub mod setup;
pub mod wavetable;

#[cfg(feature = "ios")]
pub mod ffi;

#[cfg(feature = "web")]
pub mod wasm;


// Re-export key types for Rust consumers
pub use audio_buffer::AudioBuffer;
pub use automation::{AutomationBuffers, AutomationCurve, AutomationFrame, FRAME_SIZE};
pub use bridge::{ProcessorReadback, SetupPublisher, SetupReceiver, StatusHandle, setup_channel};
pub use compute::{ComputeEngine, EngineLoader, HandleRef, InstanceRef};
pub use engine_handle::EngineHandle;
pub use error::{EngineInitError, MemoryError, QuantumError, SetupRejected, WavetableError};
pub use lifecycle::{LifecycleState, QuantumOutcome, WavetableProcessor};
pub use marshal::FrameMarshaler;
pub use params::{PARAM_COUNT, ParamDescriptor, ParamId, ParamTable};
pub use reference_engine::{ReferenceEngine, ReferenceLoader};
pub use setup::{SetupPayload, run_setup, setup_inline};
#[cfg(not(target_arch = "wasm32"))]
pub use setup::spawn_setup;
pub use wavetable::{WavetableDescriptor, WavetableSettings};
