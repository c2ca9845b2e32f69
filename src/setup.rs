// src/setup.rs
//
// Non-real-time setup: load the engine module, acquire the handle and
// publish the outcome to the audio thread.

use log::{error, info};

use crate::automation::FRAME_SIZE;
use crate::bridge::{SetupPublisher, SetupReceiver, setup_channel};
use crate::compute::EngineLoader;
use crate::engine_handle::EngineHandle;
use crate::error::EngineInitError;
use crate::wavetable::WavetableDescriptor;

/// Everything the setup context needs to bring an engine up.
pub struct SetupPayload {
    /// Raw compute engine module.
    pub module: Vec<u8>,
    /// Flattened wavetable and its shape.
    pub wavetable: WavetableDescriptor,
}

impl SetupPayload {
    pub fn new(module: Vec<u8>, wavetable: WavetableDescriptor) -> Self {
        Self { module, wavetable }
    }
}

/// Load and validate synchronously on the calling thread.
pub fn run_setup<L: EngineLoader>(
    loader: &L,
    payload: &SetupPayload,
) -> Result<EngineHandle<L::Engine>, EngineInitError> {
    info!(
        "loading compute engine module ({} bytes)",
        payload.module.len()
    );
    let engine = loader.load(&payload.module)?;
    EngineHandle::acquire(engine, &payload.wavetable, FRAME_SIZE)
}

/// Run setup and publish the outcome, logging failures.
pub fn setup_and_publish<L: EngineLoader>(
    loader: &L,
    payload: &SetupPayload,
    publisher: SetupPublisher<L::Engine>,
) {
    let outcome = run_setup(loader, payload);
    if let Err(err) = &outcome {
        error!("engine setup failed: {}", err);
    }
    publisher.publish(outcome);
}

/// Run setup on a dedicated thread and return the receiving end.
///
/// The returned receiver goes to [`WavetableProcessor::begin_setup`].
///
/// [`WavetableProcessor::begin_setup`]: crate::lifecycle::WavetableProcessor::begin_setup
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_setup<L>(loader: L, payload: SetupPayload) -> std::io::Result<SetupReceiver<L::Engine>>
where
    L: EngineLoader + Send + 'static,
{
    let (publisher, receiver) = setup_channel();
    std::thread::Builder::new()
        .name("wavetable-setup".into())
        .spawn(move || setup_and_publish(&loader, &payload, publisher))?;
    Ok(receiver)
}

/// Run setup inline and return an already-completed receiver.
///
/// For hosts without threads (e.g. an AudioWorklet): call from the message
/// handler, not from the render callback.
pub fn setup_inline<L: EngineLoader>(loader: &L, payload: &SetupPayload) -> SetupReceiver<L::Engine> {
    let (publisher, receiver) = setup_channel();
    setup_and_publish(loader, payload, publisher);
    receiver
}
