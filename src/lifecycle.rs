// src/lifecycle.rs
//
// The processing state machine.
//
//   Uninitialized --begin_setup--> Loading --acquired--> Ready
//                                     |
//                                     +------failed----> Failed (terminal)
//
// Every state except Ready renders silence. The audio thread never waits on
// setup: it polls the setup channel once per quantum while Loading.

use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::audio_buffer::AudioBuffer;
use crate::automation::AutomationFrame;
use crate::bridge::{SetupPoll, SetupReceiver, SharedStatus, StatusHandle};
use crate::compute::ComputeEngine;
use crate::engine_handle::EngineHandle;
use crate::error::{EngineInitError, QuantumError, SetupRejected};
use crate::marshal::FrameMarshaler;

/// Externally visible lifecycle state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized = 0,
    Loading = 1,
    Ready = 2,
    Failed = 3,
}

impl LifecycleState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => LifecycleState::Loading,
            2 => LifecycleState::Ready,
            3 => LifecycleState::Failed,
            _ => LifecycleState::Uninitialized,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Uninitialized => write!(f, "uninitialized"),
            LifecycleState::Loading => write!(f, "loading"),
            LifecycleState::Ready => write!(f, "ready"),
            LifecycleState::Failed => write!(f, "failed"),
        }
    }
}

/// Everything the audio thread needs once the engine is up.
///
/// Built on the setup context so taking it over allocates nothing.
pub struct ReadyEngine<E: ComputeEngine> {
    handle: EngineHandle<E>,
    marshaler: FrameMarshaler,
    /// Generated samples for the current quantum
    block: Vec<f32>,
}

impl<E: ComputeEngine> ReadyEngine<E> {
    pub fn new(handle: EngineHandle<E>) -> Box<Self> {
        let frame_size = handle.frame_size();
        let marshaler = FrameMarshaler::new(handle.settings().dimension_count, frame_size);
        Box::new(Self {
            handle,
            marshaler,
            block: vec![0.0; frame_size],
        })
    }

    /// Marshal, generate, fan out.
    fn render(
        &mut self,
        automation: &AutomationFrame,
        outputs: &mut [AudioBuffer],
    ) -> Result<(), QuantumError> {
        self.marshaler.pack_into(automation, &mut self.handle)?;
        self.handle.generate(&mut self.block)?;

        for output in outputs.iter_mut() {
            output.fill_from_mono(&self.block);
        }
        Ok(())
    }

    pub fn handle(&self) -> &EngineHandle<E> {
        &self.handle
    }
}

enum Lifecycle<E: ComputeEngine> {
    Uninitialized,
    Loading(SetupReceiver<E>),
    Ready(Box<ReadyEngine<E>>),
    Failed(EngineInitError),
}

/// What a quantum produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantumOutcome {
    /// Engine output was written to every channel.
    Rendered,
    /// Not ready yet (or failed); every channel was zeroed.
    Silent,
}

/// Real-time wavetable processor.
///
/// Owned by the audio thread. Setup happens elsewhere and arrives through
/// the [`SetupReceiver`] passed to [`WavetableProcessor::begin_setup`].
pub struct WavetableProcessor<E: ComputeEngine> {
    lifecycle: Lifecycle<E>,
    status: Arc<SharedStatus>,
}

impl<E: ComputeEngine> WavetableProcessor<E> {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            status: Arc::new(SharedStatus::new()),
        }
    }

    /// Handle for reading state and counters from another thread.
    pub fn status(&self) -> StatusHandle {
        StatusHandle::new(Arc::clone(&self.status))
    }

    pub fn state(&self) -> LifecycleState {
        match self.lifecycle {
            Lifecycle::Uninitialized => LifecycleState::Uninitialized,
            Lifecycle::Loading(_) => LifecycleState::Loading,
            Lifecycle::Ready(_) => LifecycleState::Ready,
            Lifecycle::Failed(_) => LifecycleState::Failed,
        }
    }

    /// The setup error that put the processor into `Failed`, if any.
    pub fn failure(&self) -> Option<&EngineInitError> {
        match &self.lifecycle {
            Lifecycle::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// The running engine, once `Ready`.
    pub fn ready_engine(&self) -> Option<&ReadyEngine<E>> {
        match &self.lifecycle {
            Lifecycle::Ready(ready) => Some(&**ready),
            _ => None,
        }
    }

    /// Enter `Loading`, waiting on `receiver` for the setup outcome.
    ///
    /// Only valid from `Uninitialized`; setup is never retried.
    pub fn begin_setup(&mut self, receiver: SetupReceiver<E>) -> Result<(), SetupRejected> {
        let state = self.state();
        if state != LifecycleState::Uninitialized {
            warn!("setup requested while {}; ignoring", state);
            return Err(SetupRejected { state });
        }
        info!("wavetable engine loading");
        self.transition(Lifecycle::Loading(receiver));
        Ok(())
    }

    /// Process one quantum.
    ///
    /// Every channel of every output is written: engine output when `Ready`,
    /// silence otherwise. A per-quantum error silences this quantum only and
    /// never changes the lifecycle state.
    ///
    /// Audio-thread-safe.
    pub fn process(
        &mut self,
        automation: &AutomationFrame,
        outputs: &mut [AudioBuffer],
    ) -> Result<QuantumOutcome, QuantumError> {
        self.poll_setup();

        let result = match &mut self.lifecycle {
            Lifecycle::Ready(ready) => ready.render(automation, outputs),
            _ => {
                silence(outputs);
                self.status.record_silent();
                return Ok(QuantumOutcome::Silent);
            }
        };

        match result {
            Ok(()) => {
                self.status.record_rendered();
                Ok(QuantumOutcome::Rendered)
            }
            Err(err) => {
                silence(outputs);
                self.status.record_silent();
                if self.status.record_error() == 0 {
                    warn!("quantum silenced: {}", err);
                } else {
                    debug!("quantum silenced: {}", err);
                }
                Err(err)
            }
        }
    }

    /// Pick up a published setup outcome, if there is one.
    fn poll_setup(&mut self) {
        let Lifecycle::Loading(receiver) = &self.lifecycle else {
            return;
        };

        match receiver.poll() {
            SetupPoll::Pending => {}
            SetupPoll::Complete(Ok(ready)) => {
                info!("wavetable engine ready");
                self.transition(Lifecycle::Ready(ready));
            }
            SetupPoll::Complete(Err(err)) => {
                error!("wavetable engine setup failed: {}", err);
                self.transition(Lifecycle::Failed(err));
            }
        }
    }

    fn transition(&mut self, next: Lifecycle<E>) {
        self.lifecycle = next;
        self.status.set_state(self.state());
    }
}

impl<E: ComputeEngine> Default for WavetableProcessor<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn silence(outputs: &mut [AudioBuffer]) {
    for output in outputs.iter_mut() {
        output.clear();
    }
}
