//! Cross-context bridge between the setup context and the audio thread.
//!
//! # Architecture
//!
//! - **Setup context** loads the engine module, acquires an [`EngineHandle`]
//!   and publishes the outcome exactly once through a [`SetupPublisher`]
//! - **Audio thread** owns the [`SetupReceiver`] and polls it without
//!   blocking at the start of every quantum while loading
//! - Lifecycle state and quantum counters flow back through atomics in
//!   [`SharedStatus`], readable from any thread via [`StatusHandle`]
//!
//! # Usage
//!
//! ```ignore
//! let (publisher, receiver) = setup_channel();
//! processor.begin_setup(receiver)?;
//!
//! // Setup context (may be another thread):
//! publisher.publish(EngineHandle::acquire(engine, &table, FRAME_SIZE));
//!
//! // Audio thread, every quantum:
//! processor.process(&automation, &mut outputs);
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicU8, AtomicU64, Ordering},
    mpsc::{self, Receiver, SyncSender, TryRecvError},
};

use crate::compute::ComputeEngine;
use crate::engine_handle::EngineHandle;
use crate::error::EngineInitError;
use crate::lifecycle::{LifecycleState, ReadyEngine};

/// What the setup context hands to the audio thread.
pub type SetupOutcome<E> = Result<Box<ReadyEngine<E>>, EngineInitError>;

/// Sending half of the one-shot setup channel.
///
/// `publish` consumes the publisher, so at most one outcome is ever sent.
pub struct SetupPublisher<E: ComputeEngine> {
    tx: SyncSender<SetupOutcome<E>>,
}

/// Receiving half of the one-shot setup channel. Owned by the audio thread.
pub struct SetupReceiver<E: ComputeEngine> {
    rx: Receiver<SetupOutcome<E>>,
}

/// Result of a non-blocking poll.
pub enum SetupPoll<E: ComputeEngine> {
    Pending,
    Complete(SetupOutcome<E>),
}

/// Create a linked publisher/receiver pair.
pub fn setup_channel<E: ComputeEngine>() -> (SetupPublisher<E>, SetupReceiver<E>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (SetupPublisher { tx }, SetupReceiver { rx })
}

impl<E: ComputeEngine> SetupPublisher<E> {
    /// Publish the acquisition result.
    ///
    /// The audio-side scratch buffers are allocated here, on the setup
    /// context, so the audio thread only has to take ownership.
    pub fn publish(self, acquired: Result<EngineHandle<E>, EngineInitError>) {
        let outcome = acquired.map(ReadyEngine::new);
        // Capacity is one and this is the only send; a dropped receiver just
        // means the processor went away first.
        let _ = self.tx.send(outcome);
    }
}

impl<E: ComputeEngine> SetupReceiver<E> {
    /// Check for a published outcome without blocking.
    ///
    /// A publisher that disappears without sending counts as a failed setup.
    #[inline]
    pub fn poll(&self) -> SetupPoll<E> {
        match self.rx.try_recv() {
            Ok(outcome) => SetupPoll::Complete(outcome),
            Err(TryRecvError::Empty) => SetupPoll::Pending,
            Err(TryRecvError::Disconnected) => {
                SetupPoll::Complete(Err(EngineInitError::SetupAbandoned))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Readback
// ═══════════════════════════════════════════════════════════════════

/// Lock-free shared state for processor -> UI readback.
pub(crate) struct SharedStatus {
    state: AtomicU8,
    rendered_quanta: AtomicU64,
    silent_quanta: AtomicU64,
    quantum_errors: AtomicU64,
}

impl SharedStatus {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Uninitialized as u8),
            rendered_quanta: AtomicU64::new(0),
            silent_quanta: AtomicU64::new(0),
            quantum_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn set_state(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub(crate) fn record_rendered(&self) {
        self.rendered_quanta.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_silent(&self) {
        self.silent_quanta.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an error; returns the number of errors before this one.
    #[inline]
    pub(crate) fn record_error(&self) -> u64 {
        self.quantum_errors.fetch_add(1, Ordering::Relaxed)
    }
}

/// Snapshot of the processor for UI meters and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorReadback {
    pub state: LifecycleState,
    pub rendered_quanta: u64,
    pub silent_quanta: u64,
    pub quantum_errors: u64,
}

/// Read-only view of a processor's status, safe to use from any thread.
#[derive(Clone)]
pub struct StatusHandle {
    shared: Arc<SharedStatus>,
}

impl StatusHandle {
    pub(crate) fn new(shared: Arc<SharedStatus>) -> Self {
        Self { shared }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn readback(&self) -> ProcessorReadback {
        ProcessorReadback {
            state: self.state(),
            rendered_quanta: self.shared.rendered_quanta.load(Ordering::Relaxed),
            silent_quanta: self.shared.silent_quanta.load(Ordering::Relaxed),
            quantum_errors: self.shared.quantum_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::FRAME_SIZE;
    use crate::test::{ScriptedEngine, small_table};

    #[test]
    fn test_poll_pending_then_complete() {
        let (publisher, receiver) = setup_channel::<ScriptedEngine>();
        assert!(matches!(receiver.poll(), SetupPoll::Pending));

        let handle = EngineHandle::acquire(ScriptedEngine::new(), &small_table(), FRAME_SIZE);
        publisher.publish(handle);
        assert!(matches!(receiver.poll(), SetupPoll::Complete(Ok(_))));
    }

    #[test]
    fn test_dropped_publisher_is_abandoned() {
        let (publisher, receiver) = setup_channel::<ScriptedEngine>();
        drop(publisher);
        assert!(matches!(
            receiver.poll(),
            SetupPoll::Complete(Err(EngineInitError::SetupAbandoned))
        ));
    }

    #[test]
    fn test_publish_error() {
        let (publisher, receiver) = setup_channel::<ScriptedEngine>();
        publisher.publish(Err(EngineInitError::ModuleLoad("bad magic".into())));
        assert!(matches!(
            receiver.poll(),
            SetupPoll::Complete(Err(EngineInitError::ModuleLoad(_)))
        ));
    }

    #[test]
    fn test_status_readback() {
        let shared = Arc::new(SharedStatus::new());
        let status = StatusHandle::new(Arc::clone(&shared));
        assert_eq!(status.state(), LifecycleState::Uninitialized);

        shared.set_state(LifecycleState::Ready);
        shared.record_rendered();
        shared.record_silent();
        assert_eq!(shared.record_error(), 0);

        assert_eq!(
            status.readback(),
            ProcessorReadback {
                state: LifecycleState::Ready,
                rendered_quanta: 1,
                silent_quanta: 1,
                quantum_errors: 1,
            }
        );
    }
}
