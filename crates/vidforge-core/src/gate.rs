//! Single-flight admission for the shared browser session.
//!
//! A binary mutex, not a semaphore: the browser cannot multiplex two
//! navigation contexts, so excess requests are rejected outright rather
//! than queued, and callers retry on their own schedule.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct AdmissionGate {
    busy: AtomicBool,
}

impl AdmissionGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Atomically claim the gate. Returns a permit when no job holds it,
    /// `None` otherwise with no side effect.
    pub fn try_admit(self: &Arc<Self>) -> Option<AdmissionPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| AdmissionPermit {
                gate: Arc::clone(self),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

/// Proof of admission. Releasing happens when the permit is dropped, so a
/// permit cannot be released twice and every exit path of the job it
/// guards (including panics in the guarded task) releases exactly once.
#[derive(Debug)]
pub struct AdmissionPermit {
    gate: Arc<AdmissionGate>,
}

impl AdmissionPermit {
    /// Explicit release, for call sites where dropping would be easy to
    /// miss in review. Equivalent to dropping the permit.
    pub fn release(self) {}
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::SeqCst);
    }
}
