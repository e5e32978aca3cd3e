//! # Per-task mode slot.
//!
//! Each registered task owns one [`ModeSlot`]: the mode the supervisor last
//! assigned to it and the interrupt token of the current mode epoch.
//!
//! ```text
//! Supervisor::broadcast(m) ──► slot.assign(m)
//!                                 ├─ same mode → no-op
//!                                 └─ new mode  → store m, cancel token
//!
//! TaskActor loop entry ──► slot.acknowledge()
//!                            ├─ token cancelled → replace with runtime.child_token()
//!                            └─ return (mode, token)   (one critical section)
//! ```
//!
//! Interruption is edge-triggered: a cancelled token is consumed exactly once,
//! by the next `acknowledge`, so a stale signal never cancels the following
//! handler. Tokens are children of the runtime token, so shutdown interrupts
//! every epoch, and an acknowledged child of a cancelled runtime is itself
//! born cancelled.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::mode::Mode;

struct SlotState {
    mode: Mode,
    interrupt: CancellationToken,
}

/// Mode plus interrupt token of one task, written by the supervisor and read
/// by the task's dispatch loop.
pub(crate) struct ModeSlot {
    state: Mutex<SlotState>,
    runtime: CancellationToken,
}

impl ModeSlot {
    pub(crate) fn new(mode: Mode, runtime: &CancellationToken) -> Self {
        Self {
            state: Mutex::new(SlotState {
                mode,
                interrupt: runtime.child_token(),
            }),
            runtime: runtime.clone(),
        }
    }

    /// Assigns `mode`. Returns the previous mode when it differed (and the
    /// current epoch was interrupted), `None` when the mode was already held.
    pub(crate) fn assign(&self, mode: Mode) -> Option<Mode> {
        let mut state = self.state.lock();
        if state.mode == mode {
            return None;
        }
        let prev = std::mem::replace(&mut state.mode, mode);
        state.interrupt.cancel();
        Some(prev)
    }

    /// Consumes a pending interrupt and reads the mode in one critical section.
    pub(crate) fn acknowledge(&self) -> (Mode, CancellationToken) {
        let mut state = self.state.lock();
        if state.interrupt.is_cancelled() {
            state.interrupt = self.runtime.child_token();
        }
        (state.mode, state.interrupt.clone())
    }

    pub(crate) fn mode(&self) -> Mode {
        self.state.lock().mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_mode_does_not_interrupt() {
        let runtime = CancellationToken::new();
        let slot = ModeSlot::new(Mode::Autonomous, &runtime);
        let (_, token) = slot.acknowledge();

        assert_eq!(slot.assign(Mode::Autonomous), None);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn new_mode_interrupts_current_epoch_once() {
        let runtime = CancellationToken::new();
        let slot = ModeSlot::new(Mode::Disabled, &runtime);
        let (mode, first) = slot.acknowledge();
        assert_eq!(mode, Mode::Disabled);

        assert_eq!(slot.assign(Mode::Teleoperated), Some(Mode::Disabled));
        assert!(first.is_cancelled());
        assert_eq!(slot.mode(), Mode::Teleoperated);

        let (mode, second) = slot.acknowledge();
        assert_eq!(mode, Mode::Teleoperated);
        assert!(!second.is_cancelled());

        // acknowledging again keeps the same epoch
        let (_, third) = slot.acknowledge();
        third.cancel();
        assert!(second.is_cancelled());
    }

    #[test]
    fn runtime_cancellation_reaches_every_epoch() {
        let runtime = CancellationToken::new();
        let slot = ModeSlot::new(Mode::Autonomous, &runtime);
        let (_, token) = slot.acknowledge();

        runtime.cancel();
        assert!(token.is_cancelled());
        let (_, fresh) = slot.acknowledge();
        assert!(fresh.is_cancelled());
    }
}
