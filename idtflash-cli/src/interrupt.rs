//! Ctrl-C handling.
//!
//! What an interrupt does depends on the phase the command is in:
//! - waiting for a device: the wait is cancelled and the command fails
//!   with exit code 130
//! - uploading: the interrupt is ignored
//! - anything else: the process exits with code 130

use {
    console::style,
    log::debug,
    std::sync::atomic::{AtomicBool, AtomicU8, Ordering},
};

/// Exit code for an interrupted command.
pub(crate) const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Set when Ctrl-C arrives during a wait.
pub(crate) static CANCELLED: AtomicBool = AtomicBool::new(false);

static PHASE: AtomicU8 = AtomicU8::new(Phase::Other as u8);

/// Interrupt-relevant phase of the running command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Phase {
    /// Neither waiting nor uploading.
    Other = 0,
    /// Blocked until a device shows up.
    Waiting = 1,
    /// Frames are being sent to the device.
    Uploading = 2,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Waiting,
            2 => Self::Uploading,
            _ => Self::Other,
        }
    }
}

/// Reaction to Ctrl-C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Flag the wait as cancelled.
    CancelWait,
    /// Keep going.
    Ignore,
    /// Terminate the process.
    Exit,
}

pub(crate) fn action_for(phase: Phase) -> Action {
    match phase {
        Phase::Waiting => Action::CancelWait,
        Phase::Uploading => Action::Ignore,
        Phase::Other => Action::Exit,
    }
}

/// Current phase.
pub(crate) fn current_phase() -> Phase {
    Phase::from_u8(PHASE.load(Ordering::SeqCst))
}

/// Restores the previous phase when dropped.
#[must_use = "the phase ends when the guard is dropped"]
pub(crate) struct PhaseGuard {
    previous: u8,
}

/// Enter `phase` until the returned guard is dropped.
pub(crate) fn enter(phase: Phase) -> PhaseGuard {
    PhaseGuard {
        previous: PHASE.swap(phase as u8, Ordering::SeqCst),
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        PHASE.store(self.previous, Ordering::SeqCst);
    }
}

/// Install the process-wide Ctrl-C handler.
pub(crate) fn install_handler() {
    let result = ctrlc::set_handler(|| match action_for(current_phase()) {
        Action::CancelWait => CANCELLED.store(true, Ordering::SeqCst),
        Action::Ignore => eprintln!(
            "\n{} Upload in progress; it cannot be interrupted",
            style("!").yellow().bold()
        ),
        Action::Exit => {
            eprintln!("\n{}", style("Interrupted").red().bold());
            std::process::exit(INTERRUPTED_EXIT_CODE);
        },
    });
    if let Err(e) = result {
        debug!("Failed to install Ctrl-C handler: {e}");
    }
}
