//! Process termination.

/// Exit status for a fault during request processing or a startup error.
pub const EXIT_FAULT: i32 = 1;

/// Ends the process.
///
/// The dispatcher never returns to the loop after calling [`ProcessExit::exit`].
pub trait ProcessExit: Send + Sync + 'static {
    fn exit(&self, code: i32) -> !;
}

/// Terminates the real process.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdProcessExit;

impl ProcessExit for StdProcessExit {
    fn exit(&self, code: i32) -> ! {
        std::process::exit(code)
    }
}
