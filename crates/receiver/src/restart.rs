//! The restart capability.
//!
//! On a device, "restart" is a full system reset; on a host it means exiting
//! so the service manager relaunches the process. Either way the supervisor
//! only sees this trait, which keeps the sequencing testable.

use tracing::info;

/// Restarts the device after an update attempt has reached a terminal state.
pub trait Restart {
    fn restart(&mut self);
}

/// Terminates the process; the service manager (or a hardware watchdog)
/// brings the receiver back up on the new boot selection.
#[derive(Debug, Default)]
pub struct ProcessRestart;

impl Restart for ProcessRestart {
    fn restart(&mut self) {
        info!("restarting system");
        std::process::exit(0);
    }
}
