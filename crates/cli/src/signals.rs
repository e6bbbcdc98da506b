//! SIGINT/SIGTERM to a process-wide shutdown flag for `nepse serve`.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Set once SIGINT or SIGTERM has been received.
pub fn shutdown_flag() -> &'static AtomicBool {
    &SHUTDOWN
}

#[cfg(unix)]
extern "C" fn on_signal(_signum: libc::c_int) {
    // Only async-signal-safe work here
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to [`shutdown_flag`]. On other platforms the
/// default Ctrl-C behavior (terminate) stays in place.
pub fn install() {
    #[cfg(unix)]
    {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        for signum in [libc::SIGINT, libc::SIGTERM] {
            let previous = unsafe { libc::signal(signum, handler) };
            if previous == libc::SIG_ERR {
                log::warn!("cannot install handler for signal {signum}");
            }
        }
    }
}

/// Trip the flag without a signal.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shutdown_sets_flag() {
        request_shutdown();
        assert!(shutdown_flag().load(Ordering::SeqCst));
    }
}
