//! Wires `SIGINT`/`SIGTERM` to the shutdown flag and `SIGHUP` to a
//! separate reload flag, matching the reference daemon's distinct shutdown
//! and reload signal handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::flag;

/// Errors installing signal handlers.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("registering signal handler: {0}")]
    Register(#[from] std::io::Error),
}

/// Registers `SIGINT` and `SIGTERM` to set `shutdown`, and `SIGHUP` to set
/// `reload`. Both are edge-triggered flags observed by [`crate::Server`]'s
/// event loop, which performs the actual shutdown or [`crate::reload`]
/// sequence and, for `reload`, clears the flag once the cycle completes.
pub fn install(shutdown: &Arc<AtomicBool>, reload: &Arc<AtomicBool>) -> Result<(), SignalError> {
    for signal in [SIGINT, SIGTERM] {
        flag::register(signal, Arc::clone(shutdown))?;
    }
    flag::register(SIGHUP, Arc::clone(reload))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_succeeds() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let reload = Arc::new(AtomicBool::new(false));
        install(&shutdown, &reload).unwrap();
        assert!(!shutdown.load(Ordering::Relaxed));
        assert!(!reload.load(Ordering::Relaxed));
    }
}
