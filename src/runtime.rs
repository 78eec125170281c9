//! Process-wide backend lifecycle
//!
//! The compiler backend has to be initialized before the first conversion and
//! finalized after the last one. [`BackendRuntime`] is the owned handle for
//! that: the first live handle initializes, the last one to go away
//! finalizes, so extra `initialize()` calls are harmless.

use std::sync::atomic::{AtomicUsize, Ordering};

static LIVE_HANDLES: AtomicUsize = AtomicUsize::new(0);

/// Handle keeping the backend initialized.
#[derive(Debug)]
#[must_use = "the backend is finalized as soon as the runtime is dropped"]
pub struct BackendRuntime {
    _private: (),
}

impl BackendRuntime {
    /// Initialize the backend, or join an existing initialization.
    pub fn initialize() -> Self {
        if LIVE_HANDLES.fetch_add(1, Ordering::SeqCst) == 0 {
            log::info!("Initializing shader compiler backend");
        } else {
            log::debug!("Shader compiler backend already initialized");
        }
        Self { _private: () }
    }

    /// Release this handle, finalizing the backend if it was the last one.
    pub fn finalize(self) {
        drop(self);
    }

    /// Whether any handle is currently live.
    pub fn is_initialized() -> bool {
        LIVE_HANDLES.load(Ordering::SeqCst) > 0
    }
}

impl Drop for BackendRuntime {
    fn drop(&mut self) {
        if LIVE_HANDLES.fetch_sub(1, Ordering::SeqCst) == 1 {
            log::info!("Finalizing shader compiler backend");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let first = BackendRuntime::initialize();
        let second = BackendRuntime::initialize();
        assert!(BackendRuntime::is_initialized());

        second.finalize();
        assert!(BackendRuntime::is_initialized());

        // Other tests may hold handles of their own, so only check that
        // releasing ours doesn't break anything
        first.finalize();
    }
}
