//! Drop guard that runs cleanup even when a task unwinds.

/// Guard that runs cleanup when dropped.
pub struct CleanupGuard {
    cleanup: Option<Box<dyn FnOnce() + Send>>,
}

impl CleanupGuard {
    /// Creates a new cleanup guard.
    pub fn new<F>(cleanup: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    /// Disarms the guard, preventing cleanup from running.
    pub fn disarm(&mut self) {
        self.cleanup = None;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl std::fmt::Debug for CleanupGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupGuard")
            .field("armed", &self.cleanup.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_cleanup_guard_runs_on_drop() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let cleaned_clone = cleaned.clone();
        {
            let _guard = CleanupGuard::new(move || cleaned_clone.store(true, Ordering::SeqCst));
        }
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cleanup_guard_runs_on_unwind() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let cleaned_clone = cleaned.clone();

        let result = std::panic::catch_unwind(move || {
            let _guard = CleanupGuard::new(move || cleaned_clone.store(true, Ordering::SeqCst));
            panic!("stage blew up");
        });

        assert!(result.is_err());
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cleanup_guard_disarm() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let cleaned_clone = cleaned.clone();
        {
            let mut guard = CleanupGuard::new(move || cleaned_clone.store(true, Ordering::SeqCst));
            guard.disarm();
        }
        assert!(!cleaned.load(Ordering::SeqCst));
    }
}
