use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cooperative cancellation capability, passed explicitly down the call
/// stack instead of relying on ambient control flow (panics, exceptions) to
/// unwind work — the shape spec.md §9 asks for directly: "a capability
/// object, not ambient control flow."
///
/// Cancelling a scope cancels every scope created from it via `child()`.
/// Cancelling a child has no effect on its parent or siblings — fail-fast
/// within one dependency-graph level must not reach into levels that have
/// already finished or the run's root scope.
#[derive(Debug, Clone)]
pub struct CancelScope {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancelScope>>,
}

impl CancelScope {
    #[must_use]
    pub fn root() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: None,
        }
    }

    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// Resolves once this scope (or any ancestor) is cancelled. Polls on a
    /// short interval rather than using a notify primitive — cancellation
    /// here races against subprocess wall time measured in seconds, not a
    /// latency-sensitive path.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn root_starts_uncancelled() {
        let root = CancelScope::root();
        assert!(!root.is_cancelled());
    }

    #[test]
    fn cancelling_root_propagates_to_child() {
        let root = CancelScope::root();
        let child = root.child();
        root.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn cancelling_child_does_not_affect_parent_or_siblings() {
        let root = CancelScope::root();
        let a = root.child();
        let b = root.child();
        a.cancel();
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn grandchild_sees_root_cancellation() {
        let root = CancelScope::root();
        let level = root.child();
        let check = level.child();
        root.cancel();
        assert!(check.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_cancel() {
        let root = CancelScope::root();
        let scope = root.clone();
        let handle = tokio::spawn(async move { scope.cancelled().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        root.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("cancellation future should resolve")
            .expect("task should not panic");
    }
}
