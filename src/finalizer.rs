use alloc::{boxed::Box, string::String, vec::Vec};
use tracing::{debug, error};

use crate::errors::FinalizationErrorKind;

/// Deferred completion of a generator-style recipe.
pub type Cleanup = Box<dyn FnOnce() -> Result<(), anyhow::Error> + Send>;

/// A registered teardown action. Receives the error that triggered teardown,
/// or `None` on a clean close.
pub(crate) type FinalizeFn = Box<dyn FnOnce(Option<&anyhow::Error>) -> Result<(), anyhow::Error> + Send>;

pub(crate) struct FinalizerEntry {
    pub(crate) component: String,
    pub(crate) seq: u64,
    pub(crate) action: FinalizeFn,
}

/// Finalizers in registration order; drained back-to-front so components are
/// torn down before their dependencies.
#[derive(Default)]
pub(crate) struct FinalizerStack {
    entries: Vec<FinalizerEntry>,
}

impl FinalizerStack {
    pub(crate) fn push(&mut self, component: String, seq: u64, action: FinalizeFn) {
        self.entries.push(FinalizerEntry { component, seq, action });
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Runs every finalizer, newest first. A failing finalizer never stops
    /// the rest; failures are aggregated with the first as primary cause.
    pub(crate) fn drain(&mut self, cause: Option<&anyhow::Error>) -> Result<(), FinalizationErrorKind> {
        let mut failures = Vec::new();

        while let Some(entry) = self.entries.pop() {
            match (entry.action)(cause) {
                Ok(()) => {
                    debug!(component = %entry.component, seq = entry.seq, "component finalized");
                }
                Err(err) => {
                    error!(component = %entry.component, seq = entry.seq, %err, "finalizer failed");
                    failures.push(err);
                }
            }
        }

        let mut failures = failures.into_iter();
        match failures.next() {
            None => Ok(()),
            Some(primary) => Err(FinalizationErrorKind {
                primary,
                suppressed: failures.collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::FinalizerStack;
    use alloc::{
        boxed::Box,
        format,
        string::{String, ToString as _},
        sync::Arc,
        vec::Vec,
    };
    use anyhow::anyhow;
    use parking_lot::Mutex;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_reverse_order_drain() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut stack = FinalizerStack::default();

        for (seq, name) in ["db", "cache", "app"].into_iter().enumerate() {
            let order = order.clone();
            stack.push(
                String::from(name),
                seq as u64,
                Box::new(move |_cause| {
                    order.lock().push(name);
                    Ok(())
                }),
            );
        }

        stack.drain(None).unwrap();
        assert_eq!(*order.lock(), Vec::from(["app", "cache", "db"]));
        assert_eq!(stack.len(), 0);
    }

    #[test]
    #[traced_test]
    fn test_failure_does_not_stop_drain() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut stack = FinalizerStack::default();

        {
            let order = order.clone();
            stack.push(
                String::from("first"),
                0,
                Box::new(move |_cause| {
                    order.lock().push("first");
                    Ok(())
                }),
            );
        }
        stack.push(String::from("boom_a"), 1, Box::new(|_cause| Err(anyhow!("a failed"))));
        stack.push(String::from("boom_b"), 2, Box::new(|_cause| Err(anyhow!("b failed"))));

        let err = stack.drain(None).unwrap_err();
        // newest-first drain, so `b failed` surfaces as primary
        assert_eq!(err.primary.to_string(), "b failed");
        assert_eq!(err.suppressed.len(), 1);
        assert_eq!(*order.lock(), Vec::from(["first"]));
    }

    #[test]
    #[traced_test]
    fn test_cause_is_forwarded() {
        let saw_cause = Arc::new(Mutex::new(false));
        let mut stack = FinalizerStack::default();

        {
            let saw_cause = saw_cause.clone();
            stack.push(
                String::from("resource"),
                0,
                Box::new(move |cause| {
                    *saw_cause.lock() = cause.is_some();
                    Ok(())
                }),
            );
        }

        let cause = anyhow!("scope body failed");
        stack.drain(Some(&cause)).unwrap();
        assert!(*saw_cause.lock());
    }
}
