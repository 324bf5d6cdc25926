use alloc::{boxed::Box, string::String, vec::Vec};
use core::{future::Future, pin::Pin};
use tracing::{debug, error};

use crate::{errors::FinalizationErrorKind, utils::future::BoxFuture};

/// Deferred async completion of a generator-style recipe, built eagerly and
/// awaited once at teardown.
pub type AsyncCleanup = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;

pub(crate) type AsyncFinalizeFn =
    Box<dyn for<'a> FnOnce(Option<&'a anyhow::Error>) -> BoxFuture<'a, Result<(), anyhow::Error>> + Send>;

struct FinalizerEntry {
    component: String,
    seq: u64,
    action: AsyncFinalizeFn,
}

/// Async mirror of the sync finalizer stack: newest-first drain, each step
/// awaited in isolation.
#[derive(Default)]
pub(crate) struct FinalizerStack {
    entries: Vec<FinalizerEntry>,
}

impl FinalizerStack {
    pub(crate) fn push(&mut self, component: String, seq: u64, action: AsyncFinalizeFn) {
        self.entries.push(FinalizerEntry { component, seq, action });
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn take(&mut self) -> Self {
        Self {
            entries: core::mem::take(&mut self.entries),
        }
    }

    pub(crate) async fn drain(mut self, cause: Option<&anyhow::Error>) -> Result<(), FinalizationErrorKind> {
        let mut failures = Vec::new();

        while let Some(entry) = self.entries.pop() {
            match (entry.action)(cause).await {
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
