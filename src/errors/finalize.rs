use alloc::vec::Vec;

/// Aggregate of one or more finalizer failures during container teardown.
///
/// The first failure encountered (in teardown order) is the primary cause;
/// the rest are kept as suppressed secondaries so none is silently dropped.
#[derive(thiserror::Error, Debug)]
#[error("Finalization failed: {primary} ({} more failure(s) suppressed)", .suppressed.len())]
pub struct FinalizationErrorKind {
    pub primary: anyhow::Error,
    pub suppressed: Vec<anyhow::Error>,
}

/// A scope body failure whose teardown also failed.
///
/// The body error stays the headline; the teardown failure rides the source
/// chain so neither is dropped.
#[derive(thiserror::Error, Debug)]
#[error("{body}")]
pub struct ScopeTeardownError {
    pub body: anyhow::Error,
    #[source]
    pub teardown: FinalizationErrorKind,
}
