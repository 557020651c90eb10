use crate::error::{EngineError, EngineResult};

/// Run `attempt` again while it loses compare-and-set races, up to
/// `max_retries` extra times. Only for writes that are safe to repeat.
pub(crate) fn on_conflict<T>(
    operation: &'static str,
    max_retries: u32,
    mut attempt: impl FnMut() -> EngineResult<T>,
) -> EngineResult<T> {
    let mut retries = 0;
    loop {
        match attempt() {
            Err(EngineError::ConcurrentModification(msg)) if retries < max_retries => {
                retries += 1;
                tracing::debug!(operation, retries, conflict = %msg, "retrying after concurrent modification");
            }
            other => return other,
        }
    }
}
