/// Why a bounded retry gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt came back without a value.
    Exhausted { attempts: u32 },
    /// An attempt failed outright; no further attempts were made.
    Failed(E),
}

/// Run `attempt` until it yields `Some`, at most `max_attempts` times.
///
/// `attempt` receives the 1-based attempt number. `Ok(None)` asks for another try,
/// `Err` aborts immediately.
pub fn retry_bounded<T, E, F>(max_attempts: u32, mut attempt: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Result<Option<T>, E>,
{
    for n in 1..=max_attempts {
        match attempt(n) {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => continue,
            Err(e) => return Err(RetryError::Failed(e)),
        }
    }
    Err(RetryError::Exhausted {
        attempts: max_attempts,
    })
}
