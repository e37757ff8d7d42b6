use core::fmt;

/// Error returned by
/// [`Executor::try_spawn`][crate::executor::Executor::try_spawn] when the
/// executor has been stopped and no longer accepts tasks.
///
/// The refusal is synchronous: a future submitted after shutdown is never
/// silently dropped into a queue nobody drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnError;

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("executor is stopped and no longer accepts tasks")
    }
}

impl core::error::Error for SpawnError {}

/// Error returned by a [`JoinHandle`][crate::task::JoinHandle] whose task
/// never produced an output.
///
/// A task ends this way when its future panics while being polled, or when
/// the executor is torn down before the task gets to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinError;

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("task was dropped before producing an output")
    }
}

impl core::error::Error for JoinError {}
