use std::{error::Error, fmt};

use super::task::TaskId;

/// Errors returned by tasks. Every task dispatched to the same [`System`](crate::TaskSystem)
/// must share the same error type.
pub trait RunError: Error + fmt::Debug + Send + Sync + 'static {}

impl<T: Error + fmt::Debug + Send + Sync + 'static> RunError for T {}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
	#[error("task join error <id='{0}'>")]
	TaskJoin(TaskId),
	#[error("task system is shutting down, rejected task <id='{0}'>")]
	Shutdown(TaskId),
}
