use std::fmt;

use async_trait::async_trait;
use downcast_rs::{impl_downcast, Downcast};
use uuid::Uuid;

use super::{error::RunError, interrupter::Interrupter};

pub type TaskId = Uuid;

/// Whatever a task hands back when it finishes. Consumers downcast it to the concrete type.
pub trait AnyTaskOutput: Send + Downcast + 'static {}

impl<T: Send + 'static> AnyTaskOutput for T {}

impl_downcast!(AnyTaskOutput);

impl fmt::Debug for Box<dyn AnyTaskOutput> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("<AnyTaskOutput>")
	}
}

/// Boxes any sendable value into a [`TaskOutput`].
pub trait IntoAnyTaskOutput {
	fn into_output(self) -> TaskOutput;
}

impl<T: AnyTaskOutput> IntoAnyTaskOutput for T {
	fn into_output(self) -> TaskOutput {
		TaskOutput::Out(Box::new(self))
	}
}

#[derive(Debug)]
pub enum TaskOutput {
	Out(Box<dyn AnyTaskOutput>),
	Empty,
}

impl From<()> for TaskOutput {
	fn from((): ()) -> Self {
		Self::Empty
	}
}

/// How a dispatched task ended, as seen through its [`TaskHandle`](crate::TaskHandle).
#[derive(Debug)]
pub enum TaskStatus<E: RunError> {
	Done((TaskId, TaskOutput)),
	/// The task saw a cancel request and stopped on its own.
	Canceled,
	Error(E),
}

/// What [`Task::run`] returns when it doesn't fail.
#[derive(Debug)]
pub enum ExecStatus {
	Done(TaskOutput),
	Canceled,
}

pub trait IntoTask<E>: Send {
	fn into_task(self) -> Box<dyn Task<E>>;
}

impl<T: Task<E>, E: RunError> IntoTask<E> for T {
	fn into_task(self) -> Box<dyn Task<E>> {
		Box::new(self)
	}
}

/// A unit of work for the [`TaskSystem`](crate::TaskSystem).
///
/// Cancellation is cooperative: `run` is expected to look at the [`Interrupter`] between
/// steps, usually through [`check_interruption!`](crate::check_interruption), and return
/// [`ExecStatus::Canceled`] when asked to stop.
#[async_trait]
pub trait Task<E: RunError>: Downcast + Send + Sync + 'static {
	fn id(&self) -> TaskId;

	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, E>;
}

impl_downcast!(Task<E> where E: RunError);

impl<E: RunError> fmt::Debug for Box<dyn Task<E>> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<Task id='{}'>", self.id())
	}
}
