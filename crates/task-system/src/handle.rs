use std::{
	future::Future,
	pin::Pin,
	sync::{
		atomic::{AtomicU8, Ordering},
		Arc,
	},
	task::{Context, Poll},
};

use async_channel as chan;
use tokio::sync::oneshot;
use tracing::{instrument, trace};

use super::{
	error::{RunError, SystemError},
	interrupter::{InterruptionKind, InterruptionRequest},
	task::{TaskId, TaskStatus},
};

/// Where a dispatched task is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskPhase {
	Queued = 0,
	Running = 1,
	Done = 2,
	Canceled = 3,
	Failed = 4,
}

impl TaskPhase {
	const fn from_u8(value: u8) -> Self {
		match value {
			0 => Self::Queued,
			1 => Self::Running,
			2 => Self::Done,
			3 => Self::Canceled,
			_ => Self::Failed,
		}
	}

	#[must_use]
	pub const fn is_finished(self) -> bool {
		matches!(self, Self::Done | Self::Canceled | Self::Failed)
	}
}

/// Shared between the running task and all of its controllers.
#[derive(Debug)]
pub(crate) struct TaskState {
	phase: AtomicU8,
	interrupt_tx: chan::Sender<InterruptionRequest>,
}

impl TaskState {
	pub(crate) fn new(interrupt_tx: chan::Sender<InterruptionRequest>) -> Self {
		Self {
			phase: AtomicU8::new(TaskPhase::Queued as u8),
			interrupt_tx,
		}
	}

	pub(crate) fn set(&self, phase: TaskPhase) {
		self.phase.store(phase as u8, Ordering::Release);
	}

	pub(crate) fn phase(&self) -> TaskPhase {
		TaskPhase::from_u8(self.phase.load(Ordering::Acquire))
	}
}

/// Controls a task from anywhere, cheap to clone.
#[derive(Debug, Clone)]
pub struct TaskRemoteController {
	pub(crate) state: Arc<TaskState>,
	pub(crate) task_id: TaskId,
}

impl TaskRemoteController {
	#[must_use]
	pub const fn task_id(&self) -> TaskId {
		self.task_id
	}

	#[must_use]
	pub fn phase(&self) -> TaskPhase {
		self.state.phase()
	}

	#[must_use]
	pub fn is_done(&self) -> bool {
		self.phase().is_finished()
	}

	/// Asks the task to stop at its next interruption check.
	///
	/// Resolves once the task acknowledged the request, or right away if it already finished.
	/// The outcome itself is still reported through the [`TaskHandle`].
	#[instrument(skip(self), fields(task_id = %self.task_id))]
	pub async fn cancel(&self) -> Result<(), SystemError> {
		let phase = self.phase();
		if phase.is_finished() {
			trace!(?phase, "Task already finished, nothing to cancel");
			return Ok(());
		}

		let (ack_tx, ack_rx) = oneshot::channel();

		if self
			.state
			.interrupt_tx
			.send(InterruptionRequest {
				kind: InterruptionKind::Cancel,
				ack: ack_tx,
			})
			.await
			.is_err()
		{
			trace!("Task released its interrupter, it is finishing on its own");
			return Ok(());
		}

		if ack_rx.await.is_err() {
			trace!("Cancel request dropped without acknowledgement");
		}

		Ok(())
	}
}

/// Returned by [`TaskSystem::dispatch`](crate::TaskSystem::dispatch). Await it for the outcome.
#[derive(Debug)]
pub struct TaskHandle<E: RunError> {
	pub(crate) done_rx: oneshot::Receiver<Result<TaskStatus<E>, SystemError>>,
	pub(crate) controller: TaskRemoteController,
}

impl<E: RunError> Future for TaskHandle<E> {
	type Output = Result<TaskStatus<E>, SystemError>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let task_id = self.controller.task_id;

		Pin::new(&mut self.done_rx)
			.poll(cx)
			.map(|res| res.unwrap_or(Err(SystemError::TaskJoin(task_id))))
	}
}

impl<E: RunError> TaskHandle<E> {
	#[must_use]
	pub const fn task_id(&self) -> TaskId {
		self.controller.task_id
	}

	pub async fn cancel(&self) -> Result<(), SystemError> {
		self.controller.cancel().await
	}

	/// A controller that outlives the handle, for when the handle is moved into whoever awaits it.
	#[must_use]
	pub fn remote_controller(&self) -> TaskRemoteController {
		self.controller.clone()
	}
}
