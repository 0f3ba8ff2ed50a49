use std::{
	collections::HashMap,
	marker::PhantomData,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use async_channel as chan;
use futures::future::join_all;
use tokio::{
	spawn,
	sync::{oneshot, Mutex},
};
use tracing::{error, instrument, trace, warn, Instrument};

use super::{
	error::{RunError, SystemError},
	handle::{TaskHandle, TaskPhase, TaskRemoteController, TaskState},
	interrupter::Interrupter,
	task::{ExecStatus, IntoTask, Task, TaskId, TaskStatus},
};

type InFlight = Arc<Mutex<HashMap<TaskId, TaskRemoteController>>>;

/// Runs dispatched tasks on the tokio runtime, each one on its own spawned task.
///
/// Must be created and used from within a tokio runtime.
#[derive(Debug)]
pub struct System<E: RunError> {
	in_flight: InFlight,
	is_shutting_down: Arc<AtomicBool>,
	_error: PhantomData<fn() -> E>,
}

impl<E: RunError> Default for System<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl<E: RunError> System<E> {
	#[must_use]
	pub fn new() -> Self {
		Self {
			in_flight: Arc::default(),
			is_shutting_down: Arc::new(AtomicBool::new(false)),
			_error: PhantomData,
		}
	}

	/// Starts running a task right away, returning a handle to await its outcome.
	pub async fn dispatch(&self, into_task: impl IntoTask<E>) -> Result<TaskHandle<E>, SystemError> {
		let task = into_task.into_task();
		let task_id = task.id();

		if self.is_shutting_down.load(Ordering::Acquire) {
			warn!(%task_id, "Task system is shutting down, rejecting task");
			return Err(SystemError::Shutdown(task_id));
		}

		let (interrupt_tx, interrupt_rx) = chan::unbounded();
		let (done_tx, done_rx) = oneshot::channel();

		let controller = TaskRemoteController {
			state: Arc::new(TaskState::new(interrupt_tx)),
			task_id,
		};

		self.in_flight
			.lock()
			.await
			.insert(task_id, controller.clone());

		spawn(
			run_task(
				task,
				Arc::clone(&controller.state),
				Interrupter::new(interrupt_rx),
				done_tx,
				Arc::clone(&self.in_flight),
			)
			.in_current_span(),
		);

		Ok(TaskHandle {
			done_rx,
			controller,
		})
	}

	/// Number of dispatched tasks that didn't finish yet.
	pub async fn in_flight(&self) -> usize {
		self.in_flight.lock().await.len()
	}

	/// Rejects new tasks and cancels every running one.
	///
	/// Tasks stop at their next interruption check, their handles resolve as usual.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		self.is_shutting_down.store(true, Ordering::Release);

		let controllers = self
			.in_flight
			.lock()
			.await
			.values()
			.cloned()
			.collect::<Vec<_>>();

		trace!(count = controllers.len(), "Canceling in flight tasks");

		for res in join_all(controllers.iter().map(TaskRemoteController::cancel)).await {
			if let Err(e) = res {
				error!(?e, "Failed to cancel task during shutdown");
			}
		}
	}
}

#[instrument(skip_all, fields(task_id = %task.id()))]
async fn run_task<E: RunError>(
	mut task: Box<dyn Task<E>>,
	state: Arc<TaskState>,
	interrupter: Interrupter,
	done_tx: oneshot::Sender<Result<TaskStatus<E>, SystemError>>,
	in_flight: InFlight,
) {
	let task_id = task.id();
	let interrupter = Arc::new(interrupter);

	state.set(TaskPhase::Running);
	trace!("Running task");

	// Spawned on its own so a panic surfaces as a join error
	let handle = spawn({
		let interrupter = Arc::clone(&interrupter);
		async move { task.run(&interrupter).await }.in_current_span()
	});

	let res = match handle.await {
		Ok(Ok(ExecStatus::Done(out))) => {
			trace!("Task completed");
			state.set(TaskPhase::Done);
			Ok(TaskStatus::Done((task_id, out)))
		}

		Ok(Ok(ExecStatus::Canceled)) => {
			trace!("Task canceled");
			state.set(TaskPhase::Canceled);
			Ok(TaskStatus::Canceled)
		}

		Ok(Err(e)) => {
			trace!(?e, "Task failed");
			state.set(TaskPhase::Failed);
			Ok(TaskStatus::Error(e))
		}

		Err(e) => {
			if e.is_panic() {
				error!("Task panicked: {e:#?}");
			} else {
				error!("Task join failed: {e:#?}");
			}
			state.set(TaskPhase::Failed);
			Err(SystemError::TaskJoin(task_id))
		}
	};

	in_flight.lock().await.remove(&task_id);

	// Releasing the interrupter acks any cancel request the task didn't get to see
	drop(interrupter);

	if done_tx.send(res).is_err() {
		trace!("Task handle dropped before the task finished");
	}
}
