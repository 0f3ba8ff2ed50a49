use forge_task_system::{
	check_interruption, ExecStatus, Interrupter, InterruptionKind, IntoAnyTaskOutput, Task, TaskId,
};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::info;

#[derive(Debug, Error)]
pub enum SampleError {
	#[error("Sample error")]
	SampleError,
}

/// Waits until it gets canceled, forever if nobody does.
#[derive(Debug)]
pub struct NeverTask {
	id: TaskId,
}

impl Default for NeverTask {
	fn default() -> Self {
		Self {
			id: TaskId::new_v4(),
		}
	}
}

#[async_trait]
impl Task<SampleError> for NeverTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		match interrupter.await {
			InterruptionKind::Cancel => {
				info!("Canceling NeverTask <id='{}'>", self.id);
				Ok(ExecStatus::Canceled)
			}
		}
	}
}

#[derive(Debug)]
pub struct ReadyTask {
	id: TaskId,
	answer: u64,
}

impl ReadyTask {
	pub fn new(answer: u64) -> Self {
		Self {
			id: TaskId::new_v4(),
			answer,
		}
	}
}

#[async_trait]
impl Task<SampleError> for ReadyTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		Ok(ExecStatus::Done(self.answer.into_output()))
	}
}

#[derive(Debug, Default)]
pub struct BogusTask {
	id: TaskId,
}

#[async_trait]
impl Task<SampleError> for BogusTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		Err(SampleError::SampleError)
	}
}

#[derive(Debug, Default)]
pub struct PanicTask {
	id: TaskId,
}

#[async_trait]
impl Task<SampleError> for PanicTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, _interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		panic!("PanicTask <id='{}'> always panics", self.id);
	}
}

/// Counts in steps, checking for cancellation between each one.
#[derive(Debug)]
pub struct StepTask {
	id: TaskId,
	steps: u32,
	step_duration: Duration,
	completed: u32,
	began_tx: Option<oneshot::Sender<()>>,
}

impl StepTask {
	pub fn new(steps: u32, step_duration: Duration) -> (Self, oneshot::Receiver<()>) {
		let (began_tx, began_rx) = oneshot::channel();
		(
			Self {
				id: TaskId::new_v4(),
				steps,
				step_duration,
				completed: 0,
				began_tx: Some(began_tx),
			},
			began_rx,
		)
	}
}

#[async_trait]
impl Task<SampleError> for StepTask {
	fn id(&self) -> TaskId {
		self.id
	}

	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, SampleError> {
		if let Some(began_tx) = self.began_tx.take() {
			began_tx.send(()).ok();
		}

		while self.completed < self.steps {
			check_interruption!(interrupter);

			tokio::time::sleep(self.step_duration).await;
			self.completed += 1;
		}

		Ok(ExecStatus::Done(self.completed.into_output()))
	}
}
