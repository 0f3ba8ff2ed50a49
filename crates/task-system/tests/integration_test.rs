use forge_task_system::{TaskOutput, TaskPhase, TaskStatus, TaskSystem, TaskSystemError};

use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use tracing_test::traced_test;

mod common;

use common::{BogusTask, NeverTask, PanicTask, ReadyTask, SampleError, StepTask};

#[tokio::test]
#[traced_test]
async fn done_test() {
	let system = TaskSystem::new();

	let handle = system.dispatch(ReadyTask::new(42)).await.unwrap();
	let task_id = handle.task_id();

	let Ok(TaskStatus::Done((done_id, TaskOutput::Out(out)))) = handle.await else {
		panic!("task should have completed with an output");
	};

	assert_eq!(done_id, task_id);
	assert_eq!(*out.downcast::<u64>().unwrap(), 42);

	system.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn cancel_test() {
	let system = TaskSystem::new();

	let handle = system.dispatch(NeverTask::default()).await.unwrap();

	handle.cancel().await.unwrap();

	assert!(matches!(handle.await, Ok(TaskStatus::Canceled)));

	system.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn error_test() {
	let system = TaskSystem::new();

	let handle = system.dispatch(BogusTask::default()).await.unwrap();

	assert!(matches!(
		handle.await,
		Ok(TaskStatus::Error(SampleError::SampleError))
	));

	system.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn panic_test() {
	let system = TaskSystem::<SampleError>::new();

	let handle = system.dispatch(PanicTask::default()).await.unwrap();
	let task_id = handle.task_id();

	assert!(matches!(
		handle.await,
		Err(TaskSystemError::TaskJoin(id)) if id == task_id
	));

	// The system keeps working after a task panicked
	let handle = system.dispatch(ReadyTask::new(7)).await.unwrap();
	assert!(matches!(handle.await, Ok(TaskStatus::Done(_))));

	system.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn cancel_between_steps_test() {
	let system = TaskSystem::new();

	let (task, began_rx) = StepTask::new(1_000, Duration::from_millis(5));
	let handle = system.dispatch(task).await.unwrap();

	began_rx.await.unwrap();

	// Cancel from a remote controller while another party owns the handle
	let controller = handle.remote_controller();
	let waiter = tokio::spawn(handle);

	controller.cancel().await.unwrap();

	assert!(matches!(waiter.await.unwrap(), Ok(TaskStatus::Canceled)));
	assert_eq!(controller.phase(), TaskPhase::Canceled);

	system.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn cancel_after_done_is_a_no_op() {
	let system = TaskSystem::new();

	let handle = system.dispatch(ReadyTask::new(1)).await.unwrap();
	let controller = handle.remote_controller();

	assert!(matches!(handle.await, Ok(TaskStatus::Done(_))));

	controller.cancel().await.unwrap();
	assert!(controller.is_done());
	assert_eq!(controller.phase(), TaskPhase::Done);

	system.shutdown().await;
}

#[tokio::test]
#[traced_test]
async fn shutdown_test() {
	let system = TaskSystem::new();

	let handles = join_all((0..4).map(|_| system.dispatch(NeverTask::default())))
		.await
		.into_iter()
		.collect::<Result<Vec<_>, _>>()
		.unwrap();

	system.shutdown().await;

	for res in join_all(handles).await {
		assert!(matches!(res, Ok(TaskStatus::Canceled)));
	}

	assert_eq!(system.in_flight().await, 0);

	assert!(matches!(
		system.dispatch(ReadyTask::new(0)).await,
		Err(TaskSystemError::Shutdown(_))
	));
}

#[tokio::test]
#[traced_test]
async fn many_tasks_test() {
	let system = TaskSystem::new();

	let mut rng = rand::thread_rng();
	let answers = (0..64).map(|_| rng.gen::<u64>()).collect::<Vec<_>>();

	let handles = join_all(answers.iter().map(|&answer| system.dispatch(ReadyTask::new(answer))))
		.await
		.into_iter()
		.collect::<Result<Vec<_>, _>>()
		.unwrap();

	for (res, expected) in join_all(handles).await.into_iter().zip(answers) {
		let Ok(TaskStatus::Done((_, TaskOutput::Out(out)))) = res else {
			panic!("task should have completed with an output");
		};
		assert_eq!(*out.downcast::<u64>().unwrap(), expected);
	}

	system.shutdown().await;
}
