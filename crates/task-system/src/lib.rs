//! Cancellable background work on top of tokio.
//!
//! A [`TaskSystem`] spawns every dispatched [`Task`] on its own tokio task and hands back a
//! [`TaskHandle`] resolving to the task's [`TaskStatus`]. Cancellation never aborts a future
//! midway: a [`TaskRemoteController`] sends a request that the task picks up from its
//! [`Interrupter`] whenever it reaches a point where stopping leaves nothing half done.
//! A panicking task resolves its handle with [`TaskSystemError::TaskJoin`].
//!
//! ```
//! use forge_task_system::{
//!     check_interruption, ExecStatus, Interrupter, IntoAnyTaskOutput, Task, TaskId, TaskOutput,
//!     TaskStatus, TaskSystem,
//! };
//! use async_trait::async_trait;
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("never happens")]
//! struct Never;
//!
//! #[derive(Debug)]
//! struct Sum {
//!     id: TaskId,
//!     values: Vec<u64>,
//! }
//!
//! #[async_trait]
//! impl Task<Never> for Sum {
//!     fn id(&self) -> TaskId {
//!         self.id
//!     }
//!
//!     async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, Never> {
//!         let mut total: u64 = 0;
//!         for value in &self.values {
//!             check_interruption!(interrupter);
//!             total += value;
//!         }
//!
//!         Ok(ExecStatus::Done(total.into_output()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let system = TaskSystem::new();
//!
//!     let handle = system
//!         .dispatch(Sum { id: TaskId::new_v4(), values: vec![1, 2, 3] })
//!         .await
//!         .unwrap();
//!
//!     let Ok(TaskStatus::Done((_, TaskOutput::Out(out)))) = handle.await else {
//!         unreachable!();
//!     };
//!     assert_eq!(*out.downcast::<u64>().unwrap(), 6);
//!
//!     system.shutdown().await;
//! }
//! ```
#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod error;
mod handle;
mod interrupter;
mod system;
mod task;

pub use error::{RunError, SystemError as TaskSystemError};
pub use handle::{TaskHandle, TaskPhase, TaskRemoteController};
pub use interrupter::{Interrupter, InterrupterFuture, InterruptionKind};
pub use system::System as TaskSystem;
pub use task::{
	AnyTaskOutput, ExecStatus, IntoAnyTaskOutput, IntoTask, Task, TaskId, TaskOutput, TaskStatus,
};
