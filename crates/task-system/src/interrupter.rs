use std::{
	future::{Future, IntoFuture},
	pin::Pin,
	task::{Context, Poll},
};

use async_channel as chan;
use tokio::sync::oneshot;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionKind {
	Cancel,
}

#[derive(Debug)]
pub(crate) struct InterruptionRequest {
	pub(crate) kind: InterruptionKind,
	pub(crate) ack: oneshot::Sender<()>,
}

impl InterruptionRequest {
	fn acknowledge(self) -> InterruptionKind {
		if self.ack.send(()).is_err() {
			trace!(kind = ?self.kind, "Interruption requester is gone, nobody to acknowledge");
		}

		self.kind
	}
}

/// The task side of a cancel request.
///
/// Requests are acknowledged as soon as the task sees them. Whatever is still queued when the
/// interrupter is dropped gets acknowledged then, so a requester never waits on a task that
/// already finished.
#[derive(Debug)]
pub struct Interrupter {
	rx: chan::Receiver<InterruptionRequest>,
}

impl Interrupter {
	pub(crate) const fn new(rx: chan::Receiver<InterruptionRequest>) -> Self {
		Self { rx }
	}

	/// Returns a pending request without waiting for one.
	pub fn try_check_interrupt(&self) -> Option<InterruptionKind> {
		self.rx.try_recv().ok().map(|request| {
			trace!(kind = ?request.kind, "Task picked up an interruption request");
			request.acknowledge()
		})
	}
}

impl Drop for Interrupter {
	fn drop(&mut self) {
		// Closing first, anything sent afterwards fails on the requester side instead of hanging
		self.rx.close();

		while let Ok(request) = self.rx.try_recv() {
			trace!(kind = ?request.kind, "Acknowledging interruption request the task never saw");
			request.acknowledge();
		}
	}
}

pin_project_lite::pin_project! {
	/// Resolves on the next interruption request.
	#[must_use = "futures do nothing unless polled"]
	pub struct InterrupterFuture<'recv> {
		#[pin]
		recv: chan::Recv<'recv, InterruptionRequest>,
	}
}

impl Future for InterrupterFuture<'_> {
	type Output = InterruptionKind;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match self.project().recv.poll(cx) {
			Poll::Ready(Ok(request)) => Poll::Ready(request.acknowledge()),
			Poll::Ready(Err(chan::RecvError)) => {
				// Every controller is gone, so no request can ever arrive
				warn!("Interruption channel closed, task will run until it finishes");
				Poll::Pending
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

impl<'recv> IntoFuture for &'recv Interrupter {
	type Output = InterruptionKind;
	type IntoFuture = InterrupterFuture<'recv>;

	fn into_future(self) -> Self::IntoFuture {
		InterrupterFuture {
			recv: self.rx.recv(),
		}
	}
}

/// Returns `Ok(ExecStatus::Canceled)` from the enclosing [`Task::run`](crate::Task::run) when a
/// cancel request is pending.
#[macro_export]
macro_rules! check_interruption {
	($interrupter:ident) => {
		let interrupter: &$crate::Interrupter = $interrupter;

		if let Some($crate::InterruptionKind::Cancel) = interrupter.try_check_interrupt() {
			::tracing::trace!("Task stopping on cancel request");
			return Ok($crate::ExecStatus::Canceled);
		}
	};
}
