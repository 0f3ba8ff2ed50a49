use std::{
	any::Any,
	panic::{self, AssertUnwindSafe},
};

use tokio::{sync::oneshot, task::spawn_blocking};
use tracing::error;

/// Runs CPU bound work on the blocking pool, turning a panic into its message.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, String>
where
	T: Send + 'static,
	F: FnOnce() -> T + Send + 'static,
{
	let (tx, rx) = oneshot::channel();

	// Using a channel instead of the JoinHandle, the handle may take a while longer to resolve
	let handle = spawn_blocking(move || {
		// The receiver handles a dropped sender
		let _ = tx.send(panic::catch_unwind(AssertUnwindSafe(work)).map_err(panic_message));
	});

	if let Ok(res) = rx.await {
		res
	} else {
		error!("Blocking work ended without reporting back");
		Err(handle
			.await
			.err()
			.map_or_else(|| "blocking work vanished".to_string(), |e| e.to_string()))
	}
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
	payload
		.downcast_ref::<&str>()
		.map(ToString::to_string)
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "Internal panic on third party crate".to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn returns_the_value() {
		assert_eq!(run_blocking(|| 6 * 7).await, Ok(42));
	}

	#[tokio::test]
	async fn captures_panics() {
		let res = run_blocking(|| -> u8 { panic!("boom") }).await;

		assert_eq!(res, Err("boom".to_string()));
	}
}
