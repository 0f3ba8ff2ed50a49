use async_channel as chan;
use tracing::trace;

use super::{registry::JobRegistry, JobEvent, JobId, JobState};

/// Publishes a job's progress to its registry entry and to its event channel.
///
/// Percentages never go backwards, lower values are raised to the last one reported.
#[derive(Debug)]
pub(crate) struct ProgressReporter {
	job_id: JobId,
	registry: JobRegistry,
	events_tx: chan::Sender<JobEvent>,
	last_percent: u8,
}

impl ProgressReporter {
	pub const fn new(job_id: JobId, registry: JobRegistry, events_tx: chan::Sender<JobEvent>) -> Self {
		Self {
			job_id,
			registry,
			events_tx,
			last_percent: 0,
		}
	}

	pub async fn report(&mut self, state: JobState, percent: u8, step: &str) {
		let percent = percent.min(100).max(self.last_percent);
		self.last_percent = percent;

		trace!(job_id = %self.job_id, %percent, %state, step, "Job progress");

		self.registry
			.update_progress(self.job_id, state, percent, step)
			.await;

		if self
			.events_tx
			.send(JobEvent::Progress {
				job_id: self.job_id,
				percent,
				step: step.to_string(),
			})
			.await
			.is_err()
		{
			trace!(job_id = %self.job_id, "Job events receiver dropped");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use uuid::Uuid;

	#[tokio::test]
	async fn percentages_never_decrease() {
		let registry = JobRegistry::default();
		let job_id = JobId::new();
		registry.insert(job_id, Uuid::new_v4()).await.unwrap();

		let (tx, rx) = chan::unbounded();
		let mut reporter = ProgressReporter::new(job_id, registry.clone(), tx);

		reporter.report(JobState::Decoding, 30, "Extracting layers").await;
		reporter.report(JobState::Decoding, 10, "Decoding document").await;
		reporter.report(JobState::Rasterizing, 250, "Rasterizing layers").await;
		drop(reporter);

		let mut percents = vec![];
		while let Ok(JobEvent::Progress { percent, .. }) = rx.recv().await {
			percents.push(percent);
		}

		assert_eq!(percents, [30, 30, 100]);
		assert_eq!(registry.get(job_id).await.unwrap().progress, 100);
	}
}
