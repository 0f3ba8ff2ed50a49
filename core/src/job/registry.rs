use forge_task_system::TaskRemoteController;

use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{trace, warn};

use super::{
	error::ProtocolError, JobFailure, JobId, JobState, JobSummary, OwnerId, ProcessingJob,
};

#[derive(Debug)]
struct JobEntry {
	job: ProcessingJob,
	layer_count: usize,
	frame_count: usize,
	cancel_requested: bool,
	controller: Option<TaskRemoteController>,
}

impl JobEntry {
	fn summary(&self) -> JobSummary {
		JobSummary {
			id: self.job.id,
			owner_id: self.job.owner_id,
			state: self.job.state,
			progress: self.job.progress,
			step: self.job.step.clone(),
			layer_count: self.layer_count,
			frame_count: self.frame_count,
			error: self.job.error.clone(),
			created_at: self.job.created_at,
			completed_at: self.job.completed_at,
		}
	}
}

#[derive(Debug, Default)]
struct Jobs {
	entries: HashMap<JobId, JobEntry>,
	/// Submission order.
	order: Vec<JobId>,
	/// Every id ever submitted, deleted jobs included.
	seen: HashSet<JobId>,
}

/// Outcome of a cancel request.
#[derive(Debug)]
pub(crate) enum CancelRequest {
	/// The job is already over, nothing to do.
	Terminal,
	/// The flag is set; the controller is there if the task was dispatched already.
	Registered(Option<TaskRemoteController>),
}

/// How a job ended, written once by the job's supervisor.
#[derive(Debug)]
pub(crate) enum Finalization {
	Completed {
		layer_count: usize,
		frame_count: usize,
	},
	Failed(JobFailure),
	Cancelled,
}

/// Append only job history. Each job's entry is only written on behalf of that job.
#[derive(Debug, Clone, Default)]
pub(crate) struct JobRegistry {
	jobs: Arc<RwLock<Jobs>>,
}

impl JobRegistry {
	pub async fn insert(&self, job_id: JobId, owner_id: OwnerId) -> Result<(), ProtocolError> {
		let mut jobs = self.jobs.write().await;

		if !jobs.seen.insert(job_id) {
			return Err(ProtocolError::DuplicateJobId(job_id));
		}

		jobs.order.push(job_id);
		jobs.entries.insert(
			job_id,
			JobEntry {
				job: ProcessingJob::new(job_id, owner_id),
				layer_count: 0,
				frame_count: 0,
				cancel_requested: false,
				controller: None,
			},
		);

		Ok(())
	}

	/// Stores the task controller, returning whether a cancel arrived before it.
	pub async fn attach_controller(&self, job_id: JobId, controller: TaskRemoteController) -> bool {
		let mut jobs = self.jobs.write().await;

		jobs.entries.get_mut(&job_id).map_or(true, |entry| {
			entry.controller = Some(controller);
			entry.cancel_requested
		})
	}

	pub async fn request_cancel(&self, job_id: JobId) -> Result<CancelRequest, ProtocolError> {
		let mut jobs = self.jobs.write().await;

		let entry = jobs
			.entries
			.get_mut(&job_id)
			.ok_or(ProtocolError::UnknownJob(job_id))?;

		if entry.job.state.is_terminal() {
			return Ok(CancelRequest::Terminal);
		}

		entry.cancel_requested = true;

		Ok(CancelRequest::Registered(entry.controller.clone()))
	}

	/// Records progress, ignoring anything after the job ended.
	pub async fn update_progress(&self, job_id: JobId, state: JobState, percent: u8, step: &str) {
		let mut jobs = self.jobs.write().await;

		let Some(entry) = jobs.entries.get_mut(&job_id) else {
			return;
		};

		let job = &mut entry.job;

		if job.state != state {
			if !job.state.can_transition_to(state) {
				trace!(%job_id, from = %job.state, to = %state, "Ignoring state change");
				return;
			}
			job.state = state;
		}

		job.progress = job.progress.max(percent);
		step.clone_into(&mut job.step);
	}

	/// Moves the job into its terminal state, returning the state it ended in.
	///
	/// A cancel request registered before this point wins over any other outcome. Returns
	/// `None` if the job was deleted or is already over.
	pub async fn finalize(&self, job_id: JobId, finalization: Finalization) -> Option<JobState> {
		let mut jobs = self.jobs.write().await;

		let entry = jobs.entries.get_mut(&job_id)?;

		if entry.job.state.is_terminal() {
			warn!(%job_id, state = %entry.job.state, "Job was already finalized");
			return None;
		}

		let finalization = if entry.cancel_requested {
			Finalization::Cancelled
		} else {
			finalization
		};

		entry.job.completed_at = Some(Utc::now());
		entry.controller = None;

		match finalization {
			Finalization::Completed {
				layer_count,
				frame_count,
			} => {
				entry.job.state = JobState::Completed;
				entry.job.progress = 100;
				"Completed".clone_into(&mut entry.job.step);
				entry.layer_count = layer_count;
				entry.frame_count = frame_count;
			}
			Finalization::Failed(failure) => {
				entry.job.state = JobState::Failed;
				"Failed".clone_into(&mut entry.job.step);
				entry.job.error = Some(failure);
			}
			Finalization::Cancelled => {
				entry.job.state = JobState::Cancelled;
				"Cancelled".clone_into(&mut entry.job.step);
			}
		}

		Some(entry.job.state)
	}

	pub async fn get(&self, job_id: JobId) -> Option<ProcessingJob> {
		self.jobs
			.read()
			.await
			.entries
			.get(&job_id)
			.map(|entry| entry.job.clone())
	}

	pub async fn summaries(&self, owner_id: OwnerId) -> Vec<JobSummary> {
		let jobs = self.jobs.read().await;

		jobs.order
			.iter()
			.filter_map(|id| jobs.entries.get(id))
			.filter(|entry| entry.job.owner_id == owner_id)
			.map(JobEntry::summary)
			.collect()
	}

	/// Drops the entry, handing back its controller so the caller can stop the task.
	///
	/// The id stays reserved, it can't be submitted again.
	pub async fn remove(&self, job_id: JobId) -> Option<Option<TaskRemoteController>> {
		let mut jobs = self.jobs.write().await;

		let entry = jobs.entries.remove(&job_id)?;
		jobs.order.retain(|id| *id != job_id);

		Some(entry.controller)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use uuid::Uuid;

	#[tokio::test]
	async fn ids_are_never_reused() {
		let registry = JobRegistry::default();
		let (job_id, owner_id) = (JobId::new(), Uuid::new_v4());

		registry.insert(job_id, owner_id).await.unwrap();
		assert_eq!(
			registry.insert(job_id, owner_id).await,
			Err(ProtocolError::DuplicateJobId(job_id))
		);

		assert!(registry.remove(job_id).await.is_some());
		assert_eq!(
			registry.insert(job_id, owner_id).await,
			Err(ProtocolError::DuplicateJobId(job_id))
		);
	}

	#[tokio::test]
	async fn terminal_states_stick() {
		let registry = JobRegistry::default();
		let job_id = JobId::new();

		registry.insert(job_id, Uuid::new_v4()).await.unwrap();
		registry
			.update_progress(job_id, JobState::Decoding, 10, "Decoding document")
			.await;

		assert_eq!(
			registry.finalize(job_id, Finalization::Cancelled).await,
			Some(JobState::Cancelled)
		);
		assert_eq!(
			registry
				.finalize(
					job_id,
					Finalization::Completed {
						layer_count: 1,
						frame_count: 1
					}
				)
				.await,
			None
		);

		registry
			.update_progress(job_id, JobState::Rasterizing, 60, "Rasterizing layers")
			.await;

		let job = registry.get(job_id).await.unwrap();
		assert_eq!(job.state, JobState::Cancelled);
		assert_eq!(job.progress, 10);
		assert!(matches!(
			registry.request_cancel(job_id).await,
			Ok(CancelRequest::Terminal)
		));
	}

	#[tokio::test]
	async fn pending_cancel_wins_over_completion() {
		let registry = JobRegistry::default();
		let job_id = JobId::new();

		registry.insert(job_id, Uuid::new_v4()).await.unwrap();
		assert!(matches!(
			registry.request_cancel(job_id).await,
			Ok(CancelRequest::Registered(None))
		));

		let state = registry
			.finalize(
				job_id,
				Finalization::Completed {
					layer_count: 3,
					frame_count: 4,
				},
			)
			.await;

		assert_eq!(state, Some(JobState::Cancelled));
	}

	#[tokio::test]
	async fn summaries_keep_submission_order_per_owner() {
		let registry = JobRegistry::default();
		let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

		let ids = (0..4).map(|_| JobId::new()).collect::<Vec<_>>();
		for (i, id) in ids.iter().enumerate() {
			registry
				.insert(*id, if i % 2 == 0 { alice } else { bob })
				.await
				.unwrap();
		}

		let listed = registry
			.summaries(alice)
			.await
			.into_iter()
			.map(|summary| summary.id)
			.collect::<Vec<_>>();

		assert_eq!(listed, [ids[0], ids[2]]);
	}
}
