//! Background ingestion jobs: submission, progress, cancellation and history.
//!
//! Every submitted document runs as one task on the task system. The caller only ever
//! talks to a job through [`JobCommand`]s and the [`JobEvents`] receiver returned on
//! submission, a job never shares mutable state with its caller.

use crate::{
	config::{ConfigError, PipelineConfig},
	frames::FrameSynthesizer,
	review::ReviewSession,
};

use forge_task_system::{
	TaskHandle, TaskOutput, TaskRemoteController, TaskStatus, TaskSystem, TaskSystemError,
};

use std::sync::Arc;

use async_channel as chan;
use tokio::spawn;
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

mod blocking;
mod error;
mod progress;
mod protocol;
mod registry;
mod store;
mod task;
mod types;

pub use error::{JobError, ProtocolError};
pub use protocol::{JobCommand, JobEvent, JobEvents};
pub use store::{ArtifactStore, JobArtifacts, MemoryArtifactStore, StoreError};
pub use types::{JobFailure, JobId, JobState, JobSummary, OwnerId, ProcessingJob};

use progress::ProgressReporter;
use registry::{CancelRequest, Finalization, JobRegistry};
use task::{IngestOutput, IngestTask};

#[derive(Debug)]
struct Inner {
	config: Arc<PipelineConfig>,
	registry: JobRegistry,
	store: Arc<dyn ArtifactStore>,
	system: TaskSystem<JobError>,
	synthesizer: Arc<FrameSynthesizer>,
}

/// Entry point of the ingestion pipeline. Cheap to clone, every clone drives the same jobs.
///
/// Must be created from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct Coordinator {
	inner: Arc<Inner>,
}

impl Coordinator {
	/// Builds a coordinator keeping artifacts in memory.
	pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
		Self::with_store(config, Arc::new(MemoryArtifactStore::new()))
	}

	pub fn with_store(
		config: PipelineConfig,
		store: Arc<dyn ArtifactStore>,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let synthesizer = Arc::new(FrameSynthesizer::new(config.frame_catalog.clone()));

		Ok(Self {
			inner: Arc::new(Inner {
				config: Arc::new(config),
				registry: JobRegistry::default(),
				store,
				system: TaskSystem::new(),
				synthesizer,
			}),
		})
	}

	#[must_use]
	pub fn config(&self) -> &PipelineConfig {
		&self.inner.config
	}

	/// The synthesizer jobs use, built from the configured catalog.
	#[must_use]
	pub fn synthesizer(&self) -> &FrameSynthesizer {
		&self.inner.synthesizer
	}

	/// Queues a document for ingestion and returns right away.
	///
	/// The returned receiver is the only one for this job, it yields progress events
	/// followed by exactly one terminal event.
	#[instrument(skip(self, buffer), fields(bytes = buffer.len()), err)]
	pub async fn submit(
		&self,
		owner_id: OwnerId,
		job_id: JobId,
		buffer: Vec<u8>,
	) -> Result<JobEvents, ProtocolError> {
		if job_id.is_nil() {
			return Err(ProtocolError::MalformedJobId);
		}

		if buffer.is_empty() {
			return Err(ProtocolError::EmptyBuffer);
		}

		let Inner {
			config,
			registry,
			system,
			synthesizer,
			..
		} = &*self.inner;

		registry.insert(job_id, owner_id).await?;

		let (events_tx, events_rx) = chan::unbounded();

		let dispatched = system
			.dispatch(IngestTask::new(
				job_id,
				buffer,
				Arc::clone(config),
				Arc::clone(synthesizer),
				ProgressReporter::new(job_id, registry.clone(), events_tx.clone()),
			))
			.await;

		let handle = match dispatched {
			Ok(handle) => handle,
			Err(e) => {
				for event in self.fail(job_id, &JobError::from(e)).await {
					send_event(&events_tx, event).await;
				}
				return Ok(JobEvents::new(job_id, events_rx));
			}
		};

		if registry
			.attach_controller(job_id, handle.remote_controller())
			.await
		{
			trace!(%job_id, "Job was cancelled before its task started");
			cancel_in_background(handle.remote_controller());
		}

		debug!(%job_id, %owner_id, "Job submitted");

		spawn(
			self.clone()
				.supervise(job_id, handle, events_tx)
				.in_current_span(),
		);

		Ok(JobEvents::new(job_id, events_rx))
	}

	/// Message based entry point, returning the events receiver for submissions.
	pub async fn handle(&self, command: JobCommand) -> Result<Option<JobEvents>, ProtocolError> {
		match command {
			JobCommand::Submit {
				job_id,
				owner_id,
				buffer,
			} => self.submit(owner_id, job_id, buffer).await.map(Some),

			JobCommand::Cancel(job_id) => self.cancel(job_id).await.map(|_| None),
		}
	}

	/// Asks a running job to stop at its next safe point.
	///
	/// Returns `true` when the request was registered on a live job, which then ends as
	/// [`JobState::Cancelled`] whatever it was doing. Jobs already over are left as they are.
	#[instrument(skip(self), err)]
	pub async fn cancel(&self, job_id: JobId) -> Result<bool, ProtocolError> {
		match self.inner.registry.request_cancel(job_id).await? {
			CancelRequest::Terminal => {
				trace!("Job already finished, nothing to cancel");
				Ok(false)
			}

			CancelRequest::Registered(controller) => {
				if let Some(controller) = controller {
					cancel_in_background(controller);
				}

				Ok(true)
			}
		}
	}

	/// Full record of a job, with its artifacts once completed.
	pub async fn job(&self, job_id: JobId) -> Option<ProcessingJob> {
		let mut job = self.inner.registry.get(job_id).await?;

		if let Some(artifacts) = self.inner.store.get(job_id).await {
			job.document = Some(artifacts.document);
			job.layers = artifacts.layers.clone();
			job.frames = artifacts.frames.clone();
		}

		Some(job)
	}

	/// Jobs of an owner, in submission order.
	pub async fn list_jobs(&self, owner_id: OwnerId) -> Vec<JobSummary> {
		self.inner.registry.summaries(owner_id).await
	}

	/// Forgets a job, stopping it if still running and dropping its stored artifacts.
	///
	/// Returns `false` for unknown jobs.
	#[instrument(skip(self))]
	pub async fn delete_job(&self, job_id: JobId) -> bool {
		let Some(controller) = self.inner.registry.remove(job_id).await else {
			return false;
		};

		if let Some(controller) = controller {
			if let Err(e) = controller.cancel().await {
				warn!(?e, "Failed to cancel deleted job task");
			}
		}

		if self.inner.store.delete(job_id).await {
			trace!("Removed job artifacts");
		}

		info!("Job deleted");

		true
	}

	/// Opens a review over the artifacts of a completed job.
	pub async fn open_review(&self, job_id: JobId) -> Result<ReviewSession, ProtocolError> {
		let job = self
			.inner
			.registry
			.get(job_id)
			.await
			.ok_or(ProtocolError::UnknownJob(job_id))?;

		if job.state != JobState::Completed {
			return Err(ProtocolError::JobNotCompleted(job_id));
		}

		let artifacts = self
			.inner
			.store
			.get(job_id)
			.await
			.ok_or(ProtocolError::JobNotCompleted(job_id))?;

		Ok(ReviewSession::new(
			artifacts.document,
			artifacts.layers.clone(),
			artifacts.frames.clone(),
		))
	}

	/// Rejects new submissions and cancels every running job.
	pub async fn shutdown(&self) {
		self.inner.system.shutdown().await;
	}

	#[instrument(skip(self, handle, events_tx))]
	async fn supervise(
		self,
		job_id: JobId,
		handle: TaskHandle<JobError>,
		events_tx: chan::Sender<JobEvent>,
	) {
		let events = match handle.await {
			Ok(TaskStatus::Done((_, TaskOutput::Out(out)))) => {
				match out.downcast::<IngestOutput>() {
					Ok(out) => self.complete(job_id, *out).await,
					Err(_) => {
						self.fail(job_id, &JobError::Panic("unexpected job output".to_string()))
							.await
					}
				}
			}

			Ok(TaskStatus::Done((_, TaskOutput::Empty))) => {
				self.fail(job_id, &JobError::Panic("job produced no output".to_string()))
					.await
			}

			Ok(TaskStatus::Canceled) => {
				self.inner
					.registry
					.finalize(job_id, Finalization::Cancelled)
					.await;
				info!("Job cancelled");
				vec![JobEvent::Cancelled { job_id }]
			}

			Ok(TaskStatus::Error(e)) => self.fail(job_id, &e).await,

			Err(TaskSystemError::TaskJoin(_)) => {
				self.fail(job_id, &JobError::Panic("job task panicked".to_string()))
					.await
			}

			Err(e) => self.fail(job_id, &JobError::from(e)).await,
		};

		for event in events {
			send_event(&events_tx, event).await;
		}
	}

	async fn complete(&self, job_id: JobId, out: IngestOutput) -> Vec<JobEvent> {
		let IngestOutput {
			document,
			layers,
			frames,
		} = out;

		let (layer_count, frame_count) = (layers.len(), frames.len());

		let artifacts = Arc::new(JobArtifacts {
			document,
			layers,
			frames,
		});

		if let Err(e) = self.inner.store.put(job_id, Arc::clone(&artifacts)).await {
			return self.fail(job_id, &JobError::from(e)).await;
		}

		let state = self
			.inner
			.registry
			.finalize(
				job_id,
				Finalization::Completed {
					layer_count,
					frame_count,
				},
			)
			.await;

		if state == Some(JobState::Completed) {
			info!(layer_count, frame_count, "Job completed");

			vec![
				JobEvent::Progress {
					job_id,
					percent: 100,
					step: "Completed".to_string(),
				},
				JobEvent::Result {
					job_id,
					document: artifacts.document,
					layers: artifacts.layers.clone(),
					frames: artifacts.frames.clone(),
				},
			]
		} else {
			// Cancelled or deleted while finishing up, what was produced goes away
			self.inner.store.delete(job_id).await;
			info!("Job cancelled while completing, discarding results");
			vec![JobEvent::Cancelled { job_id }]
		}
	}

	async fn fail(&self, job_id: JobId, e: &JobError) -> Vec<JobEvent> {
		let state = self
			.inner
			.registry
			.finalize(job_id, Finalization::Failed(e.into()))
			.await;

		if state == Some(JobState::Failed) {
			error!(%job_id, kind = e.kind(), "Job failed: {e:#?}");

			vec![JobEvent::Error {
				job_id,
				kind: e.kind().to_string(),
				message: e.to_string(),
			}]
		} else {
			info!(%job_id, "Job cancelled before its failure was reported");
			vec![JobEvent::Cancelled { job_id }]
		}
	}
}

/// Not awaiting the ack, the task only acknowledges at its next interruption check.
fn cancel_in_background(controller: TaskRemoteController) {
	spawn(
		async move {
			if let Err(e) = controller.cancel().await {
				warn!(?e, "Failed to cancel job task");
			}
		}
		.in_current_span(),
	);
}

async fn send_event(events_tx: &chan::Sender<JobEvent>, event: JobEvent) {
	if events_tx.send(event).await.is_err() {
		trace!("Job events receiver dropped");
	}
}
