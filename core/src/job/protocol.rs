use crate::frames::GeneratedFrame;

use forge_psd::{Document, LayerTree};

use async_channel as chan;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{JobId, OwnerId};

/// Messages a caller sends to the coordinator.
#[derive(Debug, Clone)]
pub enum JobCommand {
	Submit {
		job_id: JobId,
		owner_id: OwnerId,
		buffer: Vec<u8>,
	},
	Cancel(JobId),
}

/// Messages a job sends back to whoever submitted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
	Progress {
		job_id: JobId,
		percent: u8,
		step: String,
	},
	Result {
		job_id: JobId,
		document: Document,
		layers: LayerTree,
		frames: Vec<GeneratedFrame>,
	},
	Error {
		job_id: JobId,
		kind: String,
		message: String,
	},
	Cancelled {
		job_id: JobId,
	},
}

impl JobEvent {
	#[must_use]
	pub const fn job_id(&self) -> JobId {
		match self {
			Self::Progress { job_id, .. }
			| Self::Result { job_id, .. }
			| Self::Error { job_id, .. }
			| Self::Cancelled { job_id } => *job_id,
		}
	}

	/// Whether no other event follows this one.
	#[must_use]
	pub const fn is_terminal(&self) -> bool {
		!matches!(self, Self::Progress { .. })
	}
}

/// The receiving end of one job's events. There is exactly one per job.
#[derive(Debug)]
pub struct JobEvents {
	job_id: JobId,
	rx: chan::Receiver<JobEvent>,
}

impl JobEvents {
	pub(crate) const fn new(job_id: JobId, rx: chan::Receiver<JobEvent>) -> Self {
		Self { job_id, rx }
	}

	#[must_use]
	pub const fn job_id(&self) -> JobId {
		self.job_id
	}

	/// Next event, or `None` once the job is over and every event was received.
	pub async fn recv(&self) -> Option<JobEvent> {
		self.rx.recv().await.ok()
	}

	/// Skips progress events and resolves with the terminal one.
	pub async fn wait_terminal(self) -> Option<JobEvent> {
		while let Some(event) = self.recv().await {
			if event.is_terminal() {
				return Some(event);
			}
			trace!(job_id = %self.job_id, ?event, "Skipping progress event");
		}

		None
	}

	/// Every event until the channel closes, in emission order.
	pub async fn collect(self) -> Vec<JobEvent> {
		let mut events = vec![];
		while let Some(event) = self.recv().await {
			events.push(event);
		}
		events
	}
}
