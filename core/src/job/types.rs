use crate::frames::GeneratedFrame;

use forge_psd::{Document, LayerTree};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the caller owning a job.
pub type OwnerId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}

	#[must_use]
	pub fn is_nil(&self) -> bool {
		self.0.is_nil()
	}

	#[must_use]
	pub const fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl Default for JobId {
	fn default() -> Self {
		Self::new()
	}
}

impl From<Uuid> for JobId {
	fn from(id: Uuid) -> Self {
		Self(id)
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
	Queued,
	Decoding,
	Rasterizing,
	Synthesizing,
	Completed,
	Failed,
	Cancelled,
}

impl JobState {
	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
	}

	const fn stage(self) -> u8 {
		match self {
			Self::Queued => 0,
			Self::Decoding => 1,
			Self::Rasterizing => 2,
			Self::Synthesizing => 3,
			Self::Completed | Self::Failed | Self::Cancelled => 4,
		}
	}

	/// Forward moves along the pipeline, or into failed and cancelled from any live state.
	///
	/// Staying in the same live state is allowed, terminal states never change.
	#[must_use]
	pub const fn can_transition_to(self, next: Self) -> bool {
		if self.is_terminal() {
			return false;
		}

		match next {
			Self::Failed | Self::Cancelled => true,
			_ => next.stage() >= self.stage(),
		}
	}
}

/// Job level failure, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
	pub kind: String,
	pub message: String,
}

/// Everything known about one job, with artifacts once it completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
	pub id: JobId,
	pub owner_id: OwnerId,
	pub state: JobState,
	pub progress: u8,
	pub step: String,
	pub document: Option<Document>,
	pub layers: LayerTree,
	pub frames: Vec<GeneratedFrame>,
	pub error: Option<JobFailure>,
	pub created_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
	pub(crate) fn new(id: JobId, owner_id: OwnerId) -> Self {
		Self {
			id,
			owner_id,
			state: JobState::Queued,
			progress: 0,
			step: "Queued".to_string(),
			document: None,
			layers: LayerTree::default(),
			frames: vec![],
			error: None,
			created_at: Utc::now(),
			completed_at: None,
		}
	}
}

/// A lightweight view of a job for history listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
	pub id: JobId,
	pub owner_id: OwnerId,
	pub state: JobState,
	pub progress: u8,
	pub step: String,
	pub layer_count: usize,
	pub frame_count: usize,
	pub error: Option<JobFailure>,
	pub created_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
}
