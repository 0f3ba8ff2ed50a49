use crate::frames::SynthesisError;

use forge_psd::DecodeError;
use forge_task_system::TaskSystemError;

use super::{store::StoreError, JobFailure, JobId};

/// Failures that end a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
	#[error(transparent)]
	Decode(#[from] DecodeError),
	#[error(transparent)]
	Synthesis(#[from] SynthesisError),
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error("job worker panicked: {0}")]
	Panic(String),
	#[error(transparent)]
	Task(#[from] TaskSystemError),
}

impl JobError {
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Decode(e) => e.kind(),
			Self::Synthesis(e) => e.kind(),
			Self::Store(_) => "store",
			Self::Panic(_) => "internal_panic",
			Self::Task(_) => "task_system",
		}
	}
}

impl From<&JobError> for JobFailure {
	fn from(e: &JobError) -> Self {
		Self {
			kind: e.kind().to_string(),
			message: e.to_string(),
		}
	}
}

/// Rejections at the submission and command boundary.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
	#[error("a job with id {0} was already submitted")]
	DuplicateJobId(JobId),
	#[error("job ids must not be nil")]
	MalformedJobId,
	#[error("the submitted document is empty")]
	EmptyBuffer,
	#[error("no job with id {0}")]
	UnknownJob(JobId),
	#[error("job {0} did not complete, there is nothing to review")]
	JobNotCompleted(JobId),
}

impl ProtocolError {
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::DuplicateJobId(_) => "duplicate_job_id",
			Self::MalformedJobId => "malformed_job_id",
			Self::EmptyBuffer => "empty_buffer",
			Self::UnknownJob(_) => "unknown_job",
			Self::JobNotCompleted(_) => "job_not_completed",
		}
	}
}
