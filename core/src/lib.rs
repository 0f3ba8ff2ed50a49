//! Layered design ingestion and frame synthesis.
//!
//! A document is submitted to the [`Coordinator`], which decodes it, rasterizes every layer
//! and synthesizes a set of frame templates in the background. Completed jobs are reviewed
//! through a [`ReviewSession`], while a [`LayerOrganizer`] keeps track of which top level
//! layers the operator wants frames built from.
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

pub mod config;
pub mod error;
pub mod frames;
pub mod job;
pub mod logging;
pub mod organizer;
pub mod review;

pub use config::{ConfigError, PipelineConfig};
pub use error::FileIOError;
pub use frames::{
	FrameCatalog, FrameConfig, FrameRegion, FrameStyle, FrameSynthesizer, FrameVariant,
	GeneratedFrame, LayerPick, Rarity, RegionTemplate, SynthesisError,
};
pub use job::{
	ArtifactStore, Coordinator, JobArtifacts, JobCommand, JobError, JobEvent, JobEvents,
	JobFailure, JobId, JobState, JobSummary, MemoryArtifactStore, OwnerId, ProcessingJob,
	ProtocolError, StoreError,
};
pub use logging::{LoggingConfig, LoggingError};
pub use organizer::{LayerOrganizer, OrganizerCommand, OrganizerError, Placement};
pub use review::{RenderItem, ReviewError, ReviewSession, SerializedTemplate};
