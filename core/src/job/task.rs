use crate::{
	config::PipelineConfig,
	frames::{FrameSynthesizer, GeneratedFrame},
};

use forge_images::rasterize;
use forge_psd::{decode, DecodedDocument, Document, ImageHandle, LayerFailure, LayerTree};
use forge_task_system::{
	check_interruption, ExecStatus, Interrupter, IntoAnyTaskOutput, Task, TaskId,
};

use std::{mem, sync::Arc};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tracing::{debug, instrument, warn};

use super::{
	blocking::run_blocking, error::JobError, progress::ProgressReporter, JobId, JobState,
};

/// What a finished ingestion hands back to its supervisor.
#[derive(Debug)]
pub(crate) struct IngestOutput {
	pub document: Document,
	pub layers: LayerTree,
	pub frames: Vec<GeneratedFrame>,
}

/// Decodes a document, rasterizes its layers and synthesizes frames, reporting along the way.
#[derive(Debug)]
pub(crate) struct IngestTask {
	id: TaskId,
	job_id: JobId,
	buffer: Vec<u8>,
	config: Arc<PipelineConfig>,
	synthesizer: Arc<FrameSynthesizer>,
	reporter: ProgressReporter,
}

impl IngestTask {
	pub fn new(
		job_id: JobId,
		buffer: Vec<u8>,
		config: Arc<PipelineConfig>,
		synthesizer: Arc<FrameSynthesizer>,
		reporter: ProgressReporter,
	) -> Self {
		Self {
			id: TaskId::new_v4(),
			job_id,
			buffer,
			config,
			synthesizer,
			reporter,
		}
	}
}

#[async_trait]
impl Task<JobError> for IngestTask {
	fn id(&self) -> TaskId {
		self.id
	}

	#[instrument(skip_all, fields(job_id = %self.job_id, task_id = %self.id, bytes = self.buffer.len()))]
	async fn run(&mut self, interrupter: &Interrupter) -> Result<ExecStatus, JobError> {
		check_interruption!(interrupter);

		self.reporter
			.report(JobState::Decoding, 10, "Decoding document")
			.await;

		let buffer = mem::take(&mut self.buffer);
		let options = self.config.decode_options();

		let DecodedDocument {
			document,
			mut layers,
		} = run_blocking(move || decode(&buffer, &options))
			.await
			.map_err(JobError::Panic)??;

		debug!(layers = layers.len(), "Decoded document");

		check_interruption!(interrupter);

		self.reporter
			.report(JobState::Decoding, 30, "Extracting layers")
			.await;

		self.reporter
			.report(JobState::Rasterizing, 60, "Rasterizing layers")
			.await;

		let pending = layers
			.pending_rasterization()
			.into_iter()
			.filter_map(|layer_id| {
				layers
					.take_raw_pixels(layer_id)
					.map(|pixels| (layer_id, pixels))
			})
			.collect::<Vec<_>>();

		let total = pending.len();
		let raster_options = self.config.raster_options();

		let mut rasterized = stream::iter(pending.into_iter().map(|(layer_id, pixels)| {
			let source_size = (pixels.width, pixels.height);

			async move {
				let res = run_blocking(move || rasterize(pixels, &raster_options)).await;
				(layer_id, source_size, res)
			}
		}))
		.buffered(self.config.raster_concurrency().get());

		let mut done = 0;

		// Results arrive in layer order no matter how many run at once
		while let Some((layer_id, (source_width, source_height), res)) = rasterized.next().await {
			let outcome = match res {
				Ok(Ok(handle)) => Ok(handle),
				Ok(Err(e)) => Err(LayerFailure::from(e)),
				Err(panic) => Err(LayerFailure {
					kind: "internal_panic".to_string(),
					message: panic,
				}),
			};

			if let Some(node) = layers.get_mut(layer_id) {
				match outcome {
					Ok(handle) => node.image = Some(handle),
					Err(failure) => {
						warn!(
							%layer_id,
							name = %node.name,
							kind = %failure.kind,
							message = %failure.message,
							"Failed to rasterize layer, using a placeholder"
						);
						node.image = Some(ImageHandle::placeholder(source_width, source_height));
						node.raster_error = Some(failure);
					}
				}
			}

			done += 1;

			self.reporter
				.report(
					JobState::Rasterizing,
					raster_percent(done, total),
					"Rasterizing layers",
				)
				.await;

			check_interruption!(interrupter);
		}

		drop(rasterized);

		check_interruption!(interrupter);

		self.reporter
			.report(JobState::Synthesizing, 85, "Generating frames")
			.await;

		let frames = if self.config.auto_synthesize {
			let eligible = layers
				.top_level()
				.filter(|node| node.raster_error.is_none())
				.collect::<Vec<_>>();

			if eligible.is_empty() {
				warn!("No top level layer can be used for frames, skipping synthesis");
				vec![]
			} else {
				self.synthesizer.synthesize(&eligible, true)?
			}
		} else {
			vec![]
		};

		Ok(ExecStatus::Done(
			IngestOutput {
				document,
				layers,
				frames,
			}
			.into_output(),
		))
	}
}

/// Maps rasterized layers onto the 60 to 80 range.
fn raster_percent(done: usize, total: usize) -> u8 {
	if total == 0 {
		return 80;
	}

	u8::try_from(60 + 20 * done.min(total) / total).unwrap_or(80)
}
