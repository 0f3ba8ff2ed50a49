//! Reviewing the outcome of a job: layer visibility, frame selection, export and previews.

use crate::{
	frames::{FrameRegion, FrameSynthesizer, GeneratedFrame, SynthesisError},
	organizer::{LayerOrganizer, OrganizerCommand, OrganizerError},
};

use forge_images::{decode_handle, scale_to_fit, RgbaImage};
use forge_psd::{Document, ImageHandle, LayerBounds, LayerId, LayerNode, LayerTree};

use image::imageops;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
	#[error("no layer with id {0}")]
	UnknownLayer(LayerId),
	#[error("no frame with id {0}")]
	UnknownFrame(Uuid),
}

impl ReviewError {
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::UnknownLayer(_) => "unknown_layer",
			Self::UnknownFrame(_) => "unknown_frame",
		}
	}
}

/// The exported form of a frame, consumed by the card renderer.
///
/// Serializes as `{"regions":[{"name":..,"bounds":{"x":..,"y":..,"width":..,"height":..},"layerId":..}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedTemplate {
	pub regions: Vec<FrameRegion>,
}

impl SerializedTemplate {
	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}
}

/// A leaf to draw, with the opacity inherited from its groups applied.
#[derive(Debug, Clone, Copy)]
pub struct RenderItem<'session> {
	pub layer_id: LayerId,
	pub bounds: LayerBounds,
	pub opacity: f32,
	pub image: Option<&'session ImageHandle>,
}

/// An operator's view over a finished job.
///
/// Starts with every top level layer in the elements bucket. Frames synthesized from the
/// active composition are appended after the job's own.
#[derive(Debug, Clone)]
pub struct ReviewSession {
	document: Document,
	layers: LayerTree,
	frames: Vec<GeneratedFrame>,
	organizer: LayerOrganizer,
	selected_frame: Option<Uuid>,
}

impl ReviewSession {
	#[must_use]
	pub fn new(document: Document, layers: LayerTree, frames: Vec<GeneratedFrame>) -> Self {
		Self {
			organizer: LayerOrganizer::from_tree(&layers),
			document,
			layers,
			frames,
			selected_frame: None,
		}
	}

	#[must_use]
	pub const fn document(&self) -> &Document {
		&self.document
	}

	#[must_use]
	pub const fn layers(&self) -> &LayerTree {
		&self.layers
	}

	#[must_use]
	pub fn frames(&self) -> &[GeneratedFrame] {
		&self.frames
	}

	#[must_use]
	pub const fn organizer(&self) -> &LayerOrganizer {
		&self.organizer
	}

	/// Moves top level layers between the active composition and the bucket.
	pub fn organize(&mut self, command: OrganizerCommand) -> Result<bool, OrganizerError> {
		self.organizer.apply(command)
	}

	/// Synthesizes frames over the active composition and returns the new ones.
	///
	/// Frames already in the session are kept as they are.
	pub fn synthesize_active(
		&mut self,
		synthesizer: &FrameSynthesizer,
	) -> Result<&[GeneratedFrame], SynthesisError> {
		let frames = synthesizer.synthesize(&self.organizer.active_layers(&self.layers), false)?;
		trace!(count = frames.len(), "Synthesized frames from the active composition");

		let start = self.frames.len();
		self.frames.extend(frames);

		Ok(&self.frames[start..])
	}

	/// Flips a layer's visibility, returning the new value.
	pub fn toggle_visibility(&mut self, id: LayerId) -> Result<bool, ReviewError> {
		let node = self
			.layers
			.get_mut(id)
			.ok_or(ReviewError::UnknownLayer(id))?;

		node.visible = !node.visible;
		trace!(%id, visible = node.visible, "Toggled layer visibility");

		Ok(node.visible)
	}

	pub fn is_visible(&self, id: LayerId) -> Result<bool, ReviewError> {
		self.layers
			.get(id)
			.map(|node| node.visible)
			.ok_or(ReviewError::UnknownLayer(id))
	}

	pub fn select_frame(&mut self, frame_id: Uuid) -> Result<&GeneratedFrame, ReviewError> {
		let frame = self
			.frames
			.iter()
			.find(|frame| frame.id() == frame_id)
			.ok_or(ReviewError::UnknownFrame(frame_id))?;

		self.selected_frame = Some(frame_id);

		Ok(frame)
	}

	#[must_use]
	pub fn selected_frame(&self) -> Option<&GeneratedFrame> {
		self.selected_frame
			.and_then(|id| self.frames.iter().find(|frame| frame.id() == id))
	}

	pub fn export_frame(&self, frame_id: Uuid) -> Result<SerializedTemplate, ReviewError> {
		self.frames
			.iter()
			.find(|frame| frame.id() == frame_id)
			.map(|frame| SerializedTemplate {
				regions: frame.frame_config().regions.clone(),
			})
			.ok_or(ReviewError::UnknownFrame(frame_id))
	}

	fn is_shown(&self, node: &LayerNode) -> bool {
		node.visible && self.layers.ancestors(node.id).all(|ancestor| ancestor.visible)
	}

	fn effective_opacity(&self, node: &LayerNode) -> f32 {
		self.layers
			.ancestors(node.id)
			.fold(node.opacity, |opacity, ancestor| opacity * ancestor.opacity)
	}

	/// Visible leaves from the bottom of the stack to the top.
	///
	/// A leaf is hidden as soon as one of its groups is.
	#[must_use]
	pub fn render_list(&self) -> Vec<RenderItem<'_>> {
		self.layers
			.leaves()
			.filter(|node| self.is_shown(node))
			.map(|node| RenderItem {
				layer_id: node.id,
				bounds: node.bounds,
				opacity: self.effective_opacity(node),
				image: node.image.as_ref(),
			})
			.collect()
	}

	/// Flattens the visible layers onto a transparent canvas whose longest side is at most
	/// `max_dimension`.
	///
	/// Layers without a bitmap are left out.
	#[must_use]
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	pub fn composite_preview(&self, max_dimension: u32) -> RgbaImage {
		let (width, height) = scale_to_fit(self.document.width, self.document.height, max_dimension);
		let scale = f64::from(width) / f64::from(self.document.width.max(1));

		let mut canvas = RgbaImage::new(width, height);

		for item in self.render_list() {
			let Some(handle) = item.image.filter(|handle| !handle.is_placeholder()) else {
				continue;
			};

			if item.bounds.is_empty() || item.opacity <= 0.0 {
				continue;
			}

			let mut layer = match decode_handle(handle) {
				Ok(layer) => layer,
				Err(e) => {
					warn!(layer_id = %item.layer_id, ?e, "Failed to decode layer bitmap for preview");
					continue;
				}
			};

			let target_width = ((f64::from(item.bounds.width) * scale).round() as u32).max(1);
			let target_height = ((f64::from(item.bounds.height) * scale).round() as u32).max(1);

			if layer.dimensions() != (target_width, target_height) {
				layer = imageops::resize(
					&layer,
					target_width,
					target_height,
					imageops::FilterType::Triangle,
				);
			}

			if item.opacity < 1.0 {
				for pixel in layer.pixels_mut() {
					pixel[3] = (f32::from(pixel[3]) * item.opacity).round() as u8;
				}
			}

			imageops::overlay(
				&mut canvas,
				&layer,
				(f64::from(item.bounds.x) * scale).round() as i64,
				(f64::from(item.bounds.y) * scale).round() as i64,
			);
		}

		canvas
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use forge_psd::{decode, ColorMode, DecodeOptions, GroupBuilder, LayerSpec, PsdBuilder};

	fn session() -> ReviewSession {
		let buffer = PsdBuilder::new(64, 64)
			.layer(LayerSpec::solid("paper", 0, 0, 64, 64, [255, 255, 255, 255]))
			.group("shapes", |group: GroupBuilder| {
				group
					.opacity(128)
					.layer(LayerSpec::solid("square", 8, 8, 16, 16, [255, 0, 0, 255]).opacity(128))
					.layer(LayerSpec::solid("ghost", 30, 30, 8, 8, [0, 0, 255, 255]).hidden())
			})
			.build();

		let decoded = decode(&buffer, &DecodeOptions::default()).unwrap();
		let layers = decoded.layers;
		let roots = layers.top_level().collect::<Vec<_>>();
		let frames = FrameSynthesizer::default().synthesize(&roots, true).unwrap();

		ReviewSession::new(decoded.document, layers, frames)
	}

	fn leaf_names(session: &ReviewSession) -> Vec<String> {
		session
			.render_list()
			.iter()
			.filter_map(|item| session.layers().get(item.layer_id))
			.map(|node| node.name.clone())
			.collect()
	}

	#[test]
	fn hidden_layers_and_groups_are_not_rendered() {
		let mut session = session();
		assert_eq!(session.document().color_mode, ColorMode::Rgb);

		assert_eq!(leaf_names(&session), ["paper", "square"]);

		let group = session
			.layers()
			.top_level()
			.find(|node| node.is_group())
			.map(|node| node.id)
			.unwrap();

		assert_eq!(session.toggle_visibility(group), Ok(false));
		assert_eq!(leaf_names(&session), ["paper"]);
		assert_eq!(session.toggle_visibility(group), Ok(true));
	}

	#[test]
	fn group_opacity_multiplies_down() {
		let session = session();

		let square = session
			.render_list()
			.into_iter()
			.find(|item| item.bounds.width == 16)
			.unwrap();

		let half = 128.0 / 255.0;
		assert!((square.opacity - half * half).abs() < 1e-3);
	}

	#[test]
	fn exports_and_selection() {
		let mut session = session();
		let frame_id = session.frames()[0].id();

		assert!(session.selected_frame().is_none());
		session.select_frame(frame_id).unwrap();
		assert_eq!(session.selected_frame().map(GeneratedFrame::id), Some(frame_id));

		let template = session.export_frame(frame_id).unwrap();
		assert_eq!(template.regions, session.frames()[0].frame_config().regions);

		let unknown = Uuid::new_v4();
		assert_eq!(
			session.export_frame(unknown),
			Err(ReviewError::UnknownFrame(unknown))
		);
		assert_eq!(
			session.is_visible(LayerId(99)),
			Err(ReviewError::UnknownLayer(LayerId(99)))
		);
	}

	#[test]
	fn selections_are_synthesized_next_to_the_job_frames() {
		let mut session = session();
		let job_frames = session
			.frames()
			.iter()
			.map(GeneratedFrame::id)
			.collect::<Vec<_>>();

		assert!(matches!(
			session.synthesize_active(&FrameSynthesizer::default()),
			Err(SynthesisError::EmptyActiveSet)
		));

		let paper = session.organizer().universe()[0];
		assert_eq!(session.organize(OrganizerCommand::MoveToActive(paper)), Ok(true));

		let added = session
			.synthesize_active(&FrameSynthesizer::default())
			.unwrap()
			.iter()
			.map(|frame| {
				assert!(!frame.auto_generated());
				assert!(frame.included_layer_ids().iter().eq([&paper]));
				frame.id()
			})
			.collect::<Vec<_>>();

		assert_eq!(added.len(), 4);
		assert_eq!(session.frames().len(), job_frames.len() + added.len());
		assert!(session.frames()[..job_frames.len()]
			.iter()
			.map(GeneratedFrame::id)
			.eq(job_frames));

		let template = session.export_frame(added[0]).unwrap();
		assert!(template.regions.iter().all(|region| region.layer_id == paper));
	}
}
