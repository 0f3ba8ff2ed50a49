//! Frame synthesis: turning the active layers into a catalog of declarative card templates.

use forge_psd::{LayerBounds, LayerId, LayerNode};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

mod catalog;

pub use catalog::{FrameCatalog, FrameStyle, FrameVariant, LayerPick, Rarity, RegionTemplate};

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
	#[error("frames can only be synthesized from at least one active layer")]
	EmptyActiveSet,
	#[error("region '{region}' of frame '{frame}' references layer {layer_id} outside the active set")]
	DanglingRegion {
		frame: String,
		region: String,
		layer_id: LayerId,
	},
}

impl SynthesisError {
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::EmptyActiveSet => "empty_active_set",
			Self::DanglingRegion { .. } => "dangling_region",
		}
	}
}

/// One named area of a frame, bound to the layer that fills it.
///
/// Bounds are in document pixel space, origin at the top left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRegion {
	pub name: String,
	pub bounds: LayerBounds,
	pub layer_id: LayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameConfig {
	pub regions: Vec<FrameRegion>,
}

/// A template variant built from a set of active layers. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFrame {
	id: Uuid,
	name: String,
	style: FrameStyle,
	rarity: Rarity,
	included_layer_ids: BTreeSet<LayerId>,
	frame_config: FrameConfig,
	auto_generated: bool,
	created_at: DateTime<Utc>,
}

impl GeneratedFrame {
	/// Builds a frame, checking every region points inside `included_layer_ids`.
	pub fn new(
		variant: &FrameVariant,
		included_layer_ids: BTreeSet<LayerId>,
		frame_config: FrameConfig,
		auto_generated: bool,
	) -> Result<Self, SynthesisError> {
		if let Some(region) = frame_config
			.regions
			.iter()
			.find(|region| !included_layer_ids.contains(&region.layer_id))
		{
			return Err(SynthesisError::DanglingRegion {
				frame: variant.name.clone(),
				region: region.name.clone(),
				layer_id: region.layer_id,
			});
		}

		Ok(Self {
			id: Uuid::new_v4(),
			name: variant.name.clone(),
			style: variant.style,
			rarity: variant.rarity,
			included_layer_ids,
			frame_config,
			auto_generated,
			created_at: Utc::now(),
		})
	}

	#[must_use]
	pub const fn id(&self) -> Uuid {
		self.id
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub const fn style(&self) -> FrameStyle {
		self.style
	}

	#[must_use]
	pub const fn rarity(&self) -> Rarity {
		self.rarity
	}

	#[must_use]
	pub const fn included_layer_ids(&self) -> &BTreeSet<LayerId> {
		&self.included_layer_ids
	}

	#[must_use]
	pub const fn frame_config(&self) -> &FrameConfig {
		&self.frame_config
	}

	#[must_use]
	pub const fn auto_generated(&self) -> bool {
		self.auto_generated
	}

	#[must_use]
	pub const fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}
}

#[derive(Debug, Clone, Default)]
pub struct FrameSynthesizer {
	catalog: FrameCatalog,
}

impl FrameSynthesizer {
	#[must_use]
	pub const fn new(catalog: FrameCatalog) -> Self {
		Self { catalog }
	}

	#[must_use]
	pub const fn catalog(&self) -> &FrameCatalog {
		&self.catalog
	}

	/// Builds one frame per catalog variant over the given layers, in stacking order
	/// (bottom first).
	///
	/// Every frame includes all the given layers, while each region picks its own layer,
	/// preferring ones no other region of the same frame took yet. Frames get fresh ids
	/// on every call, earlier results are never touched.
	///
	/// `auto_generated` is false when the layers come from an operator's selection.
	#[instrument(
		skip(self, active),
		fields(layers = active.len(), variants = self.catalog.variants.len())
	)]
	pub fn synthesize(
		&self,
		active: &[&LayerNode],
		auto_generated: bool,
	) -> Result<Vec<GeneratedFrame>, SynthesisError> {
		if active.is_empty() {
			return Err(SynthesisError::EmptyActiveSet);
		}

		let included = active.iter().map(|node| node.id).collect::<BTreeSet<_>>();
		let center = active
			.iter()
			.fold(LayerBounds::default(), |acc, node| acc.union(&node.bounds))
			.center();

		self.catalog
			.variants
			.iter()
			.map(|variant| {
				let mut used = BTreeSet::new();

				let regions = variant
					.regions
					.iter()
					.filter_map(|template| {
						let unused = active
							.iter()
							.copied()
							.filter(|node| !used.contains(&node.id))
							.collect::<Vec<_>>();
						let candidates: &[&LayerNode] = if unused.is_empty() {
							active
						} else {
							&unused
						};

						let node = template.pick.pick(candidates, center)?;
						used.insert(node.id);

						Some(FrameRegion {
							name: template.name.clone(),
							bounds: node.bounds.padded(template.padding),
							layer_id: node.id,
						})
					})
					.collect();

				let frame = GeneratedFrame::new(
					variant,
					included.clone(),
					FrameConfig { regions },
					auto_generated,
				)?;
				debug!(frame_id = %frame.id, name = %frame.name, "Synthesized frame");

				Ok(frame)
			})
			.collect()
	}
}
