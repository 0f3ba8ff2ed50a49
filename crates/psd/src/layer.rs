use crate::document::ColorMode;

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Index of a node inside its [`LayerTree`] arena.
///
/// Ids are assigned once per decode and never reused for the lifetime of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u32);

impl LayerId {
	#[must_use]
	pub const fn index(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Display for LayerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
	Layer,
	Group,
}

/// Axis aligned rectangle in document pixel space, origin at the top left.
///
/// The offset may be negative, layers are allowed to hang off the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerBounds {
	pub x: i32,
	pub y: i32,
	pub width: u32,
	pub height: u32,
}

impl LayerBounds {
	#[must_use]
	pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
		Self {
			x,
			y,
			width,
			height,
		}
	}

	#[must_use]
	pub const fn is_empty(&self) -> bool {
		self.width == 0 || self.height == 0
	}

	#[must_use]
	pub const fn area(&self) -> u64 {
		self.width as u64 * self.height as u64
	}

	#[must_use]
	pub fn right(&self) -> i64 {
		i64::from(self.x) + i64::from(self.width)
	}

	#[must_use]
	pub fn bottom(&self) -> i64 {
		i64::from(self.y) + i64::from(self.height)
	}

	#[must_use]
	pub fn center(&self) -> (f64, f64) {
		(
			f64::from(self.x) + f64::from(self.width) / 2.0,
			f64::from(self.y) + f64::from(self.height) / 2.0,
		)
	}

	/// Smallest rectangle covering both; empty rectangles don't contribute.
	#[must_use]
	pub fn union(&self, other: &Self) -> Self {
		if self.is_empty() {
			return *other;
		}
		if other.is_empty() {
			return *self;
		}

		let left = self.x.min(other.x);
		let top = self.y.min(other.y);
		let right = self.right().max(other.right());
		let bottom = self.bottom().max(other.bottom());

		Self {
			x: left,
			y: top,
			width: u32::try_from(right - i64::from(left)).unwrap_or(u32::MAX),
			height: u32::try_from(bottom - i64::from(top)).unwrap_or(u32::MAX),
		}
	}

	/// Grows the rectangle by `padding` pixels on every side.
	#[must_use]
	pub fn padded(&self, padding: u32) -> Self {
		let pad = i32::try_from(padding).unwrap_or(i32::MAX);

		Self {
			x: self.x.saturating_sub(pad),
			y: self.y.saturating_sub(pad),
			width: self.width.saturating_add(padding.saturating_mul(2)),
			height: self.height.saturating_add(padding.saturating_mul(2)),
		}
	}
}

/// How a channel payload is stored in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
	Raw,
	Rle,
	Zip,
	ZipPrediction,
	Unknown(u16),
}

impl From<u16> for Compression {
	fn from(value: u16) -> Self {
		match value {
			0 => Self::Raw,
			1 => Self::Rle,
			2 => Self::Zip,
			3 => Self::ZipPrediction,
			other => Self::Unknown(other),
		}
	}
}

impl From<Compression> for u16 {
	fn from(compression: Compression) -> Self {
		match compression {
			Compression::Raw => 0,
			Compression::Rle => 1,
			Compression::Zip => 2,
			Compression::ZipPrediction => 3,
			Compression::Unknown(other) => other,
		}
	}
}

/// One channel of a layer exactly as stored in the file, still compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChannel {
	/// 0, 1, 2 are colour components, -1 is transparency, -2 and -3 are masks.
	pub id: i16,
	pub compression: Compression,
	pub data: Vec<u8>,
}

/// The raw pixel payload of a leaf layer, consumed by rasterization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPixels {
	pub width: u32,
	pub height: u32,
	pub color_mode: ColorMode,
	pub bits_per_channel: u16,
	pub channels: Vec<RawChannel>,
}

impl RawPixels {
	#[must_use]
	pub const fn is_empty(&self) -> bool {
		self.width == 0 || self.height == 0
	}

	#[must_use]
	pub fn channel(&self, id: i16) -> Option<&RawChannel> {
		self.channels.iter().find(|channel| channel.id == id)
	}
}

/// Reference to an encoded, directly displayable bitmap of a layer.
///
/// The encoded bytes are shared, cloning a handle never copies pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageHandle {
	pub id: Uuid,
	/// Dimensions of the encoded bitmap, after any downsampling.
	pub width: u32,
	pub height: u32,
	/// Native dimensions of the layer.
	pub source_width: u32,
	pub source_height: u32,
	pub data: Arc<[u8]>,
}

impl ImageHandle {
	pub const MIME_TYPE: &'static str = "image/webp";

	/// Handle standing in for a layer that could not be rasterized.
	#[must_use]
	pub fn placeholder(source_width: u32, source_height: u32) -> Self {
		Self {
			id: Uuid::new_v4(),
			width: 0,
			height: 0,
			source_width,
			source_height,
			data: Arc::from(Vec::new()),
		}
	}

	#[must_use]
	pub fn is_placeholder(&self) -> bool {
		self.data.is_empty()
	}
}

/// A layer scoped failure, kept on the node so the rest of the job can proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerFailure {
	pub kind: String,
	pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerNode {
	pub id: LayerId,
	pub name: String,
	pub kind: LayerKind,
	pub visible: bool,
	/// Between 0.0 and 1.0.
	pub opacity: f32,
	pub bounds: LayerBounds,
	#[serde(skip)]
	pub raw_pixels: Option<RawPixels>,
	pub image: Option<ImageHandle>,
	pub raster_error: Option<LayerFailure>,
	pub children: Vec<LayerId>,
	pub parent: Option<LayerId>,
}

impl LayerNode {
	#[must_use]
	pub const fn is_group(&self) -> bool {
		matches!(self.kind, LayerKind::Group)
	}

	/// Whether a bitmap can be shown for this layer.
	#[must_use]
	pub fn has_preview(&self) -> bool {
		self.image
			.as_ref()
			.is_some_and(|handle| !handle.is_placeholder())
	}
}

/// Flat arena holding every decoded node in depth first pre-order.
///
/// Parent and child links are [`LayerId`]s into the arena, siblings keep the
/// order they had in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerTree {
	nodes: Vec<LayerNode>,
	roots: Vec<LayerId>,
}

impl LayerTree {
	pub(crate) fn from_parts(nodes: Vec<LayerNode>, roots: Vec<LayerId>) -> Self {
		Self { nodes, roots }
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Ids of the top level layers, in file order.
	#[must_use]
	pub fn roots(&self) -> &[LayerId] {
		&self.roots
	}

	#[must_use]
	pub fn get(&self, id: LayerId) -> Option<&LayerNode> {
		self.nodes.get(id.index())
	}

	pub fn get_mut(&mut self, id: LayerId) -> Option<&mut LayerNode> {
		self.nodes.get_mut(id.index())
	}

	#[must_use]
	pub fn contains(&self, id: LayerId) -> bool {
		id.index() < self.nodes.len()
	}

	/// Every node, depth first, siblings in file order.
	pub fn iter(&self) -> impl Iterator<Item = &LayerNode> + '_ {
		self.nodes.iter()
	}

	pub fn top_level(&self) -> impl Iterator<Item = &LayerNode> + '_ {
		self.roots.iter().filter_map(|&id| self.get(id))
	}

	pub fn children(&self, id: LayerId) -> impl Iterator<Item = &LayerNode> + '_ {
		self.get(id)
			.map(|node| node.children.as_slice())
			.unwrap_or_default()
			.iter()
			.filter_map(|&child| self.get(child))
	}

	/// Walks from the direct parent up to the top level node.
	pub fn ancestors(&self, id: LayerId) -> impl Iterator<Item = &LayerNode> + '_ {
		let mut next = self.get(id).and_then(|node| node.parent);

		std::iter::from_fn(move || {
			let node = self.get(next?)?;
			next = node.parent;
			Some(node)
		})
	}

	pub fn leaves(&self) -> impl Iterator<Item = &LayerNode> + '_ {
		self.nodes.iter().filter(|node| !node.is_group())
	}

	/// Leaves still holding a raw payload, in depth first order.
	#[must_use]
	pub fn pending_rasterization(&self) -> Vec<LayerId> {
		self.leaves()
			.filter(|node| node.raw_pixels.is_some())
			.map(|node| node.id)
			.collect()
	}

	pub fn take_raw_pixels(&mut self, id: LayerId) -> Option<RawPixels> {
		self.get_mut(id).and_then(|node| node.raw_pixels.take())
	}
}
