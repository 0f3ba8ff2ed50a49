use crate::{
	consts::{
		KEY_NESTED_SECTION_DIVIDER, KEY_SECTION_DIVIDER, KEY_UNICODE_NAME, MAX_CHANNELS,
		MAX_DOCUMENT_DIMENSION, RESOURCE_SIGNATURE, RESOURCE_SIGNATURE_64, SIGNATURE,
		SUPPORTED_VERSION,
	},
	document::{ColorMode, DecodeOptions, Document},
	error::{DecodeError, Result},
	layer::{
		Compression, LayerBounds, LayerId, LayerKind, LayerNode, LayerTree, RawChannel, RawPixels,
	},
	reader::Reader,
};

use tracing::{debug, instrument, trace};

/// A successfully decoded document together with its layer tree.
#[derive(Debug, Clone)]
pub struct DecodedDocument {
	pub document: Document,
	pub layers: LayerTree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionDivider {
	Other,
	OpenFolder,
	ClosedFolder,
	BoundingDivider,
}

impl From<u32> for SectionDivider {
	fn from(value: u32) -> Self {
		match value {
			1 => Self::OpenFolder,
			2 => Self::ClosedFolder,
			3 => Self::BoundingDivider,
			_ => Self::Other,
		}
	}
}

#[derive(Debug)]
struct LayerRecord {
	bounds: LayerBounds,
	channels: Vec<(i16, u32)>,
	opacity: u8,
	flags: u8,
	name: String,
	divider: SectionDivider,
	channel_data: Vec<RawChannel>,
}

impl LayerRecord {
	const fn is_hidden(&self) -> bool {
		self.flags & 0b10 != 0
	}
}

/// Decodes a whole document, failing as a unit.
///
/// Layers come back in file order at every depth (the first sibling is the bottom
/// of the stack) and every leaf with pixels keeps its still compressed payload in
/// [`LayerNode::raw_pixels`].
#[instrument(skip_all, fields(size = buffer.len()), err)]
pub fn decode(buffer: &[u8], options: &DecodeOptions) -> Result<DecodedDocument> {
	if buffer.len() > options.max_document_bytes {
		return Err(DecodeError::TooLarge {
			size: buffer.len(),
			max: options.max_document_bytes,
		});
	}

	let mut reader = Reader::new(buffer);

	let document = read_header(&mut reader)?;
	trace!(?document, "Read document header");

	reader.section("color mode data")?;
	reader.section("image resources")?;

	let records = read_layer_records(&mut reader, &document)?;
	debug!(record_count = records.len(), "Read layer records");

	check_merged_image(&mut reader, &document)?;

	let layers = build_tree(records, &document)?;

	Ok(DecodedDocument { document, layers })
}

fn read_header(reader: &mut Reader<'_>) -> Result<Document> {
	if &reader.array::<4>("signature")? != SIGNATURE {
		return Err(DecodeError::corrupt("missing document signature"));
	}

	let version = reader.u16("version")?;
	if version != SUPPORTED_VERSION {
		return Err(DecodeError::UnsupportedVersion(version));
	}

	reader.skip(6, "reserved header bytes")?;

	let channel_count = reader.u16("channel count")?;
	if channel_count == 0 || channel_count > MAX_CHANNELS {
		return Err(DecodeError::corrupt(format!(
			"invalid channel count {channel_count}"
		)));
	}

	let height = reader.u32("height")?;
	let width = reader.u32("width")?;
	for (dimension, value) in [("width", width), ("height", height)] {
		if value == 0 || value > MAX_DOCUMENT_DIMENSION {
			return Err(DecodeError::corrupt(format!("invalid {dimension} {value}")));
		}
	}

	let bits_per_channel = reader.u16("depth")?;
	if !matches!(bits_per_channel, 1 | 8 | 16 | 32) {
		return Err(DecodeError::corrupt(format!(
			"invalid bit depth {bits_per_channel}"
		)));
	}

	let color_mode = ColorMode::try_from(reader.u16("color mode")?)?;

	Ok(Document {
		width,
		height,
		color_mode,
		bits_per_channel,
		channel_count,
	})
}

fn read_layer_records(reader: &mut Reader<'_>, document: &Document) -> Result<Vec<LayerRecord>> {
	let mut layer_and_mask = reader.section("layer and mask information")?;
	if layer_and_mask.is_empty() {
		return Ok(vec![]);
	}

	let mut info = layer_and_mask.section("layer info")?;
	if info.is_empty() {
		return Ok(vec![]);
	}

	// A negative count only says the first alpha channel holds the merged transparency
	let count = info.i16("layer count")?.unsigned_abs();

	let mut records = (0..count)
		.map(|_| read_layer_record(&mut info))
		.collect::<Result<Vec<_>>>()?;

	for record in &mut records {
		record.channel_data = record
			.channels
			.iter()
			.map(|&(id, len)| read_channel(&mut info, id, len))
			.collect::<Result<Vec<_>>>()?;
	}

	trace!(
		bits_per_channel = document.bits_per_channel,
		trailing = info.remaining(),
		"Read channel image data"
	);

	Ok(records)
}

/// We never use the merged composite, but a document cut short inside it is still
/// a truncated document.
fn check_merged_image(reader: &mut Reader<'_>, document: &Document) -> Result<()> {
	let compression = Compression::from(reader.u16("merged image compression")?);
	let rows = usize::from(document.channel_count) * document.height as usize;

	let expected = match compression {
		Compression::Raw => {
			let row_bytes = (document.width as usize * usize::from(document.bits_per_channel))
				.div_ceil(8);
			rows * row_bytes
		}
		Compression::Rle => (0..rows)
			.map(|_| reader.u16("merged image row sizes").map(usize::from))
			.sum::<Result<usize>>()?,
		// Compressed streams carry their own framing, we only require them to be non empty
		Compression::Zip | Compression::ZipPrediction => 1,
		Compression::Unknown(other) => {
			return Err(DecodeError::corrupt(format!(
				"unknown merged image compression {other}"
			)))
		}
	};

	reader.skip(expected, "merged image data")
}

fn read_layer_record(reader: &mut Reader<'_>) -> Result<LayerRecord> {
	let top = reader.i32("layer bounds")?;
	let left = reader.i32("layer bounds")?;
	let bottom = reader.i32("layer bounds")?;
	let right = reader.i32("layer bounds")?;

	let width = u32::try_from(i64::from(right) - i64::from(left))
		.map_err(|_| DecodeError::corrupt(format!("layer with inverted bounds ({left}, {right})")))?;
	let height = u32::try_from(i64::from(bottom) - i64::from(top))
		.map_err(|_| DecodeError::corrupt(format!("layer with inverted bounds ({top}, {bottom})")))?;

	let channel_count = reader.u16("layer channel count")?;
	if channel_count > MAX_CHANNELS {
		return Err(DecodeError::corrupt(format!(
			"layer with {channel_count} channels"
		)));
	}

	let channels = (0..channel_count)
		.map(|_| -> Result<(i16, u32)> {
			Ok((reader.i16("channel id")?, reader.u32("channel length")?))
		})
		.collect::<Result<Vec<_>>>()?;

	if &reader.array::<4>("blend mode signature")? != RESOURCE_SIGNATURE {
		return Err(DecodeError::corrupt("invalid blend mode signature"));
	}
	reader.skip(4, "blend mode key")?;

	let opacity = reader.u8("opacity")?;
	reader.skip(1, "clipping")?;
	let flags = reader.u8("flags")?;
	reader.skip(1, "filler")?;

	let mut extra = reader.section("layer extra data")?;
	extra.section("layer mask data")?;
	extra.section("layer blending ranges")?;

	let mut name = read_pascal_name(&mut extra)?;
	let mut divider = SectionDivider::Other;

	// Anything shorter than a block header is padding
	while extra.remaining() >= 12 {
		let signature = extra.array::<4>("additional layer info signature")?;
		if &signature != RESOURCE_SIGNATURE && &signature != RESOURCE_SIGNATURE_64 {
			return Err(DecodeError::corrupt("invalid additional layer info signature"));
		}

		let key = extra.array::<4>("additional layer info key")?;
		let mut block = extra.section("additional layer info")?;

		match &key {
			KEY_UNICODE_NAME => name = read_unicode_name(&mut block)?,
			KEY_SECTION_DIVIDER | KEY_NESTED_SECTION_DIVIDER => {
				divider = SectionDivider::from(block.u32("section divider type")?);
			}
			_ => {}
		}
	}

	Ok(LayerRecord {
		bounds: LayerBounds::new(left, top, width, height),
		channels,
		opacity,
		flags,
		name,
		divider,
		channel_data: vec![],
	})
}

fn read_pascal_name(reader: &mut Reader<'_>) -> Result<String> {
	let len = usize::from(reader.u8("layer name")?);
	let name = String::from_utf8_lossy(reader.bytes(len, "layer name")?).into_owned();

	// The length byte plus the string are padded to a multiple of 4
	let padding = ((4 - (len + 1) % 4) % 4).min(reader.remaining());
	reader.skip(padding, "layer name padding")?;

	Ok(name)
}

fn read_unicode_name(reader: &mut Reader<'_>) -> Result<String> {
	let count = reader.u32("unicode name length")?;
	let units = (0..count)
		.map(|_| reader.u16("unicode name"))
		.collect::<Result<Vec<_>>>()?;

	Ok(char::decode_utf16(units)
		.map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
		.collect::<String>()
		.trim_end_matches('\0')
		.to_string())
}

fn read_channel(reader: &mut Reader<'_>, id: i16, len: u32) -> Result<RawChannel> {
	let len = usize::try_from(len).map_err(|_| DecodeError::Truncated("channel image data"))?;

	match len {
		0 => Ok(RawChannel {
			id,
			compression: Compression::Raw,
			data: vec![],
		}),
		1 => Err(DecodeError::corrupt(format!(
			"channel {id} too short to hold its compression tag"
		))),
		_ => {
			let compression = Compression::from(reader.u16("channel compression")?);
			let data = reader.bytes(len - 2, "channel image data")?.to_vec();

			Ok(RawChannel {
				id,
				compression,
				data,
			})
		}
	}
}

/// Node whose place in the hierarchy is known but that still lives in file order.
#[derive(Debug, Default)]
struct PendingNode {
	record: Option<LayerRecord>,
	parent: Option<usize>,
	children: Vec<usize>,
}

/// Rebuilds the hierarchy from the section dividers, then lays the nodes out in
/// the arena in depth first pre-order.
///
/// Both passes use explicit stacks: nesting depth comes straight from the file.
fn build_tree(records: Vec<LayerRecord>, document: &Document) -> Result<LayerTree> {
	let mut pending = Vec::<PendingNode>::with_capacity(records.len());
	let mut roots = vec![];
	let mut open_groups = Vec::<usize>::new();

	for record in records {
		match record.divider {
			SectionDivider::BoundingDivider => {
				let idx = pending.len();
				pending.push(PendingNode {
					parent: open_groups.last().copied(),
					..Default::default()
				});
				attach(&mut pending, &mut roots, open_groups.last().copied(), idx);
				open_groups.push(idx);
			}

			SectionDivider::OpenFolder | SectionDivider::ClosedFolder => {
				let idx = open_groups.pop().ok_or_else(|| {
					DecodeError::corrupt(format!(
						"group '{}' closes without an opening divider",
						record.name
					))
				})?;
				pending[idx].record = Some(record);
			}

			SectionDivider::Other => {
				let idx = pending.len();
				let parent = open_groups.last().copied();
				pending.push(PendingNode {
					record: Some(record),
					parent,
					children: vec![],
				});
				attach(&mut pending, &mut roots, parent, idx);
			}
		}
	}

	if !open_groups.is_empty() {
		return Err(DecodeError::corrupt(format!(
			"{} group(s) were never closed",
			open_groups.len()
		)));
	}

	// Pre-order numbering
	let mut order = Vec::with_capacity(pending.len());
	let mut stack = roots.iter().rev().copied().collect::<Vec<_>>();
	while let Some(idx) = stack.pop() {
		order.push(idx);
		stack.extend(pending[idx].children.iter().rev().copied());
	}

	let mut new_ids = vec![LayerId(0); pending.len()];
	for (position, &idx) in order.iter().enumerate() {
		new_ids[idx] = layer_id(position)?;
	}

	let mut nodes = Vec::with_capacity(order.len());
	for &idx in &order {
		let PendingNode {
			record,
			parent,
			children,
		} = std::mem::take(&mut pending[idx]);

		let record = record.ok_or_else(|| DecodeError::corrupt("group without a folder record"))?;
		let kind = match record.divider {
			SectionDivider::OpenFolder | SectionDivider::ClosedFolder => LayerKind::Group,
			SectionDivider::Other | SectionDivider::BoundingDivider => LayerKind::Layer,
		};

		nodes.push(into_node(
			record,
			new_ids[idx],
			kind,
			parent.map(|parent| new_ids[parent]),
			children.into_iter().map(|child| new_ids[child]).collect(),
			document,
		));
	}

	fill_group_bounds(&mut nodes);

	Ok(LayerTree::from_parts(
		nodes,
		roots.into_iter().map(|idx| new_ids[idx]).collect(),
	))
}

fn attach(pending: &mut [PendingNode], roots: &mut Vec<usize>, parent: Option<usize>, idx: usize) {
	if let Some(parent) = parent {
		pending[parent].children.push(idx);
	} else {
		roots.push(idx);
	}
}

fn layer_id(position: usize) -> Result<LayerId> {
	u32::try_from(position)
		.map(LayerId)
		.map_err(|_| DecodeError::corrupt("too many layers"))
}

fn into_node(
	record: LayerRecord,
	id: LayerId,
	kind: LayerKind,
	parent: Option<LayerId>,
	children: Vec<LayerId>,
	document: &Document,
) -> LayerNode {
	let visible = !record.is_hidden();
	let LayerRecord {
		bounds,
		opacity,
		name,
		channel_data,
		..
	} = record;

	let raw_pixels = (matches!(kind, LayerKind::Layer)
		&& !bounds.is_empty()
		&& !channel_data.is_empty())
	.then(|| RawPixels {
		width: bounds.width,
		height: bounds.height,
		color_mode: document.color_mode,
		bits_per_channel: document.bits_per_channel,
		channels: channel_data,
	});

	LayerNode {
		id,
		name,
		kind,
		visible,
		opacity: f32::from(opacity) / 255.0,
		bounds,
		raw_pixels,
		image: None,
		raster_error: None,
		children,
		parent,
	}
}

/// Group records usually carry empty bounds, give them the union of their descendants.
fn fill_group_bounds(nodes: &mut [LayerNode]) {
	// Reverse pre-order visits every child before its parent
	for idx in (0..nodes.len()).rev() {
		if !nodes[idx].is_group() || !nodes[idx].bounds.is_empty() {
			continue;
		}

		let bounds = nodes[idx]
			.children
			.iter()
			.map(|child| nodes[child.index()].bounds)
			.fold(LayerBounds::default(), |acc, bounds| acc.union(&bounds));

		nodes[idx].bounds = bounds;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::builder::{LayerSpec, PsdBuilder};

	#[test]
	fn rejects_documents_over_the_limit() {
		let bytes = PsdBuilder::new(4, 4).build();
		let options = DecodeOptions {
			max_document_bytes: bytes.len() - 1,
		};

		assert!(matches!(
			decode(&bytes, &options),
			Err(DecodeError::TooLarge { .. })
		));
	}

	#[test]
	fn rejects_unknown_versions() {
		let mut bytes = PsdBuilder::new(4, 4).build();
		bytes[5] = 2;

		assert_eq!(
			decode(&bytes, &DecodeOptions::default()).unwrap_err(),
			DecodeError::UnsupportedVersion(2)
		);
	}

	#[test]
	fn rejects_bad_signature() {
		let mut bytes = PsdBuilder::new(4, 4).build();
		bytes[0] = b'9';

		assert_eq!(
			decode(&bytes, &DecodeOptions::default()).unwrap_err().kind(),
			"corrupt"
		);
	}

	#[test]
	fn truncation_never_yields_a_partial_tree() {
		let bytes = PsdBuilder::new(8, 8)
			.layer(LayerSpec::solid("a", 0, 0, 8, 8, [255, 0, 0, 255]))
			.layer(LayerSpec::solid("b", 0, 0, 8, 8, [0, 255, 0, 255]))
			.build();

		for cut in [10, 30, bytes.len() / 2, bytes.len() - 1] {
			let err = decode(&bytes[..cut], &DecodeOptions::default()).unwrap_err();
			assert_eq!(err.kind(), "truncated", "cut at {cut}");
		}
	}

	#[test]
	fn empty_groups_get_children_union_bounds() {
		let bytes = PsdBuilder::new(100, 100)
			.group("group", |group| {
				group
					.layer(LayerSpec::solid("a", 10, 10, 10, 10, [0, 0, 0, 255]))
					.layer(LayerSpec::solid("b", 50, 60, 20, 20, [0, 0, 0, 255]))
			})
			.build();

		let decoded = decode(&bytes, &DecodeOptions::default()).unwrap();
		let group = decoded.layers.top_level().next().unwrap();

		assert!(group.is_group());
		assert_eq!(group.bounds, LayerBounds::new(10, 10, 60, 70));
	}
}
