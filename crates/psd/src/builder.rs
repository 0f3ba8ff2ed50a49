//! Writer for the same subset of the format the decoder understands.
//!
//! Mostly used to produce fixtures, but any caller needing a small synthetic
//! document (placeholders, previews of generated content) can use it as well.

use crate::{
	consts::{
		ALPHA_CHANNEL_ID, KEY_SECTION_DIVIDER, KEY_UNICODE_NAME, NORMAL_BLEND_MODE,
		RESOURCE_SIGNATURE, SECTION_END_NAME, SIGNATURE, SUPPORTED_VERSION,
	},
	document::ColorMode,
	layer::{Compression, LayerBounds, RawChannel},
};

const OPEN_FOLDER: u32 = 1;
const BOUNDING_DIVIDER: u32 = 3;

#[derive(Debug, Clone)]
enum LayerContent {
	/// Tightly packed 8 bit RGBA, converted to the document depth and mode on write.
	Rgba(Vec<u8>),
	/// Written verbatim, whatever they contain.
	Channels(Vec<RawChannel>),
}

#[derive(Debug, Clone)]
pub struct LayerSpec {
	name: String,
	bounds: LayerBounds,
	visible: bool,
	opacity: u8,
	content: LayerContent,
}

impl LayerSpec {
	/// A layer filled with a single colour.
	#[must_use]
	pub fn solid(name: &str, x: i32, y: i32, width: u32, height: u32, rgba: [u8; 4]) -> Self {
		let pixels = rgba.repeat(to_usize(width).saturating_mul(to_usize(height)));
		Self::from_rgba(name, x, y, width, height, pixels)
	}

	#[must_use]
	pub fn from_rgba(name: &str, x: i32, y: i32, width: u32, height: u32, rgba: Vec<u8>) -> Self {
		Self {
			name: name.to_string(),
			bounds: LayerBounds::new(x, y, width, height),
			visible: true,
			opacity: u8::MAX,
			content: LayerContent::Rgba(rgba),
		}
	}

	/// A layer whose channel payloads are written exactly as given.
	#[must_use]
	pub fn with_channels(
		name: &str,
		x: i32,
		y: i32,
		width: u32,
		height: u32,
		channels: Vec<RawChannel>,
	) -> Self {
		Self {
			name: name.to_string(),
			bounds: LayerBounds::new(x, y, width, height),
			visible: true,
			opacity: u8::MAX,
			content: LayerContent::Channels(channels),
		}
	}

	#[must_use]
	pub const fn hidden(mut self) -> Self {
		self.visible = false;
		self
	}

	#[must_use]
	pub const fn opacity(mut self, opacity: u8) -> Self {
		self.opacity = opacity;
		self
	}
}

#[derive(Debug, Clone)]
enum Entry {
	Layer(LayerSpec),
	Group(GroupBuilder),
}

#[derive(Debug, Clone)]
pub struct GroupBuilder {
	name: String,
	visible: bool,
	opacity: u8,
	entries: Vec<Entry>,
}

impl GroupBuilder {
	fn new(name: &str) -> Self {
		Self {
			name: name.to_string(),
			visible: true,
			opacity: u8::MAX,
			entries: vec![],
		}
	}

	#[must_use]
	pub fn layer(mut self, layer: LayerSpec) -> Self {
		self.entries.push(Entry::Layer(layer));
		self
	}

	#[must_use]
	pub fn group(mut self, name: &str, build: impl FnOnce(Self) -> Self) -> Self {
		self.entries.push(Entry::Group(build(Self::new(name))));
		self
	}

	#[must_use]
	pub const fn hidden(mut self) -> Self {
		self.visible = false;
		self
	}

	#[must_use]
	pub const fn opacity(mut self, opacity: u8) -> Self {
		self.opacity = opacity;
		self
	}
}

/// Builds a version 1 document. Entries are written in the order they are added,
/// so the first layer added ends up at the bottom of the stack.
#[derive(Debug, Clone)]
pub struct PsdBuilder {
	width: u32,
	height: u32,
	color_mode: ColorMode,
	bits_per_channel: u16,
	compression: Compression,
	entries: Vec<Entry>,
}

/// Flattened record, ready to be serialized.
struct Record<'spec> {
	name: &'spec str,
	bounds: LayerBounds,
	visible: bool,
	opacity: u8,
	divider: Option<u32>,
	channels: Vec<(i16, Vec<u8>)>,
}

impl PsdBuilder {
	#[must_use]
	pub const fn new(width: u32, height: u32) -> Self {
		Self {
			width,
			height,
			color_mode: ColorMode::Rgb,
			bits_per_channel: 8,
			compression: Compression::Rle,
			entries: vec![],
		}
	}

	#[must_use]
	pub const fn color_mode(mut self, color_mode: ColorMode) -> Self {
		self.color_mode = color_mode;
		self
	}

	#[must_use]
	pub const fn bits_per_channel(mut self, bits_per_channel: u16) -> Self {
		self.bits_per_channel = bits_per_channel;
		self
	}

	/// Compression used for layers built from RGBA pixels, [`Compression::Raw`] or
	/// [`Compression::Rle`].
	#[must_use]
	pub const fn compression(mut self, compression: Compression) -> Self {
		self.compression = compression;
		self
	}

	#[must_use]
	pub fn layer(mut self, layer: LayerSpec) -> Self {
		self.entries.push(Entry::Layer(layer));
		self
	}

	#[must_use]
	pub fn group(mut self, name: &str, build: impl FnOnce(GroupBuilder) -> GroupBuilder) -> Self {
		self.entries.push(Entry::Group(build(GroupBuilder::new(name))));
		self
	}

	#[must_use]
	pub fn build(&self) -> Vec<u8> {
		let mut records = vec![];
		self.flatten(&self.entries, &mut records);

		let mut out = Vec::new();

		out.extend_from_slice(SIGNATURE);
		out.extend_from_slice(&SUPPORTED_VERSION.to_be_bytes());
		out.extend_from_slice(&[0; 6]);
		out.extend_from_slice(&self.document_channels().to_be_bytes());
		out.extend_from_slice(&self.height.to_be_bytes());
		out.extend_from_slice(&self.width.to_be_bytes());
		out.extend_from_slice(&self.bits_per_channel.to_be_bytes());
		out.extend_from_slice(&u16::from(self.color_mode).to_be_bytes());

		// Colour mode data and image resources
		out.extend_from_slice(&0_u32.to_be_bytes());
		out.extend_from_slice(&0_u32.to_be_bytes());

		let layer_info = write_layer_info(&records);
		let mut layer_and_mask = Vec::with_capacity(layer_info.len() + 8);
		push_section(&mut layer_and_mask, &layer_info);
		// Global layer mask info
		layer_and_mask.extend_from_slice(&0_u32.to_be_bytes());
		push_section(&mut out, &layer_and_mask);

		self.write_merged_image(&mut out);

		out
	}

	fn document_channels(&self) -> u16 {
		match self.color_mode {
			ColorMode::Rgb | ColorMode::Lab => 3,
			ColorMode::Cmyk => 4,
			_ => 1,
		}
	}

	fn bytes_per_sample(&self) -> usize {
		usize::from(self.bits_per_channel).div_ceil(8)
	}

	fn flatten<'spec>(&self, entries: &'spec [Entry], records: &mut Vec<Record<'spec>>) {
		for entry in entries {
			match entry {
				Entry::Layer(layer) => records.push(Record {
					name: &layer.name,
					bounds: layer.bounds,
					visible: layer.visible,
					opacity: layer.opacity,
					divider: None,
					channels: self.layer_channels(layer),
				}),

				Entry::Group(group) => {
					records.push(Record {
						name: SECTION_END_NAME,
						bounds: LayerBounds::default(),
						visible: true,
						opacity: u8::MAX,
						divider: Some(BOUNDING_DIVIDER),
						channels: self.empty_channels(),
					});

					self.flatten(&group.entries, records);

					records.push(Record {
						name: &group.name,
						bounds: LayerBounds::default(),
						visible: group.visible,
						opacity: group.opacity,
						divider: Some(OPEN_FOLDER),
						channels: self.empty_channels(),
					});
				}
			}
		}
	}

	fn channel_ids(&self) -> Vec<i16> {
		let colour = if self.document_channels() == 1 {
			vec![0]
		} else {
			(0..3).collect()
		};

		std::iter::once(ALPHA_CHANNEL_ID).chain(colour).collect()
	}

	fn empty_channels(&self) -> Vec<(i16, Vec<u8>)> {
		self.channel_ids()
			.into_iter()
			.map(|id| (id, u16::from(Compression::Raw).to_be_bytes().to_vec()))
			.collect()
	}

	fn layer_channels(&self, layer: &LayerSpec) -> Vec<(i16, Vec<u8>)> {
		match &layer.content {
			LayerContent::Channels(channels) => channels
				.iter()
				.map(|channel| {
					let mut data = u16::from(channel.compression).to_be_bytes().to_vec();
					data.extend_from_slice(&channel.data);
					(channel.id, data)
				})
				.collect(),

			LayerContent::Rgba(pixels) => self
				.channel_ids()
				.into_iter()
				.map(|id| {
					let component = if id == ALPHA_CHANNEL_ID {
						3
					} else {
						usize::try_from(id).unwrap_or_default()
					};

					let samples = pixels
						.chunks_exact(4)
						.flat_map(|pixel| {
							let value = pixel[component];
							// Widen by repeating the byte, so the high byte is the 8 bit value
							std::iter::repeat(value).take(self.bytes_per_sample())
						})
						.collect::<Vec<_>>();

					(id, self.encode_channel(&samples, layer.bounds))
				})
				.collect(),
		}
	}

	fn encode_channel(&self, samples: &[u8], bounds: LayerBounds) -> Vec<u8> {
		let mut out = u16::from(self.compression).to_be_bytes().to_vec();

		if matches!(self.compression, Compression::Rle) && !bounds.is_empty() {
			let row_len = to_usize(bounds.width).saturating_mul(self.bytes_per_sample());
			let rows = samples.chunks(row_len).map(pack_bits).collect::<Vec<_>>();

			for row in &rows {
				out.extend_from_slice(&row_size(row).to_be_bytes());
			}
			for row in rows {
				out.extend(row);
			}
		} else {
			out.extend_from_slice(samples);
		}

		out
	}

	fn write_merged_image(&self, out: &mut Vec<u8>) {
		let row = vec![0; to_usize(self.width).saturating_mul(self.bytes_per_sample())];
		let packed = pack_bits(&row);
		let rows = usize::from(self.document_channels()).saturating_mul(to_usize(self.height));

		out.extend_from_slice(&u16::from(Compression::Rle).to_be_bytes());
		for _ in 0..rows {
			out.extend_from_slice(&row_size(&packed).to_be_bytes());
		}
		for _ in 0..rows {
			out.extend_from_slice(&packed);
		}
	}
}

fn to_usize(value: u32) -> usize {
	usize::try_from(value).unwrap_or(usize::MAX)
}

fn row_size(row: &[u8]) -> u16 {
	u16::try_from(row.len()).unwrap_or(u16::MAX)
}

fn push_section(out: &mut Vec<u8>, section: &[u8]) {
	out.extend_from_slice(&u32::try_from(section.len()).unwrap_or(u32::MAX).to_be_bytes());
	out.extend_from_slice(section);
}

fn write_layer_info(records: &[Record<'_>]) -> Vec<u8> {
	if records.is_empty() {
		return vec![];
	}

	let mut out = Vec::new();
	out.extend_from_slice(&i16::try_from(records.len()).unwrap_or(i16::MAX).to_be_bytes());

	for record in records {
		write_record(&mut out, record);
	}

	for record in records {
		for (_, data) in &record.channels {
			out.extend_from_slice(data);
		}
	}

	if out.len() % 2 != 0 {
		out.push(0);
	}

	out
}

fn write_record(out: &mut Vec<u8>, record: &Record<'_>) {
	let LayerBounds {
		x,
		y,
		width,
		height,
	} = record.bounds;
	let bottom = y.saturating_add(i32::try_from(height).unwrap_or(i32::MAX));
	let right = x.saturating_add(i32::try_from(width).unwrap_or(i32::MAX));

	for value in [y, x, bottom, right] {
		out.extend_from_slice(&value.to_be_bytes());
	}

	out.extend_from_slice(&u16::try_from(record.channels.len()).unwrap_or_default().to_be_bytes());
	for (id, data) in &record.channels {
		out.extend_from_slice(&id.to_be_bytes());
		out.extend_from_slice(&u32::try_from(data.len()).unwrap_or(u32::MAX).to_be_bytes());
	}

	out.extend_from_slice(RESOURCE_SIGNATURE);
	out.extend_from_slice(NORMAL_BLEND_MODE);
	out.push(record.opacity);
	out.push(0);
	out.push(if record.visible { 0 } else { 0b10 });
	out.push(0);

	let mut extra = Vec::new();
	// Layer mask and blending ranges
	extra.extend_from_slice(&0_u32.to_be_bytes());
	extra.extend_from_slice(&0_u32.to_be_bytes());

	// Pascal names are limited to 255 bytes, the unicode block below carries the real one
	let name = &record.name.as_bytes()[..record.name.len().min(u8::MAX.into())];
	extra.push(u8::try_from(name.len()).unwrap_or(u8::MAX));
	extra.extend_from_slice(name);
	// The mask and blending range lengths above keep `extra` aligned with the name
	while extra.len() % 4 != 0 {
		extra.push(0);
	}

	let units = record.name.encode_utf16().collect::<Vec<_>>();
	let mut unicode = u32::try_from(units.len()).unwrap_or_default().to_be_bytes().to_vec();
	for unit in units {
		unicode.extend_from_slice(&unit.to_be_bytes());
	}
	push_block(&mut extra, KEY_UNICODE_NAME, &unicode);

	if let Some(divider) = record.divider {
		push_block(&mut extra, KEY_SECTION_DIVIDER, &divider.to_be_bytes());
	}

	push_section(out, &extra);
}

fn push_block(out: &mut Vec<u8>, key: &[u8; 4], data: &[u8]) {
	out.extend_from_slice(RESOURCE_SIGNATURE);
	out.extend_from_slice(key);
	push_section(out, data);
}

/// `PackBits` run length encoding of a single row.
#[must_use]
pub fn pack_bits(row: &[u8]) -> Vec<u8> {
	let mut out = Vec::with_capacity(row.len() / 2 + 2);
	let mut i = 0;

	while i < row.len() {
		let mut run = 1;
		while i + run < row.len() && run < 128 && row[i + run] == row[i] {
			run += 1;
		}

		if run >= 2 {
			// -(run - 1) as a two's complement byte
			out.push(u8::try_from(257 - run).unwrap_or_default());
			out.push(row[i]);
			i += run;
			continue;
		}

		let start = i;
		while i < row.len() && i - start < 128 {
			if i + 1 < row.len() && row[i] == row[i + 1] {
				break;
			}
			i += 1;
		}

		out.push(u8::try_from(i - start - 1).unwrap_or_default());
		out.extend_from_slice(&row[start..i]);
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pack_bits_encodes_runs_and_literals() {
		assert_eq!(pack_bits(&[7, 7, 7, 7]), vec![0xFD, 7]);
		assert_eq!(pack_bits(&[1, 2, 3]), vec![2, 1, 2, 3]);
		assert_eq!(pack_bits(&[1, 2, 2, 2]), vec![0, 1, 0xFE, 2]);
		assert!(pack_bits(&[]).is_empty());
	}

	#[test]
	fn long_runs_are_split_at_128() {
		let packed = pack_bits(&[9; 300]);

		assert_eq!(packed, vec![0x81, 9, 0x81, 9, 0xD5, 9]);
	}
}
