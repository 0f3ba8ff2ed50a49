use crate::{consts::DEFAULT_MAX_DOCUMENT_BYTES, error::DecodeError};

use serde::{Deserialize, Serialize};

/// Colour modes a document header may declare.
///
/// Only [`ColorMode::Rgb`] and [`ColorMode::Grayscale`] can be rasterized, the rest
/// decode fine but their layers end up flagged by the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
	Bitmap,
	Grayscale,
	Indexed,
	Rgb,
	Cmyk,
	Multichannel,
	Duotone,
	Lab,
}

impl TryFrom<u16> for ColorMode {
	type Error = DecodeError;

	fn try_from(value: u16) -> Result<Self, Self::Error> {
		Ok(match value {
			0 => Self::Bitmap,
			1 => Self::Grayscale,
			2 => Self::Indexed,
			3 => Self::Rgb,
			4 => Self::Cmyk,
			7 => Self::Multichannel,
			8 => Self::Duotone,
			9 => Self::Lab,
			other => return Err(DecodeError::corrupt(format!("unknown color mode {other}"))),
		})
	}
}

impl From<ColorMode> for u16 {
	fn from(mode: ColorMode) -> Self {
		match mode {
			ColorMode::Bitmap => 0,
			ColorMode::Grayscale => 1,
			ColorMode::Indexed => 2,
			ColorMode::Rgb => 3,
			ColorMode::Cmyk => 4,
			ColorMode::Multichannel => 7,
			ColorMode::Duotone => 8,
			ColorMode::Lab => 9,
		}
	}
}

/// The decoded file header. Immutable once decoding succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
	pub width: u32,
	pub height: u32,
	pub color_mode: ColorMode,
	pub bits_per_channel: u16,
	pub channel_count: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
	/// Buffers above this size are rejected before any parsing happens.
	pub max_document_bytes: usize,
}

impl Default for DecodeOptions {
	fn default() -> Self {
		Self {
			max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
		}
	}
}
