pub type Result<T, E = RasterizeError> = std::result::Result<T, E>;

/// Everything that can go wrong turning one layer into a bitmap.
///
/// All of these are scoped to a single layer, the caller decides whether the rest of
/// the document can carry on.
#[derive(thiserror::Error, Debug)]
pub enum RasterizeError {
	#[error("unsupported pixel format: {0}")]
	UnsupportedPixelFormat(String),
	#[error("layer dimensions overflow: {width}x{height}")]
	DimensionOverflow { width: u32, height: u32 },
	#[error("corrupt channel data: {0}")]
	CorruptChannel(String),
	#[error("failed to encode layer bitmap: {0}")]
	Encode(String),
	#[error("layer has no pixels")]
	EmptyLayer,
}

impl RasterizeError {
	/// Stable identifier for the variant, used when the failure is stored on a layer.
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::UnsupportedPixelFormat(_) => "unsupported_pixel_format",
			Self::DimensionOverflow { .. } => "dimension_overflow",
			Self::CorruptChannel(_) => "corrupt_channel",
			Self::Encode(_) => "encode",
			Self::EmptyLayer => "empty_layer",
		}
	}
}

impl From<RasterizeError> for forge_psd::LayerFailure {
	fn from(error: RasterizeError) -> Self {
		Self {
			kind: error.kind().to_string(),
			message: error.to_string(),
		}
	}
}
