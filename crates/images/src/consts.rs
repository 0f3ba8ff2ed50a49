/// Longest side, in pixels, of a rasterized layer bitmap.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// The WebP quality used when nothing else is configured.
///
/// Layers are shown at small sizes next to each other, so this sits a bit above the
/// quality used for thumbnails.
pub const TARGET_QUALITY: f32 = 80.0;

/// Upper bound on the pixel count of a single layer before decompression.
///
/// This matches the largest canvas the decoder accepts, 30000 by 30000.
pub(crate) const MAXIMUM_LAYER_PIXELS: u64 = 30_000 * 30_000;

/// Pixel budget of the working buffer a single layer is unpacked into.
///
/// Layers above it are decimated while their channels are unpacked, so memory stays bounded
/// no matter how large the layer claims to be.
pub const DEFAULT_MAX_LAYER_PIXELS: u64 = 4096 * 4096;

/// Longest side the WebP encoder accepts.
pub const MAX_WEBP_DIMENSION: u32 = 16_383;

pub(crate) const RGBA_CHANNELS: usize = 4;
