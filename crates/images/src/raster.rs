use crate::{
	channels::{decimation_step, unpack, Plane},
	consts::{
		DEFAULT_MAX_DIMENSION, DEFAULT_MAX_LAYER_PIXELS, MAXIMUM_LAYER_PIXELS, MAX_WEBP_DIMENSION,
		RGBA_CHANNELS, TARGET_QUALITY,
	},
	error::{RasterizeError, Result},
	scale::scale_to_fit,
};

use forge_psd::{ColorMode, ImageHandle, RawPixels, ALPHA_CHANNEL_ID};

use std::sync::Arc;

use image::{imageops, RgbaImage};
use tracing::{instrument, trace};
use uuid::Uuid;
use webp::{Decoder, Encoder};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
	/// Longest side of the produced bitmap; larger layers are downsampled.
	///
	/// Capped to [`MAX_WEBP_DIMENSION`].
	pub max_dimension: u32,
	/// WebP quality, from 0 to 100.
	pub quality: f32,
	/// Most pixels a layer is unpacked into before resizing.
	pub max_layer_pixels: u64,
}

impl Default for RasterOptions {
	fn default() -> Self {
		Self {
			max_dimension: DEFAULT_MAX_DIMENSION,
			quality: TARGET_QUALITY,
			max_layer_pixels: DEFAULT_MAX_LAYER_PIXELS,
		}
	}
}

/// Turns the raw payload of a leaf layer into an encoded bitmap.
///
/// Layer opacity is not applied, the bitmap only carries the per pixel transparency
/// found in the alpha channel. This is CPU bound, call it from a blocking context.
#[instrument(
	skip_all,
	fields(width = pixels.width, height = pixels.height, mode = ?pixels.color_mode),
	err
)]
pub fn rasterize(pixels: RawPixels, options: &RasterOptions) -> Result<ImageHandle> {
	let (source_width, source_height) = (pixels.width, pixels.height);

	let mut img = to_rgba(&pixels, options.max_layer_pixels)?;
	// The payload is done with, release it before resizing and encoding
	drop(pixels);

	let max_dimension = options.max_dimension.clamp(1, MAX_WEBP_DIMENSION);
	let (width, height) = scale_to_fit(source_width, source_height, max_dimension);

	if img.dimensions() != (width, height) {
		trace!(width, height, "Downsampling layer");
		img = imageops::resize(&img, width, height, imageops::FilterType::Triangle);
	}

	let data = encode(&img, options.quality)?;

	trace!(bytes = data.len(), "Rasterized layer");

	Ok(ImageHandle {
		id: Uuid::new_v4(),
		width,
		height,
		source_width,
		source_height,
		data,
	})
}

/// Decodes a handle back into pixels, mostly for compositing previews.
pub fn decode_handle(handle: &ImageHandle) -> Result<RgbaImage> {
	if handle.is_placeholder() {
		return Err(RasterizeError::EmptyLayer);
	}

	Decoder::new(&handle.data)
		.decode()
		.map(|decoded| decoded.to_image().into_rgba8())
		.ok_or_else(|| RasterizeError::Encode("handle does not hold a valid WebP bitmap".to_string()))
}

fn bytes_per_sample(pixels: &RawPixels) -> Result<usize> {
	match pixels.bits_per_channel {
		8 => Ok(1),
		16 => Ok(2),
		other => Err(RasterizeError::UnsupportedPixelFormat(format!(
			"{other} bits per channel"
		))),
	}
}

fn colour_channel_ids(mode: ColorMode) -> Result<&'static [i16]> {
	match mode {
		ColorMode::Rgb => Ok(&[0, 1, 2]),
		ColorMode::Grayscale => Ok(&[0]),
		other => Err(RasterizeError::UnsupportedPixelFormat(format!(
			"{other:?} colour mode"
		))),
	}
}

/// Unpacks the layer into at most `max_pixels` pixels, decimating larger layers.
fn to_rgba(pixels: &RawPixels, max_pixels: u64) -> Result<RgbaImage> {
	if pixels.is_empty() {
		return Err(RasterizeError::EmptyLayer);
	}

	let overflow = || RasterizeError::DimensionOverflow {
		width: pixels.width,
		height: pixels.height,
	};

	if u64::from(pixels.width) * u64::from(pixels.height) > MAXIMUM_LAYER_PIXELS {
		return Err(overflow());
	}

	let ids = colour_channel_ids(pixels.color_mode)?;
	let width = usize::try_from(pixels.width).map_err(|_| overflow())?;
	let height = usize::try_from(pixels.height).map_err(|_| overflow())?;
	let plane = Plane {
		width,
		height,
		bytes_per_sample: bytes_per_sample(pixels)?,
		step: decimation_step(width, height, max_pixels),
	};
	let samples = plane.samples()?;

	if plane.step > 1 {
		trace!(step = plane.step, "Decimating layer while unpacking");
	}

	let colours = ids
		.iter()
		.map(|&id| {
			pixels
				.channel(id)
				.ok_or_else(|| RasterizeError::CorruptChannel(format!("missing colour channel {id}")))
				.and_then(|channel| unpack(channel, plane))
		})
		.collect::<Result<Vec<_>>>()?;

	let alpha = pixels
		.channel(ALPHA_CHANNEL_ID)
		.map(|channel| unpack(channel, plane))
		.transpose()?;

	let mut buffer = Vec::with_capacity(samples.checked_mul(RGBA_CHANNELS).ok_or_else(overflow)?);

	let alpha_at = |i: usize| alpha.as_ref().map_or(u8::MAX, |alpha| alpha[i]);

	match colours.as_slice() {
		[gray] => {
			for (i, &value) in gray.iter().enumerate().take(samples) {
				buffer.extend_from_slice(&[value, value, value, alpha_at(i)]);
			}
		}
		[r, g, b] => {
			for i in 0..samples {
				buffer.extend_from_slice(&[r[i], g[i], b[i], alpha_at(i)]);
			}
		}
		_ => {
			return Err(RasterizeError::UnsupportedPixelFormat(format!(
				"{} colour channels",
				colours.len()
			)))
		}
	}

	let out_width = u32::try_from(plane.out_width()).map_err(|_| overflow())?;
	let out_height = u32::try_from(plane.out_height()).map_err(|_| overflow())?;

	RgbaImage::from_raw(out_width, out_height, buffer).ok_or_else(overflow)
}

fn encode(img: &RgbaImage, quality: f32) -> Result<Arc<[u8]>> {
	let memory = Encoder::from_rgba(img.as_raw(), img.width(), img.height())
		.encode_simple(false, quality)
		.map_err(|e| RasterizeError::Encode(format!("{e:?}")))?;

	// `WebPMemory` is !Send, copy it out right away so the handle can cross threads
	Ok(Arc::from(&*memory))
}
