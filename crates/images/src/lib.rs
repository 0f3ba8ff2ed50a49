//! Rasterization of decoded layers into small, directly displayable WebP bitmaps.

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	clippy::expect_used,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::as_conversions,
	clippy::dbg_macro
)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod channels;
mod consts;
mod error;
mod raster;
mod scale;

pub use consts::{
	DEFAULT_MAX_DIMENSION, DEFAULT_MAX_LAYER_PIXELS, MAX_WEBP_DIMENSION, TARGET_QUALITY,
};
pub use error::{RasterizeError, Result};
pub use raster::{decode_handle, rasterize, RasterOptions};
pub use scale::scale_to_fit;

pub use image::RgbaImage;
