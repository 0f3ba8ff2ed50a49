//! Decoder for the layered `8BPS` design document format.
//!
//! Only the structure needed to work with layers is understood: the header, the
//! layer records with their bounds, visibility, opacity and names, the group
//! hierarchy expressed through section dividers, and each layer's channel data,
//! which is handed out still compressed. Blend modes, effects, text and adjustment
//! layers are read past without interpretation.
//!
//! ```no_run
//! use forge_psd::{decode, DecodeOptions};
//!
//! let bytes = std::fs::read("card.psd")?;
//! let decoded = decode(&bytes, &DecodeOptions::default())?;
//!
//! for node in decoded.layers.top_level() {
//! 	println!("{} ({} children)", node.name, node.children.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

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
	clippy::dbg_macro
)]
#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

#[cfg(any(test, feature = "test-utils"))]
mod builder;
mod consts;
mod decoder;
mod document;
mod error;
mod layer;
mod reader;


#[cfg(any(test, feature = "test-utils"))]
pub use builder::{pack_bits, GroupBuilder, LayerSpec, PsdBuilder};
pub use consts::{ALPHA_CHANNEL_ID, DEFAULT_MAX_DOCUMENT_BYTES, MAX_DOCUMENT_DIMENSION};
pub use decoder::{decode, DecodedDocument};
pub use document::{ColorMode, DecodeOptions, Document};
pub use error::{DecodeError, Result};
pub use layer::{
	Compression, ImageHandle, LayerBounds, LayerFailure, LayerId, LayerKind, LayerNode, LayerTree,
	RawChannel, RawPixels,
};
