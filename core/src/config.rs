//! Pipeline configuration

use crate::{error::FileIOError, frames::FrameCatalog, logging::LoggingConfig};

use forge_images::{
	RasterOptions, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_LAYER_PIXELS, MAX_WEBP_DIMENSION,
	TARGET_QUALITY,
};
use forge_psd::{DecodeOptions, DEFAULT_MAX_DOCUMENT_BYTES};

use std::{num::NonZeroUsize, path::Path};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error(transparent)]
	FileIO(#[from] FileIOError),
	#[error("failed to (de)serialize config: {0}")]
	Serde(#[from] serde_json::Error),
	#[error("invalid config: {0}")]
	Invalid(String),
}

impl ConfigError {
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::FileIO(_) => "file_io",
			Self::Serde(_) => "serde",
			Self::Invalid(_) => "invalid_config",
		}
	}
}

/// Settings for the whole ingestion pipeline, stored as JSON.
///
/// Every field falls back to its default when missing from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
	/// Config schema version
	pub version: u32,
	/// Documents above this size are rejected before parsing.
	pub max_document_bytes: usize,
	/// Longest side of a rasterized layer bitmap.
	pub max_layer_dimension: u32,
	/// Pixel budget for unpacking a single layer, larger layers are decimated first.
	pub max_layer_pixels: u64,
	/// WebP quality, between 0 and 100.
	pub encode_quality: f32,
	/// How many layers of one job may be rasterized at the same time.
	pub raster_concurrency: usize,
	/// Whether a job synthesizes frames over its eligible top level layers.
	pub auto_synthesize: bool,
	pub frame_catalog: FrameCatalog,
	pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			version: Self::CURRENT_VERSION,
			max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
			max_layer_dimension: DEFAULT_MAX_DIMENSION,
			max_layer_pixels: DEFAULT_MAX_LAYER_PIXELS,
			encode_quality: TARGET_QUALITY,
			raster_concurrency: 1,
			auto_synthesize: true,
			frame_catalog: FrameCatalog::default(),
			logging: LoggingConfig::default(),
		}
	}
}

impl PipelineConfig {
	pub const CURRENT_VERSION: u32 = 1;

	/// Loads the config at `path`, writing the defaults there when no file exists yet.
	///
	/// Files from an older version are upgraded and saved back.
	pub async fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();

		match fs::read(path).await {
			Ok(bytes) => {
				info!(path = %path.display(), "Loading config");
				let mut config = serde_json::from_slice::<Self>(&bytes)?;
				config.validate()?;

				if config.version < Self::CURRENT_VERSION {
					info!(
						from = config.version,
						to = Self::CURRENT_VERSION,
						"Upgrading config version"
					);
					config.version = Self::CURRENT_VERSION;
					config.save_to(path).await?;
				}

				Ok(config)
			}

			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				warn!(path = %path.display(), "No config found, creating default");
				let config = Self::default();
				config.save_to(path).await?;
				Ok(config)
			}

			Err(e) => Err(FileIOError::from((path, e, "Failed to read config file")).into()),
		}
	}

	pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
		let path = path.as_ref();

		if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| FileIOError::from((parent, e, "Failed to create config directory")))?;
		}

		fs::write(path, serde_json::to_vec_pretty(self)?)
			.await
			.map_err(|e| FileIOError::from((path, e, "Failed to write config file")))?;

		info!(path = %path.display(), "Saved config");

		Ok(())
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if !(1..=MAX_WEBP_DIMENSION).contains(&self.max_layer_dimension) {
			return Err(ConfigError::Invalid(format!(
				"max_layer_dimension must be between 1 and {MAX_WEBP_DIMENSION}, got {}",
				self.max_layer_dimension
			)));
		}

		// Decimating below the output size would only be scaled back up
		let square = u64::from(self.max_layer_dimension).pow(2);
		if self.max_layer_pixels < square {
			return Err(ConfigError::Invalid(format!(
				"max_layer_pixels must be at least {square} for a max_layer_dimension of {}, got {}",
				self.max_layer_dimension, self.max_layer_pixels
			)));
		}

		if !(0.0..=100.0).contains(&self.encode_quality) {
			return Err(ConfigError::Invalid(format!(
				"encode_quality must be between 0 and 100, got {}",
				self.encode_quality
			)));
		}

		if self.raster_concurrency == 0 {
			return Err(ConfigError::Invalid(
				"raster_concurrency must be greater than zero".to_string(),
			));
		}

		if self.frame_catalog.is_empty() {
			return Err(ConfigError::Invalid(
				"frame_catalog must declare at least one variant".to_string(),
			));
		}

		if let Some(name) = self.frame_catalog.regionless_variants().next() {
			return Err(ConfigError::Invalid(format!(
				"frame variant '{name}' declares no region"
			)));
		}

		Ok(())
	}

	#[must_use]
	pub const fn decode_options(&self) -> DecodeOptions {
		DecodeOptions {
			max_document_bytes: self.max_document_bytes,
		}
	}

	#[must_use]
	pub const fn raster_options(&self) -> RasterOptions {
		RasterOptions {
			max_dimension: self.max_layer_dimension,
			quality: self.encode_quality,
			max_layer_pixels: self.max_layer_pixels,
		}
	}

	pub(crate) fn raster_concurrency(&self) -> NonZeroUsize {
		NonZeroUsize::new(self.raster_concurrency).unwrap_or(NonZeroUsize::MIN)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_valid() {
		let config = PipelineConfig::default();

		assert!(config.validate().is_ok());
		assert_eq!(config.max_layer_dimension, 1024);
		assert_eq!(config.raster_options().max_layer_pixels, 4096 * 4096);
		assert_eq!(config.raster_concurrency, 1);
		assert!(config.auto_synthesize);
	}

	#[test]
	fn missing_fields_fall_back_to_defaults() {
		let config = serde_json::from_str::<PipelineConfig>(r#"{"max_layer_dimension": 512}"#)
			.unwrap();

		assert_eq!(config.max_layer_dimension, 512);
		assert_eq!(config.frame_catalog, FrameCatalog::default());
		assert_eq!(config.logging, LoggingConfig::default());
	}

	#[test]
	fn rejects_nonsense() {
		let cases = [
			PipelineConfig {
				max_layer_dimension: 0,
				..Default::default()
			},
			PipelineConfig {
				max_layer_dimension: MAX_WEBP_DIMENSION + 1,
				max_layer_pixels: u64::MAX,
				..Default::default()
			},
			PipelineConfig {
				max_layer_pixels: 1000,
				..Default::default()
			},
			PipelineConfig {
				encode_quality: 101.0,
				..Default::default()
			},
			PipelineConfig {
				raster_concurrency: 0,
				..Default::default()
			},
			PipelineConfig {
				frame_catalog: FrameCatalog { variants: vec![] },
				..Default::default()
			},
		];

		for config in cases {
			let err = config.validate().unwrap_err();
			assert_eq!(err.kind(), "invalid_config");
		}
	}

	#[test]
	fn largest_webp_side_is_accepted() {
		let config = PipelineConfig {
			max_layer_dimension: MAX_WEBP_DIMENSION,
			max_layer_pixels: u64::from(MAX_WEBP_DIMENSION).pow(2),
			..Default::default()
		};

		assert!(config.validate().is_ok());
	}
}
