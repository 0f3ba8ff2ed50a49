use forge_core::{ConfigError, FrameCatalog, PipelineConfig};

use tempfile::tempdir;
use tokio::fs;

#[tokio::test]
async fn missing_files_are_created_with_defaults() {
	let dir = tempdir().unwrap();
	let path = dir.path().join("nested").join("pipeline.json");

	let config = PipelineConfig::load_from(&path).await.unwrap();

	assert_eq!(config, PipelineConfig::default());
	assert!(fs::try_exists(&path).await.unwrap());
}

#[tokio::test]
async fn saved_configs_load_back() {
	let dir = tempdir().unwrap();
	let path = dir.path().join("pipeline.json");

	let config = PipelineConfig {
		max_layer_dimension: 512,
		raster_concurrency: 3,
		auto_synthesize: false,
		..Default::default()
	};
	config.save_to(&path).await.unwrap();

	assert_eq!(PipelineConfig::load_from(&path).await.unwrap(), config);
}

#[tokio::test]
async fn old_versions_are_upgraded_on_load() {
	let dir = tempdir().unwrap();
	let path = dir.path().join("pipeline.json");

	fs::write(&path, r#"{ "version": 0, "encode_quality": 65.0 }"#)
		.await
		.unwrap();

	let config = PipelineConfig::load_from(&path).await.unwrap();
	assert_eq!(config.version, PipelineConfig::CURRENT_VERSION);
	assert!((config.encode_quality - 65.0).abs() < f32::EPSILON);

	let stored = serde_json::from_slice::<serde_json::Value>(&fs::read(&path).await.unwrap()).unwrap();
	assert_eq!(stored["version"], PipelineConfig::CURRENT_VERSION);
}

#[tokio::test]
async fn invalid_files_are_rejected() {
	let dir = tempdir().unwrap();

	let garbage = dir.path().join("garbage.json");
	fs::write(&garbage, "{ not json").await.unwrap();
	assert!(matches!(
		PipelineConfig::load_from(&garbage).await,
		Err(ConfigError::Serde(_))
	));

	let invalid = dir.path().join("invalid.json");
	PipelineConfig {
		frame_catalog: FrameCatalog { variants: vec![] },
		..Default::default()
	}
	.save_to(&invalid)
	.await
	.unwrap();

	let err = PipelineConfig::load_from(&invalid).await.unwrap_err();
	assert_eq!(err.kind(), "invalid_config");
}

#[test]
fn coordinators_refuse_invalid_configs() {
	let err = forge_core::Coordinator::new(PipelineConfig {
		raster_concurrency: 0,
		..Default::default()
	})
	.unwrap_err();

	assert!(matches!(err, ConfigError::Invalid(_)));
}
