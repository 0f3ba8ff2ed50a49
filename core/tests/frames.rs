use forge_core::{
	FrameCatalog, FrameStyle, FrameSynthesizer, FrameVariant, LayerOrganizer, LayerPick, Rarity,
	RegionTemplate, ReviewSession, SynthesisError,
};
use forge_psd::{decode, DecodeOptions, LayerSpec, LayerTree, PsdBuilder};

use std::collections::HashSet;

use serde_json::json;

fn tree() -> (forge_psd::Document, LayerTree) {
	let buffer = PsdBuilder::new(200, 300)
		.layer(LayerSpec::solid("paper", 0, 0, 200, 300, [250, 250, 240, 255]))
		.layer(LayerSpec::solid("art", 20, 40, 160, 120, [30, 90, 160, 255]))
		.layer(LayerSpec::solid("title", 10, 10, 180, 24, [0, 0, 0, 255]))
		.layer(LayerSpec::solid("gem", 170, 270, 12, 12, [200, 0, 90, 255]))
		.build();

	let decoded = decode(&buffer, &DecodeOptions::default()).unwrap();
	(decoded.document, decoded.layers)
}

#[test]
fn empty_selections_are_rejected() {
	let err = FrameSynthesizer::default().synthesize(&[], false).unwrap_err();

	assert!(matches!(err, SynthesisError::EmptyActiveSet));
	assert_eq!(err.kind(), "empty_active_set");
}

#[test]
fn every_call_produces_fresh_frames() {
	let (_, tree) = tree();
	let mut organizer = LayerOrganizer::from_tree(&tree);
	organizer.select_all();
	let active = organizer.active_layers(&tree);

	let synthesizer = FrameSynthesizer::default();
	let first = synthesizer.synthesize(&active, false).unwrap();
	let second = synthesizer.synthesize(&active, false).unwrap();

	let first_ids = first.iter().map(|frame| frame.id()).collect::<HashSet<_>>();
	let second_ids = second.iter().map(|frame| frame.id()).collect::<HashSet<_>>();

	assert_eq!(first_ids.len(), 4);
	assert!(first_ids.is_disjoint(&second_ids));

	let input = active.iter().map(|node| node.id).collect::<HashSet<_>>();

	for frame in first.iter().chain(&second) {
		assert!(!frame.auto_generated());
		assert!(frame.included_layer_ids().iter().all(|id| input.contains(id)));
		assert!(!frame.frame_config().regions.is_empty());
		assert!(frame
			.frame_config()
			.regions
			.iter()
			.all(|region| frame.included_layer_ids().contains(&region.layer_id)));
	}

	let rarities = first.iter().map(|frame| frame.rarity()).collect::<Vec<_>>();
	assert_eq!(
		rarities,
		[Rarity::Common, Rarity::Rare, Rarity::Epic, Rarity::Legendary]
	);
}

#[test]
fn regions_pick_the_expected_layers() {
	let (_, tree) = tree();
	let active = tree.top_level().collect::<Vec<_>>();

	let frames = FrameSynthesizer::default().synthesize(&active, false).unwrap();
	let classic = &frames[0];
	assert_eq!(classic.style(), FrameStyle::Classic);

	let picked = classic
		.frame_config()
		.regions
		.iter()
		.map(|region| {
			let name = &tree.get(region.layer_id).unwrap().name;
			(region.name.as_str(), name.as_str())
		})
		.collect::<Vec<_>>();

	// The paper is taken by the background, so the title goes to the next widest layer
	assert_eq!(
		picked,
		[("background", "paper"), ("artwork", "art"), ("title", "title")]
	);
}

#[test]
fn catalogs_are_configurable() {
	let (_, tree) = tree();
	let active = tree.top_level().collect::<Vec<_>>();

	let catalog = FrameCatalog {
		variants: vec![FrameVariant {
			name: "Minimal".to_string(),
			style: FrameStyle::Foil,
			rarity: Rarity::Epic,
			regions: vec![RegionTemplate::new("badge", LayerPick::Smallest, 2)],
		}],
	};

	let frames = FrameSynthesizer::new(catalog).synthesize(&active, false).unwrap();

	assert_eq!(frames.len(), 1);
	assert_eq!(frames[0].name(), "Minimal");

	let region = &frames[0].frame_config().regions[0];
	assert_eq!(tree.get(region.layer_id).unwrap().name, "gem");
	assert_eq!(
		(region.bounds.x, region.bounds.y, region.bounds.width),
		(168, 268, 16)
	);
}

#[test]
fn exported_templates_use_the_documented_field_names() {
	let (document, tree) = tree();
	let active = tree.top_level().collect::<Vec<_>>();
	let frames = FrameSynthesizer::default().synthesize(&active, false).unwrap();
	let frame_id = frames[0].id();

	let session = ReviewSession::new(document, tree.clone(), frames);
	let template = session.export_frame(frame_id).unwrap();

	let value = serde_json::from_str::<serde_json::Value>(&template.to_json().unwrap()).unwrap();
	let background = tree.get(template.regions[0].layer_id).unwrap();

	assert_eq!(
		value["regions"][0],
		json!({
			"name": "background",
			"bounds": { "x": 0, "y": 0, "width": 200, "height": 300 },
			"layerId": background.id.0,
		})
	);
	assert_eq!(
		value["regions"].as_array().unwrap().len(),
		template.regions.len()
	);
}
