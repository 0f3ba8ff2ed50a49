use forge_images::{decode_handle, rasterize, RasterOptions, RasterizeError};
use forge_psd::{
	decode, ColorMode, Compression, DecodeOptions, LayerFailure, LayerSpec, PsdBuilder, RawChannel,
	RawPixels,
};

use tracing_test::traced_test;

fn first_layer_pixels(bytes: &[u8]) -> RawPixels {
	let mut layers = decode(bytes, &DecodeOptions::default()).unwrap().layers;
	let id = layers.pending_rasterization()[0];
	layers.take_raw_pixels(id).unwrap()
}

fn close_to(actual: u8, expected: u8) -> bool {
	actual.abs_diff(expected) <= 6
}

#[test]
#[traced_test]
fn large_layers_are_capped_to_the_max_dimension() {
	let bytes = PsdBuilder::new(4096, 3072)
		.layer(LayerSpec::solid("huge", 0, 0, 4096, 3072, [30, 60, 90, 255]))
		.build();

	let handle = rasterize(first_layer_pixels(&bytes), &RasterOptions::default()).unwrap();

	assert_eq!((handle.width, handle.height), (1024, 768));
	assert_eq!((handle.source_width, handle.source_height), (4096, 3072));
	assert!(!handle.is_placeholder());

	let img = decode_handle(&handle).unwrap();
	assert_eq!(img.dimensions(), (1024, 768));
}

#[test]
fn small_layers_keep_their_size_and_colour() {
	let bytes = PsdBuilder::new(64, 64)
		.layer(LayerSpec::solid("swatch", 4, 4, 40, 24, [220, 30, 80, 128]))
		.build();

	let handle = rasterize(first_layer_pixels(&bytes), &RasterOptions::default()).unwrap();
	assert_eq!((handle.width, handle.height), (40, 24));

	let pixel = decode_handle(&handle).unwrap().get_pixel(20, 12).0;
	assert!(close_to(pixel[0], 220), "{pixel:?}");
	assert!(close_to(pixel[1], 30), "{pixel:?}");
	assert!(close_to(pixel[2], 80), "{pixel:?}");
	assert!(close_to(pixel[3], 128), "{pixel:?}");
}

#[test]
fn sixteen_bit_grayscale_is_rasterized() {
	let bytes = PsdBuilder::new(32, 32)
		.color_mode(ColorMode::Grayscale)
		.bits_per_channel(16)
		.layer(LayerSpec::solid("gray", 0, 0, 16, 16, [77, 77, 77, 255]))
		.build();

	let handle = rasterize(first_layer_pixels(&bytes), &RasterOptions::default()).unwrap();
	let pixel = decode_handle(&handle).unwrap().get_pixel(8, 8).0;

	assert!(close_to(pixel[0], 77), "{pixel:?}");
	assert_eq!(pixel[0], pixel[1]);
	assert_eq!(pixel[1], pixel[2]);
}

#[test]
fn corrupt_rle_payloads_fail_the_layer_only() {
	let garbage = RawChannel {
		id: 0,
		compression: Compression::Rle,
		// Row table claims 200 bytes for the first row
		data: vec![0, 200, 0, 1, 0xFF],
	};
	let bytes = PsdBuilder::new(16, 16)
		.color_mode(ColorMode::Grayscale)
		.layer(LayerSpec::with_channels("broken", 0, 0, 4, 2, vec![garbage]))
		.build();

	let error = rasterize(first_layer_pixels(&bytes), &RasterOptions::default()).unwrap_err();
	assert!(matches!(error, RasterizeError::CorruptChannel(_)));

	let failure = LayerFailure::from(error);
	assert_eq!(failure.kind, "corrupt_channel");
	assert!(!failure.message.is_empty());
}

#[test]
fn max_dimension_is_configurable() {
	let bytes = PsdBuilder::new(300, 100)
		.layer(LayerSpec::solid("banner", 0, 0, 300, 100, [1, 2, 3, 255]))
		.build();

	let options = RasterOptions {
		max_dimension: 150,
		quality: 50.0,
		..Default::default()
	};
	let handle = rasterize(first_layer_pixels(&bytes), &options).unwrap();

	assert_eq!((handle.width, handle.height), (150, 50));
}
