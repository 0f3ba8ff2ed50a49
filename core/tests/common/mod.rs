#![allow(dead_code)]

use forge_core::{JobEvent, JobEvents, PipelineConfig};
use forge_psd::{Compression, LayerSpec, PsdBuilder, RawChannel};

use std::time::Duration;

use tokio::time::timeout;

pub const EVENTS_TIMEOUT: Duration = Duration::from_secs(120);

/// A layer whose payload can't be decompressed.
pub fn broken_layer(name: &str, width: u32, height: u32) -> LayerSpec {
	let garbage = RawChannel {
		id: 0,
		compression: Compression::Rle,
		// Row table claims 200 bytes for the first row
		data: vec![0, 200, 0, 1, 0xFF],
	};

	LayerSpec::with_channels(name, 0, 0, width, height, vec![garbage])
}

/// A flat document with `count` solid layers, a bit more work per layer than a swatch.
pub fn busy_document(count: u8) -> Vec<u8> {
	(0..count)
		.fold(PsdBuilder::new(512, 512), |builder, i| {
			let offset = i32::from(i) * 4;
			builder.layer(LayerSpec::solid(
				&format!("layer {i}"),
				offset,
				offset,
				384,
				384,
				[i.wrapping_mul(37), 90, 200, 255],
			))
		})
		.build()
}

pub async fn all_events(events: JobEvents) -> Vec<JobEvent> {
	timeout(EVENTS_TIMEOUT, events.collect())
		.await
		.expect("job did not finish in time")
}

pub fn quick_config() -> PipelineConfig {
	PipelineConfig {
		max_layer_dimension: 256,
		encode_quality: 50.0,
		..Default::default()
	}
}

/// Checks the event stream shape: non decreasing progress, then exactly one terminal event.
pub fn assert_well_formed(events: &[JobEvent]) {
	let (last, progress) = events.split_last().expect("no events at all");

	assert!(last.is_terminal(), "last event is not terminal: {last:?}");

	let mut previous = 0;
	for event in progress {
		match event {
			JobEvent::Progress { percent, .. } => {
				assert!(*percent >= previous, "progress went from {previous} to {percent}");
				assert!(*percent <= 100);
				previous = *percent;
			}
			other => panic!("terminal event before the end of the stream: {other:?}"),
		}
	}
}
