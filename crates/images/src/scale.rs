/// Dimensions fitting inside a `max_dimension` square, aspect ratio preserved.
///
/// Images already within bounds are returned as is. Otherwise the longer side becomes
/// exactly `max_dimension` and the shorter one is rounded to the nearest pixel, never
/// below 1.
#[must_use]
pub fn scale_to_fit(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
	if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
		return (width, height);
	}

	let shorter = |short: u32, long: u32| {
		let (short, long, max) = (u64::from(short), u64::from(long), u64::from(max_dimension));
		let rounded = (short * max * 2 + long) / (long * 2);
		u32::try_from(rounded).unwrap_or(max_dimension).max(1)
	};

	if width >= height {
		(max_dimension, shorter(height, width))
	} else {
		(shorter(width, height), max_dimension)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn caps_the_longer_side() {
		assert_eq!(scale_to_fit(4096, 3072, 1024), (1024, 768));
		assert_eq!(scale_to_fit(3072, 4096, 1024), (768, 1024));
		assert_eq!(scale_to_fit(2048, 2048, 1024), (1024, 1024));
	}

	#[test]
	fn small_images_are_left_alone() {
		assert_eq!(scale_to_fit(800, 600, 1024), (800, 600));
		assert_eq!(scale_to_fit(1024, 10, 1024), (1024, 10));
	}

	#[test]
	fn slivers_keep_at_least_one_pixel() {
		assert_eq!(scale_to_fit(20_000, 1, 1024), (1024, 1));
	}

	#[test]
	fn preserves_aspect_ratio() {
		use rand::Rng;

		let mut rng = rand::thread_rng();
		for _ in 0..1_000 {
			let width = rng.gen_range(1..=20_000);
			let height = rng.gen_range(1..=20_000);
			let (scaled_width, scaled_height) = scale_to_fit(width, height, 1024);

			assert!(scaled_width <= 1024 && scaled_height <= 1024);
			if width > 1024 || height > 1024 {
				assert_eq!(scaled_width.max(scaled_height), 1024);

				let (short, long, scaled_short) = if width >= height {
					(height, width, scaled_height)
				} else {
					(width, height, scaled_width)
				};
				let exact = f64::from(short) * 1024.0 / f64::from(long);
				assert!(
					(f64::from(scaled_short) - exact).abs() <= 0.5 || scaled_short == 1,
					"{width}x{height} scaled to {scaled_width}x{scaled_height}"
				);
			}
		}
	}
}
