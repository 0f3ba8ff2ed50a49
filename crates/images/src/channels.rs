use crate::error::{RasterizeError, Result};

use forge_psd::{Compression, RawChannel};

/// Plane geometry shared by every channel of a layer.
///
/// Only every `step`th row and column is kept when unpacking, a step of 1 keeps everything.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Plane {
	pub width: usize,
	pub height: usize,
	pub bytes_per_sample: usize,
	pub step: usize,
}

impl Plane {
	fn row_len(self) -> Result<usize> {
		self.width
			.checked_mul(self.bytes_per_sample)
			.ok_or_else(|| RasterizeError::CorruptChannel("row length overflows".to_string()))
	}

	pub const fn out_width(self) -> usize {
		self.width.div_ceil(self.step)
	}

	pub const fn out_height(self) -> usize {
		self.height.div_ceil(self.step)
	}

	/// Samples per channel once unpacked.
	pub fn samples(self) -> Result<usize> {
		self.out_width()
			.checked_mul(self.out_height())
			.ok_or_else(|| RasterizeError::CorruptChannel("plane size overflows".to_string()))
	}

	fn keep_row(self, row: &[u8], out: &mut Vec<u8>) {
		out.extend(
			row.chunks_exact(self.bytes_per_sample)
				.step_by(self.step)
				// Most significant byte of big endian samples
				.map(|sample| sample[0]),
		);
	}
}

/// Smallest decimation step bringing a `width` by `height` plane within `budget` pixels.
pub(crate) fn decimation_step(width: usize, height: usize, budget: u64) -> usize {
	let budget = budget.max(1);
	let kept = |step: usize| {
		u64::try_from(width.div_ceil(step))
			.unwrap_or(u64::MAX)
			.saturating_mul(u64::try_from(height.div_ceil(step)).unwrap_or(u64::MAX))
	};

	let mut step = 1;
	while kept(step) > budget {
		step += 1;
	}

	step
}

/// Decompresses a channel, narrowed to one byte per sample and decimated by `plane.step`.
pub(crate) fn unpack(channel: &RawChannel, plane: Plane) -> Result<Vec<u8>> {
	let row_len = plane.row_len()?;
	if row_len == 0 || plane.height == 0 || plane.step == 0 {
		return Ok(vec![]);
	}

	let mut out = Vec::with_capacity(plane.samples()?);

	match channel.compression {
		Compression::Raw => {
			let expected = row_len
				.checked_mul(plane.height)
				.ok_or_else(|| RasterizeError::CorruptChannel("plane size overflows".to_string()))?;

			if channel.data.len() < expected {
				return Err(RasterizeError::CorruptChannel(format!(
					"channel {} holds {} bytes, expected {expected}",
					channel.id,
					channel.data.len()
				)));
			}

			for row in channel.data[..expected]
				.chunks_exact(row_len)
				.step_by(plane.step)
			{
				plane.keep_row(row, &mut out);
			}
		}

		Compression::Rle => unpack_rle(&channel.data, plane, row_len, &mut out).map_err(|reason| {
			RasterizeError::CorruptChannel(format!("channel {}: {reason}", channel.id))
		})?,

		Compression::Zip | Compression::ZipPrediction => {
			return Err(RasterizeError::UnsupportedPixelFormat(
				"zip compressed channels".to_string(),
			))
		}

		Compression::Unknown(method) => {
			return Err(RasterizeError::CorruptChannel(format!(
				"channel {} uses unknown compression {method}",
				channel.id
			)))
		}
	}

	Ok(out)
}

/// Row-wise `PackBits`, preceded by a table holding the packed size of every row.
///
/// Rows dropped by decimation are skipped without being unpacked.
fn unpack_rle(data: &[u8], plane: Plane, row_len: usize, out: &mut Vec<u8>) -> Result<(), String> {
	let table_len = plane
		.height
		.checked_mul(2)
		.ok_or_else(|| "row table overflows".to_string())?;

	if data.len() < table_len {
		return Err("truncated row table".to_string());
	}

	let (table, mut packed) = data.split_at(table_len);
	let mut row_buf = Vec::with_capacity(row_len);

	for (row, size) in table.chunks_exact(2).enumerate() {
		let size = usize::from(u16::from_be_bytes([size[0], size[1]]));
		if packed.len() < size {
			return Err(format!("row {row} runs past the end of the channel"));
		}

		let (current, rest) = packed.split_at(size);
		packed = rest;

		if row % plane.step != 0 {
			continue;
		}

		row_buf.clear();
		unpack_bits(current, row_len, &mut row_buf)?;
		if row_buf.len() != row_len {
			return Err(format!(
				"row {row} unpacked to {} bytes, expected {row_len}",
				row_buf.len()
			));
		}

		plane.keep_row(&row_buf, out);
	}

	Ok(())
}

/// Decodes a single `PackBits` row into `out`, never growing it by more than `limit`.
fn unpack_bits(mut src: &[u8], limit: usize, out: &mut Vec<u8>) -> Result<(), String> {
	let start = out.len();

	while let Some((&header, rest)) = src.split_first() {
		src = rest;
		let header = i8::from_be_bytes([header]);

		match header {
			// No-op marker
			-128 => {}

			0..=i8::MAX => {
				let count = usize::from(header.unsigned_abs()) + 1;
				if src.len() < count {
					return Err("literal run past the end of the row".to_string());
				}
				if out.len() - start + count > limit {
					return Err("literal run overflows the row".to_string());
				}
				out.extend_from_slice(&src[..count]);
				src = &src[count..];
			}

			_ => {
				let count = usize::from(header.unsigned_abs()) + 1;
				let Some((&value, rest)) = src.split_first() else {
					return Err("repeat run without a value".to_string());
				};
				src = rest;
				if out.len() - start + count > limit {
					return Err("repeat run overflows the row".to_string());
				}
				out.resize(out.len() + count, value);
			}
		}
	}

	Ok(())
}
