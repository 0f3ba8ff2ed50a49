use crate::error::{DecodeError, Result};

/// Big endian cursor over a borrowed buffer.
///
/// Every read is bounds checked and reports which structure was being read when
/// the buffer ran out, so a short document never panics.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'buf> {
	data: &'buf [u8],
	pos: usize,
}

impl<'buf> Reader<'buf> {
	pub(crate) const fn new(data: &'buf [u8]) -> Self {
		Self { data, pos: 0 }
	}

	#[cfg(test)]
	pub(crate) const fn position(&self) -> usize {
		self.pos
	}

	pub(crate) const fn remaining(&self) -> usize {
		self.data.len() - self.pos
	}

	pub(crate) const fn is_empty(&self) -> bool {
		self.remaining() == 0
	}

	pub(crate) fn bytes(&mut self, len: usize, what: &'static str) -> Result<&'buf [u8]> {
		let end = self
			.pos
			.checked_add(len)
			.filter(|&end| end <= self.data.len())
			.ok_or(DecodeError::Truncated(what))?;

		let slice = &self.data[self.pos..end];
		self.pos = end;

		Ok(slice)
	}

	pub(crate) fn skip(&mut self, len: usize, what: &'static str) -> Result<()> {
		self.bytes(len, what).map(|_| ())
	}

	pub(crate) fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
		let mut out = [0; N];
		out.copy_from_slice(self.bytes(N, what)?);
		Ok(out)
	}

	pub(crate) fn u8(&mut self, what: &'static str) -> Result<u8> {
		self.array::<1>(what).map(|[byte]| byte)
	}

	pub(crate) fn u16(&mut self, what: &'static str) -> Result<u16> {
		self.array(what).map(u16::from_be_bytes)
	}

	pub(crate) fn i16(&mut self, what: &'static str) -> Result<i16> {
		self.array(what).map(i16::from_be_bytes)
	}

	pub(crate) fn u32(&mut self, what: &'static str) -> Result<u32> {
		self.array(what).map(u32::from_be_bytes)
	}

	pub(crate) fn i32(&mut self, what: &'static str) -> Result<i32> {
		self.array(what).map(i32::from_be_bytes)
	}

	/// Reads a `u32` length prefix and splits off a sub reader over that many bytes.
	pub(crate) fn section(&mut self, what: &'static str) -> Result<Reader<'buf>> {
		let len = self.u32(what)?;
		let len = usize::try_from(len).map_err(|_| DecodeError::Truncated(what))?;
		self.bytes(len, what).map(Reader::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_big_endian_values() {
		let data = [0x00, 0x01, 0xFF, 0xFE, 0x00, 0x00, 0x01, 0x00];
		let mut reader = Reader::new(&data);

		assert_eq!(reader.u16("a").unwrap(), 1);
		assert_eq!(reader.i16("b").unwrap(), -2);
		assert_eq!(reader.u32("c").unwrap(), 256);
		assert!(reader.is_empty());
	}

	#[test]
	fn short_reads_are_truncation_errors() {
		let mut reader = Reader::new(&[0x01, 0x02]);

		assert_eq!(reader.u32("header"), Err(DecodeError::Truncated("header")));
		// a failed read does not move the cursor
		assert_eq!(reader.position(), 0);
	}

	#[test]
	fn sections_are_bounded() {
		let data = [0, 0, 0, 2, 0xAA, 0xBB, 0xCC];
		let mut reader = Reader::new(&data);

		let mut section = reader.section("section").unwrap();
		assert_eq!(section.u16("inner").unwrap(), 0xAABB);
		assert!(section.u8("inner").is_err());
		assert_eq!(reader.remaining(), 1);
	}
}
