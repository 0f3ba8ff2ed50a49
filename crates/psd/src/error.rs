pub type Result<T> = std::result::Result<T, DecodeError>;

/// Document level decoding failures.
///
/// Decoding is all or nothing: any of these means no layer tree was produced.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
	#[error("the document ended unexpectedly while reading {0}")]
	Truncated(&'static str),
	#[error("unsupported document version: {0}")]
	UnsupportedVersion(u16),
	#[error("the document is corrupt: {0}")]
	Corrupt(String),
	#[error("the document is too large <size={size}, max={max}>")]
	TooLarge { size: usize, max: usize },
}

impl DecodeError {
	/// Stable machine readable identifier for this error kind.
	#[must_use]
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Truncated(_) => "truncated",
			Self::UnsupportedVersion(_) => "unsupported_version",
			Self::Corrupt(_) => "corrupt",
			Self::TooLarge { .. } => "too_large",
		}
	}

	pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
		Self::Corrupt(msg.into())
	}
}
