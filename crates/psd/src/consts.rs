/// File signature, always the first four bytes of a document.
pub const SIGNATURE: &[u8; 4] = b"8BPS";

/// Signature preceding blend modes and additional layer information blocks.
pub const RESOURCE_SIGNATURE: &[u8; 4] = b"8BIM";

/// Alternative signature used by additional layer information blocks.
pub const RESOURCE_SIGNATURE_64: &[u8; 4] = b"8B64";

/// The only file version we read; version 2 is the large document format.
pub const SUPPORTED_VERSION: u16 = 1;

pub const MAX_CHANNELS: u16 = 56;

/// Maximum width and height of a version 1 document, in pixels.
pub const MAX_DOCUMENT_DIMENSION: u32 = 30_000;

/// Default upper bound for a document buffer.
///
/// This value is in MiB.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = MIB * 300;

/// Additional layer info key carrying the Unicode layer name.
pub const KEY_UNICODE_NAME: &[u8; 4] = b"luni";

/// Additional layer info keys carrying the group section divider.
pub const KEY_SECTION_DIVIDER: &[u8; 4] = b"lsct";
pub const KEY_NESTED_SECTION_DIVIDER: &[u8; 4] = b"lsdk";

/// Name photoshop gives to the hidden record closing a group.
pub const SECTION_END_NAME: &str = "</Layer group>";

/// Blend mode written for every layer, we never interpret it.
pub const NORMAL_BLEND_MODE: &[u8; 4] = b"norm";

/// Channel id of the transparency mask.
pub const ALPHA_CHANNEL_ID: i16 = -1;

/// The size of 1MiB in bytes
const MIB: usize = 1_048_576;
