//! Format constants and decoder limits.

/// Magic bytes at the start of every binary plist.
pub const MAGIC: &[u8; 6] = b"bplist";

/// The only supported format version.
pub const FORMAT_VERSION: &[u8; 2] = b"00";

/// Header length (magic + version).
pub const HEADER_LEN: usize = 8;

/// Trailer length.
pub const TRAILER_LEN: usize = 32;

/// Marker nibble requesting an out-of-line length.
pub const INLINE_LEN_SENTINEL: u8 = 0x0F;

/// Maximum accepted input size in bytes (256 MiB).
pub const MAX_DOCUMENT_SIZE: usize = 256 * 1024 * 1024;

/// Maximum nesting depth when converting a graph to an owned tree.
pub const MAX_TREE_DEPTH: usize = 512;

/// Dictionary key holding a workflow's action array.
pub const ACTIONS_KEY: &str = "WFWorkflowActions";
