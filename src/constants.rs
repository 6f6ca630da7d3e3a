pub(crate) const MAX_HEADERS: usize = 32;
pub(crate) const BOUNDARY_EXT: &'static str = "--";
pub(crate) const LF: &'static str = "\n";
pub(crate) const CRLF: &'static str = "\r\n";
pub(crate) const CRLF_CRLF: &'static str = "\r\n\r\n";

/// Header block scan cap. The blank line ending the header block must show
/// up within this many bytes or the upload is rejected as malformed.
pub(crate) const DEFAULT_MAX_HEADER_BLOCK: usize = 16 * 1024;

pub(crate) const DEFAULT_MAX_PAYLOAD: u64 = std::u64::MAX;

/// Chunk size for streaming file reads on the download path (64 KiB).
pub(crate) const STREAM_CHUNK_SIZE: usize = 64 * 1024;
