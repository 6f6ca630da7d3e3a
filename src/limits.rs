use crate::constants;

/// Caps applied while parsing an upload, to keep pathological input from
/// growing memory or disk use without bound.
///
/// Defaults: a 16 KiB header block and an unlimited payload.
///
/// # Examples
///
/// ```
/// use filedrop::Limits;
///
/// let limits = Limits::new()
///     .max_header_block(4 * 1024)
///     .max_payload(50 * 1024 * 1024);
/// # let _ = limits;
/// ```
#[derive(Debug, Clone)]
pub struct Limits {
    pub(crate) max_header_block: usize,
    pub(crate) max_payload: u64,
}

impl Limits {
    /// Creates the default limits.
    pub fn new() -> Limits {
        Limits::default()
    }

    /// Sets the maximum number of bytes scanned for the header block's
    /// terminating blank line before the upload is rejected as malformed.
    pub fn max_header_block(mut self, limit: usize) -> Limits {
        self.max_header_block = limit;
        self
    }

    /// Sets the maximum number of file payload bytes accepted.
    pub fn max_payload(mut self, limit: u64) -> Limits {
        self.max_payload = limit;
        self
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_header_block: constants::DEFAULT_MAX_HEADER_BLOCK,
            max_payload: constants::DEFAULT_MAX_PAYLOAD,
        }
    }
}
