use crate::constants;
use memchr::memmem;

/// Outcome of scanning buffered payload bytes for the part delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoundaryMatch {
    /// The complete delimiter starts at `offset`. Everything before it is
    /// payload; the delimiter itself is not.
    Found { offset: usize },
    /// No byte of the buffer can belong to a delimiter.
    NotFound,
    /// A proper prefix of the delimiter runs from `offset` to the end of the
    /// buffer. Bytes before `offset` are payload; the rest must be held back
    /// until more input decides the match.
    PartialAtTail { offset: usize },
}

/// The boundary token and the payload delimiter derived from it.
///
/// The delimiter is the CRLF-fused form `\r\n--token`. Searching for the
/// fused form (rather than the bare `--token`) means the CRLF that ends the
/// payload is consumed together with the boundary and never leaks into the
/// emitted bytes, and the held-back tail never exceeds `delimiter_len() - 1`
/// bytes.
pub(crate) struct Boundary {
    delimiter: Vec<u8>,
}

impl Boundary {
    pub fn new<T: AsRef<str>>(token: T) -> Boundary {
        let token = token.as_ref();
        let mut delimiter =
            Vec::with_capacity(constants::CRLF.len() + constants::BOUNDARY_EXT.len() + token.len());
        delimiter.extend_from_slice(constants::CRLF.as_bytes());
        delimiter.extend_from_slice(constants::BOUNDARY_EXT.as_bytes());
        delimiter.extend_from_slice(token.as_bytes());

        Boundary { delimiter }
    }

    /// The boundary as it appears on its own line: `--token`.
    pub fn line(&self) -> &[u8] {
        &self.delimiter[constants::CRLF.len()..]
    }

    pub fn delimiter_len(&self) -> usize {
        self.delimiter.len()
    }

    /// Leftmost-first search: a full match anywhere in `haystack` wins over
    /// any partial match at the tail, and among tail candidates the earliest
    /// one is reported.
    pub fn locate(&self, haystack: &[u8]) -> BoundaryMatch {
        if let Some(offset) = memmem::find(haystack, &self.delimiter) {
            return BoundaryMatch::Found { offset };
        }

        // No full delimiter anywhere. Check whether one could be split
        // across the end of the buffer: the candidate window is the last
        // `delimiter_len() - 1` positions, scanned left to right.
        let window = (self.delimiter.len() - 1).min(haystack.len());
        for offset in (haystack.len() - window)..haystack.len() {
            if self.delimiter.starts_with(&haystack[offset..]) {
                return BoundaryMatch::PartialAtTail { offset };
            }
        }

        BoundaryMatch::NotFound
    }
}
