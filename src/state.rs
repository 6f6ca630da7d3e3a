use crate::boundary::Boundary;
use crate::buffer::StreamBuffer;
use crate::limits::Limits;

pub(crate) struct MultipartState {
    pub(crate) buffer: StreamBuffer,
    pub(crate) boundary: Boundary,
    pub(crate) limits: Limits,
    pub(crate) phase: Phase,
    pub(crate) payload_bytes: u64,
}

/// Where the parser is in the part lifecycle. `Done` and `Failed` are
/// terminal: nothing further is emitted from either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    AwaitingHeaders,
    StreamingPayload,
    Done,
    Failed,
}
