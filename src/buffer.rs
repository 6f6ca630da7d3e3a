use crate::boundary::{Boundary, BoundaryMatch};
use crate::ByteStream;
use bytes::{Bytes, BytesMut};
use memchr::memmem;
use std::task::{Context, Poll};

pub(crate) struct StreamBuffer {
    pub(crate) eof: bool,
    pub(crate) buf: BytesMut,
    pub(crate) source: ByteStream,
}

impl StreamBuffer {
    pub fn new(source: ByteStream) -> Self {
        StreamBuffer {
            eof: false,
            buf: BytesMut::new(),
            source,
        }
    }

    /// Polls the source for at most one chunk. Callers drain the buffer
    /// before asking for more, so buffered data never exceeds the retained
    /// tail plus a single source chunk.
    ///
    /// Returns `true` when the poll made progress (a chunk arrived or the
    /// source finished), `false` when the source is pending.
    pub fn poll_source(&mut self, cx: &mut Context) -> crate::Result<bool> {
        if self.eof {
            return Ok(false);
        }

        match self.source.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(data))) => {
                self.buf.extend_from_slice(&data);
                Ok(true)
            }
            Poll::Ready(Some(Err(err))) => Err(err),
            Poll::Ready(None) => {
                self.eof = true;
                Ok(true)
            }
            Poll::Pending => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn read_until(&mut self, pattern: &[u8]) -> Option<Bytes> {
        memmem::find(&self.buf, pattern).map(|idx| self.buf.split_to(idx + pattern.len()).freeze())
    }

    /// Reads payload bytes up to the part delimiter.
    ///
    /// `Ok(Some((true, bytes)))`: the delimiter was found; `bytes` is the
    /// final payload slice and the delimiter has been consumed from the
    /// buffer. `Ok(Some((false, bytes)))`: plain payload, more to come.
    /// `Ok(None)`: nothing safe to emit yet. The source ending before the
    /// delimiter completes is an error.
    pub fn read_payload(&mut self, boundary: &Boundary) -> crate::Result<Option<(bool, Bytes)>> {
        match boundary.locate(&self.buf) {
            BoundaryMatch::Found { offset } => {
                let bytes = self.buf.split_to(offset).freeze();
                drop(self.buf.split_to(boundary.delimiter_len()));
                Ok(Some((true, bytes)))
            }
            BoundaryMatch::PartialAtTail { offset } => {
                if self.eof {
                    return Err(crate::Error::SourceClosed);
                }

                if offset == 0 {
                    Ok(None)
                } else {
                    Ok(Some((false, self.buf.split_to(offset).freeze())))
                }
            }
            BoundaryMatch::NotFound => {
                if self.eof {
                    return Err(crate::Error::SourceClosed);
                }

                if self.buf.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some((false, self.read_full_buf())))
                }
            }
        }
    }

    pub fn read_full_buf(&mut self) -> Bytes {
        self.buf.split_to(self.buf.len()).freeze()
    }
}
