use crate::boundary::Boundary;
use crate::buffer::StreamBuffer;
use crate::constants;
use crate::content_disposition::ContentDisposition;
use crate::helpers;
use crate::limits::Limits;
use crate::part::FilePart;
use crate::state::{MultipartState, Phase};
use bytes::Bytes;
use futures_util::future;
use futures_util::stream::{Stream, TryStreamExt};
use http::header::HeaderMap;
use memchr::memmem;
use std::task::Poll;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Incremental parser for a `multipart/form-data` body carrying a file.
///
/// The body stream is pulled one chunk at a time and never accumulated:
/// part headers are scanned within a bounded window, and payload bytes flow
/// straight through the [`FilePart`] returned by [`file`](Multipart::file).
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use filedrop::Multipart;
/// use futures_util::stream::once;
/// use std::convert::Infallible;
///
/// # async fn run() -> filedrop::Result<()> {
/// let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"hello.txt\"\r\n\r\nHello world!\r\n--X-BOUNDARY--\r\n";
/// let stream = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(data)) });
///
/// let part = Multipart::new(stream, "X-BOUNDARY").file().await?;
/// assert_eq!(part.file_name(), "hello.txt");
/// assert_eq!(part.text().await?, "Hello world!");
/// # Ok(())
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(run()).unwrap();
/// ```
pub struct Multipart {
    state: MultipartState,
}

impl Multipart {
    /// Constructs a parser from a stream of body chunks and the boundary
    /// token taken from the `Content-Type` header (see
    /// [`parse_boundary`](crate::parse_boundary)).
    pub fn new<S, O, E, B>(stream: S, boundary: B) -> Multipart
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
        B: Into<String>,
    {
        Multipart::with_limits(stream, boundary, Limits::default())
    }

    /// Constructs a parser with explicit [`Limits`].
    pub fn with_limits<S, O, E, B>(stream: S, boundary: B, limits: Limits) -> Multipart
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
        B: Into<String>,
    {
        let stream = stream
            .map_ok(|b| b.into())
            .map_err(|err| crate::Error::StreamReadFailed(err.into()));

        Multipart {
            state: MultipartState {
                buffer: StreamBuffer::new(Box::pin(stream)),
                boundary: Boundary::new(boundary.into()),
                limits,
                phase: Phase::AwaitingHeaders,
                payload_bytes: 0,
            },
        }
    }

    /// Constructs a parser over an [`AsyncRead`] body.
    ///
    /// # Examples
    ///
    /// ```
    /// use filedrop::Multipart;
    ///
    /// # async fn run() -> filedrop::Result<()> {
    /// let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.bin\"\r\n\r\nabcd\r\n--X-BOUNDARY--\r\n";
    /// let mut part = Multipart::with_reader(data.as_bytes(), "X-BOUNDARY").file().await?;
    ///
    /// while let Some(chunk) = part.chunk().await? {
    ///     println!("{} bytes", chunk.len());
    /// }
    /// # Ok(())
    /// # }
    /// # tokio::runtime::Runtime::new().unwrap().block_on(run()).unwrap();
    /// ```
    pub fn with_reader<R, B>(reader: R, boundary: B) -> Multipart
    where
        R: AsyncRead + Send + 'static,
        B: Into<String>,
    {
        Multipart::new(ReaderStream::new(reader), boundary)
    }

    /// Parses the part headers and hands the payload over as a
    /// [`FilePart`].
    ///
    /// Fails with [`Error::MissingFilename`](crate::Error::MissingFilename)
    /// when the part carries no `filename` attribute, so a caller never
    /// starts writing a file it cannot name.
    pub async fn file(mut self) -> crate::Result<FilePart> {
        let headers = self.read_headers().await?;

        let content_disposition = ContentDisposition::parse(&headers);
        let file_name = content_disposition.file_name.ok_or(crate::Error::MissingFilename)?;

        self.state.phase = Phase::StreamingPayload;

        Ok(FilePart::new(
            self.state,
            headers,
            content_disposition.field_name,
            file_name,
        ))
    }

    /// Accumulates input until the header block terminator, discarding any
    /// preamble blocks before the opening boundary line. The scan is capped
    /// by `Limits::max_header_block` across everything discarded.
    async fn read_headers(&mut self) -> crate::Result<HeaderMap> {
        let state = &mut self.state;
        let mut scanned = 0usize;

        future::poll_fn(move |cx| loop {
            if let Some(block) = state.buffer.read_until(constants::CRLF_CRLF.as_bytes()) {
                scanned += block.len();

                if scanned > state.limits.max_header_block {
                    return Poll::Ready(Err(crate::Error::MalformedHeaders {
                        reason: "header block exceeds the scan limit",
                    }));
                }

                match headers_from_block(&block, &state.boundary) {
                    Ok(Some(headers)) => return Poll::Ready(Ok(headers)),
                    Ok(None) => continue,
                    Err(err) => return Poll::Ready(Err(err)),
                }
            }

            if scanned + state.buffer.len() > state.limits.max_header_block {
                return Poll::Ready(Err(crate::Error::MalformedHeaders {
                    reason: "header block terminator not found within the scan limit",
                }));
            }

            if state.buffer.eof {
                return Poll::Ready(Err(crate::Error::SourceClosed));
            }

            match state.buffer.poll_source(cx) {
                Ok(true) => {}
                Ok(false) => return Poll::Pending,
                Err(err) => return Poll::Ready(Err(err)),
            }
        })
        .await
    }
}

/// Parses one CRLF CRLF terminated block: the opening boundary line plus
/// the part headers. `Ok(None)` means the block holds no boundary line and
/// is preamble to discard.
fn headers_from_block(block: &[u8], boundary: &Boundary) -> crate::Result<Option<HeaderMap>> {
    let line = boundary.line();

    let mut line_idx = None;
    for idx in memmem::find_iter(block, line) {
        // The boundary only counts at the start of a line.
        if idx == 0 || block[..idx].ends_with(constants::LF.as_bytes()) {
            line_idx = Some(idx);
            break;
        }
    }

    let idx = match line_idx {
        Some(idx) => idx,
        None => return Ok(None),
    };

    let mut rest = &block[idx + line.len()..];

    if rest.starts_with(constants::BOUNDARY_EXT.as_bytes()) {
        return Err(crate::Error::MalformedHeaders {
            reason: "closing boundary before any file part",
        });
    }

    // Transport padding between the boundary and its CRLF.
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b' ' || byte == b'\t' {
            rest = tail;
        } else {
            break;
        }
    }

    let rest = match rest.strip_prefix(constants::CRLF.as_bytes()) {
        Some(rest) => rest,
        None => {
            return Err(crate::Error::MalformedHeaders {
                reason: "malformed opening boundary line",
            });
        }
    };

    let mut headers = [httparse::EMPTY_HEADER; constants::MAX_HEADERS];

    match httparse::parse_headers(rest, &mut headers) {
        Ok(httparse::Status::Complete((_, raw_headers))) => {
            helpers::convert_raw_headers_to_header_map(raw_headers).map(Some)
        }
        Ok(httparse::Status::Partial) => Err(crate::Error::MalformedHeaders {
            reason: "incomplete header block",
        }),
        Err(err) => Err(crate::Error::ReadHeaderFailed(err)),
    }
}
