use crate::state::{MultipartState, Phase};
use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
use futures_util::future;
use futures_util::stream::{Stream, TryStreamExt};
use http::header::{self, HeaderMap};
use std::borrow::Cow;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The file part of a `multipart/form-data` body, streamed incrementally.
///
/// Produced by [`Multipart::file`](crate::Multipart::file), which has
/// already parsed the part headers; the payload is pulled chunk by chunk
/// through [`chunk`](FilePart::chunk) or the [`Stream`] implementation.
/// Payload bytes are consumed from the internal buffer before the source is
/// polled for more, so no more than one source chunk is ever held alongside
/// the retained boundary tail.
pub struct FilePart {
    state: MultipartState,
    headers: HeaderMap,
    meta: PartMeta,
}

struct PartMeta {
    field_name: Option<String>,
    file_name: String,
    content_type: Option<mime::Mime>,
}

impl FilePart {
    pub(crate) fn new(
        state: MultipartState,
        headers: HeaderMap,
        field_name: Option<String>,
        file_name: String,
    ) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<mime::Mime>().ok());

        FilePart {
            state,
            headers,
            meta: PartMeta {
                field_name,
                file_name,
                content_type,
            },
        }
    }

    /// The filename sent by the client. Always present; a part without one
    /// is rejected before a `FilePart` is constructed.
    pub fn file_name(&self) -> &str {
        &self.meta.file_name
    }

    /// The form field name, when the client sent one.
    pub fn field_name(&self) -> Option<&str> {
        self.meta.field_name.as_deref()
    }

    /// The part's `Content-Type`, when present and parseable.
    pub fn content_type(&self) -> Option<&mime::Mime> {
        self.meta.content_type.as_ref()
    }

    /// All headers of the part.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Yields the next payload chunk, or `None` once the part is complete.
    pub async fn chunk(&mut self) -> crate::Result<Option<Bytes>> {
        self.try_next().await
    }

    /// Collects the whole payload. This buffers the full part in memory;
    /// prefer [`chunk`](FilePart::chunk) for large uploads.
    pub async fn bytes(mut self) -> crate::Result<Bytes> {
        let mut buf = BytesMut::new();

        while let Some(bytes) = self.chunk().await? {
            buf.extend_from_slice(&bytes);
        }

        Ok(buf.freeze())
    }

    /// Collects the payload as UTF-8 text.
    pub async fn text(self) -> crate::Result<String> {
        self.text_with_charset("utf-8").await
    }

    /// Collects the payload as text, decoding with the charset from the
    /// part's `Content-Type` or `default_encoding` when absent.
    pub async fn text_with_charset(self, default_encoding: &str) -> crate::Result<String> {
        let encoding_name = self
            .content_type()
            .and_then(|mime| mime.get_param(mime::CHARSET))
            .map(|charset| charset.as_str())
            .unwrap_or(default_encoding);

        let encoding = Encoding::for_label(encoding_name.as_bytes()).unwrap_or(UTF_8);

        let bytes = self.bytes().await?;

        let (text, _, _) = encoding.decode(&bytes);

        match text {
            Cow::Owned(s) => Ok(s),
            Cow::Borrowed(s) => Ok(String::from(s)),
        }
    }

    /// Pulls the source to EOF, discarding the epilogue after the closing
    /// boundary, so byte accounting up the pipeline (progress observers,
    /// connection reuse) covers the whole body. Transport errors at this
    /// point cannot affect the already-complete payload and are only
    /// logged.
    pub(crate) async fn drain_source(&mut self) {
        let state = &mut self.state;

        let drained = future::poll_fn(move |cx| loop {
            state.buffer.buf.clear();

            if state.buffer.eof {
                return Poll::Ready(Ok(()));
            }

            match state.buffer.poll_source(cx) {
                Ok(true) => {}
                Ok(false) => return Poll::Pending,
                Err(err) => return Poll::Ready(Err(err)),
            }
        })
        .await;

        if let Err(err) = drained {
            log::debug!("source error after the closing boundary: {}", err);
        }
    }

    #[doc(hidden)]
    pub fn buffered_len(&self) -> usize {
        self.state.buffer.len()
    }
}

impl Stream for FilePart {
    type Item = crate::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let state = &mut this.state;

        match state.phase {
            Phase::Done | Phase::Failed => return Poll::Ready(None),
            _ => {}
        }

        loop {
            match state.buffer.read_payload(&state.boundary) {
                Ok(Some((done, bytes))) => {
                    state.payload_bytes += bytes.len() as u64;

                    if state.payload_bytes > state.limits.max_payload {
                        state.phase = Phase::Failed;
                        return Poll::Ready(Some(Err(crate::Error::PayloadTooLarge {
                            limit: state.limits.max_payload,
                        })));
                    }

                    if done {
                        state.phase = Phase::Done;

                        if bytes.is_empty() {
                            return Poll::Ready(None);
                        }
                    }

                    return Poll::Ready(Some(Ok(bytes)));
                }
                Ok(None) => match state.buffer.poll_source(cx) {
                    Ok(true) => continue,
                    Ok(false) => return Poll::Pending,
                    Err(err) => {
                        state.phase = Phase::Failed;
                        return Poll::Ready(Some(Err(err)));
                    }
                },
                Err(err) => {
                    state.phase = Phase::Failed;
                    return Poll::Ready(Some(Err(err)));
                }
            }
        }
    }
}
