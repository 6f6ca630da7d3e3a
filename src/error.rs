use std::fmt::{self, Debug, Display, Formatter};

use derive_more::Display;
use http::StatusCode;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A set of errors that can occur while parsing a multipart upload, moving
/// bytes through a pipeline, or talking to the file store.
#[derive(Display)]
#[non_exhaustive]
pub enum Error {
    /// The `Content-Type` header is not `multipart/form-data`.
    #[display(fmt = "Content-Type is not multipart/form-data")]
    NoMultipart,

    /// No boundary parameter found in the `Content-Type` header.
    #[display(fmt = "multipart boundary not found in Content-Type")]
    MissingBoundary,

    /// Failed to convert the `Content-Type` to a [`mime::Mime`] type.
    #[display(fmt = "Failed to convert Content-Type to `mime::Mime` type: {}", _0)]
    DecodeContentType(mime::FromStrError),

    /// The part headers carried no `filename="..."` attribute.
    #[display(fmt = "no filename found in part headers")]
    MissingFilename,

    /// The header block is malformed: no terminating blank line within the
    /// scan cap, or no opening boundary line at all.
    #[display(fmt = "malformed part headers: {}", reason)]
    MalformedHeaders { reason: &'static str },

    /// Failed to read headers.
    #[display(fmt = "failed to read headers: {}", _0)]
    ReadHeaderFailed(httparse::Error),

    /// Failed to decode a raw header name to a
    /// [`HeaderName`](http::header::HeaderName).
    #[display(fmt = "failed to decode raw header name: {:?} {}", name, cause)]
    DecodeHeaderName { name: String, cause: BoxError },

    /// Failed to decode a raw header value to a
    /// [`HeaderValue`](http::header::HeaderValue).
    #[display(fmt = "failed to decode raw header value: {}", cause)]
    DecodeHeaderValue { value: Vec<u8>, cause: BoxError },

    /// The request body ended before the closing boundary arrived.
    #[display(fmt = "source closed before the closing boundary")]
    SourceClosed,

    /// Reading from the source stream failed (e.g. the client dropped the
    /// connection mid-upload).
    #[display(fmt = "stream read failed: {}", _0)]
    StreamReadFailed(BoxError),

    /// The file payload exceeded the configured size limit.
    #[display(fmt = "payload exceeded the maximum size limit: {} bytes", limit)]
    PayloadTooLarge { limit: u64 },

    /// Writing payload bytes to the sink failed.
    #[display(fmt = "sink write failed: {}", _0)]
    SinkWrite(std::io::Error),

    /// The filename was rejected by the store's naming policy.
    #[display(fmt = "invalid filename: {:?}", file_name)]
    InvalidFilename { file_name: String },

    /// No stored file under that name.
    #[display(fmt = "file not found: {:?}", file_name)]
    NotFound { file_name: String },

    /// Any other store I/O failure (open, stat, list, delete).
    #[display(fmt = "I/O error: {}", _0)]
    Io(std::io::Error),
}

impl Error {
    /// The HTTP status a router should answer with for this error, keeping
    /// malformed requests (4xx) distinguishable from storage or stream
    /// failures (5xx).
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NoMultipart
            | Error::MissingBoundary
            | Error::DecodeContentType(_)
            | Error::MissingFilename
            | Error::MalformedHeaders { .. }
            | Error::ReadHeaderFailed(_)
            | Error::DecodeHeaderName { .. }
            | Error::DecodeHeaderValue { .. }
            | Error::InvalidFilename { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::SourceClosed | Error::StreamReadFailed(_) | Error::SinkWrite(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string().eq(&other.to_string())
    }
}

impl Eq for Error {}
