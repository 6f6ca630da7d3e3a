//! Streaming file upload and download pipelines.
//!
//! `filedrop` parses `multipart/form-data` request bodies incrementally,
//! writes the file part to disk through an abort-safe [`FileStore`], and
//! serves stored files back as chunked streams with optional gzip
//! compression. Memory stays bounded end to end: the parser holds no more
//! than one source chunk plus a boundary-sized tail, and downloads never
//! buffer whole files.
//!
//! The crate is transport-agnostic. It consumes any `Stream` of byte
//! chunks (or any tokio `AsyncRead`) and hands back streams, so it slots
//! behind whichever HTTP server the application runs; `demos/` wires it to
//! hyper.
//!
//! # Uploading
//!
//! ```
//! use bytes::Bytes;
//! use filedrop::FileStore;
//! use futures_util::stream::once;
//! use std::convert::Infallible;
//!
//! # async fn run() -> filedrop::Result<()> {
//! let dir = tempfile::tempdir().unwrap();
//! let store = FileStore::open(dir.path()).await?;
//!
//! let body = "--X\r\nContent-Disposition: form-data; name=\"file\"; filename=\"hello.txt\"\r\n\r\nHello!\r\n--X--\r\n";
//! let body = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(body)) });
//!
//! let stored = filedrop::upload(&store, "multipart/form-data; boundary=X", None, body, ()).await?;
//! assert_eq!(stored.file_name, "hello.txt");
//! assert_eq!(stored.size, 6);
//! # Ok(())
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(run()).unwrap();
//! ```
//!
//! # Downloading
//!
//! ```no_run
//! use filedrop::{download, ContentEncoding, FileStore};
//! use futures_util::stream::TryStreamExt;
//!
//! # async fn run() -> filedrop::Result<()> {
//! let store = FileStore::open("uploads").await?;
//!
//! let encoding = ContentEncoding::negotiate(Some("gzip, deflate"));
//! let reply = download(&store, "hello.txt", encoding).await?;
//!
//! let mut stream = reply.into_stream();
//! while let Some(chunk) = stream.try_next().await? {
//!     // write the chunk to the response body
//! # drop(chunk);
//! }
//! # Ok(())
//! # }
//! ```

pub use download::{download, ContentEncoding, Download};
pub use error::Error;
pub use limits::Limits;
pub use multipart::Multipart;
pub use part::FilePart;
pub use progress::{ProgressObserver, ProgressStream};
pub use response::{download_path, format_size, ErrorBody, FileListing, ListEntry, UploadReceipt};
pub use store::{FileSink, FileStore, StoredFile};
pub use upload::{upload, upload_with_limits};

mod boundary;
mod buffer;
mod constants;
mod content_disposition;
mod download;
mod error;
mod helpers;
mod limits;
mod multipart;
mod part;
mod progress;
mod response;
mod state;
mod store;
mod upload;

use bytes::Bytes;
use futures_util::stream::Stream;
use std::pin::Pin;

/// A Result type often returned from methods that can have `filedrop`
/// errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed stream of byte chunks, the form bodies take inside the pipelines.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Parses the `Content-Type` header to extract the boundary value.
///
/// # Examples
///
/// ```
/// assert!(filedrop::parse_boundary("multipart/form-data; boundary=ABCDEFG").is_ok());
/// assert!(filedrop::parse_boundary("text/plain").is_err());
/// ```
pub fn parse_boundary<T: AsRef<str>>(content_type: T) -> Result<String> {
    let m = content_type
        .as_ref()
        .parse::<mime::Mime>()
        .map_err(Error::DecodeContentType)?;

    if !(m.type_() == mime::MULTIPART_FORM_DATA.type_() && m.subtype() == mime::MULTIPART_FORM_DATA.subtype()) {
        return Err(Error::NoMultipart);
    }

    m.get_param(mime::BOUNDARY)
        .map(|name| name.as_str().to_owned())
        .ok_or(Error::MissingBoundary)
}
