use crate::limits::Limits;
use crate::multipart::Multipart;
use crate::progress::{ProgressObserver, ProgressStream};
use crate::store::{FileSink, FileStore, StoredFile};
use bytes::Bytes;
use futures_util::stream::{Stream, TryStreamExt};

/// Streams a `multipart/form-data` request body into the store.
///
/// The order of operations keeps failures cheap and partial files
/// impossible: the boundary is taken from `content_type` before any body
/// byte is touched, the part headers must produce a filename before a sink
/// is created, and the single consumer loop writes each payload chunk as it
/// arrives, so the sink paces the source. On any error the sink is aborted
/// and the temp file removed; the error itself is surfaced untouched.
///
/// `observer` sees cumulative body bytes against `content_length`; pass
/// `()` to skip progress tracking.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use filedrop::FileStore;
/// use futures_util::stream::once;
/// use std::convert::Infallible;
///
/// # async fn run() -> filedrop::Result<()> {
/// let dir = tempfile::tempdir().unwrap();
/// let store = FileStore::open(dir.path()).await?;
///
/// let body = "--X\r\nContent-Disposition: form-data; name=\"file\"; filename=\"hello.txt\"\r\n\r\nHello!\r\n--X--\r\n";
/// let body = once(async move { Result::<Bytes, Infallible>::Ok(Bytes::from(body)) });
///
/// let stored = filedrop::upload(&store, "multipart/form-data; boundary=X", None, body, ()).await?;
/// assert_eq!(stored.file_name, "hello.txt");
/// assert_eq!(stored.size, 6);
/// # Ok(())
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(run()).unwrap();
/// ```
pub async fn upload<S, O, E, P>(
    store: &FileStore,
    content_type: &str,
    content_length: Option<u64>,
    body: S,
    observer: P,
) -> crate::Result<StoredFile>
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    P: ProgressObserver + Unpin + 'static,
{
    upload_with_limits(store, content_type, content_length, body, observer, Limits::default()).await
}

/// [`upload`] with explicit parser [`Limits`].
pub async fn upload_with_limits<S, O, E, P>(
    store: &FileStore,
    content_type: &str,
    content_length: Option<u64>,
    body: S,
    observer: P,
    limits: Limits,
) -> crate::Result<StoredFile>
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    P: ProgressObserver + Unpin + 'static,
{
    let boundary = crate::parse_boundary(content_type)?;

    let body = Box::pin(
        body.map_ok(Into::<Bytes>::into)
            .map_err(|err| -> Box<dyn std::error::Error + Send + Sync> { err.into() }),
    );
    let body = ProgressStream::new(body, content_length, observer);

    let mut part = Multipart::with_limits(body, boundary, limits).file().await?;
    let mut sink = store.create(part.file_name()).await?;

    loop {
        match part.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(err) = sink.write(chunk).await {
                    abort_sink(sink).await;
                    return Err(err);
                }
            }
            Ok(None) => break,
            Err(err) => {
                abort_sink(sink).await;
                return Err(err);
            }
        }
    }

    // Consume the epilogue so progress accounting reaches the advertised
    // Content-Length before the receipt is produced.
    part.drain_source().await;

    sink.finish().await
}

/// Abort must never mask the error that got us here; a failing cleanup is
/// only logged.
async fn abort_sink(sink: FileSink) {
    let temp = sink.file_name().to_owned();

    if let Err(err) = sink.abort().await {
        log::warn!("failed to abort upload sink for {:?}: {}", temp, err);
    }
}
