use async_compression::tokio::bufread::GzipDecoder;
use bytes::Bytes;
use filedrop::{
    download, upload, upload_with_limits, ContentEncoding, Error, FileStore, Limits, Multipart,
    UploadReceipt,
};
use futures_util::stream::{self, Stream, TryStreamExt};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;

const CONTENT_TYPE: &str = "multipart/form-data; boundary=X-BOUNDARY";

fn char_stream(data: &str) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let chunks: Vec<Result<Bytes, Infallible>> = data
        .chars()
        .map(|ch| Ok(Bytes::from(ch.to_string())))
        .collect();

    stream::iter(chunks)
}

fn chunk_stream(chunks: Vec<Bytes>) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream::iter(chunks.into_iter().map(Ok))
}

fn body_with(boundary: &str, file_name: &str, payload: &str) -> String {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n{p}\r\n--{b}--\r\n",
        b = boundary,
        f = file_name,
        p = payload
    )
}

fn split_with_seed(data: &[u8], mut seed: u64) -> Vec<Bytes> {
    let mut chunks = Vec::new();
    let mut rest = data;

    while !rest.is_empty() {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;

        let take = ((seed as usize) % 11 + 1).min(rest.len());
        let (head, tail) = rest.split_at(take);
        chunks.push(Bytes::copy_from_slice(head));
        rest = tail;
    }

    chunks
}

async fn read_back(store: &FileStore, name: &str) -> Vec<u8> {
    let (mut file, _) = store.read(name).await.unwrap();
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).await.unwrap();
    contents
}

async fn collect(mut stream: filedrop::ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.try_next().await.unwrap() {
        out.extend_from_slice(&chunk);
    }
    out
}

#[tokio::test]
async fn test_upload_char_by_char() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a-text-file.txt\"\r\nContent-Type: text/plain\r\n\r\nHello world\nHello\r\nWorld\rAgain\r\n--X-BOUNDARY--\r\n";
    let payload = "Hello world\nHello\r\nWorld\rAgain";

    let stored = upload(&store, CONTENT_TYPE, Some(data.len() as u64), char_stream(data), ())
        .await
        .unwrap();

    assert_eq!(stored.file_name, "a-text-file.txt");
    assert_eq!(stored.size, payload.len() as u64);
    assert_eq!(read_back(&store, "a-text-file.txt").await, payload.as_bytes());
}

#[tokio::test]
async fn test_same_result_for_any_chunking() {
    let payload = "The quick\r\nbrown fox\rjumps\nover the lazy dog";
    let data = body_with("X-BOUNDARY", "fox.txt", payload);

    let reference = Multipart::new(
        chunk_stream(vec![Bytes::copy_from_slice(data.as_bytes())]),
        "X-BOUNDARY",
    )
    .file()
    .await
    .unwrap();
    assert_eq!(reference.file_name(), "fox.txt");
    let reference = reference.bytes().await.unwrap();
    assert_eq!(reference, payload.as_bytes());

    let part = Multipart::new(char_stream(&data), "X-BOUNDARY").file().await.unwrap();
    assert_eq!(part.bytes().await.unwrap(), reference);

    for seed in 1..=16u64 {
        let part = Multipart::new(chunk_stream(split_with_seed(data.as_bytes(), seed)), "X-BOUNDARY")
            .file()
            .await
            .unwrap();
        assert_eq!(part.bytes().await.unwrap(), reference, "seed {}", seed);
    }
}

#[tokio::test]
async fn test_retained_tail_stays_bounded() {
    // Payload riddled with delimiter lookalikes, fed in fixed-size chunks.
    let mut payload = Vec::new();
    for i in 0..4096 {
        payload.extend_from_slice(b"chunk ");
        payload.extend_from_slice(i.to_string().as_bytes());
        payload.extend_from_slice(b"\r\n--almost");
    }

    let mut data = Vec::new();
    data.extend_from_slice(
        b"--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"big.bin\"\r\n\r\n",
    );
    data.extend_from_slice(&payload);
    data.extend_from_slice(b"\r\n--X-BOUNDARY--\r\n");

    let chunks: Vec<Bytes> = data.chunks(1517).map(Bytes::copy_from_slice).collect();

    let mut part = Multipart::new(chunk_stream(chunks), "X-BOUNDARY").file().await.unwrap();

    // CRLF + "--" + token, minus the byte that would complete the match.
    let bound = 2 + 2 + "X-BOUNDARY".len() - 1;
    let mut total = 0;
    while let Some(chunk) = part.chunk().await.unwrap() {
        total += chunk.len();
        assert!(
            part.buffered_len() <= bound,
            "buffered {} bytes, bound {}",
            part.buffered_len(),
            bound
        );
    }

    assert_eq!(total, payload.len());
}

#[tokio::test]
async fn test_identity_download_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let payload = "mixed payload \u{0}\u{1}\u{fe}\u{ff} with binary bytes ".repeat(2000);
    let data = body_with("X-BOUNDARY", "blob.bin", &payload);

    upload(&store, CONTENT_TYPE, Some(data.len() as u64), char_stream(&data), ())
        .await
        .unwrap();

    let reply = download(&store, "blob.bin", ContentEncoding::Identity).await.unwrap();
    assert_eq!(reply.file_name(), "blob.bin");
    assert_eq!(reply.encoding(), ContentEncoding::Identity);
    assert_eq!(reply.size(), payload.len() as u64);
    assert_eq!(reply.content_length(), Some(payload.len() as u64));

    let bytes = collect(reply.into_stream()).await;
    assert_eq!(bytes, payload.as_bytes());
}

#[tokio::test]
async fn test_gzip_download_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let payload = "2026-08-23T00:00:00Z GET /download/report.pdf 200\n".repeat(5000);
    let data = body_with("X-BOUNDARY", "access.log", &payload);

    upload(
        &store,
        CONTENT_TYPE,
        Some(data.len() as u64),
        chunk_stream(vec![Bytes::from(data.into_bytes())]),
        (),
    )
    .await
    .unwrap();

    let reply = download(&store, "access.log", ContentEncoding::Gzip).await.unwrap();
    assert_eq!(reply.encoding(), ContentEncoding::Gzip);
    assert_eq!(reply.size(), payload.len() as u64);
    assert_eq!(reply.content_length(), None);

    let compressed = collect(reply.into_stream()).await;
    assert!(compressed.len() < payload.len());

    let mut decoder = GzipDecoder::new(&compressed[..]);
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded).await.unwrap();
    assert_eq!(decoded, payload.as_bytes());
}

#[tokio::test]
async fn test_truncated_body_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    // The closing delimiter never arrives.
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cut.bin\"\r\n\r\nsome bytes that never end";

    let err = upload(&store, CONTENT_TYPE, None, char_stream(data), ())
        .await
        .err()
        .unwrap();
    assert_eq!(err, Error::SourceClosed);

    assert!(store.list().await.unwrap().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_progress_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let data = body_with("X-BOUNDARY", "tracked.bin", &"data blocks ".repeat(400));
    let total = data.len() as u64;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer = move |transferred: u64, total: Option<u64>, percent: f64| {
        sink.lock().unwrap().push((transferred, total, percent));
    };

    upload(
        &store,
        CONTENT_TYPE,
        Some(total),
        chunk_stream(split_with_seed(data.as_bytes(), 7)),
        observer,
    )
    .await
    .unwrap();

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());

    let mut prev_transferred = 0;
    let mut prev_percent = 0.0;
    for &(transferred, reported_total, percent) in seen.iter() {
        assert_eq!(reported_total, Some(total));
        assert!(transferred >= prev_transferred);
        assert!(percent >= prev_percent);
        assert!(percent <= 100.0);
        prev_transferred = transferred;
        prev_percent = percent;
    }

    assert_eq!(prev_transferred, total);
    assert_eq!(prev_percent, 100.0);
}

#[tokio::test]
async fn test_dashed_boundary_upload() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    // boundary=----X, so the body lines carry ------X.
    let data = "------X\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\r\nhello world\r\n------X--\r\n";

    let stored = upload(
        &store,
        "multipart/form-data; boundary=----X",
        Some(data.len() as u64),
        char_stream(data),
        (),
    )
    .await
    .unwrap();

    assert_eq!(stored.file_name, "a.txt");
    assert_eq!(stored.size, 11);
    assert_eq!(read_back(&store, "a.txt").await, b"hello world");

    let receipt = serde_json::to_value(UploadReceipt::new(&stored)).unwrap();
    assert_eq!(receipt["message"], "File uploaded successfully");
    assert_eq!(receipt["path"], "/download/a.txt");
}

#[tokio::test]
async fn test_missing_boundary_rejected_before_the_body_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let polled = Arc::new(AtomicBool::new(false));
    let marker = Arc::clone(&polled);
    let body = stream::poll_fn(move |_| {
        marker.store(true, Ordering::SeqCst);
        std::task::Poll::Ready(None::<Result<Bytes, Infallible>>)
    });

    let err = upload(&store, "multipart/form-data", None, body, ())
        .await
        .err()
        .unwrap();
    assert_eq!(err, Error::MissingBoundary);
    assert!(!polled.load(Ordering::SeqCst));

    let err = upload(&store, "text/plain", None, char_stream("irrelevant"), ())
        .await
        .err()
        .unwrap();
    assert_eq!(err, Error::NoMultipart);
}

#[tokio::test]
async fn test_unknown_download_has_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let err = download(&store, "nope.txt", ContentEncoding::Identity)
        .await
        .err()
        .unwrap();
    assert_eq!(
        err,
        Error::NotFound {
            file_name: "nope.txt".to_owned()
        }
    );
    assert_eq!(err.status(), http::StatusCode::NOT_FOUND);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_header_block_cap() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let data = format!(
        "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\nX-Junk: {}\r\n\r\npayload\r\n--X-BOUNDARY--\r\n",
        "x".repeat(512)
    );

    let err = upload_with_limits(
        &store,
        CONTENT_TYPE,
        None,
        char_stream(&data),
        (),
        Limits::new().max_header_block(256),
    )
    .await
    .err()
    .unwrap();

    assert!(matches!(err, Error::MalformedHeaders { .. }), "{:?}", err);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_filename_stores_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\njust a text field\r\n--X-BOUNDARY--\r\n";

    let err = upload(&store, CONTENT_TYPE, None, char_stream(data), ())
        .await
        .err()
        .unwrap();
    assert_eq!(err, Error::MissingFilename);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_payload_limit_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let data = body_with("X-BOUNDARY", "big.bin", &"y".repeat(64));

    let err = upload_with_limits(
        &store,
        CONTENT_TYPE,
        None,
        char_stream(&data),
        (),
        Limits::new().max_payload(16),
    )
    .await
    .err()
    .unwrap();

    assert_eq!(err, Error::PayloadTooLarge { limit: 16 });
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_extra_parts_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"first.txt\"\r\n\r\nfirst part\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file2\"; filename=\"second.txt\"\r\n\r\nsecond part\r\n--X-BOUNDARY--\r\n";

    let stored = upload(&store, CONTENT_TYPE, Some(data.len() as u64), char_stream(data), ())
        .await
        .unwrap();

    assert_eq!(stored.file_name, "first.txt");
    assert_eq!(read_back(&store, "first.txt").await, b"first part");
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_preamble_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();

    let data = "this preamble should be ignored\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"real.txt\"\r\n\r\npayload\r\n--X-BOUNDARY--\r\n";
    let stored = upload(&store, CONTENT_TYPE, None, char_stream(data), ()).await.unwrap();
    assert_eq!(stored.file_name, "real.txt");
    assert_eq!(read_back(&store, "real.txt").await, b"payload");

    // Preamble containing its own blank lines.
    let data = "junk\r\n\r\nmore junk\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"later.txt\"\r\n\r\nstill fine\r\n--X-BOUNDARY--\r\n";
    let stored = upload(&store, CONTENT_TYPE, None, char_stream(data), ()).await.unwrap();
    assert_eq!(stored.file_name, "later.txt");
    assert_eq!(read_back(&store, "later.txt").await, b"still fine");
}
