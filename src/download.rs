use crate::constants;
use crate::store::FileStore;
use crate::ByteStream;
use async_compression::tokio::bufread::GzipEncoder;
use futures_util::stream::TryStreamExt;
use tokio::io::BufReader;
use tokio_util::io::ReaderStream;

/// Response encoding for a download stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
}

impl ContentEncoding {
    /// Picks the response encoding from an `Accept-Encoding` header value.
    /// Gzip wins when the client lists it with a nonzero quality; anything
    /// else, or no header at all, falls back to identity.
    pub fn negotiate(accept_encoding: Option<&str>) -> ContentEncoding {
        let accept = match accept_encoding {
            Some(accept) => accept,
            None => return ContentEncoding::Identity,
        };

        for entry in accept.split(',') {
            let mut parts = entry.split(';');
            let coding = parts.next().unwrap_or("").trim();

            if !coding.eq_ignore_ascii_case("gzip") {
                continue;
            }

            let quality = parts
                .find_map(|param| param.trim().strip_prefix("q="))
                .and_then(|quality| quality.trim().parse::<f32>().ok())
                .unwrap_or(1.0);

            if quality > 0.0 {
                return ContentEncoding::Gzip;
            }
        }

        ContentEncoding::Identity
    }

    /// The token for the `Content-Encoding` response header.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Identity => "identity",
            ContentEncoding::Gzip => "gzip",
        }
    }
}

/// A ready-to-send download: file metadata plus the byte stream in the
/// negotiated encoding. Dropping the stream mid-transfer releases the
/// underlying file handle.
pub struct Download {
    file_name: String,
    size: u64,
    encoding: ContentEncoding,
    stream: ByteStream,
}

impl Download {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Stored (uncompressed) size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn encoding(&self) -> ContentEncoding {
        self.encoding
    }

    /// Value for the `Content-Length` response header: `Some` only for
    /// identity responses, since the compressed size is not known up front.
    pub fn content_length(&self) -> Option<u64> {
        match self.encoding {
            ContentEncoding::Identity => Some(self.size),
            ContentEncoding::Gzip => None,
        }
    }

    /// Value for the `Content-Disposition` response header.
    pub fn disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name.replace('"', "\\\""))
    }

    pub fn into_stream(self) -> ByteStream {
        self.stream
    }
}

/// Opens `file_name` from the store as a streaming download.
///
/// The file is read in 64 KiB chunks; with [`ContentEncoding::Gzip`] the
/// chunks pass through a streaming encoder, so the full file is never held
/// in memory in either mode. A name the store does not know fails with
/// [`Error::NotFound`](crate::Error::NotFound) before any stream exists.
pub async fn download(
    store: &FileStore,
    file_name: &str,
    encoding: ContentEncoding,
) -> crate::Result<Download> {
    let (file, size) = store.read(file_name).await?;

    let stream: ByteStream = match encoding {
        ContentEncoding::Identity => Box::pin(
            ReaderStream::with_capacity(file, constants::STREAM_CHUNK_SIZE).map_err(crate::Error::Io),
        ),
        ContentEncoding::Gzip => {
            let encoder = GzipEncoder::new(BufReader::new(file));
            Box::pin(ReaderStream::with_capacity(encoder, constants::STREAM_CHUNK_SIZE).map_err(crate::Error::Io))
        }
    };

    Ok(Download {
        file_name: file_name.to_owned(),
        size,
        encoding,
        stream,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiate() {
        assert_eq!(ContentEncoding::negotiate(None), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::negotiate(Some("")), ContentEncoding::Identity);
        assert_eq!(ContentEncoding::negotiate(Some("gzip")), ContentEncoding::Gzip);
        assert_eq!(
            ContentEncoding::negotiate(Some("gzip, deflate, br")),
            ContentEncoding::Gzip
        );
        assert_eq!(
            ContentEncoding::negotiate(Some("deflate, gzip;q=0.5")),
            ContentEncoding::Gzip
        );
        assert_eq!(ContentEncoding::negotiate(Some("GZIP")), ContentEncoding::Gzip);
        assert_eq!(
            ContentEncoding::negotiate(Some("deflate, br")),
            ContentEncoding::Identity
        );
        // An explicit q=0 opts out of gzip.
        assert_eq!(
            ContentEncoding::negotiate(Some("gzip;q=0, deflate")),
            ContentEncoding::Identity
        );
        assert_eq!(
            ContentEncoding::negotiate(Some("gzip; q=0.0")),
            ContentEncoding::Identity
        );
    }

    #[test]
    fn test_disposition_quotes_file_name() {
        let download = Download {
            file_name: "weird \"name\".txt".to_owned(),
            size: 1,
            encoding: ContentEncoding::Identity,
            stream: Box::pin(futures_util::stream::empty()),
        };

        assert_eq!(
            download.disposition(),
            "attachment; filename=\"weird \\\"name\\\".txt\""
        );
        assert_eq!(download.content_length(), Some(1));
    }
}
