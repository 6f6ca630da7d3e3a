use crate::store::StoredFile;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;

/// Bytes escaped when a filename becomes a URL path segment. Non-ASCII is
/// always percent-encoded on top of this set.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'%')
    .add(b'/')
    .add(b'\\');

/// JSON body returned to the client after a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadReceipt {
    pub message: &'static str,
    pub filename: String,
    pub size: u64,
    pub path: String,
}

impl UploadReceipt {
    pub fn new(stored: &StoredFile) -> UploadReceipt {
        UploadReceipt {
            message: "File uploaded successfully",
            filename: stored.file_name.clone(),
            size: stored.size,
            path: download_path(&stored.file_name),
        }
    }
}

/// One row in the stored-file listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    pub filename: String,
    pub size: u64,
    pub size_formatted: String,
    #[serde(with = "time::serde::rfc3339")]
    pub upload_date: time::OffsetDateTime,
    pub download_url: String,
}

impl From<StoredFile> for ListEntry {
    fn from(stored: StoredFile) -> ListEntry {
        ListEntry {
            size_formatted: format_size(stored.size),
            download_url: download_path(&stored.file_name),
            upload_date: stored.created,
            size: stored.size,
            filename: stored.file_name,
        }
    }
}

/// JSON body for the listing endpoint.
#[derive(Debug, Serialize)]
pub struct FileListing {
    pub files: Vec<ListEntry>,
    pub count: usize,
}

impl FileListing {
    pub fn new(stored: Vec<StoredFile>) -> FileListing {
        let files: Vec<ListEntry> = stored.into_iter().map(ListEntry::from).collect();
        let count = files.len();

        FileListing { files, count }
    }
}

/// JSON error body for the router to return alongside
/// [`Error::status`](crate::Error::status).
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&crate::Error> for ErrorBody {
    fn from(err: &crate::Error) -> ErrorBody {
        ErrorBody {
            error: err.to_string(),
        }
    }
}

/// Percent-encoded download path for a stored file.
pub fn download_path(file_name: &str) -> String {
    format!("/download/{}", utf8_percent_encode(file_name, PATH_SEGMENT))
}

/// Human-readable size: 1024-based units, at most two decimals with
/// trailing zeros trimmed, capped at GB.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_owned();
    }

    let mut exp = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exp < UNITS.len() - 1 {
        scaled /= 1024;
        exp += 1;
    }

    let value = bytes as f64 / 1024f64.powi(exp as i32);

    let formatted = format!("{:.2}", value);
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');

    format!("{} {}", formatted, UNITS[exp])
}
