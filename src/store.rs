use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Metadata for a file visible in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub file_name: String,
    pub size: u64,
    pub created: OffsetDateTime,
}

/// A flat directory of uploaded files.
///
/// Writes go through [`FileSink`]: data lands in a hidden `.part-*` sibling
/// and is renamed into place only on [`FileSink::finish`], so a visible
/// directory entry always corresponds to a complete payload. Concurrent
/// uploads of the same name each write their own temp file; whichever
/// finishes last owns the final name.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens the store rooted at `root`, creating the directory if needed.
    pub async fn open<P: AsRef<Path>>(root: P) -> crate::Result<FileStore> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(crate::Error::Io)?;

        Ok(FileStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, file_name: &str) -> crate::Result<PathBuf> {
        validate_name(file_name)?;
        Ok(self.root.join(file_name))
    }

    /// Starts writing `file_name`. Nothing is visible under that name until
    /// the returned sink is finished.
    pub async fn create(&self, file_name: &str) -> crate::Result<FileSink> {
        let final_path = self.entry_path(file_name)?;
        let temp_path = self.root.join(format!(".part-{}", Uuid::new_v4()));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await
            .map_err(crate::Error::SinkWrite)?;

        Ok(FileSink {
            file,
            temp_path,
            final_path,
            file_name: file_name.to_owned(),
            written: 0,
            finalized: false,
        })
    }

    /// Opens `file_name` for reading and returns it with its size.
    pub async fn read(&self, file_name: &str) -> crate::Result<(File, u64)> {
        let path = self.entry_path(file_name)?;

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(crate::Error::NotFound {
                    file_name: file_name.to_owned(),
                });
            }
            Err(err) => return Err(crate::Error::Io(err)),
        };

        let metadata = file.metadata().await.map_err(crate::Error::Io)?;

        Ok((file, metadata.len()))
    }

    pub async fn stat(&self, file_name: &str) -> crate::Result<StoredFile> {
        let path = self.entry_path(file_name)?;

        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(crate::Error::NotFound {
                    file_name: file_name.to_owned(),
                });
            }
            Err(err) => return Err(crate::Error::Io(err)),
        };

        Ok(StoredFile {
            file_name: file_name.to_owned(),
            size: metadata.len(),
            created: created_at(&metadata),
        })
    }

    pub async fn delete(&self, file_name: &str) -> crate::Result<()> {
        let path = self.entry_path(file_name)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(crate::Error::NotFound {
                file_name: file_name.to_owned(),
            }),
            Err(err) => Err(crate::Error::Io(err)),
        }
    }

    /// Lists stored files sorted by name. Hidden entries, and with them any
    /// in-flight `.part-*` temp files, never appear.
    pub async fn list(&self) -> crate::Result<Vec<StoredFile>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(crate::Error::Io)?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(crate::Error::Io)? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };

            if name.starts_with('.') {
                continue;
            }

            let metadata = entry.metadata().await.map_err(crate::Error::Io)?;
            if !metadata.is_file() {
                continue;
            }

            files.push(StoredFile {
                file_name: name,
                size: metadata.len(),
                created: created_at(&metadata),
            });
        }

        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        Ok(files)
    }
}

/// In-progress upload target. Call [`finish`](FileSink::finish) to make the
/// file visible or [`abort`](FileSink::abort) to discard it; a sink dropped
/// without either cleans up its temp file.
pub struct FileSink {
    file: File,
    temp_path: PathBuf,
    final_path: PathBuf,
    file_name: String,
    written: u64,
    finalized: bool,
}

impl FileSink {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write(&mut self, chunk: Bytes) -> crate::Result<()> {
        self.file
            .write_all(&chunk)
            .await
            .map_err(crate::Error::SinkWrite)?;
        self.written += chunk.len() as u64;

        Ok(())
    }

    /// Flushes, syncs and atomically renames the temp file into place.
    pub async fn finish(mut self) -> crate::Result<StoredFile> {
        self.file.flush().await.map_err(crate::Error::SinkWrite)?;
        self.file.sync_all().await.map_err(crate::Error::SinkWrite)?;

        fs::rename(&self.temp_path, &self.final_path)
            .await
            .map_err(crate::Error::SinkWrite)?;
        self.finalized = true;

        Ok(StoredFile {
            file_name: self.file_name.clone(),
            size: self.written,
            created: OffsetDateTime::now_utc(),
        })
    }

    /// Discards the sink and removes its temp file.
    pub async fn abort(mut self) -> crate::Result<()> {
        self.finalized = true;

        fs::remove_file(&self.temp_path).await.map_err(crate::Error::Io)
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }

        if let Err(err) = std::fs::remove_file(&self.temp_path) {
            if err.kind() != io::ErrorKind::NotFound {
                log::warn!("failed to remove temp upload {:?}: {}", self.temp_path, err);
            }
        }
    }
}

/// Flat-namespace filename policy: non-empty, nothing hidden, no path
/// separators, no NUL. Rejected names surface as `InvalidFilename` rather
/// than being rewritten.
fn validate_name(file_name: &str) -> crate::Result<()> {
    let invalid = file_name.is_empty()
        || file_name.starts_with('.')
        || file_name.chars().any(|c| matches!(c, '/' | '\\' | '\0'));

    if invalid {
        return Err(crate::Error::InvalidFilename {
            file_name: file_name.to_owned(),
        });
    }

    Ok(())
}

fn created_at(metadata: &std::fs::Metadata) -> OffsetDateTime {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .map(OffsetDateTime::from)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
