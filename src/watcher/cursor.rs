//! Incremental line reader that tracks a byte offset into one file.
//!
//! Reads only complete lines appended since the last read. A trailing
//! partial line stays unread until its terminator arrives.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};

use super::error::TailError;

/// Byte offset into a tailed file plus the path it belongs to.
#[derive(Debug, Clone)]
pub struct ReadCursor {
    path: PathBuf,
    offset: u64,
}

impl ReadCursor {
    /// Create a cursor positioned at the current end of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be inspected or is not a regular file.
    pub async fn at_end(path: PathBuf) -> Result<Self, TailError> {
        let offset = end_of_file(&path).await?;
        Ok(Self { path, offset })
    }

    /// Create a cursor at a specific offset.
    #[must_use]
    pub fn with_offset(path: PathBuf, offset: u64) -> Self {
        Self { path, offset }
    }

    /// Get the current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the path being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every complete line appended since the last read.
    ///
    /// Each entry is either a decoded line (terminator stripped) or an
    /// [`TailError::InvalidUtf8`] for a line that could not be decoded. The
    /// offset advances past both.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened (deleted, permission denied)
    /// - The path is no longer a regular file
    /// - The file is shorter than the current offset
    /// - I/O errors occur during reading
    pub async fn read_new_lines(&mut self) -> Result<Vec<Result<String, TailError>>, TailError> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| TailError::from_io(&self.path, e))?;

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(TailError::NotAFile(self.path.clone()));
        }

        let file_len = metadata.len();
        if file_len < self.offset {
            return Err(TailError::Truncated {
                path: self.path.clone(),
                offset: self.offset,
                len: file_len,
            });
        }
        if file_len == self.offset {
            return Ok(Vec::new());
        }

        let mut file = file;
        file.seek(std::io::SeekFrom::Start(self.offset)).await?;

        let mut reader = BufReader::new(file);
        let mut lines = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let bytes_read = reader.read_until(b'\n', &mut buf).await?;

            if bytes_read == 0 || buf.last() != Some(&b'\n') {
                // EOF, possibly with a partial line left for the next read
                break;
            }

            let line_offset = self.offset;
            self.offset += bytes_read as u64;

            lines.push(decode_line(&mut buf).ok_or_else(|| TailError::InvalidUtf8 {
                path: self.path.clone(),
                offset: line_offset,
            }));
        }

        Ok(lines)
    }
}

/// Length of the regular file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be inspected or is not a regular file.
pub async fn end_of_file(path: &Path) -> Result<u64, TailError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| TailError::from_io(path, e))?;
    if !metadata.is_file() {
        return Err(TailError::NotAFile(path.to_path_buf()));
    }
    Ok(metadata.len())
}

fn decode_line(buf: &mut Vec<u8>) -> Option<String> {
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(std::mem::take(buf)).ok()
}
