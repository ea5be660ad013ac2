use std::path::{Path, PathBuf};

use fs4::tokio::AsyncFileExt;
use thiserror::Error;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{debug, info};

use super::session::{Session, RECORD_DELIMITER, RECORD_HEADER};

/// Default size threshold in bytes after which the writer moves to the next file.
pub const DEFAULT_ROTATE_SIZE: u64 = 100_000;

#[derive(Debug, Error)]
pub enum WriteError {
    /// Another process holds the record file. The caller is expected to drop the record, this is
    /// best-effort telemetry, not transactional storage.
    #[error("record file is locked by another writer")]
    Contended(#[source] std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Append-only, size-bounded record sink.
///
/// Files are named `<base-name>-<NNN>.csv`. On construction the writer resumes from the highest
/// numbered file already in the directory. Each file gets the header row exactly once, when it is
/// empty at write time. Rotation happens strictly between appends, never in the middle of one.
/// The daemon never merges or deletes record files.
pub struct RotatingRecordWriter {
    record_dir: PathBuf,
    base_name: String,
    rotate_size: u64,
    count: u32,
    file: File,
}

impl RotatingRecordWriter {
    pub async fn open(
        record_dir: PathBuf,
        base_name: &str,
        rotate_size: u64,
    ) -> Result<Self, std::io::Error> {
        fs::create_dir_all(&record_dir).await?;
        let count = highest_sequence(&record_dir, base_name).await?.unwrap_or(1);
        let file = open_record_file(&record_dir.join(record_file_name(base_name, count))).await?;
        let mut writer = Self {
            record_dir,
            base_name: base_name.to_owned(),
            rotate_size,
            count,
            file,
        };
        // A restart against an already-full file moves on before the first append.
        if writer.file.metadata().await?.len() > writer.rotate_size {
            writer.rotate().await?;
        }
        info!("Recording sessions into {:?}", writer.current_path());
        Ok(writer)
    }

    pub fn current_path(&self) -> PathBuf {
        self.record_dir
            .join(record_file_name(&self.base_name, self.count))
    }

    /// Appends one completed session and flushes it to disk. Fails with
    /// [WriteError::Contended] when the sink is locked by another writer, leaving the writer's
    /// state untouched.
    pub async fn append(&mut self, session: &Session) -> Result<(), WriteError> {
        self.file.try_lock_exclusive().map_err(|e| {
            if e.kind() == fs4::lock_contended_error().kind() {
                WriteError::Contended(e)
            } else {
                WriteError::Io(e)
            }
        })?;
        let result = Self::append_locked(&mut self.file, session).await;
        self.file.unlock_async().await?;

        let size = result?;
        if size > self.rotate_size {
            debug!(
                "Record file {:?} reached {size} bytes, rotating",
                self.current_path()
            );
            self.rotate().await?;
        }
        Ok(())
    }

    /// Writes the header if the file is empty, then the record, then flushes. Returns the
    /// resulting file size.
    async fn append_locked(file: &mut File, session: &Session) -> Result<u64, std::io::Error> {
        let size = file.metadata().await?.len();
        let mut buffer = String::new();
        if size == 0 {
            buffer.push_str(&RECORD_HEADER.join(RECORD_DELIMITER));
            buffer.push('\n');
        }
        buffer.push_str(&session.to_record_line());
        buffer.push('\n');

        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        Ok(size + buffer.len() as u64)
    }

    async fn rotate(&mut self) -> Result<(), std::io::Error> {
        self.count += 1;
        self.file = open_record_file(&self.current_path()).await?;
        Ok(())
    }
}

fn record_file_name(base_name: &str, count: u32) -> String {
    format!("{base_name}-{count:03}.csv")
}

/// `<base-name>-<NNN>.csv` -> `NNN`
fn parse_sequence(file_name: &str, base_name: &str) -> Option<u32> {
    file_name
        .strip_prefix(base_name)?
        .strip_prefix('-')?
        .strip_suffix(".csv")?
        .parse()
        .ok()
}

async fn highest_sequence(dir: &Path, base_name: &str) -> Result<Option<u32>, std::io::Error> {
    let mut entries = fs::read_dir(dir).await?;
    let mut highest = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        highest = highest.max(parse_sequence(name, base_name));
    }
    Ok(highest)
}

async fn open_record_file(path: &Path) -> Result<File, std::io::Error> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .read(true)
        .open(path)
        .await
}
