//! Append-only per-user entry store with file-based persistence.
//!
//! Each user owns a directory under the data directory holding two TSV logs:
//!
//! ```text
//! <data_dir>/<user_id>/journal.tsv   timestamp, text, voice_file_id
//! <data_dir>/<user_id>/qa.tsv        timestamp, question, answer, voice_file_id
//! ```
//!
//! Logs are hydrated into a bounded [`LogCache`] on first use. Appends write
//! and flush the line before the in-memory sequence is updated, so the cache
//! never holds a record that is not on disk.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::ResolvedConfig;
use crate::domain::{JournalEntry, LogStats, QaEntry, UserId, UserLog};

use super::cache::LogCache;
use super::tsv::{DecodeError, TsvRecord};

pub const JOURNAL_FILE: &str = "journal.tsv";
pub const QA_FILE: &str = "qa.tsv";

/// Errors raised by the entry store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in {} at line {line}: {reason}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        #[source]
        reason: DecodeError,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// File-backed store of journal and QA entries
pub struct EntryStore {
    /// Directory containing one subdirectory per user
    data_dir: PathBuf,

    /// Hydrated logs; the lock also serializes all file access
    cache: Mutex<LogCache>,
}

impl EntryStore {
    /// Create a store rooted at `data_dir` caching at most `max_cached_users`
    pub fn new(data_dir: impl Into<PathBuf>, max_cached_users: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache: Mutex::new(LogCache::new(max_cached_users)),
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.data_dir.clone(), config.storage.max_cached_users)
    }

    /// Directory holding a user's logs
    pub fn user_dir(&self, user: UserId) -> PathBuf {
        self.data_dir.join(user.to_string())
    }

    pub fn journal_path(&self, user: UserId) -> PathBuf {
        self.user_dir(user).join(JOURNAL_FILE)
    }

    pub fn qa_path(&self, user: UserId) -> PathBuf {
        self.user_dir(user).join(QA_FILE)
    }

    /// Load a user's logs into memory unless they are already there
    pub async fn hydrate(&self, user: UserId) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().await;
        self.hydrate_locked(&mut cache, user).await
    }

    /// Append a journal entry to disk and memory
    #[instrument(skip(self, entry), fields(user = %user))]
    pub async fn append_journal(&self, user: UserId, entry: JournalEntry) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().await;
        self.hydrate_locked(&mut cache, user).await?;

        append_record(&self.journal_path(user), &entry).await?;
        debug!(timestamp = entry.timestamp, "Journal entry appended");

        if let Some(log) = cache.get_mut(user) {
            log.journal.push(entry);
        }
        Ok(())
    }

    /// Append a question/answer entry to disk and memory
    #[instrument(skip(self, entry), fields(user = %user))]
    pub async fn append_qa(&self, user: UserId, entry: QaEntry) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().await;
        self.hydrate_locked(&mut cache, user).await?;

        append_record(&self.qa_path(user), &entry).await?;
        debug!(timestamp = entry.timestamp, "QA entry appended");

        if let Some(log) = cache.get_mut(user) {
            log.qa.push(entry);
        }
        Ok(())
    }

    /// Snapshot of a user's journal, in stored order
    pub async fn journal(&self, user: UserId) -> Result<Vec<JournalEntry>, StoreError> {
        Ok(self.log(user).await?.journal)
    }

    /// Snapshot of a user's QA history, in stored order
    pub async fn qa(&self, user: UserId) -> Result<Vec<QaEntry>, StoreError> {
        Ok(self.log(user).await?.qa)
    }

    /// Snapshot of everything stored for a user
    pub async fn log(&self, user: UserId) -> Result<UserLog, StoreError> {
        let mut cache = self.cache.lock().await;
        self.hydrate_locked(&mut cache, user).await?;
        Ok(cache.get_mut(user).cloned().unwrap_or_default())
    }

    pub async fn stats(&self, user: UserId) -> Result<LogStats, StoreError> {
        Ok(self.log(user).await?.stats())
    }

    /// Remove everything stored for a user, on disk and in memory.
    ///
    /// Returns `true` if there was anything on disk to delete.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn delete_user(&self, user: UserId) -> Result<bool, StoreError> {
        let mut cache = self.cache.lock().await;
        cache.remove(user);

        let dir = self.user_dir(user);
        if !dir.exists() {
            return Ok(false);
        }

        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        info!("User data deleted");
        Ok(true)
    }

    /// Number of users currently held in memory
    pub async fn cached_users(&self) -> usize {
        self.cache.lock().await.len()
    }

    async fn hydrate_locked(&self, cache: &mut LogCache, user: UserId) -> Result<(), StoreError> {
        if cache.contains(user) {
            return Ok(());
        }

        let journal = read_records::<JournalEntry>(&self.journal_path(user)).await?;
        let qa = read_records::<QaEntry>(&self.qa_path(user)).await?;
        debug!(
            %user,
            journal = journal.len(),
            qa = qa.len(),
            "Hydrated user log"
        );

        if let Some(evicted) = cache.insert(user, UserLog { journal, qa }) {
            debug!(%evicted, "Evicted user log from cache");
        }
        Ok(())
    }
}

/// Read every record of a log file in order. A missing file is an empty log.
pub async fn read_records<R: TsvRecord>(path: &Path) -> Result<Vec<R>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path).await.map_err(|e| StoreError::io(path, e))?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut records = Vec::new();
    let mut line_no = 0usize;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(StoreError::MalformedRecord {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    reason: DecodeError::InvalidUtf8,
                });
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };
        line_no += 1;

        if line_no == 1 {
            R::check_header(&line).map_err(|reason| StoreError::MalformedRecord {
                path: path.to_path_buf(),
                line: line_no,
                reason,
            })?;
            continue;
        }

        if line.trim().is_empty() {
            continue;
        }

        let record = R::decode_line(&line).map_err(|reason| StoreError::MalformedRecord {
            path: path.to_path_buf(),
            line: line_no,
            reason,
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Append one record, creating the file with its header if needed.
///
/// A failed write is rolled back to the original length so no partial line
/// stays behind.
pub async fn append_record<R: TsvRecord>(path: &Path, record: &R) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;

    let original_len = file
        .metadata()
        .await
        .map_err(|e| StoreError::io(path, e))?
        .len();

    let mut buf = String::new();
    if original_len == 0 {
        buf.push_str(&R::header());
        buf.push('\n');
    } else if !ends_with_newline(&mut file)
        .await
        .map_err(|e| StoreError::io(path, e))?
    {
        // Terminate a last line left without its newline
        buf.push('\n');
    }
    buf.push_str(&record.encode_line());

    if let Err(e) = write_flushed(&mut file, buf.as_bytes()).await {
        if let Err(rollback) = file.set_len(original_len).await {
            warn!(path = %path.display(), error = %rollback, "Failed to roll back partial append");
        }
        return Err(StoreError::io(path, e));
    }

    Ok(())
}

async fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

async fn write_flushed(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store(capacity: usize) -> (EntryStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = EntryStore::new(temp_dir.path(), capacity);
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_hydrate_missing_user_is_empty() {
        let (store, _temp) = create_test_store(8);

        store.hydrate(UserId(1)).await.unwrap();
        assert!(store.log(UserId(1)).await.unwrap().is_empty());
        assert!(!store.user_dir(UserId(1)).exists());
    }

    #[tokio::test]
    async fn test_append_creates_file_with_header() {
        let (store, _temp) = create_test_store(8);

        store
            .append_journal(UserId(5), JournalEntry::new(10, "first"))
            .await
            .unwrap();

        let content = std::fs::read_to_string(store.journal_path(UserId(5))).unwrap();
        assert_eq!(content, "timestamp\ttext\tvoice_file_id\n10\tfirst\t\\N\n");
    }

    #[tokio::test]
    async fn test_empty_existing_file_gets_header() {
        let (store, _temp) = create_test_store(8);
        let path = store.qa_path(UserId(2));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "").unwrap();

        store
            .append_qa(UserId(2), QaEntry::new(1, "why?").with_answer("because"))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("timestamp\tquestion\tanswer\tvoice_file_id\n"));
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_memory_matches_disk_after_appends() {
        let (store, temp) = create_test_store(8);
        let user = UserId(77);

        for i in 0..5 {
            store
                .append_journal(user, JournalEntry::new(i, format!("entry {}", i)))
                .await
                .unwrap();
        }

        let in_memory = store.journal(user).await.unwrap();
        let fresh = EntryStore::new(temp.path(), 8);
        let from_disk = fresh.journal(user).await.unwrap();

        assert_eq!(in_memory, from_disk);
        assert_eq!(from_disk.len(), 5);
    }

    #[tokio::test]
    async fn test_malformed_record_reports_line() {
        let (store, _temp) = create_test_store(8);
        let path = store.journal_path(UserId(3));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "timestamp\ttext\tvoice_file_id\n1\tok\t\\N\nnot-a-number\tbad\t\\N\n",
        )
        .unwrap();

        let err = store.hydrate(UserId(3)).await.unwrap_err();
        match err {
            StoreError::MalformedRecord { line, .. } => assert_eq!(line, 3),
            other => panic!("Expected MalformedRecord, got {:?}", other),
        }

        // Nothing was cached for the user
        assert_eq!(store.cached_users().await, 0);
    }

    #[tokio::test]
    async fn test_wrong_header_is_malformed() {
        let (store, _temp) = create_test_store(8);
        let path = store.qa_path(UserId(4));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "timestamp\ttext\tvoice_file_id\n").unwrap();

        let err = store.hydrate(UserId(4)).await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedRecord { line: 1, .. }));
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let (store, _temp) = create_test_store(8);
        let path = store.journal_path(UserId(6));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "timestamp\ttext\tvoice_file_id\n1\ta\t\\N\n\n2\tb\t\\N\n",
        )
        .unwrap();

        let journal = store.journal(UserId(6)).await.unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[1].text, "b");
    }

    #[tokio::test]
    async fn test_append_after_unterminated_last_line() {
        let (store, temp) = create_test_store(8);
        let path = store.journal_path(UserId(8));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "timestamp\ttext\tvoice_file_id\n1\ta\t\\N").unwrap();

        store
            .append_journal(UserId(8), JournalEntry::new(2, "b"))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "timestamp\ttext\tvoice_file_id\n1\ta\t\\N\n2\tb\t\\N\n"
        );

        let in_memory = store.journal(UserId(8)).await.unwrap();
        let from_disk = EntryStore::new(temp.path(), 8)
            .journal(UserId(8))
            .await
            .unwrap();
        assert_eq!(in_memory, from_disk);
        assert_eq!(
            from_disk,
            vec![JournalEntry::new(1, "a"), JournalEntry::new(2, "b")]
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_malformed() {
        let (store, _temp) = create_test_store(8);
        let path = store.journal_path(UserId(12));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let mut bytes = b"timestamp\ttext\tvoice_file_id\n1\tok\t\\N\n2\t".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b"\t\\N\n");
        std::fs::write(&path, bytes).unwrap();

        let err = store.hydrate(UserId(12)).await.unwrap_err();
        match err {
            StoreError::MalformedRecord { line, reason, .. } => {
                assert_eq!(line, 3);
                assert_eq!(reason, DecodeError::InvalidUtf8);
            }
            other => panic!("Expected MalformedRecord, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_eviction_rehydrates_from_disk() {
        let (store, _temp) = create_test_store(1);

        store
            .append_journal(UserId(1), JournalEntry::new(1, "alpha"))
            .await
            .unwrap();
        store
            .append_journal(UserId(2), JournalEntry::new(2, "beta"))
            .await
            .unwrap();
        assert_eq!(store.cached_users().await, 1);

        let journal = store.journal(UserId(1)).await.unwrap();
        assert_eq!(journal, vec![JournalEntry::new(1, "alpha")]);
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (store, _temp) = create_test_store(8);
        let user = UserId(11);

        store
            .append_journal(user, JournalEntry::new(1, "secret"))
            .await
            .unwrap();
        store
            .append_qa(user, QaEntry::new(2, "what?").with_answer("secret"))
            .await
            .unwrap();

        assert!(store.delete_user(user).await.unwrap());
        assert!(!store.user_dir(user).exists());
        assert!(store.log(user).await.unwrap().is_empty());

        // Nothing left to delete the second time
        assert!(!store.delete_user(user).await.unwrap());
    }
}
