//! # Account Journal
//!
//! **Crash-safe file-backed account store**
//!
//! Every committed account is appended as one record. On open the file is
//! replayed front to back and the last record per user wins. A record that
//! fails its checksum or is cut short ends the replay; the file is truncated
//! back to the last good record so later appends stay readable.
//!
//! ## Guarantees
//!
//! 1. **Durability**: once `save()` returns, the record is on disk
//! 2. **Atomicity**: a failed append is truncated away and the old account stays visible
//! 3. **Recovery**: torn tails from a crash are dropped on the next open
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "GJNL"]
//! [4 bytes: version]
//!
//! Record format:
//! [8 bytes: sequence number]
//! [4 bytes: payload length]
//! [N bytes: payload (JSON {userId, account})]
//! [4 bytes: CRC32 of above]
//! ```

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::StateStore;
use crate::account::{GachaAccount, UserId};
use crate::error::{GachaError, GachaResult};

/// Magic bytes identifying a journal file.
pub const JOURNAL_MAGIC: &[u8; 4] = b"GJNL";

/// Current journal format version.
pub const JOURNAL_VERSION: u32 = 1;

const HEADER_LEN: u64 = 8;

/// Records larger than this are treated as corruption.
const MAX_PAYLOAD: u32 = 64 * 1024 * 1024;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryRef<'a> {
    user_id: &'a str,
    account: &'a GachaAccount,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entry {
    user_id: UserId,
    account: GachaAccount,
}

/// Append handle plus the byte length of its valid prefix.
struct Appender {
    file: File,
    len: u64,
    next_seq: u64,
}

fn storage(context: &str, e: impl std::fmt::Display) -> GachaError {
    GachaError::Storage(format!("{context}: {e}"))
}

/// Journaled file store.
pub struct JournalStore {
    path: PathBuf,
    appender: Mutex<Appender>,
    accounts: RwLock<HashMap<UserId, GachaAccount>>,
}

impl JournalStore {
    /// Opens or creates a journal, replaying whatever it holds.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the file can't be opened or carries a foreign header.
    pub fn open(path: impl AsRef<Path>) -> GachaResult<Self> {
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| storage("failed to open journal", e))?;

        let existing = file
            .metadata()
            .map_err(|e| storage("failed to stat journal", e))?
            .len();

        if existing == 0 {
            let mut header = Vec::with_capacity(HEADER_LEN as usize);
            header.extend_from_slice(JOURNAL_MAGIC);
            header.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
            file.write_all(&header)
                .map_err(|e| storage("failed to write journal header", e))?;
            file.sync_all()
                .map_err(|e| storage("failed to sync journal header", e))?;
        }

        let replay = Self::replay(&path)?;

        if replay.valid_len < replay.file_len {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = replay.file_len - replay.valid_len,
                "journal tail unreadable, truncating"
            );
            file.set_len(replay.valid_len)
                .map_err(|e| storage("failed to truncate journal", e))?;
            file.sync_all()
                .map_err(|e| storage("failed to sync journal", e))?;
        }

        tracing::info!(
            path = %path.display(),
            records = replay.records,
            accounts = replay.accounts.len(),
            "journal replayed"
        );

        Ok(Self {
            path,
            appender: Mutex::new(Appender {
                file,
                len: replay.valid_len,
                next_seq: replay.next_seq,
            }),
            accounts: RwLock::new(replay.accounts),
        })
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of accounts held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Whether the journal holds no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    /// Rewrites the journal with one record per user.
    ///
    /// The new file is written beside the old one and renamed over it.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on any I/O failure. The old journal is untouched then.
    pub fn compact(&self) -> GachaResult<()> {
        let mut appender = self.appender.lock();
        let accounts = self.accounts.read();

        let mut users: Vec<&UserId> = accounts.keys().collect();
        users.sort();

        let mut buf = Vec::new();
        buf.extend_from_slice(JOURNAL_MAGIC);
        buf.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        let mut seq = 0;
        for user_id in users {
            if let Some(account) = accounts.get(user_id) {
                buf.extend_from_slice(&encode_record(seq, user_id, account)?);
                seq += 1;
            }
        }

        let tmp = self.path.with_extension("compact");
        {
            let mut out = File::create(&tmp).map_err(|e| storage("failed to create compacted journal", e))?;
            out.write_all(&buf)
                .map_err(|e| storage("failed to write compacted journal", e))?;
            out.sync_all()
                .map_err(|e| storage("failed to sync compacted journal", e))?;
        }
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| storage("failed to replace journal", e))?;

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| storage("failed to reopen journal", e))?;

        let before = appender.len;
        *appender = Appender {
            file,
            len: buf.len() as u64,
            next_seq: seq,
        };

        tracing::info!(
            path = %self.path.display(),
            bytes_before = before,
            bytes_after = appender.len,
            "journal compacted"
        );
        Ok(())
    }

    fn append(appender: &mut Appender, record: &[u8]) -> GachaResult<()> {
        let written = appender
            .file
            .write_all(record)
            .and_then(|()| appender.file.sync_data());

        if let Err(e) = written {
            if let Err(trunc) = appender.file.set_len(appender.len) {
                tracing::error!(error = %trunc, "failed to truncate partial journal record");
            }
            return Err(storage("journal append failed", e));
        }

        appender.len += record.len() as u64;
        appender.next_seq += 1;
        Ok(())
    }

    fn replay(path: &Path) -> GachaResult<Replay> {
        let file = File::open(path).map_err(|e| storage("failed to open journal for replay", e))?;
        let file_len = file
            .metadata()
            .map_err(|e| storage("failed to stat journal", e))?
            .len();
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        let mut version = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .and_then(|()| reader.read_exact(&mut version))
            .map_err(|e| storage("failed to read journal header", e))?;
        if &magic != JOURNAL_MAGIC {
            return Err(GachaError::Storage(format!(
                "{} is not an account journal",
                path.display()
            )));
        }
        let version = u32::from_le_bytes(version);
        if version != JOURNAL_VERSION {
            return Err(GachaError::Storage(format!(
                "unsupported journal version: {version}"
            )));
        }

        let mut replay = Replay {
            accounts: HashMap::new(),
            records: 0,
            next_seq: 0,
            valid_len: HEADER_LEN,
            file_len,
        };

        loop {
            match read_record(&mut reader) {
                Ok(Some((seq, size, entry))) => {
                    replay.accounts.insert(entry.user_id, entry.account);
                    replay.records += 1;
                    replay.next_seq = seq + 1;
                    replay.valid_len += size;
                }
                Ok(None) => break,
                Err(reason) => {
                    tracing::warn!(
                        path = %path.display(),
                        offset = replay.valid_len,
                        reason = %reason,
                        "journal replay stopped at bad record"
                    );
                    break;
                }
            }
        }

        Ok(replay)
    }
}

struct Replay {
    accounts: HashMap<UserId, GachaAccount>,
    records: usize,
    next_seq: u64,
    valid_len: u64,
    file_len: u64,
}

fn encode_record(seq: u64, user_id: &str, account: &GachaAccount) -> GachaResult<Vec<u8>> {
    let payload = serde_json::to_vec(&EntryRef { user_id, account })
        .map_err(|e| storage("failed to encode account", e))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_PAYLOAD)
        .ok_or_else(|| GachaError::Storage(format!("account {user_id} too large to journal")))?;

    let mut record = Vec::with_capacity(8 + 4 + payload.len() + 4);
    record.extend_from_slice(&seq.to_le_bytes());
    record.extend_from_slice(&len.to_le_bytes());
    record.extend_from_slice(&payload);
    let crc = crc32fast::hash(&record);
    record.extend_from_slice(&crc.to_le_bytes());
    Ok(record)
}

/// Reads one record. `Ok(None)` is a clean end of file; `Err` is a torn or
/// corrupt record.
fn read_record<R: Read>(reader: &mut R) -> Result<Option<(u64, u64, Entry)>, String> {
    let mut seq_bytes = [0u8; 8];
    match reader.read_exact(&mut seq_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.to_string()),
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).map_err(|e| e.to_string())?;
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_PAYLOAD {
        return Err(format!("payload length {len} out of range"));
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).map_err(|e| e.to_string())?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes).map_err(|e| e.to_string())?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&seq_bytes);
    hasher.update(&len_bytes);
    hasher.update(&payload);
    if hasher.finalize() != u32::from_le_bytes(crc_bytes) {
        return Err("CRC mismatch".to_string());
    }

    let entry: Entry = serde_json::from_slice(&payload).map_err(|e| e.to_string())?;
    let size = 8 + 4 + u64::from(len) + 4;
    Ok(Some((u64::from_le_bytes(seq_bytes), size, entry)))
}

impl StateStore for JournalStore {
    fn load_or_create(
        &self,
        user_id: &str,
        fresh: &dyn Fn() -> GachaAccount,
    ) -> GachaResult<GachaAccount> {
        if let Some(account) = self.accounts.read().get(user_id) {
            return Ok(account.clone());
        }

        let mut appender = self.appender.lock();
        if let Some(account) = self.accounts.read().get(user_id) {
            return Ok(account.clone());
        }

        let account = fresh();
        let record = encode_record(appender.next_seq, user_id, &account)?;
        Self::append(&mut appender, &record)?;
        self.accounts
            .write()
            .insert(user_id.to_string(), account.clone());
        tracing::debug!(user_id, "account created");
        Ok(account)
    }

    fn load(&self, user_id: &str) -> GachaResult<Option<GachaAccount>> {
        Ok(self.accounts.read().get(user_id).cloned())
    }

    fn save(&self, user_id: &str, account: &GachaAccount) -> GachaResult<()> {
        let mut appender = self.appender.lock();
        let record = encode_record(appender.next_seq, user_id, account)?;
        Self::append(&mut appender, &record)?;
        self.accounts
            .write()
            .insert(user_id.to_string(), account.clone());
        Ok(())
    }
}

impl std::fmt::Debug for JournalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalStore")
            .field("path", &self.path)
            .field("accounts", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EconomyConfig;
    use chrono::{TimeZone, Utc};
    use std::fs;

    fn temp_journal_path() -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("test_journal_{id}.gjnl"))
    }

    fn fresh() -> GachaAccount {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        GachaAccount::new(&EconomyConfig::default(), now)
    }

    #[test]
    fn test_journal_create_and_open() {
        let path = temp_journal_path();
        {
            let store = JournalStore::open(&path).unwrap();
            assert!(store.is_empty());
        }
        assert_eq!(fs::metadata(&path).unwrap().len(), HEADER_LEN);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_journal_last_record_wins() {
        let path = temp_journal_path();
        {
            let store = JournalStore::open(&path).unwrap();
            let mut account = store.load_or_create("alice", &fresh).unwrap();
            for tokens in [4, 3, 2] {
                account.tokens = tokens;
                store.save("alice", &account).unwrap();
            }
            store.load_or_create("bob", &fresh).unwrap();
        }
        {
            let store = JournalStore::open(&path).unwrap();
            assert_eq!(store.len(), 2);
            assert_eq!(store.load("alice").unwrap().unwrap().tokens, 2);
            assert_eq!(store.load("bob").unwrap().unwrap(), fresh());
        }
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_journal_torn_tail_ignored() {
        let path = temp_journal_path();
        {
            let store = JournalStore::open(&path).unwrap();
            let mut account = store.load_or_create("alice", &fresh).unwrap();
            account.shards = 77;
            store.save("alice", &account).unwrap();
        }

        let good_len = fs::metadata(&path).unwrap().len();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[9, 0, 0, 0, 0, 0, 0, 0, 200, 0]).unwrap();
        }

        {
            let store = JournalStore::open(&path).unwrap();
            assert_eq!(store.load("alice").unwrap().unwrap().shards, 77);
            assert_eq!(fs::metadata(&path).unwrap().len(), good_len);

            let mut account = store.load("alice").unwrap().unwrap();
            account.shards = 78;
            store.save("alice", &account).unwrap();
        }
        {
            let store = JournalStore::open(&path).unwrap();
            assert_eq!(store.load("alice").unwrap().unwrap().shards, 78);
        }
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_journal_corrupt_record_stops_replay() {
        let path = temp_journal_path();
        {
            let store = JournalStore::open(&path).unwrap();
            let mut account = store.load_or_create("alice", &fresh).unwrap();
            account.tokens = 1;
            store.save("alice", &account).unwrap();
        }

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 6;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        {
            let store = JournalStore::open(&path).unwrap();
            assert_eq!(store.load("alice").unwrap().unwrap().tokens, fresh().tokens);
        }
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_journal_compact() {
        let path = temp_journal_path();
        {
            let store = JournalStore::open(&path).unwrap();
            let mut account = store.load_or_create("alice", &fresh).unwrap();
            for shards in 0..20 {
                account.shards = shards;
                store.save("alice", &account).unwrap();
            }
            let before = fs::metadata(&path).unwrap().len();
            store.compact().unwrap();
            assert!(fs::metadata(&path).unwrap().len() < before);

            account.tokens = 0;
            store.save("alice", &account).unwrap();
        }
        {
            let store = JournalStore::open(&path).unwrap();
            let account = store.load("alice").unwrap().unwrap();
            assert_eq!(account.shards, 19);
            assert_eq!(account.tokens, 0);
        }
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_journal_rejects_foreign_file() {
        let path = temp_journal_path();
        fs::write(&path, b"OWAL\x01\x00\x00\x00").unwrap();
        assert!(matches!(JournalStore::open(&path), Err(GachaError::Storage(_))));
        fs::remove_file(&path).ok();
    }
}
