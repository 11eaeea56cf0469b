use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use kchain_ledger::{ChainLog, StoreError, StoreResult, Transaction, TxCheck, TxLookup};
use kchain_types::TxHash;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Header size: 4 bytes length + 4 bytes payload CRC + 4 bytes header CRC.
const HEADER_SIZE: u64 = 12;

/// Largest payload a record may carry.
const MAX_RECORD_SIZE: u32 = 16 * 1024 * 1024;

/// Flush/sync strategy for appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every append.
    #[default]
    EveryWrite,
    /// Hand the write to the OS and let it flush the page cache.
    OsDefault,
}

/// Append-only chain log stored in a single file.
pub struct FileChainLog {
    path: PathBuf,
    file: File,
    sync_mode: SyncMode,
    /// End of the last complete record.
    offset: u64,
    txs: Vec<Transaction>,
    hash_index: HashMap<TxHash, u64>,
    subscriber: Option<UnboundedSender<Transaction>>,
}

impl FileChainLog {
    /// Open (or create) the log at `path` and recover its contents.
    pub fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let recovered = recover(path, file_len)?;
        if recovered.offset < file_len {
            warn!(
                path = %path.display(),
                offset = recovered.offset,
                file_len,
                "truncating torn record at end of chain log"
            );
            file.set_len(recovered.offset)?;
            file.sync_all()?;
        }

        info!(
            path = %path.display(),
            transactions = recovered.txs.len(),
            "chain log opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            sync_mode,
            offset: recovered.offset,
            txs: recovered.txs,
            hash_index: recovered.hash_index,
            subscriber: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.sync_mode
    }

    /// Bytes of committed records in the file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn write_record(&mut self, tx: &Transaction) -> StoreResult<()> {
        let frame = encode_record(tx)?;

        let written = self.file.write_all(&frame).and_then(|()| match self.sync_mode {
            SyncMode::EveryWrite => self.file.sync_data(),
            SyncMode::OsDefault => self.file.flush(),
        });
        if let Err(e) = written {
            // Drop whatever part of the frame reached the file.
            if let Err(rollback) = self.file.set_len(self.offset) {
                warn!(offset = self.offset, error = %rollback, "failed to roll back partial record");
            }
            return Err(e.into());
        }

        self.offset += frame.len() as u64;
        Ok(())
    }
}

impl ChainLog for FileChainLog {
    fn len(&self) -> u64 {
        self.txs.len() as u64
    }

    fn head(&self) -> Option<Transaction> {
        self.txs.last().cloned()
    }

    fn get_by_sequence(&self, seq: u64) -> StoreResult<Transaction> {
        usize::try_from(seq)
            .ok()
            .and_then(|i| self.txs.get(i))
            .cloned()
            .ok_or(StoreError::NotFound(TxLookup::Sequence(seq)))
    }

    fn get_by_hash(&self, hash: &TxHash) -> StoreResult<Transaction> {
        self.hash_index
            .get(hash)
            .and_then(|&seq| self.txs.get(seq as usize))
            .cloned()
            .ok_or(StoreError::NotFound(TxLookup::Hash(*hash)))
    }

    fn append(&mut self, tx: Transaction, check: &TxCheck<'_>) -> StoreResult<Transaction> {
        check(&tx).map_err(StoreError::Rejected)?;
        if self.hash_index.contains_key(&tx.hash) {
            return Err(StoreError::DuplicateTransaction(tx.hash));
        }

        let seq = self.len();
        let committed = tx.with_seq(seq);
        self.write_record(&committed)?;

        self.hash_index.insert(committed.hash, seq);
        self.txs.push(committed.clone());
        debug!(seq, hash = %committed.hash, offset = self.offset, "chain log append");

        let delivered = self
            .subscriber
            .as_ref()
            .map(|sender| sender.send(committed.clone()).is_ok());
        if delivered == Some(false) {
            debug!("commit subscriber dropped");
            self.subscriber = None;
        }

        Ok(committed)
    }

    fn subscribe(&mut self) -> UnboundedReceiver<Transaction> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscriber = Some(sender);
        receiver
    }
}

fn encode_record(tx: &Transaction) -> StoreResult<Vec<u8>> {
    let payload = bincode::serialize(tx).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .ok()
        .filter(|&len| len <= MAX_RECORD_SIZE)
        .ok_or_else(|| StoreError::Serialization(format!("record of {} bytes", payload.len())))?;
    let crc = crc32fast::hash(&payload);

    let mut frame = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    let header_crc = crc32fast::hash(&frame);
    frame.extend_from_slice(&header_crc.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

struct Recovered {
    txs: Vec<Transaction>,
    hash_index: HashMap<TxHash, u64>,
    offset: u64,
}

/// Read every complete record in the file.
///
/// Stops at a torn final record: a header cut short by the end of the file,
/// or a header whose own checksum holds but whose payload runs past the end.
/// Its offset is returned so the caller can truncate it. Every other defect,
/// including a damaged length field anywhere in the file, is an error.
fn recover(path: &Path, file_len: u64) -> StoreResult<Recovered> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut txs = Vec::new();
    let mut hash_index = HashMap::new();
    let mut offset = 0u64;

    while offset < file_len {
        let corrupt = |reason: String| StoreError::Corrupt { offset, reason };

        if file_len - offset < HEADER_SIZE {
            break;
        }
        let mut header = [0u8; HEADER_SIZE as usize];
        reader.read_exact(&mut header)?;
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let header_crc = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

        if crc32fast::hash(&header[..8]) != header_crc {
            return Err(corrupt("header checksum mismatch".into()));
        }
        if length == 0 || length > MAX_RECORD_SIZE {
            return Err(corrupt(format!("invalid record length {length}")));
        }
        if offset + HEADER_SIZE + u64::from(length) > file_len {
            break;
        }

        let mut payload = vec![0u8; length as usize];
        reader.read_exact(&mut payload)?;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            return Err(corrupt(format!(
                "CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"
            )));
        }

        let tx: Transaction =
            bincode::deserialize(&payload).map_err(|e| corrupt(format!("undecodable record: {e}")))?;
        let expected_seq = txs.len() as u64;
        if tx.seq != expected_seq {
            return Err(corrupt(format!("expected seq {expected_seq}, found {}", tx.seq)));
        }
        if hash_index.insert(tx.hash, tx.seq).is_some() {
            return Err(corrupt(format!("duplicate transaction {}", tx.hash)));
        }

        txs.push(tx);
        offset += HEADER_SIZE + u64::from(length);
    }

    debug!(recovered = txs.len(), offset, "chain log recovery complete");
    Ok(Recovered {
        txs,
        hash_index,
        offset,
    })
}
