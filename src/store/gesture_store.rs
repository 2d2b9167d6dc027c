use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::frame::{complete_len, decode_frames, encode_frame};
use crate::core::{BucketKey, GestureRecord, Hand};
use crate::error::{CollectorError, Result};

/// Append-only dataset of gesture records, one bucket file per
/// `(gesture_type, target_gesture, hand, candidate)`.
///
/// Writers to the same bucket are serialized within this process. Other
/// processes writing the same dataset concurrently are not coordinated with.
pub struct GestureStore {
    root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl GestureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bucket_path(&self, key: &BucketKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    fn bucket_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Clones are only handed out under this lock, so a count of one means idle
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Append `record` to the bucket derived from its metadata.
    ///
    /// Returns the bucket path. Existing complete frames are never rewritten;
    /// a torn tail left by an interrupted write is cut off first.
    pub fn append(&self, record: &GestureRecord) -> Result<PathBuf> {
        let path = self.bucket_path(&record.bucket_key());
        let lock = self.bucket_lock(&path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        append_frame(&path, record)?;
        info!("Saved gesture record {} to {}", record.timestamp, path.display());
        Ok(path)
    }

    /// All records of a bucket in append order; a missing bucket is empty
    pub fn read_all(&self, key: &BucketKey) -> Result<Vec<GestureRecord>> {
        let path = self.bucket_path(key);
        let lock = self.bucket_lock(&path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        read_bucket(&path)
    }

    /// Remove the first record with `timestamp` and compact the bucket
    pub fn remove(&self, key: &BucketKey, timestamp: f64) -> Result<GestureRecord> {
        let path = self.bucket_path(key);
        let lock = self.bucket_lock(&path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut records = read_bucket(&path)?;
        let index = position_of(&records, &path, timestamp)?;
        let removed = records.remove(index);
        rewrite_bucket(&path, &records)?;

        info!(
            "Removed record {} from {} ({} remaining)",
            timestamp,
            path.display(),
            records.len()
        );
        Ok(removed)
    }

    /// Move one record to another bucket, relabelling it with the destination key
    pub fn move_record(&self, from: &BucketKey, timestamp: f64, to: &BucketKey) -> Result<GestureRecord> {
        let src = self.bucket_path(from);
        let dst = self.bucket_path(to);

        // Fixed lock order keeps two opposite moves from deadlocking
        let (first, second) = if src <= dst { (&src, &dst) } else { (&dst, &src) };
        let first_lock = self.bucket_lock(first);
        let _first = first_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let second_lock = (first != second).then(|| self.bucket_lock(second));
        let _second = second_lock
            .as_ref()
            .map(|l| l.lock().unwrap_or_else(PoisonError::into_inner));

        let mut records = read_bucket(&src)?;
        let index = position_of(&records, &src, timestamp)?;
        let mut moved = records.remove(index);
        moved.set_metadata(
            to.candidate.clone(),
            to.hand,
            to.gesture_type.clone(),
            to.target_gesture.clone(),
        );

        // Append before compacting so a failure leaves a duplicate, never a loss
        if src == dst {
            records.push(moved.clone());
            rewrite_bucket(&src, &records)?;
        } else {
            append_frame(&dst, &moved)?;
            rewrite_bucket(&src, &records)?;
        }

        info!("Moved record {} from {} to {}", timestamp, src.display(), dst.display());
        Ok(moved)
    }

    /// Keys of every bucket under the dataset root, sorted by path.
    ///
    /// The candidate of each key is the normalized name found on disk.
    pub fn list_buckets(&self) -> Result<Vec<BucketKey>> {
        let mut keys = Vec::new();
        for gesture_type in subdirectories(&self.root)? {
            for target in subdirectories(&self.root.join(&gesture_type))? {
                let target_dir = self.root.join(&gesture_type).join(&target);
                for hand_name in subdirectories(&target_dir)? {
                    let hand = match Hand::from_dir_name(&hand_name) {
                        Some(hand) => hand,
                        None => {
                            debug!("Skipping unrecognized hand directory {:?}", hand_name);
                            continue;
                        }
                    };
                    for entry in fs::read_dir(target_dir.join(&hand_name))? {
                        let entry = entry?;
                        if !entry.file_type()?.is_file() {
                            continue;
                        }
                        let file_name = entry.file_name();
                        let Some(candidate) = file_name
                            .to_str()
                            .and_then(BucketKey::candidate_from_file_name)
                        else {
                            continue;
                        };
                        keys.push(BucketKey::new(&gesture_type, &target, hand, candidate));
                    }
                }
            }
        }
        keys.sort_by_key(|k| k.relative_path());
        Ok(keys)
    }

    /// Every candidate bucket recorded for one gesture
    pub fn read_gesture(
        &self,
        gesture_type: &str,
        target_gesture: &str,
        hand: Hand,
    ) -> Result<Vec<(BucketKey, Vec<GestureRecord>)>> {
        self.list_buckets()?
            .into_iter()
            .filter(|k| k.gesture_type == gesture_type && k.target_gesture == target_gesture && k.hand == hand)
            .map(|k| {
                let records = self.read_all(&k)?;
                Ok((k, records))
            })
            .collect()
    }
}

fn position_of(records: &[GestureRecord], path: &Path, timestamp: f64) -> Result<usize> {
    records
        .iter()
        .position(|r| r.timestamp == timestamp)
        .ok_or_else(|| CollectorError::NotFound {
            bucket: path.to_path_buf(),
            timestamp,
        })
}

fn append_frame(path: &Path, record: &GestureRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let frame = encode_frame(record)?;
    let mut file = OpenOptions::new().create(true).read(true).write(true).open(path)?;

    let mut existing = Vec::new();
    file.read_to_end(&mut existing)?;
    let end = complete_len(&existing);
    if end < existing.len() {
        warn!(
            "Discarding {} bytes of a torn frame at the end of {}",
            existing.len() - end,
            path.display()
        );
        file.set_len(end as u64)?;
    }

    file.seek(SeekFrom::Start(end as u64))?;
    if let Err(e) = file.write_all(&frame).and_then(|_| file.flush()) {
        if let Err(rollback) = file.set_len(end as u64) {
            warn!("Failed to roll back partial append to {}: {}", path.display(), rollback);
        }
        return Err(e.into());
    }
    Ok(())
}

fn read_bucket(path: &Path) -> Result<Vec<GestureRecord>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    decode_frames(&bytes)
}

/// Replace the bucket with `records`: temporary sibling, then rename
fn rewrite_bucket(path: &Path, records: &[GestureRecord]) -> Result<()> {
    if records.is_empty() {
        fs::remove_file(path)?;
        return Ok(());
    }

    let mut bytes = Vec::new();
    for record in records {
        bytes.extend(encode_frame(record)?);
    }

    let temp_path = path.with_extension("frames.tmp");
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
