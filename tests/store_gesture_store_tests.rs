use gesture_collector::core::{BucketKey, GestureRecord, Hand};
use gesture_collector::hal::mock::SimulatedGestureDevice;
use gesture_collector::session::DeviceSession;
use gesture_collector::store::{encode_frame, GestureStore};
use gesture_collector::CollectorError;
use std::fs;
use std::io::Write;
use tempfile::tempdir;

fn record(ts: f64, candidate: &str, gesture: &str) -> GestureRecord {
    let mut r = GestureRecord::with_timestamp(22000, 100, 0.05, ts);
    for i in 0..5u16 {
        r.add_sample(800 - i, 810 - i, 820 - i);
    }
    r.set_metadata(candidate, Hand::Right, "gestures", gesture);
    r
}

fn timestamps(records: &[GestureRecord]) -> Vec<f64> {
    records.iter().map(|r| r.timestamp).collect()
}

#[test]
fn test_append_then_read_preserves_every_field() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    let r = record(1683640123.456789, "Jane Doe", "swipe_left");

    store.append(&r).unwrap();
    let loaded = store.read_all(&r.bucket_key()).unwrap();

    assert_eq!(loaded, vec![r]);
}

#[test]
fn test_append_never_deduplicates() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    let r = record(10.0, "a", "tap");

    store.append(&r).unwrap();
    store.append(&r).unwrap();

    let loaded = store.read_all(&r.bucket_key()).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0], loaded[1]);
}

#[test]
fn test_remove_keeps_others_in_order() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    for ts in [1.0, 2.0, 3.0, 4.0] {
        store.append(&record(ts, "a", "tap")).unwrap();
    }
    let key = record(0.0, "a", "tap").bucket_key();

    let removed = store.remove(&key, 2.0).unwrap();
    assert_eq!(removed.timestamp, 2.0);
    assert_eq!(timestamps(&store.read_all(&key).unwrap()), vec![1.0, 3.0, 4.0]);

    // Appends after a compaction land at the end
    store.append(&record(5.0, "a", "tap")).unwrap();
    assert_eq!(timestamps(&store.read_all(&key).unwrap()), vec![1.0, 3.0, 4.0, 5.0]);
}

#[test]
fn test_remove_duplicate_timestamp_takes_first() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    let mut first = record(7.0, "a", "tap");
    first.resistance = 1;
    let mut second = record(7.0, "a", "tap");
    second.resistance = 2;
    store.append(&first).unwrap();
    store.append(&second).unwrap();

    let removed = store.remove(&first.bucket_key(), 7.0).unwrap();
    assert_eq!(removed.resistance, 1);
    let left = store.read_all(&first.bucket_key()).unwrap();
    assert_eq!(left, vec![second]);
}

#[test]
fn test_remove_missing_timestamp_is_not_found() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    let r = record(1.0, "a", "tap");
    store.append(&r).unwrap();

    let err = store.remove(&r.bucket_key(), 99.0).unwrap_err();
    assert!(matches!(err, CollectorError::NotFound { timestamp, .. } if timestamp == 99.0));
    assert_eq!(store.read_all(&r.bucket_key()).unwrap().len(), 1);

    let empty = BucketKey::new("gestures", "tap", Hand::Left, "nobody");
    assert!(matches!(store.remove(&empty, 1.0), Err(CollectorError::NotFound { .. })));
}

#[test]
fn test_truncated_tail_returns_parsed_records() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    let r = record(1.0, "a", "tap");
    let path = store.append(&r).unwrap();

    let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0x10, 0x00, 0x00]).unwrap();
    drop(file);

    let loaded = store.read_all(&r.bucket_key()).unwrap();
    assert_eq!(loaded, vec![r]);
}

#[test]
fn test_append_after_torn_tail_keeps_bucket_readable() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    let first = record(1.0, "a", "tap");
    let path = store.append(&first).unwrap();
    store.append(&record(2.0, "a", "tap")).unwrap();

    // Interrupted write: the second frame is cut 20 bytes into its body
    let first_len = encode_frame(&first).unwrap().len() as u64;
    let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(first_len + 20).unwrap();
    drop(file);
    assert_eq!(timestamps(&store.read_all(&first.bucket_key()).unwrap()), vec![1.0]);

    store.append(&record(3.0, "a", "tap")).unwrap();
    let key = first.bucket_key();
    assert_eq!(timestamps(&store.read_all(&key).unwrap()), vec![1.0, 3.0]);

    store.remove(&key, 1.0).unwrap();
    assert_eq!(timestamps(&store.read_all(&key).unwrap()), vec![3.0]);
}

#[test]
fn test_unknown_field_is_schema_error() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    let r = record(1.0, "a", "tap");
    let path = store.append(&r).unwrap();

    let mut value = serde_json::to_value(&r).unwrap();
    value["checksum"] = serde_json::json!("deadbeef");
    let body = serde_json::to_vec(&value).unwrap();
    let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&(body.len() as u32).to_le_bytes()).unwrap();
    file.write_all(&body).unwrap();
    drop(file);

    let err = store.read_all(&r.bucket_key()).unwrap_err();
    match err {
        CollectorError::Schema(msg) => assert!(msg.contains("checksum"), "{}", msg),
        other => panic!("expected schema error, got {:?}", other),
    }
}

#[test]
fn test_frames_written_by_codec_are_readable() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    let a = record(1.0, "b", "zoom_in");
    let b = record(2.0, "b", "zoom_in");

    let path = store.bucket_path(&a.bucket_key());
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut bytes = encode_frame(&a).unwrap();
    bytes.extend(encode_frame(&b).unwrap());
    fs::write(&path, bytes).unwrap();

    assert_eq!(store.read_all(&a.bucket_key()).unwrap(), vec![a, b]);
}

#[test]
fn test_move_record_relabels() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    store.append(&record(1.0, "a", "swipe_up")).unwrap();
    store.append(&record(2.0, "a", "swipe_up")).unwrap();
    let from = record(0.0, "a", "swipe_up").bucket_key();
    let to = BucketKey::new("gestures", "swipe_down", Hand::Right, "a");

    let moved = store.move_record(&from, 2.0, &to).unwrap();
    assert_eq!(moved.target_gesture, "swipe_down");

    assert_eq!(timestamps(&store.read_all(&from).unwrap()), vec![1.0]);
    let landed = store.read_all(&to).unwrap();
    assert_eq!(landed.len(), 1);
    assert_eq!(landed[0].timestamp, 2.0);
    assert_eq!(landed[0].bucket_key(), to);
}

#[test]
fn test_read_gesture_collects_candidates() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    store.append(&record(1.0, "A1", "tap")).unwrap();
    store.append(&record(2.0, "A2", "tap")).unwrap();
    store.append(&record(3.0, "A2", "tap")).unwrap();
    store.append(&record(4.0, "A1", "double_tap")).unwrap();

    let buckets = store.read_gesture("gestures", "tap", Hand::Right).unwrap();
    let summary: Vec<(String, usize)> = buckets
        .iter()
        .map(|(k, records)| (k.candidate.clone(), records.len()))
        .collect();
    assert_eq!(summary, vec![("a1".to_string(), 1), ("a2".to_string(), 2)]);

    assert_eq!(store.list_buckets().unwrap().len(), 3);
}

#[tokio::test]
async fn test_simulated_measurement_persists() {
    let dir = tempdir().unwrap();
    let store = GestureStore::new(dir.path());
    let mut session = DeviceSession::new(SimulatedGestureDevice::new());

    let mut recorded = session.measure(1.5, 100, false).await.unwrap();
    recorded.set_metadata("Candidate 7", Hand::Left, "letters", "char_C");
    let path = store.append(&recorded).unwrap();

    assert!(path.ends_with("letters/char_C/left_hand/candidate_candidate_7.frames"));
    let loaded = store.read_all(&recorded.bucket_key()).unwrap();
    assert_eq!(loaded, vec![recorded.clone()]);

    store.remove(&recorded.bucket_key(), recorded.timestamp).unwrap();
    assert!(store.read_all(&recorded.bucket_key()).unwrap().is_empty());
}

#[test]
fn test_concurrent_appends_and_removes_share_bucket() {
    use std::sync::Arc;
    use std::thread;

    let dir = tempdir().unwrap();
    let store = Arc::new(GestureStore::new(dir.path()));
    let key = record(0.0, "shared", "tap").bucket_key();
    for ts in 0..10 {
        store.append(&record(ts as f64, "shared", "tap")).unwrap();
    }

    let mut handles = Vec::new();
    for t in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..10 {
                store.append(&record(1000.0 + (t * 10 + i) as f64, "shared", "tap")).unwrap();
            }
        }));
    }
    let remover = {
        let store = Arc::clone(&store);
        let key = key.clone();
        thread::spawn(move || {
            for ts in 0..10 {
                store.remove(&key, ts as f64).unwrap();
            }
        })
    };
    for h in handles {
        h.join().unwrap();
    }
    remover.join().unwrap();

    let loaded = store.read_all(&key).unwrap();
    assert_eq!(loaded.len(), 40);
    assert!(loaded.iter().all(|r| r.timestamp >= 1000.0));
}
