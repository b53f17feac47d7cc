use bytes::Bytes;
use segmented_aof::{Error, LogOptions, SegmentedLog};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_open_creates_first_segment() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("nested").join("aof");

    let log = SegmentedLog::open(&log_dir, LogOptions::default()).unwrap();
    assert!(log_dir.is_dir());
    assert_eq!(log.active_sequence(), 1);
    assert_eq!(log.oldest_sequence(), 1);
    assert_eq!(log.active_segment_bytes(), 0);
    assert_eq!(log.segments().unwrap(), vec![1]);
    assert!(log_dir.join("segment_1.log").exists());
    log.close().unwrap();
}

#[test]
fn test_open_existing_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().to_str().unwrap();

    let log = SegmentedLog::open(log_dir, LogOptions::default()).unwrap();
    assert_eq!(log.directory(), Path::new(log_dir));
    assert_eq!(log.segment_path(1), Path::new(log_dir).join("segment_1.log"));
}

#[test]
fn test_append_writes_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let log = SegmentedLog::open(temp_dir.path(), LogOptions::default()).unwrap();

    log.append(b"hello ").unwrap();
    log.append(Bytes::from("world")).unwrap();
    assert_eq!(log.active_segment_bytes(), 11);

    let contents = fs::read(log.segment_path(1)).unwrap();
    assert_eq!(contents, b"hello world");
}

#[test]
fn test_append_batch_preserves_order() {
    let temp_dir = TempDir::new().unwrap();
    let log = SegmentedLog::open(temp_dir.path(), LogOptions::default()).unwrap();

    let records = vec![Bytes::from("a1;"), Bytes::from("b2;"), Bytes::from("c3;")];
    log.append_batch(records).unwrap();

    assert_eq!(fs::read(log.segment_path(1)).unwrap(), b"a1;b2;c3;");
    assert_eq!(log.active_segment_bytes(), 9);
}

#[test]
fn test_empty_append_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let options = LogOptions::default().segment_size_limit(10);
    let log = SegmentedLog::open(temp_dir.path(), options).unwrap();

    log.append(b"0123456789").unwrap();
    log.append(b"").unwrap();

    assert_eq!(log.active_sequence(), 1);
    assert_eq!(log.active_segment_bytes(), 10);
    assert_eq!(log.segments().unwrap(), vec![1]);
}

#[test]
fn test_zero_size_limit_rejected_before_touching_disk() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("never_created");

    let options = LogOptions::default().segment_size_limit(0);
    let err = SegmentedLog::open(&log_dir, options).unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(!log_dir.exists());
}

#[test]
fn test_zero_retention_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("never_created");

    let options = LogOptions::default().retained_segment_count(0);
    let err = SegmentedLog::open(&log_dir, options).unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(!log_dir.exists());
}

#[cfg(unix)]
#[test]
fn test_read_only_directory_rejected() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("locked");
    fs::create_dir(&log_dir).unwrap();
    fs::set_permissions(&log_dir, fs::Permissions::from_mode(0o555)).unwrap();

    let result = SegmentedLog::open(&log_dir, LogOptions::default());

    fs::set_permissions(&log_dir, fs::Permissions::from_mode(0o755)).unwrap();
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_sync_and_close() {
    let temp_dir = TempDir::new().unwrap();
    let options = LogOptions::default().sync_on_append(false);
    let log = SegmentedLog::open(temp_dir.path(), options).unwrap();

    log.append(b"buffered").unwrap();
    log.sync().unwrap();
    let path = log.segment_path(1);
    log.close().unwrap();

    assert_eq!(fs::read(path).unwrap(), b"buffered");
}

#[test]
fn test_log_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SegmentedLog>();
}
