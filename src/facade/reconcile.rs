//! Merging of incoming records with their stored predecessors.

use crate::models::AnyRecord;

/// The stored predecessor of a write. `record` is `None` when the stored
/// payload could not be decoded; its timestamp still bounds the next write.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub record: Option<AnyRecord>,
    pub modified_at: i64,
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Write timestamp for an item: the clock reading, bumped past the
/// previous write so that `modifiedAt` strictly increases per item.
pub fn server_time(now_ms: i64, previous_modified: Option<i64>) -> i64 {
    match previous_modified {
        Some(previous) if previous >= now_ms => previous + 1,
        _ => now_ms,
    }
}

/// Stamp `record` for a write at `now_ms`, carrying over the creation time
/// of `previous`. Returns the server time used.
pub fn reconcile(record: &mut AnyRecord, now_ms: i64, previous: Option<&StoredRecord>) -> i64 {
    let time = server_time(now_ms, previous.map(|p| p.modified_at));
    record.populate(time, previous.and_then(|p| p.record.as_ref()));
    time
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionKind, RecordOptions};
    use serde_json::json;

    fn app(data: serde_json::Value) -> AnyRecord {
        AnyRecord::from_json(CollectionKind::Apps, data, RecordOptions::default()).unwrap()
    }

    #[test]
    fn test_server_time_is_strictly_increasing() {
        assert_eq!(server_time(100, None), 100);
        assert_eq!(server_time(100, Some(50)), 100);
        assert_eq!(server_time(100, Some(100)), 101);
        assert_eq!(server_time(100, Some(250)), 251);
    }

    #[test]
    fn test_first_write_sets_both_timestamps() {
        let mut record = app(json!({"origin": "https://example.com"}));
        let time = reconcile(&mut record, 1000, None);
        assert_eq!(time, 1000);
        let fields = record.to_json();
        assert_eq!(fields["installedAt"], json!(1000));
        assert_eq!(fields["modifiedAt"], json!(1000));
    }

    #[test]
    fn test_rewrite_keeps_install_time() {
        let mut first = app(json!({"origin": "https://example.com"}));
        reconcile(&mut first, 1000, None);
        let previous = StoredRecord {
            record: Some(first),
            modified_at: 1000,
        };

        // Same millisecond: still strictly later.
        let mut second = app(json!({"origin": "https://example.com"}));
        let time = reconcile(&mut second, 1000, Some(&previous));
        assert_eq!(time, 1001);
        let fields = second.to_json();
        assert_eq!(fields["installedAt"], json!(1000));
        assert_eq!(fields["modifiedAt"], json!(1001));
    }

    #[test]
    fn test_undecodable_predecessor_still_bounds_time() {
        let previous = StoredRecord {
            record: None,
            modified_at: 5000,
        };
        let mut record = app(json!({"origin": "https://example.com"}));
        let time = reconcile(&mut record, 1000, Some(&previous));
        assert_eq!(time, 5001);
        let fields = record.to_json();
        assert_eq!(fields["installedAt"], json!(5001));
        assert_eq!(fields["modifiedAt"], json!(5001));
    }

    #[test]
    fn test_client_modified_at_is_overwritten() {
        let mut record = app(json!({"modifiedAt": 1, "installedAt": 2}));
        reconcile(&mut record, 500, None);
        let fields = record.to_json();
        assert_eq!(fields["modifiedAt"], json!(500));
        assert_eq!(fields["installedAt"], json!(2));
    }
}
