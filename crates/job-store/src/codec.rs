// crates/job-store/src/codec.rs
//! The persisted document: one JSON array of job snapshots.

use repo_jobs_types::JobSnapshot;

use crate::error::StoreResult;

pub fn encode(snapshots: &[JobSnapshot]) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(snapshots)?)
}

/// Decode a stored document, keeping every entry that parses.
///
/// A document that is not a JSON array yields an empty table. Entries that
/// fail to parse are skipped with a warning rather than discarding the rest.
pub fn decode(bytes: &[u8], backend: &'static str) -> Vec<JobSnapshot> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }

    let items = match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(serde_json::Value::Array(items)) => items,
        Ok(other) => {
            tracing::warn!(
                backend,
                kind = json_kind(&other),
                "job store document is not an array; starting with an empty table"
            );
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(backend, error = %e, "job store document is not valid JSON; starting with an empty table");
            return Vec::new();
        }
    };

    let total = items.len();
    let snapshots: Vec<JobSnapshot> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<JobSnapshot>(item) {
            Ok(snap) => Some(snap.normalized()),
            Err(e) => {
                tracing::warn!(backend, index, error = %e, "skipping malformed job entry");
                None
            }
        })
        .collect();

    if snapshots.len() < total {
        tracing::warn!(
            backend,
            loaded = snapshots.len(),
            skipped = total - snapshots.len(),
            "job store loaded with skipped entries; they will be dropped permanently on the next save, back up the stored document now to recover them"
        );
    }
    snapshots
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use repo_jobs_types::JobStatus;

    #[test]
    fn test_decode_empty_input() {
        assert!(decode(b"", "test").is_empty());
        assert!(decode(b"  \n", "test").is_empty());
        assert!(decode(b"[]", "test").is_empty());
    }

    #[test]
    fn test_decode_rejects_non_array() {
        assert!(decode(br#"{"id":"x"}"#, "test").is_empty());
        assert!(decode(b"not json", "test").is_empty());
    }

    #[test]
    fn test_decode_skips_only_malformed_entries() {
        let doc = br#"[
            {"id":"a","repo_url":"r1","status":"success","created_at":1.0,"updated_at":2.0},
            {"id":"b","status":"exploded"},
            {"id":"c","repo_url":"r2","status":"running","created_at":5.0}
        ]"#;
        let snaps = decode(doc, "test");
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].id.as_str(), "a");
        assert_eq!(snaps[0].status, JobStatus::Success);
        assert_eq!(snaps[1].id.as_str(), "c");
        assert_eq!(snaps[1].status, JobStatus::Running);
        assert_eq!(snaps[1].updated_at, 5.0);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_skipped_entries_warn_about_loss_on_next_save() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let doc = br#"[{"id":"a","status":"queued"},{"id":"b","status":42}]"#;
        let snaps = tracing::subscriber::with_default(subscriber, || decode(doc, "file"));
        assert_eq!(snaps.len(), 1);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("skipped=1"), "{output}");
        assert!(output.contains("dropped permanently on the next save"), "{output}");
    }

    #[test]
    fn test_clean_document_does_not_warn() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let doc = br#"[{"id":"a","status":"queued"}]"#;
        tracing::subscriber::with_default(subscriber, || decode(doc, "file"));
        assert!(logs.0.lock().unwrap().is_empty());
    }
}
