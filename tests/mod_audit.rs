use std::sync::Arc;

use cloudlite::{Callbacks, CloudConfig, Database, RecordingTransport};
use log::{Log, Metadata, Record};
use parking_lot::Mutex;
use serde_json::json;

static AUDIT: Mutex<Vec<String>> = Mutex::new(Vec::new());

struct AuditCapture;

impl Log for AuditCapture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if record.target() == "cloudlite::audit" {
            AUDIT.lock().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

// One test per binary: the logger is process global.
#[tokio::test]
async fn audit_entries_follow_actual_sends() {
    log::set_boxed_logger(Box::new(AuditCapture)).unwrap();
    log::set_max_level(log::LevelFilter::Trace);

    let t = Arc::new(RecordingTransport::replying(json!({"total": 2})));
    let config = CloudConfig { env: Some("audit-env".into()), trace_user: None };
    let db = Database::new(t.clone(), config);

    drop(db.collection("c").count());
    assert!(AUDIT.lock().is_empty());

    let r = db.collection("c").count().with_callbacks(Callbacks::new());
    assert!(r.is_err());
    assert!(AUDIT.lock().is_empty());

    assert!(db.collection("c").limit(0).get().await.is_err());
    assert!(AUDIT.lock().is_empty());
    assert!(t.sent().is_empty());

    let total = db.collection("c").count().await.unwrap().total;
    assert_eq!(total, 2);
    let entries = AUDIT.lock().clone();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("action=database.countDocument env=audit-env request_id="));
    assert_eq!(t.sent().len(), 1);
}
