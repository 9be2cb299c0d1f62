//! # Traffic Recording
//!
//! Optional on-disk capture of request bodies for offline debugging. A
//! disabled recorder does nothing, and write failures are only logged.
//! Writes go through `tokio::fs` so recording never blocks a request task.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct TrafficRecorder {
    dir: Option<PathBuf>,
    seq: AtomicU64,
}

impl TrafficRecorder {
    pub fn new(enabled: bool, dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: enabled.then(|| dir.into()),
            seq: AtomicU64::new(0),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Write `payload` as pretty JSON to `<dir>/<seq>_<label>.json`.
    pub async fn record(&self, payload: &Value, label: &str) -> Option<PathBuf> {
        let dir = self.dir.as_deref()?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("{:06}_{}.json", seq, label));

        match write_pretty(dir, &path, payload).await {
            Ok(()) => {
                debug!(path = %path.display(), label, "Recorded payload");
                Some(path)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to record payload");
                None
            }
        }
    }
}

async fn write_pretty(dir: &Path, path: &Path, payload: &Value) -> std::io::Result<()> {
    let bytes = serde_json::to_vec_pretty(payload).map_err(std::io::Error::other)?;
    fs::create_dir_all(dir).await?;
    fs::write(path, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_disabled_recorder_writes_nothing() {
        let recorder = TrafficRecorder::disabled();
        assert!(!recorder.is_enabled());
        assert_eq!(recorder.record(&json!({"a": 1}), "downstream_request").await, None);
    }

    #[tokio::test]
    async fn test_records_are_numbered_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = TrafficRecorder::new(true, dir.path().join("recordings"));

        let first = recorder.record(&json!({"model": "m1"}), "downstream_request").await.unwrap();
        let second = recorder.record(&json!({"model": "gpt-5"}), "upstream_request").await.unwrap();

        assert!(first.ends_with("000000_downstream_request.json"));
        assert!(second.ends_with("000001_upstream_request.json"));

        let written: Value = serde_json::from_slice(&fs::read(&second).await.unwrap()).unwrap();
        assert_eq!(written, json!({"model": "gpt-5"}));
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_logged_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("recordings");
        fs::write(&blocker, b"not a directory").await.unwrap();

        let recorder = TrafficRecorder::new(true, &blocker);
        assert_eq!(recorder.record(&json!({"model": "m1"}), "downstream_request").await, None);
    }
}
