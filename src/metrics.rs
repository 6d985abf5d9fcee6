//! Per-call metrics.
//!
//! Every provider attempt is recorded in a bounded in-memory ring and
//! snapshotted to `ai_performance_data.json` under the data directory when one
//! is configured. Persistence is best-effort: a failed write is logged and
//! ignored, and the file has no schema versioning.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const SNAPSHOT_FILE: &str = "ai_performance_data.json";
const RECORD_CAP: usize = 1000;

/// One provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub provider: String,
    pub model: String,
    pub operation: String,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub response_length: usize,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
}

/// Aggregated per-provider view.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub avg_duration_ms: u64,
}

/// Bounded call-metrics recorder with optional JSON persistence.
pub struct CallTracker {
    records: Mutex<VecDeque<CallRecord>>,
    snapshot_path: Option<PathBuf>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl CallTracker {
    /// In-memory only.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            snapshot_path: None,
        }
    }

    /// Persisting under `data_dir`, loading any previous snapshot.
    pub fn with_data_dir(data_dir: &std::path::Path) -> Self {
        if let Err(err) = std::fs::create_dir_all(data_dir) {
            tracing::warn!(error = %err, dir = %data_dir.display(), "cannot create data dir");
            return Self::new();
        }

        let path = data_dir.join(SNAPSHOT_FILE);
        let records = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<CallRecord>>(&content) {
                Ok(mut loaded) => {
                    if loaded.len() > RECORD_CAP {
                        loaded.drain(..loaded.len() - RECORD_CAP);
                    }
                    loaded.into()
                }
                Err(err) => {
                    tracing::warn!(error = %err, "performance snapshot unreadable, starting fresh");
                    VecDeque::new()
                }
            },
            Err(_) => VecDeque::new(),
        };

        Self {
            records: Mutex::new(records),
            snapshot_path: Some(path),
        }
    }

    pub fn record(
        &self,
        provider: &str,
        model: &str,
        operation: &str,
        duration_ms: u64,
        success: bool,
        error: Option<String>,
        response_length: usize,
    ) {
        let record = CallRecord {
            provider: provider.to_string(),
            model: model.to_string(),
            operation: operation.to_string(),
            duration_ms,
            success,
            error,
            response_length,
            timestamp: unix_now(),
        };

        if let Ok(mut records) = self.records.lock() {
            records.push_back(record);
            if records.len() > RECORD_CAP {
                records.pop_front();
            }
            self.save_locked(&records);
        }
    }

    fn save_locked(&self, records: &VecDeque<CallRecord>) {
        let Some(ref path) = self.snapshot_path else {
            return;
        };
        let snapshot: Vec<&CallRecord> = records.iter().collect();
        match serde_json::to_string_pretty(&snapshot) {
            Ok(content) => {
                if let Err(err) = std::fs::write(path, content) {
                    tracing::warn!(error = %err, "cannot write performance snapshot");
                }
            }
            Err(err) => tracing::warn!(error = %err, "cannot serialize performance snapshot"),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-provider aggregation, sorted by provider name.
    pub fn provider_statistics(&self) -> BTreeMap<String, ProviderStats> {
        let mut stats: BTreeMap<String, ProviderStats> = BTreeMap::new();
        let mut durations: BTreeMap<String, (u64, u64)> = BTreeMap::new();

        if let Ok(records) = self.records.lock() {
            for record in records.iter() {
                let entry = stats.entry(record.provider.clone()).or_default();
                entry.total_requests += 1;
                if record.success {
                    entry.successful_requests += 1;
                } else {
                    entry.failed_requests += 1;
                }
                let (sum, count) = durations.entry(record.provider.clone()).or_default();
                *sum += record.duration_ms;
                *count += 1;
            }
        }

        for (provider, entry) in stats.iter_mut() {
            if entry.total_requests > 0 {
                entry.success_rate = (entry.successful_requests as f64
                    / entry.total_requests as f64)
                    * 100.0;
            }
            if let Some((sum, count)) = durations.get(provider) {
                if *count > 0 {
                    entry.avg_duration_ms = sum / count;
                }
            }
        }

        stats
    }
}

impl Default for CallTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_aggregate() {
        let tracker = CallTracker::new();
        tracker.record("openai", "gpt-4.1", "chat", 1200, true, None, 42);
        tracker.record("openai", "gpt-4.1", "chat", 800, false, Some("timeout".into()), 0);
        tracker.record("gemini", "gemini-1.5-flash", "chat", 600, true, None, 30);

        let stats = tracker.provider_statistics();
        let openai = &stats["openai"];
        assert_eq!(openai.total_requests, 2);
        assert_eq!(openai.successful_requests, 1);
        assert_eq!(openai.failed_requests, 1);
        assert!((openai.success_rate - 50.0).abs() < 0.01);
        assert_eq!(openai.avg_duration_ms, 1000);

        assert_eq!(stats["gemini"].total_requests, 1);
    }

    #[test]
    fn test_ring_is_bounded() {
        let tracker = CallTracker::new();
        for i in 0..(RECORD_CAP + 10) {
            tracker.record("openai", "m", "chat", i as u64, true, None, 0);
        }
        assert_eq!(tracker.len(), RECORD_CAP);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = std::env::temp_dir().join(format!("vasa-metrics-{}", std::process::id()));
        {
            let tracker = CallTracker::with_data_dir(&dir);
            tracker.record("openai", "gpt-4.1", "chat", 100, true, None, 10);
        }
        {
            let tracker = CallTracker::with_data_dir(&dir);
            assert_eq!(tracker.len(), 1);
            assert_eq!(tracker.provider_statistics()["openai"].total_requests, 1);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
