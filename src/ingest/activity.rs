//! Satellite activity log
//!
//! Recent events stay in a bounded in-memory ring for `EVENTS`; every event
//! is also appended to a JSON-lines file when one is configured.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use super::event::SatelliteEvent;

pub struct ActivityLog {
    entries: Mutex<VecDeque<SatelliteEvent>>,
    capacity: usize,
    file: Option<PathBuf>,
    /// Serializes appends to `file`
    file_lock: Mutex<()>,
}

impl ActivityLog {
    pub fn new(capacity: usize, file: Option<PathBuf>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            file,
            file_lock: Mutex::new(()),
        }
    }

    pub fn record(&self, event: SatelliteEvent) {
        let line = self.file.as_ref().and_then(|_| {
            serde_json::to_string(&event)
                .map_err(|e| tracing::warn!("Could not serialize event: {}", e))
                .ok()
        });

        {
            let mut entries = self.entries.lock();
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(event);
        }

        if let (Some(path), Some(line)) = (&self.file, line) {
            let _guard = self.file_lock.lock();
            let result = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut f| writeln!(f, "{}", line));
            if let Err(e) = result {
                tracing::warn!("Activity log {} not written: {}", path.display(), e);
            }
        }
    }

    /// The `n` most recent events, oldest first
    pub fn recent(&self, n: usize) -> Vec<SatelliteEvent> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> SatelliteEvent {
        SatelliteEvent::parse(&format!(
            r#"{{"device":"rempod","id":"{}","location":"Attic","event":"temp_deviation","strength":0,"battery":50,"timestamp":1}}"#,
            id
        ))
        .unwrap()
    }

    #[test]
    fn test_ring_drops_oldest() {
        let log = ActivityLog::new(3, None);
        for i in 0..5 {
            log.record(event(&format!("pod{}", i)));
        }
        assert_eq!(log.len(), 3);
        let ids: Vec<String> = log.recent(10).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, ["pod2", "pod3", "pod4"]);
        assert_eq!(log.recent(1)[0].id, "pod4");
    }

    #[test]
    fn test_jsonl_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let log = ActivityLog::new(10, Some(path.clone()));
        log.record(event("a"));
        log.record(event("b"));

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["id"], "b");
        assert_eq!(lines[0]["event"], "temp_deviation");
    }
}
