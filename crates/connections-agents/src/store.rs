//! JSONL result records: one [`GameRecord`] per line.
//!
//! Records are appended as games finish, so an interrupted run keeps every
//! game completed so far.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::runner::GameRecord;

pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    /// Open (or prepare to create) a results file, creating parent
    /// directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, String> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create results dir: {e}"))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    pub fn append(&self, record: &GameRecord) -> Result<(), String> {
        let line = serde_json::to_string(record)
            .map_err(|e| format!("Failed to serialize record: {e}"))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| format!("Failed to open {}: {e}", self.path.display()))?;
        writeln!(file, "{line}")
            .map_err(|e| format!("Failed to write {}: {e}", self.path.display()))?;
        debug!("Appended result for {} to {}", record.game, self.path.display());
        Ok(())
    }

    /// Read every record. A missing file has no records; unreadable lines are
    /// skipped with a warning.
    pub fn load(&self) -> Result<Vec<GameRecord>, String> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(format!("Failed to open {}: {e}", self.path.display())),
        };

        let mut records = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| format!("Failed to read {}: {e}", self.path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping line {} of {}: {e}", n + 1, self.path.display()),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::runner::GameEnd;
    use chrono::Utc;

    fn record(game: &str) -> GameRecord {
        let mut metrics = Metrics::new(4);
        metrics.add_solve(1);
        GameRecord {
            timestamp: Utc::now(),
            run_id: "run-1".into(),
            game: game.into(),
            solver: "consensus".into(),
            model: "m".into(),
            end: GameEnd::StrikesExhausted,
            strikes: 4,
            solve_rate: metrics.solve_rate(),
            final_points: metrics.final_points(),
            metrics,
        }
    }

    #[test]
    fn append_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path().join("nested/results.jsonl")).unwrap();
        store.append(&record("#1")).unwrap();
        store.append(&record("#2")).unwrap();

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].game, "#2");
        assert_eq!(loaded[0].metrics.solve_order, vec![1]);
        assert_eq!(loaded[0].end, GameEnd::StrikesExhausted);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path().join("none.jsonl")).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::open(dir.path().join("r.jsonl")).unwrap();
        store.append(&record("#1")).unwrap();
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(store.path())
            .unwrap();
        writeln!(file, "{{truncated").unwrap();
        writeln!(file).unwrap();

        assert_eq!(store.load().unwrap().len(), 1);
    }
}
