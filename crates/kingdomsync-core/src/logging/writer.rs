//! Append-only JSONL file per session label.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use super::entry::JsonLogEntry;

/// Writer that appends log entries to `logs/raw/<date>_<session>.jsonl`
pub struct SessionLogWriter {
    session: String,
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl SessionLogWriter {
    /// Open (or create) today's file for `session` under `logs_dir/raw`.
    pub fn new(logs_dir: impl AsRef<Path>, session: impl Into<String>) -> std::io::Result<Self> {
        let session = session.into();
        let raw_dir = logs_dir.as_ref().join("raw");
        fs::create_dir_all(&raw_dir)?;

        let date = chrono::Local::now().format("%Y-%m-%d");
        let path = raw_dir.join(format!("{}_{}.jsonl", date, session));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            session,
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line and flush.
    pub fn write(&self, entry: &JsonLogEntry) -> std::io::Result<()> {
        let json = entry
            .to_json_line()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", json)?;
        writer.flush()
    }

    pub fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().flush()
    }
}

impl Drop for SessionLogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Read every entry under `logs_dir/raw`, oldest first.
///
/// Lines that fail to parse are skipped.
pub fn read_all_entries(logs_dir: impl AsRef<Path>) -> std::io::Result<Vec<JsonLogEntry>> {
    let raw_dir = logs_dir.as_ref().join("raw");
    if !raw_dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(&raw_dir)? {
        let path = dir_entry?.path();
        if path.extension().map(|e| e != "jsonl").unwrap_or(true) {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match JsonLogEntry::from_json_line(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable log line"),
            }
        }
    }

    entries.sort_by(|a, b| a.ts.cmp(&b.ts));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writer_creates_raw_dir() {
        let temp = TempDir::new().unwrap();
        let logs_dir = temp.path().join("logs");

        let writer = SessionLogWriter::new(&logs_dir, "default").unwrap();

        assert!(logs_dir.join("raw").exists());
        assert!(writer.path().exists());
        assert!(writer.path().to_string_lossy().ends_with("_default.jsonl"));
        assert_eq!(writer.session(), "default");
    }

    #[test]
    fn test_read_all_entries_merges_sessions() {
        let temp = TempDir::new().unwrap();
        let logs_dir = temp.path().join("logs");

        let first = SessionLogWriter::new(&logs_dir, "main").unwrap();
        let second = SessionLogWriter::new(&logs_dir, "alt").unwrap();
        first
            .write(&JsonLogEntry::new("info", "main", "sync", "Initial load complete"))
            .unwrap();
        second
            .write(&JsonLogEntry::new("info", "alt", "sync", "Initial load complete"))
            .unwrap();
        drop(first);
        drop(second);

        std::fs::write(logs_dir.join("raw").join("notes.txt"), "ignored").unwrap();

        let entries = read_all_entries(&logs_dir).unwrap();
        assert_eq!(entries.len(), 2);
        let sessions: Vec<_> = entries.iter().map(|e| e.session.as_str()).collect();
        assert!(sessions.contains(&"main"));
        assert!(sessions.contains(&"alt"));
    }

    #[test]
    fn test_read_skips_garbage_lines() {
        let temp = TempDir::new().unwrap();
        let raw = temp.path().join("raw");
        std::fs::create_dir_all(&raw).unwrap();
        let good = JsonLogEntry::new("info", "x", "sync", "ok").to_json_line().unwrap();
        std::fs::write(raw.join("2026-01-01_x.jsonl"), format!("{good}\nnot json\n\n")).unwrap();

        let entries = read_all_entries(temp.path()).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_missing_dir_reads_empty() {
        let temp = TempDir::new().unwrap();
        assert!(read_all_entries(temp.path().join("nope")).unwrap().is_empty());
    }
}
