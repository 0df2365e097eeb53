//! Durable report files
//!
//! Append-only files under the data directory record every confirmed-valid
//! key, every rate-limited (unconfirmed) key, and the per-key delivery
//! outcome of each sink flush. File names carry the UTC date so operators
//! can rotate by deleting old days.

use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ReportWriter {
    data_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Verify the data directory is usable. Fatal at startup if not.
    pub fn check(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.data_dir.join("keys"))?;
        std::fs::create_dir_all(self.data_dir.join("logs"))?;
        Ok(())
    }

    fn dated(&self, subdir: &str, stem: &str) -> PathBuf {
        let date = Utc::now().format("%Y%m%d");
        self.data_dir.join(subdir).join(format!("{stem}_{date}.txt"))
    }

    fn append_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Record confirmed-valid keys with their discovery context
    pub fn save_valid_keys(
        &self,
        repo_name: &str,
        file_path: &str,
        file_url: &str,
        keys: &[String],
    ) -> std::io::Result<()> {
        let lines: Vec<String> = keys
            .iter()
            .map(|key| format!("{key} | {repo_name} | {file_path} | {file_url}"))
            .collect();
        Self::append_lines(&self.dated("keys", "keys_valid"), &lines)
    }

    /// Record rate-limited keys separately; their validity is unconfirmed
    /// and they are never forwarded downstream.
    pub fn save_rate_limited_keys(
        &self,
        repo_name: &str,
        file_path: &str,
        file_url: &str,
        keys: &[String],
    ) -> std::io::Result<()> {
        let lines: Vec<String> = keys
            .iter()
            .map(|key| format!("{key} | {repo_name} | {file_path} | {file_url}"))
            .collect();
        Self::append_lines(&self.dated("keys", "keys_rate_limited"), &lines)
    }

    /// Record one delivery outcome per key for a sink flush
    pub fn save_send_results(
        &self,
        sink: &str,
        results: &[(String, String)],
    ) -> std::io::Result<()> {
        let timestamp = Utc::now().format("%H:%M:%S");
        let lines: Vec<String> = results
            .iter()
            .map(|(key, outcome)| format!("{timestamp} {sink} {key} {outcome}"))
            .collect();
        Self::append_lines(&self.dated("logs", "send_results"), &lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("data"));
        writer.check().unwrap();
        assert!(dir.path().join("data/keys").is_dir());
        assert!(dir.path().join("data/logs").is_dir());
    }

    #[test]
    fn test_valid_keys_appended_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        writer
            .save_valid_keys(
                "owner/repo",
                "src/config.py",
                "https://example.com/f",
                &["xai-abc".to_string(), "xai-def".to_string()],
            )
            .unwrap();

        let path = writer.dated("keys", "keys_valid");
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("xai-abc | owner/repo | src/config.py"));
    }

    #[test]
    fn test_send_results_one_line_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path());
        writer
            .save_send_results(
                "merge-list",
                &[
                    ("xai-abc".to_string(), "ok".to_string()),
                    ("xai-def".to_string(), "update_failed".to_string()),
                ],
            )
            .unwrap();

        let contents = std::fs::read_to_string(writer.dated("logs", "send_results")).unwrap();
        assert!(contents.contains("merge-list xai-abc ok"));
        assert!(contents.contains("merge-list xai-def update_failed"));
    }
}
