//! GitHub Actions workflow commands and step outputs.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::info;

/// Destination of step outputs.
pub trait OutputSink: Send + Sync {
    fn set_output(&self, name: &str, value: &str) -> io::Result<()>;
}

/// Appends `name=value` lines to the file named by `GITHUB_OUTPUT`.
///
/// Without a file (local runs) outputs are only logged.
#[derive(Debug, Clone, Default)]
pub struct GithubOutput {
    path: Option<PathBuf>,
}

impl GithubOutput {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl OutputSink for GithubOutput {
    fn set_output(&self, name: &str, value: &str) -> io::Result<()> {
        let Some(path) = &self.path else {
            info!(name, value, "output");
            return Ok(());
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{name}={value}")
    }
}

/// Collapsible section in the job log, closed on drop.
#[must_use]
pub struct LogGroup;

impl LogGroup {
    pub fn open(title: &str) -> Self {
        println!("::group::{title}");
        Self
    }
}

impl Drop for LogGroup {
    fn drop(&mut self) {
        println!("::endgroup::");
    }
}

/// `::error::` workflow command; shows `message` as an annotation on the run.
pub fn error_annotation(message: &str) -> String {
    let escaped = message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A");
    format!("::error::{escaped}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_outputs_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output");
        std::fs::write(&path, "existing=1\n").unwrap();

        let sink = GithubOutput::new(Some(path.clone()));
        sink.set_output("label", "abc12").unwrap();
        sink.set_output("instance-id", "fhm123").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "existing=1\nlabel=abc12\ninstance-id=fhm123\n"
        );
    }

    #[test]
    fn creates_missing_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh");

        GithubOutput::new(Some(path.clone()))
            .set_output("label", "x")
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "label=x\n");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = GithubOutput::new(Some(dir.path().join("nope/output")));
        assert!(sink.set_output("label", "x").is_err());
    }

    #[test]
    fn without_file_outputs_are_only_logged() {
        assert!(GithubOutput::default().set_output("label", "x").is_ok());
    }

    #[test]
    fn annotation_escapes_newlines_and_percent() {
        assert_eq!(
            error_annotation("100% broken\nsecond line\r"),
            "::error::100%25 broken%0Asecond line%0D"
        );
    }
}
