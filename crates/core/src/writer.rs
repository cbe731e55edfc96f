//! Persists generated artifacts as plain text files.
//!
//! Each save sanitizes the logical name into a filesystem-safe token,
//! optionally unwraps a fenced markdown code block, and overwrites the
//! target file. Concurrent writers to the same name are a race this module
//! does not address.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use crate::agent::FullSuite;

/// A saved full-suite's file locations.
#[derive(Debug, Clone)]
pub struct SuitePaths {
    pub scenarios: PathBuf,
    pub tests: PathBuf,
    pub review: PathBuf,
}

/// One entry of [`OutputWriter::list_outputs`].
#[derive(Debug, Clone)]
pub struct OutputEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

pub struct OutputWriter {
    output_dir: PathBuf,
}

impl OutputWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("failed to create output directory {output_dir:?}"))?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Gherkin scenarios, saved as `<name>.feature`.
    pub fn save_scenarios(&self, content: &str, name: &str) -> Result<PathBuf> {
        let filename = format!("{}.feature", sanitize_filename(name));
        let content = extract_code_block(content, "gherkin");
        self.write(&filename, &content)
    }

    /// Playwright tests, saved as `<name>.spec.ts`.
    pub fn save_playwright_tests(&self, content: &str, name: &str) -> Result<PathBuf> {
        let filename = format!("{}.spec.ts", sanitize_filename(name));
        let content = extract_code_block(content, "typescript");
        self.write(&filename, &content)
    }

    /// Code review, saved as `<name>_review.md` with a generated header.
    pub fn save_review(&self, content: &str, name: &str) -> Result<PathBuf> {
        let filename = format!("{}_review.md", sanitize_filename(name));
        let body = format!("# Code Review: {name}\n\n{content}");
        self.write(&filename, &body)
    }

    pub fn save_full_suite(&self, suite: &FullSuite, name: &str) -> Result<SuitePaths> {
        Ok(SuitePaths {
            scenarios: self.save_scenarios(&suite.scenarios, name)?,
            tests: self.save_playwright_tests(&suite.playwright_tests, name)?,
            review: self.save_review(&suite.review, name)?,
        })
    }

    /// All files in the output directory, newest first.
    pub fn list_outputs(&self) -> Result<Vec<OutputEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.output_dir)
            .with_context(|| format!("failed to read output directory {:?}", self.output_dir))?
        {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            entries.push(OutputEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        entries.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(entries)
    }

    pub fn read_file(&self, filename: &str) -> Result<Option<String>> {
        let path = self.output_dir.join(filename);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(
            fs::read_to_string(&path).with_context(|| format!("failed to read {path:?}"))?,
        ))
    }

    fn write(&self, filename: &str, content: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(filename);
        fs::write(&path, content).with_context(|| format!("failed to write {path:?}"))?;
        tracing::info!("saved output to {}", path.display());
        Ok(path)
    }
}

/// Strips special characters, collapses whitespace to `_`, lowercases and
/// truncates to 50 characters.
pub fn sanitize_filename(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    let collapsed = Regex::new(r"\s+")
        .expect("static pattern")
        .replace_all(stripped.trim(), "_")
        .to_lowercase();
    collapsed.chars().take(50).collect()
}

/// Unwraps a fenced markdown block: the `language`-tagged block first, then
/// the first unlabeled block, else the trimmed input.
pub fn extract_code_block(content: &str, language: &str) -> String {
    let patterns = [
        format!(r"```{}\n(.*?)```", regex::escape(language)),
        "```\\n(.*?)```".to_string(),
    ];

    for pattern in &patterns {
        let re = RegexBuilder::new(pattern)
            .dot_matches_new_line(true)
            .case_insensitive(true)
            .build()
            .expect("static pattern");
        if let Some(caps) = re.captures(content) {
            return caps[1].trim().to_string();
        }
    }

    content.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> (tempfile::TempDir, OutputWriter) {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path()).unwrap();
        (dir, writer)
    }

    #[test]
    fn sanitize_strips_and_lowercases() {
        assert_eq!(sanitize_filename("User Login!"), "user_login");
        assert_eq!(sanitize_filename("  spaced   out  "), "spaced_out");
        assert_eq!(sanitize_filename("path-safe_name"), "path-safe_name");
    }

    #[test]
    fn sanitize_truncates_to_fifty_chars() {
        let long = "a".repeat(80);
        assert_eq!(sanitize_filename(&long).len(), 50);
    }

    #[test]
    fn extract_prefers_labeled_block() {
        let content = "intro\n```gherkin\nFeature: X\n```\n```\nother\n```";
        assert_eq!(extract_code_block(content, "gherkin"), "Feature: X");
    }

    #[test]
    fn extract_falls_back_to_unlabeled_block() {
        let content = "notes\n```\nFeature: Y\n```\ntrailer";
        assert_eq!(extract_code_block(content, "gherkin"), "Feature: Y");
    }

    #[test]
    fn extract_falls_back_to_raw_text() {
        assert_eq!(extract_code_block("  plain text  ", "typescript"), "plain text");
    }

    #[test]
    fn scenario_round_trip_yields_inner_block_text() {
        let (_dir, writer) = writer();
        let content = "Here you go:\n```gherkin\nFeature: Login\n  Scenario: ok\n```\n";
        let path = writer.save_scenarios(content, "User Login").unwrap();
        assert!(path.to_string_lossy().ends_with("user_login.feature"));

        let back = writer.read_file("user_login.feature").unwrap().unwrap();
        assert_eq!(back, "Feature: Login\n  Scenario: ok");
    }

    #[test]
    fn save_overwrites_existing_file() {
        let (_dir, writer) = writer();
        writer.save_scenarios("first", "suite").unwrap();
        writer.save_scenarios("second", "suite").unwrap();
        assert_eq!(writer.read_file("suite.feature").unwrap().unwrap(), "second");
    }

    #[test]
    fn review_gets_a_header() {
        let (_dir, writer) = writer();
        writer.save_review("Looks fine.", "login tests").unwrap();
        let back = writer.read_file("login_tests_review.md").unwrap().unwrap();
        assert!(back.starts_with("# Code Review: login tests"));
        assert!(back.ends_with("Looks fine."));
    }

    #[test]
    fn full_suite_writes_three_files() {
        let (_dir, writer) = writer();
        let suite = FullSuite {
            scenarios: "Feature: A".to_string(),
            playwright_tests: "test('a')".to_string(),
            review: "ok".to_string(),
        };
        let paths = writer.save_full_suite(&suite, "checkout").unwrap();
        assert!(paths.scenarios.exists());
        assert!(paths.tests.exists());
        assert!(paths.review.exists());
    }

    #[test]
    fn list_outputs_is_newest_first() {
        let (_dir, writer) = writer();
        writer.save_scenarios("one", "first").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        writer.save_scenarios("two", "second").unwrap();

        let entries = writer.list_outputs().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "second.feature");
    }

    #[test]
    fn read_missing_file_is_none() {
        let (_dir, writer) = writer();
        assert!(writer.read_file("nope.feature").unwrap().is_none());
    }
}
