//! Test results, summary statistics and the JSON report file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use console::style;
use serde::Serialize;

use crate::process::head_lines;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestResult {
    Pass,
    Fail,
    Skip,
    Timeout,
    Error,
}

impl TestResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestResult::Pass => "PASS",
            TestResult::Fail => "FAIL",
            TestResult::Skip => "SKIP",
            TestResult::Timeout => "TIMEOUT",
            TestResult::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for TestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one connector under one pass.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub server_name: String,
    pub server_key: String,
    pub result: TestResult,
    pub message: String,
    /// Seconds.
    pub duration: f64,
    pub output: String,
    pub error: String,
}

impl TestReport {
    pub fn new(name: &str, key: &str, result: TestResult, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            server_name: name.to_string(),
            server_key: key.to_string(),
            result,
            message: message.into(),
            duration: duration.as_secs_f64(),
            output: String::new(),
            error: String::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>, error: impl Into<String>) -> Self {
        self.output = output.into();
        self.error = error.into();
        self
    }
}

/// Counters over every report of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timeout: usize,
    pub error: usize,
    pub success_rate: f64,
}

impl TestSummary {
    pub fn record(&mut self, result: TestResult) {
        self.total += 1;
        match result {
            TestResult::Pass => self.passed += 1,
            TestResult::Fail => self.failed += 1,
            TestResult::Skip => self.skipped += 1,
            TestResult::Timeout => self.timeout += 1,
            TestResult::Error => self.error += 1,
        }
        self.success_rate = success_rate(self.passed, self.total);
    }

    pub fn from_reports(reports: &[TestReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            summary.record(report.result);
        }
        summary
    }
}

/// `passed / total * 100`, 0 for an empty run.
pub fn success_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to serialize test report: {0}")]
    Serialize(serde_json::Error),
    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
}

#[derive(Serialize)]
struct ReportFile<'a> {
    timestamp: String,
    summary: &'a TestSummary,
    details: &'a [TestReport],
}

pub fn write_report(path: &Path, summary: &TestSummary, details: &[TestReport]) -> Result<(), ReportError> {
    let file = ReportFile {
        timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        summary,
        details,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ReportError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let output = serde_json::to_string_pretty(&file).map_err(ReportError::Serialize)?;
    std::fs::write(path, output).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn print_report(report: &TestReport) {
    let line = format!("Result: {} - {}", report.result, report.message);
    let styled = match report.result {
        TestResult::Pass => style(line).green(),
        TestResult::Fail | TestResult::Error => style(line).red(),
        TestResult::Skip => style(line).yellow(),
        TestResult::Timeout => style(line).magenta(),
    };
    println!("{}", styled);
    println!("{}", style(format!("Duration: {:.2}s", report.duration)).dim());

    let output = head_lines(&report.output, 5);
    if !output.is_empty() {
        println!("{}", style("Output:").dim());
        for line in output {
            println!("{}", style(format!("  {}", line)).dim());
        }
    }
    let error = head_lines(&report.error, 3);
    if !error.is_empty() {
        println!("{}", style("Errors:").red());
        for line in error {
            println!("{}", style(format!("  {}", line)).red());
        }
    }
}

pub fn print_summary(summary: &TestSummary, reports: &[TestReport]) {
    println!();
    println!("{}", style("=".repeat(50)).yellow());
    println!("{}", style("Test summary").yellow().bold());
    println!("{}", style("=".repeat(50)).yellow());
    println!("Total:   {}", summary.total);
    println!("{}", style(format!("Passed:  {}", summary.passed)).green());
    println!("{}", style(format!("Failed:  {}", summary.failed)).red());
    println!("{}", style(format!("Skipped: {}", summary.skipped)).yellow());
    println!("{}", style(format!("Timeout: {}", summary.timeout)).magenta());
    println!("{}", style(format!("Error:   {}", summary.error)).red());
    println!("{}", style(format!("Success rate: {:.1}%", summary.success_rate)).cyan());

    let failing: Vec<_> = reports
        .iter()
        .filter(|r| matches!(r.result, TestResult::Fail | TestResult::Error | TestResult::Timeout))
        .collect();
    if !failing.is_empty() {
        println!();
        println!("{}", style("Failed tests:").red().bold());
        for r in failing {
            println!("{}", style(format!("  - {} ({}): {}", r.server_name, r.result, r.message)).red());
        }
    }
}
