//! Install MCP connectors from the registry.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use console::style;

use crate::models::ConnectorDescriptor;
use crate::paths::Paths;
use crate::process::{head_lines, CommandRunner};
use crate::registry::{Registry, Selection};
use crate::strategy::{strategy_for, InstallContext, InstallFailure};

/// Default bound on a single package-manager or git invocation.
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct InstallerOptions {
    pub timeout: Duration,
}

impl Default for InstallerOptions {
    fn default() -> Self {
        Self { timeout: INSTALL_TIMEOUT }
    }
}

/// Result of installing one connector.
#[derive(Debug)]
pub struct InstallOutcome {
    pub key: String,
    pub name: String,
    pub success: bool,
    pub failure: Option<InstallFailure>,
    pub log_line: String,
}

/// Accumulated outcomes of one installer run, in attempt order.
#[derive(Debug, Default)]
pub struct InstallRun {
    pub outcomes: Vec<InstallOutcome>,
}

impl InstallRun {
    pub fn record(&mut self, outcome: InstallOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn total_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &InstallOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn timeout_count(&self) -> usize {
        self.failed()
            .filter(|o| o.failure.as_ref().is_some_and(InstallFailure::is_timeout))
            .count()
    }

    /// Keys of connectors that installed successfully.
    pub fn succeeded_keys(&self) -> HashSet<String> {
        self.outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.key.clone())
            .collect()
    }

    /// Write one `✓`/`✗` line per attempt.
    pub fn write_log(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lines: Vec<&str> = self.outcomes.iter().map(|o| o.log_line.as_str()).collect();
        std::fs::write(path, lines.join("\n"))
    }

    pub fn print_summary(&self) {
        println!();
        println!("{}", style("=".repeat(50)).yellow());
        println!("{}", style("Installation summary").yellow().bold());
        println!("{}", style("=".repeat(50)).yellow());
        println!("Total connectors: {}", self.total_count());
        println!("{}", style(format!("Installed:        {}", self.success_count())).green());
        println!(
            "{}",
            style(format!(
                "Failed:           {} ({} timed out)",
                self.total_count() - self.success_count(),
                self.timeout_count()
            ))
            .red()
        );

        let failed: Vec<_> = self.failed().collect();
        if !failed.is_empty() {
            println!();
            println!("{}", style("Failed connectors:").red().bold());
            for o in failed {
                println!("{}", style(format!("  - {}", o.name)).red());
            }
        }
    }
}

/// Runs installation strategies over a registry selection.
pub struct Installer<'a> {
    paths: &'a Paths,
    runner: &'a dyn CommandRunner,
    options: InstallerOptions,
}

impl<'a> Installer<'a> {
    pub fn new(paths: &'a Paths, runner: &'a dyn CommandRunner, options: InstallerOptions) -> Self {
        Self { paths, runner, options }
    }

    /// Install every selected connector. Failures are recorded, never fatal.
    pub async fn run(&self, registry: &Registry, selection: &Selection) -> InstallRun {
        println!("{}", style("\nInstalling MCP servers...").yellow().bold());
        if let Some(methods) = &selection.methods {
            let names: Vec<_> = methods.iter().map(|m| m.as_str()).collect();
            println!("{}", style(format!("Methods: {}", names.join(", "))).dim());
        }
        if let Some(keys) = &selection.keys {
            println!("{}", style(format!("Servers: {}", keys.join(", "))).dim());
        }

        let mut run = InstallRun::default();
        for descriptor in registry.select(selection) {
            run.record(self.install_one(descriptor).await);
        }
        run
    }

    pub async fn install_one(&self, descriptor: &ConnectorDescriptor) -> InstallOutcome {
        println!(
            "\n{}",
            style(format!("Installing: {} ({})", descriptor.name, descriptor.key))
                .magenta()
                .bold()
        );
        println!("{}", style(format!("Category: {}", descriptor.category)).dim());
        println!("{}", style(format!("Description: {}", descriptor.description)).dim());
        if descriptor.requires_api_key {
            println!(
                "{}",
                style(format!("Requires: {}", descriptor.config_required.join(", "))).dim()
            );
        }

        let strategy = strategy_for(descriptor.installation_method);
        log::debug!("{} -> {} strategy", descriptor.key, strategy.name());

        let ctx = InstallContext {
            paths: self.paths,
            runner: self.runner,
            timeout: self.options.timeout,
        };

        match strategy.install(&ctx, descriptor).await {
            Ok(note) => {
                println!("{}", style(format!("✓ {}", note)).green());
                InstallOutcome {
                    key: descriptor.key.clone(),
                    name: descriptor.name.clone(),
                    success: true,
                    failure: None,
                    log_line: format!("✓ {}", descriptor.name),
                }
            }
            Err(failure) => {
                print_failure(&descriptor.name, &failure);
                InstallOutcome {
                    key: descriptor.key.clone(),
                    name: descriptor.name.clone(),
                    success: false,
                    failure: Some(failure),
                    log_line: format!("✗ {}", descriptor.name),
                }
            }
        }
    }
}

fn print_failure(name: &str, failure: &InstallFailure) {
    match failure {
        InstallFailure::Timeout(_) => {
            eprintln!("{}", style(format!("✗ [TIMEOUT] {}: {}", name, failure)).red());
        }
        InstallFailure::Exit { code, stderr } => {
            eprintln!("{}", style(format!("✗ [FAILED] {}: exit code {}", name, code)).red());
            for line in head_lines(stderr, 5) {
                eprintln!("{}", style(format!("    {}", line)).red());
            }
        }
        other => {
            eprintln!("{}", style(format!("✗ [ERROR] {}: {}", name, other)).red());
        }
    }
}

/// Print the operator's follow-up steps after an install.
pub fn print_next_steps(paths: &Paths) {
    println!();
    println!("{}", style("Next steps:").yellow().bold());
    println!("1. Set the API keys your connectors need: mcp-setup env setup");
    println!(
        "2. Copy the client configuration into your editor settings: {}",
        paths.integration_file().display()
    );
    println!("3. Verify the installation: mcp-setup test");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::tests::RecordingRunner;

    fn registry() -> Registry {
        let entry = |method: &str| {
            format!(
                r#"{{"name": "n", "package": "p", "installation_method": "{method}", "category": "c",
                    "description": "d", "repository": "https://example.com/r.git",
                    "requires_api_key": false, "config_required": []}}"#
            )
        };
        let json = format!(
            r#"{{"servers": {{"g1": {}, "n1": {}, "g2": {}, "n2": {}, "g3": {}}}}}"#,
            entry("git"),
            entry("npm"),
            entry("git"),
            entry("npm"),
            entry("git")
        );
        Registry::from_json(&json).unwrap()
    }

    #[tokio::test]
    async fn method_filter_limits_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let runner = RecordingRunner::ok();
        let installer = Installer::new(&paths, &runner, InstallerOptions::default());

        let selection = Selection::new(Some(crate::models::InstallMethod::Git), None);
        let run = installer.run(&registry(), &selection).await;

        assert_eq!(run.total_count(), 3);
        assert_eq!(runner.calls().len(), 3);
        assert!(runner.calls().iter().all(|c| c.program == "git"));
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let runner = RecordingRunner::failing(1);
        let installer = Installer::new(&paths, &runner, InstallerOptions::default());

        let run = installer.run(&registry(), &Selection::default()).await;

        assert_eq!(run.total_count(), 5);
        assert_eq!(run.success_count(), 0);
        assert!(run.succeeded_keys().is_empty());
        assert_eq!(runner.calls().len(), 5);
    }

    #[tokio::test]
    async fn timeouts_roll_into_failures() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let runner = RecordingRunner::timing_out();
        let installer = Installer::new(&paths, &runner, InstallerOptions::default());

        let selection = Selection::new(None, Some("n1"));
        let run = installer.run(&registry(), &selection).await;

        assert_eq!(run.total_count(), 1);
        assert_eq!(run.success_count(), 0);
        assert_eq!(run.timeout_count(), 1);
    }

    #[test]
    fn log_lines_are_marked() {
        let mut run = InstallRun::default();
        run.record(InstallOutcome {
            key: "a".into(),
            name: "Alpha".into(),
            success: true,
            failure: None,
            log_line: "✓ Alpha".into(),
        });
        run.record(InstallOutcome {
            key: "b".into(),
            name: "Beta".into(),
            success: false,
            failure: Some(InstallFailure::NotFound("npm".into())),
            log_line: "✗ Beta".into(),
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("install-log.txt");
        run.write_log(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "✓ Alpha\n✗ Beta");
        assert_eq!(run.succeeded_keys(), HashSet::from(["a".to_string()]));
    }
}
