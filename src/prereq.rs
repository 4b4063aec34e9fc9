//! Toolchain prerequisite check.

use std::time::Duration;

use console::style;

use crate::models::InstallMethod;
use crate::process::{CommandRunner, CommandSpec};

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// A toolchain binary an install method depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tool {
    pub label: &'static str,
    pub program: &'static str,
    pub version_args: &'static [&'static str],
}

const NODE: Tool = Tool { label: "Node.js", program: "node", version_args: &["--version"] };
const NPM: Tool = Tool { label: "npm", program: "npm", version_args: &["--version"] };
const PYTHON: Tool = Tool { label: "Python", program: "python", version_args: &["--version"] };
const PIP: Tool = Tool { label: "pip", program: "pip", version_args: &["--version"] };
const GIT: Tool = Tool { label: "Git", program: "git", version_args: &["--version"] };
const GO: Tool = Tool { label: "Go", program: "go", version_args: &["version"] };

/// Tools needed to install, and later run, connectors of `method`.
pub fn tools_for(method: InstallMethod) -> &'static [Tool] {
    match method {
        InstallMethod::Npm => &[NODE, NPM],
        InstallMethod::Pip => &[PYTHON, PIP],
        InstallMethod::Git => &[GIT],
        InstallMethod::Go => &[GO],
        InstallMethod::Unity => &[],
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Missing required tools: {}", .0.join(", "))]
pub struct PrerequisiteError(pub Vec<String>);

/// Verify every tool required by `methods` answers a version query.
/// Returns `(label, version)` pairs for the tools found.
pub async fn check_prerequisites(
    runner: &dyn CommandRunner,
    methods: &[InstallMethod],
) -> Result<Vec<(String, String)>, PrerequisiteError> {
    println!("{}", style("Checking prerequisites...").yellow().bold());

    let mut tools: Vec<Tool> = Vec::new();
    for method in methods {
        for tool in tools_for(*method) {
            if !tools.contains(tool) {
                tools.push(*tool);
            }
        }
    }

    let mut found = Vec::new();
    let mut missing = Vec::new();
    for tool in tools {
        let spec = CommandSpec::new(tool.program, tool.version_args.iter().copied());
        match runner.run(&spec, VERSION_TIMEOUT).await {
            Ok(output) if output.success() => {
                let version = output.stdout.lines().next().unwrap_or("").trim().to_string();
                println!("{}", style(format!("✓ {}: {}", tool.label, version)).green());
                found.push((tool.label.to_string(), version));
            }
            Ok(output) => {
                log::debug!("{} exited with {}", tool.program, output.exit_code);
                missing.push(tool.label.to_string());
            }
            Err(e) => {
                log::debug!("{} unavailable: {}", tool.program, e);
                missing.push(tool.label.to_string());
            }
        }
    }

    if !missing.is_empty() {
        eprintln!("{}", style(format!("Missing tools: {}", missing.join(", "))).red());
        eprintln!("{}", style("Install the missing tools and run again.").yellow());
        return Err(PrerequisiteError(missing));
    }

    println!("{}", style("All prerequisites satisfied.").green().bold());
    Ok(found)
}
