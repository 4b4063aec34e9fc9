//! Installation strategies, one per install method.
//!
//! [`strategy_for`] is the dispatch table: adding an install method means
//! adding a strategy and a table row, not touching the installer loop.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{ConnectorDescriptor, InstallMethod};
use crate::paths::Paths;
use crate::process::{CommandRunner, CommandSpec, RunError};

/// What a strategy needs from its caller.
pub struct InstallContext<'a> {
    pub paths: &'a Paths,
    pub runner: &'a dyn CommandRunner,
    pub timeout: Duration,
}

/// Common contract for all installation strategies.
#[async_trait]
pub trait InstallStrategy: Send + Sync {
    /// Human-readable strategy name.
    fn name(&self) -> &'static str;

    /// Install one connector. `Ok` carries a short note for the operator.
    async fn install(
        &self,
        ctx: &InstallContext<'_>,
        descriptor: &ConnectorDescriptor,
    ) -> Result<String, InstallFailure>;
}

/// Why a single connector failed to install.
#[derive(Debug, thiserror::Error)]
pub enum InstallFailure {
    #[error("exit code {code}: {stderr}")]
    Exit { code: i32, stderr: String },
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Spawn(String),
    #[error("failed to prepare clone directory: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallFailure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, InstallFailure::Timeout(_))
    }
}

impl From<RunError> for InstallFailure {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Timeout(d) => InstallFailure::Timeout(d),
            RunError::NotFound(p) => InstallFailure::NotFound(p),
            other => InstallFailure::Spawn(other.to_string()),
        }
    }
}

/// Global install through a package manager (`npm install -g`, `pip install`).
pub struct PackageManagerStrategy {
    pub manager: &'static str,
    pub install_args: &'static [&'static str],
}

/// Toolchain install of a binary (`go install`). The binary path is looked
/// up later by the emitter.
pub struct BinaryStrategy {
    pub toolchain: &'static str,
    pub install_args: &'static [&'static str],
}

/// Clone (or pull) the connector's repository under the servers dir.
pub struct SourceControlStrategy;

/// Nothing to run; the operator installs out-of-band.
pub struct ManualStrategy;

static NPM: PackageManagerStrategy = PackageManagerStrategy {
    manager: "npm",
    install_args: &["install", "-g"],
};

static PIP: PackageManagerStrategy = PackageManagerStrategy {
    manager: "pip",
    install_args: &["install"],
};

static GO: BinaryStrategy = BinaryStrategy {
    toolchain: "go",
    install_args: &["install"],
};

static GIT: SourceControlStrategy = SourceControlStrategy;

static MANUAL: ManualStrategy = ManualStrategy;

/// Strategy table keyed by install method.
pub fn strategy_for(method: InstallMethod) -> &'static dyn InstallStrategy {
    match method {
        InstallMethod::Npm => &NPM,
        InstallMethod::Pip => &PIP,
        InstallMethod::Git => &GIT,
        InstallMethod::Go => &GO,
        InstallMethod::Unity => &MANUAL,
    }
}

async fn run_checked(ctx: &InstallContext<'_>, spec: CommandSpec) -> Result<(), InstallFailure> {
    let output = ctx.runner.run(&spec, ctx.timeout).await?;
    if output.success() {
        Ok(())
    } else {
        Err(InstallFailure::Exit {
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

fn with_package(args: &[&str], package: &str) -> Vec<String> {
    args.iter()
        .map(|a| a.to_string())
        .chain(std::iter::once(package.to_string()))
        .collect()
}

#[async_trait]
impl InstallStrategy for PackageManagerStrategy {
    fn name(&self) -> &'static str {
        "package-manager"
    }

    async fn install(
        &self,
        ctx: &InstallContext<'_>,
        descriptor: &ConnectorDescriptor,
    ) -> Result<String, InstallFailure> {
        println!("  {} package: {}", self.manager, descriptor.package);
        let spec = CommandSpec::new(self.manager, with_package(self.install_args, &descriptor.package));
        run_checked(ctx, spec).await?;
        Ok(format!("Installed {}", descriptor.name))
    }
}

#[async_trait]
impl InstallStrategy for BinaryStrategy {
    fn name(&self) -> &'static str {
        "binary"
    }

    async fn install(
        &self,
        ctx: &InstallContext<'_>,
        descriptor: &ConnectorDescriptor,
    ) -> Result<String, InstallFailure> {
        println!("  {} package: {}", self.toolchain, descriptor.package);
        let spec = CommandSpec::new(self.toolchain, with_package(self.install_args, &descriptor.package));
        run_checked(ctx, spec).await?;
        Ok(format!("Installed {}", descriptor.name))
    }
}

#[async_trait]
impl InstallStrategy for SourceControlStrategy {
    fn name(&self) -> &'static str {
        "source-control"
    }

    async fn install(
        &self,
        ctx: &InstallContext<'_>,
        descriptor: &ConnectorDescriptor,
    ) -> Result<String, InstallFailure> {
        println!("  git repository: {}", descriptor.repository);
        let clone_dir = ctx.paths.clone_dir(&descriptor.key);
        let spec = git_command(&clone_dir, &descriptor.repository)?;
        run_checked(ctx, spec).await?;
        Ok(format!("Cloned {}", descriptor.name))
    }
}

/// `git pull` inside an existing clone, otherwise a fresh `git clone`.
fn git_command(clone_dir: &Path, repository: &str) -> Result<CommandSpec, InstallFailure> {
    let dir = clone_dir.to_string_lossy().to_string();
    if clone_dir.exists() {
        println!("  Directory exists, updating repository...");
        Ok(CommandSpec::new("git", ["-C".to_string(), dir, "pull".to_string()]))
    } else {
        if let Some(parent) = clone_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(CommandSpec::new("git", ["clone".to_string(), repository.to_string(), dir]))
    }
}

#[async_trait]
impl InstallStrategy for ManualStrategy {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn install(
        &self,
        _ctx: &InstallContext<'_>,
        descriptor: &ConnectorDescriptor,
    ) -> Result<String, InstallFailure> {
        Ok(format!(
            "{} must be installed manually: {}",
            descriptor.name, descriptor.repository
        ))
    }
}
