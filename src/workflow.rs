//! End-to-end install and test flows shared by the CLI and quick-start.

use console::style;

use crate::emit::{self, EmitError};
use crate::env::{self, Catalog, EnvManager};
use crate::install::{print_next_steps, InstallRun, Installer, InstallerOptions};
use crate::interrupt::{interruptible, Interrupted};
use crate::models::InstallMethod;
use crate::paths::Paths;
use crate::prereq::{check_prerequisites, PrerequisiteError};
use crate::process::CommandRunner;
use crate::registry::{Registry, Selection};
use crate::tester::{self, ReportError, TestRun, TestType, Tester, TesterOptions};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Prerequisite(#[from] PrerequisiteError),
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Env(#[from] env::EnvError),
    #[error("Failed to prepare {}: {source}", .path.display())]
    Io { path: std::path::PathBuf, source: std::io::Error },
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl WorkflowError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, WorkflowError::Interrupted(_))
    }
}

/// Install methods the prerequisite check must cover for `selection`.
pub fn selected_methods(registry: &Registry, selection: &Selection) -> Vec<InstallMethod> {
    let mut methods = Vec::new();
    for descriptor in registry.select(selection) {
        if !methods.contains(&descriptor.installation_method) {
            methods.push(descriptor.installation_method);
        }
    }
    methods
}

/// Prerequisites, installation, integration file, environment template and
/// install log. Per-connector failures are reported, not returned.
pub async fn install(
    paths: &Paths,
    registry: &Registry,
    selection: &Selection,
    runner: &dyn CommandRunner,
    options: InstallerOptions,
    skip_check: bool,
) -> Result<InstallRun, WorkflowError> {
    if skip_check {
        log::debug!("prerequisite check skipped");
    } else {
        check_prerequisites(runner, &selected_methods(registry, selection)).await?;
    }

    paths.ensure_dirs().map_err(|source| WorkflowError::Io {
        path: paths.base_dir.clone(),
        source,
    })?;

    let installer = Installer::new(paths, runner, options);
    let run = interruptible(installer.run(registry, selection)).await?;

    emit::emit(registry, &run.succeeded_keys(), paths)?;

    println!("{}", style("\nGenerating environment template...").yellow().bold());
    let (sh, bat) = env::scripts::write_env_templates(paths, registry).map_err(|source| WorkflowError::Io {
        path: paths.env_template_sh(),
        source,
    })?;
    println!("{}", style("Environment template saved to:").green());
    println!("  Linux/Mac: {}", style(sh.display()).cyan());
    println!("  Windows:   {}", style(bat.display()).cyan());

    let log_file = paths.install_log_file();
    run.write_log(&log_file).map_err(|source| WorkflowError::Io {
        path: log_file.clone(),
        source,
    })?;
    log::debug!("install log written to {}", log_file.display());

    run.print_summary();
    print_next_steps(paths);
    Ok(run)
}

/// Apply the saved environment, then smoke-test the integration entries and
/// write the report. A missing integration file is fatal.
pub async fn test(
    paths: &Paths,
    registry: &Registry,
    keys: Option<&[String]>,
    test_type: TestType,
    options: TesterOptions,
) -> Result<TestRun, WorkflowError> {
    let applied = EnvManager::new(paths, Catalog::builtin().with_registry(registry)).apply()?;
    log::debug!("applied {} stored variables", applied);

    let integration = emit::load_integration(&paths.integration_file())?;
    let cases = tester::test_cases(&integration, registry, keys);
    println!("{}", style(format!("Loaded {} test cases", cases.len())).green());

    tester::check_environment(&cases);

    let run = Tester::new(options).execute(&cases, test_type).await?;

    let report_file = paths.test_report_file();
    tester::write_report(&report_file, &run.summary, &run.reports)?;
    tester::print_summary(&run.summary, &run.reports);
    println!("\n{}", style(format!("Test report saved to: {}", report_file.display())).cyan());
    Ok(run)
}
