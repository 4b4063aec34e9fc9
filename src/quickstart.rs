//! Guided quick-start: environment setup, install, smoke test, and editor
//! integration in one run.

use console::style;

use crate::emit;
use crate::env::{Catalog, EnvManager, PromptError, Prompter};
use crate::install::InstallerOptions;
use crate::models::InstallMethod;
use crate::paths::Paths;
use crate::process::CommandRunner;
use crate::registry::{Registry, Selection};
use crate::tester::{TestType, TesterOptions};
use crate::workflow::{self, WorkflowError};

#[derive(Debug, Clone, Default)]
pub struct QuickstartOptions {
    pub method: Option<InstallMethod>,
    pub keys: Option<Vec<String>>,
    pub skip_env: bool,
    pub skip_test: bool,
    pub installer: InstallerOptions,
    pub tester: TesterOptions,
}

/// Completed and failed step names, in run order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StepLog {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
}

impl StepLog {
    fn record(&mut self, step: &str, ok: bool) {
        if ok {
            self.completed.push(step.to_string());
        } else {
            self.failed.push(step.to_string());
        }
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed.len() + self.failed.len();
        if total == 0 {
            0.0
        } else {
            self.completed.len() as f64 / total as f64 * 100.0
        }
    }
}

const STEP_ENV: &str = "Environment setup";
const STEP_INSTALL: &str = "Server installation";
const STEP_TEST: &str = "Server tests";
const STEP_INTEGRATION: &str = "Editor integration";

pub struct Quickstart<'a> {
    paths: &'a Paths,
    registry: &'a Registry,
    runner: &'a dyn CommandRunner,
    prompter: &'a mut dyn Prompter,
}

impl<'a> Quickstart<'a> {
    pub fn new(
        paths: &'a Paths,
        registry: &'a Registry,
        runner: &'a dyn CommandRunner,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self { paths, registry, runner, prompter }
    }

    /// Run every step. Returns `Ok(None)` when the operator declines the plan.
    /// Step failures are recorded; only an interrupt or a prompt failure
    /// aborts the run. A step the operator declines at its prompt counts as
    /// completed; one skipped by flag is not counted at all.
    pub async fn run(&mut self, options: QuickstartOptions) -> Result<Option<StepLog>, WorkflowError> {
        print_plan(self.registry, &options);
        if !self.prompter.confirm("Continue?", true).map_err(prompt_error)? {
            println!("{}", style("Installation cancelled").yellow());
            return Ok(None);
        }

        let mut steps = StepLog::default();

        if !options.skip_env {
            self.step_env(&options, &mut steps)?;
        }

        println!("\n{}", style("Step 2: Install MCP servers").blue().bold());
        let selection = Selection {
            methods: options.method.map(|m| vec![m]),
            keys: options.keys.clone(),
        };
        match workflow::install(self.paths, self.registry, &selection, self.runner, options.installer.clone(), false).await {
            Ok(_) => steps.record(STEP_INSTALL, true),
            Err(e) if e.is_interrupted() => return Err(e),
            Err(e) => {
                eprintln!("{}", style(format!("✗ {}: {}", STEP_INSTALL, e)).red());
                steps.record(STEP_INSTALL, false);
            }
        }

        if !options.skip_test {
            self.step_test(&options, &mut steps).await?;
        }

        let integrated = self.step_integration();
        steps.record(STEP_INTEGRATION, integrated);

        print_summary(self.paths, &steps);
        Ok(Some(steps))
    }

    fn step_env(&mut self, options: &QuickstartOptions, steps: &mut StepLog) -> Result<(), WorkflowError> {
        println!("\n{}", style("Step 1: Environment variables").blue().bold());
        if !self.prompter.confirm("Set up environment variables?", true).map_err(prompt_error)? {
            println!("{}", style("Skipping environment setup").yellow());
            steps.record(STEP_ENV, true);
            return Ok(());
        }
        let manager = EnvManager::new(self.paths, Catalog::builtin().with_registry(self.registry));
        match manager.setup(&mut *self.prompter, options.keys.as_deref()) {
            Ok(_) => steps.record(STEP_ENV, true),
            Err(e) => {
                eprintln!("{}", style(format!("✗ {}: {}", STEP_ENV, e)).red());
                steps.record(STEP_ENV, false);
            }
        }
        Ok(())
    }

    async fn step_test(&mut self, options: &QuickstartOptions, steps: &mut StepLog) -> Result<(), WorkflowError> {
        println!("\n{}", style("Step 3: Test MCP servers").blue().bold());
        if !self.prompter.confirm("Run server tests?", true).map_err(prompt_error)? {
            println!("{}", style("Skipping server tests").yellow());
            steps.record(STEP_TEST, true);
            return Ok(());
        }
        let keys = options.keys.as_deref();
        match workflow::test(self.paths, self.registry, keys, TestType::All, options.tester.clone()).await {
            Ok(_) => steps.record(STEP_TEST, true),
            Err(e) if e.is_interrupted() => return Err(e),
            Err(e) => {
                eprintln!("{}", style(format!("✗ {}: {}", STEP_TEST, e)).red());
                steps.record(STEP_TEST, false);
            }
        }
        Ok(())
    }

    fn step_integration(&self) -> bool {
        println!("\n{}", style("Step 4: Editor integration").blue().bold());
        let path = self.paths.integration_file();
        if !path.exists() {
            eprintln!("{}", style("✗ Integration file not found. Run the installer first.").red());
            return false;
        }

        println!("{}", style("✓ Editor configuration generated").green());
        println!("   Location: {}", style(path.display()).cyan());
        println!("\n{}", style("Next steps:").yellow().bold());
        println!("1. Open your editor");
        println!("2. Press Ctrl+Shift+P (Windows/Linux) or Cmd+Shift+P (Mac)");
        println!("3. Run 'Preferences: Open Settings (JSON)'");
        println!("4. Add the generated configuration to settings.json");

        match emit::load_integration(&path) {
            Ok(config) => {
                println!("\n{}", style("Configuration preview (first 3 servers):").cyan());
                for (key, entry) in config.mcp_servers.iter().take(3) {
                    println!("{}", style(format!("  {}: {}", key, entry.command)).dim());
                }
                if config.mcp_servers.len() > 3 {
                    println!(
                        "{}",
                        style(format!("  ... and {} more", config.mcp_servers.len() - 3)).dim()
                    );
                }
            }
            Err(e) => eprintln!("{}", style(format!("Could not read configuration: {}", e)).red()),
        }
        true
    }
}

fn prompt_error(e: PromptError) -> WorkflowError {
    WorkflowError::Env(e.into())
}

fn print_plan(registry: &Registry, options: &QuickstartOptions) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("\n{}", style("Installation plan:").cyan().bold());
    match options.method {
        Some(m) => println!("   Install method: {}", m),
        None => println!("   Install method: all"),
    }
    match &options.keys {
        Some(keys) => println!("   Servers: {}", keys.join(", ")),
        None => println!("   Servers: all ({})", registry.len()),
    }
    println!("   Skip environment setup: {}", yes_no(options.skip_env));
    println!("   Skip tests: {}", yes_no(options.skip_test));
}

fn print_summary(paths: &Paths, steps: &StepLog) {
    println!("\n{}", style("=".repeat(60)).yellow());
    println!("{}", style("Quick-start summary").yellow().bold());
    println!("{}", style("=".repeat(60)).yellow());

    if !steps.completed.is_empty() {
        println!("\n{}", style("Completed steps:").green().bold());
        for step in &steps.completed {
            println!("{}", style(format!("   ✓ {}", step)).green());
        }
    }
    if !steps.failed.is_empty() {
        println!("\n{}", style("Failed steps:").red().bold());
        for step in &steps.failed {
            println!("{}", style(format!("   ✗ {}", step)).red());
        }
    }

    println!("\n{}", style("Files:").cyan().bold());
    let files = [
        ("Editor configuration", paths.integration_file()),
        ("Environment store", paths.env_store_file()),
        ("Test report", paths.test_report_file()),
        ("Install log", paths.install_log_file()),
        ("Environment script (Windows)", paths.activation_bat()),
        ("Environment script (PowerShell)", paths.activation_ps1()),
        ("Environment script (Unix)", paths.activation_sh()),
    ];
    for (label, path) in files {
        if path.exists() {
            println!("{}", style(format!("   ✓ {}: {}", label, path.display())).cyan());
        } else {
            println!("{}", style(format!("   ✗ {}: missing", label)).dim());
        }
    }

    println!("\n{}", style("Next:").yellow().bold());
    if steps.failed.is_empty() {
        println!("1. Restart your editor to load the new configuration");
        println!("2. Try the MCP servers from your editor");
        println!("3. Adjust environment variables as needed: mcp-setup env setup");
    } else {
        println!("1. Check the errors of the failed steps above");
        println!("2. Review the install log and test report");
        println!("3. Re-run the failed steps");
    }

    let rate = steps.success_rate();
    let line = format!("\nSuccess rate: {:.1}%", rate);
    let styled = if rate >= 80.0 {
        style(line).green()
    } else if rate >= 50.0 {
        style(line).yellow()
    } else {
        style(line).red()
    };
    println!("{}", styled.bold());
}
