//! Smoke tester: start each configured connector and check it stays up.

pub mod process;
pub mod report;

use std::collections::BTreeSet;
use std::future::Future;
use std::process::Stdio;
use std::time::{Duration, Instant};

use console::style;
use indexmap::IndexMap;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

use crate::interrupt::{self, interruptible_with, Interrupted};
use crate::models::IntegrationConfig;
use crate::process::{read_available, MAX_CAPTURE};
use crate::registry::Registry;

pub use process::{Liveness, ProcessRegistry};
pub use report::{print_summary, write_report, ReportError, TestReport, TestResult, TestSummary};

/// Which passes to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TestType {
    Startup,
    Health,
    All,
}

impl TestType {
    fn passes(self) -> &'static [Pass] {
        match self {
            TestType::Startup => &[Pass::Startup],
            TestType::Health => &[Pass::Health],
            TestType::All => &[Pass::Startup, Pass::Health],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Startup,
    Health,
}

#[derive(Debug, Clone)]
pub struct TesterOptions {
    /// Time a connector must survive after spawn.
    pub grace: Duration,
    /// How long to collect output from a live connector.
    pub capture_window: Duration,
    /// Bound on the whole startup probe of one connector.
    pub startup_timeout: Duration,
    /// Pause between the startup and health passes.
    pub health_delay: Duration,
    /// How long a connector gets to exit after SIGTERM.
    pub terminate_wait: Duration,
    /// Terminate retained connectors when the run ends.
    pub cleanup: bool,
}

impl Default for TesterOptions {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(3),
            capture_window: Duration::from_secs(2),
            startup_timeout: Duration::from_secs(30),
            health_delay: Duration::from_secs(5),
            terminate_wait: Duration::from_secs(5),
            cleanup: true,
        }
    }
}

/// One connector launch taken from the integration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub server_name: String,
    pub server_key: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: IndexMap<String, String>,
}

/// Build test cases from integration entries, optionally limited to `keys`.
pub fn test_cases(integration: &IntegrationConfig, registry: &Registry, keys: Option<&[String]>) -> Vec<TestCase> {
    integration
        .mcp_servers
        .iter()
        .filter(|(key, _)| keys.map_or(true, |keys| keys.contains(key)))
        .map(|(key, entry)| TestCase {
            server_name: registry.display_name(key),
            server_key: key.clone(),
            command: entry.command.clone(),
            args: entry.args.clone(),
            env: entry.env.clone().unwrap_or_default(),
        })
        .collect()
}

/// Variable a placeholder entry refers to: `"$VAR"` names `VAR`, a literal
/// value is keyed by its own name.
fn placeholder_var<'a>(name: &'a str, value: &'a str) -> &'a str {
    value.strip_prefix('$').unwrap_or(name)
}

/// Child environment overrides: `"$VAR"` resolved from this process (skipped
/// when unset), literals copied.
pub fn resolve_env(env: &IndexMap<String, String>) -> Vec<(String, String)> {
    env.iter()
        .filter_map(|(name, value)| match value.strip_prefix('$') {
            Some(var) => std::env::var(var).ok().map(|v| (name.clone(), v)),
            None => Some((name.clone(), value.clone())),
        })
        .collect()
}

/// Report each variable the cases depend on as set or unset.
pub fn check_environment(cases: &[TestCase]) -> Vec<(String, bool)> {
    println!("{}", style("\nChecking environment variables...").yellow().bold());
    let vars: BTreeSet<&str> = cases
        .iter()
        .flat_map(|c| c.env.iter().map(|(k, v)| placeholder_var(k, v)))
        .collect();

    let mut status = Vec::new();
    for var in vars {
        let set = std::env::var(var).is_ok_and(|v| !v.is_empty());
        if set {
            println!("{}", style(format!("✓ {}: set", var)).green());
        } else {
            println!("{}", style(format!("✗ {}: not set", var)).red());
        }
        status.push((var.to_string(), set));
    }

    let missing = status.iter().filter(|(_, set)| !set).count();
    if missing > 0 {
        println!("{}", style(format!("\nWarning: {} environment variables are not set", missing)).yellow());
        println!("{}", style("Some servers may not work correctly").yellow());
    }
    status
}

/// Reports of one run in execution order.
#[derive(Debug, Default)]
pub struct TestRun {
    pub reports: Vec<TestReport>,
    pub summary: TestSummary,
}

impl TestRun {
    fn record(&mut self, report: TestReport) {
        self.summary.record(report.result);
        self.reports.push(report);
    }
}

pub struct Tester {
    options: TesterOptions,
}

impl Tester {
    pub fn new(options: TesterOptions) -> Self {
        Self { options }
    }

    /// Run the passes under interrupt supervision. Cleanup runs whether the
    /// run completes or Ctrl-C arrives, unless disabled.
    pub async fn execute(&self, cases: &[TestCase], test_type: TestType) -> Result<TestRun, Interrupted> {
        self.execute_until(cases, test_type, interrupt::ctrl_c()).await
    }

    /// [`Tester::execute`] stopped by `signal` instead of Ctrl-C.
    pub async fn execute_until<S>(
        &self,
        cases: &[TestCase],
        test_type: TestType,
        signal: S,
    ) -> Result<TestRun, Interrupted>
    where
        S: Future<Output = ()>,
    {
        let mut processes = ProcessRegistry::new();
        let outcome = interruptible_with(self.run(cases, test_type, &mut processes), signal).await;

        if self.options.cleanup {
            if !processes.is_empty() {
                println!("{}", style("\nCleaning up test processes...").yellow());
            }
            processes.shutdown_all(self.options.terminate_wait).await;
        } else if !processes.is_empty() {
            println!("{}", style(format!("Leaving {} server processes running", processes.len())).yellow());
        }
        outcome
    }

    /// Run the selected passes, retaining started processes in `processes`.
    pub async fn run(&self, cases: &[TestCase], test_type: TestType, processes: &mut ProcessRegistry) -> TestRun {
        println!("{}", style("\nRunning MCP server tests...").yellow().bold());
        let passes = test_type.passes();
        let mut run = TestRun::default();

        for (i, pass) in passes.iter().enumerate() {
            let title = match pass {
                Pass::Startup => "STARTUP",
                Pass::Health => "HEALTH",
            };
            println!("{}", style(format!("\n=== {} tests ===", title)).yellow().bold());

            for case in cases {
                println!(
                    "\n{}",
                    style(format!("Testing: {} ({})", case.server_name, case.server_key)).cyan().bold()
                );
                let report = match pass {
                    Pass::Startup => self.startup(case, processes).await,
                    Pass::Health => self.health(case, processes),
                };
                report::print_report(&report);
                run.record(report);
            }

            if *pass == Pass::Startup && i + 1 < passes.len() {
                println!(
                    "{}",
                    style(format!("\nWaiting {}s before health checks...", self.options.health_delay.as_secs())).yellow()
                );
                tokio::time::sleep(self.options.health_delay).await;
            }
        }
        run
    }

    /// Spawn the connector and classify it after the grace interval. PASS
    /// and FAIL handles are retained for the health pass; a child that times
    /// out or cannot be polled is killed here.
    pub async fn startup(&self, case: &TestCase, processes: &mut ProcessRegistry) -> TestReport {
        let start = Instant::now();
        let report = |result, message: String| {
            TestReport::new(&case.server_name, &case.server_key, result, message, start.elapsed())
        };

        let display = std::iter::once(case.command.as_str())
            .chain(case.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}", style(format!("Command: {}", display)).dim());

        // Stdin stays piped and open: stdio servers exit on EOF.
        let spawned = Command::new(&case.command)
            .args(&case.args)
            .envs(resolve_env(&case.env))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(self.options.cleanup)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return report(TestResult::Error, format!("Command not found: {}", case.command));
            }
            Err(e) => return report(TestResult::Error, format!("Test error: {}", e)),
        };
        log::debug!("{} started as pid {:?}", case.server_key, child.id());

        match tokio::time::timeout(self.options.startup_timeout, self.observe(&mut child)).await {
            Ok(Ok(observed)) => {
                processes.insert(&case.server_key, child);
                report(observed.result, observed.message).with_output(observed.output, observed.error)
            }
            Ok(Err(e)) => {
                discard(&case.server_key, child).await;
                report(TestResult::Error, format!("Test error: {}", e))
            }
            Err(_) => {
                discard(&case.server_key, child).await;
                report(
                    TestResult::Timeout,
                    format!("Server startup timed out after {}s", self.options.startup_timeout.as_secs()),
                )
            }
        }
    }

    /// Wait out the grace interval, then poll the child and collect what it
    /// printed. Reads are bounded by the capture window whether or not the
    /// child exited, since a grandchild may still hold the pipes.
    async fn observe(&self, child: &mut Child) -> std::io::Result<Observed> {
        tokio::time::sleep(self.options.grace).await;

        let status = child.try_wait()?;
        let window = self.options.capture_window;
        let (stdout, stderr) = (child.stdout.as_mut(), child.stderr.as_mut());
        let (out, err) = tokio::join!(available(stdout, window), available(stderr, window));

        Ok(match status {
            None => {
                let mut output = out + &err;
                if output.trim().is_empty() {
                    output = "Process is running...".to_string();
                }
                Observed {
                    result: TestResult::Pass,
                    message: "Server started".to_string(),
                    output,
                    error: String::new(),
                }
            }
            Some(status) => Observed {
                result: TestResult::Fail,
                message: format!("Server exited with code {}", status.code().unwrap_or(-1)),
                output: out,
                error: err,
            },
        })
    }

    /// Liveness of the handle retained by the startup pass.
    pub fn health(&self, case: &TestCase, processes: &mut ProcessRegistry) -> TestReport {
        let start = Instant::now();
        let (result, message) = match processes.liveness(&case.server_key) {
            None => (TestResult::Skip, "Server not started, health check skipped".to_string()),
            Some(Ok(Liveness::Running)) => (TestResult::Pass, "Server running".to_string()),
            Some(Ok(Liveness::Exited(code))) => (TestResult::Fail, format!("Server stopped with exit code {}", code)),
            Some(Err(e)) => (TestResult::Error, format!("Test error: {}", e)),
        };
        TestReport::new(&case.server_name, &case.server_key, result, message, start.elapsed())
    }
}

struct Observed {
    result: TestResult,
    message: String,
    output: String,
    error: String,
}

async fn available<R: AsyncRead + Unpin>(reader: Option<&mut R>, window: Duration) -> String {
    match reader {
        Some(r) => read_available(r, window, MAX_CAPTURE).await,
        None => String::new(),
    }
}

/// Kill and reap a child the registry will not retain.
async fn discard(key: &str, mut child: Child) {
    if let Err(e) = child.kill().await {
        log::debug!("failed to kill {}: {}", key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntegrationEntry;
    use serial_test::serial;

    fn quick() -> TesterOptions {
        TesterOptions {
            grace: Duration::from_millis(500),
            capture_window: Duration::from_millis(200),
            startup_timeout: Duration::from_secs(10),
            health_delay: Duration::from_millis(10),
            terminate_wait: Duration::from_secs(2),
            cleanup: true,
        }
    }

    fn case(key: &str, command: &str, args: &[&str]) -> TestCase {
        TestCase {
            server_name: key.to_uppercase(),
            server_key: key.to_string(),
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: IndexMap::new(),
        }
    }

    #[test]
    fn cases_use_registry_names_and_filter() {
        let registry = Registry::from_json(
            r#"{"servers": {"alpha": {"name": "Alpha Server", "package": "a", "installation_method": "npm",
                "category": "c", "description": "d", "repository": "r", "requires_api_key": false}}}"#,
        )
        .unwrap();
        let mut integration = IntegrationConfig::default();
        for key in ["alpha", "orphan"] {
            integration.mcp_servers.insert(
                key.to_string(),
                IntegrationEntry { command: "npx".into(), args: vec![key.into()], env: None },
            );
        }

        let cases = test_cases(&integration, &registry, None);
        assert_eq!(cases[0].server_name, "Alpha Server");
        assert_eq!(cases[1].server_name, "orphan");

        let only = vec!["orphan".to_string()];
        let cases = test_cases(&integration, &registry, Some(&only));
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].server_key, "orphan");
    }

    #[test]
    #[serial]
    fn placeholders_resolve_from_process_env() {
        std::env::set_var("MCP_SETUP_TEST_RESOLVE", "value-1");
        std::env::remove_var("MCP_SETUP_TEST_UNSET");
        let mut env = IndexMap::new();
        env.insert("A".to_string(), "$MCP_SETUP_TEST_RESOLVE".to_string());
        env.insert("B".to_string(), "$MCP_SETUP_TEST_UNSET".to_string());
        env.insert("C".to_string(), "literal".to_string());

        let resolved = resolve_env(&env);
        assert_eq!(
            resolved,
            vec![("A".to_string(), "value-1".to_string()), ("C".to_string(), "literal".to_string())]
        );

        let mut c = case("x", "true", &[]);
        c.env = env;
        let status = check_environment(&[c]);
        assert_eq!(
            status,
            vec![
                ("C".to_string(), false),
                ("MCP_SETUP_TEST_RESOLVE".to_string(), true),
                ("MCP_SETUP_TEST_UNSET".to_string(), false),
            ]
        );
        std::env::remove_var("MCP_SETUP_TEST_RESOLVE");
    }

    #[tokio::test]
    async fn missing_command_is_error_and_health_skips() {
        let tester = Tester::new(quick());
        let mut processes = ProcessRegistry::new();
        let c = case("ghost", "definitely-not-a-real-binary-4f2a", &[]);

        let startup = tester.startup(&c, &mut processes).await;
        assert_eq!(startup.result, TestResult::Error);
        assert!(startup.message.contains("Command not found"));

        let health = tester.health(&c, &mut processes);
        assert_eq!(health.result, TestResult::Skip);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn long_running_server_passes_both_passes() {
        let tester = Tester::new(quick());
        let mut processes = ProcessRegistry::new();
        let cases = vec![case("sleeper", "sh", &["-c", "echo ready; sleep 30"])];

        let run = tester.run(&cases, TestType::All, &mut processes).await;

        let results: Vec<_> = run.reports.iter().map(|r| r.result).collect();
        assert_eq!(results, vec![TestResult::Pass, TestResult::Pass]);
        assert!(run.reports[0].output.contains("ready"));
        assert_eq!(run.summary.total, 2);
        assert_eq!(run.summary.success_rate, 100.0);

        assert_eq!(processes.shutdown_all(Duration::from_secs(2)).await, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exiting_server_fails_with_exit_code() {
        let tester = Tester::new(quick());
        let mut processes = ProcessRegistry::new();
        let cases = vec![case("quitter", "sh", &["-c", "echo bye; echo oops >&2; exit 0"])];

        let run = tester.run(&cases, TestType::All, &mut processes).await;

        assert_eq!(run.reports[0].result, TestResult::Fail);
        assert_eq!(run.reports[0].message, "Server exited with code 0");
        assert_eq!(run.reports[0].output.trim(), "bye");
        assert_eq!(run.reports[0].error.trim(), "oops");
        assert_eq!(run.reports[1].result, TestResult::Fail);
        assert_eq!(run.summary.failed, 2);
        assert_eq!(run.summary.success_rate, 0.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_probe_times_out() {
        let options = TesterOptions {
            grace: Duration::from_secs(5),
            startup_timeout: Duration::from_millis(300),
            ..quick()
        };
        let tester = Tester::new(options);
        let mut processes = ProcessRegistry::new();

        let report = tester.startup(&case("slow", "sleep", &["30"]), &mut processes).await;

        assert_eq!(report.result, TestResult::Timeout);
        assert!(processes.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_cleans_up_retained_processes() {
        let tester = Tester::new(quick());
        let cases = vec![case("sleeper", "sleep", &["30"])];

        let run = tester.execute(&cases, TestType::Startup).await.unwrap();

        assert_eq!(run.summary.passed, 1);
        assert_eq!(run.reports[0].output, "Process is running...");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exited_server_with_lingering_grandchild_still_fails() {
        let options = TesterOptions { startup_timeout: Duration::from_secs(3), ..quick() };
        let tester = Tester::new(options);
        let mut processes = ProcessRegistry::new();
        let cases = vec![case("forker", "sh", &["-c", "echo bye; sleep 5 & exit 0"])];

        let run = tester.run(&cases, TestType::All, &mut processes).await;

        let results: Vec<_> = run.reports.iter().map(|r| r.result).collect();
        assert_eq!(results, vec![TestResult::Fail, TestResult::Fail]);
        assert_eq!(run.reports[0].message, "Server exited with code 0");
        assert_eq!(run.reports[0].output.trim(), "bye");
    }

    #[cfg(unix)]
    fn pid_script(pid_file: &std::path::Path) -> String {
        format!("echo $$ > {}; exec sleep 30", pid_file.display())
    }

    #[cfg(unix)]
    fn is_alive(pid_file: &std::path::Path) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let pid: i32 = std::fs::read_to_string(pid_file).unwrap().trim().parse().unwrap();
        kill(Pid::from_raw(pid), None).is_ok()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timed_out_child_is_killed_even_without_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let options = TesterOptions {
            grace: Duration::from_secs(5),
            startup_timeout: Duration::from_millis(500),
            cleanup: false,
            ..quick()
        };
        let tester = Tester::new(options);
        let mut processes = ProcessRegistry::new();
        let script = pid_script(&pid_file);

        let report = tester.startup(&case("slow", "sh", &["-c", &script]), &mut processes).await;

        assert_eq!(report.result, TestResult::Timeout);
        assert!(processes.is_empty());
        assert!(!is_alive(&pid_file));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn interrupt_stops_the_run_and_reaps_children() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let options = TesterOptions { health_delay: Duration::from_secs(10), ..quick() };
        let tester = Tester::new(options);
        let script = pid_script(&pid_file);
        let cases = vec![case("sleeper", "sh", &["-c", &script])];

        // Fires while the run waits between the startup and health passes.
        let signal = tokio::time::sleep(Duration::from_millis(1500));
        let started = Instant::now();
        let outcome = tester.execute_until(&cases, TestType::All, signal).await;

        assert!(matches!(outcome, Err(Interrupted)));
        assert!(started.elapsed() < Duration::from_secs(8));
        assert!(!is_alive(&pid_file));
    }
}
