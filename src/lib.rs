//! mcp-setup - MCP server setup
//!
//! Installs MCP connectors from a registry, manages the environment variables
//! they need, emits the editor integration file, and smoke-tests the result.

pub mod emit;
pub mod env;
pub mod install;
pub mod interrupt;
pub mod models;
pub mod paths;
pub mod prereq;
pub mod process;
pub mod quickstart;
pub mod registry;
pub mod strategy;
pub mod tester;
pub mod workflow;

pub use emit::{build_integration, load_integration, write_integration, EmitError};
pub use env::{Catalog, EnvError, EnvManager, EnvStore, Prompter, ScriptedPrompter, TerminalPrompter};
pub use install::{InstallRun, Installer, InstallerOptions};
pub use interrupt::Interrupted;
pub use models::{ConnectorDescriptor, InstallMethod, IntegrationConfig, IntegrationEntry};
pub use paths::Paths;
pub use process::{CommandRunner, SystemRunner};
pub use quickstart::{Quickstart, QuickstartOptions, StepLog};
pub use registry::{parse_key_list, Registry, RegistryError, Selection};
pub use tester::{TestType, Tester, TesterOptions};
pub use workflow::WorkflowError;
