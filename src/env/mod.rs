//! Environment variable manager: interactive setup, apply, list, remove.

pub mod catalog;
pub mod prompt;
pub mod scripts;
pub mod store;

use console::style;

use crate::paths::Paths;

pub use catalog::{Catalog, EnvVarDescriptor};
pub use prompt::{PromptError, Prompter, ScriptedPrompter, TerminalPrompter};
pub use store::{mask, EnvStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("Failed to write activation scripts: {0}")]
    Scripts(std::io::Error),
}

/// Outcome of an interactive setup.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SetupSummary {
    pub set: Vec<String>,
    pub skipped: Vec<String>,
}

/// One stored variable as shown by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedVar {
    pub name: String,
    pub display_value: String,
    pub required_for: Vec<String>,
}

pub struct EnvManager<'a> {
    paths: &'a Paths,
    catalog: Catalog,
}

impl<'a> EnvManager<'a> {
    pub fn new(paths: &'a Paths, catalog: Catalog) -> Self {
        Self { paths, catalog }
    }

    pub fn load_store(&self) -> Result<EnvStore, StoreError> {
        EnvStore::load(&self.paths.env_store_file())
    }

    /// Walk the variables owned by `scope` (all when `None`) and prompt for
    /// values, then persist the store and regenerate activation scripts.
    pub fn setup(&self, prompter: &mut dyn Prompter, scope: Option<&[String]>) -> Result<SetupSummary, EnvError> {
        println!("{}", style("MCP environment variable setup").yellow().bold());
        println!("{}", style("=".repeat(40)).yellow());

        let mut store = self.load_store()?;
        let vars = self.catalog.in_scope(scope);
        println!("\n{} variables to configure", vars.len());

        let mut summary = SetupSummary::default();
        for var in vars {
            let wanted = if store.contains(&var.name) {
                prompter.confirm(&format!("{} is already set. Update it?", var.name), false)?
            } else {
                prompter.confirm(&format!("Set {}?", var.name), true)?
            };
            if !wanted {
                continue;
            }

            match self.ask_value(prompter, var)? {
                Some(value) => {
                    store.set(&var.name, &value);
                    println!("{}", style(format!("✓ {} set", var.name)).green());
                    summary.set.push(var.name.clone());
                }
                None => {
                    println!("{}", style(format!("⚠ Skipped {}", var.name)).yellow());
                    summary.skipped.push(var.name.clone());
                }
            }
        }

        let store_file = self.paths.env_store_file();
        store.save(&store_file)?;
        println!("\n{}", style(format!("Saved to: {}", store_file.display())).green());

        let scripts = scripts::write_activation_scripts(self.paths, &store).map_err(EnvError::Scripts)?;
        println!("{}", style("Activation scripts:").green());
        for script in scripts {
            println!("  {}", style(script.display()).cyan());
        }
        Ok(summary)
    }

    fn ask_value(&self, prompter: &mut dyn Prompter, var: &EnvVarDescriptor) -> Result<Option<String>, PromptError> {
        println!("\n{}", style(format!("Configure {}:", var.name)).cyan().bold());
        println!("Description: {}", var.description);
        println!("{}", style(format!("Get it from: {}", var.url)).blue());
        println!("{}", style(format!("Used by: {}", var.required_for.join(", "))).dim());
        if let Some(example) = &var.example {
            println!("{}", style(format!("Example: {}", example)).yellow());
        }
        if let Some(default) = &var.default {
            println!("{}", style(format!("Default: {}", default)).yellow());
        }
        if let Ok(current) = std::env::var(&var.name) {
            if !current.is_empty() {
                let shown = if var.sensitive { mask(&current) } else { current };
                println!("{}", style(format!("Current value: {}", shown)).green());
            }
        }

        let value = if var.sensitive {
            prompter.secret(&format!("{} (hidden)", var.name))?
        } else {
            prompter.input(&var.name, var.default.as_deref())?
        };

        if !value.is_empty() {
            return Ok(Some(value));
        }
        Ok(var.default.clone())
    }

    /// Export the stored variables into this process. Returns how many.
    pub fn apply(&self) -> Result<usize, EnvError> {
        let store = self.load_store()?;
        if store.is_empty() {
            println!("{}", style("No saved environment variables found").yellow());
            return Ok(0);
        }
        store.apply_to_process();
        for (name, _) in store.iter() {
            log::debug!("applied {}", name);
        }
        Ok(store.len())
    }

    /// Stored variables with sensitive values masked.
    pub fn listed(&self) -> Result<Vec<ListedVar>, EnvError> {
        let store = self.load_store()?;
        Ok(store
            .iter()
            .map(|(name, value)| {
                let display_value = if self.catalog.is_sensitive(name) { mask(value) } else { value.to_string() };
                ListedVar {
                    name: name.to_string(),
                    display_value,
                    required_for: self.catalog.get(name).map(|d| d.required_for.clone()).unwrap_or_default(),
                }
            })
            .collect())
    }

    pub fn list(&self) -> Result<(), EnvError> {
        let vars = self.listed()?;
        if vars.is_empty() {
            println!("{}", style("No saved environment variables found").yellow());
            return Ok(());
        }
        println!("{}", style("Configured environment variables:").yellow().bold());
        println!("{}", style("=".repeat(30)).yellow());
        for var in vars {
            println!("{}: {}", var.name, var.display_value);
            if !var.required_for.is_empty() {
                println!("{}", style(format!("  Used by: {}", var.required_for.join(", "))).dim());
            }
        }
        Ok(())
    }

    /// Delete one variable. Returns `false` if it was not stored.
    pub fn remove(&self, name: &str) -> Result<bool, EnvError> {
        let mut store = self.load_store()?;
        if !store.remove(name) {
            println!("{}", style(format!("Environment variable not found: {}", name)).yellow());
            return Ok(false);
        }
        store.save(&self.paths.env_store_file())?;
        scripts::write_activation_scripts(self.paths, &store).map_err(EnvError::Scripts)?;
        println!("{}", style(format!("Removed environment variable: {}", name)).green());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn manager(paths: &Paths) -> EnvManager<'_> {
        EnvManager::new(paths, Catalog::builtin())
    }

    #[test]
    #[serial]
    fn setup_walks_scope_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let scope = vec!["s3".to_string()];
        // AWS_ACCESS_KEY_ID: yes + value; AWS_REGION: yes + empty (default);
        // AWS_SECRET_ACCESS_KEY: no.
        let mut prompter = ScriptedPrompter::new(["y", "AKIA123", "", "", "n"]);

        let summary = manager(&paths).setup(&mut prompter, Some(&scope)).unwrap();

        assert_eq!(summary.set, vec!["AWS_ACCESS_KEY_ID", "AWS_REGION"]);
        let store = EnvStore::load(&paths.env_store_file()).unwrap();
        assert_eq!(store.get("AWS_ACCESS_KEY_ID"), Some("AKIA123"));
        assert_eq!(store.get("AWS_REGION"), Some("us-east-1"));
        assert!(!store.contains("AWS_SECRET_ACCESS_KEY"));
        assert!(paths.activation_sh().exists());
        assert!(paths.activation_bat().exists());
        assert!(paths.activation_ps1().exists());
    }

    #[test]
    #[serial]
    fn stored_values_need_overwrite_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let mut store = EnvStore::default();
        store.set("OPENAI_API_KEY", "old");
        store.save(&paths.env_store_file()).unwrap();

        let scope = vec!["openai".to_string()];
        let mut prompter = ScriptedPrompter::new([""]);
        let summary = manager(&paths).setup(&mut prompter, Some(&scope)).unwrap();

        assert!(summary.set.is_empty());
        assert_eq!(prompter.asked, vec!["OPENAI_API_KEY is already set. Update it?"]);
        assert_eq!(
            EnvStore::load(&paths.env_store_file()).unwrap().get("OPENAI_API_KEY"),
            Some("old")
        );
    }

    #[test]
    #[serial]
    fn empty_answer_without_default_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let scope = vec!["openai".to_string()];
        let mut prompter = ScriptedPrompter::new(["y", ""]);

        let summary = manager(&paths).setup(&mut prompter, Some(&scope)).unwrap();

        assert_eq!(summary.skipped, vec!["OPENAI_API_KEY"]);
        assert!(EnvStore::load(&paths.env_store_file()).unwrap().is_empty());
    }

    #[test]
    #[serial]
    fn apply_then_list_masks_sensitive_values() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let mut store = EnvStore::default();
        store.set("MCP_SETUP_TEST_TOKEN_A", "secret-value-123");
        store.set("AWS_REGION", "eu-west-1");
        store.set("OPENAI_API_KEY", "sk-abcdefghijkl");
        store.save(&paths.env_store_file()).unwrap();

        let m = manager(&paths);
        assert_eq!(m.apply().unwrap(), 3);
        assert_eq!(std::env::var("MCP_SETUP_TEST_TOKEN_A").unwrap(), "secret-value-123");

        let listed = m.listed().unwrap();
        let names: Vec<_> = listed.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["MCP_SETUP_TEST_TOKEN_A", "AWS_REGION", "OPENAI_API_KEY"]);
        assert_eq!(listed[1].display_value, "eu-west-1");
        assert_eq!(listed[2].display_value, "********");
        assert_eq!(listed[2].required_for, vec!["openai"]);

        std::env::remove_var("MCP_SETUP_TEST_TOKEN_A");
        std::env::remove_var("AWS_REGION");
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    fn remove_absent_variable_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let m = manager(&paths);
        assert!(!m.remove("NOPE").unwrap());

        let mut store = EnvStore::default();
        store.set("A", "1");
        store.save(&paths.env_store_file()).unwrap();
        assert!(m.remove("A").unwrap());
        assert!(EnvStore::load(&paths.env_store_file()).unwrap().is_empty());
    }
}
