//! Path resolution for the per-user MCP directory tree.
//!
//! Uses env vars when set, otherwise `~/.mcp` defaults.

use std::path::{Path, PathBuf};

/// Resolved paths for MCP directories and generated artifacts.
#[derive(Debug, Clone)]
pub struct Paths {
    pub base_dir: PathBuf,
    pub servers_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve paths from environment, falling back to `~/.mcp`.
    pub fn resolve() -> Self {
        let base_dir = resolve_path(
            "MCP_HOME",
            dirs::home_dir().map(|p| p.join(".mcp")),
            "~/.mcp",
        );
        let servers_dir = resolve_path("MCP_SERVERS_DIR", Some(base_dir.join("servers")), "~/.mcp/servers");
        let config_dir = resolve_path("MCP_CONFIG_DIR", Some(base_dir.join("config")), "~/.mcp/config");

        Self {
            base_dir,
            servers_dir,
            config_dir,
        }
    }

    /// Paths rooted at an explicit base directory, ignoring the environment.
    pub fn with_base(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            servers_dir: base_dir.join("servers"),
            config_dir: base_dir.join("config"),
            base_dir,
        }
    }

    /// Create the base, servers and config directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.base_dir, &self.servers_dir, &self.config_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Directory holding source-control clones, one per connector key.
    pub fn servers_dir(&self) -> &Path {
        &self.servers_dir
    }

    /// Clone directory for a connector.
    pub fn clone_dir(&self, key: &str) -> PathBuf {
        self.servers_dir.join(key)
    }

    /// Directory holding generated configuration, logs and reports.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn integration_file(&self) -> PathBuf {
        self.config_dir.join("vscode-mcp-settings.json")
    }

    pub fn env_store_file(&self) -> PathBuf {
        self.config_dir.join("mcp-environment.json")
    }

    pub fn install_log_file(&self) -> PathBuf {
        self.config_dir.join("install-log.txt")
    }

    pub fn test_report_file(&self) -> PathBuf {
        self.config_dir.join("test-report.json")
    }

    pub fn env_template_sh(&self) -> PathBuf {
        self.config_dir.join("environment-template.sh")
    }

    pub fn env_template_bat(&self) -> PathBuf {
        self.config_dir.join("environment-template.bat")
    }

    pub fn activation_sh(&self) -> PathBuf {
        self.config_dir.join("set_mcp_env.sh")
    }

    pub fn activation_bat(&self) -> PathBuf {
        self.config_dir.join("set_mcp_env.bat")
    }

    pub fn activation_ps1(&self) -> PathBuf {
        self.config_dir.join("set_mcp_env.ps1")
    }
}

fn resolve_path(
    env_var: &str,
    default: Option<PathBuf>,
    fallback: &str,
) -> PathBuf {
    if let Ok(val) = std::env::var(env_var) {
        let trimmed = val.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }
    default.unwrap_or_else(|| expand_tilde(fallback))
}

fn expand_tilde(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn mcp_home_overrides_base_dir() {
        std::env::set_var("MCP_HOME", "/tmp/mcp-home-test");
        std::env::remove_var("MCP_SERVERS_DIR");
        std::env::remove_var("MCP_CONFIG_DIR");
        let paths = Paths::resolve();
        std::env::remove_var("MCP_HOME");

        assert_eq!(paths.base_dir, PathBuf::from("/tmp/mcp-home-test"));
        assert_eq!(paths.servers_dir(), Path::new("/tmp/mcp-home-test/servers"));
        assert_eq!(
            paths.integration_file(),
            PathBuf::from("/tmp/mcp-home-test/config/vscode-mcp-settings.json")
        );
    }

    #[test]
    #[serial]
    fn blank_override_is_ignored() {
        std::env::set_var("MCP_CONFIG_DIR", "   ");
        let paths = Paths::with_base("/srv/mcp");
        let resolved = resolve_path("MCP_CONFIG_DIR", Some(paths.config_dir.clone()), "~/.mcp/config");
        std::env::remove_var("MCP_CONFIG_DIR");

        assert_eq!(resolved, PathBuf::from("/srv/mcp/config"));
    }

    #[test]
    fn clone_dir_is_keyed_under_servers() {
        let paths = Paths::with_base("/srv/mcp");
        assert_eq!(paths.clone_dir("github"), PathBuf::from("/srv/mcp/servers/github"));
    }
}
