//! Editor integration file (`vscode-mcp-settings.json`).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use console::style;
use indexmap::IndexMap;

use crate::models::{ConnectorDescriptor, InstallMethod, IntegrationConfig, IntegrationEntry};
use crate::paths::Paths;
use crate::registry::Registry;

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("Integration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("Failed to serialize integration file: {0}")]
    Serialize(serde_json::Error),
    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: std::io::Error },
}

/// Build entries for every registry connector in `succeeded`, in registry
/// order. Connectors without a derivable launch command are left out.
pub fn build_integration(registry: &Registry, succeeded: &HashSet<String>, paths: &Paths) -> IntegrationConfig {
    let mut config = IntegrationConfig::default();
    for descriptor in registry.iter().filter(|d| succeeded.contains(&d.key)) {
        match entry_for(descriptor, paths) {
            Some(entry) => {
                config.mcp_servers.insert(descriptor.key.clone(), entry);
            }
            None => log::debug!("no launch command for {}, omitted", descriptor.key),
        }
    }
    config
}

/// Launch command for one installed connector.
pub fn entry_for(descriptor: &ConnectorDescriptor, paths: &Paths) -> Option<IntegrationEntry> {
    let (command, args) = match descriptor.installation_method {
        InstallMethod::Npm => ("npx".to_string(), vec![descriptor.package.clone()]),
        InstallMethod::Pip => ("python".to_string(), vec!["-m".to_string(), descriptor.package.clone()]),
        InstallMethod::Git => clone_entry_point(&paths.clone_dir(&descriptor.key))?,
        InstallMethod::Go => {
            let binary = which::which(go_binary_name(&descriptor.package)).ok()?;
            (binary.to_string_lossy().to_string(), Vec::new())
        }
        InstallMethod::Unity => return None,
    };

    let env = if descriptor.config_required.is_empty() {
        None
    } else {
        Some(
            descriptor
                .config_required
                .iter()
                .map(|var| (var.clone(), format!("${var}")))
                .collect::<IndexMap<_, _>>(),
        )
    };

    Some(IntegrationEntry { command, args, env })
}

/// Binary name `go install` produces: last path segment, version stripped.
pub fn go_binary_name(package: &str) -> &str {
    let last = package.rsplit('/').next().unwrap_or(package);
    last.split('@').next().unwrap_or(last)
}

/// Node entry from `package.json` (`main`, default `index.js`), else `main.py`.
fn clone_entry_point(dir: &Path) -> Option<(String, Vec<String>)> {
    let manifest = dir.join("package.json");
    if manifest.exists() {
        let main = std::fs::read_to_string(&manifest)
            .ok()
            .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).ok())
            .and_then(|v| v.get("main").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| "index.js".to_string());
        return Some(("node".to_string(), vec![dir.join(main).to_string_lossy().to_string()]));
    }
    let main_py = dir.join("main.py");
    if main_py.exists() {
        return Some(("python".to_string(), vec![main_py.to_string_lossy().to_string()]));
    }
    None
}

pub fn write_integration(path: &Path, config: &IntegrationConfig) -> Result<(), EmitError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| EmitError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let output = serde_json::to_string_pretty(config).map_err(EmitError::Serialize)?;
    std::fs::write(path, output).map_err(|source| EmitError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_integration(path: &Path) -> Result<IntegrationConfig, EmitError> {
    if !path.exists() {
        return Err(EmitError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| EmitError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| EmitError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Build and persist the integration file for the succeeded connectors.
pub fn emit(registry: &Registry, succeeded: &HashSet<String>, paths: &Paths) -> Result<IntegrationConfig, EmitError> {
    println!("{}", style("\nGenerating editor configuration...").yellow().bold());
    let config = build_integration(registry, succeeded, paths);
    let path = paths.integration_file();
    write_integration(&path, &config)?;
    println!(
        "{}",
        style(format!("Saved {} entries to: {}", config.mcp_servers.len(), path.display())).green()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"{"servers": {
        "alpha": {"name": "Alpha", "package": "@acme/alpha", "installation_method": "npm", "category": "c",
                  "description": "d", "repository": "r", "requires_api_key": true, "config_required": ["ALPHA_KEY"]},
        "py": {"name": "Py", "package": "mcp_server_py", "installation_method": "pip", "category": "c",
               "description": "d", "repository": "r", "requires_api_key": false},
        "node-clone": {"name": "Node", "package": "", "installation_method": "git", "category": "c",
                       "description": "d", "repository": "r", "requires_api_key": false},
        "py-clone": {"name": "PyClone", "package": "", "installation_method": "git", "category": "c",
                     "description": "d", "repository": "r", "requires_api_key": false},
        "bare-clone": {"name": "Bare", "package": "", "installation_method": "git", "category": "c",
                       "description": "d", "repository": "r", "requires_api_key": false},
        "gobin": {"name": "Go", "package": "example.com/tools/not-a-real-binary-9c1e@v1.2.0",
                  "installation_method": "go", "category": "c", "description": "d", "repository": "r",
                  "requires_api_key": false},
        "beta": {"name": "Beta", "package": "beta", "installation_method": "unity", "category": "c",
                 "description": "d", "repository": "r", "requires_api_key": false}
    }}"#;

    fn all_keys(registry: &Registry) -> HashSet<String> {
        registry.iter().map(|d| d.key.clone()).collect()
    }

    #[test]
    fn entries_follow_install_method() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let registry = Registry::from_json(REGISTRY).unwrap();

        let node_dir = paths.clone_dir("node-clone");
        std::fs::create_dir_all(&node_dir).unwrap();
        std::fs::write(node_dir.join("package.json"), r#"{"main": "dist/server.js"}"#).unwrap();
        let py_dir = paths.clone_dir("py-clone");
        std::fs::create_dir_all(&py_dir).unwrap();
        std::fs::write(py_dir.join("main.py"), "").unwrap();
        std::fs::create_dir_all(paths.clone_dir("bare-clone")).unwrap();

        let config = build_integration(&registry, &all_keys(&registry), &paths);
        let keys: Vec<_> = config.mcp_servers.keys().cloned().collect();
        assert_eq!(keys, vec!["alpha", "py", "node-clone", "py-clone"]);

        let alpha = &config.mcp_servers["alpha"];
        assert_eq!(alpha.command, "npx");
        assert_eq!(alpha.args, vec!["@acme/alpha"]);
        assert_eq!(alpha.env.as_ref().unwrap()["ALPHA_KEY"], "$ALPHA_KEY");

        let py = &config.mcp_servers["py"];
        assert_eq!((py.command.as_str(), py.args.clone()), ("python", vec!["-m".to_string(), "mcp_server_py".to_string()]));
        assert!(py.env.is_none());

        let node = &config.mcp_servers["node-clone"];
        assert_eq!(node.command, "node");
        assert_eq!(node.args, vec![node_dir.join("dist/server.js").to_string_lossy().to_string()]);

        assert_eq!(config.mcp_servers["py-clone"].command, "python");
    }

    #[test]
    fn only_succeeded_connectors_are_emitted() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let registry = Registry::from_json(REGISTRY).unwrap();

        let succeeded = HashSet::from(["py".to_string(), "beta".to_string()]);
        let config = build_integration(&registry, &succeeded, &paths);
        assert_eq!(config.mcp_servers.keys().collect::<Vec<_>>(), vec!["py"]);
    }

    #[test]
    fn go_binary_name_strips_path_and_version() {
        assert_eq!(go_binary_name("github.com/acme/tools/mcp-thing@latest"), "mcp-thing");
        assert_eq!(go_binary_name("mcp-thing"), "mcp-thing");
    }

    #[cfg(unix)]
    #[test]
    fn go_binary_resolved_on_path() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let registry = Registry::from_json(
            r#"{"servers": {"gosh": {"name": "Sh", "package": "example.com/x/sh@v1", "installation_method": "go",
                "category": "c", "description": "d", "repository": "r", "requires_api_key": false}}}"#,
        )
        .unwrap();
        let entry = entry_for(registry.get("gosh").unwrap(), &paths).unwrap();
        assert!(entry.command.ends_with("/sh"));
        assert!(entry.args.is_empty());
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path());
        let registry = Registry::from_json(REGISTRY).unwrap();

        assert!(matches!(load_integration(&paths.integration_file()), Err(EmitError::NotFound(_))));

        let config = emit(&registry, &HashSet::from(["alpha".to_string()]), &paths).unwrap();
        let loaded = load_integration(&paths.integration_file()).unwrap();
        assert_eq!(loaded, config);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(paths.integration_file()).unwrap()).unwrap();
        assert_eq!(raw["mcpServers"]["alpha"]["command"], "npx");
    }
}
