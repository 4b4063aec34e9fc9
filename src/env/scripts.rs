//! Generated shell artifacts: activation scripts from the store, and the
//! commented environment template from the registry.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::env::store::EnvStore;
use crate::paths::Paths;
use crate::registry::Registry;

/// Write `set_mcp_env.{sh,bat,ps1}`. Returns the written paths.
pub fn write_activation_scripts(paths: &Paths, store: &EnvStore) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(paths.config_dir())?;

    let sh = paths.activation_sh();
    std::fs::write(&sh, render_sh(store))?;
    make_executable(&sh)?;

    let bat = paths.activation_bat();
    std::fs::write(&bat, render_bat(store))?;

    let ps1 = paths.activation_ps1();
    std::fs::write(&ps1, render_ps1(store))?;

    log::debug!("activation scripts written to {}", paths.config_dir().display());
    Ok(vec![sh, bat, ps1])
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

pub fn render_sh(store: &EnvStore) -> String {
    let mut out = String::from("#!/bin/bash\n# MCP server environment variables\n# Usage: source set_mcp_env.sh\n\n");
    for (name, value) in store.iter() {
        out.push_str(&format!("export {}=\"{}\"\n", name, escape_sh(value)));
    }
    out.push_str("\necho \"MCP environment variables set\"\n");
    out.push_str("echo \"Restart your editor for the changes to take effect\"\n");
    out
}

pub fn render_bat(store: &EnvStore) -> String {
    let mut out = String::from("@echo off\nREM MCP server environment variables\nREM Run this script to set them\n\n");
    for (name, value) in store.iter() {
        out.push_str(&format!("set \"{}={}\"\n", name, value.replace('%', "%%")));
    }
    out.push_str("\necho MCP environment variables set\n");
    out.push_str("echo Restart your editor for the changes to take effect\n");
    out
}

pub fn render_ps1(store: &EnvStore) -> String {
    let mut out = String::from("# MCP server environment variables\n# Usage: .\\set_mcp_env.ps1\n\n");
    for (name, value) in store.iter() {
        out.push_str(&format!("$env:{} = \"{}\"\n", name, escape_ps1(value)));
    }
    out.push_str("\nWrite-Host \"MCP environment variables set\"\n");
    out.push_str("Write-Host \"Restart your editor for the changes to take effect\"\n");
    out
}

// Inside double quotes: backslash, dollar, backtick and quote are special.
fn escape_sh(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_ps1(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '`' | '"' | '$') {
            out.push('`');
        }
        out.push(c);
    }
    out
}

/// Required variables of every registry connector, grouped by category in
/// registry order, each listed once per category.
pub fn template_groups(registry: &Registry) -> IndexMap<String, Vec<String>> {
    let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
    for descriptor in registry.iter() {
        if descriptor.config_required.is_empty() {
            continue;
        }
        let vars = groups.entry(descriptor.category.clone()).or_default();
        for name in &descriptor.config_required {
            if !vars.contains(name) {
                vars.push(name.clone());
            }
        }
    }
    groups
}

pub fn render_template_sh(registry: &Registry) -> String {
    let mut lines = vec![
        "# MCP server environment variables".to_string(),
        "# Set the variables your connectors need\n".to_string(),
    ];
    for (category, vars) in template_groups(registry) {
        lines.push(format!("# === {} ===", category));
        for var in vars {
            lines.push(format!("# export {}=your_value_here", var));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn render_template_bat(registry: &Registry) -> String {
    render_template_sh(registry)
        .lines()
        .map(|line| match line.strip_prefix("# export ") {
            Some(rest) => format!("REM set {}", rest),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write `environment-template.{sh,bat}`.
pub fn write_env_templates(paths: &Paths, registry: &Registry) -> std::io::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(paths.config_dir())?;
    let sh = paths.env_template_sh();
    std::fs::write(&sh, render_template_sh(registry))?;
    let bat = paths.env_template_bat();
    std::fs::write(&bat, render_template_bat(registry))?;
    Ok((sh, bat))
}
