//! Data structures for the registry file and the client-integration file.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Registry file: `{"servers": {<key>: {...}}}`. Key order is preserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    pub servers: IndexMap<String, ConnectorDescriptor>,
}

/// One connector entry of the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorDescriptor {
    /// Registry key; filled in from the map key when loading.
    #[serde(skip)]
    pub key: String,
    pub name: String,
    pub package: String,
    pub installation_method: InstallMethod,
    pub category: String,
    pub description: String,
    pub repository: String,
    pub requires_api_key: bool,
    #[serde(default)]
    pub config_required: Vec<String>,
}

/// Install method tag as written in the registry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    Npm,
    Pip,
    Git,
    Go,
    Unity,
}

impl InstallMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallMethod::Npm => "npm",
            InstallMethod::Pip => "pip",
            InstallMethod::Git => "git",
            InstallMethod::Go => "go",
            InstallMethod::Unity => "unity",
        }
    }
}

impl std::fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-integration file written by the emitter and read by the tester.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: IndexMap<String, IntegrationEntry>,
}

/// How a client launches one connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEntry {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Variable name to value; `"$NAME"` placeholders are resolved at launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<IndexMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_entry_parses_with_key_order_kept() {
        let json = r#"{
            "servers": {
                "zeta": {"name": "Zeta", "package": "@z/zeta", "installation_method": "npm",
                         "category": "AI", "description": "z", "repository": "https://example.com/z",
                         "requires_api_key": true, "config_required": ["Z_KEY"]},
                "alpha": {"name": "Alpha", "package": "alpha", "installation_method": "unity",
                          "category": "Games", "description": "a", "repository": "https://example.com/a",
                          "requires_api_key": false}
            }
        }"#;
        let file: RegistryFile = serde_json::from_str(json).unwrap();
        let keys: Vec<_> = file.servers.keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(file.servers["zeta"].installation_method, InstallMethod::Npm);
        assert!(file.servers["alpha"].config_required.is_empty());
    }

    #[test]
    fn unknown_install_method_is_rejected() {
        let json = r#"{"name": "X", "package": "x", "installation_method": "cargo",
                       "category": "c", "description": "d", "repository": "r",
                       "requires_api_key": false}"#;
        assert!(serde_json::from_str::<ConnectorDescriptor>(json).is_err());
    }

    #[test]
    fn integration_entry_omits_empty_env() {
        let entry = IntegrationEntry {
            command: "npx".into(),
            args: vec!["pkg".into()],
            env: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("env").is_none());
    }
}
