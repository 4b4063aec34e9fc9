//! Server registry: the connector catalog loaded from a JSON file or URL.

use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;

use crate::models::{ConnectorDescriptor, InstallMethod, RegistryFile};

/// Loaded catalog of connectors, in file order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    servers: IndexMap<String, ConnectorDescriptor>,
}

impl Registry {
    pub fn from_file(file: RegistryFile) -> Self {
        let servers = file
            .servers
            .into_iter()
            .map(|(key, mut descriptor)| {
                descriptor.key = key.clone();
                (key, descriptor)
            })
            .collect();
        Self { servers }
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(json).map_err(RegistryError::Parse)?;
        Ok(Self::from_file(file))
    }

    /// Load from a local path.
    pub fn load_path(path: &Path) -> Result<Self, RegistryError> {
        if !path.exists() {
            return Err(RegistryError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path).map_err(RegistryError::Read)?;
        let registry = Self::from_json(&content)?;
        log::debug!("Loaded {} connectors from {}", registry.len(), path.display());
        Ok(registry)
    }

    /// Load from a local path or an `http(s)://` URL.
    pub async fn load(location: &str) -> Result<Self, RegistryError> {
        if is_url(location) {
            Self::fetch(location).await
        } else {
            Self::load_path(Path::new(location))
        }
    }

    async fn fetch(url: &str) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent("mcp-setup/1.0")
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(RegistryError::HttpClient)?;

        let resp = client.get(url).send().await.map_err(|e| RegistryError::FetchFailed {
            url: url.to_string(),
            cause: e,
        })?;
        let resp = resp.error_for_status().map_err(|e| RegistryError::FetchFailed {
            url: url.to_string(),
            cause: e,
        })?;
        let body = resp.text().await.map_err(|e| RegistryError::FetchFailed {
            url: url.to_string(),
            cause: e,
        })?;
        let registry = Self::from_json(&body)?;
        log::debug!("Fetched {} connectors from {}", registry.len(), url);
        Ok(registry)
    }

    pub fn get(&self, key: &str) -> Option<&ConnectorDescriptor> {
        self.servers.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.servers.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectorDescriptor> {
        self.servers.values()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Connectors matching the selection, in registry order.
    pub fn select<'a>(&'a self, selection: &'a Selection) -> impl Iterator<Item = &'a ConnectorDescriptor> + 'a {
        self.iter().filter(move |d| selection.matches(d))
    }

    /// Display name for a key, falling back to the key itself.
    pub fn display_name(&self, key: &str) -> String {
        self.get(key).map(|d| d.name.clone()).unwrap_or_else(|| key.to_string())
    }
}

/// Optional method and key filters applied to the registry.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub methods: Option<Vec<InstallMethod>>,
    pub keys: Option<Vec<String>>,
}

impl Selection {
    pub fn new(method: Option<InstallMethod>, keys: Option<&str>) -> Self {
        Self {
            methods: method.map(|m| vec![m]),
            keys: keys.map(parse_key_list),
        }
    }

    pub fn matches(&self, descriptor: &ConnectorDescriptor) -> bool {
        if let Some(methods) = &self.methods {
            if !methods.contains(&descriptor.installation_method) {
                return false;
            }
        }
        self.matches_key(&descriptor.key)
    }

    pub fn matches_key(&self, key: &str) -> bool {
        match &self.keys {
            Some(keys) => keys.iter().any(|k| k == key),
            None => true,
        }
    }
}

/// Split a comma-separated key list, trimming blanks.
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry file not found: {0}")]
    NotFound(String),
    #[error("Failed to read registry file: {0}")]
    Read(std::io::Error),
    #[error("Malformed registry file: {0}")]
    Parse(serde_json::Error),
    #[error("HTTP client error: {0}")]
    HttpClient(reqwest::Error),
    #[error("Failed to fetch {url}: {cause}")]
    FetchFailed { url: String, cause: reqwest::Error },
}
