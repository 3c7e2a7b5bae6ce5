use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;

/// Top-level configuration, loaded from rnvml.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NvmlConfig {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub init: InitConfig,
    #[serde(default)]
    pub events: EventConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directories searched before the platform defaults
    #[serde(default)]
    pub search_paths: Vec<String>,
    /// Library file names (None = platform defaults)
    pub names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitConfig {
    /// Flags passed to nvmlInitWithFlags
    #[serde(default)]
    pub flags: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Timeout used by event waits when the caller does not supply one
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u32,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
        }
    }
}

impl NvmlConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|source| CoreError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                debug!("using default configuration ({})", e);
                Self::default()
            }
        }
    }
}

impl LibraryConfig {
    /// Ordered list of library paths/names to try when opening NVML.
    ///
    /// Order: `RNVML_LIBRARY_PATH`, then every configured directory joined
    /// with every file name, then the bare file names (system search path).
    pub fn candidates(&self) -> Vec<String> {
        let env_override = std::env::var(rnvml_common::platform::LIBRARY_PATH_ENV).ok();
        self.candidates_with_override(env_override.as_deref())
    }

    pub fn candidates_with_override(&self, env_override: Option<&str>) -> Vec<String> {
        let mut candidates = Vec::new();

        if let Some(path) = env_override.filter(|p| !p.is_empty()) {
            candidates.push(path.to_string());
        }

        let names: Vec<String> = match &self.names {
            Some(names) => names.clone(),
            None => rnvml_common::platform::library_file_names()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        for dir in &self.search_paths {
            for name in &names {
                candidates.push(Path::new(dir).join(name).display().to_string());
            }
        }

        match &self.names {
            Some(names) => candidates.extend(names.iter().cloned()),
            None => candidates.extend(rnvml_common::platform::default_library_candidates()),
        }

        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.clone()));
        candidates
    }
}

/// Returns the default config file path based on platform conventions.
/// Search order:
/// 1. System-wide config: `%PROGRAMDATA%\rnvml\rnvml.toml` (Windows) or `/etc/rnvml/rnvml.toml`
/// 2. Local fallback: `./rnvml.toml`
pub fn default_config_path() -> String {
    #[cfg(windows)]
    {
        let programdata = std::env::var("PROGRAMDATA")
            .unwrap_or_else(|_| r"C:\ProgramData".to_string());
        let system_path = format!(r"{}\rnvml\rnvml.toml", programdata);
        if Path::new(&system_path).exists() {
            return system_path;
        }
    }
    #[cfg(not(windows))]
    {
        let system_path = "/etc/rnvml/rnvml.toml";
        if Path::new(system_path).exists() {
            return system_path.to_string();
        }
    }
    "rnvml.toml".to_string()
}

fn default_timeout_ms() -> u32 {
    1000
}
