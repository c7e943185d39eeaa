use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use handover_provider::LlmConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    pub name: String,
    pub env: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "handover".to_string(),
            env: "dev".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    pub token_ttl_hours: i64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self { token_ttl_hours: 24 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsSection {
    pub queue_capacity: usize,
}

impl Default for JobsSection {
    fn default() -> Self {
        Self { queue_capacity: 32 }
    }
}

fn default_snapshot_interval() -> usize {
    5
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Auto-snapshot every Nth user message.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: usize,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub jobs: JobsSection,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            server: ServerSection::default(),
            data_dir: default_data_dir(),
            llm: LlmConfig::default(),
            snapshot_interval: default_snapshot_interval(),
            auth: AuthSection::default(),
            jobs: JobsSection::default(),
        }
    }
}

/// Load `main.yaml` from a config directory. A missing file yields defaults
/// (stub LLM, local data dir) so tests and `validate` run without setup.
pub fn load_config(config_dir: &Path) -> Result<MainConfig> {
    let path = config_dir.join("main.yaml");
    if !path.exists() {
        return Ok(MainConfig::default());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: MainConfig =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use handover_provider::ProviderKind;
    use tempfile::TempDir;

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.snapshot_interval, 5);
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.llm.provider, ProviderKind::Stub);
    }

    #[test]
    fn parses_partial_yaml() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("main.yaml"),
            "app:\n  name: handover\n  env: prod\nserver:\n  host: 0.0.0.0\n  port: 8080\nsnapshot_interval: 3\nllm:\n  provider: gemini\n  api_key: k\n  model: gemini-2.0-flash\n",
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.app.env, "prod");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.snapshot_interval, 3);
        assert_eq!(config.llm.provider, ProviderKind::Gemini);
        // Unspecified sections keep defaults.
        assert_eq!(config.jobs.queue_capacity, 32);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("main.yaml"), "server: [not, a, map]").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }
}
