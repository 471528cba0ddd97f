use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::pipeline::{UpliftPolicy, DEFAULT_MAX_BUILD_RETRIES};

pub const CONFIG_FILE: &str = "workflow-forge.toml";
pub const RC_FILE: &str = ".workflow-forge-rc";
pub const ENV_PREFIX: &str = "WORKFLOW_FORGE";

/// Main configuration structure for Workflow Forge
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// State machine behavior
    pub pipeline: PipelineConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Build attempts allowed before the caller must divert to error handling
    pub max_build_retries: u32,
    /// Whether uplift may proceed without a confirmed understanding
    pub uplift_policy: UpliftPolicy,
    /// Extra credential spellings, keyed by canonical name
    pub credential_aliases: BTreeMap<String, Vec<String>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_build_retries: DEFAULT_MAX_BUILD_RETRIES,
            uplift_policy: UpliftPolicy::Lenient,
            credential_aliases: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or filter directive, overridden by RUST_LOG
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,
    /// Log the metrics summary when the CLI exits
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: true,
            metrics_enabled: false,
        }
    }
}

impl ForgeConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (workflow-forge.toml, .workflow-forge-rc)
    /// 3. Environment variables (WORKFLOW_FORGE_PIPELINE__MAX_BUILD_RETRIES etc.)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new(CONFIG_FILE).exists() {
            builder = builder.add_source(File::new(CONFIG_FILE, FileFormat::Toml));
        }

        if Path::new(RC_FILE).exists() {
            builder = builder.add_source(File::new(RC_FILE, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load a single TOML file on top of the defaults
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<ForgeConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = ForgeConfig::load_env_file();
        ForgeConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ForgeConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (call this early in main)
pub fn init_config() -> Result<&'static ForgeConfig> {
    let config = config()?;
    tracing::info!(
        max_build_retries = config.pipeline.max_build_retries,
        uplift_policy = ?config.pipeline.uplift_policy,
        "Configuration loaded successfully"
    );
    Ok(config)
}
