//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MIMESHELL_CONFIG` (environment variable)
//! 2. `~/.config/mimeshell/config.toml` (Linux/macOS)
//!    `%APPDATA%\mimeshell\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::attachment::AttachmentEncoding;
use crate::parser::options::{ParseOptions, DEFAULT_MAX_HEADERS_SIZE, DEFAULT_MAX_NESTING_DEPTH};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Parser limits and output choices.
    pub parser: ParserConfig,
    /// Export defaults.
    pub export: ExportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Parser settings, mirrored by [`ParseOptions`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub max_nesting_depth: u32,
    pub max_headers_size: usize,
    /// "arraybuffer", "base64" or "utf8".
    pub attachment_encoding: String,
    pub rfc822_attachments: bool,
    pub force_rfc822_attachments: bool,
}

/// Export defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default output directory for extracted attachments.
    pub default_output_dir: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_headers_size: DEFAULT_MAX_HEADERS_SIZE,
            attachment_encoding: AttachmentEncoding::default().to_string(),
            rfc822_attachments: false,
            force_rfc822_attachments: false,
        }
    }
}

impl Config {
    /// Build parse options from the `[parser]` section.
    ///
    /// Fails on an unknown `attachment_encoding`.
    pub fn parse_options(&self) -> Result<ParseOptions> {
        let parser = &self.parser;
        Ok(ParseOptions {
            max_nesting_depth: parser.max_nesting_depth,
            max_headers_size: parser.max_headers_size,
            attachment_encoding: parser.attachment_encoding.parse()?,
            rfc822_attachments: parser.rfc822_attachments,
            force_rfc822_attachments: parser.force_rfc822_attachments,
        })
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MIMESHELL_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mimeshell").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mimeshell")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mimeshell.log")
}
