// File: src/config.rs
// Purpose: Router configuration, optionally read from the [router] table of rhtmx.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Options controlling how one template compiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathParserOptions {
    /// Match case-sensitively
    pub sensitive: bool,
    /// Treat a trailing slash as significant
    pub strict: bool,
    /// Anchor the match at the end of the path
    pub end: bool,
}

impl Default for PathParserOptions {
    fn default() -> Self {
        Self {
            sensitive: false,
            strict: false,
            end: true,
        }
    }
}

/// Router-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Case-sensitive matching for every record (default: false)
    #[serde(default = "default_false")]
    pub sensitive: bool,

    /// Trailing slash is significant (default: false)
    #[serde(default = "default_false")]
    pub strict: bool,

    /// Templates must match the whole path (default: true)
    #[serde(default = "default_true")]
    pub end: bool,

    /// Prefix of every href (e.g., "/app")
    #[serde(default)]
    pub base: String,

    /// Redirect hops allowed in one navigation before it fails
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

/// Layout of a config file: router settings live under `[router]`
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    router: RouterConfig,
}

// Default values
fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_max_redirects() -> usize {
    30
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            sensitive: false,
            strict: false,
            end: true,
            base: String::new(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl RouterConfig {
    /// Parses the `[router]` table of a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let file: ConfigFile = toml::from_str(content).context("Failed to parse router config")?;
        Ok(file.router)
    }

    /// Load configuration from a TOML file; a missing or empty file yields defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load configuration from default path (./rhtmx.toml)
    pub fn load_default() -> Result<Self> {
        Self::load("rhtmx.toml")
    }

    pub fn parser_options(&self) -> PathParserOptions {
        PathParserOptions {
            sensitive: self.sensitive,
            strict: self.strict,
            end: self.end,
        }
    }
}
