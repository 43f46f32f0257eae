//! Operator configuration loaded from `hotfix.toml` and the environment

use crate::{CliError, Result};
use hf_interpret::EvalOptions;
use hf_patch::ApplyOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `server.listen` when set to a non-empty value.
pub const LISTEN_ADDR_ENV: &str = "LISTEN_ADDR";
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3333";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotfixConfig {
    pub server: ServerConfig,
    pub interpreter: InterpreterConfig,
    pub scripts: ScriptsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the shell listens on
    pub listen: String,

    /// Close shell sessions idle for this long; 0 keeps them open
    pub session_idle_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    pub max_steps: u64,
    pub max_call_depth: usize,

    /// Wall-clock budget per hotfix; 0 disables the deadline
    pub eval_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// When set, scripts are resolved against this directory and must live under it
    pub root: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            session_idle_timeout_secs: 600,
        }
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        let eval = EvalOptions::default();
        Self {
            max_steps: eval.max_steps,
            max_call_depth: eval.max_call_depth,
            eval_timeout_ms: 5_000,
        }
    }
}

impl HotfixConfig {
    /// Load configuration from `config_path`, or from the first config file found in the
    /// standard locations, then apply environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::discover(&Self::search_paths())?,
        };
        config.apply_env(std::env::var(LISTEN_ADDR_ENV).ok());
        Ok(config)
    }

    /// `./hotfix.toml`, `~/.hotfix.toml`, then `<config dir>/hotfix/config.toml`.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("hotfix.toml")];
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".hotfix.toml"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("hotfix").join("config.toml"));
        }
        paths
    }

    /// The first existing file in `paths`, or the defaults when there is none. A file
    /// that exists but does not parse is an error.
    pub fn discover(paths: &[PathBuf]) -> Result<Self> {
        match paths.iter().find(|path| path.is_file()) {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file; missing keys keep their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| CliError::Config(format!("Failed to parse config file {}: {}", path.display(), e)))
    }

    pub fn apply_env(&mut self, listen: Option<String>) {
        if let Some(listen) = listen.filter(|addr| !addr.trim().is_empty()) {
            self.server.listen = listen.trim().to_string();
        }
    }

    pub fn apply_options(&self) -> ApplyOptions {
        let options = ApplyOptions {
            max_steps: self.interpreter.max_steps,
            max_call_depth: self.interpreter.max_call_depth,
            timeout: None,
        };
        match self.interpreter.eval_timeout_ms {
            0 => options,
            ms => options.with_timeout(Duration::from_millis(ms)),
        }
    }

    pub fn session_idle_timeout(&self) -> Option<Duration> {
        match self.server.session_idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Map a script argument to the file to load. With `scripts.root` set, relative
    /// paths are taken from the root and anything resolving outside of it is refused.
    pub fn resolve_script(&self, script: &Path) -> Result<PathBuf> {
        let Some(root) = &self.scripts.root else {
            return Ok(script.to_path_buf());
        };
        let candidate = root.join(script);
        let canonical = candidate.canonicalize().map_err(|source| hf_core::Error::Io {
            path: candidate.clone(),
            source,
        })?;
        let root = root.canonicalize().map_err(|e| {
            CliError::Config(format!("scripts root {} is not usable: {}", root.display(), e))
        })?;
        if !canonical.starts_with(&root) {
            return Err(CliError::InvalidInput(format!(
                "script {} is outside the scripts root {}",
                script.display(),
                root.display()
            )));
        }
        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = HotfixConfig::default();
        assert_eq!(config.server.listen, DEFAULT_LISTEN);
        assert_eq!(config.interpreter.max_steps, EvalOptions::default().max_steps);
        assert_eq!(config.scripts.root, None);
        assert_eq!(config.apply_options().timeout, Some(Duration::from_millis(5_000)));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = HotfixConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(toml::from_str::<HotfixConfig>(&text).unwrap(), config);
    }

    #[test]
    fn zero_disables_limits() {
        let mut config = HotfixConfig::default();
        config.interpreter.eval_timeout_ms = 0;
        config.server.session_idle_timeout_secs = 0;
        assert_eq!(config.apply_options().timeout, None);
        assert_eq!(config.session_idle_timeout(), None);
    }
}
