//! Engine configuration stored at `.looper/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Loop configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LooperConfig {
    /// Planned iteration count per run.
    pub max_iterations: u32,

    /// Session cost ceiling in USD. Unset means unlimited.
    pub max_cost_per_session: Option<f64>,

    /// Per-iteration cost ceiling in USD. Unset means unlimited.
    pub max_cost_per_iteration: Option<f64>,

    /// Wall-clock budget per agent invocation in seconds.
    pub iteration_timeout_secs: u64,

    /// Truncate captured agent stdout/stderr beyond this many bytes.
    pub agent_output_limit_bytes: usize,

    /// Task document path, relative to the project root.
    pub prd_path: String,

    /// Project instructions file checked by preflight.
    pub instructions_path: String,

    /// Agent CLI executable name.
    pub agent_binary: String,

    /// Environment variable whose non-empty value satisfies the credential check.
    pub credential_env: String,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_cost_per_session: None,
            max_cost_per_iteration: None,
            iteration_timeout_secs: 30 * 60,
            agent_output_limit_bytes: 200_000,
            prd_path: "PRD.md".to_string(),
            instructions_path: "CLAUDE.md".to_string(),
            agent_binary: "claude".to_string(),
            credential_env: "ANTHROPIC_API_KEY".to_string(),
        }
    }
}

impl LooperConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.iteration_timeout_secs == 0 {
            return Err(anyhow!("iteration_timeout_secs must be > 0"));
        }
        if self.agent_output_limit_bytes == 0 {
            return Err(anyhow!("agent_output_limit_bytes must be > 0"));
        }
        for (name, ceiling) in [
            ("max_cost_per_session", self.max_cost_per_session),
            ("max_cost_per_iteration", self.max_cost_per_iteration),
        ] {
            if let Some(value) = ceiling
                && !(value.is_finite() && value > 0.0)
            {
                return Err(anyhow!("{name} must be a positive number"));
            }
        }
        for (name, value) in [
            ("prd_path", &self.prd_path),
            ("instructions_path", &self.instructions_path),
            ("agent_binary", &self.agent_binary),
            ("credential_env", &self.credential_env),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{name} must not be empty"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LooperConfig::default()`.
pub fn load_config(path: &Path) -> Result<LooperConfig> {
    if !path.exists() {
        let cfg = LooperConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LooperConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LooperConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, LooperConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = LooperConfig {
            max_iterations: 3,
            max_cost_per_session: Some(25.0),
            ..LooperConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_takes_defaults_for_missing_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_iterations = 2\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_iterations, 2);
        assert_eq!(cfg.prd_path, "PRD.md");
        assert_eq!(cfg.max_cost_per_session, None);
    }

    #[test]
    fn rejects_non_positive_ceilings() {
        let cfg = LooperConfig {
            max_cost_per_session: Some(0.0),
            ..LooperConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("max_cost_per_session"));
    }

    #[test]
    fn rejects_zero_iterations() {
        let cfg = LooperConfig {
            max_iterations: 0,
            ..LooperConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
