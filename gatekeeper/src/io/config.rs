//! Gatekeeper configuration stored under `<data>/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::GateMode;
use crate::io::atomic::write_atomic;

/// Env var overriding `gates.hydration`.
pub const HYDRATION_MODE_ENV: &str = "HYDRATION_GATE_MODE";
/// Env var overriding `gates.task_binding`.
pub const TASK_MODE_ENV: &str = "TASK_GATE_MODE";
/// Env var overriding `gates.custodiet`.
pub const CUSTODIET_MODE_ENV: &str = "CUSTODIET_MODE";
/// Env var overriding `gates.critic`.
pub const CRITIC_MODE_ENV: &str = "CRITIC_GATE_MODE";

/// Gatekeeper configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to the
/// values below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Default per-gate evaluation budget in milliseconds.
    pub gate_timeout_ms: u64,

    /// How long SessionEnd waits for in-flight events of the same session.
    pub drain_timeout_ms: u64,

    /// Attempts for enforcer-driven task updates that hit a version conflict.
    pub update_retries: u32,

    /// Prose line limit for markdown writes (fenced code excluded).
    pub docs_max_prose_lines: usize,

    /// Tool calls allowed between custodiet compliance checks.
    pub custodiet_threshold: u32,

    pub gates: GateConfig,
    pub tools: ToolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GateConfig {
    pub hydration: GateMode,
    pub task_binding: GateMode,
    pub destructive_command: GateMode,
    pub minimal_docs: GateMode,
    pub handover: GateMode,
    pub custodiet: GateMode,
    pub critic: GateMode,

    /// Per-gate budget overrides keyed by gate id.
    pub budgets_ms: BTreeMap<String, u64>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            hydration: GateMode::Block,
            task_binding: GateMode::Warn,
            destructive_command: GateMode::Block,
            minimal_docs: GateMode::Block,
            handover: GateMode::Warn,
            custodiet: GateMode::Warn,
            critic: GateMode::Warn,
            budgets_ms: BTreeMap::new(),
        }
    }
}

/// Extra tool names on top of the built-in category tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    pub read_only: Vec<String>,
    pub meta: Vec<String>,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            gate_timeout_ms: 2_000,
            drain_timeout_ms: 5_000,
            update_retries: 3,
            docs_max_prose_lines: 200,
            custodiet_threshold: 7,
            gates: GateConfig::default(),
            tools: ToolConfig::default(),
        }
    }
}

impl GatekeeperConfig {
    pub fn validate(&self) -> Result<()> {
        if self.gate_timeout_ms == 0 {
            return Err(anyhow!("gate_timeout_ms must be > 0"));
        }
        if self.drain_timeout_ms == 0 {
            return Err(anyhow!("drain_timeout_ms must be > 0"));
        }
        if self.update_retries == 0 {
            return Err(anyhow!("update_retries must be > 0"));
        }
        if self.docs_max_prose_lines == 0 {
            return Err(anyhow!("docs_max_prose_lines must be > 0"));
        }
        if self.custodiet_threshold == 0 {
            return Err(anyhow!("custodiet_threshold must be > 0"));
        }
        if let Some((gate, _)) = self.gates.budgets_ms.iter().find(|(_, ms)| **ms == 0) {
            return Err(anyhow!("gates.budgets_ms.{gate} must be > 0"));
        }
        if let Some(name) = self
            .tools
            .read_only
            .iter()
            .chain(&self.tools.meta)
            .find(|name| name.trim().is_empty())
        {
            return Err(anyhow!("tools entries must be non-empty (got {name:?})"));
        }
        Ok(())
    }

    /// Apply the gate mode env vars (`HYDRATION_GATE_MODE`, `TASK_GATE_MODE`,
    /// `CUSTODIET_MODE`, `CRITIC_GATE_MODE`) from `lookup`.
    ///
    /// Unset or blank values leave the file setting in place.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides = [
            (HYDRATION_MODE_ENV, &mut self.gates.hydration),
            (TASK_MODE_ENV, &mut self.gates.task_binding),
            (CUSTODIET_MODE_ENV, &mut self.gates.custodiet),
            (CRITIC_MODE_ENV, &mut self.gates.critic),
        ];
        for (var, slot) in overrides {
            let Some(raw) = lookup(var).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let mode: GateMode = raw.parse().map_err(|err| anyhow!("{var}: {err}"))?;
            debug!(var, mode = %mode, "gate mode overridden from environment");
            *slot = mode;
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `GatekeeperConfig::default()`.
pub fn load_config(path: &Path) -> Result<GatekeeperConfig> {
    if !path.exists() {
        let cfg = GatekeeperConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GatekeeperConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &GatekeeperConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, buf.as_bytes()).with_context(|| format!("write config {}", path.display()))
}
