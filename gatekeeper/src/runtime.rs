//! Wiring for one data directory: config, stores, gates, router, enforcer.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::core::tools::ToolCatalog;
use crate::core::verdict::Verdict;
use crate::enforcer::{EnforcerOptions, PolicyEnforcer};
use crate::error::RouteError;
use crate::gates::default_registry;
use crate::io::audit::AuditLog;
use crate::io::config::{GatekeeperConfig, load_config};
use crate::io::paths::DataPaths;
use crate::io::session_store::SessionStore;
use crate::io::task_store::TaskStore;
use crate::router::Router;

#[derive(Debug)]
pub struct Runtime {
    config: GatekeeperConfig,
    router: Router,
    enforcer: PolicyEnforcer,
}

impl Runtime {
    /// Load config (file, then the gate mode env vars) and
    /// open the stores under `root`. `config_path` defaults to
    /// `<root>/config.toml`.
    pub fn open(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let paths = DataPaths::new(root);
        let config_path = config_path.unwrap_or(&paths.config_path);
        let mut config = load_config(config_path)?;
        config.apply_env_overrides(|var| std::env::var(var).ok())?;
        Self::with_config(paths, config)
    }

    pub fn with_config(paths: DataPaths, config: GatekeeperConfig) -> Result<Self> {
        config.validate()?;
        let tasks = TaskStore::open(&paths)?;
        let sessions = SessionStore::open(&paths)?;
        let router = Router::new(ToolCatalog::with_extras(
            &config.tools.read_only,
            &config.tools.meta,
        ))?;
        let enforcer = PolicyEnforcer::new(
            Arc::new(default_registry(&config)),
            tasks,
            sessions,
            AuditLog::new(&paths.audit_dir),
            EnforcerOptions::from_config(&config),
        );
        debug!(root = %paths.root.display(), "runtime opened");
        Ok(Self {
            config,
            router,
            enforcer,
        })
    }

    /// Route a raw host payload and evaluate it.
    pub fn handle_hook(&self, event_name: &str, raw: &str) -> Result<Verdict> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|err| RouteError::validation(event_name, format!("not JSON: {err}")))?;
        let event = self.router.route(event_name, &value)?;
        let verdict = self
            .enforcer
            .handle(&event)
            .with_context(|| format!("handle {event_name} for session {}", event.session_id))?;
        Ok(verdict)
    }

    pub fn config(&self) -> &GatekeeperConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        self.enforcer.sessions()
    }
}
