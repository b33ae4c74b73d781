//! Gatekeeper CLI.
//!
//! `hook` is the adapter the agent host invokes for every lifecycle event: it
//! reads the payload from stdin and prints the verdict. The remaining commands
//! manage the task graph and inspect session state from a terminal.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use gatekeeper::core::task::{NewTask, TaskPatch, is_valid_id};
use gatekeeper::core::types::{TaskStatus, TaskType};
use gatekeeper::error::{EnforceError, SessionError};
use gatekeeper::exit_codes;
use gatekeeper::io::audit::read_records;
use gatekeeper::io::config::{GatekeeperConfig, write_config};
use gatekeeper::io::paths::{DATA_DIR_ENV, DataPaths, resolve_root};
use gatekeeper::io::session_store::SessionStore;
use gatekeeper::io::task_store::{ListFilter, ListOrder, ReadyFilter, TaskStore};
use gatekeeper::logging;
use gatekeeper::runtime::Runtime;

#[derive(Parser)]
#[command(
    name = "gatekeeper",
    version,
    about = "Policy gates and task graph for agent host hooks"
)]
struct Cli {
    /// Data directory (default: $GATEKEEPER_DATA, else .gatekeeper).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the data directory and a default config.toml if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Evaluate one host event: JSON payload on stdin, verdict JSON on stdout.
    Hook {
        /// Host event name (e.g. PreToolUse, BeforeTool, SessionEnd).
        event: String,
    },
    /// Manage the task graph.
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    /// Inspect session state.
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Inspect the per-session audit log.
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Create a task. The id is generated from the title when omitted.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long = "type")]
        task_type: Option<TaskType>,
        #[arg(long)]
        priority: Option<u8>,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        body: Option<String>,
        /// Dependency id (repeatable).
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
    },
    Get {
        id: String,
        #[arg(long)]
        include_archived: bool,
    },
    /// Update fields of a task guarded by its current version.
    Update {
        id: String,
        #[arg(long)]
        expected_version: u64,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "type")]
        task_type: Option<TaskType>,
        #[arg(long)]
        priority: Option<u8>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long, conflicts_with = "clear_parent")]
        parent: Option<String>,
        /// Detach the task from its parent.
        #[arg(long)]
        clear_parent: bool,
    },
    /// Add (or with --remove, drop) a dependency edge.
    Depend {
        id: String,
        dep_id: String,
        #[arg(long)]
        remove: bool,
    },
    /// Tasks that can be worked on now, by priority.
    Ready {
        #[arg(long = "type")]
        task_type: Option<TaskType>,
        #[arg(long)]
        parent: Option<String>,
    },
    List {
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long = "type")]
        task_type: Option<TaskType>,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        include_archived: bool,
        #[arg(long)]
        by_priority: bool,
    },
    Children {
        id: String,
    },
    Dependents {
        id: String,
    },
    /// Rebuild the id index by rescanning task records.
    Reindex,
}

#[derive(Subcommand)]
enum SessionCommand {
    Show {
        session_id: String,
    },
    /// Stop write tools until the block is cleared.
    Block {
        session_id: String,
        #[arg(long)]
        reason: String,
    },
    /// Clear a custodiet block.
    Unblock {
        session_id: String,
    },
}

#[derive(Subcommand)]
enum AuditCommand {
    Show { session_id: String },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::for_error(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let root = resolve_root(cli.data_dir, std::env::var_os(DATA_DIR_ENV));
    let paths = DataPaths::new(&root);
    match cli.command {
        Command::Init { force } => cmd_init(&paths, cli.config.as_deref(), force),
        Command::Hook { event } => cmd_hook(&root, cli.config.as_deref(), &event),
        Command::Task { command } => cmd_task(&TaskStore::open(&paths)?, command),
        Command::Session { command } => cmd_session(&SessionStore::open(&paths)?, command),
        Command::Audit {
            command: AuditCommand::Show { session_id },
        } => {
            if !is_valid_id(&session_id) {
                return Err(SessionError::InvalidId(session_id).into());
            }
            print_json(&read_records(&paths.audit_file(&session_id))?)
        }
    }
}

fn cmd_init(paths: &DataPaths, config_path: Option<&Path>, force: bool) -> Result<()> {
    let config_path = config_path.unwrap_or(&paths.config_path);
    TaskStore::open(paths)?;
    SessionStore::open(paths)?;
    if force || !config_path.exists() {
        write_config(config_path, &GatekeeperConfig::default())?;
    }
    println!("{}", paths.root.display());
    Ok(())
}

fn cmd_hook(root: &Path, config_path: Option<&Path>, event: &str) -> Result<()> {
    let runtime = Runtime::open(root, config_path)?;
    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .context("read hook payload from stdin")?;
    let verdict = runtime.handle_hook(event, &raw)?;
    print_json(&verdict)
}

fn cmd_session(store: &SessionStore, command: SessionCommand) -> Result<()> {
    let (session_id, state) = match command {
        SessionCommand::Show { session_id } => {
            let state = store.load(&session_id)?;
            (session_id, state)
        }
        SessionCommand::Block { session_id, reason } => {
            let state = store.update(&session_id, |state| state.custodiet_block = Some(reason))?;
            (session_id, state)
        }
        SessionCommand::Unblock { session_id } => {
            let state = store.update(&session_id, |state| state.custodiet_block = None)?;
            (session_id, state)
        }
    };
    print_json(&state.ok_or(EnforceError::UnknownSession(session_id))?)
}

fn cmd_task(store: &TaskStore, command: TaskCommand) -> Result<()> {
    match command {
        TaskCommand::Create {
            title,
            id,
            task_type,
            priority,
            parent,
            body,
            depends_on,
        } => {
            let mut new = NewTask::new(title);
            new.id = id;
            new.parent_id = parent;
            new.dependency_ids.extend(depends_on);
            if let Some(task_type) = task_type {
                new = new.with_type(task_type);
            }
            if let Some(priority) = priority {
                new = new.with_priority(priority);
            }
            if let Some(body) = body {
                new = new.with_body(body);
            }
            print_json(&store.create(new)?)
        }
        TaskCommand::Get {
            id,
            include_archived,
        } => print_json(&store.get(&id, include_archived)?),
        TaskCommand::Update {
            id,
            expected_version,
            status,
            title,
            task_type,
            priority,
            body,
            parent,
            clear_parent,
        } => {
            let patch = TaskPatch {
                title,
                task_type,
                priority,
                status,
                parent_id: if clear_parent { Some(None) } else { parent.map(Some) },
                body,
            };
            let updated = store
                .update(&id, patch, expected_version)
                .with_context(|| format!("update task {id}"))?;
            print_json(&updated)
        }
        TaskCommand::Depend { id, dep_id, remove } => {
            let updated = if remove {
                store.remove_dependency(&id, &dep_id)?
            } else {
                store.add_dependency(&id, &dep_id)?
            };
            print_json(&updated)
        }
        TaskCommand::Ready { task_type, parent } => {
            let ready: Vec<_> = store.ready(&ReadyFilter { task_type, parent })?.collect();
            print_json(&ready)
        }
        TaskCommand::List {
            status,
            task_type,
            parent,
            include_archived,
            by_priority,
        } => {
            let filter = ListFilter {
                status,
                task_type,
                parent,
                include_archived,
                order: if by_priority {
                    ListOrder::Priority
                } else {
                    ListOrder::Insertion
                },
            };
            print_json(&store.list(&filter)?)
        }
        TaskCommand::Children { id } => print_json(&store.children(&id)?),
        TaskCommand::Dependents { id } => print_json(&store.dependents(&id)?),
        TaskCommand::Reindex => {
            let count = store.rebuild_index()?;
            print_json(&serde_json::json!({ "indexed": count }))
        }
    }
}

/// Pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hook() {
        let cli = Cli::parse_from(["gatekeeper", "hook", "PreToolUse"]);
        assert!(matches!(cli.command, Command::Hook { event } if event == "PreToolUse"));
        assert!(cli.data_dir.is_none());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from([
            "gatekeeper",
            "task",
            "reindex",
            "--data-dir",
            "/tmp/gk",
            "--config",
            "/tmp/gk.toml",
        ]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/gk")));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/gk.toml")));
        assert!(matches!(
            cli.command,
            Command::Task {
                command: TaskCommand::Reindex
            }
        ));
    }

    #[test]
    fn parse_update_with_legacy_status_name() {
        let cli = Cli::parse_from([
            "gatekeeper",
            "task",
            "update",
            "t1",
            "--expected-version",
            "3",
            "--status",
            "in_progress",
        ]);
        match cli.command {
            Command::Task {
                command:
                    TaskCommand::Update {
                        id,
                        expected_version,
                        status,
                        ..
                    },
            } => {
                assert_eq!(id, "t1");
                assert_eq!(expected_version, 3);
                assert_eq!(status, Some(TaskStatus::Active));
            }
            _ => panic!("expected task update"),
        }
    }

    #[test]
    fn parse_create_with_repeated_dependencies() {
        let cli = Cli::parse_from([
            "gatekeeper",
            "task",
            "create",
            "--title",
            "Ship it",
            "--type",
            "project",
            "--depends-on",
            "a",
            "--depends-on",
            "b",
        ]);
        match cli.command {
            Command::Task {
                command:
                    TaskCommand::Create {
                        task_type,
                        depends_on,
                        ..
                    },
            } => {
                assert_eq!(task_type, Some(TaskType::Project));
                assert_eq!(depends_on, vec!["a", "b"]);
            }
            _ => panic!("expected task create"),
        }
    }

    #[test]
    fn parent_and_clear_parent_conflict() {
        let parsed = Cli::try_parse_from([
            "gatekeeper",
            "task",
            "update",
            "t1",
            "--expected-version",
            "1",
            "--parent",
            "p",
            "--clear-parent",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn session_block_requires_a_reason() {
        assert!(Cli::try_parse_from(["gatekeeper", "session", "block", "s1"]).is_err());
        let cli = Cli::parse_from(["gatekeeper", "session", "block", "s1", "--reason", "drift"]);
        assert!(matches!(
            cli.command,
            Command::Session {
                command: SessionCommand::Block { reason, .. }
            } if reason == "drift"
        ));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let parsed = Cli::try_parse_from(["gatekeeper", "task", "list", "--status", "someday"]);
        assert!(parsed.is_err());
    }
}
