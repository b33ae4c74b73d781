//! End-to-end enforcer flows over a real data directory.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use gatekeeper::core::event::{EventKind, EventPayload, StartSource, ToolCall};
use gatekeeper::core::task::NewTask;
use gatekeeper::core::types::{GateMode, Phase, TaskStatus, Workflow};
use gatekeeper::enforcer::{EnforcerOptions, PolicyEnforcer};
use gatekeeper::error::{EnforceError, SessionError};
use gatekeeper::gates::GateRegistry;
use gatekeeper::io::audit::read_records;
use gatekeeper::io::config::GatekeeperConfig;
use gatekeeper::test_support::{
    SlowGate, TestEnv, delegate, event, pre_tool, read_file, shell, write_file,
};

fn start(enforcer: &PolicyEnforcer, session_id: &str) {
    let verdict = enforcer
        .handle(&event(
            session_id,
            EventPayload::SessionStart {
                source: StartSource::Startup,
            },
        ))
        .expect("start");
    assert!(verdict.allowed);
}

fn hydrate(enforcer: &PolicyEnforcer, session_id: &str) {
    for payload in [
        EventPayload::UserPromptSubmit {
            prompt: "fix the bug".to_string(),
        },
        EventPayload::HydrationComplete {
            workflow: Workflow::Standard,
        },
    ] {
        let verdict = enforcer.handle(&event(session_id, payload)).expect("hydrate");
        assert!(verdict.allowed, "{verdict:?}");
    }
}

#[test]
fn tool_use_before_hydration_is_blocked() {
    let env = TestEnv::new();
    let enforcer = env.enforcer();
    start(&enforcer, "s1");

    let verdict = enforcer
        .handle(&pre_tool("s1", write_file("src/lib.rs", "fn main() {}")))
        .expect("pre tool");
    assert!(!verdict.allowed);
    assert_eq!(verdict.blocking_reason.as_deref(), Some("HydrationRequired"));
    assert!(verdict.remediation.is_some());
}

#[test]
fn overrunning_gate_blocks_with_timeout() {
    let env = TestEnv::new();
    let registry = GateRegistry::builder()
        .register(
            EventKind::PreToolUse,
            10,
            SlowGate::new("slow", Duration::from_millis(200)),
        )
        .budget("slow", Duration::from_millis(100))
        .build();
    let enforcer = PolicyEnforcer::new(
        Arc::new(registry),
        env.tasks(),
        env.sessions(),
        env.audit(),
        EnforcerOptions::default(),
    );
    start(&enforcer, "s1");

    let verdict = enforcer
        .handle(&pre_tool("s1", shell("ls")))
        .expect("pre tool");
    assert!(!verdict.allowed);
    assert_eq!(verdict.blocking_reason.as_deref(), Some("Timeout"));
}

#[test]
fn every_event_after_session_end_is_refused() {
    let env = TestEnv::new();
    let enforcer = env.enforcer();
    start(&enforcer, "s1");
    let end = enforcer
        .handle(&event("s1", EventPayload::SessionEnd { reason: None }))
        .expect("end");
    assert!(end.allowed);

    for payload in [
        EventPayload::UserPromptSubmit {
            prompt: "again".to_string(),
        },
        EventPayload::PreToolUse {
            tool: read_file("README.md"),
        },
        EventPayload::Stop {},
        EventPayload::SessionEnd { reason: None },
    ] {
        let verdict = enforcer.handle(&event("s1", payload)).expect("handle");
        assert!(!verdict.allowed);
        assert_eq!(verdict.blocking_reason.as_deref(), Some("SessionEnded"));
    }

    // A fresh enforcer over the same data sees the persisted End phase.
    let verdict = env
        .enforcer()
        .handle(&event("s1", EventPayload::Stop {}))
        .expect("handle");
    assert_eq!(verdict.blocking_reason.as_deref(), Some("SessionEnded"));
}

#[test]
fn session_end_for_unknown_session_does_not_close_it() {
    let env = TestEnv::new();
    let enforcer = env.enforcer();
    let err = enforcer
        .handle(&event("s1", EventPayload::SessionEnd { reason: None }))
        .expect_err("unknown session");
    assert!(matches!(err, EnforceError::UnknownSession(_)));

    start(&enforcer, "s1");
    let session = env.sessions().load("s1").expect("load").expect("session");
    assert_eq!(session.phase, Phase::Start);
}

#[test]
fn blocked_session_end_keeps_the_session_open() {
    let env = TestEnv::new();
    let registry = GateRegistry::builder()
        .register(
            EventKind::SessionEnd,
            10,
            SlowGate::new("slow_end", Duration::from_millis(200)),
        )
        .budget("slow_end", Duration::from_millis(50))
        .build();
    let enforcer = PolicyEnforcer::new(
        Arc::new(registry),
        env.tasks(),
        env.sessions(),
        env.audit(),
        EnforcerOptions::default(),
    );
    start(&enforcer, "s1");

    let end = enforcer
        .handle(&event("s1", EventPayload::SessionEnd { reason: None }))
        .expect("end");
    assert_eq!(end.blocking_reason.as_deref(), Some("Timeout"));
    let session = env.sessions().load("s1").expect("load").expect("session");
    assert_eq!(session.phase, Phase::Start);

    let stop = enforcer
        .handle(&event("s1", EventPayload::Stop {}))
        .expect("stop");
    assert!(stop.allowed, "{stop:?}");
}

#[test]
fn session_ids_outside_the_data_dir_are_rejected() {
    let env = TestEnv::new();
    let enforcer = env.enforcer();
    for payload in [
        EventPayload::SessionEnd { reason: None },
        EventPayload::Stop {},
    ] {
        let err = enforcer.handle(&event("../x", payload)).expect_err("invalid id");
        assert!(matches!(
            err,
            EnforceError::Session(SessionError::InvalidId(_))
        ));
    }
    assert!(!env.paths.root.join("x.jsonl").exists());
    assert!(!env.paths.audit_dir.exists());
}

#[test]
fn same_event_and_state_give_the_same_verdict() {
    let env = TestEnv::new();
    let enforcer = env.enforcer();
    start(&enforcer, "s1");
    let reset = pre_tool("s1", shell("git reset --hard HEAD"));
    let first = enforcer.handle(&reset).expect("first");
    let second = enforcer.handle(&reset).expect("second");
    assert_eq!(first, second);

    hydrate(&enforcer, "s1");
    let third = enforcer.handle(&reset).expect("third");
    let fourth = enforcer.handle(&reset).expect("fourth");
    assert_eq!(third, fourth);
    assert_eq!(third.blocking_reason.as_deref(), Some("DestructiveCommand"));
}

#[test]
fn bind_work_and_complete_a_task() {
    let env = TestEnv::new();
    let enforcer = env.enforcer();
    start(&enforcer, "s1");
    hydrate(&enforcer, "s1");
    enforcer
        .tasks()
        .create(NewTask::new("fix the bug").with_id("BUG"))
        .expect("task");

    let unbound_write = enforcer
        .handle(&pre_tool("s1", write_file("src/lib.rs", "x")))
        .expect("write");
    assert!(unbound_write.allowed);
    assert_eq!(unbound_write.warnings.len(), 2, "{:?}", unbound_write.warnings);
    assert!(unbound_write.warnings[0].starts_with("TaskRequired"));
    assert!(unbound_write.warnings[1].starts_with("CriticApprovalRequired"));

    let bind = enforcer
        .handle(&event(
            "s1",
            EventPayload::TaskBind {
                task_id: "BUG".to_string(),
            },
        ))
        .expect("bind");
    assert!(bind.allowed);
    assert_eq!(
        enforcer.tasks().get("BUG", false).expect("get").status,
        TaskStatus::Active
    );

    let second_bind = enforcer
        .handle(&event(
            "s1",
            EventPayload::TaskBind {
                task_id: "OTHER".to_string(),
            },
        ))
        .expect("second bind");
    assert_eq!(second_bind.blocking_reason.as_deref(), Some("TaskAlreadyBound"));

    let review = enforcer
        .handle(&event(
            "s1",
            EventPayload::PostToolUse {
                tool: delegate("Task", "aops-core:critic"),
                succeeded: true,
                approved: true,
            },
        ))
        .expect("critic");
    assert!(review.allowed);

    let bound_write = enforcer
        .handle(&pre_tool("s1", write_file("src/lib.rs", "x")))
        .expect("write");
    assert!(bound_write.allowed);
    assert!(bound_write.warnings.is_empty());

    let unbind = enforcer
        .handle(&event(
            "s1",
            EventPayload::TaskUnbind {
                task_id: "BUG".to_string(),
                completed: true,
            },
        ))
        .expect("unbind");
    assert!(unbind.allowed);
    assert_eq!(
        enforcer.tasks().get("BUG", false).expect("get").status,
        TaskStatus::Completed
    );
    let session = env.sessions().load("s1").expect("load").expect("session");
    assert_eq!(session.active_task_id, None);
    assert_eq!(session.phase, Phase::Orchestrate);

    let stop = enforcer
        .handle(&event("s1", EventPayload::Stop {}))
        .expect("stop");
    assert!(stop.allowed);
    assert!(stop.warnings.is_empty());
}

fn post_tool(enforcer: &PolicyEnforcer, session_id: &str, tool: ToolCall) {
    let verdict = enforcer
        .handle(&event(
            session_id,
            EventPayload::PostToolUse {
                tool,
                succeeded: true,
                approved: false,
            },
        ))
        .expect("post tool");
    assert!(verdict.allowed, "{verdict:?}");
}

#[test]
fn custodiet_blocks_writes_until_a_compliance_check() {
    let env = TestEnv::new();
    let mut config = GatekeeperConfig::default();
    config.gates.custodiet = GateMode::Block;
    config.custodiet_threshold = 2;
    let enforcer = env.enforcer_with(&config);
    start(&enforcer, "s1");
    hydrate(&enforcer, "s1");

    for path in ["a.md", "b.md"] {
        post_tool(&enforcer, "s1", read_file(path));
    }
    let blocked = enforcer
        .handle(&pre_tool("s1", write_file("src/lib.rs", "x")))
        .expect("write");
    assert_eq!(
        blocked.blocking_reason.as_deref(),
        Some("ComplianceCheckRequired")
    );
    let spawn = enforcer
        .handle(&pre_tool("s1", delegate("Task", "aops-core:custodiet")))
        .expect("spawn");
    assert!(spawn.allowed);

    post_tool(&enforcer, "s1", delegate("Task", "aops-core:custodiet"));
    let session = env.sessions().load("s1").expect("load").expect("session");
    assert_eq!(session.tool_calls_since_compliance, 0);
    let write = enforcer
        .handle(&pre_tool("s1", write_file("src/lib.rs", "x")))
        .expect("write");
    assert!(write.allowed, "{write:?}");

    env.sessions()
        .update("s1", |state| state.custodiet_block = Some("scope drift".to_string()))
        .expect("block")
        .expect("session");
    let flagged = enforcer
        .handle(&pre_tool("s1", write_file("src/lib.rs", "x")))
        .expect("write");
    assert_eq!(
        flagged.blocking_reason.as_deref(),
        Some("ComplianceCheckRequired")
    );
    assert!(flagged.remediation.as_deref().unwrap_or("").contains("scope drift"));
}

#[test]
fn critic_approval_lasts_until_the_next_prompt() {
    let env = TestEnv::new();
    let mut config = GatekeeperConfig::default();
    config.gates.critic = GateMode::Block;
    let enforcer = env.enforcer_with(&config);
    start(&enforcer, "s1");
    hydrate(&enforcer, "s1");

    let write = pre_tool("s1", write_file("notes.txt", "x"));
    let blocked = enforcer.handle(&write).expect("write");
    assert_eq!(
        blocked.blocking_reason.as_deref(),
        Some("CriticApprovalRequired")
    );

    let approval = event(
        "s1",
        EventPayload::PostToolUse {
            tool: delegate("Task", "critic"),
            succeeded: true,
            approved: true,
        },
    );
    assert!(enforcer.handle(&approval).expect("approval").allowed);
    assert!(enforcer.handle(&write).expect("write").allowed);

    let prompt = event(
        "s1",
        EventPayload::UserPromptSubmit {
            prompt: "something else".to_string(),
        },
    );
    assert!(enforcer.handle(&prompt).expect("prompt").allowed);
    let again = enforcer.handle(&write).expect("write");
    assert_eq!(
        again.blocking_reason.as_deref(),
        Some("CriticApprovalRequired")
    );
}

#[test]
fn random_event_sequences_never_lower_the_phase() {
    let env = TestEnv::new();
    let enforcer = env.enforcer();
    start(&enforcer, "s1");
    let mut rng = StdRng::seed_from_u64(7);
    let mut last = Phase::Start;

    for _ in 0..80 {
        let payload = match rng.gen_range(0..7) {
            0 => EventPayload::UserPromptSubmit {
                prompt: "next".to_string(),
            },
            1 => EventPayload::HydrationComplete {
                workflow: Workflow::Standard,
            },
            2 => EventPayload::SessionStart {
                source: StartSource::Startup,
            },
            3 => EventPayload::SessionStart {
                source: StartSource::Resume,
            },
            4 => EventPayload::Stop {},
            5 => EventPayload::TaskBind {
                task_id: "missing".to_string(),
            },
            _ => EventPayload::PreToolUse {
                tool: read_file("notes.md"),
            },
        };
        let verdict = enforcer.handle(&event("s1", payload)).expect("handle");
        let phase = env
            .sessions()
            .load("s1")
            .expect("load")
            .expect("session")
            .phase;
        assert!(phase >= last, "phase moved back from {last} to {phase}");
        if verdict.blocking_reason.as_deref() == Some("PhaseRegression") {
            assert_eq!(phase, last);
        }
        last = phase;
    }
}

#[test]
fn session_end_drains_in_flight_events() {
    let env = TestEnv::new();
    let enforcer = Arc::new(env.enforcer());
    start(&enforcer, "s1");
    hydrate(&enforcer, "s1");

    let workers: Vec<_> = (0..6)
        .map(|n| {
            let enforcer = Arc::clone(&enforcer);
            thread::spawn(move || {
                enforcer.handle(&pre_tool("s1", read_file(&format!("file{n}.md"))))
            })
        })
        .collect();
    let end = enforcer
        .handle(&event("s1", EventPayload::SessionEnd { reason: None }))
        .expect("end");
    assert!(end.allowed);

    for worker in workers {
        let verdict = worker.join().expect("join").expect("handle");
        assert!(
            verdict.allowed || verdict.blocking_reason.as_deref() == Some("SessionEnded"),
            "{verdict:?}"
        );
    }
    let session = env.sessions().load("s1").expect("load").expect("session");
    assert_eq!(session.phase, Phase::End);

    // start + prompt + hydration + 6 tool events + end, one record each.
    let records = read_records(&env.paths.audit_file("s1")).expect("audit");
    assert_eq!(records.len(), 10);
    assert_eq!(
        records.iter().filter(|r| r.event == EventKind::SessionEnd).count(),
        1
    );
}

#[test]
fn audit_records_name_the_blocking_gate() {
    let env = TestEnv::new();
    let enforcer = env.enforcer();
    start(&enforcer, "s1");
    enforcer
        .handle(&pre_tool("s1", shell("rm -rf target")))
        .expect("pre tool");

    let records = read_records(&env.paths.audit_file("s1")).expect("audit");
    let blocked = records.last().expect("record");
    assert!(!blocked.allowed);
    assert_eq!(blocked.blocking_gate.as_deref(), Some("hydration"));
    assert_eq!(blocked.blocking_reason.as_deref(), Some("HydrationRequired"));
    assert!(blocked.trace.iter().any(|entry| entry.gate_id == "phase_order"));
}
