//! Remediation text for non-allow gate results.

use std::sync::LazyLock;

use minijinja::{Environment, context};
use tracing::warn;

use crate::core::event::ToolCall;
use crate::core::types::GateMode;

const GATE_MESSAGE_TEMPLATE: &str = include_str!("templates/gate_message.md");

static TEMPLATES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.add_template("gate_message", GATE_MESSAGE_TEMPLATE)
        .expect("gate_message template should be valid");
    env
});

#[derive(Debug, Clone, Copy)]
pub struct GateMessage<'a> {
    pub gate: &'a str,
    pub mode: GateMode,
    pub tool: Option<&'a ToolCall>,
    pub summary: &'a str,
    pub next: &'a str,
}

impl GateMessage<'_> {
    pub fn render(&self) -> String {
        let rendered = TEMPLATES.get_template("gate_message").and_then(|template| {
            template.render(context! {
                gate => self.gate,
                mode => self.mode.as_str(),
                tool => self.tool.map(|t| t.name.as_str()),
                category => self.tool.map(|t| t.category.as_str()),
                summary => self.summary,
                next => self.next,
            })
        });
        match rendered {
            Ok(text) => text,
            Err(err) => {
                warn!(gate = self.gate, error = %err, "gate message render failed");
                format!("{}: {} Next: {}", self.gate, self.summary, self.next)
            }
        }
    }
}
