//! Shell command classification.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};

/// History-destroying git operations.
static DESTRUCTIVE_GIT: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)git\s+reset\s+--hard",
        r"(?i)git\s+clean\s+-[fd]",
        r"(?i)git\s+push\s+--force",
        r"(?i)git\s+checkout\s+--\s+\.",
        r"(?i)git\s+stash\s+drop",
    ])
    .expect("destructive git patterns must compile")
});

/// Commands that only read, unless they redirect into a file.
static READ_ONLY: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^\s*(cat|head|tail|less|more|find|grep|rg|echo|which|type)\s",
        r"(?i)^\s*(ls|pwd)\b",
        r"(?i)^\s*git\s+(status|diff|log|show|branch)\b",
        r"(?i)^\s*(npm|pip|uv\s+pip)\s+list\b",
    ])
    .expect("read-only command patterns must compile")
});

static MUTATING: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\b(rm|mv|cp|mkdir|touch|chmod|chown)\b",
        r"(?i)\bgit\s+(commit|push|reset)\b",
        r"(?i)\bgit\s+checkout\b.*--",
        r"(?i)\b(npm|pip)\s+install\b",
        r"(?i)\buv\s+add\b",
        r"(?i)\b(sed|awk)\s+-i\b",
        r">\s*[^&]",
        r">>",
    ])
    .expect("mutating command patterns must compile")
});

static REDIRECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*[^&]|>>").expect("redirect pattern must compile"));

pub fn is_destructive_git(command: &str) -> bool {
    DESTRUCTIVE_GIT.is_match(command)
}

/// Whether a command changes state. Unknown commands count as read-only.
pub fn is_mutating(command: &str) -> bool {
    let command = command.trim();
    if READ_ONLY.is_match(command) && !REDIRECT.is_match(command) {
        return false;
    }
    MUTATING.is_match(command)
}
