use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

/// Cap for an operator-supplied prompt file (characters).
const MAX_PROMPT_CHARS: usize = 20_000;

/// Builds the system instruction sent with every model request.
pub struct PromptBuilder {
    persona: String,
    chat_rules: String,
}

impl PromptBuilder {
    /// Load the persona from `prompt_path` when given and readable,
    /// otherwise fall back to the built-in coding assistant persona.
    pub fn load(prompt_path: Option<&str>) -> Self {
        let persona = prompt_path
            .and_then(|p| read_prompt_file(Path::new(p)))
            .unwrap_or_else(default_persona);

        Self {
            persona,
            chat_rules: default_chat_rules(),
        }
    }

    /// Assemble the full system instruction.
    ///
    /// The persona and chat rules are identical for everyone; the trailing
    /// context line changes per request.
    pub fn build(&self, info: Option<&SessionInfo>) -> String {
        let mut out = format!("{}\n\n{}", self.persona, self.chat_rules);
        if info.is_some_and(|i| i.github_tools) {
            out.push_str("\n\n");
            out.push_str(GITHUB_TOOLS);
        }
        if let Some(info) = info {
            let github = if info.has_token {
                "linked"
            } else {
                "not linked (the user can send `TOKEN: <github token>` to link one)"
            };
            out.push_str(&format!(
                "\n\n[Turns in context: {} | GitHub token: {} | Time: {}]",
                info.turn_count, github, info.timestamp
            ));
        }
        out
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::load(None)
    }
}

/// Per-request metadata appended to the system instruction.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub turn_count: usize,
    pub has_token: bool,
    /// GitHub tools are attached to this request.
    pub github_tools: bool,
    pub timestamp: String,
}

const GITHUB_TOOLS: &str = "## GitHub\n\
     You can act on the user's GitHub account with the attached tools: read and \
     write files, create repositories and branches, inspect commits, merge branches \
     and search repositories.\n\
     - Call `get_authenticated_user` first when you need the user's login as `owner`.\n\
     - Confirm what you changed with the file path or link the tool returned.\n\
     - If a tool reports an error, explain it plainly instead of retrying blindly.";

fn read_prompt_file(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| warn!(path = %path.display(), error = %e, "failed to read prompt file"))
        .ok()?;
    if content.trim().is_empty() {
        warn!(path = %path.display(), "prompt file is empty, using built-in prompt");
        return None;
    }
    info!(path = %path.display(), chars = content.len(), "loaded system prompt from file");
    Some(truncate_content(&content, MAX_PROMPT_CHARS))
}

/// Truncate content to `max_chars` using 70% head / 20% tail / 10% marker.
pub(crate) fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        return content.to_string();
    }

    let head_chars = floor_char_boundary(content, max_chars * 70 / 100);
    let tail_chars = max_chars * 20 / 100;
    let marker = "\n\n[... content truncated ...]\n\n";

    // Don't split mid-line
    let head_end = content[..head_chars]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(head_chars);
    let tail_from = floor_char_boundary(content, content.len() - tail_chars);
    let tail_start = content[tail_from..]
        .find('\n')
        .map(|i| tail_from + i + 1)
        .unwrap_or(tail_from);

    let mut out = String::with_capacity(head_end + marker.len() + (content.len() - tail_start));
    out.push_str(&content[..head_end]);
    out.push_str(marker);
    out.push_str(&content[tail_start..]);
    out
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn default_persona() -> String {
    "You are an AI coding assistant that people talk to over WhatsApp.\n\n\
     You help users build, fix and improve apps and websites:\n\
     - write clean, working, production-ready code\n\
     - explain programming and web development concepts plainly\n\
     - give step-by-step guidance for development tasks\n\
     - debug problems and suggest sound fixes\n\
     - review and improve code the user shares\n\
     - manage their GitHub repositories once they link a token\n\n\
     Use the earlier messages in the conversation to keep follow-ups consistent. \
     Prefer clarity and completeness over brevity, and explain decisions when it helps."
        .to_string()
}

fn default_chat_rules() -> String {
    "## Chat formatting\n\
     - Replies are read on a phone. Keep paragraphs short.\n\
     - Put code in fenced blocks with a language tag (```python).\n\
     - Avoid tables and HTML; WhatsApp renders neither.\n\
     - Never repeat access tokens or other secrets back to the user."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_prompt_mentions_whatsapp_and_rules() {
        let prompt = PromptBuilder::load(None).build(None);
        assert!(prompt.contains("WhatsApp"));
        assert!(prompt.contains("## Chat formatting"));
        assert!(!prompt.contains("[Turns in context"));
    }

    #[test]
    fn session_info_is_appended_last() {
        let info = SessionInfo {
            turn_count: 4,
            has_token: true,
            github_tools: false,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        };
        let prompt = PromptBuilder::default().build(Some(&info));
        assert!(prompt.ends_with("[Turns in context: 4 | GitHub token: linked | Time: 2026-01-01T00:00:00Z]"));
        assert!(!prompt.contains("## GitHub"));
    }

    #[test]
    fn github_section_only_when_tools_attached() {
        let info = SessionInfo {
            turn_count: 0,
            has_token: true,
            github_tools: true,
            timestamp: "now".to_string(),
        };
        let prompt = PromptBuilder::default().build(Some(&info));
        let section = prompt.find("## GitHub").expect("github section");
        assert!(section < prompt.find("[Turns in context").expect("context line"));
        assert!(prompt.contains("get_authenticated_user"));
    }

    #[test]
    fn prompt_file_replaces_persona() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("persona.md");
        fs::write(&path, "You are a pirate.").expect("write");

        let prompt = PromptBuilder::load(path.to_str()).build(None);
        assert!(prompt.starts_with("You are a pirate."));
        assert!(prompt.contains("## Chat formatting"));
    }

    #[test]
    fn missing_or_empty_prompt_file_falls_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let empty = dir.path().join("empty.md");
        fs::write(&empty, "   \n").expect("write");

        assert!(PromptBuilder::load(empty.to_str()).build(None).contains("WhatsApp"));
        assert!(PromptBuilder::load(Some("/nonexistent/prompt.md"))
            .build(None)
            .contains("WhatsApp"));
    }

    #[test]
    fn large_content_is_truncated() {
        let big = "line of text\n".repeat(5_000);
        let out = truncate_content(&big, MAX_PROMPT_CHARS);
        assert!(out.len() < big.len());
        assert!(out.contains("[... content truncated ...]"));
    }
}
